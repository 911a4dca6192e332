//! Header and trailer utilities.
//!
//! # Design Decisions
//! - `copy_headers` overwrites, it does not append: for a key with several
//!   values the last one in iteration order wins. Callers rely on this to
//!   mirror the upstream header set exactly once per key.
//! - Hop-by-hop fields are connection-local and never relayed; the host
//!   HTTP stack re-frames the message itself. `Trailer` is end-to-end and
//!   is preserved.

use axum::http::header::{
    HeaderMap, HeaderName, HeaderValue, CONNECTION, PROXY_AUTHENTICATE, PROXY_AUTHORIZATION, TE,
    TRAILER, TRANSFER_ENCODING, UPGRADE,
};

/// Reports whether a response was replayed from cache (`true`/`false`).
pub const X_PROXY_CACHED: HeaderName = HeaderName::from_static("x-proxy-cached");

/// Carries the caller's bare IP to the upstream; overwritten, not appended.
pub const X_FORWARDED_FOR: HeaderName = HeaderName::from_static("x-forwarded-for");

const KEEP_ALIVE: HeaderName = HeaderName::from_static("keep-alive");

/// Copy one header set into another, last value per key winning.
pub fn copy_headers(dst: &mut HeaderMap, src: &HeaderMap) {
    for (name, value) in src.iter() {
        dst.insert(name.clone(), value.clone());
    }
}

/// Remove hop-by-hop headers that must not be relayed.
pub fn strip_hop_by_hop(headers: &mut HeaderMap) {
    const HOP_BY_HOP: [HeaderName; 7] = [
        CONNECTION,
        KEEP_ALIVE,
        PROXY_AUTHENTICATE,
        PROXY_AUTHORIZATION,
        TE,
        TRANSFER_ENCODING,
        UPGRADE,
    ];
    for name in HOP_BY_HOP {
        headers.remove(name);
    }
}

/// Announce the trailer keys the upstream declared.
///
/// Collapses however many `Trailer` values the upstream sent into a single
/// comma-joined header, written before the status line goes out. Removes the
/// announcement entirely when the upstream declared none.
pub fn announce_trailers(dst: &mut HeaderMap, upstream: &HeaderMap) {
    let names: Vec<&str> = upstream
        .get_all(TRAILER)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect();

    if names.is_empty() {
        dst.remove(TRAILER);
        return;
    }
    if let Ok(value) = HeaderValue::from_str(&names.join(",")) {
        dst.insert(TRAILER, value);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn copy_headers_overwrites_repeated_keys() {
        let mut src = HeaderMap::new();
        src.append("x-dup", "first".parse().unwrap());
        src.append("x-dup", "second".parse().unwrap());
        src.insert("content-type", "text/plain".parse().unwrap());

        let mut dst = HeaderMap::new();
        copy_headers(&mut dst, &src);

        // last value in iteration order wins; never both concatenated
        assert_eq!(dst.get_all("x-dup").iter().count(), 1);
        assert_eq!(dst.get("x-dup").unwrap(), "second");
        assert_eq!(dst.get("content-type").unwrap(), "text/plain");
    }

    #[test]
    fn copy_headers_replaces_existing_destination_values() {
        let mut src = HeaderMap::new();
        src.insert("x-a", "new".parse().unwrap());
        let mut dst = HeaderMap::new();
        dst.insert("x-a", "old".parse().unwrap());
        dst.insert("x-b", "kept".parse().unwrap());

        copy_headers(&mut dst, &src);
        assert_eq!(dst.get("x-a").unwrap(), "new");
        assert_eq!(dst.get("x-b").unwrap(), "kept");
    }

    #[test]
    fn strips_hop_by_hop_but_keeps_trailer() {
        let mut headers = HeaderMap::new();
        headers.insert(CONNECTION, "keep-alive".parse().unwrap());
        headers.insert(TRANSFER_ENCODING, "chunked".parse().unwrap());
        headers.insert(TE, "trailers".parse().unwrap());
        headers.insert(TRAILER, "AtEnd1".parse().unwrap());
        headers.insert("content-length", "5".parse().unwrap());

        strip_hop_by_hop(&mut headers);
        assert!(headers.get(CONNECTION).is_none());
        assert!(headers.get(TRANSFER_ENCODING).is_none());
        assert!(headers.get(TE).is_none());
        assert_eq!(headers.get(TRAILER).unwrap(), "AtEnd1");
        assert_eq!(headers.get("content-length").unwrap(), "5");
    }

    #[test]
    fn announces_trailers_comma_joined() {
        let mut upstream = HeaderMap::new();
        upstream.append(TRAILER, "AtEnd1, AtEnd2".parse().unwrap());
        upstream.append(TRAILER, "AtEnd3".parse().unwrap());

        let mut dst = HeaderMap::new();
        announce_trailers(&mut dst, &upstream);
        assert_eq!(dst.get(TRAILER).unwrap(), "AtEnd1,AtEnd2,AtEnd3");
    }

    #[test]
    fn removes_announcement_when_none_declared() {
        let upstream = HeaderMap::new();
        let mut dst = HeaderMap::new();
        dst.insert(TRAILER, "stale".parse().unwrap());
        announce_trailers(&mut dst, &upstream);
        assert!(dst.get(TRAILER).is_none());
    }
}
