//! Cache key derivation.

use axum::http::{HeaderMap, HeaderName, Uri};
use sha1::{Digest, Sha1};

/// Injected per-request by the request-id layer; unique every time, so it
/// must not participate in the digest.
const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Deterministic fingerprint for a cacheable request.
///
/// SHA-1 over the canonical URI string followed by the full header block in
/// header-map iteration order. Two requests with identical URL and header
/// bytes collide to the same entry by design; the method is not hashed
/// (cacheability is decided separately). Hashing in-memory bytes cannot
/// fail, so this is a total function.
pub fn fingerprint(uri: &Uri, headers: &HeaderMap) -> String {
    let mut hasher = Sha1::new();
    hasher.update(uri.to_string().as_bytes());
    for (name, value) in headers.iter() {
        if *name == X_REQUEST_ID {
            continue;
        }
        hasher.update(name.as_str().as_bytes());
        hasher.update(b": ");
        hasher.update(value.as_bytes());
        hasher.update(b"\r\n");
    }
    hex::encode(hasher.finalize())
}
