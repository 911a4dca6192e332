//! Reversible serialization of a cached response.
//!
//! Entries are stored as an HTTP/1.1-style dump: status line, header block,
//! then the body in chunked framing with the trailer block after the final
//! chunk, exactly as the wire format orders them. Chunked framing delimits
//! arbitrary body bytes without inventing a `Content-Length` the original
//! response did not carry, so `deserialize(serialize(r))` reproduces the
//! status, header set, trailer set, and body bytes exactly.

use axum::http::{HeaderMap, HeaderName, HeaderValue, StatusCode};
use bytes::{BufMut, Bytes, BytesMut};
use thiserror::Error;

/// A response captured for replay.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub trailers: HeaderMap,
    pub body: Bytes,
}

/// Failure decoding a stored blob.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("blob ends mid-structure")]
    Truncated,
    #[error("malformed status line")]
    StatusLine,
    #[error("status code out of range")]
    Status,
    #[error("malformed header line")]
    Header,
    #[error("malformed chunk size")]
    ChunkSize,
}

/// Serialize a response into an opaque blob.
pub fn serialize(response: &CachedResponse) -> Bytes {
    let mut out = BytesMut::with_capacity(response.body.len() + 256);

    out.put_slice(b"HTTP/1.1 ");
    out.put_slice(response.status.as_str().as_bytes());
    out.put_slice(b" ");
    out.put_slice(
        response
            .status
            .canonical_reason()
            .unwrap_or("Unknown")
            .as_bytes(),
    );
    out.put_slice(b"\r\n");

    write_header_block(&mut out, &response.headers);
    out.put_slice(b"\r\n");

    if !response.body.is_empty() {
        out.put_slice(format!("{:x}\r\n", response.body.len()).as_bytes());
        out.put_slice(&response.body);
        out.put_slice(b"\r\n");
    }
    out.put_slice(b"0\r\n");
    write_header_block(&mut out, &response.trailers);
    out.put_slice(b"\r\n");

    out.freeze()
}

/// Reconstruct a response from a stored blob.
pub fn deserialize(blob: &[u8]) -> Result<CachedResponse, CodecError> {
    let mut pos = 0;

    let status_line = read_line(blob, &mut pos)?;
    let status = parse_status_line(status_line)?;
    let headers = parse_header_block(blob, &mut pos)?;

    let mut body = BytesMut::new();
    loop {
        let size_line = read_line(blob, &mut pos)?;
        let size = parse_chunk_size(size_line)?;
        if size == 0 {
            break;
        }
        if blob.len() < pos + size + 2 {
            return Err(CodecError::Truncated);
        }
        body.extend_from_slice(&blob[pos..pos + size]);
        if &blob[pos + size..pos + size + 2] != b"\r\n" {
            return Err(CodecError::ChunkSize);
        }
        pos += size + 2;
    }

    let trailers = parse_header_block(blob, &mut pos)?;

    Ok(CachedResponse {
        status,
        headers,
        trailers,
        body: body.freeze(),
    })
}

fn write_header_block(out: &mut BytesMut, headers: &HeaderMap) {
    for (name, value) in headers.iter() {
        out.put_slice(name.as_str().as_bytes());
        out.put_slice(b": ");
        out.put_slice(value.as_bytes());
        out.put_slice(b"\r\n");
    }
}

/// Read one CRLF-terminated line, advancing `pos` past the terminator.
fn read_line<'a>(blob: &'a [u8], pos: &mut usize) -> Result<&'a [u8], CodecError> {
    let rest = blob.get(*pos..).ok_or(CodecError::Truncated)?;
    let end = rest
        .windows(2)
        .position(|w| w == b"\r\n")
        .ok_or(CodecError::Truncated)?;
    let line = &rest[..end];
    *pos += end + 2;
    Ok(line)
}

fn parse_status_line(line: &[u8]) -> Result<StatusCode, CodecError> {
    let rest = line
        .strip_prefix(b"HTTP/1.1 " as &[u8])
        .ok_or(CodecError::StatusLine)?;
    let code = rest.get(..3).ok_or(CodecError::StatusLine)?;
    let code: u16 = std::str::from_utf8(code)
        .map_err(|_| CodecError::StatusLine)?
        .parse()
        .map_err(|_| CodecError::StatusLine)?;
    StatusCode::from_u16(code).map_err(|_| CodecError::Status)
}

/// Parse header lines up to and including the blank terminator line.
fn parse_header_block(blob: &[u8], pos: &mut usize) -> Result<HeaderMap, CodecError> {
    let mut headers = HeaderMap::new();
    loop {
        let line = read_line(blob, pos)?;
        if line.is_empty() {
            return Ok(headers);
        }
        let colon = line
            .iter()
            .position(|&b| b == b':')
            .ok_or(CodecError::Header)?;
        let name =
            HeaderName::from_bytes(&line[..colon]).map_err(|_| CodecError::Header)?;
        let mut value = &line[colon + 1..];
        if value.first() == Some(&b' ') {
            value = &value[1..];
        }
        let value = HeaderValue::from_bytes(value).map_err(|_| CodecError::Header)?;
        headers.append(name, value);
    }
}

fn parse_chunk_size(line: &[u8]) -> Result<usize, CodecError> {
    let text = std::str::from_utf8(line).map_err(|_| CodecError::ChunkSize)?;
    usize::from_str_radix(text, 16).map_err(|_| CodecError::ChunkSize)
}
