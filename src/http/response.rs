//! HTTP response representation and wire-format codec.
//!
//! Stored representations are the full HTTP/1.1 wire dump of a response:
//! status line, headers verbatim, blank line, body bytes. [`Response::parse`]
//! reads a dump back using the [`httparse`] crate; [`dump`] produces one from
//! a fully-buffered body.

use bytes::Bytes;
use thiserror::Error;

use super::{Body, Headers, StatusCode};

/// Errors that can occur while parsing a stored HTTP/1.1 response.
#[derive(Debug, Error)]
pub enum ResponseError {
    #[error("response is incomplete; header terminator not found")]
    Incomplete,

    #[error("HTTP parse error: {0}")]
    Parse(#[from] httparse::Error),

    #[error("missing status code in response line")]
    MissingStatus,
}

/// An HTTP response flowing through the caching transport.
///
/// The body is a stream ([`Body`]); responses reconstructed from the cache
/// carry an in-memory buffer, responses from a live origin carry whatever the
/// underlying transport produced.
#[derive(Debug)]
pub struct Response {
    status: StatusCode,
    headers: Headers,
    body: Body,
}

impl Response {
    /// Maximum number of headers supported per stored response.
    const MAX_HEADERS: usize = 64;

    /// Creates a response with the given status and an empty body.
    pub fn new(status: StatusCode) -> Self {
        Self {
            status,
            headers: Headers::new(),
            body: Body::empty(),
        }
    }

    /// Appends a response header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the response body.
    #[must_use]
    pub fn body(mut self, body: Body) -> Self {
        self.body = body;
        self
    }

    /// Returns the status code.
    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Returns the response headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the response headers for in-place modification.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Returns the response body for reading.
    pub fn body_mut(&mut self) -> &mut Body {
        &mut self.body
    }

    /// Takes the body out of the response, leaving an empty one behind.
    pub fn take_body(&mut self) -> Body {
        std::mem::take(&mut self.body)
    }

    /// Replaces the response body.
    pub fn set_body(&mut self, body: Body) {
        self.body = body;
    }

    /// Parses a stored wire-format dump back into a response.
    ///
    /// Everything after the header terminator is taken as the body, regardless
    /// of framing headers; a dump always contains the complete body.
    ///
    /// # Errors
    ///
    /// - [`ResponseError::Incomplete`]: the dump is truncated before the end
    ///   of the header block.
    /// - [`ResponseError::Parse`]: the data is malformed.
    /// - [`ResponseError::MissingStatus`]: no status code on the status line.
    pub fn parse(data: &[u8]) -> Result<Self, ResponseError> {
        let mut headers = [httparse::EMPTY_HEADER; Self::MAX_HEADERS];
        let mut raw = httparse::Response::new(&mut headers);

        let body_offset = match raw.parse(data)? {
            httparse::Status::Complete(offset) => offset,
            httparse::Status::Partial => return Err(ResponseError::Incomplete),
        };

        let status = StatusCode::new(raw.code.ok_or(ResponseError::MissingStatus)?);

        let mut header_map = Headers::with_capacity(raw.headers.len());
        for header in raw.headers.iter() {
            if let Ok(value) = std::str::from_utf8(header.value) {
                header_map.insert(header.name, value);
            }
        }

        let body = Bytes::copy_from_slice(&data[body_offset..]);

        Ok(Self {
            status,
            headers: header_map,
            body: Body::from_bytes(body),
        })
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new(StatusCode::OK)
    }
}

/// Serializes a response into HTTP/1.1 wire format with the given body bytes.
///
/// Headers are written verbatim in insertion order so that storing the same
/// response twice produces byte-identical dumps.
pub(crate) fn dump(status: StatusCode, headers: &Headers, body: &[u8]) -> Vec<u8> {
    let estimated = 64 + headers.len() * 48 + body.len();
    let mut out = Vec::with_capacity(estimated);

    out.extend_from_slice(
        format!("HTTP/1.1 {} {}\r\n", status.as_u16(), status.canonical_reason()).as_bytes(),
    );
    out.extend_from_slice(headers.to_string().as_bytes());
    out.extend_from_slice(b"\r\n");
    out.extend_from_slice(body);
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_simple_response() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\nEtag: \"v1\"\r\n\r\nhello";
        let mut rep = Response::parse(raw).unwrap();
        assert_eq!(rep.status(), StatusCode::OK);
        assert_eq!(rep.headers().get("content-type"), Some("text/plain"));
        assert_eq!(rep.headers().get("etag"), Some("\"v1\""));

        let body = futures_block(rep.body_mut().bytes()).unwrap();
        assert_eq!(body.as_ref(), b"hello");
    }

    #[test]
    fn parse_incomplete() {
        let raw = b"HTTP/1.1 200 OK\r\nContent-Type:";
        assert!(matches!(
            Response::parse(raw),
            Err(ResponseError::Incomplete)
        ));
    }

    #[test]
    fn dump_then_parse_round_trip() {
        let mut headers = Headers::new();
        headers.insert("Cache-Control", "max-age=60");
        headers.insert("Vary", "Accept-Language");
        let data = dump(StatusCode::OK, &headers, b"body bytes");

        let mut rep = Response::parse(&data).unwrap();
        assert_eq!(rep.status(), StatusCode::OK);
        assert_eq!(rep.headers().get("cache-control"), Some("max-age=60"));
        assert_eq!(rep.headers().get("vary"), Some("Accept-Language"));
        let body = futures_block(rep.body_mut().bytes()).unwrap();
        assert_eq!(body.as_ref(), b"body bytes");
    }

    #[test]
    fn dump_is_deterministic() {
        let mut headers = Headers::new();
        headers.insert("Date", "Mon, 24 Aug 2026 00:00:00 GMT");
        let a = dump(StatusCode::NOT_FOUND, &headers, b"nope");
        let b = dump(StatusCode::NOT_FOUND, &headers, b"nope");
        assert_eq!(a, b);
    }

    #[test]
    fn dump_unregistered_status() {
        let data = dump(StatusCode::new(799), &Headers::new(), b"");
        assert!(data.starts_with(b"HTTP/1.1 799 "));
        assert_eq!(Response::parse(&data).unwrap().status().as_u16(), 799);
    }

    // Minimal block_on for the non-async tests above; the in-memory bodies
    // here never return Pending.
    fn futures_block<F: Future>(fut: F) -> F::Output {
        tokio::runtime::Builder::new_current_thread()
            .build()
            .unwrap()
            .block_on(fut)
    }
}
