//! Outbound HTTP request representation.

use bytes::Bytes;

use super::{Headers, Method};

/// An outbound HTTP request as seen by the caching transport.
///
/// The body is a fully-buffered [`Bytes`] value so the request stays `Clone`:
/// revalidation re-issues the original request with validator headers
/// attached, and stale-while-revalidate hands a copy to a background task.
///
/// # Examples
///
/// ```
/// use httpcache::{Method, Request};
///
/// let req = Request::get("http://example.com/resource")
///     .header("Accept-Language", "en, fr");
///
/// assert_eq!(req.method(), &Method::Get);
/// assert_eq!(req.url(), "http://example.com/resource");
/// assert_eq!(req.headers().get("accept-language"), Some("en, fr"));
/// ```
#[derive(Debug, Clone)]
pub struct Request {
    method: Method,
    url: String,
    headers: Headers,
    body: Bytes,
}

impl Request {
    /// Creates a request with the given method and absolute URL.
    pub fn new(method: Method, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Headers::new(),
            body: Bytes::new(),
        }
    }

    /// Shorthand for a GET request.
    pub fn get(url: impl Into<String>) -> Self {
        Self::new(Method::Get, url)
    }

    /// Appends a request header. Multiple calls with the same name are additive.
    #[must_use]
    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name, value);
        self
    }

    /// Sets the request body.
    #[must_use]
    pub fn body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = body.into();
        self
    }

    /// Returns the HTTP method.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Returns the absolute request URL.
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Returns the request headers.
    pub fn headers(&self) -> &Headers {
        &self.headers
    }

    /// Returns the request headers for in-place modification.
    pub fn headers_mut(&mut self) -> &mut Headers {
        &mut self.headers
    }

    /// Returns the request body bytes.
    pub fn body_bytes(&self) -> &Bytes {
        &self.body
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder() {
        let req = Request::new(Method::Post, "http://example.com/submit")
            .header("Content-Type", "application/json")
            .body(&b"{}"[..]);
        assert_eq!(req.method(), &Method::Post);
        assert_eq!(req.headers().get("content-type"), Some("application/json"));
        assert_eq!(req.body_bytes().as_ref(), b"{}");
    }

    #[test]
    fn clone_is_independent() {
        let req = Request::get("http://example.com/a").header("Accept", "text/html");
        let mut copy = req.clone();
        copy.headers_mut().set("If-None-Match", "\"v1\"");
        assert!(req.headers().get("If-None-Match").is_none());
        assert_eq!(copy.headers().get("accept"), Some("text/html"));
    }
}
