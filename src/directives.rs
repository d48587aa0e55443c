//! Typed views over `Cache-Control` directives.
//!
//! The engine never inspects raw `Cache-Control` strings; it consumes the
//! parsed [`RequestDirectives`] and [`ResponseDirectives`] accessors. Parse
//! failures are surfaced as [`DirectiveError`] so callers can degrade to the
//! all-false default set with a logged diagnostic; a malformed header must
//! never fail a request.

use std::time::Duration;

use thiserror::Error;

use crate::http::Headers;

/// Errors that can occur while parsing `Cache-Control` directives.
#[derive(Debug, Error)]
pub enum DirectiveError {
    #[error("invalid value for {directive} directive: {value:?}")]
    InvalidValue { directive: String, value: String },
}

/// Parsed request-side `Cache-Control` directives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequestDirectives {
    /// `no-store`: the response to this request must not be stored.
    pub no_store: bool,
    /// `no-cache`: a stored response must be revalidated before use.
    pub no_cache: bool,
}

/// Parsed response-side `Cache-Control` directives.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResponseDirectives {
    /// `no-store`: the response must not be stored.
    pub no_store: bool,
    /// `no-cache`: the stored response must be revalidated before each reuse.
    pub no_cache: bool,
    /// `private`: only a private (single-client) cache may store the response.
    pub private: bool,
    /// `public`: any cache may store the response.
    pub public: bool,
    /// `must-revalidate`: once stale, the response must not be served without
    /// successful revalidation.
    pub must_revalidate: bool,
    /// `must-understand`: cache only if the status code is understood
    /// (RFC 9111 §5.2.2.3).
    pub must_understand: bool,
    /// `max-age=N`: freshness lifetime.
    pub max_age: Option<Duration>,
    /// `s-maxage=N`: freshness lifetime for shared caches; overrides `max-age`.
    pub s_maxage: Option<Duration>,
    /// `stale-while-revalidate=N`: window during which a stale response may be
    /// served while being refreshed in the background.
    pub stale_while_revalidate: Option<Duration>,
}

/// Parses the request's `Cache-Control` header(s) into typed directives.
///
/// Unknown directives are ignored per RFC 9111 §5.2.3.
pub fn parse_request_directives(headers: &Headers) -> Result<RequestDirectives, DirectiveError> {
    let mut directives = RequestDirectives::default();
    for token in headers.comma_values("Cache-Control") {
        let (name, _) = split_directive(&token);
        match name.as_str() {
            "no-store" => directives.no_store = true,
            "no-cache" => directives.no_cache = true,
            _ => {}
        }
    }
    Ok(directives)
}

/// Parses the response's `Cache-Control` header(s) into typed directives.
///
/// # Errors
///
/// Returns [`DirectiveError::InvalidValue`] when a duration-valued directive
/// carries a non-numeric argument.
pub fn parse_response_directives(headers: &Headers) -> Result<ResponseDirectives, DirectiveError> {
    let mut directives = ResponseDirectives::default();
    for token in headers.comma_values("Cache-Control") {
        let (name, value) = split_directive(&token);
        match name.as_str() {
            "no-store" => directives.no_store = true,
            "no-cache" => directives.no_cache = true,
            "private" => directives.private = true,
            "public" => directives.public = true,
            "must-revalidate" => directives.must_revalidate = true,
            "must-understand" => directives.must_understand = true,
            "max-age" => directives.max_age = Some(parse_seconds(&name, value)?),
            "s-maxage" => directives.s_maxage = Some(parse_seconds(&name, value)?),
            "stale-while-revalidate" => {
                directives.stale_while_revalidate = Some(parse_seconds(&name, value)?);
            }
            _ => {}
        }
    }
    Ok(directives)
}

/// Splits a directive token into its lowercased name and optional argument.
fn split_directive(token: &str) -> (String, Option<&str>) {
    match token.split_once('=') {
        Some((name, value)) => (
            name.trim().to_ascii_lowercase(),
            Some(value.trim().trim_matches('"')),
        ),
        None => (token.trim().to_ascii_lowercase(), None),
    }
}

fn parse_seconds(directive: &str, value: Option<&str>) -> Result<Duration, DirectiveError> {
    let raw = value.unwrap_or("");
    raw.parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| DirectiveError::InvalidValue {
            directive: directive.to_owned(),
            value: raw.to_owned(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response_headers(value: &str) -> Headers {
        let mut h = Headers::new();
        h.insert("Cache-Control", value);
        h
    }

    #[test]
    fn request_directives() {
        let mut h = Headers::new();
        h.insert("Cache-Control", "no-store, no-cache");
        let d = parse_request_directives(&h).unwrap();
        assert!(d.no_store);
        assert!(d.no_cache);
    }

    #[test]
    fn request_directives_absent_header() {
        let d = parse_request_directives(&Headers::new()).unwrap();
        assert_eq!(d, RequestDirectives::default());
    }

    #[test]
    fn response_boolean_directives() {
        let d = parse_response_directives(&response_headers(
            "private, public, must-revalidate, must-understand, no-store",
        ))
        .unwrap();
        assert!(d.private);
        assert!(d.public);
        assert!(d.must_revalidate);
        assert!(d.must_understand);
        assert!(d.no_store);
        assert!(!d.no_cache);
    }

    #[test]
    fn response_duration_directives() {
        let d = parse_response_directives(&response_headers(
            "max-age=60, s-maxage=120, stale-while-revalidate=30",
        ))
        .unwrap();
        assert_eq!(d.max_age, Some(Duration::from_secs(60)));
        assert_eq!(d.s_maxage, Some(Duration::from_secs(120)));
        assert_eq!(d.stale_while_revalidate, Some(Duration::from_secs(30)));
    }

    #[test]
    fn directive_names_are_case_insensitive() {
        let d = parse_response_directives(&response_headers("No-Store, MAX-AGE=5")).unwrap();
        assert!(d.no_store);
        assert_eq!(d.max_age, Some(Duration::from_secs(5)));
    }

    #[test]
    fn quoted_argument_accepted() {
        let d = parse_response_directives(&response_headers("max-age=\"90\"")).unwrap();
        assert_eq!(d.max_age, Some(Duration::from_secs(90)));
    }

    #[test]
    fn multiple_header_lines_merge() {
        let mut h = Headers::new();
        h.insert("Cache-Control", "public");
        h.insert("Cache-Control", "max-age=10");
        let d = parse_response_directives(&h).unwrap();
        assert!(d.public);
        assert_eq!(d.max_age, Some(Duration::from_secs(10)));
    }

    #[test]
    fn unknown_directives_ignored() {
        let d = parse_response_directives(&response_headers("immutable, x-extension=1")).unwrap();
        assert_eq!(d, ResponseDirectives::default());
    }

    #[test]
    fn malformed_duration_is_an_error() {
        let err = parse_response_directives(&response_headers("max-age=soon")).unwrap_err();
        assert!(err.to_string().contains("max-age"));
    }
}
