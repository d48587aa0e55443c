//! Cache key derivation and header-value normalization.
//!
//! Every stored representation is addressed by a deterministic string key
//! derived from the request. Three layers exist:
//!
//! - [`cache_key`]: method + URL only. GET keys are the bare URL so that
//!   entries can be probed by address; other methods are prefixed.
//! - [`cache_key_with_headers`]: operator-chosen request headers folded into
//!   the key, partitioning the cache (e.g. per `Authorization` value).
//! - [`cache_key_with_vary`]: the Vary-listed request headers folded in,
//!   separating origin-declared variants (RFC 9111 §4.1).
//!
//! Header values are normalized first so that spacing differences do not
//! produce distinct keys.

use crate::http::headers::canonicalize;
use crate::http::{Method, Request};

/// Normalizes a header value for key derivation and Vary matching.
///
/// Trims leading/trailing whitespace, collapses any run of space, tab, CR, or
/// LF into a single space, then tightens `", "` to `","` so comma-separated
/// lists compare equal regardless of spacing. Pure and total.
///
/// # Examples
///
/// ```
/// use httpcache::key::normalize;
///
/// assert_eq!(normalize("  Hello   World  "), "Hello World");
/// assert_eq!(normalize("en-US, fr"), "en-US,fr");
/// ```
pub fn normalize(value: &str) -> String {
    let mut norm = String::with_capacity(value.len());
    let mut prev_space = false;

    for c in value.trim().chars() {
        if c == ' ' || c == '\t' || c == '\n' || c == '\r' {
            if !prev_space {
                norm.push(' ');
                prev_space = true;
            }
        } else {
            norm.push(c);
            prev_space = false;
        }
    }

    norm.replace(", ", ",")
}

/// Returns the base cache key for a request: the URL alone for GET, otherwise
/// `"<METHOD> <url>"`.
pub fn cache_key(req: &Request) -> String {
    if req.method() == &Method::Get {
        req.url().to_owned()
    } else {
        format!("{} {}", req.method(), req.url())
    }
}

/// Returns the cache key for a request with the named request headers folded
/// in.
///
/// Each configured header that is present with a non-empty normalized value
/// contributes a `"Name:value"` part (canonical name); parts are sorted so the
/// key is independent of configuration order, then appended as
/// `"|part|part..."`. Headers that are absent or empty after normalization are
/// omitted; header augmentation is an operator partitioning feature where
/// absence carries no signal.
pub fn cache_key_with_headers(req: &Request, headers: &[String]) -> String {
    let key = cache_key(req);
    if headers.is_empty() {
        return key;
    }

    let mut parts: Vec<String> = Vec::with_capacity(headers.len());
    for header in headers {
        let canonical = canonicalize(header);
        let value = normalize(req.headers().get(&canonical).unwrap_or(""));
        if !value.is_empty() {
            parts.push(format!("{canonical}:{value}"));
        }
    }

    if parts.is_empty() {
        return key;
    }

    parts.sort();
    format!("{key}|{}", parts.join("|"))
}

/// Returns the cache key for a request with the Vary-listed headers folded in.
///
/// Unlike [`cache_key_with_headers`], a Vary-listed header that is absent from
/// the request still contributes a `"Name:"` part with an empty value: the
/// origin declared the header significant, so "absent" and "present with value
/// X" must select different variants. Wildcard (`*`) and empty names are
/// skipped. Parts are sorted and appended as `"|vary:part|part..."`.
pub fn cache_key_with_vary(req: &Request, vary_headers: &[String]) -> String {
    let key = cache_key(req);
    if vary_headers.is_empty() {
        return key;
    }

    let mut parts: Vec<String> = Vec::with_capacity(vary_headers.len());
    for header in vary_headers {
        let canonical = canonicalize(header);
        if canonical.is_empty() || canonical == "*" {
            continue;
        }
        let value = normalize(req.headers().get(&canonical).unwrap_or(""));
        parts.push(format!("{canonical}:{value}"));
    }

    if parts.is_empty() {
        return key;
    }

    parts.sort();
    format!("{key}|vary:{}", parts.join("|"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn normalize_table() {
        let cases = [
            ("  Hello   World  ", "Hello World"),
            ("Line1\nLine2\r\nLine3", "Line1 Line2 Line3"),
            ("Value1, Value2,Value3", "Value1,Value2,Value3"),
            ("\tTabbed\tText\t", "Tabbed Text"),
            (" Value1,\tValue2,\t\t\tValue3", "Value1,Value2,Value3"),
            ("Single Value", "Single Value"),
            ("", ""),
        ];
        for (input, expected) in cases {
            assert_eq!(normalize(input), expected, "input: {input:?}");
        }
    }

    #[test]
    fn base_key_get_is_bare_url() {
        let req = Request::get("http://example.com/resource");
        assert_eq!(cache_key(&req), "http://example.com/resource");
    }

    #[test]
    fn base_key_non_get_is_prefixed() {
        let req = Request::new(Method::Post, "http://example.com/resource");
        assert_eq!(cache_key(&req), "POST http://example.com/resource");

        let req = Request::new(Method::Put, "https://example.com/resource?id=123");
        assert_eq!(cache_key(&req), "PUT https://example.com/resource?id=123");
    }

    #[test]
    fn base_key_ignores_headers_and_body() {
        let a = Request::get("http://example.com/r").header("Accept", "text/html");
        let b = Request::get("http://example.com/r").body(&b"payload"[..]);
        assert_eq!(cache_key(&a), cache_key(&b));
    }

    #[test]
    fn header_key_empty_list_is_base_key() {
        let req = Request::get("http://example.com/resource").header("Accept", "text/html");
        assert_eq!(
            cache_key_with_headers(&req, &[]),
            "http://example.com/resource"
        );
    }

    #[test]
    fn header_key_normalizes_and_sorts() {
        let req = Request::get("http://example.com/resource")
            .header("Accept", "   application/json  ")
            .header("Accept-Language", "en-US, fr");
        assert_eq!(
            cache_key_with_headers(&req, &strings(&["Accept", "Accept-Language"])),
            "http://example.com/resource|Accept-Language:en-US,fr|Accept:application/json"
        );
    }

    #[test]
    fn header_key_is_order_independent() {
        let req = Request::get("http://example.com/resource")
            .header("Accept", "text/html")
            .header("Accept-Language", "en");
        let forward = cache_key_with_headers(&req, &strings(&["Accept", "Accept-Language"]));
        let reverse = cache_key_with_headers(&req, &strings(&["Accept-Language", "Accept"]));
        assert_eq!(forward, reverse);
    }

    #[test]
    fn header_key_omits_missing_headers() {
        let req = Request::get("http://example.com/resource").header("Accept-Language", "en,fr");
        assert_eq!(
            cache_key_with_headers(
                &req,
                &strings(&["Accept", "Accept-Language", "Authorization"])
            ),
            "http://example.com/resource|Accept-Language:en,fr"
        );
    }

    #[test]
    fn header_key_canonicalizes_names() {
        let req = Request::get("http://example.com/resource").header("accept-language", "en,fr");
        assert_eq!(
            cache_key_with_headers(&req, &strings(&["accept-language"])),
            "http://example.com/resource|Accept-Language:en,fr"
        );
    }

    #[test]
    fn vary_key_empty_list_is_base_key() {
        let req = Request::get("http://example.com/resource").header("Accept", "text/html");
        assert_eq!(
            cache_key_with_vary(&req, &[]),
            "http://example.com/resource"
        );
    }

    #[test]
    fn vary_key_normalizes_and_sorts() {
        let req = Request::get("http://example.com/resource")
            .header("Accept", "   text/html  ")
            .header("Accept-Language", "en-US, fr");
        assert_eq!(
            cache_key_with_vary(&req, &strings(&["Accept", "Accept-Language"])),
            "http://example.com/resource|vary:Accept-Language:en-US,fr|Accept:text/html"
        );
    }

    #[test]
    fn vary_key_keeps_missing_headers_as_empty() {
        let req = Request::get("http://example.com/resource").header("Accept-Language", "en,fr");
        assert_eq!(
            cache_key_with_vary(
                &req,
                &strings(&["Accept", "Accept-Language", "Authorization"])
            ),
            "http://example.com/resource|vary:Accept-Language:en,fr|Accept:|Authorization:"
        );
    }

    #[test]
    fn vary_key_distinguishes_absent_from_empty_elsewhere() {
        // An absent header and a header that is empty after normalization both
        // key as "Name:", but they differ from a header with a value.
        let absent = Request::get("http://example.com/r");
        let with_value = Request::get("http://example.com/r").header("Accept-Language", "de");
        let vary = strings(&["Accept-Language"]);
        assert_ne!(
            cache_key_with_vary(&absent, &vary),
            cache_key_with_vary(&with_value, &vary)
        );
    }

    #[test]
    fn vary_key_skips_wildcard_and_empty_names() {
        let req = Request::get("http://example.com/resource")
            .header("Accept", "text/html")
            .header("Accept-Language", "en,fr");
        assert_eq!(
            cache_key_with_vary(&req, &strings(&["*", "Accept", "Accept-Language"])),
            "http://example.com/resource|vary:Accept-Language:en,fr|Accept:text/html"
        );
        assert_eq!(
            cache_key_with_vary(&req, &strings(&["", "Accept", "Accept-Language"])),
            "http://example.com/resource|vary:Accept-Language:en,fr|Accept:text/html"
        );
    }

    #[test]
    fn vary_key_canonicalizes_names() {
        let req = Request::get("http://example.com/resource").header("accept-language", "en,fr");
        assert_eq!(
            cache_key_with_vary(&req, &strings(&["accept-language"])),
            "http://example.com/resource|vary:Accept-Language:en,fr"
        );
    }
}
