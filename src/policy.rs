//! Storage and freshness policy decisions.
//!
//! [`can_store`] implements the RFC 9111 §3 store-ability rules, including the
//! §5.2.2.3 `must-understand` override and the §3.5 authenticated-request
//! rules for shared caches. [`freshness`] computes whether a stored
//! representation may still be served without contacting the origin
//! (RFC 9111 §4.2).

use std::time::Duration;

use chrono::{DateTime, FixedOffset, Utc};

use crate::directives::{RequestDirectives, ResponseDirectives};
use crate::http::{Headers, Request, StatusCode};

/// Status codes this cache understands (RFC 9111 §5.2.2.3). When the
/// `must-understand` directive is present, only responses with these codes may
/// be stored, even when other directives would permit storage.
const UNDERSTOOD_STATUS_CODES: [u16; 11] = [200, 203, 204, 206, 300, 301, 404, 405, 410, 414, 501];

/// Returns `true` if the cache understands the semantics of the status code.
pub(crate) fn status_understood(status: StatusCode) -> bool {
    UNDERSTOOD_STATUS_CODES.contains(&status.as_u16())
}

/// Decides whether a response may be stored, given the parsed directives of
/// both sides and the cache's operating mode.
///
/// Decision order (first matching rule wins):
///
/// 1. `must-understand` present: store only if the status code is understood.
///    An understood status under `must-understand` overrides `no-store`.
/// 2. Otherwise reject on response or request `no-store`.
/// 3. Shared mode + request `Authorization`: reject unless the response
///    carries `public`, `must-revalidate`, or `s-maxage`.
/// 4. Shared mode + response `private`: reject.
/// 5. Otherwise allow.
pub(crate) fn can_store(
    status: StatusCode,
    req: &Request,
    request_directives: &RequestDirectives,
    response_directives: &ResponseDirectives,
    shared: bool,
) -> bool {
    if response_directives.must_understand {
        if !status_understood(status) {
            return false;
        }
        // Understood status: proceed, and no-store is overridden.
    } else if response_directives.no_store || request_directives.no_store {
        return false;
    }

    // RFC 9111 §3.5: a shared cache must not store a response to a request
    // with Authorization unless explicitly permitted by the response.
    if shared && req.headers().get("Authorization").is_some_and(|v| !v.is_empty()) {
        let permitted = response_directives.public
            || response_directives.must_revalidate
            || response_directives.s_maxage.is_some();
        if !permitted {
            tracing::debug!(
                url = req.url(),
                "refusing to store Authorization request in shared cache"
            );
            return false;
        }
    }

    if shared && response_directives.private {
        return false;
    }

    true
}

/// Whether a stored representation may be served without revalidation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Freshness {
    /// Within its freshness lifetime.
    Fresh,
    /// Past its lifetime by the contained amount. `Duration::MAX` means the
    /// lifetime could not be established at all (missing `Date`, `no-cache`),
    /// which also disqualifies stale-while-revalidate serving.
    Stale(Duration),
}

/// Evaluates the freshness of a stored response at the current instant.
pub(crate) fn freshness(
    headers: &Headers,
    directives: &ResponseDirectives,
    shared: bool,
) -> Freshness {
    freshness_at(headers, directives, shared, Utc::now())
}

fn freshness_at(
    headers: &Headers,
    directives: &ResponseDirectives,
    shared: bool,
    now: DateTime<Utc>,
) -> Freshness {
    // no-cache forbids reuse without revalidation regardless of age.
    if directives.no_cache {
        return Freshness::Stale(Duration::MAX);
    }

    let Some(date) = headers.get("Date").and_then(parse_http_date) else {
        return Freshness::Stale(Duration::MAX);
    };

    let apparent_age = (now - date.with_timezone(&Utc))
        .to_std()
        .unwrap_or(Duration::ZERO);
    let age_header = headers
        .get("Age")
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(Duration::ZERO);
    let age = apparent_age.saturating_add(age_header);

    let lifetime = freshness_lifetime(headers, directives, shared, date);

    if age < lifetime {
        Freshness::Fresh
    } else {
        Freshness::Stale(age - lifetime)
    }
}

/// Freshness lifetime per RFC 9111 §4.2.1: `s-maxage` (shared caches only),
/// then `max-age`, then `Expires − Date`. No heuristic freshness; a response
/// without explicit lifetime information is immediately stale.
fn freshness_lifetime(
    headers: &Headers,
    directives: &ResponseDirectives,
    shared: bool,
    date: DateTime<FixedOffset>,
) -> Duration {
    if shared {
        if let Some(s_maxage) = directives.s_maxage {
            return s_maxage;
        }
    }
    if let Some(max_age) = directives.max_age {
        return max_age;
    }
    if let Some(expires) = headers.get("Expires").and_then(parse_http_date) {
        return (expires - date).to_std().unwrap_or(Duration::ZERO);
    }
    Duration::ZERO
}

/// Parses an HTTP date (RFC 9110 §5.6.7 preferred format, e.g.
/// `Sun, 06 Nov 1994 08:49:37 GMT`).
pub(crate) fn parse_http_date(value: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc2822(value.trim()).ok()
}

/// Formats an instant as an HTTP date.
#[cfg(test)]
pub(crate) fn format_http_date(value: DateTime<Utc>) -> String {
    value.to_rfc2822()
}
