//! The caching transport: an RFC 9111 request/response state machine.
//!
//! [`CachingTransport`] wraps an inner [`Transport`] and answers requests from
//! a [`Cache`](crate::store::Cache) where possible. For each request it walks
//! the states lookup → (fresh | stale | miss) → (serve | revalidate |
//! forward) → invalidate → store:
//!
//! - fresh stored responses are served without touching the origin;
//! - stale entries are revalidated with `If-None-Match` / `If-Modified-Since`
//!   validators so the origin can answer `304 Not Modified`;
//! - responses that declare `stale-while-revalidate` are served stale at once
//!   while a detached task refreshes the entry;
//! - successful unsafe methods invalidate the stored entries for their target;
//! - storable responses are written back, with Vary variants kept under
//!   separate keys.
//!
//! The cache is an optimization, never a correctness dependency: every store
//! or parse failure degrades to "behave as if uncached".

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::directives::{
    RequestDirectives, ResponseDirectives, parse_request_directives, parse_response_directives,
};
use crate::http::body::CapturingReader;
use crate::http::headers::canonicalize;
use crate::http::{Body, Headers, Method, Request, Response, StatusCode, response};
use crate::key::{cache_key, cache_key_with_headers, cache_key_with_vary, normalize};
use crate::policy::{Freshness, can_store, freshness, status_understood};
use crate::store::Cache;

/// Marker header present on responses that were served from the cache, when
/// [`CachingTransport::mark_cached_responses`] is enabled.
pub const FROM_CACHE_HEADER: &str = "X-From-Cache";

/// Prefix of the synthetic headers recording, per Vary-listed request header,
/// the normalized value the request held when the representation was stored.
pub const VARIED_PREFIX: &str = "X-Varied-";

/// Headers describing the stored body itself; a `304 Not Modified` carries
/// metadata about the unchanged representation, so these must not be copied
/// over the stored entry during a merge.
const MERGE_SKIPPED_HEADERS: [&str; 5] = [
    "Content-Length",
    "Content-Encoding",
    "Content-Range",
    "Content-Type",
    "Transfer-Encoding",
];

/// A type-erased error produced by an underlying transport.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors produced by the caching transport.
#[derive(Debug, Error)]
pub enum Error {
    #[error("forwarding request failed: {0}")]
    Forward(#[source] BoxError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// The seam to the origin: anything that can execute an HTTP exchange.
///
/// Implemented by the actual network client the caching layer wraps, and by
/// [`CachingTransport`] itself so caching layers compose with other
/// transport decorators.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Executes the request against the origin and returns its response.
    async fn round_trip(&self, req: Request) -> Result<Response, BoxError>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for Arc<T> {
    async fn round_trip(&self, req: Request) -> Result<Response, BoxError> {
        (**self).round_trip(req).await
    }
}

/// Operator hook deciding whether a response with a status code outside the
/// understood set may be cached anyway. Cache-Control directives are still
/// respected; this only bypasses the status-code gate.
pub type ShouldCache = Arc<dyn Fn(&Response) -> bool + Send + Sync>;

/// An RFC 9111 caching layer over an inner [`Transport`].
///
/// Construct with [`new`](Self::new), attach a store with
/// [`with_cache`](Self::with_cache), and adjust behavior through the other
/// builder methods. Without a store the transport forwards everything and
/// logs an error on attempted writes.
///
/// Cloning is cheap (shared inner transport, store, and hooks) and is used
/// internally to hand the transport to detached revalidation tasks.
#[derive(Clone)]
pub struct CachingTransport {
    transport: Arc<dyn Transport>,
    cache: Option<Arc<dyn Cache>>,
    mark_cached_responses: bool,
    server_errors_from_cache: bool,
    async_revalidate_timeout: Duration,
    shared_cache: bool,
    disable_vary_separation: bool,
    should_cache: Option<ShouldCache>,
    cache_key_headers: Vec<String>,
}

impl CachingTransport {
    /// Creates a caching transport over `transport` with no store attached.
    ///
    /// Defaults: cached responses are marked, server errors are not served
    /// from the cache, background revalidation is unbounded, private
    /// (non-shared) mode, Vary separation enabled.
    pub fn new(transport: impl Transport + 'static) -> Self {
        Self {
            transport: Arc::new(transport),
            cache: None,
            mark_cached_responses: true,
            server_errors_from_cache: false,
            async_revalidate_timeout: Duration::ZERO,
            shared_cache: false,
            disable_vary_separation: false,
            should_cache: None,
            cache_key_headers: Vec::new(),
        }
    }

    /// Attaches the cache store.
    #[must_use]
    pub fn with_cache(mut self, cache: impl Cache + 'static) -> Self {
        self.cache = Some(Arc::new(cache));
        self
    }

    /// Controls whether responses served from the store carry
    /// [`FROM_CACHE_HEADER`]. Enabled by default.
    #[must_use]
    pub fn mark_cached_responses(mut self, on: bool) -> Self {
        self.mark_cached_responses = on;
        self
    }

    /// When enabled, a 5xx origin response (or an unreachable origin) is
    /// answered from a usable stale entry instead of being propagated.
    #[must_use]
    pub fn server_errors_from_cache(mut self, on: bool) -> Self {
        self.server_errors_from_cache = on;
        self
    }

    /// Bounds background revalidations triggered by `stale-while-revalidate`.
    /// Zero (the default) means unbounded.
    #[must_use]
    pub fn async_revalidate_timeout(mut self, timeout: Duration) -> Self {
        self.async_revalidate_timeout = timeout;
        self
    }

    /// Switches to shared (public) cache mode: responses marked `private` are
    /// not stored, and responses to requests carrying `Authorization` are only
    /// stored when explicitly permitted. Off by default (private cache).
    #[must_use]
    pub fn shared(mut self, on: bool) -> Self {
        self.shared_cache = on;
        self
    }

    /// Disables RFC 9111 Vary separation: variants are no longer stored under
    /// distinct keys and each one overwrites the previous entry. Trades
    /// correctness of variant selection for storage space.
    #[must_use]
    pub fn disable_vary_separation(mut self, on: bool) -> Self {
        self.disable_vary_separation = on;
        self
    }

    /// Installs an operator predicate admitting status codes outside the
    /// understood set into the cache.
    #[must_use]
    pub fn should_cache(mut self, predicate: impl Fn(&Response) -> bool + Send + Sync + 'static) -> Self {
        self.should_cache = Some(Arc::new(predicate));
        self
    }

    /// Adds a request header whose value is folded into the cache key,
    /// partitioning stored entries by that header (e.g. `Authorization` for
    /// per-user caching). May be called repeatedly.
    #[must_use]
    pub fn cache_key_header(mut self, name: impl Into<String>) -> Self {
        self.cache_key_headers.push(name.into());
        self
    }

    /// Executes a request through the cache.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Forward`] when the origin call fails and no usable
    /// stale entry can stand in for it. Cache failures never surface here.
    pub async fn execute(&self, req: Request) -> Result<Response, Error> {
        let mut key = cache_key_with_headers(&req, &self.cache_key_headers);
        let eligible = req.method().is_cache_eligible() && !req.headers().contains("Range");

        let mut cached: Option<Response> = None;
        if eligible {
            cached = self.lookup(&key);

            // RFC 9111 Vary separation: the base entry records which headers
            // select the variant; recompute the key from the current request
            // and prefer an exact variant entry.
            if !self.disable_vary_separation {
                if let Some(entry) = &cached {
                    let vary = entry.headers().comma_values("Vary");
                    if !vary.is_empty() {
                        let vary_key = cache_key_with_vary(&req, &vary);
                        if vary_key != key {
                            if let Some(variant) = self.lookup(&vary_key) {
                                cached = Some(variant);
                                key = vary_key;
                            }
                        }
                    }
                }
                // Never serve a representation written for an incompatible
                // variant.
                if let Some(entry) = &cached {
                    if !variant_matches(entry.headers(), &req) {
                        debug!(%key, "stored entry is a different variant; treating as miss");
                        cached = None;
                    }
                }
            }
        } else {
            // Write-through invalidation: even if the origin call below
            // fails, stale data for this key must no longer be servable.
            self.delete(&key);
        }

        let (mut rep, from_store) = match cached {
            Some(entry) => self.serve_or_revalidate(entry, &req, &key).await?,
            None => (self.forward(req.clone()).await?, false),
        };

        // RFC 9111 §4.4: a successful unsafe method changes origin state, so
        // stored responses for the affected resources are no longer valid.
        if req.method().is_unsafe()
            && (rep.status().is_success() || rep.status().is_redirection())
        {
            self.invalidate(&req, &rep);
        }

        // Responses served unchanged from the store are already persisted;
        // everything that touched the origin goes through the storage step.
        if !from_store {
            self.store_response(&req, &mut rep, &key, eligible).await?;
        }

        if from_store && self.mark_cached_responses {
            rep.headers_mut().set(FROM_CACHE_HEADER, "1");
        }

        Ok(rep)
    }

    /// Decides between serving the stored entry, revalidating it, or letting
    /// the origin response replace it. The returned flag is `true` when the
    /// response body came from the store.
    async fn serve_or_revalidate(
        &self,
        entry: Response,
        req: &Request,
        key: &str,
    ) -> Result<(Response, bool), Error> {
        let reqcc = self.request_directives(req.headers());
        let repcc = self.response_directives(entry.headers());

        let state = if reqcc.no_cache {
            Freshness::Stale(Duration::MAX)
        } else {
            freshness(entry.headers(), &repcc, self.shared_cache)
        };

        let excess = match state {
            Freshness::Fresh => return Ok((entry, true)),
            Freshness::Stale(excess) => excess,
        };

        // must-revalidate forbids serving this entry without a successful
        // revalidation, stale-while-revalidate included.
        let may_serve_stale = !repcc.must_revalidate;

        if may_serve_stale {
            if let Some(window) = repcc.stale_while_revalidate {
                if excess <= window {
                    self.spawn_background_revalidation(req.clone(), key.to_owned());
                    return Ok((entry, true));
                }
            }
        }

        let conditional = conditional_request(req, entry.headers());
        match self.forward(conditional).await {
            Ok(rep) if rep.status() == StatusCode::NOT_MODIFIED => {
                let mut merged = merge_not_modified(entry, &rep);
                self.store_complete(req, &mut merged, key).await?;
                Ok((merged, true))
            }
            Ok(rep)
                if rep.status().is_server_error()
                    && self.server_errors_from_cache
                    && may_serve_stale =>
            {
                debug!(
                    key,
                    status = rep.status().as_u16(),
                    "origin returned a server error; serving stale entry"
                );
                Ok((entry, true))
            }
            Ok(rep) => Ok((rep, false)),
            Err(e) if self.server_errors_from_cache && may_serve_stale => {
                warn!(key, error = %e, "origin unreachable; serving stale entry");
                Ok((entry, true))
            }
            Err(e) => Err(e),
        }
    }

    /// Spawns a detached revalidation for a stale entry that was just served
    /// under its `stale-while-revalidate` allowance. The task is decoupled
    /// from the caller's cancellation scope and bounded only by the configured
    /// async-revalidation timeout; its outcome updates the store and is never
    /// surfaced to any caller.
    fn spawn_background_revalidation(&self, req: Request, key: String) {
        let this = self.clone();
        let timeout = self.async_revalidate_timeout;
        tokio::spawn(async move {
            let task = this.background_revalidate(&req, &key);
            if timeout > Duration::ZERO {
                if tokio::time::timeout(timeout, task).await.is_err() {
                    warn!(%key, ?timeout, "background revalidation timed out");
                }
            } else {
                task.await;
            }
        });
    }

    async fn background_revalidate(&self, req: &Request, key: &str) {
        let Some(entry) = self.lookup(key) else {
            return;
        };
        let conditional = conditional_request(req, entry.headers());
        let result = match self.forward(conditional).await {
            Ok(rep) if rep.status() == StatusCode::NOT_MODIFIED => {
                let mut merged = merge_not_modified(entry, &rep);
                self.store_complete(req, &mut merged, key).await
            }
            Ok(mut rep) => self.store_complete(req, &mut rep, key).await,
            Err(e) => {
                debug!(key, error = %e, "background revalidation failed");
                return;
            }
        };
        if let Err(e) = result {
            warn!(key, error = %e, "failed to update store after background revalidation");
        }
    }

    /// Storage step for a response whose body the caller has yet to read.
    ///
    /// GET responses are written once the caller consumes the body to its end
    /// (via [`CapturingReader`]); HEAD responses carry no body and are written
    /// immediately. Non-storable outcomes actively delete the entry so no
    /// stale data dangles under the key.
    async fn store_response(
        &self,
        req: &Request,
        rep: &mut Response,
        key: &str,
        eligible: bool,
    ) -> Result<(), Error> {
        let Some(keys) = self.storage_plan(req, rep, key, eligible) else {
            self.delete(key);
            return Ok(());
        };

        if req.method() == &Method::Get {
            let status = rep.status();
            let headers = rep.headers().clone();
            let this = self.clone();
            let body = rep.take_body();
            rep.set_body(Body::from_reader(CapturingReader::new(
                body,
                move |bytes| this.store_bytes(status, &headers, &bytes, &keys),
            )));
        } else {
            // HEAD bodies are empty by definition; store right away.
            let body = rep.body_mut().bytes().await?;
            self.store_bytes(rep.status(), rep.headers(), &body, &keys);
            rep.set_body(Body::from_bytes(body));
        }
        Ok(())
    }

    /// Storage step for a response whose body is already fully buffered
    /// (304 merges and background revalidations).
    async fn store_complete(
        &self,
        req: &Request,
        rep: &mut Response,
        key: &str,
    ) -> Result<(), Error> {
        let body = rep.body_mut().bytes().await?;
        match self.storage_plan(req, rep, key, true) {
            Some(keys) => self.store_bytes(rep.status(), rep.headers(), &body, &keys),
            None => self.delete(key),
        }
        rep.set_body(Body::from_bytes(body));
        Ok(())
    }

    /// Evaluates storability of the final response and, when storable,
    /// records the `X-Varied-*` markers and returns the full set of keys to
    /// write: the current key plus the Vary-augmented key when the response
    /// declares Vary headers.
    fn storage_plan(
        &self,
        req: &Request,
        rep: &mut Response,
        key: &str,
        eligible: bool,
    ) -> Option<Vec<String>> {
        let reqcc = self.request_directives(req.headers());
        let repcc = self.response_directives(rep.headers());

        if !eligible || !can_store(rep.status(), req, &reqcc, &repcc, self.shared_cache) {
            return None;
        }

        // Status gate: understood codes cache by default, anything else needs
        // the operator predicate (must-understand already constrained the
        // status inside can_store).
        let mut admit = status_understood(rep.status());
        if !admit {
            if let Some(predicate) = &self.should_cache {
                admit = predicate(rep);
            }
        }
        if !admit {
            return None;
        }

        record_varied_headers(rep.headers_mut(), req);

        let mut keys = vec![key.to_owned()];
        if !self.disable_vary_separation {
            let vary = rep.headers().comma_values("Vary");
            if !vary.is_empty() {
                let vary_key = cache_key_with_vary(req, &vary);
                if vary_key != key {
                    keys.push(vary_key);
                }
            }
        }
        Some(keys)
    }

    /// Dumps the response and writes it under every key.
    fn store_bytes(&self, status: StatusCode, headers: &Headers, body: &[u8], keys: &[String]) {
        let Some(cache) = &self.cache else {
            error!("cannot store response: no cache store configured");
            return;
        };
        let data = response::dump(status, headers, body);
        for key in keys {
            cache.put(key, data.clone());
        }
    }

    /// Fetches and parses a stored representation. Malformed entries are
    /// logged and treated as misses.
    fn lookup(&self, key: &str) -> Option<Response> {
        let cache = self.cache.as_ref()?;
        let data = cache.get(key)?;
        match Response::parse(&data) {
            Ok(rep) => Some(rep),
            Err(e) => {
                warn!(key, error = %e, "malformed stored representation; treating as miss");
                None
            }
        }
    }

    fn delete(&self, key: &str) {
        if let Some(cache) = &self.cache {
            cache.delete(key);
        }
    }

    /// Invalidates the GET key-space of the request URI and of same-origin
    /// `Location` / `Content-Location` targets (RFC 9111 §4.4).
    fn invalidate(&self, req: &Request, rep: &Response) {
        let mut targets = vec![req.url().to_owned()];
        for header in ["Location", "Content-Location"] {
            if let Some(value) = rep.headers().get(header) {
                if let Some(url) = resolve_same_origin(req.url(), value) {
                    targets.push(url);
                }
            }
        }

        for url in targets {
            let mut probe = Request::get(url);
            *probe.headers_mut() = req.headers().clone();
            let augmented = cache_key_with_headers(&probe, &self.cache_key_headers);
            let base = cache_key(&probe);
            self.delete(&augmented);
            if base != augmented {
                self.delete(&base);
            }
        }
    }

    async fn forward(&self, req: Request) -> Result<Response, Error> {
        self.transport.round_trip(req).await.map_err(Error::Forward)
    }

    fn request_directives(&self, headers: &Headers) -> RequestDirectives {
        parse_request_directives(headers).unwrap_or_else(|e| {
            warn!(error = %e, "could not parse request cache-control directives");
            RequestDirectives::default()
        })
    }

    fn response_directives(&self, headers: &Headers) -> ResponseDirectives {
        parse_response_directives(headers).unwrap_or_else(|e| {
            warn!(error = %e, "could not parse response cache-control directives");
            ResponseDirectives::default()
        })
    }
}

#[async_trait]
impl Transport for CachingTransport {
    async fn round_trip(&self, req: Request) -> Result<Response, BoxError> {
        self.execute(req).await.map_err(Into::into)
    }
}

/// Fetches and parses the stored response for the request's base cache key.
///
/// A convenience for inspecting a store directly, without going through a
/// [`CachingTransport`]. Returns `None` on a miss or a malformed entry. No
/// freshness or Vary evaluation is applied; this reads exactly what sits
/// under [`cache_key`](crate::key::cache_key).
pub fn cached_response(cache: &dyn Cache, req: &Request) -> Option<Response> {
    let data = cache.get(&cache_key(req))?;
    Response::parse(&data).ok()
}

/// Checks whether a stored entry's recorded Vary selection matches the
/// current request, using the `X-Varied-*` markers written at store time.
fn variant_matches(stored: &Headers, req: &Request) -> bool {
    for name in stored.comma_values("Vary") {
        let canonical = canonicalize(&name);
        if canonical.is_empty() || canonical == "*" {
            continue;
        }
        let recorded = stored
            .get(&format!("{VARIED_PREFIX}{canonical}"))
            .unwrap_or("");
        let current = normalize(req.headers().get(&canonical).unwrap_or(""));
        if recorded != current {
            return false;
        }
    }
    true
}

/// Records, for every Vary-listed response header, the normalized value the
/// request held, as `X-Varied-<Name>` markers on the response headers.
fn record_varied_headers(rep_headers: &mut Headers, req: &Request) {
    for name in rep_headers.comma_values("Vary") {
        let canonical = canonicalize(&name);
        if canonical.is_empty() || canonical == "*" {
            continue;
        }
        let value = normalize(req.headers().get(&canonical).unwrap_or(""));
        rep_headers.set(format!("{VARIED_PREFIX}{canonical}"), value);
    }
}

/// Attaches validators from the stored entry to a copy of the request so the
/// origin can answer `304 Not Modified`.
fn conditional_request(req: &Request, stored: &Headers) -> Request {
    let mut conditional = req.clone();
    if let Some(etag) = stored.get("Etag") {
        conditional.headers_mut().set("If-None-Match", etag);
    }
    if let Some(last_modified) = stored.get("Last-Modified") {
        conditional
            .headers_mut()
            .set("If-Modified-Since", last_modified);
    }
    conditional
}

/// Merges a `304 Not Modified` into the stored entry: the 304's headers
/// replace the stored ones, except those describing the body itself; status
/// and body are retained.
fn merge_not_modified(mut entry: Response, not_modified: &Response) -> Response {
    for (name, _) in not_modified.headers().iter() {
        if is_merge_skipped(name) {
            continue;
        }
        entry.headers_mut().remove(name);
    }
    // Second pass so multi-valued headers on the 304 are kept intact.
    let replacements: Vec<(String, String)> = not_modified
        .headers()
        .iter()
        .filter(|(name, _)| !is_merge_skipped(name))
        .map(|(name, value)| (name.to_owned(), value.to_owned()))
        .collect();
    for (name, value) in replacements {
        entry.headers_mut().insert(name, value);
    }
    entry
}

fn is_merge_skipped(name: &str) -> bool {
    MERGE_SKIPPED_HEADERS
        .iter()
        .any(|h| h.eq_ignore_ascii_case(name))
}

/// Resolves an invalidation target against the request URL, admitting only
/// same-origin targets. Root-relative references are resolved; cross-origin
/// absolute URLs are ignored.
fn resolve_same_origin(base: &str, target: &str) -> Option<String> {
    let origin = origin_of(base)?;
    if target.starts_with('/') {
        return Some(format!("{origin}{target}"));
    }
    if target == origin || target.strip_prefix(&origin).is_some_and(|rest| rest.starts_with('/')) {
        return Some(target.to_owned());
    }
    None
}

/// Extracts `scheme://authority` from an absolute URL.
fn origin_of(url: &str) -> Option<String> {
    let scheme_end = url.find("://")?;
    let path_start = url[scheme_end + 3..]
        .find('/')
        .map(|i| scheme_end + 3 + i)
        .unwrap_or(url.len());
    Some(url[..path_start].to_owned())
}
