//! # httpcache
//!
//! An RFC 9111 compliant HTTP caching transport with pluggable storage
//! backends.
//!
//! [`CachingTransport`] wraps any [`Transport`] (the seam to your actual HTTP
//! client) and answers requests from a cache store where the protocol allows:
//! fresh responses are served without a network round trip, stale ones are
//! revalidated with conditional requests, `Vary` variants are kept apart, and
//! successful unsafe methods invalidate what they changed.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use async_trait::async_trait;
//! use httpcache::store::MemoryCache;
//! use httpcache::{Body, BoxError, CachingTransport, Request, Response, StatusCode, Transport};
//!
//! struct Origin;
//!
//! #[async_trait]
//! impl Transport for Origin {
//!     async fn round_trip(&self, _req: Request) -> Result<Response, BoxError> {
//!         // Hand the request to your real HTTP client here.
//!         Ok(Response::new(StatusCode::OK)
//!             .header("Cache-Control", "max-age=60")
//!             .header("Date", "Mon, 24 Aug 2026 00:00:00 GMT")
//!             .body(Body::from_bytes(&b"hello"[..])))
//!     }
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), httpcache::Error> {
//!     let transport = CachingTransport::new(Origin).with_cache(MemoryCache::new());
//!
//!     let mut rep = transport
//!         .execute(Request::get("http://example.com/hello"))
//!         .await?;
//!     let body = rep.body_mut().bytes().await?;
//!     println!("{}", String::from_utf8_lossy(&body));
//!     Ok(())
//! }
//! ```
//!
//! ## Storage backends
//!
//! Anything implementing the three-method [`store::Cache`] contract works as a
//! backend. Three adapters ship with the crate: [`store::MemoryCache`]
//! (volatile concurrent map), [`store::DiskCache`] (persistent file-per-key),
//! and [`store::MokaCache`] (bounded, TinyLFU eviction). Backend failures are
//! logged via [`tracing`] and degrade to cache misses; they never fail a
//! request.

pub mod directives;
pub mod http;
pub mod key;
pub mod store;
pub mod transport;

mod policy;

pub use http::{Body, Headers, Method, Request, Response, StatusCode};
pub use transport::{
    BoxError, CachingTransport, Error, FROM_CACHE_HEADER, Transport, cached_response,
};
