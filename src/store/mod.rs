//! Pluggable cache storage backends.
//!
//! The transport treats storage as an opaque byte-blob key/value contract:
//! backends never interpret the stored wire-format dumps. Three adapters are
//! provided:
//!
//! - [`MemoryCache`]: volatile concurrent map; good for tests and
//!   short-lived processes.
//! - [`DiskCache`]: persistent file-per-key store.
//! - [`MokaCache`]: bounded, high-throughput store with TinyLFU
//!   admission/eviction.
//!
//! Backend I/O failures are logged and degrade to a miss or a dropped write;
//! they never propagate to the request path.

pub mod disk;
pub mod memory;
pub mod moka;

pub use disk::DiskCache;
pub use memory::MemoryCache;
pub use moka::MokaCache;

/// The basic mechanism to store and retrieve response representations.
///
/// All three operations must be safe under concurrent invocation from multiple
/// callers; each individual `get`/`put`/`delete` is atomic with respect to the
/// others, which is the only cross-request consistency the transport relies
/// on.
pub trait Cache: Send + Sync {
    /// Returns the stored bytes for `key`, or `None` when absent.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Stores `value` under `key`, replacing any previous entry wholesale.
    fn put(&self, key: &str, value: Vec<u8>);

    /// Removes the entry for `key`, if any.
    fn delete(&self, key: &str);
}

impl<C: Cache + ?Sized> Cache for std::sync::Arc<C> {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        (**self).get(key)
    }

    fn put(&self, key: &str, value: Vec<u8>) {
        (**self).put(key, value)
    }

    fn delete(&self, key: &str) {
        (**self).delete(key)
    }
}
