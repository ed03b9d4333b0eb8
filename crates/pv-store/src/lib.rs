//! Object store abstraction for patchview.
//!
//! This crate provides the key-value substrate that caching layers sit on.
//! Two traits form the core API:
//!
//! - [`ObjectStore`]: Factory for namespaced store buckets
//! - [`StoreBucket`]: Key-value bucket with optional per-entry expiry
//!
//! # Implementations
//!
//! - [`NullStore`] / [`NullBucket`]: No-op implementations (always miss)
//! - [`MemoryStore`]: In-process map shared by all its buckets
//! - [`FileStore`]: File-based implementation with layout version validation
//!
//! Expiry is measured with an injectable [`Clock`], so tests can move time
//! forward without sleeping.
//!
//! # Example
//!
//! ```
//! use pv_store::{MemoryStore, ObjectStore};
//!
//! let store = MemoryStore::new();
//! let bucket = store.bucket("12345/file");
//! bucket.set("1:docs/index.md", b"# Hello", None);
//! assert_eq!(bucket.get("1:docs/index.md"), Some(b"# Hello".to_vec()));
//! ```

mod clock;
mod ext;
mod file;
mod memory;

use std::time::Duration;

pub use clock::{Clock, ManualClock, SystemClock};
pub use ext::StoreBucketExt;
pub use file::FileStore;
pub use memory::MemoryStore;

/// A namespaced partition within an [`ObjectStore`].
///
/// Buckets opened with different namespaces never see each other's keys,
/// even when they share the same backing storage.
pub trait StoreBucket: Send + Sync {
    /// Retrieve a stored value.
    ///
    /// Returns `None` on miss or when the entry's time-to-live has elapsed.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Store a value, overwriting any existing entry for `key`.
    ///
    /// # Arguments
    ///
    /// * `key` - Entry key (e.g., `"1:docs/index.md"`)
    /// * `value` - Raw bytes to store
    /// * `ttl` - Time-to-live; `None` keeps the entry until it is overwritten or deleted
    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>);

    /// Remove an entry. Missing keys are ignored.
    fn delete(&self, key: &str);
}

/// Factory for namespaced [`StoreBucket`]s.
///
/// One store may be shared by many consumers; each consumer opens buckets
/// under a namespace unique to it.
pub trait ObjectStore: Send + Sync {
    /// Open or create a bucket.
    ///
    /// Opening the same namespace twice yields handles over the same entries.
    ///
    /// # Arguments
    ///
    /// * `namespace` - Bucket namespace (e.g., `"12345/version"`)
    fn bucket(&self, namespace: &str) -> Box<dyn StoreBucket>;
}

/// No-op [`StoreBucket`] that never stores or retrieves data.
pub struct NullBucket;

impl StoreBucket for NullBucket {
    fn get(&self, _key: &str) -> Option<Vec<u8>> {
        None
    }

    fn set(&self, _key: &str, _value: &[u8], _ttl: Option<Duration>) {}

    fn delete(&self, _key: &str) {}
}

/// No-op [`ObjectStore`] that always returns [`NullBucket`]s.
///
/// Use when caching is disabled. Every lookup misses.
pub struct NullStore;

impl ObjectStore for NullStore {
    fn bucket(&self, _namespace: &str) -> Box<dyn StoreBucket> {
        Box::new(NullBucket)
    }
}
