//! Extension trait for [`StoreBucket`] with typed convenience methods.

use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::StoreBucket;

/// Typed convenience methods for [`StoreBucket`].
///
/// Provides `get_json`/`set_json` for serde-serializable types. Implementors
/// only handle raw bytes; callers get typed access through the blanket impl.
///
/// # Example
///
/// ```
/// use pv_store::{MemoryStore, ObjectStore, StoreBucketExt};
///
/// let store = MemoryStore::new();
/// let bucket = store.bucket("12345/list");
///
/// bucket.set_json("1", &vec!["docs/index.md"], None);
/// let files: Option<Vec<String>> = bucket.get_json("1");
/// assert_eq!(files, Some(vec!["docs/index.md".to_owned()]));
/// ```
pub trait StoreBucketExt: StoreBucket {
    /// Retrieve a JSON-deserialized value.
    ///
    /// Returns `None` on miss, expiry, or deserialization failure.
    fn get_json<T: DeserializeOwned>(&self, key: &str) -> Option<T> {
        let bytes = self.get(key)?;
        match serde_json::from_slice(&bytes) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::debug!(key, error = %e, "Discarding undecodable store entry");
                None
            }
        }
    }

    /// Store a value as JSON.
    ///
    /// Silently does nothing if serialization fails.
    fn set_json<T: Serialize>(&self, key: &str, value: &T, ttl: Option<Duration>) {
        if let Ok(bytes) = serde_json::to_vec(value) {
            self.set(key, &bytes, ttl);
        }
    }
}

impl<B: StoreBucket + ?Sized> StoreBucketExt for B {}
