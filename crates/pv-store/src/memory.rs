//! In-process object store.
//!
//! [`MemoryStore`] keeps every namespace in one shared map, so buckets opened
//! from the same store (or from clones of it) observe each other's writes.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime};

use crate::clock::{Clock, SystemClock};
use crate::{ObjectStore, StoreBucket};

#[derive(Debug, Clone)]
struct Entry {
    value: Vec<u8>,
    expires_at: Option<SystemTime>,
}

type Namespaces = HashMap<String, HashMap<String, Entry>>;

/// In-memory [`ObjectStore`] with per-entry expiry.
///
/// Cloning is cheap and yields a handle over the same entries.
#[derive(Clone)]
pub struct MemoryStore {
    entries: Arc<RwLock<Namespaces>>,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Create an empty store using the system clock.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Create an empty store that measures expiry with `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: Arc::new(RwLock::new(HashMap::new())),
            clock,
        }
    }

    /// Number of live entries in a namespace.
    ///
    /// Expired entries that have not been read yet are still counted.
    #[must_use]
    pub fn len(&self, namespace: &str) -> usize {
        self.entries
            .read()
            .map(|ns| ns.get(namespace).map_or(0, HashMap::len))
            .unwrap_or(0)
    }

    /// Whether a namespace holds no entries.
    #[must_use]
    pub fn is_empty(&self, namespace: &str) -> bool {
        self.len(namespace) == 0
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ObjectStore for MemoryStore {
    fn bucket(&self, namespace: &str) -> Box<dyn StoreBucket> {
        Box::new(MemoryBucket {
            namespace: namespace.to_owned(),
            entries: Arc::clone(&self.entries),
            clock: Arc::clone(&self.clock),
        })
    }
}

/// A single namespace view over a [`MemoryStore`].
struct MemoryBucket {
    namespace: String,
    entries: Arc<RwLock<Namespaces>>,
    clock: Arc<dyn Clock>,
}

impl MemoryBucket {
    /// Remove `key` if it is still expired under the write lock.
    ///
    /// A `set` may replace the entry between the expired read and this call.
    fn evict_expired(&self, key: &str) {
        let Ok(mut namespaces) = self.entries.write() else {
            return;
        };
        let now = self.clock.now();
        if let Some(bucket) = namespaces.get_mut(&self.namespace)
            && bucket
                .get(key)
                .and_then(|entry| entry.expires_at)
                .is_some_and(|at| now >= at)
        {
            bucket.remove(key);
        }
    }
}

impl StoreBucket for MemoryBucket {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        {
            let namespaces = self.entries.read().ok()?;
            let entry = namespaces.get(&self.namespace)?.get(key)?;
            match entry.expires_at {
                Some(at) if self.clock.now() >= at => {}
                _ => return Some(entry.value.clone()),
            }
        }

        self.evict_expired(key);
        None
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) {
        let expires_at = ttl.map(|ttl| self.clock.now() + ttl);
        let Ok(mut namespaces) = self.entries.write() else {
            tracing::warn!(namespace = %self.namespace, "Memory store lock poisoned, dropping write");
            return;
        };
        namespaces.entry(self.namespace.clone()).or_default().insert(
            key.to_owned(),
            Entry {
                value: value.to_vec(),
                expires_at,
            },
        );
    }

    fn delete(&self, key: &str) {
        if let Ok(mut namespaces) = self.entries.write()
            && let Some(bucket) = namespaces.get_mut(&self.namespace)
        {
            bucket.remove(key);
        }
    }
}
