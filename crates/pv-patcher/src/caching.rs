//! Caching layer over a [`Patcher`].
//!
//! [`CachingPatcher`] memoizes the three patcher operations with separate
//! policies, all stored in buckets of an injected [`ObjectStore`]:
//!
//! | Region  | Namespace             | Key                 | Freshness                    |
//! |---------|-----------------------|---------------------|------------------------------|
//! | version | `{identity}/version`  | `current`           | `max_age` after the fetch    |
//! | list    | `{identity}/list`     | `{version}`         | until the version changes    |
//! | file    | `{identity}/file`     | `{version}:{path}`  | until the version changes    |
//!
//! When a refreshed version differs from the cached one, the list and file
//! entries recorded under the old version are evicted.
//!
//! Content fetches are single-flight: concurrent callers asking for the same
//! path at the same version share one backend request.

use std::collections::BTreeSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use pv_store::{Clock, ObjectStore, StoreBucket, StoreBucketExt, SystemClock};
use serde::{Deserialize, Serialize};

use crate::flight::FlightRegistry;
use crate::{PatchError, PatchVersion, PatchedContent, PatchedFileSet, Patcher, Pending};

/// How long a fetched version token is trusted before asking the backend again.
pub const DEFAULT_VERSION_MAX_AGE: Duration = Duration::from_secs(30);

const VERSION_KEY: &str = "current";

/// Tuning for a [`CachingPatcher`].
#[derive(Clone)]
pub struct CacheOptions {
    /// Freshness window of the cached version token.
    pub version_max_age: Duration,
    /// Time source for freshness checks.
    pub clock: Arc<dyn Clock>,
}

impl Default for CacheOptions {
    fn default() -> Self {
        Self {
            version_max_age: DEFAULT_VERSION_MAX_AGE,
            clock: Arc::new(SystemClock),
        }
    }
}

/// Cached version token with the time it was fetched.
#[derive(Debug, Serialize, Deserialize)]
struct VersionStamp {
    version: PatchVersion,
    fetched_at_ms: u64,
}

impl VersionStamp {
    fn is_fresh(&self, now: SystemTime, max_age: Duration) -> bool {
        let fetched_at = UNIX_EPOCH + Duration::from_millis(self.fetched_at_ms);
        // A clock that moved backwards makes the stamp stale
        now.duration_since(fetched_at)
            .is_ok_and(|age| age < max_age)
    }
}

/// A [`Patcher`] that caches another patcher's results.
///
/// Cloning is cheap; clones share caches and in-flight fetches.
pub struct CachingPatcher<P: ?Sized> {
    inner: Arc<Inner<P>>,
}

struct Inner<P: ?Sized> {
    identity: String,
    version_bucket: Box<dyn StoreBucket>,
    list_bucket: Box<dyn StoreBucket>,
    file_bucket: Box<dyn StoreBucket>,
    version_max_age: Duration,
    clock: Arc<dyn Clock>,
    /// Serializes version refreshes so a stale token is refetched once.
    version_refresh: Mutex<()>,
    /// Serializes updates to the per-version content index.
    index_update: Mutex<()>,
    flights: Arc<FlightRegistry>,
    patcher: Arc<P>,
}

impl<P: ?Sized> Clone for CachingPatcher<P> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<P: Patcher + ?Sized + 'static> CachingPatcher<P> {
    /// Wrap `patcher`, caching in buckets of `store` with default options.
    pub fn new(patcher: Arc<P>, store: &dyn ObjectStore) -> Self {
        Self::with_options(patcher, store, CacheOptions::default())
    }

    /// Wrap `patcher` with explicit [`CacheOptions`].
    pub fn with_options(patcher: Arc<P>, store: &dyn ObjectStore, options: CacheOptions) -> Self {
        let identity = patcher.identity();
        let bucket = |region: &str| store.bucket(&format!("{identity}/{region}"));

        Self {
            inner: Arc::new(Inner {
                version_bucket: bucket("version"),
                list_bucket: bucket("list"),
                file_bucket: bucket("file"),
                identity,
                version_max_age: options.version_max_age,
                clock: options.clock,
                version_refresh: Mutex::new(()),
                index_update: Mutex::new(()),
                flights: Arc::new(FlightRegistry::default()),
                patcher,
            }),
        }
    }
}

impl<P: Patcher + ?Sized + 'static> Patcher for CachingPatcher<P> {
    fn version(&self) -> Result<PatchVersion, PatchError> {
        self.inner.version()
    }

    fn patched_files(&self, version: Option<&PatchVersion>) -> Result<PatchedFileSet, PatchError> {
        let version = match version {
            Some(v) => v.clone(),
            None => self.inner.version()?,
        };
        self.inner.patched_files(&version)
    }

    fn apply(
        &self,
        paths: &BTreeSet<String>,
        version: Option<&PatchVersion>,
    ) -> Pending<PatchedContent> {
        let version = match version {
            Some(v) => v.clone(),
            None => match self.inner.version() {
                Ok(v) => v,
                Err(e) => return Pending::failed(e),
            },
        };

        // Fast path: answer from the cache without deferring
        let mut content = PatchedContent::new();
        let mut missing = BTreeSet::new();
        for path in paths {
            match self.inner.cached_content(&version, path) {
                Some(bytes) => {
                    content.insert(path.clone(), bytes);
                }
                None => {
                    missing.insert(path.clone());
                }
            }
        }
        if missing.is_empty() {
            tracing::debug!(count = content.len(), version = %version, "Content cache hit");
            return Pending::ready(content);
        }

        let inner = Arc::clone(&self.inner);
        Pending::deferred(move || {
            inner.fetch_missing(&version, missing, &mut content)?;
            Ok(content)
        })
    }

    fn identity(&self) -> String {
        self.inner.identity.clone()
    }
}

impl<P: Patcher + ?Sized> Inner<P> {
    fn version(&self) -> Result<PatchVersion, PatchError> {
        if let Some(stamp) = self.fresh_stamp() {
            return Ok(stamp.version);
        }

        let _refresh = self
            .version_refresh
            .lock()
            .unwrap_or_else(PoisonError::into_inner);

        // Another caller may have refreshed while we waited for the lock
        let previous: Option<VersionStamp> = self.version_bucket.get_json(VERSION_KEY);
        let now = self.clock.now();
        if let Some(stamp) = previous.as_ref()
            && stamp.is_fresh(now, self.version_max_age)
        {
            return Ok(stamp.version.clone());
        }

        let version = self.patcher.version()?;
        let stamp = VersionStamp {
            version: version.clone(),
            fetched_at_ms: millis_since_epoch(now),
        };
        self.version_bucket.set_json(VERSION_KEY, &stamp, None);
        tracing::debug!(identity = %self.identity, version = %version, "Fetched patch version");

        if let Some(previous) = previous
            && previous.version != version
        {
            tracing::info!(
                identity = %self.identity,
                old = %previous.version,
                new = %version,
                "Patch version changed, evicting cached files"
            );
            self.evict(&previous.version);
        }

        Ok(version)
    }

    fn fresh_stamp(&self) -> Option<VersionStamp> {
        let stamp: VersionStamp = self.version_bucket.get_json(VERSION_KEY)?;
        stamp
            .is_fresh(self.clock.now(), self.version_max_age)
            .then_some(stamp)
    }

    fn patched_files(&self, version: &PatchVersion) -> Result<PatchedFileSet, PatchError> {
        if let Some(files) = self.list_bucket.get_json(version.as_str()) {
            return Ok(files);
        }

        let files = self.patcher.patched_files(Some(version))?;
        self.list_bucket.set_json(version.as_str(), &files, None);
        self.evict_if_superseded(version);
        tracing::debug!(
            identity = %self.identity,
            version = %version,
            added = files.added().len(),
            deleted = files.deleted().len(),
            modified = files.modified().len(),
            "Fetched patched file list"
        );
        Ok(files)
    }

    fn cached_content(&self, version: &PatchVersion, path: &str) -> Option<Vec<u8>> {
        self.file_bucket.get(&content_key(version, path))
    }

    /// Fill `content` with every path in `missing`, fetching each path from
    /// the backend at most once across concurrent callers.
    fn fetch_missing(
        &self,
        version: &PatchVersion,
        mut missing: BTreeSet<String>,
        content: &mut PatchedContent,
    ) -> Result<(), PatchError> {
        loop {
            missing.retain(|path| match self.cached_content(version, path) {
                Some(bytes) => {
                    content.insert(path.clone(), bytes);
                    false
                }
                None => true,
            });
            if missing.is_empty() {
                return Ok(());
            }

            let claimed = self.flights.claim(
                missing
                    .iter()
                    .map(|path| (content_key(version, path), path.clone())),
            );

            // A flight may have landed between the cache check and the claim
            let mut owned = BTreeSet::new();
            for path in claimed.owned {
                match self.cached_content(version, &path) {
                    Some(bytes) => {
                        missing.remove(&path);
                        content.insert(path, bytes);
                    }
                    None => {
                        owned.insert(path);
                    }
                }
            }

            if !owned.is_empty() {
                tracing::debug!(
                    identity = %self.identity,
                    version = %version,
                    paths = ?owned,
                    "Content cache miss, fetching"
                );
                let mut fetched = self.patcher.apply(&owned, Some(version)).get()?;
                // Check the whole batch before storing any of it
                if let Some(path) = owned.iter().find(|p| !fetched.contains_key(*p)) {
                    return Err(PatchError::not_found(path.clone()));
                }
                for path in &owned {
                    if let Some(bytes) = fetched.remove(path) {
                        self.store_content(version, path, &bytes);
                        missing.remove(path);
                        content.insert(path.clone(), bytes);
                    }
                }
                self.record_index(version, &owned);
                self.evict_if_superseded(version);
            }

            // Release our keys before waiting on anyone else's
            drop(claimed.claim);
            for flight in claimed.waiting {
                flight.wait();
            }
            // Waited-on paths are read from the cache on the next pass. If
            // their flight failed they are claimed and fetched here.
        }
    }

    fn store_content(&self, version: &PatchVersion, path: &str, bytes: &[u8]) {
        self.file_bucket.set(&content_key(version, path), bytes, None);
    }

    /// Remember which paths were cached for `version` so they can be evicted.
    fn record_index(&self, version: &PatchVersion, paths: &BTreeSet<String>) {
        let _guard = self
            .index_update
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let key = index_key(version);
        let mut index: BTreeSet<String> = self.file_bucket.get_json(&key).unwrap_or_default();
        let before = index.len();
        index.extend(paths.iter().cloned());
        if index.len() != before {
            self.file_bucket.set_json(&key, &index, None);
        }
    }

    /// Evict `version` if the stamp has moved past it.
    ///
    /// Called after storing: a refresh may have evicted `version` while the
    /// fetch was in flight.
    fn evict_if_superseded(&self, version: &PatchVersion) {
        let current: Option<VersionStamp> = self.version_bucket.get_json(VERSION_KEY);
        if let Some(current) = current
            && current.version != *version
        {
            tracing::debug!(
                identity = %self.identity,
                stale = %version,
                current = %current.version,
                "Stored entries for a superseded version"
            );
            self.evict(version);
        }
    }

    /// Drop every list and content entry stored under `version`.
    fn evict(&self, version: &PatchVersion) {
        self.list_bucket.delete(version.as_str());

        let _guard = self
            .index_update
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let key = index_key(version);
        let index: BTreeSet<String> = self.file_bucket.get_json(&key).unwrap_or_default();
        for path in &index {
            self.file_bucket.delete(&content_key(version, path));
        }
        self.file_bucket.delete(&key);
        tracing::debug!(
            identity = %self.identity,
            version = %version,
            evicted = index.len(),
            "Evicted cached content"
        );
    }
}

fn content_key(version: &PatchVersion, path: &str) -> String {
    format!("{version}:{path}")
}

/// Key of the set of paths cached under `version`.
fn index_key(version: &PatchVersion) -> String {
    format!("{version}#index")
}

fn millis_since_epoch(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

#[cfg(test)]
mod tests {
    use std::sync::Barrier;
    use std::thread;

    use pretty_assertions::assert_eq;
    use pv_store::{ManualClock, MemoryStore, NullStore};

    use super::*;
    use crate::{TestPatcher, path_set};

    struct Fixture {
        patcher: Arc<TestPatcher>,
        clock: Arc<ManualClock>,
        store: MemoryStore,
        caching: CachingPatcher<TestPatcher>,
    }

    fn fixture() -> Fixture {
        let patcher = Arc::new(TestPatcher::new(
            "1",
            PatchedFileSet::new(["add.txt"], ["del.txt"], ["modify.txt"]).unwrap(),
            [("add.txt", "add"), ("modify.txt", "modify")],
        ));
        let clock = Arc::new(ManualClock::default());
        let store = MemoryStore::with_clock(Arc::clone(&clock) as Arc<dyn Clock>);
        let caching = CachingPatcher::with_options(
            Arc::clone(&patcher),
            &store,
            CacheOptions {
                version_max_age: Duration::from_secs(30),
                clock: Arc::clone(&clock) as Arc<dyn Clock>,
            },
        );
        Fixture {
            patcher,
            clock,
            store,
            caching,
        }
    }

    #[test]
    fn test_end_to_end_scenario() {
        let f = fixture();

        // Version twice within the window: one backend call
        assert_eq!(f.caching.version().unwrap().as_str(), "1");
        assert_eq!(f.caching.version().unwrap().as_str(), "1");
        assert_eq!(f.patcher.version_calls(), 1);

        let added = f.caching.apply(&path_set(["add.txt"]), None).get().unwrap();
        assert_eq!(added["add.txt"], b"add");

        let deleted = f.caching.apply(&path_set(["del.txt"]), None).get().unwrap();
        assert_eq!(deleted["del.txt"], b"");

        f.caching.apply(&path_set(["modify.txt"]), None).get().unwrap();
        let calls = f.patcher.apply_calls();
        let modified = f.caching.apply(&path_set(["modify.txt"]), None).get().unwrap();
        assert_eq!(modified["modify.txt"], b"modify");
        assert_eq!(f.patcher.apply_calls(), calls);
    }

    #[test]
    fn test_version_cached_within_max_age() {
        let f = fixture();

        assert_eq!(f.caching.version().unwrap().as_str(), "1");
        f.clock.advance(Duration::from_secs(29));
        assert_eq!(f.caching.version().unwrap().as_str(), "1");

        assert_eq!(f.patcher.version_calls(), 1);
    }

    #[test]
    fn test_version_refetched_at_max_age() {
        let f = fixture();

        f.caching.version().unwrap();
        f.clock.advance(Duration::from_secs(30));
        f.caching.version().unwrap();
        f.caching.version().unwrap();

        assert_eq!(f.patcher.version_calls(), 2);
    }

    #[test]
    fn test_version_backwards_clock_refetches() {
        let f = fixture();

        f.caching.version().unwrap();
        f.clock.set(UNIX_EPOCH);
        f.caching.version().unwrap();

        assert_eq!(f.patcher.version_calls(), 2);
    }

    #[test]
    fn test_version_error_not_cached() {
        let f = fixture();
        f.patcher.set_unavailable(true);

        assert!(f.caching.version().is_err());
        assert!(f.caching.version().is_err());
        assert_eq!(f.patcher.version_calls(), 2);

        f.patcher.set_unavailable(false);
        assert_eq!(f.caching.version().unwrap().as_str(), "1");
    }

    #[test]
    fn test_patched_files_memoized() {
        let f = fixture();

        let results: Vec<_> = (0..5)
            .map(|_| f.caching.patched_files(None).unwrap())
            .collect();

        assert_eq!(f.patcher.patched_files_calls(), 1);
        assert!(results.windows(2).all(|w| w[0] == w[1]));
        assert_eq!(results[0].added(), &path_set(["add.txt"]));
    }

    #[test]
    fn test_patched_files_error_not_cached() {
        let f = fixture();
        f.caching.version().unwrap();
        f.patcher.set_unavailable(true);

        assert!(f.caching.patched_files(None).is_err());
        f.patcher.set_unavailable(false);
        assert!(f.caching.patched_files(None).is_ok());

        assert_eq!(f.patcher.patched_files_calls(), 2);
    }

    #[test]
    fn test_apply_fetches_only_missing_paths() {
        let f = fixture();

        f.caching.apply(&path_set(["add.txt"]), None).get().unwrap();
        let content = f
            .caching
            .apply(&path_set(["add.txt", "modify.txt"]), None)
            .get()
            .unwrap();

        assert_eq!(content["add.txt"], b"add");
        assert_eq!(content["modify.txt"], b"modify");
        assert_eq!(
            f.patcher.apply_batches(),
            vec![path_set(["add.txt"]), path_set(["modify.txt"])]
        );
    }

    #[test]
    fn test_apply_fully_cached_is_ready() {
        let f = fixture();

        f.caching.apply(&path_set(["add.txt"]), None).get().unwrap();
        let pending = f.caching.apply(&path_set(["add.txt"]), None);

        assert!(pending.is_ready());
        assert_eq!(pending.get().unwrap()["add.txt"], b"add");
        assert_eq!(f.patcher.apply_calls(), 1);
    }

    #[test]
    fn test_apply_deleted_path_is_empty_and_cached() {
        let f = fixture();

        let content = f.caching.apply(&path_set(["del.txt"]), None).get().unwrap();
        assert_eq!(content["del.txt"], b"");

        f.caching.apply(&path_set(["del.txt"]), None).get().unwrap();
        assert_eq!(f.patcher.apply_calls(), 1);
    }

    #[test]
    fn test_apply_unknown_path_fails_and_caches_nothing() {
        let f = fixture();

        let err = f
            .caching
            .apply(&path_set(["add.txt", "unknown.txt"]), None)
            .get()
            .unwrap_err();

        assert!(err.is_not_found());
        assert!(f.store.is_empty("test/file"));
    }

    #[test]
    fn test_apply_fetch_error_propagates_and_retries() {
        let f = fixture();
        f.caching.version().unwrap();
        f.patcher.set_unavailable(true);

        let err = f.caching.apply(&path_set(["add.txt"]), None).get().unwrap_err();
        assert!(matches!(err, PatchError::Fetch { .. }));

        f.patcher.set_unavailable(false);
        let content = f.caching.apply(&path_set(["add.txt"]), None).get().unwrap();
        assert_eq!(content["add.txt"], b"add");
        assert_eq!(f.patcher.apply_calls(), 2);
    }

    #[test]
    fn test_apply_version_error_fails_handle() {
        let f = fixture();
        f.patcher.set_unavailable(true);

        let pending = f.caching.apply(&path_set(["add.txt"]), None);

        assert!(pending.is_ready());
        assert!(pending.get().is_err());
        assert_eq!(f.patcher.apply_calls(), 0);
    }

    #[test]
    fn test_apply_empty_set() {
        let f = fixture();

        let content = f.caching.apply(&BTreeSet::new(), None).get().unwrap();

        assert!(content.is_empty());
        assert_eq!(f.patcher.apply_calls(), 0);
    }

    #[test]
    fn test_version_change_evicts_old_entries() {
        let f = fixture();
        f.caching.patched_files(None).unwrap();
        f.caching
            .apply(&path_set(["add.txt", "del.txt"]), None)
            .get()
            .unwrap();
        assert_eq!(f.store.len("test/list"), 1);
        // Two content entries plus the index
        assert_eq!(f.store.len("test/file"), 3);

        f.patcher.update(
            "2",
            PatchedFileSet::new(["add.txt"], Vec::<&str>::new(), Vec::<&str>::new()).unwrap(),
            [("add.txt", "add v2")],
        );
        f.clock.advance(Duration::from_secs(30));

        assert_eq!(f.caching.version().unwrap().as_str(), "2");
        assert!(f.store.is_empty("test/list"));
        assert!(f.store.is_empty("test/file"));

        let content = f.caching.apply(&path_set(["add.txt"]), None).get().unwrap();
        assert_eq!(content["add.txt"], b"add v2");
        let files = f.caching.patched_files(None).unwrap();
        assert!(files.deleted().is_empty());
        assert_eq!(f.patcher.patched_files_calls(), 2);
    }

    #[test]
    fn test_fetch_across_version_change_leaves_nothing_behind() {
        let f = fixture();
        assert_eq!(f.caching.version().unwrap().as_str(), "1");
        let started_at_v1 = f.caching.apply(&path_set(["add.txt"]), None);

        f.patcher.update(
            "2",
            PatchedFileSet::new(["add.txt"], Vec::<&str>::new(), Vec::<&str>::new()).unwrap(),
            [("add.txt", "add v2")],
        );
        f.clock.advance(Duration::from_secs(30));
        assert_eq!(f.caching.version().unwrap().as_str(), "2");

        started_at_v1.get().unwrap();
        f.caching.patched_files(Some(&PatchVersion::from("1"))).unwrap();

        assert!(f.store.is_empty("test/file"));
        assert!(f.store.is_empty("test/list"));

        f.caching.apply(&path_set(["add.txt"]), None).get().unwrap();
        assert_eq!(f.store.len("test/file"), 2);
    }

    #[test]
    fn test_same_version_refresh_keeps_entries() {
        let f = fixture();
        f.caching.apply(&path_set(["add.txt"]), None).get().unwrap();

        f.clock.advance(Duration::from_secs(31));
        f.caching.version().unwrap();
        f.caching.apply(&path_set(["add.txt"]), None).get().unwrap();

        assert_eq!(f.patcher.version_calls(), 2);
        assert_eq!(f.patcher.apply_calls(), 1);
    }

    #[test]
    fn test_explicit_version_skips_version_fetch() {
        let f = fixture();
        let v = PatchVersion::from("1");

        f.caching.patched_files(Some(&v)).unwrap();
        f.caching.apply(&path_set(["add.txt"]), Some(&v)).get().unwrap();

        assert_eq!(f.patcher.version_calls(), 0);
    }

    #[test]
    fn test_namespaced_by_identity() {
        let store = MemoryStore::new();
        let files = PatchedFileSet::new(["a.md"], Vec::<&str>::new(), Vec::<&str>::new()).unwrap();
        let one = Arc::new(TestPatcher::new("1", files.clone(), [("a.md", "one")]).with_identity("111"));
        let two = Arc::new(TestPatcher::new("1", files, [("a.md", "two")]).with_identity("222"));

        let c1 = CachingPatcher::new(one, &store);
        let c2 = CachingPatcher::new(two, &store);

        assert_eq!(c1.apply(&path_set(["a.md"]), None).get().unwrap()["a.md"], b"one");
        assert_eq!(c2.apply(&path_set(["a.md"]), None).get().unwrap()["a.md"], b"two");
        assert_eq!(c1.identity(), "111");
    }

    #[test]
    fn test_null_store_always_delegates() {
        let patcher = Arc::new(TestPatcher::new(
            "1",
            PatchedFileSet::new(["a.md"], Vec::<&str>::new(), Vec::<&str>::new()).unwrap(),
            [("a.md", "a")],
        ));
        let caching = CachingPatcher::new(Arc::clone(&patcher), &NullStore);

        caching.apply(&path_set(["a.md"]), None).get().unwrap();
        caching.apply(&path_set(["a.md"]), None).get().unwrap();

        assert_eq!(patcher.apply_calls(), 2);
        assert_eq!(patcher.version_calls(), 2);
    }

    #[test]
    fn test_concurrent_apply_single_flight() {
        const THREADS: usize = 8;
        let patcher = Arc::new(
            TestPatcher::new(
                "1",
                PatchedFileSet::new(["a.md", "b.md"], Vec::<&str>::new(), Vec::<&str>::new())
                    .unwrap(),
                [("a.md", "a"), ("b.md", "b")],
            )
            .with_apply_delay(Duration::from_millis(50)),
        );
        let store = MemoryStore::new();
        let caching = CachingPatcher::new(Arc::clone(&patcher), &store);
        caching.version().unwrap();
        let barrier = Arc::new(Barrier::new(THREADS));

        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                let caching = caching.clone();
                let barrier = Arc::clone(&barrier);
                thread::spawn(move || {
                    barrier.wait();
                    caching
                        .apply(&path_set(["a.md", "b.md"]), None)
                        .get()
                        .unwrap()
                })
            })
            .collect();

        for handle in handles {
            let content = handle.join().unwrap();
            assert_eq!(content["a.md"], b"a");
            assert_eq!(content["b.md"], b"b");
        }

        let fetched: Vec<String> = patcher.apply_batches().into_iter().flatten().collect();
        assert_eq!(fetched.iter().filter(|p| *p == "a.md").count(), 1);
        assert_eq!(fetched.iter().filter(|p| *p == "b.md").count(), 1);
    }

    #[test]
    fn test_abandoned_handle_does_not_block_others() {
        let f = fixture();
        f.caching.version().unwrap();

        drop(f.caching.apply(&path_set(["add.txt"]), None));
        let content = f.caching.apply(&path_set(["add.txt"]), None).get().unwrap();

        assert_eq!(content["add.txt"], b"add");
    }
}
