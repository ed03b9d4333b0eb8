//! Fixture-backed patcher.
//!
//! [`TestPatcher`] serves a patch set held in memory. It counts every call so
//! tests can assert how often a caching layer reaches the backend, and it can
//! be loaded from a JSON fixture so the CLI can run without a review server:
//!
//! ```json
//! {
//!   "version": "1",
//!   "added": ["add.txt"],
//!   "deleted": ["del.txt"],
//!   "modified": ["modify.txt"],
//!   "files": { "add.txt": "add", "modify.txt": "modify" }
//! }
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::thread;
use std::time::Duration;

use serde::Deserialize;

use crate::{PatchError, PatchVersion, PatchedContent, PatchedFileSet, Patcher, Pending};

#[derive(Debug, Clone)]
struct Fixture {
    version: PatchVersion,
    files: PatchedFileSet,
    data: BTreeMap<String, Vec<u8>>,
}

#[derive(Deserialize)]
struct FixtureFile {
    version: String,
    #[serde(default)]
    added: Vec<String>,
    #[serde(default)]
    deleted: Vec<String>,
    #[serde(default)]
    modified: Vec<String>,
    #[serde(default)]
    files: BTreeMap<String, String>,
}

/// In-memory [`Patcher`] with call accounting.
#[derive(Debug)]
pub struct TestPatcher {
    identity: String,
    fixture: RwLock<Fixture>,
    unavailable: AtomicBool,
    apply_delay: Mutex<Option<Duration>>,
    version_calls: AtomicUsize,
    patched_files_calls: AtomicUsize,
    apply_calls: AtomicUsize,
    apply_batches: Mutex<Vec<BTreeSet<String>>>,
}

impl TestPatcher {
    /// Create a patcher serving `files` at `version`, with `data` holding the
    /// patched content of added and modified paths.
    #[must_use]
    pub fn new<K, V>(
        version: impl Into<PatchVersion>,
        files: PatchedFileSet,
        data: impl IntoIterator<Item = (K, V)>,
    ) -> Self
    where
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        Self {
            identity: "test".to_owned(),
            fixture: RwLock::new(Fixture {
                version: version.into(),
                files,
                data: collect_data(data),
            }),
            unavailable: AtomicBool::new(false),
            apply_delay: Mutex::new(None),
            version_calls: AtomicUsize::new(0),
            patched_files_calls: AtomicUsize::new(0),
            apply_calls: AtomicUsize::new(0),
            apply_batches: Mutex::new(Vec::new()),
        }
    }

    /// Load a patcher from a JSON fixture file.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::Fetch`] if the file cannot be read and
    /// [`PatchError::Parse`] if it is not a valid fixture.
    pub fn from_fixture_file(path: &Path) -> Result<Self, PatchError> {
        let content = std::fs::read(path).map_err(|e| {
            PatchError::fetch_with_source(format!("cannot read fixture {}", path.display()), e)
        })?;
        let fixture: FixtureFile = serde_json::from_slice(&content)
            .map_err(|e| PatchError::parse(format!("invalid fixture {}: {e}", path.display())))?;
        let files = PatchedFileSet::new(fixture.added, fixture.deleted, fixture.modified)?;

        let identity = path
            .file_stem()
            .map_or_else(|| "test".to_owned(), |s| s.to_string_lossy().into_owned());
        Ok(Self::new(fixture.version, files, fixture.files).with_identity(identity))
    }

    /// Override the identity used to namespace cache keys.
    #[must_use]
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    /// Make every resolved `apply` handle sleep before returning.
    #[must_use]
    pub fn with_apply_delay(self, delay: Duration) -> Self {
        *self
            .apply_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(delay);
        self
    }

    /// Replace the served patch set, as if a new patchset was uploaded.
    pub fn update<K, V>(
        &self,
        version: impl Into<PatchVersion>,
        files: PatchedFileSet,
        data: impl IntoIterator<Item = (K, V)>,
    ) where
        K: Into<String>,
        V: Into<Vec<u8>>,
    {
        *self.fixture.write().unwrap_or_else(PoisonError::into_inner) = Fixture {
            version: version.into(),
            files,
            data: collect_data(data),
        };
    }

    /// Make every operation fail with a fetch error until reset.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.unavailable.store(unavailable, Ordering::SeqCst);
    }

    /// Number of [`Patcher::version`] calls so far.
    #[must_use]
    pub fn version_calls(&self) -> usize {
        self.version_calls.load(Ordering::SeqCst)
    }

    /// Number of [`Patcher::patched_files`] calls so far.
    #[must_use]
    pub fn patched_files_calls(&self) -> usize {
        self.patched_files_calls.load(Ordering::SeqCst)
    }

    /// Number of [`Patcher::apply`] calls so far.
    #[must_use]
    pub fn apply_calls(&self) -> usize {
        self.apply_calls.load(Ordering::SeqCst)
    }

    /// The path sets passed to [`Patcher::apply`], in call order.
    #[must_use]
    pub fn apply_batches(&self) -> Vec<BTreeSet<String>> {
        self.apply_batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn snapshot(&self) -> Fixture {
        self.fixture
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn check_available(&self, what: &str) -> Result<(), PatchError> {
        if self.unavailable.load(Ordering::SeqCst) {
            return Err(PatchError::fetch(format!("{what}: test backend unavailable")));
        }
        Ok(())
    }
}

fn collect_data<K, V>(data: impl IntoIterator<Item = (K, V)>) -> BTreeMap<String, Vec<u8>>
where
    K: Into<String>,
    V: Into<Vec<u8>>,
{
    data.into_iter().map(|(k, v)| (k.into(), v.into())).collect()
}

impl Patcher for TestPatcher {
    fn version(&self) -> Result<PatchVersion, PatchError> {
        self.version_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available("version")?;
        Ok(self.snapshot().version)
    }

    fn patched_files(&self, _version: Option<&PatchVersion>) -> Result<PatchedFileSet, PatchError> {
        self.patched_files_calls.fetch_add(1, Ordering::SeqCst);
        self.check_available("patched files")?;
        Ok(self.snapshot().files)
    }

    fn apply(
        &self,
        paths: &BTreeSet<String>,
        _version: Option<&PatchVersion>,
    ) -> Pending<PatchedContent> {
        self.apply_calls.fetch_add(1, Ordering::SeqCst);
        self.apply_batches
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(paths.clone());

        let result = self.check_available("apply").and_then(|()| {
            let fixture = self.snapshot();
            paths
                .iter()
                .map(|path| {
                    if let Some(data) = fixture.data.get(path) {
                        Ok((path.clone(), data.clone()))
                    } else if fixture.files.deleted().contains(path) {
                        Ok((path.clone(), Vec::new()))
                    } else {
                        Err(PatchError::not_found(path.clone()))
                    }
                })
                .collect::<Result<PatchedContent, PatchError>>()
        });

        let delay = *self
            .apply_delay
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match delay {
            Some(delay) => Pending::deferred(move || {
                thread::sleep(delay);
                result
            }),
            None => Pending::from_result(result),
        }
    }

    fn identity(&self) -> String {
        self.identity.clone()
    }
}
