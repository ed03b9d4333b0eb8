//! Patch source and cache selection from configuration.

use std::collections::BTreeSet;
use std::sync::Arc;

use pv_config::{Config, PatcherBackend, StoreBackend};
use pv_fs::{LocalFileSystem, PatchedFileSystem};
use pv_patcher::{
    CacheOptions, CachingPatcher, NullPatcher, PatchError, PatchVersion, PatchedContent,
    PatchedFileSet, Patcher, Pending, TestPatcher,
};
use pv_rietveld::{HttpFetcher, RietveldPatcher};
use pv_store::{FileStore, MemoryStore, NullStore, ObjectStore, SystemClock};

use crate::error::CliError;

/// Layout version of the on-disk cache. Bump to discard old caches.
const STORE_VERSION: &str = "1";

/// The configured patch source.
pub(crate) enum Backend {
    Rietveld(RietveldPatcher),
    Test(TestPatcher),
    Null(NullPatcher),
}

impl Backend {
    /// Build the backend selected by `config`.
    pub(crate) fn from_config(config: &Config) -> Result<Self, CliError> {
        match config.patcher.backend {
            PatcherBackend::Rietveld => {
                let rietveld = config.require_rietveld()?;
                let fetcher = HttpFetcher::new(&rietveld.server, rietveld.timeout());
                let mut patcher = RietveldPatcher::new(rietveld.issue.clone(), Arc::new(fetcher));
                if let Some(prefix) = &rietveld.path_prefix {
                    patcher = patcher.with_path_prefix(prefix.clone());
                }
                if let Some(base_url) = &rietveld.base_url {
                    patcher = patcher.with_base_url(base_url.clone());
                }
                Ok(Self::Rietveld(patcher))
            }
            PatcherBackend::Test => {
                let fixture = config.require_fixture()?;
                Ok(Self::Test(TestPatcher::from_fixture_file(fixture)?))
            }
            PatcherBackend::None => Ok(Self::Null(NullPatcher)),
        }
    }

    fn as_patcher(&self) -> &dyn Patcher {
        match self {
            Self::Rietveld(patcher) => patcher,
            Self::Test(patcher) => patcher,
            Self::Null(patcher) => patcher,
        }
    }
}

impl Patcher for Backend {
    fn version(&self) -> Result<PatchVersion, PatchError> {
        self.as_patcher().version()
    }

    fn patched_files(&self, version: Option<&PatchVersion>) -> Result<PatchedFileSet, PatchError> {
        self.as_patcher().patched_files(version)
    }

    fn apply(
        &self,
        paths: &BTreeSet<String>,
        version: Option<&PatchVersion>,
    ) -> Pending<PatchedContent> {
        self.as_patcher().apply(paths, version)
    }

    fn identity(&self) -> String {
        self.as_patcher().identity()
    }
}

/// Open the object store selected by `config`.
pub(crate) fn open_store(config: &Config) -> Box<dyn ObjectStore> {
    let store = &config.store_resolved;
    match store.backend {
        StoreBackend::Memory => Box::new(MemoryStore::new()),
        StoreBackend::File => Box::new(FileStore::new(store.dir.clone(), STORE_VERSION)),
        StoreBackend::None => Box::new(NullStore),
    }
}

/// Everything a command needs: the patch source and the patched tree.
pub(crate) struct Session {
    pub(crate) patcher: CachingPatcher<Backend>,
    pub(crate) files: PatchedFileSystem<LocalFileSystem, CachingPatcher<Backend>>,
}

impl Session {
    /// Wire backend, cache, and base directory from `config`.
    pub(crate) fn open(config: &Config) -> Result<Self, CliError> {
        let backend = Arc::new(Backend::from_config(config)?);
        let store = open_store(config);
        let options = CacheOptions {
            version_max_age: config.patcher.version_max_age(),
            clock: Arc::new(SystemClock),
        };
        let patcher = CachingPatcher::with_options(backend, store.as_ref(), options);

        tracing::debug!(
            identity = %patcher.identity(),
            base_dir = %config.files_resolved.base_dir.display(),
            "Opened session"
        );

        let base = LocalFileSystem::new(config.files_resolved.base_dir.clone());
        let files = PatchedFileSystem::new(base, patcher.clone());
        Ok(Self { patcher, files })
    }
}
