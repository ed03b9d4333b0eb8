//! File-based object store.
//!
//! [`FileStore`] keeps each namespace in its own subdirectory. Entry file names
//! are the hex SHA-256 of the key, so arbitrary keys (including ones that look
//! like paths with `..`) never escape the namespace directory. Each entry is a
//! single file with a binary header followed by the data:
//!
//! ```text
//! [expires_at_ms: u64 LE][data bytes]
//! ```
//!
//! An `expires_at_ms` of zero means the entry never expires.
//!
//! On construction, [`FileStore`] validates a `VERSION` file in the store root.
//! If the version mismatches or is missing, the entire directory is wiped and
//! recreated, so entries written by an incompatible layout are never read.

use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use sha2::{Digest, Sha256};

use crate::clock::{Clock, SystemClock};
use crate::{ObjectStore, StoreBucket};

/// File-based [`ObjectStore`] rooted at a directory on disk.
///
/// Directory layout:
/// ```text
/// {root}/
/// +-- VERSION                 # contains the layout version string
/// +-- 12345%2Fversion/        # namespace "12345/version"
/// |   +-- 3f2a...             # sha256(key)
/// +-- 12345%2Ffile/
///     +-- ...
/// ```
pub struct FileStore {
    root: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FileStore {
    /// Create a file store at `root`, validating the layout version.
    ///
    /// If the `VERSION` file inside `root` does not match `version`, the entire
    /// directory is removed and recreated. Errors during validation are logged
    /// but never fatal.
    #[must_use]
    pub fn new(root: PathBuf, version: &str) -> Self {
        Self::with_clock(root, version, Arc::new(SystemClock))
    }

    /// Create a file store that measures expiry with `clock`.
    #[must_use]
    pub fn with_clock(root: PathBuf, version: &str, clock: Arc<dyn Clock>) -> Self {
        validate_version(&root, version);
        Self { root, clock }
    }
}

impl ObjectStore for FileStore {
    fn bucket(&self, namespace: &str) -> Box<dyn StoreBucket> {
        Box::new(FileBucket {
            dir: self.root.join(namespace_dir(namespace)),
            clock: Arc::clone(&self.clock),
        })
    }
}

/// A single namespace backed by a directory on disk.
struct FileBucket {
    dir: PathBuf,
    clock: Arc<dyn Clock>,
}

impl FileBucket {
    fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(hex::encode(Sha256::digest(key.as_bytes())))
    }
}

impl StoreBucket for FileBucket {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.entry_path(key);
        let mut file = File::open(&path).ok()?;

        let mut header = [0u8; 8];
        file.read_exact(&mut header).ok()?;
        let expires_at_ms = u64::from_le_bytes(header);

        if expires_at_ms != 0 && millis_since_epoch(self.clock.now()) >= expires_at_ms {
            tracing::debug!(key, "Store entry expired");
            let _ = fs::remove_file(&path);
            return None;
        }

        let mut data = Vec::new();
        file.read_to_end(&mut data).ok()?;
        Some(data)
    }

    fn set(&self, key: &str, value: &[u8], ttl: Option<Duration>) {
        // Silently ignore errors: the store is a cache
        if let Err(e) = fs::create_dir_all(&self.dir) {
            tracing::debug!(error = %e, "Failed to create store namespace directory");
            return;
        }

        let expires_at_ms = ttl.map_or(0, |ttl| {
            millis_since_epoch(self.clock.now() + ttl).max(1)
        });

        let mut buf = Vec::with_capacity(8 + value.len());
        buf.extend_from_slice(&expires_at_ms.to_le_bytes());
        buf.extend_from_slice(value);

        if let Err(e) = fs::write(self.entry_path(key), &buf) {
            tracing::debug!(key, error = %e, "Failed to write store entry");
        }
    }

    fn delete(&self, key: &str) {
        let _ = fs::remove_file(self.entry_path(key));
    }
}

/// Directory name for a namespace.
///
/// Namespaces contain `/` (e.g., `"12345/file"`); it is escaped so each
/// namespace is exactly one directory level.
fn namespace_dir(namespace: &str) -> String {
    namespace.replace('%', "%25").replace('/', "%2F")
}

fn millis_since_epoch(time: SystemTime) -> u64 {
    time.duration_since(UNIX_EPOCH)
        .map_or(0, |d| u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

/// Validate the store layout version, wiping the directory on mismatch.
fn validate_version(root: &Path, version: &str) {
    let version_file = root.join("VERSION");

    match fs::read_to_string(&version_file) {
        Ok(stored) if stored == version => {
            tracing::debug!("store version matches: {version}");
            return;
        }
        Ok(stored) => {
            tracing::info!(
                "store version mismatch (stored={stored}, current={version}), wiping store"
            );
        }
        Err(_) => {
            tracing::info!("no store VERSION file found, initializing store");
        }
    }

    if root.exists()
        && let Err(e) = fs::remove_dir_all(root)
    {
        tracing::warn!("failed to remove store directory: {e}");
    }
    if let Err(e) = fs::create_dir_all(root) {
        tracing::warn!("failed to create store directory: {e}");
        return;
    }
    if let Err(e) = fs::write(&version_file, version) {
        tracing::warn!("failed to write store VERSION file: {e}");
    }
}
