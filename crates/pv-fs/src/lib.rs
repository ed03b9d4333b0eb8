//! File system views for patchview.
//!
//! A [`FileSystem`] reads files, lists directories, and reports a version
//! string per path that changes whenever the content does.
//! [`PatchedFileSystem`] overlays a [`pv_patcher::Patcher`] on a base file
//! system so that readers see the tree as it would be with the patch set
//! applied.
//!
//! # Path Convention
//!
//! Paths are relative and `/`-separated (`"docs/guide.md"`). Directory
//! arguments may omit the trailing slash; the root is `""`. Directory
//! listings return child names only, with a trailing `/` on subdirectories.

mod local;
mod memory;
mod patched;

use std::collections::BTreeSet;
use std::sync::Arc;

use pv_patcher::{PatchError, PatchedContent, Pending};

pub use local::LocalFileSystem;
pub use memory::MemoryFileSystem;
pub use patched::PatchedFileSystem;

/// Result of [`FileSystem::stat`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatInfo {
    /// Opaque version string. Equal strings mean equal content.
    pub version: String,
}

impl StatInfo {
    /// Create a stat result with `version`.
    #[must_use]
    pub fn new(version: impl Into<String>) -> Self {
        Self {
            version: version.into(),
        }
    }
}

/// Read access to a tree of files.
pub trait FileSystem: Send + Sync {
    /// Start reading `paths`.
    ///
    /// The handle resolves to a map holding every requested path, or fails
    /// with [`PatchError::FileNotFound`] if any of them is missing.
    fn read(&self, paths: &BTreeSet<String>) -> Pending<PatchedContent>;

    /// List the children of `dir`, sorted.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::FileNotFound`] if `dir` does not exist.
    fn read_dir(&self, dir: &str) -> Result<Vec<String>, PatchError>;

    /// Report the version of `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::FileNotFound`] if `path` does not exist.
    fn stat(&self, path: &str) -> Result<StatInfo, PatchError>;

    /// Identifier unique to this file system.
    fn identity(&self) -> String;
}

impl<F: FileSystem + ?Sized> FileSystem for Arc<F> {
    fn read(&self, paths: &BTreeSet<String>) -> Pending<PatchedContent> {
        (**self).read(paths)
    }

    fn read_dir(&self, dir: &str) -> Result<Vec<String>, PatchError> {
        (**self).read_dir(dir)
    }

    fn stat(&self, path: &str) -> Result<StatInfo, PatchError> {
        (**self).stat(path)
    }

    fn identity(&self) -> String {
        (**self).identity()
    }
}

/// Prefix that paths under `dir` start with (`""` for the root).
pub(crate) fn dir_prefix(dir: &str) -> String {
    let dir = dir.trim_matches('/');
    if dir.is_empty() {
        String::new()
    } else {
        format!("{dir}/")
    }
}

/// Name of the direct child of `prefix` that `path` lies in.
///
/// Returns `"name"` for a file directly under `prefix` and `"name/"` for a
/// path further down.
pub(crate) fn child_of<'a>(prefix: &str, path: &'a str) -> Option<&'a str> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        return None;
    }
    match rest.find('/') {
        Some(slash) => Some(&rest[..=slash]),
        None => Some(rest),
    }
}
