//! In-memory file system.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{PoisonError, RwLock};

use pv_patcher::{PatchError, PatchedContent, Pending};

use crate::{FileSystem, StatInfo, child_of, dir_prefix};

#[derive(Debug, Clone)]
struct MemoryFile {
    content: Vec<u8>,
    version: String,
}

/// File system held in memory.
///
/// Directories exist implicitly when a file lies under them. Every write
/// replaces the file's version.
///
/// # Example
///
/// ```
/// use pv_fs::{FileSystem, MemoryFileSystem};
///
/// let fs = MemoryFileSystem::new()
///     .with_file("docs/guide.md", "# Guide")
///     .with_file("docs/api/index.md", "# API");
///
/// assert_eq!(fs.read_dir("docs").unwrap(), vec!["api/", "guide.md"]);
/// ```
#[derive(Debug)]
pub struct MemoryFileSystem {
    identity: String,
    files: RwLock<BTreeMap<String, MemoryFile>>,
}

impl Default for MemoryFileSystem {
    fn default() -> Self {
        Self {
            identity: "memory".to_owned(),
            files: RwLock::new(BTreeMap::new()),
        }
    }
}

impl MemoryFileSystem {
    /// Create an empty file system.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the identity (default `"memory"`).
    #[must_use]
    pub fn with_identity(mut self, identity: impl Into<String>) -> Self {
        self.identity = identity.into();
        self
    }

    /// Add a file at version `"0"`.
    #[must_use]
    pub fn with_file(self, path: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        self.write(path, content, "0");
        self
    }

    /// Create or replace a file.
    pub fn write(
        &self,
        path: impl Into<String>,
        content: impl Into<Vec<u8>>,
        version: impl Into<String>,
    ) {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(
                path.into(),
                MemoryFile {
                    content: content.into(),
                    version: version.into(),
                },
            );
    }

    /// Remove a file. Returns whether it existed.
    pub fn remove(&self, path: &str) -> bool {
        self.files
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(path)
            .is_some()
    }
}

impl FileSystem for MemoryFileSystem {
    fn read(&self, paths: &BTreeSet<String>) -> Pending<PatchedContent> {
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        let result: Result<PatchedContent, PatchError> = paths
            .iter()
            .map(|path| {
                files
                    .get(path)
                    .map(|file| (path.clone(), file.content.clone()))
                    .ok_or_else(|| PatchError::not_found(path.clone()))
            })
            .collect();
        Pending::from_result(result)
    }

    fn read_dir(&self, dir: &str) -> Result<Vec<String>, PatchError> {
        let prefix = dir_prefix(dir);
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        let children: BTreeSet<&str> = files
            .keys()
            .filter_map(|path| child_of(&prefix, path))
            .collect();

        if children.is_empty() && !prefix.is_empty() {
            return Err(PatchError::not_found(prefix));
        }
        Ok(children.into_iter().map(str::to_owned).collect())
    }

    fn stat(&self, path: &str) -> Result<StatInfo, PatchError> {
        let files = self.files.read().unwrap_or_else(PoisonError::into_inner);
        if let Some(file) = files.get(path) {
            return Ok(StatInfo::new(file.version.clone()));
        }

        // A directory's version joins the versions of everything beneath it
        let prefix = dir_prefix(path);
        let versions: Vec<&str> = files
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(&prefix))
            .map(|(_, file)| file.version.as_str())
            .collect();
        if versions.is_empty() {
            return Err(PatchError::not_found(path));
        }
        Ok(StatInfo::new(versions.join(".")))
    }

    fn identity(&self) -> String {
        self.identity.clone()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use pv_patcher::path_set;

    use super::*;

    fn fixture() -> MemoryFileSystem {
        MemoryFileSystem::new()
            .with_file("README.md", "readme")
            .with_file("docs/guide.md", "guide")
            .with_file("docs/api/index.md", "api")
    }

    #[test]
    fn test_read_returns_all_paths() {
        let content = fixture()
            .read(&path_set(["README.md", "docs/guide.md"]))
            .get()
            .unwrap();

        assert_eq!(content["README.md"], b"readme");
        assert_eq!(content["docs/guide.md"], b"guide");
    }

    #[test]
    fn test_read_missing_fails_batch() {
        let err = fixture()
            .read(&path_set(["README.md", "missing.md"]))
            .get()
            .unwrap_err();

        assert!(matches!(err, PatchError::FileNotFound(path) if path == "missing.md"));
    }

    #[test]
    fn test_read_dir() {
        let fs = fixture();

        assert_eq!(fs.read_dir("").unwrap(), vec!["README.md", "docs/"]);
        assert_eq!(fs.read_dir("docs/").unwrap(), vec!["api/", "guide.md"]);
        assert!(fs.read_dir("nope").unwrap_err().is_not_found());
    }

    #[test]
    fn test_stat_changes_with_write() {
        let fs = fixture();
        assert_eq!(fs.stat("docs/guide.md").unwrap().version, "0");

        fs.write("docs/guide.md", "guide v2", "1");

        assert_eq!(fs.stat("docs/guide.md").unwrap().version, "1");
    }

    #[test]
    fn test_stat_directory_tracks_children() {
        let fs = fixture();
        let before = fs.stat("docs/").unwrap();

        fs.write("docs/api/index.md", "api v2", "7");

        assert_ne!(fs.stat("docs").unwrap(), before);
    }

    #[test]
    fn test_stat_missing() {
        assert!(fixture().stat("nope.md").unwrap_err().is_not_found());
        assert!(MemoryFileSystem::new().stat("").unwrap_err().is_not_found());
    }

    #[test]
    fn test_remove() {
        let fs = fixture();

        assert!(fs.remove("README.md"));
        assert!(!fs.remove("README.md"));
        assert_eq!(fs.read_dir("").unwrap(), vec!["docs/"]);
    }
}
