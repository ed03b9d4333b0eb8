//! File system rooted at a local directory.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
use std::time::UNIX_EPOCH;

use pv_patcher::{PatchError, PatchedContent, Pending};

use crate::{FileSystem, StatInfo, dir_prefix};

/// File system over a directory on disk.
///
/// Versions are modification times in nanoseconds since the Unix epoch.
/// Paths containing `..` are rejected.
#[derive(Debug, Clone)]
pub struct LocalFileSystem {
    root: PathBuf,
}

impl LocalFileSystem {
    /// Create a file system rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a relative path, rejecting anything that escapes the root.
    fn resolve(&self, path: &str) -> Result<PathBuf, PatchError> {
        let relative = Path::new(path.trim_start_matches('/'));
        let escapes = relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(PatchError::not_found(path));
        }
        Ok(self.root.join(relative))
    }
}

fn io_error(path: &str, error: io::Error) -> PatchError {
    if error.kind() == io::ErrorKind::NotFound {
        PatchError::not_found(path)
    } else {
        PatchError::fetch_with_source(format!("cannot access {path}"), error)
    }
}

fn read_all(local: &LocalFileSystem, paths: &BTreeSet<String>) -> Result<PatchedContent, PatchError> {
    paths
        .iter()
        .map(|path| {
            let full_path = local.resolve(path)?;
            let content = fs::read(&full_path).map_err(|e| io_error(path, e))?;
            Ok((path.clone(), content))
        })
        .collect()
}

impl FileSystem for LocalFileSystem {
    fn read(&self, paths: &BTreeSet<String>) -> Pending<PatchedContent> {
        let local = self.clone();
        let paths = paths.clone();
        Pending::deferred(move || read_all(&local, &paths))
    }

    fn read_dir(&self, dir: &str) -> Result<Vec<String>, PatchError> {
        let full_path = self.resolve(&dir_prefix(dir))?;
        let entries = fs::read_dir(&full_path).map_err(|e| io_error(dir, e))?;

        let mut children = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| io_error(dir, e))?;
            let file_type = entry.file_type().map_err(|e| io_error(dir, e))?;
            let name = entry.file_name().to_string_lossy().into_owned();
            if file_type.is_dir() {
                children.push(format!("{name}/"));
            } else {
                children.push(name);
            }
        }
        children.sort();
        Ok(children)
    }

    fn stat(&self, path: &str) -> Result<StatInfo, PatchError> {
        let full_path = self.resolve(path)?;
        let modified = fs::metadata(&full_path)
            .and_then(|metadata| metadata.modified())
            .map_err(|e| io_error(path, e))?;
        let nanos = modified
            .duration_since(UNIX_EPOCH)
            .map_or(0, |d| d.as_nanos());
        Ok(StatInfo::new(nanos.to_string()))
    }

    fn identity(&self) -> String {
        self.root.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, SystemTime};

    use pretty_assertions::assert_eq;
    use pv_patcher::path_set;
    use tempfile::TempDir;

    use super::*;

    fn fixture() -> (TempDir, LocalFileSystem) {
        let temp_dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(temp_dir.path().join("docs/api")).unwrap();
        fs::write(temp_dir.path().join("README.md"), "readme").unwrap();
        fs::write(temp_dir.path().join("docs/guide.md"), "guide").unwrap();
        fs::write(temp_dir.path().join("docs/api/index.md"), "api").unwrap();
        let local = LocalFileSystem::new(temp_dir.path());
        (temp_dir, local)
    }

    #[test]
    fn test_read() {
        let (_temp_dir, local) = fixture();

        let content = local
            .read(&path_set(["README.md", "docs/guide.md"]))
            .get()
            .unwrap();

        assert_eq!(content["README.md"], b"readme");
        assert_eq!(content["docs/guide.md"], b"guide");
    }

    #[test]
    fn test_read_missing() {
        let (_temp_dir, local) = fixture();

        let err = local.read(&path_set(["nope.md"])).get().unwrap_err();

        assert!(err.is_not_found());
    }

    #[test]
    fn test_rejects_parent_dir() {
        let (temp_dir, _) = fixture();
        let local = LocalFileSystem::new(temp_dir.path().join("docs"));

        let err = local.read(&path_set(["../README.md"])).get().unwrap_err();
        assert!(err.is_not_found());
        assert!(local.stat("../README.md").unwrap_err().is_not_found());
        assert!(local.read_dir("..").unwrap_err().is_not_found());
    }

    #[test]
    fn test_read_dir() {
        let (_temp_dir, local) = fixture();

        assert_eq!(local.read_dir("").unwrap(), vec!["README.md", "docs/"]);
        assert_eq!(local.read_dir("docs").unwrap(), vec!["api/", "guide.md"]);
        assert!(local.read_dir("missing/").unwrap_err().is_not_found());
    }

    #[test]
    fn test_stat_follows_mtime() {
        let (temp_dir, local) = fixture();
        let before = local.stat("docs/guide.md").unwrap();

        let file = fs::File::options()
            .write(true)
            .open(temp_dir.path().join("docs/guide.md"))
            .unwrap();
        file.set_modified(SystemTime::now() + Duration::from_secs(60))
            .unwrap();

        assert_ne!(local.stat("docs/guide.md").unwrap(), before);
    }

    #[test]
    fn test_stat_missing() {
        let (_temp_dir, local) = fixture();
        assert!(local.stat("nope.md").unwrap_err().is_not_found());
    }
}
