//! Base file system with a patch set overlaid.

use std::collections::BTreeSet;

use pv_patcher::{
    FileStatus, PatchError, PatchVersion, PatchedContent, PatchedFileSet, Patcher, Pending,
};

use crate::{FileSystem, StatInfo, child_of, dir_prefix};

/// Presents `base` as it would look with `patcher`'s patch set applied.
///
/// - Added and modified files are read through the patcher.
/// - Deleted files are not found, and vanish from directory listings.
/// - Everything else comes from `base`.
///
/// Versions of patched paths combine the base version with the patch
/// version, so they change whenever either side does. Wrap the patcher in a
/// [`pv_patcher::CachingPatcher`] to avoid refetching on every call.
pub struct PatchedFileSystem<F, P> {
    base: F,
    patcher: P,
}

impl<F: FileSystem, P: Patcher> PatchedFileSystem<F, P> {
    /// Overlay `patcher` on `base`.
    pub fn new(base: F, patcher: P) -> Self {
        Self { base, patcher }
    }

    /// Current version and its file listing.
    fn snapshot(&self) -> Result<(PatchVersion, PatchedFileSet), PatchError> {
        let version = self.patcher.version()?;
        let files = self.patcher.patched_files(Some(&version))?;
        Ok((version, files))
    }

    fn read_patched(&self, paths: &BTreeSet<String>) -> Result<Pending<PatchedContent>, PatchError> {
        let (version, files) = self.snapshot()?;

        let mut patched = BTreeSet::new();
        let mut unchanged = BTreeSet::new();
        for path in paths {
            match files.status(path) {
                Some(FileStatus::Deleted) => return Err(PatchError::not_found(path.clone())),
                Some(FileStatus::Added | FileStatus::Modified) => {
                    patched.insert(path.clone());
                }
                None => {
                    unchanged.insert(path.clone());
                }
            }
        }

        tracing::debug!(
            version = %version,
            patched = patched.len(),
            unchanged = unchanged.len(),
            "Reading through patch"
        );

        let from_patch = self.patcher.apply(&patched, Some(&version));
        if unchanged.is_empty() {
            return Ok(from_patch);
        }
        let from_base = self.base.read(&unchanged);
        Ok(from_patch.and_then(move |mut content| {
            content.extend(from_base.get()?);
            Ok(content)
        }))
    }
}

impl<F: FileSystem, P: Patcher> FileSystem for PatchedFileSystem<F, P> {
    fn read(&self, paths: &BTreeSet<String>) -> Pending<PatchedContent> {
        self.read_patched(paths).unwrap_or_else(Pending::failed)
    }

    fn read_dir(&self, dir: &str) -> Result<Vec<String>, PatchError> {
        let (_, files) = self.snapshot()?;
        let prefix = dir_prefix(dir);

        let added: BTreeSet<&str> = files
            .added()
            .iter()
            .filter_map(|path| child_of(&prefix, path))
            .collect();

        let mut children: BTreeSet<String> = match self.base.read_dir(dir) {
            Ok(children) => children.into_iter().collect(),
            Err(e) if e.is_not_found() && !added.is_empty() => BTreeSet::new(),
            Err(e) => return Err(e),
        };

        children.extend(added.into_iter().map(str::to_owned));
        for path in files.deleted() {
            if let Some(name) = path.strip_prefix(&prefix)
                && !name.contains('/')
            {
                children.remove(name);
            }
        }

        Ok(children.into_iter().collect())
    }

    fn stat(&self, path: &str) -> Result<StatInfo, PatchError> {
        let (version, files) = self.snapshot()?;

        match files.status(path) {
            Some(FileStatus::Deleted) => Err(PatchError::not_found(path)),
            Some(FileStatus::Added) => Ok(StatInfo::new(version.as_str())),
            Some(FileStatus::Modified) => {
                let base = self.base.stat(path)?;
                Ok(StatInfo::new(format!("{}:{version}", base.version)))
            }
            None if path.ends_with('/') || path.is_empty() => {
                // A directory changes with any patched file beneath it
                let prefix = dir_prefix(path);
                let touched = files.all().any(|p| p.starts_with(&prefix));
                match self.base.stat(path) {
                    Ok(base) if touched => Ok(StatInfo::new(format!("{}:{version}", base.version))),
                    Ok(base) => Ok(base),
                    Err(e) if e.is_not_found() && touched => Ok(StatInfo::new(version.as_str())),
                    Err(e) => Err(e),
                }
            }
            None => self.base.stat(path),
        }
    }

    fn identity(&self) -> String {
        format!("{}/{}", self.base.identity(), self.patcher.identity())
    }
}
