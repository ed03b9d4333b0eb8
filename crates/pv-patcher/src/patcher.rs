//! Patcher trait and patch set data model.
//!
//! # Path Convention
//!
//! All paths are POSIX-style and relative to the repository root
//! (`"docs/guide/index.md"`), never absolute and never `./`-prefixed.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::{PatchError, Pending};

/// Opaque token identifying the current state of a patch set.
///
/// A token observed once never changes meaning; a different token means the
/// patch set was updated and everything derived from the old one is stale.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PatchVersion(String);

impl PatchVersion {
    /// Create a version token.
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self(token.into())
    }

    /// The raw token.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PatchVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PatchVersion {
    fn from(token: &str) -> Self {
        Self::new(token)
    }
}

impl From<String> for PatchVersion {
    fn from(token: String) -> Self {
        Self(token)
    }
}

/// How a path is changed by a patch set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileStatus {
    /// The file does not exist in the base tree.
    Added,
    /// The file is removed by the patch.
    Deleted,
    /// The file exists in the base tree and its content changes.
    Modified,
}

/// Paths changed by a patch set.
///
/// The three sets are pairwise disjoint; construction and deserialization
/// reject any path that appears in more than one of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "RawFileSet")]
pub struct PatchedFileSet {
    added: BTreeSet<String>,
    deleted: BTreeSet<String>,
    modified: BTreeSet<String>,
}

#[derive(Deserialize)]
struct RawFileSet {
    #[serde(default)]
    added: BTreeSet<String>,
    #[serde(default)]
    deleted: BTreeSet<String>,
    #[serde(default)]
    modified: BTreeSet<String>,
}

impl TryFrom<RawFileSet> for PatchedFileSet {
    type Error = PatchError;

    fn try_from(raw: RawFileSet) -> Result<Self, Self::Error> {
        Self::new(raw.added, raw.deleted, raw.modified)
    }
}

impl PatchedFileSet {
    /// Build a file set, checking that no path is listed twice.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::Parse`] naming the first path found in more
    /// than one category.
    pub fn new<A, D, M>(added: A, deleted: D, modified: M) -> Result<Self, PatchError>
    where
        A: IntoIterator,
        A::Item: Into<String>,
        D: IntoIterator,
        D::Item: Into<String>,
        M: IntoIterator,
        M::Item: Into<String>,
    {
        let added: BTreeSet<String> = added.into_iter().map(Into::into).collect();
        let deleted: BTreeSet<String> = deleted.into_iter().map(Into::into).collect();
        let modified: BTreeSet<String> = modified.into_iter().map(Into::into).collect();

        let overlap = added
            .intersection(&deleted)
            .chain(added.intersection(&modified))
            .chain(deleted.intersection(&modified))
            .next();
        if let Some(path) = overlap {
            return Err(PatchError::parse(format!(
                "{path} is listed under more than one change type"
            )));
        }

        Ok(Self {
            added,
            deleted,
            modified,
        })
    }

    /// Paths the patch creates.
    #[must_use]
    pub fn added(&self) -> &BTreeSet<String> {
        &self.added
    }

    /// Paths the patch removes.
    #[must_use]
    pub fn deleted(&self) -> &BTreeSet<String> {
        &self.deleted
    }

    /// Paths the patch changes in place.
    #[must_use]
    pub fn modified(&self) -> &BTreeSet<String> {
        &self.modified
    }

    /// How `path` is affected, or `None` if the patch does not touch it.
    #[must_use]
    pub fn status(&self, path: &str) -> Option<FileStatus> {
        if self.added.contains(path) {
            Some(FileStatus::Added)
        } else if self.deleted.contains(path) {
            Some(FileStatus::Deleted)
        } else if self.modified.contains(path) {
            Some(FileStatus::Modified)
        } else {
            None
        }
    }

    /// Every path the patch touches.
    pub fn all(&self) -> impl Iterator<Item = &String> {
        self.added.iter().chain(&self.deleted).chain(&self.modified)
    }

    /// Whether the patch touches no files.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty() && self.modified.is_empty()
    }
}

/// Patched bytes for every requested path.
pub type PatchedContent = BTreeMap<String, Vec<u8>>;

/// Access to a patch set: its version, its changed files, and the content of
/// files with the patch applied.
///
/// Operations that take `version: Option<&PatchVersion>` resolve `None` to the
/// current version. Passing the version observed earlier keeps a sequence of
/// calls consistent with one state of the patch set.
pub trait Patcher: Send + Sync {
    /// Fetch the current version token.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::Fetch`] if the backing service is unreachable.
    fn version(&self) -> Result<PatchVersion, PatchError>;

    /// Fetch the paths added, deleted, and modified by the patch set.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::Fetch`] on I/O failure and [`PatchError::Parse`]
    /// if the listing is malformed.
    fn patched_files(&self, version: Option<&PatchVersion>) -> Result<PatchedFileSet, PatchError>;

    /// Start fetching the patched content of `paths`.
    ///
    /// The returned handle resolves to a map containing every requested
    /// path. Deleted paths resolve to empty content. A path unknown to the
    /// patch set fails the whole batch with [`PatchError::FileNotFound`].
    fn apply(
        &self,
        paths: &BTreeSet<String>,
        version: Option<&PatchVersion>,
    ) -> Pending<PatchedContent>;

    /// Identifier unique to this patch set, used to namespace cache keys.
    fn identity(&self) -> String;
}

impl<P: Patcher + ?Sized> Patcher for Arc<P> {
    fn version(&self) -> Result<PatchVersion, PatchError> {
        (**self).version()
    }

    fn patched_files(&self, version: Option<&PatchVersion>) -> Result<PatchedFileSet, PatchError> {
        (**self).patched_files(version)
    }

    fn apply(
        &self,
        paths: &BTreeSet<String>,
        version: Option<&PatchVersion>,
    ) -> Pending<PatchedContent> {
        (**self).apply(paths, version)
    }

    fn identity(&self) -> String {
        (**self).identity()
    }
}

/// Collect path-like arguments into the set form [`Patcher::apply`] takes.
pub fn path_set<I, S>(paths: I) -> BTreeSet<String>
where
    I: IntoIterator<Item = S>,
    S: Into<String>,
{
    paths.into_iter().map(Into::into).collect()
}
