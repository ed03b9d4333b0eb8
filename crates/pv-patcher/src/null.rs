//! Patcher for "no patch applied".

use std::collections::BTreeSet;

use crate::{PatchError, PatchVersion, PatchedContent, PatchedFileSet, Patcher, Pending};

/// [`Patcher`] that represents an empty patch set.
///
/// Its version is always `"0"`, it changes no files, and asking for the
/// patched content of any path is [`PatchError::FileNotFound`].
#[derive(Debug, Default, Clone, Copy)]
pub struct NullPatcher;

impl Patcher for NullPatcher {
    fn version(&self) -> Result<PatchVersion, PatchError> {
        Ok(PatchVersion::from("0"))
    }

    fn patched_files(&self, _version: Option<&PatchVersion>) -> Result<PatchedFileSet, PatchError> {
        Ok(PatchedFileSet::default())
    }

    fn apply(
        &self,
        paths: &BTreeSet<String>,
        _version: Option<&PatchVersion>,
    ) -> Pending<PatchedContent> {
        match paths.first() {
            Some(path) => Pending::failed(PatchError::not_found(path.clone())),
            None => Pending::ready(PatchedContent::new()),
        }
    }

    fn identity(&self) -> String {
        "null".to_owned()
    }
}
