//! Patch tarball extraction.
//!
//! Rietveld serves each patchset as a gzip-compressed tar holding the base
//! revision under `a/` and the patched revision under `b/`.

use std::collections::{BTreeMap, BTreeSet};
use std::io::Read;

use flate2::read::GzDecoder;
use pv_patcher::PatchError;
use tar::Archive;

/// Archive path of the patched revision of `path`.
pub(crate) fn patched_entry(prefix: &str, path: &str) -> String {
    format!("b/{prefix}{path}")
}

/// Read the patched revision of each of `paths` from `archive`.
///
/// Paths absent from the archive are absent from the result.
pub(crate) fn extract(
    archive: &[u8],
    prefix: &str,
    paths: &BTreeSet<String>,
) -> Result<BTreeMap<String, Vec<u8>>, PatchError> {
    let wanted: BTreeMap<String, &String> = paths
        .iter()
        .map(|path| (patched_entry(prefix, path), path))
        .collect();

    let mut tar = Archive::new(GzDecoder::new(archive));
    let entries = tar
        .entries()
        .map_err(|e| PatchError::parse(format!("cannot open patch tarball: {e}")))?;

    let mut found = BTreeMap::new();
    for entry in entries {
        let mut entry =
            entry.map_err(|e| PatchError::parse(format!("corrupt patch tarball: {e}")))?;
        if !entry.header().entry_type().is_file() {
            continue;
        }

        let entry_path = entry
            .path()
            .map_err(|e| PatchError::parse(format!("corrupt patch tarball: {e}")))?
            .to_string_lossy()
            .into_owned();
        let Some(&path) = wanted.get(&entry_path) else {
            continue;
        };

        let mut data = Vec::new();
        entry
            .read_to_end(&mut data)
            .map_err(|e| PatchError::parse(format!("cannot extract {entry_path}: {e}")))?;
        found.insert(path.clone(), data);

        if found.len() == wanted.len() {
            break;
        }
    }

    Ok(found)
}
