//! Rietveld JSON API responses.
//!
//! - `GET /api/<issue>` lists the issue's patchsets (oldest first) and the
//!   repository it applies to.
//! - `GET /api/<issue>/<patchset>` maps every changed file to its status
//!   letter(s): `A` added, `D` deleted, `M` modified, optionally followed by
//!   a copy marker (`"A +"`).

use std::collections::BTreeMap;

use pv_patcher::{PatchError, PatchVersion, PatchedFileSet};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct IssueResponse {
    #[serde(default)]
    patchsets: Option<Vec<u64>>,
    #[serde(default)]
    base_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct PatchsetResponse {
    #[serde(default)]
    files: Option<BTreeMap<String, FileEntry>>,
}

#[derive(Debug, Deserialize)]
struct FileEntry {
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    is_binary: bool,
}

/// Extract the latest patchset of `issue` as its version token.
///
/// When `expected_base_url` is set, the issue must target that repository.
pub(crate) fn parse_version(
    body: &[u8],
    issue: &str,
    expected_base_url: Option<&str>,
) -> Result<PatchVersion, PatchError> {
    let response: IssueResponse = serde_json::from_slice(body)
        .map_err(|e| PatchError::parse(format!("cannot parse issue {issue}: {e}")))?;

    if let Some(expected) = expected_base_url {
        let actual = response.base_url.as_deref().unwrap_or_default();
        if actual != expected {
            return Err(PatchError::parse(format!(
                "issue {issue}'s base url ({actual}) is unknown"
            )));
        }
    }

    response
        .patchsets
        .and_then(|sets| sets.last().copied())
        .map(|id| PatchVersion::new(id.to_string()))
        .ok_or_else(|| PatchError::parse(format!("issue {issue} has no patchsets")))
}

/// Classify the files of one patchset.
///
/// Only files under `prefix` are reported, with the prefix stripped. Binary
/// files are skipped.
pub(crate) fn parse_file_list(
    body: &[u8],
    issue: &str,
    prefix: &str,
) -> Result<PatchedFileSet, PatchError> {
    let response: PatchsetResponse = serde_json::from_slice(body)
        .map_err(|e| PatchError::parse(format!("cannot parse patchset of issue {issue}: {e}")))?;
    let files = response
        .files
        .ok_or_else(|| PatchError::parse(format!("patchset of issue {issue} lists no files")))?;

    let mut added = Vec::new();
    let mut deleted = Vec::new();
    let mut modified = Vec::new();

    for (key, entry) in files {
        let Some(path) = key.strip_prefix(prefix) else {
            continue;
        };
        if path.is_empty() || entry.is_binary {
            continue;
        }

        let status = entry.status.as_deref().unwrap_or_default();
        if status.contains('A') {
            added.push(path.to_owned());
        } else if status.contains('D') {
            deleted.push(path.to_owned());
        } else if status.contains('M') {
            modified.push(path.to_owned());
        } else {
            return Err(PatchError::parse(format!(
                "unknown file status for file {key}: \"{status}\""
            )));
        }
    }

    PatchedFileSet::new(added, deleted, modified)
}
