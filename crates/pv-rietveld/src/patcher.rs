//! [`Patcher`] over a Rietveld issue.

use std::collections::BTreeSet;
use std::sync::Arc;

use pv_patcher::{
    PatchError, PatchVersion, PatchedContent, PatchedFileSet, Patcher, Pending,
};

use crate::api;
use crate::fetcher::Fetcher;
use crate::tarball;

/// Reads the latest patchset of one Rietveld issue.
///
/// The version is the latest patchset id. Patched content comes from the
/// patchset tarball, downloaded on a worker thread so that [`Patcher::apply`]
/// returns immediately.
#[derive(Clone)]
pub struct RietveldPatcher {
    issue: String,
    fetcher: Arc<dyn Fetcher>,
    path_prefix: String,
    base_url: Option<String>,
}

impl RietveldPatcher {
    /// Create a patcher for `issue`, fetching through `fetcher`.
    pub fn new(issue: impl Into<String>, fetcher: Arc<dyn Fetcher>) -> Self {
        Self {
            issue: issue.into(),
            fetcher,
            path_prefix: String::new(),
            base_url: None,
        }
    }

    /// Only expose files under `prefix`, with the prefix stripped.
    #[must_use]
    pub fn with_path_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.path_prefix = prefix.into();
        self
    }

    /// Reject issues that do not target the repository at `base_url`.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    fn resolve(&self, version: Option<&PatchVersion>) -> Result<PatchVersion, PatchError> {
        match version {
            Some(version) => Ok(version.clone()),
            None => self.version(),
        }
    }

    /// Download the tarball of `version` and collect `paths`.
    fn fetch_content(
        &self,
        paths: &BTreeSet<String>,
        version: Option<&PatchVersion>,
    ) -> Result<PatchedContent, PatchError> {
        let version = self.resolve(version)?;
        let archive = self
            .fetcher
            .fetch(&format!("tarball/{}/{version}", self.issue))?;
        let mut content = tarball::extract(&archive, &self.path_prefix, paths)?;

        tracing::debug!(
            issue = %self.issue,
            patchset = %version,
            requested = paths.len(),
            found = content.len(),
            "Extracted patch tarball"
        );

        if content.len() < paths.len() {
            // Deleted files carry no patched revision
            let files = self.patched_files(Some(&version))?;
            for path in paths {
                if content.contains_key(path) {
                    continue;
                }
                if !files.deleted().contains(path) {
                    return Err(PatchError::not_found(format!(
                        "{path} (issue {} patchset {version})",
                        self.issue
                    )));
                }
                content.insert(path.clone(), Vec::new());
            }
        }

        Ok(content)
    }
}

impl Patcher for RietveldPatcher {
    fn version(&self) -> Result<PatchVersion, PatchError> {
        let body = self.fetcher.fetch(&format!("api/{}", self.issue))?;
        api::parse_version(&body, &self.issue, self.base_url.as_deref())
    }

    fn patched_files(&self, version: Option<&PatchVersion>) -> Result<PatchedFileSet, PatchError> {
        let version = self.resolve(version)?;
        let body = self
            .fetcher
            .fetch(&format!("api/{}/{version}", self.issue))?;
        api::parse_file_list(&body, &self.issue, &self.path_prefix)
    }

    fn apply(
        &self,
        paths: &BTreeSet<String>,
        version: Option<&PatchVersion>,
    ) -> Pending<PatchedContent> {
        if paths.is_empty() {
            return Pending::ready(PatchedContent::new());
        }

        let patcher = self.clone();
        let paths = paths.clone();
        let version = version.cloned();
        Pending::spawn(&format!("rietveld-{}", self.issue), move || {
            patcher.fetch_content(&paths, version.as_ref())
        })
    }

    /// `<server>#<issue>#<prefix>`: the same issue read from another server
    /// or under another prefix yields different content.
    fn identity(&self) -> String {
        format!(
            "{}#{}#{}",
            self.fetcher.server(),
            self.issue,
            self.path_prefix
        )
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use pretty_assertions::assert_eq;
    use pv_patcher::{CachingPatcher, path_set};
    use pv_store::MemoryStore;

    use super::*;
    use crate::tarball::testing::tarball;

    const SERVER: &str = "https://review.example.org";

    /// Serves canned responses and records requested paths.
    struct StaticFetcher {
        server: String,
        responses: HashMap<String, Vec<u8>>,
        requests: Mutex<Vec<String>>,
    }

    impl Default for StaticFetcher {
        fn default() -> Self {
            Self {
                server: SERVER.to_owned(),
                responses: HashMap::new(),
                requests: Mutex::new(Vec::new()),
            }
        }
    }

    impl StaticFetcher {
        fn on(mut self, server: &str) -> Self {
            self.server = server.to_owned();
            self
        }

        fn with(mut self, path: &str, body: impl Into<Vec<u8>>) -> Self {
            self.responses.insert(path.to_owned(), body.into());
            self
        }

        fn requests(&self) -> Vec<String> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Fetcher for StaticFetcher {
        fn fetch(&self, path: &str) -> Result<Vec<u8>, PatchError> {
            self.requests.lock().unwrap().push(path.to_owned());
            self.responses
                .get(path)
                .cloned()
                .ok_or_else(|| PatchError::fetch(format!("GET {path} returned 404")))
        }

        fn server(&self) -> &str {
            &self.server
        }
    }

    fn issue_fetcher() -> StaticFetcher {
        StaticFetcher::default()
            .with(
                "api/123",
                r#"{"patchsets": [10, 20], "base_url": "https://src.example.org"}"#,
            )
            .with(
                "api/123/20",
                r#"{"files": {
                    "docs/add.md": {"status": "A"},
                    "docs/del.md": {"status": "D"},
                    "docs/mod.md": {"status": "M"},
                    "src/lib.rs": {"status": "M"}
                }}"#,
            )
            .with(
                "tarball/123/20",
                tarball(&[
                    ("a/docs/mod.md", "before"),
                    ("b/docs/add.md", "added"),
                    ("b/docs/mod.md", "after"),
                    ("b/src/lib.rs", "code"),
                ]),
            )
    }

    fn patcher(fetcher: &Arc<StaticFetcher>) -> RietveldPatcher {
        RietveldPatcher::new("123", Arc::clone(fetcher) as Arc<dyn Fetcher>)
            .with_path_prefix("docs/")
    }

    #[test]
    fn test_version_is_latest_patchset() {
        let fetcher = Arc::new(issue_fetcher());

        assert_eq!(patcher(&fetcher).version().unwrap().as_str(), "20");
    }

    #[test]
    fn test_base_url_mismatch() {
        let fetcher = Arc::new(issue_fetcher());
        let patcher = patcher(&fetcher).with_base_url("https://elsewhere.example.org");

        assert!(matches!(patcher.version(), Err(PatchError::Parse(_))));
    }

    #[test]
    fn test_patched_files_resolves_version() {
        let fetcher = Arc::new(issue_fetcher());

        let files = patcher(&fetcher).patched_files(None).unwrap();

        assert_eq!(files.added(), &path_set(["add.md"]));
        assert_eq!(files.deleted(), &path_set(["del.md"]));
        assert_eq!(files.modified(), &path_set(["mod.md"]));
        assert_eq!(fetcher.requests(), vec!["api/123", "api/123/20"]);
    }

    #[test]
    fn test_patched_files_explicit_version() {
        let fetcher = Arc::new(issue_fetcher());
        let version = PatchVersion::new("20");

        patcher(&fetcher).patched_files(Some(&version)).unwrap();

        assert_eq!(fetcher.requests(), vec!["api/123/20"]);
    }

    #[test]
    fn test_apply_reads_tarball() {
        let fetcher = Arc::new(issue_fetcher());
        let version = PatchVersion::new("20");

        let content = patcher(&fetcher)
            .apply(&path_set(["add.md", "mod.md"]), Some(&version))
            .get()
            .unwrap();

        assert_eq!(content["add.md"], b"added");
        assert_eq!(content["mod.md"], b"after");
        assert_eq!(fetcher.requests(), vec!["tarball/123/20"]);
    }

    #[test]
    fn test_apply_deleted_is_empty() {
        let fetcher = Arc::new(issue_fetcher());
        let version = PatchVersion::new("20");

        let content = patcher(&fetcher)
            .apply(&path_set(["del.md", "add.md"]), Some(&version))
            .get()
            .unwrap();

        assert_eq!(content["del.md"], b"");
        assert_eq!(content["add.md"], b"added");
    }

    #[test]
    fn test_apply_unknown_path_fails_batch() {
        let fetcher = Arc::new(issue_fetcher());

        let err = patcher(&fetcher)
            .apply(&path_set(["add.md", "nope.md"]), None)
            .get()
            .unwrap_err();

        assert!(err.is_not_found());
    }

    #[test]
    fn test_apply_empty_set_does_not_fetch() {
        let fetcher = Arc::new(issue_fetcher());

        let content = patcher(&fetcher).apply(&BTreeSet::new(), None).get().unwrap();

        assert!(content.is_empty());
        assert!(fetcher.requests().is_empty());
    }

    #[test]
    fn test_apply_fetch_failure() {
        let fetcher = Arc::new(StaticFetcher::default().with("api/123", r#"{"patchsets": [1]}"#));

        let err = patcher(&fetcher)
            .apply(&path_set(["add.md"]), None)
            .get()
            .unwrap_err();

        assert!(matches!(err, PatchError::Fetch { .. }));
    }

    #[test]
    fn test_identity_includes_server_and_prefix() {
        let fetcher = Arc::new(issue_fetcher());
        let other = Arc::new(issue_fetcher().on("https://mirror.example.org"));

        let docs = patcher(&fetcher);
        let root = RietveldPatcher::new("123", Arc::clone(&fetcher) as Arc<dyn Fetcher>);
        let mirrored = patcher(&other);

        assert_eq!(docs.identity(), "https://review.example.org#123#docs/");
        assert_eq!(root.identity(), "https://review.example.org#123#");
        assert_eq!(mirrored.identity(), "https://mirror.example.org#123#docs/");
    }

    #[test]
    fn test_prefixes_do_not_share_cache() {
        let fetcher = Arc::new(
            StaticFetcher::default()
                .with("api/123", r#"{"patchsets": [5]}"#)
                .with(
                    "tarball/123/5",
                    tarball(&[("b/docs/a.md", "DOCS"), ("b/a.md", "ROOT")]),
                ),
        );
        let store = MemoryStore::new();
        let docs = CachingPatcher::new(Arc::new(patcher(&fetcher)), &store);
        let root = CachingPatcher::new(
            Arc::new(RietveldPatcher::new(
                "123",
                Arc::clone(&fetcher) as Arc<dyn Fetcher>,
            )),
            &store,
        );

        let from_docs = docs.apply(&path_set(["a.md"]), None).get().unwrap();
        let from_root = root.apply(&path_set(["a.md"]), None).get().unwrap();

        assert_eq!(from_docs["a.md"], b"DOCS");
        assert_eq!(from_root["a.md"], b"ROOT");
        assert_eq!(
            fetcher
                .requests()
                .iter()
                .filter(|path| path.starts_with("tarball/"))
                .count(),
            2
        );
    }
}
