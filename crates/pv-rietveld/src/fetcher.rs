//! Transport for Rietveld requests.

use std::time::Duration;

use pv_patcher::PatchError;
use ureq::Agent;

/// Default HTTP deadline in seconds.
pub const DEFAULT_TIMEOUT: u64 = 20;

/// Upper bound on a response body (patch tarballs can be large).
const MAX_BODY_BYTES: u64 = 64 * 1024 * 1024;

/// Fetches raw response bodies from a code review server.
///
/// Paths are relative to the server root (e.g., `"api/12345"`).
pub trait Fetcher: Send + Sync {
    /// Fetch the body at `path`.
    ///
    /// # Errors
    ///
    /// Returns [`PatchError::Fetch`] on transport failure or a non-success
    /// status.
    fn fetch(&self, path: &str) -> Result<Vec<u8>, PatchError>;

    /// Root URL of the server, without a trailing slash.
    fn server(&self) -> &str;
}

/// [`Fetcher`] over HTTP(S).
pub struct HttpFetcher {
    agent: Agent,
    base_url: String,
}

impl HttpFetcher {
    /// Create a fetcher for the server at `base_url`.
    ///
    /// Every request is bounded by `timeout` end to end.
    #[must_use]
    pub fn new(base_url: &str, timeout: Duration) -> Self {
        let agent = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            agent,
            base_url: base_url.trim_end_matches('/').to_owned(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }
}

impl Fetcher for HttpFetcher {
    fn fetch(&self, path: &str) -> Result<Vec<u8>, PatchError> {
        let url = self.url(path);
        tracing::debug!(url = %url, "Fetching");

        let response = self
            .agent
            .get(&url)
            .call()
            .map_err(|e| PatchError::fetch_with_source(format!("GET {url}"), e))?;

        let status = response.status().as_u16();
        let mut body = response.into_body();

        if !(200..300).contains(&status) {
            let error_body = body
                .read_to_string()
                .unwrap_or_else(|_| "(unable to read error body)".to_owned());
            return Err(PatchError::fetch(format!(
                "GET {url} returned {status}: {error_body}"
            )));
        }

        body.with_config()
            .limit(MAX_BODY_BYTES)
            .read_to_vec()
            .map_err(|e| PatchError::fetch_with_source(format!("reading body of GET {url}"), e))
    }

    fn server(&self) -> &str {
        &self.base_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let fetcher = HttpFetcher::new("https://codereview.example.org/", Duration::from_secs(1));

        assert_eq!(
            fetcher.url("/api/12345"),
            "https://codereview.example.org/api/12345"
        );
        assert_eq!(
            fetcher.url("tarball/1/2"),
            "https://codereview.example.org/tarball/1/2"
        );
        assert_eq!(fetcher.server(), "https://codereview.example.org");
    }

    #[test]
    fn test_unreachable_server_is_fetch_error() {
        // Port 9 (discard) on localhost is closed in test environments
        let fetcher = HttpFetcher::new("http://127.0.0.1:9", Duration::from_secs(2));

        let err = fetcher.fetch("api/1").unwrap_err();

        assert!(matches!(err, PatchError::Fetch { .. }));
    }
}
