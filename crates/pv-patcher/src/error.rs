//! Error types for patch access.

/// Error from a [`Patcher`](crate::Patcher) operation.
///
/// None of these are ever cached: a caching layer surfaces the same error on
/// every call until the backing service answers successfully.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum PatchError {
    /// The backing service could not be reached or returned a failure status.
    #[error("fetch failed: {message}")]
    Fetch {
        /// What was being fetched and how it failed.
        message: String,
        /// Underlying transport or I/O error.
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// The backing service answered with data in an unexpected shape.
    #[error("parse error: {0}")]
    Parse(String),

    /// The path is not part of the patch set (nor of the base tree).
    ///
    /// Distinct from a deleted path, which reads as empty content.
    #[error("file not found: {0}")]
    FileNotFound(String),
}

impl PatchError {
    /// Create a fetch error without an underlying source.
    #[must_use]
    pub fn fetch(message: impl Into<String>) -> Self {
        Self::Fetch {
            message: message.into(),
            source: None,
        }
    }

    /// Create a fetch error wrapping its cause.
    #[must_use]
    pub fn fetch_with_source(
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Fetch {
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Create a parse error.
    #[must_use]
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse(message.into())
    }

    /// Create a not-found error for `path`.
    #[must_use]
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::FileNotFound(path.into())
    }

    /// Whether this error means "no such file" (a 404 at the serving layer).
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::FileNotFound(_))
    }
}
