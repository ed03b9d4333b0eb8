//! CLI error types.

use pv_config::ConfigError;
use pv_patcher::PatchError;

/// CLI error type.
#[derive(Debug, thiserror::Error)]
pub(crate) enum CliError {
    #[error("{0}")]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Patch(#[from] PatchError),

    #[error("{0}")]
    Io(#[from] std::io::Error),
}
