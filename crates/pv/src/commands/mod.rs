//! CLI command implementations.

use std::collections::BTreeSet;
use std::path::PathBuf;

use clap::{Args, Subcommand};
use pv_config::{CliSettings, Config};
use pv_fs::FileSystem;
use pv_patcher::{FileStatus, Patcher, path_set};

use crate::backend::Session;
use crate::error::CliError;
use crate::output::Output;

/// Options shared by every command.
#[derive(Args)]
pub(crate) struct SourceArgs {
    /// Path to configuration file (default: auto-discover patchview.toml).
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Rietveld issue to read (overrides config).
    #[arg(long, global = true, env = "PV_ISSUE")]
    issue: Option<String>,

    /// Rietveld server URL (overrides config).
    #[arg(long, global = true)]
    server: Option<String>,

    /// Patch fixture JSON file (overrides config).
    #[arg(long, global = true, conflicts_with = "issue")]
    fixture: Option<PathBuf>,

    /// Directory the patch applies to (overrides config).
    #[arg(long, global = true)]
    base_dir: Option<PathBuf>,

    /// Disable caching.
    #[arg(long, global = true)]
    no_cache: bool,
}

impl SourceArgs {
    fn open(&self) -> Result<Session, CliError> {
        let cli_settings = CliSettings {
            issue: self.issue.clone(),
            server: self.server.clone(),
            fixture: self.fixture.clone(),
            base_dir: self.base_dir.clone(),
            cache_enabled: self.no_cache.then_some(false),
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        Session::open(&config)
    }
}

#[derive(Subcommand)]
pub(crate) enum Command {
    /// Print the current patch version.
    Version,
    /// List the files the patch adds (A), deletes (D), and modifies (M).
    Files,
    /// Print files as they read with the patch applied.
    Cat {
        /// Paths relative to the base directory.
        #[arg(required = true)]
        paths: Vec<String>,
    },
    /// Print the version of a file or directory.
    Stat {
        /// Path relative to the base directory.
        path: String,
    },
    /// List a directory with the patch applied.
    Ls {
        /// Directory relative to the base directory.
        #[arg(default_value = "")]
        dir: String,
    },
}

impl Command {
    pub(crate) fn execute(self, source: &SourceArgs) -> Result<(), CliError> {
        let output = Output::new();
        let session = source.open()?;

        match self {
            Self::Version => {
                output.line(session.patcher.version()?.as_str())?;
            }
            Self::Files => {
                let files = session.patcher.patched_files(None)?;
                let paths: BTreeSet<&String> = files.all().collect();
                for path in paths {
                    let marker = match files.status(path) {
                        Some(FileStatus::Added) => 'A',
                        Some(FileStatus::Deleted) => 'D',
                        Some(FileStatus::Modified) | None => 'M',
                    };
                    output.line(&format!("{marker} {path}"))?;
                }
            }
            Self::Cat { paths } => {
                let content = session.files.read(&path_set(paths.iter().cloned())).get()?;
                for path in &paths {
                    if let Some(data) = content.get(path) {
                        output.bytes(data)?;
                    }
                }
            }
            Self::Stat { path } => {
                output.line(&session.files.stat(&path)?.version)?;
            }
            Self::Ls { dir } => {
                for child in session.files.read_dir(&dir)? {
                    output.line(&child)?;
                }
            }
        }
        Ok(())
    }
}
