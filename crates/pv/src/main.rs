//! patchview CLI.
//!
//! Reads a file tree as it would look with a code review patch applied:
//! - `version`: current patch version
//! - `files`: files touched by the patch
//! - `cat`: patched file content
//! - `stat`: patched file version
//! - `ls`: patched directory listing

mod backend;
mod commands;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use commands::{Command, SourceArgs};
use output::Output;

/// patchview - browse a file tree with a code review patch applied.
#[derive(Parser)]
#[command(name = "pv", version, about)]
struct Cli {
    #[command(flatten)]
    source: SourceArgs,

    /// Enable info-level logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

fn main() {
    let cli = Cli::parse();
    let output = Output::new();

    // --verbose enables INFO level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.verbose {
        EnvFilter::new("info")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = cli.command.execute(&cli.source) {
        output.error(&format!("Error: {err}"));
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_cat_with_overrides() {
        let cli = Cli::try_parse_from([
            "pv", "cat", "a.md", "b.md", "--fixture", "patch.json", "--no-cache",
        ])
        .unwrap();

        assert!(matches!(cli.command, Command::Cat { ref paths } if paths.len() == 2));
    }

    #[test]
    fn test_cat_requires_path() {
        assert!(Cli::try_parse_from(["pv", "cat"]).is_err());
    }

    #[test]
    fn test_issue_conflicts_with_fixture() {
        let result = Cli::try_parse_from([
            "pv", "version", "--issue", "1", "--fixture", "patch.json",
        ]);
        assert!(result.is_err());
    }
}
