//! Terminal output utilities.

use std::io::Write;

use console::{Style, Term};

/// Terminal output formatter.
///
/// Command results go to stdout; diagnostics go to stderr.
pub(crate) struct Output {
    out: Term,
    err: Term,
    red: Style,
}

impl Output {
    /// Create a new output formatter.
    #[must_use]
    pub(crate) fn new() -> Self {
        Self {
            out: Term::stdout(),
            err: Term::stderr(),
            red: Style::new().red(),
        }
    }

    /// Print one line of command output.
    pub(crate) fn line(&self, msg: &str) -> std::io::Result<()> {
        self.out.write_line(msg)
    }

    /// Write raw file content to stdout.
    pub(crate) fn bytes(&self, data: &[u8]) -> std::io::Result<()> {
        let mut out = &self.out;
        out.write_all(data)?;
        out.flush()
    }

    /// Print an error message (red).
    pub(crate) fn error(&self, msg: &str) {
        let _ = self.err.write_line(&self.red.apply_to(msg).to_string());
    }
}
