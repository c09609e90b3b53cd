//! Line-oriented writers for command output.

use std::fmt;
use std::io::Write;

use tracing::debug;

use crate::{AppError, CLI_TARGET};

/// Borrowed standard streams for one invocation.
pub(crate) struct Output<'a, W: Write, E: Write> {
    stdout: &'a mut W,
    stderr: &'a mut E,
}

impl<'a, W: Write, E: Write> Output<'a, W, E> {
    pub(crate) const fn new(stdout: &'a mut W, stderr: &'a mut E) -> Self {
        Self { stdout, stderr }
    }

    pub(crate) fn line(&mut self, args: fmt::Arguments<'_>) -> Result<(), AppError> {
        self.stdout.write_fmt(args).map_err(AppError::Output)?;
        self.stdout.write_all(b"\n").map_err(AppError::Output)?;
        self.stdout.flush().map_err(AppError::Output)
    }

    /// Writes raw text to stdout without adding a newline.
    pub(crate) fn text(&mut self, text: &str) -> Result<(), AppError> {
        self.stdout
            .write_all(text.as_bytes())
            .map_err(AppError::Output)?;
        self.stdout.flush().map_err(AppError::Output)
    }

    pub(crate) fn warning(&mut self, args: fmt::Arguments<'_>) -> Result<(), AppError> {
        self.stderr.write_all(b"warning: ").map_err(AppError::Output)?;
        self.stderr.write_fmt(args).map_err(AppError::Output)?;
        self.stderr.write_all(b"\n").map_err(AppError::Output)?;
        self.stderr.flush().map_err(AppError::Output)
    }

    /// Reports a failure on stderr. Write errors are only logged because
    /// there is nowhere left to send them.
    pub(crate) fn failure(&mut self, error: &AppError) {
        if let Err(write_error) = writeln!(self.stderr, "{error}") {
            debug!(target: CLI_TARGET, %write_error, %error, "failed to report error");
        }
    }
}

/// Renders a boolean the way status listings show it.
pub(crate) const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn warnings_are_prefixed_on_stderr() {
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let mut output = Output::new(&mut stdout, &mut stderr);
        output
            .warning(format_args!("{} failed logins", 4))
            .expect("write");
        assert!(stdout.is_empty());
        assert_eq!(String::from_utf8(stderr).expect("utf8"), "warning: 4 failed logins\n");
    }
}
