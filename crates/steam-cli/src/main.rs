//! Entrypoint for the `steam` command.
//!
//! All work happens in [`steam_cli::run`]; the binary only wires up the
//! process arguments and standard streams.

use std::io::{self, StderrLock, StdoutLock};
use std::process::ExitCode;

fn main() -> ExitCode {
    let mut stdout: StdoutLock<'_> = io::stdout().lock();
    let mut stderr: StderrLock<'_> = io::stderr().lock();
    steam_cli::run(std::env::args_os(), &mut stdout, &mut stderr)
}
