//! Command-line runtime for the `steam` tool.
//!
//! An invocation is handled in four steps: configuration flags are split
//! from the command tokens, the remaining tokens are parsed by `clap`,
//! configuration is loaded through `ortho_config`, and the command is
//! dispatched. Foreground commands talk to the network through
//! `steam_session`; the `daemon` commands drive `steamd`.
//!
//! The output streams are injected so tests can capture them, and the
//! network client factory can be replaced with a scripted one.

use std::ffi::OsString;
use std::io::Write;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use steam_session::ClientFactory;

mod cli;
mod commands;
mod config;
mod errors;
mod output;

#[cfg(test)]
mod tests;

use cli::Cli;
use commands::CommandContext;
pub(crate) use config::{ConfigLoader, OrthoConfigLoader};
use config::split_config_arguments;
pub(crate) use errors::AppError;
use output::Output;

pub(crate) const CLI_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::cli");

/// Flags consumed by the configuration loader.
///
/// Keep in step with the fields of `steam_config::Config`.
const CONFIG_CLI_FLAGS: &[&str] = &[
    "config-path",
    "state-dir",
    "log-filter",
    "log-format",
    "bridge-command",
    "connect-timeout-secs",
    "login-timeout-secs",
];

/// Runs the CLI using the provided arguments and IO handles.
#[must_use]
pub fn run<I, W, E>(args: I, stdout: &mut W, stderr: &mut E) -> ExitCode
where
    I: IntoIterator<Item = OsString>,
    W: Write,
    E: Write,
{
    CliRunner::new(&OrthoConfigLoader).run(args, &mut Output::new(stdout, stderr))
}

pub(crate) struct CliRunner<'a, L: ConfigLoader> {
    loader: &'a L,
    factory: Option<Arc<dyn ClientFactory>>,
}

impl<'a, L: ConfigLoader> CliRunner<'a, L> {
    pub(crate) const fn new(loader: &'a L) -> Self {
        Self {
            loader,
            factory: None,
        }
    }

    /// Replaces the configured bridge with another client factory.
    #[cfg(test)]
    pub(crate) fn with_factory(mut self, factory: Arc<dyn ClientFactory>) -> Self {
        self.factory = Some(factory);
        self
    }

    pub(crate) fn run<I, W, E>(self, args: I, output: &mut Output<'_, W, E>) -> ExitCode
    where
        I: IntoIterator<Item = OsString>,
        W: Write,
        E: Write,
    {
        let args: Vec<OsString> = args.into_iter().collect();
        let split = split_config_arguments(&args);

        let result = Cli::try_parse_from(&split.command_arguments)
            .map_err(AppError::CliUsage)
            .and_then(|cli| {
                self.loader
                    .load(&split.config_arguments)
                    .map(|config| (cli, config))
            })
            .and_then(|(cli, config)| {
                steamd::telemetry::initialise(&config)?;
                let context = CommandContext::new(&config, split.forwarded_flags(), self.factory);
                commands::dispatch(cli.command, &context, output)
            });

        match result {
            Ok(exit_code) => exit_code,
            Err(AppError::CliUsage(error)) if !error.use_stderr() => {
                match output.text(&error.render().to_string()) {
                    Ok(()) => ExitCode::SUCCESS,
                    Err(_) => ExitCode::FAILURE,
                }
            }
            Err(error) => {
                output.failure(&error);
                ExitCode::FAILURE
            }
        }
    }
}
