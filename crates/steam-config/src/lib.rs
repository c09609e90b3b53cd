//! Shared configuration for the `steam` CLI and its background daemon.
//!
//! Configuration is layered by [`ortho_config`]: built-in defaults, then an
//! optional TOML file (`--config-path` or `STEAM_CLI_CONFIG_PATH`), then
//! `STEAM_CLI_*` environment variables, then command-line flags. Both the
//! foreground CLI and the daemon load the same [`Config`] so they agree on
//! where session state lives.
//!
//! The [`StatePaths`] type derives every durable file location from the
//! configuration. It is the only place that knows the on-disk layout.

mod defaults;
mod logging;
mod paths;

use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

pub use defaults::{
    DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_LOG_FILTER, DEFAULT_LOGIN_TIMEOUT_SECS,
    default_log_filter, default_log_filter_string, default_log_format, default_state_dir,
};
pub use logging::{LogFormat, LogFormatParseError};
pub use paths::{StatePaths, StatePathsError};

/// Resolved configuration shared by the CLI and the daemon.
#[derive(Debug, Clone, Deserialize, Serialize, OrthoConfig, PartialEq, Eq)]
#[ortho_config(prefix = "STEAM_CLI")]
pub struct Config {
    /// Directory holding session, rate-limit, and daemon state files.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<Utf8PathBuf>,
    /// Tracing filter expression, for example `info` or `steamd=debug`.
    #[ortho_config(default = default_log_filter_string())]
    pub log_filter: String,
    /// Output format for structured logs.
    #[ortho_config(default = default_log_format())]
    pub log_format: LogFormat,
    /// Command line used to launch the network bridge process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bridge_command: Option<String>,
    /// Upper bound on waiting for the connection acknowledgement.
    #[ortho_config(default = DEFAULT_CONNECT_TIMEOUT_SECS)]
    pub connect_timeout_secs: u64,
    /// Upper bound on waiting for a login verdict.
    #[ortho_config(default = DEFAULT_LOGIN_TIMEOUT_SECS)]
    pub login_timeout_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            state_dir: None,
            log_filter: default_log_filter_string(),
            log_format: default_log_format(),
            bridge_command: None,
            connect_timeout_secs: DEFAULT_CONNECT_TIMEOUT_SECS,
            login_timeout_secs: DEFAULT_LOGIN_TIMEOUT_SECS,
        }
    }
}

impl Config {
    /// Returns the configured state directory, falling back to `~/.steam-cli`.
    pub fn state_dir(&self) -> Result<Utf8PathBuf, StatePathsError> {
        match &self.state_dir {
            Some(dir) => Ok(dir.clone()),
            None => default_state_dir(),
        }
    }

    /// Returns the tracing filter expression.
    #[must_use]
    pub fn log_filter(&self) -> &str {
        self.log_filter.as_str()
    }

    /// Returns the structured log format.
    #[must_use]
    pub const fn log_format(&self) -> LogFormat {
        self.log_format
    }

    /// Returns the bridge command split into program and arguments.
    ///
    /// Returns `None` when no bridge is configured or the command is blank.
    #[must_use]
    pub fn bridge_argv(&self) -> Option<Vec<String>> {
        let command = self.bridge_command.as_deref()?;
        let argv: Vec<String> = command.split_whitespace().map(str::to_owned).collect();
        if argv.is_empty() { None } else { Some(argv) }
    }

    /// Returns the wait budget for connection acknowledgements.
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        Duration::from_secs(self.connect_timeout_secs)
    }

    /// Returns the wait budget for login verdicts.
    #[must_use]
    pub const fn login_timeout(&self) -> Duration {
        Duration::from_secs(self.login_timeout_secs)
    }

    /// Returns the explicit state directory override, when present.
    #[must_use]
    pub fn state_dir_override(&self) -> Option<&Utf8Path> {
        self.state_dir.as_deref()
    }
}
