use std::path::PathBuf;

use camino::Utf8PathBuf;

use crate::paths::StatePathsError;

/// Default log filter expression used by the CLI and the daemon.
pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Seconds to wait for the remote side to acknowledge a connection.
pub const DEFAULT_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Seconds to wait for a login verdict after credentials are submitted.
pub const DEFAULT_LOGIN_TIMEOUT_SECS: u64 = 15;

const STATE_DIR_NAME: &str = ".steam-cli";

/// Default log filter expression used by the binaries.
pub fn default_log_filter() -> &'static str {
    DEFAULT_LOG_FILTER
}

/// Owned log filter value used where allocation is required (e.g. serde).
pub fn default_log_filter_string() -> String {
    DEFAULT_LOG_FILTER.to_owned()
}

/// Default logging format for the binaries.
pub fn default_log_format() -> crate::logging::LogFormat {
    crate::logging::LogFormat::Compact
}

/// Computes the default state directory, `~/.steam-cli`.
///
/// Fails when no home directory can be resolved or it is not valid UTF-8;
/// the directory holds credentials, so there is no shared fallback.
pub fn default_state_dir() -> Result<Utf8PathBuf, StatePathsError> {
    state_dir_under(dirs::home_dir())
}

pub(crate) fn state_dir_under(home: Option<PathBuf>) -> Result<Utf8PathBuf, StatePathsError> {
    let home = home.ok_or(StatePathsError::NoHomeDirectory)?;
    let mut dir = Utf8PathBuf::from_path_buf(home)
        .map_err(|path| StatePathsError::NonUtf8Home { path })?;
    dir.push(STATE_DIR_NAME);
    Ok(dir)
}
