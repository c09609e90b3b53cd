//! Derives the state directory layout shared by the CLI and daemon.
//!
//! Separate CLI invocations and the detached daemon never talk to each other
//! directly; they read and write the files named here. Both binaries must
//! agree on the layout, so nothing else constructs these paths.

use std::fs::DirBuilder;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::Config;

const SESSION_FILE: &str = "session.json";
const RATE_LIMIT_FILE: &str = "rate_limit.json";
const PID_FILE: &str = "daemon.pid";
const DAEMON_STATE_FILE: &str = "daemon_state.json";
const MESSAGE_LOG_FILE: &str = "messages.jsonl";
const DAEMON_LOG_FILE: &str = "daemon.log";

/// Canonical paths for durable state written by the CLI and daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatePaths {
    state_dir: PathBuf,
    session_path: PathBuf,
    rate_limit_path: PathBuf,
    pid_path: PathBuf,
    daemon_state_path: PathBuf,
    message_log_path: PathBuf,
    daemon_log_path: PathBuf,
}

impl StatePaths {
    /// Derives paths from the configuration and creates the state directory.
    ///
    /// The directory is created with owner-only permissions; repeated calls
    /// are idempotent.
    pub fn from_config(config: &Config) -> Result<Self, StatePathsError> {
        let paths = Self::from_config_readonly(config)?;
        paths.prepare()?;
        Ok(paths)
    }

    /// Derives paths without touching the filesystem.
    pub fn from_config_readonly(config: &Config) -> Result<Self, StatePathsError> {
        Ok(Self::in_dir(config.state_dir()?.into_std_path_buf()))
    }

    /// Lays out the state files inside an explicit directory.
    #[must_use]
    pub fn in_dir(state_dir: impl Into<PathBuf>) -> Self {
        let state_dir = state_dir.into();
        Self {
            session_path: state_dir.join(SESSION_FILE),
            rate_limit_path: state_dir.join(RATE_LIMIT_FILE),
            pid_path: state_dir.join(PID_FILE),
            daemon_state_path: state_dir.join(DAEMON_STATE_FILE),
            message_log_path: state_dir.join(MESSAGE_LOG_FILE),
            daemon_log_path: state_dir.join(DAEMON_LOG_FILE),
            state_dir,
        }
    }

    /// Creates the state directory with mode `0700` when missing.
    pub fn prepare(&self) -> Result<(), StatePathsError> {
        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(0o700);
        }
        builder
            .create(&self.state_dir)
            .map_err(|source| StatePathsError::StateDirectory {
                path: self.state_dir.clone(),
                source,
            })
    }

    /// Directory holding every state file.
    pub fn state_dir(&self) -> &Path {
        self.state_dir.as_path()
    }

    /// Path to the persisted login session.
    pub fn session_path(&self) -> &Path {
        self.session_path.as_path()
    }

    /// Path to the rate-limit attempt history.
    pub fn rate_limit_path(&self) -> &Path {
        self.rate_limit_path.as_path()
    }

    /// Path to the daemon PID file.
    pub fn pid_path(&self) -> &Path {
        self.pid_path.as_path()
    }

    /// Path to the daemon heartbeat snapshot.
    pub fn daemon_state_path(&self) -> &Path {
        self.daemon_state_path.as_path()
    }

    /// Path to the append-only log of received chat messages.
    pub fn message_log_path(&self) -> &Path {
        self.message_log_path.as_path()
    }

    /// Path receiving the detached daemon's stdout and stderr.
    pub fn daemon_log_path(&self) -> &Path {
        self.daemon_log_path.as_path()
    }
}

/// Errors raised while locating or preparing the state directory.
#[derive(Debug, Error)]
pub enum StatePathsError {
    /// No state directory was configured and the home directory is unknown.
    #[error("cannot locate the home directory; set --state-dir or STEAM_CLI_STATE_DIR")]
    NoHomeDirectory,
    /// The home directory path is not valid UTF-8.
    #[error("home directory '{}' is not valid UTF-8; set --state-dir", path.display())]
    NonUtf8Home { path: PathBuf },
    /// Creating the state directory failed.
    #[error("failed to prepare state directory '{path}': {source}")]
    StateDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}
