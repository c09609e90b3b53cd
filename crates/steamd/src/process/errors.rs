//! Error surface for daemon supervision and the daemon runtime.

use std::io;
use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

use steam_config::StatePathsError;
use steam_session::{BlockReason, ClientError};
use steam_state::StoreError;

use super::shutdown::ShutdownError;

/// Errors surfaced while starting, stopping, or running the daemon.
#[derive(Debug, Error)]
pub enum DaemonError {
    /// Preparing the state directory failed.
    #[error(transparent)]
    StatePaths(#[from] StatePathsError),
    /// A live daemon already owns the pid file.
    #[error("daemon already running (PID: {pid})")]
    AlreadyRunning {
        /// PID recorded in the pid file.
        pid: u32,
    },
    /// No live daemon was found.
    #[error("daemon not running")]
    NotRunning,
    /// The daemon was asked to run without a stored login.
    #[error("no authenticated session found; run 'steam auth login' first")]
    NotAuthenticated,
    /// The login governor refused to let the daemon log in.
    #[error("{reason}")]
    RateLimited {
        /// Why the login was refused.
        reason: BlockReason,
    },
    /// Resolving the path of the running executable failed.
    #[error("failed to locate the steam executable: {source}")]
    CurrentExe {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Opening the daemon log failed.
    #[error("failed to open daemon log '{path}': {source}")]
    LogOpen {
        /// Log file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Spawning the daemon process failed.
    #[error("failed to start daemon '{program}': {source}")]
    Spawn {
        /// Program that was launched.
        program: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// The daemon exited during its startup grace period.
    #[error("daemon exited during startup ({}); see '{}'", describe_exit(.exit_code), .log_path.display())]
    StartupFailed {
        /// Exit code, when the process exited normally.
        exit_code: Option<i32>,
        /// Log capturing the daemon's output.
        log_path: PathBuf,
    },
    /// Polling the launched child failed.
    #[error("failed to monitor daemon process: {source}")]
    MonitorChild {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Writing the pid file failed.
    #[error("failed to write pid file '{path}': {source}")]
    PidWrite {
        /// PID file path.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Removing a stale state file failed.
    #[error("failed to remove stale file '{path}': {source}")]
    Cleanup {
        /// Path that could not be removed.
        path: PathBuf,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Probing a recorded pid failed.
    #[error("failed to check process {pid}: {source}")]
    CheckProcess {
        /// PID that failed to probe.
        pid: u32,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// Signalling the daemon failed.
    #[error("failed to signal daemon {pid}: {source}")]
    Signal {
        /// PID that was signalled.
        pid: u32,
        /// Underlying OS error.
        #[source]
        source: Errno,
    },
    /// A state record could not be persisted.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The network client failed.
    #[error(transparent)]
    Client(#[from] ClientError),
    /// A worker thread could not be started.
    #[error("failed to start daemon thread '{name}': {source}")]
    Thread {
        /// Thread name.
        name: &'static str,
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
    /// Installing or awaiting the shutdown signal failed.
    #[error("failed to await shutdown signal: {source}")]
    Shutdown {
        /// Underlying shutdown error.
        #[source]
        source: ShutdownError,
    },
    /// The client's event stream closed while the daemon was still running.
    #[error("connection event stream ended unexpectedly")]
    EventStreamEnded,
}

impl From<ShutdownError> for DaemonError {
    fn from(source: ShutdownError) -> Self {
        Self::Shutdown { source }
    }
}

fn describe_exit(code: &Option<i32>) -> String {
    code.map_or_else(
        || String::from("terminated by signal"),
        |value| format!("exit code {value}"),
    )
}
