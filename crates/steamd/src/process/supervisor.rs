//! Starting, stopping, and inspecting the detached daemon from the CLI.

use std::env;
use std::ffi::OsString;
use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use steam_config::StatePaths;
use steam_state::{DaemonState, DaemonStateStore};
use time::OffsetDateTime;
use tracing::{info, warn};

use super::errors::DaemonError;
use super::liveness::{
    discard_file, process_alive, read_pid, remove_file, running_pid, write_pid,
};
use super::{PROCESS_TARGET, STARTUP_GRACE};

const GRACE_POLL: Duration = Duration::from_millis(50);

/// Command line used to launch the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonLaunch {
    program: PathBuf,
    args: Vec<OsString>,
    grace: Duration,
}

impl DaemonLaunch {
    /// Launches `program` with `args`.
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, args: Vec<OsString>) -> Self {
        Self {
            program: program.into(),
            args,
            grace: STARTUP_GRACE,
        }
    }

    /// Re-executes the running binary as `<exe> <config args> daemon run`.
    ///
    /// `config_arguments` are the configuration flags the CLI was invoked
    /// with, so the daemon resolves the same state directory.
    pub fn current_exe(config_arguments: &[OsString]) -> Result<Self, DaemonError> {
        let program = env::current_exe().map_err(|source| DaemonError::CurrentExe { source })?;
        let mut args = config_arguments.to_vec();
        args.extend([OsString::from("daemon"), OsString::from("run")]);
        Ok(Self::new(program, args))
    }

    /// Overrides how long the launched process is watched for an early exit.
    #[must_use]
    pub const fn with_grace(mut self, grace: Duration) -> Self {
        self.grace = grace;
        self
    }

    /// Program that will be launched.
    #[must_use]
    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Arguments passed to the program.
    #[must_use]
    pub fn args(&self) -> &[OsString] {
        &self.args
    }
}

/// A daemon that survived its startup grace period.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Started {
    /// PID of the daemon process.
    pub pid: u32,
    /// File receiving the daemon's output.
    pub log_path: PathBuf,
}

/// What the state directory says about the daemon.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DaemonStatus {
    /// PID recorded in the pid file.
    pub pid: Option<u32>,
    /// Whether that PID is alive.
    pub running: bool,
    /// Last heartbeat, if one was written.
    pub snapshot: Option<DaemonState>,
}

impl DaemonStatus {
    /// Whether files remain from a daemon that is no longer alive.
    #[must_use]
    pub const fn is_stale(&self) -> bool {
        !self.running && (self.pid.is_some() || self.snapshot.is_some())
    }
}

/// Reads the pid file and heartbeat and probes the recorded pid.
pub fn status(paths: &StatePaths) -> Result<DaemonStatus, DaemonError> {
    let store = DaemonStateStore::new(paths.daemon_state_path());
    let snapshot = store.exists().then(|| store.load());
    let pid = read_pid(paths.pid_path()).or_else(|| {
        snapshot
            .as_ref()
            .map(|state| state.pid)
            .filter(|pid| *pid != 0)
    });
    let running = match pid {
        Some(pid) => process_alive(pid)?,
        None => false,
    };
    Ok(DaemonStatus {
        pid,
        running,
        snapshot,
    })
}

/// Launches the daemon in the background.
///
/// The pid and start time are recorded before returning. A process that
/// exits within the launch's grace period is reported as a startup failure
/// and its files are removed.
pub fn start(paths: &StatePaths, launch: &DaemonLaunch) -> Result<Started, DaemonError> {
    paths.prepare()?;
    if let Some(pid) = running_pid(paths.pid_path())? {
        return Err(DaemonError::AlreadyRunning { pid });
    }
    remove_file(paths.pid_path())?;
    remove_file(paths.daemon_state_path())?;

    let log_path = paths.daemon_log_path().to_path_buf();
    let mut child = spawn_detached(launch, &log_path)?;
    let pid = child.id();
    write_pid(paths.pid_path(), pid)?;
    DaemonStateStore::new(paths.daemon_state_path())
        .save(DaemonState::launched(pid, OffsetDateTime::now_utc()))?;
    info!(
        target: PROCESS_TARGET,
        pid,
        program = %launch.program.display(),
        log = %log_path.display(),
        "daemon launched"
    );

    if let Some(exit_code) = watch_startup(&mut child, launch.grace)? {
        warn!(target: PROCESS_TARGET, pid, ?exit_code, "daemon exited during startup");
        discard_file(paths.pid_path(), "pid file");
        discard_file(paths.daemon_state_path(), "daemon state file");
        return Err(DaemonError::StartupFailed {
            exit_code,
            log_path,
        });
    }
    Ok(Started { pid, log_path })
}

/// Sends SIGTERM to the running daemon and returns its pid.
///
/// Does not wait for the daemon to exit; it removes its own files.
pub fn stop(paths: &StatePaths) -> Result<u32, DaemonError> {
    let pid = running_pid(paths.pid_path())?.ok_or(DaemonError::NotRunning)?;
    let raw = i32::try_from(pid).map_err(|_| DaemonError::NotRunning)?;
    kill(Pid::from_raw(raw), Signal::SIGTERM)
        .map_err(|source| DaemonError::Signal { pid, source })?;
    info!(target: PROCESS_TARGET, pid, "sent SIGTERM to daemon");
    Ok(pid)
}

fn open_log(path: &Path) -> Result<File, DaemonError> {
    let mut options = OpenOptions::new();
    options.create(true).append(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    options.open(path).map_err(|source| DaemonError::LogOpen {
        path: path.to_path_buf(),
        source,
    })
}

fn spawn_detached(launch: &DaemonLaunch, log_path: &Path) -> Result<Child, DaemonError> {
    let stdout = open_log(log_path)?;
    let stderr = stdout.try_clone().map_err(|source| DaemonError::LogOpen {
        path: log_path.to_path_buf(),
        source,
    })?;

    let mut command = Command::new(&launch.program);
    command
        .args(&launch.args)
        .stdin(Stdio::null())
        .stdout(Stdio::from(stdout))
        .stderr(Stdio::from(stderr));
    #[cfg(unix)]
    {
        use std::os::unix::process::CommandExt;
        // A fresh process group keeps terminal signals aimed at the CLI away
        // from the daemon.
        command.process_group(0);
    }
    command.spawn().map_err(|source| DaemonError::Spawn {
        program: launch.program.clone(),
        source,
    })
}

/// Returns `Some(exit code)` when the child exits before `grace` elapses.
fn watch_startup(child: &mut Child, grace: Duration) -> Result<Option<Option<i32>>, DaemonError> {
    let deadline = Instant::now() + grace;
    loop {
        if let Some(status) = child
            .try_wait()
            .map_err(|source| DaemonError::MonitorChild { source })?
        {
            return Ok(Some(status.code()));
        }
        if Instant::now() >= deadline {
            return Ok(None);
        }
        thread::sleep(GRACE_POLL);
    }
}
