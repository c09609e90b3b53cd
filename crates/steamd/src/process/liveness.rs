//! Pid file access and process liveness probes.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use nix::errno::Errno;
use nix::sys::signal::kill;
use nix::unistd::Pid;
use steam_session::DaemonProbe;
use tracing::{debug, warn};

use super::PROCESS_TARGET;
use super::errors::DaemonError;

/// Reads the pid recorded in `path`. Missing or malformed files yield `None`.
pub(crate) fn read_pid(path: &Path) -> Option<u32> {
    let content = fs::read_to_string(path).ok()?;
    content.trim().parse::<u32>().ok().filter(|pid| *pid != 0)
}

/// Writes `pid` to `path` with owner-only permissions.
pub(crate) fn write_pid(path: &Path, pid: u32) -> Result<(), DaemonError> {
    let pid_write = |source: io::Error| DaemonError::PidWrite {
        path: path.to_path_buf(),
        source,
    };
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    let mut file = options.open(path).map_err(pid_write)?;
    writeln!(file, "{pid}").map_err(pid_write)?;
    file.sync_all().map_err(pid_write)?;
    Ok(())
}

/// Removes `path`, treating a missing file as success.
pub(crate) fn remove_file(path: &Path) -> Result<(), DaemonError> {
    match fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(error) if error.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(source) => Err(DaemonError::Cleanup {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Removes `path` on a best-effort basis, logging failures.
pub(crate) fn discard_file(path: &Path, what: &str) {
    if let Err(error) = remove_file(path) {
        warn!(target: PROCESS_TARGET, file = %path.display(), %error, "failed to remove {what}");
    }
}

/// Reports whether `pid` names a live process.
///
/// A process owned by another user still counts as alive.
pub fn process_alive(pid: u32) -> Result<bool, DaemonError> {
    let Ok(raw) = i32::try_from(pid) else {
        return Ok(false);
    };
    if raw <= 0 {
        return Ok(false);
    }
    match kill(Pid::from_raw(raw), None) {
        Ok(()) | Err(Errno::EPERM) => Ok(true),
        Err(Errno::ESRCH | Errno::ECHILD) => Ok(false),
        Err(source) => Err(DaemonError::CheckProcess { pid, source }),
    }
}

/// Returns the pid of the live daemon recorded in `pid_path`, if any.
pub fn running_pid(pid_path: &Path) -> Result<Option<u32>, DaemonError> {
    let Some(pid) = read_pid(pid_path) else {
        return Ok(None);
    };
    Ok(process_alive(pid)?.then_some(pid))
}

/// [`DaemonProbe`] backed by the daemon's pid file.
#[derive(Debug, Clone)]
pub struct PidFileProbe {
    pid_path: PathBuf,
}

impl PidFileProbe {
    /// Probes the pid recorded at `pid_path`.
    #[must_use]
    pub fn new(pid_path: impl Into<PathBuf>) -> Self {
        Self {
            pid_path: pid_path.into(),
        }
    }
}

impl DaemonProbe for PidFileProbe {
    fn is_running(&self) -> bool {
        match running_pid(&self.pid_path) {
            Ok(pid) => pid.is_some(),
            Err(error) => {
                debug!(target: PROCESS_TARGET, %error, "daemon probe failed; assuming not running");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;

    #[rstest]
    fn own_process_is_alive() {
        assert!(process_alive(std::process::id()).expect("probe"));
    }

    #[rstest]
    #[case(0)]
    #[case(u32::MAX)]
    fn impossible_pids_are_not_alive(#[case] pid: u32) {
        assert!(!process_alive(pid).expect("probe"));
    }

    #[rstest]
    #[case("", None)]
    #[case("not a pid\n", None)]
    #[case("0\n", None)]
    #[case("  4242\n", Some(4242))]
    fn pid_files_parse_leniently(#[case] content: &str, #[case] expected: Option<u32>) {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("daemon.pid");
        fs::write(&path, content).expect("write pid");
        assert_eq!(read_pid(&path), expected);
    }

    #[rstest]
    fn probe_reports_own_pid_as_running() {
        let dir = TempDir::new().expect("temp dir");
        let path = dir.path().join("daemon.pid");
        write_pid(&path, std::process::id()).expect("write pid");
        assert!(PidFileProbe::new(&path).is_running());
    }

    #[rstest]
    fn probe_without_pid_file_reports_not_running() {
        let dir = TempDir::new().expect("temp dir");
        assert!(!PidFileProbe::new(dir.path().join("daemon.pid")).is_running());
    }
}
