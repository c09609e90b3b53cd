//! Ownership of the pid file and heartbeat record by a running daemon.

use std::path::{Path, PathBuf};

use steam_state::{DaemonState, DaemonStateStore, SteamId};
use time::OffsetDateTime;
use tracing::{debug, info};

use super::PROCESS_TARGET;
use super::errors::DaemonError;
use super::liveness::{discard_file, process_alive, read_pid, write_pid};

/// Holds the daemon's pid and state files for the life of the process.
///
/// Dropping the guard removes both files.
#[derive(Debug)]
pub(crate) struct ProcessGuard {
    pid_path: PathBuf,
    state: DaemonStateStore,
    snapshot: DaemonState,
}

impl ProcessGuard {
    /// Claims the pid file for `pid`.
    ///
    /// The pid file may already name `pid` when the launcher recorded it
    /// first. Any other live pid means a second daemon is running.
    pub(crate) fn acquire(
        pid_path: &Path,
        state: DaemonStateStore,
        pid: u32,
    ) -> Result<Self, DaemonError> {
        if let Some(existing) = read_pid(pid_path)
            && existing != pid
            && process_alive(existing)?
        {
            info!(target: PROCESS_TARGET, pid = existing, "refusing to start: existing daemon alive");
            return Err(DaemonError::AlreadyRunning { pid: existing });
        }
        write_pid(pid_path, pid)?;
        info!(target: PROCESS_TARGET, pid, file = %pid_path.display(), "pid file written");

        // Keep the launcher's start time when it already recorded this pid.
        let recorded = state.load();
        let start_time = recorded
            .start_time
            .filter(|_| recorded.pid == pid)
            .unwrap_or_else(OffsetDateTime::now_utc);
        let snapshot = state.save(DaemonState::launched(pid, start_time))?;
        Ok(Self {
            pid_path: pid_path.to_path_buf(),
            state,
            snapshot,
        })
    }

    /// Rewrites the heartbeat record.
    pub(crate) fn heartbeat(
        &mut self,
        connected: bool,
        steam_id: SteamId,
        username: &str,
    ) -> Result<(), DaemonError> {
        let mut next = self.snapshot.clone();
        next.connected = connected;
        next.steam_id = steam_id;
        username.clone_into(&mut next.username);
        self.snapshot = self.state.save(next)?;
        debug!(target: PROCESS_TARGET, connected, %steam_id, "heartbeat written");
        Ok(())
    }
}

impl Drop for ProcessGuard {
    fn drop(&mut self) {
        discard_file(&self.pid_path, "pid file");
        discard_file(self.state.path(), "daemon state file");
        info!(target: PROCESS_TARGET, "daemon state files removed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use tempfile::TempDir;
    use time::macros::datetime;

    fn store(dir: &TempDir) -> DaemonStateStore {
        DaemonStateStore::new(dir.path().join("daemon_state.json"))
    }

    #[rstest]
    fn guard_keeps_launcher_start_time_and_cleans_up() {
        let dir = TempDir::new().expect("temp dir");
        let pid_path = dir.path().join("daemon.pid");
        let pid = std::process::id();
        let launched = datetime!(2025-06-01 09:00 UTC);
        store(&dir)
            .save(DaemonState::launched(pid, launched))
            .expect("seed state");

        let mut guard = ProcessGuard::acquire(&pid_path, store(&dir), pid).expect("acquire");
        guard
            .heartbeat(true, SteamId::new(7), "alice")
            .expect("heartbeat");

        let state = store(&dir).load();
        assert_eq!(state.start_time, Some(launched));
        assert!(state.connected);
        assert_eq!(state.username, "alice");
        assert_eq!(read_pid(&pid_path), Some(pid));

        drop(guard);
        assert!(!pid_path.exists());
        assert!(!store(&dir).exists());
    }

    #[rstest]
    fn guard_refuses_when_another_live_pid_owns_the_file() {
        let dir = TempDir::new().expect("temp dir");
        let pid_path = dir.path().join("daemon.pid");
        write_pid(&pid_path, std::process::id()).expect("seed pid");

        let other = std::process::id().wrapping_add(1);
        let err = ProcessGuard::acquire(&pid_path, store(&dir), other).expect_err("refuse");
        assert!(matches!(err, DaemonError::AlreadyRunning { .. }));
        assert_eq!(read_pid(&pid_path), Some(std::process::id()));
    }
}
