//! Runs the real `steam daemon run` against a shell bridge and stops it with
//! SIGTERM.
//!
//! The daemon must remove its pid file and heartbeat record on the way out,
//! so a later status check sees nothing running and nothing stale.

use std::ffi::OsString;
use std::fs;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

use nix::sys::signal::{Signal, kill};
use nix::sys::wait::waitpid;
use nix::unistd::Pid;
use steam_config::StatePaths;
use steam_state::{DaemonStateStore, Password, SessionState, SessionStore, SteamId};
use steamd::{DaemonLaunch, process_alive, start, status, stop};
use tempfile::TempDir;

const ACCOUNT: SteamId = SteamId::new(76_561_198_000_000_001);

const BRIDGE: &str = r#"while IFS= read -r line; do
  case "$line" in
    *'"op":"connect"'*) echo '{"event":"connected"}' ;;
    *'"op":"log_on"'*) echo '{"event":"logged_on","steam_id":76561198000000001}' ;;
    *'"op":"disconnect"'*) echo '{"event":"disconnected"}'; exit 0 ;;
  esac
done
"#;

/// Kills the daemon if a failed assertion leaves it behind.
struct Reaper(Option<u32>);

impl Drop for Reaper {
    fn drop(&mut self) {
        if let Some(pid) = self.0.take()
            && process_alive(pid).unwrap_or(false)
        {
            let raw = Pid::from_raw(i32::try_from(pid).expect("pid fits i32"));
            drop(kill(raw, Signal::SIGKILL));
            drop(waitpid(raw, None));
        }
    }
}

fn eventually(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(50));
    }
    condition()
}

fn store_session(paths: &StatePaths) -> anyhow::Result<()> {
    paths.prepare()?;
    let mut session = SessionState::for_login("alice", Password::new("hunter2"));
    session.mark_connected();
    assert!(session.mark_authenticated(ACCOUNT));
    SessionStore::new(paths.session_path()).save(session)?;
    Ok(())
}

fn launch(state_dir: &Path, bridge: &Path) -> DaemonLaunch {
    let bridge_command = format!("sh {}", bridge.display());
    DaemonLaunch::new(
        env!("CARGO_BIN_EXE_steam"),
        vec![
            OsString::from("--state-dir"),
            state_dir.as_os_str().to_owned(),
            OsString::from("--bridge-command"),
            OsString::from(bridge_command),
            OsString::from("daemon"),
            OsString::from("run"),
        ],
    )
}

#[test]
fn sigterm_shuts_the_daemon_down_cleanly() -> anyhow::Result<()> {
    let dir = TempDir::new()?;
    let bridge = dir.path().join("bridge.sh");
    fs::write(&bridge, BRIDGE)?;
    let state_dir = dir.path().join("state");
    let paths = StatePaths::in_dir(state_dir.clone());
    store_session(&paths)?;

    let started = start(&paths, &launch(&state_dir, &bridge))?;
    let mut reaper = Reaper(Some(started.pid));

    let heartbeat = DaemonStateStore::new(paths.daemon_state_path());
    assert!(
        eventually(Duration::from_secs(10), || {
            let snapshot = heartbeat.load();
            snapshot.connected && snapshot.steam_id == ACCOUNT
        }),
        "daemon never logged in; log: {}",
        fs::read_to_string(paths.daemon_log_path()).unwrap_or_default()
    );
    assert!(status(&paths)?.running);

    assert_eq!(stop(&paths)?, started.pid);
    assert!(
        eventually(Duration::from_secs(15), || {
            !paths.pid_path().exists() && !paths.daemon_state_path().exists()
        }),
        "daemon left its files behind; log: {}",
        fs::read_to_string(paths.daemon_log_path()).unwrap_or_default()
    );

    let raw = Pid::from_raw(i32::try_from(started.pid)?);
    waitpid(raw, None)?;
    reaper.0 = None;

    let after = status(&paths)?;
    assert!(!after.running);
    assert!(after.pid.is_none());
    assert!(!after.is_stale());
    assert!(
        SessionStore::new(paths.session_path()).load().authenticated,
        "shutdown keeps the stored session for later commands"
    );
    Ok(())
}
