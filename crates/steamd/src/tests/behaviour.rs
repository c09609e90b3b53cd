//! Behaviour-driven tests for starting, inspecting, and stopping the daemon.

use std::ffi::OsString;
use std::process::Command;
use std::time::Duration;

use nix::sys::signal::{Signal, kill};
use nix::sys::wait::waitpid;
use nix::unistd::Pid;
use rstest::fixture;
use rstest_bdd_macros::{given, scenario, then, when};
use steam_config::StatePaths;
use tempfile::TempDir;

use crate::process::{
    DaemonError, DaemonLaunch, DaemonStatus, Started, process_alive, start, status, stop,
};

// ---------------------------------------------------------------------------
// Test world
// ---------------------------------------------------------------------------

struct TestWorld {
    _dir: TempDir,
    paths: StatePaths,
    launch: Option<DaemonLaunch>,
    started: Vec<u32>,
    start_result: Option<Result<Started, DaemonError>>,
    stop_result: Option<Result<u32, DaemonError>>,
}

impl Drop for TestWorld {
    fn drop(&mut self) {
        for pid in self.started.drain(..) {
            if process_alive(pid).unwrap_or(false) {
                let raw = Pid::from_raw(i32::try_from(pid).expect("pid fits i32"));
                drop(kill(raw, Signal::SIGKILL));
                drop(waitpid(raw, None));
            }
        }
    }
}

#[fixture]
fn world() -> TestWorld {
    let dir = TempDir::new().expect("temp dir");
    let paths = StatePaths::in_dir(dir.path().join("state"));
    TestWorld {
        _dir: dir,
        paths,
        launch: None,
        started: Vec::new(),
        start_result: None,
        stop_result: None,
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn stand_in(script: &str) -> DaemonLaunch {
    DaemonLaunch::new("sh", vec![OsString::from("-c"), OsString::from(script)])
        .with_grace(Duration::from_millis(200))
}

fn current_status(world: &TestWorld) -> DaemonStatus {
    status(&world.paths).expect("status")
}

fn reap(pid: u32) {
    let raw = Pid::from_raw(i32::try_from(pid).expect("pid fits i32"));
    waitpid(raw, None).expect("reap stand-in daemon");
}

// ---------------------------------------------------------------------------
// Given steps
// ---------------------------------------------------------------------------

#[given("a stand-in daemon that keeps running")]
fn given_long_running(world: &mut TestWorld) {
    world.launch = Some(stand_in("exec sleep 30"));
}

#[given("a stand-in daemon that exits with code {code}")]
fn given_exits(world: &mut TestWorld, code: i32) {
    world.launch = Some(stand_in(&format!("exit {code}")));
}

#[given("a pid file naming a finished process")]
fn given_stale_pid(world: &mut TestWorld) {
    world.paths.prepare().expect("prepare");
    let mut child = Command::new("true").spawn().expect("spawn");
    let pid = child.id();
    child.wait().expect("reap");
    std::fs::write(world.paths.pid_path(), format!("{pid}\n")).expect("write pid");
}

// ---------------------------------------------------------------------------
// When steps
// ---------------------------------------------------------------------------

#[when("the daemon is started")]
fn when_started(world: &mut TestWorld) {
    let launch = world.launch.as_ref().expect("no stand-in configured");
    let result = start(&world.paths, launch);
    if let Ok(started) = &result {
        world.started.push(started.pid);
    }
    world.start_result = Some(result);
}

#[when("the daemon is stopped")]
fn when_stopped(world: &mut TestWorld) {
    let result = stop(&world.paths);
    if let Ok(pid) = &result {
        reap(*pid);
        world.started.retain(|started| started != pid);
    }
    world.stop_result = Some(result);
}

// ---------------------------------------------------------------------------
// Then steps
// ---------------------------------------------------------------------------

#[then("the daemon is reported running")]
fn then_running(world: &mut TestWorld) {
    let current = current_status(world);
    assert!(current.running, "expected running, got {current:?}");
    assert_eq!(current.pid, world.started.first().copied());
    let snapshot = current.snapshot.expect("launch snapshot");
    assert!(snapshot.start_time.is_some());
}

#[then("the daemon is reported not running")]
fn then_not_running(world: &mut TestWorld) {
    let current = current_status(world);
    assert!(!current.running, "expected not running, got {current:?}");
}

#[then("the status is flagged stale")]
fn then_stale(world: &mut TestWorld) {
    assert!(current_status(world).is_stale());
}

#[then("starting fails because the daemon is already running")]
fn then_already_running(world: &mut TestWorld) {
    let result = world.start_result.as_ref().expect("no start attempted");
    assert!(
        matches!(result, Err(DaemonError::AlreadyRunning { pid }) if world.started.contains(pid)),
        "expected AlreadyRunning, got {result:?}"
    );
}

#[then("starting fails with exit code {code}")]
fn then_startup_failed(world: &mut TestWorld, code: i32) {
    let result = world.start_result.as_ref().expect("no start attempted");
    assert!(
        matches!(result, Err(DaemonError::StartupFailed { exit_code: Some(actual), .. }) if *actual == code),
        "expected StartupFailed({code}), got {result:?}"
    );
}

#[then("no pid file remains")]
fn then_no_pid_file(world: &mut TestWorld) {
    assert!(!world.paths.pid_path().exists());
}

#[then("stopping fails because the daemon is not running")]
fn then_stop_not_running(world: &mut TestWorld) {
    let result = world.stop_result.as_ref().expect("no stop attempted");
    assert!(
        matches!(result, Err(DaemonError::NotRunning)),
        "expected NotRunning, got {result:?}"
    );
}

// ---------------------------------------------------------------------------
// Scenario registration
// ---------------------------------------------------------------------------

#[scenario(path = "tests/features/daemon_lifecycle.feature")]
fn daemon_lifecycle_behaviour(world: TestWorld) {
    let _ = world;
}
