//! In-process CLI tests against a scripted network client.

use std::ffi::OsString;
use std::process::ExitCode;
use std::sync::Arc;

use camino::Utf8PathBuf;
use rstest::{fixture, rstest};
use steam_config::{Config, StatePaths};
use steam_session::test_support::{ClientCall, LoginScript, ScriptedFactory};
use steam_state::{
    IncomingMessage, MessageLog, Password, RateLimitStore, RateLimitTracker, SessionState,
    SessionStore, SteamId,
};
use tempfile::TempDir;

use crate::config::ConfigLoader;
use crate::output::Output;
use crate::{AppError, CliRunner};

mod behaviour;

pub(crate) const ACCOUNT: SteamId = SteamId::new(76_561_198_000_000_001);
pub(crate) const FRIEND: SteamId = SteamId::new(76_561_198_000_000_002);

/// Hands out a prepared configuration regardless of the flags.
struct FixedConfig(Config);

impl ConfigLoader for FixedConfig {
    fn load(&self, _args: &[OsString]) -> Result<Config, AppError> {
        Ok(self.0.clone())
    }
}

pub(crate) struct Invocation {
    pub(crate) exit: ExitCode,
    pub(crate) stdout: String,
    pub(crate) stderr: String,
}

pub(crate) struct Harness {
    _dir: TempDir,
    pub(crate) config: Config,
    pub(crate) factory: Arc<ScriptedFactory>,
}

impl Harness {
    pub(crate) fn new() -> Self {
        let dir = TempDir::new().expect("temp dir");
        let state_dir =
            Utf8PathBuf::from_path_buf(dir.path().join("state")).expect("utf-8 temp path");
        let config = Config {
            state_dir: Some(state_dir),
            connect_timeout_secs: 2,
            login_timeout_secs: 2,
            ..Config::default()
        };
        Self {
            _dir: dir,
            config,
            factory: ScriptedFactory::new(Vec::new()),
        }
    }

    pub(crate) fn paths(&self) -> StatePaths {
        StatePaths::from_config(&self.config).expect("state paths")
    }

    pub(crate) fn store_session(&self, steam_id: SteamId) {
        let mut session = SessionState::for_login("alice", Password::new("hunter2"));
        session.mark_connected();
        assert!(session.mark_authenticated(steam_id));
        SessionStore::new(self.paths().session_path())
            .save(session)
            .expect("store session");
    }

    pub(crate) fn invoke(&self, args: &[&str]) -> Invocation {
        let argv = std::iter::once("steam")
            .chain(args.iter().copied())
            .map(OsString::from);
        let loader = FixedConfig(self.config.clone());
        let mut stdout = Vec::new();
        let mut stderr = Vec::new();
        let exit = CliRunner::new(&loader)
            .with_factory(self.factory.clone())
            .run(argv, &mut Output::new(&mut stdout, &mut stderr));
        Invocation {
            exit,
            stdout: String::from_utf8(stdout).expect("utf-8 stdout"),
            stderr: String::from_utf8(stderr).expect("utf-8 stderr"),
        }
    }
}

#[fixture]
fn harness() -> Harness {
    Harness::new()
}

#[rstest]
fn version_names_the_tool(harness: Harness) {
    let run = harness.invoke(&["version"]);
    assert_eq!(run.exit, ExitCode::SUCCESS);
    assert_eq!(
        run.stdout,
        format!("steam-cli v{}\n", env!("CARGO_PKG_VERSION"))
    );
}

#[rstest]
fn help_is_written_to_stdout(harness: Harness) {
    let run = harness.invoke(&["--help"]);
    assert_eq!(run.exit, ExitCode::SUCCESS);
    assert!(run.stdout.contains("Usage: steam"));
    assert!(run.stderr.is_empty());
}

#[rstest]
fn unknown_commands_are_usage_errors(harness: Harness) {
    let run = harness.invoke(&["friends", "list"]);
    assert_eq!(run.exit, ExitCode::FAILURE);
    assert!(run.stderr.contains("unrecognized subcommand"));
}

#[rstest]
fn code_submission_without_prompt_fails(harness: Harness) {
    let run = harness.invoke(&["auth", "code", "4D6XG"]);
    assert_eq!(run.exit, ExitCode::FAILURE);
    assert!(run.stderr.contains("not currently needed"));
    assert!(harness.factory.opened().is_empty());
}

#[rstest]
fn status_reports_failures_and_throttling(harness: Harness) {
    let tracker = RateLimitTracker {
        consecutive_fails: 4,
        ..RateLimitTracker::default()
    };
    RateLimitStore::new(harness.paths().rate_limit_path())
        .save(tracker)
        .expect("store tracker");

    let run = harness.invoke(&["auth", "status"]);
    assert_eq!(run.exit, ExitCode::SUCCESS);
    assert!(run.stdout.contains("Authenticated: no"));
    assert!(run.stdout.contains("Rate limit:    4 consecutive failed logins"));
}

#[rstest]
fn clearing_the_rate_limit_forgets_failures(harness: Harness) {
    let store = RateLimitStore::new(harness.paths().rate_limit_path());
    store
        .save(RateLimitTracker {
            consecutive_fails: 6,
            ..RateLimitTracker::default()
        })
        .expect("store tracker");

    let run = harness.invoke(&["auth", "clear-rate-limit"]);
    assert_eq!(run.exit, ExitCode::SUCCESS);
    assert_eq!(store.load().consecutive_fails, 0);
}

#[rstest]
fn logout_forgets_the_session(harness: Harness) {
    harness.store_session(ACCOUNT);
    let run = harness.invoke(&["auth", "logout"]);
    assert_eq!(run.exit, ExitCode::SUCCESS);
    let session = SessionStore::new(harness.paths().session_path()).load();
    assert!(!session.authenticated);
    assert!(session.username.is_empty());
}

#[rstest]
fn message_words_are_joined(harness: Harness) {
    harness.store_session(ACCOUNT);
    harness.factory.push_logins([LoginScript::Succeed(ACCOUNT)]);

    let friend = FRIEND.to_string();
    let run = harness.invoke(&["msg", friend.as_str(), "see", "you", "soon"]);
    assert_eq!(run.exit, ExitCode::SUCCESS, "stderr: {}", run.stderr);

    let client = harness.factory.latest().expect("client");
    assert!(client.calls().contains(&ClientCall::SendMessage {
        recipient: FRIEND,
        text: String::from("see you soon"),
    }));
    assert!(client.calls().contains(&ClientCall::Disconnect));
}

#[rstest]
fn inbox_shows_the_most_recent_messages(harness: Harness) {
    let log = MessageLog::new(harness.paths().message_log_path());
    for text in ["first", "second", "third"] {
        log.append(&IncomingMessage::now(FRIEND, text))
            .expect("append");
    }

    let run = harness.invoke(&["inbox", "--limit", "2"]);
    assert_eq!(run.exit, ExitCode::SUCCESS);
    let lines: Vec<&str> = run.stdout.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines.first().is_some_and(|line| line.ends_with(&format!("{FRIEND}: second"))));
    assert!(lines.last().is_some_and(|line| line.ends_with(&format!("{FRIEND}: third"))));
}

#[rstest]
fn daemon_start_requires_a_session(harness: Harness) {
    let run = harness.invoke(&["daemon", "start"]);
    assert_eq!(run.exit, ExitCode::FAILURE);
    assert!(!harness.paths().pid_path().exists());
}

#[rstest]
fn daemon_stop_without_daemon_fails(harness: Harness) {
    let run = harness.invoke(&["daemon", "stop"]);
    assert_eq!(run.exit, ExitCode::FAILURE);
}
