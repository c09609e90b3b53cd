//! Crate-level runtime and BDD tests.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use mockall::mock;
use rstest::{fixture, rstest};
use steam_config::StatePaths;
use steam_session::test_support::{ClientCall, LoginScript, ScriptedClient, ScriptedFactory};
use steam_session::{CancelToken, ClientEvent, NetworkClient, PersonaState};
use steam_state::{
    DaemonStateStore, MessageLog, Password, RateLimitStore, RateLimitTracker, SessionState,
    SessionStore, SteamId,
};
use tempfile::TempDir;
use time::OffsetDateTime;

use crate::process::{
    DaemonError, DaemonIntervals, DaemonPlan, PresenceSchedule, ShutdownError, ShutdownListener,
    ShutdownSignal, run_daemon_with,
};

mod behaviour;

const ACCOUNT: SteamId = SteamId::new(76_561_198_000_000_001);

/// Shutdown driven only by the plan's token.
struct TokenShutdown;

impl ShutdownSignal for TokenShutdown {
    fn listen(&self, _token: &CancelToken) -> Result<ShutdownListener, ShutdownError> {
        Ok(ShutdownListener::detached())
    }
}

mock! {
    Signal {}

    impl ShutdownSignal for Signal {
        fn listen(&self, token: &CancelToken) -> Result<ShutdownListener, ShutdownError>;
    }
}

fn eventually(condition: impl FnMut() -> bool) -> bool {
    eventually_within(Duration::from_secs(5), condition)
}

fn eventually_within(limit: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + limit;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(20));
    }
    condition()
}

struct Daemon {
    _dir: TempDir,
    paths: StatePaths,
    factory: Arc<ScriptedFactory>,
    token: CancelToken,
    run: Option<JoinHandle<Result<(), DaemonError>>>,
}

impl Daemon {
    fn store_session(&self) {
        let mut session = SessionState::for_login("alice", Password::new("hunter2"));
        session.mark_connected();
        assert!(session.mark_authenticated(ACCOUNT));
        SessionStore::new(self.paths.session_path())
            .save(session)
            .expect("store session");
    }

    fn launch(&mut self) {
        let plan = DaemonPlan::new(self.paths.clone(), self.factory.clone())
            .with_shutdown(Arc::new(TokenShutdown))
            .with_token(self.token.clone())
            .with_intervals(DaemonIntervals {
                heartbeat: Duration::from_millis(50),
                reconnect: Duration::from_millis(50),
                presence: PresenceSchedule {
                    follow_up: Duration::from_millis(20),
                    interval: Duration::from_millis(50),
                },
            });
        self.run = Some(thread::spawn(move || run_daemon_with(plan)));
    }

    fn client(&self) -> Arc<ScriptedClient> {
        assert!(eventually(|| self.factory.latest().is_some()), "no client opened");
        self.factory.latest().expect("client")
    }

    fn wait_until_online(&self) {
        let state = DaemonStateStore::new(self.paths.daemon_state_path());
        assert!(
            eventually(|| {
                let snapshot = state.load();
                snapshot.connected && snapshot.steam_id == ACCOUNT
            }),
            "daemon never reported a logged-in heartbeat"
        );
    }

    fn finish(&mut self) -> Result<(), DaemonError> {
        self.run
            .take()
            .expect("daemon not launched")
            .join()
            .expect("daemon thread panicked")
    }
}

impl Drop for Daemon {
    fn drop(&mut self) {
        self.token.cancel();
        if let Some(run) = self.run.take() {
            drop(run.join());
        }
    }
}

#[fixture]
fn daemon() -> Daemon {
    let dir = TempDir::new().expect("temp dir");
    let paths = StatePaths::in_dir(dir.path().join("state"));
    paths.prepare().expect("prepare state dir");
    Daemon {
        _dir: dir,
        paths,
        factory: ScriptedFactory::new(vec![LoginScript::Succeed(ACCOUNT)]),
        token: CancelToken::new(),
        run: None,
    }
}

#[rstest]
fn refuses_to_run_without_a_session(mut daemon: Daemon) {
    daemon.launch();
    let err = daemon.finish().expect_err("should refuse");
    assert!(matches!(err, DaemonError::NotAuthenticated));
    assert!(!daemon.paths.pid_path().exists());
    assert!(daemon.factory.opened().is_empty());
}

#[rstest]
fn logs_in_reinforces_presence_and_cleans_up(mut daemon: Daemon) {
    daemon.store_session();
    daemon.launch();
    daemon.wait_until_online();

    let client = daemon.client();
    assert_eq!(
        crate::process::running_pid(daemon.paths.pid_path()).expect("probe"),
        Some(std::process::id())
    );
    assert!(eventually(|| {
        client.count_calls(|call| *call == ClientCall::SetPresence(PersonaState::Online)) >= 3
    }));
    assert_eq!(
        client.count_calls(|call| *call == ClientCall::RequestOfflineMessages),
        1
    );

    daemon.token.cancel();
    daemon.finish().expect("clean shutdown");
    assert!(!daemon.paths.pid_path().exists());
    assert!(!daemon.paths.daemon_state_path().exists());
    assert!(client.calls().contains(&ClientCall::Disconnect));
}

#[rstest]
fn received_messages_reach_the_log(mut daemon: Daemon) {
    daemon.store_session();
    daemon.launch();
    daemon.wait_until_online();

    daemon.client().emit(ClientEvent::ChatMessage {
        sender: SteamId::new(42),
        message: String::from("ping"),
    });

    let log = MessageLog::new(daemon.paths.message_log_path());
    assert!(eventually(|| {
        log.read_all()
            .is_ok_and(|messages| messages.iter().any(|m| m.message == "ping"))
    }));
}

#[rstest]
fn dropped_connections_are_reopened(mut daemon: Daemon) {
    daemon.store_session();
    daemon.launch();
    daemon.wait_until_online();

    let client = daemon.client();
    client.drop_connection();
    assert!(eventually(|| {
        client.count_calls(|call| *call == ClientCall::Connect) >= 2
    }));
}

#[rstest]
fn reconnect_login_blocked_by_spacing_is_retried(mut daemon: Daemon) {
    daemon.store_session();
    daemon.launch();
    daemon.wait_until_online();
    let client = daemon.client();
    let log_ons = |client: &ScriptedClient| {
        client.count_calls(|call| matches!(call, ClientCall::LogOn { .. }))
    };
    assert_eq!(log_ons(&client), 1);

    // A foreground command just tried to log in.
    RateLimitStore::new(daemon.paths.rate_limit_path())
        .save(RateLimitTracker {
            last_attempt: Some(OffsetDateTime::now_utc()),
            ..RateLimitTracker::default()
        })
        .expect("stamp attempt");
    daemon.factory.push_logins([LoginScript::Succeed(ACCOUNT)]);
    client.drop_connection();

    assert!(eventually(|| {
        client.count_calls(|call| *call == ClientCall::Connect) >= 2
    }));
    assert_eq!(log_ons(&client), 1, "the spacing guard holds the login back");
    assert!(
        eventually_within(Duration::from_secs(10), || log_ons(&client) >= 2),
        "login was never retried"
    );
    daemon.wait_until_online();
}

#[rstest]
fn closed_event_stream_stops_the_daemon(mut daemon: Daemon) {
    daemon.store_session();
    daemon.launch();
    daemon.wait_until_online();

    daemon.client().disconnect();
    let err = daemon.finish().expect_err("should stop");
    assert!(matches!(err, DaemonError::EventStreamEnded));
    assert!(!daemon.paths.pid_path().exists());
}

#[rstest]
fn failed_signal_installation_releases_the_pid_file(daemon: Daemon) {
    daemon.store_session();
    let mut signal = MockSignal::new();
    signal.expect_listen().times(1).returning(|_| {
        Err(ShutdownError::Install {
            source: io::Error::other("signals unavailable"),
        })
    });
    let plan = DaemonPlan::new(daemon.paths.clone(), daemon.factory.clone())
        .with_shutdown(Arc::new(signal))
        .with_token(daemon.token.clone());

    let err = run_daemon_with(plan).expect_err("should fail");
    assert!(matches!(err, DaemonError::Shutdown { .. }));
    assert!(!daemon.paths.pid_path().exists());
    assert!(daemon.factory.opened().is_empty());
}
