//! The daemon process itself.

use std::process;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use steam_config::{Config, StatePaths};
use steam_session::{
    BlockReason, BridgeFactory, CancelToken, ClientFactory, Decision, LoginObserver,
    NetworkClient, RateLimitGovernor, ReconnectPolicy, SessionWatch, Translator,
    TranslatorControl,
};
use steam_state::{
    DaemonStateStore, MessageLog, RateLimitStore, SessionState, SessionStore, SteamId,
};
use tracing::{error, info, warn};

use crate::inbox::MessageLogSink;

use super::errors::DaemonError;
use super::guard::ProcessGuard;
use super::presence::{PresenceLoop, PresenceSchedule};
use super::shutdown::{ShutdownSignal, SystemShutdownSignal};
use super::{PROCESS_TARGET, SHUTDOWN_TIMEOUT};

const JOIN_POLL: Duration = Duration::from_millis(50);

/// Timers driving the daemon's loops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DaemonIntervals {
    /// Interval between heartbeat writes.
    pub heartbeat: Duration,
    /// Delay before reconnecting after a drop.
    pub reconnect: Duration,
    /// Presence reinforcement timing.
    pub presence: PresenceSchedule,
}

impl Default for DaemonIntervals {
    fn default() -> Self {
        Self {
            heartbeat: Duration::from_secs(5),
            reconnect: Duration::from_secs(5),
            presence: PresenceSchedule::default(),
        }
    }
}

/// Collaborators of a daemon run.
pub struct DaemonPlan {
    paths: StatePaths,
    factory: Arc<dyn ClientFactory>,
    shutdown: Arc<dyn ShutdownSignal>,
    token: CancelToken,
    intervals: DaemonIntervals,
}

impl DaemonPlan {
    /// Plans a run over `paths` using `factory`, stopped by process signals.
    #[must_use]
    pub fn new(paths: StatePaths, factory: Arc<dyn ClientFactory>) -> Self {
        Self {
            paths,
            factory,
            shutdown: Arc::new(SystemShutdownSignal),
            token: CancelToken::new(),
            intervals: DaemonIntervals::default(),
        }
    }

    /// Replaces the shutdown source.
    #[must_use]
    pub fn with_shutdown(mut self, shutdown: Arc<dyn ShutdownSignal>) -> Self {
        self.shutdown = shutdown;
        self
    }

    /// Uses `token` as the shutdown token, letting the caller stop the run.
    #[must_use]
    pub fn with_token(mut self, token: CancelToken) -> Self {
        self.token = token;
        self
    }

    /// Overrides the loop timings.
    #[must_use]
    pub const fn with_intervals(mut self, intervals: DaemonIntervals) -> Self {
        self.intervals = intervals;
        self
    }
}

/// Runs the daemon with the bridge configured in `config`.
pub fn run_daemon(config: &Config) -> Result<(), DaemonError> {
    let paths = StatePaths::from_config(config)?;
    let factory = Arc::new(BridgeFactory::new(config.bridge_argv()));
    run_daemon_with(DaemonPlan::new(paths, factory))
}

/// Runs the daemon until its shutdown token is cancelled.
///
/// Returns an error when no authenticated session is stored, when another
/// daemon owns the pid file, or when the connection's event stream ends
/// while the daemon is still meant to be running.
pub fn run_daemon_with(plan: DaemonPlan) -> Result<(), DaemonError> {
    let DaemonPlan {
        paths,
        factory,
        shutdown,
        token,
        intervals,
    } = plan;
    paths.prepare()?;

    let sessions = SessionStore::new(paths.session_path());
    let session = sessions.load();
    if !session.authenticated || !session.has_credentials() {
        return Err(DaemonError::NotAuthenticated);
    }

    let pid = process::id();
    let mut guard = ProcessGuard::acquire(
        paths.pid_path(),
        DaemonStateStore::new(paths.daemon_state_path()),
        pid,
    )?;
    info!(target: PROCESS_TARGET, pid, username = %session.username, "starting daemon runtime");
    let listener = shutdown.listen(&token)?;

    let runtime = Runtime {
        paths: &paths,
        sessions,
        token: &token,
        intervals,
    };
    let outcome = runtime.serve(factory.as_ref(), &session, &mut guard);

    token.cancel();
    listener.close();
    match &outcome {
        Ok(()) => info!(target: PROCESS_TARGET, "shutdown sequence completed"),
        Err(error) => error!(target: PROCESS_TARGET, %error, "daemon stopped with an error"),
    }
    outcome
}

struct Runtime<'a> {
    paths: &'a StatePaths,
    sessions: SessionStore,
    token: &'a CancelToken,
    intervals: DaemonIntervals,
}

impl Runtime<'_> {
    fn serve(
        &self,
        factory: &dyn ClientFactory,
        session: &SessionState,
        guard: &mut ProcessGuard,
    ) -> Result<(), DaemonError> {
        let (client, events) = factory.open()?;
        let watch = Arc::new(SessionWatch::new());
        let governor =
            RateLimitGovernor::new(RateLimitStore::new(self.paths.rate_limit_path()));
        let sink = MessageLogSink::new(MessageLog::new(self.paths.message_log_path()));
        if !self.wait_for_governor(&governor)? {
            return Ok(());
        }

        let translator = Translator::new(
            Arc::clone(&client),
            self.sessions.clone(),
            governor,
            Arc::clone(&watch),
            TranslatorControl::with_retire_token(true, self.token.clone()),
            ReconnectPolicy::Always {
                delay: self.intervals.reconnect,
            },
        )
        .with_sink(Arc::new(sink))
        .with_observer(Arc::new(OfflineMessageRequest))
        .spawn(events)
        .map_err(|source| DaemonError::Thread {
            name: "steam-translator",
            source,
        })?;

        let presence = PresenceLoop {
            client: Arc::clone(&client),
            watch: Arc::clone(&watch),
            token: self.token.clone(),
            schedule: self.intervals.presence,
        };
        let spawned = thread::Builder::new()
            .name(String::from("steamd-presence"))
            .spawn(move || presence.run());

        let (outcome, presence) = match spawned {
            Ok(handle) => {
                let outcome = client
                    .connect()
                    .map_err(DaemonError::from)
                    .and_then(|()| self.heartbeat(client.as_ref(), &translator, guard, session));
                (outcome, Some(handle))
            }
            Err(source) => {
                let outcome = Err(DaemonError::Thread {
                    name: "steamd-presence",
                    source,
                });
                (outcome, None)
            }
        };

        self.token.cancel();
        watch.close();
        client.disconnect();
        if let Some(handle) = presence {
            join_within(handle, "presence loop");
        }
        join_within(translator, "event translator");
        outcome
    }

    /// Waits out a spacing block so the first automatic login is not
    /// refused. Returns false when shutdown was requested meanwhile.
    fn wait_for_governor(&self, governor: &RateLimitGovernor) -> Result<bool, DaemonError> {
        match governor.should_block() {
            Decision::Block(BlockReason::TooSoon { wait }) => {
                info!(target: PROCESS_TARGET, wait_ms = wait.as_millis(), "waiting before first login");
                Ok(!self.token.wait_timeout(wait))
            }
            Decision::Block(reason) => Err(DaemonError::RateLimited { reason }),
            Decision::Warn { .. } | Decision::Allow => Ok(true),
        }
    }

    fn heartbeat(
        &self,
        client: &dyn NetworkClient,
        translator: &JoinHandle<()>,
        guard: &mut ProcessGuard,
        session: &SessionState,
    ) -> Result<(), DaemonError> {
        loop {
            let steam_id = if client.is_connected() {
                client.current_identity()
            } else {
                SteamId::NONE
            };
            if let Err(error) = guard.heartbeat(client.is_connected(), steam_id, &session.username)
            {
                warn!(target: PROCESS_TARGET, %error, "failed to write heartbeat");
            }
            if self.token.wait_timeout(self.intervals.heartbeat) {
                return Ok(());
            }
            if translator.is_finished() {
                return Err(DaemonError::EventStreamEnded);
            }
        }
    }
}

/// Requests messages queued while the account was offline after each login.
struct OfflineMessageRequest;

impl LoginObserver for OfflineMessageRequest {
    fn logged_on(&self, client: &dyn NetworkClient, steam_id: SteamId) {
        match client.request_offline_messages() {
            Ok(()) => info!(target: PROCESS_TARGET, %steam_id, "requested offline messages"),
            Err(error) => warn!(target: PROCESS_TARGET, %error, "failed to request offline messages"),
        }
    }
}

/// Joins `handle`, giving up after [`SHUTDOWN_TIMEOUT`].
fn join_within(handle: JoinHandle<()>, what: &str) {
    let deadline = Instant::now() + SHUTDOWN_TIMEOUT;
    while !handle.is_finished() {
        if Instant::now() >= deadline {
            warn!(target: PROCESS_TARGET, "{what} did not stop in time; detaching");
            return;
        }
        thread::sleep(JOIN_POLL);
    }
    if handle.join().is_err() {
        warn!(target: PROCESS_TARGET, "{what} panicked");
    }
}
