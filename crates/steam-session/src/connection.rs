//! Connection acquisition for commands that need a live session.
//!
//! A fresh CLI invocation has no in-process connection even when
//! `session.json` says the account is authenticated, because the previous
//! invocation's connection died with its process. [`ConnectionManager`]
//! decides per command whether to reuse the handle it already holds or to
//! replay the stored credentials on a new one.

use std::fmt;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use steam_state::{SessionStore, SteamId, StoreError};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::client::{ClientError, ClientFactory, LogOnDetails, NetworkClient, PersonaState};
use crate::governor::{BlockReason, Decision, RateLimitGovernor};
use crate::result::{EResult, FailureClass, describe};
use crate::translator::{
    LogMessageSink, MessageSink, ReconnectPolicy, Translator, TranslatorControl,
};
use crate::watch::{LoginOutcome, SessionWatch, Wait, WatchMark};

const CONNECTION_TARGET: &str = "steam_session::connection";

/// Default wait for a connect acknowledgement.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
/// Default wait for a login verdict.
pub const DEFAULT_LOGIN_TIMEOUT: Duration = Duration::from_secs(15);

/// Reports whether a background daemon is running.
pub trait DaemonProbe: Send + Sync {
    /// Returns true when a live daemon owns the pid file.
    fn is_running(&self) -> bool;
}

/// [`DaemonProbe`] for contexts where no daemon can exist.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDaemon;

impl DaemonProbe for NoDaemon {
    fn is_running(&self) -> bool {
        false
    }
}

/// Upper bounds on the waits in a login flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimeouts {
    /// Wait for the connect acknowledgement.
    pub connect: Duration,
    /// Wait for the login verdict.
    pub login: Duration,
}

impl Default for SessionTimeouts {
    fn default() -> Self {
        Self {
            connect: DEFAULT_CONNECT_TIMEOUT,
            login: DEFAULT_LOGIN_TIMEOUT,
        }
    }
}

/// How [`ConnectionManager::ensure_connection`] obtained its connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// The handle already held by this process was still logged in.
    Reused,
    /// A daemon is running; a parallel session was opened beside it.
    Daemon,
    /// Stored credentials were replayed on a new handle.
    Reauthenticated,
}

/// A logged-in handle ready for use.
#[derive(Clone)]
pub struct Connection {
    client: Arc<dyn NetworkClient>,
    route: Route,
    steam_id: SteamId,
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("route", &self.route)
            .field("steam_id", &self.steam_id)
            .finish_non_exhaustive()
    }
}

impl Connection {
    /// Returns the client handle.
    #[must_use]
    pub fn client(&self) -> &Arc<dyn NetworkClient> {
        &self.client
    }

    /// Returns how the connection was obtained.
    #[must_use]
    pub const fn route(&self) -> Route {
        self.route
    }

    /// Returns the logged-in identity.
    #[must_use]
    pub const fn steam_id(&self) -> SteamId {
        self.steam_id
    }
}

/// Errors raised while acquiring or authenticating a connection.
#[derive(Debug, Error)]
pub enum AuthError {
    /// No authenticated session is stored.
    #[error("not authenticated; use 'steam auth login' first")]
    NotAuthenticated,
    /// A username or password is missing.
    #[error("username and password are required")]
    MissingCredentials,
    /// A guard code was submitted while none is pending.
    #[error("a Steam Guard code is not currently needed")]
    CodeNotRequested,
    /// An empty guard code was submitted.
    #[error("the Steam Guard code is empty")]
    EmptyCode,
    /// The governor refused the attempt.
    #[error("{reason}")]
    RateLimited {
        /// Why the attempt was refused.
        reason: BlockReason,
    },
    /// An expected event did not arrive in time.
    #[error("timed out after {}s waiting for the {stage}", timeout.as_secs())]
    ReconnectTimeout {
        /// Which wait expired.
        stage: &'static str,
        /// The wait bound.
        timeout: Duration,
    },
    /// The server rejected the login.
    #[error("{message}")]
    LoginRejected {
        /// Reported code.
        result: EResult,
        /// Classification of the code.
        class: FailureClass,
        /// Operator-facing explanation.
        message: String,
    },
    /// The network client failed.
    #[error(transparent)]
    Client(#[from] ClientError),
    /// Persisting state failed.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// The translator thread could not be started.
    #[error("failed to start event translator: {source}")]
    Spawn {
        /// Underlying IO error.
        #[source]
        source: io::Error,
    },
}

impl AuthError {
    fn rejected(result: EResult) -> Self {
        Self::LoginRejected {
            result,
            class: result.class(),
            message: describe(result),
        }
    }
}

/// A client handle, its translator's controls, and its watch.
pub(crate) struct ActiveHandle {
    pub(crate) client: Arc<dyn NetworkClient>,
    pub(crate) watch: Arc<SessionWatch>,
    pub(crate) control: TranslatorControl,
}

impl ActiveHandle {
    /// Retires the translator, then disconnects.
    pub(crate) fn dispose(self) {
        self.control.retire();
        self.watch.close();
        self.client.disconnect();
    }
}

/// Owns this process's client handle and decides how to obtain a connection.
pub struct ConnectionManager {
    active: Mutex<Option<ActiveHandle>>,
    factory: Arc<dyn ClientFactory>,
    session: SessionStore,
    governor: RateLimitGovernor,
    daemon: Arc<dyn DaemonProbe>,
    sink: Arc<dyn MessageSink>,
    timeouts: SessionTimeouts,
    policy: ReconnectPolicy,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("session", &self.session.path())
            .field("governor", &self.governor)
            .field("timeouts", &self.timeouts)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Creates a manager with foreground defaults.
    #[must_use]
    pub fn new(
        factory: Arc<dyn ClientFactory>,
        session: SessionStore,
        governor: RateLimitGovernor,
        daemon: Arc<dyn DaemonProbe>,
    ) -> Self {
        Self {
            active: Mutex::new(None),
            factory,
            session,
            governor,
            daemon,
            sink: Arc::new(LogMessageSink),
            timeouts: SessionTimeouts::default(),
            policy: ReconnectPolicy::FOREGROUND,
        }
    }

    /// Overrides the wait bounds.
    #[must_use]
    pub const fn with_timeouts(mut self, timeouts: SessionTimeouts) -> Self {
        self.timeouts = timeouts;
        self
    }

    /// Routes chat messages received on foreground handles to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn MessageSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Returns the session store.
    #[must_use]
    pub const fn session_store(&self) -> &SessionStore {
        &self.session
    }

    /// Returns the governor.
    #[must_use]
    pub const fn governor(&self) -> &RateLimitGovernor {
        &self.governor
    }

    /// Returns true when a daemon is running.
    #[must_use]
    pub fn daemon_running(&self) -> bool {
        self.daemon.is_running()
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Option<ActiveHandle>> {
        self.active.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a logged-in connection, reusing or re-establishing one.
    ///
    /// The manager lock is held for the whole acquisition, so concurrent
    /// callers in one process never race to replace the handle.
    pub fn ensure_connection(&self) -> Result<Connection, AuthError> {
        let mut active = self.lock();

        if let Some(handle) = active.as_ref() {
            let steam_id = handle.client.current_identity();
            if handle.client.is_connected() && steam_id.is_known() {
                debug!(target: CONNECTION_TARGET, %steam_id, "reusing live connection");
                return Ok(self.go_online(Connection {
                    client: Arc::clone(&handle.client),
                    route: Route::Reused,
                    steam_id,
                }));
            }
        }

        let route = if self.daemon.is_running() {
            info!(target: CONNECTION_TARGET, "daemon is running; opening a parallel session");
            Route::Daemon
        } else {
            info!(target: CONNECTION_TARGET, "reconnecting with stored credentials");
            Route::Reauthenticated
        };

        let session = self.session.load();
        if !session.authenticated || !session.has_credentials() {
            return Err(AuthError::NotAuthenticated);
        }

        if let Some(stale) = active.take() {
            stale.dispose();
        }
        let handle = self.open_handle(false)?;
        let steam_id = match self.authenticate(&handle, &LogOnDetails::from_session(&session)) {
            Ok(steam_id) => steam_id,
            Err(err) => {
                handle.dispose();
                return Err(err);
            }
        };
        if route == Route::Reauthenticated {
            handle.control.set_auto_login(true);
        }

        let connection = Connection {
            client: Arc::clone(&handle.client),
            route,
            steam_id,
        };
        *active = Some(handle);
        Ok(self.go_online(connection))
    }

    /// Retires and disconnects the held handle, if any.
    pub fn dispose(&self) {
        if let Some(handle) = self.lock().take() {
            handle.dispose();
        }
    }

    fn go_online(&self, connection: Connection) -> Connection {
        if let Err(err) = connection.client.set_presence(PersonaState::Online) {
            warn!(target: CONNECTION_TARGET, error = %err, "failed to set presence");
        }
        connection
    }

    /// Opens a handle and starts its translator.
    pub(crate) fn open_handle(&self, auto_login: bool) -> Result<ActiveHandle, AuthError> {
        let (client, events) = self.factory.open()?;
        let watch = Arc::new(SessionWatch::new());
        let control = TranslatorControl::new(auto_login);
        Translator::new(
            Arc::clone(&client),
            self.session.clone(),
            self.governor.clone(),
            Arc::clone(&watch),
            control.clone(),
            self.policy,
        )
        .with_sink(Arc::clone(&self.sink))
        .spawn(events)
        .map_err(|source| AuthError::Spawn { source })?;
        Ok(ActiveHandle {
            client,
            watch,
            control,
        })
    }

    /// Connects and waits for the acknowledgement, returning the mark taken
    /// before connecting.
    pub(crate) fn connect(&self, handle: &ActiveHandle) -> Result<WatchMark, AuthError> {
        let mark = handle.watch.mark();
        handle.client.connect()?;
        match handle.watch.wait_connected(&mark, self.timeouts.connect) {
            Wait::Ready(()) => Ok(mark),
            _ => Err(AuthError::ReconnectTimeout {
                stage: "connection",
                timeout: self.timeouts.connect,
            }),
        }
    }

    /// Waits for the verdict on a login submitted after `mark`.
    pub(crate) fn await_login(
        &self,
        handle: &ActiveHandle,
        mark: &WatchMark,
    ) -> Result<SteamId, AuthError> {
        match handle.watch.wait_login(mark, self.timeouts.login) {
            Wait::Ready(LoginOutcome::LoggedOn(steam_id)) => Ok(steam_id),
            Wait::Ready(LoginOutcome::Failed(result)) => Err(AuthError::rejected(result)),
            Wait::Disconnected | Wait::Closed | Wait::TimedOut => {
                Err(AuthError::ReconnectTimeout {
                    stage: "login result",
                    timeout: self.timeouts.login,
                })
            }
        }
    }

    /// Connects, consults the governor, logs on, and waits for the verdict.
    pub(crate) fn authenticate(
        &self,
        handle: &ActiveHandle,
        details: &LogOnDetails,
    ) -> Result<SteamId, AuthError> {
        let mark = self.connect(handle)?;
        self.check_governor()?;
        handle.client.log_on(details)?;
        self.await_login(handle, &mark)
    }

    /// Fails when the governor blocks; returns the warning count otherwise.
    pub(crate) fn check_governor(&self) -> Result<Option<u32>, AuthError> {
        match self.governor.should_block() {
            Decision::Block(reason) => Err(AuthError::RateLimited { reason }),
            Decision::Warn { consecutive_fails } => {
                warn!(
                    target: CONNECTION_TARGET,
                    consecutive_fails,
                    "repeated login failures; a lockout is likely"
                );
                Ok(Some(consecutive_fails))
            }
            Decision::Allow => Ok(None),
        }
    }
}
