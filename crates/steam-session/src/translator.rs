//! Turns a handle's event stream into persisted session transitions.
//!
//! Exactly one [`Translator`] consumes each handle's [`EventStream`]. It owns
//! the stream, so the loop ends when the handle is disposed and the stream
//! closes. Every event is written through to `session.json` before the
//! in-process [`SessionWatch`] is notified, so a waiter that wakes up can
//! trust what it reads from the store.

use std::borrow::Cow;
use std::fmt;
use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use steam_state::{Password, SessionState, SessionStore, SteamId};
use tracing::{debug, error, info, warn};

use crate::cancel::CancelToken;
use crate::client::{ClientEvent, EventStream, LogOnDetails, NetworkClient, PersonaState};
use crate::governor::{AttemptOutcome, BlockReason, Decision, RateLimitGovernor};
use crate::result::{EResult, describe};
use crate::watch::{LoginOutcome, SessionWatch};

const TRANSLATOR_TARGET: &str = "steam_session::translator";
/// Added to a block's remaining time so the retry lands after it lifts.
const BLOCK_SLACK: Duration = Duration::from_millis(100);

/// What to do when the connection drops.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReconnectPolicy {
    /// Stay disconnected.
    Never,
    /// Reconnect after `delay` only while a guard code is pending, so the
    /// code can be submitted on a live connection.
    AwaitingCode {
        /// Pause before reconnecting.
        delay: Duration,
    },
    /// Reconnect after `delay` every time.
    Always {
        /// Pause before reconnecting.
        delay: Duration,
    },
}

impl ReconnectPolicy {
    /// Foreground behaviour: reconnect only to collect a guard code.
    pub const FOREGROUND: Self = Self::AwaitingCode {
        delay: Duration::from_secs(2),
    };
    /// Daemon behaviour: always reconnect.
    pub const DAEMON: Self = Self::Always {
        delay: Duration::from_secs(5),
    };
}

/// Receives chat messages observed on the connection.
pub trait MessageSink: Send + Sync {
    /// Handles one incoming message.
    fn deliver(&self, sender: SteamId, message: &str);
}

/// [`MessageSink`] that writes messages to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogMessageSink;

impl MessageSink for LogMessageSink {
    fn deliver(&self, sender: SteamId, message: &str) {
        info!(target: TRANSLATOR_TARGET, %sender, message, "chat message received");
    }
}

/// Notified after each successful login.
pub trait LoginObserver: Send + Sync {
    /// Called once the session has been persisted as authenticated.
    fn logged_on(&self, client: &dyn NetworkClient, steam_id: SteamId);
}

/// Shared switches a handle's owner uses to steer its translator.
#[derive(Clone, Default)]
pub struct TranslatorControl {
    auto_login: Arc<AtomicBool>,
    retired: CancelToken,
    pending_password: Arc<Mutex<Option<Password>>>,
}

impl fmt::Debug for TranslatorControl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TranslatorControl")
            .field("auto_login", &self.auto_login_enabled())
            .field("retired", &self.is_retired())
            .finish_non_exhaustive()
    }
}

impl TranslatorControl {
    /// Creates controls with auto-login set as given.
    #[must_use]
    pub fn new(auto_login: bool) -> Self {
        Self::with_retire_token(auto_login, CancelToken::new())
    }

    /// Creates controls whose retirement is tied to an existing token.
    #[must_use]
    pub fn with_retire_token(auto_login: bool, retired: CancelToken) -> Self {
        Self {
            auto_login: Arc::new(AtomicBool::new(auto_login)),
            retired,
            pending_password: Arc::new(Mutex::new(None)),
        }
    }

    /// Enables or suppresses logging on automatically after each connect.
    pub fn set_auto_login(&self, enabled: bool) {
        self.auto_login.store(enabled, Ordering::SeqCst);
    }

    /// Returns true when connects trigger an automatic login.
    #[must_use]
    pub fn auto_login_enabled(&self) -> bool {
        self.auto_login.load(Ordering::SeqCst)
    }

    /// Holds a password in memory until the next successful login.
    pub fn set_pending_password(&self, password: Password) {
        *self
            .pending_password
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(password);
    }

    fn take_pending_password(&self) -> Option<Password> {
        self.pending_password
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }

    fn pending_password(&self) -> Option<Password> {
        self.pending_password
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Returns true when a pending password is held.
    #[must_use]
    pub fn has_pending_password(&self) -> bool {
        self.pending_password
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Detaches the translator from the session record.
    ///
    /// Call before a deliberate disconnect so the resulting `Disconnected`
    /// event does not overwrite the persisted session.
    pub fn retire(&self) {
        self.retired.cancel();
    }

    /// Returns true once retired.
    #[must_use]
    pub fn is_retired(&self) -> bool {
        self.retired.is_cancelled()
    }
}

/// Consumes one handle's events and persists the resulting transitions.
pub struct Translator {
    client: Arc<dyn NetworkClient>,
    session: SessionStore,
    governor: RateLimitGovernor,
    watch: Arc<SessionWatch>,
    control: TranslatorControl,
    policy: ReconnectPolicy,
    sink: Arc<dyn MessageSink>,
    observer: Option<Arc<dyn LoginObserver>>,
}

impl fmt::Debug for Translator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Translator")
            .field("session", &self.session.path())
            .field("control", &self.control)
            .field("policy", &self.policy)
            .finish_non_exhaustive()
    }
}

impl Translator {
    /// Builds a translator for `client`.
    #[must_use]
    pub fn new(
        client: Arc<dyn NetworkClient>,
        session: SessionStore,
        governor: RateLimitGovernor,
        watch: Arc<SessionWatch>,
        control: TranslatorControl,
        policy: ReconnectPolicy,
    ) -> Self {
        Self {
            client,
            session,
            governor,
            watch,
            control,
            policy,
            sink: Arc::new(LogMessageSink),
            observer: None,
        }
    }

    /// Routes chat messages to `sink`.
    #[must_use]
    pub fn with_sink(mut self, sink: Arc<dyn MessageSink>) -> Self {
        self.sink = sink;
        self
    }

    /// Registers a callback for successful logins.
    #[must_use]
    pub fn with_observer(mut self, observer: Arc<dyn LoginObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    /// Runs the event loop on a named thread.
    pub fn spawn(self, events: EventStream) -> io::Result<JoinHandle<()>> {
        thread::Builder::new()
            .name(String::from("steam-translator"))
            .spawn(move || self.run(events))
    }

    /// Consumes events until the stream closes or the translator is retired.
    pub fn run(self, events: EventStream) {
        for event in events.iter() {
            if self.control.is_retired() {
                debug!(target: TRANSLATOR_TARGET, ?event, "dropping event for retired handle");
                break;
            }
            self.handle(event);
        }
        self.watch.close();
        debug!(target: TRANSLATOR_TARGET, "event stream ended");
    }

    /// Applies one event.
    pub fn handle(&self, event: ClientEvent) {
        match event {
            ClientEvent::Connected => self.on_connected(),
            ClientEvent::LoggedOn { steam_id } => self.on_logged_on(steam_id),
            ClientEvent::LogOnFailed { result } => self.on_log_on_failed(result),
            ClientEvent::Disconnected => self.on_disconnected(),
            ClientEvent::ChatMessage { sender, message } => self.sink.deliver(sender, &message),
        }
    }

    fn persist(&self, mutate: impl FnOnce(&mut SessionState)) -> SessionState {
        match self.session.update(mutate) {
            Ok(state) => state,
            Err(err) => {
                error!(target: TRANSLATOR_TARGET, error = %err, "failed to persist session state");
                self.session.load()
            }
        }
    }

    fn record(&self, outcome: AttemptOutcome) {
        if let Err(err) = self.governor.record_attempt(outcome) {
            error!(target: TRANSLATOR_TARGET, error = %err, "failed to record login attempt");
        }
    }

    fn on_connected(&self) {
        let state = self.persist(SessionState::mark_connected);
        self.watch.notify_connected();
        info!(target: TRANSLATOR_TARGET, "connected to Steam");

        if !self.control.auto_login_enabled() {
            debug!(target: TRANSLATOR_TARGET, "auto-login suppressed; caller will log on");
            return;
        }
        self.auto_log_on(&state);
    }

    fn auto_log_on(&self, connected: &SessionState) {
        let mut state = Cow::Borrowed(connected);
        loop {
            match self.governor.should_block() {
                Decision::Block(reason) => {
                    warn!(target: TRANSLATOR_TARGET, %reason, "automatic login blocked");
                    self.persist(|session| session.mark_error(reason.to_string()));
                    if !self.wait_out_block(reason) {
                        return;
                    }
                    state = Cow::Owned(self.session.load());
                }
                Decision::Warn { consecutive_fails } => {
                    warn!(
                        target: TRANSLATOR_TARGET,
                        consecutive_fails,
                        "repeated login failures; a lockout is likely"
                    );
                    break;
                }
                Decision::Allow => break,
            }
        }
        self.submit_login(&state);
    }

    /// Under [`ReconnectPolicy::Always`] sleeps until `reason` lifts and
    /// returns true if the login should be retried. Other policies give up.
    fn wait_out_block(&self, reason: BlockReason) -> bool {
        if !matches!(self.policy, ReconnectPolicy::Always { .. }) {
            return false;
        }
        let wait = reason.remaining().saturating_add(BLOCK_SLACK);
        info!(target: TRANSLATOR_TARGET, wait_ms = wait.as_millis(), "retrying login once the block lifts");
        if self.control.retired.wait_timeout(wait) {
            return false;
        }
        self.client.is_connected() && self.control.auto_login_enabled()
    }

    fn submit_login(&self, state: &SessionState) {
        let password = self
            .control
            .pending_password()
            .unwrap_or_else(|| state.password.clone());
        if state.username.is_empty() || password.is_empty() {
            warn!(target: TRANSLATOR_TARGET, "no stored credentials for automatic login");
            self.persist(|session| session.mark_error("no stored credentials"));
            return;
        }

        let details = LogOnDetails::new(state.username.clone(), password);
        if let Err(err) = self.client.log_on(&details) {
            warn!(target: TRANSLATOR_TARGET, error = %err, "failed to submit login");
            self.persist(|session| session.mark_error(err.to_string()));
        }
    }

    fn on_logged_on(&self, reported: SteamId) {
        let steam_id = if reported.is_known() {
            reported
        } else {
            self.client.current_identity()
        };
        let mut accepted = false;
        self.persist(|session| accepted = session.mark_authenticated(steam_id));
        if !accepted {
            warn!(target: TRANSLATOR_TARGET, "login reported without an account identity");
            self.record(AttemptOutcome::Failure(EResult::FAIL));
            self.watch.notify_login(LoginOutcome::Failed(EResult::FAIL));
            return;
        }

        self.record(AttemptOutcome::Success);
        drop(self.control.take_pending_password());
        self.watch.notify_login(LoginOutcome::LoggedOn(steam_id));
        info!(target: TRANSLATOR_TARGET, %steam_id, "authenticated");

        if let Err(err) = self.client.set_presence(PersonaState::Online) {
            warn!(target: TRANSLATOR_TARGET, error = %err, "failed to set presence");
        }
        if let Some(observer) = &self.observer {
            observer.logged_on(self.client.as_ref(), steam_id);
        }
    }

    fn on_log_on_failed(&self, result: EResult) {
        self.record(AttemptOutcome::Failure(result));
        let class = result.class();
        let message = describe(result);
        warn!(target: TRANSLATOR_TARGET, %result, ?class, "login rejected");
        self.persist(|session| session.mark_login_failed(message, class.needs_code()));
        self.watch.notify_login(LoginOutcome::Failed(result));
    }

    fn on_disconnected(&self) {
        let state = self.persist(SessionState::mark_disconnected);
        self.watch.notify_disconnected();
        info!(target: TRANSLATOR_TARGET, "disconnected from Steam");

        let delay = match self.policy {
            ReconnectPolicy::Never => return,
            ReconnectPolicy::AwaitingCode { delay } => {
                if !state.needs_code || state.authenticated {
                    return;
                }
                // The code is not known yet; keep the connection warm for it.
                self.control.set_auto_login(false);
                delay
            }
            ReconnectPolicy::Always { delay } => delay,
        };

        if self.control.retired.wait_timeout(delay) {
            return;
        }
        info!(target: TRANSLATOR_TARGET, delay_secs = delay.as_secs(), "reconnecting");
        if let Err(err) = self.client.connect() {
            warn!(target: TRANSLATOR_TARGET, error = %err, "reconnect failed");
            self.persist(|session| session.mark_error(err.to_string()));
        }
    }
}
