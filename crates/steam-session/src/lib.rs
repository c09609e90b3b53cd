//! Login lifecycle for the Steam command-line client.
//!
//! The crate turns events from a [`NetworkClient`] into persisted session
//! state and decides how each command obtains a logged-in connection.
//!
//! # Architecture
//!
//! - A [`ClientFactory`] opens a handle: a [`NetworkClient`] plus the
//!   [`EventStream`] it reports on. The production factory is
//!   [`BridgeFactory`], which talks to an external bridge process.
//! - A [`Translator`] consumes each stream on its own thread. It writes every
//!   transition to `session.json`, feeds verdicts to the
//!   [`RateLimitGovernor`], and wakes waiters through a [`SessionWatch`].
//! - The [`ConnectionManager`] owns the one live handle per process and
//!   implements the reuse, daemon, and re-authentication routes of
//!   [`ConnectionManager::ensure_connection`].
//! - [`AuthService`] layers the operator flows on top: login, guard code
//!   submission, logout, and sending a message.
//!
//! Processes never talk to each other; they share only the JSON records
//! managed by `steam_state`.

mod auth;
mod bridge;
mod cancel;
mod client;
mod connection;
mod governor;
mod result;
mod translator;
mod watch;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

#[cfg(test)]
mod tests;

pub use auth::{AuthService, LoginReport, LoginStatus};
pub use bridge::{BridgeClient, BridgeCommand, BridgeEvent, BridgeFactory};
pub use cancel::CancelToken;
pub use client::{
    ChatEntryType, ClientError, ClientEvent, ClientFactory, EventStream, LogOnDetails,
    NetworkClient, PersonaState,
};
pub use connection::{
    AuthError, Connection, ConnectionManager, DEFAULT_CONNECT_TIMEOUT, DEFAULT_LOGIN_TIMEOUT,
    DaemonProbe, NoDaemon, Route, SessionTimeouts,
};
pub use governor::{
    ATTEMPT_SPACING, AttemptOutcome, BlockReason, COOLDOWN, Clock, Decision,
    ESCALATION_THRESHOLD, RateLimitGovernor, SystemClock, WARN_THRESHOLD,
};
pub use result::{EResult, FailureClass, describe};
pub use translator::{
    LogMessageSink, LoginObserver, MessageSink, ReconnectPolicy, Translator, TranslatorControl,
};
pub use watch::{LoginOutcome, SessionWatch, Wait, WatchMark};
