//! Durable records shared between CLI invocations and the daemon.
//!
//! Separate `steam` processes never exchange messages. They coordinate
//! through small JSON files in the state directory: the login session, the
//! rate-limit attempt history, the daemon heartbeat, and the log of received
//! messages. This crate owns those record types and the [`JsonStore`] that
//! reads and writes them.
//!
//! Loads fail soft: a missing or corrupt file yields the record's zero value.
//! Saves are atomic and owner-only.

mod daemon;
mod error;
mod files;
mod messages;
mod rate_limit;
mod session;
mod store;

pub use daemon::DaemonState;
pub use error::StoreError;
pub use messages::{IncomingMessage, MessageLog};
pub use rate_limit::RateLimitTracker;
pub use session::{Password, SessionState, SteamId};
pub use store::{JsonStore, Record};

/// Store holding the persisted [`SessionState`].
pub type SessionStore = JsonStore<SessionState>;

/// Store holding the persisted [`RateLimitTracker`].
pub type RateLimitStore = JsonStore<RateLimitTracker>;

/// Store holding the daemon's [`DaemonState`] heartbeat.
pub type DaemonStateStore = JsonStore<DaemonState>;
