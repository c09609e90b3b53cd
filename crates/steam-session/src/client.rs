//! The network client seam.
//!
//! The session core never speaks the wire protocol. It drives a
//! [`NetworkClient`] and consumes the [`ClientEvent`] stream that client
//! produces. Production code reaches the network through the bridge process
//! in [`crate::bridge`]; tests substitute scripted doubles.

use std::io;
use std::sync::Arc;
use std::sync::mpsc::Receiver;

use serde::{Deserialize, Serialize};
use steam_state::{Password, SessionState, SteamId};
use strum::{Display, EnumString};
use thiserror::Error;

use crate::result::EResult;

/// Events emitted by a network client, in arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The server acknowledged the connection.
    Connected,
    /// Login succeeded.
    LoggedOn {
        /// Identity assigned by the server.
        steam_id: SteamId,
    },
    /// Login was rejected.
    LogOnFailed {
        /// Reported result code.
        result: EResult,
    },
    /// The connection dropped.
    Disconnected,
    /// A chat message arrived.
    ChatMessage {
        /// Sender's identity.
        sender: SteamId,
        /// Message text.
        message: String,
    },
}

/// Receiving half of a client's event stream.
///
/// The stream ends when the client is disposed.
pub type EventStream = Receiver<ClientEvent>;

/// Credentials submitted with a login request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogOnDetails {
    /// Account name.
    pub account_name: String,
    /// Account password.
    pub password: Password,
    /// Steam Guard email code or mobile authenticator code.
    pub guard_code: Option<String>,
}

impl LogOnDetails {
    /// Builds details from explicit credentials.
    #[must_use]
    pub fn new(account_name: impl Into<String>, password: Password) -> Self {
        Self {
            account_name: account_name.into(),
            password,
            guard_code: None,
        }
    }

    /// Replays the credentials stored in a session record.
    #[must_use]
    pub fn from_session(session: &SessionState) -> Self {
        Self::new(session.username.clone(), session.password.clone())
    }

    /// Attaches a guard code.
    #[must_use]
    pub fn with_guard_code(mut self, code: impl Into<String>) -> Self {
        self.guard_code = Some(code.into());
        self
    }
}

/// Presence shown to friends.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum PersonaState {
    /// Not visible.
    Offline,
    /// Online and available.
    Online,
    /// Busy.
    Busy,
    /// Away from keyboard.
    Away,
    /// Idle for a long time.
    Snooze,
    /// Looking to trade.
    LookingToTrade,
    /// Looking to play.
    LookingToPlay,
    /// Online but shown as offline.
    Invisible,
}

/// Kind of chat entry being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatEntryType {
    /// An ordinary chat message.
    ChatMsg,
    /// A typing notification.
    Typing,
    /// An emote.
    Emote,
}

/// Operations the session core needs from a network client.
///
/// Implementations must be usable from several threads at once: the
/// translator, the presence loop, and the foreground flow all share one
/// handle.
pub trait NetworkClient: Send + Sync {
    /// Starts connecting. Completion is reported as [`ClientEvent::Connected`].
    fn connect(&self) -> Result<(), ClientError>;

    /// Drops the connection.
    fn disconnect(&self);

    /// Returns true while the transport is connected.
    fn is_connected(&self) -> bool;

    /// Returns the logged-in identity, or [`SteamId::NONE`].
    fn current_identity(&self) -> SteamId;

    /// Submits a login request. The verdict arrives as an event.
    fn log_on(&self, details: &LogOnDetails) -> Result<(), ClientError>;

    /// Sets the account's presence.
    fn set_presence(&self, state: PersonaState) -> Result<(), ClientError>;

    /// Sends a chat entry to a friend.
    fn send_message(
        &self,
        recipient: SteamId,
        kind: ChatEntryType,
        text: &str,
    ) -> Result<(), ClientError>;

    /// Asks the server to deliver messages queued while offline.
    fn request_offline_messages(&self) -> Result<(), ClientError>;
}

/// Creates network client handles.
pub trait ClientFactory: Send + Sync {
    /// Opens a new, unconnected handle and its event stream.
    fn open(&self) -> Result<(Arc<dyn NetworkClient>, EventStream), ClientError>;
}

/// Errors reported by a network client.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// No bridge command is configured.
    #[error("no network bridge configured; set bridge_command or STEAM_CLI_BRIDGE_COMMAND")]
    NotConfigured,
    /// The bridge process could not be launched.
    #[error("failed to launch network bridge '{program}': {source}")]
    Spawn {
        /// Program that failed to start.
        program: String,
        /// Underlying IO error.
        #[source]
        source: Arc<io::Error>,
    },
    /// Talking to the bridge failed.
    #[error("network bridge IO failed: {source}")]
    Io {
        /// Underlying IO error.
        #[source]
        source: Arc<io::Error>,
    },
    /// The handle has already been disposed.
    #[error("network client is closed")]
    Closed,
    /// The operation requires a connection.
    #[error("network client is not connected")]
    NotConnected,
    /// The client reported a failure of its own.
    #[error("network client error: {message}")]
    Remote {
        /// Description from the client.
        message: String,
    },
}

impl From<io::Error> for ClientError {
    fn from(source: io::Error) -> Self {
        Self::Io {
            source: Arc::new(source),
        }
    }
}
