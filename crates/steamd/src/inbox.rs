//! Persists chat messages received by the daemon.

use steam_session::MessageSink;
use steam_state::{IncomingMessage, MessageLog, SteamId};
use tracing::{info, warn};

const INBOX_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::inbox");

/// [`MessageSink`] appending each message to `messages.jsonl`.
#[derive(Debug, Clone)]
pub struct MessageLogSink {
    log: MessageLog,
}

impl MessageLogSink {
    /// Appends to `log`.
    #[must_use]
    pub const fn new(log: MessageLog) -> Self {
        Self { log }
    }
}

impl MessageSink for MessageLogSink {
    fn deliver(&self, sender: SteamId, message: &str) {
        info!(target: INBOX_TARGET, %sender, "chat message received");
        if let Err(error) = self.log.append(&IncomingMessage::now(sender, message)) {
            warn!(target: INBOX_TARGET, %sender, %error, "failed to record chat message");
        }
    }
}
