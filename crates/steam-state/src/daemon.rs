use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::session::SteamId;
use crate::store::Record;

/// Heartbeat snapshot written by a running daemon.
///
/// The file outlives a crashed daemon, so readers must pair it with a
/// liveness probe on `pid` before trusting it.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonState {
    /// Process identifier of the daemon.
    pub pid: u32,
    /// When the daemon process was launched.
    #[serde(with = "time::serde::rfc3339::option")]
    pub start_time: Option<OffsetDateTime>,
    /// Whether the daemon's handle is connected.
    pub connected: bool,
    /// Identity the daemon is logged in as.
    pub steam_id: SteamId,
    /// Account the daemon is running for.
    pub username: String,
    /// Time of the last heartbeat.
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

impl DaemonState {
    /// Builds the initial snapshot recorded when the daemon is launched.
    #[must_use]
    pub fn launched(pid: u32, start_time: OffsetDateTime) -> Self {
        Self {
            pid,
            start_time: Some(start_time),
            ..Self::default()
        }
    }
}

impl Record for DaemonState {
    fn stamp(&mut self, now: OffsetDateTime) {
        self.updated_at = Some(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DaemonStateStore;
    use rstest::rstest;
    use tempfile::TempDir;
    use time::macros::datetime;

    #[rstest]
    fn heartbeat_round_trips_through_store() {
        let dir = TempDir::new().expect("temp dir");
        let store = DaemonStateStore::new(dir.path().join("daemon_state.json"));
        let mut state = DaemonState::launched(4242, datetime!(2025-03-01 08:00 UTC));
        state.connected = true;
        state.steam_id = SteamId::new(9);
        state.username = String::from("alice");

        let written = store.save(state).expect("save");
        let loaded = store.load();
        assert_eq!(loaded, written);
        assert!(loaded.updated_at.is_some());
    }
}
