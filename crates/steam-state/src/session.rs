//! The persisted login session.

use std::fmt;
use std::num::ParseIntError;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use time::OffsetDateTime;
use zeroize::Zeroizing;

use crate::store::Record;

/// A 64-bit Steam account identifier. Zero means "unknown".
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SteamId(u64);

impl SteamId {
    /// The unknown identity.
    pub const NONE: Self = Self(0);

    /// Wraps a raw identifier.
    #[must_use]
    pub const fn new(raw: u64) -> Self {
        Self(raw)
    }

    /// Returns the raw identifier.
    #[must_use]
    pub const fn get(self) -> u64 {
        self.0
    }

    /// Returns true for any identity other than [`SteamId::NONE`].
    #[must_use]
    pub const fn is_known(self) -> bool {
        self.0 != 0
    }
}

impl fmt::Display for SteamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for SteamId {
    type Err = ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim().parse().map(Self)
    }
}

impl From<u64> for SteamId {
    fn from(raw: u64) -> Self {
        Self(raw)
    }
}

/// A password that is wiped from memory when dropped.
///
/// It serialises as a plain string because credential replay needs it on
/// disk; the session file is owner-only. `Debug` never prints the value.
#[derive(Clone, Default)]
pub struct Password(Zeroizing<String>);

impl Password {
    /// Wraps a plaintext password.
    #[must_use]
    pub fn new(plaintext: impl Into<String>) -> Self {
        Self(Zeroizing::new(plaintext.into()))
    }

    /// Borrows the plaintext for submission to the network client.
    #[must_use]
    pub fn expose(&self) -> &str {
        self.0.as_str()
    }

    /// Returns true when no password is held.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Debug for Password {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("Password(<empty>)")
        } else {
            f.write_str("Password(<redacted>)")
        }
    }
}

impl PartialEq for Password {
    fn eq(&self, other: &Self) -> bool {
        self.expose() == other.expose()
    }
}

impl Eq for Password {}

impl Serialize for Password {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.expose())
    }
}

impl<'de> Deserialize<'de> for Password {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(Self::new)
    }
}

/// Connection and authentication progress shared across invocations.
///
/// `authenticated` implies `connected` and a known `steam_id`;
/// `needs_code` implies not `authenticated`. The `mark_*` helpers are the
/// only transitions and each preserves both rules.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionState {
    /// Account name used for the last login.
    pub username: String,
    /// Password kept for code resubmission and credential replay.
    pub password: Password,
    /// Whether the last known handle reached the server.
    pub connected: bool,
    /// Whether the last known handle completed login.
    pub authenticated: bool,
    /// Whether the server is waiting for a Steam Guard or two-factor code.
    pub needs_code: bool,
    /// Identity assigned on login.
    pub steam_id: SteamId,
    /// Human-readable reason for the last failure; empty when none.
    pub last_error: String,
    /// Time of the last save.
    #[serde(with = "time::serde::rfc3339::option")]
    pub updated_at: Option<OffsetDateTime>,
}

impl SessionState {
    /// Starts a fresh record for a new login attempt.
    #[must_use]
    pub fn for_login(username: impl Into<String>, password: Password) -> Self {
        Self {
            username: username.into(),
            password,
            ..Self::default()
        }
    }

    /// Returns true when both a username and password are stored.
    #[must_use]
    pub fn has_credentials(&self) -> bool {
        !self.username.is_empty() && !self.password.is_empty()
    }

    /// Records that the server acknowledged the connection.
    pub fn mark_connected(&mut self) {
        self.connected = true;
        self.last_error.clear();
    }

    /// Records a successful login.
    ///
    /// An unknown identity cannot satisfy the authenticated invariant, so it
    /// is recorded as a failure instead and `false` is returned.
    pub fn mark_authenticated(&mut self, steam_id: SteamId) -> bool {
        if !steam_id.is_known() {
            self.authenticated = false;
            self.last_error = String::from("login succeeded without an account identity");
            return false;
        }
        self.connected = true;
        self.authenticated = true;
        self.needs_code = false;
        self.steam_id = steam_id;
        self.last_error.clear();
        true
    }

    /// Records a rejected login.
    pub fn mark_login_failed(&mut self, message: impl Into<String>, needs_code: bool) {
        self.authenticated = false;
        self.needs_code = needs_code;
        self.last_error = message.into();
    }

    /// Records a lost connection. `needs_code` survives so a pending code
    /// prompt is not forgotten.
    pub fn mark_disconnected(&mut self) {
        self.connected = false;
        self.authenticated = false;
    }

    /// Records an error without changing connection flags.
    pub fn mark_error(&mut self, message: impl Into<String>) {
        self.last_error = message.into();
    }

    /// Checks the two record invariants.
    #[must_use]
    pub fn is_consistent(&self) -> bool {
        let auth_ok = !self.authenticated || (self.connected && self.steam_id.is_known());
        let code_ok = !self.needs_code || !self.authenticated;
        auth_ok && code_ok
    }
}

impl Record for SessionState {
    fn stamp(&mut self, now: OffsetDateTime) {
        self.updated_at = Some(now);
    }
}
