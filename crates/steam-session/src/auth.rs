//! Operator-facing authentication flows.

use steam_state::{Password, SessionState, SteamId};
use tracing::info;

use crate::client::{ChatEntryType, LogOnDetails};
use crate::connection::{ActiveHandle, AuthError, Connection, ConnectionManager};
use crate::governor::Decision;

const AUTH_TARGET: &str = "steam_session::auth";

/// Where a login flow ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoginStatus {
    /// The stored session was already connected and authenticated.
    AlreadyAuthenticated {
        /// Stored account name.
        username: String,
        /// Stored identity.
        steam_id: SteamId,
    },
    /// The login completed.
    Authenticated {
        /// Identity assigned by the server.
        steam_id: SteamId,
    },
    /// The server wants a Steam Guard or two-factor code.
    CodeRequired {
        /// Explanation to show the operator.
        message: String,
    },
}

/// Outcome of [`AuthService::login`] or [`AuthService::submit_code`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoginReport {
    /// Where the flow ended up.
    pub status: LoginStatus,
    /// Consecutive failures recorded before this attempt, when high enough
    /// to warrant a warning.
    pub prior_failures: Option<u32>,
}

/// Login, code submission, logout, and messaging on top of a
/// [`ConnectionManager`].
#[derive(Debug)]
pub struct AuthService {
    manager: ConnectionManager,
}

impl AuthService {
    /// Wraps a connection manager.
    #[must_use]
    pub const fn new(manager: ConnectionManager) -> Self {
        Self { manager }
    }

    /// Returns the underlying connection manager.
    #[must_use]
    pub const fn manager(&self) -> &ConnectionManager {
        &self.manager
    }

    /// Starts a fresh login with explicit credentials.
    ///
    /// The credentials are stored before connecting so the translator can
    /// log on automatically once the server acknowledges the connection.
    pub fn login(&self, username: &str, password: Password) -> Result<LoginReport, AuthError> {
        let stored = self.status();
        if stored.connected && stored.authenticated {
            return Ok(LoginReport {
                status: LoginStatus::AlreadyAuthenticated {
                    username: stored.username,
                    steam_id: stored.steam_id,
                },
                prior_failures: None,
            });
        }

        let prior_failures = self.manager.check_governor()?;
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::MissingCredentials);
        }

        let mut active = self.manager.lock();
        if let Some(stale) = active.take() {
            stale.dispose();
        }
        self.manager
            .session_store()
            .save(SessionState::for_login(username, password.clone()))?;
        info!(target: AUTH_TARGET, username, "starting login");

        let handle = self.manager.open_handle(true)?;
        handle.control.set_pending_password(password);
        let outcome = self
            .manager
            .connect(&handle)
            .and_then(|mark| self.manager.await_login(&handle, &mark));
        let status = settle(outcome, handle, &mut active)?;
        Ok(LoginReport {
            status,
            prior_failures,
        })
    }

    /// Resubmits the stored credentials together with a guard code.
    pub fn submit_code(&self, code: &str) -> Result<LoginReport, AuthError> {
        let code = code.trim();
        if code.is_empty() {
            return Err(AuthError::EmptyCode);
        }
        let stored = self.status();
        if !stored.needs_code {
            return Err(AuthError::CodeNotRequested);
        }
        if !stored.has_credentials() {
            return Err(AuthError::MissingCredentials);
        }
        let prior_failures = self.manager.check_governor()?;

        let mut active = self.manager.lock();
        if let Some(stale) = active.take() {
            stale.dispose();
        }
        info!(target: AUTH_TARGET, username = %stored.username, "submitting guard code");

        let handle = self.manager.open_handle(false)?;
        let details = LogOnDetails::from_session(&stored).with_guard_code(code);
        let outcome = self.manager.authenticate(&handle, &details);
        let status = settle(outcome, handle, &mut active)?;
        Ok(LoginReport {
            status,
            prior_failures,
        })
    }

    /// Disconnects and forgets the stored session.
    pub fn logout(&self) -> Result<(), AuthError> {
        self.manager.dispose();
        self.manager.session_store().clear()?;
        info!(target: AUTH_TARGET, "logged out");
        Ok(())
    }

    /// Returns the stored session.
    #[must_use]
    pub fn status(&self) -> SessionState {
        self.manager.session_store().load()
    }

    /// Returns what the governor would decide for a login now.
    #[must_use]
    pub fn rate_limit_decision(&self) -> Decision {
        self.manager.governor().should_block()
    }

    /// Forgets the login attempt history.
    pub fn clear_rate_limit(&self) -> Result<(), AuthError> {
        self.manager.governor().clear()?;
        Ok(())
    }

    /// Sends a chat message, acquiring a connection first.
    pub fn send_message(&self, recipient: SteamId, text: &str) -> Result<Connection, AuthError> {
        let connection = self.manager.ensure_connection()?;
        connection
            .client()
            .send_message(recipient, ChatEntryType::ChatMsg, text)?;
        info!(target: AUTH_TARGET, %recipient, route = ?connection.route(), "message sent");
        Ok(connection)
    }
}

/// Keeps the handle when the flow succeeded or is waiting for a code, and
/// disposes it otherwise.
fn settle(
    outcome: Result<SteamId, AuthError>,
    handle: ActiveHandle,
    active: &mut Option<ActiveHandle>,
) -> Result<LoginStatus, AuthError> {
    match outcome {
        Ok(steam_id) => {
            handle.control.set_auto_login(true);
            *active = Some(handle);
            Ok(LoginStatus::Authenticated { steam_id })
        }
        Err(AuthError::LoginRejected { class, message, .. }) if class.needs_code() => {
            *active = Some(handle);
            Ok(LoginStatus::CodeRequired { message })
        }
        Err(err) => {
            handle.dispose();
            Err(err)
        }
    }
}
