//! Keeps the daemon's account shown as online.
//!
//! The server lets an idle session drift to "away", so after every login the
//! loop sets Online again shortly afterwards and then at a fixed interval for
//! as long as the connection stays up.

use std::sync::Arc;
use std::time::Duration;

use steam_session::{CancelToken, LoginOutcome, NetworkClient, PersonaState, SessionWatch, Wait};
use tracing::{debug, warn};

const PRESENCE_TARGET: &str = concat!(env!("CARGO_PKG_NAME"), "::presence");

/// Timing of presence reinforcement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PresenceSchedule {
    /// Delay between a login and the first reinforcement.
    pub follow_up: Duration,
    /// Interval between later reinforcements.
    pub interval: Duration,
}

impl Default for PresenceSchedule {
    fn default() -> Self {
        Self {
            follow_up: Duration::from_secs(2),
            interval: Duration::from_secs(30),
        }
    }
}

pub(crate) struct PresenceLoop {
    pub(crate) client: Arc<dyn NetworkClient>,
    pub(crate) watch: Arc<SessionWatch>,
    pub(crate) token: CancelToken,
    pub(crate) schedule: PresenceSchedule,
}

impl PresenceLoop {
    /// Runs until the token is cancelled or the watch closes.
    pub(crate) fn run(&self) {
        let mut mark = self.watch.mark();
        loop {
            match self.watch.next_login(&mut mark, self.schedule.interval) {
                Wait::Ready(LoginOutcome::LoggedOn(steam_id)) => {
                    debug!(target: PRESENCE_TARGET, %steam_id, "login observed");
                }
                Wait::Closed => return,
                Wait::Ready(LoginOutcome::Failed(_)) | Wait::TimedOut | Wait::Disconnected => {
                    if self.token.is_cancelled() {
                        return;
                    }
                    continue;
                }
            }
            if self.token.wait_timeout(self.schedule.follow_up) {
                return;
            }
            if !self.reinforce_while_connected() {
                return;
            }
        }
    }

    /// Reinforces until the connection drops (returns true) or the token is
    /// cancelled (returns false).
    fn reinforce_while_connected(&self) -> bool {
        loop {
            if !self.client.is_connected() {
                debug!(target: PRESENCE_TARGET, "connection lost; waiting for the next login");
                return true;
            }
            if let Err(error) = self.client.set_presence(PersonaState::Online) {
                warn!(target: PRESENCE_TARGET, %error, "failed to reinforce presence");
            } else {
                debug!(target: PRESENCE_TARGET, "presence reinforced");
            }
            if self.token.wait_timeout(self.schedule.interval) {
                return false;
            }
        }
    }
}
