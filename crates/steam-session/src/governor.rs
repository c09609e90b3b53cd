//! Client-side login throttling.
//!
//! The remote service locks accounts out after bursts of failed logins. The
//! governor keeps the attempt history in `rate_limit.json` and refuses to
//! submit a login while a cooldown is active or the previous attempt was too
//! recent. It is consulted before every login and updated after every
//! verdict, including verdicts observed by the daemon.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use steam_state::{RateLimitStore, RateLimitTracker, StoreError};
use time::OffsetDateTime;
use tracing::{info, warn};

use crate::result::{EResult, FailureClass};

const GOVERNOR_TARGET: &str = "steam_session::governor";

/// Minimum gap between login attempts.
pub const ATTEMPT_SPACING: Duration = Duration::from_secs(5);
/// Cooldown imposed after a remote rate limit or repeated failures.
pub const COOLDOWN: Duration = Duration::from_secs(15 * 60);
/// Consecutive failures after which callers are warned.
pub const WARN_THRESHOLD: u32 = 3;
/// Consecutive failures after which the cooldown is imposed locally.
pub const ESCALATION_THRESHOLD: u32 = 5;

/// Source of the current time.
pub trait Clock: Send + Sync {
    /// Returns the current UTC time.
    fn now(&self) -> OffsetDateTime;
}

/// Wall-clock [`Clock`].
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}

/// Why a login attempt was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockReason {
    /// A cooldown is in force.
    Cooldown {
        /// Time left in the cooldown.
        remaining: Duration,
    },
    /// The previous attempt was less than [`ATTEMPT_SPACING`] ago.
    TooSoon {
        /// Time left before the next attempt is allowed.
        wait: Duration,
    },
}

impl BlockReason {
    /// Time until the block lifts.
    #[must_use]
    pub const fn remaining(&self) -> Duration {
        match self {
            Self::Cooldown { remaining } => *remaining,
            Self::TooSoon { wait } => *wait,
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cooldown { remaining } => write!(
                f,
                "rate limited: login attempts are blocked for another {}",
                format_minutes(*remaining)
            ),
            Self::TooSoon { wait } => write!(
                f,
                "login attempt too soon: wait {}s between attempts",
                wait.as_secs().max(1)
            ),
        }
    }
}

/// Verdict from [`RateLimitGovernor::should_block`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    /// The attempt may proceed.
    Allow,
    /// The attempt may proceed, but recent failures make a lockout likely.
    Warn {
        /// Failures since the last success.
        consecutive_fails: u32,
    },
    /// The attempt must not be made.
    Block(BlockReason),
}

impl Decision {
    /// Returns true when the attempt must not be made.
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        matches!(self, Self::Block(_))
    }

    /// Returns the block reason, if any.
    #[must_use]
    pub const fn block_reason(&self) -> Option<BlockReason> {
        match self {
            Self::Block(reason) => Some(*reason),
            _ => None,
        }
    }
}

/// Result of a login attempt, as far as throttling is concerned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttemptOutcome {
    /// The login succeeded.
    Success,
    /// The login was rejected with this code.
    Failure(EResult),
}

/// Applies the throttling rules to the persisted attempt history.
#[derive(Clone)]
pub struct RateLimitGovernor {
    store: RateLimitStore,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for RateLimitGovernor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateLimitGovernor")
            .field("store", &self.store.path())
            .finish_non_exhaustive()
    }
}

impl RateLimitGovernor {
    /// Creates a governor over `store` using the system clock.
    #[must_use]
    pub fn new(store: RateLimitStore) -> Self {
        Self::with_clock(store, Arc::new(SystemClock))
    }

    /// Creates a governor with an injected clock.
    #[must_use]
    pub fn with_clock(store: RateLimitStore, clock: Arc<dyn Clock>) -> Self {
        Self { store, clock }
    }

    /// Returns the current attempt history.
    #[must_use]
    pub fn tracker(&self) -> RateLimitTracker {
        self.store.load()
    }

    /// Decides whether a login may be attempted now. Never writes.
    #[must_use]
    pub fn should_block(&self) -> Decision {
        let tracker = self.store.load();
        let now = self.clock.now();

        if let Some(remaining) = tracker.cooldown_remaining(now) {
            return Decision::Block(BlockReason::Cooldown { remaining });
        }
        if let Some(elapsed) = tracker.since_last_attempt(now) {
            if elapsed < ATTEMPT_SPACING {
                return Decision::Block(BlockReason::TooSoon {
                    wait: ATTEMPT_SPACING.saturating_sub(elapsed),
                });
            }
        }
        if tracker.consecutive_fails >= WARN_THRESHOLD {
            return Decision::Warn {
                consecutive_fails: tracker.consecutive_fails,
            };
        }
        Decision::Allow
    }

    /// Folds a login verdict into the history and persists it.
    pub fn record_attempt(&self, outcome: AttemptOutcome) -> Result<RateLimitTracker, StoreError> {
        let now = self.clock.now();
        self.store.update(|tracker| apply_outcome(tracker, outcome, now))
    }

    /// Forgets the attempt history.
    pub fn clear(&self) -> Result<(), StoreError> {
        self.store.clear()?;
        info!(target: GOVERNOR_TARGET, "rate limit history cleared");
        Ok(())
    }
}

fn apply_outcome(tracker: &mut RateLimitTracker, outcome: AttemptOutcome, now: OffsetDateTime) {
    tracker.last_attempt = Some(now);
    let result = match outcome {
        AttemptOutcome::Success => {
            tracker.consecutive_fails = 0;
            tracker.rate_limited = false;
            return;
        }
        AttemptOutcome::Failure(result) => result,
    };

    match result.class() {
        FailureClass::RateLimited => {
            tracker.consecutive_fails = tracker.consecutive_fails.saturating_add(1);
            impose_cooldown(tracker, now);
            warn!(
                target: GOVERNOR_TARGET,
                consecutive_fails = tracker.consecutive_fails,
                "remote service rate limited the account"
            );
        }
        class if class.counts_toward_limit() => {
            tracker.consecutive_fails = tracker.consecutive_fails.saturating_add(1);
            if tracker.consecutive_fails >= ESCALATION_THRESHOLD {
                impose_cooldown(tracker, now);
                warn!(
                    target: GOVERNOR_TARGET,
                    consecutive_fails = tracker.consecutive_fails,
                    "too many failed logins; enforcing local cooldown"
                );
            }
        }
        _ => {}
    }
}

fn impose_cooldown(tracker: &mut RateLimitTracker, now: OffsetDateTime) {
    tracker.rate_limited = true;
    tracker.rate_limit_until = Some(now + COOLDOWN);
}

fn format_minutes(duration: Duration) -> String {
    let minutes = duration.as_secs().div_ceil(60);
    if minutes == 1 {
        String::from("1 minute")
    } else {
        format!("{minutes} minutes")
    }
}
