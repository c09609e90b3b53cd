use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::store::Record;

/// Login attempt history consulted by the rate-limit governor.
///
/// `rate_limited` is expired lazily: readers compare `rate_limit_until`
/// with the current time rather than rewriting the file when it lapses.
#[derive(Debug, Default, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitTracker {
    /// Time of the most recent recorded login outcome.
    #[serde(with = "time::serde::rfc3339::option")]
    pub last_attempt: Option<OffsetDateTime>,
    /// Failures counted since the last success.
    pub consecutive_fails: u32,
    /// Whether a cooldown was imposed.
    pub rate_limited: bool,
    /// End of the imposed cooldown.
    #[serde(with = "time::serde::rfc3339::option")]
    pub rate_limit_until: Option<OffsetDateTime>,
}

impl RateLimitTracker {
    /// Returns the cooldown left at `now`, or `None` when not limited.
    #[must_use]
    pub fn cooldown_remaining(&self, now: OffsetDateTime) -> Option<Duration> {
        if !self.rate_limited {
            return None;
        }
        let until = self.rate_limit_until?;
        if now >= until {
            return None;
        }
        Duration::try_from(until - now).ok()
    }

    /// Returns true while a cooldown is in force at `now`.
    #[must_use]
    pub fn is_limited_at(&self, now: OffsetDateTime) -> bool {
        self.cooldown_remaining(now).is_some()
    }

    /// Returns the time since the last recorded attempt, if any.
    ///
    /// An attempt stamped in the future (clock skew) counts as zero elapsed.
    #[must_use]
    pub fn since_last_attempt(&self, now: OffsetDateTime) -> Option<Duration> {
        let last = self.last_attempt?;
        Some(Duration::try_from(now - last).unwrap_or(Duration::ZERO))
    }
}

impl Record for RateLimitTracker {}
