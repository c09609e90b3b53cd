//! Login result codes and their failure classes.
//!
//! The remote service reports every login verdict as an `EResult` integer.
//! Only a handful of codes matter to the session core; [`FailureClass`]
//! groups them by how the caller should react.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Raw result code reported by the network.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EResult(pub i32);

impl EResult {
    /// Success.
    pub const OK: Self = Self(1);
    /// Generic failure.
    pub const FAIL: Self = Self(2);
    /// No connection to the network.
    pub const NO_CONNECTION: Self = Self(3);
    /// Wrong password.
    pub const INVALID_PASSWORD: Self = Self(5);
    /// The request timed out.
    pub const TIMEOUT: Self = Self(16);
    /// The account is banned.
    pub const BANNED: Self = Self(17);
    /// No account with that name.
    pub const ACCOUNT_NOT_FOUND: Self = Self(18);
    /// The service is down or in maintenance.
    pub const SERVICE_UNAVAILABLE: Self = Self(20);
    /// The account is disabled.
    pub const ACCOUNT_DISABLED: Self = Self(43);
    /// The connection manager asked the client to use another server.
    pub const TRY_ANOTHER_CM: Self = Self(48);
    /// Steam Guard wants an emailed code.
    pub const ACCOUNT_LOGON_DENIED: Self = Self(63);
    /// The emailed Steam Guard code was wrong or expired.
    pub const INVALID_LOGIN_AUTH_CODE: Self = Self(65);
    /// The account is locked down.
    pub const ACCOUNT_LOCKED_DOWN: Self = Self(73);
    /// Too many login attempts.
    pub const RATE_LIMIT_EXCEEDED: Self = Self(84);
    /// The mobile authenticator code is required.
    pub const NEED_TWO_FACTOR: Self = Self(85);
    /// The mobile authenticator code was wrong.
    pub const TWO_FACTOR_CODE_MISMATCH: Self = Self(88);

    /// Returns the symbolic name for known codes.
    #[must_use]
    pub const fn name(self) -> Option<&'static str> {
        Some(match self {
            Self::OK => "OK",
            Self::FAIL => "Fail",
            Self::NO_CONNECTION => "NoConnection",
            Self::INVALID_PASSWORD => "InvalidPassword",
            Self::TIMEOUT => "Timeout",
            Self::BANNED => "Banned",
            Self::ACCOUNT_NOT_FOUND => "AccountNotFound",
            Self::SERVICE_UNAVAILABLE => "ServiceUnavailable",
            Self::ACCOUNT_DISABLED => "AccountDisabled",
            Self::TRY_ANOTHER_CM => "TryAnotherCM",
            Self::ACCOUNT_LOGON_DENIED => "AccountLogonDenied",
            Self::INVALID_LOGIN_AUTH_CODE => "InvalidLoginAuthCode",
            Self::ACCOUNT_LOCKED_DOWN => "AccountLockedDown",
            Self::RATE_LIMIT_EXCEEDED => "RateLimitExceeded",
            Self::NEED_TWO_FACTOR => "AccountLoginDeniedNeedTwoFactor",
            Self::TWO_FACTOR_CODE_MISMATCH => "TwoFactorCodeMismatch",
            _ => return None,
        })
    }

    /// Classifies the code.
    #[must_use]
    pub const fn class(self) -> FailureClass {
        FailureClass::of(self)
    }
}

impl fmt::Display for EResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{name} ({})", self.0),
            None => write!(f, "EResult {}", self.0),
        }
    }
}

/// How a failed login should be handled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureClass {
    /// The remote service is throttling logins. Wait before retrying.
    RateLimited,
    /// The username or password is wrong.
    CredentialInvalid,
    /// A Steam Guard or two-factor code must be supplied.
    GuardCodeRequired,
    /// The supplied Steam Guard or two-factor code was rejected.
    GuardCodeInvalid,
    /// A network-level hiccup; retrying may succeed.
    TransientNetwork,
    /// The account cannot log in at all.
    AccountDisabled,
    /// Anything else.
    Unknown,
}

impl FailureClass {
    /// Maps a result code to its class.
    #[must_use]
    pub const fn of(result: EResult) -> Self {
        match result {
            EResult::RATE_LIMIT_EXCEEDED => Self::RateLimited,
            EResult::INVALID_PASSWORD | EResult::ACCOUNT_NOT_FOUND => Self::CredentialInvalid,
            EResult::ACCOUNT_LOGON_DENIED | EResult::NEED_TWO_FACTOR => Self::GuardCodeRequired,
            EResult::INVALID_LOGIN_AUTH_CODE | EResult::TWO_FACTOR_CODE_MISMATCH => {
                Self::GuardCodeInvalid
            }
            EResult::TIMEOUT
            | EResult::SERVICE_UNAVAILABLE
            | EResult::NO_CONNECTION
            | EResult::TRY_ANOTHER_CM => Self::TransientNetwork,
            EResult::ACCOUNT_DISABLED | EResult::BANNED | EResult::ACCOUNT_LOCKED_DOWN => {
                Self::AccountDisabled
            }
            _ => Self::Unknown,
        }
    }

    /// Whether the failure leaves the session waiting for a code.
    #[must_use]
    pub const fn needs_code(self) -> bool {
        matches!(self, Self::GuardCodeRequired | Self::GuardCodeInvalid)
    }

    /// Whether the failure counts toward the consecutive-failure limit.
    #[must_use]
    pub const fn counts_toward_limit(self) -> bool {
        matches!(
            self,
            Self::CredentialInvalid | Self::GuardCodeRequired | Self::GuardCodeInvalid
        )
    }

    /// Whether an identical retry might succeed without user action.
    #[must_use]
    pub const fn is_transient(self) -> bool {
        matches!(self, Self::TransientNetwork)
    }
}

/// Explains a failed login in terms an operator can act on.
#[must_use]
pub fn describe(result: EResult) -> String {
    let advice = match result {
        EResult::RATE_LIMIT_EXCEEDED => {
            "Steam is throttling login attempts for this account; wait at least 15 minutes before trying again"
        }
        EResult::ACCOUNT_LOGON_DENIED => {
            "Steam Guard sent a code to the account's email address; submit it with 'steam auth code <CODE>'"
        }
        EResult::INVALID_LOGIN_AUTH_CODE => {
            "the Steam Guard code was wrong or has expired; check for a newer email and submit that code"
        }
        EResult::NEED_TWO_FACTOR => {
            "the mobile authenticator code is required; submit it with 'steam auth code <CODE>'"
        }
        EResult::TWO_FACTOR_CODE_MISMATCH => {
            "the mobile authenticator code was wrong or has expired"
        }
        EResult::INVALID_PASSWORD => {
            "the username or password is wrong; repeated failures will trigger rate limiting"
        }
        EResult::ACCOUNT_NOT_FOUND => "no account with that name exists; check the spelling",
        EResult::ACCOUNT_DISABLED | EResult::BANNED | EResult::ACCOUNT_LOCKED_DOWN => {
            "the account cannot log in; contact Steam Support"
        }
        EResult::SERVICE_UNAVAILABLE => {
            "Steam servers are unavailable or in maintenance; try again later"
        }
        EResult::TIMEOUT | EResult::NO_CONNECTION | EResult::TRY_ANOTHER_CM => {
            "the connection to Steam failed; check the network and try again"
        }
        _ => "unrecognised login failure; check Steam status and the account's standing",
    };
    format!("Authentication failed: {result}: {advice}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(EResult::RATE_LIMIT_EXCEEDED, FailureClass::RateLimited)]
    #[case(EResult::INVALID_PASSWORD, FailureClass::CredentialInvalid)]
    #[case(EResult::ACCOUNT_NOT_FOUND, FailureClass::CredentialInvalid)]
    #[case(EResult::ACCOUNT_LOGON_DENIED, FailureClass::GuardCodeRequired)]
    #[case(EResult::NEED_TWO_FACTOR, FailureClass::GuardCodeRequired)]
    #[case(EResult::INVALID_LOGIN_AUTH_CODE, FailureClass::GuardCodeInvalid)]
    #[case(EResult::TWO_FACTOR_CODE_MISMATCH, FailureClass::GuardCodeInvalid)]
    #[case(EResult::TIMEOUT, FailureClass::TransientNetwork)]
    #[case(EResult::SERVICE_UNAVAILABLE, FailureClass::TransientNetwork)]
    #[case(EResult::NO_CONNECTION, FailureClass::TransientNetwork)]
    #[case(EResult::TRY_ANOTHER_CM, FailureClass::TransientNetwork)]
    #[case(EResult::ACCOUNT_DISABLED, FailureClass::AccountDisabled)]
    #[case(EResult::BANNED, FailureClass::AccountDisabled)]
    #[case(EResult::ACCOUNT_LOCKED_DOWN, FailureClass::AccountDisabled)]
    #[case(EResult(999), FailureClass::Unknown)]
    fn classifies_result_codes(#[case] result: EResult, #[case] expected: FailureClass) {
        assert_eq!(result.class(), expected);
    }

    #[rstest]
    fn only_guard_classes_need_a_code() {
        let needing: Vec<_> = [
            FailureClass::RateLimited,
            FailureClass::CredentialInvalid,
            FailureClass::GuardCodeRequired,
            FailureClass::GuardCodeInvalid,
            FailureClass::TransientNetwork,
            FailureClass::AccountDisabled,
            FailureClass::Unknown,
        ]
        .into_iter()
        .filter(|class| class.needs_code())
        .collect();
        assert_eq!(
            needing,
            [FailureClass::GuardCodeRequired, FailureClass::GuardCodeInvalid]
        );
    }

    #[rstest]
    fn disabled_accounts_point_at_support() {
        assert!(describe(EResult::BANNED).contains("Steam Support"));
    }

    #[rstest]
    fn unknown_codes_render_numerically() {
        assert_eq!(EResult(4242).to_string(), "EResult 4242");
        assert!(describe(EResult(4242)).contains("unrecognised"));
    }
}
