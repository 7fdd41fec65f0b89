//! Per-session handshake state.
//!
//! A session moves `Anonymous → PendingConfirmation → Authenticated → Anonymous`.
//! Each variant carries only the fields valid in that state, so a session can
//! never be marked confirmed without a user behind it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::params::FormParams;
use crate::confirm::{ConfirmCode, ConfirmationIssuer};

/// Login progress of one browser session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum LoginState {
    #[default]
    Anonymous,
    PendingConfirmation {
        user: String,
        code: ConfirmCode,
        issued_at: DateTime<Utc>,
        #[serde(default)]
        failed_attempts: u32,
    },
    Authenticated {
        user: String,
    },
}

/// Result of checking a submitted confirmation code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfirmOutcome {
    /// Nothing to confirm. State untouched.
    NoPendingLogin,
    /// Code outlived its lifetime. Pending login dropped.
    Expired,
    /// Wrong code. Pending login kept, attempt counted.
    Mismatch { attempts_left: u32 },
    /// Wrong code and no attempts left. Pending login dropped.
    LockedOut,
    /// Session promoted to authenticated.
    Confirmed,
}

impl ConfirmOutcome {
    /// Whether the session record changed and needs saving.
    #[must_use]
    pub const fn is_mutation(self) -> bool {
        !matches!(self, Self::NoPendingLogin)
    }
}

impl LoginState {
    /// Start a pending login for `user`.
    #[must_use]
    pub fn pending(user: impl Into<String>, code: ConfirmCode, issued_at: DateTime<Utc>) -> Self {
        Self::PendingConfirmation { user: user.into(), code, issued_at, failed_attempts: 0 }
    }

    /// User named at login, whatever the confirmation status.
    #[must_use]
    pub fn user(&self) -> Option<&str> {
        match self {
            Self::Anonymous => None,
            Self::PendingConfirmation { user, .. } | Self::Authenticated { user } => Some(user),
        }
    }

    #[must_use]
    pub const fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated { .. })
    }

    /// Check `supplied` against the pending code and advance the state.
    pub fn confirm(
        &mut self,
        supplied: &str,
        issuer: &ConfirmationIssuer,
        now: DateTime<Utc>,
    ) -> ConfirmOutcome {
        let Self::PendingConfirmation { user, code, issued_at, failed_attempts } = self else {
            return ConfirmOutcome::NoPendingLogin;
        };

        if issuer.is_expired(*issued_at, now) {
            *self = Self::Anonymous;
            return ConfirmOutcome::Expired;
        }

        if code.matches(supplied) {
            let user = std::mem::take(user);
            *self = Self::Authenticated { user };
            return ConfirmOutcome::Confirmed;
        }

        *failed_attempts += 1;
        if *failed_attempts >= issuer.max_attempts() {
            *self = Self::Anonymous;
            return ConfirmOutcome::LockedOut;
        }
        ConfirmOutcome::Mismatch { attempts_left: issuer.max_attempts() - *failed_attempts }
    }

    /// Take the user out of a confirmed session, resetting it to anonymous.
    ///
    /// Returns `None` and leaves the state alone unless it is authenticated.
    pub fn take_authenticated_user(&mut self) -> Option<String> {
        match std::mem::take(self) {
            Self::Authenticated { user } => Some(user),
            other => {
                *self = other;
                None
            }
        }
    }
}

/// Everything the handshake keeps in one session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Parameters of the authorize request waiting for the login to finish.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub return_uri: Option<FormParams>,

    #[serde(default)]
    pub login: LoginState,
}

impl SessionRecord {
    /// True when the session is back at its anonymous baseline.
    #[must_use]
    pub fn is_baseline(&self) -> bool {
        self.return_uri.is_none() && self.login == LoginState::Anonymous
    }
}
