//! Confirmation codes: issuing, expiry, comparison and delivery.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::{Config, MAX_CONFIRM_CODE_DIGITS, MIN_CONFIRM_CODE_DIGITS};

/// Low 62 bits of a v4 UUID are fully random.
const RANDOM_BITS_MASK: u128 = (1 << 62) - 1;

/// A one-time numeric confirmation code, zero-padded to a fixed width.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConfirmCode(String);

impl ConfirmCode {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Exact string comparison against a caller-supplied code.
    ///
    /// Both sides are hashed first so the comparison time does not depend on
    /// how many leading characters match. `"0042"` does not match `"42"`.
    #[must_use]
    pub fn matches(&self, supplied: &str) -> bool {
        Sha256::digest(self.0.as_bytes()) == Sha256::digest(supplied.as_bytes())
    }
}

impl From<&str> for ConfirmCode {
    fn from(code: &str) -> Self {
        Self(code.to_owned())
    }
}

impl std::fmt::Debug for ConfirmCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("ConfirmCode(****)")
    }
}

impl std::fmt::Display for ConfirmCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Issues confirmation codes and owns the policy they are checked against.
#[derive(Debug, Clone, Copy)]
pub struct ConfirmationIssuer {
    digits: u32,
    ttl: Duration,
    max_attempts: u32,
}

impl ConfirmationIssuer {
    /// `digits` is clamped into the supported range.
    #[must_use]
    pub fn new(digits: u32, ttl: Duration, max_attempts: u32) -> Self {
        Self {
            digits: digits.clamp(MIN_CONFIRM_CODE_DIGITS, MAX_CONFIRM_CODE_DIGITS),
            ttl,
            max_attempts: max_attempts.max(1),
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.confirm_code_digits, config.confirm_code_ttl, config.max_confirm_attempts)
    }

    /// Generate a fresh code from OS randomness.
    #[must_use]
    pub fn issue(&self) -> ConfirmCode {
        let bound = 10u128.pow(self.digits);
        let value = (uuid::Uuid::new_v4().as_u128() & RANDOM_BITS_MASK) % bound;
        ConfirmCode(format!("{value:0width$}", width = self.digits as usize))
    }

    /// Whether a code issued at `issued_at` is past its lifetime at `now`.
    #[must_use]
    pub fn is_expired(&self, issued_at: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        let Ok(ttl) = chrono::Duration::from_std(self.ttl) else {
            return false;
        };
        now.signed_duration_since(issued_at) > ttl
    }

    #[must_use]
    pub const fn digits(&self) -> u32 {
        self.digits
    }

    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

impl Default for ConfirmationIssuer {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Delivers a freshly issued code to the user out of band.
#[async_trait]
pub trait CodeNotifier: Send + Sync + 'static {
    async fn deliver(&self, user: &str, code: &ConfirmCode);
}

/// Writes the code to the service log. Stand-in until mail delivery exists.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotifier;

#[async_trait]
impl CodeNotifier for LogNotifier {
    async fn deliver(&self, user: &str, code: &ConfirmCode) {
        tracing::info!(user = %user, code = %code, "Issued confirmation code");
    }
}
