//! Records owned by the in-memory core.

use std::time::Duration;

use chrono::{DateTime, Utc};

use super::pkce::ChallengeMethod;

/// A registered OAuth client.
#[derive(Debug, Clone)]
pub struct Client {
    pub id: String,
    pub secret: String,
    /// Redirect URIs must share scheme, host and port with this.
    pub domain: String,
}

/// PKCE challenge bound to an authorization code.
#[derive(Debug, Clone)]
pub struct Challenge {
    pub value: String,
    pub method: ChallengeMethod,
}

/// An authorization code issued after the handshake confirmed the user.
#[derive(Debug, Clone)]
pub struct AuthCode {
    pub client_id: String,
    pub user_id: String,
    pub redirect_uri: String,
    pub scope: Option<String>,
    pub challenge: Option<Challenge>,
    pub created_at: DateTime<Utc>,
    pub lifetime: Duration,
    pub used: bool,
}

/// An access token for API authentication.
#[derive(Debug, Clone)]
pub struct AccessToken {
    pub client_id: String,
    pub user_id: String,
    pub scope: Option<String>,
    pub created_at: DateTime<Utc>,
    pub lifetime: Duration,
}

/// A refresh token for obtaining new access tokens.
#[derive(Debug, Clone)]
pub struct RefreshToken {
    pub client_id: String,
    pub user_id: String,
    pub access_token: String,
    pub scope: Option<String>,
    pub created_at: DateTime<Utc>,
    pub lifetime: Duration,
}

/// Whether something created at `created_at` with `lifetime` is gone at `now`.
pub fn is_expired(created_at: DateTime<Utc>, lifetime: Duration, now: DateTime<Utc>) -> bool {
    match chrono::Duration::from_std(lifetime) {
        Ok(lifetime) => now > created_at + lifetime,
        Err(_) => false,
    }
}

impl AuthCode {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        is_expired(self.created_at, self.lifetime, now)
    }
}

impl AccessToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        is_expired(self.created_at, self.lifetime, now)
    }
}

impl RefreshToken {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        is_expired(self.created_at, self.lifetime, now)
    }
}
