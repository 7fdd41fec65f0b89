//! Authorization core boundary.
//!
//! The handshake never issues codes or tokens itself. It hands the restored
//! authorize request, the token request and bearer tokens to an
//! [`AuthorizationCore`], which owns clients and tokens.
//!
//! [`MemoryCore`] is the bundled engine: a single-process OAuth 2.0 server
//! supporting the authorization code (with optional PKCE), refresh token and
//! client credentials grants.

pub mod memory;
pub mod pkce;
mod types;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::CoreResult;
use crate::session::FormParams;

pub use memory::MemoryCore;

/// Authorize request resumed for a confirmed user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizeRequest {
    /// User confirmed by the handshake.
    pub user_id: String,
    /// Original authorize parameters.
    pub params: FormParams,
}

/// What the core wants sent back to the browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizeResponse {
    /// Send the browser to `location` (the client's redirect URI with the code).
    Redirect { location: String },
}

/// Token endpoint request, forwarded untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenRequest {
    /// Form body of the request.
    pub params: FormParams,
    /// Client id and secret from an HTTP Basic `Authorization` header.
    pub basic_auth: Option<(String, String)>,
}

impl TokenRequest {
    /// Client credentials, preferring HTTP Basic over form fields.
    #[must_use]
    pub fn client_credentials(&self) -> (Option<&str>, Option<&str>) {
        match &self.basic_auth {
            Some((id, secret)) => (Some(id.as_str()), Some(secret.as_str())),
            None => (self.params.get("client_id"), self.params.get("client_secret")),
        }
    }
}

/// Successful token endpoint response (RFC 6749 §5.1).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: String,
    pub expires_in: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
}

/// Read-only view of a validated bearer token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BearerInfo {
    pub client_id: String,
    pub user_id: String,
    pub created_at: DateTime<Utc>,
    pub lifetime: Duration,
}

impl BearerInfo {
    /// Whole seconds left: creation time plus lifetime, minus `now`.
    #[must_use]
    pub fn expires_in(&self, now: DateTime<Utc>) -> i64 {
        let lifetime = chrono::Duration::from_std(self.lifetime).unwrap_or_else(|_| chrono::Duration::zero());
        (self.created_at + lifetime).signed_duration_since(now).num_seconds()
    }
}

/// The OAuth engine behind the handshake.
#[async_trait]
pub trait AuthorizationCore: Send + Sync + 'static {
    /// Issue an authorization response for a confirmed user.
    async fn handle_authorize(&self, request: AuthorizeRequest) -> CoreResult<AuthorizeResponse>;

    /// Exchange a grant for tokens.
    async fn handle_token(&self, request: TokenRequest) -> CoreResult<TokenResponse>;

    /// Validate a bearer access token.
    async fn validate_bearer(&self, token: &str) -> CoreResult<BearerInfo>;
}
