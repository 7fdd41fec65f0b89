//! In-memory authorization core.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use url::Url;

use super::pkce::{self, ChallengeMethod};
use super::types::{AccessToken, AuthCode, Challenge, Client, RefreshToken};
use super::{AuthorizationCore, AuthorizeRequest, AuthorizeResponse, BearerInfo, TokenRequest, TokenResponse};
use crate::config::{Config, defaults};
use crate::error::{CoreError, CoreErrorKind, CoreResult};

/// Cleanup interval: 1 minute.
const CLEANUP_INTERVAL: Duration = Duration::from_secs(60);

/// Lifetimes of everything the core issues.
#[derive(Debug, Clone, Copy)]
pub struct CoreSettings {
    pub access_token_lifetime: Duration,
    pub refresh_token_lifetime: Duration,
    pub auth_code_lifetime: Duration,
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            access_token_lifetime: defaults::ACCESS_TOKEN_LIFETIME,
            refresh_token_lifetime: defaults::REFRESH_TOKEN_LIFETIME,
            auth_code_lifetime: defaults::AUTH_CODE_LIFETIME,
        }
    }
}

/// In-memory OAuth state.
#[derive(Clone)]
pub struct MemoryCore {
    clients: Arc<RwLock<HashMap<String, Client>>>,
    auth_codes: Arc<RwLock<HashMap<String, AuthCode>>>,
    access_tokens: Arc<RwLock<HashMap<String, AccessToken>>>,
    refresh_tokens: Arc<RwLock<HashMap<String, RefreshToken>>>,
    settings: CoreSettings,
}

impl MemoryCore {
    #[must_use]
    pub fn new(settings: CoreSettings) -> Self {
        Self {
            clients: Arc::new(RwLock::new(HashMap::new())),
            auth_codes: Arc::new(RwLock::new(HashMap::new())),
            access_tokens: Arc::new(RwLock::new(HashMap::new())),
            refresh_tokens: Arc::new(RwLock::new(HashMap::new())),
            settings,
        }
    }

    /// Core with the configured lifetimes and the configured client registered.
    pub async fn from_config(config: &Config) -> Self {
        let core = Self::new(CoreSettings {
            access_token_lifetime: config.access_token_lifetime,
            refresh_token_lifetime: config.refresh_token_lifetime,
            auth_code_lifetime: config.auth_code_lifetime,
        });
        core.register_client(&config.client.id, &config.client.secret, &config.client.domain)
            .await;
        core
    }

    /// Generate a random token using two UUIDs (256 bits).
    fn generate_token() -> String {
        format!("{}{}", uuid::Uuid::new_v4().simple(), uuid::Uuid::new_v4().simple())
    }

    /// Register (or replace) a client.
    pub async fn register_client(&self, id: &str, secret: &str, domain: &str) {
        self.clients.write().await.insert(
            id.to_owned(),
            Client { id: id.to_owned(), secret: secret.to_owned(), domain: domain.to_owned() },
        );
        tracing::info!(client_id = %id, domain = %domain, "Registered OAuth client");
    }

    /// Look up a client by ID.
    pub async fn get_client(&self, client_id: &str) -> Option<Client> {
        self.clients.read().await.get(client_id).cloned()
    }

    async fn authenticate_client(&self, request: &TokenRequest) -> CoreResult<Client> {
        let (Some(id), secret) = request.client_credentials() else {
            return Err(CoreError::invalid_client("missing client credentials"));
        };
        let client = self
            .get_client(id)
            .await
            .ok_or_else(|| CoreError::invalid_client("unknown client"))?;
        if secret != Some(client.secret.as_str()) {
            return Err(CoreError::invalid_client("client authentication failed"));
        }
        Ok(client)
    }

    /// Parse `redirect_uri` and check it belongs to the client's domain.
    fn validate_redirect(client: &Client, redirect_uri: &str) -> CoreResult<Url> {
        let redirect = Url::parse(redirect_uri)
            .map_err(|_| CoreError::invalid_request("redirect_uri is not an absolute URL"))?;
        let domain = Url::parse(&client.domain)
            .map_err(|_| CoreError::new(CoreErrorKind::ServerError, "client domain is invalid"))?;

        let same_origin = redirect.scheme() == domain.scheme()
            && redirect.host_str() == domain.host_str()
            && redirect.port_or_known_default() == domain.port_or_known_default();
        if !same_origin {
            return Err(CoreError::invalid_request("redirect_uri does not match the client domain"));
        }
        Ok(redirect)
    }

    async fn create_auth_code(
        &self,
        client_id: &str,
        user_id: &str,
        redirect_uri: &str,
        scope: Option<&str>,
        challenge: Option<Challenge>,
    ) -> String {
        let code = Self::generate_token();

        self.auth_codes.write().await.insert(
            code.clone(),
            AuthCode {
                client_id: client_id.to_owned(),
                user_id: user_id.to_owned(),
                redirect_uri: redirect_uri.to_owned(),
                scope: scope.map(str::to_owned),
                challenge,
                created_at: Utc::now(),
                lifetime: self.settings.auth_code_lifetime,
                used: false,
            },
        );

        code
    }

    /// Consume an authorization code (one-time use).
    ///
    /// Returns the code details if valid, unused, and not expired.
    async fn consume_auth_code(&self, code: &str) -> Option<AuthCode> {
        let mut codes = self.auth_codes.write().await;
        let auth_code = codes.get_mut(code)?;

        if auth_code.used || auth_code.is_expired(Utc::now()) {
            return None;
        }

        auth_code.used = true;
        Some(auth_code.clone())
    }

    /// Create an access token, plus a refresh token when `with_refresh` is set.
    async fn create_tokens(
        &self,
        client_id: &str,
        user_id: &str,
        scope: Option<String>,
        with_refresh: bool,
    ) -> TokenResponse {
        let access = Self::generate_token();
        let now = Utc::now();

        self.access_tokens.write().await.insert(
            access.clone(),
            AccessToken {
                client_id: client_id.to_owned(),
                user_id: user_id.to_owned(),
                scope: scope.clone(),
                created_at: now,
                lifetime: self.settings.access_token_lifetime,
            },
        );

        let refresh = if with_refresh {
            let refresh = Self::generate_token();
            self.refresh_tokens.write().await.insert(
                refresh.clone(),
                RefreshToken {
                    client_id: client_id.to_owned(),
                    user_id: user_id.to_owned(),
                    access_token: access.clone(),
                    scope: scope.clone(),
                    created_at: now,
                    lifetime: self.settings.refresh_token_lifetime,
                },
            );
            Some(refresh)
        } else {
            None
        };

        TokenResponse {
            access_token: access,
            token_type: "Bearer".to_owned(),
            expires_in: self.settings.access_token_lifetime.as_secs(),
            refresh_token: refresh,
            scope,
        }
    }

    async fn exchange_authorization_code(&self, request: &TokenRequest) -> CoreResult<TokenResponse> {
        let client = self.authenticate_client(request).await?;
        let params = &request.params;

        let Some(code) = params.get("code") else {
            return Err(CoreError::invalid_request("missing code"));
        };

        let Some(auth_code) = self.consume_auth_code(code).await else {
            return Err(CoreError::invalid_grant("invalid or expired authorization code"));
        };

        if auth_code.client_id != client.id {
            return Err(CoreError::invalid_grant("code was issued to another client"));
        }

        if let Some(redirect_uri) = params.get("redirect_uri") {
            if redirect_uri != auth_code.redirect_uri {
                return Err(CoreError::invalid_grant("redirect_uri mismatch"));
            }
        }

        if let Some(ref challenge) = auth_code.challenge {
            let Some(verifier) = params.get("code_verifier") else {
                return Err(CoreError::invalid_request("missing code_verifier"));
            };
            if !pkce::verify(challenge.method, verifier, &challenge.value) {
                return Err(CoreError::invalid_grant("PKCE verification failed"));
            }
        }

        let tokens =
            self.create_tokens(&client.id, &auth_code.user_id, auth_code.scope.clone(), true).await;
        tracing::info!(client_id = %client.id, user_id = %auth_code.user_id, "Issued token pair");
        Ok(tokens)
    }

    async fn exchange_refresh_token(&self, request: &TokenRequest) -> CoreResult<TokenResponse> {
        let client = self.authenticate_client(request).await?;

        let Some(refresh_token) = request.params.get("refresh_token") else {
            return Err(CoreError::invalid_request("missing refresh_token"));
        };

        // Validate and remove the old refresh token
        let old = {
            let mut tokens = self.refresh_tokens.write().await;
            match tokens.get(refresh_token).map(|t| t.client_id == client.id) {
                Some(false) => {
                    return Err(CoreError::invalid_grant("refresh token was issued to another client"));
                }
                Some(true) => tokens.remove(refresh_token),
                None => None,
            }
        };
        let Some(old) = old.filter(|t| !t.is_expired(Utc::now())) else {
            return Err(CoreError::invalid_grant("invalid or expired refresh token"));
        };

        self.access_tokens.write().await.remove(&old.access_token);

        let tokens = self.create_tokens(&client.id, &old.user_id, old.scope, true).await;
        tracing::info!(client_id = %client.id, "Refreshed token pair");
        Ok(tokens)
    }

    async fn exchange_client_credentials(&self, request: &TokenRequest) -> CoreResult<TokenResponse> {
        let client = self.authenticate_client(request).await?;
        let scope = request.params.get("scope").map(str::to_owned);
        let tokens = self.create_tokens(&client.id, "", scope, false).await;
        tracing::info!(client_id = %client.id, "Issued client credentials token");
        Ok(tokens)
    }

    /// Start background cleanup task for expired tokens and codes.
    pub fn start_cleanup_task(self: Arc<Self>) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(CLEANUP_INTERVAL);
            loop {
                interval.tick().await;
                self.cleanup_expired().await;
            }
        });
    }

    /// Drop expired codes and tokens.
    pub async fn cleanup_expired(&self) {
        let now = Utc::now();

        self.auth_codes.write().await.retain(|_, code| !code.is_expired(now));

        {
            let mut tokens = self.access_tokens.write().await;
            let before = tokens.len();
            tokens.retain(|_, token| !token.is_expired(now));
            let removed = before - tokens.len();
            if removed > 0 {
                tracing::debug!(count = removed, "Cleaned up expired access tokens");
            }
        }

        {
            let mut tokens = self.refresh_tokens.write().await;
            let before = tokens.len();
            tokens.retain(|_, token| !token.is_expired(now));
            let removed = before - tokens.len();
            if removed > 0 {
                tracing::debug!(count = removed, "Cleaned up expired refresh tokens");
            }
        }
    }
}

impl Default for MemoryCore {
    fn default() -> Self {
        Self::new(CoreSettings::default())
    }
}

impl std::fmt::Debug for MemoryCore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryCore").field("settings", &self.settings).finish()
    }
}

#[async_trait]
impl AuthorizationCore for MemoryCore {
    async fn handle_authorize(&self, request: AuthorizeRequest) -> CoreResult<AuthorizeResponse> {
        let params = &request.params;

        if params.get("response_type") != Some("code") {
            return Err(CoreError::new(
                CoreErrorKind::UnsupportedResponseType,
                "response_type must be 'code'",
            ));
        }

        let Some(client_id) = params.get("client_id") else {
            return Err(CoreError::invalid_request("missing client_id"));
        };
        let Some(client) = self.get_client(client_id).await else {
            return Err(CoreError::invalid_client("unknown client"));
        };

        let redirect_uri = params.get("redirect_uri").unwrap_or(client.domain.as_str());
        let mut location = Self::validate_redirect(&client, redirect_uri)?;

        let challenge = match params.get("code_challenge") {
            Some(value) => {
                let Some(method) = ChallengeMethod::parse(params.get("code_challenge_method"))
                else {
                    return Err(CoreError::invalid_request("unsupported code_challenge_method"));
                };
                Some(Challenge { value: value.to_owned(), method })
            }
            None => None,
        };

        let code = self
            .create_auth_code(
                &client.id,
                &request.user_id,
                redirect_uri,
                params.get("scope"),
                challenge,
            )
            .await;

        {
            let mut query = location.query_pairs_mut();
            query.append_pair("code", &code);
            if let Some(state) = params.get("state") {
                query.append_pair("state", state);
            }
        }

        tracing::info!(client_id = %client.id, user_id = %request.user_id, "Issued authorization code");

        Ok(AuthorizeResponse::Redirect { location: location.into() })
    }

    async fn handle_token(&self, request: TokenRequest) -> CoreResult<TokenResponse> {
        match request.params.get("grant_type") {
            Some("authorization_code") => self.exchange_authorization_code(&request).await,
            Some("refresh_token") => self.exchange_refresh_token(&request).await,
            Some("client_credentials") => self.exchange_client_credentials(&request).await,
            Some(_) => Err(CoreError::new(
                CoreErrorKind::UnsupportedGrantType,
                "unsupported grant_type",
            )),
            None => Err(CoreError::invalid_request("missing grant_type")),
        }
    }

    async fn validate_bearer(&self, token: &str) -> CoreResult<BearerInfo> {
        let tokens = self.access_tokens.read().await;
        let Some(access) = tokens.get(token) else {
            return Err(CoreError::invalid_token("invalid access token"));
        };
        if access.is_expired(Utc::now()) {
            return Err(CoreError::invalid_token("expired access token"));
        }
        Ok(BearerInfo {
            client_id: access.client_id.clone(),
            user_id: access.user_id.clone(),
            created_at: access.created_at,
            lifetime: access.lifetime,
        })
    }
}
