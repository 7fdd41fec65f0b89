//! HTTP transport.
//!
//! Wires the handshake gates, the token endpoint and bearer introspection
//! into one axum router over shared [`HttpState`].

use std::sync::Arc;

use axum::{
    Json, Router, middleware,
    response::IntoResponse,
    routing::{get, post},
};
use tower_http::trace::TraceLayer;

use super::{dump, handlers};
use crate::config::Config;
use crate::confirm::{CodeNotifier, ConfirmationIssuer, LogNotifier};
use crate::core::AuthorizationCore;
use crate::session::SessionStore;

/// Shared state for HTTP handlers.
pub struct HttpState {
    pub config: Config,
    pub sessions: Arc<dyn SessionStore>,
    pub core: Arc<dyn AuthorizationCore>,
    pub issuer: ConfirmationIssuer,
    /// Out-of-band delivery of confirmation codes.
    pub notifier: Arc<dyn CodeNotifier>,
}

impl HttpState {
    /// State that logs confirmation codes.
    #[must_use]
    pub fn new(config: Config, sessions: Arc<dyn SessionStore>, core: Arc<dyn AuthorizationCore>) -> Self {
        let issuer = ConfirmationIssuer::from_config(&config);
        Self { config, sessions, core, issuer, notifier: Arc::new(LogNotifier) }
    }

    /// Replace the code notifier.
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn CodeNotifier>) -> Self {
        self.notifier = notifier;
        self
    }
}

impl std::fmt::Debug for HttpState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpState").field("config", &self.config).field("issuer", &self.issuer).finish()
    }
}

/// Create the HTTP router.
pub fn create_router(state: Arc<HttpState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Handshake gates
        .route(handlers::LOGIN_PATH, get(handlers::handle_login).post(handlers::handle_login))
        .route("/auth", get(handlers::handle_confirm))
        .route(
            "/oauth/authorize",
            get(handlers::handle_authorize).post(handlers::handle_authorize),
        )
        // Pass-through to the authorization core
        .route("/oauth/token", post(handlers::handle_token))
        .route("/test", get(handlers::handle_test))
        .layer(middleware::from_fn_with_state(Arc::clone(&state), dump::dump_request))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "token-service",
        "version": env!("CARGO_PKG_VERSION")
    }))
}
