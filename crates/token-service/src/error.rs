//! Error types for the token service.
//!
//! Uses `thiserror` for structured error handling with automatic `From` implementations.

use std::time::Duration;

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// Errors from the session store layer.
#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    /// Backend failure (connection, I/O, poisoned state, etc.)
    #[error("Session backend error: {0}")]
    Backend(String),

    /// Stored record could not be encoded or decoded
    #[error("Session serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The request deadline passed before the store answered
    #[error("Session store timed out after {0:?}")]
    DeadlineExceeded(Duration),
}

impl StoreError {
    /// Create a backend error.
    #[must_use]
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }
}

/// OAuth error codes reported by the authorization core (RFC 6749 §4.1.2.1, §5.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoreErrorKind {
    InvalidRequest,
    InvalidClient,
    InvalidGrant,
    UnauthorizedClient,
    UnsupportedGrantType,
    UnsupportedResponseType,
    InvalidScope,
    AccessDenied,
    InvalidToken,
    ServerError,
}

impl CoreErrorKind {
    /// Wire name of the error code.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::InvalidRequest => "invalid_request",
            Self::InvalidClient => "invalid_client",
            Self::InvalidGrant => "invalid_grant",
            Self::UnauthorizedClient => "unauthorized_client",
            Self::UnsupportedGrantType => "unsupported_grant_type",
            Self::UnsupportedResponseType => "unsupported_response_type",
            Self::InvalidScope => "invalid_scope",
            Self::AccessDenied => "access_denied",
            Self::InvalidToken => "invalid_token",
            Self::ServerError => "server_error",
        }
    }
}

impl std::fmt::Display for CoreErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error reported by the authorization core.
#[derive(thiserror::Error, Debug, Clone)]
#[error("{kind}: {description}")]
pub struct CoreError {
    /// OAuth error code
    pub kind: CoreErrorKind,
    /// Human readable description
    pub description: String,
}

impl CoreError {
    #[must_use]
    pub fn new(kind: CoreErrorKind, description: impl Into<String>) -> Self {
        Self { kind, description: description.into() }
    }

    #[must_use]
    pub fn invalid_request(description: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::InvalidRequest, description)
    }

    #[must_use]
    pub fn invalid_client(description: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::InvalidClient, description)
    }

    #[must_use]
    pub fn invalid_grant(description: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::InvalidGrant, description)
    }

    #[must_use]
    pub fn invalid_token(description: impl Into<String>) -> Self {
        Self::new(CoreErrorKind::InvalidToken, description)
    }

    /// Returns true if the core blames itself rather than the caller.
    #[must_use]
    pub const fn is_server_error(&self) -> bool {
        matches!(self.kind, CoreErrorKind::ServerError)
    }
}

/// Errors terminating a handshake request.
#[derive(thiserror::Error, Debug)]
pub enum HandshakeError {
    /// Session store failed; the request fails closed
    #[error("Session store error: {0}")]
    Store(#[from] StoreError),

    /// Submitted input was rejected before touching the session
    #[error("Invalid input for '{field}': {message}")]
    Validation {
        /// Field that failed validation
        field: String,
        /// Validation error message
        message: String,
    },

    /// Authorization core rejected an authorize request or bearer token
    #[error("{0}")]
    Rejected(CoreError),

    /// Authorization core failed a token request
    #[error("{0}")]
    TokenExchange(CoreError),
}

impl HandshakeError {
    /// Create a validation error.
    #[must_use]
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation { field: field.into(), message: message.into() }
    }
}

impl IntoResponse for HandshakeError {
    fn into_response(self) -> Response {
        match self {
            Self::Store(ref err) => {
                tracing::error!(error = %err, "Session store failure");
                (StatusCode::INTERNAL_SERVER_ERROR, self.to_string()).into_response()
            }
            Self::Validation { .. } => (StatusCode::BAD_REQUEST, self.to_string()).into_response(),
            Self::Rejected(ref err) => {
                tracing::warn!(error = %err, "Authorization core rejected request");
                (StatusCode::BAD_REQUEST, err.to_string()).into_response()
            }
            Self::TokenExchange(ref err) => {
                if err.is_server_error() {
                    tracing::error!(error = %err, "Authorization core internal error");
                } else {
                    tracing::warn!(error = %err, "Token request rejected");
                }
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(serde_json::json!({
                        "error": err.kind.as_str(),
                        "error_description": err.description
                    })),
                )
                    .into_response()
            }
        }
    }
}

/// Result type alias for session store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Result type alias for authorization core operations.
pub type CoreResult<T> = Result<T, CoreError>;
