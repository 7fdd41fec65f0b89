//! Handshake endpoint handlers.
//!
//! `/login` starts a pending login, `/auth` confirms it, `/oauth/authorize`
//! parks or resumes the OAuth request around the two, and `/oauth/token` and
//! `/test` pass straight through to the authorization core.

use std::sync::{Arc, LazyLock};

use axum::{
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, HeaderValue, Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use axum_extra::extract::cookie::CookieJar;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::Utc;
use regex::Regex;
use serde::Deserialize;

use super::session::SessionHandle;
use super::transport::HttpState;
use crate::core::{AuthorizeRequest, AuthorizeResponse, TokenRequest};
use crate::error::HandshakeError;
use crate::session::{ConfirmOutcome, FormParams, LoginState};

/// Path the gates send unauthenticated browsers to.
pub const LOGIN_PATH: &str = "/login";

/// Longest accepted username.
const MAX_USERNAME_LEN: usize = 64;

static USERNAME_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9._@+-]+$").expect("username pattern is valid"));

type HandlerResult = Result<(CookieJar, Response), HandshakeError>;

// ─── Shared helpers ──────────────────────────────────────────────────────────

/// `302 Found` to `location`.
fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_owned())]).into_response()
}

/// Bare status response carrying the front-end CORS headers.
fn with_cors(status: StatusCode, frontend_host: &str) -> Response {
    let mut response = status.into_response();
    let headers = response.headers_mut();
    if let Ok(origin) = HeaderValue::from_str(frontend_host) {
        headers.insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, origin);
    }
    headers.insert(header::ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static("GET,POST"));
    headers.insert(header::ACCESS_CONTROL_ALLOW_CREDENTIALS, HeaderValue::from_static("true"));
    response
}

fn is_form(headers: &HeaderMap) -> bool {
    headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|v| v.starts_with("application/x-www-form-urlencoded"))
}

/// Collect request parameters: urlencoded POST body first, then the query.
pub fn request_params(method: &Method, headers: &HeaderMap, uri: &Uri, body: &[u8]) -> FormParams {
    let mut params = FormParams::new();
    if method == Method::POST && is_form(headers) {
        params.extend_encoded(&String::from_utf8_lossy(body));
    }
    if let Some(query) = uri.query() {
        params.extend_encoded(query);
    }
    params
}

/// Trim and check a submitted username.
fn validate_username(raw: Option<&str>) -> Result<String, HandshakeError> {
    let username = raw.unwrap_or_default().trim();
    if username.is_empty() {
        return Err(HandshakeError::validation("username", "cannot be empty"));
    }
    if username.len() > MAX_USERNAME_LEN {
        return Err(HandshakeError::validation(
            "username",
            format!("must be at most {MAX_USERNAME_LEN} characters"),
        ));
    }
    if !USERNAME_PATTERN.is_match(username) {
        return Err(HandshakeError::validation("username", "contains unsupported characters"));
    }
    Ok(username.to_owned())
}

// ─── Login Gate ──────────────────────────────────────────────────────────────

/// `GET|POST /login`
///
/// GET sends the browser to the front-end login form. POST starts a pending
/// login for `username` and issues a confirmation code; the front-end then
/// collects the code and calls `/auth`.
pub async fn handle_login(
    State(state): State<Arc<HttpState>>,
    jar: CookieJar,
    method: Method,
    headers: HeaderMap,
    uri: Uri,
    body: Bytes,
) -> HandlerResult {
    if method != Method::POST {
        return Ok((jar, found(&state.config.frontend_root())));
    }

    let query = FormParams::parse(uri.query().unwrap_or_default());
    let form = request_params(&method, &headers, &uri, &body);
    let username = validate_username(query.get("username").or_else(|| form.get("username")))?;

    let mut session = SessionHandle::start(&state, &jar).await?;
    let code = state.issuer.issue();
    session.record_mut().login = LoginState::pending(username.clone(), code.clone(), Utc::now());
    let request_id = session.context().request_id().to_owned();
    let jar = session.save(&state, jar).await?;

    tracing::info!(request_id = %request_id, user = %username, "Login pending confirmation");
    state.notifier.deliver(&username, &code).await;

    Ok((jar, with_cors(StatusCode::OK, &state.config.frontend_host)))
}

// ─── Confirmation Gate ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ConfirmQuery {
    pub code: Option<String>,
}

/// `GET /auth?code=`
///
/// Checks the code against the pending login. A wrong code leaves the login
/// in place for another try until the attempt limit drops it.
pub async fn handle_confirm(
    State(state): State<Arc<HttpState>>,
    jar: CookieJar,
    Query(query): Query<ConfirmQuery>,
) -> HandlerResult {
    let mut session = SessionHandle::start(&state, &jar).await?;
    let supplied = query.code.unwrap_or_default();

    let outcome = session.record_mut().login.confirm(&supplied, &state.issuer, Utc::now());
    let request_id = session.context().request_id().to_owned();
    let jar = if outcome.is_mutation() { session.save(&state, jar).await? } else { jar };

    let response = match outcome {
        ConfirmOutcome::NoPendingLogin => found(LOGIN_PATH),
        ConfirmOutcome::Expired => {
            tracing::info!(request_id = %request_id, "Confirmation code expired");
            found(LOGIN_PATH)
        }
        ConfirmOutcome::Mismatch { attempts_left } => {
            tracing::info!(request_id = %request_id, attempts_left, "Confirmation code mismatch");
            StatusCode::NOT_FOUND.into_response()
        }
        ConfirmOutcome::LockedOut => {
            tracing::warn!(request_id = %request_id, "Too many confirmation attempts, login dropped");
            StatusCode::TOO_MANY_REQUESTS.into_response()
        }
        ConfirmOutcome::Confirmed => {
            tracing::info!(request_id = %request_id, "Login confirmed");
            with_cors(StatusCode::OK, &state.config.frontend_host)
        }
    };

    Ok((jar, response))
}

// ─── Authorization Gate ──────────────────────────────────────────────────────

/// `GET|POST /oauth/authorize`
///
/// Anonymous callers get their request parked in the session and are sent to
/// `/login`. Once confirmed, the next call resumes the parked request, resets
/// the session to anonymous, and hands the request to the authorization core.
pub async fn handle_authorize(
    State(state): State<Arc<HttpState>>,
    jar: CookieJar,
    method: Method,
    headers: HeaderMap,
    uri: Uri,
    body: Bytes,
) -> HandlerResult {
    let mut session = SessionHandle::start(&state, &jar).await?;
    let request_id = session.context().request_id().to_owned();

    // An anonymous caller always parks the request it is making now, replacing
    // any request parked earlier.
    if session.record().login == LoginState::Anonymous {
        session.record_mut().return_uri = Some(request_params(&method, &headers, &uri, &body));
        let jar = session.save(&state, jar).await?;
        tracing::info!(request_id = %request_id, "Anonymous authorize, redirecting to login");
        return Ok((jar, found(LOGIN_PATH)));
    }

    let resumed = session.record_mut().return_uri.take();
    let was_resumed = resumed.is_some();
    let params = resumed.unwrap_or_else(|| request_params(&method, &headers, &uri, &body));

    // Anything left that is not authenticated is still waiting for its code.
    let Some(user_id) = session.record_mut().login.take_authenticated_user() else {
        let jar = if was_resumed { session.save(&state, jar).await? } else { jar };
        tracing::info!(request_id = %request_id, "Authorize before confirmation");
        return Ok((jar, StatusCode::NOT_FOUND.into_response()));
    };

    let jar = session.save(&state, jar).await?;
    tracing::info!(request_id = %request_id, user = %user_id, resumed = was_resumed, "Handshake complete");

    let response = state
        .core
        .handle_authorize(AuthorizeRequest { user_id, params })
        .await
        .map_err(HandshakeError::Rejected)?;

    let response = match response {
        AuthorizeResponse::Redirect { location } => found(&location),
    };
    Ok((jar, response))
}

// ─── Token Endpoint ──────────────────────────────────────────────────────────

/// Client id and secret from an HTTP Basic `Authorization` header.
fn basic_credentials(headers: &HeaderMap) -> Option<(String, String)> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let encoded = value.strip_prefix("Basic ")?;
    let decoded = String::from_utf8(STANDARD.decode(encoded.trim()).ok()?).ok()?;
    let (id, secret) = decoded.split_once(':')?;
    Some((id.to_owned(), secret.to_owned()))
}

/// `POST /oauth/token`
///
/// Forwarded to the authorization core as-is.
pub async fn handle_token(
    State(state): State<Arc<HttpState>>,
    method: Method,
    headers: HeaderMap,
    uri: Uri,
    body: Bytes,
) -> Result<Response, HandshakeError> {
    let request = TokenRequest {
        params: request_params(&method, &headers, &uri, &body),
        basic_auth: basic_credentials(&headers),
    };

    let tokens = state.core.handle_token(request).await.map_err(HandshakeError::TokenExchange)?;

    let mut response = axum::Json(tokens).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-store"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    Ok(response)
}

// ─── Bearer Introspection ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct TestQuery {
    pub access_token: Option<String>,
}

/// `GET /test`
///
/// Validates the bearer token and reports its remaining lifetime and owners.
pub async fn handle_test(
    State(state): State<Arc<HttpState>>,
    headers: HeaderMap,
    Query(query): Query<TestQuery>,
) -> Result<Response, HandshakeError> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_owned)
        .or(query.access_token)
        .unwrap_or_default();

    let info = state.core.validate_bearer(&bearer).await.map_err(HandshakeError::Rejected)?;

    let body = serde_json::json!({
        "expires_in": info.expires_in(Utc::now()),
        "client_id": info.client_id,
        "user_id": info.user_id
    });
    let mut text = serde_json::to_string_pretty(&body).unwrap_or_default();
    text.push('\n');

    Ok(([(header::CONTENT_TYPE, "application/json")], text).into_response())
}
