//! Full OAuth 2.0 flow through the handshake and the in-memory core.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, Response, StatusCode, header};
use base64::Engine;
use base64::engine::general_purpose::{STANDARD, URL_SAFE_NO_PAD};
use sha2::{Digest, Sha256};
use tower::ServiceExt;

use token_service::config::Config;
use token_service::confirm::{CodeNotifier, ConfirmCode};
use token_service::server::transport::{HttpState, create_router};
use token_service::{MemoryCore, MemorySessionStore};

const FRONTEND: &str = "http://localhost:8080";
const REDIRECT_URI: &str = "http://localhost:9094/cb";

#[derive(Default)]
struct CapturedCode(Mutex<Option<String>>);

#[async_trait]
impl CodeNotifier for CapturedCode {
    async fn deliver(&self, _user: &str, code: &ConfirmCode) {
        *self.0.lock().unwrap() = Some(code.as_str().to_string());
    }
}

async fn build_test_router() -> (axum::Router, Arc<CapturedCode>) {
    let config = Config::for_testing(FRONTEND);
    let sessions = Arc::new(MemorySessionStore::new(config.session_ttl));
    let core = Arc::new(MemoryCore::from_config(&config).await);
    let codes = Arc::new(CapturedCode::default());
    let state = HttpState::new(config, sessions, core).with_notifier(codes.clone());

    (create_router(Arc::new(state)), codes)
}

fn session_cookie(response: &Response<Body>) -> String {
    let value = response.headers()[header::SET_COOKIE].to_str().unwrap();
    value.split(';').next().unwrap().to_string()
}

fn location(response: &Response<Body>) -> String {
    response.headers()[header::LOCATION].to_str().unwrap().to_string()
}

async fn json_body(response: Response<Body>) -> serde_json::Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&body).unwrap()
}

fn basic_auth() -> String {
    format!("Basic {}", STANDARD.encode("222222:22222222"))
}

fn token_request(params: &[(&str, &str)]) -> Request<Body> {
    Request::post("/oauth/token")
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .header(header::AUTHORIZATION, basic_auth())
        .body(Body::from(serde_urlencoded::to_string(params).unwrap()))
        .unwrap()
}

/// Run the handshake for `query` and return the callback query parameters.
async fn authorize(app: &axum::Router, codes: &CapturedCode, query: &str) -> HashMap<String, String> {
    let response = app
        .clone()
        .oneshot(Request::get(format!("/oauth/authorize?{query}")).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);
    assert_eq!(location(&response), "/login");
    let cookie = session_cookie(&response);

    let response = app
        .clone()
        .oneshot(
            Request::post("/login?username=alice")
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let code = codes.0.lock().unwrap().clone().unwrap();
    let response = app
        .clone()
        .oneshot(
            Request::get(format!("/auth?code={code}"))
                .header(header::COOKIE, &cookie)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .clone()
        .oneshot(Request::get("/oauth/authorize").header(header::COOKIE, &cookie).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::FOUND);

    let location = location(&response);
    assert!(location.starts_with(REDIRECT_URI));
    let url = url::Url::parse(&location).unwrap();
    url.query_pairs().map(|(k, v)| (k.into_owned(), v.into_owned())).collect()
}

#[tokio::test]
async fn test_full_oauth_http_flow() {
    let (app, codes) = build_test_router().await;

    let verifier = "dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk";
    let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(verifier.as_bytes()));
    let query = serde_urlencoded::to_string([
        ("client_id", "222222"),
        ("response_type", "code"),
        ("redirect_uri", REDIRECT_URI),
        ("state", "xyz123"),
        ("scope", "all"),
        ("code_challenge", challenge.as_str()),
        ("code_challenge_method", "S256"),
    ])
    .unwrap();

    let pairs = authorize(&app, &codes, &query).await;
    assert_eq!(pairs["state"], "xyz123");
    let auth_code = pairs["code"].clone();

    // Exchange the code.
    let response = app
        .clone()
        .oneshot(token_request(&[
            ("grant_type", "authorization_code"),
            ("code", auth_code.as_str()),
            ("redirect_uri", REDIRECT_URI),
            ("code_verifier", verifier),
        ]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CACHE_CONTROL], "no-store");
    let tokens = json_body(response).await;
    assert_eq!(tokens["token_type"], "Bearer");
    assert_eq!(tokens["expires_in"], 7200);
    assert_eq!(tokens["scope"], "all");
    let access_token = tokens["access_token"].as_str().unwrap().to_string();
    let refresh_token = tokens["refresh_token"].as_str().unwrap().to_string();

    // Introspect.
    let response = app
        .clone()
        .oneshot(
            Request::get("/test")
                .header(header::AUTHORIZATION, format!("Bearer {access_token}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let info = json_body(response).await;
    assert_eq!(info["client_id"], "222222");
    assert_eq!(info["user_id"], "alice");
    assert!(info["expires_in"].as_i64().unwrap() > 7100);

    // Codes are single use.
    let response = app
        .clone()
        .oneshot(token_request(&[
            ("grant_type", "authorization_code"),
            ("code", auth_code.as_str()),
            ("code_verifier", verifier),
        ]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["error"], "invalid_grant");

    // Refresh rotates the pair and revokes the old access token.
    let response = app
        .clone()
        .oneshot(token_request(&[("grant_type", "refresh_token"), ("refresh_token", refresh_token.as_str())]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let rotated = json_body(response).await;
    assert_ne!(rotated["access_token"].as_str().unwrap(), access_token);

    let response = app
        .clone()
        .oneshot(Request::get(format!("/test?access_token={access_token}")).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_pkce_verifier_mismatch_rejected() {
    let (app, codes) = build_test_router().await;
    let challenge = URL_SAFE_NO_PAD.encode(Sha256::digest(b"correct-verifier"));
    let query = format!(
        "client_id=222222&response_type=code&redirect_uri=http%3A%2F%2Flocalhost%3A9094%2Fcb&code_challenge={challenge}&code_challenge_method=S256"
    );

    let pairs = authorize(&app, &codes, &query).await;

    let response = app
        .clone()
        .oneshot(token_request(&[
            ("grant_type", "authorization_code"),
            ("code", pairs["code"].as_str()),
            ("code_verifier", "wrong-verifier"),
        ]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["error"], "invalid_grant");
}

#[tokio::test]
async fn test_foreign_redirect_rejected_after_handshake() {
    let (app, codes) = build_test_router().await;

    let response = app
        .clone()
        .oneshot(
            Request::get("/oauth/authorize?client_id=222222&response_type=code&redirect_uri=http%3A%2F%2Fevil.example%2Fcb")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let cookie = session_cookie(&response);

    app.clone()
        .oneshot(Request::post("/login?username=alice").header(header::COOKIE, &cookie).body(Body::empty()).unwrap())
        .await
        .unwrap();
    let code = codes.0.lock().unwrap().clone().unwrap();
    app.clone()
        .oneshot(
            Request::get(format!("/auth?code={code}")).header(header::COOKIE, &cookie).body(Body::empty()).unwrap(),
        )
        .await
        .unwrap();

    let response = app
        .clone()
        .oneshot(Request::get("/oauth/authorize").header(header::COOKIE, &cookie).body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_client_credentials_grant() {
    let (app, _codes) = build_test_router().await;

    let response = app
        .clone()
        .oneshot(token_request(&[("grant_type", "client_credentials"), ("scope", "read")]))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let tokens = json_body(response).await;
    assert!(tokens.get("refresh_token").is_none());
    assert_eq!(tokens["scope"], "read");

    let response = app
        .clone()
        .oneshot(
            Request::post("/oauth/token")
                .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                .body(Body::from("grant_type=client_credentials&client_id=222222&client_secret=wrong"))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json_body(response).await["error"], "invalid_client");
}
