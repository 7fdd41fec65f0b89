//! Request dumps for debugging the handshake.

use std::sync::Arc;

use axum::{
    body::{Body, to_bytes},
    extract::{Request, State},
    http::{HeaderMap, StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};

use super::transport::HttpState;

/// Largest body buffered for a dump.
const MAX_DUMP_BODY: usize = 64 * 1024;

/// Short label for a handshake route, `None` for routes that are not dumped.
fn route_label(path: &str) -> Option<&'static str> {
    match path {
        "/login" => Some("login"),
        "/auth" => Some("auth"),
        "/oauth/authorize" => Some("authorize"),
        "/oauth/token" => Some("token"),
        "/test" => Some("test"),
        _ => None,
    }
}

/// Form and query keys whose values are never logged.
const SECRET_KEYS: &[&str] =
    &["client_secret", "code", "code_verifier", "refresh_token", "access_token", "password"];

/// Re-encode an urlencoded string with secret values masked.
fn redact_form(input: &str) -> String {
    let mut out = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in url::form_urlencoded::parse(input.as_bytes()) {
        if SECRET_KEYS.contains(&&*key) {
            out.append_pair(&key, "[redacted]");
        } else {
            out.append_pair(&key, &value);
        }
    }
    out.finish()
}

/// Render headers one per line, masking credentials.
fn render_headers(headers: &HeaderMap) -> String {
    headers
        .iter()
        .map(|(name, value)| {
            let value = if name == header::AUTHORIZATION || name == header::COOKIE {
                "[redacted]"
            } else {
                value.to_str().unwrap_or("[binary]")
            };
            format!("{name}: {value}")
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Log method, URI, headers and body of handshake requests when enabled.
///
/// Bodies are assumed urlencoded; secrets in the query and body are masked.
pub async fn dump_request(State(state): State<Arc<HttpState>>, request: Request, next: Next) -> Response {
    if !state.config.dump_requests {
        return next.run(request).await;
    }
    let Some(label) = route_label(request.uri().path()) else {
        return next.run(request).await;
    };

    let (parts, body) = request.into_parts();
    let Ok(bytes) = to_bytes(body, MAX_DUMP_BODY).await else {
        return (StatusCode::PAYLOAD_TOO_LARGE, "Request body too large").into_response();
    };

    tracing::info!(
        route = label,
        method = %parts.method,
        path = %parts.uri.path(),
        query = %redact_form(parts.uri.query().unwrap_or_default()),
        headers = %render_headers(&parts.headers),
        body = %redact_form(&String::from_utf8_lossy(&bytes)),
        "Request dump"
    );

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_route_labels() {
        assert_eq!(route_label("/oauth/authorize"), Some("authorize"));
        assert_eq!(route_label("/auth"), Some("auth"));
        assert_eq!(route_label("/health"), None);
    }

    #[test]
    fn test_credentials_redacted() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, HeaderValue::from_static("Bearer secret"));
        headers.insert(header::COOKIE, HeaderValue::from_static("token_session=abc"));
        headers.insert(header::HOST, HeaderValue::from_static("localhost"));

        let rendered = render_headers(&headers);
        assert!(!rendered.contains("secret"));
        assert!(!rendered.contains("abc"));
        assert!(rendered.contains("host: localhost"));
    }

    #[test]
    fn test_token_form_secrets_redacted() {
        let body = "grant_type=authorization_code&code=abc123&client_id=222222\
                    &client_secret=s3cret&code_verifier=v3rifier&refresh_token=r3fresh";

        let rendered = redact_form(body);
        for secret in ["abc123", "s3cret", "v3rifier", "r3fresh"] {
            assert!(!rendered.contains(secret), "{secret} leaked: {rendered}");
        }
        assert!(rendered.contains("grant_type=authorization_code"));
        assert!(rendered.contains("client_id=222222"));
    }

    #[test]
    fn test_confirmation_code_query_redacted() {
        assert_eq!(redact_form("code=0042"), "code=%5Bredacted%5D");
        assert_eq!(redact_form("username=alice"), "username=alice");
    }
}
