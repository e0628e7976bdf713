//! Token exchange integration tests using wiremock
//!
//! Verifies `HttpTokenExchanger` against a mock token endpoint:
//!
//! - The form body carries the code, redirect URI, client ID, and the
//!   session's `code_verifier`, and never a client secret.
//! - A missing `expires_in` defaults to one hour.
//! - Non-2xx responses and malformed bodies surface as `TokenExchange`.

use std::time::Duration;

use chrono::Utc;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use spotifycli::auth::exchange::{HttpTokenExchanger, TokenExchanger, DEFAULT_EXPIRES_IN};
use spotifycli::auth::pkce::PkceSession;
use spotifycli::error::SpotifyCliError;

mod common;
use common::{form_params, token_response_body};

const REDIRECT_URI: &str = "http://127.0.0.1:8080/callback";

fn exchanger_for(server: &MockServer) -> HttpTokenExchanger {
    HttpTokenExchanger::with_endpoint(
        format!("{}/api/token", server.uri()),
        Duration::from_secs(5),
    )
    .expect("client must build")
}

fn assert_token_exchange_error(err: &anyhow::Error) {
    assert!(
        matches!(
            err.downcast_ref::<SpotifyCliError>(),
            Some(SpotifyCliError::TokenExchange(_))
        ),
        "expected TokenExchange, got: {err}"
    );
}

// ---------------------------------------------------------------------------
// Request shape
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_exchange_sends_pkce_form_without_secret() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .and(header("content-type", "application/x-www-form-urlencoded"))
        .respond_with(ResponseTemplate::new(200).set_body_json(token_response_body()))
        .expect(1)
        .mount(&server)
        .await;

    let session = PkceSession::new("abc123", REDIRECT_URI);
    let tokens = exchanger_for(&server)
        .exchange_code(&session, "AUTHCODE")
        .await
        .unwrap();
    assert_eq!(tokens.access_token, "AT1");
    assert_eq!(tokens.refresh_token, "RT1");
    assert_eq!(tokens.token_type, "Bearer");

    let requests = server.received_requests().await.unwrap();
    assert_eq!(requests.len(), 1);
    let params = form_params(&requests[0].body);

    assert_eq!(params["grant_type"], "authorization_code");
    assert_eq!(params["code"], "AUTHCODE");
    assert_eq!(params["redirect_uri"], REDIRECT_URI);
    assert_eq!(params["client_id"], "abc123");
    assert_eq!(params["code_verifier"], session.code_verifier());
    assert!(!params.contains_key("client_secret"));

    server.verify().await;
}

// ---------------------------------------------------------------------------
// Response parsing
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_missing_expires_in_defaults_to_one_hour() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "AT1",
            "refresh_token": "RT1",
            "token_type": "Bearer"
        })))
        .mount(&server)
        .await;

    let before = Utc::now();
    let tokens = exchanger_for(&server)
        .exchange_code(&PkceSession::new("abc123", REDIRECT_URI), "AUTHCODE")
        .await
        .unwrap();

    assert_eq!(tokens.expires_in, DEFAULT_EXPIRES_IN);
    assert!(tokens.issued_at >= before);
    assert_eq!(
        tokens.expiry(),
        tokens.issued_at + chrono::Duration::seconds(3600)
    );
}

#[tokio::test]
async fn test_explicit_expires_in_is_kept() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "AT1",
            "refresh_token": "RT1",
            "token_type": "Bearer",
            "expires_in": 120
        })))
        .mount(&server)
        .await;

    let tokens = exchanger_for(&server)
        .exchange_code(&PkceSession::new("abc123", REDIRECT_URI), "AUTHCODE")
        .await
        .unwrap();
    assert_eq!(tokens.expires_in, 120);
}

// ---------------------------------------------------------------------------
// Failures
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_error_status_surfaces_oauth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
            "error": "invalid_grant",
            "error_description": "Invalid authorization code"
        })))
        .mount(&server)
        .await;

    let err = exchanger_for(&server)
        .exchange_code(&PkceSession::new("abc123", REDIRECT_URI), "BADCODE")
        .await
        .unwrap_err();
    assert_token_exchange_error(&err);
    let msg = err.to_string();
    assert!(msg.contains("400"), "message: {msg}");
    assert!(msg.contains("invalid_grant"), "message: {msg}");
}

#[tokio::test]
async fn test_server_error_is_token_exchange_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let err = exchanger_for(&server)
        .exchange_code(&PkceSession::new("abc123", REDIRECT_URI), "AUTHCODE")
        .await
        .unwrap_err();
    assert_token_exchange_error(&err);
}

#[tokio::test]
async fn test_malformed_body_is_token_exchange_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let err = exchanger_for(&server)
        .exchange_code(&PkceSession::new("abc123", REDIRECT_URI), "AUTHCODE")
        .await
        .unwrap_err();
    assert_token_exchange_error(&err);
}

#[tokio::test]
async fn test_empty_access_token_is_rejected() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "",
            "refresh_token": "RT1",
            "token_type": "Bearer"
        })))
        .mount(&server)
        .await;

    let err = exchanger_for(&server)
        .exchange_code(&PkceSession::new("abc123", REDIRECT_URI), "AUTHCODE")
        .await
        .unwrap_err();
    assert_token_exchange_error(&err);
}

#[tokio::test]
async fn test_unreachable_endpoint_is_token_exchange_error() {
    // Bind then drop to get a port with nothing listening.
    let port = {
        let probe = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        probe.local_addr().unwrap().port()
    };
    let exchanger = HttpTokenExchanger::with_endpoint(
        format!("http://127.0.0.1:{port}/api/token"),
        Duration::from_secs(2),
    )
    .unwrap();

    let err = exchanger
        .exchange_code(&PkceSession::new("abc123", REDIRECT_URI), "AUTHCODE")
        .await
        .unwrap_err();
    assert_token_exchange_error(&err);
}
