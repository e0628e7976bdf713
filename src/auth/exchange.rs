//! Authorization code exchange
//!
//! Trades the code delivered to the loopback listener, together with the
//! session's PKCE verifier, for an access/refresh token pair. No client
//! secret is sent; the verifier is the proof of possession.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::auth::authorize::TOKEN_URL;
use crate::auth::pkce::PkceSession;
use crate::error::{Result, SpotifyCliError};

/// Token lifetime assumed when the provider omits `expires_in`.
pub const DEFAULT_EXPIRES_IN: u64 = 3600;

/// Timeout applied to token endpoint requests.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

// ---------------------------------------------------------------------------
// TokenSet
// ---------------------------------------------------------------------------

/// Tokens returned by a successful exchange.
#[derive(Clone, PartialEq, Eq)]
pub struct TokenSet {
    /// Bearer token for API calls.
    pub access_token: String,
    /// Token for obtaining a new access token.
    pub refresh_token: String,
    /// Token type, expected to be `"Bearer"`.
    pub token_type: String,
    /// When the token endpoint answered.
    pub issued_at: DateTime<Utc>,
    /// Lifetime of the access token in seconds.
    pub expires_in: u64,
}

impl TokenSet {
    /// Absolute expiry: `issued_at + expires_in`.
    pub fn expiry(&self) -> DateTime<Utc> {
        i64::try_from(self.expires_in)
            .ok()
            .and_then(chrono::Duration::try_seconds)
            .and_then(|lifetime| self.issued_at.checked_add_signed(lifetime))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }
}

impl std::fmt::Debug for TokenSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenSet")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("issued_at", &self.issued_at)
            .field("expires_in", &self.expires_in)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Token endpoint responses (raw deserialization)
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: String,
    #[serde(default = "default_token_type")]
    token_type: String,
    #[serde(default)]
    expires_in: Option<u64>,
}

fn default_token_type() -> String {
    "Bearer".to_string()
}

impl TokenResponse {
    fn into_token_set(self, issued_at: DateTime<Utc>) -> TokenSet {
        TokenSet {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            token_type: self.token_type,
            issued_at,
            expires_in: self.expires_in.unwrap_or(DEFAULT_EXPIRES_IN),
        }
    }
}

/// RFC 6749 section 5.2 error body.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
    error: String,
    #[serde(default)]
    error_description: Option<String>,
}

// ---------------------------------------------------------------------------
// TokenExchanger
// ---------------------------------------------------------------------------

/// Exchanges an authorization code for tokens.
///
/// The login flow depends on this trait rather than on HTTP directly so the
/// exchange step can be replaced in tests.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TokenExchanger: Send + Sync {
    /// Exchanges `code` using the verifier and redirect URI from `session`.
    ///
    /// # Errors
    ///
    /// Returns [`SpotifyCliError::TokenExchange`] on transport failures,
    /// non-2xx responses, or malformed bodies.
    async fn exchange_code(&self, session: &PkceSession, code: &str) -> Result<TokenSet>;
}

/// [`TokenExchanger`] that talks to a real token endpoint over HTTPS.
///
/// # Examples
///
/// ```
/// use spotifycli::auth::exchange::HttpTokenExchanger;
///
/// let exchanger = HttpTokenExchanger::new().unwrap();
/// assert_eq!(exchanger.token_url(), "https://accounts.spotify.com/api/token");
/// ```
pub struct HttpTokenExchanger {
    http: reqwest::Client,
    token_url: String,
}

impl HttpTokenExchanger {
    /// Creates an exchanger for the Spotify token endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be built.
    pub fn new() -> Result<Self> {
        Self::with_endpoint(TOKEN_URL, DEFAULT_HTTP_TIMEOUT)
    }

    /// Creates an exchanger for a custom token endpoint.
    ///
    /// # Errors
    ///
    /// Returns an error when the HTTP client cannot be built.
    pub fn with_endpoint(token_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self::with_client(http, token_url))
    }

    /// Creates an exchanger around an existing client.
    pub fn with_client(http: reqwest::Client, token_url: impl Into<String>) -> Self {
        Self {
            http,
            token_url: token_url.into(),
        }
    }

    /// The token endpoint this exchanger posts to.
    pub fn token_url(&self) -> &str {
        &self.token_url
    }
}

#[async_trait]
impl TokenExchanger for HttpTokenExchanger {
    async fn exchange_code(&self, session: &PkceSession, code: &str) -> Result<TokenSet> {
        let params = [
            ("grant_type", "authorization_code"),
            ("code", code),
            ("redirect_uri", session.redirect_uri()),
            ("client_id", session.client_id()),
            ("code_verifier", session.code_verifier()),
        ];

        tracing::debug!("Exchanging authorization code at {}", self.token_url);
        let resp = self
            .http
            .post(&self.token_url)
            .form(&params)
            .send()
            .await
            .map_err(|e| SpotifyCliError::TokenExchange(format!("request failed: {e}")))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(SpotifyCliError::TokenExchange(describe_failure(status, &body)).into());
        }

        let issued_at = Utc::now();
        let raw: TokenResponse = resp.json().await.map_err(|e| {
            SpotifyCliError::TokenExchange(format!("failed to parse token response: {e}"))
        })?;

        if raw.access_token.is_empty() {
            return Err(SpotifyCliError::TokenExchange(
                "token response contained an empty access_token".to_string(),
            )
            .into());
        }
        if !raw.token_type.eq_ignore_ascii_case("bearer") {
            tracing::warn!("Unexpected token type from provider: {}", raw.token_type);
        }

        tracing::info!("Authorization code exchanged for tokens");
        Ok(raw.into_token_set(issued_at))
    }
}

fn describe_failure(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<TokenErrorResponse>(body) {
        Ok(err) => match err.error_description {
            Some(desc) => format!("token endpoint returned {status}: {} ({desc})", err.error),
            None => format!("token endpoint returned {status}: {}", err.error),
        },
        Err(_) if body.is_empty() => format!("token endpoint returned {status}"),
        Err(_) => format!("token endpoint returned {status}: {body}"),
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
