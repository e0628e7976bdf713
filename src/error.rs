//! Error types for spotifycli
//!
//! This module defines all error types used throughout the application,
//! using `thiserror` for ergonomic error handling.

use std::time::Duration;

use thiserror::Error;

/// Main error type for spotifycli operations
///
/// Covers the login flow (callback, state check, token exchange), the
/// credential store (encryption, persistence) and configuration loading.
/// Functions return [`Result`], so callers classify failures with
/// `err.downcast_ref::<SpotifyCliError>()`.
#[derive(Error, Debug)]
pub enum SpotifyCliError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// The provider redirected back with an `error` parameter
    #[error("Authorization denied by provider: {0}")]
    ProviderDenied(String),

    /// No callback arrived within the wait window
    #[error("No authorization callback received within {0:?}; did you approve the request in the browser?")]
    CallbackTimeout(Duration),

    /// The `state` returned by the provider does not match the session
    #[error("State mismatch in authorization callback; login aborted")]
    StateMismatch,

    /// A callback arrived without an authorization code
    #[error("Invalid authorization callback: {0}")]
    InvalidCallback(String),

    /// The loopback callback server failed to bind or serve
    #[error("Callback server error: {0}")]
    CallbackServer(String),

    /// Token endpoint rejected the request or returned garbage
    #[error("Token exchange failed: {0}")]
    TokenExchange(String),

    /// Ciphertext could not be decrypted under the current key
    #[error("Decryption failed: {0}")]
    Decryption(String),

    /// Encryption of a token failed
    #[error("Encryption failed: {0}")]
    Encryption(String),

    /// Filesystem errors on the credential file or its directory
    #[error("Persistence error: {0}")]
    Persistence(String),

    /// No usable tokens are stored
    #[error("Not authenticated; run `spotifycli login`")]
    NotAuthenticated,

    /// Stored access token is past its expiry
    #[error("Access token expired; run `spotifycli login` to re-authenticate")]
    TokenExpired,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// YAML parsing errors
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// HTTP request errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Keyring/credential storage errors
    #[error("Keyring error: {0}")]
    Keyring(#[from] keyring::Error),
}

/// Result type alias for spotifycli operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
