//! Configuration management for spotifycli
//!
//! This module handles loading, parsing, validating, and managing
//! configuration from files, environment variables, and CLI overrides.

use crate::auth::authorize::{AUTHORIZE_URL, TOKEN_URL};
use crate::auth::callback::{DEFAULT_CALLBACK_PATH, DEFAULT_PORT};
use crate::cli::{Cli, Commands};
use crate::credentials::store::default_credentials_path;
use crate::error::{Result, SpotifyCliError};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Main configuration structure for spotifycli
///
/// Everything is optional in the file; missing sections take defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Login flow settings
    #[serde(default)]
    pub auth: AuthConfig,
    /// Credential file and key settings
    #[serde(default)]
    pub storage: StorageConfig,
}

/// Login flow configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// OAuth client identifier; falls back to the stored record or a prompt
    #[serde(default)]
    pub client_id: Option<String>,

    /// Local port of the redirect listener
    #[serde(default = "default_port")]
    pub port: u16,

    /// Path segment of the redirect URI (no slashes)
    #[serde(default = "default_redirect_path")]
    pub redirect_path: String,

    /// How long login waits for the browser redirect
    #[serde(default = "default_callback_timeout_seconds")]
    pub callback_timeout_seconds: u64,

    /// Grace period for in-flight responses when the listener stops
    #[serde(default = "default_shutdown_grace_seconds")]
    pub shutdown_grace_seconds: u64,

    /// How long the callback handler waits to hand off its result
    #[serde(default = "default_handoff_timeout_millis")]
    pub handoff_timeout_millis: u64,

    /// Authorization endpoint
    #[serde(default = "default_authorize_url")]
    pub authorize_url: String,

    /// Token endpoint
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// Timeout for token endpoint requests
    #[serde(default = "default_http_timeout_seconds")]
    pub http_timeout_seconds: u64,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn default_redirect_path() -> String {
    DEFAULT_CALLBACK_PATH.to_string()
}

fn default_callback_timeout_seconds() -> u64 {
    300
}

fn default_shutdown_grace_seconds() -> u64 {
    5
}

fn default_handoff_timeout_millis() -> u64 {
    1000
}

fn default_authorize_url() -> String {
    AUTHORIZE_URL.to_string()
}

fn default_token_url() -> String {
    TOKEN_URL.to_string()
}

fn default_http_timeout_seconds() -> u64 {
    30
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            client_id: None,
            port: default_port(),
            redirect_path: default_redirect_path(),
            callback_timeout_seconds: default_callback_timeout_seconds(),
            shutdown_grace_seconds: default_shutdown_grace_seconds(),
            handoff_timeout_millis: default_handoff_timeout_millis(),
            authorize_url: default_authorize_url(),
            token_url: default_token_url(),
            http_timeout_seconds: default_http_timeout_seconds(),
        }
    }
}

/// Credential storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Credential file location; defaults to `~/.config/spotifycli.json`
    #[serde(default)]
    pub credentials_path: Option<String>,

    /// Secret the token encryption key is derived from
    ///
    /// Accepted from the config file but never written back out.
    #[serde(default, skip_serializing)]
    pub encryption_key: Option<String>,

    /// Whether the OS keyring may be used to find or store the key
    #[serde(default = "default_use_keyring")]
    pub use_keyring: bool,
}

fn default_use_keyring() -> bool {
    true
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            credentials_path: None,
            encryption_key: None,
            use_keyring: default_use_keyring(),
        }
    }
}

impl StorageConfig {
    /// The configured credential path, or the default location
    ///
    /// # Errors
    ///
    /// Returns an error when no path is configured and the home directory
    /// cannot be determined.
    pub fn resolve_credentials_path(&self) -> Result<PathBuf> {
        match &self.credentials_path {
            Some(path) => Ok(PathBuf::from(path)),
            None => default_credentials_path(),
        }
    }
}

impl Config {
    /// Load configuration from file with environment and CLI overrides
    ///
    /// A missing file is not an error; defaults are used instead.
    ///
    /// # Arguments
    ///
    /// * `path` - Path to configuration file, if any
    /// * `cli` - CLI arguments for overrides
    ///
    /// # Errors
    ///
    /// Returns error if the file exists but cannot be read or parsed
    pub fn load(path: Option<&str>, cli: &Cli) -> Result<Self> {
        let mut config = match path {
            Some(path) if Path::new(path).exists() => Self::from_file(path)?,
            Some(path) => {
                tracing::debug!("Config file not found at {}, using defaults", path);
                Self::default()
            }
            None => Self::default(),
        };

        config.apply_env_vars();
        config.apply_cli_overrides(cli);

        Ok(config)
    }

    fn from_file(path: &str) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| SpotifyCliError::Config(format!("Failed to read config file: {}", e)))?;
        serde_yaml::from_str(&contents)
            .map_err(|e| SpotifyCliError::Config(format!("Failed to parse config: {}", e)).into())
    }

    fn apply_env_vars(&mut self) {
        if let Ok(client_id) = std::env::var("SPOTIFYCLI_CLIENT_ID") {
            if !client_id.trim().is_empty() {
                self.auth.client_id = Some(client_id);
            }
        }

        if let Ok(port) = std::env::var("SPOTIFYCLI_PORT") {
            if let Ok(value) = port.parse() {
                self.auth.port = value;
            } else {
                tracing::warn!("Invalid SPOTIFYCLI_PORT: {}", port);
            }
        }

        if let Ok(timeout) = std::env::var("SPOTIFYCLI_CALLBACK_TIMEOUT") {
            if let Ok(value) = timeout.parse() {
                self.auth.callback_timeout_seconds = value;
            } else {
                tracing::warn!("Invalid SPOTIFYCLI_CALLBACK_TIMEOUT: {}", timeout);
            }
        }

        if let Ok(path) = std::env::var("SPOTIFYCLI_CREDENTIALS") {
            if !path.is_empty() {
                self.storage.credentials_path = Some(path);
            }
        }

        if let Ok(key) = std::env::var("SPOTIFYCLI_KEY") {
            if !key.is_empty() {
                self.storage.encryption_key = Some(key);
            }
        }

        if let Ok(no_keyring) = std::env::var("SPOTIFYCLI_NO_KEYRING") {
            match no_keyring.to_lowercase().as_str() {
                "1" | "true" | "yes" => self.storage.use_keyring = false,
                "0" | "false" | "no" | "" => {}
                other => tracing::warn!("Invalid SPOTIFYCLI_NO_KEYRING: {}", other),
            }
        }
    }

    fn apply_cli_overrides(&mut self, cli: &Cli) {
        if cli.verbose {
            tracing::debug!("Verbose mode enabled");
        }

        if let Commands::Login {
            client_id,
            port,
            timeout,
            ..
        } = &cli.command
        {
            if let Some(client_id) = client_id {
                self.auth.client_id = Some(client_id.clone());
            }
            if let Some(port) = port {
                self.auth.port = *port;
            }
            if let Some(timeout) = timeout {
                self.auth.callback_timeout_seconds = *timeout;
            }
        }
    }

    /// Validate the configuration
    ///
    /// # Errors
    ///
    /// Returns error if any validation check fails
    pub fn validate(&self) -> Result<()> {
        let path = &self.auth.redirect_path;
        if path.is_empty() {
            return Err(
                SpotifyCliError::Config("auth.redirect_path cannot be empty".to_string()).into(),
            );
        }
        if path.contains('/') || path.contains('?') || path.contains('#') {
            return Err(SpotifyCliError::Config(format!(
                "auth.redirect_path must be a single path segment, got: {}",
                path
            ))
            .into());
        }

        if self.auth.callback_timeout_seconds == 0 {
            return Err(SpotifyCliError::Config(
                "auth.callback_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        if self.auth.handoff_timeout_millis == 0 {
            return Err(SpotifyCliError::Config(
                "auth.handoff_timeout_millis must be greater than 0".to_string(),
            )
            .into());
        }

        if self.auth.http_timeout_seconds == 0 {
            return Err(SpotifyCliError::Config(
                "auth.http_timeout_seconds must be greater than 0".to_string(),
            )
            .into());
        }

        validate_endpoint("auth.authorize_url", &self.auth.authorize_url)?;
        validate_endpoint("auth.token_url", &self.auth.token_url)?;

        if let Some(path) = &self.storage.credentials_path {
            if path.trim().is_empty() {
                return Err(SpotifyCliError::Config(
                    "storage.credentials_path cannot be empty".to_string(),
                )
                .into());
            }
        }

        Ok(())
    }
}

fn validate_endpoint(name: &str, value: &str) -> Result<()> {
    let url = url::Url::parse(value)
        .map_err(|e| SpotifyCliError::Config(format!("{} is not a valid URL: {}", name, e)))?;
    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(SpotifyCliError::Config(format!(
            "{} must use http or https, got: {}",
            name, scheme
        ))
        .into()),
    }
}
