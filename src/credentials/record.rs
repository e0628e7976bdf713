//! The persisted credential record
//!
//! In memory the token fields hold plaintext; [`super::store::CredentialStore`]
//! encrypts them on save and decrypts them on load.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::auth::callback::{DEFAULT_CALLBACK_PATH, DEFAULT_PORT};
use crate::auth::exchange::TokenSet;
use crate::error::{Result, SpotifyCliError};

/// Tokens plus the non-secret login settings, as stored on disk.
///
/// # Examples
///
/// ```
/// use spotifycli::credentials::CredentialRecord;
///
/// let record = CredentialRecord::default();
/// assert!(!record.is_authenticated());
/// assert!(record.is_expired());
/// assert_eq!(record.redirect_path, "callback");
/// ```
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CredentialRecord {
    /// OAuth client identifier.
    #[serde(default)]
    pub client_id: String,

    /// Path segment of the redirect URI.
    #[serde(default = "default_redirect_path")]
    pub redirect_path: String,

    /// Local port of the redirect listener, written as a string.
    #[serde(
        default = "default_port",
        serialize_with = "serialize_port",
        deserialize_with = "deserialize_port"
    )]
    pub port: u16,

    /// Access token (plaintext in memory, ciphertext on disk).
    #[serde(default)]
    pub access_token: String,

    /// Refresh token (plaintext in memory, ciphertext on disk).
    #[serde(default)]
    pub refresh_token: String,

    /// Token type, normally `"Bearer"`.
    #[serde(default)]
    pub token_type: String,

    /// Expiry as unix seconds; `0` means unset.
    #[serde(default)]
    pub token_expiry: i64,

    /// When the record was last written, as unix seconds.
    #[serde(default)]
    pub last_saved: i64,

    /// Set by the store when the tokens could not be decrypted on load;
    /// the token fields then hold ciphertext.
    #[serde(skip)]
    pub undecryptable: bool,
}

fn default_redirect_path() -> String {
    DEFAULT_CALLBACK_PATH.to_string()
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

fn serialize_port<S>(port: &u16, serializer: S) -> std::result::Result<S::Ok, S::Error>
where
    S: Serializer,
{
    serializer.serialize_str(&port.to_string())
}

/// Accepts `8080`, `"8080"`, or `""` (which maps to the default port).
fn deserialize_port<'de, D>(deserializer: D) -> std::result::Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum PortValue {
        Number(u16),
        Text(String),
    }

    match PortValue::deserialize(deserializer)? {
        PortValue::Number(port) => Ok(port),
        PortValue::Text(text) if text.trim().is_empty() => Ok(DEFAULT_PORT),
        PortValue::Text(text) => text
            .trim()
            .parse()
            .map_err(|_| serde::de::Error::custom(format!("invalid port: {text}"))),
    }
}

impl Default for CredentialRecord {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            redirect_path: default_redirect_path(),
            port: default_port(),
            access_token: String::new(),
            refresh_token: String::new(),
            token_type: String::new(),
            token_expiry: 0,
            last_saved: 0,
            undecryptable: false,
        }
    }
}

impl CredentialRecord {
    /// `true` when both tokens are present and readable, regardless of expiry.
    pub fn is_authenticated(&self) -> bool {
        !self.undecryptable && !self.access_token.is_empty() && !self.refresh_token.is_empty()
    }

    /// `true` when the access token is past its expiry or no expiry is set.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// [`Self::is_expired`] evaluated at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.token_expiry == 0 || now.timestamp() > self.token_expiry
    }

    /// The expiry as a timestamp, when set.
    pub fn expiry(&self) -> Option<DateTime<Utc>> {
        if self.token_expiry == 0 {
            return None;
        }
        DateTime::from_timestamp(self.token_expiry, 0)
    }

    /// When the record was last saved, if ever.
    pub fn last_saved_at(&self) -> Option<DateTime<Utc>> {
        if self.last_saved == 0 {
            return None;
        }
        DateTime::from_timestamp(self.last_saved, 0)
    }

    /// Replaces the tokens with a fresh exchange result.
    pub fn set_tokens(&mut self, tokens: &TokenSet) {
        self.access_token = tokens.access_token.clone();
        self.refresh_token = tokens.refresh_token.clone();
        self.token_type = tokens.token_type.clone();
        self.token_expiry = tokens.expiry().timestamp();
        self.undecryptable = false;
    }

    /// Forgets all tokens, keeping the non-secret settings.
    pub fn clear_tokens(&mut self) {
        self.access_token.clear();
        self.refresh_token.clear();
        self.token_type.clear();
        self.token_expiry = 0;
        self.undecryptable = false;
    }

    /// Returns a usable access token or the reason there is none.
    ///
    /// Expired tokens are not refreshed; the user has to log in again.
    ///
    /// # Errors
    ///
    /// - [`SpotifyCliError::Decryption`] when the stored tokens could not be
    ///   decrypted with the available key.
    /// - [`SpotifyCliError::NotAuthenticated`] when no tokens are stored.
    /// - [`SpotifyCliError::TokenExpired`] when the access token has expired.
    pub fn require_access_token(&self) -> Result<&str> {
        if self.undecryptable {
            return Err(SpotifyCliError::Decryption(
                "stored tokens cannot be read with the current encryption key; run `spotifycli login`"
                    .to_string(),
            )
            .into());
        }
        if !self.is_authenticated() {
            return Err(SpotifyCliError::NotAuthenticated.into());
        }
        if self.is_expired() {
            return Err(SpotifyCliError::TokenExpired.into());
        }
        Ok(&self.access_token)
    }
}

impl std::fmt::Debug for CredentialRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialRecord")
            .field("client_id", &self.client_id)
            .field("redirect_path", &self.redirect_path)
            .field("port", &self.port)
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("token_type", &self.token_type)
            .field("token_expiry", &self.token_expiry)
            .field("last_saved", &self.last_saved)
            .field("undecryptable", &self.undecryptable)
            .finish()
    }
}
