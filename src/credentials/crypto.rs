//! AES-256-GCM token encryption
//!
//! Encrypted tokens are stored as `base64(nonce || ciphertext || tag)` using
//! the standard base64 alphabet, where `nonce` is a fresh random 96-bit value
//! per encryption.

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use rand::RngCore as _;
use sha2::{Digest, Sha256};

use crate::error::{Result, SpotifyCliError};

/// AES-GCM nonce length in bytes.
pub const NONCE_LEN: usize = 12;

/// Key length in bytes.
pub const KEY_LEN: usize = 32;

// ---------------------------------------------------------------------------
// EncryptionKey
// ---------------------------------------------------------------------------

/// A 32-byte symmetric key for token encryption.
///
/// Keys are derived from a secret string with SHA-256, so any non-empty
/// secret (including a generated base64 value) yields a full-length key.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptionKey {
    bytes: [u8; KEY_LEN],
}

impl EncryptionKey {
    /// Derives a key from `secret`.
    ///
    /// # Examples
    ///
    /// ```
    /// use spotifycli::credentials::crypto::EncryptionKey;
    ///
    /// let a = EncryptionKey::from_secret("hunter2");
    /// let b = EncryptionKey::from_secret("hunter2");
    /// assert!(a == b);
    /// ```
    pub fn from_secret(secret: &str) -> Self {
        let digest = Sha256::digest(secret.as_bytes());
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(digest.as_slice());
        Self { bytes }
    }

    /// Wraps raw key bytes.
    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self { bytes }
    }

    /// Generates a random secret and its derived key.
    ///
    /// The secret is 32 random bytes in standard base64; it is what the user
    /// would export as `SPOTIFYCLI_KEY`.
    pub fn generate() -> (String, Self) {
        let mut raw = [0u8; KEY_LEN];
        rand::rng().fill_bytes(&mut raw);
        let secret = BASE64.encode(raw);
        let key = Self::from_secret(&secret);
        (secret, key)
    }

    fn cipher(&self) -> Aes256Gcm {
        Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.bytes))
    }
}

impl std::fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptionKey")
            .field("bytes", &"[REDACTED]")
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Public functions
// ---------------------------------------------------------------------------

/// Encrypts `plaintext` under `key`.
///
/// # Errors
///
/// Returns [`SpotifyCliError::Encryption`] if the AEAD seal fails.
///
/// # Examples
///
/// ```
/// use spotifycli::credentials::crypto::{decrypt_token, encrypt_token, EncryptionKey};
///
/// let key = EncryptionKey::from_secret("k");
/// let sealed = encrypt_token("AT1", &key).unwrap();
/// assert_eq!(decrypt_token(&sealed, &key).unwrap(), "AT1");
/// ```
pub fn encrypt_token(plaintext: &str, key: &EncryptionKey) -> Result<String> {
    let mut nonce = [0u8; NONCE_LEN];
    rand::rng().fill_bytes(&mut nonce);

    let ciphertext = key
        .cipher()
        .encrypt(Nonce::from_slice(&nonce), plaintext.as_bytes())
        .map_err(|e| SpotifyCliError::Encryption(format!("failed to seal token: {e}")))?;

    let mut sealed = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    sealed.extend_from_slice(&nonce);
    sealed.extend_from_slice(&ciphertext);
    Ok(BASE64.encode(sealed))
}

/// Decrypts a value produced by [`encrypt_token`].
///
/// # Errors
///
/// Returns [`SpotifyCliError::Decryption`] for bad base64, truncated input,
/// a wrong key, tampered ciphertext, or non-UTF-8 plaintext.
pub fn decrypt_token(sealed: &str, key: &EncryptionKey) -> Result<String> {
    let data = BASE64
        .decode(sealed)
        .map_err(|e| SpotifyCliError::Decryption(format!("failed to decode base64: {e}")))?;

    if data.len() < NONCE_LEN {
        return Err(SpotifyCliError::Decryption("ciphertext too short".to_string()).into());
    }
    let (nonce, ciphertext) = data.split_at(NONCE_LEN);

    let plaintext = key
        .cipher()
        .decrypt(Nonce::from_slice(nonce), ciphertext)
        .map_err(|_| {
            SpotifyCliError::Decryption("authentication failed (wrong key or corrupted data)".to_string())
        })?;

    String::from_utf8(plaintext)
        .map_err(|e| SpotifyCliError::Decryption(format!("plaintext is not UTF-8: {e}")).into())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
