//! Encryption key resolution
//!
//! The key secret is looked up in this order:
//!
//! 1. `storage.encryption_key` from the config file or `SPOTIFYCLI_KEY`
//! 2. the OS keyring entry `spotifycli` / `encryption-key`
//! 3. (saves only) a freshly generated secret, stored into the keyring
//!
//! The process environment is never modified. When the keyring cannot hold a
//! generated secret it is printed once so the user can export it.

use colored::Colorize;

use crate::config::StorageConfig;
use crate::credentials::crypto::EncryptionKey;
use crate::error::{Result, SpotifyCliError};

/// Keyring service name.
pub const KEYRING_SERVICE: &str = "spotifycli";

/// Keyring user under which the key secret is stored.
pub const KEYRING_USER: &str = "encryption-key";

/// Environment variable users export the secret under.
pub const KEY_ENV_VAR: &str = "SPOTIFYCLI_KEY";

/// Resolves an existing key without creating one.
///
/// Used when loading: if nothing is found the store leaves tokens encrypted
/// and the record reads as not authenticated.
pub fn resolve_existing(storage: &StorageConfig) -> Option<EncryptionKey> {
    if let Some(secret) = configured_secret(storage) {
        tracing::debug!("Using configured encryption key");
        return Some(EncryptionKey::from_secret(secret));
    }
    if !storage.use_keyring {
        return None;
    }
    match read_keyring_secret() {
        Ok(Some(secret)) => {
            tracing::debug!("Using encryption key from keyring");
            Some(EncryptionKey::from_secret(&secret))
        }
        Ok(None) => {
            tracing::debug!("No encryption key in keyring");
            None
        }
        Err(e) => {
            tracing::warn!("Keyring unavailable: {}", e);
            None
        }
    }
}

/// Resolves the key for a save, generating one when none exists.
///
/// # Errors
///
/// Returns [`SpotifyCliError::Config`] when no key is configured and the
/// keyring is disabled, since a generated key could not be recovered.
pub fn resolve_or_create(storage: &StorageConfig) -> Result<EncryptionKey> {
    if let Some(key) = resolve_existing(storage) {
        return Ok(key);
    }
    if !storage.use_keyring {
        return Err(SpotifyCliError::Config(format!(
            "no encryption key configured; set {KEY_ENV_VAR} or enable the keyring"
        ))
        .into());
    }

    let (secret, key) = EncryptionKey::generate();
    match write_keyring_secret(&secret) {
        Ok(()) => tracing::info!("Generated a new encryption key and stored it in the keyring"),
        Err(e) => {
            tracing::warn!("Could not store encryption key in keyring: {}", e);
            eprintln!(
                "{} could not store the encryption key in the system keyring.",
                "warning:".yellow().bold()
            );
            eprintln!("Export it to keep access to your saved credentials:");
            eprintln!("  export {KEY_ENV_VAR}={secret}");
        }
    }
    Ok(key)
}

fn configured_secret(storage: &StorageConfig) -> Option<&str> {
    storage
        .encryption_key
        .as_deref()
        .filter(|s| !s.trim().is_empty())
}

fn read_keyring_secret() -> Result<Option<String>> {
    let entry =
        keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER).map_err(SpotifyCliError::Keyring)?;
    match entry.get_password() {
        Ok(secret) if secret.is_empty() => Ok(None),
        Ok(secret) => Ok(Some(secret)),
        Err(keyring::Error::NoEntry) => Ok(None),
        Err(e) => Err(SpotifyCliError::Keyring(e).into()),
    }
}

fn write_keyring_secret(secret: &str) -> Result<()> {
    let entry =
        keyring::Entry::new(KEYRING_SERVICE, KEYRING_USER).map_err(SpotifyCliError::Keyring)?;
    entry
        .set_password(secret)
        .map_err(SpotifyCliError::Keyring)?;
    Ok(())
}
