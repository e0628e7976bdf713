//! Encrypted credential file
//!
//! The record lives in a single JSON file (default `~/.config/spotifycli.json`).
//! Token fields are encrypted with [`super::crypto`]; everything else is
//! stored in the clear. The file is written with mode `0600` and a missing
//! parent directory is created with mode `0700`.

use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::credentials::crypto::{decrypt_token, encrypt_token, EncryptionKey};
use crate::credentials::record::CredentialRecord;
use crate::error::{Result, SpotifyCliError};

/// File name of the credential file inside the config directory.
pub const CREDENTIALS_FILE_NAME: &str = "spotifycli.json";

/// Returns `~/.config/spotifycli.json`.
///
/// # Errors
///
/// Returns [`SpotifyCliError::Persistence`] when the home directory cannot
/// be determined.
pub fn default_credentials_path() -> Result<PathBuf> {
    let dirs = directories::BaseDirs::new().ok_or_else(|| {
        SpotifyCliError::Persistence("could not determine the home directory".to_string())
    })?;
    Ok(dirs.home_dir().join(".config").join(CREDENTIALS_FILE_NAME))
}

/// Reads and writes the credential file.
///
/// The key is passed to each call rather than held by the store, so the
/// caller decides where it comes from.
///
/// # Examples
///
/// ```no_run
/// use spotifycli::credentials::{CredentialStore, EncryptionKey};
///
/// # fn example() -> spotifycli::error::Result<()> {
/// let store = CredentialStore::new(CredentialStore::default_path()?);
/// let key = EncryptionKey::from_secret("secret");
/// let mut record = store.load(Some(&key))?;
/// record.clear_tokens();
/// store.save(&mut record, &key)?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Creates a store for the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// See [`default_credentials_path`].
    ///
    /// # Errors
    ///
    /// Returns [`SpotifyCliError::Persistence`] when the home directory
    /// cannot be determined.
    pub fn default_path() -> Result<PathBuf> {
        default_credentials_path()
    }

    /// Location of the credential file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the credential file exists.
    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Loads the record, decrypting the token fields with `key`.
    ///
    /// A missing file yields [`CredentialRecord::default`]. A token that
    /// cannot be decrypted (or a missing key) is logged and left as
    /// ciphertext, and the record is marked
    /// [`undecryptable`](CredentialRecord::undecryptable) so it never counts
    /// as a login.
    ///
    /// # Errors
    ///
    /// Returns [`SpotifyCliError::Persistence`] when the file cannot be
    /// read or is not valid JSON.
    pub fn load(&self, key: Option<&EncryptionKey>) -> Result<CredentialRecord> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No credential file at {}", self.path.display());
                return Ok(CredentialRecord::default());
            }
            Err(e) => {
                return Err(SpotifyCliError::Persistence(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                ))
                .into())
            }
        };

        let mut record: CredentialRecord = serde_json::from_str(&contents).map_err(|e| {
            SpotifyCliError::Persistence(format!("failed to parse {}: {e}", self.path.display()))
        })?;

        let access_ok = decrypt_in_place(&mut record.access_token, "access_token", key);
        let refresh_ok = decrypt_in_place(&mut record.refresh_token, "refresh_token", key);
        record.undecryptable = !(access_ok && refresh_ok);

        Ok(record)
    }

    /// Encrypts the tokens with `key`, stamps `last_saved`, and writes the file.
    ///
    /// `record` keeps its plaintext tokens; only `last_saved` changes.
    ///
    /// # Errors
    ///
    /// - [`SpotifyCliError::Encryption`] if a token cannot be sealed.
    /// - [`SpotifyCliError::Persistence`] on filesystem errors.
    pub fn save(&self, record: &mut CredentialRecord, key: &EncryptionKey) -> Result<()> {
        let mut on_disk = record.clone();
        // Undecryptable token fields already hold ciphertext.
        if !on_disk.undecryptable {
            if !on_disk.access_token.is_empty() {
                on_disk.access_token = encrypt_token(&on_disk.access_token, key)?;
            }
            if !on_disk.refresh_token.is_empty() {
                on_disk.refresh_token = encrypt_token(&on_disk.refresh_token, key)?;
            }
        }

        let now = Utc::now().timestamp();
        on_disk.last_saved = now;
        let json = serde_json::to_string_pretty(&on_disk)?;

        if let Some(dir) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            create_private_dir(dir).map_err(|e| {
                SpotifyCliError::Persistence(format!(
                    "failed to create {}: {e}",
                    dir.display()
                ))
            })?;
        }

        write_private_file(&self.path, json.as_bytes()).map_err(|e| {
            SpotifyCliError::Persistence(format!("failed to write {}: {e}", self.path.display()))
        })?;

        record.last_saved = now;
        tracing::debug!("Saved credentials to {}", self.path.display());
        Ok(())
    }
}

/// Returns `false` when a non-empty field stays encrypted.
fn decrypt_in_place(field: &mut String, name: &str, key: Option<&EncryptionKey>) -> bool {
    if field.is_empty() {
        return true;
    }
    let Some(key) = key else {
        tracing::warn!("No encryption key available; {} left encrypted", name);
        return false;
    };
    match decrypt_token(field, key) {
        Ok(plain) => {
            *field = plain;
            true
        }
        Err(e) => {
            tracing::warn!("Could not decrypt stored {}: {}", name, e);
            false
        }
    }
}

#[cfg(unix)]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    use std::os::unix::fs::DirBuilderExt;

    std::fs::DirBuilder::new()
        .recursive(true)
        .mode(0o700)
        .create(dir)
}

#[cfg(not(unix))]
fn create_private_dir(dir: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dir)
}

#[cfg(unix)]
fn write_private_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut file = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies on creation; tighten files that already existed.
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    file.write_all(contents)?;
    file.sync_all()
}

#[cfg(not(unix))]
fn write_private_file(path: &Path, contents: &[u8]) -> std::io::Result<()> {
    std::fs::write(path, contents)
}
