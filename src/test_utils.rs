//! Test utilities for spotifycli
//!
//! This module provides common test utilities including temporary directory
//! management, isolated configurations, token fixtures, and assertion helpers.

use crate::auth::exchange::TokenSet;
use crate::config::Config;
use chrono::{DateTime, Utc};
use std::path::PathBuf;
use tempfile::TempDir;

/// Key secret used by [`test_config`].
pub const TEST_KEY_SECRET: &str = "test-secret";

/// Create a temporary directory for testing
///
/// # Returns
///
/// Returns a TempDir that will be cleaned up when dropped
pub fn temp_dir() -> TempDir {
    TempDir::new().expect("Failed to create temporary directory")
}

/// Path of the credential file inside `dir`
pub fn credentials_path(dir: &TempDir) -> PathBuf {
    dir.path().join("spotifycli.json")
}

/// Create a configuration isolated to `dir`
///
/// The credential file lives in `dir`, the key comes from
/// [`TEST_KEY_SECRET`], and the OS keyring is never touched.
pub fn test_config(dir: &TempDir) -> Config {
    let mut config = Config::default();
    config.storage.credentials_path = Some(credentials_path(dir).to_string_lossy().into_owned());
    config.storage.encryption_key = Some(TEST_KEY_SECRET.to_string());
    config.storage.use_keyring = false;
    config
}

/// Token fixture `AT1` / `RT1`, valid for an hour from `issued_at`
pub fn test_tokens(issued_at: DateTime<Utc>) -> TokenSet {
    TokenSet {
        access_token: "AT1".to_string(),
        refresh_token: "RT1".to_string(),
        token_type: "Bearer".to_string(),
        issued_at,
        expires_in: 3600,
    }
}

/// Assert that an error contains the expected message
///
/// # Panics
///
/// Panics if the result is Ok or if the error doesn't contain the expected message
pub fn assert_error_contains<T>(result: crate::error::Result<T>, expected: &str) {
    match result {
        Ok(_) => panic!("Expected error containing '{}' but got Ok", expected),
        Err(e) => {
            let error_msg = e.to_string();
            assert!(
                error_msg.contains(expected),
                "Error message '{}' does not contain '{}'",
                error_msg,
                expected
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SpotifyCliError;

    #[test]
    fn test_temp_dir_creation() {
        let dir = temp_dir();
        assert!(dir.path().exists());
    }

    #[test]
    fn test_test_config_is_isolated() {
        let dir = temp_dir();
        let config = test_config(&dir);
        assert!(!config.storage.use_keyring);
        assert_eq!(
            config.storage.resolve_credentials_path().unwrap(),
            credentials_path(&dir)
        );
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_assert_error_contains_success() {
        let result: crate::error::Result<()> =
            Err(SpotifyCliError::Config("test error message".to_string()).into());
        assert_error_contains(result, "test error");
    }

    #[test]
    #[should_panic(expected = "Expected error containing")]
    fn test_assert_error_contains_ok() {
        assert_error_contains(Ok(()), "error");
    }

    #[test]
    #[should_panic(expected = "does not contain")]
    fn test_assert_error_contains_wrong_message() {
        let result: crate::error::Result<()> =
            Err(SpotifyCliError::Config("different error".to_string()).into());
        assert_error_contains(result, "not present");
    }
}
