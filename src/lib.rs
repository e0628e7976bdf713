//! spotifycli - Spotify from the terminal
//!
//! This library provides the authentication core of the spotifycli tool:
//! the OAuth 2.0 authorization code flow with PKCE against Spotify, and
//! encrypted local persistence of the resulting tokens.
//!
//! # Architecture
//!
//! The library is organized into the following modules:
//!
//! - `auth`: PKCE session, authorization URL, loopback callback listener,
//!   code exchange, and the login flow tying them together
//! - `credentials`: credential record, AES-GCM token encryption, key
//!   resolution, and the on-disk store
//! - `config`: Configuration management and validation
//! - `error`: Error types and result aliases
//! - `cli`: Command-line interface definition
//! - `commands`: Handlers behind each CLI command
//!
//! # Example
//!
//! ```no_run
//! use spotifycli::auth::exchange::HttpTokenExchanger;
//! use spotifycli::auth::flow::{BrowserPrompt, LoginFlow, LoginOptions};
//! use spotifycli::credentials::{key, CredentialRecord, CredentialStore};
//! use spotifycli::Config;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::default();
//!     config.validate()?;
//!
//!     let options = LoginOptions::from_config("my-client-id", &config.auth);
//!     let flow = LoginFlow::new(HttpTokenExchanger::new()?, options);
//!     let tokens = flow.authorize(&BrowserPrompt { open_browser: true }).await?;
//!
//!     let store = CredentialStore::new(config.storage.resolve_credentials_path()?);
//!     let mut record = CredentialRecord::default();
//!     record.set_tokens(&tokens);
//!     store.save(&mut record, &key::resolve_or_create(&config.storage)?)?;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod cli;
pub mod commands;
pub mod config;
pub mod credentials;
pub mod error;

// Re-export commonly used types
pub use auth::exchange::{HttpTokenExchanger, TokenExchanger, TokenSet};
pub use auth::flow::{LoginFlow, LoginOptions};
pub use auth::pkce::PkceSession;
pub use config::Config;
pub use credentials::{CredentialRecord, CredentialStore, EncryptionKey};
pub use error::{Result, SpotifyCliError};

#[cfg(test)]
pub mod test_utils;
