/*!
Command handlers for the CLI

This module provides command handlers invoked by the CLI entrypoint.

It exposes four command modules:

- `login`  - Browser login with PKCE, storing encrypted tokens
- `logout` - Forget stored tokens
- `status` - Report whether stored credentials are usable
- `token`  - Print a valid access token or explain why there is none

Handlers print user-facing lines; library failures propagate as errors.
*/

use crate::config::Config;
use crate::credentials::key::resolve_existing;
use crate::credentials::{CredentialRecord, CredentialStore};
use crate::error::{Result, SpotifyCliError};
use colored::Colorize;

/// Opens the configured credential store and loads its record
///
/// Tokens that cannot be decrypted stay as ciphertext (see
/// [`CredentialStore::load`]).
fn open_store(config: &Config) -> Result<(CredentialStore, CredentialRecord)> {
    let store = CredentialStore::new(config.storage.resolve_credentials_path()?);
    let key = resolve_existing(&config.storage);
    let record = store.load(key.as_ref())?;
    Ok((store, record))
}

// Login command handler
pub mod login {
    //! Browser login.
    //!
    //! Short-circuits when the stored tokens are still valid; otherwise runs
    //! the PKCE flow, folds the new tokens into the record, and saves it.

    use super::*;
    use crate::auth::exchange::{HttpTokenExchanger, TokenExchanger};
    use crate::auth::flow::{AuthorizationPrompt, BrowserPrompt, LoginFlow, LoginOptions};
    use crate::credentials::key::resolve_or_create;
    use std::io::{BufRead, Write};
    use std::time::Duration;

    /// Run the `login` command
    ///
    /// # Arguments
    ///
    /// * `config` - Global configuration (CLI and env overrides applied)
    /// * `no_browser` - Only print the authorization URL
    pub async fn run_login(config: Config, no_browser: bool) -> Result<()> {
        let (store, mut record) = open_store(&config)?;

        if record.is_authenticated() && !record.is_expired() {
            println!(
                "{} Already authenticated (token valid until {}).",
                "✓".green(),
                format_timestamp(record.token_expiry)
            );
            println!("Run `spotifycli logout` first to log in again.");
            return Ok(());
        }

        let client_id = resolve_client_id(&config, &record, &mut std::io::stdin().lock())?;
        let exchanger = HttpTokenExchanger::with_endpoint(
            config.auth.token_url.clone(),
            Duration::from_secs(config.auth.http_timeout_seconds),
        )?;
        let prompt = BrowserPrompt {
            open_browser: !no_browser,
        };

        login_with(&config, &store, &mut record, client_id, exchanger, &prompt).await?;

        println!("{} Successfully authenticated with Spotify.", "✓".green());
        println!("Credentials saved to {}", store.path().display());
        Ok(())
    }

    /// Runs the flow with the given exchanger and prompt, then saves
    ///
    /// Nothing is written unless the exchange succeeds.
    ///
    /// # Errors
    ///
    /// Any error from [`LoginFlow::authorize`], key resolution, or
    /// [`CredentialStore::save`].
    pub async fn login_with<E: TokenExchanger>(
        config: &Config,
        store: &CredentialStore,
        record: &mut CredentialRecord,
        client_id: String,
        exchanger: E,
        prompt: &dyn AuthorizationPrompt,
    ) -> Result<()> {
        let options = LoginOptions::from_config(client_id.clone(), &config.auth);
        let tokens = LoginFlow::new(exchanger, options).authorize(prompt).await?;

        record.client_id = client_id;
        record.port = config.auth.port;
        record.redirect_path = config.auth.redirect_path.clone();
        record.set_tokens(&tokens);

        let key = resolve_or_create(&config.storage)?;
        store.save(record, &key)?;
        tracing::info!("Login complete; credentials saved");
        Ok(())
    }

    /// Picks the client ID: config (flag or env) first, then the stored
    /// record, then a prompt on `input`
    ///
    /// # Errors
    ///
    /// Returns [`SpotifyCliError::Config`] when the prompt yields nothing.
    pub fn resolve_client_id(
        config: &Config,
        record: &CredentialRecord,
        input: &mut dyn BufRead,
    ) -> Result<String> {
        if let Some(id) = config.auth.client_id.as_deref().map(str::trim) {
            if !id.is_empty() {
                return Ok(id.to_string());
            }
        }
        if !record.client_id.trim().is_empty() {
            return Ok(record.client_id.trim().to_string());
        }

        eprint!("Enter your Spotify Client ID: ");
        std::io::stderr().flush()?;
        let mut line = String::new();
        input.read_line(&mut line)?;
        let id = line.trim();
        if id.is_empty() {
            return Err(SpotifyCliError::Config("client ID is required".to_string()).into());
        }
        Ok(id.to_string())
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[test]
        fn test_client_id_from_config_wins() {
            let mut config = Config::default();
            config.auth.client_id = Some("from-config".to_string());
            let record = CredentialRecord {
                client_id: "from-record".to_string(),
                ..Default::default()
            };
            let id = resolve_client_id(&config, &record, &mut "typed\n".as_bytes()).unwrap();
            assert_eq!(id, "from-config");
        }

        #[test]
        fn test_client_id_falls_back_to_record() {
            let record = CredentialRecord {
                client_id: "from-record".to_string(),
                ..Default::default()
            };
            let id =
                resolve_client_id(&Config::default(), &record, &mut "typed\n".as_bytes()).unwrap();
            assert_eq!(id, "from-record");
        }

        #[test]
        fn test_client_id_prompted_last() {
            let id = resolve_client_id(
                &Config::default(),
                &CredentialRecord::default(),
                &mut "  typed-id  \n".as_bytes(),
            )
            .unwrap();
            assert_eq!(id, "typed-id");
        }

        #[test]
        fn test_empty_prompt_is_rejected() {
            let result = resolve_client_id(
                &Config::default(),
                &CredentialRecord::default(),
                &mut "\n".as_bytes(),
            );
            crate::test_utils::assert_error_contains(result, "client ID is required");
        }
    }
}

// Logout command handler
pub mod logout {
    //! Clears the stored tokens, keeping client ID and listener settings.

    use super::*;
    use crate::credentials::EncryptionKey;

    /// Run the `logout` command
    pub fn run_logout(config: &Config) -> Result<()> {
        let (store, mut record) = open_store(config)?;
        if !store.exists() {
            println!("No stored credentials at {}", store.path().display());
            return Ok(());
        }

        record.clear_tokens();
        // With the tokens cleared there is nothing to seal, so any key will do.
        let key = resolve_existing(&config.storage).unwrap_or_else(|| EncryptionKey::generate().1);
        store.save(&mut record, &key)?;

        println!("{} Logged out.", "✓".green());
        Ok(())
    }
}

// Status command handler
pub mod status {
    //! Reports authentication state without printing secrets.

    use super::*;

    /// Run the `status` command
    pub fn run_status(config: &Config) -> Result<()> {
        let (store, record) = open_store(config)?;

        println!("Credentials: {}", store.path().display());
        if !record.client_id.is_empty() {
            println!("Client ID:   {}", record.client_id);
        }

        if record.undecryptable {
            println!("Status:      {}", "unreadable".red());
            println!("Stored tokens cannot be decrypted with the current encryption key.");
            println!("Run `spotifycli login` to authenticate again.");
            return Ok(());
        }

        if !record.is_authenticated() {
            println!("Status:      {}", "not authenticated".red());
            println!("Run `spotifycli login` to authenticate.");
            return Ok(());
        }

        if record.is_expired() {
            println!("Status:      {}", "expired".yellow());
        } else {
            println!("Status:      {}", "authenticated".green());
        }
        println!("Expires:     {}", format_timestamp(record.token_expiry));
        println!("Last saved:  {}", format_timestamp(record.last_saved));
        Ok(())
    }
}

// Token command handler
pub mod token {
    //! Prints a usable access token to stdout.

    use super::*;

    /// Run the `token` command
    ///
    /// # Errors
    ///
    /// Returns [`SpotifyCliError::NotAuthenticated`],
    /// [`SpotifyCliError::TokenExpired`], or [`SpotifyCliError::Decryption`].
    pub fn run_token(config: &Config) -> Result<()> {
        let (_store, record) = open_store(config)?;
        let token = record.require_access_token()?;
        println!("{}", token);
        Ok(())
    }
}

fn format_timestamp(unix: i64) -> String {
    if unix == 0 {
        return "never".to_string();
    }
    match chrono::DateTime::from_timestamp(unix, 0) {
        Some(ts) => ts
            .with_timezone(&chrono::Local)
            .format("%Y-%m-%d %H:%M:%S %Z")
            .to_string(),
        None => unix.to_string(),
    }
}
