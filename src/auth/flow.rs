//! Browser-based login flow
//!
//! Ties the pieces of the PKCE login together:
//!
//! 1. Start the loopback [`CallbackListener`] (before the user can be redirected).
//! 2. Create a [`PkceSession`] whose redirect URI matches the bound address.
//! 3. Build the authorization URL and hand it to an [`AuthorizationPrompt`].
//! 4. Wait for the redirect, then stop the listener on every exit path.
//! 5. Check the returned `state`; on mismatch abort without exchanging.
//! 6. Exchange the code through a [`TokenExchanger`].

use std::time::Duration;

use url::Url;

use crate::auth::authorize::{build_authorization_url_for, AUTHORIZE_URL, SCOPES};
use crate::auth::callback::{
    CallbackListener, DEFAULT_CALLBACK_PATH, DEFAULT_HANDOFF_TIMEOUT, DEFAULT_PORT,
    DEFAULT_SHUTDOWN_GRACE,
};
use crate::auth::exchange::{TokenExchanger, TokenSet};
use crate::auth::pkce::PkceSession;
use crate::config::AuthConfig;
use crate::error::{Result, SpotifyCliError};

/// How long login waits for the browser redirect by default.
pub const DEFAULT_CALLBACK_TIMEOUT: Duration = Duration::from_secs(300);

// ---------------------------------------------------------------------------
// LoginOptions
// ---------------------------------------------------------------------------

/// Parameters of a single login attempt.
#[derive(Debug, Clone)]
pub struct LoginOptions {
    /// OAuth client identifier registered with the provider.
    pub client_id: String,
    /// Local port for the redirect listener.
    pub port: u16,
    /// Path segment of the redirect URI.
    pub redirect_path: String,
    /// Authorization endpoint.
    pub authorize_url: String,
    /// How long to wait for the redirect.
    pub callback_timeout: Duration,
    /// Handler-to-flow handoff timeout.
    pub handoff_timeout: Duration,
    /// Listener shutdown grace period.
    pub shutdown_grace: Duration,
}

impl LoginOptions {
    /// Options with the defaults used by the CLI.
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client_id: client_id.into(),
            port: DEFAULT_PORT,
            redirect_path: DEFAULT_CALLBACK_PATH.to_string(),
            authorize_url: AUTHORIZE_URL.to_string(),
            callback_timeout: DEFAULT_CALLBACK_TIMEOUT,
            handoff_timeout: DEFAULT_HANDOFF_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        }
    }

    /// Options derived from the `auth` configuration section.
    pub fn from_config(client_id: impl Into<String>, auth: &AuthConfig) -> Self {
        Self {
            client_id: client_id.into(),
            port: auth.port,
            redirect_path: auth.redirect_path.clone(),
            authorize_url: auth.authorize_url.clone(),
            callback_timeout: Duration::from_secs(auth.callback_timeout_seconds),
            handoff_timeout: Duration::from_millis(auth.handoff_timeout_millis),
            shutdown_grace: Duration::from_secs(auth.shutdown_grace_seconds),
        }
    }
}

// ---------------------------------------------------------------------------
// AuthorizationPrompt
// ---------------------------------------------------------------------------

/// Sends the user to the authorization URL.
pub trait AuthorizationPrompt: Send + Sync {
    /// Called once per attempt, after the listener is bound.
    fn present(&self, url: &Url);
}

/// Prints the URL and optionally opens the system browser.
#[derive(Debug, Clone, Copy)]
pub struct BrowserPrompt {
    /// Whether to try launching a browser.
    pub open_browser: bool,
}

impl AuthorizationPrompt for BrowserPrompt {
    fn present(&self, url: &Url) {
        eprintln!("Opening browser for authentication...");
        eprintln!("If the browser doesn't open automatically, visit:\n{url}");
        if self.open_browser {
            if let Err(e) = open_browser(url.as_str()) {
                tracing::warn!("Failed to open browser: {}", e);
            }
        }
        eprintln!("Waiting for authentication...");
    }
}

/// Launches the platform's default browser on `url`.
///
/// # Errors
///
/// Returns an error when the launcher cannot be spawned or the platform is
/// unsupported.
pub fn open_browser(url: &str) -> Result<()> {
    #[cfg(target_os = "macos")]
    let mut cmd = {
        let mut c = std::process::Command::new("open");
        c.arg(url);
        c
    };
    #[cfg(target_os = "linux")]
    let mut cmd = {
        let mut c = std::process::Command::new("xdg-open");
        c.arg(url);
        c
    };
    #[cfg(target_os = "windows")]
    let mut cmd = {
        let mut c = std::process::Command::new("rundll32");
        c.arg("url.dll,FileProtocolHandler").arg(url);
        c
    };
    #[cfg(not(any(target_os = "macos", target_os = "linux", target_os = "windows")))]
    {
        let _ = url;
        return Err(anyhow::anyhow!(
            "unsupported platform: {}",
            std::env::consts::OS
        ));
    }

    #[cfg(any(target_os = "macos", target_os = "linux", target_os = "windows"))]
    {
        cmd.spawn()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// LoginFlow
// ---------------------------------------------------------------------------

/// Drives one PKCE login attempt end to end.
///
/// The flow does not persist anything; the caller folds the returned
/// [`TokenSet`] into its credentials and saves them.
///
/// # Examples
///
/// ```no_run
/// use spotifycli::auth::exchange::HttpTokenExchanger;
/// use spotifycli::auth::flow::{BrowserPrompt, LoginFlow, LoginOptions};
///
/// # async fn example() -> spotifycli::error::Result<()> {
/// let flow = LoginFlow::new(HttpTokenExchanger::new()?, LoginOptions::new("my-client-id"));
/// let tokens = flow.authorize(&BrowserPrompt { open_browser: true }).await?;
/// # let _ = tokens;
/// # Ok(())
/// # }
/// ```
pub struct LoginFlow<E> {
    exchanger: E,
    options: LoginOptions,
}

impl<E: TokenExchanger> LoginFlow<E> {
    /// Creates a flow using `exchanger` for the code exchange.
    pub fn new(exchanger: E, options: LoginOptions) -> Self {
        Self { exchanger, options }
    }

    /// The options this flow runs with.
    pub fn options(&self) -> &LoginOptions {
        &self.options
    }

    /// Runs the login and returns the freshly issued tokens.
    ///
    /// # Errors
    ///
    /// - [`SpotifyCliError::Config`] for an empty client id or bad endpoint.
    /// - [`SpotifyCliError::CallbackServer`] when the port cannot be bound.
    /// - [`SpotifyCliError::ProviderDenied`], [`SpotifyCliError::InvalidCallback`]
    ///   or [`SpotifyCliError::CallbackTimeout`] from the callback wait.
    /// - [`SpotifyCliError::StateMismatch`] when the returned state is wrong;
    ///   the exchanger is not called.
    /// - [`SpotifyCliError::TokenExchange`] from the exchanger.
    pub async fn authorize(&self, prompt: &dyn AuthorizationPrompt) -> Result<TokenSet> {
        if self.options.client_id.trim().is_empty() {
            return Err(SpotifyCliError::Config("client ID is required".to_string()).into());
        }

        let mut listener = CallbackListener::new(self.options.port, &self.options.redirect_path)
            .with_handoff_timeout(self.options.handoff_timeout)
            .with_shutdown_grace(self.options.shutdown_grace);
        listener.start().await?;

        let outcome = self.await_redirect(&mut listener, prompt).await;
        if let Err(e) = listener.stop().await {
            tracing::warn!("Failed to stop callback listener cleanly: {}", e);
        }
        let (session, code) = outcome?;

        self.exchanger.exchange_code(&session, &code).await
    }

    async fn await_redirect(
        &self,
        listener: &mut CallbackListener,
        prompt: &dyn AuthorizationPrompt,
    ) -> Result<(PkceSession, String)> {
        let session = PkceSession::new(&self.options.client_id, listener.redirect_uri()?);
        let url = build_authorization_url_for(&self.options.authorize_url, &session, SCOPES)?;

        tracing::debug!("Redirect URI: {}", session.redirect_uri());
        prompt.present(&url);

        let callback = listener
            .wait_for_callback(self.options.callback_timeout)
            .await?;

        if !session.state_matches(&callback.state) {
            tracing::error!("State mismatch in authorization callback");
            return Err(SpotifyCliError::StateMismatch.into());
        }

        Ok((session, callback.code))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
