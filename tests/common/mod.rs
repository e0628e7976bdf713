//! Shared helpers for integration tests

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use tempfile::TempDir;
use url::Url;

use spotifycli::auth::exchange::{TokenExchanger, TokenSet};
use spotifycli::auth::flow::AuthorizationPrompt;
use spotifycli::auth::pkce::PkceSession;
use spotifycli::config::Config;
use spotifycli::error::Result;

#[allow(dead_code)]
pub const TEST_KEY_SECRET: &str = "integration-secret";

/// Config whose credential file lives in a fresh temp dir, with a fixed key,
/// no keyring, an OS-assigned listener port, and a short callback wait.
#[allow(dead_code)]
pub fn isolated_config() -> (TempDir, Config) {
    let dir = TempDir::new().expect("failed to create tempdir");
    let mut config = Config::default();
    config.storage.credentials_path = Some(
        credentials_path(&dir)
            .to_str()
            .expect("utf-8 temp path")
            .to_string(),
    );
    config.storage.encryption_key = Some(TEST_KEY_SECRET.to_string());
    config.storage.use_keyring = false;
    config.auth.port = 0;
    config.auth.callback_timeout_seconds = 5;
    config.auth.shutdown_grace_seconds = 1;
    (dir, config)
}

#[allow(dead_code)]
pub fn credentials_path(dir: &TempDir) -> PathBuf {
    dir.path().join("spotifycli.json")
}

/// Returns a minimal Spotify token response JSON body.
#[allow(dead_code)]
pub fn token_response_body() -> serde_json::Value {
    serde_json::json!({
        "access_token": "AT1",
        "token_type": "Bearer",
        "expires_in": 3600,
        "refresh_token": "RT1",
        "scope": "user-read-private"
    })
}

/// Decodes an `application/x-www-form-urlencoded` body.
#[allow(dead_code)]
pub fn form_params(body: &[u8]) -> HashMap<String, String> {
    url::form_urlencoded::parse(body).into_owned().collect()
}

// ---------------------------------------------------------------------------
// SpyExchanger
// ---------------------------------------------------------------------------

/// [`TokenExchanger`] that records its calls and returns `AT1` / `RT1`.
#[derive(Clone, Default)]
#[allow(dead_code)]
pub struct SpyExchanger {
    calls: Arc<AtomicUsize>,
    codes: Arc<Mutex<Vec<String>>>,
    verifiers: Arc<Mutex<Vec<String>>>,
}

#[allow(dead_code)]
impl SpyExchanger {
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn codes(&self) -> Vec<String> {
        self.codes.lock().unwrap().clone()
    }

    pub fn verifiers(&self) -> Vec<String> {
        self.verifiers.lock().unwrap().clone()
    }
}

#[async_trait]
impl TokenExchanger for SpyExchanger {
    async fn exchange_code(&self, session: &PkceSession, code: &str) -> Result<TokenSet> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.codes.lock().unwrap().push(code.to_string());
        self.verifiers
            .lock()
            .unwrap()
            .push(session.code_verifier().to_string());
        Ok(TokenSet {
            access_token: "AT1".to_string(),
            refresh_token: "RT1".to_string(),
            token_type: "Bearer".to_string(),
            issued_at: Utc::now(),
            expires_in: 3600,
        })
    }
}

// ---------------------------------------------------------------------------
// RedirectPrompt
// ---------------------------------------------------------------------------

/// [`AuthorizationPrompt`] standing in for the browser.
///
/// On `present` it reads `state` and `redirect_uri` from the authorization
/// URL and fires a GET at the redirect URI with the query built by
/// `reply(state)`. Returning `None` simulates a user who never answers.
#[allow(dead_code)]
pub struct RedirectPrompt {
    reply: Box<dyn Fn(&str) -> Option<String> + Send + Sync>,
    presented: Mutex<Vec<Url>>,
}

#[allow(dead_code)]
impl RedirectPrompt {
    pub fn new(reply: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
        Self {
            reply: Box::new(reply),
            presented: Mutex::new(Vec::new()),
        }
    }

    /// Echoes the session state back with `code`.
    pub fn approving(code: &'static str) -> Self {
        Self::new(move |state| Some(format!("code={code}&state={state}")))
    }

    pub fn presented(&self) -> Vec<Url> {
        self.presented.lock().unwrap().clone()
    }
}

impl AuthorizationPrompt for RedirectPrompt {
    fn present(&self, url: &Url) {
        self.presented.lock().unwrap().push(url.clone());
        let params: HashMap<String, String> = url.query_pairs().into_owned().collect();
        let state = params.get("state").cloned().unwrap_or_default();
        let redirect_uri = params.get("redirect_uri").cloned().unwrap_or_default();

        if let Some(query) = (self.reply)(&state) {
            let target = format!("{redirect_uri}?{query}");
            tokio::spawn(async move {
                let _ = reqwest::get(target).await;
            });
        }
    }
}
