//! Loopback callback listener
//!
//! A short-lived HTTP server bound to `127.0.0.1` that receives the
//! provider's redirect after the user approves (or denies) the login.
//!
//! The server runs on a background tokio task from [`CallbackListener::start`]
//! until [`CallbackListener::stop`]. The HTTP handler hands the first callback
//! it sees to the waiting flow through a single-slot channel; delivery is
//! attempted with a short send timeout so the browser always gets a response
//! promptly, whether or not anybody is waiting.
//!
//! ```text
//! Idle -> Listening -> (Completed | Failed | TimedOut) -> Stopped
//! ```

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::extract::{RawQuery, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;

use crate::error::{Result, SpotifyCliError};

/// Default local port for the redirect listener.
pub const DEFAULT_PORT: u16 = 8080;

/// Default path segment of the redirect URI.
pub const DEFAULT_CALLBACK_PATH: &str = "callback";

/// How long the handler waits to hand a callback to the flow.
pub const DEFAULT_HANDOFF_TIMEOUT: Duration = Duration::from_secs(1);

/// Grace period given to in-flight connections on shutdown.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);

const SUCCESS_PAGE: &str = r#"<!DOCTYPE html>
<html>
<head><title>spotifycli authorization</title></head>
<body style="font-family: system-ui; text-align: center; padding-top: 80px;">
<h1>Authorization Successful!</h1>
<p>You can now close this window and return to the terminal.</p>
</body>
</html>"#;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Lifecycle of a [`CallbackListener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListenerState {
    /// Created but not yet bound.
    Idle,
    /// Bound and serving; waiting for the redirect.
    Listening,
    /// A callback with a code and state was delivered.
    Completed,
    /// The provider denied access, the callback was malformed, or the server failed.
    Failed,
    /// No callback arrived within the wait window.
    TimedOut,
    /// The server has been shut down.
    Stopped,
}

/// Code and state extracted from a successful redirect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthorizationCallback {
    /// Authorization code to exchange at the token endpoint.
    pub code: String,
    /// State value echoed by the provider; not yet validated.
    pub state: String,
}

/// What the handler passes to the waiting flow.
#[derive(Debug)]
enum CallbackEvent {
    Authorized(AuthorizationCallback),
    Denied(String),
    MissingCode,
    ServerFailed(String),
}

#[derive(Debug, Default)]
struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

impl CallbackQuery {
    /// Lenient parse: the first occurrence of each key wins and unknown keys
    /// are ignored, so no query string is rejected before classification.
    fn parse(raw: Option<&str>) -> Self {
        let mut query = Self::default();
        for (key, value) in url::form_urlencoded::parse(raw.unwrap_or_default().as_bytes()) {
            let slot = match key.as_ref() {
                "code" => &mut query.code,
                "state" => &mut query.state,
                "error" => &mut query.error,
                _ => continue,
            };
            if slot.is_none() {
                *slot = Some(value.into_owned());
            }
        }
        query
    }
}

struct HandlerState {
    tx: mpsc::Sender<CallbackEvent>,
    claimed: AtomicBool,
    handoff_timeout: Duration,
}

// ---------------------------------------------------------------------------
// CallbackListener
// ---------------------------------------------------------------------------

/// Single-use loopback HTTP server for the OAuth redirect.
///
/// Dropping a listener that is still running signals the server to shut
/// down, so the port is released on every exit path even when
/// [`Self::stop`] was skipped.
///
/// # Examples
///
/// ```no_run
/// use std::time::Duration;
/// use spotifycli::auth::callback::CallbackListener;
///
/// # async fn example() -> spotifycli::error::Result<()> {
/// let mut listener = CallbackListener::new(8080, "callback");
/// listener.start().await?;
/// println!("redirect to {}", listener.redirect_uri()?);
/// let outcome = listener.wait_for_callback(Duration::from_secs(300)).await;
/// listener.stop().await?;
/// let callback = outcome?;
/// # let _ = callback;
/// # Ok(())
/// # }
/// ```
pub struct CallbackListener {
    port: u16,
    path: String,
    handoff_timeout: Duration,
    shutdown_grace: Duration,
    state: ListenerState,
    local_addr: Option<SocketAddr>,
    rx: Option<mpsc::Receiver<CallbackEvent>>,
    shutdown: Option<oneshot::Sender<()>>,
    server: Option<JoinHandle<()>>,
}

impl CallbackListener {
    /// Creates an idle listener for `127.0.0.1:<port>/<path>`.
    ///
    /// Port `0` lets the OS pick a free port, which is useful in tests.
    pub fn new(port: u16, path: &str) -> Self {
        Self {
            port,
            path: path.trim_matches('/').to_string(),
            handoff_timeout: DEFAULT_HANDOFF_TIMEOUT,
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
            state: ListenerState::Idle,
            local_addr: None,
            rx: None,
            shutdown: None,
            server: None,
        }
    }

    /// Overrides the handler-to-flow handoff timeout.
    pub fn with_handoff_timeout(mut self, timeout: Duration) -> Self {
        self.handoff_timeout = timeout;
        self
    }

    /// Overrides the shutdown grace period.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ListenerState {
        self.state
    }

    /// Address the server is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr
    }

    /// The redirect URI matching the bound address and callback path.
    ///
    /// # Errors
    ///
    /// Returns [`SpotifyCliError::CallbackServer`] before [`Self::start`].
    pub fn redirect_uri(&self) -> Result<String> {
        let addr = self.local_addr.ok_or_else(|| {
            SpotifyCliError::CallbackServer("listener has not been started".to_string())
        })?;
        Ok(format!("http://127.0.0.1:{}/{}", addr.port(), self.path))
    }

    /// Binds the socket and starts serving in the background.
    ///
    /// Returns as soon as the socket is bound; it does not wait for a request.
    ///
    /// # Errors
    ///
    /// Returns [`SpotifyCliError::CallbackServer`] when the listener was
    /// already started or the port cannot be bound.
    pub async fn start(&mut self) -> Result<()> {
        if self.state != ListenerState::Idle {
            return Err(SpotifyCliError::CallbackServer(format!(
                "listener cannot start from state {:?}",
                self.state
            ))
            .into());
        }

        // Spotify rejects `localhost` redirect URIs, so bind the literal address.
        let bind_addr = format!("127.0.0.1:{}", self.port);
        let tcp = tokio::net::TcpListener::bind(&bind_addr)
            .await
            .map_err(|e| {
                SpotifyCliError::CallbackServer(format!(
                    "failed to bind {bind_addr}: {e}. Make sure no other process is using this port."
                ))
            })?;
        let local_addr = tcp.local_addr().map_err(|e| {
            SpotifyCliError::CallbackServer(format!("failed to read local address: {e}"))
        })?;

        let (tx, rx) = mpsc::channel(1);
        let failure_tx = tx.clone();
        let router = callback_router(&self.path, tx, self.handoff_timeout);
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let server = tokio::spawn(async move {
            let serve = axum::serve(tcp, router).with_graceful_shutdown(async move {
                let _ = shutdown_rx.await;
            });
            if let Err(e) = serve.await {
                tracing::error!("Callback server failed: {}", e);
                let _ = failure_tx.try_send(CallbackEvent::ServerFailed(e.to_string()));
            }
        });

        tracing::debug!("Callback listener bound on {}", local_addr);
        self.local_addr = Some(local_addr);
        self.rx = Some(rx);
        self.shutdown = Some(shutdown_tx);
        self.server = Some(server);
        self.state = ListenerState::Listening;
        Ok(())
    }

    /// Waits for the first callback, a server failure, or `timeout`.
    ///
    /// The timeout only bounds this wait; the server keeps running until
    /// [`Self::stop`] is called.
    ///
    /// # Errors
    ///
    /// - [`SpotifyCliError::ProviderDenied`] when the redirect carried `error`.
    /// - [`SpotifyCliError::InvalidCallback`] when it carried no `code`.
    /// - [`SpotifyCliError::CallbackServer`] when serving failed or the
    ///   listener is not listening.
    /// - [`SpotifyCliError::CallbackTimeout`] when nothing arrived in time.
    pub async fn wait_for_callback(&mut self, timeout: Duration) -> Result<AuthorizationCallback> {
        if self.state != ListenerState::Listening {
            return Err(SpotifyCliError::CallbackServer(format!(
                "cannot wait for a callback in state {:?}",
                self.state
            ))
            .into());
        }
        let rx = self.rx.as_mut().ok_or_else(|| {
            SpotifyCliError::CallbackServer("callback channel missing".to_string())
        })?;

        let received = tokio::time::timeout(timeout, rx.recv()).await;
        let event = match received {
            Ok(Some(event)) => event,
            Ok(None) => {
                self.state = ListenerState::Failed;
                return Err(SpotifyCliError::CallbackServer(
                    "callback channel closed unexpectedly".to_string(),
                )
                .into());
            }
            Err(_) => {
                tracing::warn!("No authorization callback within {:?}", timeout);
                self.state = ListenerState::TimedOut;
                return Err(SpotifyCliError::CallbackTimeout(timeout).into());
            }
        };

        match event {
            CallbackEvent::Authorized(callback) => {
                self.state = ListenerState::Completed;
                Ok(callback)
            }
            CallbackEvent::Denied(error) => {
                self.state = ListenerState::Failed;
                Err(SpotifyCliError::ProviderDenied(error).into())
            }
            CallbackEvent::MissingCode => {
                self.state = ListenerState::Failed;
                Err(SpotifyCliError::InvalidCallback(
                    "no authorization code received".to_string(),
                )
                .into())
            }
            CallbackEvent::ServerFailed(reason) => {
                self.state = ListenerState::Failed;
                Err(SpotifyCliError::CallbackServer(reason).into())
            }
        }
    }

    /// Shuts the server down, waiting at most the grace period.
    ///
    /// Calling `stop` on a listener that never started, or a second time,
    /// is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`SpotifyCliError::CallbackServer`] when the server task
    /// panicked.
    pub async fn stop(&mut self) -> Result<()> {
        let Some(shutdown) = self.shutdown.take() else {
            if self.state != ListenerState::Idle {
                self.state = ListenerState::Stopped;
            }
            return Ok(());
        };
        let _ = shutdown.send(());
        self.rx = None;
        self.state = ListenerState::Stopped;

        if let Some(mut server) = self.server.take() {
            match tokio::time::timeout(self.shutdown_grace, &mut server).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) if e.is_cancelled() => {}
                Ok(Err(e)) => {
                    return Err(SpotifyCliError::CallbackServer(format!(
                        "callback server task failed: {e}"
                    ))
                    .into());
                }
                Err(_) => {
                    tracing::warn!(
                        "Callback server did not stop within {:?}; aborting",
                        self.shutdown_grace
                    );
                    server.abort();
                }
            }
        }

        tracing::debug!("Callback listener stopped");
        Ok(())
    }
}

impl Drop for CallbackListener {
    fn drop(&mut self) {
        if let Some(shutdown) = self.shutdown.take() {
            let _ = shutdown.send(());
        }
    }
}

// ---------------------------------------------------------------------------
// Router and handler
// ---------------------------------------------------------------------------

fn callback_router(path: &str, tx: mpsc::Sender<CallbackEvent>, handoff_timeout: Duration) -> Router {
    let state = Arc::new(HandlerState {
        tx,
        claimed: AtomicBool::new(false),
        handoff_timeout,
    });
    Router::new()
        .route(&format!("/{path}"), get(handle_callback))
        .with_state(state)
}

async fn handle_callback(
    State(state): State<Arc<HandlerState>>,
    RawQuery(raw): RawQuery,
) -> Response {
    let (event, response) = classify(CallbackQuery::parse(raw.as_deref()));

    // Only the first request reaches the flow; later ones still get a page.
    if !state.claimed.swap(true, Ordering::SeqCst) {
        if let Err(e) = state.tx.send_timeout(event, state.handoff_timeout).await {
            tracing::warn!("Dropped authorization callback: {}", e);
        }
    } else {
        tracing::debug!("Ignoring repeated authorization callback");
    }

    response
}

fn classify(query: CallbackQuery) -> (CallbackEvent, Response) {
    if let Some(error) = query.error.filter(|e| !e.is_empty()) {
        let response = plain_bad_request(format!("OAuth error: {error}"));
        return (CallbackEvent::Denied(error), response);
    }

    match query.code.filter(|c| !c.is_empty()) {
        Some(code) => {
            let callback = AuthorizationCallback {
                code,
                state: query.state.unwrap_or_default(),
            };
            (
                CallbackEvent::Authorized(callback),
                Html(SUCCESS_PAGE).into_response(),
            )
        }
        None => (
            CallbackEvent::MissingCode,
            plain_bad_request("No authorization code received".to_string()),
        ),
    }
}

fn plain_bad_request(body: String) -> Response {
    (
        StatusCode::BAD_REQUEST,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        body,
    )
        .into_response()
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
