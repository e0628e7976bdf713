//! PKCE session parameters
//!
//! A [`PkceSession`] holds everything one login attempt needs to prove
//! possession of its authorization code (RFC 7636, `S256` method):
//!
//! 1. A random `state` value round-tripped through the redirect.
//! 2. A random `code_verifier` kept on the client.
//! 3. The `code_challenge`, the base64url-encoded (no padding) SHA-256
//!    digest of the verifier, sent with the authorization request.
//!
//! # References
//!
//! - RFC 7636 <https://www.rfc-editor.org/rfc/rfc7636>

use base64::Engine as _;
use rand::Rng as _;
use sha2::{Digest, Sha256};

/// Characters allowed in `state` and `code_verifier` (RFC 3986 unreserved).
pub const UNRESERVED_CHARSET: &[u8] =
    b"ABCDEFGHIJKLMNOPQRSTUVWXYZabcdefghijklmnopqrstuvwxyz0123456789-._~";

/// Length of the generated `state` value.
pub const STATE_LENGTH: usize = 32;

/// Length of the generated `code_verifier` (the RFC 7636 maximum).
pub const CODE_VERIFIER_LENGTH: usize = 128;

/// The only challenge method this client sends.
pub const CHALLENGE_METHOD: &str = "S256";

// ---------------------------------------------------------------------------
// PkceSession
// ---------------------------------------------------------------------------

/// Per-attempt PKCE parameters.
///
/// Owned by the login flow and dropped once the code has been exchanged or
/// the attempt failed. The challenge is only ever derived from the verifier,
/// so the fields are private and exposed through accessors.
///
/// # Examples
///
/// ```
/// use spotifycli::auth::pkce::{compute_challenge, PkceSession};
///
/// let session = PkceSession::new("abc123", "http://127.0.0.1:8080/callback");
/// assert_eq!(session.code_verifier().len(), 128);
/// assert_eq!(session.code_challenge(), compute_challenge(session.code_verifier()));
/// ```
#[derive(Clone)]
pub struct PkceSession {
    client_id: String,
    redirect_uri: String,
    state: String,
    code_verifier: String,
    code_challenge: String,
}

impl PkceSession {
    /// Creates a fresh session with a new `state` and `code_verifier`.
    ///
    /// Both values are drawn from the thread-local CSPRNG.
    pub fn new(client_id: impl Into<String>, redirect_uri: impl Into<String>) -> Self {
        let state = random_unreserved(STATE_LENGTH);
        let code_verifier = random_unreserved(CODE_VERIFIER_LENGTH);
        let code_challenge = compute_challenge(&code_verifier);

        Self {
            client_id: client_id.into(),
            redirect_uri: redirect_uri.into(),
            state,
            code_verifier,
            code_challenge,
        }
    }

    /// The OAuth client identifier.
    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// The redirect URI registered for this attempt.
    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// The anti-CSRF `state` value.
    pub fn state(&self) -> &str {
        &self.state
    }

    /// The secret `code_verifier`.
    pub fn code_verifier(&self) -> &str {
        &self.code_verifier
    }

    /// The `S256` challenge derived from [`Self::code_verifier`].
    pub fn code_challenge(&self) -> &str {
        &self.code_challenge
    }

    /// Compares a returned `state` against this session's value.
    ///
    /// Runs in time independent of where the first differing byte is.
    pub fn state_matches(&self, returned: &str) -> bool {
        constant_time_eq(self.state.as_bytes(), returned.as_bytes())
    }
}

impl std::fmt::Debug for PkceSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PkceSession")
            .field("client_id", &self.client_id)
            .field("redirect_uri", &self.redirect_uri)
            .field("state", &"[REDACTED]")
            .field("code_verifier", &"[REDACTED]")
            .field("code_challenge", &self.code_challenge)
            .finish()
    }
}

// ---------------------------------------------------------------------------
// Public functions
// ---------------------------------------------------------------------------

/// Computes `base64url-no-pad(SHA-256(verifier))`.
///
/// # Examples
///
/// ```
/// use spotifycli::auth::pkce::compute_challenge;
///
/// // RFC 7636 Appendix B
/// assert_eq!(
///     compute_challenge("dBjftJeZ4CVP-mB92K27uhbUJU1p1r_wW1gFWFOEjXk"),
///     "E9Melhoa2OwvFrEMTJguCHaoeK1t8URWbuGJSstw-cM"
/// );
/// ```
pub fn compute_challenge(verifier: &str) -> String {
    let digest = Sha256::digest(verifier.as_bytes());
    base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(digest.as_slice())
}

/// Generates `len` characters drawn uniformly from [`UNRESERVED_CHARSET`].
pub fn random_unreserved(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| UNRESERVED_CHARSET[rng.random_range(0..UNRESERVED_CHARSET.len())] as char)
        .collect()
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }

    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
