//! Authorization request construction
//!
//! Builds the URL the user is sent to in order to approve the login. The
//! function is pure: no network access and no state beyond its inputs.

use url::Url;

use crate::auth::pkce::{PkceSession, CHALLENGE_METHOD};
use crate::error::{Result, SpotifyCliError};

/// Spotify authorization endpoint.
pub const AUTHORIZE_URL: &str = "https://accounts.spotify.com/authorize";

/// Spotify token endpoint.
pub const TOKEN_URL: &str = "https://accounts.spotify.com/api/token";

/// Scopes requested unconditionally at login, in request order.
pub const SCOPES: &[&str] = &[
    "user-read-playback-state",
    "user-modify-playback-state",
    "user-read-currently-playing",
    "user-library-read",
    "user-library-modify",
    "playlist-read-private",
    "playlist-modify-public",
    "playlist-modify-private",
    "user-read-email",
    "user-read-private",
    "user-read-recently-played",
    "user-top-read",
    "user-follow-read",
    "user-follow-modify",
    "streaming",
];

/// Builds the authorization URL for `session` against the default endpoint.
///
/// # Examples
///
/// ```
/// use spotifycli::auth::authorize::{build_authorization_url, SCOPES};
/// use spotifycli::auth::pkce::PkceSession;
///
/// let session = PkceSession::new("abc123", "http://127.0.0.1:8080/callback");
/// let url = build_authorization_url(&session, SCOPES).unwrap();
/// assert_eq!(url.host_str(), Some("accounts.spotify.com"));
/// assert!(url.as_str().contains("code_challenge_method=S256"));
/// ```
///
/// # Errors
///
/// Never fails in practice; see [`build_authorization_url_for`].
pub fn build_authorization_url(session: &PkceSession, scopes: &[&str]) -> Result<Url> {
    build_authorization_url_for(AUTHORIZE_URL, session, scopes)
}

/// Builds the authorization URL against a configured endpoint.
///
/// # Errors
///
/// Returns [`SpotifyCliError::Config`] when `endpoint` is not a valid URL.
pub fn build_authorization_url_for(
    endpoint: &str,
    session: &PkceSession,
    scopes: &[&str],
) -> Result<Url> {
    let endpoint = Url::parse(endpoint).map_err(|e| {
        SpotifyCliError::Config(format!("invalid authorization endpoint {endpoint}: {e}"))
    })?;
    Ok(append_authorization_params(endpoint, session, scopes))
}

fn append_authorization_params(mut url: Url, session: &PkceSession, scopes: &[&str]) -> Url {
    url.query_pairs_mut()
        .append_pair("response_type", "code")
        .append_pair("client_id", session.client_id())
        .append_pair("scope", &scopes.join(" "))
        .append_pair("redirect_uri", session.redirect_uri())
        .append_pair("state", session.state())
        .append_pair("code_challenge_method", CHALLENGE_METHOD)
        .append_pair("code_challenge", session.code_challenge());
    url
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn query_map(url: &Url) -> HashMap<String, String> {
        url.query_pairs()
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect()
    }

    #[test]
    fn test_authorization_url_contains_all_params() {
        let session = PkceSession::new("abc123", "http://127.0.0.1:8080/callback");
        let url = build_authorization_url(&session, SCOPES).unwrap();
        let params = query_map(&url);

        assert_eq!(params["response_type"], "code");
        assert_eq!(params["client_id"], "abc123");
        assert_eq!(params["redirect_uri"], "http://127.0.0.1:8080/callback");
        assert_eq!(params["state"], session.state());
        assert_eq!(params["code_challenge_method"], "S256");
        assert_eq!(params["code_challenge"], session.code_challenge());
        assert!(!params.contains_key("code_verifier"));
    }

    #[test]
    fn test_scope_is_space_joined_in_declared_order() {
        let session = PkceSession::new("abc123", "http://127.0.0.1:8080/callback");
        let url = build_authorization_url(&session, SCOPES).unwrap();
        let params = query_map(&url);

        let scope: Vec<&str> = params["scope"].split(' ').collect();
        assert_eq!(scope, SCOPES);
        assert_eq!(scope.first(), Some(&"user-read-playback-state"));
        assert_eq!(scope.last(), Some(&"streaming"));
    }

    #[test]
    fn test_parameter_order_is_stable() {
        let session = PkceSession::new("abc123", "http://127.0.0.1:8080/callback");
        let url = build_authorization_url(&session, &["streaming"]).unwrap();
        let keys: Vec<String> = url.query_pairs().map(|(k, _)| k.into_owned()).collect();
        assert_eq!(
            keys,
            [
                "response_type",
                "client_id",
                "scope",
                "redirect_uri",
                "state",
                "code_challenge_method",
                "code_challenge"
            ]
        );
    }

    #[test]
    fn test_default_endpoint() {
        let session = PkceSession::new("abc123", "http://127.0.0.1:8080/callback");
        let url = build_authorization_url(&session, SCOPES).unwrap();
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("accounts.spotify.com"));
        assert_eq!(url.path(), "/authorize");
    }

    #[test]
    fn test_custom_endpoint() {
        let session = PkceSession::new("abc123", "http://127.0.0.1:0/callback");
        let url =
            build_authorization_url_for("http://127.0.0.1:9999/authorize", &session, SCOPES)
                .unwrap();
        assert_eq!(url.port(), Some(9999));
        assert_eq!(query_map(&url)["client_id"], "abc123");
    }

    #[test]
    fn test_custom_endpoint_rejects_garbage() {
        let session = PkceSession::new("abc123", "http://127.0.0.1:0/callback");
        let err = build_authorization_url_for("not a url", &session, SCOPES).unwrap_err();
        assert!(err.to_string().contains("invalid authorization endpoint"));
    }
}
