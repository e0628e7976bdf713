//! Spotify OAuth 2.0 authorization code flow with PKCE
//!
//! # Module Layout
//!
//! - [`pkce`]      -- session state, code verifier and `S256` challenge
//! - [`authorize`] -- authorization URL construction and scope list
//! - [`callback`]  -- loopback HTTP listener receiving the redirect
//! - [`exchange`]  -- authorization code to token exchange
//! - [`flow`]      -- end-to-end login orchestration

pub mod authorize;
pub mod callback;
pub mod exchange;
pub mod flow;
pub mod pkce;
