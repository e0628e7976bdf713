//! Command-line interface definition for spotifycli
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for logging in, logging out, and inspecting
//! stored credentials.

use clap::{Parser, Subcommand};

/// spotifycli - Spotify from the terminal
///
/// Authenticates against Spotify with the OAuth 2.0 authorization code
/// flow (PKCE) and keeps the resulting tokens encrypted on disk.
#[derive(Parser, Debug, Clone)]
#[command(name = "spotifycli")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to a YAML configuration file
    #[arg(short, long, global = true, env = "SPOTIFYCLI_CONFIG")]
    pub config: Option<String>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands for spotifycli
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Log in to Spotify through the browser
    Login {
        /// Spotify application client ID
        #[arg(long)]
        client_id: Option<String>,

        /// Local port for the redirect listener
        #[arg(short, long)]
        port: Option<u16>,

        /// Seconds to wait for the browser redirect
        #[arg(short, long)]
        timeout: Option<u64>,

        /// Print the authorization URL without opening a browser
        #[arg(long)]
        no_browser: bool,
    },

    /// Forget stored tokens
    Logout,

    /// Show whether stored credentials are usable
    Status,

    /// Print a valid access token
    Token,
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl Default for Cli {
    fn default() -> Self {
        Self {
            config: None,
            verbose: false,
            command: Commands::Status,
        }
    }
}
