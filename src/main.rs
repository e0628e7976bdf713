//! spotifycli - Spotify from the terminal
//!
#![doc = "spotifycli - Spotify from the terminal"]
#![doc = "Main entry point for the spotifycli application."]

use anyhow::Result;

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use spotifycli::cli::{Cli, Commands};
use spotifycli::commands;
use spotifycli::config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let cli = Cli::parse_args();

    // Initialize tracing
    init_tracing(cli.verbose);

    // Load configuration
    let config = Config::load(cli.config.as_deref(), &cli)?;

    // Validate configuration
    config.validate()?;

    // Execute command
    match cli.command {
        Commands::Login { no_browser, .. } => {
            tracing::info!("Starting login");
            if no_browser {
                tracing::debug!("Browser launch disabled");
            }
            commands::login::run_login(config, no_browser).await?;
            Ok(())
        }
        Commands::Logout => {
            tracing::debug!("Starting logout");
            commands::logout::run_logout(&config)?;
            Ok(())
        }
        Commands::Status => {
            commands::status::run_status(&config)?;
            Ok(())
        }
        Commands::Token => {
            commands::token::run_token(&config)?;
            Ok(())
        }
    }
}

/// Initialize tracing subscriber with environment filter
///
/// `RUST_LOG` wins; otherwise `--verbose` selects debug output. Logs go to
/// stderr so `spotifycli token` output stays clean.
fn init_tracing(verbose: bool) {
    let default_level = if verbose {
        "spotifycli=debug"
    } else {
        "spotifycli=info"
    };
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}
