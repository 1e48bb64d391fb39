//! Subsidy CLI Entry Point
//!
//! Configuration is loaded from environment variables (via .env file).
//! Command-line arguments override environment variables.
//!
//! Usage:
//!   subsidy start         - Start the subsidy API server
//!   subsidy health        - Check health of the service
//!   subsidy subsidy       - Inspect subsidies
//!   subsidy transaction   - Create, inspect and reverse transactions
//!   subsidy metadata      - Look up content pricing metadata

use clap::Parser;
use subsidy_cli::{handler, Cli};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Load .env file (ignore if not found)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    // The server always logs; client commands only when asked
    if cli.verbose || cli.command.is_server() {
        init_logging(cli.verbose);
    }

    if let Err(e) = handler::run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

/// Initialize logging with tracing
fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "subsidy_cli=debug,subsidy_api=debug,subsidy_core=debug,tower_http=debug"
    } else {
        "subsidy_cli=info,subsidy_api=info,subsidy_core=info"
    };

    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| default_filter.into()))
        .with(tracing_subscriber::fmt::layer())
        .init();
}
