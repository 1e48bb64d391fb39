//! CLI Commands Module
//!
//! Command definitions for the subsidy CLI.

pub mod subsidy;
pub mod transaction;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Enterprise Subsidy CLI
#[derive(Parser, Debug)]
#[command(name = "subsidy")]
#[command(version)]
#[command(about = "Enterprise Subsidy Service Command Line Interface")]
#[command(long_about = "A command-line tool for the enterprise subsidy service.\n\n\
    Use this tool to run the API server, inspect subsidies and their balances, \
    and create or reverse learner enrollment transactions.")]
pub struct Cli {
    /// API endpoint URL
    #[arg(short, long, env = "SUBSIDY_API_URL", default_value = "http://localhost:8000")]
    pub api_url: String,

    /// Bearer token sent to the API
    #[arg(short, long, env = "SUBSIDY_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Output format (json, table, plain)
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Output format options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON output
    Json,
    /// Table format (human-readable)
    #[default]
    Table,
    /// Plain text
    Plain,
}

/// Available commands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start the subsidy API server
    Start {
        /// Host to bind to, overriding the host of SUBSIDY_LISTEN_ADDR (env: SUBSIDY_API_HOST)
        #[arg(short = 'H', long, env = "SUBSIDY_API_HOST")]
        host: Option<String>,
        /// Port to listen on, overriding the port of SUBSIDY_LISTEN_ADDR (env: SUBSIDY_API_PORT)
        #[arg(short, long, env = "SUBSIDY_API_PORT")]
        port: Option<u16>,
        /// JSON file with a list of subsidies to provision at startup
        #[arg(long, env = "SUBSIDY_SEED_FILE")]
        subsidies: Option<PathBuf>,
    },

    /// Check health of the subsidy service
    Health,

    /// Inspect subsidies
    #[command(subcommand)]
    Subsidy(subsidy::SubsidyCommands),

    /// Create, inspect and reverse transactions
    #[command(subcommand)]
    Transaction(transaction::TransactionCommands),

    /// Look up pricing metadata for a content item
    Metadata {
        /// Content key or uuid
        content: String,
        /// Enterprise customer the price is quoted for
        #[arg(short, long)]
        enterprise: String,
    },
}

impl Commands {
    /// Whether this command runs the server in-process
    pub fn is_server(&self) -> bool {
        matches!(self, Commands::Start { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parse_help() {
        let result = Cli::try_parse_from(["subsidy", "--help"]);
        assert!(result.is_err());
    }

    #[test]
    fn test_output_format_default() {
        assert_eq!(OutputFormat::default(), OutputFormat::Table);
    }

    #[test]
    fn test_parse_start() {
        let cli = Cli::try_parse_from(["subsidy", "start", "--port", "9000", "--subsidies", "seed.json"]).unwrap();
        match cli.command {
            Commands::Start { host, port, subsidies } => {
                assert_eq!(host, None);
                assert_eq!(port, Some(9000));
                assert_eq!(subsidies, Some(PathBuf::from("seed.json")));
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn test_parse_metadata() {
        let cli = Cli::try_parse_from([
            "subsidy",
            "--format",
            "json",
            "metadata",
            "course-v1:edX+DemoX",
            "--enterprise",
            "3f0c2b0e-5d4c-4a39-9a52-1f5d2c7b1a10",
        ])
        .unwrap();
        assert_eq!(cli.format, OutputFormat::Json);
        assert!(!cli.command.is_server());
        match cli.command {
            Commands::Metadata { content, enterprise } => {
                assert_eq!(content, "course-v1:edX+DemoX");
                assert_eq!(enterprise, "3f0c2b0e-5d4c-4a39-9a52-1f5d2c7b1a10");
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }
}
