//! Subsidy CLI - Command Line Interface
//!
//! Starts the subsidy API server and talks to a running instance.
//!
//! # Usage
//!
//! ```text
//! subsidy [OPTIONS] <COMMAND>
//!
//! Commands:
//!   start        Start the subsidy API server
//!   health       Check health of the subsidy service
//!   subsidy      Inspect subsidies
//!   transaction  Create, inspect and reverse transactions
//!   metadata     Look up content pricing metadata
//!
//! Options:
//!   -a, --api-url <URL>    API endpoint URL [default: http://localhost:8000]
//!   -t, --token <TOKEN>    Bearer token [env: SUBSIDY_TOKEN]
//!   -f, --format <FORMAT>  Output format (json, table, plain) [default: table]
//!   -v, --verbose          Enable verbose output
//! ```
//!
//! # Examples
//!
//! ## Start a server with seeded subsidies
//! ```text
//! SUBSIDY_API_TOKENS="s3cret=operator@*" subsidy start --subsidies subsidies.json
//! ```
//!
//! ## Spend a subsidy
//! ```text
//! subsidy transaction create \
//!   --subsidy 0b3c... \
//!   --learner-id 1234 \
//!   --content-key course-v1:edX+DemoX+2024 \
//!   --access-policy 6f1e...
//! ```

pub mod client;
pub mod commands;
pub mod error;
pub mod handler;
pub mod output;

pub use client::SubsidyClient;
pub use commands::{Cli, Commands, OutputFormat};
pub use error::{CliError, CliResult};

/// Subsidy CLI version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
