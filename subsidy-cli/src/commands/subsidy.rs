//! Subsidy Commands

use clap::Subcommand;

/// Subsidy subcommands
#[derive(Subcommand, Debug)]
pub enum SubsidyCommands {
    /// List subsidies visible to the caller
    List {
        /// Only subsidies of this enterprise customer
        #[arg(short, long)]
        enterprise: Option<String>,

        /// Page number (0-indexed)
        #[arg(short, long, default_value = "0")]
        page: u64,

        /// Page size
        #[arg(short = 's', long, default_value = "20")]
        page_size: u64,
    },

    /// Get one subsidy with its current balance
    Get {
        /// Subsidy uuid
        uuid: String,
    },
}
