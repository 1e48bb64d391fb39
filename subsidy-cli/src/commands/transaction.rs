//! Transaction Commands
//!
//! Commands for spending a subsidy on learner enrollments and inspecting the
//! resulting ledger transactions.

use clap::Subcommand;

/// Transaction subcommands
#[derive(Subcommand, Debug)]
pub enum TransactionCommands {
    /// Enroll a learner, paying with a subsidy
    Create {
        /// Subsidy uuid
        #[arg(short, long)]
        subsidy: String,

        /// LMS user id of the learner
        #[arg(short, long)]
        learner_id: i64,

        /// Content key to enroll in
        #[arg(short, long)]
        content_key: String,

        /// Access policy authorizing the spend
        #[arg(short = 'p', long)]
        access_policy: String,

        /// Explicit idempotency key (derived from the inputs when omitted)
        #[arg(short, long)]
        idempotency_key: Option<String>,
    },

    /// Get one transaction
    Get {
        /// Transaction uuid
        uuid: String,
    },

    /// List transactions visible to the caller
    List {
        /// Only transactions of this subsidy
        #[arg(short, long)]
        subsidy: Option<String>,

        /// Only transactions of this learner
        #[arg(short, long)]
        learner_id: Option<i64>,

        /// Only transactions for this content key
        #[arg(short, long)]
        content_key: Option<String>,

        /// Page number (0-indexed)
        #[arg(short, long, default_value = "0")]
        page: u64,

        /// Page size
        #[arg(long, default_value = "20")]
        page_size: u64,
    },

    /// Reverse a committed transaction
    Reverse {
        /// Transaction uuid
        uuid: String,
    },
}
