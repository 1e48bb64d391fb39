//! Subsidy Core Types
//!
//! Core type definitions for subsidies, ledger transactions, and content
//! metadata.

pub mod common;
pub mod content;
pub mod subsidy;
pub mod transaction;

pub use common::{IdempotencyKey, Unit};
pub use content::{ContentMetadata, DEFAULT_CONTENT_SOURCE};
pub use subsidy::{NewSubsidy, Subsidy};
pub use transaction::{Reversal, Transaction, TransactionState, ENROLLMENT_REFERENCE_TYPE};
