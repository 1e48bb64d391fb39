//! Subsidy Core - Ledger-backed Enterprise Subsidies
//!
//! Domain layer of the subsidy service. A subsidy is a funded allowance owned
//! by an enterprise customer; every spend against it is recorded as a signed
//! transaction on an append-only ledger.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Subsidy Core                           │
//! │                                                               │
//! │  ┌──────────────────────┐      ┌───────────────────────────┐  │
//! │  │  TransactionWorkflow │      │  ContentMetadataService   │  │
//! │  │  key → price → debit │      │  cache → catalog fetch    │  │
//! │  │  → enroll → commit   │      │                           │  │
//! │  └──────────┬───────────┘      └─────────────┬─────────────┘  │
//! │             │                                │                │
//! │     ┌───────┴────────┬────────────────┐      │                │
//! │     ▼                ▼                ▼      ▼                │
//! │  LedgerStore    PricingClient   EnrollmentClient  CatalogClient│
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! Authorization lives in [`authz`]: principals hold role grants scoped to
//! enterprise customers, and every HTTP operation checks one [`Capability`].
//!
//! # Ledger Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | Non-negative balance | checked before enrollment and again at append |
//! | Unique idempotency key | per-ledger index of live transactions |
//! | Forward-only state | `created → committed` or `created → failed` |
//! | Reversal sign | reversal quantity is the negation of the original |

pub mod authz;
pub mod clients;
pub mod error;
pub mod ledger;
pub mod metadata;
pub mod types;
pub mod workflow;

pub use authz::{Authorization, Capability, GrantParseError, Principal, Role, RoleGrant, Scope};
pub use clients::{
    CatalogClient, CatalogContent, CatalogPricing, EnrollmentClient, EnrollmentRequest,
    Entitlement, PricingClient, ProductSource,
};
pub use error::{
    CatalogError, EnrollmentError, LedgerError, LedgerResult, MetadataError, WorkflowError,
    WorkflowResult,
};
pub use ledger::{InMemoryLedgerStore, LedgerStore, TransactionQuery};
pub use metadata::{ContentMetadataService, MetadataCache, MetadataLookup};
pub use types::*;
pub use workflow::{CreateOutcome, CreateTransactionCommand, SubsidyLocks, TransactionWorkflow};
