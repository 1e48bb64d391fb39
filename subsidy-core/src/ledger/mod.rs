//! Ledger Store
//!
//! Append-only storage for subsidies and their transactions. Balances are
//! always derived from committed transactions (and committed reversals),
//! never stored.

mod memory;

pub use memory::InMemoryLedgerStore;

use crate::error::LedgerResult;
use crate::types::{IdempotencyKey, NewSubsidy, Subsidy, Transaction};
use async_trait::async_trait;
use uuid::Uuid;

/// Transaction listing filters
#[derive(Debug, Clone, Default)]
pub struct TransactionQuery {
    pub ledger_uuid: Option<Uuid>,
    pub lms_user_id: Option<i64>,
    pub content_key: Option<String>,
}

impl TransactionQuery {
    pub fn for_ledger(ledger_uuid: Uuid) -> Self {
        Self {
            ledger_uuid: Some(ledger_uuid),
            ..Default::default()
        }
    }

    pub fn matches(&self, tx: &Transaction) -> bool {
        self.ledger_uuid.map_or(true, |l| tx.ledger_uuid == l)
            && self.lms_user_id.map_or(true, |u| tx.lms_user_id == Some(u))
            && self
                .content_key
                .as_deref()
                .map_or(true, |k| tx.content_key.as_deref() == Some(k))
    }
}

/// Subsidy and ledger persistence
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Create a subsidy with its ledger and deposit the starting balance
    async fn create_subsidy(&self, new: NewSubsidy) -> LedgerResult<Subsidy>;

    /// Deposit the starting balance. A ledger can only be initialized once.
    async fn initialize_ledger(&self, subsidy_uuid: &Uuid, starting_balance: i64) -> LedgerResult<Transaction>;

    async fn get_subsidy(&self, uuid: &Uuid) -> LedgerResult<Option<Subsidy>>;

    /// Subsidy backed by the given ledger
    async fn get_subsidy_for_ledger(&self, ledger_uuid: &Uuid) -> LedgerResult<Option<Subsidy>>;

    async fn list_subsidies(&self, enterprise_customer_uuid: Option<&Uuid>) -> LedgerResult<Vec<Subsidy>>;

    /// Sum of committed quantities on the ledger
    async fn current_balance(&self, ledger_uuid: &Uuid) -> LedgerResult<i64>;

    /// Live transaction holding `key` on the ledger, if any
    async fn find_by_idempotency_key(
        &self,
        ledger_uuid: &Uuid,
        key: &IdempotencyKey,
    ) -> LedgerResult<Option<Transaction>>;

    /// Append a committed transaction.
    ///
    /// Rejects duplicate idempotency keys, unit mismatches, non-committed
    /// states, and any quantity that would make the balance negative.
    async fn append(&self, transaction: Transaction) -> LedgerResult<Transaction>;

    async fn get_transaction(&self, uuid: &Uuid) -> LedgerResult<Option<Transaction>>;

    async fn list_transactions(&self, query: &TransactionQuery) -> LedgerResult<Vec<Transaction>>;

    /// Attach a committed reversal to a committed transaction
    async fn reverse(&self, transaction_uuid: &Uuid) -> LedgerResult<Transaction>;
}
