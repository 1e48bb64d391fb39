//! Ledger Transactions
//!
//! A transaction is a single signed quantity recorded against a ledger.
//! Its state only moves forward:
//!
//! ```text
//! created ──► committed
//!    │
//!    └──────► failed
//! ```

use super::common::{IdempotencyKey, Unit};
use crate::error::{LedgerError, LedgerResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Reference type tagging transactions created by an enrollment
pub const ENROLLMENT_REFERENCE_TYPE: &str = "enterprise_fulfillment_source_uuid";

/// Transaction lifecycle state
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionState {
    Created,
    Committed,
    Failed,
}

impl TransactionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionState::Created => "created",
            TransactionState::Committed => "committed",
            TransactionState::Failed => "failed",
        }
    }

    pub fn can_transition_to(&self, next: TransactionState) -> bool {
        matches!(
            (self, next),
            (TransactionState::Created, TransactionState::Committed)
                | (TransactionState::Created, TransactionState::Failed)
        )
    }
}

impl fmt::Display for TransactionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Compensating entry undoing a committed transaction
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reversal {
    pub uuid: Uuid,
    pub transaction_uuid: Uuid,
    pub idempotency_key: IdempotencyKey,
    /// Always the negation of the reversed transaction's quantity
    pub quantity: i64,
    pub state: TransactionState,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Reversal {
    /// Build a committed reversal of `original`
    pub fn of(original: &Transaction) -> Self {
        let now = Utc::now();
        Self {
            uuid: Uuid::new_v4(),
            transaction_uuid: original.uuid,
            idempotency_key: IdempotencyKey::for_reversal(&original.idempotency_key),
            quantity: -original.quantity,
            state: TransactionState::Committed,
            metadata: serde_json::Map::new(),
            created: now,
            modified: now,
        }
    }
}

/// Ledger transaction
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub uuid: Uuid,
    pub idempotency_key: IdempotencyKey,
    pub ledger_uuid: Uuid,
    pub lms_user_id: Option<i64>,
    pub content_key: Option<String>,
    pub subsidy_access_policy_uuid: Option<Uuid>,
    pub unit: Unit,
    pub quantity: i64,
    pub state: TransactionState,
    pub reference_id: Option<String>,
    pub reference_type: Option<String>,
    pub reversal: Option<Reversal>,
    pub metadata: serde_json::Map<String, serde_json::Value>,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl Transaction {
    /// Create a transaction in the `created` state
    pub fn pending(ledger_uuid: Uuid, unit: Unit, idempotency_key: IdempotencyKey, quantity: i64) -> Self {
        let now = Utc::now();
        Self {
            uuid: Uuid::new_v4(),
            idempotency_key,
            ledger_uuid,
            lms_user_id: None,
            content_key: None,
            subsidy_access_policy_uuid: None,
            unit,
            quantity,
            state: TransactionState::Created,
            reference_id: None,
            reference_type: None,
            reversal: None,
            metadata: serde_json::Map::new(),
            created: now,
            modified: now,
        }
    }

    /// Attach the learner, content, and access policy this spend is for
    pub fn for_learner(mut self, lms_user_id: i64, content_key: impl Into<String>, access_policy_uuid: Uuid) -> Self {
        self.lms_user_id = Some(lms_user_id);
        self.content_key = Some(content_key.into());
        self.subsidy_access_policy_uuid = Some(access_policy_uuid);
        self
    }

    fn transition(&mut self, next: TransactionState) -> LedgerResult<()> {
        if !self.state.can_transition_to(next) {
            return Err(LedgerError::InvalidStateTransition {
                from: self.state.to_string(),
                to: next.to_string(),
            });
        }
        self.state = next;
        self.modified = Utc::now();
        Ok(())
    }

    /// Commit, recording the external action that caused this transaction
    pub fn commit(&mut self, reference_id: Option<String>, reference_type: Option<String>) -> LedgerResult<()> {
        self.transition(TransactionState::Committed)?;
        self.reference_id = reference_id;
        self.reference_type = reference_type;
        Ok(())
    }

    pub fn fail(&mut self) -> LedgerResult<()> {
        self.transition(TransactionState::Failed)
    }

    /// Live transactions hold their idempotency key; failed ones release it
    pub fn is_live(&self) -> bool {
        self.state != TransactionState::Failed
    }

    /// Contribution of this transaction (and its reversal) to the balance
    pub fn balance_effect(&self) -> i64 {
        if self.state != TransactionState::Committed {
            return 0;
        }
        let reversed = self
            .reversal
            .as_ref()
            .filter(|r| r.state == TransactionState::Committed)
            .map(|r| r.quantity)
            .unwrap_or(0);
        self.quantity + reversed
    }
}
