//! Transaction Creation Workflow
//!
//! Idempotent spend of a subsidy on a learner enrollment:
//!
//! 1. Derive the idempotency key and return any live transaction holding it
//! 2. Price the content and compute the debit for the ledger's unit
//! 3. Check the balance covers the debit
//! 4. Enroll the learner, passing the pending transaction uuid
//! 5. Commit the transaction with the fulfillment reference and append it
//!
//! Steps 1 through 5 run under a per-subsidy lock so two concurrent requests
//! cannot both pass the balance check. Reversals take the same lock, so a
//! credit cannot be withdrawn while an enrollment is in flight.

use crate::clients::{EnrollmentClient, EnrollmentRequest, PricingClient};
use crate::error::{CatalogError, LedgerError, WorkflowError, WorkflowResult};
use crate::ledger::LedgerStore;
use crate::types::{IdempotencyKey, Transaction, ENROLLMENT_REFERENCE_TYPE};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::str::FromStr;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

// ============================================
// Per-Subsidy Locks
// ============================================

/// Async mutex per subsidy, created on first use
#[derive(Debug, Default)]
pub struct SubsidyLocks {
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SubsidyLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to a subsidy's ledger
    pub async fn lock(&self, subsidy_uuid: Uuid) -> OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks.entry(subsidy_uuid).or_default().clone()
        };
        lock.lock_owned().await
    }
}

// ============================================
// Commands and Outcomes
// ============================================

/// Request to spend a subsidy on one learner enrollment
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateTransactionCommand {
    pub subsidy_uuid: Uuid,
    pub lms_user_id: i64,
    pub content_key: String,
    pub access_policy_uuid: Uuid,
    /// Caller-supplied key; derived from the other fields when absent
    pub idempotency_key: Option<IdempotencyKey>,
}

impl CreateTransactionCommand {
    pub fn new(subsidy_uuid: Uuid, lms_user_id: i64, content_key: impl Into<String>, access_policy_uuid: Uuid) -> Self {
        Self {
            subsidy_uuid,
            lms_user_id,
            content_key: content_key.into(),
            access_policy_uuid,
            idempotency_key: None,
        }
    }

    pub fn with_idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(IdempotencyKey::new(key));
        self
    }

    /// Explicit key if non-empty, otherwise the deterministic enrollment key
    pub fn resolve_key(&self, ledger_uuid: &Uuid) -> IdempotencyKey {
        match &self.idempotency_key {
            Some(key) if !key.is_empty() => key.clone(),
            _ => IdempotencyKey::for_enrollment(
                ledger_uuid,
                &self.subsidy_uuid,
                self.lms_user_id,
                &self.content_key,
                &self.access_policy_uuid,
            ),
        }
    }
}

/// Result of a create request
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    /// A new transaction was committed
    Created(Transaction),
    /// A live transaction already held the idempotency key
    Existing(Transaction),
}

impl CreateOutcome {
    pub fn is_new(&self) -> bool {
        matches!(self, CreateOutcome::Created(_))
    }

    pub fn transaction(&self) -> &Transaction {
        match self {
            CreateOutcome::Created(tx) | CreateOutcome::Existing(tx) => tx,
        }
    }

    pub fn into_transaction(self) -> Transaction {
        match self {
            CreateOutcome::Created(tx) | CreateOutcome::Existing(tx) => tx,
        }
    }
}

// ============================================
// Workflow
// ============================================

/// Orchestrates pricing, enrollment and ledger recording
#[derive(Clone)]
pub struct TransactionWorkflow {
    ledger: Arc<dyn LedgerStore>,
    pricing: Arc<dyn PricingClient>,
    enrollment: Arc<dyn EnrollmentClient>,
    locks: Arc<SubsidyLocks>,
}

impl TransactionWorkflow {
    pub fn new(
        ledger: Arc<dyn LedgerStore>,
        pricing: Arc<dyn PricingClient>,
        enrollment: Arc<dyn EnrollmentClient>,
    ) -> Self {
        Self {
            ledger,
            pricing,
            enrollment,
            locks: Arc::new(SubsidyLocks::new()),
        }
    }

    pub fn ledger(&self) -> &Arc<dyn LedgerStore> {
        &self.ledger
    }

    /// Run the workflow on its own task.
    ///
    /// Dropping the returned future (e.g. a disconnected HTTP client) does not
    /// cancel the work: once enrollment starts, the commit still happens.
    pub async fn create(&self, command: CreateTransactionCommand) -> WorkflowResult<CreateOutcome> {
        let workflow = self.clone();
        tokio::spawn(async move { workflow.run(command).await })
            .await
            .map_err(|e| WorkflowError::Aborted(e.to_string()))?
    }

    /// Run the workflow on the current task
    pub async fn run(&self, command: CreateTransactionCommand) -> WorkflowResult<CreateOutcome> {
        let subsidy = self
            .ledger
            .get_subsidy(&command.subsidy_uuid)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Subsidy {}", command.subsidy_uuid)))?;

        let _guard = self.locks.lock(subsidy.uuid).await;

        let key = command.resolve_key(&subsidy.ledger_uuid);
        if let Some(existing) = self.ledger.find_by_idempotency_key(&subsidy.ledger_uuid, &key).await? {
            tracing::info!(
                subsidy_uuid = %subsidy.uuid,
                transaction_uuid = %existing.uuid,
                idempotency_key = %key,
                "Returning existing transaction for idempotency key"
            );
            return Ok(CreateOutcome::Existing(existing));
        }

        let price = self
            .pricing
            .get_course_price(&subsidy.enterprise_customer_uuid, &command.content_key)
            .await?;
        let price = Decimal::from_str(price.trim())
            .map_err(|e| CatalogError::Decode(format!("invalid price {:?}: {}", price, e)))?;
        let quantity = subsidy.unit.debit_for_price(price)?;

        let balance = self.ledger.current_balance(&subsidy.ledger_uuid).await?;
        if balance + quantity < 0 {
            return Err(LedgerError::InsufficientBalance { balance, quantity }.into());
        }

        let mut transaction = Transaction::pending(subsidy.ledger_uuid, subsidy.unit, key, quantity).for_learner(
            command.lms_user_id,
            command.content_key.clone(),
            command.access_policy_uuid,
        );

        let request = EnrollmentRequest {
            enterprise_customer_uuid: subsidy.enterprise_customer_uuid,
            lms_user_id: command.lms_user_id,
            content_key: command.content_key.clone(),
            transaction_uuid: transaction.uuid,
        };

        let reference_id = match self.enrollment.enroll(&request).await {
            Ok(reference_id) => reference_id,
            Err(e) => {
                transaction.fail()?;
                tracing::warn!(
                    subsidy_uuid = %subsidy.uuid,
                    transaction_uuid = %transaction.uuid,
                    idempotency_key = %transaction.idempotency_key,
                    error = %e,
                    "Enrollment failed, transaction not recorded"
                );
                return Err(e.into());
            }
        };

        transaction.commit(Some(reference_id), Some(ENROLLMENT_REFERENCE_TYPE.to_string()))?;
        let recorded = self.ledger.append(transaction).await?;

        tracing::info!(
            subsidy_uuid = %subsidy.uuid,
            transaction_uuid = %recorded.uuid,
            idempotency_key = %recorded.idempotency_key,
            quantity = recorded.quantity,
            "Transaction committed"
        );

        Ok(CreateOutcome::Created(recorded))
    }

    /// Reverse a committed transaction under its subsidy's lock
    pub async fn reverse(&self, transaction_uuid: &Uuid) -> WorkflowResult<Transaction> {
        let transaction = self
            .ledger
            .get_transaction(transaction_uuid)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Transaction {}", transaction_uuid)))?;
        let subsidy = self
            .ledger
            .get_subsidy_for_ledger(&transaction.ledger_uuid)
            .await?
            .ok_or_else(|| LedgerError::NotFound(format!("Subsidy for ledger {}", transaction.ledger_uuid)))?;

        let _guard = self.locks.lock(subsidy.uuid).await;
        Ok(self.ledger.reverse(transaction_uuid).await?)
    }
}
