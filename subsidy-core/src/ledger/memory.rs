//! In-memory ledger store
//!
//! Every mutation runs under a single write lock, so balance checks and
//! inserts are atomic with respect to each other.

use super::{LedgerStore, TransactionQuery};
use crate::error::{LedgerError, LedgerResult};
use crate::types::{IdempotencyKey, NewSubsidy, Reversal, Subsidy, Transaction, TransactionState, Unit};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Debug)]
struct LedgerRecord {
    unit: Unit,
    initialized: bool,
    transactions: Vec<Uuid>,
}

#[derive(Debug, Default)]
struct Inner {
    subsidies: HashMap<Uuid, Subsidy>,
    subsidy_order: Vec<Uuid>,
    ledgers: HashMap<Uuid, LedgerRecord>,
    transactions: HashMap<Uuid, Transaction>,
    transaction_order: Vec<Uuid>,
    /// (ledger, idempotency key) -> live transaction
    live_keys: HashMap<(Uuid, String), Uuid>,
}

impl Inner {
    fn balance(&self, ledger_uuid: &Uuid) -> LedgerResult<i64> {
        let ledger = self
            .ledgers
            .get(ledger_uuid)
            .ok_or_else(|| LedgerError::NotFound(format!("Ledger {}", ledger_uuid)))?;

        Ok(ledger
            .transactions
            .iter()
            .filter_map(|id| self.transactions.get(id))
            .map(Transaction::balance_effect)
            .sum())
    }

    fn check_sufficient(&self, ledger_uuid: &Uuid, quantity: i64) -> LedgerResult<()> {
        let balance = self.balance(ledger_uuid)?;
        if quantity < 0 && balance + quantity < 0 {
            return Err(LedgerError::InsufficientBalance { balance, quantity });
        }
        Ok(())
    }

    fn insert(&mut self, transaction: Transaction) -> LedgerResult<Transaction> {
        let key = (transaction.ledger_uuid, transaction.idempotency_key.0.clone());
        if self.live_keys.contains_key(&key) {
            return Err(LedgerError::DuplicateIdempotencyKey(key.1));
        }

        let ledger = self
            .ledgers
            .get_mut(&transaction.ledger_uuid)
            .ok_or_else(|| LedgerError::NotFound(format!("Ledger {}", transaction.ledger_uuid)))?;

        ledger.transactions.push(transaction.uuid);
        if transaction.is_live() {
            self.live_keys.insert(key, transaction.uuid);
        }
        self.transaction_order.push(transaction.uuid);
        self.transactions.insert(transaction.uuid, transaction.clone());
        Ok(transaction)
    }
}

/// Ledger store backed by process memory
#[derive(Debug, Default)]
pub struct InMemoryLedgerStore {
    inner: RwLock<Inner>,
}

impl InMemoryLedgerStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of transactions recorded across all ledgers
    pub async fn transaction_count(&self) -> usize {
        self.inner.read().await.transactions.len()
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedgerStore {
    async fn create_subsidy(&self, new: NewSubsidy) -> LedgerResult<Subsidy> {
        let subsidy = Subsidy {
            uuid: new.uuid.unwrap_or_else(Uuid::new_v4),
            title: new.title,
            enterprise_customer_uuid: new.enterprise_customer_uuid,
            active_datetime: new.active_datetime,
            expiration_datetime: new.expiration_datetime,
            unit: new.unit,
            reference_id: new.reference_id,
            reference_type: new.reference_type,
            ledger_uuid: Uuid::new_v4(),
        };

        if new.starting_balance < 0 {
            return Err(LedgerError::Validation(format!(
                "starting_balance must not be negative, got {}",
                new.starting_balance
            )));
        }
        if subsidy.expiration_datetime <= subsidy.active_datetime {
            return Err(LedgerError::Validation(
                "expiration_datetime must be after active_datetime".to_string(),
            ));
        }

        {
            let mut inner = self.inner.write().await;
            if inner.subsidies.contains_key(&subsidy.uuid) {
                return Err(LedgerError::AlreadyExists(format!("Subsidy {}", subsidy.uuid)));
            }
            inner.ledgers.insert(
                subsidy.ledger_uuid,
                LedgerRecord {
                    unit: subsidy.unit,
                    initialized: false,
                    transactions: Vec::new(),
                },
            );
            inner.subsidy_order.push(subsidy.uuid);
            inner.subsidies.insert(subsidy.uuid, subsidy.clone());
        }

        self.initialize_ledger(&subsidy.uuid, new.starting_balance).await?;

        tracing::info!(
            subsidy_uuid = %subsidy.uuid,
            ledger_uuid = %subsidy.ledger_uuid,
            enterprise_customer_uuid = %subsidy.enterprise_customer_uuid,
            starting_balance = new.starting_balance,
            "Subsidy provisioned"
        );

        Ok(subsidy)
    }

    async fn initialize_ledger(&self, subsidy_uuid: &Uuid, starting_balance: i64) -> LedgerResult<Transaction> {
        if starting_balance < 0 {
            return Err(LedgerError::Validation(format!(
                "starting_balance must not be negative, got {}",
                starting_balance
            )));
        }

        let mut inner = self.inner.write().await;
        let subsidy = inner
            .subsidies
            .get(subsidy_uuid)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("Subsidy {}", subsidy_uuid)))?;

        let ledger = inner
            .ledgers
            .get_mut(&subsidy.ledger_uuid)
            .ok_or_else(|| LedgerError::NotFound(format!("Ledger {}", subsidy.ledger_uuid)))?;
        if ledger.initialized {
            return Err(LedgerError::AlreadyExists(format!(
                "Ledger {} is already initialized",
                subsidy.ledger_uuid
            )));
        }
        ledger.initialized = true;

        let mut deposit = Transaction::pending(
            subsidy.ledger_uuid,
            subsidy.unit,
            IdempotencyKey::initial_deposit(&subsidy.ledger_uuid),
            starting_balance,
        );
        deposit.commit(None, None)?;
        inner.insert(deposit)
    }

    async fn get_subsidy(&self, uuid: &Uuid) -> LedgerResult<Option<Subsidy>> {
        Ok(self.inner.read().await.subsidies.get(uuid).cloned())
    }

    async fn get_subsidy_for_ledger(&self, ledger_uuid: &Uuid) -> LedgerResult<Option<Subsidy>> {
        let inner = self.inner.read().await;
        Ok(inner
            .subsidies
            .values()
            .find(|s| s.ledger_uuid == *ledger_uuid)
            .cloned())
    }

    async fn list_subsidies(&self, enterprise_customer_uuid: Option<&Uuid>) -> LedgerResult<Vec<Subsidy>> {
        let inner = self.inner.read().await;
        Ok(inner
            .subsidy_order
            .iter()
            .filter_map(|id| inner.subsidies.get(id))
            .filter(|s| enterprise_customer_uuid.map_or(true, |e| s.enterprise_customer_uuid == *e))
            .cloned()
            .collect())
    }

    async fn current_balance(&self, ledger_uuid: &Uuid) -> LedgerResult<i64> {
        self.inner.read().await.balance(ledger_uuid)
    }

    async fn find_by_idempotency_key(
        &self,
        ledger_uuid: &Uuid,
        key: &IdempotencyKey,
    ) -> LedgerResult<Option<Transaction>> {
        let inner = self.inner.read().await;
        Ok(inner
            .live_keys
            .get(&(*ledger_uuid, key.0.clone()))
            .and_then(|id| inner.transactions.get(id))
            .cloned())
    }

    async fn append(&self, transaction: Transaction) -> LedgerResult<Transaction> {
        if transaction.state != TransactionState::Committed {
            return Err(LedgerError::Validation(format!(
                "Only committed transactions can be appended, got {}",
                transaction.state
            )));
        }
        if transaction.idempotency_key.is_empty() {
            return Err(LedgerError::Validation("idempotency_key must not be empty".to_string()));
        }

        let mut inner = self.inner.write().await;
        let unit = inner
            .ledgers
            .get(&transaction.ledger_uuid)
            .map(|l| l.unit)
            .ok_or_else(|| LedgerError::NotFound(format!("Ledger {}", transaction.ledger_uuid)))?;
        if unit != transaction.unit {
            return Err(LedgerError::UnitMismatch {
                expected: unit,
                actual: transaction.unit,
            });
        }

        inner.check_sufficient(&transaction.ledger_uuid, transaction.quantity)?;
        let recorded = inner.insert(transaction)?;

        tracing::debug!(
            transaction_uuid = %recorded.uuid,
            ledger_uuid = %recorded.ledger_uuid,
            quantity = recorded.quantity,
            "Transaction appended"
        );

        Ok(recorded)
    }

    async fn get_transaction(&self, uuid: &Uuid) -> LedgerResult<Option<Transaction>> {
        Ok(self.inner.read().await.transactions.get(uuid).cloned())
    }

    async fn list_transactions(&self, query: &TransactionQuery) -> LedgerResult<Vec<Transaction>> {
        let inner = self.inner.read().await;
        Ok(inner
            .transaction_order
            .iter()
            .filter_map(|id| inner.transactions.get(id))
            .filter(|tx| query.matches(tx))
            .cloned()
            .collect())
    }

    async fn reverse(&self, transaction_uuid: &Uuid) -> LedgerResult<Transaction> {
        let mut inner = self.inner.write().await;
        let original = inner
            .transactions
            .get(transaction_uuid)
            .cloned()
            .ok_or_else(|| LedgerError::NotFound(format!("Transaction {}", transaction_uuid)))?;

        if original.state != TransactionState::Committed {
            return Err(LedgerError::Validation(format!(
                "Only committed transactions can be reversed, got {}",
                original.state
            )));
        }
        if original.reversal.is_some() {
            return Err(LedgerError::AlreadyExists(format!(
                "Reversal for transaction {}",
                transaction_uuid
            )));
        }

        let reversal = Reversal::of(&original);
        inner.check_sufficient(&original.ledger_uuid, reversal.quantity)?;

        let tx = inner
            .transactions
            .get_mut(transaction_uuid)
            .ok_or_else(|| LedgerError::NotFound(format!("Transaction {}", transaction_uuid)))?;
        tx.reversal = Some(reversal);
        tx.modified = Utc::now();

        tracing::info!(
            transaction_uuid = %tx.uuid,
            quantity = tx.quantity,
            "Transaction reversed"
        );

        Ok(tx.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ENROLLMENT_REFERENCE_TYPE;

    async fn store_with_subsidy(starting_balance: i64) -> (InMemoryLedgerStore, Subsidy) {
        let store = InMemoryLedgerStore::new();
        let subsidy = store
            .create_subsidy(NewSubsidy::new("Test subsidy", Uuid::new_v4(), starting_balance))
            .await
            .unwrap();
        (store, subsidy)
    }

    fn spend(subsidy: &Subsidy, key: &str, quantity: i64) -> Transaction {
        let mut tx = Transaction::pending(subsidy.ledger_uuid, subsidy.unit, IdempotencyKey::new(key), quantity)
            .for_learner(1234, "course-v1:edX+test", Uuid::new_v4());
        tx.commit(Some("ref".to_string()), Some(ENROLLMENT_REFERENCE_TYPE.to_string()))
            .unwrap();
        tx
    }

    #[tokio::test]
    async fn test_create_subsidy_initializes_ledger() {
        let (store, subsidy) = store_with_subsidy(10000).await;
        assert_eq!(store.current_balance(&subsidy.ledger_uuid).await.unwrap(), 10000);

        let txs = store
            .list_transactions(&TransactionQuery::for_ledger(subsidy.ledger_uuid))
            .await
            .unwrap();
        assert_eq!(txs.len(), 1);
        assert_eq!(txs[0].idempotency_key, IdempotencyKey::initial_deposit(&subsidy.ledger_uuid));
        assert_eq!(txs[0].state, TransactionState::Committed);
    }

    #[tokio::test]
    async fn test_initialize_twice_rejected() {
        let (store, subsidy) = store_with_subsidy(100).await;
        let err = store.initialize_ledger(&subsidy.uuid, 100).await.unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyExists(_)));
        assert_eq!(store.current_balance(&subsidy.ledger_uuid).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_append_debits_balance() {
        let (store, subsidy) = store_with_subsidy(10000).await;
        store.append(spend(&subsidy, "a", -2500)).await.unwrap();
        assert_eq!(store.current_balance(&subsidy.ledger_uuid).await.unwrap(), 7500);
    }

    #[tokio::test]
    async fn test_append_rejects_overdraft() {
        let (store, subsidy) = store_with_subsidy(100).await;
        let err = store.append(spend(&subsidy, "a", -101)).await.unwrap_err();
        assert_eq!(
            err,
            LedgerError::InsufficientBalance {
                balance: 100,
                quantity: -101
            }
        );
        assert_eq!(store.current_balance(&subsidy.ledger_uuid).await.unwrap(), 100);
    }

    #[tokio::test]
    async fn test_append_rejects_duplicate_key() {
        let (store, subsidy) = store_with_subsidy(10000).await;
        store.append(spend(&subsidy, "same", -10)).await.unwrap();
        let err = store.append(spend(&subsidy, "same", -10)).await.unwrap_err();
        assert_eq!(err, LedgerError::DuplicateIdempotencyKey("same".to_string()));
        assert_eq!(store.current_balance(&subsidy.ledger_uuid).await.unwrap(), 9990);
    }

    #[tokio::test]
    async fn test_append_rejects_uncommitted_and_wrong_unit() {
        let (store, subsidy) = store_with_subsidy(10000).await;

        let pending = Transaction::pending(subsidy.ledger_uuid, subsidy.unit, IdempotencyKey::new("p"), -1);
        assert!(matches!(store.append(pending).await, Err(LedgerError::Validation(_))));

        let mut seats = Transaction::pending(subsidy.ledger_uuid, Unit::Seats, IdempotencyKey::new("s"), -1);
        seats.commit(None, None).unwrap();
        assert_eq!(
            store.append(seats).await.unwrap_err(),
            LedgerError::UnitMismatch {
                expected: Unit::UsdCents,
                actual: Unit::Seats
            }
        );
    }

    #[tokio::test]
    async fn test_find_by_idempotency_key() {
        let (store, subsidy) = store_with_subsidy(10000).await;
        let recorded = store.append(spend(&subsidy, "k1", -10)).await.unwrap();

        let found = store
            .find_by_idempotency_key(&subsidy.ledger_uuid, &IdempotencyKey::new("k1"))
            .await
            .unwrap();
        assert_eq!(found.map(|t| t.uuid), Some(recorded.uuid));

        let missing = store
            .find_by_idempotency_key(&subsidy.ledger_uuid, &IdempotencyKey::new("k2"))
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_reverse_restores_balance_once() {
        let (store, subsidy) = store_with_subsidy(10000).await;
        let recorded = store.append(spend(&subsidy, "r", -4000)).await.unwrap();
        assert_eq!(store.current_balance(&subsidy.ledger_uuid).await.unwrap(), 6000);

        let reversed = store.reverse(&recorded.uuid).await.unwrap();
        let reversal = reversed.reversal.as_ref().unwrap();
        assert_eq!(reversal.quantity, 4000);
        assert_eq!(reversal.transaction_uuid, recorded.uuid);
        assert_eq!(store.current_balance(&subsidy.ledger_uuid).await.unwrap(), 10000);

        let err = store.reverse(&recorded.uuid).await.unwrap_err();
        assert!(matches!(err, LedgerError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn test_reversing_deposit_cannot_overdraw() {
        let (store, subsidy) = store_with_subsidy(1000).await;
        store.append(spend(&subsidy, "x", -600)).await.unwrap();
        let deposit = store
            .find_by_idempotency_key(&subsidy.ledger_uuid, &IdempotencyKey::initial_deposit(&subsidy.ledger_uuid))
            .await
            .unwrap()
            .unwrap();

        let err = store.reverse(&deposit.uuid).await.unwrap_err();
        assert!(matches!(err, LedgerError::InsufficientBalance { .. }));
    }

    #[tokio::test]
    async fn test_list_filters() {
        let store = InMemoryLedgerStore::new();
        let enterprise = Uuid::new_v4();
        let a = store
            .create_subsidy(NewSubsidy::new("A", enterprise, 1000))
            .await
            .unwrap();
        store
            .create_subsidy(NewSubsidy::new("B", Uuid::new_v4(), 1000))
            .await
            .unwrap();

        let mine = store.list_subsidies(Some(&enterprise)).await.unwrap();
        assert_eq!(mine.len(), 1);
        assert_eq!(mine[0].uuid, a.uuid);
        assert_eq!(store.list_subsidies(None).await.unwrap().len(), 2);

        store.append(spend(&a, "l1", -10)).await.unwrap();
        let query = TransactionQuery {
            ledger_uuid: Some(a.ledger_uuid),
            lms_user_id: Some(1234),
            content_key: None,
        };
        assert_eq!(store.list_transactions(&query).await.unwrap().len(), 1);
        assert_eq!(store.transaction_count().await, 3);

        let owner = store.get_subsidy_for_ledger(&a.ledger_uuid).await.unwrap();
        assert_eq!(owner.map(|s| s.uuid), Some(a.uuid));
        assert!(store.get_subsidy_for_ledger(&Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unknown_ledger() {
        let store = InMemoryLedgerStore::new();
        let err = store.current_balance(&Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, LedgerError::NotFound(_)));
    }
}
