//! Common types shared across the ledger

use crate::error::{LedgerError, LedgerResult};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;
use uuid::Uuid;

/// Unit of value a ledger is denominated in
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Unit {
    /// US dollars, stored as integer cents
    #[default]
    UsdCents,
    /// Enrollment seats
    Seats,
    /// Japanese yen
    Jpy,
}

impl Unit {
    pub fn as_str(&self) -> &'static str {
        match self {
            Unit::UsdCents => "usd_cents",
            Unit::Seats => "seats",
            Unit::Jpy => "jpy",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "usd_cents" => Some(Unit::UsdCents),
            "seats" => Some(Unit::Seats),
            "jpy" => Some(Unit::Jpy),
            _ => None,
        }
    }

    /// Convert a catalog price into the (negative) quantity debited for one
    /// enrollment.
    ///
    /// Currency units round half away from zero. Seat ledgers always debit
    /// exactly one seat regardless of price.
    pub fn debit_for_price(&self, price: Decimal) -> LedgerResult<i64> {
        if price.is_sign_negative() && !price.is_zero() {
            return Err(LedgerError::Validation(format!(
                "Content price must not be negative, got {}",
                price
            )));
        }

        let out_of_range = || LedgerError::Validation(format!("Price {} is out of range", price));
        let amount = match self {
            Unit::UsdCents => price.checked_mul(Decimal::ONE_HUNDRED).ok_or_else(out_of_range)?,
            Unit::Jpy => price,
            Unit::Seats => return Ok(-1),
        };

        amount
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero)
            .to_i64()
            .map(|q| -q)
            .ok_or_else(out_of_range)
    }
}

impl fmt::Display for Unit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Idempotency key guarding a single logical ledger write
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct IdempotencyKey(pub String);

impl IdempotencyKey {
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key for the deposit that funds a freshly provisioned ledger
    pub fn initial_deposit(ledger_uuid: &Uuid) -> Self {
        Self(format!("{}-initial-deposit", ledger_uuid))
    }

    /// Deterministic key for an enrollment spend.
    ///
    /// Identical (subsidy, learner, content, policy) inputs always produce the
    /// same key, so a retried request finds the transaction it already created.
    pub fn for_enrollment(
        ledger_uuid: &Uuid,
        subsidy_uuid: &Uuid,
        lms_user_id: i64,
        content_key: &str,
        access_policy_uuid: &Uuid,
    ) -> Self {
        let mut hasher = Sha256::new();
        hasher.update(subsidy_uuid.as_bytes());
        hasher.update(lms_user_id.to_be_bytes());
        hasher.update(content_key.as_bytes());
        hasher.update(access_policy_uuid.as_bytes());
        Self(format!("{}-{}", ledger_uuid, hex::encode(hasher.finalize())))
    }

    /// Key for the reversal of a transaction
    pub fn for_reversal(original: &IdempotencyKey) -> Self {
        Self(format!("{}-reversal", original.0))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for IdempotencyKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
