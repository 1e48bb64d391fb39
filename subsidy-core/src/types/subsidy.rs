//! Subsidy Types

use super::common::Unit;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A funded allowance owned by an enterprise customer
///
/// The balance is never stored here; it is derived from the ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subsidy {
    pub uuid: Uuid,
    pub title: String,
    pub enterprise_customer_uuid: Uuid,
    pub active_datetime: DateTime<Utc>,
    pub expiration_datetime: DateTime<Utc>,
    pub unit: Unit,
    pub reference_id: Option<String>,
    pub reference_type: Option<String>,
    /// Ledger backing this subsidy
    pub ledger_uuid: Uuid,
}

/// Provisioning request for a subsidy and its ledger
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct NewSubsidy {
    pub title: String,
    pub enterprise_customer_uuid: Uuid,
    #[serde(default = "Utc::now")]
    pub active_datetime: DateTime<Utc>,
    #[serde(default = "default_expiration")]
    pub expiration_datetime: DateTime<Utc>,
    #[serde(default)]
    pub unit: Unit,
    #[serde(default)]
    pub reference_id: Option<String>,
    #[serde(default)]
    pub reference_type: Option<String>,
    /// Quantity deposited when the ledger is initialized
    #[serde(default)]
    pub starting_balance: i64,
    /// Fixed identifier (generated when absent)
    #[serde(default)]
    pub uuid: Option<Uuid>,
}

fn default_expiration() -> DateTime<Utc> {
    Utc::now() + Duration::days(365)
}

impl NewSubsidy {
    pub fn new(title: impl Into<String>, enterprise_customer_uuid: Uuid, starting_balance: i64) -> Self {
        Self {
            title: title.into(),
            enterprise_customer_uuid,
            active_datetime: Utc::now(),
            expiration_datetime: default_expiration(),
            unit: Unit::default(),
            reference_id: None,
            reference_type: None,
            starting_balance,
            uuid: None,
        }
    }

    pub fn with_unit(mut self, unit: Unit) -> Self {
        self.unit = unit;
        self
    }

    pub fn with_reference(mut self, reference_id: impl Into<String>, reference_type: impl Into<String>) -> Self {
        self.reference_id = Some(reference_id.into());
        self.reference_type = Some(reference_type.into());
        self
    }

    pub fn with_uuid(mut self, uuid: Uuid) -> Self {
        self.uuid = Some(uuid);
        self
    }
}
