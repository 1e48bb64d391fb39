//! Data Transfer Objects
//!
//! Request and response types for the subsidy API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use subsidy_core::{CreateTransactionCommand, Reversal, Subsidy, Transaction, Unit};
use uuid::Uuid;

use crate::error::{ApiError, ApiResult};

/// Timestamp format used in subsidy bodies
pub const SERIALIZED_DATE_FORMAT: &str = "%Y-%m-%dT%H:%M:%SZ";

fn format_date(dt: &DateTime<Utc>) -> String {
    dt.format(SERIALIZED_DATE_FORMAT).to_string()
}

// ============================================
// Transaction DTOs
// ============================================

/// Create transaction request body
///
/// Every field is optional at the serde layer so absent fields can be
/// reported per field instead of as a body rejection.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CreateTransactionRequest {
    #[serde(default)]
    pub subsidy_uuid: Option<String>,
    /// Integer or numeric string
    #[serde(default)]
    pub learner_id: Option<serde_json::Value>,
    #[serde(default)]
    pub content_key: Option<String>,
    #[serde(default)]
    pub access_policy_uuid: Option<String>,
    #[serde(default)]
    pub idempotency_key: Option<String>,
}

impl CreateTransactionRequest {
    /// Parsed subsidy identifier, if present and well formed
    pub fn subsidy_uuid(&self) -> Option<Uuid> {
        self.subsidy_uuid
            .as_deref()
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
    }

    /// Validate the remaining fields into a workflow command
    pub fn into_command(self, subsidy_uuid: Uuid) -> ApiResult<CreateTransactionCommand> {
        let learner_id = self.learner_id.filter(|v| !v.is_null());
        let content_key = non_blank(self.content_key);
        let access_policy_uuid = non_blank(self.access_policy_uuid);

        let (learner_id, content_key, access_policy_uuid) = match (learner_id, content_key, access_policy_uuid) {
            (Some(l), Some(c), Some(p)) => (l, c, p),
            (l, c, p) => {
                let missing = [
                    ("learner_id", l.is_none()),
                    ("content_key", c.is_none()),
                    ("access_policy_uuid", p.is_none()),
                ]
                .into_iter()
                    .filter_map(|(field, absent)| absent.then_some(field));
                return Err(ApiError::missing_fields(missing));
            }
        };

        let lms_user_id = match &learner_id {
            serde_json::Value::Number(n) => n.as_i64(),
            serde_json::Value::String(s) => s.trim().parse::<i64>().ok(),
            _ => None,
        }
        .ok_or_else(|| ApiError::field("learner_id", "A valid integer is required."))?;

        let access_policy_uuid = Uuid::parse_str(&access_policy_uuid).map_err(|_| {
            ApiError::validation(format!("{} is not a valid access_policy_uuid", access_policy_uuid))
        })?;

        let mut command = CreateTransactionCommand::new(subsidy_uuid, lms_user_id, content_key, access_policy_uuid);
        if let Some(key) = non_blank(self.idempotency_key) {
            command = command.with_idempotency_key(key);
        }
        Ok(command)
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.map(|s| s.trim().to_string()).filter(|s| !s.is_empty())
}

/// Reversal body nested in a transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReversalResponse {
    pub uuid: Uuid,
    pub idempotency_key: String,
    pub quantity: i64,
    pub state: String,
    pub metadata: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl From<&Reversal> for ReversalResponse {
    fn from(r: &Reversal) -> Self {
        Self {
            uuid: r.uuid,
            idempotency_key: r.idempotency_key.to_string(),
            quantity: r.quantity,
            state: r.state.to_string(),
            metadata: serde_json::Value::Object(r.metadata.clone()).to_string(),
            created: r.created,
            modified: r.modified,
        }
    }
}

/// Transaction body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionResponse {
    pub uuid: Uuid,
    pub idempotency_key: String,
    pub ledger: Uuid,
    pub lms_user_id: Option<i64>,
    pub content_key: Option<String>,
    pub subsidy_access_policy_uuid: Option<Uuid>,
    /// JSON-encoded metadata object
    pub metadata: String,
    pub unit: Unit,
    pub quantity: i64,
    pub reference_id: Option<String>,
    pub reference_type: Option<String>,
    pub reversal: Option<ReversalResponse>,
    pub state: String,
    pub created: DateTime<Utc>,
    pub modified: DateTime<Utc>,
}

impl From<&Transaction> for TransactionResponse {
    fn from(tx: &Transaction) -> Self {
        Self {
            uuid: tx.uuid,
            idempotency_key: tx.idempotency_key.to_string(),
            ledger: tx.ledger_uuid,
            lms_user_id: tx.lms_user_id,
            content_key: tx.content_key.clone(),
            subsidy_access_policy_uuid: tx.subsidy_access_policy_uuid,
            metadata: serde_json::Value::Object(tx.metadata.clone()).to_string(),
            unit: tx.unit,
            quantity: tx.quantity,
            reference_id: tx.reference_id.clone(),
            reference_type: tx.reference_type.clone(),
            reversal: tx.reversal.as_ref().map(ReversalResponse::from),
            state: tx.state.to_string(),
            created: tx.created,
            modified: tx.modified,
        }
    }
}

/// Transaction listing filters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionListQuery {
    pub subsidy_uuid: Option<Uuid>,
    pub lms_user_id: Option<i64>,
    pub content_key: Option<String>,
    #[serde(default)]
    pub page: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

impl TransactionListQuery {
    pub fn page(&self) -> ListQuery {
        ListQuery {
            page: self.page,
            page_size: self.page_size,
        }
    }
}

// ============================================
// Subsidy DTOs
// ============================================

/// Subsidy body
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsidyResponse {
    pub uuid: Uuid,
    pub title: String,
    pub enterprise_customer_uuid: Uuid,
    pub active_datetime: String,
    pub expiration_datetime: String,
    pub unit: Unit,
    pub reference_id: Option<String>,
    pub reference_type: Option<String>,
    pub current_balance: i64,
}

impl SubsidyResponse {
    pub fn new(subsidy: &Subsidy, current_balance: i64) -> Self {
        Self {
            uuid: subsidy.uuid,
            title: subsidy.title.clone(),
            enterprise_customer_uuid: subsidy.enterprise_customer_uuid,
            active_datetime: format_date(&subsidy.active_datetime),
            expiration_datetime: format_date(&subsidy.expiration_datetime),
            unit: subsidy.unit,
            reference_id: subsidy.reference_id.clone(),
            reference_type: subsidy.reference_type.clone(),
            current_balance,
        }
    }
}

/// Subsidy listing filters
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubsidyListQuery {
    pub enterprise_customer_uuid: Option<Uuid>,
    #[serde(default)]
    pub page: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

impl SubsidyListQuery {
    pub fn page(&self) -> ListQuery {
        ListQuery {
            page: self.page,
            page_size: self.page_size,
        }
    }
}

// ============================================
// Content Metadata DTOs
// ============================================

/// Content metadata query string
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContentMetadataQuery {
    /// Kept as text; a malformed value is treated as "no scope"
    pub enterprise_customer_uuid: Option<String>,
}

impl ContentMetadataQuery {
    pub fn enterprise_customer_uuid(&self) -> Option<Uuid> {
        self.enterprise_customer_uuid
            .as_deref()
            .and_then(|s| Uuid::parse_str(s.trim()).ok())
    }
}

// ============================================
// Health DTOs
// ============================================

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub requests_served: u64,
    pub components: Vec<ComponentHealth>,
}

/// Component health status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub name: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

// ============================================
// List/Pagination DTOs
// ============================================

/// Paginated list response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaginatedResponse<T> {
    pub items: Vec<T>,
    pub total: u64,
    /// Page number (0-indexed)
    pub page: u64,
    pub page_size: u64,
    pub has_more: bool,
}

impl<T> PaginatedResponse<T> {
    /// Slice one page out of a full result set
    pub fn paginate(all: Vec<T>, query: &ListQuery) -> Self {
        let total = all.len() as u64;
        let page_size = query.page_size.clamp(1, MAX_PAGE_SIZE);
        let start = query.page.saturating_mul(page_size);
        let items: Vec<T> = all
            .into_iter()
            .skip(start.min(total) as usize)
            .take(page_size as usize)
            .collect();
        let has_more = start + (items.len() as u64) < total;

        Self {
            items,
            total,
            page: query.page,
            page_size,
            has_more,
        }
    }
}

/// Upper bound on `page_size`
pub const MAX_PAGE_SIZE: u64 = 100;

/// Query parameters for listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(default)]
    pub page: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u64,
}

fn default_page_size() -> u64 {
    20
}

impl Default for ListQuery {
    fn default() -> Self {
        Self {
            page: 0,
            page_size: default_page_size(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use chrono::TimeZone;
    use subsidy_core::{IdempotencyKey, NewSubsidy};

    fn request() -> CreateTransactionRequest {
        CreateTransactionRequest {
            subsidy_uuid: Some(Uuid::new_v4().to_string()),
            learner_id: Some(serde_json::json!(1234)),
            content_key: Some("course-v1:edX-test-course".to_string()),
            access_policy_uuid: Some(Uuid::new_v4().to_string()),
            idempotency_key: None,
        }
    }

    #[test]
    fn test_into_command() {
        let req = request();
        let subsidy_uuid = req.subsidy_uuid().unwrap();
        let command = req.into_command(subsidy_uuid).unwrap();
        assert_eq!(command.lms_user_id, 1234);
        assert_eq!(command.content_key, "course-v1:edX-test-course");
        assert!(command.idempotency_key.is_none());
    }

    #[test]
    fn test_learner_id_as_string() {
        let mut req = request();
        req.learner_id = Some(serde_json::json!("42"));
        req.idempotency_key = Some("retry-me".to_string());
        let command = req.into_command(Uuid::new_v4()).unwrap();
        assert_eq!(command.lms_user_id, 42);
        assert_eq!(command.idempotency_key, Some(IdempotencyKey::new("retry-me")));
    }

    #[test]
    fn test_missing_fields_reported() {
        let mut req = request();
        req.content_key = None;
        req.access_policy_uuid = Some("  ".to_string());
        let err = req.into_command(Uuid::new_v4()).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(
            err.body(),
            serde_json::json!({
                "access_policy_uuid": ["This field is required."],
                "content_key": ["This field is required."],
            })
        );
    }

    #[test]
    fn test_invalid_policy_uuid() {
        let mut req = request();
        req.access_policy_uuid = Some(format!("{}a", Uuid::new_v4()));
        let err = req.into_command(Uuid::new_v4()).unwrap_err();
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert!(err.body().get("Error").is_some());
    }

    #[test]
    fn test_malformed_subsidy_uuid() {
        let mut req = request();
        req.subsidy_uuid = Some(format!("{}a", Uuid::new_v4()));
        assert!(req.subsidy_uuid().is_none());
    }

    #[test]
    fn test_subsidy_date_format() {
        let mut new = NewSubsidy::new("Fund", Uuid::new_v4(), 10);
        new.active_datetime = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let subsidy = Subsidy {
            uuid: Uuid::new_v4(),
            title: new.title.clone(),
            enterprise_customer_uuid: new.enterprise_customer_uuid,
            active_datetime: new.active_datetime,
            expiration_datetime: new.expiration_datetime,
            unit: new.unit,
            reference_id: None,
            reference_type: None,
            ledger_uuid: Uuid::new_v4(),
        };
        let body = SubsidyResponse::new(&subsidy, 10);
        assert_eq!(body.active_datetime, "2024-01-02T03:04:05Z");
        assert_eq!(body.current_balance, 10);
    }

    #[test]
    fn test_transaction_metadata_is_encoded_string() {
        let tx = Transaction::pending(Uuid::new_v4(), Unit::UsdCents, IdempotencyKey::new("k"), -100);
        let body = serde_json::to_value(TransactionResponse::from(&tx)).unwrap();
        assert_eq!(body["metadata"], "{}");
        assert_eq!(body["unit"], "usd_cents");
        assert!(body["reversal"].is_null());
    }

    #[test]
    fn test_paginate() {
        let page = PaginatedResponse::paginate((0..45).collect::<Vec<_>>(), &ListQuery::default());
        assert_eq!(page.items.len(), 20);
        assert_eq!(page.total, 45);
        assert!(page.has_more);

        let last = PaginatedResponse::paginate(
            (0..45).collect::<Vec<_>>(),
            &ListQuery {
                page: 2,
                page_size: 20,
            },
        );
        assert_eq!(last.items, (40..45).collect::<Vec<_>>());
        assert!(!last.has_more);

        let beyond = PaginatedResponse::paginate(
            (0..5).collect::<Vec<_>>(),
            &ListQuery {
                page: 9,
                page_size: 20,
            },
        );
        assert!(beyond.items.is_empty());
        assert!(!beyond.has_more);
    }
}
