//! API Error Types
//!
//! Maps domain errors onto HTTP statuses and the response bodies clients of
//! the subsidy service already parse: `{"detail": ...}` for auth and lookup
//! failures, `{"Error": ...}` for malformed identifiers, per-field lists for
//! missing input, and a bare JSON string for catalog failures.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use subsidy_core::{Authorization, Capability, LedgerError, MetadataError, WorkflowError};
use thiserror::Error;

/// Detail text for unknown resources
pub const NOT_FOUND_DETAIL: &str = "Not found.";

/// Field error text for absent input
pub const FIELD_REQUIRED: &str = "This field is required.";

/// API-specific errors
#[derive(Error, Debug)]
pub enum ApiError {
    /// Malformed identifier or body
    #[error("{message}")]
    Validation { message: String },

    /// Per-field input errors
    #[error("Invalid fields: {}", .errors.keys().cloned().collect::<Vec<_>>().join(", "))]
    FieldErrors { errors: BTreeMap<String, Vec<String>> },

    /// Resource not found
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    /// Missing or invalid credentials
    #[error("{reason}")]
    Unauthorized { reason: String },

    /// Authenticated but not permitted
    #[error("{reason}")]
    Forbidden { reason: String },

    /// Internal error
    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error(transparent)]
    Workflow(#[from] WorkflowError),

    #[error(transparent)]
    Metadata(#[from] MetadataError),
}

/// API result type
pub type ApiResult<T> = Result<T, ApiError>;

fn ledger_status(err: &LedgerError) -> StatusCode {
    match err {
        LedgerError::NotFound(_) => StatusCode::NOT_FOUND,
        LedgerError::InsufficientBalance { .. } => StatusCode::UNPROCESSABLE_ENTITY,
        LedgerError::AlreadyExists(_)
        | LedgerError::DuplicateIdempotencyKey(_)
        | LedgerError::InvalidStateTransition { .. } => StatusCode::CONFLICT,
        LedgerError::Validation(_) | LedgerError::UnitMismatch { .. } => StatusCode::BAD_REQUEST,
        LedgerError::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Upstream status when it is a valid HTTP status, otherwise 502
fn upstream_status(status: Option<u16>) -> StatusCode {
    status
        .and_then(|s| StatusCode::from_u16(s).ok())
        .unwrap_or(StatusCode::BAD_GATEWAY)
}

impl ApiError {
    /// Get HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::Validation { .. } | ApiError::FieldErrors { .. } => StatusCode::BAD_REQUEST,
            ApiError::NotFound { .. } => StatusCode::NOT_FOUND,
            ApiError::Unauthorized { .. } => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Ledger(e) => ledger_status(e),
            ApiError::Workflow(e) => match e {
                WorkflowError::Ledger(e) => ledger_status(e),
                WorkflowError::Pricing(e) if e.is_client_error() => upstream_status(e.status()),
                WorkflowError::Pricing(_) => StatusCode::BAD_GATEWAY,
                WorkflowError::Enrollment(_) | WorkflowError::Aborted(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            ApiError::Metadata(e) => match e {
                MetadataError::ContentNotFound => StatusCode::NOT_FOUND,
                MetadataError::Catalog(e) => upstream_status(e.status()),
                MetadataError::MissingPrice { .. } => StatusCode::UNPROCESSABLE_ENTITY,
            },
        }
    }

    /// Get error code string
    pub fn error_code(&self) -> &'static str {
        match self {
            ApiError::Validation { .. } => "VALIDATION_ERROR",
            ApiError::FieldErrors { .. } => "FIELD_ERROR",
            ApiError::NotFound { .. } => "NOT_FOUND",
            ApiError::Unauthorized { .. } => "UNAUTHORIZED",
            ApiError::Forbidden { .. } => "FORBIDDEN",
            ApiError::Internal { .. } => "INTERNAL_ERROR",
            ApiError::Ledger(_) => "LEDGER_ERROR",
            ApiError::Workflow(WorkflowError::Ledger(_)) => "LEDGER_ERROR",
            ApiError::Workflow(WorkflowError::Pricing(_)) => "PRICING_ERROR",
            ApiError::Workflow(WorkflowError::Enrollment(_)) => "ENROLLMENT_ERROR",
            ApiError::Workflow(WorkflowError::Aborted(_)) => "WORKFLOW_ABORTED",
            ApiError::Metadata(_) => "METADATA_ERROR",
        }
    }

    /// Response body for this error
    pub fn body(&self) -> Value {
        match self {
            ApiError::Validation { message } => json!({ "Error": message }),
            ApiError::FieldErrors { errors } => json!(errors),
            ApiError::NotFound { .. }
            | ApiError::Ledger(LedgerError::NotFound(_))
            | ApiError::Workflow(WorkflowError::Ledger(LedgerError::NotFound(_))) => {
                json!({ "detail": NOT_FOUND_DETAIL })
            }
            ApiError::Metadata(e) => json!(e.to_string()),
            ApiError::Workflow(e @ WorkflowError::Pricing(_)) => json!(e.to_string()),
            other => json!({ "detail": other.to_string() }),
        }
    }

    /// Create a validation error
    pub fn validation(message: impl Into<String>) -> Self {
        ApiError::Validation {
            message: message.into(),
        }
    }

    /// Create a field error for each absent field
    pub fn missing_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ApiError::FieldErrors {
            errors: fields
                .into_iter()
                .map(|f| (f.into(), vec![FIELD_REQUIRED.to_string()]))
                .collect(),
        }
    }

    /// Create a single field error
    pub fn field(field: impl Into<String>, message: impl Into<String>) -> Self {
        let mut errors = BTreeMap::new();
        errors.insert(field.into(), vec![message.into()]);
        ApiError::FieldErrors { errors }
    }

    /// Create a not found error
    pub fn not_found(resource_type: impl Into<String>, id: impl Into<String>) -> Self {
        ApiError::NotFound {
            resource_type: resource_type.into(),
            id: id.into(),
        }
    }

    /// Create an internal error
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal {
            message: message.into(),
        }
    }

    /// Create an unauthorized error
    pub fn unauthorized(reason: impl Into<String>) -> Self {
        ApiError::Unauthorized {
            reason: reason.into(),
        }
    }

    /// Create a forbidden error
    pub fn forbidden(reason: impl Into<String>) -> Self {
        ApiError::Forbidden {
            reason: reason.into(),
        }
    }

    /// 403 naming the capability the caller lacks
    pub fn missing_capability(capability: Capability) -> Self {
        ApiError::forbidden(format!("MISSING: {}", capability))
    }

    /// Turn an authorization decision into `Ok(())` or a 403
    pub fn require(decision: Authorization) -> ApiResult<()> {
        match decision {
            Authorization::Allow => Ok(()),
            Authorization::Deny { missing } => Err(ApiError::missing_capability(missing)),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, code = self.error_code(), "Request failed");
        } else {
            tracing::debug!(error = %self, code = self.error_code(), "Request rejected");
        }
        crate::metrics::record_error(self.error_code());

        (status, Json(self.body())).into_response()
    }
}
