//! Error types for Subsidy Core
//!
//! One enum per concern: the ledger store, each outbound collaborator, and
//! the two orchestrating services built on top of them.

use crate::types::Unit;
use thiserror::Error;

/// Ledger operation errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Idempotency key already in use: {0}")]
    DuplicateIdempotencyKey(String),

    #[error("Invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Insufficient balance: current balance {balance}, requested quantity {quantity}")]
    InsufficientBalance { balance: i64, quantity: i64 },

    #[error("Unit mismatch: ledger uses {expected}, transaction uses {actual}")]
    UnitMismatch { expected: Unit, actual: Unit },

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Storage error: {0}")]
    Storage(String),
}

/// Result type alias for ledger operations
pub type LedgerResult<T> = Result<T, LedgerError>;

/// Catalog service errors
///
/// The `Http` rendering follows the conventional HTTP client wording
/// (`403 Client Error: Forbidden for url: ...`) so it can be embedded
/// verbatim in responses.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CatalogError {
    #[error("{status} {} Error: {reason} for url: {url}", http_error_kind(.status))]
    Http {
        status: u16,
        reason: String,
        url: String,
    },

    #[error("{0}")]
    Transport(String),

    #[error("Invalid catalog response: {0}")]
    Decode(String),
}

fn http_error_kind(status: &u16) -> &'static str {
    if *status >= 500 {
        "Server"
    } else {
        "Client"
    }
}

impl CatalogError {
    /// Create an HTTP status error
    pub fn http(status: u16, reason: impl Into<String>, url: impl Into<String>) -> Self {
        CatalogError::Http {
            status,
            reason: reason.into(),
            url: url.into(),
        }
    }

    /// Upstream HTTP status, when the catalog answered at all
    pub fn status(&self) -> Option<u16> {
        match self {
            CatalogError::Http { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// Whether the upstream rejected the request as a client error (4xx)
    pub fn is_client_error(&self) -> bool {
        matches!(self.status(), Some(s) if (400..500).contains(&s))
    }
}

/// Enrollment service errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EnrollmentError {
    #[error("Enrollment request failed: {0}")]
    Request(String),

    #[error("Enrollment rejected: {0}")]
    Rejected(String),

    #[error("Enrollment response did not include a fulfillment reference")]
    MissingReference,
}

/// Transaction creation workflow errors
#[derive(Error, Debug)]
pub enum WorkflowError {
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    #[error("Failed to fetch data from catalog service with exc: {0}")]
    Pricing(#[from] CatalogError),

    #[error(transparent)]
    Enrollment(#[from] EnrollmentError),

    #[error("Transaction workflow aborted: {0}")]
    Aborted(String),
}

/// Result type alias for workflow operations
pub type WorkflowResult<T> = Result<T, WorkflowError>;

/// Content metadata lookup errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MetadataError {
    #[error("Content not found")]
    ContentNotFound,

    #[error("Failed to fetch data from catalog service with exc: {0}")]
    Catalog(CatalogError),

    #[error("No price found for content {content_key}")]
    MissingPrice { content_key: String },
}

impl From<CatalogError> for MetadataError {
    fn from(err: CatalogError) -> Self {
        match err.status() {
            Some(404) => MetadataError::ContentNotFound,
            _ => MetadataError::Catalog(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_client_error_display() {
        let err = CatalogError::http(403, "Something Went Wrong", "foobar.com");
        assert_eq!(
            err.to_string(),
            "403 Client Error: Something Went Wrong for url: foobar.com"
        );
        assert!(err.is_client_error());
    }

    #[test]
    fn test_catalog_server_error_display() {
        let err = CatalogError::http(503, "Service Unavailable", "http://catalog/x");
        assert_eq!(
            err.to_string(),
            "503 Server Error: Service Unavailable for url: http://catalog/x"
        );
        assert!(!err.is_client_error());
    }

    #[test]
    fn test_metadata_error_from_catalog_404() {
        let err: MetadataError = CatalogError::http(404, "Not Found", "foobar.com").into();
        assert_eq!(err, MetadataError::ContentNotFound);
        assert_eq!(err.to_string(), "Content not found");
    }

    #[test]
    fn test_metadata_error_from_catalog_403() {
        let err: MetadataError = CatalogError::http(403, "Something Went Wrong", "foobar.com").into();
        assert_eq!(
            err.to_string(),
            "Failed to fetch data from catalog service with exc: \
             403 Client Error: Something Went Wrong for url: foobar.com"
        );
    }

    #[test]
    fn test_transport_error_has_no_status() {
        let err = CatalogError::Transport("connection refused".to_string());
        assert_eq!(err.status(), None);
        assert!(!err.is_client_error());
    }
}
