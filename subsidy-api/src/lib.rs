//! Subsidy API - HTTP Interface Layer
//!
//! This crate serves the enterprise subsidy ledger over HTTP.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────┐
//! │                 Subsidy API                  │
//! │  ┌─────────────────────────────────────┐    │
//! │  │   metrics → auth → body limit       │    │
//! │  │   /transactions, /subsidies         │    │
//! │  │   /content-metadata                 │    │
//! │  └─────────────────────────────────────┘    │
//! │           │              │           │      │
//! │           ▼              ▼           ▼      │
//! │  ┌─────────────┐ ┌─────────────┐ ┌────────┐ │
//! │  │  Handlers   │ │    DTOs     │ │ State  │ │
//! │  └─────────────┘ └─────────────┘ └────────┘ │
//! └─────────────────────────────────────────────┘
//!           │                          │
//!           ▼                          ▼
//!   subsidy-core workflow      catalog / LMS clients
//! ```
//!
//! # Endpoints
//!
//! ## Health
//! - `GET /health`, `GET /healthz`, `GET /api/v1/health` - Service health check
//!
//! ## Transactions (under `/api/v1`)
//! - `POST /transactions/` - Create or replay an enrollment transaction
//! - `GET /transactions/` - List visible transactions
//! - `GET /transactions/:transaction_uuid/` - Get one transaction
//! - `POST /transactions/:transaction_uuid/reverse/` - Reverse a committed transaction
//!
//! ## Content Metadata
//! - `GET /content-metadata/:content_identifier/?enterprise_customer_uuid=` - Pricing metadata
//!
//! ## Subsidies
//! - `GET /subsidies/` - List readable subsidies
//! - `GET /subsidies/:subsidy_uuid/` - Get one subsidy with its balance
//!
//! # Usage Example
//!
//! ```ignore
//! use subsidy_api::{AppState, ClientConfig, Collaborators, start_server};
//!
//! #[tokio::main]
//! async fn main() {
//!     let collaborators = Collaborators::http(&ClientConfig::from_env()).unwrap();
//!     let state = AppState::in_memory(collaborators);
//!     start_server(state).await.unwrap();
//! }
//! ```

pub mod auth;
pub mod clients;
pub mod dto;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod routes;
pub mod state;

// Re-export main types
pub use auth::{development_principal, AuthConfig};
pub use clients::{ClientConfig, HttpCatalogClient, HttpEnrollmentClient};
pub use dto::*;
pub use error::{ApiError, ApiResult};
pub use metrics::{init_metrics, MetricsConfig};
pub use routes::{build_app, create_router, create_v1_router};
pub use state::{ApiConfig, AppState, Collaborators, ComponentHealthCheck, HealthStatus};

/// Subsidy API version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default API port
pub const DEFAULT_PORT: u16 = 8000;

/// Start the API server
pub async fn start_server(state: AppState) -> Result<(), std::io::Error> {
    let addr = state.config.listen_addr.clone();
    let app = build_app(state);

    tracing::info!("Starting subsidy API server on {}", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app).await
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_state() -> AppState {
        AppState::in_memory(Collaborators::http(&ClientConfig::default()).unwrap())
    }

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }

    #[test]
    fn test_default_port() {
        assert_eq!(DEFAULT_PORT, 8000);
    }

    #[test]
    fn test_build_app() {
        let _app = build_app(test_state());
    }

    #[tokio::test]
    async fn test_app_state_uptime() {
        let state = test_state();
        tokio::time::sleep(tokio::time::Duration::from_millis(10)).await;
        assert!(state.uptime_secs() < 5);
    }
}
