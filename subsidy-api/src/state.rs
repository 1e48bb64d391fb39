//! Application State
//!
//! Shared state for the subsidy API service.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use subsidy_core::{
    CatalogClient, CatalogPricing, ContentMetadataService, EnrollmentClient, InMemoryLedgerStore, LedgerStore,
    PricingClient, TransactionWorkflow,
};

use crate::auth::AuthConfig;
use crate::clients::{ClientConfig, HttpCatalogClient, HttpEnrollmentClient};
use crate::error::{ApiError, ApiResult};

/// Application configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub service_name: String,
    pub version: String,
    pub listen_addr: String,
    pub enable_cors: bool,
    /// Max request body size (bytes)
    pub max_body_size: usize,
    /// Lifetime of cached content metadata
    pub metadata_cache_ttl_secs: u64,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            service_name: "subsidy-api".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            listen_addr: "0.0.0.0:8000".to_string(),
            enable_cors: true,
            max_body_size: 1024 * 1024, // 1MB
            metadata_cache_ttl_secs: 300,
        }
    }
}

impl ApiConfig {
    /// Create from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            listen_addr: std::env::var("SUBSIDY_LISTEN_ADDR").unwrap_or(defaults.listen_addr.clone()),
            enable_cors: std::env::var("SUBSIDY_ENABLE_CORS")
                .map(|v| v.to_lowercase() != "false" && v != "0")
                .unwrap_or(defaults.enable_cors),
            metadata_cache_ttl_secs: std::env::var("SUBSIDY_METADATA_CACHE_TTL_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.metadata_cache_ttl_secs),
            ..defaults
        }
    }
}

/// Outbound services the API depends on
#[derive(Clone)]
pub struct Collaborators {
    pub catalog: Arc<dyn CatalogClient>,
    pub pricing: Arc<dyn PricingClient>,
    pub enrollment: Arc<dyn EnrollmentClient>,
}

impl Collaborators {
    /// Price from the same catalog used for metadata lookups
    pub fn from_catalog(catalog: Arc<dyn CatalogClient>, enrollment: Arc<dyn EnrollmentClient>) -> Self {
        Self {
            pricing: Arc::new(CatalogPricing::new(catalog.clone())),
            catalog,
            enrollment,
        }
    }

    /// HTTP collaborators built from configuration
    pub fn http(config: &ClientConfig) -> ApiResult<Self> {
        let catalog = HttpCatalogClient::new(config).map_err(|e| ApiError::internal(e.to_string()))?;
        let enrollment = HttpEnrollmentClient::new(config).map_err(|e| ApiError::internal(e.to_string()))?;
        Ok(Self::from_catalog(Arc::new(catalog), Arc::new(enrollment)))
    }
}

/// Application state shared across handlers
pub struct AppState {
    pub config: ApiConfig,
    pub auth_config: AuthConfig,
    pub ledger: Arc<dyn LedgerStore>,
    pub workflow: TransactionWorkflow,
    pub metadata: ContentMetadataService,
    /// Service start time
    pub started_at: DateTime<Utc>,
    request_counter: AtomicU64,
}

impl AppState {
    /// Create new application state with default config
    pub fn new(ledger: Arc<dyn LedgerStore>, collaborators: Collaborators) -> Self {
        Self::with_config(ApiConfig::default(), ledger, collaborators)
    }

    /// Create with configuration
    pub fn with_config(config: ApiConfig, ledger: Arc<dyn LedgerStore>, collaborators: Collaborators) -> Self {
        let workflow = TransactionWorkflow::new(ledger.clone(), collaborators.pricing, collaborators.enrollment);
        let metadata = ContentMetadataService::new(
            collaborators.catalog,
            Duration::from_secs(config.metadata_cache_ttl_secs),
        );

        Self {
            config,
            auth_config: AuthConfig::default(),
            ledger,
            workflow,
            metadata,
            started_at: Utc::now(),
            request_counter: AtomicU64::new(0),
        }
    }

    /// In-memory ledger with the given collaborators
    pub fn in_memory(collaborators: Collaborators) -> Self {
        Self::new(Arc::new(InMemoryLedgerStore::new()), collaborators)
    }

    /// Set authentication configuration
    pub fn with_auth(mut self, auth_config: AuthConfig) -> Self {
        self.auth_config = auth_config;
        self
    }

    /// Get service uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        let now = Utc::now();
        (now - self.started_at).num_seconds().max(0) as u64
    }

    /// Increment request counter
    pub fn increment_requests(&self) -> u64 {
        self.request_counter.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Get request count
    pub fn request_count(&self) -> u64 {
        self.request_counter.load(Ordering::Relaxed)
    }
}

/// Health status of the service
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Unhealthy => "unhealthy",
        }
    }
}

/// Component health check result
#[derive(Debug, Clone)]
pub struct ComponentHealthCheck {
    pub name: String,
    pub status: HealthStatus,
    pub message: Option<String>,
}

impl ComponentHealthCheck {
    pub fn healthy(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Healthy,
            message: None,
        }
    }

    pub fn degraded(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Degraded,
            message: Some(message.into()),
        }
    }

    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            status: HealthStatus::Unhealthy,
            message: Some(message.into()),
        }
    }
}
