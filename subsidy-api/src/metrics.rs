//! Prometheus Metrics
//!
//! # Metrics
//!
//! ## Counters
//! - `subsidy_http_requests_total` - HTTP requests by method, path, status
//! - `subsidy_transactions_total` - Transaction create requests by outcome
//! - `subsidy_metadata_cache_total` - Metadata lookups by cache result
//! - `subsidy_errors_total` - Errors by code
//!
//! ## Histograms
//! - `subsidy_http_request_duration_seconds` - HTTP request duration
//!
//! ## Gauges
//! - `subsidy_uptime_seconds` - Service uptime
//!
//! # Configuration
//!
//! - `SUBSIDY_METRICS_ENABLED`: Enable metrics (default: true)
//! - `SUBSIDY_METRICS_PORT`: Prometheus scrape port (default: 9090)

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;

use crate::state::AppState;

/// Metrics configuration
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    pub enabled: bool,
    /// Port for the scrape endpoint
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 9090,
        }
    }
}

impl MetricsConfig {
    /// Create from environment variables
    pub fn from_env() -> Self {
        let enabled = std::env::var("SUBSIDY_METRICS_ENABLED")
            .map(|v| v.to_lowercase() != "false" && v != "0")
            .unwrap_or(true);

        let port = std::env::var("SUBSIDY_METRICS_PORT")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(9090);

        Self { enabled, port }
    }
}

/// Install the Prometheus recorder and its scrape listener.
///
/// Call once at startup.
pub fn init_metrics(config: &MetricsConfig) -> Result<(), String> {
    if !config.enabled {
        tracing::info!("Metrics disabled");
        return Ok(());
    }

    PrometheusBuilder::new()
        .with_http_listener(SocketAddr::from(([0, 0, 0, 0], config.port)))
        .install()
        .map_err(|e| format!("Failed to install metrics recorder: {}", e))?;

    tracing::info!(port = config.port, "Metrics initialized");
    Ok(())
}

/// Record a request metric
pub fn record_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", normalize_path(path)),
        ("status", status.to_string()),
    ];

    counter!("subsidy_http_requests_total", &labels).increment(1);
    histogram!("subsidy_http_request_duration_seconds", &labels).record(duration_secs);
}

/// Record a transaction create outcome (`created`, `existing`, `failed`)
pub fn record_transaction(outcome: &'static str) {
    counter!("subsidy_transactions_total", "outcome" => outcome).increment(1);
}

/// Record a metadata lookup against the cache
pub fn record_metadata_lookup(cache_hit: bool) {
    let result = if cache_hit { "hit" } else { "miss" };
    counter!("subsidy_metadata_cache_total", "result" => result).increment(1);
}

/// Record an error
pub fn record_error(code: &'static str) {
    counter!("subsidy_errors_total", "code" => code).increment(1);
}

fn set_uptime(seconds: u64) {
    gauge!("subsidy_uptime_seconds").set(seconds as f64);
}

/// Replace identifier segments with `:id` so label cardinality stays bounded
fn normalize_path(path: &str) -> String {
    let normalized = path
        .split('/')
        .map(|part| if looks_like_id(part) { ":id" } else { part })
        .collect::<Vec<_>>()
        .join("/");

    if normalized.len() > 64 {
        normalized.chars().take(64).collect()
    } else {
        normalized
    }
}

fn looks_like_id(part: &str) -> bool {
    part.len() >= 8
        && (part.chars().all(|c| c.is_ascii_hexdigit() || c == '-') || part.chars().all(|c| c.is_ascii_digit()))
        || part.starts_with("course-v1:")
        || part.contains('+')
}

/// Metrics middleware for tracking HTTP requests
pub async fn metrics_middleware(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let method = request.method().to_string();
    let path = request.uri().path().to_string();

    state.increment_requests();
    set_uptime(state.uptime_secs());

    let response = next.run(request).await;

    record_request(&method, &path, response.status().as_u16(), start.elapsed().as_secs_f64());
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_metrics_config_default() {
        let config = MetricsConfig::default();
        assert!(config.enabled);
        assert_eq!(config.port, 9090);
    }

    #[test]
    fn test_normalize_path() {
        assert_eq!(normalize_path("/api/v1/health"), "/api/v1/health");
        assert_eq!(
            normalize_path("/api/v1/transactions/550e8400-e29b-41d4-a716-446655440000/"),
            "/api/v1/transactions/:id/"
        );
        assert_eq!(
            normalize_path("/api/v1/content-metadata/edX+DemoX/"),
            "/api/v1/content-metadata/:id/"
        );
        assert_eq!(
            normalize_path("/api/v1/content-metadata/course-v1:edX+test+2024/"),
            "/api/v1/content-metadata/:id/"
        );
        assert_eq!(normalize_path("/api/v1/subsidies/"), "/api/v1/subsidies/");
    }

    #[test]
    fn test_recording_without_recorder_is_noop() {
        record_transaction("created");
        record_metadata_lookup(true);
        record_error("NOT_FOUND");
        record_request("GET", "/health", 200, 0.01);
    }
}
