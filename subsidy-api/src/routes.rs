//! API Routes
//!
//! Route definitions for the subsidy API.

use axum::{
    extract::DefaultBodyLimit,
    middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::auth_middleware;
use crate::handlers::*;
use crate::metrics::metrics_middleware;
use crate::state::AppState;

/// Create the API router with all routes
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health_check))
        // Transactions
        .route("/transactions/", post(create_transaction).get(list_transactions))
        .route("/transactions/:transaction_uuid/", get(get_transaction))
        .route("/transactions/:transaction_uuid/reverse/", post(reverse_transaction))
        // Content metadata
        .route("/content-metadata/:content_identifier/", get(get_content_metadata))
        // Subsidies
        .route("/subsidies/", get(list_subsidies))
        .route("/subsidies/:subsidy_uuid/", get(get_subsidy))
        .with_state(state)
}

/// Create a router for the V1 API with /api/v1 prefix
pub fn create_v1_router(state: Arc<AppState>) -> Router {
    Router::new().nest("/api/v1", create_router(state))
}

/// Build the full application router
pub fn build_app(state: AppState) -> Router {
    let state = Arc::new(state);
    let enable_cors = state.config.enable_cors;
    let max_body_size = state.config.max_body_size;

    let root_router = Router::new().route("/", get(|| async { "Enterprise Subsidy Service" }));

    let health_router = Router::new()
        .route("/health", get(health_check))
        .route("/healthz", get(health_check))
        .with_state(state.clone());

    let mut router = root_router
        .merge(health_router)
        .merge(create_v1_router(state.clone()))
        .layer(DefaultBodyLimit::max(max_body_size))
        .layer(middleware::from_fn_with_state(state.clone(), auth_middleware))
        .layer(middleware::from_fn_with_state(state, metrics_middleware));

    if enable_cors {
        router = router.layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );
    }

    router.layer(TraceLayer::new_for_http())
}
