//! API Handlers
//!
//! HTTP handler implementations for the subsidy API endpoints.

use axum::{
    extract::{rejection::JsonRejection, Path, Query, State},
    http::StatusCode,
    Extension, Json,
};
use std::collections::HashMap;
use std::sync::Arc;
use subsidy_core::{Capability, ContentMetadata, CreateOutcome, Principal, Subsidy, TransactionQuery};
use uuid::Uuid;

use crate::dto::*;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::state::{AppState, ComponentHealthCheck, HealthStatus};

/// Parse a path identifier; malformed identifiers can never match a resource
fn parse_id(resource_type: &str, raw: &str) -> ApiResult<Uuid> {
    Uuid::parse_str(raw.trim()).map_err(|_| ApiError::not_found(resource_type, raw))
}

// ============================================
// Health
// ============================================

/// Health check handler
pub async fn health_check(State(state): State<Arc<AppState>>) -> ApiResult<Json<HealthResponse>> {
    let mut components = vec![];

    match state.ledger.list_subsidies(None).await {
        Ok(_) => components.push(ComponentHealthCheck::healthy("ledger")),
        Err(e) => components.push(ComponentHealthCheck::unhealthy("ledger", e.to_string())),
    }
    components.push(ComponentHealthCheck::healthy("metadata_cache"));

    let overall_status = if components.iter().all(|c| c.status == HealthStatus::Healthy) {
        HealthStatus::Healthy
    } else if components.iter().any(|c| c.status == HealthStatus::Unhealthy) {
        HealthStatus::Unhealthy
    } else {
        HealthStatus::Degraded
    };

    Ok(Json(HealthResponse {
        status: overall_status.as_str().to_string(),
        version: state.config.version.clone(),
        uptime_secs: state.uptime_secs(),
        requests_served: state.request_count(),
        components: components
            .into_iter()
            .map(|c| ComponentHealth {
                name: c.name,
                status: c.status.as_str().to_string(),
                message: c.message,
            })
            .collect(),
    }))
}

// ============================================
// Transaction Handlers
// ============================================

/// Create (or replay) a learner enrollment transaction
pub async fn create_transaction(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    payload: Result<Json<CreateTransactionRequest>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<TransactionResponse>)> {
    let Json(request) = payload.map_err(|rejection| ApiError::validation(rejection.body_text()))?;

    // An absent, malformed, or unknown subsidy leaves nothing to authorize against
    let subsidy = match request.subsidy_uuid() {
        Some(uuid) => state.ledger.get_subsidy(&uuid).await?,
        None => None,
    };
    let Some(subsidy) = subsidy else {
        return Err(ApiError::missing_capability(Capability::CreateTransactions));
    };
    ApiError::require(principal.authorize(Capability::CreateTransactions, Some(&subsidy.enterprise_customer_uuid)))?;

    let command = request.into_command(subsidy.uuid)?;

    let outcome = match state.workflow.create(command).await {
        Ok(outcome) => outcome,
        Err(e) => {
            metrics::record_transaction("failed");
            return Err(e.into());
        }
    };

    let status = match &outcome {
        CreateOutcome::Created(_) => {
            metrics::record_transaction("created");
            StatusCode::CREATED
        }
        CreateOutcome::Existing(_) => {
            metrics::record_transaction("existing");
            StatusCode::OK
        }
    };

    Ok((status, Json(TransactionResponse::from(outcome.transaction()))))
}

/// List transactions visible to the caller
pub async fn list_transactions(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<TransactionListQuery>,
) -> ApiResult<Json<PaginatedResponse<TransactionResponse>>> {
    let subsidies: Vec<Subsidy> = match query.subsidy_uuid {
        Some(uuid) => vec![state
            .ledger
            .get_subsidy(&uuid)
            .await?
            .ok_or_else(|| ApiError::not_found("Subsidy", uuid.to_string()))?],
        None => state.ledger.list_subsidies(None).await?,
    };
    let owners: HashMap<Uuid, Uuid> = subsidies
        .iter()
        .map(|s| (s.ledger_uuid, s.enterprise_customer_uuid))
        .collect();

    let filter = TransactionQuery {
        ledger_uuid: query.subsidy_uuid.and(subsidies.first().map(|s| s.ledger_uuid)),
        lms_user_id: query.lms_user_id,
        content_key: query.content_key.clone(),
    };

    let visible: Vec<TransactionResponse> = state
        .ledger
        .list_transactions(&filter)
        .await?
        .iter()
        .filter(|tx| {
            owners.get(&tx.ledger_uuid).is_some_and(|enterprise| {
                principal
                    .authorize_transaction_read(enterprise, tx.lms_user_id)
                    .is_allowed()
            })
        })
        .map(TransactionResponse::from)
        .collect();

    Ok(Json(PaginatedResponse::paginate(visible, &query.page())))
}

/// Get one transaction
pub async fn get_transaction(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(transaction_uuid): Path<String>,
) -> ApiResult<Json<TransactionResponse>> {
    let uuid = parse_id("Transaction", &transaction_uuid)?;
    let transaction = state
        .ledger
        .get_transaction(&uuid)
        .await?
        .ok_or_else(|| ApiError::not_found("Transaction", transaction_uuid.clone()))?;
    let subsidy = state
        .ledger
        .get_subsidy_for_ledger(&transaction.ledger_uuid)
        .await?
        .ok_or_else(|| ApiError::internal(format!("Ledger {} has no subsidy", transaction.ledger_uuid)))?;

    ApiError::require(principal.authorize_transaction_read(&subsidy.enterprise_customer_uuid, transaction.lms_user_id))?;

    Ok(Json(TransactionResponse::from(&transaction)))
}

/// Reverse a committed transaction
pub async fn reverse_transaction(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(transaction_uuid): Path<String>,
) -> ApiResult<(StatusCode, Json<TransactionResponse>)> {
    let uuid = parse_id("Transaction", &transaction_uuid)?;
    let transaction = state
        .ledger
        .get_transaction(&uuid)
        .await?
        .ok_or_else(|| ApiError::not_found("Transaction", transaction_uuid.clone()))?;
    let enterprise = state
        .ledger
        .get_subsidy_for_ledger(&transaction.ledger_uuid)
        .await?
        .map(|s| s.enterprise_customer_uuid);

    ApiError::require(principal.authorize(Capability::CreateTransactions, enterprise.as_ref()))?;

    let reversed = state.workflow.reverse(&uuid).await?;
    Ok((StatusCode::CREATED, Json(TransactionResponse::from(&reversed))))
}

// ============================================
// Content Metadata
// ============================================

/// Pricing metadata for a content item as seen by an enterprise customer
pub async fn get_content_metadata(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(content_identifier): Path<String>,
    Query(query): Query<ContentMetadataQuery>,
) -> ApiResult<Json<ContentMetadata>> {
    let enterprise = query.enterprise_customer_uuid();
    ApiError::require(principal.authorize(Capability::ReadMetadata, enterprise.as_ref()))?;
    let enterprise = enterprise.ok_or_else(|| ApiError::missing_capability(Capability::ReadMetadata))?;

    let lookup = state.metadata.lookup(&content_identifier, &enterprise).await?;
    metrics::record_metadata_lookup(lookup.cache_hit);

    Ok(Json(lookup.metadata))
}

// ============================================
// Subsidies
// ============================================

/// List subsidies the caller may read
pub async fn list_subsidies(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Query(query): Query<SubsidyListQuery>,
) -> ApiResult<Json<PaginatedResponse<SubsidyResponse>>> {
    let readable: Vec<Subsidy> = state
        .ledger
        .list_subsidies(query.enterprise_customer_uuid.as_ref())
        .await?
        .into_iter()
        .filter(|s| {
            principal
                .authorize(Capability::ReadSubsidies, Some(&s.enterprise_customer_uuid))
                .is_allowed()
        })
        .collect();

    let page = PaginatedResponse::paginate(readable, &query.page());
    let mut items = Vec::with_capacity(page.items.len());
    for subsidy in &page.items {
        let balance = state.ledger.current_balance(&subsidy.ledger_uuid).await?;
        items.push(SubsidyResponse::new(subsidy, balance));
    }

    Ok(Json(PaginatedResponse {
        items,
        total: page.total,
        page: page.page,
        page_size: page.page_size,
        has_more: page.has_more,
    }))
}

/// Get one subsidy with its current balance
pub async fn get_subsidy(
    State(state): State<Arc<AppState>>,
    Extension(principal): Extension<Principal>,
    Path(subsidy_uuid): Path<String>,
) -> ApiResult<Json<SubsidyResponse>> {
    let uuid = parse_id("Subsidy", &subsidy_uuid)?;
    let subsidy = state
        .ledger
        .get_subsidy(&uuid)
        .await?
        .ok_or_else(|| ApiError::not_found("Subsidy", subsidy_uuid.clone()))?;

    ApiError::require(principal.authorize(Capability::ReadSubsidies, Some(&subsidy.enterprise_customer_uuid)))?;

    let balance = state.ledger.current_balance(&subsidy.ledger_uuid).await?;
    Ok(Json(SubsidyResponse::new(&subsidy, balance)))
}
