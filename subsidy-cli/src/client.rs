//! API Client
//!
//! HTTP client for communicating with the subsidy API.

use crate::error::{CliError, CliResult};
use reqwest::{Client, RequestBuilder, Url};
use serde::de::DeserializeOwned;
use std::time::Duration;
use subsidy_api::{
    CreateTransactionRequest, HealthResponse, PaginatedResponse, SubsidyResponse, TransactionResponse,
};
use subsidy_core::ContentMetadata;

/// Filters for listing transactions
#[derive(Debug, Clone, Default)]
pub struct TransactionFilter {
    pub subsidy_uuid: Option<String>,
    pub lms_user_id: Option<i64>,
    pub content_key: Option<String>,
    pub page: u64,
    pub page_size: u64,
}

/// Subsidy API client
pub struct SubsidyClient {
    /// HTTP client
    client: Client,
    /// Base URL
    base_url: Url,
    /// Bearer token
    token: Option<String>,
}

impl SubsidyClient {
    /// Create a new client
    pub fn new(base_url: &str, token: Option<String>) -> CliResult<Self> {
        Self::with_timeout(base_url, token, 30)
    }

    /// Create with custom timeout
    pub fn with_timeout(base_url: &str, token: Option<String>, timeout_secs: u64) -> CliResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| CliError::connection(e.to_string()))?;
        let base_url =
            Url::parse(base_url).map_err(|e| CliError::config(format!("Invalid API url {}: {}", base_url, e)))?;

        Ok(Self {
            client,
            base_url,
            token,
        })
    }

    /// `/api/v1/<segments>/`
    fn url(&self, segments: &[&str]) -> CliResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| CliError::config(format!("{} cannot be used as a base url", self.base_url)))?
            .pop_if_empty()
            .extend(["api", "v1"])
            .extend(segments)
            .push("");
        Ok(url)
    }

    async fn send<T: DeserializeOwned>(&self, request: RequestBuilder) -> CliResult<T> {
        let request = match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        let response = request.send().await?;

        if response.status().is_success() {
            Ok(response.json().await?)
        } else {
            let status = response.status().as_u16();
            let text = response.text().await.unwrap_or_default();
            Err(CliError::api(status, error_message(&text)))
        }
    }

    /// Get health status
    pub async fn health(&self) -> CliResult<HealthResponse> {
        let mut url = self.url(&["health"])?;
        // Health is the one route without a trailing slash
        let path = url.path().trim_end_matches('/').to_string();
        url.set_path(&path);
        self.send(self.client.get(url)).await
    }

    /// List subsidies
    pub async fn list_subsidies(
        &self,
        enterprise_customer_uuid: Option<&str>,
        page: u64,
        page_size: u64,
    ) -> CliResult<PaginatedResponse<SubsidyResponse>> {
        let mut query = vec![("page", page.to_string()), ("page_size", page_size.to_string())];
        if let Some(enterprise) = enterprise_customer_uuid {
            query.push(("enterprise_customer_uuid", enterprise.to_string()));
        }
        self.send(self.client.get(self.url(&["subsidies"])?).query(&query)).await
    }

    /// Get a subsidy
    pub async fn get_subsidy(&self, uuid: &str) -> CliResult<SubsidyResponse> {
        self.send(self.client.get(self.url(&["subsidies", uuid])?)).await
    }

    /// Create (or replay) a transaction
    pub async fn create_transaction(&self, request: &CreateTransactionRequest) -> CliResult<TransactionResponse> {
        self.send(self.client.post(self.url(&["transactions"])?).json(request)).await
    }

    /// Get a transaction
    pub async fn get_transaction(&self, uuid: &str) -> CliResult<TransactionResponse> {
        self.send(self.client.get(self.url(&["transactions", uuid])?)).await
    }

    /// List transactions
    pub async fn list_transactions(&self, filter: &TransactionFilter) -> CliResult<PaginatedResponse<TransactionResponse>> {
        let mut query = vec![
            ("page", filter.page.to_string()),
            ("page_size", filter.page_size.to_string()),
        ];
        if let Some(subsidy) = &filter.subsidy_uuid {
            query.push(("subsidy_uuid", subsidy.clone()));
        }
        if let Some(lms_user_id) = filter.lms_user_id {
            query.push(("lms_user_id", lms_user_id.to_string()));
        }
        if let Some(content_key) = &filter.content_key {
            query.push(("content_key", content_key.clone()));
        }
        self.send(self.client.get(self.url(&["transactions"])?).query(&query)).await
    }

    /// Reverse a transaction
    pub async fn reverse_transaction(&self, uuid: &str) -> CliResult<TransactionResponse> {
        self.send(self.client.post(self.url(&["transactions", uuid, "reverse"])?)).await
    }

    /// Get content metadata as priced for an enterprise customer
    pub async fn content_metadata(&self, content: &str, enterprise_customer_uuid: &str) -> CliResult<ContentMetadata> {
        let url = self.url(&["content-metadata", content])?;
        self.send(
            self.client
                .get(url)
                .query(&[("enterprise_customer_uuid", enterprise_customer_uuid)]),
        )
        .await
    }
}

/// Pull the human-readable part out of an API error body
fn error_message(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(serde_json::Value::String(s)) => s,
        Ok(serde_json::Value::Object(map)) => match map.get("detail").or_else(|| map.get("Error")) {
            Some(serde_json::Value::String(s)) => s.clone(),
            _ => serde_json::Value::Object(map).to_string(),
        },
        _ => body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use serde_json::json;

    fn transaction_json(uuid: &str) -> serde_json::Value {
        json!({
            "uuid": uuid,
            "idempotency_key": "ledger-key",
            "ledger": "2b1b8b4e-9c0a-4d7e-bb7a-7cf1f0f7e001",
            "lms_user_id": 1234,
            "content_key": "course-v1:edX+DemoX",
            "subsidy_access_policy_uuid": "6f1e2d3c-1111-4a2b-8c3d-9e8f7a6b5c4d",
            "metadata": "{}",
            "unit": "usd_cents",
            "quantity": -10000,
            "reference_id": "fulfillment-1",
            "reference_type": "enterprise_fulfillment_source_uuid",
            "reversal": null,
            "state": "committed",
            "created": "2024-01-01T00:00:00Z",
            "modified": "2024-01-01T00:00:00Z"
        })
    }

    #[test]
    fn test_error_message() {
        assert_eq!(error_message(r#"{"detail": "Invalid token."}"#), "Invalid token.");
        assert_eq!(error_message(r#"{"Error": "bad uuid"}"#), "bad uuid");
        assert_eq!(error_message(r#""Content not found""#), "Content not found");
        assert_eq!(
            error_message(r#"{"learner_id": ["This field is required."]}"#),
            r#"{"learner_id":["This field is required."]}"#
        );
        assert_eq!(error_message("oops"), "oops");
    }

    #[test]
    fn test_url_building() {
        let client = SubsidyClient::new("http://localhost:8000", None).unwrap();
        assert_eq!(
            client.url(&["transactions", "abc", "reverse"]).unwrap().as_str(),
            "http://localhost:8000/api/v1/transactions/abc/reverse/"
        );
        assert_eq!(
            client.url(&["content-metadata", "course-v1:edX+DemoX"]).unwrap().as_str(),
            "http://localhost:8000/api/v1/content-metadata/course-v1:edX+DemoX/"
        );
    }

    #[tokio::test]
    async fn test_create_transaction_sends_token() {
        let server = MockServer::start_async().await;
        let uuid = "0c9c4f9e-8d83-4e5b-a1b8-4a5f0cde1f21";
        let mock = server
            .mock_async(|when, then| {
                when.method(POST)
                    .path("/api/v1/transactions/")
                    .header("authorization", "Bearer s3cret")
                    .json_body(json!({
                        "subsidy_uuid": "0b3c7f2e-52c4-4c1b-9a55-0f4b1f2f6a10",
                        "learner_id": 1234,
                        "content_key": "course-v1:edX+DemoX",
                        "access_policy_uuid": "6f1e2d3c-1111-4a2b-8c3d-9e8f7a6b5c4d",
                        "idempotency_key": null
                    }));
                then.status(201).json_body(transaction_json(uuid));
            })
            .await;

        let client = SubsidyClient::new(&server.base_url(), Some("s3cret".to_string())).unwrap();
        let request = CreateTransactionRequest {
            subsidy_uuid: Some("0b3c7f2e-52c4-4c1b-9a55-0f4b1f2f6a10".to_string()),
            learner_id: Some(json!(1234)),
            content_key: Some("course-v1:edX+DemoX".to_string()),
            access_policy_uuid: Some("6f1e2d3c-1111-4a2b-8c3d-9e8f7a6b5c4d".to_string()),
            idempotency_key: None,
        };
        let tx = client.create_transaction(&request).await.unwrap();

        mock.assert_async().await;
        assert_eq!(tx.uuid.to_string(), uuid);
        assert_eq!(tx.quantity, -10000);
    }

    #[tokio::test]
    async fn test_api_error_detail() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/subsidies/abc/");
                then.status(403)
                    .json_body(json!({"detail": "MISSING: subsidy.can_read_subsidies"}));
            })
            .await;

        let client = SubsidyClient::new(&server.base_url(), None).unwrap();
        let err = client.get_subsidy("abc").await.unwrap_err();

        match err {
            CliError::ApiError { status, message } => {
                assert_eq!(status, 403);
                assert_eq!(message, "MISSING: subsidy.can_read_subsidies");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_health() {
        let server = MockServer::start_async().await;
        server
            .mock_async(|when, then| {
                when.method(GET).path("/api/v1/health");
                then.status(200).json_body(json!({
                    "status": "healthy",
                    "version": "0.1.0",
                    "uptime_secs": 3,
                    "requests_served": 1,
                    "components": [{"name": "ledger", "status": "healthy"}]
                }));
            })
            .await;

        let client = SubsidyClient::new(&server.base_url(), None).unwrap();
        let health = client.health().await.unwrap();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.components.len(), 1);
    }
}
