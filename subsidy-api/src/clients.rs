//! HTTP Collaborators
//!
//! `reqwest` implementations of the catalog and enrollment clients.
//!
//! # Configuration
//!
//! - `SUBSIDY_CATALOG_URL`: enterprise catalog base url
//! - `SUBSIDY_LMS_URL`: LMS base url
//! - `SUBSIDY_CLIENT_TIMEOUT_SECS`: per-request timeout (default: 30)
//! - `SUBSIDY_CLIENT_ACCESS_TOKEN`: bearer token sent to both services

use async_trait::async_trait;
use reqwest::{Client, Response, Url};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use subsidy_core::{CatalogClient, CatalogContent, CatalogError, EnrollmentClient, EnrollmentError, EnrollmentRequest};
use uuid::Uuid;

/// Outbound client configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    pub catalog_base_url: String,
    pub lms_base_url: String,
    pub timeout_secs: u64,
    pub access_token: Option<String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            catalog_base_url: "http://localhost:18160".to_string(),
            lms_base_url: "http://localhost:18000".to_string(),
            timeout_secs: 30,
            access_token: None,
        }
    }
}

impl ClientConfig {
    /// Create from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            catalog_base_url: std::env::var("SUBSIDY_CATALOG_URL").unwrap_or(defaults.catalog_base_url),
            lms_base_url: std::env::var("SUBSIDY_LMS_URL").unwrap_or(defaults.lms_base_url),
            timeout_secs: std::env::var("SUBSIDY_CLIENT_TIMEOUT_SECS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.timeout_secs),
            access_token: std::env::var("SUBSIDY_CLIENT_ACCESS_TOKEN").ok().filter(|t| !t.is_empty()),
        }
    }

    fn http_client(&self) -> Result<Client, String> {
        Client::builder()
            .timeout(Duration::from_secs(self.timeout_secs))
            .build()
            .map_err(|e| format!("Failed to build HTTP client: {}", e))
    }
}

/// `base` with `segments` appended and a trailing slash
fn endpoint(base: &Url, segments: &[&str]) -> Result<Url, String> {
    let mut url = base.clone();
    url.path_segments_mut()
        .map_err(|_| format!("{} cannot be used as a base url", base))?
        .pop_if_empty()
        .extend(segments)
        .push("");
    Ok(url)
}

fn parse_base(url: &str) -> Result<Url, String> {
    Url::parse(url).map_err(|e| format!("Invalid base url {}: {}", url, e))
}

// ============================================
// Catalog
// ============================================

/// Enterprise catalog client
pub struct HttpCatalogClient {
    client: Client,
    base_url: Url,
    access_token: Option<String>,
}

impl HttpCatalogClient {
    pub fn new(config: &ClientConfig) -> Result<Self, CatalogError> {
        Ok(Self {
            client: config.http_client().map_err(CatalogError::Transport)?,
            base_url: parse_base(&config.catalog_base_url).map_err(CatalogError::Transport)?,
            access_token: config.access_token.clone(),
        })
    }

    fn check(response: Response) -> Result<Response, CatalogError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        Err(CatalogError::http(
            status.as_u16(),
            status.canonical_reason().unwrap_or("Unknown"),
            response.url().as_str(),
        ))
    }
}

#[async_trait]
impl CatalogClient for HttpCatalogClient {
    async fn get_content_metadata(
        &self,
        enterprise_customer_uuid: &Uuid,
        content_identifier: &str,
    ) -> Result<CatalogContent, CatalogError> {
        let customer = enterprise_customer_uuid.to_string();
        let url = endpoint(
            &self.base_url,
            &["api", "v2", "enterprise-customer", &customer, "content-metadata", content_identifier],
        )
        .map_err(CatalogError::Transport)?;

        let mut request = self.client.get(url);
        if let Some(token) = &self.access_token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| CatalogError::Transport(e.to_string()))?;
        let response = Self::check(response)?;

        response
            .json::<CatalogContent>()
            .await
            .map_err(|e| CatalogError::Decode(e.to_string()))
    }
}

// ============================================
// Enrollment
// ============================================

#[derive(Debug, Serialize)]
struct EnrollmentInfo<'a> {
    user_id: i64,
    course_run_key: &'a str,
    transaction_id: Uuid,
}

#[derive(Debug, Serialize)]
struct BulkEnrollmentBody<'a> {
    enrollments_info: Vec<EnrollmentInfo<'a>>,
}

#[derive(Debug, Default, Deserialize)]
struct EnrollmentSuccess {
    #[serde(default)]
    enterprise_fulfillment_source_uuid: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct BulkEnrollmentResponse {
    #[serde(default)]
    successes: Vec<EnrollmentSuccess>,
    #[serde(default)]
    failures: Vec<serde_json::Value>,
}

/// LMS bulk enrollment client
pub struct HttpEnrollmentClient {
    client: Client,
    base_url: Url,
    access_token: Option<String>,
}

impl HttpEnrollmentClient {
    pub fn new(config: &ClientConfig) -> Result<Self, EnrollmentError> {
        Ok(Self {
            client: config.http_client().map_err(EnrollmentError::Request)?,
            base_url: parse_base(&config.lms_base_url).map_err(EnrollmentError::Request)?,
            access_token: config.access_token.clone(),
        })
    }
}

#[async_trait]
impl EnrollmentClient for HttpEnrollmentClient {
    async fn enroll(&self, request: &EnrollmentRequest) -> Result<String, EnrollmentError> {
        let customer = request.enterprise_customer_uuid.to_string();
        let url = endpoint(
            &self.base_url,
            &["enterprise", "api", "v1", "enterprise-customer", &customer, "enroll_learners_in_courses"],
        )
        .map_err(EnrollmentError::Request)?;

        let body = BulkEnrollmentBody {
            enrollments_info: vec![EnrollmentInfo {
                user_id: request.lms_user_id,
                course_run_key: &request.content_key,
                transaction_id: request.transaction_uuid,
            }],
        };

        let mut http = self.client.post(url).json(&body);
        if let Some(token) = &self.access_token {
            http = http.bearer_auth(token);
        }

        let response = http
            .send()
            .await
            .map_err(|e| EnrollmentError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(EnrollmentError::Request(format!("{} {}", status, text)));
        }

        let parsed: BulkEnrollmentResponse = response
            .json()
            .await
            .map_err(|e| EnrollmentError::Request(format!("Invalid enrollment response: {}", e)))?;

        if !parsed.failures.is_empty() {
            return Err(EnrollmentError::Rejected(
                serde_json::Value::Array(parsed.failures).to_string(),
            ));
        }

        parsed
            .successes
            .into_iter()
            .next()
            .and_then(|s| s.enterprise_fulfillment_source_uuid)
            .ok_or(EnrollmentError::MissingReference)
    }
}
