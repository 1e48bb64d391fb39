//! Outbound Collaborators
//!
//! Narrow interfaces to the catalog and enrollment services. The HTTP
//! implementations live in the API crate; tests inject doubles.

use crate::error::{CatalogError, EnrollmentError};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use uuid::Uuid;

/// Entitlement mode used by product-sourced (executive education) content
pub const EXECUTIVE_EDUCATION_MODE: &str = "paid-executive-education";

/// Entitlement mode used by regular courses
pub const VERIFIED_MODE: &str = "verified";

// ============================================
// Catalog Documents
// ============================================

/// Content metadata document returned by the catalog service
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogContent {
    pub key: String,
    pub uuid: Uuid,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub entitlements: Vec<Entitlement>,
    #[serde(default)]
    pub product_source: Option<ProductSource>,
}

impl CatalogContent {
    /// Entitlement mode that prices this content
    pub fn pricing_mode(&self) -> &'static str {
        if self.product_source.is_some() {
            EXECUTIVE_EDUCATION_MODE
        } else {
            VERIFIED_MODE
        }
    }

    /// Price of the entitlement matching the pricing mode, falling back to
    /// the first listed entitlement
    pub fn price(&self) -> Option<Decimal> {
        let mode = self.pricing_mode();
        self.entitlements
            .iter()
            .find(|e| e.mode.as_deref() == Some(mode))
            .or_else(|| self.entitlements.first())
            .map(|e| e.price)
    }
}

/// Purchasable entitlement of a content item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Entitlement {
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(deserialize_with = "deserialize_price")]
    pub price: Decimal,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub sku: Option<String>,
}

impl Entitlement {
    pub fn new(mode: impl Into<String>, price: Decimal) -> Self {
        Self {
            mode: Some(mode.into()),
            price,
            currency: Some("USD".to_string()),
            sku: None,
        }
    }
}

/// External product source (e.g. 2U)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProductSource {
    pub name: String,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

impl ProductSource {
    pub fn new(name: impl Into<String>) -> Self {
        let name = name.into();
        Self {
            slug: Some(name.clone()),
            name,
            description: None,
        }
    }
}

/// Catalog prices arrive either as JSON numbers or as decimal strings
fn deserialize_price<'de, D>(deserializer: D) -> Result<Decimal, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    let text = match &value {
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::String(s) => s.clone(),
        other => {
            return Err(serde::de::Error::custom(format!("invalid price: {}", other)));
        }
    };
    Decimal::from_str(&text)
        .or_else(|_| Decimal::from_scientific(&text))
        .map_err(|e| serde::de::Error::custom(format!("invalid price {}: {}", text, e)))
}

// ============================================
// Collaborator Traits
// ============================================

/// Catalog content metadata lookup
#[async_trait]
pub trait CatalogClient: Send + Sync {
    async fn get_content_metadata(
        &self,
        enterprise_customer_uuid: &Uuid,
        content_identifier: &str,
    ) -> Result<CatalogContent, CatalogError>;
}

/// Price lookup for a content item
#[async_trait]
pub trait PricingClient: Send + Sync {
    /// Price as a decimal string in major currency units (e.g. `"100.00"`)
    async fn get_course_price(
        &self,
        enterprise_customer_uuid: &Uuid,
        content_key: &str,
    ) -> Result<String, CatalogError>;
}

/// Enrollment request sent to the enrollment service
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct EnrollmentRequest {
    pub enterprise_customer_uuid: Uuid,
    pub lms_user_id: i64,
    pub content_key: String,
    /// Pending ledger transaction paying for the enrollment
    pub transaction_uuid: Uuid,
}

/// Side-effecting learner enrollment
#[async_trait]
pub trait EnrollmentClient: Send + Sync {
    /// Enroll and return the fulfillment reference id
    async fn enroll(&self, request: &EnrollmentRequest) -> Result<String, EnrollmentError>;
}

/// Pricing backed by catalog content metadata
pub struct CatalogPricing {
    catalog: Arc<dyn CatalogClient>,
}

impl CatalogPricing {
    pub fn new(catalog: Arc<dyn CatalogClient>) -> Self {
        Self { catalog }
    }
}

#[async_trait]
impl PricingClient for CatalogPricing {
    async fn get_course_price(
        &self,
        enterprise_customer_uuid: &Uuid,
        content_key: &str,
    ) -> Result<String, CatalogError> {
        let content = self
            .catalog
            .get_content_metadata(enterprise_customer_uuid, content_key)
            .await?;

        content
            .price()
            .map(|p| p.to_string())
            .ok_or_else(|| CatalogError::Decode(format!("no entitlement price for {}", content_key)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FixedCatalog(CatalogContent);

    #[async_trait]
    impl CatalogClient for FixedCatalog {
        async fn get_content_metadata(
            &self,
            _enterprise_customer_uuid: &Uuid,
            _content_identifier: &str,
        ) -> Result<CatalogContent, CatalogError> {
            Ok(self.0.clone())
        }
    }

    #[test]
    fn test_deserialize_catalog_document() {
        let json = serde_json::json!({
            "key": "edX+DemoX",
            "content_type": "course",
            "uuid": "8c2e8b25-4b6f-4b29-9f3b-2a3f5a3f0c11",
            "title": "Demonstration Course",
            "entitlements": [
                {"mode": "verified", "price": 100, "currency": "USD", "sku": "8A47F9E", "expires": "null"}
            ],
            "product_source": null
        });
        let content: CatalogContent = serde_json::from_value(json).unwrap();
        assert_eq!(content.key, "edX+DemoX");
        assert!(content.product_source.is_none());
        assert_eq!(content.price(), Some(Decimal::from(100)));
    }

    #[test]
    fn test_string_price() {
        let json = serde_json::json!({"mode": "verified", "price": "149.99"});
        let entitlement: Entitlement = serde_json::from_value(json).unwrap();
        assert_eq!(entitlement.price, Decimal::from_str("149.99").unwrap());
    }

    #[test]
    fn test_price_prefers_matching_mode() {
        let content = CatalogContent {
            key: "exec-ed".to_string(),
            uuid: Uuid::new_v4(),
            content_type: None,
            entitlements: vec![
                Entitlement::new("verified", Decimal::from(50)),
                Entitlement::new(EXECUTIVE_EDUCATION_MODE, Decimal::from(2000)),
            ],
            product_source: Some(ProductSource::new("2u")),
        };
        assert_eq!(content.price(), Some(Decimal::from(2000)));
    }

    #[tokio::test]
    async fn test_catalog_pricing() {
        let content = CatalogContent {
            key: "course-v1:edX+test".to_string(),
            uuid: Uuid::new_v4(),
            content_type: None,
            entitlements: vec![Entitlement::new("verified", Decimal::from_str("100.00").unwrap())],
            product_source: None,
        };
        let pricing = CatalogPricing::new(Arc::new(FixedCatalog(content)));
        let price = pricing
            .get_course_price(&Uuid::new_v4(), "course-v1:edX+test")
            .await
            .unwrap();
        assert_eq!(price, "100.00");
    }
}
