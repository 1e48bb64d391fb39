//! Content Metadata

use crate::clients::CatalogContent;
use crate::error::MetadataError;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Source label for content without a product source
pub const DEFAULT_CONTENT_SOURCE: &str = "edX";

/// Pricing-relevant view of a catalog content item
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ContentMetadata {
    pub content_uuid: Uuid,
    pub content_key: String,
    pub source: String,
    #[serde(with = "price")]
    pub content_price: Decimal,
}

/// Whole prices go over the wire as integers, fractional ones as floats
mod price {
    use rust_decimal::prelude::ToPrimitive;
    use rust_decimal::Decimal;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(price: &Decimal, serializer: S) -> Result<S::Ok, S::Error> {
        match price.fract().is_zero().then(|| price.to_i64()).flatten() {
            Some(whole) => serializer.serialize_i64(whole),
            None => rust_decimal::serde::float::serialize(price, serializer),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Decimal, D::Error> {
        rust_decimal::serde::float::deserialize(deserializer)
    }
}

impl ContentMetadata {
    /// Translate a catalog document
    pub fn from_catalog(content: &CatalogContent) -> Result<Self, MetadataError> {
        let source = content
            .product_source
            .as_ref()
            .map(|ps| ps.name.clone())
            .unwrap_or_else(|| DEFAULT_CONTENT_SOURCE.to_string());

        let content_price = content
            .price()
            .ok_or_else(|| MetadataError::MissingPrice {
                content_key: content.key.clone(),
            })?;

        Ok(Self {
            content_uuid: content.uuid,
            content_key: content.key.clone(),
            source,
            content_price,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{Entitlement, ProductSource};

    fn catalog(product_source: Option<ProductSource>, entitlements: Vec<Entitlement>) -> CatalogContent {
        CatalogContent {
            key: "edX+DemoX".to_string(),
            uuid: Uuid::new_v4(),
            content_type: Some("course".to_string()),
            entitlements,
            product_source,
        }
    }

    #[test]
    fn test_edx_source_default() {
        let content = catalog(None, vec![Entitlement::new("verified", Decimal::from(100))]);
        let metadata = ContentMetadata::from_catalog(&content).unwrap();
        assert_eq!(metadata.source, "edX");
        assert_eq!(metadata.content_price, Decimal::from(100));
        assert_eq!(metadata.content_key, "edX+DemoX");
        assert_eq!(metadata.content_uuid, content.uuid);
    }

    #[test]
    fn test_product_source_name() {
        let content = catalog(
            Some(ProductSource::new("2u")),
            vec![Entitlement::new("paid-executive-education", Decimal::from(200))],
        );
        let metadata = ContentMetadata::from_catalog(&content).unwrap();
        assert_eq!(metadata.source, "2u");
        assert_eq!(metadata.content_price, Decimal::from(200));
    }

    #[test]
    fn test_missing_price() {
        let content = catalog(None, vec![]);
        assert_eq!(
            ContentMetadata::from_catalog(&content),
            Err(MetadataError::MissingPrice {
                content_key: "edX+DemoX".to_string()
            })
        );
    }

    #[test]
    fn test_price_serializes_as_number() {
        let mut metadata = ContentMetadata {
            content_uuid: Uuid::nil(),
            content_key: "k".to_string(),
            source: "edX".to_string(),
            content_price: Decimal::from(100),
        };
        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["content_price"], serde_json::json!(100));
        assert_eq!(
            value,
            serde_json::json!({
                "content_uuid": "00000000-0000-0000-0000-000000000000",
                "content_key": "k",
                "source": "edX",
                "content_price": 100
            })
        );

        metadata.content_price = Decimal::new(19999, 2);
        let value = serde_json::to_value(&metadata).unwrap();
        assert_eq!(value["content_price"], serde_json::json!(199.99));
    }

    #[test]
    fn test_integer_price_deserializes() {
        let json = r#"{"content_uuid": "00000000-0000-0000-0000-000000000000", "content_key": "k", "source": "2u", "content_price": 2000}"#;
        let metadata: ContentMetadata = serde_json::from_str(json).unwrap();
        assert_eq!(metadata.content_price, Decimal::from(2000));
    }
}
