//! Content Metadata Service
//!
//! Resolves pricing metadata for catalog content, caching successful
//! resolutions per (content identifier, enterprise customer).

use crate::clients::CatalogClient;
use crate::error::MetadataError;
use crate::types::ContentMetadata;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;
use uuid::Uuid;

/// Default cache lifetime for resolved metadata
pub const DEFAULT_METADATA_TTL: Duration = Duration::from_secs(300);

type CacheKey = (String, Uuid);

#[derive(Debug, Clone)]
struct CacheEntry {
    metadata: ContentMetadata,
    expires_at: Instant,
}

/// TTL cache of resolved content metadata
#[derive(Debug)]
pub struct MetadataCache {
    ttl: Duration,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl MetadataCache {
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Fresh entry for the key, evicting it if expired
    pub async fn get(&self, content_identifier: &str, enterprise_customer_uuid: &Uuid) -> Option<ContentMetadata> {
        let key = (content_identifier.to_string(), *enterprise_customer_uuid);
        {
            let entries = self.entries.read().await;
            match entries.get(&key) {
                Some(entry) if entry.expires_at > Instant::now() => return Some(entry.metadata.clone()),
                Some(_) => {}
                None => return None,
            }
        }

        let mut entries = self.entries.write().await;
        if entries.get(&key).is_some_and(|e| e.expires_at <= Instant::now()) {
            entries.remove(&key);
        }
        None
    }

    /// Store an entry, sweeping out every expired one first
    pub async fn insert(&self, content_identifier: &str, enterprise_customer_uuid: &Uuid, metadata: ContentMetadata) {
        let now = Instant::now();
        let entry = CacheEntry {
            metadata,
            expires_at: now + self.ttl,
        };
        let mut entries = self.entries.write().await;
        entries.retain(|_, e| e.expires_at > now);
        entries.insert((content_identifier.to_string(), *enterprise_customer_uuid), entry);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    pub async fn clear(&self) {
        self.entries.write().await.clear();
    }
}

impl Default for MetadataCache {
    fn default() -> Self {
        Self::new(DEFAULT_METADATA_TTL)
    }
}

/// Resolved metadata and whether it came from the cache
#[derive(Debug, Clone, PartialEq)]
pub struct MetadataLookup {
    pub metadata: ContentMetadata,
    pub cache_hit: bool,
}

/// Cached content metadata resolution
pub struct ContentMetadataService {
    catalog: Arc<dyn CatalogClient>,
    cache: MetadataCache,
}

impl ContentMetadataService {
    pub fn new(catalog: Arc<dyn CatalogClient>, ttl: Duration) -> Self {
        Self {
            catalog,
            cache: MetadataCache::new(ttl),
        }
    }

    pub fn cache(&self) -> &MetadataCache {
        &self.cache
    }

    /// Resolve metadata for a content identifier (key or uuid) as seen by an
    /// enterprise customer.
    ///
    /// Only successful resolutions are cached.
    pub async fn lookup(
        &self,
        content_identifier: &str,
        enterprise_customer_uuid: &Uuid,
    ) -> Result<MetadataLookup, MetadataError> {
        if let Some(metadata) = self.cache.get(content_identifier, enterprise_customer_uuid).await {
            tracing::debug!(
                content_identifier,
                enterprise_customer_uuid = %enterprise_customer_uuid,
                "Content metadata cache hit"
            );
            return Ok(MetadataLookup {
                metadata,
                cache_hit: true,
            });
        }

        let content = self
            .catalog
            .get_content_metadata(enterprise_customer_uuid, content_identifier)
            .await
            .map_err(|e| {
                tracing::warn!(
                    content_identifier,
                    enterprise_customer_uuid = %enterprise_customer_uuid,
                    error = %e,
                    "Catalog lookup failed"
                );
                MetadataError::from(e)
            })?;

        let metadata = ContentMetadata::from_catalog(&content)?;
        self.cache
            .insert(content_identifier, enterprise_customer_uuid, metadata.clone())
            .await;

        Ok(MetadataLookup {
            metadata,
            cache_hit: false,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::{CatalogContent, Entitlement, ProductSource};
    use crate::error::CatalogError;
    use async_trait::async_trait;
    use rust_decimal::Decimal;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    struct CountingCatalog {
        calls: AtomicUsize,
        responses: Mutex<Vec<Result<CatalogContent, CatalogError>>>,
    }

    impl CountingCatalog {
        fn new(responses: Vec<Result<CatalogContent, CatalogError>>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                responses: Mutex::new(responses),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CatalogClient for CountingCatalog {
        async fn get_content_metadata(
            &self,
            _enterprise_customer_uuid: &Uuid,
            _content_identifier: &str,
        ) -> Result<CatalogContent, CatalogError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.responses.lock().unwrap().remove(0)
        }
    }

    fn course(product_source: Option<ProductSource>) -> CatalogContent {
        CatalogContent {
            key: "edX+DemoX".to_string(),
            uuid: Uuid::new_v4(),
            content_type: Some("course".to_string()),
            entitlements: vec![
                Entitlement::new("verified", Decimal::from(100)),
                Entitlement::new("paid-executive-education", Decimal::from(200)),
            ],
            product_source,
        }
    }

    #[tokio::test]
    async fn test_second_lookup_hits_cache() {
        let catalog = CountingCatalog::new(vec![Ok(course(None))]);
        let service = ContentMetadataService::new(catalog.clone(), DEFAULT_METADATA_TTL);
        let enterprise = Uuid::new_v4();

        let first = service.lookup("edX+DemoX", &enterprise).await.unwrap();
        assert!(!first.cache_hit);
        assert_eq!(first.metadata.source, "edX");
        assert_eq!(first.metadata.content_price, Decimal::from(100));

        let second = service.lookup("edX+DemoX", &enterprise).await.unwrap();
        assert!(second.cache_hit);
        assert_eq!(second.metadata, first.metadata);
        assert_eq!(catalog.calls(), 1);
    }

    #[tokio::test]
    async fn test_cache_is_per_enterprise() {
        let catalog = CountingCatalog::new(vec![Ok(course(None)), Ok(course(Some(ProductSource::new("2u"))))]);
        let service = ContentMetadataService::new(catalog.clone(), DEFAULT_METADATA_TTL);

        service.lookup("edX+DemoX", &Uuid::new_v4()).await.unwrap();
        let other = service.lookup("edX+DemoX", &Uuid::new_v4()).await.unwrap();
        assert!(!other.cache_hit);
        assert_eq!(other.metadata.source, "2u");
        assert_eq!(other.metadata.content_price, Decimal::from(200));
        assert_eq!(catalog.calls(), 2);
    }

    #[tokio::test]
    async fn test_failures_are_not_cached() {
        let catalog = CountingCatalog::new(vec![
            Err(CatalogError::http(404, "Not Found", "http://catalog/x")),
            Ok(course(None)),
        ]);
        let service = ContentMetadataService::new(catalog.clone(), DEFAULT_METADATA_TTL);
        let enterprise = Uuid::new_v4();

        let err = service.lookup("edX+DemoX", &enterprise).await.unwrap_err();
        assert_eq!(err, MetadataError::ContentNotFound);
        assert!(service.cache().is_empty().await);

        let ok = service.lookup("edX+DemoX", &enterprise).await.unwrap();
        assert!(!ok.cache_hit);
        assert_eq!(catalog.calls(), 2);
    }

    #[tokio::test]
    async fn test_upstream_error_text() {
        let catalog = CountingCatalog::new(vec![Err(CatalogError::http(
            403,
            "Forbidden",
            "http://catalog/api/v2/x",
        ))]);
        let service = ContentMetadataService::new(catalog, DEFAULT_METADATA_TTL);

        let err = service.lookup("edX+DemoX", &Uuid::new_v4()).await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Failed to fetch data from catalog service with exc: 403 Client Error: Forbidden for url: http://catalog/api/v2/x"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_insert_sweeps_expired_entries() {
        let cache = MetadataCache::new(Duration::from_secs(1));
        let metadata = ContentMetadata::from_catalog(&course(None)).unwrap();

        for _ in 0..100 {
            cache.insert("edX+DemoX", &Uuid::new_v4(), metadata.clone()).await;
        }
        assert_eq!(cache.len().await, 100);

        tokio::time::advance(Duration::from_secs(3600)).await;
        let enterprise = Uuid::new_v4();
        cache.insert("edX+DemoX", &enterprise, metadata.clone()).await;
        assert_eq!(cache.len().await, 1);
        assert_eq!(cache.get("edX+DemoX", &enterprise).await, Some(metadata));
    }

    #[tokio::test(start_paused = true)]
    async fn test_entries_expire_after_ttl() {
        let catalog = CountingCatalog::new(vec![Ok(course(None)), Ok(course(None))]);
        let service = ContentMetadataService::new(catalog.clone(), Duration::from_secs(60));
        let enterprise = Uuid::new_v4();

        service.lookup("edX+DemoX", &enterprise).await.unwrap();
        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(service.lookup("edX+DemoX", &enterprise).await.unwrap().cache_hit);

        tokio::time::advance(Duration::from_secs(31)).await;
        assert!(service.cache().get("edX+DemoX", &enterprise).await.is_none());
        assert!(service.cache().is_empty().await);

        let refreshed = service.lookup("edX+DemoX", &enterprise).await.unwrap();
        assert!(!refreshed.cache_hit);
        assert_eq!(catalog.calls(), 2);
    }
}
