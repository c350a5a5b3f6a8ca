//! Listing pages served through the query cache.

use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, instrument};

use crate::application::params::ProductQuery;
use crate::application::repos::{ProductsRepo, RepoError};
use crate::cache::{CacheRegistry, L0Store, Lookup, store_listing};
use crate::domain::products::ProductRecord;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("product data provider unavailable")]
    ProviderUnavailable(#[source] RepoError),
}

impl From<RepoError> for CatalogError {
    fn from(err: RepoError) -> Self {
        Self::ProviderUnavailable(err)
    }
}

#[derive(Clone)]
struct ListingCache {
    l0: Arc<L0Store>,
    registry: Arc<CacheRegistry>,
}

/// Produces listing pages from the backing store.
///
/// Fresh cached pages are served as-is; stale or missing pages are
/// recomputed and stored again under the listing scope.
#[derive(Clone)]
pub struct CatalogService {
    repo: Arc<dyn ProductsRepo>,
    cache: Option<ListingCache>,
}

impl CatalogService {
    /// A provider that always reads through to the store.
    pub fn new(repo: Arc<dyn ProductsRepo>) -> Self {
        Self { repo, cache: None }
    }

    pub fn with_cache(
        repo: Arc<dyn ProductsRepo>,
        l0: Arc<L0Store>,
        registry: Arc<CacheRegistry>,
    ) -> Self {
        Self {
            repo,
            cache: Some(ListingCache { l0, registry }),
        }
    }

    #[instrument(skip(self), fields(q = %query.q, page = query.page_number()))]
    pub async fn fetch(&self, query: &ProductQuery) -> Result<Vec<ProductRecord>, CatalogError> {
        let Some(cache) = &self.cache else {
            return Ok(self.repo.list_products(query).await?);
        };

        match cache.l0.lookup_product_list(query) {
            Lookup::Fresh(records) => {
                debug!(cache = "l0", outcome = "hit", "listing served from cache");
                return Ok(records);
            }
            Lookup::Stale => debug!(cache = "l0", outcome = "stale", "recomputing listing"),
            Lookup::Miss => debug!(cache = "l0", outcome = "miss", "computing listing"),
        }

        let observed = cache.l0.generation();
        let records = self.repo.list_products(query).await?;
        store_listing(
            &cache.l0,
            &cache.registry,
            query.clone(),
            records.clone(),
            observed,
        );
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::cache::CacheConfig;

    #[derive(Default)]
    struct CountingRepo {
        calls: AtomicUsize,
        down: AtomicBool,
    }

    #[async_trait]
    impl ProductsRepo for CountingRepo {
        async fn list_products(
            &self,
            query: &ProductQuery,
        ) -> Result<Vec<ProductRecord>, RepoError> {
            if self.down.load(Ordering::SeqCst) {
                return Err(RepoError::unavailable("offline"));
            }
            let call = self.calls.fetch_add(1, Ordering::SeqCst) as u32;
            Ok(vec![ProductRecord {
                id: query.page_number(),
                name: format!("call {call}"),
                price: 100,
                description: String::new(),
            }])
        }
    }

    fn cached_service(repo: Arc<CountingRepo>) -> (CatalogService, Arc<L0Store>) {
        let l0 = Arc::new(L0Store::new(&CacheConfig::default()));
        let registry = Arc::new(CacheRegistry::new());
        (CatalogService::with_cache(repo, l0.clone(), registry), l0)
    }

    #[tokio::test]
    async fn fresh_entries_are_served_without_the_store() {
        let repo = Arc::new(CountingRepo::default());
        let (service, _) = cached_service(repo.clone());
        let query = ProductQuery::default();

        let first = service.fetch(&query).await.expect("first fetch");
        let second = service.fetch(&query).await.expect("second fetch");

        assert_eq!(first, second);
        assert_eq!(repo.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn stale_entries_are_recomputed() {
        let repo = Arc::new(CountingRepo::default());
        let (service, l0) = cached_service(repo.clone());
        let query = ProductQuery::default();

        service.fetch(&query).await.expect("fill");
        l0.mark_stale([&query]);

        let records = service.fetch(&query).await.expect("refetch");
        assert_eq!(records[0].name, "call 1");
        assert!(!l0.peek_product_list(&query).expect("entry").stale);
    }

    #[tokio::test]
    async fn store_failure_surfaces_as_provider_unavailable() {
        let repo = Arc::new(CountingRepo::default());
        repo.down.store(true, Ordering::SeqCst);
        let (service, l0) = cached_service(repo);

        let err = service
            .fetch(&ProductQuery::default())
            .await
            .expect_err("store is down");

        assert!(matches!(
            err,
            CatalogError::ProviderUnavailable(RepoError::Unavailable(_))
        ));
        assert!(l0.is_empty());
    }

    #[tokio::test]
    async fn uncached_provider_reads_through_every_time() {
        let repo = Arc::new(CountingRepo::default());
        let service = CatalogService::new(repo.clone());

        service.fetch(&ProductQuery::default()).await.expect("fetch");
        service.fetch(&ProductQuery::default()).await.expect("fetch");

        assert_eq!(repo.calls.load(Ordering::SeqCst), 2);
    }
}
