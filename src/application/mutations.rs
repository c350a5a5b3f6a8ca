//! Product writes and the listing invalidation that follows them.

use std::sync::Arc;

use metrics::counter;
use thiserror::Error;
use tracing::{error, info, instrument, warn};

use crate::application::repos::{ProductsWriteRepo, RepoError};
use crate::cache::CacheTrigger;
use crate::domain::products::{NewProduct, ProductRecord};

const METRIC_MUTATION_TOTAL: &str = "vitrine_mutation_total";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MutationFailed {
    #[error("product rejected: {message}")]
    Rejected { message: String },
    #[error("product write failed: {detail}")]
    WriteFailed { detail: String },
}

impl From<RepoError> for MutationFailed {
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::Rejected { message } => Self::Rejected { message },
            other => Self::WriteFailed {
                detail: other.to_string(),
            },
        }
    }
}

/// Result of one write. Failures are values, never errors raised past `apply`.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationOutcome {
    Created(ProductRecord),
    Failed(MutationFailed),
}

impl MutationOutcome {
    pub fn success(&self) -> bool {
        matches!(self, Self::Created(_))
    }

    fn label(&self) -> &'static str {
        match self {
            Self::Created(_) => "created",
            Self::Failed(MutationFailed::Rejected { .. }) => "rejected",
            Self::Failed(MutationFailed::WriteFailed { .. }) => "write_failed",
        }
    }
}

#[derive(Clone)]
pub struct ProductMutationService {
    writer: Arc<dyn ProductsWriteRepo>,
    cache: Arc<CacheTrigger>,
}

impl ProductMutationService {
    pub fn new(writer: Arc<dyn ProductsWriteRepo>, cache: Arc<CacheTrigger>) -> Self {
        Self { writer, cache }
    }

    /// Create a product and, once the write succeeded, mark every cached
    /// listing page stale.
    #[instrument(skip(self, input), fields(name = %input.name))]
    pub async fn apply(&self, input: NewProduct) -> MutationOutcome {
        let outcome = self.write(input).await;
        counter!(METRIC_MUTATION_TOTAL, "outcome" => outcome.label()).increment(1);

        match &outcome {
            MutationOutcome::Created(product) => {
                self.cache.product_created(product.id).await;
                info!(product_id = product.id, "product created");
            }
            MutationOutcome::Failed(failure @ MutationFailed::Rejected { .. }) => {
                warn!(error = %failure, "product write rejected");
            }
            MutationOutcome::Failed(failure) => {
                error!(error = %failure, "product write failed");
            }
        }

        outcome
    }

    async fn write(&self, input: NewProduct) -> MutationOutcome {
        let product = match input.validated() {
            Ok(product) => product,
            Err(err) => {
                return MutationOutcome::Failed(MutationFailed::Rejected {
                    message: err.to_string(),
                });
            }
        };

        match self.writer.create_product(product).await {
            Ok(record) => MutationOutcome::Created(record),
            Err(err) => MutationOutcome::Failed(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;
    use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

    use async_trait::async_trait;

    use super::*;
    use crate::application::params::ProductQuery;
    use crate::cache::{
        CacheConfig, CacheConsumer, CacheRegistry, EventQueue, L0Store, L1Store, Lookup,
        store_listing,
    };

    #[derive(Default)]
    struct FlakyWriter {
        next_id: AtomicU32,
        fail: AtomicBool,
    }

    #[async_trait]
    impl ProductsWriteRepo for FlakyWriter {
        async fn create_product(&self, product: NewProduct) -> Result<ProductRecord, RepoError> {
            if self.fail.load(Ordering::SeqCst) {
                return Err(RepoError::from_persistence("disk full"));
            }
            Ok(ProductRecord {
                id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
                name: product.name,
                price: product.price,
                description: product.description,
            })
        }
    }

    struct Fixture {
        writer: Arc<FlakyWriter>,
        l0: Arc<L0Store>,
        registry: Arc<CacheRegistry>,
        service: ProductMutationService,
    }

    fn fixture() -> Fixture {
        let config = CacheConfig::default();
        let l0 = Arc::new(L0Store::new(&config));
        let registry = Arc::new(CacheRegistry::new());
        let queue = Arc::new(EventQueue::new());
        let consumer = Arc::new(CacheConsumer::without_repo(
            config.clone(),
            l0.clone(),
            Arc::new(L1Store::new(&config)),
            registry.clone(),
            queue.clone(),
        ));
        let trigger = Arc::new(CacheTrigger::new(config, queue, consumer));
        let writer = Arc::new(FlakyWriter::default());

        Fixture {
            service: ProductMutationService::new(writer.clone(), trigger),
            writer,
            l0,
            registry,
        }
    }

    fn cached_query(fx: &Fixture, q: &str) -> ProductQuery {
        let query = ProductQuery::new(q, NonZeroU32::MIN);
        store_listing(&fx.l0, &fx.registry, query.clone(), Vec::new(), fx.l0.generation());
        query
    }

    fn lamp() -> NewProduct {
        NewProduct {
            name: "Lamp".to_string(),
            price: 120,
            description: String::new(),
        }
    }

    #[tokio::test]
    async fn successful_write_marks_all_listings_stale() {
        let fx = fixture();
        let plain = cached_query(&fx, "");
        let search = cached_query(&fx, "shoes");

        let outcome = fx.service.apply(lamp()).await;

        assert!(outcome.success());
        assert_eq!(fx.l0.lookup_product_list(&plain), Lookup::Stale);
        assert_eq!(fx.l0.lookup_product_list(&search), Lookup::Stale);
    }

    #[tokio::test]
    async fn failed_write_leaves_cache_untouched() {
        let fx = fixture();
        let query = cached_query(&fx, "");
        fx.writer.fail.store(true, Ordering::SeqCst);

        let outcome = fx.service.apply(lamp()).await;

        assert!(!outcome.success());
        assert!(matches!(
            outcome,
            MutationOutcome::Failed(MutationFailed::WriteFailed { .. })
        ));
        assert!(matches!(fx.l0.lookup_product_list(&query), Lookup::Fresh(_)));
    }

    #[tokio::test]
    async fn invalid_input_is_rejected_before_the_store() {
        let fx = fixture();
        let query = cached_query(&fx, "");

        let outcome = fx
            .service
            .apply(NewProduct {
                name: "   ".to_string(),
                price: 10,
                description: String::new(),
            })
            .await;

        assert!(matches!(
            outcome,
            MutationOutcome::Failed(MutationFailed::Rejected { .. })
        ));
        assert_eq!(fx.writer.next_id.load(Ordering::SeqCst), 0);
        assert!(matches!(fx.l0.lookup_product_list(&query), Lookup::Fresh(_)));
    }
}
