//! Cache consumer for executing consumption plans.
//!
//! Drains events from the queue and applies invalidation and warming actions.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Instant;

use metrics::histogram;
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::application::params::ProductQuery;
use crate::application::repos::ProductsRepo;
use crate::domain::products::ProductRecord;

use super::config::CacheConfig;
use super::events::EventQueue;
use super::keys::{CacheKey, EntityKey, L0Key};
use super::planner::ConsumptionPlan;
use super::registry::CacheRegistry;
use super::store::{FillOutcome, Generation, L0Store, L1Store};

const METRIC_CACHE_CONSUME_MS: &str = "vitrine_cache_consume_ms";
const METRIC_CACHE_WARM_MS: &str = "vitrine_cache_warm_ms";

/// Store a computed listing page and register it under the listing scope.
///
/// Returns false when the fill was discarded because an invalidation
/// happened after `observed` was captured.
pub fn store_listing(
    l0: &L0Store,
    registry: &CacheRegistry,
    query: ProductQuery,
    records: Vec<ProductRecord>,
    observed: Generation,
) -> bool {
    match l0.fill_product_list(query.clone(), records, observed) {
        FillOutcome::Stored { evicted } => {
            registry.register(
                CacheKey::L0(L0Key::ProductList(query)),
                HashSet::from([EntityKey::ProductsListing]),
            );
            if let Some(evicted) = evicted {
                registry.unregister(&CacheKey::L0(L0Key::ProductList(evicted)));
            }
            true
        }
        FillOutcome::Discarded => {
            debug!(
                q = %query.q,
                page = query.page_number(),
                "listing fill discarded after concurrent invalidation"
            );
            false
        }
    }
}

/// Processes cache events and keeps the stores consistent with writes.
///
/// 1. Drains events from the queue
/// 2. Folds them into a consumption plan
/// 3. Executes the plan (mark L0 stale, drop L1, warm)
///
/// Batches run one at a time, so a caller that finds the queue empty still
/// waits for a batch another task drained but has not yet applied.
pub struct CacheConsumer {
    config: CacheConfig,
    serial: Mutex<()>,
    l0: Arc<L0Store>,
    l1: Arc<L1Store>,
    registry: Arc<CacheRegistry>,
    queue: Arc<EventQueue>,
    repo: Option<Arc<dyn ProductsRepo>>,
}

impl CacheConsumer {
    pub fn new(
        config: CacheConfig,
        l0: Arc<L0Store>,
        l1: Arc<L1Store>,
        registry: Arc<CacheRegistry>,
        queue: Arc<EventQueue>,
        repo: Arc<dyn ProductsRepo>,
    ) -> Self {
        Self {
            config,
            serial: Mutex::new(()),
            l0,
            l1,
            registry,
            queue,
            repo: Some(repo),
        }
    }

    /// Create a consumer without repository access (warming disabled).
    pub fn without_repo(
        config: CacheConfig,
        l0: Arc<L0Store>,
        l1: Arc<L1Store>,
        registry: Arc<CacheRegistry>,
        queue: Arc<EventQueue>,
    ) -> Self {
        Self {
            config,
            serial: Mutex::new(()),
            l0,
            l1,
            registry,
            queue,
            repo: None,
        }
    }

    /// Consume pending events and execute the plan.
    ///
    /// Returns true if any events were processed.
    #[instrument(skip(self))]
    pub async fn consume(&self) -> bool {
        self.consume_with_mode(true).await
    }

    /// Consume pending events and run only invalidation actions.
    #[instrument(skip(self))]
    pub async fn consume_invalidate_only(&self) -> bool {
        self.consume_with_mode(false).await
    }

    /// Consume batches until the queue is empty.
    ///
    /// Every event published before the call has been applied when it returns.
    #[instrument(skip(self))]
    pub async fn consume_all(&self) -> bool {
        let _serial = self.serial.lock().await;
        let mut consumed = false;
        while self.consume_batch(true).await {
            consumed = true;
        }
        consumed
    }

    async fn consume_with_mode(&self, include_warm: bool) -> bool {
        let _serial = self.serial.lock().await;
        self.consume_batch(include_warm).await
    }

    async fn consume_batch(&self, include_warm: bool) -> bool {
        let consume_started_at = Instant::now();
        let events = self.queue.drain(self.config.consume_batch_limit);
        if events.is_empty() {
            return false;
        }

        let event_count = events.len();
        let event_ids: Vec<Uuid> = events.iter().map(|e| e.id).collect();
        let plan = ConsumptionPlan::from_events(events);

        info!(
            event_count,
            event_ids = ?event_ids,
            plan = %plan,
            include_warm,
            "Cache consumption starting"
        );

        if !plan.invalidate_entities.is_empty() {
            self.invalidate(&plan);
        }

        if include_warm && self.config.enable_l0_cache && plan.has_warm_actions() {
            self.warm(&plan).await;
        }

        info!(
            event_count,
            invalidated = plan.invalidate_entities.len(),
            created = ?plan.created_products,
            "Cache consumption complete"
        );

        histogram!(
            METRIC_CACHE_CONSUME_MS,
            "mode" => if include_warm { "full" } else { "invalidate_only" }
        )
        .record(consume_started_at.elapsed().as_secs_f64() * 1000.0);

        true
    }

    /// Mark L0 listings stale and drop registered L1 responses.
    ///
    /// The listing scope covers every L0 entry, so all of them flip whether or
    /// not their registration has landed yet. The generation advances even
    /// when the store is empty, so fetches already in flight cannot store
    /// pre-write results.
    fn invalidate(&self, plan: &ConsumptionPlan) {
        for entity in &plan.invalidate_entities {
            let flipped = match entity {
                EntityKey::ProductsListing => self.l0.mark_all_stale(),
            };
            debug!(entity = ?entity, flipped, "L0 entries marked stale");

            for key in self.registry.keys_for_entity(entity) {
                if let CacheKey::L1(l1_key) = &key {
                    self.l1.invalidate(l1_key);
                    self.registry.unregister(&key);
                }
            }
        }
    }

    /// Refill the default listing page from the repository.
    async fn warm(&self, plan: &ConsumptionPlan) {
        let warm_started_at = Instant::now();

        let Some(repo) = &self.repo else {
            debug!("Warming skipped: no repository access");
            return;
        };

        if plan.warm_default_listing {
            let query = ProductQuery::default();
            let observed = self.l0.generation();
            match repo.list_products(&query).await {
                Ok(records) => {
                    if store_listing(&self.l0, &self.registry, query, records, observed) {
                        debug!("Warmed: default listing");
                    }
                }
                Err(err) => warn!(error = %err, "Warming the default listing failed"),
            }
        }

        histogram!(METRIC_CACHE_WARM_MS).record(warm_started_at.elapsed().as_secs_f64() * 1000.0);
    }
}
