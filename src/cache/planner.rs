//! Consumption plan generation.
//!
//! Folds a batch of cache events into the scopes to invalidate and the
//! entries to warm.

use std::collections::HashSet;
use std::fmt;

use super::events::{CacheEvent, EventKind};
use super::keys::EntityKey;

#[derive(Debug, Default)]
pub struct ConsumptionPlan {
    pub invalidate_entities: HashSet<EntityKey>,
    /// Whether to refill the default listing page.
    pub warm_default_listing: bool,
    /// Products written in this batch, for logging.
    pub created_products: Vec<u32>,
}

impl fmt::Display for ConsumptionPlan {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ConsumptionPlan {{ invalidate: {}, warm_default_listing: {}, created: {} }}",
            self.invalidate_entities.len(),
            self.warm_default_listing,
            self.created_products.len(),
        )
    }
}

impl ConsumptionPlan {
    /// Merge events into one plan, dropping duplicates by event id.
    pub fn from_events(events: Vec<CacheEvent>) -> Self {
        let mut plan = Self::default();
        let mut seen_ids = HashSet::new();

        for event in events.into_iter().filter(|e| seen_ids.insert(e.id)) {
            match event.kind {
                EventKind::ProductCreated { product_id } => {
                    plan.invalidate_entities.insert(EntityKey::ProductsListing);
                    plan.created_products.push(product_id);
                }
                EventKind::WarmupOnStartup => {
                    plan.warm_default_listing = true;
                }
            }
        }

        plan
    }

    pub fn has_warm_actions(&self) -> bool {
        self.warm_default_listing
    }
}
