//! Two-layer cache for the products catalog.
//!
//! - **L0 (Query Cache)**: listing pages keyed by resolved parameters, each
//!   with a staleness flag flipped by product writes
//! - **L1 (Response Cache)**: rendered responses of data-independent routes
//!
//! ## Configuration
//!
//! ```toml
//! [cache]
//! enable_l0_cache = true
//! enable_l1_cache = true
//! l0_query_limit = 256
//! # ... see config.rs for all options
//! ```

mod config;
mod consumer;
mod events;
mod keys;
mod lock;
mod middleware;
mod planner;
mod registry;
mod store;
mod trigger;

pub use config::CacheConfig;
pub use consumer::{CacheConsumer, store_listing};
pub use events::{CacheEvent, Epoch, EventKind, EventQueue};
pub use keys::{CacheKey, EntityKey, L0Key, L1Key, hash_query, hash_value};
pub use middleware::{CacheState, response_cache_layer};
pub use planner::ConsumptionPlan;
pub use registry::CacheRegistry;
pub use store::{CacheEntry, CachedResponse, FillOutcome, Generation, L0Store, L1Store, Lookup};
pub use trigger::CacheTrigger;
