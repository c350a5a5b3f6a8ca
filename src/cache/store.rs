//! Cache storage implementations.
//!
//! L0: listing pages keyed by resolved parameters, each carrying a staleness flag.
//! L1: rendered HTTP responses for data-independent routes.

use std::sync::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use lru::LruCache;
use metrics::counter;

use crate::application::params::ProductQuery;
use crate::domain::products::ProductRecord;

use super::config::CacheConfig;
use super::keys::L1Key;
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::store";

const METRIC_L0_HIT: &str = "vitrine_cache_l0_hit_total";
const METRIC_L0_MISS: &str = "vitrine_cache_l0_miss_total";
const METRIC_L0_STALE: &str = "vitrine_cache_l0_stale_total";
const METRIC_L0_EVICT: &str = "vitrine_cache_l0_evict_total";
const METRIC_L1_HIT: &str = "vitrine_cache_l1_hit_total";
const METRIC_L1_MISS: &str = "vitrine_cache_l1_miss_total";

/// Invalidation generation of the L0 store.
///
/// A fill only lands if no invalidation happened since the generation was
/// observed, so a fetch that started before a mutation cannot publish a
/// fresh-looking entry after it.
pub type Generation = u64;

/// A cached value and its staleness flag.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry<T> {
    pub value: T,
    pub stale: bool,
    pub filled_at: Generation,
}

/// Result of an L0 lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup<T> {
    Fresh(T),
    /// Present but invalidated; callers recompute instead of serving it.
    Stale,
    Miss,
}

/// Result of an L0 fill.
#[derive(Debug, Clone, PartialEq)]
pub enum FillOutcome {
    Stored { evicted: Option<ProductQuery> },
    /// An invalidation happened while the value was being computed.
    Discarded,
}

// ============================================================================
// L0 Store: Query Cache
// ============================================================================

pub struct L0Store {
    product_lists: RwLock<LruCache<ProductQuery, CacheEntry<Vec<ProductRecord>>>>,
    generation: AtomicU64,
}

impl L0Store {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            product_lists: RwLock::new(LruCache::new(config.l0_query_limit_non_zero())),
            generation: AtomicU64::new(0),
        }
    }

    /// Current invalidation generation; capture before computing a value to fill.
    pub fn generation(&self) -> Generation {
        self.generation.load(Ordering::Acquire)
    }

    pub fn lookup_product_list(&self, query: &ProductQuery) -> Lookup<Vec<ProductRecord>> {
        let mut lists = rw_write(&self.product_lists, SOURCE, "lookup_product_list");
        match lists.get(query) {
            Some(entry) if !entry.stale => {
                counter!(METRIC_L0_HIT).increment(1);
                Lookup::Fresh(entry.value.clone())
            }
            Some(_) => {
                counter!(METRIC_L0_STALE).increment(1);
                Lookup::Stale
            }
            None => {
                counter!(METRIC_L0_MISS).increment(1);
                Lookup::Miss
            }
        }
    }

    /// Inspect an entry without touching recency or metrics.
    pub fn peek_product_list(&self, query: &ProductQuery) -> Option<CacheEntry<Vec<ProductRecord>>> {
        rw_read(&self.product_lists, SOURCE, "peek_product_list")
            .peek(query)
            .cloned()
    }

    pub fn fill_product_list(
        &self,
        query: ProductQuery,
        value: Vec<ProductRecord>,
        observed: Generation,
    ) -> FillOutcome {
        let mut lists = rw_write(&self.product_lists, SOURCE, "fill_product_list");
        if self.generation.load(Ordering::Acquire) != observed {
            return FillOutcome::Discarded;
        }

        let entry = CacheEntry {
            value,
            stale: false,
            filled_at: observed,
        };
        let evicted = lists
            .push(query.clone(), entry)
            .map(|(evicted_key, _)| evicted_key)
            .filter(|evicted_key| *evicted_key != query);

        if evicted.is_some() {
            counter!(METRIC_L0_EVICT).increment(1);
        }

        FillOutcome::Stored { evicted }
    }

    /// Flag the given listing pages stale and advance the generation.
    ///
    /// Returns how many present entries flipped from fresh to stale.
    pub fn mark_stale<'a, I>(&self, queries: I) -> usize
    where
        I: IntoIterator<Item = &'a ProductQuery>,
    {
        let mut lists = rw_write(&self.product_lists, SOURCE, "mark_stale");
        self.generation.fetch_add(1, Ordering::AcqRel);

        let mut flipped = 0;
        for query in queries {
            if let Some(entry) = lists.peek_mut(query)
                && !entry.stale
            {
                entry.stale = true;
                flipped += 1;
            }
        }
        flipped
    }

    /// Flag every listing page stale and advance the generation.
    ///
    /// Runs under the same lock as fills, so an entry stored just before the
    /// call is flipped even if it was never registered.
    pub fn mark_all_stale(&self) -> usize {
        let mut lists = rw_write(&self.product_lists, SOURCE, "mark_all_stale");
        self.generation.fetch_add(1, Ordering::AcqRel);

        let mut flipped = 0;
        for (_, entry) in lists.iter_mut() {
            if !entry.stale {
                entry.stale = true;
                flipped += 1;
            }
        }
        flipped
    }

    pub fn len(&self) -> usize {
        rw_read(&self.product_lists, SOURCE, "len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ============================================================================
// L1 Store: Response Cache
// ============================================================================

#[derive(Clone)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

pub struct L1Store {
    responses: RwLock<LruCache<L1Key, CachedResponse>>,
}

impl L1Store {
    pub fn new(config: &CacheConfig) -> Self {
        Self {
            responses: RwLock::new(LruCache::new(config.l1_response_limit_non_zero())),
        }
    }

    pub fn get(&self, key: &L1Key) -> Option<CachedResponse> {
        let cached = rw_write(&self.responses, SOURCE, "l1_get")
            .get(key)
            .cloned();
        match cached {
            Some(_) => counter!(METRIC_L1_HIT).increment(1),
            None => counter!(METRIC_L1_MISS).increment(1),
        }
        cached
    }

    pub fn set(&self, key: L1Key, response: CachedResponse) -> Option<L1Key> {
        rw_write(&self.responses, SOURCE, "l1_set")
            .push(key.clone(), response)
            .map(|(evicted_key, _)| evicted_key)
            .filter(|evicted_key| *evicted_key != key)
    }

    pub fn invalidate(&self, key: &L1Key) {
        rw_write(&self.responses, SOURCE, "l1_invalidate").pop(key);
    }

    pub fn len(&self) -> usize {
        rw_read(&self.responses, SOURCE, "l1_len").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
