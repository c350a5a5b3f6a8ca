//! Scope registry.
//!
//! Maps invalidation scopes to the cache entries registered under them, so a
//! write can find every entry it makes stale.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use super::keys::{CacheKey, EntityKey};
use super::lock::{rw_read, rw_write};

const SOURCE: &str = "cache::registry";

pub struct CacheRegistry {
    entity_to_keys: RwLock<HashMap<EntityKey, HashSet<CacheKey>>>,
    key_to_entities: RwLock<HashMap<CacheKey, HashSet<EntityKey>>>,
}

impl CacheRegistry {
    pub fn new() -> Self {
        Self {
            entity_to_keys: RwLock::new(HashMap::new()),
            key_to_entities: RwLock::new(HashMap::new()),
        }
    }

    /// Register `cache_key` under every scope in `entities`.
    ///
    /// Registering an already known key adds the new scopes to it.
    pub fn register(&self, cache_key: CacheKey, entities: HashSet<EntityKey>) {
        let mut e2k = rw_write(&self.entity_to_keys, SOURCE, "register.e2k");
        let mut k2e = rw_write(&self.key_to_entities, SOURCE, "register.k2e");

        for entity in &entities {
            e2k.entry(entity.clone())
                .or_default()
                .insert(cache_key.clone());
        }
        k2e.entry(cache_key).or_default().extend(entities);
    }

    pub fn keys_for_entity(&self, entity: &EntityKey) -> HashSet<CacheKey> {
        rw_read(&self.entity_to_keys, SOURCE, "keys_for_entity")
            .get(entity)
            .cloned()
            .unwrap_or_default()
    }

    /// Drop a cache key, e.g. after it was evicted.
    pub fn unregister(&self, cache_key: &CacheKey) {
        let mut e2k = rw_write(&self.entity_to_keys, SOURCE, "unregister.e2k");
        let mut k2e = rw_write(&self.key_to_entities, SOURCE, "unregister.k2e");

        if let Some(entities) = k2e.remove(cache_key) {
            for entity in entities {
                if let Some(keys) = e2k.get_mut(&entity) {
                    keys.remove(cache_key);
                    if keys.is_empty() {
                        e2k.remove(&entity);
                    }
                }
            }
        }
    }

    pub fn entity_count(&self) -> usize {
        rw_read(&self.entity_to_keys, SOURCE, "entity_count").len()
    }

    pub fn key_count(&self) -> usize {
        rw_read(&self.key_to_entities, SOURCE, "key_count").len()
    }
}

impl Default for CacheRegistry {
    fn default() -> Self {
        Self::new()
    }
}
