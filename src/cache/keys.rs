//! Cache key definitions.
//!
//! `EntityKey` names an invalidation scope; `CacheKey` names a cache entry.

use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use crate::application::params::ProductQuery;

/// Invalidation scope that cache entries are registered under.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum EntityKey {
    /// Every listing page of the products catalog, whatever its parameters.
    ProductsListing,
}

/// L0 query cache keys: the operation plus its resolved parameters.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum L0Key {
    ProductList(ProductQuery),
}

/// L1 response cache keys.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum L1Key {
    Response { path: String, query_hash: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CacheKey {
    L0(L0Key),
    L1(L1Key),
}

pub fn hash_value<T: Hash>(value: &T) -> u64 {
    let mut hasher = DefaultHasher::new();
    value.hash(&mut hasher);
    hasher.finish()
}

pub fn hash_query(query: &str) -> u64 {
    hash_value(&query)
}

#[cfg(test)]
mod tests {
    use std::num::NonZeroU32;

    use super::*;

    #[test]
    fn product_list_keys_compare_by_parameters() {
        let first = L0Key::ProductList(ProductQuery::new("lamp", NonZeroU32::MIN));
        let same = L0Key::ProductList(ProductQuery::new("lamp", NonZeroU32::MIN));
        let other = L0Key::ProductList(ProductQuery::new("lamp", NonZeroU32::MAX));

        assert_eq!(first, same);
        assert_eq!(hash_value(&first), hash_value(&same));
        assert_ne!(first, other);
    }

    #[test]
    fn different_queries_produce_different_hashes() {
        assert_eq!(hash_query("page=2"), hash_query("page=2"));
        assert_ne!(hash_query("page=1"), hash_query("page=2"));
    }
}
