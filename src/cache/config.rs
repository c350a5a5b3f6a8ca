//! Cache configuration.
//!
//! Controls the L0 query cache and the L1 response cache.

use std::num::NonZeroUsize;

use serde::Deserialize;

const DEFAULT_L0_QUERY_LIMIT: usize = 256;
const DEFAULT_L1_RESPONSE_LIMIT: usize = 64;
const DEFAULT_AUTO_CONSUME_INTERVAL_MS: u64 = 5000;
const DEFAULT_CONSUME_BATCH_LIMIT: usize = 100;

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Cache listing pages returned by the catalog.
    pub enable_l0_cache: bool,
    /// Cache rendered shell and home responses.
    pub enable_l1_cache: bool,
    /// Maximum cached listing pages.
    pub l0_query_limit: usize,
    /// Maximum cached HTTP responses.
    pub l1_response_limit: usize,
    /// Interval (ms) at which leftover cache events are drained.
    pub auto_consume_interval_ms: u64,
    /// Maximum events per consumption batch.
    pub consume_batch_limit: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enable_l0_cache: true,
            enable_l1_cache: true,
            l0_query_limit: DEFAULT_L0_QUERY_LIMIT,
            l1_response_limit: DEFAULT_L1_RESPONSE_LIMIT,
            auto_consume_interval_ms: DEFAULT_AUTO_CONSUME_INTERVAL_MS,
            consume_batch_limit: DEFAULT_CONSUME_BATCH_LIMIT,
        }
    }
}

impl From<&crate::config::CacheSettings> for CacheConfig {
    fn from(settings: &crate::config::CacheSettings) -> Self {
        Self {
            enable_l0_cache: settings.enable_l0_cache,
            enable_l1_cache: settings.enable_l1_cache,
            l0_query_limit: settings.l0_query_limit,
            l1_response_limit: settings.l1_response_limit,
            auto_consume_interval_ms: settings.auto_consume_interval_ms,
            consume_batch_limit: settings.consume_batch_limit,
        }
    }
}

impl CacheConfig {
    /// Returns true if any cache layer is enabled.
    pub fn is_enabled(&self) -> bool {
        self.enable_l0_cache || self.enable_l1_cache
    }

    pub fn l0_query_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.l0_query_limit).unwrap_or(NonZeroUsize::MIN)
    }

    pub fn l1_response_limit_non_zero(&self) -> NonZeroUsize {
        NonZeroUsize::new(self.l1_response_limit).unwrap_or(NonZeroUsize::MIN)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_values() {
        let config = CacheConfig::default();
        assert!(config.enable_l0_cache);
        assert!(config.enable_l1_cache);
        assert_eq!(config.l0_query_limit, 256);
        assert_eq!(config.l1_response_limit, 64);
        assert_eq!(config.auto_consume_interval_ms, 5000);
        assert_eq!(config.consume_batch_limit, 100);
    }

    #[test]
    fn is_disabled_when_both_off() {
        let config = CacheConfig {
            enable_l0_cache: false,
            enable_l1_cache: false,
            ..Default::default()
        };
        assert!(!config.is_enabled());
    }

    #[test]
    fn non_zero_clamps_to_min() {
        let config = CacheConfig {
            l0_query_limit: 0,
            ..Default::default()
        };
        assert_eq!(config.l0_query_limit_non_zero().get(), 1);
    }
}
