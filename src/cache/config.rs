//! Cache configuration.

use std::time::Duration;

/// Configuration for a cache instance.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Maximum number of entries in the cache.
    pub max_capacity: u64,

    /// Time-to-live for cache entries.
    pub ttl: Option<Duration>,

    /// Time-to-idle for cache entries.
    pub tti: Option<Duration>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_capacity: 10_000,
            ttl: Some(Duration::from_secs(300)),
            tti: None,
        }
    }
}

impl CacheConfig {
    /// Display names change rarely and are only cosmetic.
    pub fn display_names() -> Self {
        Self {
            max_capacity: 20_000,
            ttl: Some(Duration::from_secs(1800)),
            tti: Some(Duration::from_secs(600)),
        }
    }

    /// Admin status gates commands, so it expires quickly.
    pub fn admin_status() -> Self {
        Self {
            max_capacity: 10_000,
            ttl: Some(Duration::from_secs(120)),
            tti: None,
        }
    }
}
