//! Configuration Module
//!
//! Handles loading and managing cache configuration from environment
//! variables. Consumed read-only by the core; ownership of how values are
//! sourced (flags, files) belongs to the embedding application.

use std::env;
use std::time::Duration;

/// Cache instance configuration.
#[derive(Debug, Clone)]
pub struct CacheConfig {
    /// Cache instance name; scopes lock names and log fields
    pub name: String,
    /// Default TTL applied by callers that do not pick one
    pub default_ttl: Duration,
    /// Index tuning
    pub index: IndexConfig,
}

/// Index tuning parameters.
#[derive(Debug, Clone)]
pub struct IndexConfig {
    /// Interval between reaper sweeps
    pub sweep_interval: Duration,
    /// Interval between index snapshot flushes
    pub flush_interval: Duration,
    /// Tracked-size high watermark; a sweep that finds more than this
    /// many bytes evicts least-recently-accessed entries
    pub max_size_bytes: u64,
    /// Eviction stops once tracked size falls to this low watermark
    pub size_low_watermark_bytes: u64,
}

impl CacheConfig {
    /// Creates a CacheConfig by loading values from environment variables.
    ///
    /// # Environment Variables
    /// - `CACHE_NAME` - instance name (default: "cachecore")
    /// - `DEFAULT_TTL_SECS` - default TTL in seconds (default: 300)
    /// - `SWEEP_INTERVAL_SECS` - reaper interval in seconds (default: 3)
    /// - `FLUSH_INTERVAL_SECS` - snapshot interval in seconds (default: 5)
    /// - `MAX_SIZE_BYTES` - capacity high watermark (default: 512 MiB)
    /// - `SIZE_LOW_WATERMARK_BYTES` - eviction target (default: 496 MiB)
    pub fn from_env() -> Self {
        Self {
            name: env::var("CACHE_NAME").unwrap_or_else(|_| "cachecore".to_string()),
            default_ttl: Duration::from_secs(env_u64("DEFAULT_TTL_SECS", 300)),
            index: IndexConfig {
                sweep_interval: Duration::from_secs(env_u64("SWEEP_INTERVAL_SECS", 3)),
                flush_interval: Duration::from_secs(env_u64("FLUSH_INTERVAL_SECS", 5)),
                max_size_bytes: env_u64("MAX_SIZE_BYTES", 512 * 1024 * 1024),
                size_low_watermark_bytes: env_u64(
                    "SIZE_LOW_WATERMARK_BYTES",
                    496 * 1024 * 1024,
                ),
            },
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            name: "cachecore".to_string(),
            default_ttl: Duration::from_secs(300),
            index: IndexConfig::default(),
        }
    }
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            sweep_interval: Duration::from_secs(3),
            flush_interval: Duration::from_secs(5),
            max_size_bytes: 512 * 1024 * 1024,
            size_low_watermark_bytes: 496 * 1024 * 1024,
        }
    }
}

fn env_u64(var: &str, default: u64) -> u64 {
    env::var(var)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
