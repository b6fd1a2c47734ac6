//! Runtime configuration
//!
//! Every tunable has an environment variable and a default constant; the
//! knobs are collected into one struct because the resolver, the cache, and
//! the collection workers share them.

use std::env;

/// Environment variable for result cache TTL (seconds)
const ENV_CACHE_TTL_SECS: &str = "PRICE_CACHE_TTL_SECS";

/// Environment variable for the widest bracket gap interpolation will trust
const ENV_MAX_GAP_SECS: &str = "INTERPOLATION_MAX_GAP_SECS";

/// Environment variable for collection batch size
const ENV_BATCH_SIZE: &str = "COLLECTION_BATCH_SIZE";

/// Environment variable for per-item fetch attempts
const ENV_FETCH_MAX_ATTEMPTS: &str = "FETCH_MAX_ATTEMPTS";

/// Environment variable for the first retry backoff (milliseconds)
const ENV_FETCH_BASE_BACKOFF_MS: &str = "FETCH_BASE_BACKOFF_MS";

/// Environment variable for the per-attempt fetch timebox (seconds)
const ENV_FETCH_TIMEOUT_SECS: &str = "FETCH_TIMEOUT_SECS";

/// Environment variable for collection worker count
const ENV_WORKER_COUNT: &str = "COLLECTION_WORKER_COUNT";

/// Environment variable for the shared outbound requests-per-minute budget
const ENV_REQUESTS_PER_MINUTE: &str = "FETCH_REQUESTS_PER_MINUTE";

/// Environment variable for the courtesy pause between batches (milliseconds)
const ENV_BATCH_PAUSE_MS: &str = "COLLECTION_BATCH_PAUSE_MS";

const DEFAULT_CACHE_TTL_SECS: u64 = 300;
const DEFAULT_MAX_GAP_SECS: i64 = 7 * 86_400;
const DEFAULT_BATCH_SIZE: usize = 10;
const DEFAULT_FETCH_MAX_ATTEMPTS: u32 = 3;
const DEFAULT_FETCH_BASE_BACKOFF_MS: u64 = 500;
const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 10;
const DEFAULT_WORKER_COUNT: usize = 2;
const DEFAULT_REQUESTS_PER_MINUTE: u32 = 50;
const DEFAULT_BATCH_PAUSE_MS: u64 = 500;

#[derive(Debug, Clone)]
pub struct OracleConfig {
    /// Result cache TTL for directly observed prices. Interpolated results
    /// are cached for half this long.
    pub cache_ttl_secs: u64,
    /// Widest bracket gap (seconds) a linear estimate is trusted across
    pub max_gap_secs: i64,
    /// Timestamps per collection batch
    pub batch_size: usize,
    /// Bounded attempts per item fetch
    pub fetch_max_attempts: u32,
    /// First retry backoff; doubles per attempt
    pub fetch_base_backoff_ms: u64,
    /// Timebox per fetch attempt so a stuck call cannot stall a batch
    pub fetch_timeout_secs: u64,
    /// Concurrent collection workers
    pub worker_count: usize,
    /// Shared outbound fetch budget across all workers
    pub requests_per_minute: u32,
    /// Courtesy pause between batches
    pub batch_pause_ms: u64,
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            cache_ttl_secs: DEFAULT_CACHE_TTL_SECS,
            max_gap_secs: DEFAULT_MAX_GAP_SECS,
            batch_size: DEFAULT_BATCH_SIZE,
            fetch_max_attempts: DEFAULT_FETCH_MAX_ATTEMPTS,
            fetch_base_backoff_ms: DEFAULT_FETCH_BASE_BACKOFF_MS,
            fetch_timeout_secs: DEFAULT_FETCH_TIMEOUT_SECS,
            worker_count: DEFAULT_WORKER_COUNT,
            requests_per_minute: DEFAULT_REQUESTS_PER_MINUTE,
            batch_pause_ms: DEFAULT_BATCH_PAUSE_MS,
        }
    }
}

impl OracleConfig {
    pub fn from_env() -> Self {
        Self {
            cache_ttl_secs: env_or(ENV_CACHE_TTL_SECS, DEFAULT_CACHE_TTL_SECS),
            max_gap_secs: env_or(ENV_MAX_GAP_SECS, DEFAULT_MAX_GAP_SECS),
            batch_size: env_or(ENV_BATCH_SIZE, DEFAULT_BATCH_SIZE),
            fetch_max_attempts: env_or(ENV_FETCH_MAX_ATTEMPTS, DEFAULT_FETCH_MAX_ATTEMPTS),
            fetch_base_backoff_ms: env_or(ENV_FETCH_BASE_BACKOFF_MS, DEFAULT_FETCH_BASE_BACKOFF_MS),
            fetch_timeout_secs: env_or(ENV_FETCH_TIMEOUT_SECS, DEFAULT_FETCH_TIMEOUT_SECS),
            worker_count: env_or(ENV_WORKER_COUNT, DEFAULT_WORKER_COUNT),
            requests_per_minute: env_or(ENV_REQUESTS_PER_MINUTE, DEFAULT_REQUESTS_PER_MINUTE),
            batch_pause_ms: env_or(ENV_BATCH_PAUSE_MS, DEFAULT_BATCH_PAUSE_MS),
        }
    }
}

fn env_or<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}
