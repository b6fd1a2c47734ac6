//! Result cache in front of the store and the external fetch
//!
//! Advisory only: a miss and a disabled cache behave identically, and no
//! cache condition can change an answer, only its latency. Interpolated
//! snapshots expire at half the standard TTL since a later direct
//! observation may refine them.

use moka::future::Cache;
use moka::Expiry;
use std::time::{Duration, Instant};

use crate::models::price::{PriceResolution, PriceSource};

/// Entries above this count get evicted ahead of their TTL
const MAX_CACHED_RESOLUTIONS: u64 = 10_000;

#[derive(Debug, Clone)]
struct CachedResolution {
    resolution: PriceResolution,
    ttl: Duration,
}

struct PerEntryTtl;

impl Expiry<String, CachedResolution> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        value: &CachedResolution,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(value.ttl)
    }
}

#[derive(Clone)]
pub struct PriceCache {
    inner: Option<Cache<String, CachedResolution>>,
    full_ttl: Duration,
}

impl PriceCache {
    pub fn new(ttl_secs: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(MAX_CACHED_RESOLUTIONS)
            .expire_after(PerEntryTtl)
            .build();

        Self {
            inner: Some(cache),
            full_ttl: Duration::from_secs(ttl_secs),
        }
    }

    /// A cache that stores nothing. Deployments without a cache collaborator
    /// resolve identically, just slower.
    pub fn disabled() -> Self {
        Self {
            inner: None,
            full_ttl: Duration::ZERO,
        }
    }

    pub fn key(token: &str, network: &str, timestamp: i64) -> String {
        format!("price:{}:{}:{}", token, network, timestamp)
    }

    pub async fn get(&self, key: &str) -> Option<PriceResolution> {
        let cache = self.inner.as_ref()?;
        cache.get(key).await.map(|entry| entry.resolution)
    }

    pub async fn insert(&self, key: &str, resolution: PriceResolution) {
        let Some(cache) = self.inner.as_ref() else {
            return;
        };

        let ttl = match resolution.source {
            PriceSource::Interpolated => self.full_ttl / 2,
            _ => self.full_ttl,
        };

        cache
            .insert(key.to_string(), CachedResolution { resolution, ttl })
            .await;
    }

    pub async fn invalidate(&self, key: &str) {
        if let Some(cache) = self.inner.as_ref() {
            cache.invalidate(key).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolution(source: PriceSource) -> PriceResolution {
        PriceResolution {
            token: "0xabc".to_string(),
            network: "ethereum".to_string(),
            timestamp: 1_700_000_000,
            price: 1.5,
            source,
            confidence: 1.0,
            interpolation: None,
        }
    }

    #[test]
    fn test_key_composition() {
        assert_eq!(
            PriceCache::key("0xabc", "ethereum", 1_700_000_000),
            "price:0xabc:ethereum:1700000000"
        );
    }

    #[tokio::test]
    async fn test_round_trip() {
        let cache = PriceCache::new(300);
        let key = PriceCache::key("0xabc", "ethereum", 1_700_000_000);

        assert!(cache.get(&key).await.is_none());

        cache.insert(&key, resolution(PriceSource::External)).await;
        let hit = cache.get(&key).await.expect("entry should be present");
        assert_eq!(hit.price, 1.5);
        assert_eq!(hit.source, PriceSource::External);
    }

    #[tokio::test]
    async fn test_disabled_cache_stores_nothing() {
        let cache = PriceCache::disabled();
        let key = PriceCache::key("0xabc", "ethereum", 1_700_000_000);

        cache.insert(&key, resolution(PriceSource::External)).await;
        assert!(cache.get(&key).await.is_none());
    }

    #[tokio::test]
    async fn test_invalidate() {
        let cache = PriceCache::new(300);
        let key = PriceCache::key("0xabc", "ethereum", 1_700_000_000);

        cache.insert(&key, resolution(PriceSource::External)).await;
        cache.invalidate(&key).await;
        assert!(cache.get(&key).await.is_none());
    }
}
