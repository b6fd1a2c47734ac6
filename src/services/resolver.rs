//! Tiered price resolution
//!
//! Strict tier order, short-circuiting on the first hit:
//! cache -> exact stored record -> external fetch -> interpolation.
//! Every hit beyond the cache tier writes through to both store and cache,
//! so the series densifies as it is queried. The only error a missing
//! price produces is `PriceUnavailable`; fetch failures are logged and
//! swallowed, never surfaced.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use std::sync::Arc;

use crate::config::OracleConfig;
use crate::entities::price_points;
use crate::error::OracleError;
use crate::models::price::{PriceResolution, PriceSource};
use crate::services::interpolation::Interpolator;
use crate::services::price_cache::PriceCache;
use crate::services::price_fetcher::{fetch_with_retry, PriceFetcher};
use crate::services::price_store::{NewPricePoint, PriceStore};

#[derive(Clone)]
pub struct PriceResolver {
    store: PriceStore,
    cache: PriceCache,
    fetcher: Arc<dyn PriceFetcher>,
    interpolator: Interpolator,
    config: OracleConfig,
}

impl PriceResolver {
    pub fn new(
        store: PriceStore,
        cache: PriceCache,
        fetcher: Arc<dyn PriceFetcher>,
        config: OracleConfig,
    ) -> Self {
        let interpolator = Interpolator::new(store.clone(), config.max_gap_secs);

        Self {
            store,
            cache,
            fetcher,
            interpolator,
            config,
        }
    }

    pub async fn resolve(
        &self,
        token: &str,
        network: &str,
        timestamp: i64,
    ) -> Result<PriceResolution, OracleError> {
        let key = PriceCache::key(token, network, timestamp);

        // Tier 1: result cache. The snapshot keeps the underlying tier's
        // confidence and provenance; only the source tag changes.
        if let Some(mut hit) = self.cache.get(&key).await {
            tracing::debug!(token = %token, network = %network, timestamp, "Cache hit");
            hit.source = PriceSource::Cache;
            return Ok(hit);
        }

        // Tier 2: exact stored record
        if let Some(record) = self.store.get_exact(token, network, timestamp).await? {
            let resolution = resolution_from_record(record);
            self.cache.insert(&key, resolution.clone()).await;
            return Ok(resolution);
        }

        // Tier 3: external fetch, bounded retries, failures swallowed
        match fetch_with_retry(
            self.fetcher.as_ref(),
            token,
            network,
            timestamp,
            self.config.fetch_max_attempts,
            self.config.fetch_base_backoff_ms,
            self.config.fetch_timeout_secs,
        )
        .await
        {
            Ok(Some(fetched)) => {
                self.store
                    .upsert_one(NewPricePoint {
                        token: token.to_string(),
                        network: network.to_string(),
                        timestamp,
                        price: Decimal::from_f64_retain(fetched.price)
                            .unwrap_or(Decimal::ZERO)
                            .round_dp(8),
                        volume: fetched.volume.and_then(Decimal::from_f64_retain),
                        market_cap: fetched.market_cap.and_then(Decimal::from_f64_retain),
                        source: PriceSource::External,
                        confidence: 1.0,
                        metadata: None,
                    })
                    .await?;

                let resolution = PriceResolution {
                    token: token.to_string(),
                    network: network.to_string(),
                    timestamp,
                    price: fetched.price,
                    source: PriceSource::External,
                    confidence: 1.0,
                    interpolation: None,
                };
                self.cache.insert(&key, resolution.clone()).await;
                return Ok(resolution);
            }
            Ok(None) => {
                tracing::debug!(
                    token = %token,
                    network = %network,
                    timestamp,
                    "No upstream data, trying interpolation"
                );
            }
            Err(e) => {
                tracing::warn!(
                    token = %token,
                    network = %network,
                    timestamp,
                    "External fetch failed, trying interpolation: {}",
                    e
                );
            }
        }

        // Tier 4: interpolation (the engine persists its own estimate)
        if let Some(estimate) = self.interpolator.interpolate(token, network, timestamp).await? {
            let resolution = PriceResolution {
                token: token.to_string(),
                network: network.to_string(),
                timestamp,
                price: estimate.price,
                source: PriceSource::Interpolated,
                confidence: estimate.confidence,
                interpolation: Some(estimate.info),
            };
            self.cache.insert(&key, resolution.clone()).await;
            return Ok(resolution);
        }

        Err(OracleError::PriceUnavailable {
            token: token.to_string(),
            network: network.to_string(),
            timestamp,
        })
    }
}

fn resolution_from_record(record: price_points::Model) -> PriceResolution {
    let interpolation = record
        .metadata
        .as_ref()
        .and_then(|m| serde_json::from_value(m.clone()).ok());

    PriceResolution {
        token: record.token,
        network: record.network,
        timestamp: record.timestamp,
        price: record.price.to_f64().unwrap_or(0.0),
        source: PriceSource::parse(&record.source).unwrap_or(PriceSource::External),
        confidence: record.confidence,
        interpolation,
    }
}
