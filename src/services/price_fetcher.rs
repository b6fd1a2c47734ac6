//! External price source adapter
//!
//! Best-effort by contract: the source may rate-limit, time out, or simply
//! not have the data. `PriceFetcher` is the pluggable seam; the CoinGecko
//! implementation can be swapped for any provider with historical coverage
//! without touching the resolver or the collection workers.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::error::FetchError;

/// Half-day window around the target timestamp for range queries
const FETCH_WINDOW_SECS: i64 = 43_200;

#[derive(Debug, Clone, PartialEq)]
pub struct FetchedPrice {
    pub price: f64,
    pub volume: Option<f64>,
    pub market_cap: Option<f64>,
}

#[async_trait]
pub trait PriceFetcher: Send + Sync {
    /// `Ok(None)` means the data genuinely does not exist upstream and must
    /// not be retried; errors are transient and retryable.
    async fn fetch_price(
        &self,
        token: &str,
        network: &str,
        timestamp: i64,
    ) -> Result<Option<FetchedPrice>, FetchError>;
}

#[derive(Debug, Deserialize)]
struct MarketChartResponse {
    prices: Vec<[f64; 2]>,
    #[serde(default)]
    market_caps: Vec<[f64; 2]>,
    #[serde(default)]
    total_volumes: Vec<[f64; 2]>,
}

#[derive(Clone)]
pub struct CoinGeckoFetcher {
    client: Client,
    api_key: String,
    base_url: String,
}

impl CoinGeckoFetcher {
    pub fn new(api_key: String, base_url: String, timeout_secs: u64) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .expect("Failed to build HTTP client");

        Self {
            client,
            api_key,
            base_url,
        }
    }
}

#[async_trait]
impl PriceFetcher for CoinGeckoFetcher {
    async fn fetch_price(
        &self,
        token: &str,
        network: &str,
        timestamp: i64,
    ) -> Result<Option<FetchedPrice>, FetchError> {
        let url = format!(
            "{}/coins/{}/contract/{}/market_chart/range",
            self.base_url, network, token
        );

        let from = timestamp - FETCH_WINDOW_SECS;
        let to = timestamp + FETCH_WINDOW_SECS;

        let response = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .header("x-cg-pro-api-key", &self.api_key)
            .query(&[
                ("vs_currency", "usd"),
                ("from", &from.to_string()),
                ("to", &to.to_string()),
            ])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    FetchError::Timeout
                } else {
                    FetchError::Upstream(e.to_string())
                }
            })?;

        match response.status() {
            StatusCode::TOO_MANY_REQUESTS => return Err(FetchError::RateLimited),
            StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => {
                let error_text = response.text().await.unwrap_or_default();
                return Err(FetchError::Upstream(format!(
                    "CoinGecko API error {}: {}",
                    status, error_text
                )));
            }
            _ => {}
        }

        let data: MarketChartResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Upstream(e.to_string()))?;

        if data.prices.is_empty() {
            return Ok(None);
        }

        // Pick the returned point closest to the target timestamp
        let target_ms = timestamp as f64 * 1000.0;
        let (index, closest) = data
            .prices
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| {
                (a[0] - target_ms)
                    .abs()
                    .partial_cmp(&(b[0] - target_ms).abs())
                    .unwrap_or(std::cmp::Ordering::Equal)
            })
            .map(|(i, p)| (i, *p))
            .unwrap_or((0, data.prices[0]));

        Ok(Some(FetchedPrice {
            price: closest[1],
            volume: data.total_volumes.get(index).map(|v| v[1]),
            market_cap: data.market_caps.get(index).map(|m| m[1]),
        }))
    }
}

/// Bounded-attempt fetch with exponential backoff and a per-attempt
/// timebox, so a stuck upstream call can never stall its caller.
pub async fn fetch_with_retry(
    fetcher: &dyn PriceFetcher,
    token: &str,
    network: &str,
    timestamp: i64,
    max_attempts: u32,
    base_backoff_ms: u64,
    timeout_secs: u64,
) -> Result<Option<FetchedPrice>, FetchError> {
    let mut last_error = FetchError::Upstream("no attempts made".to_string());

    for attempt in 1..=max_attempts {
        let attempt_result = tokio::time::timeout(
            Duration::from_secs(timeout_secs),
            fetcher.fetch_price(token, network, timestamp),
        )
        .await;

        match attempt_result {
            Ok(Ok(price)) => return Ok(price),
            Ok(Err(e)) => {
                tracing::warn!(
                    token = %token,
                    network = %network,
                    timestamp = timestamp,
                    attempt = attempt,
                    "Fetch attempt failed: {}",
                    e
                );
                last_error = e;
            }
            Err(_) => {
                tracing::warn!(
                    token = %token,
                    network = %network,
                    timestamp = timestamp,
                    attempt = attempt,
                    "Fetch attempt timed out after {}s",
                    timeout_secs
                );
                last_error = FetchError::Timeout;
            }
        }

        if attempt < max_attempts {
            let backoff = base_backoff_ms * 2u64.pow(attempt - 1);
            tokio::time::sleep(Duration::from_millis(backoff)).await;
        }
    }

    Err(last_error)
}
