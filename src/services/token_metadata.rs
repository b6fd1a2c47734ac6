//! Token metadata collaborator
//!
//! Only one piece of metadata matters to the core: the token's creation
//! timestamp, which bounds how far back a collection job reaches. When the
//! provider has no answer, the scheduler falls back to a per-network
//! genesis default.

use async_trait::async_trait;
use chrono::NaiveDate;
use lazy_static::lazy_static;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;

use crate::error::FetchError;

/// Fallback creation timestamp for networks missing from the table
/// (2019-01-01, the service's history floor)
const DEFAULT_GENESIS_TS: i64 = 1_546_300_800;

lazy_static! {
    /// Earliest plausible token creation per supported network
    static ref NETWORK_GENESIS_DEFAULTS: HashMap<&'static str, i64> = {
        let mut m = HashMap::new();
        m.insert("ethereum", 1_438_905_600); // 2015-08-07, mainnet launch era
        m.insert("polygon-pos", 1_590_969_600); // 2020-06-01
        m.insert("binance-smart-chain", 1_598_486_400); // 2020-08-27
        m.insert("arbitrum-one", 1_630_454_400); // 2021-09-01
        m.insert("base", 1_690_848_000); // 2023-08-01
        m
    };
}

/// Per-network default used when the metadata provider has no answer
pub fn default_creation_timestamp(network: &str) -> i64 {
    NETWORK_GENESIS_DEFAULTS
        .get(network)
        .copied()
        .unwrap_or(DEFAULT_GENESIS_TS)
}

#[async_trait]
pub trait TokenMetadataProvider: Send + Sync {
    /// `Ok(None)` when the provider does not know the token or its
    /// creation date.
    async fn creation_timestamp(
        &self,
        token: &str,
        network: &str,
    ) -> Result<Option<i64>, FetchError>;
}

#[derive(Debug, Deserialize)]
struct ContractInfoResponse {
    genesis_date: Option<String>,
}

#[derive(Clone)]
pub struct CoinGeckoTokenMetadata {
    client: Client,
    api_key: String,
    base_url: String,
}

impl CoinGeckoTokenMetadata {
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
impl TokenMetadataProvider for CoinGeckoTokenMetadata {
    async fn creation_timestamp(
        &self,
        token: &str,
        network: &str,
    ) -> Result<Option<i64>, FetchError> {
        let url = format!("{}/coins/{}/contract/{}", self.base_url, network, token);

        let response = self
            .client
            .get(&url)
            .header("accept", "application/json")
            .header("x-cg-pro-api-key", &self.api_key)
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

        let info: ContractInfoResponse = response
            .json()
            .await
            .map_err(|e| FetchError::Upstream(e.to_string()))?;

        let timestamp = info
            .genesis_date
            .as_deref()
            .and_then(|d| NaiveDate::parse_from_str(d, "%Y-%m-%d").ok())
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|dt| dt.and_utc().timestamp());

        Ok(timestamp)
    }
}
