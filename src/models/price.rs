use serde::{Deserialize, Serialize};

/// How a resolved price was obtained.
///
/// `External`, `Interpolated` and `Manual` are persisted source tiers;
/// `Cache` only ever appears on responses served from the result cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PriceSource {
    External,
    Interpolated,
    Manual,
    Cache,
}

impl PriceSource {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceSource::External => "external",
            PriceSource::Interpolated => "interpolated",
            PriceSource::Manual => "manual",
            PriceSource::Cache => "cache",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "external" => Some(PriceSource::External),
            "interpolated" => Some(PriceSource::Interpolated),
            "manual" => Some(PriceSource::Manual),
            "cache" => Some(PriceSource::Cache),
            _ => None,
        }
    }
}

/// Bracketing-point provenance attached to interpolated values
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InterpolationInfo {
    pub before_timestamp: i64,
    pub before_price: f64,
    pub after_timestamp: i64,
    pub after_price: f64,
    pub ratio: f64,
    pub method: String,
}

/// A fully resolved price answer. This is what the resolver returns and
/// what the result cache snapshots.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceResolution {
    pub token: String,
    pub network: String,
    pub timestamp: i64,
    pub price: f64,
    pub source: PriceSource,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interpolation: Option<InterpolationInfo>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PriceQuery {
    pub timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
}
