//! Time-series store for price points
//!
//! Exclusive owner of persisted price data. Lookups distinguish "no data"
//! (`Ok(None)`) from storage unavailability (`Err(OracleError::Storage)`).

use std::sync::Arc;

use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, Order,
    QueryFilter, QueryOrder, QuerySelect,
};

use crate::entities::{prelude::*, price_points};
use crate::error::OracleError;
use crate::models::price::PriceSource;

/// A price observation to persist, keyed by (token, network, timestamp)
#[derive(Debug, Clone)]
pub struct NewPricePoint {
    pub token: String,
    pub network: String,
    pub timestamp: i64,
    pub price: Decimal,
    pub volume: Option<Decimal>,
    pub market_cap: Option<Decimal>,
    pub source: PriceSource,
    pub confidence: f64,
    pub metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Updated,
    /// An interpolated point declined to overwrite a direct observation
    Skipped,
}

/// Nearest stored observations around a target timestamp.
/// `before.timestamp <= target <= after.timestamp` when present.
#[derive(Debug, Clone, Default)]
pub struct NearestPoints {
    pub before: Option<price_points::Model>,
    pub after: Option<price_points::Model>,
}

#[derive(Clone)]
pub struct PriceStore {
    db: Arc<DatabaseConnection>,
}

impl PriceStore {
    pub fn new(db: Arc<DatabaseConnection>) -> Self {
        Self { db }
    }

    pub async fn get_exact(
        &self,
        token: &str,
        network: &str,
        timestamp: i64,
    ) -> Result<Option<price_points::Model>, OracleError> {
        let record = PricePoints::find()
            .filter(price_points::Column::Token.eq(token))
            .filter(price_points::Column::Network.eq(network))
            .filter(price_points::Column::Timestamp.eq(timestamp))
            .one(self.db.as_ref())
            .await?;

        Ok(record)
    }

    /// Bracketing points around `timestamp`: two single-direction limit-1
    /// queries, descending for the before-point and ascending for the after.
    pub async fn get_nearest(
        &self,
        token: &str,
        network: &str,
        timestamp: i64,
    ) -> Result<NearestPoints, OracleError> {
        let before = PricePoints::find()
            .filter(price_points::Column::Token.eq(token))
            .filter(price_points::Column::Network.eq(network))
            .filter(price_points::Column::Timestamp.lte(timestamp))
            .order_by(price_points::Column::Timestamp, Order::Desc)
            .limit(1)
            .one(self.db.as_ref())
            .await?;

        let after = PricePoints::find()
            .filter(price_points::Column::Token.eq(token))
            .filter(price_points::Column::Network.eq(network))
            .filter(price_points::Column::Timestamp.gte(timestamp))
            .order_by(price_points::Column::Timestamp, Order::Asc)
            .limit(1)
            .one(self.db.as_ref())
            .await?;

        Ok(NearestPoints { before, after })
    }

    pub async fn get_latest(
        &self,
        token: &str,
        network: &str,
    ) -> Result<Option<price_points::Model>, OracleError> {
        let record = PricePoints::find()
            .filter(price_points::Column::Token.eq(token))
            .filter(price_points::Column::Network.eq(network))
            .order_by(price_points::Column::Timestamp, Order::Desc)
            .limit(1)
            .one(self.db.as_ref())
            .await?;

        Ok(record)
    }

    /// Idempotent write of a single point. Last write wins, with one
    /// precedence rule: an interpolated estimate never replaces a direct
    /// observation at the same key, while a direct observation always
    /// replaces an interpolated estimate.
    pub async fn upsert_one(&self, point: NewPricePoint) -> Result<UpsertOutcome, OracleError> {
        let existing = self
            .get_exact(&point.token, &point.network, point.timestamp)
            .await?;

        match existing {
            Some(record) => {
                let existing_source =
                    PriceSource::parse(&record.source).unwrap_or(PriceSource::External);

                if point.source == PriceSource::Interpolated
                    && existing_source != PriceSource::Interpolated
                {
                    tracing::debug!(
                        token = %point.token,
                        network = %point.network,
                        timestamp = point.timestamp,
                        "Keeping {} observation over interpolated estimate",
                        record.source
                    );
                    return Ok(UpsertOutcome::Skipped);
                }

                let mut active: price_points::ActiveModel = record.into();
                active.price = Set(point.price);
                active.volume = Set(point.volume);
                active.market_cap = Set(point.market_cap);
                active.source = Set(point.source.as_str().to_string());
                active.confidence = Set(point.confidence);
                active.metadata = Set(point.metadata);
                active.update(self.db.as_ref()).await?;

                Ok(UpsertOutcome::Updated)
            }
            None => {
                let active = price_points::ActiveModel {
                    token: Set(point.token),
                    network: Set(point.network),
                    timestamp: Set(point.timestamp),
                    price: Set(point.price),
                    volume: Set(point.volume),
                    market_cap: Set(point.market_cap),
                    source: Set(point.source.as_str().to_string()),
                    confidence: Set(point.confidence),
                    metadata: Set(point.metadata),
                    ..Default::default()
                };
                active.insert(self.db.as_ref()).await?;

                Ok(UpsertOutcome::Inserted)
            }
        }
    }

    /// Bulk write with per-item results. One item's failure never rolls
    /// back or aborts the rest of the batch.
    pub async fn upsert_many(
        &self,
        points: Vec<NewPricePoint>,
    ) -> Vec<Result<UpsertOutcome, OracleError>> {
        let mut results = Vec::with_capacity(points.len());

        for point in points {
            results.push(self.upsert_one(point).await);
        }

        results
    }
}
