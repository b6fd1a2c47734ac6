//! Gap-filling estimates from bracketing observations
//!
//! A linear estimate between the nearest stored points, with a confidence
//! score that degrades as the bracket widens, the price moves, or the
//! target sits near either edge of the interval. Estimates are persisted
//! (source = interpolated) with their bracket provenance before being
//! returned, so the series densifies as it is queried.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::error::OracleError;
use crate::models::price::{InterpolationInfo, PriceSource};
use crate::services::price_store::{NewPricePoint, PriceStore};

/// Base confidence for any linear estimate
const BASE_CONFIDENCE: f64 = 0.8;

const CONFIDENCE_FLOOR: f64 = 0.1;

#[derive(Debug, Clone)]
pub struct InterpolatedPrice {
    pub price: f64,
    pub confidence: f64,
    pub info: InterpolationInfo,
}

#[derive(Clone)]
pub struct Interpolator {
    store: PriceStore,
    max_gap_secs: i64,
}

impl Interpolator {
    pub fn new(store: PriceStore, max_gap_secs: i64) -> Self {
        Self {
            store,
            max_gap_secs,
        }
    }

    /// `Ok(None)` when no trustworthy estimate exists: a missing bracket
    /// (series edge) or a gap wider than `max_gap_secs`. A gap of exactly
    /// `max_gap_secs` is still interpolated.
    pub async fn interpolate(
        &self,
        token: &str,
        network: &str,
        target_ts: i64,
    ) -> Result<Option<InterpolatedPrice>, OracleError> {
        let nearest = self.store.get_nearest(token, network, target_ts).await?;

        let (Some(before), Some(after)) = (nearest.before, nearest.after) else {
            tracing::debug!(
                token = %token,
                network = %network,
                timestamp = target_ts,
                "Cannot interpolate at series edge"
            );
            return Ok(None);
        };

        let gap = after.timestamp - before.timestamp;
        if gap > self.max_gap_secs {
            tracing::debug!(
                token = %token,
                network = %network,
                timestamp = target_ts,
                gap_secs = gap,
                "Bracket gap too wide for a linear estimate"
            );
            return Ok(None);
        }
        if gap <= 0 {
            return Ok(None);
        }

        let before_price = before.price.to_f64().unwrap_or(0.0);
        let after_price = after.price.to_f64().unwrap_or(0.0);

        let ratio = (target_ts - before.timestamp) as f64 / gap as f64;
        let price = round_price(before_price + ratio * (after_price - before_price));
        let confidence = confidence_score(before_price, after_price, ratio, gap);

        let info = InterpolationInfo {
            before_timestamp: before.timestamp,
            before_price,
            after_timestamp: after.timestamp,
            after_price,
            ratio,
            method: "linear".to_string(),
        };

        let metadata = serde_json::to_value(&info)
            .map_err(|e| OracleError::Upstream(format!("Failed to encode provenance: {}", e)))?;

        self.store
            .upsert_one(NewPricePoint {
                token: token.to_string(),
                network: network.to_string(),
                timestamp: target_ts,
                price: Decimal::from_f64_retain(price)
                    .unwrap_or(Decimal::ZERO)
                    .round_dp(8),
                volume: None,
                market_cap: None,
                source: PriceSource::Interpolated,
                confidence,
                metadata: Some(metadata),
            })
            .await?;

        tracing::debug!(
            token = %token,
            network = %network,
            timestamp = target_ts,
            price = price,
            confidence = confidence,
            "Interpolated price from brackets {} and {}",
            before.timestamp,
            after.timestamp
        );

        Ok(Some(InterpolatedPrice {
            price,
            confidence,
            info,
        }))
    }
}

/// Prices round to 8 decimal places
fn round_price(price: f64) -> f64 {
    (price * 1e8).round() / 1e8
}

/// Multiplicative confidence scoring from a 0.8 base:
/// bracket price change > 50% -> x0.7, > 20% -> x0.85;
/// target in the outer 10% of the interval -> x0.9;
/// bracket gap > 48h -> x0.8, > 24h -> x0.9.
/// Clamped to [0.1, 1.0].
fn confidence_score(before_price: f64, after_price: f64, ratio: f64, gap_secs: i64) -> f64 {
    let mut confidence = BASE_CONFIDENCE;

    let relative_change = if before_price.abs() > f64::EPSILON {
        ((after_price - before_price) / before_price).abs()
    } else {
        1.0
    };

    if relative_change > 0.5 {
        confidence *= 0.7;
    } else if relative_change > 0.2 {
        confidence *= 0.85;
    }

    if ratio < 0.1 || ratio > 0.9 {
        confidence *= 0.9;
    }

    if gap_secs > 48 * 3600 {
        confidence *= 0.8;
    } else if gap_secs > 24 * 3600 {
        confidence *= 0.9;
    }

    confidence.clamp(CONFIDENCE_FLOOR, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::price_points;
    use rust_decimal_macros::dec;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    const DAY: i64 = 86_400;

    fn stored_point(id: i64, timestamp: i64, price: Decimal) -> price_points::Model {
        price_points::Model {
            id,
            token: "0xabc".to_string(),
            network: "ethereum".to_string(),
            timestamp,
            price,
            volume: None,
            market_cap: None,
            source: "external".to_string(),
            confidence: 1.0,
            metadata: None,
            created_at: None,
        }
    }

    fn interpolator_with_brackets(
        before: Option<price_points::Model>,
        after: Option<price_points::Model>,
    ) -> Interpolator {
        let persisted = stored_point(99, 0, dec!(0));

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([
                before.map(|m| vec![m]).unwrap_or_default(),
                after.map(|m| vec![m]).unwrap_or_default(),
                vec![],
                vec![persisted],
            ])
            .append_exec_results([MockExecResult {
                last_insert_id: 99,
                rows_affected: 1,
            }])
            .into_connection();

        Interpolator::new(PriceStore::new(std::sync::Arc::new(db)), 7 * DAY)
    }

    #[tokio::test]
    async fn test_midpoint_interpolation() {
        let interpolator = interpolator_with_brackets(
            Some(stored_point(1, 100, dec!(10))),
            Some(stored_point(2, 200, dec!(20))),
        );

        let estimate = interpolator
            .interpolate("0xabc", "ethereum", 150)
            .await
            .unwrap()
            .expect("should interpolate");

        assert_eq!(estimate.price, 15.0);
        assert_eq!(estimate.info.ratio, 0.5);
        assert_eq!(estimate.info.method, "linear");
        assert_eq!(estimate.info.before_timestamp, 100);
        assert_eq!(estimate.info.after_timestamp, 200);
    }

    #[tokio::test]
    async fn test_gap_boundary_tie_still_interpolates() {
        let interpolator = interpolator_with_brackets(
            Some(stored_point(1, 0, dec!(10))),
            Some(stored_point(2, 7 * DAY, dec!(10))),
        );

        let estimate = interpolator
            .interpolate("0xabc", "ethereum", 3 * DAY)
            .await
            .unwrap();

        assert!(estimate.is_some());
    }

    #[tokio::test]
    async fn test_gap_one_second_past_boundary_is_rejected() {
        let interpolator = interpolator_with_brackets(
            Some(stored_point(1, 0, dec!(10))),
            Some(stored_point(2, 7 * DAY + 1, dec!(10))),
        );

        let estimate = interpolator
            .interpolate("0xabc", "ethereum", 3 * DAY)
            .await
            .unwrap();

        assert!(estimate.is_none());
    }

    #[tokio::test]
    async fn test_missing_after_bracket_is_absent() {
        let interpolator =
            interpolator_with_brackets(Some(stored_point(1, 100, dec!(10))), None);

        let estimate = interpolator
            .interpolate("0xabc", "ethereum", 150)
            .await
            .unwrap();

        assert!(estimate.is_none());
    }

    #[tokio::test]
    async fn test_missing_before_bracket_is_absent() {
        let interpolator =
            interpolator_with_brackets(None, Some(stored_point(1, 200, dec!(10))));

        let estimate = interpolator
            .interpolate("0xabc", "ethereum", 150)
            .await
            .unwrap();

        assert!(estimate.is_none());
    }

    #[test]
    fn test_round_price_to_8_decimals() {
        assert_eq!(round_price(1.123456789), 1.12345679);
        assert_eq!(round_price(15.0), 15.0);
    }

    #[test]
    fn test_confidence_base_case() {
        // 10h gap, 5% change, mid-interval: no penalties apply
        let confidence = confidence_score(100.0, 105.0, 0.5, 10 * 3600);
        assert_eq!(confidence, 0.8);
    }

    #[test]
    fn test_confidence_penalizes_large_price_change() {
        let moderate = confidence_score(100.0, 125.0, 0.5, 3600);
        let large = confidence_score(100.0, 160.0, 0.5, 3600);

        assert!((moderate - 0.8 * 0.85).abs() < 1e-12);
        assert!((large - 0.8 * 0.7).abs() < 1e-12);
    }

    #[test]
    fn test_confidence_penalizes_edge_ratio() {
        let edge = confidence_score(100.0, 105.0, 0.95, 3600);
        let center = confidence_score(100.0, 105.0, 0.5, 3600);

        assert!(edge < center);
        assert!((edge - 0.8 * 0.9).abs() < 1e-12);
    }

    #[test]
    fn test_confidence_monotonic_in_gap_width() {
        // Widening the gap from 1h to 50h, prices fixed, never raises confidence
        let gaps_hours = [1, 6, 12, 24, 25, 36, 48, 49, 50];
        let mut last = f64::INFINITY;

        for hours in gaps_hours {
            let confidence = confidence_score(100.0, 105.0, 0.5, hours * 3600);
            assert!(
                confidence <= last,
                "confidence rose when gap widened to {}h",
                hours
            );
            last = confidence;
        }
    }

    #[test]
    fn test_confidence_clamped_to_floor() {
        let confidence = confidence_score(100.0, 1000.0, 0.99, 100 * 3600);
        assert!(confidence >= CONFIDENCE_FLOOR);
        assert!(confidence <= 1.0);
    }
}
