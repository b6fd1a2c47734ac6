//! SeaORM Entity for the price time-series storage

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "price_points")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// Contract address (lowercased) or native-asset slug
    pub token: String,
    /// Chain identifier, e.g. "ethereum"
    pub network: String,
    /// Unix timestamp in seconds
    pub timestamp: i64,
    /// Price in USD (high precision)
    #[sea_orm(column_type = "Decimal(Some((78, 18)))")]
    pub price: Decimal,
    /// Optional trading volume
    #[sea_orm(column_type = "Decimal(Some((78, 18)))", nullable)]
    pub volume: Option<Decimal>,
    /// Optional market capitalization
    #[sea_orm(column_type = "Decimal(Some((78, 18)))", nullable)]
    pub market_cap: Option<Decimal>,
    /// How the value was obtained: 'external', 'interpolated', 'manual'
    pub source: String,
    /// Trust in the value, 1.0 for direct observations
    pub confidence: f64,
    /// Derivation provenance (bracketing points for interpolated values)
    pub metadata: Option<Json>,
    /// When the record was created
    pub created_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
