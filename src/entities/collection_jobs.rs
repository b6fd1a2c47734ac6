//! SeaORM Entity for collection_jobs table
//!
//! A row is both the job record and the durable queue entry: workers claim
//! queued rows with an atomic state transition.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "collection_jobs")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i64,
    /// External job identifier (uuid v4)
    #[sea_orm(unique)]
    pub job_id: String,
    pub token: String,
    pub network: String,
    /// Ordered, deduplicated unix timestamps to fill
    pub timestamps: Json,
    /// 'queued', 'running', 'completed', 'failed', 'cancelled'
    pub state: String,
    pub total: i32,
    pub processed: i32,
    pub succeeded: i32,
    pub failed_count: i32,
    pub last_error: Option<String>,
    pub created_at: DateTime,
    pub started_at: Option<DateTime>,
    pub finished_at: Option<DateTime>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
