// src/lib.rs

use std::sync::Arc;

use sea_orm::DatabaseConnection;
use jobs::collection::CollectionScheduler;
use services::resolver::PriceResolver;

#[derive(Clone)]
pub struct AppState {
    pub db: Arc<DatabaseConnection>,
    pub resolver: PriceResolver,
    pub scheduler: CollectionScheduler,
}

pub mod entities {
    pub mod prelude;
    pub mod collection_jobs;
    pub mod price_points;
}

pub mod services {
    pub mod interpolation;
    pub mod price_cache;
    pub mod price_fetcher;
    pub mod price_store;
    pub mod resolver;
    pub mod token_metadata;
}

pub mod config;
pub mod jobs;
pub mod error;
pub mod models;
pub mod handlers;
