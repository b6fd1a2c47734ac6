use axum::{
    routing::{get, post},
    Router,
};
use sea_orm::Database;
use sea_orm_migration::MigratorTrait;
use std::env;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use priceoracle_backend::config::OracleConfig;
use priceoracle_backend::handlers::{jobs, price};
use priceoracle_backend::jobs::collection::CollectionScheduler;
use priceoracle_backend::services::price_cache::PriceCache;
use priceoracle_backend::services::price_fetcher::CoinGeckoFetcher;
use priceoracle_backend::services::price_store::PriceStore;
use priceoracle_backend::services::resolver::PriceResolver;
use priceoracle_backend::services::token_metadata::CoinGeckoTokenMetadata;
use priceoracle_backend::AppState;

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,priceoracle_backend=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    // Load environment variables
    dotenvy::dotenv().ok();

    // Connect to database
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set");
    tracing::info!("Connecting to database...");
    let db = Database::connect(&database_url)
        .await
        .expect("Failed to connect to database");

    // Run migrations
    tracing::info!("Running migrations...");
    migration::Migrator::up(&db, None)
        .await
        .expect("Failed to run migrations");

    // Shared handle so the store, scheduler, and app state reference one pool.
    let db = Arc::new(db);

    let config = OracleConfig::from_env();

    // External price source. An empty key still runs; every fetch will
    // fail per-request and resolution falls through to interpolation.
    let api_key = env::var("COINGECKO_API_KEY").unwrap_or_else(|_| {
        tracing::warn!("COINGECKO_API_KEY not set - external fetches will be unauthenticated");
        String::new()
    });
    let base_url = env::var("COINGECKO_BASE_URL")
        .unwrap_or_else(|_| "https://pro-api.coingecko.com/api/v3".to_string());

    let fetcher = Arc::new(CoinGeckoFetcher::new(
        api_key.clone(),
        base_url.clone(),
        config.fetch_timeout_secs,
    ));
    let metadata = Arc::new(CoinGeckoTokenMetadata::new(
        api_key,
        base_url,
        config.fetch_timeout_secs,
    ));

    // Cache is optional by deployment; disabling it changes latency only
    let cache = if env::var("PRICE_CACHE_DISABLED")
        .map(|v| v.to_lowercase() == "true")
        .unwrap_or(false)
    {
        tracing::warn!("Result cache disabled");
        PriceCache::disabled()
    } else {
        PriceCache::new(config.cache_ttl_secs)
    };

    let store = PriceStore::new(db.clone());
    let resolver = PriceResolver::new(store, cache, fetcher.clone(), config.clone());
    let scheduler = CollectionScheduler::new(db.clone(), fetcher, metadata, config.clone());

    // Start collection workers
    scheduler.spawn_workers();
    tracing::info!(workers = config.worker_count, "Collection workers started");

    let state = AppState {
        db,
        resolver,
        scheduler,
    };

    // Build router
    let app = Router::new()
        .route("/health", get(price::health))
        .route("/api/price/{network}/{token}", get(price::get_price))
        .route("/api/price/schedule", post(jobs::schedule_collection))
        .route("/api/jobs", get(jobs::list_jobs))
        .route("/api/jobs/{job_id}", get(jobs::get_job_status))
        .route("/api/jobs/{job_id}/cancel", post(jobs::cancel_job))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Start server
    let listener = tokio::net::TcpListener::bind("0.0.0.0:3000")
        .await
        .expect("Failed to bind listener");

    tracing::info!(
        "Server listening on {}",
        listener.local_addr().expect("listener has no local addr")
    );

    axum::serve(listener, app).await.expect("Server error");
}
