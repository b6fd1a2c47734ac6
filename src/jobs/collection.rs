//! Batch collection of dense historical series
//!
//! A schedule request becomes one timestamp per calendar day since token
//! creation, stored as a queued collection_jobs row. Worker tasks claim
//! queued rows with an atomic state transition and process them as
//! fixed-size batches: skip timestamps the store already has, fetch the
//! rest with bounded retries through a shared rate limiter, and keep
//! per-item failures as tallies that never abort the batch or the job.
//! Cancellation is cooperative and checked between batches only.

use chrono::{DateTime, Utc};
use sea_orm::sea_query::Expr;
use sea_orm::{
    ActiveModelTrait, ActiveValue::Set, ColumnTrait, DatabaseConnection, EntityTrait, Order,
    QueryFilter, QueryOrder, QuerySelect,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{sleep, sleep_until, Instant};

use crate::config::OracleConfig;
use crate::entities::{collection_jobs, prelude::*};
use crate::error::OracleError;
use crate::models::job::{JobListQuery, JobState};
use crate::models::price::PriceSource;
use crate::services::price_fetcher::{fetch_with_retry, PriceFetcher};
use crate::services::price_store::{NewPricePoint, PriceStore};
use crate::services::token_metadata::{default_creation_timestamp, TokenMetadataProvider};

/// Poll delay when no queued work exists
const WORKER_IDLE_SECS: u64 = 5;

/// Upper bound on a job listing page
const LIST_JOBS_LIMIT: u64 = 100;

/// Global minimum spacing between outbound fetches, shared by every
/// worker so concurrent jobs cannot multiply the upstream request rate.
pub struct RateLimiter {
    min_interval: Duration,
    next_allowed: Mutex<Option<Instant>>,
}

impl RateLimiter {
    pub fn new(requests_per_minute: u32) -> Self {
        let min_interval = Duration::from_millis(60_000 / u64::from(requests_per_minute.max(1)));

        Self {
            min_interval,
            next_allowed: Mutex::new(None),
        }
    }

    /// Waits until a request slot is available. Slots are handed out in
    /// arrival order, spaced `min_interval` apart.
    pub async fn acquire(&self) {
        let slot = {
            let mut next = self.next_allowed.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(at) if at > now => at,
                _ => now,
            };
            *next = Some(slot + self.min_interval);
            slot
        };

        sleep_until(slot).await;
    }
}

#[derive(Debug, Clone)]
pub struct ScheduledJob {
    pub job_id: String,
    pub total: i32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelOutcome {
    Cancelled,
    AlreadyTerminal(JobState),
    NotFound,
}

/// What one processing run did. Tallies mirror the persisted job row.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProcessSummary {
    pub processed: i32,
    pub succeeded: i32,
    pub failed: i32,
    pub skipped: i32,
    pub cancelled: bool,
}

#[derive(Clone)]
pub struct CollectionScheduler {
    db: Arc<DatabaseConnection>,
    store: PriceStore,
    fetcher: Arc<dyn PriceFetcher>,
    metadata: Arc<dyn TokenMetadataProvider>,
    limiter: Arc<RateLimiter>,
    config: OracleConfig,
}

impl CollectionScheduler {
    pub fn new(
        db: Arc<DatabaseConnection>,
        fetcher: Arc<dyn PriceFetcher>,
        metadata: Arc<dyn TokenMetadataProvider>,
        config: OracleConfig,
    ) -> Self {
        let store = PriceStore::new(db.clone());
        let limiter = Arc::new(RateLimiter::new(config.requests_per_minute));

        Self {
            db,
            store,
            fetcher,
            metadata,
            limiter,
            config,
        }
    }

    /// Create and enqueue a collection job covering one timestamp per
    /// calendar day from the token's creation to now. Returns immediately;
    /// the workers pick the job up.
    pub async fn schedule(&self, token: &str, network: &str) -> Result<ScheduledJob, OracleError> {
        let creation_ts = match self.metadata.creation_timestamp(token, network).await {
            Ok(Some(ts)) => ts,
            Ok(None) => {
                tracing::info!(
                    token = %token,
                    network = %network,
                    "No creation date from metadata provider, using network default"
                );
                default_creation_timestamp(network)
            }
            Err(e) => {
                tracing::warn!(
                    token = %token,
                    network = %network,
                    "Metadata lookup failed, using network default: {}",
                    e
                );
                default_creation_timestamp(network)
            }
        };

        let timestamps = daily_timestamps(creation_ts, Utc::now().timestamp());
        let total = timestamps.len() as i32;
        let job_id = uuid::Uuid::new_v4().to_string();

        let job = collection_jobs::ActiveModel {
            job_id: Set(job_id.clone()),
            token: Set(token.to_string()),
            network: Set(network.to_string()),
            timestamps: Set(serde_json::json!(timestamps)),
            state: Set(JobState::Queued.as_str().to_string()),
            total: Set(total),
            processed: Set(0),
            succeeded: Set(0),
            failed_count: Set(0),
            created_at: Set(Utc::now().naive_utc()),
            ..Default::default()
        };
        job.insert(self.db.as_ref()).await?;

        tracing::info!(
            job_id = %job_id,
            token = %token,
            network = %network,
            total = total,
            "Scheduled collection job"
        );

        Ok(ScheduledJob { job_id, total })
    }

    /// Spawn the worker pool. Each worker polls for the oldest queued job,
    /// claims it, processes it to a terminal state, and polls again.
    /// Shuts down gracefully on ctrl-c.
    pub fn spawn_workers(&self) {
        for worker_id in 0..self.config.worker_count {
            let scheduler = self.clone();

            tokio::spawn(async move {
                tracing::info!(worker_id = worker_id, "Collection worker started");

                loop {
                    tokio::select! {
                        _ = tokio::signal::ctrl_c() => {
                            tracing::info!(worker_id = worker_id, "Collection worker stopping");
                            break;
                        }
                        claimed = scheduler.claim_next() => {
                            match claimed {
                                Ok(Some(job)) => scheduler.run_job(job).await,
                                Ok(None) => sleep(Duration::from_secs(WORKER_IDLE_SECS)).await,
                                Err(e) => {
                                    tracing::error!(
                                        worker_id = worker_id,
                                        "Failed to poll for queued jobs: {}",
                                        e
                                    );
                                    sleep(Duration::from_secs(WORKER_IDLE_SECS)).await;
                                }
                            }
                        }
                    }
                }
            });
        }
    }

    /// Claim the oldest queued job with an atomic state transition; losing
    /// a claim race to another worker is a normal `None`.
    pub async fn claim_next(&self) -> Result<Option<collection_jobs::Model>, OracleError> {
        let Some(job) = CollectionJobs::find()
            .filter(collection_jobs::Column::State.eq(JobState::Queued.as_str()))
            .order_by(collection_jobs::Column::CreatedAt, Order::Asc)
            .one(self.db.as_ref())
            .await?
        else {
            return Ok(None);
        };

        let started_at = Utc::now().naive_utc();
        let claimed = CollectionJobs::update_many()
            .col_expr(
                collection_jobs::Column::State,
                Expr::value(JobState::Running.as_str()),
            )
            .col_expr(collection_jobs::Column::StartedAt, Expr::value(started_at))
            .filter(collection_jobs::Column::Id.eq(job.id))
            .filter(collection_jobs::Column::State.eq(JobState::Queued.as_str()))
            .exec(self.db.as_ref())
            .await?;

        if claimed.rows_affected == 0 {
            return Ok(None);
        }

        let mut job = job;
        job.state = JobState::Running.as_str().to_string();
        job.started_at = Some(started_at);
        Ok(Some(job))
    }

    async fn run_job(&self, job: collection_jobs::Model) {
        let job_id = job.job_id.clone();
        let row_id = job.id;

        match self.process_job(job).await {
            Ok(summary) if summary.cancelled => {
                tracing::info!(
                    job_id = %job_id,
                    processed = summary.processed,
                    "Collection job cancelled"
                );
            }
            Ok(summary) => {
                tracing::info!(
                    job_id = %job_id,
                    processed = summary.processed,
                    succeeded = summary.succeeded,
                    failed = summary.failed,
                    skipped = summary.skipped,
                    "Collection job completed"
                );
            }
            Err(e) => {
                tracing::error!(job_id = %job_id, "Collection job failed: {}", e);
                if let Err(update_err) = self.mark_failed(row_id, &e.to_string()).await {
                    tracing::error!(
                        job_id = %job_id,
                        "Failed to record job failure: {}",
                        update_err
                    );
                }
            }
        }
    }

    /// Process a claimed job batch by batch. Item failures accumulate in
    /// the tallies; only storage unavailability fails the job itself.
    pub async fn process_job(
        &self,
        job: collection_jobs::Model,
    ) -> Result<ProcessSummary, OracleError> {
        let timestamps: Vec<i64> = serde_json::from_value(job.timestamps.clone())
            .map_err(|e| OracleError::Upstream(format!("Malformed job timestamps: {}", e)))?;

        let total = timestamps.len();
        let mut summary = ProcessSummary::default();
        let batch_count = timestamps.chunks(self.config.batch_size.max(1)).count();

        for (batch_index, batch) in timestamps.chunks(self.config.batch_size.max(1)).enumerate() {
            if batch_index > 0 {
                if self.is_cancelled(job.id).await? {
                    summary.cancelled = true;
                    return Ok(summary);
                }

                // Rate-limit courtesy pause between batches
                sleep(Duration::from_millis(self.config.batch_pause_ms)).await;
            }

            for &ts in batch {
                summary.processed += 1;

                if self
                    .store
                    .get_exact(&job.token, &job.network, ts)
                    .await?
                    .is_some()
                {
                    summary.skipped += 1;
                    continue;
                }

                self.limiter.acquire().await;

                match fetch_with_retry(
                    self.fetcher.as_ref(),
                    &job.token,
                    &job.network,
                    ts,
                    self.config.fetch_max_attempts,
                    self.config.fetch_base_backoff_ms,
                    self.config.fetch_timeout_secs,
                )
                .await
                {
                    Ok(Some(fetched)) => {
                        self.store
                            .upsert_one(NewPricePoint {
                                token: job.token.clone(),
                                network: job.network.clone(),
                                timestamp: ts,
                                price: rust_decimal::Decimal::from_f64_retain(fetched.price)
                                    .unwrap_or(rust_decimal::Decimal::ZERO)
                                    .round_dp(8),
                                volume: fetched
                                    .volume
                                    .and_then(rust_decimal::Decimal::from_f64_retain),
                                market_cap: fetched
                                    .market_cap
                                    .and_then(rust_decimal::Decimal::from_f64_retain),
                                source: PriceSource::External,
                                confidence: 1.0,
                                metadata: None,
                            })
                            .await?;
                        summary.succeeded += 1;
                    }
                    Ok(None) => {
                        tracing::debug!(
                            job_id = %job.job_id,
                            timestamp = ts,
                            "No upstream data for timestamp"
                        );
                        summary.failed += 1;
                    }
                    Err(e) => {
                        tracing::warn!(
                            job_id = %job.job_id,
                            timestamp = ts,
                            "Giving up on timestamp after retries: {}",
                            e
                        );
                        summary.failed += 1;
                    }
                }
            }

            self.update_progress(job.id, &summary).await?;

            tracing::info!(
                job_id = %job.job_id,
                batch = batch_index + 1,
                batches = batch_count,
                progress = %format!("{}/{}", summary.processed, total),
                succeeded = summary.succeeded,
                failed = summary.failed,
                "Batch complete"
            );
        }

        self.mark_completed(job.id, &summary).await?;
        Ok(summary)
    }

    pub async fn get_status(&self, job_id: &str) -> Result<collection_jobs::Model, OracleError> {
        CollectionJobs::find()
            .filter(collection_jobs::Column::JobId.eq(job_id))
            .one(self.db.as_ref())
            .await?
            .ok_or_else(|| OracleError::JobNotFound(job_id.to_string()))
    }

    pub async fn list_jobs(
        &self,
        query: &JobListQuery,
    ) -> Result<Vec<collection_jobs::Model>, OracleError> {
        let mut find = CollectionJobs::find();

        if let Some(state) = &query.state {
            find = find.filter(collection_jobs::Column::State.eq(state));
        }
        if let Some(token) = &query.token {
            find = find.filter(collection_jobs::Column::Token.eq(token));
        }
        if let Some(network) = &query.network {
            find = find.filter(collection_jobs::Column::Network.eq(network));
        }

        let jobs = find
            .order_by(collection_jobs::Column::CreatedAt, Order::Desc)
            .limit(LIST_JOBS_LIMIT)
            .all(self.db.as_ref())
            .await?;

        Ok(jobs)
    }

    /// Cancel a queued or running job. Unknown and already-terminal jobs
    /// are no-op outcomes, not errors. A running job's in-flight batch
    /// finishes; the processor observes the cancelled state before the
    /// next batch.
    pub async fn cancel(&self, job_id: &str) -> Result<CancelOutcome, OracleError> {
        let cancelled = CollectionJobs::update_many()
            .col_expr(
                collection_jobs::Column::State,
                Expr::value(JobState::Cancelled.as_str()),
            )
            .col_expr(
                collection_jobs::Column::FinishedAt,
                Expr::value(Utc::now().naive_utc()),
            )
            .filter(collection_jobs::Column::JobId.eq(job_id))
            .filter(
                collection_jobs::Column::State
                    .is_in([JobState::Queued.as_str(), JobState::Running.as_str()]),
            )
            .exec(self.db.as_ref())
            .await?;

        if cancelled.rows_affected > 0 {
            tracing::info!(job_id = %job_id, "Cancelled collection job");
            return Ok(CancelOutcome::Cancelled);
        }

        match CollectionJobs::find()
            .filter(collection_jobs::Column::JobId.eq(job_id))
            .one(self.db.as_ref())
            .await?
        {
            Some(job) => {
                let state = JobState::parse(&job.state).unwrap_or(JobState::Failed);
                Ok(CancelOutcome::AlreadyTerminal(state))
            }
            None => Ok(CancelOutcome::NotFound),
        }
    }

    async fn is_cancelled(&self, row_id: i64) -> Result<bool, OracleError> {
        let job = CollectionJobs::find_by_id(row_id).one(self.db.as_ref()).await?;

        Ok(job
            .map(|j| j.state == JobState::Cancelled.as_str())
            .unwrap_or(false))
    }

    async fn update_progress(
        &self,
        row_id: i64,
        summary: &ProcessSummary,
    ) -> Result<(), OracleError> {
        CollectionJobs::update_many()
            .col_expr(
                collection_jobs::Column::Processed,
                Expr::value(summary.processed),
            )
            .col_expr(
                collection_jobs::Column::Succeeded,
                Expr::value(summary.succeeded),
            )
            .col_expr(
                collection_jobs::Column::FailedCount,
                Expr::value(summary.failed),
            )
            .filter(collection_jobs::Column::Id.eq(row_id))
            .exec(self.db.as_ref())
            .await?;

        Ok(())
    }

    async fn mark_completed(
        &self,
        row_id: i64,
        summary: &ProcessSummary,
    ) -> Result<(), OracleError> {
        CollectionJobs::update_many()
            .col_expr(
                collection_jobs::Column::State,
                Expr::value(JobState::Completed.as_str()),
            )
            .col_expr(
                collection_jobs::Column::Processed,
                Expr::value(summary.processed),
            )
            .col_expr(
                collection_jobs::Column::Succeeded,
                Expr::value(summary.succeeded),
            )
            .col_expr(
                collection_jobs::Column::FailedCount,
                Expr::value(summary.failed),
            )
            .col_expr(
                collection_jobs::Column::FinishedAt,
                Expr::value(Utc::now().naive_utc()),
            )
            .filter(collection_jobs::Column::Id.eq(row_id))
            // A cancel that landed mid-batch wins over completion
            .filter(collection_jobs::Column::State.eq(JobState::Running.as_str()))
            .exec(self.db.as_ref())
            .await?;

        Ok(())
    }

    async fn mark_failed(&self, row_id: i64, error: &str) -> Result<(), OracleError> {
        CollectionJobs::update_many()
            .col_expr(
                collection_jobs::Column::State,
                Expr::value(JobState::Failed.as_str()),
            )
            .col_expr(collection_jobs::Column::LastError, Expr::value(error))
            .col_expr(
                collection_jobs::Column::FinishedAt,
                Expr::value(Utc::now().naive_utc()),
            )
            .filter(collection_jobs::Column::Id.eq(row_id))
            .exec(self.db.as_ref())
            .await?;

        Ok(())
    }
}

/// One timestamp per calendar day (UTC midnight), from `from_ts`'s day
/// through `now_ts`'s day inclusive.
pub fn daily_timestamps(from_ts: i64, now_ts: i64) -> Vec<i64> {
    let Some(start) = DateTime::from_timestamp(from_ts, 0) else {
        return Vec::new();
    };
    let Some(end) = DateTime::from_timestamp(now_ts, 0) else {
        return Vec::new();
    };

    let mut date = start.date_naive();
    let end_date = end.date_naive();
    let mut timestamps = Vec::new();

    while date <= end_date {
        if let Some(midnight) = date.and_hms_opt(0, 0, 0) {
            timestamps.push(midnight.and_utc().timestamp());
        }
        date = date + chrono::Duration::days(1);
    }

    timestamps
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::price_points;
    use crate::error::FetchError;
    use crate::services::price_fetcher::FetchedPrice;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};
    use std::collections::HashSet;
    use std::sync::atomic::{AtomicU32, Ordering};

    const DAY: i64 = 86_400;

    struct SelectiveFetcher {
        calls: AtomicU32,
        fail_for: HashSet<i64>,
    }

    impl SelectiveFetcher {
        fn failing_for(timestamps: impl IntoIterator<Item = i64>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicU32::new(0),
                fail_for: timestamps.into_iter().collect(),
            })
        }
    }

    #[async_trait]
    impl PriceFetcher for SelectiveFetcher {
        async fn fetch_price(
            &self,
            _token: &str,
            _network: &str,
            timestamp: i64,
        ) -> Result<Option<FetchedPrice>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail_for.contains(&timestamp) {
                Err(FetchError::Upstream("boom".to_string()))
            } else {
                Ok(Some(FetchedPrice {
                    price: 1.0,
                    volume: None,
                    market_cap: None,
                }))
            }
        }
    }

    struct NoMetadata;

    #[async_trait]
    impl TokenMetadataProvider for NoMetadata {
        async fn creation_timestamp(
            &self,
            _token: &str,
            _network: &str,
        ) -> Result<Option<i64>, FetchError> {
            Ok(None)
        }
    }

    fn stored_point(id: i64, timestamp: i64) -> price_points::Model {
        price_points::Model {
            id,
            token: "0xabc".to_string(),
            network: "ethereum".to_string(),
            timestamp,
            price: dec!(1),
            volume: None,
            market_cap: None,
            source: "external".to_string(),
            confidence: 1.0,
            metadata: None,
            created_at: None,
        }
    }

    fn job_model(timestamps: &[i64]) -> collection_jobs::Model {
        collection_jobs::Model {
            id: 1,
            job_id: "job-1".to_string(),
            token: "0xabc".to_string(),
            network: "ethereum".to_string(),
            timestamps: serde_json::json!(timestamps),
            state: "running".to_string(),
            total: timestamps.len() as i32,
            processed: 0,
            succeeded: 0,
            failed_count: 0,
            last_error: None,
            created_at: Utc::now().naive_utc(),
            started_at: Some(Utc::now().naive_utc()),
            finished_at: None,
        }
    }

    fn fast_config(batch_size: usize) -> OracleConfig {
        OracleConfig {
            batch_size,
            fetch_base_backoff_ms: 1,
            fetch_timeout_secs: 5,
            batch_pause_ms: 1,
            requests_per_minute: 60_000,
            ..OracleConfig::default()
        }
    }

    fn scheduler(
        db: DatabaseConnection,
        fetcher: Arc<dyn PriceFetcher>,
        batch_size: usize,
    ) -> CollectionScheduler {
        CollectionScheduler::new(Arc::new(db), fetcher, Arc::new(NoMetadata), fast_config(batch_size))
    }

    #[test]
    fn test_daily_timestamps_cover_every_day() {
        // 2023-01-01T12:00:00Z to 2023-01-05T06:00:00Z spans five days
        let timestamps = daily_timestamps(1_672_574_400, 1_672_898_400);

        assert_eq!(timestamps.len(), 5);
        assert_eq!(timestamps[0], 1_672_531_200); // 2023-01-01T00:00:00Z
        for pair in timestamps.windows(2) {
            assert_eq!(pair[1] - pair[0], DAY);
        }
    }

    #[test]
    fn test_daily_timestamps_single_day() {
        let timestamps = daily_timestamps(1_672_574_400, 1_672_574_400);
        assert_eq!(timestamps.len(), 1);
    }

    #[tokio::test]
    async fn test_batch_failures_never_abort_the_job() {
        let timestamps: Vec<i64> = (1..=10).map(|i| i * DAY).collect();
        let failing = [3 * DAY, 7 * DAY];

        // Per item: exact-miss query; successful items add an upsert
        // find-miss and an insert-returning query.
        let mut query_results: Vec<Vec<price_points::Model>> = Vec::new();
        for &ts in &timestamps {
            query_results.push(vec![]);
            if !failing.contains(&ts) {
                query_results.push(vec![]);
                query_results.push(vec![stored_point(ts / DAY, ts)]);
            }
        }

        let exec_results: Vec<MockExecResult> = (0..12)
            .map(|i| MockExecResult {
                last_insert_id: i,
                rows_affected: 1,
            })
            .collect();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(query_results)
            .append_exec_results(exec_results)
            .into_connection();

        let fetcher = SelectiveFetcher::failing_for(failing);
        let scheduler = scheduler(db, fetcher.clone(), 10);

        let summary = scheduler
            .process_job(job_model(&timestamps))
            .await
            .unwrap();

        assert!(!summary.cancelled);
        assert_eq!(summary.processed, 10);
        assert_eq!(summary.succeeded, 8);
        assert_eq!(summary.failed, 2);
        // 8 single-attempt successes + 2 items retried to exhaustion
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 8 + 2 * 3);
    }

    #[tokio::test]
    async fn test_cancellation_halts_before_next_batch() {
        let timestamps: Vec<i64> = (1..=4).map(|i| i * DAY).collect();

        // Batch one (two items) succeeds, then the between-batch state
        // check sees the job cancelled.
        let mut query_results: Vec<Vec<price_points::Model>> = Vec::new();
        for &ts in &timestamps[..2] {
            query_results.push(vec![]);
            query_results.push(vec![]);
            query_results.push(vec![stored_point(ts / DAY, ts)]);
        }

        let mut cancelled_job = job_model(&timestamps);
        cancelled_job.state = "cancelled".to_string();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(query_results)
            .append_query_results([vec![cancelled_job]])
            .append_exec_results(
                (0..4)
                    .map(|i| MockExecResult {
                        last_insert_id: i,
                        rows_affected: 1,
                    })
                    .collect::<Vec<_>>(),
            )
            .into_connection();

        let fetcher = SelectiveFetcher::failing_for([]);
        let scheduler = scheduler(db, fetcher.clone(), 2);

        let summary = scheduler
            .process_job(job_model(&timestamps))
            .await
            .unwrap();

        assert!(summary.cancelled);
        assert_eq!(summary.processed, 2);
        assert_eq!(summary.succeeded, 2);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_existing_points_are_skipped_without_fetching() {
        let timestamps: Vec<i64> = (1..=3).map(|i| i * DAY).collect();

        let query_results: Vec<Vec<price_points::Model>> = timestamps
            .iter()
            .map(|&ts| vec![stored_point(ts / DAY, ts)])
            .collect();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results(query_results)
            .append_exec_results([
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
                MockExecResult {
                    last_insert_id: 0,
                    rows_affected: 1,
                },
            ])
            .into_connection();

        let fetcher = SelectiveFetcher::failing_for([]);
        let scheduler = scheduler(db, fetcher.clone(), 10);

        let summary = scheduler
            .process_job(job_model(&timestamps))
            .await
            .unwrap();

        assert_eq!(summary.processed, 3);
        assert_eq!(summary.skipped, 3);
        assert_eq!(summary.succeeded, 0);
        assert_eq!(summary.failed, 0);
        assert_eq!(fetcher.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_claim_next_loses_race_gracefully() {
        let mut queued = job_model(&[DAY]);
        queued.state = "queued".to_string();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![queued]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();

        let fetcher = SelectiveFetcher::failing_for([]);
        let scheduler = scheduler(db, fetcher, 10);

        let claimed = scheduler.claim_next().await.unwrap();
        assert!(claimed.is_none());
    }

    #[tokio::test]
    async fn test_claim_next_marks_job_running() {
        let mut queued = job_model(&[DAY]);
        queued.state = "queued".to_string();
        queued.started_at = None;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![queued]])
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        let fetcher = SelectiveFetcher::failing_for([]);
        let scheduler = scheduler(db, fetcher, 10);

        let claimed = scheduler.claim_next().await.unwrap().expect("should claim");
        assert_eq!(claimed.state, "running");
        assert!(claimed.started_at.is_some());
    }

    #[tokio::test]
    async fn test_cancel_unknown_job_is_not_found() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .append_query_results([Vec::<collection_jobs::Model>::new()])
            .into_connection();

        let fetcher = SelectiveFetcher::failing_for([]);
        let scheduler = scheduler(db, fetcher, 10);

        let outcome = scheduler.cancel("missing-job").await.unwrap();
        assert_eq!(outcome, CancelOutcome::NotFound);
    }

    #[tokio::test]
    async fn test_cancel_terminal_job_is_a_no_op() {
        let mut done = job_model(&[DAY]);
        done.state = "completed".to_string();

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .append_query_results([vec![done]])
            .into_connection();

        let fetcher = SelectiveFetcher::failing_for([]);
        let scheduler = scheduler(db, fetcher, 10);

        let outcome = scheduler.cancel("job-1").await.unwrap();
        assert_eq!(outcome, CancelOutcome::AlreadyTerminal(JobState::Completed));
    }

    #[tokio::test]
    async fn test_rate_limiter_spaces_requests() {
        let limiter = RateLimiter::new(1_200); // 50ms spacing

        let started = Instant::now();
        limiter.acquire().await;
        limiter.acquire().await;
        limiter.acquire().await;

        assert!(started.elapsed() >= Duration::from_millis(100));
    }
}
