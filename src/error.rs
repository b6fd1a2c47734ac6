//! Service error taxonomy
//!
//! `OracleError` is what the core surfaces to callers; `FetchError` is the
//! transient-failure signal of the external price source, consumed and
//! converted at the point of use (retry loops), never propagated raw.

use sea_orm::DbErr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum OracleError {
    /// No data at any resolution tier. An expected negative result.
    #[error("no price available for {token} on {network} at {timestamp}")]
    PriceUnavailable {
        token: String,
        network: String,
        timestamp: i64,
    },

    /// The persistence layer is unreachable. Distinct from "no data" so
    /// callers can tell "empty result" from "can't determine".
    #[error("storage unavailable: {0}")]
    Storage(#[from] DbErr),

    /// The external source stayed unreachable after bounded retries.
    #[error("upstream source unavailable: {0}")]
    Upstream(String),

    #[error("job {0} not found")]
    JobNotFound(String),
}

impl OracleError {
    /// Expected negative outcomes are not logged as faults.
    pub fn is_expected(&self) -> bool {
        matches!(
            self,
            OracleError::PriceUnavailable { .. } | OracleError::JobNotFound(_)
        )
    }
}

/// Transient failures of the external price source. All variants are
/// retryable with backoff; "data does not exist upstream" is `Ok(None)`
/// on the fetcher, not an error.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("rate limited by upstream")]
    RateLimited,

    #[error("upstream request timed out")]
    Timeout,

    #[error("upstream error: {0}")]
    Upstream(String),
}
