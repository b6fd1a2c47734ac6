use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::entities::collection_jobs;

/// Collection job lifecycle: queued -> running -> {completed, failed},
/// with cancelled reachable from queued or running.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
            JobState::Cancelled => "cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "queued" => Some(JobState::Queued),
            "running" => Some(JobState::Running),
            "completed" => Some(JobState::Completed),
            "failed" => Some(JobState::Failed),
            "cancelled" => Some(JobState::Cancelled),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobState::Completed | JobState::Failed | JobState::Cancelled
        )
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScheduleRequest {
    pub token: String,
    pub network: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScheduleResponse {
    pub job_id: String,
    pub total: i32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct JobListQuery {
    pub state: Option<String>,
    pub token: Option<String>,
    pub network: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobStatusResponse {
    pub job_id: String,
    pub token: String,
    pub network: String,
    pub state: String,
    /// Percentage of processed timestamps, 0-100
    pub progress: u8,
    pub total: i32,
    pub processed: i32,
    pub succeeded: i32,
    pub failed: i32,
    pub created_at: NaiveDateTime,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<NaiveDateTime>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<NaiveDateTime>,
}

impl From<collection_jobs::Model> for JobStatusResponse {
    fn from(job: collection_jobs::Model) -> Self {
        let progress = if job.total > 0 {
            ((job.processed as f64 / job.total as f64) * 100.0).round() as u8
        } else {
            100
        };

        Self {
            job_id: job.job_id,
            token: job.token,
            network: job.network,
            state: job.state,
            progress: progress.min(100),
            total: job.total,
            processed: job.processed,
            succeeded: job.succeeded,
            failed: job.failed_count,
            created_at: job.created_at,
            started_at: job.started_at,
            finished_at: job.finished_at,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelResponse {
    pub cancelled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_round_trip() {
        for state in [
            JobState::Queued,
            JobState::Running,
            JobState::Completed,
            JobState::Failed,
            JobState::Cancelled,
        ] {
            assert_eq!(JobState::parse(state.as_str()), Some(state));
        }
        assert_eq!(JobState::parse("paused"), None);
    }

    #[test]
    fn test_terminal_states() {
        assert!(!JobState::Queued.is_terminal());
        assert!(!JobState::Running.is_terminal());
        assert!(JobState::Completed.is_terminal());
        assert!(JobState::Failed.is_terminal());
        assert!(JobState::Cancelled.is_terminal());
    }

    #[test]
    fn test_progress_from_tallies() {
        let job = collection_jobs::Model {
            id: 1,
            job_id: "j".to_string(),
            token: "0xabc".to_string(),
            network: "ethereum".to_string(),
            timestamps: serde_json::json!([]),
            state: "running".to_string(),
            total: 40,
            processed: 10,
            succeeded: 9,
            failed_count: 1,
            last_error: None,
            created_at: chrono::Utc::now().naive_utc(),
            started_at: None,
            finished_at: None,
        };

        let status = JobStatusResponse::from(job);
        assert_eq!(status.progress, 25);
        assert_eq!(status.succeeded, 9);
        assert_eq!(status.failed, 1);
    }
}
