//! Collection job control endpoints

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::handlers::price::map_oracle_error;
use crate::jobs::collection::CancelOutcome;
use crate::models::job::{
    CancelResponse, JobListQuery, JobStatusResponse, ScheduleRequest, ScheduleResponse,
};
use crate::models::price::ErrorResponse;
use crate::AppState;

pub async fn schedule_collection(
    State(state): State<AppState>,
    Json(request): Json<ScheduleRequest>,
) -> Result<Json<ScheduleResponse>, (StatusCode, Json<ErrorResponse>)> {
    let token = request.token.trim().to_lowercase();
    let network = request.network.trim().to_lowercase();

    if token.is_empty() || network.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "token and network must be non-empty".to_string(),
            }),
        ));
    }

    let scheduled = state
        .scheduler
        .schedule(&token, &network)
        .await
        .map_err(map_oracle_error)?;

    Ok(Json(ScheduleResponse {
        job_id: scheduled.job_id,
        total: scheduled.total,
    }))
}

pub async fn get_job_status(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<JobStatusResponse>, (StatusCode, Json<ErrorResponse>)> {
    let job = state
        .scheduler
        .get_status(&job_id)
        .await
        .map_err(map_oracle_error)?;

    Ok(Json(JobStatusResponse::from(job)))
}

pub async fn list_jobs(
    State(state): State<AppState>,
    Query(query): Query<JobListQuery>,
) -> Result<Json<Vec<JobStatusResponse>>, (StatusCode, Json<ErrorResponse>)> {
    let jobs = state
        .scheduler
        .list_jobs(&query)
        .await
        .map_err(map_oracle_error)?;

    Ok(Json(jobs.into_iter().map(JobStatusResponse::from).collect()))
}

pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> Result<Json<CancelResponse>, (StatusCode, Json<ErrorResponse>)> {
    let outcome = state
        .scheduler
        .cancel(&job_id)
        .await
        .map_err(map_oracle_error)?;

    let response = match outcome {
        CancelOutcome::Cancelled => CancelResponse {
            cancelled: true,
            state: Some("cancelled".to_string()),
        },
        CancelOutcome::AlreadyTerminal(state) => CancelResponse {
            cancelled: false,
            state: Some(state.as_str().to_string()),
        },
        CancelOutcome::NotFound => CancelResponse {
            cancelled: false,
            state: None,
        },
    };

    Ok(Json(response))
}
