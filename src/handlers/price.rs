//! Price resolution endpoint
//!
//! Thin glue: validate the request shape, call the resolver, map the error
//! taxonomy to status codes. "No price available" is an expected 404, not
//! a fault; storage unavailability is a 503.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;

use crate::error::OracleError;
use crate::models::price::{ErrorResponse, PriceQuery, PriceResolution};
use crate::AppState;

pub async fn get_price(
    State(state): State<AppState>,
    Path((network, token)): Path<(String, String)>,
    Query(query): Query<PriceQuery>,
) -> Result<Json<PriceResolution>, (StatusCode, Json<ErrorResponse>)> {
    let token = token.trim().to_lowercase();
    let network = network.trim().to_lowercase();

    if token.is_empty() || network.is_empty() {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: "token and network must be non-empty".to_string(),
            }),
        ));
    }

    if query.timestamp <= 0 {
        return Err((
            StatusCode::BAD_REQUEST,
            Json(ErrorResponse {
                error: format!("invalid timestamp: {}", query.timestamp),
            }),
        ));
    }

    let resolution = state
        .resolver
        .resolve(&token, &network, query.timestamp)
        .await
        .map_err(map_oracle_error)?;

    Ok(Json(resolution))
}

pub fn map_oracle_error(e: OracleError) -> (StatusCode, Json<ErrorResponse>) {
    let status = match &e {
        OracleError::PriceUnavailable { .. } | OracleError::JobNotFound(_) => {
            StatusCode::NOT_FOUND
        }
        OracleError::Storage(_) => StatusCode::SERVICE_UNAVAILABLE,
        OracleError::Upstream(_) => StatusCode::BAD_GATEWAY,
    };

    if !e.is_expected() {
        tracing::error!("Request failed: {}", e);
    }

    (
        status,
        Json(ErrorResponse {
            error: e.to_string(),
        }),
    )
}

pub async fn health() -> &'static str {
    "ok"
}
