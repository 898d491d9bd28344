use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Json, Response};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;

use crate::resolution::{Miss, Outcome};
use crate::upstream::UpstreamError;

use super::state::AppState;

// ─── Error response ──────────────────────────────────────────────

#[derive(Serialize)]
struct ApiErrorBody {
    message: String,
}

pub(super) struct ApiError(StatusCode, String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.0, Json(ApiErrorBody { message: self.1 })).into_response()
    }
}

impl From<UpstreamError> for ApiError {
    fn from(e: UpstreamError) -> Self {
        let status =
            StatusCode::from_u16(e.status_code()).unwrap_or(StatusCode::BAD_GATEWAY);
        ApiError(status, e.user_message())
    }
}

/// Blank city is a bare 400; every other miss carries its message.
fn miss_response(miss: Miss) -> Response {
    match miss {
        Miss::CityRequired => StatusCode::BAD_REQUEST.into_response(),
        _ => {
            let status = StatusCode::from_u16(miss.status()).unwrap_or(StatusCode::NOT_FOUND);
            ApiError(status, miss.message().to_string()).into_response()
        }
    }
}

/// Upstream calls are blocking; keep them off the async workers.
async fn run_blocking<T, F>(work: F) -> Result<T, ApiError>
where
    F: FnOnce() -> Result<T, UpstreamError> + Send + 'static,
    T: Send + 'static,
{
    match tokio::task::spawn_blocking(work).await {
        Ok(result) => result.map_err(ApiError::from),
        Err(e) => {
            tracing::error!(error = %e, "resolution task failed");
            Err(ApiError(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal error.".to_string(),
            ))
        }
    }
}

fn respond<T: Serialize>(result: Result<Outcome<T>, ApiError>) -> Response {
    match result {
        Ok(Outcome::Found(body)) => Json(body).into_response(),
        Ok(Outcome::Missing(miss)) => miss_response(miss),
        Err(e) => e.into_response(),
    }
}

// ─── GET /api/health ─────────────────────────────────────────────

pub async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

// ─── GET /api/aqi ────────────────────────────────────────────────

#[derive(Deserialize)]
pub struct CityQuery {
    pub city: Option<String>,
}

pub async fn aqi(State(state): State<Arc<AppState>>, Query(params): Query<CityQuery>) -> Response {
    let start = Instant::now();

    let city = params.city.unwrap_or_default();
    if city.trim().is_empty() {
        return miss_response(Miss::CityRequired);
    }

    let service = Arc::clone(&state.service);
    let query = city.clone();
    let result = run_blocking(move || service.resolve(&query)).await;

    let response = respond(result);
    tracing::info!(
        city = %city.trim(),
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "GET /api/aqi"
    );
    response
}

// ─── GET /api/forecast ───────────────────────────────────────────

pub async fn forecast(
    State(state): State<Arc<AppState>>,
    Query(params): Query<CityQuery>,
) -> Response {
    let start = Instant::now();

    let city = params.city.unwrap_or_default();
    if city.trim().is_empty() {
        return miss_response(Miss::CityRequired);
    }

    let service = Arc::clone(&state.service);
    let query = city.clone();
    let result = run_blocking(move || service.forecast(&query)).await;

    let response = respond(result);
    tracing::info!(
        city = %city.trim(),
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "GET /api/forecast"
    );
    response
}

// ─── GET /api/location/{id} ──────────────────────────────────────

pub async fn location(State(state): State<Arc<AppState>>, Path(raw_id): Path<String>) -> Response {
    let start = Instant::now();

    let Ok(id) = raw_id.trim().parse::<u64>() else {
        return ApiError(StatusCode::BAD_REQUEST, "Invalid location id.".to_string()).into_response();
    };

    let service = Arc::clone(&state.service);
    let response = respond(run_blocking(move || service.station(id)).await);
    tracing::info!(
        location_id = id,
        status = response.status().as_u16(),
        elapsed_ms = start.elapsed().as_millis() as u64,
        "GET /api/location"
    );
    response
}
