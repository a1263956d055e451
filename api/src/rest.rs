use crate::errors::Error;
use crate::metrics::{RECORDS_CREATED_TOTAL, VALIDATION_FAILURES_TOTAL};
use crate::model::TelemetryRecord;
use crate::repo::TelemetryRepo;
use crate::store::Store;
use crate::validate::validate_record;
use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};
use std::sync::Arc;
use tracing::error;

#[derive(Clone)]
struct AppState {
    repo: TelemetryRepo,
}

#[derive(Debug, Deserialize)]
struct PageParams {
    limit: Option<i64>,
    offset: Option<i64>,
}

pub fn create_router(store: Arc<dyn Store>) -> Router {
    let state = AppState {
        repo: TelemetryRepo::new(store),
    };

    // Django-style trailing slashes are accepted alongside bare paths.
    Router::new()
        .route("/azure-data", get(list).post(create))
        .route("/azure-data/", get(list).post(create))
        .route("/azure-data/:id", get(detail).put(update).delete(remove))
        .route("/azure-data/:id/", get(detail).put(update).delete(remove))
        .with_state(state)
}

async fn list(
    State(state): State<AppState>,
    Query(params): Query<PageParams>,
) -> Result<Json<Vec<TelemetryRecord>>, ApiError> {
    let records = state.repo.list(params.limit, params.offset).await?;
    Ok(Json(records))
}

async fn create(
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<(StatusCode, Json<TelemetryRecord>), ApiError> {
    let record = validate_record(&body)?;
    let stored = state.repo.create(record).await?;
    RECORDS_CREATED_TOTAL.inc();
    Ok((StatusCode::CREATED, Json(stored)))
}

async fn detail(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<Json<TelemetryRecord>, ApiError> {
    Ok(Json(state.repo.get(id).await?))
}

async fn update(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<Value>,
) -> Result<Json<TelemetryRecord>, ApiError> {
    let record = validate_record(&body)?;
    Ok(Json(state.repo.update(id, record).await?))
}

async fn remove(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> Result<StatusCode, ApiError> {
    state.repo.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

struct ApiError(Error);

impl From<Error> for ApiError {
    fn from(err: Error) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self.0 {
            Error::Validation(v) => {
                VALIDATION_FAILURES_TOTAL.inc();
                (
                    StatusCode::BAD_REQUEST,
                    Json(json!({"error": "validation failed", "fields": v.errors})),
                )
                    .into_response()
            }
            Error::InvalidArgument(msg) => {
                (StatusCode::BAD_REQUEST, Json(json!({"error": msg}))).into_response()
            }
            Error::NotFound => {
                (StatusCode::NOT_FOUND, Json(json!({"error": "not found"}))).into_response()
            }
            Error::DeviceNotFound(name) => (
                StatusCode::NOT_FOUND,
                Json(json!({"error": format!("device not found: {}", name)})),
            )
                .into_response(),
            err @ Error::AmbiguousDevice { .. } => {
                error!("Store integrity fault: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "store integrity fault"})),
                )
                    .into_response()
            }
            // Store and transport detail stays in the server log.
            err => {
                error!("API error: {}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({"error": "internal error"})),
                )
                    .into_response()
            }
        }
    }
}
