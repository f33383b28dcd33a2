use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::exporter::{CatalogError, LocalCatalog, MetricScanner, ScanMode};
use crate::model::{MetricDefinition, StrategyMetric};

/// Application state shared across handlers
pub struct AppState {
    pub catalog: LocalCatalog,
    pub scanner: Arc<MetricScanner>,
    pub scan_mode: ScanMode,
}

// ============================================================================
// Health Check
// ============================================================================

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub metrics: usize,
}

pub async fn health_check(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        version: env!("CARGO_PKG_VERSION"),
        metrics: state.catalog.registry().len(),
    })
}

// ============================================================================
// Metric definitions
// ============================================================================

pub async fn create_metric(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<MetricDefinition>, JsonRejection>,
) -> Result<(StatusCode, Json<StrategyMetric>), ApiError> {
    let Json(definition) = body?;
    let metric = definition.into_metric(id);

    state.catalog.create(metric.clone())?;
    tracing::info!(strategy_id = %metric.strategy_id, "Metric created");

    Ok((StatusCode::CREATED, Json(metric)))
}

pub async fn get_metric(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<StrategyMetric>, ApiError> {
    state
        .catalog
        .get(&id)
        .map(Json)
        .ok_or_else(|| ApiError::NotFound(format!("Metric not found: {}", id)))
}

pub async fn replace_metric(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
    body: Result<Json<MetricDefinition>, JsonRejection>,
) -> Result<Json<StrategyMetric>, ApiError> {
    let Json(definition) = body?;
    let metric = definition.into_metric(id);

    let previous = state.catalog.replace(metric.clone());
    tracing::info!(
        strategy_id = %metric.strategy_id,
        replaced = previous.is_some(),
        "Metric stored"
    );

    Ok(Json(metric))
}

pub async fn delete_metric(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    match state.catalog.remove(&id) {
        Some(_) => {
            tracing::info!(strategy_id = %id, "Metric deleted");
            Ok(StatusCode::NO_CONTENT)
        }
        None => Err(ApiError::NotFound(format!("Metric not found: {}", id))),
    }
}

// ============================================================================
// Exposition
// ============================================================================

pub async fn metrics(State(state): State<Arc<AppState>>) -> Result<Response, ApiError> {
    if state.scan_mode == ScanMode::OnScrape {
        state.scanner.scan().await;
    }

    let body = state
        .scanner
        .gauge()
        .encode()
        .map_err(|e| ApiError::Internal(e.to_string()))?;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, prometheus::TEXT_FORMAT)],
        body,
    )
        .into_response())
}

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    Internal(String),
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<CatalogError> for ApiError {
    fn from(e: CatalogError) -> Self {
        match e {
            CatalogError::AlreadyExists(_) => ApiError::Conflict(e.to_string()),
            _ => ApiError::Internal(e.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = serde_json::json!({
            "error": message
        });

        (status, Json(body)).into_response()
    }
}
