//! HTTP handlers

use axum::{
    extract::{rejection::JsonRejection, State},
    routing::{get, post},
    Json, Router,
};
use serde_json::Value;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::error::{AppError, AppResult};
use crate::features::Predictor;
use crate::types::{HealthResponse, MetadataResponse, PredictResponse};
use crate::validation::{self, BuildingData};

/// Shared, read-only server state.
#[derive(Clone)]
pub struct AppState {
    pub predictor: Arc<Predictor>,
    pub model_name: Arc<str>,
}

impl AppState {
    pub fn new(predictor: Predictor, model_name: impl Into<Arc<str>>) -> Self {
        Self {
            predictor: Arc::new(predictor),
            model_name: model_name.into(),
        }
    }
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/metadata", get(metadata))
        .route("/predict", post(predict))
        .route("/predict/example", get(example))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

pub async fn predict(
    State(state): State<AppState>,
    payload: Result<Json<Value>, JsonRejection>,
) -> AppResult<Json<PredictResponse>> {
    let Json(payload) = payload.map_err(|e| AppError::MalformedBody(e.body_text()))?;

    let record = validation::validate_payload(&payload)?;
    let prediction_kbtu = state.predictor.predict(&record)?;

    tracing::debug!("predicted {} kBTU", prediction_kbtu);
    Ok(Json(PredictResponse::success(prediction_kbtu)))
}

pub async fn example() -> Json<BuildingData> {
    Json(BuildingData::example())
}

pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now().timestamp(),
    })
}

pub async fn metadata(State(state): State<AppState>) -> Json<MetadataResponse> {
    let p = &state.predictor;
    Json(MetadataResponse {
        model_name: state.model_name.to_string(),
        features: p.features().to_vec(),
        scaler_width: p.scaler_width(),
        model_width: p.model_width(),
        padding_gap: p.padding_gap(),
    })
}
