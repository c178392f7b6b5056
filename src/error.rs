//! Error handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use std::path::PathBuf;
use thiserror::Error;

use crate::types::ErrorBody;
use crate::validation::ValidationError;

pub type AppResult<T> = Result<T, AppError>;

/// Runtime shape/value failures raised by the scaler or the regressor.
#[derive(Debug, Error, PartialEq)]
pub enum ModelError {
    #[error("feature length mismatch: got {got}, expected {expected}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("non-finite value produced by {0}")]
    NonFinite(&'static str),
}

/// Failures between a validated record and a finished prediction.
#[derive(Debug, Error, PartialEq)]
pub enum PredictionError {
    #[error("feature `{0}` is not part of the model feature list")]
    MissingFeature(String),

    #[error("scaler expects {scaler_width} features but {assembled} were assembled")]
    ScalerTooNarrow { scaler_width: usize, assembled: usize },

    #[error("scaler returned {got} values, expected {expected}")]
    ScalerOutput { expected: usize, got: usize },

    #[error("model width {model_width} exceeds scaler width {scaler_width}")]
    ModelWiderThanScaler { model_width: usize, scaler_width: usize },

    #[error("prediction is not a finite number ({0})")]
    NonFinitePrediction(f64),

    #[error(transparent)]
    Model(#[from] ModelError),
}

/// Problems reading or checking the stored artifacts at startup.
#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("failed to read {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("invalid model identifier `{0}`")]
    InvalidName(String),

    #[error("invalid {artifact} artifact: {reason}")]
    Invalid {
        artifact: &'static str,
        reason: String,
    },
}

impl ArtifactError {
    pub(crate) fn invalid(artifact: &'static str, reason: impl Into<String>) -> Self {
        ArtifactError::Invalid {
            artifact,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("malformed request body: {0}")]
    MalformedBody(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("prediction failed: {0}")]
    Prediction(#[from] PredictionError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = self.to_string();
        let (status, body) = match self {
            AppError::MalformedBody(_) => {
                tracing::warn!("{}", message);
                (StatusCode::BAD_REQUEST, ErrorBody::new(message))
            }
            AppError::Validation(err) => {
                tracing::warn!("rejected request: {}", message);
                (
                    StatusCode::UNPROCESSABLE_ENTITY,
                    ErrorBody::new(message).with_errors(err.into_violations()),
                )
            }
            AppError::Prediction(_) => {
                tracing::error!("{}", message);
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorBody::new(message))
            }
        };

        (status, Json(body)).into_response()
    }
}
