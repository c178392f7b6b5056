use serde::{Deserialize, Serialize};

use crate::validation::FieldViolation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Success,
    Error,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct PredictResponse {
    pub status: Status,
    pub prediction_kbtu: f64,
}

impl PredictResponse {
    pub fn success(prediction_kbtu: f64) -> Self {
        Self {
            status: Status::Success,
            prediction_kbtu,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub status: Status,
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<FieldViolation>,
}

impl ErrorBody {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            status: Status::Error,
            message: message.into(),
            errors: Vec::new(),
        }
    }

    pub fn with_errors(mut self, errors: Vec<FieldViolation>) -> Self {
        self.errors = errors;
        self
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: i64,
}

/// What the server loaded at startup.
#[derive(Debug, Serialize, Deserialize)]
pub struct MetadataResponse {
    pub model_name: String,
    pub features: Vec<String>,
    pub scaler_width: usize,
    pub model_width: usize,
    /// Zero columns appended before scaling; negative means misconfigured artifacts.
    pub padding_gap: i64,
}
