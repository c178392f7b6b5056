//! Feature assembly and prediction.
//!
//! The scaler was fit over a wider column set than the model, so a request
//! goes through: zero vector in `features` order → fill known columns →
//! right-pad to the scaler width → scale → keep the first `model_width`
//! columns → predict in log space → `exp_m1` → round to cents.

use std::sync::Arc;

use crate::error::PredictionError;
use crate::model::{ArtifactBundle, Regressor, Scaler};
use crate::validation::{BuildingRecord, BUILDING_AGE, HAS_GAS, NUMBER_OF_FLOORS};

/// Column holding `ln(1 + PropertyGFATotal)`.
pub const GFA_LOG_FEATURE: &str = "PropertyGFATotal_log";

/// Model width the current artifacts were trained with.
pub const DEFAULT_MODEL_WIDTH: usize = 24;

pub struct Predictor {
    features: Arc<[String]>,
    scaler: Arc<dyn Scaler>,
    model: Arc<dyn Regressor>,
    model_width: usize,
    log_features: bool,
}

impl Predictor {
    pub fn new(bundle: ArtifactBundle, model_width: usize) -> Self {
        Self {
            features: bundle.features,
            scaler: bundle.scaler,
            model: bundle.model,
            model_width,
            log_features: false,
        }
    }

    /// Log a summary of every assembled vector.
    pub fn with_feature_logging(mut self, enabled: bool) -> Self {
        self.log_features = enabled;
        self
    }

    pub fn features(&self) -> &[String] {
        &self.features
    }

    pub fn scaler_width(&self) -> usize {
        self.scaler.n_features_in()
    }

    pub fn model_width(&self) -> usize {
        self.model_width
    }

    /// Zero columns appended before scaling. Negative when the scaler is
    /// narrower than the feature list, which every request will reject.
    pub fn padding_gap(&self) -> i64 {
        self.scaler_width() as i64 - self.features.len() as i64
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.features.iter().position(|f| f == name)
    }

    /// Builds the unscaled vector, one slot per entry of the feature list.
    pub fn assemble(&self, record: &BuildingRecord) -> Result<Vec<f64>, PredictionError> {
        let mut v = vec![0.0; self.features.len()];

        let gfa = self
            .position(GFA_LOG_FEATURE)
            .ok_or_else(|| PredictionError::MissingFeature(GFA_LOG_FEATURE.to_string()))?;
        v[gfa] = record.total_floor_area().ln_1p();

        for (name, value) in [
            (BUILDING_AGE, record.building_age()),
            (NUMBER_OF_FLOORS, record.floor_count()),
            (HAS_GAS, record.has_gas()),
        ] {
            if let Some(i) = self.position(name) {
                v[i] = value as f64;
            }
        }

        Ok(v)
    }

    /// Right-pads with zeros up to the scaler width. Never truncates.
    pub fn pad_to_scaler(&self, mut v: Vec<f64>) -> Result<Vec<f64>, PredictionError> {
        let scaler_width = self.scaler_width();
        if v.len() > scaler_width {
            return Err(PredictionError::ScalerTooNarrow {
                scaler_width,
                assembled: v.len(),
            });
        }
        v.resize(scaler_width, 0.0);
        Ok(v)
    }

    /// Scales the padded vector and cuts it down to the model's columns.
    pub fn scale_for_model(&self, padded: &[f64]) -> Result<Vec<f64>, PredictionError> {
        let scaler_width = self.scaler_width();
        if self.model_width > scaler_width {
            return Err(PredictionError::ModelWiderThanScaler {
                model_width: self.model_width,
                scaler_width,
            });
        }

        let mut scaled = self.scaler.transform(padded)?;
        if scaled.len() != scaler_width {
            return Err(PredictionError::ScalerOutput {
                expected: scaler_width,
                got: scaled.len(),
            });
        }
        scaled.truncate(self.model_width);
        Ok(scaled)
    }

    /// Full pipeline; returns kBTU rounded to 2 decimals.
    pub fn predict(&self, record: &BuildingRecord) -> Result<f64, PredictionError> {
        let v = self.assemble(record)?;
        if self.log_features {
            self.log_summary(&v);
        }

        let padded = self.pad_to_scaler(v)?;
        let input = self.scale_for_model(&padded)?;
        let log_pred = self.model.predict(&input)?;

        // x * 100 in round2 can overflow on its own, so check after rounding
        let kbtu = round2(log_pred.exp_m1());
        if !kbtu.is_finite() {
            return Err(PredictionError::NonFinitePrediction(kbtu));
        }
        Ok(kbtu)
    }

    fn log_summary(&self, v: &[f64]) {
        let nz = v.iter().filter(|x| **x != 0.0).count();
        let mean = if v.is_empty() {
            0.0
        } else {
            v.iter().sum::<f64>() / v.len() as f64
        };
        let std = if v.len() < 2 {
            0.0
        } else {
            (v.iter().map(|x| (x - mean) * (x - mean)).sum::<f64>() / v.len() as f64).sqrt()
        };
        let sample: Vec<String> = self
            .features
            .iter()
            .zip(v)
            .filter(|(_, x)| **x != 0.0)
            .take(6)
            .map(|(name, x)| format!("{}={:.3}", name, x))
            .collect();
        tracing::info!(
            "assembled in_dim={} nonzero={} mean={:.3} std={:.3} sample=[{}]",
            v.len(),
            nz,
            mean,
            std,
            sample.join(", ")
        );
    }
}

/// Rounds half away from zero (`0.125` -> `0.13`), unlike Python's
/// half-to-even `round`.
fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}
