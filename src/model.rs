//! Stored artifacts: the fitted scaler, the regressor and the feature list.
//!
//! Artifacts are JSON exports of the fitted objects, laid out per model as
//! `<root>/<name>/<tag>/{model,scaler,meta}.json`.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::error::{ArtifactError, ModelError};

pub const DEFAULT_TAG: &str = "latest";

/// A fitted feature transform with a fixed input width.
pub trait Scaler: Send + Sync {
    fn n_features_in(&self) -> usize;

    /// Transforms one row; output has the same width as the input.
    fn transform(&self, row: &[f64]) -> Result<Vec<f64>, ModelError>;
}

/// A trained regressor operating on one row at a time.
pub trait Regressor: Send + Sync {
    fn n_features_in(&self) -> usize;

    fn predict(&self, row: &[f64]) -> Result<f64, ModelError>;
}

fn check_width(expected: usize, row: &[f64]) -> Result<(), ModelError> {
    if row.len() != expected {
        return Err(ModelError::DimensionMismatch {
            expected,
            got: row.len(),
        });
    }
    Ok(())
}

fn all_finite(values: &[f64]) -> bool {
    values.iter().all(|v| v.is_finite())
}

// ---------- Scaler ----------

fn default_true() -> bool {
    true
}

/// z = (x - mean) / scale, per column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f64>,
    scale: Vec<f64>,
    #[serde(default = "default_true")]
    with_mean: bool,
    #[serde(default = "default_true")]
    with_std: bool,
}

impl StandardScaler {
    pub fn new(mean: Vec<f64>, scale: Vec<f64>) -> Result<Self, ArtifactError> {
        let scaler = Self {
            mean,
            scale,
            with_mean: true,
            with_std: true,
        };
        scaler.check()?;
        Ok(scaler)
    }

    fn check(&self) -> Result<(), ArtifactError> {
        if self.mean.is_empty() {
            return Err(ArtifactError::invalid("scaler", "empty mean vector"));
        }
        if self.mean.len() != self.scale.len() {
            return Err(ArtifactError::invalid(
                "scaler",
                format!(
                    "mean has {} entries but scale has {}",
                    self.mean.len(),
                    self.scale.len()
                ),
            ));
        }
        if !all_finite(&self.mean) || !all_finite(&self.scale) {
            return Err(ArtifactError::invalid("scaler", "non-finite parameters"));
        }
        Ok(())
    }
}

impl Scaler for StandardScaler {
    fn n_features_in(&self) -> usize {
        self.mean.len()
    }

    fn transform(&self, row: &[f64]) -> Result<Vec<f64>, ModelError> {
        check_width(self.mean.len(), row)?;

        let out: Vec<f64> = row
            .iter()
            .zip(self.mean.iter().zip(&self.scale))
            .map(|(&x, (&mean, &scale))| {
                let mut v = x;
                if self.with_mean {
                    v -= mean;
                }
                // constant columns are stored with scale 0; leave them unscaled
                if self.with_std && scale != 0.0 {
                    v /= scale;
                }
                v
            })
            .collect();

        if !all_finite(&out) {
            return Err(ModelError::NonFinite("scaler"));
        }
        Ok(out)
    }
}

// ---------- Regressors ----------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Kernel {
    Linear,
    Poly,
    Rbf,
    Sigmoid,
}

fn default_degree() -> i32 {
    3
}

/// Epsilon-SVR decision function: Σ dual_coef_i · K(sv_i, x) + intercept.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SvrModel {
    kernel: Kernel,
    #[serde(default)]
    gamma: f64,
    #[serde(default)]
    coef0: f64,
    #[serde(default = "default_degree")]
    degree: i32,
    support_vectors: Vec<Vec<f64>>,
    dual_coef: Vec<f64>,
    intercept: f64,
}

impl SvrModel {
    pub fn new(
        kernel: Kernel,
        gamma: f64,
        support_vectors: Vec<Vec<f64>>,
        dual_coef: Vec<f64>,
        intercept: f64,
    ) -> Result<Self, ArtifactError> {
        let model = Self {
            kernel,
            gamma,
            coef0: 0.0,
            degree: default_degree(),
            support_vectors,
            dual_coef,
            intercept,
        };
        model.check()?;
        Ok(model)
    }

    pub fn with_coef0(mut self, coef0: f64) -> Self {
        self.coef0 = coef0;
        self
    }

    pub fn with_degree(mut self, degree: i32) -> Self {
        self.degree = degree;
        self
    }

    fn check(&self) -> Result<(), ArtifactError> {
        let Some(first) = self.support_vectors.first() else {
            return Err(ArtifactError::invalid("model", "SVR has no support vectors"));
        };
        let width = first.len();
        if width == 0 {
            return Err(ArtifactError::invalid("model", "support vectors are empty"));
        }
        if self.support_vectors.iter().any(|sv| sv.len() != width) {
            return Err(ArtifactError::invalid(
                "model",
                "support vectors have inconsistent widths",
            ));
        }
        if self.dual_coef.len() != self.support_vectors.len() {
            return Err(ArtifactError::invalid(
                "model",
                format!(
                    "{} dual coefficients for {} support vectors",
                    self.dual_coef.len(),
                    self.support_vectors.len()
                ),
            ));
        }
        let params_finite = self.support_vectors.iter().all(|sv| all_finite(sv))
            && all_finite(&self.dual_coef)
            && all_finite(&[self.gamma, self.coef0, self.intercept]);
        if !params_finite {
            return Err(ArtifactError::invalid("model", "non-finite parameters"));
        }
        Ok(())
    }

    fn kernel_value(&self, sv: &[f64], x: &[f64]) -> f64 {
        match self.kernel {
            Kernel::Linear => dot(sv, x),
            Kernel::Poly => (self.gamma * dot(sv, x) + self.coef0).powi(self.degree),
            Kernel::Rbf => {
                let dist: f64 = sv.iter().zip(x).map(|(a, b)| (a - b) * (a - b)).sum();
                (-self.gamma * dist).exp()
            }
            Kernel::Sigmoid => (self.gamma * dot(sv, x) + self.coef0).tanh(),
        }
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}

impl Regressor for SvrModel {
    fn n_features_in(&self) -> usize {
        self.support_vectors.first().map_or(0, Vec::len)
    }

    fn predict(&self, row: &[f64]) -> Result<f64, ModelError> {
        check_width(self.n_features_in(), row)?;
        let y = self
            .support_vectors
            .iter()
            .zip(&self.dual_coef)
            .map(|(sv, alpha)| alpha * self.kernel_value(sv, row))
            .sum::<f64>()
            + self.intercept;
        if !y.is_finite() {
            return Err(ModelError::NonFinite("model"));
        }
        Ok(y)
    }
}

/// y = coef · x + intercept
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    coef: Vec<f64>,
    intercept: f64,
}

impl LinearModel {
    pub fn new(coef: Vec<f64>, intercept: f64) -> Result<Self, ArtifactError> {
        let model = Self { coef, intercept };
        model.check()?;
        Ok(model)
    }

    fn check(&self) -> Result<(), ArtifactError> {
        if self.coef.is_empty() {
            return Err(ArtifactError::invalid("model", "empty coefficient vector"));
        }
        if !all_finite(&self.coef) || !self.intercept.is_finite() {
            return Err(ArtifactError::invalid("model", "non-finite parameters"));
        }
        Ok(())
    }
}

impl Regressor for LinearModel {
    fn n_features_in(&self) -> usize {
        self.coef.len()
    }

    fn predict(&self, row: &[f64]) -> Result<f64, ModelError> {
        check_width(self.coef.len(), row)?;
        let y = dot(&self.coef, row) + self.intercept;
        if !y.is_finite() {
            return Err(ModelError::NonFinite("model"));
        }
        Ok(y)
    }
}

/// On-disk form of `model.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ModelArtifact {
    Svr(SvrModel),
    Linear(LinearModel),
}

impl ModelArtifact {
    fn check(&self) -> Result<(), ArtifactError> {
        match self {
            ModelArtifact::Svr(m) => m.check(),
            ModelArtifact::Linear(m) => m.check(),
        }
    }

    pub fn into_regressor(self) -> Arc<dyn Regressor> {
        match self {
            ModelArtifact::Svr(m) => Arc::new(m),
            ModelArtifact::Linear(m) => Arc::new(m),
        }
    }
}

/// On-disk form of `meta.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactMeta {
    pub features: Vec<String>,
}

impl ArtifactMeta {
    fn check(&self) -> Result<(), ArtifactError> {
        if self.features.is_empty() {
            return Err(ArtifactError::invalid("meta", "empty feature list"));
        }
        for (i, name) in self.features.iter().enumerate() {
            if self.features[..i].contains(name) {
                return Err(ArtifactError::invalid(
                    "meta",
                    format!("duplicate feature `{}`", name),
                ));
            }
        }
        Ok(())
    }
}

/// Everything the predictor needs, loaded once and shared read-only.
#[derive(Clone)]
pub struct ArtifactBundle {
    pub model: Arc<dyn Regressor>,
    pub scaler: Arc<dyn Scaler>,
    pub features: Arc<[String]>,
}

impl ArtifactBundle {
    pub fn new(
        model: Arc<dyn Regressor>,
        scaler: Arc<dyn Scaler>,
        features: Vec<String>,
    ) -> Self {
        Self {
            model,
            scaler,
            features: features.into(),
        }
    }
}

/// Splits `name[:tag]`.
pub fn parse_model_id(id: &str) -> Result<(&str, &str), ArtifactError> {
    let (name, tag) = match id.split_once(':') {
        Some((name, tag)) => (name, tag),
        None => (id, DEFAULT_TAG),
    };
    let valid = |s: &str| {
        !s.is_empty()
            && s != "."
            && s != ".."
            && s
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.'))
    };
    if !valid(name) || !valid(tag) {
        return Err(ArtifactError::InvalidName(id.to_string()));
    }
    Ok((name, tag))
}

/// Name-addressed artifact loader rooted at a directory.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn model_dir(&self, id: &str) -> Result<PathBuf, ArtifactError> {
        let (name, tag) = parse_model_id(id)?;
        Ok(self.root.join(name).join(tag))
    }

    pub fn load(&self, id: &str) -> Result<ArtifactBundle, ArtifactError> {
        let dir = self.model_dir(id)?;

        let model: ModelArtifact = read_json(&dir.join("model.json"))?;
        model.check()?;
        let scaler: StandardScaler = read_json(&dir.join("scaler.json"))?;
        scaler.check()?;
        let meta: ArtifactMeta = read_json(&dir.join("meta.json"))?;
        meta.check()?;

        tracing::debug!("loaded artifacts for {} from {}", id, dir.display());
        Ok(ArtifactBundle::new(
            model.into_regressor(),
            Arc::new(scaler),
            meta.features,
        ))
    }

    /// Writes a bundle in the layout [`ArtifactStore::load`] reads.
    pub fn save(
        &self,
        id: &str,
        model: &ModelArtifact,
        scaler: &StandardScaler,
        meta: &ArtifactMeta,
    ) -> Result<PathBuf, ArtifactError> {
        let dir = self.model_dir(id)?;
        fs::create_dir_all(&dir).map_err(|source| ArtifactError::Io {
            path: dir.clone(),
            source,
        })?;
        write_json(&dir.join("model.json"), model)?;
        write_json(&dir.join("scaler.json"), scaler)?;
        write_json(&dir.join("meta.json"), meta)?;
        Ok(dir)
    }
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let text = fs::read_to_string(path).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| ArtifactError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    let text = serde_json::to_string_pretty(value).map_err(|source| ArtifactError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, text).map_err(|source| ArtifactError::Io {
        path: path.to_path_buf(),
        source,
    })
}
