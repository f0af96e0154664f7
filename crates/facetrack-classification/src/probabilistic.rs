//! Frozen, pretrained classifiers for the static measurement cascade.
//!
//! Both stages are loaded from JSON model descriptions. A malformed
//! description is a fatal configuration error since no tracking is possible
//! without the base classifiers.

use crate::kernel::Kernel;
use crate::svm::{Sigmoid, SvmModel};
use facetrack_core::{FeatureVector, ProbabilisticClassifier, Result, TrackError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// SVM whose decision value is mapped to a probability by a fixed sigmoid.
#[derive(Debug, Clone)]
pub struct ProbabilisticSvmClassifier {
    model: SvmModel,
    threshold: f64,
    sigmoid: Sigmoid,
}

impl ProbabilisticSvmClassifier {
    pub fn new(model: SvmModel, threshold: f64, sigmoid: Sigmoid) -> Self {
        Self {
            model,
            threshold,
            sigmoid,
        }
    }

    pub fn model(&self) -> &SvmModel {
        &self.model
    }

    pub fn sigmoid(&self) -> Sigmoid {
        self.sigmoid
    }

    pub fn decision_value(&self, features: &[f32]) -> f64 {
        self.model.decision_value(features)
    }

    /// Length of the feature vectors the model expects.
    pub fn dimensions(&self) -> usize {
        self.model.support_vectors.first().map_or(0, |sv| sv.len())
    }

    pub fn from_description(desc: SvmModelDescription) -> Result<Self> {
        desc.kernel.validate()?;
        if desc.support_vectors.is_empty() {
            return Err(TrackError::ModelFormat("SVM has no support vectors".into()));
        }
        if desc.support_vectors.len() != desc.coefficients.len() {
            return Err(TrackError::ModelFormat(format!(
                "{} support vectors but {} coefficients",
                desc.support_vectors.len(),
                desc.coefficients.len()
            )));
        }
        let dims = desc.support_vectors[0].len();
        if desc.support_vectors.iter().any(|sv| sv.len() != dims) {
            return Err(TrackError::ModelFormat(
                "support vectors differ in dimension".into(),
            ));
        }
        let model = SvmModel {
            kernel: desc.kernel,
            support_vectors: desc
                .support_vectors
                .into_iter()
                .map(FeatureVector::from)
                .collect(),
            coefficients: desc.coefficients,
            bias: desc.bias,
        };
        Ok(Self::new(model, desc.threshold, desc.sigmoid))
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let desc: SvmModelDescription =
            serde_json::from_str(json).map_err(|e| TrackError::ModelFormat(e.to_string()))?;
        Self::from_description(desc)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }
}

impl ProbabilisticClassifier for ProbabilisticSvmClassifier {
    fn probability(&self, features: &[f32]) -> (bool, f64) {
        let value = self.model.decision_value(features);
        (value >= self.threshold, self.sigmoid.probability(value))
    }
}

/// On-disk form of a [`ProbabilisticSvmClassifier`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SvmModelDescription {
    pub kernel: Kernel,
    pub support_vectors: Vec<Vec<f32>>,
    pub coefficients: Vec<f64>,
    pub bias: f64,
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub sigmoid: Sigmoid,
}

/// Coarse first cascade stage: a reduced-set kernel expansion evaluated one
/// vector at a time, rejecting as soon as the partial sum drops below the
/// threshold of the current level.
#[derive(Debug, Clone)]
pub struct ProbabilisticWvmClassifier {
    kernel: Kernel,
    vectors: Vec<FeatureVector>,
    coefficients: Vec<f64>,
    level_thresholds: Vec<f64>,
    bias: f64,
    sigmoid: Sigmoid,
}

impl ProbabilisticWvmClassifier {
    pub fn from_description(desc: WvmModelDescription) -> Result<Self> {
        desc.kernel.validate()?;
        let levels = desc.vectors.len();
        if levels == 0 {
            return Err(TrackError::ModelFormat("WVM has no filter vectors".into()));
        }
        if desc.coefficients.len() != levels || desc.level_thresholds.len() != levels {
            return Err(TrackError::ModelFormat(format!(
                "WVM with {levels} vectors needs as many coefficients and level thresholds"
            )));
        }
        let dims = desc.vectors[0].len();
        if desc.vectors.iter().any(|v| v.len() != dims) {
            return Err(TrackError::ModelFormat(
                "WVM filter vectors differ in dimension".into(),
            ));
        }
        Ok(Self {
            kernel: desc.kernel,
            vectors: desc.vectors.into_iter().map(FeatureVector::from).collect(),
            coefficients: desc.coefficients,
            level_thresholds: desc.level_thresholds,
            bias: desc.bias,
            sigmoid: desc.sigmoid,
        })
    }

    pub fn from_json(json: &str) -> Result<Self> {
        let desc: WvmModelDescription =
            serde_json::from_str(json).map_err(|e| TrackError::ModelFormat(e.to_string()))?;
        Self::from_description(desc)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    pub fn levels(&self) -> usize {
        self.vectors.len()
    }

    /// Length of the feature vectors the model expects.
    pub fn dimensions(&self) -> usize {
        self.vectors.first().map_or(0, |v| v.len())
    }
}

impl ProbabilisticClassifier for ProbabilisticWvmClassifier {
    fn probability(&self, features: &[f32]) -> (bool, f64) {
        let mut sum = self.bias;
        for ((vector, &coefficient), &threshold) in self
            .vectors
            .iter()
            .zip(&self.coefficients)
            .zip(&self.level_thresholds)
        {
            sum += coefficient * self.kernel.compute(vector, features);
            if sum < threshold {
                return (false, self.sigmoid.probability(sum));
            }
        }
        (true, self.sigmoid.probability(sum))
    }
}

/// On-disk form of a [`ProbabilisticWvmClassifier`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WvmModelDescription {
    pub kernel: Kernel,
    pub vectors: Vec<Vec<f32>>,
    pub coefficients: Vec<f64>,
    pub level_thresholds: Vec<f64>,
    #[serde(default)]
    pub bias: f64,
    #[serde(default)]
    pub sigmoid: Sigmoid,
}
