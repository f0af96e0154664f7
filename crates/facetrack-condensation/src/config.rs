//! Serialized tracker configuration.
//!
//! All strategy choices are closed enums resolved once when the tracker is
//! built. Model paths are resolved relative to the directory of the
//! configuration file.

use crate::adaptive::{
    AdaptiveModel, PositionDependentConfig, PositionDependentMeasurementModel,
    SelfLearningConfig, SelfLearningMeasurementModel,
};
use crate::measurement::WvmSvmModel;
use crate::sampler::{GridSampler, ResamplingSampler, SamplingMode};
use crate::state_extractor::{Aggregation, StateExtractorConfig};
use crate::tracker::{BlendPolicy, PartiallyAdaptiveCondensationTracker};
use crate::transition::SimpleTransitionModel;
use facetrack_classification::{
    ExampleManagementConfig, Kernel, ProbabilisticSvmClassifier, ProbabilisticWvmClassifier,
    TrainableSvmClassifier, TrainableSvmConfig,
};
use facetrack_core::{DirectPatchExtractor, Result, SampleContext, TrackError};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::info;

/// Tracker built entirely from configuration.
pub type ConfiguredTracker = PartiallyAdaptiveCondensationTracker<WvmSvmModel, AdaptiveModel>;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SamplerConfig {
    pub mode: SamplingMode,
    pub count: usize,
    /// Share of each generation placed at random instead of resampled.
    pub random_rate: f64,
    pub min_size: i32,
    pub max_size: i32,
    pub transition: SimpleTransitionModel,
    pub grid: GridSampler,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            mode: SamplingMode::Resampling,
            count: 800,
            random_rate: 0.35,
            min_size: 20,
            max_size: 200,
            transition: SimpleTransitionModel::default(),
            grid: GridSampler::default(),
        }
    }
}

/// Pretrained cascade of the static measurement model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticModelConfig {
    pub patch_width: u32,
    pub patch_height: u32,
    pub wvm: PathBuf,
    pub svm: PathBuf,
    /// Stands in for the SVM probability of patches the WVM rejects.
    pub rejected_svm_probability: f64,
}

impl Default for StaticModelConfig {
    fn default() -> Self {
        Self {
            patch_width: 20,
            patch_height: 20,
            wvm: PathBuf::from("models/wvm.json"),
            svm: PathBuf::from("models/svm.json"),
            rejected_svm_probability: 0.01,
        }
    }
}

impl StaticModelConfig {
    /// Load both stages, resolving relative paths against `base_dir`.
    pub fn build(&self, base_dir: &Path) -> Result<WvmSvmModel> {
        let extractor = DirectPatchExtractor::new(self.patch_width, self.patch_height)?;
        let wvm = ProbabilisticWvmClassifier::load(base_dir.join(&self.wvm))?;
        let svm = ProbabilisticSvmClassifier::load(base_dir.join(&self.svm))?;
        let dims = extractor.dimensions();
        for (stage, expected) in [("WVM", wvm.dimensions()), ("SVM", svm.dimensions())] {
            if expected != dims {
                return Err(TrackError::ModelFormat(format!(
                    "{stage} expects {expected} features but {}x{} patches have {dims}",
                    self.patch_width, self.patch_height
                )));
            }
        }
        info!(
            wvm = %self.wvm.display(),
            svm = %self.svm.display(),
            levels = wvm.levels(),
            "static cascade loaded"
        );
        WvmSvmModel::new(
            Box::new(extractor),
            Box::new(wvm),
            Box::new(svm),
            self.rejected_svm_probability,
        )
    }
}

/// Adaptive model variant and its parameters.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AdaptiveKind {
    SelfLearning(SelfLearningConfig),
    PositionDependent(PositionDependentConfig),
}

impl AdaptiveKind {
    pub const KINDS: &'static [&'static str] = &["self_learning", "position_dependent"];
}

impl Default for AdaptiveKind {
    fn default() -> Self {
        Self::PositionDependent(PositionDependentConfig::default())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdaptiveModelConfig {
    pub patch_width: u32,
    pub patch_height: u32,
    pub model: AdaptiveKind,
    pub classifier: TrainableSvmConfig,
}

impl Default for AdaptiveModelConfig {
    fn default() -> Self {
        Self {
            patch_width: 20,
            patch_height: 20,
            model: AdaptiveKind::default(),
            classifier: TrainableSvmConfig::default(),
        }
    }
}

impl AdaptiveModelConfig {
    pub fn validate(&self) -> Result<()> {
        self.classifier.validate()?;
        match &self.model {
            AdaptiveKind::SelfLearning(config) => config.validate(),
            AdaptiveKind::PositionDependent(config) => config.validate(),
        }
    }

    pub fn build(&self) -> Result<AdaptiveModel> {
        let extractor = Box::new(DirectPatchExtractor::new(
            self.patch_width,
            self.patch_height,
        )?);
        let classifier = Box::new(TrainableSvmClassifier::new(&self.classifier)?);
        Ok(match self.model {
            AdaptiveKind::SelfLearning(config) => {
                SelfLearningMeasurementModel::new(extractor, classifier, config)?.into()
            }
            AdaptiveKind::PositionDependent(config) => {
                PositionDependentMeasurementModel::new(extractor, classifier, config)?.into()
            }
        })
    }
}

/// Root of the configuration tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackerConfig {
    /// Height over width of all samples.
    pub aspect_ratio: f64,
    /// Seed of the sampling RNG; drawn from the OS when absent.
    pub seed: Option<u64>,
    pub sampler: SamplerConfig,
    pub static_model: StaticModelConfig,
    pub adaptive_model: AdaptiveModelConfig,
    pub state_extractor: StateExtractorConfig,
    pub blend_policy: BlendPolicy,
    /// Let a usable adaptive model weigh samples.
    pub adaptive_evaluation: bool,
    /// Let the adaptive model learn.
    pub adaptation: bool,
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            aspect_ratio: 1.0,
            seed: None,
            sampler: SamplerConfig::default(),
            static_model: StaticModelConfig::default(),
            adaptive_model: AdaptiveModelConfig::default(),
            state_extractor: StateExtractorConfig::default(),
            blend_policy: BlendPolicy::default(),
            adaptive_evaluation: true,
            adaptation: true,
        }
    }
}

impl TrackerConfig {
    /// Parse and validate. Unknown kind names fail with
    /// [`TrackError::UnknownKind`], other malformed input with
    /// [`TrackError::InvalidConfig`].
    pub fn from_json(json: &str) -> Result<Self> {
        let value: Value =
            serde_json::from_str(json).map_err(|e| TrackError::InvalidConfig(e.to_string()))?;
        check_kinds(&value)?;
        let config: Self =
            serde_json::from_value(value).map_err(|e| TrackError::InvalidConfig(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| TrackError::Serialization(e.to_string()))
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_json(&std::fs::read_to_string(path)?)
    }

    /// Check every range constraint without loading any model.
    pub fn validate(&self) -> Result<()> {
        SampleContext::new(self.aspect_ratio)?;
        if self.sampler.count == 0 {
            return Err(TrackError::InvalidConfig(
                "sampler needs at least one sample".into(),
            ));
        }
        ResamplingSampler::new(
            self.sampler.count,
            self.sampler.random_rate,
            self.sampler.min_size,
            self.sampler.max_size,
            self.sampler.transition,
        )?;
        self.sampler.grid.validate()?;
        if !(0.0..=1.0).contains(&self.static_model.rejected_svm_probability) {
            return Err(TrackError::InvalidConfig(format!(
                "rejected SVM probability must lie in [0, 1], got {}",
                self.static_model.rejected_svm_probability
            )));
        }
        self.adaptive_model.validate()?;
        self.state_extractor.build()?;
        Ok(())
    }

    /// Load the models and build the tracker. Relative model paths are
    /// resolved against `base_dir`.
    pub fn build(&self, base_dir: &Path) -> Result<ConfiguredTracker> {
        self.validate()?;
        let static_model = self.static_model.build(base_dir)?;
        let adaptive_model = self.adaptive_model.build()?;
        PartiallyAdaptiveCondensationTracker::new(self, static_model, adaptive_model)
    }

    /// Load a configuration file and build the tracker it describes.
    pub fn load_tracker(path: impl AsRef<Path>) -> Result<ConfiguredTracker> {
        let path = path.as_ref();
        let config = Self::load(path)?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        config.build(base_dir)
    }
}

/// Resolve every kind name in the raw tree before deserializing it, so a
/// misspelled strategy is reported by name.
fn check_kinds(value: &Value) -> Result<()> {
    let name = |pointer: &str| value.pointer(pointer).and_then(Value::as_str);
    if let Some(mode) = name("/sampler/mode") {
        mode.parse::<SamplingMode>()?;
    }
    if let Some(policy) = name("/blend_policy") {
        policy.parse::<BlendPolicy>()?;
    }
    if let Some(aggregation) = name("/state_extractor/aggregation") {
        aggregation.parse::<Aggregation>()?;
    }
    if let Some(kind) = name("/adaptive_model/model/type") {
        known("adaptive model", kind, AdaptiveKind::KINDS)?;
    }
    if let Some(kernel) = name("/adaptive_model/classifier/kernel/type") {
        known("kernel", kernel, Kernel::KINDS)?;
    }
    for pool in ["positive_examples", "negative_examples"] {
        if let Some(kind) = name(&format!("/adaptive_model/classifier/{pool}/type")) {
            known("example management", kind, ExampleManagementConfig::KINDS)?;
        }
    }
    Ok(())
}

fn known(kind: &'static str, name: &str, kinds: &[&str]) -> Result<()> {
    if kinds.contains(&name) {
        Ok(())
    } else {
        Err(TrackError::unknown(kind, name))
    }
}
