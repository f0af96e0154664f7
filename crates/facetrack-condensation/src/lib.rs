//! FaceTrack Condensation - adaptive particle-filter tracking.
//!
//! The tracker runs the condensation loop (sample, predict, weigh, extract)
//! over a static classifier cascade and an adaptive measurement model that
//! re-trains itself from the tracker's own estimates.

pub mod adaptive;
pub mod config;
pub mod measurement;
pub mod resampling;
pub mod sampler;
pub mod state_extractor;
pub mod tracker;
pub mod transition;

pub use adaptive::{
    AdaptiveMeasurementModel, AdaptiveModel, AdaptiveState, PositionDependentConfig,
    PositionDependentMeasurementModel, SelfLearningConfig, SelfLearningMeasurementModel,
};
pub use config::{
    AdaptiveKind, AdaptiveModelConfig, ConfiguredTracker, SamplerConfig, StaticModelConfig,
    TrackerConfig,
};
pub use measurement::{CacheStats, Evaluation, MeasurementModel, WvmSvmModel};
pub use resampling::{LowVarianceSampling, ResamplingAlgorithm};
pub use sampler::{GridSampler, ImageSize, ResamplingSampler, Sampler, SamplingMode};
pub use state_extractor::{
    Aggregation, FilteringStateExtractor, MaxWeightStateExtractor, StateExtractor,
    StateExtractorConfig, StateExtractorKind, WeightedMeanStateExtractor,
};
pub use tracker::{BlendPolicy, PartiallyAdaptiveCondensationTracker, TrackingReport};
pub use transition::{SimpleTransitionModel, TransitionModel};
