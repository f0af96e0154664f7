use super::{unique, AdaptiveClassifier, AdaptiveMeasurementModel, AdaptiveState};
use crate::measurement::MeasurementModel;
use facetrack_core::{
    FeatureExtractor, GrayImage, Patch, Rect, Result, Sample, SampleContext, TrackError,
    TrainableProbabilisticClassifier,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Where and when the position-dependent model takes its examples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PositionDependentConfig {
    /// Frames with a found target before the first training.
    pub start_frame_count: u32,
    /// Frames with a found target after which adaptation stops, 0 for never.
    pub stop_frame_count: u32,
    /// Offset of the positive patches relative to the target size.
    pub positive_offset_factor: f64,
    /// Offset of the negative ring relative to the target size.
    pub negative_offset_factor: f64,
    /// Whether to take the ring of eight negatives around the target.
    pub sample_negatives_around_target: bool,
    /// Heaviest samples not overlapping the target to add as negatives.
    pub additional_negatives: usize,
    /// Overlap with the target below which a sample may serve as a negative.
    pub negative_overlap: f64,
}

impl Default for PositionDependentConfig {
    fn default() -> Self {
        Self {
            start_frame_count: 3,
            stop_frame_count: 0,
            positive_offset_factor: 0.05,
            negative_offset_factor: 0.5,
            sample_negatives_around_target: true,
            additional_negatives: 10,
            negative_overlap: 0.3,
        }
    }
}

impl PositionDependentConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.positive_offset_factor >= 0.0) || !(self.negative_offset_factor > 0.0) {
            return Err(TrackError::InvalidParameter(format!(
                "offset factors must be non-negative and positive, got {}/{}",
                self.positive_offset_factor, self.negative_offset_factor
            )));
        }
        if !(0.0..=1.0).contains(&self.negative_overlap) {
            return Err(TrackError::InvalidParameter(format!(
                "negative overlap must lie in [0, 1], got {}",
                self.negative_overlap
            )));
        }
        if self.stop_frame_count != 0 && self.stop_frame_count < self.start_frame_count {
            return Err(TrackError::InvalidParameter(format!(
                "stop frame count {} precedes start frame count {}",
                self.stop_frame_count, self.start_frame_count
            )));
        }
        Ok(())
    }
}

/// Labels patches by their position relative to the estimated target.
///
/// Patches at and right next to the target are positives. Negatives are a
/// ring around the target plus the heaviest samples elsewhere, so they vary
/// in position instead of only in confidence. Adaptation is restricted to a
/// window of frames in which the target was found; losing the target before
/// the classifier becomes usable restarts the count.
pub struct PositionDependentMeasurementModel {
    inner: AdaptiveClassifier,
    config: PositionDependentConfig,
    frame_count: u32,
    pending_positives: Vec<Arc<Patch>>,
    pending_negatives: Vec<Arc<Patch>>,
}

impl PositionDependentMeasurementModel {
    pub fn new(
        extractor: Box<dyn FeatureExtractor>,
        classifier: Box<dyn TrainableProbabilisticClassifier>,
        config: PositionDependentConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: AdaptiveClassifier::new(extractor, classifier),
            config,
            frame_count: 0,
            pending_positives: Vec::new(),
            pending_negatives: Vec::new(),
        })
    }

    pub fn config(&self) -> &PositionDependentConfig {
        &self.config
    }

    /// Frames with a found target since the last restart.
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    fn is_frozen(&self) -> bool {
        self.config.stop_frame_count > 0 && self.frame_count > self.config.stop_frame_count
    }

    fn positives(&mut self, target: Rect) -> Vec<Arc<Patch>> {
        let dx = (self.config.positive_offset_factor * target.width as f64) as f32;
        let dy = (self.config.positive_offset_factor * target.height as f64) as f32;
        let mut patches = Vec::with_capacity(9);
        for oy in [0.0, -dy, dy] {
            for ox in [0.0, -dx, dx] {
                patches.extend(self.inner.patch_around(target, ox, oy));
            }
        }
        unique(patches)
    }

    fn negatives(
        &mut self,
        ctx: &SampleContext,
        samples: &[Sample],
        target: Rect,
    ) -> Vec<Arc<Patch>> {
        let mut patches = Vec::new();
        if self.config.sample_negatives_around_target {
            let dx = (self.config.negative_offset_factor * target.width as f64) as f32;
            let dy = (self.config.negative_offset_factor * target.height as f64) as f32;
            for oy in [-dy, 0.0, dy] {
                for ox in [-dx, 0.0, dx] {
                    if ox != 0.0 || oy != 0.0 {
                        patches.extend(self.inner.patch_around(target, ox, oy));
                    }
                }
            }
        }

        if self.config.additional_negatives > 0 {
            let mut distant: Vec<&Sample> = samples
                .iter()
                .filter(|s| {
                    ctx.bounds_of(s).overlap(target) < self.config.negative_overlap as f32
                })
                .collect();
            distant.sort_by(|a, b| b.weight.total_cmp(&a.weight));
            let mut added = 0;
            for sample in distant {
                if added == self.config.additional_negatives {
                    break;
                }
                if let Some(patch) = self.inner.patch_of(ctx, sample) {
                    if patches.iter().all(|p| p.key != patch.key) {
                        patches.push(patch);
                        added += 1;
                    }
                }
            }
        }
        unique(patches)
    }
}

impl MeasurementModel for PositionDependentMeasurementModel {
    fn update(&mut self, image: Arc<GrayImage>) {
        self.inner.update(image);
    }

    fn evaluate(&mut self, ctx: &SampleContext, samples: &mut [Sample]) {
        self.inner.evaluate(ctx, samples);
    }
}

impl AdaptiveMeasurementModel for PositionDependentMeasurementModel {
    fn state(&self) -> AdaptiveState {
        if self.inner.classifier.is_usable() {
            AdaptiveState::Usable
        } else if self.frame_count > 0 {
            AdaptiveState::Learning
        } else {
            AdaptiveState::Uninitialized
        }
    }

    fn adapt(&mut self, ctx: &SampleContext, samples: &[Sample], target: Option<Rect>) {
        let Some(target) = target else {
            if !self.inner.classifier.is_usable() && self.frame_count > 0 {
                debug!(
                    frames = self.frame_count,
                    "target lost before learning finished, restarting"
                );
                self.frame_count = 0;
                self.pending_positives.clear();
                self.pending_negatives.clear();
            }
            return;
        };
        if self.is_frozen() {
            return;
        }
        self.frame_count += 1;
        if self.is_frozen() {
            info!(frames = self.config.stop_frame_count, "adaptation stopped");
            return;
        }

        let positives = self.positives(target);
        let negatives = self.negatives(ctx, samples, target);
        self.pending_positives.extend(positives);
        self.pending_negatives.extend(negatives);
        if self.frame_count < self.config.start_frame_count {
            return;
        }

        let was_usable = self.inner.classifier.is_usable();
        let positives = std::mem::take(&mut self.pending_positives);
        let negatives = std::mem::take(&mut self.pending_negatives);
        let usable = self.inner.retrain(&positives, &negatives);
        debug!(
            positives = positives.len(),
            negatives = negatives.len(),
            usable,
            "position-dependent adaptation"
        );
        if usable && !was_usable {
            info!(
                frames = self.frame_count,
                "position-dependent model became usable"
            );
        }
    }

    fn reset(&mut self) {
        self.inner.reset();
        self.frame_count = 0;
        self.pending_positives.clear();
        self.pending_negatives.clear();
    }
}
