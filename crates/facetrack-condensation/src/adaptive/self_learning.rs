use super::{AdaptiveClassifier, AdaptiveMeasurementModel, AdaptiveState};
use crate::measurement::MeasurementModel;
use facetrack_core::{
    FeatureExtractor, GrayImage, Patch, Rect, Result, Sample, SampleContext, TrackError,
    TrainableProbabilisticClassifier,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Confidence gates of the self-learning model.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelfLearningConfig {
    /// Confidence above which a patch becomes a positive example.
    pub positive_threshold: f64,
    /// Confidence below which a patch becomes a negative example.
    pub negative_threshold: f64,
    /// Upper bound of new examples per class and frame.
    pub examples_per_frame: usize,
}

impl Default for SelfLearningConfig {
    fn default() -> Self {
        Self {
            positive_threshold: 0.85,
            negative_threshold: 0.05,
            examples_per_frame: 10,
        }
    }
}

impl SelfLearningConfig {
    pub fn validate(&self) -> Result<()> {
        let in_unit = |t: f64| (0.0..=1.0).contains(&t);
        if !in_unit(self.positive_threshold)
            || !in_unit(self.negative_threshold)
            || self.negative_threshold > self.positive_threshold
        {
            return Err(TrackError::InvalidParameter(format!(
                "self-learning thresholds must satisfy 0 <= negative <= positive <= 1, got {}/{}",
                self.negative_threshold, self.positive_threshold
            )));
        }
        if self.examples_per_frame == 0 {
            return Err(TrackError::InvalidParameter(
                "self-learning needs at least one example per frame".into(),
            ));
        }
        Ok(())
    }
}

/// Labels patches by confidence and re-trains from them every frame.
///
/// Until the classifier is usable the confidence of a sample is its current
/// weight, which then stems from the static model. Afterwards the adaptive
/// classifier labels its own training data.
pub struct SelfLearningMeasurementModel {
    inner: AdaptiveClassifier,
    config: SelfLearningConfig,
    learning: bool,
}

impl SelfLearningMeasurementModel {
    pub fn new(
        extractor: Box<dyn FeatureExtractor>,
        classifier: Box<dyn TrainableProbabilisticClassifier>,
        config: SelfLearningConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            inner: AdaptiveClassifier::new(extractor, classifier),
            config,
            learning: false,
        })
    }

    pub fn config(&self) -> &SelfLearningConfig {
        &self.config
    }

    /// Most confident positives and negatives among the samples' patches.
    fn harvest(
        &mut self,
        ctx: &SampleContext,
        samples: &[Sample],
        usable: bool,
    ) -> (Vec<Arc<Patch>>, Vec<Arc<Patch>>) {
        let mut seen = HashSet::new();
        let mut positives = Vec::new();
        let mut negatives = Vec::new();
        for sample in samples {
            let Some(patch) = self.inner.patch_of(ctx, sample) else {
                continue;
            };
            if !seen.insert(patch.key) {
                continue;
            }
            let confidence = if usable {
                self.inner.evaluation_of(&patch).score
            } else {
                sample.weight
            };
            if confidence > self.config.positive_threshold {
                positives.push((confidence, patch));
            } else if confidence < self.config.negative_threshold {
                negatives.push((confidence, patch));
            }
        }

        positives.sort_by(|a, b| b.0.total_cmp(&a.0));
        negatives.sort_by(|a, b| a.0.total_cmp(&b.0));
        let take = |ranked: Vec<(f64, Arc<Patch>)>, n: usize| -> Vec<Arc<Patch>> {
            ranked.into_iter().take(n).map(|(_, p)| p).collect()
        };
        (
            take(positives, self.config.examples_per_frame),
            take(negatives, self.config.examples_per_frame),
        )
    }
}

impl MeasurementModel for SelfLearningMeasurementModel {
    fn update(&mut self, image: Arc<GrayImage>) {
        self.inner.update(image);
    }

    fn evaluate(&mut self, ctx: &SampleContext, samples: &mut [Sample]) {
        self.inner.evaluate(ctx, samples);
    }
}

impl AdaptiveMeasurementModel for SelfLearningMeasurementModel {
    fn state(&self) -> AdaptiveState {
        if self.inner.classifier.is_usable() {
            AdaptiveState::Usable
        } else if self.learning {
            AdaptiveState::Learning
        } else {
            AdaptiveState::Uninitialized
        }
    }

    fn adapt(&mut self, ctx: &SampleContext, samples: &[Sample], _target: Option<Rect>) {
        let was_usable = self.inner.classifier.is_usable();
        let (positives, negatives) = self.harvest(ctx, samples, was_usable);
        if positives.is_empty() && negatives.is_empty() {
            return;
        }
        self.learning = true;
        let usable = self.inner.retrain(&positives, &negatives);
        debug!(
            positives = positives.len(),
            negatives = negatives.len(),
            usable,
            "self-learning adaptation"
        );
        if usable && !was_usable {
            info!("self-learning model became usable");
        }
    }

    fn reset(&mut self) {
        self.inner.reset();
        self.learning = false;
    }
}
