//! Measurement models that re-train their classifier from the tracker's own
//! output.
//!
//! Both variants start out unusable, gather examples while the static model
//! drives tracking and become usable once their classifier has been trained.
//! Self-labeled examples can reinforce the classifier's own mistakes; the
//! position-dependent variant reduces this by labeling by location instead of
//! by confidence.

mod position_dependent;
mod self_learning;

pub use position_dependent::{PositionDependentConfig, PositionDependentMeasurementModel};
pub use self_learning::{SelfLearningConfig, SelfLearningMeasurementModel};

use crate::measurement::{Evaluation, MeasurementModel};
use facetrack_core::{
    FeatureExtractor, GrayImage, Patch, PatchKey, Rect, Sample, SampleContext,
    TrainableProbabilisticClassifier,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::Arc;

/// Lifecycle of an adaptive model.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptiveState {
    /// Nothing learned yet.
    #[default]
    Uninitialized,
    /// Examples are being gathered but no classifier is trained.
    Learning,
    /// The classifier may weigh samples.
    Usable,
}

impl fmt::Display for AdaptiveState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Uninitialized => "uninitialized",
            Self::Learning => "learning",
            Self::Usable => "usable",
        })
    }
}

/// A measurement model that learns while tracking.
pub trait AdaptiveMeasurementModel: MeasurementModel {
    fn state(&self) -> AdaptiveState;

    fn is_usable(&self) -> bool {
        self.state() == AdaptiveState::Usable
    }

    /// Learn from the evaluated samples of the current frame and the position
    /// estimated from them, `None` if the target was not found.
    fn adapt(&mut self, ctx: &SampleContext, samples: &[Sample], target: Option<Rect>);

    /// Forget everything learned.
    fn reset(&mut self);
}

/// Feature extraction, per-frame evaluation cache and trainable classifier
/// shared by the adaptive models.
struct AdaptiveClassifier {
    extractor: Box<dyn FeatureExtractor>,
    classifier: Box<dyn TrainableProbabilisticClassifier>,
    cache: HashMap<PatchKey, Evaluation>,
}

impl AdaptiveClassifier {
    fn new(
        extractor: Box<dyn FeatureExtractor>,
        classifier: Box<dyn TrainableProbabilisticClassifier>,
    ) -> Self {
        Self {
            extractor,
            classifier,
            cache: HashMap::new(),
        }
    }

    fn update(&mut self, image: Arc<GrayImage>) {
        self.cache.clear();
        self.extractor.update(image);
    }

    fn patch_of(&mut self, ctx: &SampleContext, sample: &Sample) -> Option<Arc<Patch>> {
        let height = ctx.height_of(sample);
        self.extractor.extract(sample.x, sample.y, sample.size, height)
    }

    /// Patch of the same size as `rect`, centered `(dx, dy)` away from it.
    fn patch_around(&mut self, rect: Rect, dx: f32, dy: f32) -> Option<Arc<Patch>> {
        let center = rect.center();
        self.extractor.extract(
            (center.x + dx).round() as i32,
            (center.y + dy).round() as i32,
            rect.width.round() as i32,
            rect.height.round() as i32,
        )
    }

    fn evaluation_of(&mut self, patch: &Patch) -> Evaluation {
        if let Some(&cached) = self.cache.get(&patch.key) {
            return cached;
        }
        let (target, probability) = self.classifier.probability(&patch.features);
        let evaluation = Evaluation {
            weight: probability,
            score: probability,
            target,
        };
        self.cache.insert(patch.key, evaluation);
        evaluation
    }

    fn evaluate(&mut self, ctx: &SampleContext, samples: &mut [Sample]) {
        for sample in samples.iter_mut() {
            let evaluation = match self.patch_of(ctx, sample) {
                Some(patch) => self.evaluation_of(&patch),
                None => Evaluation::REJECTED,
            };
            evaluation.apply(sample);
        }
    }

    fn retrain(&mut self, positives: &[Arc<Patch>], negatives: &[Arc<Patch>]) -> bool {
        let positives: Vec<_> = positives.iter().map(|p| Arc::clone(&p.features)).collect();
        let negatives: Vec<_> = negatives.iter().map(|p| Arc::clone(&p.features)).collect();
        let usable = self.classifier.retrain(&positives, &negatives);
        // the next evaluation in this frame must see the new model
        self.cache.clear();
        usable
    }

    fn reset(&mut self) {
        self.classifier.reset();
        self.cache.clear();
    }
}

/// Drop patches of regions already seen, keeping the first occurrence.
fn unique(patches: impl IntoIterator<Item = Arc<Patch>>) -> Vec<Arc<Patch>> {
    let mut seen = HashSet::new();
    patches.into_iter().filter(|p| seen.insert(p.key)).collect()
}

/// The adaptive models selectable by configuration.
pub enum AdaptiveModel {
    SelfLearning(SelfLearningMeasurementModel),
    PositionDependent(PositionDependentMeasurementModel),
}

impl MeasurementModel for AdaptiveModel {
    fn update(&mut self, image: Arc<GrayImage>) {
        match self {
            Self::SelfLearning(model) => model.update(image),
            Self::PositionDependent(model) => model.update(image),
        }
    }

    fn evaluate(&mut self, ctx: &SampleContext, samples: &mut [Sample]) {
        match self {
            Self::SelfLearning(model) => model.evaluate(ctx, samples),
            Self::PositionDependent(model) => model.evaluate(ctx, samples),
        }
    }
}

impl AdaptiveMeasurementModel for AdaptiveModel {
    fn state(&self) -> AdaptiveState {
        match self {
            Self::SelfLearning(model) => model.state(),
            Self::PositionDependent(model) => model.state(),
        }
    }

    fn adapt(&mut self, ctx: &SampleContext, samples: &[Sample], target: Option<Rect>) {
        match self {
            Self::SelfLearning(model) => model.adapt(ctx, samples, target),
            Self::PositionDependent(model) => model.adapt(ctx, samples, target),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::SelfLearning(model) => model.reset(),
            Self::PositionDependent(model) => model.reset(),
        }
    }
}

impl From<SelfLearningMeasurementModel> for AdaptiveModel {
    fn from(model: SelfLearningMeasurementModel) -> Self {
        Self::SelfLearning(model)
    }
}

impl From<PositionDependentMeasurementModel> for AdaptiveModel {
    fn from(model: PositionDependentMeasurementModel) -> Self {
        Self::PositionDependent(model)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Test doubles shared by the adaptive model tests.

    use facetrack_core::{FeatureVector, ProbabilisticClassifier, TrainableProbabilisticClassifier};
    use std::cell::RefCell;
    use std::rc::Rc;

    /// What a [`RecordingClassifier`] has been asked to learn.
    #[derive(Debug, Default)]
    pub struct Record {
        pub retrains: usize,
        pub positives: Vec<FeatureVector>,
        pub negatives: Vec<FeatureVector>,
        pub resets: usize,
    }

    /// Mean-intensity classifier that becomes usable after a configurable
    /// number of examples and records everything it is given.
    pub struct RecordingClassifier {
        pub record: Rc<RefCell<Record>>,
        pub required: usize,
    }

    impl RecordingClassifier {
        pub fn new(required: usize) -> (Self, Rc<RefCell<Record>>) {
            let record = Rc::new(RefCell::new(Record::default()));
            (
                Self {
                    record: Rc::clone(&record),
                    required,
                },
                record,
            )
        }
    }

    impl ProbabilisticClassifier for RecordingClassifier {
        fn probability(&self, features: &[f32]) -> (bool, f64) {
            let mean = features.iter().sum::<f32>() as f64 / features.len() as f64;
            (mean > 0.5, mean)
        }
    }

    impl TrainableProbabilisticClassifier for RecordingClassifier {
        fn is_usable(&self) -> bool {
            let record = self.record.borrow();
            record.positives.len().min(record.negatives.len()) >= self.required
        }

        fn retrain(&mut self, positives: &[FeatureVector], negatives: &[FeatureVector]) -> bool {
            {
                let mut record = self.record.borrow_mut();
                record.retrains += 1;
                record.positives.extend_from_slice(positives);
                record.negatives.extend_from_slice(negatives);
            }
            self.is_usable()
        }

        fn reset(&mut self) {
            let mut record = self.record.borrow_mut();
            record.positives.clear();
            record.negatives.clear();
            record.resets += 1;
        }
    }
}
