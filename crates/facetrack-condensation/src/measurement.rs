//! Static measurement model: a frozen two-stage classifier cascade.

use facetrack_core::{
    FeatureExtractor, GrayImage, PatchKey, ProbabilisticClassifier, Result, Sample,
    SampleContext, TrackError,
};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Assigns weights to samples for the current frame.
pub trait MeasurementModel {
    /// Switch to a new frame. Invalidates all cached evaluations.
    fn update(&mut self, image: Arc<GrayImage>);

    /// Set weight, score and target flag of every sample.
    ///
    /// Samples whose region cannot be extracted get weight zero and stay in
    /// the set.
    fn evaluate(&mut self, ctx: &SampleContext, samples: &mut [Sample]);
}

impl<T: MeasurementModel + ?Sized> MeasurementModel for Box<T> {
    fn update(&mut self, image: Arc<GrayImage>) {
        (**self).update(image)
    }

    fn evaluate(&mut self, ctx: &SampleContext, samples: &mut [Sample]) {
        (**self).evaluate(ctx, samples)
    }
}

/// Result of evaluating one patch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    pub weight: f64,
    pub score: f64,
    pub target: bool,
}

impl Evaluation {
    pub const REJECTED: Self = Self {
        weight: 0.0,
        score: 0.0,
        target: false,
    };

    pub fn apply(self, sample: &mut Sample) {
        sample.weight = self.weight;
        sample.score = self.score;
        sample.target = self.target;
    }
}

/// Hit and miss counts of a per-frame evaluation cache.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: usize,
    pub misses: usize,
}

/// WVM gate followed by an SVM.
///
/// Patches rejected by the WVM never reach the SVM; their weight is the WVM
/// probability scaled by `rejected_svm_probability`. Accepted patches weigh
/// the product of both probabilities. Results are cached per patch for the
/// current frame.
pub struct WvmSvmModel {
    extractor: Box<dyn FeatureExtractor>,
    wvm: Box<dyn ProbabilisticClassifier>,
    svm: Box<dyn ProbabilisticClassifier>,
    rejected_svm_probability: f64,
    cache: HashMap<PatchKey, Evaluation>,
    stats: CacheStats,
}

impl WvmSvmModel {
    pub fn new(
        extractor: Box<dyn FeatureExtractor>,
        wvm: Box<dyn ProbabilisticClassifier>,
        svm: Box<dyn ProbabilisticClassifier>,
        rejected_svm_probability: f64,
    ) -> Result<Self> {
        if !(0.0..=1.0).contains(&rejected_svm_probability) {
            return Err(TrackError::InvalidParameter(format!(
                "rejected SVM probability must lie in [0, 1], got {rejected_svm_probability}"
            )));
        }
        Ok(Self {
            extractor,
            wvm,
            svm,
            rejected_svm_probability,
            cache: HashMap::new(),
            stats: CacheStats::default(),
        })
    }

    /// Cache statistics since the last `update`.
    pub fn cache_stats(&self) -> CacheStats {
        self.stats
    }

    fn classify(&self, features: &[f32]) -> Evaluation {
        let (passed, wvm_probability) = self.wvm.probability(features);
        if !passed {
            return Evaluation {
                weight: wvm_probability * self.rejected_svm_probability,
                score: wvm_probability,
                target: false,
            };
        }
        let (target, svm_probability) = self.svm.probability(features);
        Evaluation {
            weight: wvm_probability * svm_probability,
            score: svm_probability,
            target,
        }
    }
}

impl MeasurementModel for WvmSvmModel {
    fn update(&mut self, image: Arc<GrayImage>) {
        if self.stats.hits + self.stats.misses > 0 {
            debug!(
                hits = self.stats.hits,
                misses = self.stats.misses,
                "static cascade cache"
            );
        }
        self.cache.clear();
        self.stats = CacheStats::default();
        self.extractor.update(image);
    }

    fn evaluate(&mut self, ctx: &SampleContext, samples: &mut [Sample]) {
        for sample in samples.iter_mut() {
            let height = ctx.height_of(sample);
            let Some(patch) = self.extractor.extract(sample.x, sample.y, sample.size, height)
            else {
                Evaluation::REJECTED.apply(sample);
                continue;
            };
            let evaluation = match self.cache.get(&patch.key) {
                Some(&cached) => {
                    self.stats.hits += 1;
                    cached
                }
                None => {
                    self.stats.misses += 1;
                    let evaluation = self.classify(&patch.features);
                    self.cache.insert(patch.key, evaluation);
                    evaluation
                }
            };
            evaluation.apply(sample);
        }
    }
}
