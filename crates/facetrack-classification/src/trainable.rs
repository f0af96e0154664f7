//! Online re-trainable SVM backing the adaptive measurement models.

use crate::example_management::{
    ConfidenceScorer, ExampleManagement, ExampleManagementConfig, ExampleStore,
};
use crate::kernel::Kernel;
use crate::probabilistic::ProbabilisticSvmClassifier;
use crate::svm::{fit_sigmoid, SmoTrainer};
use facetrack_core::{
    FeatureVector, ProbabilisticClassifier, Result, TrackError, TrainableProbabilisticClassifier,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// Configuration of a [`TrainableSvmClassifier`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainableSvmConfig {
    pub kernel: Kernel,
    pub trainer: SmoTrainer,
    /// Decision value above which a feature vector is classified positive.
    pub threshold: f64,
    pub positive_examples: ExampleManagementConfig,
    pub negative_examples: ExampleManagementConfig,
}

impl Default for TrainableSvmConfig {
    fn default() -> Self {
        Self {
            kernel: Kernel::default(),
            trainer: SmoTrainer::default(),
            threshold: 0.0,
            positive_examples: ExampleManagementConfig::ConfidenceBased {
                capacity: 10,
                required_size: 3,
                keep: 0,
            },
            negative_examples: ExampleManagementConfig::ConfidenceBased {
                capacity: 50,
                required_size: 10,
                keep: 0,
            },
        }
    }
}

impl TrainableSvmConfig {
    pub fn validate(&self) -> Result<()> {
        self.kernel.validate()?;
        if !(self.trainer.constraint > 0.0) {
            return Err(TrackError::InvalidParameter(format!(
                "SVM constraint must be positive, got {}",
                self.trainer.constraint
            )));
        }
        Ok(())
    }
}

/// Scores examples with whichever model is currently trained.
struct ModelScorer<'a>(Option<&'a ProbabilisticSvmClassifier>);

impl ConfidenceScorer for ModelScorer<'_> {
    fn confidence(&self, features: &[f32]) -> Option<f64> {
        self.0.map(|model| model.decision_value(features))
    }
}

/// Kernel SVM re-trained from bounded positive and negative example pools.
///
/// Probabilities come from a Platt sigmoid fitted to the training set at every
/// successful retrain. A new model replaces the previous one only once it has
/// been fully trained.
#[derive(Debug, Clone)]
pub struct TrainableSvmClassifier {
    kernel: Kernel,
    trainer: SmoTrainer,
    threshold: f64,
    positives: ExampleStore,
    negatives: ExampleStore,
    static_negatives: Vec<FeatureVector>,
    model: Option<ProbabilisticSvmClassifier>,
}

impl TrainableSvmClassifier {
    pub fn new(config: &TrainableSvmConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            kernel: config.kernel,
            trainer: config.trainer,
            threshold: config.threshold,
            positives: config.positive_examples.build(true)?,
            negatives: config.negative_examples.build(false)?,
            static_negatives: Vec::new(),
            model: None,
        })
    }

    /// Negative examples that take part in every training run and survive `reset`.
    pub fn set_static_negatives(&mut self, negatives: Vec<FeatureVector>) {
        self.static_negatives = negatives;
    }

    pub fn positive_count(&self) -> usize {
        self.positives.size()
    }

    pub fn negative_count(&self) -> usize {
        self.negatives.size()
    }

    pub fn model(&self) -> Option<&ProbabilisticSvmClassifier> {
        self.model.as_ref()
    }

    fn train(&self) -> Option<ProbabilisticSvmClassifier> {
        let mut examples: Vec<(FeatureVector, bool)> = Vec::new();
        examples.extend(self.positives.examples().into_iter().map(|e| (e, true)));
        examples.extend(self.negatives.examples().into_iter().map(|e| (e, false)));
        examples.extend(self.static_negatives.iter().cloned().map(|e| (e, false)));

        let model = self.trainer.train(self.kernel, &examples)?;
        let decisions: Vec<f64> = examples
            .iter()
            .map(|(e, _)| model.decision_value(e))
            .collect();
        let labels: Vec<bool> = examples.iter().map(|(_, label)| *label).collect();
        let sigmoid = fit_sigmoid(&decisions, &labels);
        Some(ProbabilisticSvmClassifier::new(
            model,
            self.threshold,
            sigmoid,
        ))
    }
}

impl ProbabilisticClassifier for TrainableSvmClassifier {
    fn probability(&self, features: &[f32]) -> (bool, f64) {
        match &self.model {
            Some(model) => model.probability(features),
            None => (false, 0.0),
        }
    }
}

impl TrainableProbabilisticClassifier for TrainableSvmClassifier {
    fn is_usable(&self) -> bool {
        self.model.is_some()
    }

    fn retrain(&mut self, positives: &[FeatureVector], negatives: &[FeatureVector]) -> bool {
        if positives.is_empty() && negatives.is_empty() {
            return self.is_usable();
        }
        let scorer = ModelScorer(self.model.as_ref());
        self.positives.add(positives, &scorer);
        self.negatives.add(negatives, &scorer);

        if !self.positives.has_required_size() || !self.negatives.has_required_size() {
            debug!(
                positives = self.positives.size(),
                negatives = self.negatives.size(),
                "not enough examples to train"
            );
            return self.is_usable();
        }

        match self.train() {
            Some(model) => {
                if self.model.is_none() {
                    info!(
                        positives = self.positives.size(),
                        negatives = self.negatives.size(),
                        "adaptive classifier trained for the first time"
                    );
                }
                self.model = Some(model);
            }
            None => debug!("training produced no model, keeping the previous one"),
        }
        self.is_usable()
    }

    fn reset(&mut self) {
        self.positives.clear();
        self.negatives.clear();
        self.model = None;
    }
}
