//! Classifier capabilities consumed by the measurement models.
//!
//! The tracker never inspects a classifier's internals; it only asks for
//! probabilities and, for the adaptive model, hands over new examples.

use crate::patch::FeatureVector;

/// A binary classifier that also reports how likely the positive class is.
pub trait ProbabilisticClassifier {
    /// Classification result and probability of the positive class.
    fn probability(&self, features: &[f32]) -> (bool, f64);

    fn classify(&self, features: &[f32]) -> bool {
        self.probability(features).0
    }
}

/// A probabilistic classifier that can be re-trained online.
pub trait TrainableProbabilisticClassifier: ProbabilisticClassifier {
    /// Whether a trained model is available.
    fn is_usable(&self) -> bool;

    /// Add new examples and train a new model from the accumulated ones.
    ///
    /// Returns whether a usable model exists afterwards. When there are not
    /// enough examples yet the previous model stays in place.
    fn retrain(&mut self, positives: &[FeatureVector], negatives: &[FeatureVector]) -> bool;

    /// Discard the trained model and all accumulated examples.
    fn reset(&mut self);
}

impl<T: ProbabilisticClassifier + ?Sized> ProbabilisticClassifier for Box<T> {
    fn probability(&self, features: &[f32]) -> (bool, f64) {
        (**self).probability(features)
    }
}

impl<T: TrainableProbabilisticClassifier + ?Sized> TrainableProbabilisticClassifier for Box<T> {
    fn is_usable(&self) -> bool {
        (**self).is_usable()
    }

    fn retrain(&mut self, positives: &[FeatureVector], negatives: &[FeatureVector]) -> bool {
        (**self).retrain(positives, negatives)
    }

    fn reset(&mut self) {
        (**self).reset()
    }
}
