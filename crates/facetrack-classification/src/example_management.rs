//! Bounded training-set strategies for online classifier adaptation.
//!
//! Each strategy holds the examples of one class. Whether an example is
//! positive or negative is implied by the pool it lives in.

use facetrack_core::{FeatureVector, Result, TrackError};
use serde::{Deserialize, Serialize};

/// Scores examples with the classifier that is currently in use.
pub trait ConfidenceScorer {
    /// Signed confidence that `features` is positive, or `None` if no model
    /// has been trained yet.
    fn confidence(&self, features: &[f32]) -> Option<f64>;
}

/// Scorer for pools that do not rank their examples.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoScorer;

impl ConfidenceScorer for NoScorer {
    fn confidence(&self, _features: &[f32]) -> Option<f64> {
        None
    }
}

/// Maintains the examples of one class.
pub trait ExampleManagement {
    /// Add new examples, possibly evicting existing ones.
    fn add(&mut self, new_examples: &[FeatureVector], scorer: &dyn ConfidenceScorer);

    fn clear(&mut self);

    /// Number of stored examples.
    fn size(&self) -> usize;

    /// Whether enough examples are stored for a meaningful training run.
    fn has_required_size(&self) -> bool;

    /// Snapshot of all stored examples.
    fn examples(&self) -> Vec<FeatureVector>;
}

/// Keeps every example ever added.
#[derive(Debug, Clone, Default)]
pub struct UnlimitedExampleManagement {
    examples: Vec<FeatureVector>,
    required_size: usize,
}

impl UnlimitedExampleManagement {
    pub fn new(required_size: usize) -> Self {
        Self {
            examples: Vec::new(),
            required_size,
        }
    }
}

impl ExampleManagement for UnlimitedExampleManagement {
    fn add(&mut self, new_examples: &[FeatureVector], _scorer: &dyn ConfidenceScorer) {
        self.examples.extend(new_examples.iter().cloned());
    }

    fn clear(&mut self) {
        self.examples.clear();
    }

    fn size(&self) -> usize {
        self.examples.len()
    }

    fn has_required_size(&self) -> bool {
        self.examples.len() >= self.required_size
    }

    fn examples(&self) -> Vec<FeatureVector> {
        self.examples.clone()
    }
}

/// Ring buffer that overwrites the oldest example once full.
#[derive(Debug, Clone)]
pub struct AgeBasedExampleManagement {
    examples: Vec<FeatureVector>,
    capacity: usize,
    required_size: usize,
    insert_position: usize,
}

impl AgeBasedExampleManagement {
    pub fn new(capacity: usize, required_size: usize) -> Result<Self> {
        check_capacity(capacity, required_size)?;
        Ok(Self {
            examples: Vec::with_capacity(capacity),
            capacity,
            required_size,
            insert_position: 0,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl ExampleManagement for AgeBasedExampleManagement {
    fn add(&mut self, new_examples: &[FeatureVector], _scorer: &dyn ConfidenceScorer) {
        for example in new_examples {
            if self.examples.len() < self.capacity {
                self.examples.push(example.clone());
            } else {
                self.examples[self.insert_position] = example.clone();
            }
            self.insert_position = (self.insert_position + 1) % self.capacity;
        }
    }

    fn clear(&mut self) {
        self.examples.clear();
        self.insert_position = 0;
    }

    fn size(&self) -> usize {
        self.examples.len()
    }

    fn has_required_size(&self) -> bool {
        self.examples.len() >= self.required_size
    }

    fn examples(&self) -> Vec<FeatureVector> {
        self.examples.clone()
    }
}

/// Fixed-capacity pool that keeps the examples the classifier is least sure
/// about.
///
/// On every `add` the stored examples (except the first `keep`) are ranked by
/// descending confidence and the candidates by ascending confidence. Free
/// slots take the least confident candidates; after that a candidate replaces
/// the most confident remaining example as long as its own confidence is
/// strictly lower. Without a trained model only free slots are filled.
#[derive(Debug, Clone)]
pub struct ConfidenceBasedExampleManagement {
    examples: Vec<FeatureVector>,
    positive: bool,
    capacity: usize,
    required_size: usize,
    keep: usize,
}

impl ConfidenceBasedExampleManagement {
    /// `positive` selects which side of the hyperplane counts as confident.
    pub fn new(positive: bool, capacity: usize, required_size: usize, keep: usize) -> Result<Self> {
        check_capacity(capacity, required_size)?;
        if keep > capacity {
            return Err(TrackError::InvalidParameter(format!(
                "cannot keep {keep} examples with capacity {capacity}"
            )));
        }
        Ok(Self {
            examples: Vec::with_capacity(capacity),
            positive,
            capacity,
            required_size,
            keep,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    fn ranked(
        &self,
        examples: &[FeatureVector],
        scorer: &dyn ConfidenceScorer,
        from: usize,
    ) -> Option<Vec<(usize, f64)>> {
        let sign = if self.positive { 1.0 } else { -1.0 };
        (from..examples.len())
            .map(|i| scorer.confidence(&examples[i]).map(|c| (i, sign * c)))
            .collect()
    }
}

impl ExampleManagement for ConfidenceBasedExampleManagement {
    fn add(&mut self, new_examples: &[FeatureVector], scorer: &dyn ConfidenceScorer) {
        if new_examples.is_empty() {
            return;
        }
        let existing = self.ranked(&self.examples, scorer, self.keep);
        let candidates = self.ranked(new_examples, scorer, 0);

        let (Some(mut existing), Some(mut candidates)) = (existing, candidates) else {
            for example in new_examples {
                if self.examples.len() >= self.capacity {
                    break;
                }
                self.examples.push(example.clone());
            }
            return;
        };

        existing.sort_by(|a, b| b.1.total_cmp(&a.1));
        candidates.sort_by(|a, b| a.1.total_cmp(&b.1));

        let mut candidates = candidates.into_iter().peekable();
        while self.examples.len() < self.capacity {
            match candidates.next() {
                Some((index, _)) => self.examples.push(new_examples[index].clone()),
                None => return,
            }
        }
        for (slot, confidence) in existing {
            match candidates.peek() {
                Some(&(index, candidate)) if candidate < confidence => {
                    self.examples[slot] = new_examples[index].clone();
                    candidates.next();
                }
                _ => break,
            }
        }
    }

    fn clear(&mut self) {
        self.examples.clear();
    }

    fn size(&self) -> usize {
        self.examples.len()
    }

    fn has_required_size(&self) -> bool {
        self.examples.len() >= self.required_size
    }

    fn examples(&self) -> Vec<FeatureVector> {
        self.examples.clone()
    }
}

/// Keeps the examples of the last `frame_capacity` adaptation calls, one ring
/// slot per call.
#[derive(Debug, Clone)]
pub struct FrameBasedExampleManagement {
    frames: Vec<Vec<FeatureVector>>,
    frame_capacity: usize,
    required_size: usize,
    insert_position: usize,
}

impl FrameBasedExampleManagement {
    pub fn new(frame_capacity: usize, required_size: usize) -> Result<Self> {
        if frame_capacity == 0 {
            return Err(TrackError::InvalidParameter(
                "frame capacity must be positive".into(),
            ));
        }
        Ok(Self {
            frames: Vec::with_capacity(frame_capacity),
            frame_capacity,
            required_size,
            insert_position: 0,
        })
    }

    /// Number of frames currently stored.
    pub fn frames(&self) -> usize {
        self.frames.len()
    }
}

impl ExampleManagement for FrameBasedExampleManagement {
    fn add(&mut self, new_examples: &[FeatureVector], _scorer: &dyn ConfidenceScorer) {
        let frame = new_examples.to_vec();
        if self.frames.len() < self.frame_capacity {
            self.frames.push(frame);
        } else {
            self.frames[self.insert_position] = frame;
        }
        self.insert_position = (self.insert_position + 1) % self.frame_capacity;
    }

    fn clear(&mut self) {
        self.frames.clear();
        self.insert_position = 0;
    }

    fn size(&self) -> usize {
        self.frames.iter().map(Vec::len).sum()
    }

    fn has_required_size(&self) -> bool {
        self.size() >= self.required_size
    }

    fn examples(&self) -> Vec<FeatureVector> {
        self.frames.iter().flatten().cloned().collect()
    }
}

fn check_capacity(capacity: usize, required_size: usize) -> Result<()> {
    if capacity == 0 {
        return Err(TrackError::InvalidParameter("capacity must be positive".into()));
    }
    if required_size > capacity {
        return Err(TrackError::InvalidParameter(format!(
            "required size {required_size} exceeds capacity {capacity}"
        )));
    }
    Ok(())
}

/// Configuration of one example pool.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ExampleManagementConfig {
    Unlimited {
        required_size: usize,
    },
    AgeBased {
        capacity: usize,
        required_size: usize,
    },
    ConfidenceBased {
        capacity: usize,
        required_size: usize,
        #[serde(default)]
        keep: usize,
    },
    FrameBased {
        frame_capacity: usize,
        required_size: usize,
    },
}

impl ExampleManagementConfig {
    /// Names of the serialized `type` tag.
    pub const KINDS: &'static [&'static str] =
        &["unlimited", "age_based", "confidence_based", "frame_based"];

    /// Build the pool; `positive` only matters for confidence ranking.
    pub fn build(&self, positive: bool) -> Result<ExampleStore> {
        Ok(match *self {
            Self::Unlimited { required_size } => {
                ExampleStore::Unlimited(UnlimitedExampleManagement::new(required_size))
            }
            Self::AgeBased {
                capacity,
                required_size,
            } => ExampleStore::AgeBased(AgeBasedExampleManagement::new(capacity, required_size)?),
            Self::ConfidenceBased {
                capacity,
                required_size,
                keep,
            } => ExampleStore::ConfidenceBased(ConfidenceBasedExampleManagement::new(
                positive,
                capacity,
                required_size,
                keep,
            )?),
            Self::FrameBased {
                frame_capacity,
                required_size,
            } => ExampleStore::FrameBased(FrameBasedExampleManagement::new(
                frame_capacity,
                required_size,
            )?),
        })
    }
}

/// Closed set of example pools, chosen when the configuration is loaded.
#[derive(Debug, Clone)]
pub enum ExampleStore {
    Unlimited(UnlimitedExampleManagement),
    AgeBased(AgeBasedExampleManagement),
    ConfidenceBased(ConfidenceBasedExampleManagement),
    FrameBased(FrameBasedExampleManagement),
}

impl ExampleStore {
    fn inner(&self) -> &dyn ExampleManagement {
        match self {
            Self::Unlimited(m) => m,
            Self::AgeBased(m) => m,
            Self::ConfidenceBased(m) => m,
            Self::FrameBased(m) => m,
        }
    }

    fn inner_mut(&mut self) -> &mut dyn ExampleManagement {
        match self {
            Self::Unlimited(m) => m,
            Self::AgeBased(m) => m,
            Self::ConfidenceBased(m) => m,
            Self::FrameBased(m) => m,
        }
    }
}

impl ExampleManagement for ExampleStore {
    fn add(&mut self, new_examples: &[FeatureVector], scorer: &dyn ConfidenceScorer) {
        self.inner_mut().add(new_examples, scorer)
    }

    fn clear(&mut self) {
        self.inner_mut().clear()
    }

    fn size(&self) -> usize {
        self.inner().size()
    }

    fn has_required_size(&self) -> bool {
        self.inner().has_required_size()
    }

    fn examples(&self) -> Vec<FeatureVector> {
        self.inner().examples()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Confidence is the first feature value.
    struct FirstFeature;

    impl ConfidenceScorer for FirstFeature {
        fn confidence(&self, features: &[f32]) -> Option<f64> {
            features.first().map(|&v| v as f64)
        }
    }

    fn ex(v: f32) -> FeatureVector {
        FeatureVector::from(vec![v])
    }

    fn values(m: &dyn ExampleManagement) -> Vec<f32> {
        m.examples().iter().map(|e| e[0]).collect()
    }

    #[test]
    fn test_unlimited() {
        let mut m = UnlimitedExampleManagement::new(3);
        m.add(&[ex(1.0), ex(2.0)], &NoScorer);
        assert!(!m.has_required_size());
        m.add(&[ex(3.0)], &NoScorer);
        assert!(m.has_required_size());
        assert_eq!(m.size(), 3);
    }

    #[test]
    fn test_age_based_fifo() {
        let mut m = AgeBasedExampleManagement::new(3, 1).unwrap();
        for v in 0..5 {
            m.add(&[ex(v as f32)], &NoScorer);
        }
        // slots hold [3, 4, 2]: the last three examples, rotated
        let mut kept = values(&m);
        assert_eq!(kept, vec![3.0, 4.0, 2.0]);
        kept.sort_by(f32::total_cmp);
        assert_eq!(kept, vec![2.0, 3.0, 4.0]);
    }

    #[test]
    fn test_confidence_based_evicts_confident_examples() {
        let mut m = ConfidenceBasedExampleManagement::new(true, 4, 1, 0).unwrap();
        m.add(&[ex(0.9), ex(0.8), ex(0.2), ex(0.1)], &FirstFeature);
        assert_eq!(m.size(), 4);
        m.add(&[ex(0.5), ex(0.05)], &FirstFeature);
        let mut kept = values(&m);
        kept.sort_by(f32::total_cmp);
        assert_eq!(kept, vec![0.05, 0.1, 0.2, 0.5]);
    }

    #[test]
    fn test_confidence_based_requires_strictly_lower() {
        let mut m = ConfidenceBasedExampleManagement::new(true, 2, 1, 0).unwrap();
        m.add(&[ex(0.3), ex(0.4)], &FirstFeature);
        m.add(&[ex(0.4), ex(0.9)], &FirstFeature);
        let mut kept = values(&m);
        kept.sort_by(f32::total_cmp);
        assert_eq!(kept, vec![0.3, 0.4]);
    }

    #[test]
    fn test_confidence_based_negative_pool_flips_sign() {
        // for negatives a low positive-class score means a confident example
        let mut m = ConfidenceBasedExampleManagement::new(false, 2, 1, 0).unwrap();
        m.add(&[ex(-0.9), ex(0.1)], &FirstFeature);
        m.add(&[ex(0.5)], &FirstFeature);
        let mut kept = values(&m);
        kept.sort_by(f32::total_cmp);
        assert_eq!(kept, vec![0.1, 0.5]);
    }

    #[test]
    fn test_confidence_based_keeps_protected_prefix() {
        let mut m = ConfidenceBasedExampleManagement::new(true, 2, 1, 1).unwrap();
        m.add(&[ex(0.99)], &FirstFeature);
        m.add(&[ex(0.5)], &FirstFeature);
        m.add(&[ex(0.0)], &FirstFeature);
        assert_eq!(values(&m), vec![0.99, 0.0]);
    }

    #[test]
    fn test_confidence_based_without_model_fills_only() {
        let mut m = ConfidenceBasedExampleManagement::new(true, 2, 2, 0).unwrap();
        m.add(&[ex(1.0)], &NoScorer);
        assert!(!m.has_required_size());
        m.add(&[ex(2.0), ex(3.0)], &NoScorer);
        assert_eq!(values(&m), vec![1.0, 2.0]);
        assert!(m.has_required_size());
    }

    #[test]
    fn test_frame_based_counts_examples() {
        let mut m = FrameBasedExampleManagement::new(2, 4).unwrap();
        m.add(&[ex(1.0), ex(2.0), ex(3.0)], &NoScorer);
        assert!(!m.has_required_size());
        m.add(&[ex(4.0)], &NoScorer);
        assert!(m.has_required_size());
        m.add(&[], &NoScorer);
        // the oldest frame was replaced by an empty one
        assert_eq!(m.size(), 1);
        assert_eq!(m.frames(), 2);
        assert_eq!(values(&m), vec![4.0]);
    }

    #[test]
    fn test_invalid_capacities() {
        assert!(AgeBasedExampleManagement::new(0, 0).is_err());
        assert!(AgeBasedExampleManagement::new(2, 3).is_err());
        assert!(ConfidenceBasedExampleManagement::new(true, 2, 1, 3).is_err());
        assert!(FrameBasedExampleManagement::new(0, 1).is_err());
    }

    #[test]
    fn test_config_round_trip() {
        let config: ExampleManagementConfig =
            serde_json::from_str(r#"{"type":"confidence_based","capacity":10,"required_size":5}"#)
                .unwrap();
        let store = config.build(true).unwrap();
        assert!(matches!(store, ExampleStore::ConfidenceBased(_)));
        assert!(serde_json::from_str::<ExampleManagementConfig>(r#"{"type":"random"}"#).is_err());
        for config in [
            ExampleManagementConfig::Unlimited { required_size: 1 },
            ExampleManagementConfig::FrameBased {
                frame_capacity: 2,
                required_size: 1,
            },
            config,
        ] {
            let json = serde_json::to_value(&config).unwrap();
            assert!(ExampleManagementConfig::KINDS.contains(&json["type"].as_str().unwrap()));
        }
    }

    proptest! {
        #[test]
        fn prop_capacity_invariant(
            capacity in 1usize..12,
            batches in prop::collection::vec(prop::collection::vec(-1.0f32..1.0, 0..8), 0..20),
        ) {
            let required = capacity / 2;
            let mut stores = vec![
                ExampleManagementConfig::AgeBased { capacity, required_size: required }.build(true).unwrap(),
                ExampleManagementConfig::ConfidenceBased { capacity, required_size: required, keep: 0 }.build(true).unwrap(),
                ExampleManagementConfig::ConfidenceBased { capacity, required_size: required, keep: 0 }.build(false).unwrap(),
            ];
            for batch in &batches {
                let batch: Vec<FeatureVector> = batch.iter().map(|&v| ex(v)).collect();
                for store in &mut stores {
                    store.add(&batch, &FirstFeature);
                    prop_assert!(store.size() <= capacity);
                    prop_assert_eq!(store.has_required_size(), store.size() >= required);
                }
            }
        }

        #[test]
        fn prop_frame_based_holds_at_most_capacity_frames(
            frame_capacity in 1usize..6,
            batches in prop::collection::vec(0usize..5, 0..20),
        ) {
            let mut m = FrameBasedExampleManagement::new(frame_capacity, 3).unwrap();
            for (i, &n) in batches.iter().enumerate() {
                let batch: Vec<FeatureVector> = (0..n).map(|_| ex(i as f32)).collect();
                m.add(&batch, &NoScorer);
                prop_assert!(m.frames() <= frame_capacity);
                let tail = batches[..=i].iter().rev().take(frame_capacity).sum::<usize>();
                prop_assert_eq!(m.size(), tail);
                prop_assert_eq!(m.has_required_size(), m.size() >= 3);
            }
        }
    }
}
