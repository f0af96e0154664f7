//! Process model predicting where a particle moves between frames.

use facetrack_core::{Result, Sample, TrackError};
use rand::Rng;
use rand_distr::{Distribution, StandardNormal};
use serde::{Deserialize, Serialize};

/// Predicts a particle's next state.
pub trait TransitionModel {
    /// Move `sample` one frame forward. Never fails; the result may lie
    /// outside the image and is clamped by the sampler.
    fn predict<R: Rng + ?Sized>(&self, sample: &mut Sample, rng: &mut R);
}

/// Constant-velocity motion with Gaussian diffusion.
///
/// The position noise is scaled by the sample size so that large and small
/// hypotheses diffuse by the same relative amount; the size is perturbed by a
/// multiplicative factor `1 + size_deviation * N(0, 1)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimpleTransitionModel {
    pub position_deviation: f64,
    pub size_deviation: f64,
}

impl SimpleTransitionModel {
    pub fn new(position_deviation: f64, size_deviation: f64) -> Result<Self> {
        let model = Self {
            position_deviation,
            size_deviation,
        };
        model.validate()?;
        Ok(model)
    }

    pub fn validate(&self) -> Result<()> {
        if !(self.position_deviation >= 0.0) || !(self.size_deviation >= 0.0) {
            return Err(TrackError::InvalidParameter(format!(
                "transition deviations must be non-negative, got {}/{}",
                self.position_deviation, self.size_deviation
            )));
        }
        Ok(())
    }
}

impl Default for SimpleTransitionModel {
    fn default() -> Self {
        Self {
            position_deviation: 0.05,
            size_deviation: 0.1,
        }
    }
}

impl TransitionModel for SimpleTransitionModel {
    fn predict<R: Rng + ?Sized>(&self, sample: &mut Sample, rng: &mut R) {
        let size = sample.size as f64 * sample.vsize;
        let deviation = self.position_deviation * size;
        let nx: f64 = StandardNormal.sample(rng);
        let ny: f64 = StandardNormal.sample(rng);
        let ns: f64 = StandardNormal.sample(rng);

        sample.x += sample.vx + (deviation * nx).round() as i32;
        sample.y += sample.vy + (deviation * ny).round() as i32;
        sample.size = (size * (1.0 + self.size_deviation * ns)).round().max(1.0) as i32;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resampling::{LowVarianceSampling, ResamplingAlgorithm};
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_zero_noise_applies_velocity() {
        let model = SimpleTransitionModel::new(0.0, 0.0).unwrap();
        let mut rng = StdRng::seed_from_u64(1);
        let mut s = Sample::new(50, 50, 20, 3);
        s.vx = 2;
        s.vy = -1;
        s.vsize = 1.5;
        model.predict(&mut s, &mut rng);
        assert_eq!((s.x, s.y, s.size), (52, 49, 30));
        assert_eq!(s.cluster_id, 3);
    }

    #[test]
    fn test_seeded_prediction_is_reproducible() {
        let model = SimpleTransitionModel::default();
        let run = |seed| {
            let mut rng = StdRng::seed_from_u64(seed);
            let mut s = Sample::new(100, 100, 40, 0);
            for _ in 0..10 {
                model.predict(&mut s, &mut rng);
            }
            (s.x, s.y, s.size)
        };
        assert_eq!(run(7), run(7));
    }

    #[test]
    fn test_diffusion_is_centered() {
        let model = SimpleTransitionModel::new(0.1, 0.0).unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let n = 4000;
        let mean_x = (0..n)
            .map(|_| {
                let mut s = Sample::new(200, 200, 50, 0);
                model.predict(&mut s, &mut rng);
                s.x as f64
            })
            .sum::<f64>()
            / n as f64;
        assert!((mean_x - 200.0).abs() < 0.5);
    }

    #[test]
    fn test_size_never_collapses() {
        let model = SimpleTransitionModel::new(0.0, 10.0).unwrap();
        let mut rng = StdRng::seed_from_u64(3);
        for _ in 0..100 {
            let mut s = Sample::new(0, 0, 2, 0);
            model.predict(&mut s, &mut rng);
            assert!(s.size >= 1);
        }
    }

    #[test]
    fn test_negative_deviation_rejected() {
        assert!(SimpleTransitionModel::new(-0.1, 0.1).is_err());
    }

    proptest! {
        #[test]
        fn prop_lineage_survives_resample_and_predict(
            weights in prop::collection::vec(0.1f64..5.0, 1..30),
            seed in any::<u64>(),
        ) {
            let mut rng = StdRng::seed_from_u64(seed);
            let samples: Vec<Sample> = weights
                .iter()
                .enumerate()
                .map(|(i, &w)| {
                    let mut s = Sample::new(100 + i as i32, 80, 30, 1000 + i as u32);
                    s.weight = w;
                    s
                })
                .collect();
            let model = SimpleTransitionModel::default();
            for mut child in LowVarianceSampling.resample(&samples, 60, &mut rng) {
                model.predict(&mut child, &mut rng);
                let parent = &samples[child.ancestor.unwrap()];
                prop_assert_eq!(child.cluster_id, parent.cluster_id);
            }
        }
    }
}
