//! Weighted resampling of particle sets.

use facetrack_core::Sample;
use rand::Rng;
use serde::{Deserialize, Serialize};

/// Draws a new, unweighted particle set proportional to the old weights.
pub trait ResamplingAlgorithm {
    /// Return exactly `count` children of `samples`, or none at all if the
    /// input is empty or carries no weight.
    fn resample<R: Rng + ?Sized>(&self, samples: &[Sample], count: usize, rng: &mut R)
        -> Vec<Sample>;
}

/// Systematic (low-variance) resampling: a single random offset and `count`
/// equally spaced pointers walked once along the cumulative weights.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LowVarianceSampling;

impl ResamplingAlgorithm for LowVarianceSampling {
    fn resample<R: Rng + ?Sized>(
        &self,
        samples: &[Sample],
        count: usize,
        rng: &mut R,
    ) -> Vec<Sample> {
        let total: f64 = samples.iter().map(|s| s.weight.max(0.0)).sum();
        if count == 0 || samples.is_empty() || !(total > 0.0) || !total.is_finite() {
            return Vec::new();
        }

        let step = total / count as f64;
        let start = rng.random_range(0.0..step);
        let last = samples
            .iter()
            .rposition(|s| s.weight > 0.0)
            .unwrap_or(samples.len() - 1);

        let mut resampled = Vec::with_capacity(count);
        let mut index = 0;
        let mut cumulative = samples[0].weight.max(0.0);
        for i in 0..count {
            let pointer = start + i as f64 * step;
            // rounding may push the final pointers past the last weighted bracket
            while pointer >= cumulative && index < last {
                index += 1;
                cumulative += samples[index].weight.max(0.0);
            }
            resampled.push(samples[index].resampled(index));
        }
        resampled
    }
}
