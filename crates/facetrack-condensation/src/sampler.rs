//! Generation of candidate particle sets.

use crate::resampling::{LowVarianceSampling, ResamplingAlgorithm};
use crate::transition::{SimpleTransitionModel, TransitionModel};
use facetrack_core::{Result, Sample, SampleContext, TrackError};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

/// Pixel dimensions of the frame being sampled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSize {
    pub width: u32,
    pub height: u32,
}

impl ImageSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Produces the next generation of samples.
pub trait Sampler {
    /// Create the candidate set for a frame of `image` size from the weighted
    /// set of the previous frame, which may be empty.
    fn create_samples<R: Rng + ?Sized>(
        &self,
        ctx: &mut SampleContext,
        previous: &[Sample],
        image: ImageSize,
        rng: &mut R,
    ) -> Vec<Sample>;
}

/// Usable size range of samples inside an image, `None` if not even the
/// smallest sample fits.
fn size_bounds(
    ctx: &SampleContext,
    image: ImageSize,
    min_size: i32,
    max_size: i32,
) -> Option<(i32, i32)> {
    let by_height = (image.height as f64 / ctx.aspect_ratio()).floor() as i32;
    let upper = max_size.min(image.width as i32).min(by_height);
    (upper >= min_size).then_some((min_size, upper))
}

/// Range of valid centers for an extent of `extent` pixels inside `limit`.
fn center_range(extent: i32, limit: u32) -> (i32, i32) {
    let low = extent / 2;
    (low, limit as i32 - extent + low)
}

/// Mixes weighted resampling of the previous generation with uniformly
/// placed random samples.
#[derive(Debug, Clone)]
pub struct ResamplingSampler {
    count: usize,
    random_rate: f64,
    min_size: i32,
    max_size: i32,
    resampling: LowVarianceSampling,
    transition: SimpleTransitionModel,
}

impl ResamplingSampler {
    pub fn new(
        count: usize,
        random_rate: f64,
        min_size: i32,
        max_size: i32,
        transition: SimpleTransitionModel,
    ) -> Result<Self> {
        check_random_rate(random_rate)?;
        check_sizes(min_size, max_size)?;
        transition.validate()?;
        Ok(Self {
            count,
            random_rate,
            min_size,
            max_size,
            resampling: LowVarianceSampling,
            transition,
        })
    }

    pub fn count(&self) -> usize {
        self.count
    }

    pub fn set_count(&mut self, count: usize) {
        self.count = count;
    }

    pub fn random_rate(&self) -> f64 {
        self.random_rate
    }

    pub fn set_random_rate(&mut self, random_rate: f64) -> Result<()> {
        check_random_rate(random_rate)?;
        self.random_rate = random_rate;
        Ok(())
    }

    pub fn size_range(&self) -> (i32, i32) {
        (self.min_size, self.max_size)
    }

    pub fn set_size_range(&mut self, min_size: i32, max_size: i32) -> Result<()> {
        check_sizes(min_size, max_size)?;
        self.min_size = min_size;
        self.max_size = max_size;
        Ok(())
    }

    pub fn transition(&self) -> &SimpleTransitionModel {
        &self.transition
    }

    /// Fit the sample's box into the image, or re-draw it at random when
    /// clamping is impossible.
    fn clamp<R: Rng + ?Sized>(
        &self,
        ctx: &mut SampleContext,
        sample: &mut Sample,
        (min_size, max_size): (i32, i32),
        image: ImageSize,
        rng: &mut R,
    ) {
        sample.size = sample.size.clamp(min_size, max_size);
        let height = ctx.height_of(sample);
        let (x_low, x_high) = center_range(sample.size, image.width);
        let (y_low, y_high) = center_range(height, image.height);
        if x_low > x_high || y_low > y_high {
            *sample = random_sample(ctx, (min_size, max_size), image, rng);
            return;
        }
        sample.x = sample.x.clamp(x_low, x_high);
        sample.y = sample.y.clamp(y_low, y_high);
    }
}

fn check_random_rate(random_rate: f64) -> Result<()> {
    if !(0.0..=1.0).contains(&random_rate) {
        return Err(TrackError::InvalidParameter(format!(
            "random rate must lie in [0, 1], got {random_rate}"
        )));
    }
    Ok(())
}

fn check_sizes(min_size: i32, max_size: i32) -> Result<()> {
    if min_size < 1 || min_size > max_size {
        return Err(TrackError::InvalidParameter(format!(
            "sample sizes must satisfy 0 < min <= max, got {min_size}..{max_size}"
        )));
    }
    Ok(())
}

/// A motionless sample of random size at a random position, in a new cluster.
fn random_sample<R: Rng + ?Sized>(
    ctx: &mut SampleContext,
    (min_size, max_size): (i32, i32),
    image: ImageSize,
    rng: &mut R,
) -> Sample {
    let size = rng.random_range(min_size..=max_size);
    let height = (size as f64 * ctx.aspect_ratio()).round() as i32;
    let (x_low, x_high) = center_range(size, image.width);
    let (y_low, y_high) = center_range(height, image.height);
    let x = rng.random_range(x_low..=x_high.max(x_low));
    let y = rng.random_range(y_low..=y_high.max(y_low));
    ctx.spawn(x, y, size)
}

impl Sampler for ResamplingSampler {
    fn create_samples<R: Rng + ?Sized>(
        &self,
        ctx: &mut SampleContext,
        previous: &[Sample],
        image: ImageSize,
        rng: &mut R,
    ) -> Vec<Sample> {
        let Some(bounds) = size_bounds(ctx, image, self.min_size, self.max_size) else {
            warn!(
                width = image.width,
                height = image.height,
                min_size = self.min_size,
                "image too small for any sample"
            );
            return Vec::new();
        };

        let resample_count = ((1.0 - self.random_rate) * self.count as f64).round() as usize;
        let mut samples = self.resampling.resample(previous, resample_count, rng);
        if samples.is_empty() && resample_count > 0 {
            if previous.is_empty() {
                debug!(count = self.count, "initializing particle set");
            } else {
                warn!(
                    previous = previous.len(),
                    "particle set collapsed, reseeding uniformly"
                );
            }
        }

        for sample in &mut samples {
            self.transition.predict(sample, rng);
            self.clamp(ctx, sample, bounds, image, rng);
        }
        while samples.len() < self.count {
            samples.push(random_sample(ctx, bounds, image, rng));
        }
        samples
    }
}

/// Deterministic exhaustive scan over positions and sizes.
///
/// Sizes grow geometrically by `size_scale` from `min_size`; the stride at a
/// given size is `step_size * size` pixels, at least one.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridSampler {
    pub min_size: i32,
    pub max_size: i32,
    pub size_scale: f64,
    pub step_size: f64,
}

impl Default for GridSampler {
    fn default() -> Self {
        Self {
            min_size: 20,
            max_size: 200,
            size_scale: 1.2,
            step_size: 0.1,
        }
    }
}

impl GridSampler {
    pub fn new(min_size: i32, max_size: i32, size_scale: f64, step_size: f64) -> Result<Self> {
        let sampler = Self {
            min_size,
            max_size,
            size_scale,
            step_size,
        };
        sampler.validate()?;
        Ok(sampler)
    }

    pub fn validate(&self) -> Result<()> {
        check_sizes(self.min_size, self.max_size)?;
        if !(self.size_scale > 1.0) || !(self.step_size > 0.0) {
            return Err(TrackError::InvalidParameter(format!(
                "grid needs size scale > 1 and step size > 0, got {}/{}",
                self.size_scale, self.step_size
            )));
        }
        Ok(())
    }
}

impl Sampler for GridSampler {
    fn create_samples<R: Rng + ?Sized>(
        &self,
        ctx: &mut SampleContext,
        _previous: &[Sample],
        image: ImageSize,
        _rng: &mut R,
    ) -> Vec<Sample> {
        let Some((min_size, max_size)) = size_bounds(ctx, image, self.min_size, self.max_size)
        else {
            return Vec::new();
        };

        let mut samples = Vec::new();
        let mut size = min_size;
        while size <= max_size {
            let height = (size as f64 * ctx.aspect_ratio()).round() as i32;
            let step = ((size as f64 * self.step_size).round() as i32).max(1);
            let (x_low, x_high) = center_range(size, image.width);
            let (y_low, y_high) = center_range(height, image.height);
            for y in (y_low..=y_high).step_by(step as usize) {
                for x in (x_low..=x_high).step_by(step as usize) {
                    samples.push(ctx.spawn(x, y, size));
                }
            }
            size = ((size as f64 * self.size_scale).round() as i32).max(size + 1);
        }
        samples
    }
}

/// Which sampler drives the tracker.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SamplingMode {
    #[default]
    Resampling,
    Grid,
}

impl FromStr for SamplingMode {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "resampling" => Ok(Self::Resampling),
            "grid" => Ok(Self::Grid),
            other => Err(TrackError::unknown("sampler", other)),
        }
    }
}

impl fmt::Display for SamplingMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Resampling => "resampling",
            Self::Grid => "grid",
        })
    }
}
