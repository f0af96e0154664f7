//! Reduction of a weighted particle set to a single position estimate.

use facetrack_core::{Rect, Result, Sample, SampleContext, TrackError, Vec2};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Estimates the target's bounding box from evaluated samples.
pub trait StateExtractor {
    /// The estimate, or `None` if no sample represents the target.
    fn extract(&mut self, ctx: &SampleContext, samples: &[Sample]) -> Option<Rect>;

    /// Forget any state carried between frames.
    fn reset(&mut self) {}
}

fn is_target(sample: &Sample) -> bool {
    sample.target && sample.weight > 0.0
}

/// Box of the given center and width.
fn box_of(ctx: &SampleContext, x: f64, y: f64, size: f64) -> Rect {
    let height = size * ctx.aspect_ratio();
    Rect::from_center_size(
        Vec2::new(x as f32, y as f32),
        Vec2::new(size as f32, height as f32),
    )
}

/// Weighted mean of position and size over all target samples.
///
/// With `dominant_cluster` set only the cluster carrying the most target
/// weight contributes, which keeps two separated modes from being averaged
/// into a position between them.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedMeanStateExtractor {
    pub dominant_cluster: bool,
}

impl WeightedMeanStateExtractor {
    pub fn new(dominant_cluster: bool) -> Self {
        Self { dominant_cluster }
    }

    fn dominant(samples: &[Sample]) -> Option<u32> {
        let mut weights: HashMap<u32, f64> = HashMap::new();
        for sample in samples.iter().filter(|s| is_target(s)) {
            *weights.entry(sample.cluster_id).or_default() += sample.weight;
        }
        weights
            .into_iter()
            .max_by(|a, b| a.1.total_cmp(&b.1).then(b.0.cmp(&a.0)))
            .map(|(id, _)| id)
    }
}

impl StateExtractor for WeightedMeanStateExtractor {
    fn extract(&mut self, ctx: &SampleContext, samples: &[Sample]) -> Option<Rect> {
        let cluster = if self.dominant_cluster {
            Some(Self::dominant(samples)?)
        } else {
            None
        };

        let (mut x, mut y, mut size, mut total) = (0.0, 0.0, 0.0, 0.0);
        for sample in samples
            .iter()
            .filter(|s| is_target(s) && cluster.map_or(true, |id| s.cluster_id == id))
        {
            x += sample.weight * sample.x as f64;
            y += sample.weight * sample.y as f64;
            size += sample.weight * sample.size as f64;
            total += sample.weight;
        }
        if !(total > 0.0) {
            return None;
        }
        Some(box_of(ctx, x / total, y / total, size / total))
    }
}

/// Box of the single heaviest target sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MaxWeightStateExtractor;

impl StateExtractor for MaxWeightStateExtractor {
    fn extract(&mut self, ctx: &SampleContext, samples: &[Sample]) -> Option<Rect> {
        samples
            .iter()
            .filter(|s| is_target(s))
            .max_by(|a, b| a.weight.total_cmp(&b.weight))
            .map(|s| ctx.bounds_of(s))
    }
}

/// Exponential smoothing of another extractor's estimates.
///
/// The smoothed box moves by `alpha` of the way towards each new estimate.
/// A frame without an estimate drops the history.
#[derive(Debug, Clone)]
pub struct FilteringStateExtractor {
    inner: Box<StateExtractorKind>,
    alpha: f32,
    last: Option<Rect>,
}

impl FilteringStateExtractor {
    pub fn new(inner: StateExtractorKind, alpha: f32) -> Result<Self> {
        if !(alpha > 0.0 && alpha <= 1.0) {
            return Err(TrackError::InvalidParameter(format!(
                "smoothing factor must lie in (0, 1], got {alpha}"
            )));
        }
        Ok(Self {
            inner: Box::new(inner),
            alpha,
            last: None,
        })
    }
}

impl StateExtractor for FilteringStateExtractor {
    fn extract(&mut self, ctx: &SampleContext, samples: &[Sample]) -> Option<Rect> {
        let current = self.inner.extract(ctx, samples);
        self.last = match (self.last, current) {
            (Some(last), Some(current)) => Some(last.lerp(current, self.alpha)),
            (_, current) => current,
        };
        self.last
    }

    fn reset(&mut self) {
        self.last = None;
        self.inner.reset();
    }
}

/// The extractors selectable by configuration.
#[derive(Debug, Clone)]
pub enum StateExtractorKind {
    WeightedMean(WeightedMeanStateExtractor),
    MaxWeight(MaxWeightStateExtractor),
    Filtering(FilteringStateExtractor),
}

impl StateExtractor for StateExtractorKind {
    fn extract(&mut self, ctx: &SampleContext, samples: &[Sample]) -> Option<Rect> {
        match self {
            Self::WeightedMean(e) => e.extract(ctx, samples),
            Self::MaxWeight(e) => e.extract(ctx, samples),
            Self::Filtering(e) => e.extract(ctx, samples),
        }
    }

    fn reset(&mut self) {
        match self {
            Self::WeightedMean(e) => e.reset(),
            Self::MaxWeight(e) => e.reset(),
            Self::Filtering(e) => e.reset(),
        }
    }
}

impl Default for StateExtractorKind {
    fn default() -> Self {
        Self::WeightedMean(WeightedMeanStateExtractor::default())
    }
}

/// Aggregation used by an extractor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Aggregation {
    #[default]
    WeightedMean,
    MaxWeight,
}

impl FromStr for Aggregation {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "weighted_mean" | "weightedmean" => Ok(Self::WeightedMean),
            "max_weight" | "maxweight" => Ok(Self::MaxWeight),
            other => Err(TrackError::unknown("state extractor", other)),
        }
    }
}

impl fmt::Display for Aggregation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::WeightedMean => "weighted_mean",
            Self::MaxWeight => "max_weight",
        })
    }
}

/// Serialized choice of state extractor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StateExtractorConfig {
    pub aggregation: Aggregation,
    /// Restrict the weighted mean to the heaviest cluster.
    pub dominant_cluster: bool,
    /// Smoothing factor in (0, 1]; no smoothing when absent.
    pub smoothing: Option<f32>,
}

impl StateExtractorConfig {
    pub fn build(&self) -> Result<StateExtractorKind> {
        let base = match self.aggregation {
            Aggregation::WeightedMean => StateExtractorKind::WeightedMean(
                WeightedMeanStateExtractor::new(self.dominant_cluster),
            ),
            Aggregation::MaxWeight => StateExtractorKind::MaxWeight(MaxWeightStateExtractor),
        };
        match self.smoothing {
            Some(alpha) => Ok(StateExtractorKind::Filtering(FilteringStateExtractor::new(
                base, alpha,
            )?)),
            None => Ok(base),
        }
    }
}
