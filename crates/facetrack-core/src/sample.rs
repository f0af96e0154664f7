//! Particles of the condensation tracker.

use crate::error::{Result, TrackError};
use crate::geometry::{Rect, Vec2};
use serde::{Deserialize, Serialize};

/// A weighted hypothesis about the tracked object's location.
///
/// `x`/`y` are the center in integer pixels, `size` the width. The height is
/// derived from the aspect ratio held by the owning [`SampleContext`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub x: i32,
    pub y: i32,
    pub size: i32,
    pub vx: i32,
    pub vy: i32,
    /// Multiplicative scale change per frame, 1.0 meaning no change.
    pub vsize: f64,
    /// Un-normalized likelihood, never negative.
    pub weight: f64,
    /// Raw output of the last classifier that evaluated this sample.
    pub score: f64,
    /// Whether the sample currently represents the tracked object.
    pub target: bool,
    pub cluster_id: u32,
    /// Index into the previous generation this sample was resampled from.
    pub ancestor: Option<usize>,
}

impl Sample {
    /// Create a motionless sample with unit weight.
    pub fn new(x: i32, y: i32, size: i32, cluster_id: u32) -> Self {
        Self {
            x,
            y,
            size,
            vx: 0,
            vy: 0,
            vsize: 1.0,
            weight: 1.0,
            score: 0.0,
            target: false,
            cluster_id,
            ancestor: None,
        }
    }

    /// Copy of this sample as a child in the next generation.
    ///
    /// Position, motion and cluster id carry over; the evaluation results
    /// are cleared so the child is weighted afresh.
    pub fn resampled(&self, index: usize) -> Self {
        Self {
            weight: 1.0,
            score: 0.0,
            target: false,
            ancestor: Some(index),
            ..self.clone()
        }
    }

    #[inline]
    pub fn width(&self) -> i32 {
        self.size
    }

    #[inline]
    pub fn height(&self, aspect_ratio: f64) -> i32 {
        (self.size as f64 * aspect_ratio).round() as i32
    }

    #[inline]
    pub fn center(&self) -> Vec2 {
        Vec2::new(self.x as f32, self.y as f32)
    }

    /// Bounding box of the hypothesis.
    pub fn bounds(&self, aspect_ratio: f64) -> Rect {
        let height = self.height(aspect_ratio);
        Rect::new(
            (self.x - self.size / 2) as f32,
            (self.y - height / 2) as f32,
            self.size as f32,
            height as f32,
        )
    }
}

/// Per-tracker sampling state: the height/width ratio of all samples and the
/// counter handing out cluster ids to freshly created samples.
#[derive(Debug, Clone)]
pub struct SampleContext {
    aspect_ratio: f64,
    next_cluster_id: u32,
}

impl SampleContext {
    pub fn new(aspect_ratio: f64) -> Result<Self> {
        if !(aspect_ratio > 0.0 && aspect_ratio.is_finite()) {
            return Err(TrackError::InvalidParameter(format!(
                "aspect ratio must be positive, got {aspect_ratio}"
            )));
        }
        Ok(Self {
            aspect_ratio,
            next_cluster_id: 0,
        })
    }

    #[inline]
    pub fn aspect_ratio(&self) -> f64 {
        self.aspect_ratio
    }

    /// Hand out the next cluster id.
    pub fn next_cluster_id(&mut self) -> u32 {
        let id = self.next_cluster_id;
        self.next_cluster_id = self.next_cluster_id.wrapping_add(1);
        id
    }

    /// Create a fresh sample in its own cluster.
    pub fn spawn(&mut self, x: i32, y: i32, size: i32) -> Sample {
        let cluster_id = self.next_cluster_id();
        Sample::new(x, y, size, cluster_id)
    }

    #[inline]
    pub fn height_of(&self, sample: &Sample) -> i32 {
        sample.height(self.aspect_ratio)
    }

    #[inline]
    pub fn bounds_of(&self, sample: &Sample) -> Rect {
        sample.bounds(self.aspect_ratio)
    }

    /// Restart cluster numbering, used when the tracker is reset.
    pub fn reset(&mut self) {
        self.next_cluster_id = 0;
    }
}

impl Default for SampleContext {
    fn default() -> Self {
        Self {
            aspect_ratio: 1.0,
            next_cluster_id: 0,
        }
    }
}
