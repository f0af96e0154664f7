//! The condensation control loop.

use crate::adaptive::{AdaptiveMeasurementModel, AdaptiveState};
use crate::config::TrackerConfig;
use crate::measurement::MeasurementModel;
use crate::sampler::{GridSampler, ImageSize, ResamplingSampler, Sampler, SamplingMode};
use crate::state_extractor::{StateExtractor, StateExtractorKind};
use facetrack_core::{GrayImage, Rect, Result, Sample, SampleContext, TrackError};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, info};

/// How the adaptive model's evaluation combines with the static one once
/// the adaptive model is usable.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BlendPolicy {
    /// Both models run; the adaptive model supplies weight and score while
    /// the static cascade keeps deciding which samples are targets.
    #[default]
    Replace,
    /// Both models run; weights multiply and a sample is a target only if
    /// both models agree.
    Multiply,
    /// Only the adaptive model runs and decides everything.
    ToggleOnly,
}

impl FromStr for BlendPolicy {
    type Err = TrackError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "replace" => Ok(Self::Replace),
            "multiply" => Ok(Self::Multiply),
            "toggle_only" | "toggle-only" => Ok(Self::ToggleOnly),
            other => Err(TrackError::unknown("blend policy", other)),
        }
    }
}

impl fmt::Display for BlendPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Replace => "replace",
            Self::Multiply => "multiply",
            Self::ToggleOnly => "toggle_only",
        })
    }
}

/// Outcome of one processed frame.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TrackingReport {
    /// Frames processed since construction or the last reset.
    pub frame: u64,
    pub estimate: Option<Rect>,
    pub adaptive_state: AdaptiveState,
    /// Whether the adaptive model weighed the samples of this frame.
    pub adaptive_evaluation_used: bool,
    pub samples: usize,
    pub targets: usize,
}

/// Particle filter weighting its samples with a static classifier cascade
/// and, once it has learned enough, an adaptive classifier trained on the
/// tracker's own estimates.
///
/// Each frame: create samples from the previous generation, weigh them,
/// extract the estimate, let the adaptive model learn from it and keep the
/// samples for the next frame. Ancestors of the current samples index into
/// the previous generation.
pub struct PartiallyAdaptiveCondensationTracker<S, A> {
    ctx: SampleContext,
    resampling_sampler: ResamplingSampler,
    grid_sampler: GridSampler,
    sampling_mode: SamplingMode,
    static_model: S,
    adaptive_model: A,
    extractor: StateExtractorKind,
    blend_policy: BlendPolicy,
    adaptive_evaluation: bool,
    adaptation: bool,
    samples: Vec<Sample>,
    previous: Vec<Sample>,
    last_estimate: Option<Rect>,
    rng: StdRng,
    report: TrackingReport,
}

impl<S, A> PartiallyAdaptiveCondensationTracker<S, A>
where
    S: MeasurementModel,
    A: AdaptiveMeasurementModel,
{
    /// Build a tracker from configuration around the given measurement models.
    pub fn new(config: &TrackerConfig, static_model: S, adaptive_model: A) -> Result<Self> {
        config.validate()?;
        let sampler = &config.sampler;
        let rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_os_rng(),
        };
        Ok(Self {
            ctx: SampleContext::new(config.aspect_ratio)?,
            resampling_sampler: ResamplingSampler::new(
                sampler.count,
                sampler.random_rate,
                sampler.min_size,
                sampler.max_size,
                sampler.transition,
            )?,
            grid_sampler: sampler.grid,
            sampling_mode: sampler.mode,
            static_model,
            adaptive_model,
            extractor: config.state_extractor.build()?,
            blend_policy: config.blend_policy,
            adaptive_evaluation: config.adaptive_evaluation,
            adaptation: config.adaptation,
            samples: Vec::new(),
            previous: Vec::new(),
            last_estimate: None,
            rng,
            report: TrackingReport::default(),
        })
    }

    /// Process one frame and return the estimated target box, `None` if the
    /// target was not found.
    pub fn process(&mut self, image: Arc<GrayImage>) -> Option<Rect> {
        let size = ImageSize::new(image.width, image.height);
        std::mem::swap(&mut self.previous, &mut self.samples);
        let mut samples = match self.sampling_mode {
            SamplingMode::Resampling => self.resampling_sampler.create_samples(
                &mut self.ctx,
                &self.previous,
                size,
                &mut self.rng,
            ),
            SamplingMode::Grid => {
                self.grid_sampler
                    .create_samples(&mut self.ctx, &self.previous, size, &mut self.rng)
            }
        };

        self.static_model.update(Arc::clone(&image));
        self.adaptive_model.update(image);
        let use_adaptive = self.adaptive_evaluation && self.adaptive_model.is_usable();
        self.evaluate(&mut samples, use_adaptive);

        let estimate = self.extractor.extract(&self.ctx, &samples);
        set_motion(&mut samples, self.last_estimate, estimate);
        self.last_estimate = estimate;
        let state_before = self.adaptive_model.state();
        if self.adaptation {
            self.adaptive_model.adapt(&self.ctx, &samples, estimate);
        }
        let adaptive_state = self.adaptive_model.state();
        if adaptive_state != state_before {
            info!(from = %state_before, to = %adaptive_state, "adaptive model state changed");
        }

        self.report = TrackingReport {
            frame: self.report.frame + 1,
            estimate,
            adaptive_state,
            adaptive_evaluation_used: use_adaptive,
            samples: samples.len(),
            targets: samples.iter().filter(|s| s.target).count(),
        };
        debug!(
            frame = self.report.frame,
            estimate = ?estimate,
            targets = self.report.targets,
            adaptive = use_adaptive,
            "frame processed"
        );
        self.samples = samples;
        estimate
    }

    fn evaluate(&mut self, samples: &mut [Sample], use_adaptive: bool) {
        if !use_adaptive {
            self.static_model.evaluate(&self.ctx, samples);
            return;
        }
        match self.blend_policy {
            BlendPolicy::Replace => {
                self.static_model.evaluate(&self.ctx, samples);
                let targets: Vec<bool> = samples.iter().map(|s| s.target).collect();
                self.adaptive_model.evaluate(&self.ctx, samples);
                for (sample, target) in samples.iter_mut().zip(targets) {
                    sample.target = target;
                }
            }
            BlendPolicy::Multiply => {
                self.static_model.evaluate(&self.ctx, samples);
                let static_results: Vec<(f64, bool)> =
                    samples.iter().map(|s| (s.weight, s.target)).collect();
                self.adaptive_model.evaluate(&self.ctx, samples);
                for (sample, (weight, target)) in samples.iter_mut().zip(static_results) {
                    sample.weight *= weight;
                    sample.target &= target;
                }
            }
            BlendPolicy::ToggleOnly => self.adaptive_model.evaluate(&self.ctx, samples),
        }
    }

    /// Drop all samples and everything learned, as after construction.
    pub fn reset(&mut self) {
        self.samples.clear();
        self.previous.clear();
        self.last_estimate = None;
        self.ctx.reset();
        self.adaptive_model.reset();
        self.extractor.reset();
        self.report = TrackingReport::default();
        info!("tracker reset");
    }

    /// Summary of the last processed frame.
    pub fn report(&self) -> &TrackingReport {
        &self.report
    }

    /// Samples of the last processed frame.
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    /// The generation `sample` was resampled from.
    pub fn ancestor_of(&self, sample: &Sample) -> Option<&Sample> {
        sample.ancestor.and_then(|index| self.previous.get(index))
    }

    pub fn context(&self) -> &SampleContext {
        &self.ctx
    }

    pub fn static_model(&self) -> &S {
        &self.static_model
    }

    pub fn adaptive_model(&self) -> &A {
        &self.adaptive_model
    }

    pub fn adaptive_model_mut(&mut self) -> &mut A {
        &mut self.adaptive_model
    }

    pub fn adaptive_state(&self) -> AdaptiveState {
        self.adaptive_model.state()
    }

    /// Runtime tunables of the resampling sampler.
    pub fn resampling_sampler_mut(&mut self) -> &mut ResamplingSampler {
        &mut self.resampling_sampler
    }

    pub fn sampling_mode(&self) -> SamplingMode {
        self.sampling_mode
    }

    /// Switch samplers. Learned state is kept.
    pub fn set_sampling_mode(&mut self, mode: SamplingMode) {
        if mode != self.sampling_mode {
            info!(%mode, "sampler switched");
            self.sampling_mode = mode;
        }
    }

    pub fn blend_policy(&self) -> BlendPolicy {
        self.blend_policy
    }

    pub fn set_blend_policy(&mut self, policy: BlendPolicy) {
        self.blend_policy = policy;
    }

    pub fn is_adaptive_evaluation_enabled(&self) -> bool {
        self.adaptive_evaluation
    }

    /// Whether a usable adaptive model weighs samples. Learning continues
    /// either way.
    pub fn set_adaptive_evaluation(&mut self, enabled: bool) {
        self.adaptive_evaluation = enabled;
    }

    pub fn is_adaptation_enabled(&self) -> bool {
        self.adaptation
    }

    /// Whether the adaptive model keeps learning.
    pub fn set_adaptation(&mut self, enabled: bool) {
        self.adaptation = enabled;
    }
}

/// Give every sample the motion of the estimate between the last two frames,
/// so resampled children carry it into the next prediction. Without two
/// consecutive estimates the motion is zero.
fn set_motion(samples: &mut [Sample], previous: Option<Rect>, current: Option<Rect>) {
    let (vx, vy, vsize) = match (previous, current) {
        (Some(previous), Some(current)) if previous.width > 0.0 => {
            let shift = current.center() - previous.center();
            (
                shift.x.round() as i32,
                shift.y.round() as i32,
                (current.width / previous.width) as f64,
            )
        }
        _ => (0, 0, 1.0),
    };
    for sample in samples {
        sample.vx = vx;
        sample.vy = vy;
        sample.vsize = vsize;
    }
}
