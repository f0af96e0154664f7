//! FaceTrack - adaptive particle-filter face tracker
//!
//! Runs the tracker described by a JSON configuration over a synthetic image
//! sequence and logs the estimate of every frame.
//!
//! Usage: facetrack [OPTIONS] [CONFIG] [FRAMES]
//!
//! Options override the configuration file:
//!   --sampler <resampling|grid>
//!   --blend <replace|multiply|toggle_only>
//!   --aggregation <weighted_mean|max_weight>
//!   --kernel <linear|poly|rbf>

mod source;

use anyhow::{bail, Context, Result};
use facetrack_classification::Kernel;
use facetrack_condensation::{Aggregation, BlendPolicy, SamplingMode, TrackerConfig};
use facetrack_core::ImageSource;
use source::BouncingSquare;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

fn main() -> Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    let args = Args::parse(std::env::args().skip(1))?;
    info!(config = %args.config.display(), frames = args.frames, "FaceTrack starting");

    let mut config = TrackerConfig::load(&args.config)
        .with_context(|| format!("failed to load {}", args.config.display()))?;
    args.apply(&mut config);
    let base_dir = args.config.parent().unwrap_or_else(|| Path::new("."));
    let mut tracker = config
        .build(base_dir)
        .with_context(|| format!("failed to build tracker from {}", args.config.display()))?;

    let mut source = BouncingSquare::new(160, 120, 32, args.frames, 42);
    let mut found = 0;
    let mut overlap_sum = 0.0;
    while source.next() {
        let estimate = tracker.process(source.image());
        let report = tracker.report();
        match estimate {
            Some(rect) => {
                let overlap = rect.overlap(source.ground_truth());
                found += 1;
                overlap_sum += overlap;
                info!(
                    frame = report.frame,
                    x = rect.x,
                    y = rect.y,
                    width = rect.width,
                    height = rect.height,
                    overlap,
                    adaptive = %report.adaptive_state,
                    "target"
                );
            }
            None => warn!(frame = report.frame, "target lost"),
        }
    }

    let mean_overlap = if found > 0 {
        overlap_sum / found as f32
    } else {
        0.0
    };
    info!(
        frames = source.frames(),
        found,
        mean_overlap,
        adaptive = %tracker.adaptive_state(),
        "finished"
    );
    Ok(())
}

/// Command-line arguments.
#[derive(Debug, Default, PartialEq)]
struct Args {
    config: PathBuf,
    frames: usize,
    sampler: Option<SamplingMode>,
    blend: Option<BlendPolicy>,
    aggregation: Option<Aggregation>,
    kernel: Option<Kernel>,
}

impl Args {
    fn parse(args: impl IntoIterator<Item = String>) -> Result<Self> {
        let mut parsed = Args {
            config: PathBuf::from("demos/config.json"),
            frames: 100,
            ..Default::default()
        };
        let mut positional = Vec::new();
        let mut args = args.into_iter();
        while let Some(arg) = args.next() {
            if !arg.starts_with("--") {
                positional.push(arg);
                continue;
            }
            let Some(value) = args.next() else {
                bail!("missing value for {arg}");
            };
            match arg.as_str() {
                "--sampler" => parsed.sampler = Some(value.parse()?),
                "--blend" => parsed.blend = Some(value.parse()?),
                "--aggregation" => parsed.aggregation = Some(value.parse()?),
                "--kernel" => parsed.kernel = Some(value.parse()?),
                other => bail!("unknown option {other}"),
            }
        }
        let mut positional = positional.into_iter();
        if let Some(config) = positional.next() {
            parsed.config = PathBuf::from(config);
        }
        if let Some(frames) = positional.next() {
            parsed.frames = frames
                .parse()
                .with_context(|| format!("invalid frame count {frames:?}"))?;
        }
        if let Some(extra) = positional.next() {
            bail!("unexpected argument {extra:?}");
        }
        Ok(parsed)
    }

    /// Override the loaded configuration with the given options.
    fn apply(&self, config: &mut TrackerConfig) {
        if let Some(mode) = self.sampler {
            config.sampler.mode = mode;
        }
        if let Some(policy) = self.blend {
            config.blend_policy = policy;
        }
        if let Some(aggregation) = self.aggregation {
            config.state_extractor.aggregation = aggregation;
        }
        if let Some(kernel) = self.kernel {
            config.adaptive_model.classifier.kernel = kernel;
        }
    }
}
