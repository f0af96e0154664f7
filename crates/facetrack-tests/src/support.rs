//! Synthetic scenes and classifier stubs shared by the integration tests.

use facetrack_classification::{
    ExampleManagementConfig, Kernel, SmoTrainer, TrainableSvmClassifier, TrainableSvmConfig,
};
use facetrack_condensation::{TrackerConfig, WvmSvmModel};
use facetrack_core::{
    FeatureExtractor, GrayImage, Patch, PatchKey, ProbabilisticClassifier, Rect, Sample,
};
use std::sync::Arc;

/// Cells per side of a context patch.
const GRID: usize = 8;

/// The 100x100 scene: a 20x20 bright square at (40, 40) on black.
pub const SQUARE: Rect = Rect::new(40.0, 40.0, 20.0, 20.0);

pub fn square_scene() -> Arc<GrayImage> {
    let mut image = GrayImage::new(100, 100);
    image.fill_rect(40, 40, 20, 20, 1.0);
    Arc::new(image)
}

pub fn empty_scene() -> Arc<GrayImage> {
    Arc::new(GrayImage::new(100, 100))
}

pub fn distance_to_square(rect: Rect) -> f32 {
    (rect.center() - SQUARE.center()).length()
}

/// Samples the region together with a margin of half its size on every side,
/// so the middle `GRID / 2` cells cover the region and the rest its context.
#[derive(Default)]
pub struct ContextExtractor {
    image: Option<Arc<GrayImage>>,
}

impl ContextExtractor {
    pub fn new() -> Self {
        Self { image: None }
    }
}

impl FeatureExtractor for ContextExtractor {
    fn update(&mut self, image: Arc<GrayImage>) {
        self.image = Some(image);
    }

    fn extract(&mut self, x: i32, y: i32, width: i32, height: i32) -> Option<Arc<Patch>> {
        let image = self.image.as_ref()?;
        let key = PatchKey::centered(x, y, width, height);
        if !image.contains_region(key.left, key.top, key.width, key.height) {
            return None;
        }
        let left = key.left as f32 - width as f32 / 2.0;
        let top = key.top as f32 - height as f32 / 2.0;
        let cell_w = 2.0 * width as f32 / GRID as f32;
        let cell_h = 2.0 * height as f32 / GRID as f32;
        let mut features = Vec::with_capacity(GRID * GRID);
        for row in 0..GRID {
            for col in 0..GRID {
                let px = left + (col as f32 + 0.5) * cell_w - 0.5;
                let py = top + (row as f32 + 0.5) * cell_h - 0.5;
                features.push(image.sample_bilinear(px, py));
            }
        }
        Some(Arc::new(Patch::new(key, features)))
    }
}

/// Bright inside, dark around: `mean(inner) * (1 - mean(context))`.
///
/// Peaks for regions that match the bright square exactly.
pub struct SquareStub;

impl ProbabilisticClassifier for SquareStub {
    fn probability(&self, features: &[f32]) -> (bool, f64) {
        let (mut inner, mut outer) = (0.0f64, 0.0f64);
        let (mut n_inner, mut n_outer) = (0usize, 0usize);
        let quarter = GRID / 4;
        for (i, &value) in features.iter().enumerate() {
            let (row, col) = (i / GRID, i % GRID);
            let central = (quarter..GRID - quarter).contains(&row)
                && (quarter..GRID - quarter).contains(&col);
            if central {
                inner += value as f64;
                n_inner += 1;
            } else {
                outer += value as f64;
                n_outer += 1;
            }
        }
        let p = (inner / n_inner as f64) * (1.0 - outer / n_outer as f64);
        (p > 0.5, p)
    }
}

/// Lets everything through the first cascade stage at full probability.
pub struct PassThrough;

impl ProbabilisticClassifier for PassThrough {
    fn probability(&self, _features: &[f32]) -> (bool, f64) {
        (true, 1.0)
    }
}

pub fn static_model() -> WvmSvmModel {
    WvmSvmModel::new(
        Box::new(ContextExtractor::new()),
        Box::new(PassThrough),
        Box::new(SquareStub),
        0.01,
    )
    .unwrap()
}

pub fn trainable_config() -> TrainableSvmConfig {
    TrainableSvmConfig {
        kernel: Kernel::Rbf { gamma: 0.1 },
        trainer: SmoTrainer {
            constraint: 10.0,
            ..Default::default()
        },
        threshold: 0.0,
        positive_examples: ExampleManagementConfig::AgeBased {
            capacity: 20,
            required_size: 3,
        },
        negative_examples: ExampleManagementConfig::AgeBased {
            capacity: 40,
            required_size: 5,
        },
    }
}

pub fn trainable_classifier() -> Box<TrainableSvmClassifier> {
    Box::new(TrainableSvmClassifier::new(&trainable_config()).unwrap())
}

pub fn tracker_config(seed: u64) -> TrackerConfig {
    let mut config = TrackerConfig {
        seed: Some(seed),
        ..Default::default()
    };
    config.sampler.count = 400;
    config.sampler.random_rate = 0.3;
    config.sampler.min_size = 10;
    config.sampler.max_size = 40;
    config
}

/// One sample sitting exactly on the square and one on the background.
pub fn on_and_off_target() -> [Sample; 2] {
    [Sample::new(50, 50, 20, 0), Sample::new(20, 75, 20, 1)]
}
