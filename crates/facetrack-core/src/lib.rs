//! FaceTrack Core - Foundation types for particle-filter face tracking
//!
//! This crate provides the fundamental types shared by the classifier and
//! tracker crates:
//! - Particles (`Sample`) and the per-tracker `SampleContext`
//! - Grayscale images and image sources
//! - Feature patches and the feature extractor boundary
//! - Classifier capability traits
//! - Geometric primitives

pub mod classifier;
pub mod error;
pub mod geometry;
pub mod image;
pub mod patch;
pub mod sample;

pub use classifier::{ProbabilisticClassifier, TrainableProbabilisticClassifier};
pub use error::{Result, TrackError};
pub use geometry::{Rect, Vec2};
pub use image::{GrayImage, ImageSource};
pub use patch::{DirectPatchExtractor, FeatureExtractor, FeatureVector, Patch, PatchKey};
pub use sample::{Sample, SampleContext};
