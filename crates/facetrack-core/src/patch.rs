//! Feature patches and the feature extractor boundary.

use crate::error::{Result, TrackError};
use crate::image::GrayImage;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Feature vector of a patch, shared between caches and training sets.
pub type FeatureVector = Arc<[f32]>;

/// Identity of an extracted patch: the image region it was cut from.
///
/// Two samples that map onto the same region share one patch, which is what
/// lets the measurement models evaluate each region once per frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatchKey {
    pub left: i32,
    pub top: i32,
    pub width: i32,
    pub height: i32,
}

impl PatchKey {
    /// Region of the given size centered at `(x, y)`.
    pub fn centered(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self {
            left: x - width / 2,
            top: y - height / 2,
            width,
            height,
        }
    }

    pub fn center_x(&self) -> i32 {
        self.left + self.width / 2
    }

    pub fn center_y(&self) -> i32 {
        self.top + self.height / 2
    }
}

/// An image region together with its feature vector.
#[derive(Debug, Clone)]
pub struct Patch {
    pub key: PatchKey,
    pub features: FeatureVector,
}

impl Patch {
    pub fn new(key: PatchKey, features: impl Into<FeatureVector>) -> Self {
        Self {
            key,
            features: features.into(),
        }
    }
}

/// Turns image regions into feature vectors.
pub trait FeatureExtractor {
    /// Switch to a new frame, invalidating everything extracted before.
    fn update(&mut self, image: Arc<GrayImage>);

    /// Extract the patch centered at `(x, y)`, or `None` if the region does not
    /// fit into the current frame.
    fn extract(&mut self, x: i32, y: i32, width: i32, height: i32) -> Option<Arc<Patch>>;
}

/// Extractor that crops a region and resamples it to a fixed patch size.
///
/// Patches are cached per frame so repeated requests for the same region
/// return the same `Arc`.
#[derive(Debug)]
pub struct DirectPatchExtractor {
    patch_width: u32,
    patch_height: u32,
    image: Option<Arc<GrayImage>>,
    cache: HashMap<PatchKey, Arc<Patch>>,
}

impl DirectPatchExtractor {
    pub fn new(patch_width: u32, patch_height: u32) -> Result<Self> {
        if patch_width == 0 || patch_height == 0 {
            return Err(TrackError::InvalidParameter(
                "patch dimensions must be positive".into(),
            ));
        }
        Ok(Self {
            patch_width,
            patch_height,
            image: None,
            cache: HashMap::new(),
        })
    }

    /// Length of the produced feature vectors.
    pub fn dimensions(&self) -> usize {
        (self.patch_width * self.patch_height) as usize
    }

    pub fn cached_patches(&self) -> usize {
        self.cache.len()
    }

    fn resample(&self, image: &GrayImage, key: PatchKey) -> Vec<f32> {
        let sx = key.width as f32 / self.patch_width as f32;
        let sy = key.height as f32 / self.patch_height as f32;
        let mut features = Vec::with_capacity(self.dimensions());
        for py in 0..self.patch_height {
            for px in 0..self.patch_width {
                let x = key.left as f32 + (px as f32 + 0.5) * sx - 0.5;
                let y = key.top as f32 + (py as f32 + 0.5) * sy - 0.5;
                features.push(image.sample_bilinear(x, y));
            }
        }
        features
    }
}

impl FeatureExtractor for DirectPatchExtractor {
    fn update(&mut self, image: Arc<GrayImage>) {
        self.cache.clear();
        self.image = Some(image);
    }

    fn extract(&mut self, x: i32, y: i32, width: i32, height: i32) -> Option<Arc<Patch>> {
        let image = self.image.clone()?;
        let key = PatchKey::centered(x, y, width, height);
        if !image.contains_region(key.left, key.top, key.width, key.height) {
            return None;
        }
        if let Some(patch) = self.cache.get(&key) {
            return Some(Arc::clone(patch));
        }
        let patch = Arc::new(Patch::new(key, self.resample(&image, key)));
        self.cache.insert(key, Arc::clone(&patch));
        Some(patch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_image() -> Arc<GrayImage> {
        let mut img = GrayImage::new(100, 100);
        img.fill_rect(40, 40, 20, 20, 1.0);
        Arc::new(img)
    }

    #[test]
    fn test_extract_inside_square() {
        let mut ex = DirectPatchExtractor::new(10, 10).unwrap();
        ex.update(square_image());
        let patch = ex.extract(50, 50, 20, 20).unwrap();
        assert_eq!(patch.features.len(), 100);
        assert!(patch.features.iter().all(|&v| (v - 1.0).abs() < 1e-6));
        assert_eq!(patch.key.center_x(), 50);
    }

    #[test]
    fn test_extract_outside_image() {
        let mut ex = DirectPatchExtractor::new(10, 10).unwrap();
        ex.update(square_image());
        assert!(ex.extract(5, 50, 20, 20).is_none());
        assert!(ex.extract(50, 50, 0, 0).is_none());
    }

    #[test]
    fn test_same_region_shares_patch() {
        let mut ex = DirectPatchExtractor::new(8, 8).unwrap();
        ex.update(square_image());
        let a = ex.extract(30, 30, 16, 16).unwrap();
        let b = ex.extract(30, 30, 16, 16).unwrap();
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(ex.cached_patches(), 1);
        ex.update(square_image());
        assert_eq!(ex.cached_patches(), 0);
    }

    #[test]
    fn test_no_image_yields_none() {
        let mut ex = DirectPatchExtractor::new(4, 4).unwrap();
        assert!(ex.extract(10, 10, 4, 4).is_none());
    }
}
