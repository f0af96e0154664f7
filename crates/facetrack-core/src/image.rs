//! Grayscale frames and the image source boundary.

use std::sync::Arc;

/// A grayscale image stored as f32 values [0, 1].
#[derive(Debug, Clone, PartialEq)]
pub struct GrayImage {
    pub data: Vec<f32>,
    pub width: u32,
    pub height: u32,
}

impl GrayImage {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            data: vec![0.0; (width * height) as usize],
            width,
            height,
        }
    }

    /// Build an image from 8-bit luminance values.
    pub fn from_luma8(luma: &[u8], width: u32, height: u32) -> Option<Self> {
        if luma.len() != (width * height) as usize {
            return None;
        }
        Some(Self {
            data: luma.iter().map(|&v| v as f32 / 255.0).collect(),
            width,
            height,
        })
    }

    /// Pixel value with coordinates clamped to the border.
    #[inline]
    pub fn get(&self, x: i32, y: i32) -> f32 {
        let x = x.clamp(0, self.width as i32 - 1) as u32;
        let y = y.clamp(0, self.height as i32 - 1) as u32;
        self.data[(y * self.width + x) as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, y: u32, val: f32) {
        if x < self.width && y < self.height {
            self.data[(y * self.width + x) as usize] = val;
        }
    }

    /// Paint an axis-aligned block, clipped to the image.
    pub fn fill_rect(&mut self, left: i32, top: i32, width: u32, height: u32, val: f32) {
        for y in top.max(0)..(top + height as i32).min(self.height as i32) {
            for x in left.max(0)..(left + width as i32).min(self.width as i32) {
                self.set(x as u32, y as u32, val);
            }
        }
    }

    /// Bilinear interpolation at a sub-pixel position.
    pub fn sample_bilinear(&self, x: f32, y: f32) -> f32 {
        let x0 = x.floor();
        let y0 = y.floor();
        let fx = x - x0;
        let fy = y - y0;
        let (x0, y0) = (x0 as i32, y0 as i32);
        let top = self.get(x0, y0) * (1.0 - fx) + self.get(x0 + 1, y0) * fx;
        let bottom = self.get(x0, y0 + 1) * (1.0 - fx) + self.get(x0 + 1, y0 + 1) * fx;
        top * (1.0 - fy) + bottom * fy
    }

    /// Whether the block `[left, left + width) x [top, top + height)` is fully inside.
    pub fn contains_region(&self, left: i32, top: i32, width: i32, height: i32) -> bool {
        left >= 0
            && top >= 0
            && width > 0
            && height > 0
            && left + width <= self.width as i32
            && top + height <= self.height as i32
    }
}

/// A source of consecutive frames with stable dimensions.
pub trait ImageSource {
    /// Advance to the next frame. Returns `false` once the source is exhausted.
    fn next(&mut self) -> bool;

    /// The current frame. Only meaningful after `next` returned `true`.
    fn image(&self) -> Arc<GrayImage>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gray_image() {
        let mut img = GrayImage::new(4, 4);
        img.set(2, 3, 0.75);
        assert!((img.get(2, 3) - 0.75).abs() < 0.001);
        let _ = img.get(-1, -1);
        let _ = img.get(100, 100);
    }

    #[test]
    fn test_from_luma8() {
        let img = GrayImage::from_luma8(&[0, 255, 255, 0], 2, 2).unwrap();
        assert!((img.get(1, 0) - 1.0).abs() < 1e-6);
        assert!(GrayImage::from_luma8(&[0, 1, 2], 2, 2).is_none());
    }

    #[test]
    fn test_fill_rect_clips() {
        let mut img = GrayImage::new(10, 10);
        img.fill_rect(8, 8, 5, 5, 1.0);
        assert_eq!(img.get(9, 9), 1.0);
        assert_eq!(img.get(7, 7), 0.0);
        assert_eq!(img.data.iter().filter(|&&v| v == 1.0).count(), 4);
    }

    #[test]
    fn test_bilinear_midpoint() {
        let mut img = GrayImage::new(2, 1);
        img.set(1, 0, 1.0);
        assert!((img.sample_bilinear(0.5, 0.0) - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_contains_region() {
        let img = GrayImage::new(100, 100);
        assert!(img.contains_region(0, 0, 100, 100));
        assert!(!img.contains_region(-1, 0, 10, 10));
        assert!(!img.contains_region(95, 95, 10, 10));
        assert!(!img.contains_region(10, 10, 0, 10));
    }
}
