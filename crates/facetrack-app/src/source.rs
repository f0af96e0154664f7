//! Synthetic frames for running the tracker without a camera.

use facetrack_core::{GrayImage, ImageSource, Rect};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

/// A bright square bouncing over a noisy dark background.
pub struct BouncingSquare {
    width: u32,
    height: u32,
    size: u32,
    position: (f32, f32),
    velocity: (f32, f32),
    noise: f32,
    frames: usize,
    remaining: usize,
    rng: StdRng,
    image: Arc<GrayImage>,
}

impl BouncingSquare {
    pub fn new(width: u32, height: u32, size: u32, frames: usize, seed: u64) -> Self {
        Self {
            width,
            height,
            size,
            position: ((width - size) as f32 / 2.0, (height - size) as f32 / 2.0),
            velocity: (2.0, 1.0),
            noise: 0.1,
            frames,
            remaining: frames,
            rng: StdRng::seed_from_u64(seed),
            image: Arc::new(GrayImage::new(width, height)),
        }
    }

    /// Where the square is in the current frame.
    pub fn ground_truth(&self) -> Rect {
        Rect::new(
            self.position.0.round(),
            self.position.1.round(),
            self.size as f32,
            self.size as f32,
        )
    }

    pub fn frames(&self) -> usize {
        self.frames
    }

    fn advance(&mut self) {
        let max_x = (self.width - self.size) as f32;
        let max_y = (self.height - self.size) as f32;
        let (mut x, mut y) = self.position;
        x += self.velocity.0;
        y += self.velocity.1;
        if x < 0.0 || x > max_x {
            self.velocity.0 = -self.velocity.0;
            x = x.clamp(0.0, max_x);
        }
        if y < 0.0 || y > max_y {
            self.velocity.1 = -self.velocity.1;
            y = y.clamp(0.0, max_y);
        }
        self.position = (x, y);
    }

    fn render(&mut self) -> GrayImage {
        let mut image = GrayImage::new(self.width, self.height);
        for value in &mut image.data {
            *value = self.rng.random::<f32>() * self.noise;
        }
        let square = self.ground_truth();
        image.fill_rect(square.x as i32, square.y as i32, self.size, self.size, 0.9);
        image
    }
}

impl ImageSource for BouncingSquare {
    fn next(&mut self) -> bool {
        if self.remaining == 0 {
            return false;
        }
        if self.remaining < self.frames {
            self.advance();
        }
        self.remaining -= 1;
        self.image = Arc::new(self.render());
        true
    }

    fn image(&self) -> Arc<GrayImage> {
        Arc::clone(&self.image)
    }
}
