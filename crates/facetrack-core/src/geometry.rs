//! Geometric primitives for bounding regions.

use glam::Vec2 as GlamVec2;
use serde::{Deserialize, Serialize};

/// 2D vector.
pub type Vec2 = GlamVec2;

/// Axis-aligned rectangle in pixel coordinates (top-left origin).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    /// Create a new rectangle.
    #[inline]
    pub const fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    /// Create a rectangle from center and size.
    pub fn from_center_size(center: Vec2, size: Vec2) -> Self {
        Self {
            x: center.x - size.x * 0.5,
            y: center.y - size.y * 0.5,
            width: size.x,
            height: size.y,
        }
    }

    /// Center point.
    #[inline]
    pub fn center(self) -> Vec2 {
        Vec2::new(self.x + self.width * 0.5, self.y + self.height * 0.5)
    }

    /// Size as a vector.
    #[inline]
    pub fn size(self) -> Vec2 {
        Vec2::new(self.width, self.height)
    }

    #[inline]
    pub fn area(self) -> f32 {
        self.width * self.height
    }

    /// Check whether `other` lies completely inside this rectangle.
    pub fn contains_rect(self, other: Self) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.x + other.width <= self.x + self.width
            && other.y + other.height <= self.y + self.height
    }

    /// Overlapping region, `None` if the rectangles are disjoint.
    pub fn intersection(self, other: Self) -> Option<Self> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = (self.x + self.width).min(other.x + other.width);
        let y2 = (self.y + self.height).min(other.y + other.height);

        if x1 < x2 && y1 < y2 {
            Some(Self::new(x1, y1, x2 - x1, y2 - y1))
        } else {
            None
        }
    }

    /// Intersection over union, 0 for disjoint rectangles.
    pub fn overlap(self, other: Self) -> f32 {
        match self.intersection(other) {
            Some(inter) => {
                let inter_area = inter.area();
                inter_area / (self.area() + other.area() - inter_area)
            }
            None => 0.0,
        }
    }

    /// Linear interpolation towards `other`; `alpha = 1` yields `other`.
    pub fn lerp(self, other: Self, alpha: f32) -> Self {
        Self::new(
            self.x + (other.x - self.x) * alpha,
            self.y + (other.y - self.y) * alpha,
            self.width + (other.width - self.width) * alpha,
            self.height + (other.height - self.height) * alpha,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rect_contains_rect() {
        let r = Rect::new(10.0, 10.0, 20.0, 20.0);
        assert!(r.contains_rect(r));
        assert!(r.contains_rect(Rect::new(12.0, 12.0, 5.0, 5.0)));
        assert!(!r.contains_rect(Rect::new(25.0, 25.0, 10.0, 10.0)));
    }

    #[test]
    fn test_rect_intersection() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(5.0, 5.0, 10.0, 10.0);
        let i = a.intersection(b).unwrap();
        assert_eq!(i, Rect::new(5.0, 5.0, 5.0, 5.0));
        assert!(a.intersection(Rect::new(20.0, 20.0, 1.0, 1.0)).is_none());
    }

    #[test]
    fn test_rect_overlap() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        assert!((a.overlap(a) - 1.0).abs() < 1e-6);
        let b = Rect::new(5.0, 0.0, 10.0, 10.0);
        assert!((a.overlap(b) - 50.0 / 150.0).abs() < 1e-6);
        assert_eq!(a.overlap(Rect::new(50.0, 50.0, 5.0, 5.0)), 0.0);
    }

    #[test]
    fn test_center_round_trip() {
        let r = Rect::from_center_size(Vec2::new(50.0, 40.0), Vec2::new(20.0, 10.0));
        assert_eq!(r.x, 40.0);
        assert_eq!(r.y, 35.0);
        assert_eq!(r.center(), Vec2::new(50.0, 40.0));
    }
}
