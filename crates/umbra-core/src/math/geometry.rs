// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Axis-aligned rectangles.

use super::Vec2;
use serde::{Deserialize, Serialize};

/// An axis-aligned rectangle defined by its minimum and maximum corners.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    /// Top-left corner (y-down).
    pub min: Vec2,
    /// Bottom-right corner (y-down).
    pub max: Vec2,
}

impl Rect {
    /// Creates a rectangle from two corners. The corners are normalized.
    #[inline]
    pub fn new(a: Vec2, b: Vec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Creates a rectangle centered on `center` with the given full size.
    #[inline]
    pub fn from_center_size(center: Vec2, size: Vec2) -> Self {
        let half = size * 0.5;
        Self::new(center - half, center + half)
    }

    /// Creates a square rectangle around a circle.
    #[inline]
    pub fn from_circle(center: Vec2, radius: f32) -> Self {
        Self::from_center_size(center, Vec2::splat(radius * 2.0))
    }

    /// Bounds of a set of points. Returns the default rect for an empty slice.
    pub fn from_points(points: &[Vec2]) -> Self {
        let Some(first) = points.first() else {
            return Self::default();
        };
        let (min, max) = points
            .iter()
            .skip(1)
            .fold((*first, *first), |(min, max), p| (min.min(*p), max.max(*p)));
        Self { min, max }
    }

    /// Width of the rectangle.
    #[inline]
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    /// Height of the rectangle.
    #[inline]
    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    /// Full size as a vector.
    #[inline]
    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    /// Center point.
    #[inline]
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// The four corners in clockwise order starting at `min` (y-down).
    #[inline]
    pub fn corners(&self) -> [Vec2; 4] {
        [
            self.min,
            Vec2::new(self.max.x, self.min.y),
            self.max,
            Vec2::new(self.min.x, self.max.y),
        ]
    }

    /// Returns `true` if the point lies inside or on the border.
    #[inline]
    pub fn contains(&self, p: Vec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    /// Returns `true` if the two rectangles overlap with a non-empty area.
    #[inline]
    pub fn intersects(&self, other: &Rect) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
    }

    /// Grows every side by `amount`.
    #[inline]
    pub fn expand(&self, amount: f32) -> Self {
        Self {
            min: self.min - Vec2::splat(amount),
            max: self.max + Vec2::splat(amount),
        }
    }

    /// Scales the rectangle by `factor` about its own center.
    #[inline]
    pub fn scale_about_center(&self, factor: f32) -> Self {
        Self::from_center_size(self.center(), self.size() * factor)
    }

    /// Smallest rectangle containing both.
    #[inline]
    pub fn union(&self, other: &Rect) -> Self {
        Self {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersects_excludes_touching_edges() {
        let a = Rect::new(Vec2::ZERO, Vec2::new(10.0, 10.0));
        let b = Rect::new(Vec2::new(10.0, 0.0), Vec2::new(20.0, 10.0));
        let c = Rect::new(Vec2::new(9.0, 9.0), Vec2::new(20.0, 20.0));
        assert!(!a.intersects(&b));
        assert!(a.intersects(&c));
    }

    #[test]
    fn new_normalizes_corners() {
        let r = Rect::new(Vec2::new(5.0, 1.0), Vec2::new(1.0, 5.0));
        assert_eq!(r.min, Vec2::new(1.0, 1.0));
        assert_eq!(r.max, Vec2::new(5.0, 5.0));
    }

    #[test]
    fn scale_about_center_keeps_center() {
        let r = Rect::new(Vec2::ZERO, Vec2::new(4.0, 2.0));
        let s = r.scale_about_center(2.0);
        assert_eq!(s.center(), r.center());
        assert_eq!(s.size(), Vec2::new(8.0, 4.0));
    }

    #[test]
    fn from_points_bounds() {
        let r = Rect::from_points(&[Vec2::new(3.0, -1.0), Vec2::new(-2.0, 4.0), Vec2::ZERO]);
        assert_eq!(r, Rect::new(Vec2::new(-2.0, -1.0), Vec2::new(3.0, 4.0)));
    }
}
