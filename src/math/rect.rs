//! Horizontal (XY) rectangle and exact rectangle/triangle overlap

use crate::core::types::Vec2;

/// Axis-aligned rectangle in the XY plane, inclusive on all edges
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Rect {
    pub min: Vec2,
    pub max: Vec2,
}

impl Rect {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self { min, max }
    }

    /// Square of half-size `range` centered on (x, y)
    pub fn around(x: f32, y: f32, range: f32) -> Self {
        Self {
            min: Vec2::new(x - range, y - range),
            max: Vec2::new(x + range, y + range),
        }
    }

    /// Bounding rectangle of a set of points; `points` must not be empty
    pub fn enclosing(points: &[Vec2]) -> Self {
        let mut rect = Self::new(points[0], points[0]);
        for &p in &points[1..] {
            rect.min = rect.min.min(p);
            rect.max = rect.max.max(p);
        }
        rect
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn half_extent(&self) -> Vec2 {
        (self.max - self.min) * 0.5
    }

    pub fn intersects(&self, other: &Rect) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y
    }

    /// Exact overlap test against a triangle's XY projection (separating axes).
    pub fn overlaps_triangle(&self, a: Vec2, b: Vec2, c: Vec2) -> bool {
        if !self.intersects(&Rect::enclosing(&[a, b, c])) {
            return false;
        }

        let center = self.center();
        let half = self.half_extent();
        for (p, q) in [(a, b), (b, c), (c, a)] {
            let edge = q - p;
            let axis = Vec2::new(-edge.y, edge.x);
            let projections = [a.dot(axis), b.dot(axis), c.dot(axis)];
            let tri_min = projections.iter().copied().fold(f32::INFINITY, f32::min);
            let tri_max = projections.iter().copied().fold(f32::NEG_INFINITY, f32::max);

            let rect_center = center.dot(axis);
            let rect_radius = half.x * axis.x.abs() + half.y * axis.y.abs();
            if tri_max < rect_center - rect_radius || tri_min > rect_center + rect_radius {
                return false;
            }
        }
        true
    }
}
