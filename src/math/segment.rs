//! Line segment and segment/triangle intersection

use crate::core::types::Vec3;
use super::rect::Rect;

/// Tolerance on barycentric coordinates so probes through a shared edge hit one side
const BARY_EPSILON: f32 = 1e-4;

/// A finite segment from `start` to `end`
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Segment {
    pub start: Vec3,
    pub end: Vec3,
}

impl Segment {
    pub fn new(start: Vec3, end: Vec3) -> Self {
        Self { start, end }
    }

    /// Vertical segment at (x, y) running from `z_top` down to `z_bottom`
    pub fn vertical(x: f32, y: f32, z_top: f32, z_bottom: f32) -> Self {
        Self::new(Vec3::new(x, y, z_top), Vec3::new(x, y, z_bottom))
    }

    /// Point at parameter t (0 = start, 1 = end)
    pub fn at(&self, t: f32) -> Vec3 {
        self.start + (self.end - self.start) * t
    }

    /// XY footprint of the segment, grown by `margin`
    pub fn bounds_2d(&self, margin: f32) -> Rect {
        let mut rect = Rect::enclosing(&[self.start.truncate(), self.end.truncate()]);
        rect.min -= margin;
        rect.max += margin;
        rect
    }

    /// Möller-Trumbore intersection.
    ///
    /// Returns the segment parameter `t` in [0, 1] of the hit, or `None`.
    /// Triangles parallel to the segment never hit.
    pub fn intersect_triangle(&self, v0: Vec3, v1: Vec3, v2: Vec3) -> Option<f32> {
        let dir = self.end - self.start;
        let e1 = v1 - v0;
        let e2 = v2 - v0;

        let p = dir.cross(e2);
        let det = e1.dot(p);
        if det.abs() < 1e-9 {
            return None;
        }
        let inv_det = 1.0 / det;

        let s = self.start - v0;
        let u = s.dot(p) * inv_det;
        if !(-BARY_EPSILON..=1.0 + BARY_EPSILON).contains(&u) {
            return None;
        }

        let q = s.cross(e1);
        let v = dir.dot(q) * inv_det;
        if v < -BARY_EPSILON || u + v > 1.0 + BARY_EPSILON {
            return None;
        }

        let t = e2.dot(q) * inv_det;
        if (0.0..=1.0).contains(&t) {
            Some(t)
        } else {
            None
        }
    }
}
