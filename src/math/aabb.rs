//! Axis-aligned bounding box

use crate::core::types::Vec3;

/// Axis-aligned bounding box defined by min and max corners (inclusive)
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Create AABB from min and max corners
    pub fn new(min: Vec3, max: Vec3) -> Self {
        Self { min, max }
    }

    /// Bounds of a horizontal column: finite in x/y, unbounded in z
    pub fn column(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self::new(
            Vec3::new(min_x, min_y, f32::MIN),
            Vec3::new(max_x, max_y, f32::MAX),
        )
    }

    /// True when every point lies beyond the same face of the box.
    ///
    /// A triangle passing this test cannot touch the box; a triangle failing it
    /// may still miss it, which is fine for coarse rejection.
    pub fn all_outside(&self, points: &[Vec3]) -> bool {
        points.iter().all(|p| p.x < self.min.x) || points.iter().all(|p| p.x > self.max.x) ||
        points.iter().all(|p| p.y < self.min.y) || points.iter().all(|p| p.y > self.max.y) ||
        points.iter().all(|p| p.z < self.min.z) || points.iter().all(|p| p.z > self.max.z)
    }
}
