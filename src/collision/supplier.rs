//! Source of raw world triangles

use crate::core::types::{Vec2, Vec3};
use crate::math::Rect;
use super::triangle_store::TriangleType;

/// A triangle as handed over by a supplier
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SuppliedTriangle {
    pub vertices: [Vec3; 3],
    pub kind: TriangleType,
}

impl SuppliedTriangle {
    pub fn new(a: Vec3, b: Vec3, c: Vec3, kind: TriangleType) -> Self {
        Self { vertices: [a, b, c], kind }
    }
}

/// Produces the triangles of a rectangular world region.
///
/// Must be deterministic for a given region. Returning nothing is valid and
/// makes the whole region unstandable.
pub trait TriangleSupplier {
    fn get_triangles(&mut self, min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Vec<SuppliedTriangle>;
}

impl<S: TriangleSupplier + ?Sized> TriangleSupplier for Box<S> {
    fn get_triangles(&mut self, min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Vec<SuppliedTriangle> {
        (**self).get_triangles(min_x, min_y, max_x, max_y)
    }
}

/// In-memory triangle soup.
///
/// Serves every held triangle whose XY bounds overlap the requested region.
/// Handy for callers that already decoded their geometry, and for tests.
#[derive(Clone, Debug, Default)]
pub struct MeshSupplier {
    triangles: Vec<SuppliedTriangle>,
    /// Number of `get_triangles` calls served
    requests: usize,
}

impl MeshSupplier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, triangle: SuppliedTriangle) {
        self.triangles.push(triangle);
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn requests(&self) -> usize {
        self.requests
    }

    /// Add a quad split into two triangles (corners in winding order)
    pub fn add_quad(&mut self, corners: [Vec3; 4], kind: TriangleType) {
        let [a, b, c, d] = corners;
        self.push(SuppliedTriangle::new(a, b, c, kind));
        self.push(SuppliedTriangle::new(a, c, d, kind));
    }

    /// Horizontal ground sheet at height `z` tessellated into `spacing` sized quads
    pub fn add_flat_ground(&mut self, min: Vec2, max: Vec2, z: f32, spacing: f32, kind: TriangleType) {
        let nx = ((max.x - min.x) / spacing).ceil().max(1.0) as usize;
        let ny = ((max.y - min.y) / spacing).ceil().max(1.0) as usize;
        for i in 0..nx {
            for j in 0..ny {
                let x0 = min.x + i as f32 * spacing;
                let y0 = min.y + j as f32 * spacing;
                let x1 = (x0 + spacing).min(max.x);
                let y1 = (y0 + spacing).min(max.y);
                self.add_quad(
                    [
                        Vec3::new(x0, y0, z),
                        Vec3::new(x1, y0, z),
                        Vec3::new(x1, y1, z),
                        Vec3::new(x0, y1, z),
                    ],
                    kind,
                );
            }
        }
    }

    /// Vertical wall along `from -> to`, spanning `z_bottom..z_top`
    pub fn add_wall(&mut self, from: Vec2, to: Vec2, z_bottom: f32, z_top: f32, kind: TriangleType) {
        self.add_quad(
            [
                from.extend(z_bottom),
                to.extend(z_bottom),
                to.extend(z_top),
                from.extend(z_top),
            ],
            kind,
        );
    }

    /// Four walls enclosing the rectangle `min..max`
    pub fn add_enclosure(&mut self, min: Vec2, max: Vec2, z_bottom: f32, z_top: f32, kind: TriangleType) {
        let corners = [min, Vec2::new(max.x, min.y), max, Vec2::new(min.x, max.y)];
        for i in 0..4 {
            self.add_wall(corners[i], corners[(i + 1) % 4], z_bottom, z_top, kind);
        }
    }
}

impl TriangleSupplier for MeshSupplier {
    fn get_triangles(&mut self, min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Vec<SuppliedTriangle> {
        self.requests += 1;
        let region = Rect::new(Vec2::new(min_x, min_y), Vec2::new(max_x, max_y));
        self.triangles
            .iter()
            .filter(|tri| region.intersects(&Rect::enclosing(&tri.vertices.map(|v| v.truncate()))))
            .copied()
            .collect()
    }
}
