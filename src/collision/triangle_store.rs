//! Per-region triangle mesh

use std::collections::HashMap;

use crate::core::types::Vec3;
use crate::math::Aabb;

/// Source of a triangle, governs which queries it takes part in
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TriangleType {
    Terrain,
    Water,
    /// World model geometry (buildings, caves)
    Model,
    /// Placed objects (doodads)
    Object,
}

impl TriangleType {
    pub const ALL: [TriangleType; 4] = [Self::Terrain, Self::Water, Self::Model, Self::Object];

    const fn bit(self) -> u8 {
        1 << self as u8
    }
}

/// Set of triangle types
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct TriangleTypes(u8);

impl TriangleTypes {
    pub const NONE: Self = Self(0);
    pub const ALL: Self = Self(0b1111);
    /// Everything an agent collides with
    pub const SOLID: Self = Self::ALL.without(TriangleType::Water);
    /// Model and object geometry
    pub const CLUTTER: Self = Self::single(TriangleType::Model).with(TriangleType::Object);

    pub const fn single(kind: TriangleType) -> Self {
        Self(kind.bit())
    }

    pub const fn with(self, kind: TriangleType) -> Self {
        Self(self.0 | kind.bit())
    }

    pub const fn without(self, kind: TriangleType) -> Self {
        Self(self.0 & !kind.bit())
    }

    pub const fn contains(self, kind: TriangleType) -> bool {
        self.0 & kind.bit() != 0
    }
}

impl FromIterator<TriangleType> for TriangleTypes {
    fn from_iter<I: IntoIterator<Item = TriangleType>>(iter: I) -> Self {
        iter.into_iter().fold(Self::NONE, Self::with)
    }
}

/// Indexed triangle
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Triangle {
    pub indices: [u32; 3],
    pub kind: TriangleType,
}

/// Mesh of one world region.
///
/// Vertices are deduplicated by exact bit pattern. Triangles lying entirely
/// beyond one face of `bounds` are rejected on insertion.
#[derive(Debug)]
pub struct TriangleStore {
    vertices: Vec<Vec3>,
    triangles: Vec<Triangle>,
    bounds: Aabb,
    vertex_lookup: HashMap<[u32; 3], u32>,
}

impl TriangleStore {
    /// Create an empty store accepting geometry that touches `bounds`
    pub fn new(bounds: Aabb) -> Self {
        Self {
            vertices: Vec::new(),
            triangles: Vec::new(),
            bounds,
            vertex_lookup: HashMap::new(),
        }
    }

    fn add_vertex(&mut self, v: Vec3) -> u32 {
        let key = [v.x.to_bits(), v.y.to_bits(), v.z.to_bits()];
        let next = self.vertices.len() as u32;
        *self.vertex_lookup.entry(key).or_insert_with(|| {
            self.vertices.push(v);
            next
        })
    }

    /// Add a triangle. Returns `false` if it lies outside the bounds.
    pub fn add_triangle(&mut self, a: Vec3, b: Vec3, c: Vec3, kind: TriangleType) -> bool {
        if self.bounds.all_outside(&[a, b, c]) {
            return false;
        }
        let indices = [self.add_vertex(a), self.add_vertex(b), self.add_vertex(c)];
        self.triangles.push(Triangle { indices, kind });
        true
    }

    /// Drop the vertex deduplication table once building is done
    pub fn finish(&mut self) {
        self.vertex_lookup = HashMap::new();
        self.vertices.shrink_to_fit();
        self.triangles.shrink_to_fit();
    }

    pub fn len(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn triangle(&self, index: u32) -> Triangle {
        self.triangles[index as usize]
    }

    /// Corner positions of a triangle
    pub fn corners(&self, index: u32) -> [Vec3; 3] {
        let [a, b, c] = self.triangles[index as usize].indices;
        [
            self.vertices[a as usize],
            self.vertices[b as usize],
            self.vertices[c as usize],
        ]
    }

    /// Unit normal of a triangle; zero for degenerate triangles
    pub fn normal(&self, index: u32) -> Vec3 {
        let [a, b, c] = self.corners(index);
        (b - a).cross(c - a).normalize_or_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn store() -> TriangleStore {
        TriangleStore::new(Aabb::column(0.0, 0.0, 10.0, 10.0))
    }

    #[test]
    fn test_type_sets() {
        assert!(TriangleTypes::ALL.contains(TriangleType::Water));
        assert!(!TriangleTypes::SOLID.contains(TriangleType::Water));
        assert!(TriangleTypes::SOLID.contains(TriangleType::Object));
        assert!(TriangleTypes::CLUTTER.contains(TriangleType::Model));
        assert!(!TriangleTypes::CLUTTER.contains(TriangleType::Terrain));
        let collected: TriangleTypes = [TriangleType::Terrain, TriangleType::Water].into_iter().collect();
        assert!(collected.contains(TriangleType::Terrain) && !collected.contains(TriangleType::Model));
    }

    #[test]
    fn test_vertices_are_shared() {
        let mut store = store();
        let a = Vec3::new(1.0, 1.0, 0.0);
        let b = Vec3::new(2.0, 1.0, 0.0);
        let c = Vec3::new(1.0, 2.0, 0.0);
        let d = Vec3::new(2.0, 2.0, 0.0);
        assert!(store.add_triangle(a, b, c, TriangleType::Terrain));
        assert!(store.add_triangle(b, d, c, TriangleType::Terrain));
        assert_eq!(store.len(), 2);
        assert_eq!(store.vertices.len(), 4);
        assert_eq!(store.corners(1), [b, d, c]);
    }

    #[test]
    fn test_outside_triangle_rejected() {
        let mut store = store();
        let rejected = store.add_triangle(
            Vec3::new(-5.0, 1.0, 0.0),
            Vec3::new(-1.0, 1.0, 0.0),
            Vec3::new(-3.0, 4.0, 0.0),
            TriangleType::Terrain,
        );
        assert!(!rejected);
        assert!(store.is_empty());
    }

    #[test]
    fn test_straddling_triangle_kept() {
        let mut store = store();
        assert!(store.add_triangle(
            Vec3::new(-5.0, 5.0, 0.0),
            Vec3::new(15.0, 4.0, 0.0),
            Vec3::new(15.0, 6.0, 0.0),
            TriangleType::Model,
        ));
        assert_eq!(store.triangle(0).kind, TriangleType::Model);
    }

    #[test]
    fn test_normal() {
        let mut store = store();
        store.add_triangle(
            Vec3::new(1.0, 1.0, 0.0),
            Vec3::new(2.0, 1.0, 0.0),
            Vec3::new(1.0, 2.0, 0.0),
            TriangleType::Terrain,
        );
        assert!((store.normal(0) - Vec3::Z).length() < 1e-6);
    }
}
