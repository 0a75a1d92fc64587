//! Geometric primitives used by the collision queries

pub mod aabb;
pub mod rect;
pub mod segment;

pub use aabb::Aabb;
pub use rect::Rect;
pub use segment::Segment;
