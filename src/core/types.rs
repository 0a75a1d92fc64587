//! Core type aliases and re-exports

pub use glam::{Vec2, Vec3};

/// Standard Result type for the crate
pub type Result<T> = std::result::Result<T, crate::core::error::Error>;

/// Horizontal (XY) distance between two world positions
pub fn distance_2d(a: Vec3, b: Vec3) -> f32 {
    a.truncate().distance(b.truncate())
}
