//! Trinav - lazily grown navigation graph and path search over raw world triangles

pub mod core;
pub mod math;
pub mod cache;
pub mod collision;
pub mod graph;
