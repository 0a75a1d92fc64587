//! Triangle collision world
//!
//! Regional triangle meshes are pulled from an external [`TriangleSupplier`]
//! on demand, indexed on a uniform XY grid, and cached with LRU eviction.
//! [`CollisionWorld`] answers the geometric questions the path graph asks:
//! where can an agent stand, is a step between two points walkable, and is
//! the line between them clear.

pub mod config;
pub mod triangle_store;
pub mod spatial_index;
pub mod supplier;
pub mod world;

pub use config::CollisionConfig;
pub use triangle_store::{Triangle, TriangleStore, TriangleType, TriangleTypes};
pub use spatial_index::TriangleIndex;
pub use supplier::{MeshSupplier, SuppliedTriangle, TriangleSupplier};
pub use world::{CollisionWorld, RegionCoord, WORLD_BIAS};
