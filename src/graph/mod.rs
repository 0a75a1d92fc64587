//! Navigation graph grown lazily over the collision world
//!
//! Spots (graph nodes) live in fixed-size, file-backed chunks kept in an LRU
//! cache. The graph is extended on demand during search: every popped
//! frontier spot samples candidate neighbors around itself and keeps the
//! ones the collision world says an agent can stand on and walk to.

pub mod config;
pub mod spot;
pub mod chunk;
pub mod disk_io;
pub mod path_graph;
pub mod search;
pub mod worker;

pub use config::GraphConfig;
pub use spot::{Spot, SpotFlags, SpotId};
pub use chunk::{ChunkCoord, GraphChunk, CHUNK_SIZE};
pub use path_graph::{GraphStats, NearbySpot, PathGraph, SpotRef};
pub use search::{SearchOutcome, SearchReport, SearchStrategy};
pub use worker::{PathRequest, PathResult, PathWorker};
