//! Chunked navigation graph grown on demand against the collision world

use std::collections::HashMap;
use std::f32::consts::TAU;

use super::chunk::{ChunkCoord, GraphChunk};
use super::config::GraphConfig;
use super::spot::{SearchState, Spot, SpotFlags, SpotId};
use crate::cache::LruCache;
use crate::collision::{CollisionWorld, TriangleSupplier, TriangleType, TriangleTypes};
use crate::core::types::Vec3;

/// Candidate directions sampled around a spot during expansion
const EXPANSION_ANGLES: usize = 16;

/// Transient handle to a resident spot.
///
/// Only valid while its chunk stays resident; long-lived references are
/// stored as positions and resolved again with [`PathGraph::get_spot`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SpotRef {
    pub chunk: ChunkCoord,
    pub id: SpotId,
}

/// A spot found by a proximity query
#[derive(Clone, Copy, Debug)]
pub struct NearbySpot {
    pub at: SpotRef,
    pub pos: Vec3,
    pub flags: SpotFlags,
}

/// Counts over the resident part of the graph
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct GraphStats {
    pub resident_chunks: usize,
    pub dirty_chunks: usize,
    pub spots: usize,
    pub blocked_spots: usize,
    pub mapped_spots: usize,
    /// Directed neighbor entries
    pub connections: usize,
}

/// The navigation graph: an LRU cache of file-backed chunks plus the
/// collision world used to grow it.
///
/// Single-writer: every operation takes `&mut self`, and nothing is locked.
pub struct PathGraph<S> {
    pub(super) config: GraphConfig,
    pub(super) world: CollisionWorld<S>,
    pub(super) chunks: LruCache<ChunkCoord, GraphChunk>,
    pub(super) search_id: u32,
    /// Spot most recently popped by the running search
    pub(super) current: Option<Vec3>,
    /// Spot closest to the goal seen by the running search
    pub(super) closest: Option<Vec3>,
    /// Search state of spots whose chunk was evicted during the running search
    pub(super) parked: HashMap<[u32; 3], SearchState>,
}

impl<S: TriangleSupplier> PathGraph<S> {
    pub fn new(supplier: S, config: GraphConfig) -> Self {
        let world = CollisionWorld::new(supplier, config.collision.clone());
        Self::with_world(world, config)
    }

    pub fn with_world(world: CollisionWorld<S>, config: GraphConfig) -> Self {
        let chunks = LruCache::new(config.chunk_cache_capacity());
        log::debug!(
            "Path graph in {} (cache {} chunks)",
            config.chunk_dir.display(),
            chunks.capacity()
        );
        Self {
            config,
            world,
            chunks,
            search_id: 0,
            current: None,
            closest: None,
            parked: HashMap::new(),
        }
    }

    /// Resident chunk at `coord`, loading it and evicting the oldest if needed
    ///
    /// Search state on an evicted chunk is parked and handed back when the
    /// chunk is loaded again, so a search may outgrow the cache.
    pub(super) fn chunk_mut(&mut self, coord: ChunkCoord) -> &mut GraphChunk {
        let dir = &self.config.chunk_dir;
        let search_id = self.search_id;
        let parked = &mut self.parked;
        let (chunk, evicted) = self.chunks.get_or_insert_with(coord, || {
            let mut chunk = GraphChunk::new(coord);
            chunk.load(dir);
            if !parked.is_empty() {
                chunk.restore_search_states(parked);
            }
            chunk
        });
        if let Some((old, mut evicted)) = evicted {
            log::debug!("Evicting chunk {old:?}");
            if search_id != 0 {
                evicted.park_search_states(search_id, parked);
            }
            evicted.save(dir);
        }
        chunk
    }

    /// Spot at `pos`: same cell, height within half a minimum step
    pub fn get_spot(&mut self, pos: Vec3) -> Option<SpotRef> {
        let tolerance = self.config.spot_height_tolerance();
        let coord = ChunkCoord::of(pos);
        let id = self.chunk_mut(coord).find_spot(pos, tolerance)?;
        Some(SpotRef { chunk: coord, id })
    }

    /// Spot data at `pos`
    pub fn spot_at(&mut self, pos: Vec3) -> Option<&Spot> {
        let at = self.get_spot(pos)?;
        self.spot(at)
    }

    /// Add a spot unless one already sits at `pos`
    pub fn add_spot(&mut self, pos: Vec3, flags: SpotFlags) -> SpotRef {
        if let Some(at) = self.get_spot(pos) {
            if self.spot(at).is_some_and(|s| s.distance_to(pos) < 1e-3) {
                return at;
            }
        }
        let coord = ChunkCoord::of(pos);
        let id = self.chunk_mut(coord).add_spot(pos, flags);
        SpotRef { chunk: coord, id }
    }

    /// Every spot within `range` of `pos` (3D)
    pub fn spots_within(&mut self, pos: Vec3, range: f32) -> Vec<NearbySpot> {
        let (min_x, min_y) = (pos.x - range, pos.y - range);
        let (max_x, max_y) = (pos.x + range, pos.y + range);
        let lo = ChunkCoord::of_xy(min_x, min_y);
        let hi = ChunkCoord::of_xy(max_x, max_y);

        let mut found = Vec::new();
        for cx in lo.x..=hi.x {
            for cy in lo.y..=hi.y {
                let coord = ChunkCoord::new(cx, cy);
                let chunk = self.chunk_mut(coord);
                for id in chunk.spots_in_rect(min_x, min_y, max_x, max_y) {
                    let Some(spot) = chunk.spot(id) else {
                        continue;
                    };
                    if spot.distance_to(pos) <= range {
                        found.push(NearbySpot {
                            at: SpotRef { chunk: coord, id },
                            pos: spot.pos,
                            flags: spot.flags,
                        });
                    }
                }
            }
        }
        found
    }

    /// Nearest non-blocked spot within `max_distance`
    pub fn closest_spot(&mut self, pos: Vec3, max_distance: f32) -> Option<SpotRef> {
        self.spots_within(pos, max_distance)
            .into_iter()
            .filter(|s| !s.flags.contains(SpotFlags::BLOCKED))
            .min_by(|a, b| a.pos.distance(pos).total_cmp(&b.pos.distance(pos)))
            .map(|s| s.at)
    }

    /// Link two spots both ways. Returns false if either is missing.
    pub fn connect(&mut self, a: Vec3, b: Vec3) -> bool {
        let (Some(ra), Some(rb)) = (self.get_spot(a), self.get_spot(b)) else {
            return false;
        };
        self.connect_refs(ra, rb)
    }

    /// Link two resident spots both ways without resolving positions again
    fn connect_refs(&mut self, a: SpotRef, b: SpotRef) -> bool {
        let (pa, pb) = match (self.spot(a), self.spot(b)) {
            (Some(sa), Some(sb)) => (sa.pos, sb.pos),
            _ => return false,
        };
        // Both chunks are resident, so neither call evicts the other
        self.chunk_mut(a.chunk).add_path(a.id, pb);
        self.chunk_mut(b.chunk).add_path(b.id, pa);
        true
    }

    /// Remove the link between two spots in both directions
    pub fn disconnect(&mut self, a: Vec3, b: Vec3) {
        if let Some(ra) = self.get_spot(a) {
            self.chunk_mut(ra.chunk).remove_path(ra.id, b);
        }
        if let Some(rb) = self.get_spot(b) {
            self.chunk_mut(rb.chunk).remove_path(rb.id, a);
        }
    }

    /// Spot at `pos`, creating it and linking it to every reachable
    /// non-blocked spot within one maximum step if it did not exist.
    ///
    /// A blocked spot already sitting at `pos` is reopened and relinked
    /// instead of being shadowed by a duplicate.
    pub fn add_and_connect_spot(&mut self, pos: Vec3) -> SpotRef {
        let existing = self
            .get_spot(pos)
            .filter(|&at| self.spot(at).is_some_and(|s| s.distance_to(pos) < 1e-3));
        let at = match existing {
            Some(at) if !self.spot(at).is_some_and(Spot::is_blocked) => return at,
            Some(at) => {
                self.chunk_mut(at.chunk)
                    .clear_flag(at.id, SpotFlags::BLOCKED.union(SpotFlags::CLOSE_TO_MODEL));
                log::debug!("Reopened blocked spot at {pos:?}");
                at
            }
            None => {
                let coord = ChunkCoord::of(pos);
                let id = self.chunk_mut(coord).add_spot(pos, SpotFlags::empty());
                SpotRef { chunk: coord, id }
            }
        };
        self.connect_to_neighbors(at, pos);
        at
    }

    fn connect_to_neighbors(&mut self, at: SpotRef, pos: Vec3) -> usize {
        let (height, radius) = self.agent_size();
        let max_step = self.config.max_step_length;

        let mut linked = 0;
        for other in self.spots_within(pos, max_step) {
            if other.at == at || other.flags.contains(SpotFlags::BLOCKED) {
                continue;
            }
            // One sightline decides both directions
            if self.world.step_blocked(pos, other.pos, height, radius) {
                continue;
            }
            if self.connect_refs(at, other.at) {
                linked += 1;
            }
        }
        linked
    }

    fn agent_size(&self) -> (f32, f32) {
        let collision = self.world.config();
        (collision.agent_height, collision.agent_radius)
    }

    /// Sample new neighbors around a spot from collision geometry.
    ///
    /// Probes sixteen directions at the wanted step length. Unstandable
    /// probes and probes next to models or objects leave a blocked spot
    /// behind so later expansions skip them cheaply. Does nothing for a
    /// spot that is already mapped. Returns the number of spots created.
    pub fn expand(&mut self, at: SpotRef) -> usize {
        let Some(source) = self.spot(at) else {
            return 0;
        };
        if source.is_mapped() {
            return 0;
        }
        let origin = source.pos;
        let wanted = self.config.wanted_step_length;
        let max_step = self.config.max_step_length;
        let (height, radius) = self.agent_size();

        let mut created = 0;
        for i in 0..EXPANSION_ANGLES {
            let angle = i as f32 * TAU / EXPANSION_ANGLES as f32;
            let probe = origin + Vec3::new(angle.cos() * wanted, angle.sin() * wanted, 0.0);

            if self.get_spot(probe).is_some() {
                continue;
            }
            let crowded = self
                .spots_within(probe, wanted)
                .iter()
                .any(|s| s.at != at && s.pos.distance(probe) < wanted);
            if crowded {
                continue;
            }

            let standable = self.world.standable_at(
                probe.x,
                probe.y,
                origin.z - max_step,
                origin.z + max_step,
                height,
                radius,
                TriangleTypes::ALL,
            );
            let Some((z, kind)) = standable else {
                self.add_spot(probe, SpotFlags::BLOCKED);
                created += 1;
                continue;
            };

            let pos = Vec3::new(probe.x, probe.y, z);
            if self.world.is_close_to_type(pos.x, pos.y, pos.z, wanted, TriangleTypes::CLUTTER) {
                self.add_spot(pos, SpotFlags::BLOCKED.union(SpotFlags::CLOSE_TO_MODEL));
                created += 1;
                continue;
            }

            let flags = match kind {
                TriangleType::Water => SpotFlags::WATER,
                TriangleType::Model => SpotFlags::INDOORS,
                TriangleType::Terrain | TriangleType::Object => SpotFlags::empty(),
            };
            let new_spot = self.add_spot(pos, flags);
            self.connect_to_neighbors(new_spot, pos);
            created += 1;
        }

        // Chunk traffic above may have reloaded the source's chunk
        if let Some(source) = self.get_spot(origin) {
            self.chunk_mut(source.chunk).set_flag(source.id, SpotFlags::MAPPED);
        }
        created
    }

    /// Turn the spot nearest `pos` into a permanently blocked one and drop
    /// its links on both sides
    pub fn mark_blocked_at(&mut self, pos: Vec3) -> bool {
        let Some(nearest) = self
            .spots_within(pos, self.config.min_step_length)
            .into_iter()
            .min_by(|a, b| a.pos.distance(pos).total_cmp(&b.pos.distance(pos)))
        else {
            return false;
        };

        let neighbors = self.spot(nearest.at).map(|s| s.paths().to_vec()).unwrap_or_default();
        for n in neighbors {
            if let Some(other) = self.get_spot(n) {
                self.chunk_mut(other.chunk).remove_path(other.id, nearest.pos);
            }
        }
        if let Some(at) = self.get_spot(nearest.pos) {
            let chunk = self.chunk_mut(at.chunk);
            chunk.clear_paths(at.id);
            chunk.set_flag(at.id, SpotFlags::BLOCKED);
        }
        log::debug!("Blocked spot at {:?}", nearest.pos);
        true
    }

    /// Search state of a spot for the running search, reset if stale
    pub(super) fn search_state(&mut self, at: SpotRef) -> Option<&mut SearchState> {
        let search_id = self.search_id;
        self.chunk_mut(at.chunk)
            .spot_mut(at.id)
            .map(|spot| spot.search_state(search_id))
    }

    pub(super) fn mark_visited(&mut self, at: SpotRef) {
        self.chunk_mut(at.chunk).mark_visited(at.id);
    }
}

impl<S> PathGraph<S> {
    pub fn config(&self) -> &GraphConfig {
        &self.config
    }

    pub fn world(&self) -> &CollisionWorld<S> {
        &self.world
    }

    pub fn world_mut(&mut self) -> &mut CollisionWorld<S> {
        &mut self.world
    }

    /// Spot behind a handle, if its chunk is resident
    pub fn spot(&self, at: SpotRef) -> Option<&Spot> {
        self.chunks.peek(at.chunk)?.spot(at.id)
    }

    pub fn is_chunk_resident(&self, coord: ChunkCoord) -> bool {
        self.chunks.contains(coord)
    }

    /// Id of the most recent search
    pub fn search_id(&self) -> u32 {
        self.search_id
    }

    /// Spot most recently expanded by the last search
    pub fn current_spot(&self) -> Option<Vec3> {
        self.current
    }

    /// Spot closest to the goal seen by the last search
    pub fn closest_seen(&self) -> Option<Vec3> {
        self.closest
    }

    pub fn stats(&self) -> GraphStats {
        let mut stats = GraphStats {
            resident_chunks: self.chunks.len(),
            ..Default::default()
        };
        for chunk in self.chunks.values() {
            stats.dirty_chunks += usize::from(chunk.is_dirty());
            for (_, spot) in chunk.iter() {
                stats.spots += 1;
                stats.blocked_spots += usize::from(spot.is_blocked());
                stats.mapped_spots += usize::from(spot.is_mapped());
                stats.connections += spot.paths().len();
            }
        }
        stats
    }

    /// Persist every dirty resident chunk; returns how many were written
    pub fn save_all(&mut self) -> usize {
        let dir = &self.config.chunk_dir;
        let mut saved = 0;
        for chunk in self.chunks.values_mut() {
            if chunk.is_dirty() && chunk.save(dir) {
                saved += 1;
            }
        }
        if saved > 0 {
            log::debug!("Saved {saved} chunks");
        }
        saved
    }

    /// Persist and drop every resident chunk
    pub fn clear(&mut self) {
        let dir = self.config.chunk_dir.clone();
        for (_, mut chunk) in self.chunks.drain() {
            chunk.save(&dir);
        }
        self.current = None;
        self.closest = None;
    }
}

impl<S> Drop for PathGraph<S> {
    fn drop(&mut self) {
        self.save_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::{CollisionConfig, MeshSupplier};
    use crate::core::types::Vec2;
    use crate::graph::chunk::CHUNK_SIZE;
    use crate::graph::disk_io;
    use tempfile::TempDir;

    fn flat_graph(dir: &TempDir) -> PathGraph<MeshSupplier> {
        let mut supplier = MeshSupplier::new();
        supplier.add_flat_ground(Vec2::splat(-40.0), Vec2::splat(40.0), 0.0, 8.0, TriangleType::Terrain);
        PathGraph::new(supplier, GraphConfig::with_chunk_dir(dir.path()))
    }

    fn empty_graph(dir: &TempDir) -> PathGraph<MeshSupplier> {
        PathGraph::new(MeshSupplier::new(), GraphConfig::with_chunk_dir(dir.path()))
    }

    #[test]
    fn test_add_spot_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut graph = empty_graph(&dir);
        let a = graph.add_spot(Vec3::new(1.0, 1.0, 0.0), SpotFlags::empty());
        let b = graph.add_spot(Vec3::new(1.0, 1.0, 0.0), SpotFlags::empty());
        assert_eq!(a, b);
        assert_eq!(graph.stats().spots, 1);

        // Same cell, different height
        let c = graph.add_spot(Vec3::new(1.0, 1.0, 6.0), SpotFlags::empty());
        assert_ne!(a, c);
        assert_eq!(graph.get_spot(Vec3::new(1.1, 1.1, 5.5)), Some(c));
        assert_eq!(graph.get_spot(Vec3::new(1.1, 1.1, 3.0)), None);
    }

    #[test]
    fn test_connect_is_symmetric() {
        let dir = TempDir::new().unwrap();
        let mut graph = empty_graph(&dir);
        let a = Vec3::new(0.5, 0.5, 0.0);
        let b = Vec3::new(4.5, 0.5, 0.0);
        graph.add_spot(a, SpotFlags::empty());
        graph.add_spot(b, SpotFlags::empty());

        assert!(graph.connect(a, b));
        assert!(graph.spot_at(a).unwrap().has_path_to(b));
        assert!(graph.spot_at(b).unwrap().has_path_to(a));

        graph.disconnect(a, b);
        assert!(graph.spot_at(a).unwrap().paths().is_empty());
        assert!(graph.spot_at(b).unwrap().paths().is_empty());

        assert!(!graph.connect(a, Vec3::new(100.0, 100.0, 0.0)));
    }

    #[test]
    fn test_expand_without_geometry_blocks_all_probes() {
        let dir = TempDir::new().unwrap();
        let mut graph = empty_graph(&dir);
        let start = graph.add_spot(Vec3::new(0.5, 0.5, 0.0), SpotFlags::empty());

        let created = graph.expand(start);
        assert!(created > 0);
        let stats = graph.stats();
        assert_eq!(stats.blocked_spots, created);
        assert_eq!(stats.connections, 0);
        assert!(graph.spot_at(Vec3::new(0.5, 0.5, 0.0)).unwrap().is_mapped());
    }

    #[test]
    fn test_expand_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut graph = flat_graph(&dir);
        let start = graph.add_and_connect_spot(Vec3::new(0.5, 0.5, 0.0));

        let created = graph.expand(start);
        assert!(created > 0);
        let before = graph.stats();
        assert_eq!(before.blocked_spots, 0);

        let start = graph.get_spot(Vec3::new(0.5, 0.5, 0.0)).unwrap();
        assert_eq!(graph.expand(start), 0);
        assert_eq!(graph.stats(), before);
    }

    #[test]
    fn test_expanded_neighbors_are_symmetric() {
        let dir = TempDir::new().unwrap();
        let mut graph = flat_graph(&dir);
        let origin = Vec3::new(0.5, 0.5, 0.0);
        let start = graph.add_and_connect_spot(origin);
        graph.expand(start);

        let spots = graph.spots_within(origin, 20.0);
        assert!(spots.len() > 1);
        for s in &spots {
            let paths = graph.spot(s.at).unwrap().paths().to_vec();
            for n in paths {
                assert!(n.distance(s.pos) <= graph.config().max_step_length + 1e-3);
                let back = graph.spot_at(n).unwrap();
                assert!(back.has_path_to(s.pos), "{:?} -> {:?} is one-way", s.pos, n);
            }
        }
        assert!(!graph.spot_at(origin).unwrap().paths().is_empty());
    }

    #[test]
    fn test_expand_near_model_blocks() {
        let dir = TempDir::new().unwrap();
        let mut supplier = MeshSupplier::new();
        supplier.add_flat_ground(Vec2::splat(-20.0), Vec2::splat(20.0), 0.0, 5.0, TriangleType::Terrain);
        supplier.add_wall(Vec2::new(4.0, -10.0), Vec2::new(4.0, 10.0), -1.0, 5.0, TriangleType::Model);
        let mut graph = PathGraph::new(supplier, GraphConfig::with_chunk_dir(dir.path()));

        let start = graph.add_and_connect_spot(Vec3::new(0.0, 0.5, 0.0));
        graph.expand(start);

        let east = graph.spot_at(Vec3::new(3.0, 0.5, 0.0)).unwrap();
        assert!(east.flags.contains(SpotFlags::BLOCKED.union(SpotFlags::CLOSE_TO_MODEL)));
        assert!(east.paths().is_empty());
    }

    #[test]
    fn test_water_spots_flagged() {
        let dir = TempDir::new().unwrap();
        let mut supplier = MeshSupplier::new();
        supplier.add_flat_ground(Vec2::splat(-20.0), Vec2::splat(20.0), 0.0, 5.0, TriangleType::Water);
        let mut graph = PathGraph::new(supplier, GraphConfig::with_chunk_dir(dir.path()));

        let start = graph.add_and_connect_spot(Vec3::new(0.5, 0.5, 0.0));
        graph.expand(start);
        let spots = graph.spots_within(Vec3::new(0.5, 0.5, 0.0), 10.0);
        assert!(spots.iter().any(|s| s.flags.contains(SpotFlags::WATER)));
    }

    #[test]
    fn test_closest_spot_skips_blocked() {
        let dir = TempDir::new().unwrap();
        let mut graph = empty_graph(&dir);
        let blocked = Vec3::new(1.0, 1.0, 0.0);
        let open = Vec3::new(3.0, 1.0, 0.0);
        graph.add_spot(blocked, SpotFlags::BLOCKED);
        let want = graph.add_spot(open, SpotFlags::empty());

        assert_eq!(graph.closest_spot(Vec3::new(1.1, 1.0, 0.0), 5.0), Some(want));
        assert_eq!(graph.closest_spot(Vec3::new(1.1, 1.0, 0.0), 1.0), None);
    }

    #[test]
    fn test_mark_blocked_at() {
        let dir = TempDir::new().unwrap();
        let mut graph = empty_graph(&dir);
        let a = Vec3::new(0.5, 0.5, 0.0);
        let b = Vec3::new(3.5, 0.5, 0.0);
        graph.add_spot(a, SpotFlags::empty());
        graph.add_spot(b, SpotFlags::empty());
        graph.connect(a, b);

        assert!(graph.mark_blocked_at(Vec3::new(3.4, 0.6, 0.0)));
        let spot_b = graph.spot_at(b).unwrap();
        assert!(spot_b.is_blocked());
        assert!(spot_b.paths().is_empty());
        assert!(graph.spot_at(a).unwrap().paths().is_empty());

        assert!(!graph.mark_blocked_at(Vec3::new(100.0, 100.0, 0.0)));
    }

    #[test]
    fn test_blocked_spot_reopened_not_duplicated() {
        let dir = TempDir::new().unwrap();
        let mut graph = flat_graph(&dir);
        let a = Vec3::new(0.5, 0.5, 0.0);
        let b = Vec3::new(3.5, 0.5, 0.0);
        graph.add_and_connect_spot(a);
        graph.add_and_connect_spot(b);
        assert!(graph.spot_at(a).unwrap().has_path_to(b));

        assert!(graph.mark_blocked_at(a));
        assert!(graph.spot_at(a).unwrap().is_blocked());

        let reopened = graph.add_and_connect_spot(a);
        assert_eq!(graph.stats().spots, 2);
        let spot = graph.spot(reopened).unwrap();
        assert!(!spot.is_blocked());
        assert!(spot.has_path_to(b));
        assert!(graph.spot_at(b).unwrap().has_path_to(a));
    }

    #[test]
    fn test_search_state_survives_eviction() {
        let dir = TempDir::new().unwrap();
        let mut graph = empty_graph(&dir);
        graph.search_id = 7;
        let pos = Vec3::new(10.0, 10.0, 1.0);
        let prev = Vec3::new(8.0, 10.0, 1.0);
        let at = graph.add_spot(pos, SpotFlags::empty());
        {
            let state = graph.search_state(at).unwrap();
            state.cost = 4.0;
            state.closed = true;
            state.trace_back = Some(prev);
        }

        let capacity = graph.config().chunk_cache_capacity();
        for i in 1..=capacity {
            graph.add_spot(Vec3::new(i as f32 * CHUNK_SIZE + 10.0, 10.0, 1.0), SpotFlags::empty());
        }
        assert!(!graph.is_chunk_resident(ChunkCoord::of(pos)));
        assert_eq!(graph.parked.len(), 1);

        let at = graph.get_spot(pos).unwrap();
        let state = graph.spot(at).unwrap().search_state_if(7).copied().unwrap();
        assert!(state.closed);
        assert_eq!(state.cost, 4.0);
        assert_eq!(state.trace_back, Some(prev));
        assert!(graph.parked.is_empty());
    }

    #[test]
    fn test_cache_bounded_and_evicted_chunk_saved() {
        let dir = TempDir::new().unwrap();
        let mut graph = empty_graph(&dir);
        let capacity = graph.config().chunk_cache_capacity();

        let positions: Vec<Vec3> = (0..=capacity)
            .map(|i| Vec3::new(i as f32 * CHUNK_SIZE + 10.0, 10.0, 1.0))
            .collect();
        for pos in &positions[..capacity] {
            graph.add_spot(*pos, SpotFlags::empty());
        }
        assert_eq!(graph.stats().resident_chunks, capacity);

        graph.add_spot(positions[capacity], SpotFlags::empty());
        let stats = graph.stats();
        assert_eq!(stats.resident_chunks, capacity);

        let first = ChunkCoord::of(positions[0]);
        assert!(!graph.is_chunk_resident(first));
        assert!(disk_io::chunk_path(dir.path(), first).exists());
        for pos in &positions[1..] {
            assert!(graph.is_chunk_resident(ChunkCoord::of(*pos)));
        }

        // Reloaded from disk on the next touch
        assert!(graph.spot_at(positions[0]).is_some());
    }

    #[test]
    fn test_drop_flushes_dirty_chunks() {
        let dir = TempDir::new().unwrap();
        let pos = Vec3::new(12.0, 7.0, 3.0);
        {
            let mut graph = empty_graph(&dir);
            graph.add_spot(pos, SpotFlags::WATER);
            assert_eq!(graph.stats().dirty_chunks, 1);
        }
        let mut graph = empty_graph(&dir);
        let spot = graph.spot_at(pos).unwrap();
        assert!(spot.is_in_water());
        assert_eq!(graph.stats().dirty_chunks, 0);
    }

    #[test]
    fn test_save_all_and_clear() {
        let dir = TempDir::new().unwrap();
        let mut graph = empty_graph(&dir);
        graph.add_spot(Vec3::new(1.0, 1.0, 0.0), SpotFlags::empty());
        graph.add_spot(Vec3::new(CHUNK_SIZE + 1.0, 1.0, 0.0), SpotFlags::empty());

        assert_eq!(graph.save_all(), 2);
        assert_eq!(graph.save_all(), 0);

        graph.clear();
        assert_eq!(graph.stats().resident_chunks, 0);
        assert!(graph.spot_at(Vec3::new(1.0, 1.0, 0.0)).is_some());
    }

    #[test]
    fn test_custom_collision_config_is_used() {
        let dir = TempDir::new().unwrap();
        let mut config = GraphConfig::with_chunk_dir(dir.path());
        config.collision = CollisionConfig {
            agent_height: 3.0,
            ..Default::default()
        };
        let graph = PathGraph::new(MeshSupplier::new(), config);
        assert_eq!(graph.world().config().agent_height, 3.0);
    }
}
