//! Fixed-size spot storage covering one world tile

use super::disk_io::{self, SpotRecord};
use super::spot::{position_key, SearchState, Spot, SpotFlags, SpotId};
use crate::collision::config::TILE_SIZE;
use crate::collision::WORLD_BIAS;
use crate::core::types::Vec3;
use std::collections::HashMap;
use std::path::Path;

/// World extent of one graph chunk
pub const CHUNK_SIZE: f32 = TILE_SIZE;

/// Cells per chunk side
pub const CHUNK_CELLS: usize = 256;

/// World extent of one cell
pub const CELL_SIZE: f32 = CHUNK_SIZE / CHUNK_CELLS as f32;

/// Integer chunk coordinate, computed from biased world XY
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ChunkCoord {
    pub x: i32,
    pub y: i32,
}

impl ChunkCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Chunk containing a world position
    pub fn of(pos: Vec3) -> Self {
        Self::of_xy(pos.x, pos.y)
    }

    pub fn of_xy(x: f32, y: f32) -> Self {
        Self::new(
            ((x + WORLD_BIAS) / CHUNK_SIZE).floor() as i32,
            ((y + WORLD_BIAS) / CHUNK_SIZE).floor() as i32,
        )
    }

    /// World-space XY of the chunk's minimum corner
    pub fn origin(&self) -> (f32, f32) {
        (
            self.x as f32 * CHUNK_SIZE - WORLD_BIAS,
            self.y as f32 * CHUNK_SIZE - WORLD_BIAS,
        )
    }
}

/// A 256x256 grid of spot chains backed by one file.
///
/// Spots live in an arena; each cell points at the first spot of a chain
/// linked through `Spot::next` in insertion order.
pub struct GraphChunk {
    coord: ChunkCoord,
    origin: (f32, f32),
    spots: Vec<Spot>,
    cells: Vec<Option<SpotId>>,
    dirty: bool,
}

impl std::fmt::Debug for GraphChunk {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GraphChunk")
            .field("coord", &self.coord)
            .field("spots", &self.spots.len())
            .field("dirty", &self.dirty)
            .finish()
    }
}

impl GraphChunk {
    pub fn new(coord: ChunkCoord) -> Self {
        Self {
            coord,
            origin: coord.origin(),
            spots: Vec::new(),
            cells: vec![None; CHUNK_CELLS * CHUNK_CELLS],
            dirty: false,
        }
    }

    pub fn coord(&self) -> ChunkCoord {
        self.coord
    }

    pub fn origin(&self) -> (f32, f32) {
        self.origin
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn spot_count(&self) -> usize {
        self.spots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.spots.is_empty()
    }

    /// Cell indices of a world XY, clamped into this chunk
    pub fn cell_of(&self, x: f32, y: f32) -> (usize, usize) {
        let max = (CHUNK_CELLS - 1) as f32;
        let cx = ((x - self.origin.0) / CELL_SIZE).floor().clamp(0.0, max);
        let cy = ((y - self.origin.1) / CELL_SIZE).floor().clamp(0.0, max);
        (cx as usize, cy as usize)
    }

    fn cell_index(&self, x: f32, y: f32) -> usize {
        let (cx, cy) = self.cell_of(x, y);
        cy * CHUNK_CELLS + cx
    }

    /// Spots in the cell holding (x, y), in insertion order
    pub fn cell_spots(&self, x: f32, y: f32) -> CellIter<'_> {
        CellIter {
            chunk: self,
            next: self.cells[self.cell_index(x, y)],
        }
    }

    /// Spot in the same cell as `pos` whose height is within `tolerance`.
    /// Several matches resolve to the nearest one; a free spot wins a tie
    /// with a blocked one.
    pub fn find_spot(&self, pos: Vec3, tolerance: f32) -> Option<SpotId> {
        self.cell_spots(pos.x, pos.y)
            .filter(|(_, spot)| (spot.pos.z - pos.z).abs() < tolerance)
            .min_by(|(_, a), (_, b)| {
                a.distance_to(pos)
                    .total_cmp(&b.distance_to(pos))
                    .then(a.is_blocked().cmp(&b.is_blocked()))
            })
            .map(|(id, _)| id)
    }

    /// Append a spot to its cell chain
    pub fn add_spot(&mut self, pos: Vec3, flags: SpotFlags) -> SpotId {
        let id = SpotId(self.spots.len() as u32);
        self.spots.push(Spot::new(pos, flags));

        let cell = self.cell_index(pos.x, pos.y);
        match self.cells[cell] {
            None => self.cells[cell] = Some(id),
            Some(head) => {
                let mut tail = head;
                while let Some(next) = self.spots[tail.0 as usize].next {
                    tail = next;
                }
                self.spots[tail.0 as usize].next = Some(id);
            }
        }
        self.dirty = true;
        id
    }

    pub fn spot(&self, id: SpotId) -> Option<&Spot> {
        self.spots.get(id.0 as usize)
    }

    /// Mutable access for search scratch state; does not mark the chunk dirty
    pub(crate) fn spot_mut(&mut self, id: SpotId) -> Option<&mut Spot> {
        self.spots.get_mut(id.0 as usize)
    }

    pub fn set_flag(&mut self, id: SpotId, flag: SpotFlags) {
        if let Some(spot) = self.spots.get_mut(id.0 as usize) {
            if !spot.flags.contains(flag) {
                spot.flags.insert(flag);
                self.dirty = true;
            }
        }
    }

    pub fn clear_flag(&mut self, id: SpotId, flag: SpotFlags) {
        if let Some(spot) = self.spots.get_mut(id.0 as usize) {
            if spot.flags.bits() & flag.bits() != 0 {
                spot.flags.remove(flag);
                self.dirty = true;
            }
        }
    }

    /// Visited marks are search bookkeeping and never dirty the chunk
    pub(crate) fn mark_visited(&mut self, id: SpotId) {
        if let Some(spot) = self.spots.get_mut(id.0 as usize) {
            spot.flags.insert(SpotFlags::VISITED);
        }
    }

    pub fn add_path(&mut self, id: SpotId, to: Vec3) -> bool {
        let added = self
            .spots
            .get_mut(id.0 as usize)
            .is_some_and(|spot| spot.add_path(to));
        self.dirty |= added;
        added
    }

    pub fn remove_path(&mut self, id: SpotId, to: Vec3) -> bool {
        let removed = self
            .spots
            .get_mut(id.0 as usize)
            .is_some_and(|spot| spot.remove_path(to));
        self.dirty |= removed;
        removed
    }

    pub fn clear_paths(&mut self, id: SpotId) {
        if let Some(spot) = self.spots.get_mut(id.0 as usize) {
            if !spot.paths().is_empty() {
                spot.clear_paths();
                self.dirty = true;
            }
        }
    }

    /// Spots whose XY lies inside the given window
    pub fn spots_in_rect(&self, min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Vec<SpotId> {
        let (x0, y0) = self.cell_of(min_x, min_y);
        let (x1, y1) = self.cell_of(max_x, max_y);
        let mut out = Vec::new();
        for cy in y0..=y1 {
            for cx in x0..=x1 {
                let mut next = self.cells[cy * CHUNK_CELLS + cx];
                while let Some(id) = next {
                    let spot = &self.spots[id.0 as usize];
                    let p = spot.pos;
                    if p.x >= min_x && p.x <= max_x && p.y >= min_y && p.y <= max_y {
                        out.push(id);
                    }
                    next = spot.next;
                }
            }
        }
        out
    }

    pub fn iter(&self) -> impl Iterator<Item = (SpotId, &Spot)> {
        self.spots
            .iter()
            .enumerate()
            .map(|(i, s)| (SpotId(i as u32), s))
    }

    /// Search state of every spot touched by `search_id`, keyed by position
    pub(crate) fn park_search_states(&self, search_id: u32, parked: &mut HashMap<[u32; 3], SearchState>) {
        for spot in &self.spots {
            if let Some(state) = spot.search_state_if(search_id) {
                parked.insert(position_key(spot.pos), *state);
            }
        }
    }

    /// Reattach search state parked while this chunk was evicted
    pub(crate) fn restore_search_states(&mut self, parked: &mut HashMap<[u32; 3], SearchState>) {
        for spot in &mut self.spots {
            if let Some(state) = parked.remove(&position_key(spot.pos)) {
                spot.restore_search_state(state);
            }
        }
    }

    /// Drop every spot and link
    pub fn clear(&mut self) {
        self.spots.clear();
        self.cells.fill(None);
        self.dirty = false;
    }

    /// Replace contents with the chunk file in `dir`, if any.
    ///
    /// A corrupt file is deleted and the chunk left empty. Returns true only
    /// when spots were read from disk.
    pub fn load(&mut self, dir: &Path) -> bool {
        let path = disk_io::chunk_path(dir, self.coord);
        self.clear();
        match disk_io::read_chunk_file(&path) {
            Ok(Some(records)) => {
                for record in records {
                    let id = self.add_spot(record.pos, record.flags);
                    for p in record.paths {
                        self.add_path(id, p);
                    }
                }
                self.dirty = false;
                log::debug!("Loaded chunk {:?}: {} spots", self.coord, self.spots.len());
                true
            }
            Ok(None) => false,
            Err(e) if e.is_corruption() => {
                log::warn!("{e}; deleting chunk file");
                if let Err(e) = disk_io::delete_chunk_file(&path) {
                    log::warn!("Failed to delete {}: {e}", path.display());
                }
                self.clear();
                false
            }
            Err(e) => {
                log::warn!("Failed to load chunk {:?}: {e}", self.coord);
                self.clear();
                false
            }
        }
    }

    /// Persist to `dir` if dirty. Failures are logged and the chunk stays dirty.
    pub fn save(&mut self, dir: &Path) -> bool {
        if !self.dirty {
            return true;
        }
        let path = disk_io::chunk_path(dir, self.coord);
        let records: Vec<SpotRecord> = self.spots.iter().map(SpotRecord::from).collect();
        match disk_io::write_chunk_file(&path, &records) {
            Ok(count) => {
                self.dirty = false;
                log::debug!("Saved chunk {:?}: {count} spots", self.coord);
                true
            }
            Err(e) => {
                log::warn!("Failed to save chunk {:?}: {e}", self.coord);
                false
            }
        }
    }
}

/// Walks one cell chain
pub struct CellIter<'a> {
    chunk: &'a GraphChunk,
    next: Option<SpotId>,
}

impl<'a> Iterator for CellIter<'a> {
    type Item = (SpotId, &'a Spot);

    fn next(&mut self) -> Option<Self::Item> {
        let id = self.next?;
        let spot = self.chunk.spots.get(id.0 as usize)?;
        self.next = spot.next;
        Some((id, spot))
    }
}
