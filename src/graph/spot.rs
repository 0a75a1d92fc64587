//! Navigation graph node

use crate::core::types::{distance_2d, Vec3};

/// Positions closer than this are the same position
const SAME_POSITION: f32 = 1e-3;

/// Exact-bits key for a position, used to park search state across evictions
pub(crate) fn position_key(pos: Vec3) -> [u32; 3] {
    [pos.x.to_bits(), pos.y.to_bits(), pos.z.to_bits()]
}

/// Per-spot flag bits, stored as-is in chunk files
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct SpotFlags(pub u32);

impl SpotFlags {
    pub const VISITED: Self = Self(0x01);
    /// Permanently unwalkable; never connected
    pub const BLOCKED: Self = Self(0x02);
    /// Neighbors have been sampled from geometry
    pub const MAPPED: Self = Self(0x04);
    pub const WATER: Self = Self(0x08);
    pub const INDOORS: Self = Self(0x10);
    pub const CLOSE_TO_MODEL: Self = Self(0x20);

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn union(self, other: Self) -> Self {
        Self(self.0 | other.0)
    }

    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }
}

/// Index of a spot inside its chunk's arena
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct SpotId(pub u32);

/// Scratch state owned by one search.
///
/// Tagged with the search id; a mismatch means the values belong to an
/// earlier search and are reset before use.
#[derive(Clone, Copy, Debug)]
pub struct SearchState {
    pub search_id: u32,
    /// Previous spot on the best known route
    pub trace_back: Option<Vec3>,
    /// Accumulated route cost from the start
    pub cost: f32,
    /// Queue priority (cost plus heuristic)
    pub score: f32,
    pub closed: bool,
}

impl Default for SearchState {
    fn default() -> Self {
        Self {
            search_id: 0,
            trace_back: None,
            cost: f32::INFINITY,
            score: f32::INFINITY,
            closed: false,
        }
    }
}

/// A navigation node: a position with flags and outgoing neighbor positions
#[derive(Clone, Debug)]
pub struct Spot {
    pub pos: Vec3,
    pub flags: SpotFlags,
    paths: Vec<Vec3>,
    /// Next spot in the same cell, in insertion order
    pub(crate) next: Option<SpotId>,
    search: SearchState,
}

impl Spot {
    pub fn new(pos: Vec3, flags: SpotFlags) -> Self {
        Self {
            pos,
            flags,
            paths: Vec::new(),
            next: None,
            search: SearchState::default(),
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.flags.contains(SpotFlags::BLOCKED)
    }

    pub fn is_mapped(&self) -> bool {
        self.flags.contains(SpotFlags::MAPPED)
    }

    pub fn is_in_water(&self) -> bool {
        self.flags.contains(SpotFlags::WATER)
    }

    /// Neighbor positions
    pub fn paths(&self) -> &[Vec3] {
        &self.paths
    }

    pub fn has_path_to(&self, pos: Vec3) -> bool {
        self.paths.iter().any(|p| p.distance_squared(pos) < SAME_POSITION * SAME_POSITION)
    }

    /// Add a neighbor; returns false if it was already present
    pub fn add_path(&mut self, pos: Vec3) -> bool {
        if self.has_path_to(pos) {
            return false;
        }
        self.paths.push(pos);
        true
    }

    /// Remove a neighbor; returns false if it was not present
    pub fn remove_path(&mut self, pos: Vec3) -> bool {
        let before = self.paths.len();
        self.paths.retain(|p| p.distance_squared(pos) >= SAME_POSITION * SAME_POSITION);
        self.paths.len() != before
    }

    pub fn clear_paths(&mut self) {
        self.paths.clear();
    }

    pub fn distance_to(&self, pos: Vec3) -> f32 {
        self.pos.distance(pos)
    }

    pub fn distance_2d_to(&self, pos: Vec3) -> f32 {
        distance_2d(self.pos, pos)
    }

    /// Search state for `search_id`, reset first if it belongs to another search
    pub fn search_state(&mut self, search_id: u32) -> &mut SearchState {
        if self.search.search_id != search_id {
            self.search = SearchState {
                search_id,
                ..SearchState::default()
            };
        }
        &mut self.search
    }

    /// Search state if it belongs to `search_id`
    pub fn search_state_if(&self, search_id: u32) -> Option<&SearchState> {
        (self.search.search_id == search_id).then_some(&self.search)
    }

    pub(crate) fn restore_search_state(&mut self, state: SearchState) {
        self.search = state;
    }
}
