//! Route search over the path graph.
//!
//! A best-first search using a `BinaryHeap` (min-heap via reversed ordering).
//! Scratch state lives on the spots themselves, tagged with the search id.
//! The graph is grown with [`PathGraph::expand`] as the frontier advances, so
//! a search over unexplored terrain maps it as a side effect.

use std::cmp::Ordering;
use std::collections::BinaryHeap;
use std::time::{Duration, Instant};

use super::path_graph::{PathGraph, SpotRef};
use crate::collision::{TriangleSupplier, TriangleTypes};
use crate::core::types::{distance_2d, Vec3};

/// How neighbor costs and queue priorities are computed
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum SearchStrategy {
    /// Accumulated length plus a penalty for changing direction; no heuristic
    Plain,
    /// Accumulated length plus weighted straight-line distance to the goal.
    /// Edges into water cost extra.
    #[default]
    AStar,
    /// `AStar`, also steering away from clutter and uneven ground
    AStarAvoidance,
}

/// Why a search stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SearchOutcome {
    /// A spot within tolerance of the goal was reached
    Reached,
    /// No spot got closer to the goal for the progress timeout
    Stagnated,
    /// The absolute timeout ran out
    TimedOut,
    /// Every reachable spot was closed
    Exhausted,
}

/// Summary of one search
#[derive(Clone, Debug)]
pub struct SearchReport {
    pub search_id: u32,
    pub strategy: SearchStrategy,
    pub outcome: SearchOutcome,
    /// Spots popped and closed
    pub closed: usize,
    /// Spots created by expansion during the search
    pub created: usize,
    /// Distance from the closest spot reached to the goal
    pub closest_distance: f32,
    pub elapsed: Duration,
}

/// Entry in the open set (min-heap via reversed ordering).
///
/// Equal scores pop in insertion order.
struct OpenEntry {
    score: f32,
    seq: u64,
    pos: Vec3,
}

impl PartialEq for OpenEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for OpenEntry {}

impl PartialOrd for OpenEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for OpenEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for min-heap: smallest score is "greatest"
        other
            .score
            .total_cmp(&self.score)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

struct OpenSet {
    heap: BinaryHeap<OpenEntry>,
    seq: u64,
}

impl OpenSet {
    fn new() -> Self {
        Self {
            heap: BinaryHeap::new(),
            seq: 0,
        }
    }

    fn push(&mut self, pos: Vec3, score: f32) {
        self.heap.push(OpenEntry {
            score,
            seq: self.seq,
            pos,
        });
        self.seq += 1;
    }

    fn pop(&mut self) -> Option<OpenEntry> {
        self.heap.pop()
    }
}

/// Is `pos` close enough to count as arriving at `goal`
fn within_tolerance(pos: Vec3, goal: Vec3, tolerance: f32) -> bool {
    pos.distance(goal) <= tolerance || distance_2d(pos, goal) <= tolerance * 0.5
}

impl<S: TriangleSupplier> PathGraph<S> {
    /// Find a route from `from` to `to`.
    ///
    /// Blocks until the goal is reached or the search gives up. A search that
    /// gives up still returns the route to the closest spot it found when that
    /// spot is within `max_range_from_target` of the goal. A search may touch
    /// more chunks than the cache holds; chunks evicted on the way keep their
    /// search state until they are reloaded.
    ///
    /// # Arguments
    /// * `from` - Start position; reuses a free spot within `tolerance / 2`
    /// * `to` - Goal position, snapped the same way
    /// * `strategy` - Cost model for the search
    /// * `tolerance` - Arrival distance around the goal
    ///
    /// # Returns
    /// Waypoints from start to goal, or `None` if nothing came close enough.
    /// The raw `to` is appended when the last waypoint is further from it
    /// than `max_range_from_target`.
    pub fn create_path(
        &mut self,
        from: Vec3,
        to: Vec3,
        strategy: SearchStrategy,
        tolerance: f32,
    ) -> Option<Vec<Vec3>> {
        self.create_path_with_report(from, to, strategy, tolerance).0
    }

    /// [`create_path`](Self::create_path) plus a summary of the search
    pub fn create_path_with_report(
        &mut self,
        from: Vec3,
        to: Vec3,
        strategy: SearchStrategy,
        tolerance: f32,
    ) -> (Option<Vec<Vec3>>, SearchReport) {
        let started = Instant::now();
        self.search_id = self.search_id.wrapping_add(1).max(1);
        let search_id = self.search_id;
        self.parked.clear();

        let start = self.endpoint(from, tolerance);
        let goal_spot = self.endpoint(to, tolerance);
        let start_pos = self.spot(start).map_or(from, |s| s.pos);
        let goal = self.spot(goal_spot).map_or(to, |s| s.pos);

        let progress_timeout = self.config.progress_timeout();
        let search_timeout = self.config.search_timeout();

        let mut open = OpenSet::new();
        let start_score = self.heuristic(strategy, start_pos, goal);
        if let Some(state) = self.search_state(start) {
            state.cost = 0.0;
            state.score = start_score;
            state.trace_back = None;
            open.push(start_pos, start_score);
        }

        self.current = None;
        self.closest = Some(start_pos);
        let mut closest_distance = start_pos.distance(to);
        let mut last_progress = Instant::now();
        let mut closed = 0;
        let mut created = 0;

        let (outcome, terminal) = loop {
            if started.elapsed() > search_timeout {
                break (SearchOutcome::TimedOut, None);
            }
            if last_progress.elapsed() > progress_timeout {
                break (SearchOutcome::Stagnated, None);
            }
            let Some(entry) = open.pop() else {
                break (SearchOutcome::Exhausted, None);
            };
            let pos = entry.pos;
            let Some(at) = self.get_spot(pos) else {
                continue;
            };
            let Some(state) = self.search_state(at) else {
                continue;
            };
            if state.closed || entry.score > state.score {
                continue;
            }
            state.closed = true;
            let cost = state.cost;
            let trace_back = state.trace_back;
            self.mark_visited(at);
            closed += 1;

            self.current = Some(pos);
            self.world.ensure_loaded(pos.x, pos.y);

            let distance = pos.distance(to);
            if distance < closest_distance {
                closest_distance = distance;
                self.closest = Some(pos);
                last_progress = Instant::now();
            }
            if within_tolerance(pos, goal, tolerance) {
                break (SearchOutcome::Reached, Some(pos));
            }

            created += self.expand(at);
            let Some(neighbors) = self.spot_at(pos).map(|s| s.paths().to_vec()) else {
                continue;
            };
            let heading = trace_back.map(|prev| (pos - prev).normalize_or_zero());

            for next in neighbors {
                let Some(next_at) = self.get_spot(next) else {
                    continue;
                };
                let Some(next_spot) = self.spot(next_at) else {
                    continue;
                };
                if next_spot.is_blocked() {
                    continue;
                }
                let next = next_spot.pos;
                let in_water = next_spot.is_in_water();

                let edge = self.edge_cost(strategy, pos, next, heading, in_water);
                let new_cost = cost + edge;
                let score = match strategy {
                    SearchStrategy::Plain => new_cost,
                    _ => new_cost + self.heuristic(strategy, next, goal),
                };

                let Some(next_state) = self.search_state(next_at) else {
                    continue;
                };
                if next_state.closed || new_cost >= next_state.cost {
                    continue;
                }
                next_state.cost = new_cost;
                next_state.score = score;
                next_state.trace_back = Some(pos);
                open.push(next, score);
            }
        };

        let max_range = self.config.max_range_from_target;
        let terminal = terminal.or_else(|| {
            self.closest
                .filter(|pos| pos.distance(to) <= max_range)
        });
        let path = terminal.and_then(|end| {
            let mut path = self.trace_path(end, closed)?;
            if end.distance(to) > max_range {
                path.push(to);
            }
            Some(path)
        });
        self.parked.clear();

        let report = SearchReport {
            search_id,
            strategy,
            outcome,
            closed,
            created,
            closest_distance,
            elapsed: started.elapsed(),
        };
        log::info!(
            "Search {} {:?}: {:?} after {} spots ({} new) in {:.1}ms, closest {:.1}, {}",
            search_id,
            strategy,
            outcome,
            closed,
            created,
            report.elapsed.as_secs_f64() * 1000.0,
            closest_distance,
            match &path {
                Some(p) => format!("{} waypoints", p.len()),
                None => "no path".to_string(),
            }
        );
        (path, report)
    }

    /// Spot to start or end a search at: the nearest free spot within half
    /// the tolerance, or a new one linked into the graph
    fn endpoint(&mut self, pos: Vec3, tolerance: f32) -> SpotRef {
        match self.closest_spot(pos, tolerance * 0.5) {
            Some(at) => at,
            None => self.add_and_connect_spot(pos),
        }
    }

    fn heuristic(&self, strategy: SearchStrategy, pos: Vec3, goal: Vec3) -> f32 {
        match strategy {
            SearchStrategy::Plain => 0.0,
            SearchStrategy::AStar | SearchStrategy::AStarAvoidance => {
                pos.distance(goal) * self.config.heuristic_weight
            }
        }
    }

    fn edge_cost(
        &mut self,
        strategy: SearchStrategy,
        from: Vec3,
        to: Vec3,
        heading: Option<Vec3>,
        in_water: bool,
    ) -> f32 {
        let length = from.distance(to);
        match strategy {
            SearchStrategy::Plain => {
                let turn = heading.map_or(0.0, |h| h.distance((to - from).normalize_or_zero()));
                length + turn * self.config.turn_weight
            }
            SearchStrategy::AStar | SearchStrategy::AStarAvoidance => {
                let mut cost = length;
                if in_water {
                    cost += self.config.water_penalty;
                }
                if strategy == SearchStrategy::AStarAvoidance {
                    let range = self.config.avoidance_range;
                    if self.world.is_close_to_type(to.x, to.y, to.z, range, TriangleTypes::CLUTTER) {
                        cost += self.config.clutter_penalty;
                    }
                    let gradient = self.world.gradient_score(to.x, to.y, range);
                    cost += gradient as f32 * self.config.gradient_weight;
                }
                cost
            }
        }
    }

    /// Follow trace-back links from `end` to the search start
    fn trace_path(&mut self, end: Vec3, limit: usize) -> Option<Vec<Vec3>> {
        let search_id = self.search_id;
        let mut path = vec![end];
        let mut pos = end;
        loop {
            let Some(spot) = self.spot_at(pos) else {
                log::warn!("Trace back lost spot {pos:?} in search {search_id}");
                return None;
            };
            let Some(state) = spot.search_state_if(search_id) else {
                log::warn!("Trace back hit stale spot {pos:?} in search {search_id}");
                return None;
            };
            let Some(prev) = state.trace_back else {
                break;
            };
            if path.len() > limit {
                log::warn!("Trace back did not terminate in search {search_id}");
                return None;
            }
            path.push(prev);
            pos = prev;
        }
        path.reverse();
        Some(path)
    }
}
