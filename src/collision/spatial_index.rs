//! Uniform XY grid over a region's triangles
//!
//! Built once per [`TriangleStore`] and immutable afterwards. Construction
//! fans out over rayon workers; each worker fills its own bucket map and the
//! maps are merged after all workers finish, so inserts never contend.

use std::collections::HashMap;

use rayon::prelude::*;

use crate::core::types::Vec2;
use crate::math::Rect;
use super::triangle_store::TriangleStore;

/// Smallest batch handed to one worker
const MIN_BATCH: usize = 256;

type Buckets = HashMap<(i32, i32), Vec<u32>>;

/// Grid cell -> indices of triangles overlapping that cell
#[derive(Debug)]
pub struct TriangleIndex {
    cell_size: f32,
    buckets: Buckets,
}

impl TriangleIndex {
    /// Build the index for every triangle in `store`
    pub fn build(store: &TriangleStore, cell_size: f32) -> Self {
        let count = store.len();
        let batch = (count / rayon::current_num_threads().max(1)).max(MIN_BATCH);
        let indices: Vec<u32> = (0..count as u32).collect();

        let partials: Vec<Buckets> = indices
            .par_chunks(batch)
            .map(|triangles| {
                let mut local = Buckets::new();
                for &index in triangles {
                    insert_triangle(&mut local, store, index, cell_size);
                }
                local
            })
            .collect();

        let mut buckets = Buckets::new();
        for partial in partials {
            for (cell, mut triangles) in partial {
                buckets.entry(cell).or_default().append(&mut triangles);
            }
        }
        for triangles in buckets.values_mut() {
            triangles.sort_unstable();
        }

        Self { cell_size, buckets }
    }

    pub fn cell_size(&self) -> f32 {
        self.cell_size
    }

    /// Number of non-empty cells
    pub fn cell_count(&self) -> usize {
        self.buckets.len()
    }

    fn cell_of(&self, v: f32) -> i32 {
        (v / self.cell_size).floor() as i32
    }

    /// Deduplicated triangles in cells overlapping the rectangle
    pub fn query_range(&self, x0: f32, y0: f32, x1: f32, y1: f32) -> Vec<u32> {
        let (cx0, cx1) = (self.cell_of(x0.min(x1)), self.cell_of(x0.max(x1)));
        let (cy0, cy1) = (self.cell_of(y0.min(y1)), self.cell_of(y0.max(y1)));

        let mut result = Vec::new();
        for cx in cx0..=cx1 {
            for cy in cy0..=cy1 {
                if let Some(triangles) = self.buckets.get(&(cx, cy)) {
                    result.extend_from_slice(triangles);
                }
            }
        }
        result.sort_unstable();
        result.dedup();
        result
    }

    /// Deduplicated triangles in cells within `range` of (x, y)
    pub fn query_close(&self, x: f32, y: f32, range: f32) -> Vec<u32> {
        self.query_range(x - range, y - range, x + range, y + range)
    }
}

/// Record a triangle in every cell its XY projection actually overlaps
fn insert_triangle(buckets: &mut Buckets, store: &TriangleStore, index: u32, cell_size: f32) {
    let corners = store.corners(index).map(|v| v.truncate());
    let [a, b, c] = corners;
    let bounds = Rect::enclosing(&corners);

    let cx0 = (bounds.min.x / cell_size).floor() as i32;
    let cx1 = (bounds.max.x / cell_size).floor() as i32;
    let cy0 = (bounds.min.y / cell_size).floor() as i32;
    let cy1 = (bounds.max.y / cell_size).floor() as i32;

    for cx in cx0..=cx1 {
        for cy in cy0..=cy1 {
            let min = Vec2::new(cx as f32, cy as f32) * cell_size;
            let cell = Rect::new(min, min + Vec2::splat(cell_size));
            if cell.overlaps_triangle(a, b, c) {
                buckets.entry((cx, cy)).or_default().push(index);
            }
        }
    }
}
