//! Collision world: cached regional meshes and the probes run against them

use crate::cache::LruCache;
use crate::core::types::{distance_2d, Vec3};
use crate::math::{Aabb, Rect, Segment};
use super::config::CollisionConfig;
use super::spatial_index::TriangleIndex;
use super::supplier::TriangleSupplier;
use super::triangle_store::{TriangleStore, TriangleType, TriangleTypes};

/// Offset added to world x/y so that region and chunk coordinates are positive
/// (half of a 64 x 64 tile map).
pub const WORLD_BIAS: f32 = 32.0 * super::config::TILE_SIZE;

/// Half-width of the XY window used by point probes
const POINT_PROBE: f32 = 0.01;

/// Height differences below this never count as a ledge
const LEDGE_FLOOR: f32 = 1.0;

/// Share of the step length a midpoint may deviate before it is a ledge
const LEDGE_RATIO: f32 = 0.75;

/// Vertical search band used when no height hint is available
const SURFACE_BAND: f32 = 10_000.0;

/// Integer coordinate of a cached triangle region
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct RegionCoord {
    pub x: i32,
    pub y: i32,
}

impl RegionCoord {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// A triangle copied out of a region for probing
#[derive(Clone, Copy, Debug)]
struct ProbeTriangle {
    corners: [Vec3; 3],
    normal: Vec3,
    kind: TriangleType,
}

impl ProbeTriangle {
    fn hit(&self, segment: &Segment) -> Option<f32> {
        let [a, b, c] = self.corners;
        segment.intersect_triangle(a, b, c)
    }
}

/// One loaded region: its mesh and grid index
struct Region {
    store: TriangleStore,
    index: TriangleIndex,
}

/// Geometry queries over on-demand loaded triangle regions.
///
/// Queries take `&mut self` because touching a region that is not resident
/// loads it synchronously from the supplier and may evict another one.
pub struct CollisionWorld<S> {
    supplier: S,
    config: CollisionConfig,
    regions: LruCache<RegionCoord, Region>,
    max_slope_cos: f32,
    max_slope_tan: f32,
}

impl<S: TriangleSupplier> CollisionWorld<S> {
    pub fn new(supplier: S, config: CollisionConfig) -> Self {
        // A single probe window can span four regions
        let capacity = config.region_cache_capacity.max(4);
        Self {
            supplier,
            regions: LruCache::new(capacity),
            max_slope_cos: config.max_slope_cos(),
            max_slope_tan: config.max_slope_tan(),
            config,
        }
    }

    pub fn config(&self) -> &CollisionConfig {
        &self.config
    }

    pub fn supplier(&self) -> &S {
        &self.supplier
    }

    pub fn supplier_mut(&mut self) -> &mut S {
        &mut self.supplier
    }

    /// Number of resident regions
    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    pub fn is_region_loaded(&self, coord: RegionCoord) -> bool {
        self.regions.contains(coord)
    }

    /// Region containing a world position
    pub fn region_coord(&self, x: f32, y: f32) -> RegionCoord {
        let size = self.config.region_size;
        RegionCoord::new(
            ((x + WORLD_BIAS) / size).floor() as i32,
            ((y + WORLD_BIAS) / size).floor() as i32,
        )
    }

    /// Make sure the region holding (x, y) is resident
    pub fn ensure_loaded(&mut self, x: f32, y: f32) {
        let coord = self.region_coord(x, y);
        self.load_region(coord);
    }

    fn load_region(&mut self, coord: RegionCoord) {
        if self.regions.get(coord).is_some() {
            return;
        }

        let size = self.config.region_size;
        let min_x = coord.x as f32 * size - WORLD_BIAS;
        let min_y = coord.y as f32 * size - WORLD_BIAS;
        let (max_x, max_y) = (min_x + size, min_y + size);

        let start = std::time::Instant::now();
        let supplied = self.supplier.get_triangles(min_x, min_y, max_x, max_y);

        let mut store = TriangleStore::new(Aabb::column(min_x, min_y, max_x, max_y));
        for tri in &supplied {
            let [a, b, c] = tri.vertices;
            store.add_triangle(a, b, c, tri.kind);
        }
        store.finish();
        let index = TriangleIndex::build(&store, self.config.index_cell_size);

        log::debug!(
            "Loaded region ({}, {}): {} of {} triangles kept, {} cells in {:.1}ms",
            coord.x, coord.y, store.len(), supplied.len(), index.cell_count(),
            start.elapsed().as_secs_f64() * 1000.0
        );

        if let Some((evicted, _)) = self.regions.insert(coord, Region { store, index }) {
            log::debug!("Evicted region ({}, {})", evicted.x, evicted.y);
        }
    }

    /// Copy out all triangles whose cells overlap `rect`
    fn triangles_in(&mut self, rect: Rect) -> Vec<ProbeTriangle> {
        let lo = self.region_coord(rect.min.x, rect.min.y);
        let hi = self.region_coord(rect.max.x, rect.max.y);

        let mut found = Vec::new();
        for rx in lo.x..=hi.x {
            for ry in lo.y..=hi.y {
                let coord = RegionCoord::new(rx, ry);
                self.load_region(coord);
                let Some(region) = self.regions.get(coord) else {
                    continue;
                };
                let hits = region.index.query_range(rect.min.x, rect.min.y, rect.max.x, rect.max.y);
                found.extend(hits.into_iter().map(|i| ProbeTriangle {
                    corners: region.store.corners(i),
                    normal: region.store.normal(i),
                    kind: region.store.triangle(i).kind,
                }));
            }
        }
        found
    }

    /// Find where an agent can stand at (x, y) between `z_min` and `z_max`.
    ///
    /// Surfaces that are too steep, of a type outside `allowed`, or obstructed
    /// for an agent of the given size are skipped. Of the rest, the one closest
    /// to the upper three-quarter point of the band wins.
    pub fn standable_at(
        &mut self,
        x: f32,
        y: f32,
        z_min: f32,
        z_max: f32,
        height: f32,
        radius: f32,
        allowed: TriangleTypes,
    ) -> Option<(f32, TriangleType)> {
        let probe = Segment::vertical(x, y, z_max, z_min);
        let target = z_min + (z_max - z_min) * 0.75;

        let mut best: Option<(f32, TriangleType)> = None;
        for tri in self.triangles_in(Rect::around(x, y, POINT_PROBE)) {
            if !allowed.contains(tri.kind) || tri.normal.z.abs() < self.max_slope_cos {
                continue;
            }
            let Some(t) = tri.hit(&probe) else {
                continue;
            };
            let z = probe.at(t).z;
            if best.is_some_and(|(best_z, _)| (best_z - target).abs() <= (z - target).abs()) {
                continue;
            }
            if self.is_spot_blocked(x, y, z, height, radius) {
                continue;
            }
            best = Some((z, tri.kind));
        }
        best
    }

    /// Would an agent standing at (x, y, z) intersect solid geometry
    pub fn is_spot_blocked(&mut self, x: f32, y: f32, z: f32, height: f32, radius: f32) -> bool {
        let feet = Vec3::new(x, y, z);
        let body = Segment::new(feet + Vec3::Z * (height * 0.25), feet + Vec3::Z * height);
        let waist = feet + Vec3::Z * (height * 0.6);
        let across_x = Segment::new(waist - Vec3::X * radius, waist + Vec3::X * radius);
        let across_y = Segment::new(waist - Vec3::Y * radius, waist + Vec3::Y * radius);

        let triangles = self.triangles_in(Rect::around(x, y, radius + POINT_PROBE));
        triangles.iter().any(|tri| {
            tri.kind != TriangleType::Water
                && [&body, &across_x, &across_y].iter().any(|seg| tri.hit(seg).is_some())
        })
    }

    /// True if no solid (non-water) triangle crosses the segment `a -> b`
    pub fn line_of_sight(&mut self, a: Vec3, b: Vec3) -> bool {
        let segment = Segment::new(a, b);
        let triangles = self.triangles_in(segment.bounds_2d(POINT_PROBE));
        !triangles
            .iter()
            .any(|tri| tri.kind != TriangleType::Water && tri.hit(&segment).is_some())
    }

    /// Is walking from `a` to `b` impossible for an agent of the given size.
    ///
    /// A step is rejected when it is too steep, when the ground under its
    /// midpoint is missing or far off the straight line (a ledge), or when any
    /// of three probe lines at waist height hits solid geometry: the centerline
    /// and two copies offset sideways to catch thin walls.
    pub fn step_blocked(&mut self, a: Vec3, b: Vec3, height: f32, radius: f32) -> bool {
        let run = distance_2d(a, b);
        let rise = (b.z - a.z).abs();
        if run < 1e-4 {
            return rise > 1e-3;
        }
        if rise / run > self.max_slope_tan {
            return true;
        }

        let step = a.distance(b);
        let mid = (a + b) * 0.5;
        match self.standable_at(mid.x, mid.y, mid.z - step, mid.z + step, height, radius, TriangleTypes::ALL) {
            None => return true,
            Some((z, _)) => {
                let deviation = (z - mid.z).abs();
                if deviation > step * LEDGE_RATIO && deviation > LEDGE_FLOOR {
                    return true;
                }
            }
        }

        let lift = Vec3::Z * (height * 0.5);
        let dir = (b - a).truncate().normalize();
        let side = Vec3::new(-dir.y, dir.x, 0.0) * (radius * 0.5);
        let (from, to) = (a + lift, b + lift);
        !(self.line_of_sight(from, to)
            && self.line_of_sight(from + side, to + side)
            && self.line_of_sight(from - side, to - side))
    }

    /// Is there geometry of the given types within `range` of (x, y) at body height
    pub fn is_close_to_type(&mut self, x: f32, y: f32, z: f32, range: f32, types: TriangleTypes) -> bool {
        let height = self.config.agent_height;
        let (band_lo, band_hi) = (z + height * 0.25, z + height);
        let area = Rect::around(x, y, range);

        self.triangles_in(area).iter().any(|tri| {
            if !types.contains(tri.kind) {
                return false;
            }
            let lo = tri.corners.iter().map(|v| v.z).fold(f32::INFINITY, f32::min);
            let hi = tri.corners.iter().map(|v| v.z).fold(f32::NEG_INFINITY, f32::max);
            if hi < band_lo || lo > band_hi {
                return false;
            }
            let [a, b, c] = tri.corners.map(|v| v.truncate());
            area.overlaps_triangle(a, b, c)
        })
    }

    /// Highest solid surface at (x, y), ignoring slope and obstruction
    pub fn surface_height(&mut self, x: f32, y: f32) -> Option<f32> {
        let probe = Segment::vertical(x, y, SURFACE_BAND, -SURFACE_BAND);
        self.triangles_in(Rect::around(x, y, POINT_PROBE))
            .iter()
            .filter(|tri| tri.kind != TriangleType::Water)
            .filter_map(|tri| tri.hit(&probe))
            .map(|t| probe.at(t).z)
            .reduce(f32::max)
    }

    /// Local unevenness around (x, y): summed height differences to eight
    /// samples on a ring of the given radius. Missing ground scores `range`.
    pub fn gradient_score(&mut self, x: f32, y: f32, range: f32) -> i32 {
        let Some(center) = self.surface_height(x, y) else {
            return 0;
        };

        let mut score = 0.0;
        for i in 0..8 {
            let angle = i as f32 * std::f32::consts::FRAC_PI_4;
            let (sx, sy) = (x + angle.cos() * range, y + angle.sin() * range);
            score += match self.surface_height(sx, sy) {
                Some(z) => (z - center).abs(),
                None => range,
            };
        }
        score.round() as i32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collision::supplier::{MeshSupplier, SuppliedTriangle};
    use crate::core::types::Vec2;

    const H: f32 = 2.0;
    const R: f32 = 0.5;

    fn flat_world() -> CollisionWorld<MeshSupplier> {
        let mut supplier = MeshSupplier::new();
        supplier.add_flat_ground(Vec2::splat(-50.0), Vec2::splat(50.0), 0.0, 5.0, TriangleType::Terrain);
        CollisionWorld::new(supplier, CollisionConfig::default())
    }

    /// Ramp rising along +x with the given angle, spanning x in 0..20
    fn ramp_world(angle_deg: f32) -> CollisionWorld<MeshSupplier> {
        let rise = 20.0 * angle_deg.to_radians().tan();
        let mut supplier = MeshSupplier::new();
        supplier.add_quad(
            [
                Vec3::new(0.0, -10.0, 0.0),
                Vec3::new(20.0, -10.0, rise),
                Vec3::new(20.0, 10.0, rise),
                Vec3::new(0.0, 10.0, 0.0),
            ],
            TriangleType::Terrain,
        );
        CollisionWorld::new(supplier, CollisionConfig::default())
    }

    #[test]
    fn test_region_coord_biased_positive() {
        let world = flat_world();
        let origin = world.region_coord(0.0, 0.0);
        assert_eq!(origin, RegionCoord::new(32, 32));
        assert_eq!(world.region_coord(-1.0, -1.0), RegionCoord::new(31, 31));
    }

    #[test]
    fn test_region_loaded_once() {
        let mut world = flat_world();
        world.ensure_loaded(1.0, 1.0);
        world.ensure_loaded(2.0, 2.0);
        assert_eq!(world.region_count(), 1);
        assert_eq!(world.supplier().requests(), 1);
    }

    #[test]
    fn test_region_cache_bounded() {
        let mut config = CollisionConfig::default();
        config.region_cache_capacity = 4;
        let mut world = CollisionWorld::new(MeshSupplier::new(), config);
        for i in 0..6 {
            world.ensure_loaded(i as f32 * 600.0, 0.0);
        }
        assert_eq!(world.region_count(), 4);
        assert!(!world.is_region_loaded(world.region_coord(0.0, 0.0)));
    }

    #[test]
    fn test_standable_on_flat_ground() {
        let mut world = flat_world();
        let (z, kind) = world
            .standable_at(3.3, 4.4, -5.0, 5.0, H, R, TriangleTypes::ALL)
            .unwrap();
        assert!(z.abs() < 1e-4);
        assert_eq!(kind, TriangleType::Terrain);
    }

    #[test]
    fn test_missing_geometry_is_unstandable() {
        let mut world = CollisionWorld::new(MeshSupplier::new(), CollisionConfig::default());
        assert!(world.standable_at(0.0, 0.0, -5.0, 5.0, H, R, TriangleTypes::ALL).is_none());
    }

    #[test]
    fn test_disallowed_type_skipped() {
        let mut world = flat_world();
        let allowed = TriangleTypes::single(TriangleType::Water);
        assert!(world.standable_at(1.0, 1.0, -5.0, 5.0, H, R, allowed).is_none());
    }

    #[test]
    fn test_slope_rejection() {
        let mut gentle = ramp_world(30.0);
        assert!(gentle.standable_at(10.0, 0.0, -20.0, 30.0, H, R, TriangleTypes::ALL).is_some());

        let mut steep = ramp_world(60.0);
        assert!(steep.standable_at(10.0, 0.0, -50.0, 60.0, H, R, TriangleTypes::ALL).is_none());
    }

    #[test]
    fn test_standable_prefers_upper_band() {
        let mut supplier = MeshSupplier::new();
        supplier.add_flat_ground(Vec2::splat(-20.0), Vec2::splat(20.0), 0.0, 10.0, TriangleType::Terrain);
        supplier.add_flat_ground(Vec2::splat(-20.0), Vec2::splat(20.0), 6.0, 10.0, TriangleType::Model);
        let mut world = CollisionWorld::new(supplier, CollisionConfig::default());

        // Band -2..10, target 7: the upper floor wins
        let (z, kind) = world.standable_at(1.0, 1.0, -2.0, 10.0, H, R, TriangleTypes::ALL).unwrap();
        assert!((z - 6.0).abs() < 1e-4);
        assert_eq!(kind, TriangleType::Model);
    }

    #[test]
    fn test_low_ceiling_blocks_standing() {
        let mut supplier = MeshSupplier::new();
        supplier.add_flat_ground(Vec2::splat(-20.0), Vec2::splat(20.0), 0.0, 10.0, TriangleType::Terrain);
        supplier.add_flat_ground(Vec2::splat(-20.0), Vec2::splat(20.0), 1.0, 10.0, TriangleType::Model);
        let mut world = CollisionWorld::new(supplier, CollisionConfig::default());

        // Only the ceiling itself is left to stand on
        let (z, _) = world.standable_at(1.0, 1.0, -2.0, 3.0, H, R, TriangleTypes::ALL).unwrap();
        assert!((z - 1.0).abs() < 1e-4);
        assert!(world.is_spot_blocked(1.0, 1.0, 0.0, H, R));
    }

    #[test]
    fn test_line_of_sight_through_wall() {
        let mut supplier = MeshSupplier::new();
        supplier.add_wall(Vec2::new(5.0, -5.0), Vec2::new(5.0, 5.0), 0.0, 4.0, TriangleType::Object);
        let mut world = CollisionWorld::new(supplier, CollisionConfig::default());

        assert!(!world.line_of_sight(Vec3::new(0.0, 0.0, 1.0), Vec3::new(10.0, 0.0, 1.0)));
        assert!(world.line_of_sight(Vec3::new(0.0, 0.0, 5.0), Vec3::new(10.0, 0.0, 5.0)));
        assert!(world.line_of_sight(Vec3::new(0.0, 0.0, 1.0), Vec3::new(4.0, 0.0, 1.0)));
    }

    #[test]
    fn test_water_does_not_block_sight() {
        let mut supplier = MeshSupplier::new();
        supplier.add_wall(Vec2::new(5.0, -5.0), Vec2::new(5.0, 5.0), 0.0, 4.0, TriangleType::Water);
        let mut world = CollisionWorld::new(supplier, CollisionConfig::default());
        assert!(world.line_of_sight(Vec3::new(0.0, 0.0, 1.0), Vec3::new(10.0, 0.0, 1.0)));
    }

    #[test]
    fn test_step_on_flat_ground() {
        let mut world = flat_world();
        assert!(!world.step_blocked(Vec3::ZERO, Vec3::new(3.0, 0.0, 0.0), H, R));
    }

    #[test]
    fn test_step_too_steep() {
        let mut world = flat_world();
        assert!(world.step_blocked(Vec3::ZERO, Vec3::new(1.0, 0.0, 3.0), H, R));
    }

    #[test]
    fn test_step_over_gap_is_blocked() {
        let mut supplier = MeshSupplier::new();
        supplier.add_flat_ground(Vec2::new(-10.0, -10.0), Vec2::new(1.0, 10.0), 0.0, 1.0, TriangleType::Terrain);
        supplier.add_flat_ground(Vec2::new(3.0, -10.0), Vec2::new(10.0, 10.0), 0.0, 1.0, TriangleType::Terrain);
        let mut world = CollisionWorld::new(supplier, CollisionConfig::default());
        assert!(world.step_blocked(Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0), H, R));
    }

    #[test]
    fn test_step_catches_thin_wall() {
        let mut world = flat_world();
        world.supplier_mut().push(SuppliedTriangle::new(
            Vec3::new(2.0, -3.0, 0.0),
            Vec3::new(2.0, 3.0, 0.0),
            Vec3::new(2.0, 0.0, 3.0),
            TriangleType::Object,
        ));
        assert!(world.step_blocked(Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0), H, R));
    }

    #[test]
    fn test_step_catches_post_beside_centerline() {
        let mut world = flat_world();
        // Thin post a quarter radius off the walking line, clear of the midpoint
        world.supplier_mut().add_wall(Vec2::new(3.0, 0.1), Vec2::new(3.0, 0.4), -1.0, 4.0, TriangleType::Object);
        let (a, b) = (Vec3::ZERO, Vec3::new(4.0, 0.0, 0.0));
        let lift = Vec3::Z * (H * 0.5);

        assert!(world.line_of_sight(a + lift, b + lift));
        assert!(world.standable_at(2.0, 0.0, -4.0, 4.0, H, R, TriangleTypes::ALL).is_some());
        assert!(world.step_blocked(a, b, H, R));
        // Mirrored to the other side as well
        assert!(world.step_blocked(b, a, H, R));
    }

    #[test]
    fn test_close_to_model() {
        let mut world = flat_world();
        world.supplier_mut().add_wall(Vec2::new(2.0, -5.0), Vec2::new(2.0, 5.0), 0.0, 5.0, TriangleType::Model);
        assert!(world.is_close_to_type(0.0, 0.0, 0.0, 3.0, TriangleTypes::CLUTTER));
        assert!(!world.is_close_to_type(-5.0, 0.0, 0.0, 3.0, TriangleTypes::CLUTTER));
        // Terrain under the feet never counts
        assert!(!world.is_close_to_type(-5.0, 0.0, 0.0, 3.0, TriangleTypes::single(TriangleType::Terrain)));
    }

    #[test]
    fn test_gradient_score() {
        let mut flat = flat_world();
        assert_eq!(flat.gradient_score(0.0, 0.0, 3.0), 0);

        let mut ramp = ramp_world(30.0);
        assert!(ramp.gradient_score(10.0, 0.0, 3.0) > 0);
    }
}
