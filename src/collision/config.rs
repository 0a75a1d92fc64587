//! Collision world configuration

use serde::{Deserialize, Serialize};

use crate::core::{Error, Result};

/// Side length of one terrain tile in world units
pub const TILE_SIZE: f32 = 533.333_3;

/// Configuration for the collision world and its agent probes
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollisionConfig {
    /// Side length of a cached triangle region in world units
    pub region_size: f32,
    /// Cell size of the per-region triangle grid index
    pub index_cell_size: f32,
    /// Maximum number of regions kept in memory
    pub region_cache_capacity: usize,
    /// Agent height used for obstruction probes
    pub agent_height: f32,
    /// Agent radius used for obstruction probes
    pub agent_radius: f32,
    /// Steepest walkable surface in degrees
    pub max_standable_angle_deg: f32,
}

impl Default for CollisionConfig {
    fn default() -> Self {
        Self {
            region_size: TILE_SIZE,
            index_cell_size: 4.0,
            region_cache_capacity: 32,
            agent_height: 2.0,
            agent_radius: 0.5,
            max_standable_angle_deg: 51.0,
        }
    }
}

impl CollisionConfig {
    /// Check that sizes are positive and the slope limit is a real angle
    pub fn validate(&self) -> Result<()> {
        let sizes = [
            ("region_size", self.region_size),
            ("index_cell_size", self.index_cell_size),
            ("agent_height", self.agent_height),
            ("agent_radius", self.agent_radius),
        ];
        for (name, value) in sizes {
            if !(value.is_finite() && value > 0.0) {
                return Err(Error::Config(format!("{name} must be positive and finite, got {value}")));
            }
        }
        if !(self.max_standable_angle_deg > 0.0 && self.max_standable_angle_deg < 90.0) {
            return Err(Error::Config(format!(
                "max_standable_angle_deg must lie in (0, 90), got {}",
                self.max_standable_angle_deg
            )));
        }
        Ok(())
    }

    /// Minimum vertical component of a standable triangle's unit normal
    pub fn max_slope_cos(&self) -> f32 {
        self.max_standable_angle_deg.to_radians().cos()
    }

    /// Maximum rise over run for a walkable step
    pub fn max_slope_tan(&self) -> f32 {
        self.max_standable_angle_deg.to_radians().tan()
    }
}
