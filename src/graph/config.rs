//! Path graph configuration

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::collision::CollisionConfig;
use crate::core::{Error, Result};

/// Fewest chunks the cache may hold; one expansion touches at most four
pub const MIN_CHUNK_CACHE: usize = 8;

/// Configuration for graph growth, persistence and search
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GraphConfig {
    /// Directory holding one file per graph chunk
    pub chunk_dir: PathBuf,
    /// Maximum number of resident graph chunks
    pub chunk_cache_capacity: usize,
    /// Shortest step; also sets the height tolerance for spot lookups
    pub min_step_length: f32,
    /// Radius at which frontier expansion samples new spots
    pub wanted_step_length: f32,
    /// Longest edge between two spots
    pub max_step_length: f32,
    /// Give up after this long without getting closer to the goal
    pub progress_timeout_secs: f32,
    /// Give up after this long in total
    pub search_timeout_secs: f32,
    /// A failed search still returns a path if it got this close
    pub max_range_from_target: f32,
    /// Multiplier on the straight-line heuristic
    pub heuristic_weight: f32,
    /// Weight of the direction-change cost in plain search
    pub turn_weight: f32,
    /// Added to edges ending in water
    pub water_penalty: f32,
    /// Added to edges ending near model or object geometry
    pub clutter_penalty: f32,
    /// Multiplier on the local gradient score
    pub gradient_weight: f32,
    /// Range of the clutter and gradient probes
    pub avoidance_range: f32,
    /// Collision world settings
    pub collision: CollisionConfig,
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            chunk_dir: PathBuf::from("pathgraph"),
            chunk_cache_capacity: 64,
            min_step_length: 2.0,
            wanted_step_length: 3.0,
            max_step_length: 5.0,
            progress_timeout_secs: 5.0,
            search_timeout_secs: 30.0,
            max_range_from_target: 40.0,
            heuristic_weight: 5.0,
            turn_weight: 1.0,
            water_penalty: 500.0,
            clutter_penalty: 50.0,
            gradient_weight: 1.0,
            avoidance_range: 5.0,
            collision: CollisionConfig::default(),
        }
    }
}

impl GraphConfig {
    /// Defaults with chunks stored under `chunk_dir`
    pub fn with_chunk_dir(chunk_dir: impl Into<PathBuf>) -> Self {
        Self {
            chunk_dir: chunk_dir.into(),
            ..Default::default()
        }
    }

    /// Load overrides from a JSON file; missing fields keep their defaults
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)?;
        let config: Self = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    /// Check that step lengths, timeouts and collision sizes make sense
    pub fn validate(&self) -> Result<()> {
        if !(self.min_step_length > 0.0
            && self.min_step_length <= self.wanted_step_length
            && self.wanted_step_length <= self.max_step_length)
        {
            return Err(Error::Config(format!(
                "step lengths must satisfy 0 < min ({}) <= wanted ({}) <= max ({})",
                self.min_step_length, self.wanted_step_length, self.max_step_length
            )));
        }
        let timeouts = [
            ("progress_timeout_secs", self.progress_timeout_secs),
            ("search_timeout_secs", self.search_timeout_secs),
        ];
        for (name, secs) in timeouts {
            if secs <= 0.0 || Duration::try_from_secs_f32(secs).is_err() {
                return Err(Error::Config(format!(
                    "{name} must be a positive representable duration, got {secs}"
                )));
            }
        }
        self.collision.validate()
    }

    pub fn chunk_cache_capacity(&self) -> usize {
        self.chunk_cache_capacity.max(MIN_CHUNK_CACHE)
    }

    /// Unrepresentable values saturate to `Duration::MAX`, i.e. no timeout
    pub fn progress_timeout(&self) -> Duration {
        Duration::try_from_secs_f32(self.progress_timeout_secs).unwrap_or(Duration::MAX)
    }

    pub fn search_timeout(&self) -> Duration {
        Duration::try_from_secs_f32(self.search_timeout_secs).unwrap_or(Duration::MAX)
    }

    /// Height difference under which two spots in one cell are the same spot
    pub fn spot_height_tolerance(&self) -> f32 {
        self.min_step_length * 0.5
    }
}
