//! Game balance profile
//!
//! Static per run. Loaded from JSON (partial documents fall back to defaults).

use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Configuration loading/validation failures
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("checkpoint distances must be strictly increasing, got {0:?}")]
    CheckpointOrder([f32; 3]),
    #[error("min spawn delay {min}ms exceeds initial spawn delay {initial}ms")]
    SpawnDelayFloor { min: f32, initial: f32 },
    #[error("slow-down factor {0} must be in (0, 1]")]
    SlowDownFactor(f32),
    #[error("{0} must be positive")]
    NotPositive(&'static str),
}

/// Tunable parameters for a run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GameConfig {
    // === Speed ===
    /// Scroll speed when coasting (pixels per tick)
    pub base_speed: f32,
    /// Added to base speed while driving
    pub drive_boost: f32,

    // === Difficulty ===
    /// Initial hazard spawn interval (ms)
    pub spawn_delay_ms: f32,
    /// Spawn interval floor (ms)
    pub min_spawn_delay_ms: f32,
    /// Spawn interval decrement per escalation (ms)
    pub spawn_step_ms: f32,
    /// Time between escalations (ms)
    pub difficulty_interval_ms: f32,

    // === Speed ramp ===
    pub speed_ramp_step: f32,
    pub speed_ramp_interval_ms: f32,
    pub speed_ramp_max: f32,

    // === Lives ===
    pub max_lives: u32,
    pub invincibility_ms: f32,
    pub slow_down_ms: f32,
    pub slow_down_factor: f32,

    // === Progression (metres) ===
    pub checkpoint_distances: [f32; 3],
    /// Distance after the last collection before the goal appears
    pub goal_spawn_distance: f32,
    pub meters_per_pixel: f32,

    // === Vehicle spacing ===
    pub min_safe_distance: f32,
    pub safe_distance_buffer: f32,

    // === Sizes (fraction of screen height) ===
    pub vehicle_height: f32,
    pub enemy_vehicle_height: f32,
    pub pothole_height: f32,
    pub checkpoint_height: f32,
    pub goal_height: f32,

    // === Layout ===
    /// Road width as a fraction of screen width
    pub road_width_fraction: f32,
    pub max_hazards_on_screen: usize,
}

impl Default for GameConfig {
    fn default() -> Self {
        Self {
            base_speed: 2.0,
            drive_boost: 6.0,

            spawn_delay_ms: 900.0,
            min_spawn_delay_ms: 500.0,
            spawn_step_ms: 50.0,
            difficulty_interval_ms: 15_000.0,

            speed_ramp_step: 0.15,
            speed_ramp_interval_ms: 3000.0,
            speed_ramp_max: 2.0,

            max_lives: 5,
            invincibility_ms: 1000.0,
            slow_down_ms: 1000.0,
            slow_down_factor: 0.6,

            checkpoint_distances: [1000.0, 3000.0, 6000.0],
            goal_spawn_distance: 1000.0,
            meters_per_pixel: 0.1,

            min_safe_distance: 150.0,
            safe_distance_buffer: 30.0,

            vehicle_height: 0.14,
            enemy_vehicle_height: 0.12,
            pothole_height: 0.06,
            checkpoint_height: 0.15,
            goal_height: 0.22,

            road_width_fraction: 0.78,
            max_hazards_on_screen: 4,
        }
    }
}

impl GameConfig {
    /// Parse and validate a JSON profile
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON profile from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let config = Self::from_json(&json)?;
        log::info!("Loaded config from {}", path.as_ref().display());
        Ok(config)
    }

    /// Check cross-field constraints
    pub fn validate(&self) -> Result<(), ConfigError> {
        let [a, b, c] = self.checkpoint_distances;
        if !(a < b && b < c) {
            return Err(ConfigError::CheckpointOrder(self.checkpoint_distances));
        }
        if self.min_spawn_delay_ms > self.spawn_delay_ms {
            return Err(ConfigError::SpawnDelayFloor {
                min: self.min_spawn_delay_ms,
                initial: self.spawn_delay_ms,
            });
        }
        if !(self.slow_down_factor > 0.0 && self.slow_down_factor <= 1.0) {
            return Err(ConfigError::SlowDownFactor(self.slow_down_factor));
        }
        if self.max_lives == 0 {
            return Err(ConfigError::NotPositive("max_lives"));
        }

        let positive = [
            ("base_speed", self.base_speed),
            ("min_spawn_delay_ms", self.min_spawn_delay_ms),
            ("difficulty_interval_ms", self.difficulty_interval_ms),
            ("speed_ramp_interval_ms", self.speed_ramp_interval_ms),
            ("meters_per_pixel", self.meters_per_pixel),
            ("road_width_fraction", self.road_width_fraction),
        ];
        for (name, value) in positive {
            if value <= 0.0 {
                return Err(ConfigError::NotPositive(name));
            }
        }
        if self.max_hazards_on_screen == 0 {
            return Err(ConfigError::NotPositive("max_hazards_on_screen"));
        }
        Ok(())
    }

    /// Speed when driving flat out with no ramp or penalty
    pub fn cruise_speed(&self) -> f32 {
        self.base_speed + self.drive_boost
    }

    /// Checkpoint distance for the n-th collectible
    pub fn checkpoint_distance(&self, index: usize) -> f32 {
        self.checkpoint_distances[index]
    }
}
