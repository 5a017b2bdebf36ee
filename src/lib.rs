//! Lane Rush - A lane-constrained scrolling avoidance game
//!
//! Core modules:
//! - `sim`: Deterministic gameplay progression (run state, spawning, collisions, tick)
//! - `config`: Data-driven game balance
//!
//! Rendering, input capture, audio and overlays are external collaborators.
//! They talk to the core through [`sim::GameEvent`] and [`sim::Command`].

pub mod config;
pub mod sim;

pub use config::{ConfigError, GameConfig};

/// Feel and layout constants that are not part of the tunable profile
pub mod consts {
    /// Nominal frame time in milliseconds (one tick per rendered frame)
    pub const FRAME_MS: f32 = 1000.0 / 60.0;

    /// Vehicle sits this far above the bottom of the screen
    pub const VEHICLE_BOTTOM_OFFSET: f32 = 100.0;
    /// Per-tick interpolation toward the steering target
    pub const STEER_LERP: f32 = 0.15;
    /// Tilt radians per pixel of remaining steering distance
    pub const TILT_PER_PIXEL: f32 = 0.01;
    /// Maximum steering tilt (radians)
    pub const MAX_TILT: f32 = 0.2;
    /// Per-tick relaxation of tilt toward zero when not steering
    pub const TILT_RELAX: f32 = 0.1;
    /// Lane clamp slack so edge contacts can still register
    pub const LANE_SLACK: f32 = 2.0;

    /// Hazards appear on this line above the visible area
    pub const HAZARD_SPAWN_Y: f32 = -50.0;
    /// Checkpoint signs appear here (x measured from the right edge)
    pub const CHECKPOINT_SPAWN_Y: f32 = -40.0;
    pub const CHECKPOINT_RIGHT_INSET: f32 = 50.0;
    /// Goal appears on this line
    pub const GOAL_SPAWN_Y: f32 = -60.0;
    /// Goal docks at this fraction of the screen height
    pub const GOAL_DOCK_FRACTION: f32 = 0.18;
    /// Entities are culled once their top edge is this far below the screen
    pub const CULL_MARGIN: f32 = 20.0;
    pub const GOAL_CULL_MARGIN: f32 = 40.0;

    /// Speed multiplier of driving hazards relative to the road
    pub const DRIVING_HAZARD_RELATIVE_SPEED: f32 = 0.55;
    /// Extra spacing window below the spawn line for driving hazards
    pub const SAFE_DISTANCE_LOOKAHEAD: f32 = 1.5;
    /// Hazard lanes span road center ± road width / this
    pub const HAZARD_LANE_DIVISOR: f32 = 3.0;

    /// Checkpoint triggers this fraction of the vehicle height above its center
    pub const CHECKPOINT_TRIGGER_FRACTION: f32 = 0.1;

    /// Final approach speed decay duration (ms)
    pub const SPEED_DECAY_MS: f32 = 500.0;
    /// Vehicle docking move duration (ms)
    pub const DOCKING_MS: f32 = 700.0;
    /// Vehicle docks this fraction of the goal height below the goal center
    pub const DOCKING_OFFSET_FRACTION: f32 = 0.45;

    /// Edge bump: short slow-down, nudge back toward center, camera shake
    pub const EDGE_SLOW_MS: f64 = 300.0;
    pub const EDGE_PUSH: f32 = 12.0;
    pub const EDGE_PUSH_MS: f32 = 90.0;
    pub const EDGE_SHAKE_MS: f32 = 60.0;
    pub const EDGE_SHAKE_INTENSITY: f32 = 0.001;

    /// Width / height ratios of the entity art
    pub const VEHICLE_ASPECT: f32 = 0.5;
    pub const POTHOLE_ASPECT: f32 = 1.4;
    pub const CHECKPOINT_ASPECT: f32 = 0.8;
    pub const GOAL_ASPECT: f32 = 1.2;
}

/// Linear interpolation
#[inline]
pub fn lerp(from: f32, to: f32, t: f32) -> f32 {
    from + (to - from) * t
}

/// Sine ease-out on [0, 1]
#[inline]
pub fn sine_out(t: f32) -> f32 {
    (t.clamp(0.0, 1.0) * std::f32::consts::FRAC_PI_2).sin()
}

/// Sine ease-in-out on [0, 1]
#[inline]
pub fn sine_in_out(t: f32) -> f32 {
    -((std::f32::consts::PI * t.clamp(0.0, 1.0)).cos() - 1.0) / 2.0
}
