//! Entities and screen layout
//!
//! Positions are entity centers in screen pixels, y growing downward. Entities
//! scroll toward the bottom of the screen.

use glam::Vec2;
use serde::{Deserialize, Serialize};

use super::state::Item;
use crate::config::GameConfig;
use crate::consts::*;

/// Axis-aligned box (center + full size)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb {
    pub center: Vec2,
    pub size: Vec2,
}

impl Aabb {
    pub fn new(center: Vec2, size: Vec2) -> Self {
        Self { center, size }
    }

    pub fn min(&self) -> Vec2 {
        self.center - self.size / 2.0
    }

    pub fn max(&self) -> Vec2 {
        self.center + self.size / 2.0
    }

    pub fn contains(&self, point: Vec2) -> bool {
        let (min, max) = (self.min(), self.max());
        point.x >= min.x && point.x <= max.x && point.y >= min.y && point.y <= max.y
    }

    pub fn overlaps(&self, other: &Aabb) -> bool {
        let (a_min, a_max) = (self.min(), self.max());
        let (b_min, b_max) = (other.min(), other.max());
        a_min.x < b_max.x && a_max.x > b_min.x && a_min.y < b_max.y && a_max.y > b_min.y
    }
}

/// Screen geometry the layout is derived from
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f32,
    pub height: f32,
    /// Background tile scale; entity fall speed is `speed * tile_scale`
    pub tile_scale: f32,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            width: 360.0,
            height: 640.0,
            tile_scale: 1.0,
        }
    }
}

impl Viewport {
    pub fn new(width: f32, height: f32, tile_scale: f32) -> Self {
        Self {
            width,
            height,
            tile_scale,
        }
    }

    pub fn road_center_x(&self) -> f32 {
        self.width / 2.0
    }

    pub fn road_width(&self, config: &GameConfig) -> f32 {
        (self.width * config.road_width_fraction).floor()
    }

    /// Left/right road edges (where the edge walls sit)
    pub fn road_edges(&self, config: &GameConfig) -> (f32, f32) {
        let half = self.road_width(config) / 2.0;
        (self.road_center_x() - half, self.road_center_x() + half)
    }

    /// X range for the vehicle center, with slack so edge contacts still fire
    pub fn lane_bounds(&self, config: &GameConfig, vehicle_width: f32) -> (f32, f32) {
        let (left, right) = self.road_edges(config);
        let inset = vehicle_width / 2.0 - LANE_SLACK;
        (left + inset, right - inset)
    }

    /// X range for hazard centers
    pub fn hazard_lane(&self, config: &GameConfig, hazard_width: f32) -> (f32, f32) {
        let spread = self.road_width(config) / HAZARD_LANE_DIVISOR;
        let half = hazard_width / 2.0;
        let min = (self.road_center_x() - spread + half).floor();
        let max = (self.road_center_x() + spread - half).floor();
        (min, max.max(min))
    }

    /// Size from a fraction of screen height and an aspect ratio
    pub fn sized(&self, height_fraction: f32, aspect: f32) -> Vec2 {
        let h = (self.height * height_fraction).round();
        Vec2::new(h * aspect, h)
    }

    pub fn vehicle_start(&self) -> Vec2 {
        Vec2::new(self.road_center_x(), self.height - VEHICLE_BOTTOM_OFFSET)
    }

    pub fn goal_dock_y(&self) -> f32 {
        self.height * GOAL_DOCK_FRACTION
    }

    /// True once the top edge is past the bottom of the screen plus `margin`
    pub fn is_below(&self, bounds: &Aabb, margin: f32) -> bool {
        bounds.min().y > self.height + margin
    }
}

/// Hazard variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum HazardKind {
    /// Static road damage
    Pothole,
    /// Slow car
    Sedan,
    /// Slow truck
    Van,
}

/// How a hazard moves relative to the road
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum HazardBehavior {
    /// Scrolls with the road
    Static,
    /// Drives in the same direction, falling at `relative_speed` of the road
    Driving { relative_speed: f32 },
}

impl HazardKind {
    pub const ALL: [HazardKind; 3] = [HazardKind::Pothole, HazardKind::Sedan, HazardKind::Van];

    /// Spawn weight (percent)
    pub fn weight(self) -> u32 {
        match self {
            HazardKind::Pothole => 40,
            HazardKind::Sedan => 30,
            HazardKind::Van => 30,
        }
    }

    pub fn behavior(self) -> HazardBehavior {
        match self {
            HazardKind::Pothole => HazardBehavior::Static,
            HazardKind::Sedan | HazardKind::Van => HazardBehavior::Driving {
                relative_speed: DRIVING_HAZARD_RELATIVE_SPEED,
            },
        }
    }

    pub fn is_driving(self) -> bool {
        matches!(self.behavior(), HazardBehavior::Driving { .. })
    }

    pub fn size(self, viewport: &Viewport, config: &GameConfig) -> Vec2 {
        match self {
            HazardKind::Pothole => viewport.sized(config.pothole_height, POTHOLE_ASPECT),
            HazardKind::Sedan | HazardKind::Van => {
                viewport.sized(config.enemy_vehicle_height, VEHICLE_ASPECT)
            }
        }
    }

    /// Pick a kind from a roll in [0, 100)
    pub fn from_roll(roll: u32) -> Self {
        let mut acc = 0;
        for kind in Self::ALL {
            acc += kind.weight();
            if roll < acc {
                return kind;
            }
        }
        HazardKind::Van
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Hazard {
    pub id: u32,
    pub kind: HazardKind,
    pub pos: Vec2,
    pub size: Vec2,
}

impl Hazard {
    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.pos, self.size)
    }

    /// Vertical fall this tick for a given road speed
    pub fn fall(&self, speed: f32, tile_scale: f32) -> f32 {
        let base = speed * tile_scale;
        match self.kind.behavior() {
            HazardBehavior::Static => base,
            HazardBehavior::Driving { relative_speed } => base * relative_speed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub id: u32,
    pub item: Item,
    pub pos: Vec2,
    pub size: Vec2,
    /// Set once; a checkpoint never triggers twice
    pub triggered: bool,
}

impl Checkpoint {
    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.pos, self.size)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Goal {
    pub id: u32,
    pub pos: Vec2,
    pub size: Vec2,
    /// Pinned at the dock line
    pub docked: bool,
}

impl Goal {
    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.pos, self.size)
    }
}

/// The player's vehicle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vehicle {
    pub pos: Vec2,
    pub size: Vec2,
    /// Steering tilt (radians, visual only)
    pub tilt: f32,
    /// Pointer-to-vehicle offset captured at drag start
    pub grab_offset: f32,
}

impl Vehicle {
    pub fn new(viewport: &Viewport, config: &GameConfig) -> Self {
        Self {
            pos: viewport.vehicle_start(),
            size: viewport.sized(config.vehicle_height, VEHICLE_ASPECT),
            tilt: 0.0,
            grab_offset: 0.0,
        }
    }

    pub fn bounds(&self) -> Aabb {
        Aabb::new(self.pos, self.size)
    }

    /// Checkpoints trigger when they reach this line
    pub fn checkpoint_line(&self) -> f32 {
        self.pos.y - self.size.y * CHECKPOINT_TRIGGER_FRACTION
    }
}
