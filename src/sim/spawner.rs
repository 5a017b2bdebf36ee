//! Hazard, checkpoint and goal spawning
//!
//! Owns every scrolling entity. Hazards come from a looping spawn timer whose
//! interval shrinks on a second, slower difficulty timer. All spawn guards are
//! silent: a refused spawn is normal and the next timer fire simply tries again.

use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_pcg::Pcg32;

use super::entity::{Checkpoint, Goal, Hazard, HazardKind, Viewport};
use super::schedule::Periodic;
use super::state::{Item, ProgressionState};
use crate::config::GameConfig;
use crate::consts::*;

#[derive(Debug, Clone)]
pub struct Spawner {
    rng: Pcg32,
    /// Current hazard interval; shrinks toward the configured floor
    spawn_delay_ms: f32,
    spawn_timer: Periodic,
    difficulty_timer: Periodic,
    hazards: Vec<Hazard>,
    checkpoints: Vec<Checkpoint>,
    goal: Option<Goal>,
    next_id: u32,
}

impl Spawner {
    /// Timers start paused until the player drives
    pub fn new(config: &GameConfig, seed: u64) -> Self {
        Self {
            rng: Pcg32::seed_from_u64(seed),
            spawn_delay_ms: config.spawn_delay_ms,
            spawn_timer: Periodic::new(config.spawn_delay_ms, true),
            difficulty_timer: Periodic::new(config.difficulty_interval_ms, true),
            hazards: Vec::new(),
            checkpoints: Vec::new(),
            goal: None,
            next_id: 1,
        }
    }

    /// Drop all entities and timers and start over
    pub fn reset(&mut self, config: &GameConfig, seed: u64) {
        *self = Self::new(config, seed);
    }

    pub fn hazards(&self) -> &[Hazard] {
        &self.hazards
    }

    pub fn checkpoints(&self) -> &[Checkpoint] {
        &self.checkpoints
    }

    pub fn goal(&self) -> Option<&Goal> {
        self.goal.as_ref()
    }

    pub fn spawn_delay_ms(&self) -> f32 {
        self.spawn_delay_ms
    }

    /// Whether the spawn and difficulty timers are stopped
    pub fn is_paused(&self) -> bool {
        self.spawn_timer.is_paused()
    }

    fn next_entity_id(&mut self) -> u32 {
        let id = self.next_id;
        self.next_id += 1;
        id
    }

    pub fn pause(&mut self) {
        self.spawn_timer.pause();
        self.difficulty_timer.pause();
    }

    /// Never overrides a disable, and only runs while driving
    pub fn resume(&mut self, state: &ProgressionState) {
        if state.spawning_disabled() || !state.driving() {
            return;
        }
        self.spawn_timer.resume();
        self.difficulty_timer.resume();
    }

    /// Advance both timers, spawning/escalating on each fire
    pub fn advance_timers(
        &mut self,
        state: &ProgressionState,
        config: &GameConfig,
        viewport: &Viewport,
        speed: f32,
        dt_ms: f32,
    ) {
        for _ in 0..self.difficulty_timer.advance(dt_ms) {
            self.increase_difficulty(state, config);
        }
        for _ in 0..self.spawn_timer.advance(dt_ms) {
            self.spawn_hazard(state, config, viewport, speed);
        }
    }

    /// Try to place one hazard. Returns its id when something spawned.
    pub fn spawn_hazard(
        &mut self,
        state: &ProgressionState,
        config: &GameConfig,
        viewport: &Viewport,
        speed: f32,
    ) -> Option<u32> {
        if !state.driving() || state.spawning_disabled() {
            return None;
        }
        if self.hazards.len() >= config.max_hazards_on_screen {
            return None;
        }

        let kind = HazardKind::from_roll(self.rng.random_range(0..100));
        if kind.is_driving() && !self.can_spawn_vehicle_safely(config, speed) {
            log::debug!("Skipped {:?} spawn: too close to traffic", kind);
            return None;
        }

        let size = kind.size(viewport, config);
        let (min_x, max_x) = viewport.hazard_lane(config, size.x);
        let x = self.rng.random_range(min_x..=max_x);
        let id = self.next_entity_id();
        self.hazards.push(Hazard {
            id,
            kind,
            pos: Vec2::new(x, HAZARD_SPAWN_Y),
            size,
        });
        log::debug!("Spawned {:?} #{} at x={:.0}", kind, id, x);
        Some(id)
    }

    /// Spacing needed between driving hazards at the current speed
    pub fn safe_distance(config: &GameConfig, speed: f32) -> f32 {
        let speed_factor = speed / config.base_speed;
        config.min_safe_distance + config.safe_distance_buffer * speed_factor
    }

    /// No driving hazard near the spawn line, nor just below it. Static
    /// hazards are not considered.
    pub fn can_spawn_vehicle_safely(&self, config: &GameConfig, speed: f32) -> bool {
        let safe = Self::safe_distance(config, speed);
        let spawn_y = HAZARD_SPAWN_Y;
        self.hazards
            .iter()
            .filter(|h| h.kind.is_driving())
            .all(|h| {
                let too_close = (h.pos.y - spawn_y).abs() < safe;
                let just_ahead = h.pos.y > spawn_y && h.pos.y < spawn_y + safe * SAFE_DISTANCE_LOOKAHEAD;
                !too_close && !just_ahead
            })
    }

    /// Place a checkpoint sign; the caller spawns each item at most once
    pub fn spawn_checkpoint(&mut self, item: Item, config: &GameConfig, viewport: &Viewport) -> u32 {
        let id = self.next_entity_id();
        self.checkpoints.push(Checkpoint {
            id,
            item,
            pos: Vec2::new(viewport.width - CHECKPOINT_RIGHT_INSET, CHECKPOINT_SPAWN_Y),
            size: viewport.sized(config.checkpoint_height, CHECKPOINT_ASPECT),
            triggered: false,
        });
        log::info!("Checkpoint {} spawned", item.as_str());
        id
    }

    /// Place the goal; the caller spawns it at most once per run
    pub fn spawn_goal(&mut self, config: &GameConfig, viewport: &Viewport) -> u32 {
        let id = self.next_entity_id();
        if self.goal.is_some() {
            log::warn!("Goal spawned twice; replacing");
        }
        self.goal = Some(Goal {
            id,
            pos: Vec2::new(viewport.road_center_x(), GOAL_SPAWN_Y),
            size: viewport.sized(config.goal_height, GOAL_ASPECT),
            docked: false,
        });
        log::info!("Goal spawned");
        id
    }

    /// Shrink the spawn interval one step and rebuild the spawn timer
    pub fn increase_difficulty(&mut self, state: &ProgressionState, config: &GameConfig) -> bool {
        let next = (self.spawn_delay_ms - config.spawn_step_ms).max(config.min_spawn_delay_ms);
        if next >= self.spawn_delay_ms {
            return false;
        }
        self.spawn_delay_ms = next;
        let paused = state.spawning_disabled() || !state.driving();
        // Replace, not reschedule: the old timer's progress goes with it
        self.spawn_timer = Periodic::new(next, paused);
        log::info!("Difficulty up: spawn every {:.0}ms", next);
        true
    }

    /// Scroll hazards and checkpoints; cull what left the screen
    pub fn advance_entities(&mut self, speed: f32, viewport: &Viewport) {
        let tile = viewport.tile_scale;
        for hazard in &mut self.hazards {
            hazard.pos.y += hazard.fall(speed, tile);
        }
        for checkpoint in &mut self.checkpoints {
            checkpoint.pos.y += speed * tile;
        }
        self.hazards
            .retain(|h| !viewport.is_below(&h.bounds(), CULL_MARGIN));
        self.checkpoints
            .retain(|c| !viewport.is_below(&c.bounds(), CULL_MARGIN));
    }

    /// Remove and return the first untriggered checkpoint that reached `line`
    pub fn take_triggered_checkpoint(&mut self, line: f32) -> Option<Checkpoint> {
        let idx = self
            .checkpoints
            .iter()
            .position(|c| !c.triggered && c.pos.y >= line)?;
        let mut checkpoint = self.checkpoints.remove(idx);
        checkpoint.triggered = true;
        Some(checkpoint)
    }

    /// Scroll the goal until it docks. Returns true on the tick it docks.
    pub fn advance_goal(&mut self, speed: f32, viewport: &Viewport) -> bool {
        let Some(goal) = self.goal.as_mut() else {
            return false;
        };
        let mut docked_now = false;
        if !goal.docked {
            goal.pos.y += speed * viewport.tile_scale;
            let dock_y = viewport.goal_dock_y();
            if goal.pos.y >= dock_y {
                goal.pos.y = dock_y;
                goal.docked = true;
                docked_now = true;
            }
        }
        if viewport.is_below(&goal.bounds(), GOAL_CULL_MARGIN) {
            self.goal = None;
        }
        docked_now
    }

    /// Drop a hazard (e.g. destroyed by the physics collaborator)
    pub fn remove_hazard(&mut self, id: u32) -> bool {
        let before = self.hazards.len();
        self.hazards.retain(|h| h.id != id);
        self.hazards.len() != before
    }

    #[cfg(test)]
    pub(crate) fn push_hazard(&mut self, kind: HazardKind, pos: Vec2, viewport: &Viewport, config: &GameConfig) -> u32 {
        let id = self.next_entity_id();
        self.hazards.push(Hazard {
            id,
            kind,
            pos,
            size: kind.size(viewport, config),
        });
        id
    }
}
