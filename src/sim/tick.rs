//! Per-tick orchestration
//!
//! [`Run`] owns the progression state, spawner, vehicle and timers, and
//! advances them once per rendered frame. Overlap notifications and
//! presentation commands come in between ticks.

use glam::Vec2;
use serde::Serialize;

use super::collision::{CollisionResolver, Contact, HazardOutcome, Side};
use super::entity::{Vehicle, Viewport};
use super::events::{Command, GameEvent, Observers, SubscriptionId};
use super::schedule::{Easing, Periodic, Tween};
use super::spawner::Spawner;
use super::state::{Item, Phase, ProgressionState};
use crate::config::GameConfig;
use crate::consts::*;
use crate::lerp;

/// Input for a single tick
#[derive(Debug, Clone, Default)]
pub struct TickInput {
    /// Pointer x while a press is held
    pub pointer_x: Option<f32>,
    /// Demo mode - the core drives itself
    pub autopilot: bool,
}

/// Speed decay and docking move after the goal pins
#[derive(Debug, Clone)]
struct FinalApproach {
    speed: Tween,
    vehicle_y: Tween,
}

/// Edge bounce, applied as per-tick deltas
#[derive(Debug, Clone)]
struct EdgeNudge {
    tween: Tween,
    applied: f32,
}

/// What a HUD/debug collaborator needs each frame
#[derive(Debug, Clone, Serialize)]
pub struct HudSnapshot {
    pub phase: Phase,
    pub driving: bool,
    pub speed: f32,
    pub distance_m: f32,
    pub speed_ramp: f32,
    pub lives_remaining: u32,
    pub max_lives: u32,
    pub collected: Vec<Item>,
    pub hazards: usize,
    pub spawn_delay_ms: f32,
    pub ticks: u64,
}

/// One run of the game
#[derive(Debug)]
pub struct Run {
    config: GameConfig,
    viewport: Viewport,
    state: ProgressionState,
    spawner: Spawner,
    vehicle: Vehicle,
    observers: Observers,
    speed_ramp_timer: Periodic,
    approach: Option<FinalApproach>,
    nudge: Option<EdgeNudge>,
    /// Current scroll speed (pixels per tick)
    speed: f32,
    /// Background tile offset
    scroll_y: f32,
    /// Session clock (ms); keeps running while paused
    clock_ms: f64,
    /// Unpaused ticks this run
    ticks: u64,
    seed: u64,
    restarts: u64,
    /// Physics collaborator should stop reporting overlaps
    world_paused: bool,
}

impl Run {
    pub fn new(config: GameConfig, viewport: Viewport, seed: u64) -> Self {
        log::info!("Run started with seed {}", seed);
        Self {
            state: ProgressionState::new(&config),
            spawner: Spawner::new(&config, seed),
            vehicle: Vehicle::new(&viewport, &config),
            observers: Observers::new(),
            speed_ramp_timer: Periodic::new(config.speed_ramp_interval_ms, true),
            approach: None,
            nudge: None,
            speed: config.base_speed,
            scroll_y: 0.0,
            clock_ms: 0.0,
            ticks: 0,
            seed,
            restarts: 0,
            world_paused: false,
            config,
            viewport,
        }
    }

    // === Accessors ===

    pub fn config(&self) -> &GameConfig {
        &self.config
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn state(&self) -> &ProgressionState {
        &self.state
    }

    pub fn spawner(&self) -> &Spawner {
        &self.spawner
    }

    pub fn vehicle(&self) -> &Vehicle {
        &self.vehicle
    }

    pub fn speed(&self) -> f32 {
        self.speed
    }

    pub fn scroll_y(&self) -> f32 {
        self.scroll_y
    }

    pub fn clock_ms(&self) -> f64 {
        self.clock_ms
    }

    pub fn is_world_paused(&self) -> bool {
        self.world_paused
    }

    pub fn is_speed_ramp_paused(&self) -> bool {
        self.speed_ramp_timer.is_paused()
    }

    pub fn observers_mut(&mut self) -> &mut Observers {
        &mut self.observers
    }

    pub fn subscribe(&mut self, callback: impl FnMut(&GameEvent) + 'static) -> SubscriptionId {
        self.observers.subscribe(callback)
    }

    pub fn snapshot(&self) -> HudSnapshot {
        let stats = self.state.stats();
        HudSnapshot {
            phase: self.state.phase(),
            driving: self.state.driving(),
            speed: if self.state.is_game_over() { 0.0 } else { self.speed },
            distance_m: stats.distance_traveled,
            speed_ramp: stats.speed_ramp,
            lives_remaining: self.state.lives_remaining(),
            max_lives: self.state.max_lives(),
            collected: Item::ALL
                .into_iter()
                .filter(|&i| self.state.inventory().has(i))
                .collect(),
            hazards: self.spawner.hazards().len(),
            spawn_delay_ms: self.spawner.spawn_delay_ms(),
            ticks: self.ticks,
        }
    }

    // === Speed model ===

    /// Speed from driving, ramp and penalty state
    pub fn model_speed(&self) -> f32 {
        let penalty = if self.state.is_slowed(self.clock_ms) {
            self.config.slow_down_factor
        } else {
            1.0
        };
        let ramp = 1.0 + self.state.stats().speed_ramp;
        let base = if self.state.driving() {
            self.config.cruise_speed()
        } else {
            self.config.base_speed
        };
        base * ramp * penalty
    }

    // === Input ===

    /// Press at (x, y). Starts driving only when the press lands on the vehicle.
    pub fn pointer_down(&mut self, x: f32, y: f32) -> bool {
        if !self.state.phase().allows_driving() {
            return false;
        }
        if !self.vehicle.bounds().contains(Vec2::new(x, y)) {
            return false;
        }
        self.vehicle.grab_offset = self.vehicle.pos.x - x;
        self.start_driving();
        true
    }

    pub fn pointer_up(&mut self) {
        self.vehicle.grab_offset = 0.0;
        self.stop_driving();
    }

    fn start_driving(&mut self) {
        if !self.state.set_driving(true) {
            return;
        }
        self.spawner.resume(&self.state);
        if !self.state.final_approach() {
            self.speed_ramp_timer.resume();
        }
    }

    fn stop_driving(&mut self) {
        self.state.set_driving(false);
        self.spawner.pause();
        self.speed_ramp_timer.pause();
    }

    // === Inbound events ===

    pub fn handle(&mut self, command: Command) {
        match command {
            Command::CheckpointOverlayClosed => self.resume_from_overlay(),
            Command::RestartRequested => self.restart(),
            Command::MusicToggle { enabled } => {
                log::debug!("Music toggle ({}) left to the audio collaborator", enabled);
            }
        }
    }

    /// Dispatch an overlap notification
    pub fn on_contact(&mut self, contact: Contact) {
        match contact {
            Contact::Hazard { id } => {
                self.on_hazard_collision(id);
            }
            Contact::Edge { side } => self.on_edge_collision(side),
        }
    }

    pub fn on_hazard_collision(&mut self, hazard_id: u32) -> HazardOutcome {
        let outcome = CollisionResolver::on_hazard_hit(&mut self.state, &self.config, self.clock_ms);
        match outcome {
            HazardOutcome::Ignored => {}
            HazardOutcome::Damaged { hits } => {
                log::debug!("Hazard #{} hit", hazard_id);
                self.emit_lives(hits);
            }
            HazardOutcome::GameOver { hits } => {
                self.emit_lives(hits);
                self.world_paused = true;
                self.spawner.pause();
                self.speed_ramp_timer.pause();
                self.emit(GameEvent::GameOver);
            }
        }
        outcome
    }

    pub fn on_edge_collision(&mut self, side: Side) {
        let Some(bump) = CollisionResolver::on_edge_hit(&mut self.state, side, self.clock_ms) else {
            return;
        };
        self.nudge = Some(EdgeNudge {
            tween: Tween::new(0.0, bump.push, EDGE_PUSH_MS, Easing::SineOut),
            applied: 0.0,
        });
        self.emit(GameEvent::CameraShake {
            duration_ms: bump.shake_ms,
            intensity: bump.shake_intensity,
        });
    }

    /// Tear everything down and start a fresh run
    pub fn restart(&mut self) {
        self.restarts += 1;
        self.state.reset();
        self.spawner
            .reset(&self.config, self.seed.wrapping_add(self.restarts));
        self.vehicle = Vehicle::new(&self.viewport, &self.config);
        self.speed_ramp_timer = Periodic::new(self.config.speed_ramp_interval_ms, true);
        self.approach = None;
        self.nudge = None;
        self.speed = self.config.base_speed;
        self.scroll_y = 0.0;
        self.ticks = 0;
        self.world_paused = false;
        log::info!("Run reset (restart #{})", self.restarts);
        self.emit(GameEvent::RunReset);
    }

    // === Tick ===

    /// Advance one frame
    pub fn tick(&mut self, input: &TickInput, dt_ms: f32) {
        self.clock_ms += dt_ms as f64;

        if self.state.is_game_over() || self.state.paused_for_overlay() {
            return;
        }
        self.ticks += 1;

        let mut input = input.clone();
        if input.autopilot {
            self.autopilot(&mut input);
        }
        let input = &input;

        // Speed
        self.speed = match self.approach.as_mut() {
            Some(approach) => approach.speed.advance(dt_ms),
            None => self.model_speed(),
        };
        let speed = self.speed;

        // Vehicle
        self.steer(input.pointer_x);
        self.apply_nudge(dt_ms);

        // Background and distance
        if !self.state.final_approach() {
            self.scroll_y -= speed;
        }
        if speed > 0.0 {
            self.state.accrue_distance(speed * self.config.meters_per_pixel);
        }

        // Entities
        self.spawner.advance_entities(speed, &self.viewport);
        let line = self.vehicle.checkpoint_line();
        if let Some(checkpoint) = self.spawner.take_triggered_checkpoint(line) {
            self.trigger_checkpoint(checkpoint.item);
        }

        // Goal
        if self.spawner.advance_goal(speed, &self.viewport) {
            self.start_final_approach();
        }
        self.advance_final_approach(dt_ms);

        if self.state.paused_for_overlay() {
            return;
        }

        self.check_spawning();

        for _ in 0..self.speed_ramp_timer.advance(dt_ms) {
            self.state
                .advance_speed_ramp(self.config.speed_ramp_step, self.config.speed_ramp_max);
        }
        self.spawner
            .advance_timers(&self.state, &self.config, &self.viewport, speed, dt_ms);
    }

    fn steer(&mut self, pointer_x: Option<f32>) {
        let vehicle = &mut self.vehicle;
        match pointer_x {
            Some(px) if self.state.driving() => {
                let target = px + vehicle.grab_offset;
                vehicle.pos.x += (target - vehicle.pos.x) * STEER_LERP;
                let (min, max) = self.viewport.lane_bounds(&self.config, vehicle.size.x);
                vehicle.pos.x = vehicle.pos.x.clamp(min, max);
                vehicle.tilt = ((target - vehicle.pos.x) * TILT_PER_PIXEL).clamp(-MAX_TILT, MAX_TILT);
            }
            _ => {
                vehicle.tilt = lerp(vehicle.tilt, 0.0, TILT_RELAX);
            }
        }
    }

    fn apply_nudge(&mut self, dt_ms: f32) {
        let Some(nudge) = self.nudge.as_mut() else {
            return;
        };
        let value = nudge.tween.advance(dt_ms);
        self.vehicle.pos.x += value - nudge.applied;
        nudge.applied = value;
        if nudge.tween.is_finished() {
            self.nudge = None;
        }
    }

    /// Spawn checkpoints as their distances are crossed, then the goal
    fn check_spawning(&mut self) {
        for (idx, item) in Item::ALL.into_iter().enumerate() {
            let threshold = self.config.checkpoint_distance(idx);
            if self.state.try_mark_checkpoint_spawned(item, threshold) {
                self.spawner
                    .spawn_checkpoint(item, &self.config, &self.viewport);
            }
        }

        if self.state.try_mark_goal_spawned(self.config.goal_spawn_distance) {
            self.spawner.pause();
            self.spawner.spawn_goal(&self.config, &self.viewport);
        }
    }

    fn trigger_checkpoint(&mut self, item: Item) {
        if self.state.is_game_over() {
            return;
        }
        self.state.collect(item);
        log::info!(
            "Collected {} ({}/3) at {:.0}m",
            item.as_str(),
            self.state.inventory().count(),
            self.state.stats().distance_traveled
        );

        if self.state.has_all_items() && !self.state.goal_spawned() && self.state.record_last_collection() {
            self.state.disable_spawning();
        }

        // Pause first so nothing spawns while the overlay is pending
        if self.pause_for_overlay(Phase::CheckpointOverlay { item }) {
            self.emit(GameEvent::CheckpointReached { item });
        } else {
            log::warn!("Checkpoint {} collected outside the road phase", item.as_str());
        }
    }

    fn pause_for_overlay(&mut self, phase: Phase) -> bool {
        if !self.state.enter_phase(phase) {
            return false;
        }
        self.spawner.pause();
        self.speed_ramp_timer.pause();
        true
    }

    fn resume_from_overlay(&mut self) {
        if !matches!(self.state.phase(), Phase::CheckpointOverlay { .. }) {
            log::debug!("Overlay close ignored in {:?}", self.state.phase());
            return;
        }
        self.state.enter_phase(Phase::Road);
        self.spawner.resume(&self.state);
        self.speed_ramp_timer.set_paused(!self.state.driving());
    }

    fn start_final_approach(&mut self) {
        let Some(goal) = self.spawner.goal() else {
            return;
        };
        let target_y = goal.pos.y + goal.size.y * DOCKING_OFFSET_FRACTION;
        if !self.state.enter_phase(Phase::FinalApproach) {
            return;
        }
        self.spawner.pause();
        self.speed_ramp_timer.pause();
        self.approach = Some(FinalApproach {
            speed: Tween::new(self.speed, 0.0, SPEED_DECAY_MS, Easing::SineOut),
            vehicle_y: Tween::new(self.vehicle.pos.y, target_y, DOCKING_MS, Easing::SineInOut),
        });
        log::info!(
            "Goal docked at {:.0}m; final approach",
            self.state.stats().distance_traveled
        );
    }

    fn advance_final_approach(&mut self, dt_ms: f32) {
        if self.state.phase() != Phase::FinalApproach {
            return;
        }
        let Some(approach) = self.approach.as_mut() else {
            return;
        };
        self.vehicle.pos.y = approach.vehicle_y.advance(dt_ms);
        if approach.vehicle_y.is_finished() && self.pause_for_overlay(Phase::GoalOverlay) {
            log::info!("Goal reached");
            self.emit(GameEvent::GoalReached);
        }
    }

    /// Hold the wheel and steer toward the widest gap ahead
    fn autopilot(&mut self, input: &mut TickInput) {
        if self.state.phase() == Phase::Road && !self.state.driving() {
            let pos = self.vehicle.pos;
            self.pointer_down(pos.x, pos.y);
        }
        if !self.state.driving() {
            input.pointer_x = None;
            return;
        }

        let vehicle = &self.vehicle;
        let (min, max) = self.viewport.lane_bounds(&self.config, vehicle.size.x);
        let margin = vehicle.size.x * 0.25;
        let (min, max) = (min + margin, (max - margin).max(min + margin));
        let horizon = vehicle.pos.y - self.viewport.height * 0.6;
        let threats: Vec<_> = self
            .spawner
            .hazards()
            .iter()
            .filter(|h| h.pos.y > horizon && h.pos.y < vehicle.pos.y + vehicle.size.y)
            .collect();

        let samples = 9;
        let mut best = (f32::MIN, vehicle.pos.x);
        for i in 0..samples {
            let x = lerp(min, max, i as f32 / (samples - 1) as f32);
            let clearance = threats
                .iter()
                .map(|h| (x - h.pos.x).abs() - (h.size.x + vehicle.size.x) / 2.0)
                .fold(f32::MAX, f32::min);
            // Prefer staying put when the gaps are equally good
            let score = clearance.min(vehicle.size.x * 2.0) - (x - vehicle.pos.x).abs() * 0.05;
            if score > best.0 {
                best = (score, x);
            }
        }
        input.pointer_x = Some(best.1 - vehicle.grab_offset);
    }

    fn emit_lives(&mut self, hits: u32) {
        let max_lives = self.config.max_lives;
        self.emit(GameEvent::LivesChanged { max_lives, hits });
    }

    fn emit(&mut self, event: GameEvent) {
        self.observers.emit(&event);
    }

    #[cfg(test)]
    pub(crate) fn spawner_mut(&mut self) -> &mut Spawner {
        &mut self.spawner
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sim::entity::HazardKind;
    use crate::sim::events::EventKind;
    use proptest::prelude::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    /// Exactly one metre per tick while driving at base settings
    fn fast_config() -> GameConfig {
        GameConfig {
            meters_per_pixel: 0.125,
            checkpoint_distances: [10.0, 20.0, 30.0],
            goal_spawn_distance: 20.0,
            ..Default::default()
        }
    }

    fn recorded(run: &mut Run) -> Rc<RefCell<Vec<GameEvent>>> {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        run.subscribe(move |e| sink.borrow_mut().push(e.clone()));
        log
    }

    fn press(run: &mut Run) -> bool {
        let pos = run.vehicle().pos;
        run.pointer_down(pos.x, pos.y)
    }

    fn held(run: &Run) -> TickInput {
        TickInput {
            pointer_x: Some(run.vehicle().pos.x - run.vehicle().grab_offset),
            autopilot: false,
        }
    }

    fn count(events: &[GameEvent], kind: EventKind) -> usize {
        events.iter().filter(|e| e.kind() == kind).count()
    }

    #[test]
    fn test_speed_model() {
        let config = GameConfig::default();
        let mut run = Run::new(config.clone(), Viewport::default(), 1);
        run.tick(&TickInput::default(), FRAME_MS);
        assert_eq!(run.speed(), config.base_speed);

        assert!(press(&mut run));
        let input = held(&run);
        run.tick(&input, FRAME_MS);
        assert_eq!(run.speed(), config.cruise_speed());

        run.on_hazard_collision(1);
        run.tick(&input, FRAME_MS);
        assert!((run.speed() - config.cruise_speed() * config.slow_down_factor).abs() < 1e-5);
    }

    #[test]
    fn test_press_outside_vehicle_does_not_drive() {
        let mut run = Run::new(GameConfig::default(), Viewport::default(), 1);
        assert!(!run.pointer_down(0.0, 0.0));
        assert!(!run.state().driving());
        assert!(run.spawner().is_paused());
        assert!(press(&mut run));
        assert!(!run.spawner().is_paused());
        assert!(!run.is_speed_ramp_paused());
        run.pointer_up();
        assert!(run.spawner().is_paused());
        assert!(run.is_speed_ramp_paused());
    }

    #[test]
    fn test_steering_follows_pointer_within_lane() {
        let config = GameConfig::default();
        let viewport = Viewport::default();
        let mut run = Run::new(config.clone(), viewport, 1);
        press(&mut run);
        let start = run.vehicle().pos.x;

        let input = TickInput {
            pointer_x: Some(start + 40.0),
            autopilot: false,
        };
        run.tick(&input, FRAME_MS);
        // Eased, not snapped
        assert!((run.vehicle().pos.x - (start + 40.0 * STEER_LERP)).abs() < 1e-4);
        assert!(run.vehicle().tilt > 0.0 && run.vehicle().tilt <= MAX_TILT);

        let far = TickInput {
            pointer_x: Some(10_000.0),
            autopilot: false,
        };
        for _ in 0..200 {
            run.tick(&far, FRAME_MS);
        }
        let (_, max) = viewport.lane_bounds(&config, run.vehicle().size.x);
        assert_eq!(run.vehicle().pos.x, max);
        assert_eq!(run.vehicle().tilt, MAX_TILT);

        run.pointer_up();
        for _ in 0..100 {
            run.tick(&TickInput::default(), FRAME_MS);
        }
        assert!(run.vehicle().tilt.abs() < 1e-3);
    }

    #[test]
    fn test_edge_bump_nudges_back() {
        let mut run = Run::new(GameConfig::default(), Viewport::default(), 1);
        let events = recorded(&mut run);
        let x = run.vehicle().pos.x;
        run.on_edge_collision(Side::Left);
        for _ in 0..10 {
            run.tick(&TickInput::default(), FRAME_MS);
        }
        assert!((run.vehicle().pos.x - (x + EDGE_PUSH)).abs() < 1e-3);
        assert_eq!(count(&events.borrow(), EventKind::CameraShake), 1);
        assert_eq!(run.state().stats().hits, 0);
    }

    #[test]
    fn test_first_checkpoint_scenario() {
        let config = GameConfig {
            meters_per_pixel: 0.125,
            checkpoint_distances: [10.0, 3000.0, 6000.0],
            ..Default::default()
        };
        let mut run = Run::new(config, Viewport::default(), 5);
        let events = recorded(&mut run);
        assert!(press(&mut run));

        for _ in 0..9 {
            let input = held(&run);
            run.tick(&input, FRAME_MS);
        }
        assert!(run.spawner().checkpoints().is_empty());
        let input = held(&run);
        run.tick(&input, FRAME_MS);
        assert_eq!(run.state().stats().distance_traveled, 10.0);
        assert_eq!(run.spawner().checkpoints().len(), 1);
        assert!(run.state().checkpoints().is_spawned(Item::Key));

        let mut guard = 0;
        while count(&events.borrow(), EventKind::CheckpointReached) == 0 {
            let input = held(&run);
            run.tick(&input, FRAME_MS);
            guard += 1;
            assert!(guard < 500, "checkpoint never reached");
        }
        assert_eq!(
            events.borrow().last(),
            Some(&GameEvent::CheckpointReached { item: Item::Key })
        );
        assert!(run.state().inventory().has(Item::Key));
        assert!(run.state().paused_for_overlay());
        assert!(!run.state().driving());
        assert!(run.spawner().is_paused());
        assert!(run.spawner().checkpoints().is_empty());

        // Nothing moves or spawns while the overlay is up
        let hazards = run.spawner().hazards().len();
        let distance = run.state().stats().distance_traveled;
        for _ in 0..300 {
            run.tick(&TickInput::default(), FRAME_MS);
            assert!(!press(&mut run));
        }
        assert_eq!(run.spawner().hazards().len(), hazards);
        assert_eq!(run.state().stats().distance_traveled, distance);

        run.handle(Command::CheckpointOverlayClosed);
        assert_eq!(run.state().phase(), Phase::Road);
        assert!(press(&mut run));
        assert!(!run.spawner().is_paused());
        for _ in 0..60 {
            let input = held(&run);
            run.tick(&input, FRAME_MS);
        }
        assert!(run.state().stats().distance_traveled > distance);
    }

    #[test]
    fn test_lives_scenario() {
        let config = GameConfig::default();
        let mut run = Run::new(config.clone(), Viewport::default(), 2);
        let events = recorded(&mut run);
        press(&mut run);

        let ticks_per_window = (config.invincibility_ms / FRAME_MS).ceil() as usize + 1;
        for hit in 1..config.max_lives {
            assert_eq!(run.on_hazard_collision(hit), HazardOutcome::Damaged { hits: hit });
            // Overlap keeps reporting during invincibility
            assert_eq!(run.on_hazard_collision(hit), HazardOutcome::Ignored);
            for _ in 0..ticks_per_window {
                let input = held(&run);
                run.tick(&input, FRAME_MS);
            }
            press(&mut run);
        }

        // Two notifications in the same tick on the last life
        let last = run.on_hazard_collision(99);
        let dup = run.on_hazard_collision(99);
        assert_eq!(last, HazardOutcome::GameOver { hits: config.max_lives });
        assert_eq!(dup, HazardOutcome::Ignored);
        for _ in 0..ticks_per_window {
            run.tick(&TickInput::default(), FRAME_MS);
            run.on_hazard_collision(99);
        }

        let events = events.borrow();
        assert_eq!(count(&events, EventKind::GameOver), 1);
        assert_eq!(count(&events, EventKind::LivesChanged), config.max_lives as usize);
        assert_eq!(
            events.iter().rev().nth(1),
            Some(&GameEvent::LivesChanged {
                max_lives: config.max_lives,
                hits: config.max_lives
            })
        );
        assert!(run.state().is_game_over());
        assert!(run.is_world_paused());
        assert!(!run.state().driving());
        // HUD reads stopped even though the last tick was moving
        assert!(run.speed() > 0.0);
        assert_eq!(run.snapshot().speed, 0.0);
        assert_eq!(run.snapshot().lives_remaining, 0);
    }

    #[test]
    fn test_goal_scenario() {
        let mut run = Run::new(fast_config(), Viewport::default(), 9);
        let events = recorded(&mut run);
        press(&mut run);

        let mut goal_seen_at = None;
        let mut ticks = 0;
        while count(&events.borrow(), EventKind::GoalReached) == 0 {
            if matches!(run.state().phase(), Phase::CheckpointOverlay { .. }) {
                run.handle(Command::CheckpointOverlayClosed);
                press(&mut run);
            }
            let input = held(&run);
            run.tick(&input, FRAME_MS);
            if goal_seen_at.is_none() && run.spawner().goal().is_some() {
                goal_seen_at = Some(run.state().stats().distance_traveled);
            }
            ticks += 1;
            assert!(ticks < 5000, "goal never reached");
        }

        let collected_at = run.state().checkpoints().last_collected_at();
        let goal_at = goal_seen_at.unwrap();
        assert!(collected_at > 0.0);
        assert!(goal_at >= collected_at + run.config().goal_spawn_distance);

        let reached: Vec<Item> = events
            .borrow()
            .iter()
            .filter_map(|e| match e {
                GameEvent::CheckpointReached { item } => Some(*item),
                _ => None,
            })
            .collect();
        assert_eq!(reached, Item::ALL.to_vec());

        assert_eq!(run.state().phase(), Phase::GoalOverlay);
        assert!(run.state().spawning_disabled());
        assert!(run.spawner().goal().unwrap().docked);
        assert!(run.speed().abs() < 1e-4);

        // Finished runs stay finished until a restart
        run.handle(Command::CheckpointOverlayClosed);
        assert!(!press(&mut run));
        for _ in 0..100 {
            run.tick(&TickInput::default(), FRAME_MS);
        }
        assert_eq!(count(&events.borrow(), EventKind::GoalReached), 1);
        assert_eq!(run.on_hazard_collision(1), HazardOutcome::Ignored);

        run.handle(Command::RestartRequested);
        assert_eq!(events.borrow().last(), Some(&GameEvent::RunReset));
        assert_eq!(run.state().phase(), Phase::Road);
        assert_eq!(run.state().inventory().count(), 0);
        assert!(!run.state().goal_spawned());
        assert!(run.spawner().goal().is_none());
        assert!(run.spawner().checkpoints().is_empty());
        assert_eq!(run.vehicle().pos, run.viewport().vehicle_start());
    }

    #[test]
    fn test_goal_never_spawns_without_all_items() {
        let mut run = Run::new(fast_config(), Viewport::default(), 4);
        press(&mut run);
        // Ignore overlays entirely: only the first checkpoint can be collected
        for _ in 0..2000 {
            let input = held(&run);
            run.tick(&input, FRAME_MS);
        }
        assert_eq!(run.state().inventory().count(), 1);
        assert!(run.spawner().goal().is_none());
        assert!(!run.state().goal_spawned());
    }

    #[test]
    fn test_final_approach_freezes_scroll() {
        let mut run = Run::new(fast_config(), Viewport::default(), 3);
        press(&mut run);
        let mut ticks = 0;
        while run.state().phase() != Phase::FinalApproach {
            if matches!(run.state().phase(), Phase::CheckpointOverlay { .. }) {
                run.handle(Command::CheckpointOverlayClosed);
                press(&mut run);
            }
            let input = held(&run);
            run.tick(&input, FRAME_MS);
            ticks += 1;
            assert!(ticks < 5000);
        }
        assert!(run.spawner().is_paused());
        assert!(run.is_speed_ramp_paused());
        let scroll = run.scroll_y();
        let input = held(&run);
        run.tick(&input, FRAME_MS);
        assert_eq!(run.scroll_y(), scroll);
        // Driving again cannot restart spawning
        run.pointer_up();
        press(&mut run);
        assert!(run.spawner().is_paused());
        assert!(run.is_speed_ramp_paused());
    }

    #[test]
    fn test_speed_ramp_grows_while_driving() {
        let config = GameConfig::default();
        let mut run = Run::new(config.clone(), Viewport::default(), 1);
        let ticks = (config.speed_ramp_interval_ms / FRAME_MS).ceil() as usize + 1;
        for _ in 0..ticks {
            run.tick(&TickInput::default(), FRAME_MS);
        }
        assert_eq!(run.state().stats().speed_ramp, 0.0);

        press(&mut run);
        for _ in 0..ticks {
            let input = held(&run);
            run.tick(&input, FRAME_MS);
        }
        assert!((run.state().stats().speed_ramp - config.speed_ramp_step).abs() < 1e-5);
    }

    #[test]
    fn test_no_hazard_spawns_during_checkpoint_overlay() {
        let mut run = Run::new(fast_config(), Viewport::default(), 8);
        press(&mut run);
        while !run.state().paused_for_overlay() {
            let input = held(&run);
            run.tick(&input, FRAME_MS);
        }
        let ids: Vec<u32> = run.spawner().hazards().iter().map(|h| h.id).collect();
        for _ in 0..600 {
            run.tick(&TickInput::default(), FRAME_MS);
        }
        let after: Vec<u32> = run.spawner().hazards().iter().map(|h| h.id).collect();
        assert_eq!(ids, after);
    }

    #[test]
    fn test_unsafe_vehicle_spawn_skipped_in_run() {
        let mut run = Run::new(GameConfig::default(), Viewport::default(), 12);
        press(&mut run);
        let viewport = *run.viewport();
        let config = run.config().clone();
        let van = run
            .spawner_mut()
            .push_hazard(HazardKind::Van, Vec2::new(180.0, 0.0), &viewport, &config);
        let speed = run.model_speed();
        assert!(!run.spawner().can_spawn_vehicle_safely(&config, speed));

        let mut skipped = 0;
        for _ in 0..200 {
            let before = run.spawner().hazards().len();
            match run.spawner.spawn_hazard(&run.state, &run.config, &run.viewport, speed) {
                Some(id) => {
                    let hazard = run.spawner().hazards().iter().find(|h| h.id == id).unwrap();
                    assert_eq!(hazard.kind, HazardKind::Pothole);
                    run.spawner_mut().remove_hazard(id);
                }
                None => {
                    assert_eq!(run.spawner().hazards().len(), before);
                    skipped += 1;
                }
            }
        }
        assert!(skipped > 0);
        let drivers: Vec<u32> = run
            .spawner()
            .hazards()
            .iter()
            .filter(|h| h.kind.is_driving())
            .map(|h| h.id)
            .collect();
        assert_eq!(drivers, vec![van]);
    }

    #[test]
    fn test_restart_retires_running_timers() {
        let config = GameConfig {
            checkpoint_distances: [100_000.0, 200_000.0, 300_000.0],
            difficulty_interval_ms: 2000.0,
            ..Default::default()
        };
        let mut run = Run::new(config.clone(), Viewport::default(), 31);
        let events = recorded(&mut run);
        press(&mut run);
        for _ in 0..300 {
            let input = held(&run);
            run.tick(&input, FRAME_MS);
        }
        assert_eq!(run.state().phase(), Phase::Road);
        assert!(!run.spawner().is_paused());
        assert!(!run.is_speed_ramp_paused());
        assert!(run.spawner().spawn_delay_ms() < config.spawn_delay_ms);
        assert!(run.state().stats().speed_ramp > 0.0);

        run.handle(Command::RestartRequested);
        assert_eq!(events.borrow().last(), Some(&GameEvent::RunReset));
        assert!(run.spawner().is_paused());
        assert!(run.is_speed_ramp_paused());
        assert_eq!(run.spawner().spawn_delay_ms(), config.spawn_delay_ms);
        assert_eq!(run.state().stats().speed_ramp, 0.0);
        assert!(run.spawner().hazards().is_empty());
        assert!(!run.state().driving());

        // Nothing from the old run keeps firing
        for _ in 0..600 {
            run.tick(&TickInput::default(), FRAME_MS);
        }
        assert!(run.spawner().hazards().is_empty());
        assert_eq!(run.state().stats().speed_ramp, 0.0);
        assert_eq!(run.spawner().spawn_delay_ms(), config.spawn_delay_ms);
    }

    #[test]
    fn test_music_toggle_leaves_run_alone() {
        let mut run = Run::new(GameConfig::default(), Viewport::default(), 6);
        let events = recorded(&mut run);
        press(&mut run);
        for _ in 0..30 {
            let input = held(&run);
            run.tick(&input, FRAME_MS);
        }
        let before = serde_json::to_string(&run.snapshot()).unwrap();
        let spawner_paused = run.spawner().is_paused();
        let ramp_paused = run.is_speed_ramp_paused();

        run.handle(Command::MusicToggle { enabled: false });
        run.handle(Command::MusicToggle { enabled: true });

        assert_eq!(serde_json::to_string(&run.snapshot()).unwrap(), before);
        assert_eq!(run.spawner().is_paused(), spawner_paused);
        assert_eq!(run.is_speed_ramp_paused(), ramp_paused);
        assert!(run.state().driving());
        assert!(events.borrow().is_empty());
    }

    #[test]
    fn test_autopilot_drives() {
        let mut run = Run::new(GameConfig::default(), Viewport::default(), 21);
        let input = TickInput {
            pointer_x: None,
            autopilot: true,
        };
        for _ in 0..600 {
            run.tick(&input, FRAME_MS);
        }
        assert!(run.state().driving());
        assert!(run.state().stats().distance_traveled > 0.0);
        let snapshot = run.snapshot();
        assert!(snapshot.driving);
        assert_eq!(snapshot.lives_remaining, 5);
        assert!(serde_json::to_string(&snapshot).is_ok());
    }

    #[test]
    fn test_determinism() {
        let input = TickInput {
            pointer_x: None,
            autopilot: true,
        };
        let mut a = Run::new(GameConfig::default(), Viewport::default(), 77);
        let mut b = Run::new(GameConfig::default(), Viewport::default(), 77);
        for _ in 0..1500 {
            a.tick(&input, FRAME_MS);
            b.tick(&input, FRAME_MS);
        }
        assert_eq!(a.spawner().hazards(), b.spawner().hazards());
        assert_eq!(a.vehicle().pos, b.vehicle().pos);
        assert_eq!(a.state().stats(), b.state().stats());
    }

    #[derive(Debug, Clone)]
    enum Action {
        Tick(Option<f32>),
        Press,
        Release,
        HazardHit,
        EdgeHit(bool),
        CloseOverlay,
    }

    fn action() -> impl Strategy<Value = Action> {
        prop_oneof![
            6 => prop::option::of(0.0f32..360.0).prop_map(Action::Tick),
            1 => Just(Action::Press),
            1 => Just(Action::Release),
            1 => Just(Action::HazardHit),
            1 => any::<bool>().prop_map(Action::EdgeHit),
            1 => Just(Action::CloseOverlay),
        ]
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(64))]

        #[test]
        fn prop_invariants_hold(actions in prop::collection::vec(action(), 1..400)) {
            let config = fast_config();
            let mut run = Run::new(config.clone(), Viewport::default(), 1234);
            let mut was_disabled = false;
            let mut was_over = false;

            for action in actions {
                match action {
                    Action::Tick(px) => {
                        let input = TickInput { pointer_x: px, autopilot: false };
                        run.tick(&input, FRAME_MS);
                    }
                    Action::Press => { press(&mut run); }
                    Action::Release => run.pointer_up(),
                    Action::HazardHit => { run.on_hazard_collision(0); }
                    Action::EdgeHit(left) => {
                        run.on_edge_collision(if left { Side::Left } else { Side::Right });
                    }
                    Action::CloseOverlay => run.handle(Command::CheckpointOverlayClosed),
                }

                let state = run.state();
                let stats = state.stats();
                prop_assert!(stats.hits <= config.max_lives);
                prop_assert!(stats.speed_ramp >= 0.0 && stats.speed_ramp <= config.speed_ramp_max);
                for (idx, item) in Item::ALL.into_iter().enumerate() {
                    if state.checkpoints().is_spawned(item) {
                        prop_assert!(stats.distance_traveled >= config.checkpoint_distances[idx]);
                        for earlier in &Item::ALL[..idx] {
                            prop_assert!(state.checkpoints().is_spawned(*earlier));
                        }
                    }
                }
                if state.goal_spawned() {
                    prop_assert!(state.has_all_items());
                }
                prop_assert!(run.spawner().hazards().len() <= config.max_hazards_on_screen);
                prop_assert!(!was_disabled || state.spawning_disabled());
                prop_assert!(!was_over || state.is_game_over());
                if state.paused_for_overlay() {
                    prop_assert!(run.spawner().is_paused());
                }
                was_disabled = state.spawning_disabled();
                was_over = state.is_game_over();
            }
        }
    }
}
