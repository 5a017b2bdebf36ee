//! Run progression state
//!
//! The single mutable record of a run. Everything outside the orchestrator and
//! the collision resolver sees it read-only; mutation goes through the named
//! methods below so the invariants are checked in one place.

use serde::{Deserialize, Serialize};

use crate::config::GameConfig;

/// Collectible carried by a checkpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Item {
    Key,
    Map,
    Ticket,
}

impl Item {
    /// Collection order
    pub const ALL: [Item; 3] = [Item::Key, Item::Map, Item::Ticket];

    pub fn index(self) -> usize {
        match self {
            Item::Key => 0,
            Item::Map => 1,
            Item::Ticket => 2,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Item::Key => "key",
            Item::Map => "map",
            Item::Ticket => "ticket",
        }
    }
}

/// Current phase of the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Phase {
    /// On the road (coasting or driving)
    Road,
    /// Checkpoint overlay is up, waiting for it to close
    CheckpointOverlay { item: Item },
    /// Goal docked; speed decaying and vehicle moving to the goal
    FinalApproach,
    /// Goal reached overlay is up; the run is logically finished
    GoalOverlay,
    /// Out of lives
    GameOver,
}

impl Phase {
    pub fn is_paused_for_overlay(&self) -> bool {
        matches!(self, Phase::CheckpointOverlay { .. } | Phase::GoalOverlay)
    }

    /// Scroll is frozen and spawning is off for good
    pub fn is_final_approach(&self) -> bool {
        matches!(self, Phase::FinalApproach | Phase::GoalOverlay)
    }

    pub fn is_game_over(&self) -> bool {
        matches!(self, Phase::GameOver)
    }

    /// The player can hold the wheel in this phase
    pub fn allows_driving(&self) -> bool {
        matches!(self, Phase::Road | Phase::FinalApproach)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Road => "road",
            Phase::CheckpointOverlay { .. } => "checkpoint_overlay",
            Phase::FinalApproach => "final_approach",
            Phase::GoalOverlay => "goal_overlay",
            Phase::GameOver => "game_over",
        }
    }

    fn can_enter(&self, next: &Phase) -> bool {
        match (self, next) {
            (Phase::GameOver, _) => false,
            (_, Phase::GameOver) => true,
            (Phase::Road, Phase::CheckpointOverlay { .. }) => true,
            (Phase::CheckpointOverlay { .. }, Phase::Road) => true,
            (Phase::Road, Phase::FinalApproach) => true,
            (Phase::FinalApproach, Phase::GoalOverlay) => true,
            _ => false,
        }
    }
}

/// Three collectible slots, flipped true once and never back
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Inventory {
    slots: [bool; 3],
}

impl Inventory {
    pub fn has(&self, item: Item) -> bool {
        self.slots[item.index()]
    }

    pub fn all(&self) -> bool {
        self.slots.iter().all(|&s| s)
    }

    pub fn count(&self) -> usize {
        self.slots.iter().filter(|&&s| s).count()
    }
}

/// Run statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Stats {
    /// Hazard hits taken (never above max lives)
    pub hits: u32,
    /// Metres travelled
    pub distance_traveled: f32,
    /// Speed ramp in [0, speed_ramp_max]
    pub speed_ramp: f32,
}

/// Checkpoint bookkeeping
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CheckpointProgress {
    spawned: [bool; 3],
    /// Distance when the final item was collected (0 until then)
    last_collected_at: f32,
}

impl CheckpointProgress {
    pub fn is_spawned(&self, item: Item) -> bool {
        self.spawned[item.index()]
    }

    pub fn last_collected_at(&self) -> f32 {
        self.last_collected_at
    }
}

/// Mutable progression record for one run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressionState {
    phase: Phase,
    driving: bool,
    spawning_disabled: bool,
    goal_spawned: bool,
    /// Absolute clock timestamps (ms)
    invincible_until: f64,
    slow_down_until: f64,
    inventory: Inventory,
    stats: Stats,
    checkpoints: CheckpointProgress,
    max_lives: u32,
}

impl ProgressionState {
    pub fn new(config: &GameConfig) -> Self {
        Self {
            phase: Phase::Road,
            driving: false,
            spawning_disabled: false,
            goal_spawned: false,
            invincible_until: 0.0,
            slow_down_until: 0.0,
            inventory: Inventory::default(),
            stats: Stats::default(),
            checkpoints: CheckpointProgress::default(),
            max_lives: config.max_lives,
        }
    }

    /// Back to run-start defaults
    pub fn reset(&mut self) {
        let max_lives = self.max_lives;
        *self = Self {
            phase: Phase::Road,
            driving: false,
            spawning_disabled: false,
            goal_spawned: false,
            invincible_until: 0.0,
            slow_down_until: 0.0,
            inventory: Inventory::default(),
            stats: Stats::default(),
            checkpoints: CheckpointProgress::default(),
            max_lives,
        };
    }

    // === Read access ===

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn driving(&self) -> bool {
        self.driving
    }

    pub fn is_game_over(&self) -> bool {
        self.phase.is_game_over()
    }

    pub fn paused_for_overlay(&self) -> bool {
        self.phase.is_paused_for_overlay()
    }

    pub fn final_approach(&self) -> bool {
        self.phase.is_final_approach()
    }

    /// One-way; always true once the final approach has begun
    pub fn spawning_disabled(&self) -> bool {
        self.spawning_disabled || self.phase.is_final_approach()
    }

    pub fn goal_spawned(&self) -> bool {
        self.goal_spawned
    }

    pub fn inventory(&self) -> &Inventory {
        &self.inventory
    }

    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    pub fn checkpoints(&self) -> &CheckpointProgress {
        &self.checkpoints
    }

    pub fn max_lives(&self) -> u32 {
        self.max_lives
    }

    pub fn lives_remaining(&self) -> u32 {
        self.max_lives - self.stats.hits
    }

    pub fn slow_down_until(&self) -> f64 {
        self.slow_down_until
    }

    pub fn has_all_items(&self) -> bool {
        self.inventory.all()
    }

    pub fn is_slowed(&self, now: f64) -> bool {
        now < self.slow_down_until
    }

    pub fn is_invincible(&self, now: f64) -> bool {
        now < self.invincible_until
    }

    // === Mutation (orchestrator / collision resolver) ===

    /// Mark an item collected. Returns true if it was new.
    pub(crate) fn collect(&mut self, item: Item) -> bool {
        let slot = &mut self.inventory.slots[item.index()];
        let fresh = !*slot;
        *slot = true;
        fresh
    }

    pub(crate) fn take_damage(&mut self) {
        self.stats.hits = (self.stats.hits + 1).min(self.max_lives);
    }

    pub(crate) fn accrue_distance(&mut self, delta: f32) {
        if delta.is_finite() && delta > 0.0 {
            self.stats.distance_traveled += delta;
        }
    }

    pub(crate) fn advance_speed_ramp(&mut self, step: f32, max: f32) {
        self.stats.speed_ramp = (self.stats.speed_ramp + step).clamp(0.0, max.max(0.0));
    }

    /// Driving is forced off in phases that do not allow it
    pub(crate) fn set_driving(&mut self, driving: bool) -> bool {
        self.driving = driving && self.phase.allows_driving();
        self.driving
    }

    /// Guarded phase transition. Returns false when the move is illegal.
    pub(crate) fn enter_phase(&mut self, next: Phase) -> bool {
        if !self.phase.can_enter(&next) {
            return false;
        }
        self.phase = next;
        if !self.phase.allows_driving() {
            self.driving = false;
        }
        true
    }

    pub(crate) fn disable_spawning(&mut self) {
        self.spawning_disabled = true;
    }

    pub(crate) fn set_invincible_until(&mut self, until: f64) {
        self.invincible_until = until;
    }

    pub(crate) fn set_slow_down_until(&mut self, until: f64) {
        self.slow_down_until = until;
    }

    /// Extend the slow-down window, never shortening it
    pub(crate) fn extend_slow_down_until(&mut self, until: f64) {
        self.slow_down_until = self.slow_down_until.max(until);
    }

    /// Claim the spawn of `item`'s checkpoint. True exactly once per run, and
    /// only after `threshold` metres and every earlier checkpoint.
    pub(crate) fn try_mark_checkpoint_spawned(&mut self, item: Item, threshold: f32) -> bool {
        let idx = item.index();
        if self.checkpoints.spawned[idx] || self.stats.distance_traveled < threshold {
            return false;
        }
        if !self.checkpoints.spawned[..idx].iter().all(|&s| s) {
            return false;
        }
        self.checkpoints.spawned[idx] = true;
        true
    }

    /// Record where the full inventory was completed. Only the first call counts.
    pub(crate) fn record_last_collection(&mut self) -> bool {
        if !self.has_all_items() || self.checkpoints.last_collected_at > 0.0 {
            return false;
        }
        // Guard against a zero marker being mistaken for "not yet"
        self.checkpoints.last_collected_at = self.stats.distance_traveled.max(f32::MIN_POSITIVE);
        true
    }

    /// Claim the goal spawn. True at most once per run.
    pub(crate) fn try_mark_goal_spawned(&mut self, buffer: f32) -> bool {
        let last = self.checkpoints.last_collected_at;
        let ready = self.has_all_items()
            && !self.goal_spawned
            && last > 0.0
            && self.stats.distance_traveled >= last + buffer;
        if ready {
            self.goal_spawned = true;
            self.spawning_disabled = true;
        }
        ready
    }
}
