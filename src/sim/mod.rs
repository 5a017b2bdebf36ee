//! Deterministic simulation module
//!
//! All gameplay logic lives here. This module must be pure and deterministic:
//! - Time only advances through `dt_ms` passed to [`Run::tick`]
//! - Seeded RNG only
//! - Stable iteration order (by entity ID)
//! - No rendering, audio, or platform dependencies

pub mod collision;
pub mod entity;
pub mod events;
pub mod schedule;
pub mod spawner;
pub mod state;
pub mod tick;

pub use collision::{CollisionResolver, Contact, EdgeBump, HazardOutcome, Side, detect_contacts};
pub use entity::{Aabb, Checkpoint, Goal, Hazard, HazardBehavior, HazardKind, Vehicle, Viewport};
pub use events::{Command, EventKind, GameEvent, Observers, SubscriptionId};
pub use schedule::{Easing, Periodic, Tween};
pub use spawner::Spawner;
pub use state::{CheckpointProgress, Inventory, Item, Phase, ProgressionState, Stats};
pub use tick::{HudSnapshot, Run, TickInput};
