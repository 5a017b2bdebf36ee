//! Collision response
//!
//! Overlap detection belongs to the physics collaborator; this module decides
//! what an overlap means for the run. [`detect_contacts`] is a plain AABB
//! stand-in for headless runs and tests.

use serde::{Deserialize, Serialize};

use super::entity::{Hazard, Vehicle, Viewport};
use super::state::{Phase, ProgressionState};
use crate::config::GameConfig;
use crate::consts::*;

/// Road edge
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Left,
    Right,
}

impl Side {
    /// Horizontal nudge back toward the lane center
    pub fn push(self) -> f32 {
        match self {
            Side::Left => EDGE_PUSH,
            Side::Right => -EDGE_PUSH,
        }
    }
}

/// An overlap notification
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Contact {
    Hazard { id: u32 },
    Edge { side: Side },
}

/// Result of a hazard hit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HazardOutcome {
    /// Invincible, finished, or already over
    Ignored,
    /// Lost a life; slowed and briefly invincible
    Damaged { hits: u32 },
    /// Last life lost
    GameOver { hits: u32 },
}

/// Response to an edge bump
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EdgeBump {
    pub push: f32,
    pub shake_ms: f32,
    pub shake_intensity: f32,
}

/// Applies damage, invincibility, slow-downs and the terminal transition
pub struct CollisionResolver;

impl CollisionResolver {
    pub fn on_hazard_hit(state: &mut ProgressionState, config: &GameConfig, now: f64) -> HazardOutcome {
        if state.is_game_over() || state.is_invincible(now) || state.phase() == Phase::GoalOverlay {
            return HazardOutcome::Ignored;
        }

        state.set_invincible_until(now + config.invincibility_ms as f64);
        state.take_damage();
        let hits = state.stats().hits;

        if hits >= state.max_lives() {
            // Finite so the state still serializes
            state.set_invincible_until(f64::MAX);
            state.enter_phase(Phase::GameOver);
            log::info!("Game over after {} hits", hits);
            return HazardOutcome::GameOver { hits };
        }

        state.set_slow_down_until(now + config.slow_down_ms as f64);
        log::info!("Hit {} of {}", hits, state.max_lives());
        HazardOutcome::Damaged { hits }
    }

    /// Edge bumps never cost a life or grant invincibility
    pub fn on_edge_hit(state: &mut ProgressionState, side: Side, now: f64) -> Option<EdgeBump> {
        if state.is_game_over() {
            return None;
        }
        state.extend_slow_down_until(now + EDGE_SLOW_MS);
        log::debug!("Edge bump on {:?}", side);
        Some(EdgeBump {
            push: side.push(),
            shake_ms: EDGE_SHAKE_MS,
            shake_intensity: EDGE_SHAKE_INTENSITY,
        })
    }
}

/// AABB overlaps between the vehicle and hazards/road edges
pub fn detect_contacts(
    vehicle: &Vehicle,
    hazards: &[Hazard],
    viewport: &Viewport,
    config: &GameConfig,
) -> Vec<Contact> {
    let bounds = vehicle.bounds();
    let mut contacts: Vec<Contact> = hazards
        .iter()
        .filter(|h| bounds.overlaps(&h.bounds()))
        .map(|h| Contact::Hazard { id: h.id })
        .collect();

    let (left, right) = viewport.road_edges(config);
    if bounds.min().x < left {
        contacts.push(Contact::Edge { side: Side::Left });
    } else if bounds.max().x > right {
        contacts.push(Contact::Edge { side: Side::Right });
    }
    contacts
}
