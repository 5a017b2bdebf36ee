//! Domain events and the observer registry
//!
//! The core publishes [`GameEvent`]s to subscribed presentation collaborators
//! (HUD, overlays, audio) and accepts [`Command`]s back from them.

use serde::{Deserialize, Serialize};

use super::state::Item;

/// Core → presentation notifications
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum GameEvent {
    /// A checkpoint was collected; show its overlay
    CheckpointReached { item: Item },
    LivesChanged { max_lives: u32, hits: u32 },
    /// Final approach finished; show the invite
    GoalReached,
    /// Fresh run; presentation clears inventory/HUD
    RunReset,
    GameOver,
    /// Brief screen shake after an edge bump
    CameraShake { duration_ms: f32, intensity: f32 },
}

/// Event discriminant, for filtered subscriptions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    CheckpointReached,
    LivesChanged,
    GoalReached,
    RunReset,
    GameOver,
    CameraShake,
}

impl GameEvent {
    pub fn kind(&self) -> EventKind {
        match self {
            GameEvent::CheckpointReached { .. } => EventKind::CheckpointReached,
            GameEvent::LivesChanged { .. } => EventKind::LivesChanged,
            GameEvent::GoalReached => EventKind::GoalReached,
            GameEvent::RunReset => EventKind::RunReset,
            GameEvent::GameOver => EventKind::GameOver,
            GameEvent::CameraShake { .. } => EventKind::CameraShake,
        }
    }
}

/// Presentation → core commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", rename_all = "kebab-case")]
pub enum Command {
    CheckpointOverlayClosed,
    RestartRequested,
    /// Audio collaborator concern; the core ignores it
    MusicToggle { enabled: bool },
}

/// Handle returned by [`Observers::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u32);

type Callback = Box<dyn FnMut(&GameEvent)>;

struct Subscriber {
    id: SubscriptionId,
    filter: Option<EventKind>,
    callback: Callback,
}

/// Subscriber registry owned by the run
#[derive(Default)]
pub struct Observers {
    subscribers: Vec<Subscriber>,
    next_id: u32,
}

impl std::fmt::Debug for Observers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Observers")
            .field("subscribers", &self.subscribers.len())
            .finish()
    }
}

impl Observers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every event
    pub fn subscribe(&mut self, callback: impl FnMut(&GameEvent) + 'static) -> SubscriptionId {
        self.add(None, Box::new(callback))
    }

    /// Receive only events of one kind
    pub fn subscribe_to(
        &mut self,
        kind: EventKind,
        callback: impl FnMut(&GameEvent) + 'static,
    ) -> SubscriptionId {
        self.add(Some(kind), Box::new(callback))
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|s| s.id != id);
        self.subscribers.len() != before
    }

    pub fn len(&self) -> usize {
        self.subscribers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscribers.is_empty()
    }

    /// Deliver to matching subscribers in subscription order
    pub fn emit(&mut self, event: &GameEvent) {
        log::debug!("event: {:?}", event);
        let kind = event.kind();
        for sub in &mut self.subscribers {
            if sub.filter.is_none_or(|k| k == kind) {
                (sub.callback)(event);
            }
        }
    }

    fn add(&mut self, filter: Option<EventKind>, callback: Callback) -> SubscriptionId {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        self.subscribers.push(Subscriber {
            id,
            filter,
            callback,
        });
        id
    }
}
