//! Event model and the two-queue event bus
//!
//! Everything that happens in the engine travels as an [`Event`]. Subsystems
//! and components never call each other across module boundaries; they
//! dispatch events and the engine pump routes them.
//!
//! Key principles:
//! - Immediate events jump to the front of the current-frame queue
//! - Deferred events wait for the next frame
//! - Scene-control events are always immediate
//! - Events are stamped with the scene they were raised in; stale ones are dropped

mod bus;
mod kinds;

pub use bus::{EventBus, Task};
pub use kinds::{
    Collision, ColliderRef, ComponentRequest, EventData, EventKind, Payload, SceneRequest,
};

use crate::foundation::collections::{EntityId, SceneId};

/// An event with its routing metadata
#[derive(Debug, Clone)]
pub struct Event {
    /// Kind and payload
    pub data: EventData,
    /// Scene the event belongs to, stamped on dispatch
    pub scene: Option<SceneId>,
    /// Engine time scale at dispatch time
    pub time_scale: f32,
    /// Restrict component delivery to one entity
    pub only_entity: Option<EntityId>,
}

impl Event {
    /// Unstamped event
    pub const fn new(data: EventData) -> Self {
        Self {
            data,
            scene: None,
            time_scale: 1.0,
            only_entity: None,
        }
    }

    /// Deliver only to `entity`'s components
    #[must_use]
    pub const fn only(mut self, entity: EntityId) -> Self {
        self.only_entity = Some(entity);
        self
    }

    /// Pin the event to a scene
    #[must_use]
    pub const fn in_scene(mut self, scene: SceneId) -> Self {
        self.scene = Some(scene);
        self
    }

    /// Routing kind
    pub fn kind(&self) -> EventKind {
        self.data.kind()
    }

    /// Time delta carried by timing events, scaled by the time scale
    pub fn scaled_delta(&self) -> Option<f32> {
        self.data.delta().map(|dt| dt * self.time_scale)
    }
}

impl From<EventData> for Event {
    fn from(data: EventData) -> Self {
        Self::new(data)
    }
}
