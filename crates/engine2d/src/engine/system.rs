//! System trait
//!
//! Systems are the engine-side subscribers: physics, rendering, animation,
//! input, UI and the two component dispatchers. They see events before any
//! component does, and scene lifecycle broadcasts reach every one of them.

use std::cell::RefCell;
use std::rc::Rc;

use crate::events::{Event, EventBus, EventData, EventKind};
use crate::scene::Scene;
use crate::services::Services;

use super::EngineError;

/// What a system can reach while handling an event
pub struct SystemContext<'a> {
    /// Top scene of the stack, if any
    pub scene: Option<&'a mut Scene>,
    /// Event queues
    pub bus: &'a mut EventBus,
    /// Shared capabilities
    pub services: &'a Services,
}

impl SystemContext<'_> {
    /// The current scene, or [`EngineError::NoScene`]
    pub fn scene_mut(&mut self) -> Result<&mut Scene, EngineError> {
        self.scene.as_deref_mut().ok_or(EngineError::NoScene)
    }

    /// Queue an event
    pub fn dispatch(&mut self, data: EventData, immediate: bool) {
        self.bus.dispatch(data, immediate);
    }
}

/// Engine subsystem driven by events
pub trait System: 'static {
    /// Name used in logs
    fn name(&self) -> &'static str;

    /// Event kinds this system handles. Scene lifecycle broadcasts are
    /// delivered regardless.
    fn subscriptions(&self) -> Vec<EventKind>;

    /// Receives every event, after the subscribed systems
    fn is_wildcard(&self) -> bool {
        false
    }

    /// Handle an event
    fn on_event(&mut self, ctx: &mut SystemContext<'_>, event: &Event) -> Result<(), EngineError>;
}

/// Shared systems are registered as a service and as a system at once
impl<T: System> System for Rc<RefCell<T>> {
    fn name(&self) -> &'static str {
        self.borrow().name()
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        self.borrow().subscriptions()
    }

    fn is_wildcard(&self) -> bool {
        self.borrow().is_wildcard()
    }

    fn on_event(&mut self, ctx: &mut SystemContext<'_>, event: &Event) -> Result<(), EngineError> {
        self.try_borrow_mut()
            .map_err(|_| EngineError::Handler(format!("{} is already running", std::any::type_name::<T>())))?
            .on_event(ctx, event)
    }
}
