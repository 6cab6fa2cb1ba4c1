//! Component trait and handler context

use std::any::Any;
use std::cell::RefCell;
use std::rc::Rc;

use crate::engine::EngineError;
use crate::events::{Event, EventBus, EventData, EventKind};
use crate::foundation::collections::{ComponentId, EntityId};
use crate::foundation::value::Value;
use crate::scene::Scene;
use crate::services::Services;

use super::Entity;

/// Upcast to `Any` for downcasting trait objects
pub trait AsAny {
    /// Borrow as `Any`
    fn as_any(&self) -> &dyn Any;
    /// Mutably borrow as `Any`
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Behaviour attached to an entity
///
/// A component declares the event kinds it handles in [`subscriptions`]; the
/// scene registers those pairs when the component is attached. The first
/// event delivered to a component is always [`EventData::Init`].
///
/// [`subscriptions`]: Component::subscriptions
pub trait Component: AsAny + 'static {
    /// Type name used in logs and for `has_component_named`
    fn name(&self) -> &'static str;

    /// Event kinds this component handles
    fn subscriptions(&self) -> Vec<EventKind> {
        Vec::new()
    }

    /// Delivered by the behaviour manager rather than the event dispatcher
    fn is_script(&self) -> bool {
        false
    }

    /// At most one component of this type per entity
    fn unique(&self) -> bool {
        false
    }

    /// Handle an event
    fn on_event(&mut self, _ctx: &mut Context<'_>, _event: &Event) -> Result<(), EngineError> {
        Ok(())
    }

    /// Animation hook: write a named property. Returns whether it was accepted.
    fn set_property(&mut self, _name: &str, _value: &Value) -> bool {
        false
    }

    /// Read a named property
    fn property(&self, _name: &str) -> Option<Value> {
        None
    }
}

/// Downcast a component trait object
pub fn downcast_ref<'a, T: Component>(component: &'a (dyn Component + 'static)) -> Option<&'a T> {
    component.as_any().downcast_ref()
}

/// Mutably downcast a component trait object
pub fn downcast_mut<'a, T: Component>(component: &'a mut (dyn Component + 'static)) -> Option<&'a mut T> {
    component.as_any_mut().downcast_mut()
}

/// What a component handler can reach while it runs
///
/// The running component is detached from its entity for the duration of the
/// call, so looking it up through `scene` finds nothing.
pub struct Context<'a> {
    /// Owner of the running component
    pub entity: EntityId,
    /// The running component
    pub component: ComponentId,
    /// Scene the owner lives in
    pub scene: &'a mut Scene,
    /// Event queues
    pub bus: &'a mut EventBus,
    /// Shared capabilities
    pub services: &'a Services,
}

impl Context<'_> {
    /// Queue an event
    pub fn dispatch(&mut self, data: EventData, immediate: bool) {
        self.bus.dispatch(data, immediate);
    }

    /// Queue an event for the owner only
    pub fn dispatch_to_self(&mut self, data: EventData, immediate: bool) {
        self.bus.dispatch(Event::new(data).only(self.entity), immediate);
    }

    /// The owner entity
    pub fn owner(&self) -> Option<&Entity> {
        self.scene.entity(self.entity)
    }

    /// The owner entity, mutably
    pub fn owner_mut(&mut self) -> Option<&mut Entity> {
        self.scene.entity_mut(self.entity)
    }

    /// Look up a service
    pub fn service<T: 'static>(&self) -> Result<Rc<RefCell<T>>, EngineError> {
        self.services.require::<T>()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(u32);

    impl Component for Counter {
        fn name(&self) -> &'static str {
            "Counter"
        }
    }

    struct Other;

    impl Component for Other {
        fn name(&self) -> &'static str {
            "Other"
        }
    }

    #[test]
    fn test_downcast_borrows_from_the_component() {
        let mut boxed: Box<dyn Component> = Box::new(Counter(1));
        if let Some(counter) = downcast_mut::<Counter>(boxed.as_mut()) {
            counter.0 += 1;
        }
        let count = downcast_ref::<Counter>(boxed.as_ref()).map(|c| c.0);
        assert_eq!(count, Some(2));
        assert!(downcast_ref::<Other>(boxed.as_ref()).is_none());
    }
}
