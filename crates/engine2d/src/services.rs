//! Type-keyed registry of shared capabilities
//!
//! Physics queries, input polling, the asset loader and the render backend
//! are reached through here rather than through globals. Each service is a
//! `Rc<RefCell<T>>` so systems and handlers can share it on the main thread.

use std::any::{type_name, Any, TypeId};
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

use crate::engine::EngineError;

/// Service registry
#[derive(Default)]
pub struct Services {
    entries: HashMap<TypeId, Rc<dyn Any>>,
}

impl Services {
    /// Empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `service`, replacing any previous one of the same type
    pub fn provide<T: 'static>(&mut self, service: Rc<RefCell<T>>) {
        log::debug!("service provided: {}", type_name::<T>());
        self.entries.insert(TypeId::of::<T>(), service);
    }

    /// Look up a service
    pub fn get<T: 'static>(&self) -> Option<Rc<RefCell<T>>> {
        self.entries
            .get(&TypeId::of::<T>())
            .and_then(|entry| Rc::clone(entry).downcast::<RefCell<T>>().ok())
    }

    /// Look up a service that must exist
    pub fn require<T: 'static>(&self) -> Result<Rc<RefCell<T>>, EngineError> {
        self.get::<T>()
            .ok_or(EngineError::ServiceMissing(type_name::<T>()))
    }

    /// Unregister a service
    pub fn remove<T: 'static>(&mut self) -> Option<Rc<RefCell<T>>> {
        self.entries
            .remove(&TypeId::of::<T>())
            .and_then(|entry| entry.downcast::<RefCell<T>>().ok())
    }

    /// Whether a service of type `T` is registered
    pub fn contains<T: 'static>(&self) -> bool {
        self.entries.contains_key(&TypeId::of::<T>())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(u32);

    #[test]
    fn test_provide_get_remove() {
        let mut services = Services::new();
        assert!(services.get::<Counter>().is_none());
        assert!(matches!(services.require::<Counter>(), Err(EngineError::ServiceMissing(_))));

        services.provide(Rc::new(RefCell::new(Counter(1))));
        if let Some(counter) = services.get::<Counter>() {
            counter.borrow_mut().0 += 1;
        }
        assert_eq!(services.get::<Counter>().map(|c| c.borrow().0), Some(2));

        assert!(services.remove::<Counter>().is_some());
        assert!(!services.contains::<Counter>());
    }
}
