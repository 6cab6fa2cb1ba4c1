//! Handle types and id generators

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

pub use slotmap::{SecondaryMap, SlotMap};

slotmap::new_key_type! {
    /// Stable handle of an entity inside its scene
    pub struct EntityId;

    /// Stable handle of a UI element inside its canvas
    pub struct ElementId;
}

/// Process-wide monotonic id source
///
/// Slot map keys are only unique within one map; ids that must stay unique
/// across maps (components moving between entities, scenes on the stack)
/// come from one of these.
pub struct IdCounter(AtomicU64);

impl IdCounter {
    /// Counter whose first id is 1
    pub const fn new() -> Self {
        Self(AtomicU64::new(1))
    }

    /// Next id
    pub fn next(&self) -> u64 {
        self.0.fetch_add(1, Ordering::Relaxed)
    }
}

impl Default for IdCounter {
    fn default() -> Self {
        Self::new()
    }
}

static COMPONENT_IDS: IdCounter = IdCounter::new();
static SCENE_IDS: IdCounter = IdCounter::new();

/// Identity of one attached component
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ComponentId(u64);

impl ComponentId {
    /// Fresh id
    pub fn next() -> Self {
        Self(COMPONENT_IDS.next())
    }

    /// Raw value
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "c{}", self.0)
    }
}

/// Identity of a scene
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SceneId(u64);

impl SceneId {
    /// Fresh id
    pub fn next() -> Self {
        Self(SCENE_IDS.next())
    }

    /// Raw value
    pub const fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "scene#{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = ComponentId::next();
        let b = ComponentId::next();
        assert_ne!(a, b);
        assert!(b.raw() > a.raw());
        assert_ne!(SceneId::next(), SceneId::next());
    }

    #[test]
    fn test_entity_keys_are_stable() {
        let mut map: SlotMap<EntityId, &str> = SlotMap::with_key();
        let a = map.insert("a");
        let b = map.insert("b");
        map.remove(a);
        assert_eq!(map.get(b), Some(&"b"));
        assert!(map.get(a).is_none());
    }
}
