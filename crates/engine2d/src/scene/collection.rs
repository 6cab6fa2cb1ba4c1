//! Kind and tag index over scene entities

use std::collections::HashMap;

use indexmap::IndexSet;

use crate::ecs::{Entity, Kind};
use crate::foundation::collections::EntityId;

/// Entities grouped by kind and by tag, in insertion order
#[derive(Debug, Default)]
pub struct EntityCollection {
    all: IndexSet<EntityId>,
    kinds: HashMap<Kind, IndexSet<EntityId>>,
    tags: HashMap<String, IndexSet<EntityId>>,
}

impl EntityCollection {
    /// Index `entity` under `id`
    pub fn insert(&mut self, id: EntityId, entity: &Entity) {
        self.all.insert(id);
        for kind in entity.kinds() {
            self.kinds.entry(kind).or_default().insert(id);
        }
        if let Some(tag) = entity.tag() {
            self.tags.entry(tag.to_owned()).or_default().insert(id);
        }
    }

    /// Drop `id` from every index
    pub fn remove(&mut self, id: EntityId, entity: &Entity) {
        self.all.shift_remove(&id);
        for kind in entity.kinds() {
            if let Some(set) = self.kinds.get_mut(&kind) {
                set.shift_remove(&id);
                if set.is_empty() {
                    self.kinds.remove(&kind);
                }
            }
        }
        if let Some(tag) = entity.tag() {
            self.untag(id, tag);
        }
    }

    pub(crate) fn untag(&mut self, id: EntityId, tag: &str) {
        if let Some(set) = self.tags.get_mut(tag) {
            set.shift_remove(&id);
            if set.is_empty() {
                self.tags.remove(tag);
            }
        }
    }

    pub(crate) fn tag(&mut self, id: EntityId, tag: &str) {
        self.tags.entry(tag.to_owned()).or_default().insert(id);
    }

    /// Every entity, in insertion order
    pub fn all(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.all.iter().copied()
    }

    /// Entities of `kind`
    pub fn by_kind(&self, kind: &Kind) -> Vec<EntityId> {
        self.kinds
            .get(kind)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Entities tagged `tag`
    pub fn by_tag(&self, tag: &str) -> Vec<EntityId> {
        self.tags
            .get(tag)
            .map(|set| set.iter().copied().collect())
            .unwrap_or_default()
    }

    /// Whether `id` is indexed
    pub fn contains(&self, id: EntityId) -> bool {
        self.all.contains(&id)
    }

    /// Number of indexed entities
    pub fn len(&self) -> usize {
        self.all.len()
    }

    /// No entity indexed
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::foundation::collections::SlotMap;

    #[test]
    fn test_insert_remove_symmetry() {
        let mut ids: SlotMap<EntityId, ()> = SlotMap::with_key();
        let id = ids.insert(());
        let entity = Entity::new("cam").with_kind(Kind::CAMERA).with_tag("Main");
        let mut collection = EntityCollection::default();

        collection.insert(id, &entity);
        assert!(collection.contains(id));
        assert_eq!(collection.by_kind(&Kind::ENTITY), vec![id]);
        assert_eq!(collection.by_kind(&Kind::CAMERA), vec![id]);
        assert_eq!(collection.by_tag("Main"), vec![id]);

        collection.remove(id, &entity);
        assert!(collection.is_empty());
        assert!(collection.by_kind(&Kind::CAMERA).is_empty());
        assert!(collection.by_tag("Main").is_empty());
    }
}
