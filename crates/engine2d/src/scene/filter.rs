//! Filters for frame queries

use std::any::TypeId;

use crate::ecs::{Component, Entity, Kind};

/// Criteria for [`Scene::entity_layers`](super::Scene::entity_layers)
#[derive(Debug, Clone, Default)]
pub struct EntityFilter {
    pub(crate) kind: Option<Kind>,
    pub(crate) tag: Option<String>,
    pub(crate) component: Option<TypeId>,
    pub(crate) dirty_only: bool,
    pub(crate) debuggable_only: bool,
    pub(crate) include_inactive: bool,
}

impl EntityFilter {
    /// Active, non-destroyed entities of any kind
    pub fn new() -> Self {
        Self::default()
    }

    /// Only entities of `kind`
    #[must_use]
    pub fn kind(mut self, kind: Kind) -> Self {
        self.kind = Some(kind);
        self
    }

    /// Only entities tagged `tag`
    #[must_use]
    pub fn tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Only entities with a `T` component
    #[must_use]
    pub fn with_component<T: Component>(mut self) -> Self {
        self.component = Some(TypeId::of::<T>());
        self
    }

    /// Only dirty entities
    #[must_use]
    pub const fn dirty(mut self) -> Self {
        self.dirty_only = true;
        self
    }

    /// Only debuggable entities
    #[must_use]
    pub const fn debuggable(mut self) -> Self {
        self.debuggable_only = true;
        self
    }

    /// Include inactive entities
    #[must_use]
    pub const fn include_inactive(mut self) -> Self {
        self.include_inactive = true;
        self
    }

    /// Whether `entity` passes every criterion except the region
    pub fn matches(&self, entity: &Entity) -> bool {
        if entity.is_destroyed() || (!self.include_inactive && !entity.is_active()) {
            return false;
        }
        if self.dirty_only && !entity.is_dirty() {
            return false;
        }
        if self.debuggable_only && !entity.is_debuggable() {
            return false;
        }
        if let Some(tag) = &self.tag {
            if entity.tag() != Some(tag.as_str()) {
                return false;
            }
        }
        if let Some(kind) = &self.kind {
            if !entity.kinds().contains(kind) {
                return false;
            }
        }
        self.component
            .map_or(true, |type_id| entity.has_component_type(type_id))
    }
}
