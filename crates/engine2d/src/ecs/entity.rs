//! Entity implementation

use std::any::TypeId;

use indexmap::{IndexMap, IndexSet};

use crate::events::EventKind;
use crate::foundation::collections::{ComponentId, EntityId, SceneId};
use crate::foundation::math::Vector;
use crate::scene::SceneError;

use super::component::{downcast_mut, downcast_ref};
use super::{Component, Kind, Transform};

/// Lowest and highest intra-layer order
pub const ORDER_RANGE: (i16, i16) = (-255, 255);

/// Storage for one attached component
pub struct ComponentSlot {
    /// `None` while the component is running a handler
    pub(crate) component: Option<Box<dyn Component>>,
    pub(crate) initialized: bool,
    name: &'static str,
    type_id: TypeId,
    subscriptions: Vec<EventKind>,
    script: bool,
}

impl ComponentSlot {
    fn new(component: Box<dyn Component>) -> Self {
        let name = component.name();
        let type_id = component.as_ref().as_any().type_id();
        let subscriptions = component.subscriptions();
        let script = component.is_script();
        Self {
            component: Some(component),
            initialized: false,
            name,
            type_id,
            subscriptions,
            script,
        }
    }

    /// Component type name
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Concrete type of the component
    pub const fn type_id(&self) -> TypeId {
        self.type_id
    }

    /// Event kinds declared at attach time
    pub fn subscriptions(&self) -> &[EventKind] {
        &self.subscriptions
    }

    /// Delivered by the behaviour manager
    pub const fn is_script(&self) -> bool {
        self.script
    }

    /// Whether the component has seen its `Init`
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// The component, unless it is running right now
    pub fn get(&self) -> Option<&(dyn Component + 'static)> {
        self.component.as_deref()
    }
}

/// A named, composable game object
pub struct Entity {
    name: String,
    tag: Option<String>,
    kind: Kind,
    pub(crate) transform: Transform,
    pub(crate) components: IndexMap<ComponentId, ComponentSlot>,
    pub(crate) layer: u8,
    order: i16,
    pub(crate) active: bool,
    pub(crate) destroyed: bool,
    pub(crate) dirty: bool,
    debuggable: bool,
    pub(crate) scene: Option<SceneId>,
    pub(crate) parent: Option<EntityId>,
    pub(crate) children: IndexSet<EntityId>,
    pub(crate) serial: u64,
}

impl Entity {
    /// Detached entity at the origin, scale 1, layer 0
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            tag: None,
            kind: Kind::ENTITY,
            transform: Transform::default(),
            components: IndexMap::new(),
            layer: 0,
            order: 0,
            active: true,
            destroyed: false,
            dirty: true,
            debuggable: false,
            scene: None,
            parent: None,
            children: IndexSet::new(),
            serial: 0,
        }
    }

    /// Set the tag
    #[must_use]
    pub fn with_tag(mut self, tag: impl Into<String>) -> Self {
        self.tag = Some(tag.into());
        self
    }

    /// Set the kind label
    #[must_use]
    pub fn with_kind(mut self, kind: Kind) -> Self {
        self.kind = kind;
        self
    }

    /// Set the initial position
    #[must_use]
    pub fn with_position(mut self, position: Vector) -> Self {
        self.transform.set_position(position);
        self
    }

    /// Set the initial angle in degrees
    #[must_use]
    pub fn with_angle(mut self, degrees: f32) -> Self {
        self.transform.set_angle(degrees);
        self
    }

    /// Set the initial scale
    #[must_use]
    pub fn with_scale(mut self, scale: Vector) -> Self {
        self.transform.set_scale(scale);
        self
    }

    /// Set the intra-layer order, clamped to [`ORDER_RANGE`]
    #[must_use]
    pub fn with_order(mut self, order: i16) -> Self {
        self.set_order(order);
        self
    }

    /// Draw this entity's debug shapes
    #[must_use]
    pub const fn with_debug(mut self, debuggable: bool) -> Self {
        self.debuggable = debuggable;
        self
    }

    /// Attach a component while building
    pub fn with(mut self, component: impl Component) -> Result<Self, SceneError> {
        self.attach(Box::new(component))?;
        Ok(self)
    }

    /// Attach a component without emitting events. The scene uses this and
    /// then raises `ComponentAdded` / `Init` itself.
    pub(crate) fn attach(&mut self, component: Box<dyn Component>) -> Result<ComponentId, SceneError> {
        if component.unique() {
            let type_id = component.as_ref().as_any().type_id();
            if self.components.values().any(|slot| slot.type_id == type_id) {
                return Err(SceneError::DuplicateComponent {
                    entity: self.name.clone(),
                    component: component.name(),
                });
            }
        }
        let id = ComponentId::next();
        self.components.insert(id, ComponentSlot::new(component));
        Ok(id)
    }

    pub(crate) fn detach(&mut self, id: ComponentId) -> Option<ComponentSlot> {
        self.components.shift_remove(&id)
    }

    /// Entity name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Tag, if any
    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub(crate) fn set_tag(&mut self, tag: Option<String>) {
        self.tag = tag;
    }

    /// Kind label
    pub const fn kind(&self) -> &Kind {
        &self.kind
    }

    /// Every kind the entity is indexed under: its own plus the base kind
    pub fn kinds(&self) -> Vec<Kind> {
        if self.kind == Kind::ENTITY {
            vec![Kind::ENTITY]
        } else {
            vec![Kind::ENTITY, self.kind.clone()]
        }
    }

    /// Transform
    pub const fn transform(&self) -> &Transform {
        &self.transform
    }

    /// World position
    pub const fn position(&self) -> Vector {
        self.transform.position()
    }

    /// Angle in degrees
    pub fn angle(&self) -> f32 {
        self.transform.angle()
    }

    /// Scale
    pub const fn scale(&self) -> Vector {
        self.transform.scale()
    }

    /// Absolute extent
    pub fn size(&self) -> Vector {
        self.transform.size()
    }

    /// Layer index
    pub const fn layer(&self) -> u8 {
        self.layer
    }

    /// Intra-layer order
    pub const fn order(&self) -> i16 {
        self.order
    }

    pub(crate) fn set_order(&mut self, order: i16) {
        self.order = order.clamp(ORDER_RANGE.0, ORDER_RANGE.1);
    }

    /// Sort key: `layer * 256 + order`, monotonic in layer
    pub fn layer_order(&self) -> i32 {
        i32::from(self.layer) * 256 + i32::from(self.order)
    }

    /// Receives events
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Destruction requested
    pub const fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Needs re-rendering
    pub const fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Included in debug drawing
    pub const fn is_debuggable(&self) -> bool {
        self.debuggable
    }

    pub(crate) fn set_debuggable(&mut self, debuggable: bool) {
        self.debuggable = debuggable;
    }

    /// Scene the entity was added to
    pub const fn scene(&self) -> Option<SceneId> {
        self.scene
    }

    /// Parent entity
    pub const fn parent(&self) -> Option<EntityId> {
        self.parent
    }

    /// Child entities
    pub fn children(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.children.iter().copied()
    }

    /// Insertion sequence inside the scene
    pub const fn serial(&self) -> u64 {
        self.serial
    }

    /// First attached component of type `T`
    pub fn get_component<T: Component>(&self) -> Option<&T> {
        self.components
            .values()
            .filter_map(ComponentSlot::get)
            .find_map(downcast_ref::<T>)
    }

    /// First attached component of type `T`, mutably
    pub fn get_component_mut<T: Component>(&mut self) -> Option<&mut T> {
        self.components
            .values_mut()
            .filter_map(|slot| slot.component.as_deref_mut())
            .find_map(downcast_mut::<T>)
    }

    /// Every attached component of type `T`, in attach order
    pub fn get_components<T: Component>(&self) -> Vec<&T> {
        self.components
            .values()
            .filter_map(ComponentSlot::get)
            .filter_map(downcast_ref::<T>)
            .collect()
    }

    /// Id of the first component of type `T`
    pub fn component_id<T: Component>(&self) -> Option<ComponentId> {
        let wanted = TypeId::of::<T>();
        self.components
            .iter()
            .find(|(_, slot)| slot.type_id == wanted)
            .map(|(id, _)| *id)
    }

    /// Component by id
    pub fn component(&self, id: ComponentId) -> Option<&(dyn Component + 'static)> {
        self.components.get(&id).and_then(ComponentSlot::get)
    }

    /// Component by id, mutably
    pub fn component_mut(&mut self, id: ComponentId) -> Option<&mut (dyn Component + 'static)> {
        self.components.get_mut(&id).and_then(|slot| slot.component.as_deref_mut())
    }

    /// Component of type `T` by id
    pub fn component_as<T: Component>(&self, id: ComponentId) -> Option<&T> {
        self.component(id).and_then(downcast_ref::<T>)
    }

    /// Component of type `T` by id, mutably
    pub fn component_as_mut<T: Component>(&mut self, id: ComponentId) -> Option<&mut T> {
        self.component_mut(id).and_then(downcast_mut::<T>)
    }

    /// Whether a component of type `T` is attached
    pub fn has_component<T: Component>(&self) -> bool {
        let wanted = TypeId::of::<T>();
        self.components.values().any(|slot| slot.type_id == wanted)
    }

    /// Whether a component with this type name is attached
    pub fn has_component_named(&self, name: &str) -> bool {
        self.components.values().any(|slot| slot.name == name)
    }

    pub(crate) fn has_component_type(&self, type_id: TypeId) -> bool {
        self.components.values().any(|slot| slot.type_id == type_id)
    }

    /// Attached component ids, in attach order
    pub fn component_ids(&self) -> Vec<ComponentId> {
        self.components.keys().copied().collect()
    }

    /// Attached component names, in attach order
    pub fn component_names(&self) -> Vec<&'static str> {
        self.components.values().map(ComponentSlot::name).collect()
    }
}

impl std::fmt::Debug for Entity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("position", &self.position())
            .field("layer", &self.layer)
            .field("components", &self.component_names())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Marker(u8);

    impl Component for Marker {
        fn name(&self) -> &'static str {
            "Marker"
        }
    }

    struct Solo;

    impl Component for Solo {
        fn name(&self) -> &'static str {
            "Solo"
        }

        fn unique(&self) -> bool {
            true
        }
    }

    #[test]
    fn test_get_component_returns_first_of_type() {
        let entity = Entity::new("e")
            .with(Marker(1))
            .and_then(|e| e.with(Marker(2)))
            .expect("markers attach");
        assert_eq!(entity.get_component::<Marker>().map(|m| m.0), Some(1));
        assert_eq!(entity.get_components::<Marker>().len(), 2);
        assert!(entity.has_component::<Marker>());
        assert!(!entity.has_component::<Solo>());
        assert_eq!(entity.component_names(), vec!["Marker", "Marker"]);
    }

    #[test]
    fn test_unique_components_are_rejected_twice() {
        let entity = Entity::new("e").with(Solo).expect("first attaches");
        assert!(matches!(
            entity.with(Solo),
            Err(SceneError::DuplicateComponent { component: "Solo", .. })
        ));
    }

    #[test]
    fn test_layer_order_clamps_order() {
        let mut entity = Entity::new("e").with_order(1000);
        assert_eq!(entity.order(), 255);
        entity.layer = 2;
        assert_eq!(entity.layer_order(), 2 * 256 + 255);
        let low = Entity::new("low").with_order(-1000);
        assert!(low.layer_order() < entity.layer_order());
    }

    #[test]
    fn test_kinds_include_base() {
        assert_eq!(Entity::new("e").kinds(), vec![Kind::ENTITY]);
        let camera = Entity::new("c").with_kind(Kind::CAMERA);
        assert_eq!(camera.kinds(), vec![Kind::ENTITY, Kind::CAMERA]);
    }

    #[test]
    fn test_size_is_absolute() {
        let e = Entity::new("e").with_scale(Vector::new(-1.0, 2.0));
        assert_eq!(e.size(), Vector::new(1.0, 2.0));
    }
}
