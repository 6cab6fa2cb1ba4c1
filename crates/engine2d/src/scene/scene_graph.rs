//! Scene implementation
//!
//! Scene methods never touch the event bus directly. Events they raise are
//! collected in an outbox, stamped with the scene id, and moved onto the bus
//! by [`Scene::flush_outbox`] once the caller gives the bus back.

use std::collections::HashMap;

use indexmap::IndexSet;
use log::{debug, error, trace};

use crate::config::EngineConfig;
use crate::ecs::{Component, ComponentSlot, Entity, Kind};
use crate::engine::EngineError;
use crate::events::{Event, EventBus, EventData, EventKind};
use crate::foundation::collections::{ComponentId, EntityId, SceneId, SlotMap};
use crate::foundation::color::Color;
use crate::foundation::math::Vector;
use crate::foundation::value::Value;
use crate::physics::{Collider, RigidBody};
use crate::services::Services;
use crate::spatial::{Aabb, SpatialHash, SCENE_CELL_SIZE};

use super::camera::Camera;
use super::collection::EntityCollection;
use super::filter::EntityFilter;
use super::layers::{LayerRef, LayerTable, CANVAS_LAYER};
use super::SceneError;

/// Hook run once when the scene starts, before `SetupScene` is dispatched
pub type SetupFn = Box<dyn FnOnce(&mut Scene, &Services) -> Result<(), EngineError>>;

/// A component registered for an event kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Receiver {
    /// Owner
    pub entity: EntityId,
    /// Component
    pub component: ComponentId,
    /// Delivered by the behaviour manager
    pub script: bool,
    /// Registration order within the scene
    pub serial: u64,
}

/// Name of the camera entity and of its tag
pub const MAIN_CAMERA: &str = "MainCamera";

/// Container of entities with their spatial and event indices
pub struct Scene {
    id: SceneId,
    name: String,
    entities: SlotMap<EntityId, Entity>,
    collection: EntityCollection,
    spatial: SpatialHash<EntityId, Kind>,
    camera: Camera,
    camera_entity: EntityId,
    layers: LayerTable,
    receivers: HashMap<EventKind, Vec<Receiver>>,
    dirty: IndexSet<EntityId>,
    debug: IndexSet<EntityId>,
    background: Color,
    outbox: Vec<(Event, bool)>,
    setup: Option<SetupFn>,
    next_serial: u64,
    registrations: u64,
    delivery_mark: Option<u64>,
}

impl Scene {
    /// Empty scene with a main camera at the origin. `pixel_ratio` must be
    /// finite and positive.
    pub fn new(name: impl Into<String>, resolution: Vector, pixel_ratio: f32) -> Result<Self, SceneError> {
        if !pixel_ratio.is_finite() || pixel_ratio <= 0.0 {
            return Err(SceneError::InvalidPixelRatio(pixel_ratio));
        }
        let camera = Camera::new(resolution, pixel_ratio);
        let mut scene = Self {
            id: SceneId::next(),
            name: name.into(),
            entities: SlotMap::with_key(),
            collection: EntityCollection::default(),
            spatial: SpatialHash::new(SCENE_CELL_SIZE),
            camera_entity: EntityId::default(),
            camera,
            layers: LayerTable::default(),
            receivers: HashMap::new(),
            dirty: IndexSet::new(),
            debug: IndexSet::new(),
            background: Color::BLACK,
            outbox: Vec::new(),
            setup: None,
            next_serial: 0,
            registrations: 0,
            delivery_mark: None,
        };

        let mut entity = Entity::new(MAIN_CAMERA).with_tag(MAIN_CAMERA).with_kind(Kind::CAMERA);
        let half = scene.camera.frame_size() / 2.0;
        if let Err(err) = entity.attach(Box::new(RigidBody::kinematic())) {
            error!("camera body: {err}");
        }
        if let Err(err) = entity.attach(Box::new(Collider::camera(half))) {
            error!("camera collider: {err}");
        }
        scene.camera_entity = scene.insert(entity, 0);
        debug!("scene '{}' created ({})", scene.name, scene.id);
        Ok(scene)
    }

    /// Scene sized from the engine configuration
    pub fn from_config(name: impl Into<String>, config: &EngineConfig) -> Result<Self, SceneError> {
        Self::new(name, config.resolution(), config.pixel_ratio)
    }

    /// Run `setup` when the scene starts
    #[must_use]
    pub fn with_setup<F>(mut self, setup: F) -> Self
    where
        F: FnOnce(&mut Scene, &Services) -> Result<(), EngineError> + 'static,
    {
        self.setup = Some(Box::new(setup));
        self
    }

    pub(crate) fn take_setup(&mut self) -> Option<SetupFn> {
        self.setup.take()
    }

    /// Unique id, stamped onto every event raised while this scene runs
    pub const fn id(&self) -> SceneId {
        self.id
    }

    /// Scene name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Main camera
    pub const fn camera(&self) -> &Camera {
        &self.camera
    }

    /// Entity carrying the camera body and frame sensor
    pub const fn camera_entity(&self) -> EntityId {
        self.camera_entity
    }

    /// Clear color
    pub const fn background(&self) -> Color {
        self.background
    }

    /// Change the clear color
    pub fn set_background(&mut self, color: Color) {
        self.background = color;
    }

    // ----- entities -----

    /// Add `entity` at its own position and layer
    pub fn add(&mut self, entity: Entity) -> Result<EntityId, SceneError> {
        let position = entity.position();
        let layer = LayerRef::Index(entity.layer());
        self.add_at(entity, position, layer)
    }

    /// Add `entity` at `position` on `layer`. Canvases always go to the
    /// canvas layer; other entities may not use it.
    pub fn add_at(
        &mut self,
        mut entity: Entity,
        position: Vector,
        layer: impl Into<LayerRef>,
    ) -> Result<EntityId, SceneError> {
        let layer = self.checked_layer(&entity, &layer.into())?;
        entity.transform.set_position(position);
        Ok(self.insert(entity, layer))
    }

    fn checked_layer(&self, entity: &Entity, layer: &LayerRef) -> Result<u8, SceneError> {
        if entity.kind() == &Kind::CANVAS {
            return Ok(CANVAS_LAYER);
        }
        match self.layers.resolve(layer)? {
            CANVAS_LAYER => Err(SceneError::ReservedLayer {
                entity: entity.name().to_owned(),
            }),
            index => Ok(index),
        }
    }

    fn insert(&mut self, mut entity: Entity, layer: u8) -> EntityId {
        entity.scene = Some(self.id);
        entity.serial = self.next_serial;
        self.next_serial += 1;
        entity.layer = layer;
        entity.active = true;
        entity.destroyed = false;
        entity.dirty = true;

        let aabb = Aabb::from_center(entity.position(), entity.size());
        let kinds = entity.kinds();
        let debuggable = entity.is_debuggable();
        let id = self.entities.insert(entity);

        self.spatial.add(id, aabb, &kinds);
        if let Some(entity) = self.entities.get(id) {
            self.collection.insert(id, entity);
            trace!("added {} to scene '{}'", entity.name(), self.name);
        }
        self.register(id);
        self.dirty.insert(id);
        if debuggable {
            self.debug.insert(id);
        }
        self.push_event(Event::new(EventData::Init).only(id), true);
        id
    }

    /// Detach an entity from every index and hand it back. Its children are
    /// orphaned, not removed. Raises `EntityDestroyed`, and `DestroyBody`
    /// when the entity carried physics.
    pub fn remove(&mut self, id: EntityId) -> Result<Entity, SceneError> {
        if id == self.camera_entity {
            return Err(SceneError::CameraRemoval);
        }
        let mut entity = self.entities.remove(id).ok_or(SceneError::UnknownEntity)?;
        self.unregister(id);
        self.collection.remove(id, &entity);
        self.spatial.remove(id);
        self.dirty.shift_remove(&id);
        self.debug.shift_remove(&id);

        if let Some(parent) = entity.parent.take() {
            if let Some(parent) = self.entities.get_mut(parent) {
                parent.children.shift_remove(&id);
            }
        }
        for child in entity.children.drain(..) {
            if let Some(child) = self.entities.get_mut(child) {
                child.parent = None;
            }
        }
        entity.scene = None;
        if entity.has_component::<RigidBody>() || entity.has_component::<Collider>() {
            self.push_event(Event::new(EventData::DestroyBody { entity: id }), true);
        }
        self.push_event(
            Event::new(EventData::EntityDestroyed {
                entity: id,
                name: entity.name().to_owned(),
            }),
            true,
        );
        trace!("removed {} from scene '{}'", entity.name(), self.name);
        Ok(entity)
    }

    /// Remove every entity except the camera
    pub fn clear(&mut self) {
        let ids: Vec<EntityId> = self
            .entities
            .keys()
            .filter(|id| *id != self.camera_entity)
            .collect();
        for id in ids {
            if let Err(err) = self.remove(id) {
                error!("clearing scene '{}': {err}", self.name);
            }
        }
    }

    /// Mark an entity for destruction; the engine removes it when
    /// `DestroyEntity` is processed.
    pub fn destroy(&mut self, id: EntityId) -> Result<(), SceneError> {
        if id == self.camera_entity {
            return Err(SceneError::CameraRemoval);
        }
        let entity = self.entities.get_mut(id).ok_or(SceneError::UnknownEntity)?;
        if !entity.destroyed {
            entity.destroyed = true;
            self.push_event(Event::new(EventData::DestroyEntity { entity: id }), true);
        }
        Ok(())
    }

    /// Entity by id
    pub fn entity(&self, id: EntityId) -> Option<&Entity> {
        self.entities.get(id)
    }

    /// Entity by id, mutably. Moving it through here bypasses the spatial
    /// hash; use the scene setters for transforms.
    pub fn entity_mut(&mut self, id: EntityId) -> Option<&mut Entity> {
        self.entities.get_mut(id)
    }

    /// Whether `id` lives in this scene
    pub fn contains(&self, id: EntityId) -> bool {
        self.entities.contains_key(id)
    }

    /// Number of entities, camera included
    pub fn len(&self) -> usize {
        self.entities.len()
    }

    /// Always false: the camera is permanent
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    /// Every entity id, in insertion order
    pub fn ids(&self) -> Vec<EntityId> {
        self.collection.all().collect()
    }

    // ----- transforms -----

    /// Move an entity and carry its children along
    pub fn set_position(&mut self, id: EntityId, position: Vector) -> Result<(), SceneError> {
        let angle = self.entities.get(id).ok_or(SceneError::UnknownEntity)?.angle();
        self.move_subtree(id, position, angle, true);
        Ok(())
    }

    /// Rotate an entity (degrees); children rotate around it
    pub fn set_angle(&mut self, id: EntityId, degrees: f32) -> Result<(), SceneError> {
        let position = self.entities.get(id).ok_or(SceneError::UnknownEntity)?.position();
        self.move_subtree(id, position, degrees, true);
        Ok(())
    }

    /// Write simulated state back; the root body is left alone
    pub(crate) fn sync_from_physics(&mut self, id: EntityId, position: Vector, degrees: f32) {
        let Some(entity) = self.entities.get(id) else {
            return;
        };
        let unchanged = (entity.position() - position).length_squared() < 1e-12
            && (entity.angle() - degrees).abs() < 1e-5;
        if !unchanged {
            self.move_subtree(id, position, degrees, false);
        }
    }

    fn move_subtree(&mut self, id: EntityId, position: Vector, degrees: f32, teleport_root: bool) {
        let Some(entity) = self.entities.get(id) else {
            return;
        };
        let old_position = entity.position();
        let delta_angle = degrees - entity.angle();
        let descendants = self.descendants(id);

        self.place(id, position, degrees, teleport_root);
        for child in descendants {
            let Some(entity) = self.entities.get(child) else {
                continue;
            };
            let offset = (entity.position() - old_position).rotated(delta_angle);
            let angle = entity.angle() + delta_angle;
            self.place(child, position + offset, angle, true);
        }
    }

    fn descendants(&self, id: EntityId) -> Vec<EntityId> {
        let mut found = Vec::new();
        let mut stack: Vec<EntityId> = self
            .entities
            .get(id)
            .map(|e| e.children().collect())
            .unwrap_or_default();
        while let Some(next) = stack.pop() {
            if let Some(entity) = self.entities.get(next) {
                found.push(next);
                stack.extend(entity.children());
            }
        }
        found
    }

    fn place(&mut self, id: EntityId, position: Vector, degrees: f32, teleport: bool) {
        let Some(entity) = self.entities.get_mut(id) else {
            return;
        };
        entity.transform.set_position(position);
        entity.transform.set_angle(degrees);
        entity.dirty = true;
        if teleport {
            if let Some(body) = entity.get_component_mut::<RigidBody>() {
                body.teleport(position, degrees);
            }
        }
        let size = entity.size();
        self.dirty.insert(id);
        self.spatial.update(id, Aabb::from_center(position, size));
        if id == self.camera_entity {
            self.camera.position = position;
            self.mark_all_dirty();
        }
    }

    /// Rescale an entity; its colliders are rebuilt
    pub fn set_scale(&mut self, id: EntityId, scale: Vector) -> Result<(), SceneError> {
        let entity = self.entities.get_mut(id).ok_or(SceneError::UnknownEntity)?;
        entity.transform.set_scale(scale);
        entity.dirty = true;
        for slot in entity.components.values_mut() {
            if let Some(collider) = slot
                .component
                .as_deref_mut()
                .and_then(crate::ecs::component::downcast_mut::<Collider>)
            {
                collider.touch();
            }
        }
        let aabb = Aabb::from_center(entity.position(), entity.size());
        self.spatial.update(id, aabb);
        self.dirty.insert(id);
        Ok(())
    }

    // ----- entity attributes -----

    /// Move an entity to another layer
    pub fn set_layer(&mut self, id: EntityId, layer: impl Into<LayerRef>) -> Result<(), SceneError> {
        let entity = self.entities.get(id).ok_or(SceneError::UnknownEntity)?;
        let index = self.checked_layer(entity, &layer.into())?;
        if let Some(entity) = self.entities.get_mut(id) {
            entity.layer = index;
            entity.dirty = true;
        }
        self.dirty.insert(id);
        Ok(())
    }

    /// Change the intra-layer order
    pub fn set_order(&mut self, id: EntityId, order: i16) -> Result<(), SceneError> {
        let entity = self.entities.get_mut(id).ok_or(SceneError::UnknownEntity)?;
        entity.set_order(order);
        entity.dirty = true;
        self.dirty.insert(id);
        Ok(())
    }

    /// Attach `child` under `parent`, or detach it with `None`
    pub fn set_parent(&mut self, child: EntityId, parent: Option<EntityId>) -> Result<(), SceneError> {
        let child_name = self
            .entities
            .get(child)
            .ok_or(SceneError::UnknownEntity)?
            .name()
            .to_owned();
        if let Some(parent) = parent {
            let parent_name = self
                .entities
                .get(parent)
                .ok_or(SceneError::UnknownEntity)?
                .name()
                .to_owned();
            let mut cursor = Some(parent);
            while let Some(current) = cursor {
                if current == child {
                    return Err(SceneError::ParentCycle {
                        child: child_name,
                        parent: parent_name,
                    });
                }
                cursor = self.entities.get(current).and_then(Entity::parent);
            }
        }

        let previous = self
            .entities
            .get_mut(child)
            .and_then(|entity| std::mem::replace(&mut entity.parent, parent));
        if let Some(previous) = previous.and_then(|p| self.entities.get_mut(p)) {
            previous.children.shift_remove(&child);
        }
        if let Some(parent) = parent.and_then(|p| self.entities.get_mut(p)) {
            parent.children.insert(child);
        }
        Ok(())
    }

    /// Enable or disable an entity. Disabled entities stop receiving most
    /// events and their bodies leave the simulation.
    pub fn set_active(&mut self, id: EntityId, active: bool) -> Result<(), SceneError> {
        let entity = self.entities.get_mut(id).ok_or(SceneError::UnknownEntity)?;
        if entity.active == active {
            return Ok(());
        }
        entity.active = active;
        entity.dirty = true;
        let data = if active {
            EventData::EnableEntity { entity: id }
        } else {
            EventData::DisableEntity { entity: id }
        };
        self.push_event(Event::new(data), true);
        Ok(())
    }

    /// Change or clear the tag
    pub fn set_tag(&mut self, id: EntityId, tag: Option<String>) -> Result<(), SceneError> {
        let entity = self.entities.get_mut(id).ok_or(SceneError::UnknownEntity)?;
        if let Some(old) = entity.tag() {
            self.collection.untag(id, old);
        }
        if let Some(new) = &tag {
            self.collection.tag(id, new);
        }
        entity.set_tag(tag);
        Ok(())
    }

    /// Include or exclude an entity from debug drawing
    pub fn set_debug(&mut self, id: EntityId, debuggable: bool) -> Result<(), SceneError> {
        let entity = self.entities.get_mut(id).ok_or(SceneError::UnknownEntity)?;
        entity.set_debuggable(debuggable);
        if debuggable {
            self.debug.insert(id);
        } else {
            self.debug.shift_remove(&id);
        }
        Ok(())
    }

    // ----- components -----

    /// Attach a component to a live entity. `ComponentAdded` is raised
    /// immediately and the component gets its `Init` on the next delivery.
    pub fn add_component(&mut self, id: EntityId, component: impl Component) -> Result<ComponentId, SceneError> {
        self.add_boxed(id, Box::new(component))
    }

    /// Attach a boxed component to a live entity
    pub fn add_boxed(&mut self, id: EntityId, component: Box<dyn Component>) -> Result<ComponentId, SceneError> {
        let entity = self.entities.get_mut(id).ok_or(SceneError::UnknownEntity)?;
        let cid = entity.attach(component)?;
        let name = entity.components.get(&cid).map_or("", ComponentSlot::name);
        entity.dirty = true;
        self.register_component(id, cid);
        self.push_event(
            Event::new(EventData::ComponentAdded { entity: id, component: cid, name }),
            true,
        );
        self.push_event(Event::new(EventData::Init).only(id), true);
        Ok(cid)
    }

    /// Detach a component. Returns it unless it is the one currently running.
    pub fn remove_component(
        &mut self,
        id: EntityId,
        cid: ComponentId,
    ) -> Result<Option<Box<dyn Component>>, SceneError> {
        let entity = self.entities.get_mut(id).ok_or(SceneError::UnknownEntity)?;
        let slot = entity.detach(cid).ok_or(SceneError::UnknownComponent)?;
        entity.dirty = true;
        self.unregister_component(id, cid);
        self.push_event(
            Event::new(EventData::ComponentRemoved {
                entity: id,
                component: cid,
                name: slot.name(),
            }),
            true,
        );
        Ok(slot.component)
    }

    /// Write a named property: entity attributes first, then the first
    /// component accepting it. Returns whether anything accepted the value.
    pub fn apply_property(&mut self, id: EntityId, name: &str, value: &Value) -> bool {
        match name {
            "position" => return value.as_vector().is_some_and(|v| self.set_position(id, v).is_ok()),
            "angle" => return value.as_f32().is_some_and(|a| self.set_angle(id, a).is_ok()),
            "scale" => return value.as_vector().is_some_and(|s| self.set_scale(id, s).is_ok()),
            "layer" => {
                return match value {
                    Value::Int(index) => u8::try_from(*index).is_ok_and(|i| self.set_layer(id, i).is_ok()),
                    Value::Str(name) => self.set_layer(id, name.as_str()).is_ok(),
                    _ => false,
                }
            }
            "order" => {
                return match value {
                    Value::Int(order) => i16::try_from(*order).is_ok_and(|o| self.set_order(id, o).is_ok()),
                    _ => false,
                }
            }
            "active" => return value.as_bool().is_some_and(|a| self.set_active(id, a).is_ok()),
            "tag" => return value.as_str().is_some_and(|t| self.set_tag(id, Some(t.to_owned())).is_ok()),
            _ => {}
        }
        let Some(entity) = self.entities.get_mut(id) else {
            return false;
        };
        let accepted = entity
            .components
            .values_mut()
            .filter_map(|slot| slot.component.as_deref_mut())
            .any(|component| component.set_property(name, value));
        if accepted {
            entity.dirty = true;
            self.dirty.insert(id);
        }
        accepted
    }

    /// Read a named property with the same lookup order as [`apply_property`](Self::apply_property)
    pub fn property(&self, id: EntityId, name: &str) -> Option<Value> {
        let entity = self.entities.get(id)?;
        match name {
            "position" => Some(Value::Vector(entity.position())),
            "angle" => Some(Value::from(entity.angle())),
            "scale" => Some(Value::Vector(entity.scale())),
            "layer" => Some(Value::Int(i64::from(entity.layer()))),
            "order" => Some(Value::Int(i64::from(entity.order()))),
            "active" => Some(Value::Bool(entity.is_active())),
            "tag" => entity.tag().map(Value::from),
            _ => entity
                .components
                .values()
                .filter_map(ComponentSlot::get)
                .find_map(|component| component.property(name)),
        }
    }

    // ----- receivers -----

    fn register(&mut self, id: EntityId) {
        let ids = self.entities.get(id).map(Entity::component_ids).unwrap_or_default();
        for cid in ids {
            self.register_component(id, cid);
        }
    }

    fn register_component(&mut self, id: EntityId, cid: ComponentId) {
        let Some(slot) = self.entities.get(id).and_then(|e| e.components.get(&cid)) else {
            return;
        };
        let receiver = Receiver {
            entity: id,
            component: cid,
            script: slot.is_script(),
            serial: self.registrations,
        };
        self.registrations += 1;
        for kind in slot.subscriptions() {
            let list = self.receivers.entry(*kind).or_default();
            if !list.iter().any(|r| r.entity == id && r.component == cid) {
                list.push(receiver);
            }
        }
    }

    fn unregister(&mut self, id: EntityId) {
        for list in self.receivers.values_mut() {
            list.retain(|r| r.entity != id);
        }
    }

    fn unregister_component(&mut self, id: EntityId, cid: ComponentId) {
        for list in self.receivers.values_mut() {
            list.retain(|r| r.entity != id || r.component != cid);
        }
    }

    /// Snapshot of the components registered for `kind`, in registration order
    pub fn receivers_for(&self, kind: EventKind) -> Vec<Receiver> {
        self.receivers.get(&kind).cloned().unwrap_or_default()
    }

    /// Freeze the receiver set for the event about to be delivered.
    /// Components registered until [`Scene::end_delivery`] are skipped.
    pub fn begin_delivery(&mut self) {
        self.delivery_mark = Some(self.registrations);
    }

    /// Lift the mark set by [`Scene::begin_delivery`]
    pub fn end_delivery(&mut self) {
        self.delivery_mark = None;
    }

    /// Receivers with a serial below this were registered before the
    /// current delivery started
    pub fn registration_mark(&self) -> u64 {
        self.delivery_mark.unwrap_or(self.registrations)
    }

    // ----- queries -----

    /// Entities overlapping the camera culling region that pass `filter`,
    /// sorted by layer order then insertion
    pub fn entity_layers(&self, filter: &EntityFilter) -> Vec<EntityId> {
        let region = Aabb::from_center(self.camera.position(), self.camera.culling_size());
        let kinds: Vec<Kind> = filter.kind.iter().cloned().collect();
        let mut found: Vec<(i32, u64, EntityId)> = self
            .spatial
            .search(&region, &kinds)
            .into_iter()
            .filter_map(|id| {
                let entity = self.entities.get(id)?;
                filter
                    .matches(entity)
                    .then(|| (entity.layer_order(), entity.serial(), id))
            })
            .collect();
        found.sort_unstable();
        found.into_iter().map(|(_, _, id)| id).collect()
    }

    /// Entities whose bounds overlap the box at `center` with `size`
    pub fn query_region(&self, center: Vector, size: Vector, kind: Option<&Kind>) -> Vec<EntityId> {
        let region = Aabb::from_center(center, size);
        let kinds: Vec<Kind> = kind.into_iter().cloned().collect();
        self.spatial
            .search(&region, &kinds)
            .into_iter()
            .filter(|id| self.spatial.bounds(*id).is_some_and(|b| b.overlaps(&region)))
            .collect()
    }

    /// First entity named `name`
    pub fn find(&self, name: &str) -> Option<EntityId> {
        self.collection
            .all()
            .find(|id| self.entities.get(*id).is_some_and(|e| e.name() == name))
    }

    /// Entities tagged `tag`
    pub fn find_by_tag(&self, tag: &str) -> Vec<EntityId> {
        self.collection.by_tag(tag)
    }

    /// Entities of `kind`
    pub fn find_by_kind(&self, kind: &Kind) -> Vec<EntityId> {
        self.collection.by_kind(kind)
    }

    /// Entities included in debug drawing
    pub fn debug_entities(&self) -> Vec<EntityId> {
        self.debug.iter().copied().collect()
    }

    /// Entities waiting to be redrawn
    pub fn dirty_entities(&self) -> Vec<EntityId> {
        self.dirty.iter().copied().collect()
    }

    /// Flag every entity for redraw
    pub fn mark_all_dirty(&mut self) {
        for (id, entity) in &mut self.entities {
            entity.dirty = true;
            self.dirty.insert(id);
        }
    }

    /// Flag an entity for redraw
    pub fn mark_dirty(&mut self, id: EntityId) {
        if let Some(entity) = self.entities.get_mut(id) {
            entity.dirty = true;
            self.dirty.insert(id);
        }
    }

    /// Clear the redraw flag after drawing
    pub fn mark_clean(&mut self, id: EntityId) {
        if let Some(entity) = self.entities.get_mut(id) {
            entity.dirty = false;
        }
        self.dirty.shift_remove(&id);
    }

    // ----- layers and camera -----

    /// Register a layer name
    pub fn add_layer(&mut self, name: impl Into<String>, index: u8) -> Result<(), SceneError> {
        self.layers.add(name, index)
    }

    /// Index of a registered layer name
    pub fn layer(&self, name: &str) -> Result<u8, SceneError> {
        self.layers.index(name)
    }

    /// Layer names
    pub const fn layers(&self) -> &LayerTable {
        &self.layers
    }

    /// Change the camera zoom, within `[MIN_ZOOM, MAX_ZOOM]`
    pub fn set_zoom(&mut self, zoom: f32) -> Result<(), SceneError> {
        self.camera.set_zoom(zoom)?;
        self.resize_camera_sensor();
        Ok(())
    }

    /// Change the surface resolution
    pub fn set_resolution(&mut self, resolution: Vector) {
        self.camera.set_resolution(resolution);
        self.resize_camera_sensor();
    }

    fn resize_camera_sensor(&mut self) {
        let half = self.camera.frame_size() / 2.0;
        if let Some(collider) = self
            .entities
            .get_mut(self.camera_entity)
            .and_then(Entity::get_component_mut::<Collider>)
        {
            collider.set_camera_half(half);
        }
        self.mark_all_dirty();
    }

    // ----- events -----

    /// Raise an event from outside a handler
    pub fn dispatch(&mut self, data: EventData, immediate: bool) {
        self.push_event(Event::new(data), immediate);
    }

    /// Raise a prepared event (e.g. with `only_entity` set)
    pub fn dispatch_event(&mut self, event: Event, immediate: bool) {
        self.push_event(event, immediate);
    }

    fn push_event(&mut self, event: Event, immediate: bool) {
        let event = if event.scene.is_none() { event.in_scene(self.id) } else { event };
        self.outbox.push((event, immediate));
    }

    /// Whether events are waiting in the outbox
    pub fn has_pending(&self) -> bool {
        !self.outbox.is_empty()
    }

    /// Move raised events onto the bus. Immediate events keep the order they
    /// were raised in and run before anything already queued.
    pub fn flush_outbox(&mut self, bus: &mut EventBus) {
        if self.outbox.is_empty() {
            return;
        }
        let (immediate, deferred): (Vec<_>, Vec<_>) =
            std::mem::take(&mut self.outbox).into_iter().partition(|(_, now)| *now);
        for (event, _) in deferred {
            bus.dispatch(event, false);
        }
        for (event, _) in immediate.into_iter().rev() {
            bus.dispatch(event, true);
        }
    }
}

impl std::fmt::Debug for Scene {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Scene")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("entities", &self.entities.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::Script;
    use approx::assert_abs_diff_eq;

    fn scene() -> Scene {
        Scene::new("test", Vector::new(640.0, 640.0), 64.0).expect("valid scene")
    }

    fn drain(scene: &mut Scene) -> Vec<EventKind> {
        let mut bus = EventBus::new();
        scene.flush_outbox(&mut bus);
        std::iter::from_fn(|| bus.pop()).map(|e| e.kind()).collect()
    }

    #[test]
    fn test_camera_is_present() {
        let scene = scene();
        let camera = scene.camera_entity();
        assert_eq!(scene.find(MAIN_CAMERA), Some(camera));
        assert_eq!(scene.find_by_kind(&Kind::CAMERA), vec![camera]);
        assert_eq!(scene.receivers_for(EventKind::BodyCreated).len(), 1);
    }

    #[test]
    fn test_add_indexes_and_remove_is_symmetric() {
        let mut scene = scene();
        let id = scene
            .add_at(Entity::new("crate").with_tag("box"), Vector::new(1.0, 1.0), 2)
            .expect("added");
        assert!(scene.contains(id));
        assert_eq!(scene.find("crate"), Some(id));
        assert_eq!(scene.find_by_tag("box"), vec![id]);
        assert!(scene.find_by_kind(&Kind::ENTITY).contains(&id));
        assert_eq!(scene.query_region(Vector::new(1.0, 1.0), Vector::unit(), None), vec![id]);

        let entity = scene.remove(id).expect("removed");
        assert_eq!(entity.name(), "crate");
        assert!(scene.find("crate").is_none());
        assert!(scene.find_by_tag("box").is_empty());
        assert!(scene.query_region(Vector::new(1.0, 1.0), Vector::unit(), None).is_empty());
    }

    #[test]
    fn test_add_queues_init() {
        let mut scene = scene();
        drain(&mut scene);
        scene.add(Entity::new("e")).expect("added");
        assert_eq!(drain(&mut scene), vec![EventKind::Init]);
    }

    #[test]
    fn test_camera_cannot_be_removed() {
        let mut scene = scene();
        let camera = scene.camera_entity();
        assert_eq!(scene.remove(camera).err(), Some(SceneError::CameraRemoval));
        scene.clear();
        assert_eq!(scene.len(), 1);
    }

    #[test]
    fn test_remove_raises_destroy_events() {
        let mut scene = scene();
        let ball = scene
            .add(Entity::new("ball").with(RigidBody::dynamic()).expect("body"))
            .expect("added");
        let plain = scene.add(Entity::new("plain")).expect("added");
        drain(&mut scene);

        scene.remove(ball).expect("removed");
        assert_eq!(drain(&mut scene), vec![EventKind::DestroyBody, EventKind::EntityDestroyed]);
        scene.remove(plain).expect("removed");
        assert_eq!(drain(&mut scene), vec![EventKind::EntityDestroyed]);
    }

    #[test]
    fn test_clear_raises_destroy_events() {
        let mut scene = scene();
        scene
            .add(Entity::new("ground").with(Collider::cuboid()).expect("collider"))
            .expect("added");
        scene.add(Entity::new("plain")).expect("added");
        drain(&mut scene);

        scene.clear();
        let kinds = drain(&mut scene);
        assert_eq!(kinds.iter().filter(|k| **k == EventKind::DestroyBody).count(), 1);
        assert_eq!(kinds.iter().filter(|k| **k == EventKind::EntityDestroyed).count(), 2);
    }

    #[test]
    fn test_pixel_ratio_must_be_positive() {
        for ratio in [0.0, -1.0, f32::NAN, f32::INFINITY] {
            assert!(matches!(
                Scene::new("bad", Vector::new(640.0, 640.0), ratio),
                Err(SceneError::InvalidPixelRatio(_))
            ));
        }
        let config = EngineConfig::default();
        assert!(Scene::from_config("main", &config).is_ok());
    }

    #[test]
    fn test_delivery_mark_hides_late_receivers() {
        let mut scene = scene();
        let early = scene
            .add(Entity::new("early").with(Script::from_fn("a", &[EventKind::Update], |_, _| Ok(()))).expect("script"))
            .expect("added");
        scene.begin_delivery();
        let late = scene
            .add(Entity::new("late").with(Script::from_fn("b", &[EventKind::Update], |_, _| Ok(()))).expect("script"))
            .expect("added");
        let mark = scene.registration_mark();
        let visible: Vec<EntityId> = scene
            .receivers_for(EventKind::Update)
            .into_iter()
            .filter(|r| r.serial < mark)
            .map(|r| r.entity)
            .collect();
        assert_eq!(visible, vec![early]);

        scene.end_delivery();
        let mark = scene.registration_mark();
        assert!(scene.receivers_for(EventKind::Update).iter().any(|r| r.entity == late && r.serial < mark));
    }

    #[test]
    fn test_canvas_layer_rules() {
        let mut scene = scene();
        assert!(matches!(
            scene.add_at(Entity::new("e"), Vector::zero(), CANVAS_LAYER),
            Err(SceneError::ReservedLayer { .. })
        ));
        let canvas = scene
            .add_at(Entity::new("ui").with_kind(Kind::CANVAS), Vector::zero(), 0)
            .expect("canvas added");
        assert_eq!(scene.entity(canvas).map(Entity::layer), Some(CANVAS_LAYER));
        assert!(matches!(
            scene.add_at(Entity::new("e"), Vector::zero(), "Nope"),
            Err(SceneError::UnknownLayer(_))
        ));
    }

    #[test]
    fn test_children_follow_parent() {
        let mut scene = scene();
        let a = scene.add_at(Entity::new("a"), Vector::new(1.0, 1.0), 0).expect("a");
        let b = scene.add_at(Entity::new("b"), Vector::new(2.0, 2.0), 0).expect("b");
        scene.set_parent(b, Some(a)).expect("parented");
        scene.set_position(a, Vector::new(5.0, 5.0)).expect("moved");
        assert_eq!(scene.entity(b).map(Entity::position), Some(Vector::new(6.0, 6.0)));

        scene.set_angle(a, 90.0).expect("rotated");
        let b_pos = scene.entity(b).map(Entity::position).unwrap_or_default();
        assert_abs_diff_eq!(b_pos, Vector::new(4.0, 6.0), epsilon = 1e-4);
        assert_abs_diff_eq!(scene.entity(b).map(Entity::angle).unwrap_or_default(), 90.0, epsilon = 1e-3);
    }

    #[test]
    fn test_parent_cycles_are_rejected() {
        let mut scene = scene();
        let a = scene.add(Entity::new("a")).expect("a");
        let b = scene.add(Entity::new("b")).expect("b");
        scene.set_parent(b, Some(a)).expect("parented");
        assert!(matches!(scene.set_parent(a, Some(b)), Err(SceneError::ParentCycle { .. })));
        assert!(matches!(scene.set_parent(a, Some(a)), Err(SceneError::ParentCycle { .. })));
    }

    #[test]
    fn test_removing_parent_orphans_children() {
        let mut scene = scene();
        let a = scene.add(Entity::new("a")).expect("a");
        let b = scene.add(Entity::new("b")).expect("b");
        scene.set_parent(b, Some(a)).expect("parented");
        scene.remove(a).expect("removed");
        assert!(scene.contains(b));
        assert_eq!(scene.entity(b).and_then(Entity::parent), None);
    }

    #[test]
    fn test_entity_layers_culls_and_sorts() {
        let mut scene = scene();
        scene.add_layer("Front", 5).expect("layer");
        let front = scene.add_at(Entity::new("front"), Vector::zero(), "Front").expect("front");
        let back = scene.add_at(Entity::new("back"), Vector::new(1.0, 0.0), 1).expect("back");
        let far = scene.add_at(Entity::new("far"), Vector::new(40.0, 0.0), 1).expect("far");

        let visible = scene.entity_layers(&EntityFilter::new());
        let back_pos = visible.iter().position(|id| *id == back);
        let front_pos = visible.iter().position(|id| *id == front);
        assert!(back_pos < front_pos);
        assert!(!visible.contains(&far));

        scene.set_active(back, false).expect("disabled");
        assert!(!scene.entity_layers(&EntityFilter::new()).contains(&back));
        assert!(scene
            .entity_layers(&EntityFilter::new().include_inactive())
            .contains(&back));
    }

    #[test]
    fn test_component_events_and_receivers() {
        let mut scene = scene();
        let id = scene.add(Entity::new("e")).expect("added");
        drain(&mut scene);

        let script = Script::from_fn("Mover", &[EventKind::Update], |_, _| Ok(()));
        let cid = scene.add_component(id, script).expect("attached");
        assert_eq!(drain(&mut scene), vec![EventKind::ComponentAdded, EventKind::Init]);
        let receivers = scene.receivers_for(EventKind::Update);
        assert_eq!(receivers.len(), 1);
        assert!(receivers[0].script);

        assert!(scene.remove_component(id, cid).expect("detached").is_some());
        assert!(scene.receivers_for(EventKind::Update).is_empty());
        assert_eq!(drain(&mut scene), vec![EventKind::ComponentRemoved]);
    }

    #[test]
    fn test_apply_property() {
        let mut scene = scene();
        scene.add_layer("Top", 7).expect("layer");
        let id = scene.add(Entity::new("e")).expect("added");
        assert!(scene.apply_property(id, "position", &Value::Vector(Vector::new(3.0, 0.0))));
        assert!(scene.apply_property(id, "layer", &Value::Str("Top".into())));
        assert!(!scene.apply_property(id, "layer", &Value::Int(99)));
        assert!(!scene.apply_property(id, "unknown", &Value::Bool(true)));
        assert_eq!(scene.property(id, "layer"), Some(Value::Int(7)));
        assert_eq!(scene.property(id, "position"), Some(Value::Vector(Vector::new(3.0, 0.0))));
    }

    #[test]
    fn test_zoom_resizes_camera_sensor() {
        let mut scene = scene();
        scene.set_zoom(2.0).expect("zoom in range");
        let camera = scene.camera_entity();
        let collider = scene
            .entity(camera)
            .and_then(Entity::get_component::<Collider>)
            .map(|c| c.shape().clone());
        assert_eq!(
            collider,
            Some(crate::physics::ColliderShape::Camera { half: Vector::new(2.5, 2.5) })
        );
        assert!(scene.set_zoom(50.0).is_err());
    }

    #[test]
    fn test_outbox_keeps_immediate_order() {
        let mut scene = scene();
        drain(&mut scene);
        scene.dispatch(EventData::Render, false);
        scene.dispatch(EventData::PreRender, true);
        scene.dispatch(EventData::Rendered, true);
        let mut bus = EventBus::new();
        scene.flush_outbox(&mut bus);
        bus.promote();
        let kinds: Vec<_> = std::iter::from_fn(|| bus.pop()).map(|e| e.kind()).collect();
        assert_eq!(kinds, vec![EventKind::PreRender, EventKind::Rendered, EventKind::Render]);
    }
}
