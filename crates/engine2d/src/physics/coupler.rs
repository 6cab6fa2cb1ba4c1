//! rapier2d coupling
//!
//! One simulation world per running scene. Bodies and fixtures are created,
//! rebuilt and destroyed only between steps: `CreateBody` and `DestroyBody`
//! are queued and processed at the start of the next `PhysicsUpdate`, and
//! component setters arrive as queued [`BodyCommand`]s.

use std::collections::HashMap;

use crossbeam_channel::{Receiver, Sender};
use indexmap::IndexSet;
use log::{debug, info, trace, warn};
use rapier2d::na::Isometry2;
use rapier2d::parry::query::Ray;
use rapier2d::parry::shape::{Ball, Cuboid};
use rapier2d::prelude::{
    ActiveCollisionTypes, ActiveEvents, ActiveHooks, BroadPhase, CCDSolver, ChannelEventCollector,
    ColliderBuilder, ColliderHandle, ColliderSet, CollisionEvent, ContactForceEvent, ImpulseJointSet,
    IntegrationParameters, IslandManager, MultibodyJointSet, NarrowPhase, PairFilterContext,
    PhysicsHooks, PhysicsPipeline, QueryFilter, QueryPipeline, RigidBodyBuilder, RigidBodyHandle,
    RigidBodySet, SolverFlags,
};

use crate::config::PhysicsConfig;
use crate::ecs::component::downcast_ref;
use crate::ecs::Entity;
use crate::engine::{EngineError, System, SystemContext};
use crate::events::{ColliderRef, Collision, Event, EventBus, EventData, EventKind};
use crate::foundation::collections::{ComponentId, EntityId, SceneId};
use crate::foundation::math::utils::{deg_to_rad, rad_to_deg};
use crate::foundation::math::Vector;
use crate::foundation::time::FIXED_DELTA;
use crate::scene::Scene;

use super::collider::{Collider, ResolvedShape};
use super::layers::LayerFilter;
use super::rigid_body::{BodyCommand, BodyState, BodyType, ForceMode, RigidBody};

/// Points used to outline circles in debug shapes
const CIRCLE_SEGMENTS: usize = 16;

/// Which hits a ray cast reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RayMode {
    /// The hit nearest to the origin
    Closest,
    /// The first hit found, in no particular order
    Any,
    /// Every hit, nearest first
    Multiple,
}

/// How many colliders a region query reports
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Stop at the first collider
    One,
    /// Every overlapping collider
    Multiple,
}

/// One ray intersection
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RayHit {
    /// Collider that was hit
    pub collider: ColliderRef,
    /// Its owner
    pub entity: EntityId,
    /// Intersection point in world space
    pub point: Vector,
    /// Surface normal at the intersection
    pub normal: Vector,
    /// Position along the ray, `0` at the origin and `1` at full distance
    pub fraction: f32,
}

/// World-space outline of a collider for debug drawing
#[derive(Debug, Clone, PartialEq)]
pub struct DebugShape {
    /// Owner
    pub entity: EntityId,
    /// Outline points, closed for polygons and circles
    pub points: Vec<Vector>,
    /// Drawn differently from solid fixtures
    pub sensor: bool,
}

#[derive(Debug, Clone, Copy)]
struct ColliderInfo {
    layer: u8,
    enabled: bool,
    sensor: bool,
    camera: bool,
}

struct BodyRecord {
    handle: RigidBodyHandle,
    ghost: bool,
    colliders: HashMap<ComponentId, (ColliderHandle, u32)>,
}

/// Decides which pairs generate contacts
struct ContactGate<'a> {
    filter: &'a LayerFilter,
    info: &'a HashMap<ColliderHandle, ColliderInfo>,
}

impl PhysicsHooks for ContactGate<'_> {
    fn filter_contact_pair(&self, context: &PairFilterContext) -> Option<SolverFlags> {
        match (self.info.get(&context.collider1), self.info.get(&context.collider2)) {
            (Some(a), Some(b)) => (a.enabled && b.enabled && self.filter.should_collide(a.layer, b.layer))
                .then_some(SolverFlags::COMPUTE_IMPULSES),
            _ => Some(SolverFlags::COMPUTE_IMPULSES),
        }
    }

    fn filter_intersection_pair(&self, context: &PairFilterContext) -> bool {
        match (self.info.get(&context.collider1), self.info.get(&context.collider2)) {
            (Some(a), Some(b)) => a.enabled && b.enabled,
            _ => true,
        }
    }
}

struct World {
    pipeline: PhysicsPipeline,
    islands: IslandManager,
    broad_phase: BroadPhase,
    narrow_phase: NarrowPhase,
    bodies: RigidBodySet,
    colliders: ColliderSet,
    impulse_joints: ImpulseJointSet,
    multibody_joints: MultibodyJointSet,
    ccd_solver: CCDSolver,
    query: QueryPipeline,
    records: HashMap<EntityId, BodyRecord>,
    owners: HashMap<ColliderHandle, ColliderRef>,
    info: HashMap<ColliderHandle, ColliderInfo>,
    pending: IndexSet<EntityId>,
    garbage: IndexSet<EntityId>,
    paused: bool,
    collision_send: Sender<CollisionEvent>,
    collision_recv: Receiver<CollisionEvent>,
    force_send: Sender<ContactForceEvent>,
    force_recv: Receiver<ContactForceEvent>,
}

impl World {
    fn new() -> Self {
        let (collision_send, collision_recv) = crossbeam_channel::unbounded();
        let (force_send, force_recv) = crossbeam_channel::unbounded();
        Self {
            pipeline: PhysicsPipeline::new(),
            islands: IslandManager::new(),
            broad_phase: BroadPhase::new(),
            narrow_phase: NarrowPhase::new(),
            bodies: RigidBodySet::new(),
            colliders: ColliderSet::new(),
            impulse_joints: ImpulseJointSet::new(),
            multibody_joints: MultibodyJointSet::new(),
            ccd_solver: CCDSolver::new(),
            query: QueryPipeline::new(),
            records: HashMap::new(),
            owners: HashMap::new(),
            info: HashMap::new(),
            pending: IndexSet::new(),
            garbage: IndexSet::new(),
            paused: false,
            collision_send,
            collision_recv,
            force_send,
            force_recv,
        }
    }

    fn remove_record(&mut self, entity: EntityId) -> bool {
        let Some(record) = self.records.remove(&entity) else {
            return false;
        };
        for (handle, _) in record.colliders.values() {
            self.owners.remove(handle);
            self.info.remove(handle);
        }
        self.bodies.remove(
            record.handle,
            &mut self.islands,
            &mut self.colliders,
            &mut self.impulse_joints,
            &mut self.multibody_joints,
            true,
        );
        true
    }

    fn detach_collider(&mut self, entity: EntityId, component: ComponentId) {
        let Some((handle, _)) = self
            .records
            .get_mut(&entity)
            .and_then(|record| record.colliders.remove(&component))
        else {
            return;
        };
        self.owners.remove(&handle);
        self.info.remove(&handle);
        self.colliders.remove(handle, &mut self.islands, &mut self.bodies, true);
    }

    fn attach_collider(&mut self, entity: EntityId, cid: ComponentId, collider: &Collider, scale: Vector, massless: bool) {
        let Some(record) = self.records.get_mut(&entity) else {
            return;
        };
        let Some(builder) = collider_builder(collider, scale) else {
            warn!("collider {cid} of {entity:?} is degenerate, skipped");
            return;
        };
        let builder = if massless { builder.density(0.0) } else { builder };
        let handle = self
            .colliders
            .insert_with_parent(builder.build(), record.handle, &mut self.bodies);
        record.colliders.insert(cid, (handle, collider.revision()));
        self.owners.insert(handle, ColliderRef { entity, component: cid });
    }
}

/// Bridges entity bodies and colliders to rapier2d
pub struct PhysicsCoupler {
    gravity: Vector,
    velocity_iterations: usize,
    position_iterations: usize,
    debug_draw: bool,
    filter: LayerFilter,
    worlds: HashMap<SceneId, World>,
}

impl PhysicsCoupler {
    /// Coupler using the configured gravity and solver settings
    pub fn new(config: &PhysicsConfig) -> Self {
        Self {
            gravity: config.gravity,
            velocity_iterations: config.velocity_iterations,
            position_iterations: config.position_iterations,
            debug_draw: config.debug_draw,
            filter: LayerFilter::new(),
            worlds: HashMap::new(),
        }
    }

    /// Gravity applied to new steps
    pub const fn gravity(&self) -> Vector {
        self.gravity
    }

    /// Change gravity
    pub fn set_gravity(&mut self, gravity: Vector) {
        self.gravity = gravity;
    }

    /// Toggle the `DrawDebug` event after each step
    pub fn set_debug_draw(&mut self, enabled: bool) {
        self.debug_draw = enabled;
    }

    /// Whether a world exists for `scene`
    pub fn has_world(&self, scene: SceneId) -> bool {
        self.worlds.contains_key(&scene)
    }

    /// Whether the world of `scene` is paused
    pub fn is_paused(&self, scene: SceneId) -> bool {
        self.worlds.get(&scene).is_some_and(|world| world.paused)
    }

    /// Whether `entity` has a body in the world of `scene`
    pub fn has_body(&self, scene: SceneId, entity: EntityId) -> bool {
        self.worlds
            .get(&scene)
            .is_some_and(|world| world.records.contains_key(&entity))
    }

    /// Whether the body of `entity` only hosts colliders
    pub fn is_ghost(&self, scene: SceneId, entity: EntityId) -> bool {
        self.worlds
            .get(&scene)
            .and_then(|world| world.records.get(&entity))
            .is_some_and(|record| record.ghost)
    }

    /// Stop contacts between two layers
    pub fn ignore_layer_collision(&mut self, a: u8, b: u8) {
        self.filter.ignore(a, b);
    }

    /// Allow contacts between two layers again
    pub fn restore_layer_collision(&mut self, a: u8, b: u8) {
        self.filter.restore(a, b);
    }

    /// Layer pair filter
    pub const fn layer_filter(&self) -> &LayerFilter {
        &self.filter
    }

    // ----- queries -----

    /// Cast a ray of `distance` from `origin`. Only colliders of entities on
    /// `layer` are hit when a layer is given. The camera sensor is never hit.
    #[allow(clippy::too_many_arguments)]
    pub fn ray_cast(
        &self,
        scene: &Scene,
        origin: Vector,
        direction: Vector,
        distance: f32,
        layer: Option<u8>,
        mode: RayMode,
        cast_sensors: bool,
    ) -> Vec<RayHit> {
        let Some(world) = self.worlds.get(&scene.id()) else {
            return Vec::new();
        };
        let direction = direction.normalized();
        if distance <= 0.0 || direction.length_squared() == 0.0 {
            return Vec::new();
        }
        let ray = Ray::new(origin.to_point(), direction.to_na());
        let predicate = |handle: ColliderHandle, _: &rapier2d::prelude::Collider| {
            accepts(world, scene, handle, layer)
        };
        let mut filter = QueryFilter::default().predicate(&predicate);
        if !cast_sensors {
            filter = filter.exclude_sensors();
        }

        let hit = |handle: ColliderHandle, toi: f32, normal: Vector| -> Option<RayHit> {
            let collider = *world.owners.get(&handle)?;
            Some(RayHit {
                collider,
                entity: collider.entity,
                point: origin + direction * toi,
                normal,
                fraction: toi / distance,
            })
        };

        let mut hits = Vec::new();
        match mode {
            RayMode::Closest => {
                if let Some((handle, intersection)) = world.query.cast_ray_and_get_normal(
                    &world.bodies,
                    &world.colliders,
                    &ray,
                    distance,
                    true,
                    filter,
                ) {
                    hits.extend(hit(handle, intersection.toi, intersection.normal.into()));
                }
            }
            RayMode::Any | RayMode::Multiple => {
                world.query.intersections_with_ray(
                    &world.bodies,
                    &world.colliders,
                    &ray,
                    distance,
                    true,
                    filter,
                    |handle, intersection| {
                        hits.extend(hit(handle, intersection.toi, intersection.normal.into()));
                        mode == RayMode::Multiple
                    },
                );
                hits.sort_by(|a, b| a.fraction.total_cmp(&b.fraction));
            }
        }
        hits
    }

    /// Colliders overlapping the box at `center` with `size`
    pub fn query_region(
        &self,
        scene: &Scene,
        center: Vector,
        size: Vector,
        layer: Option<u8>,
        mode: QueryMode,
    ) -> Vec<ColliderRef> {
        let half = size.abs() / 2.0;
        self.overlap(scene, center, &Cuboid::new(half.to_na()), layer, mode)
    }

    /// Colliders overlapping the circle at `center`
    pub fn overlap_circle(
        &self,
        scene: &Scene,
        center: Vector,
        radius: f32,
        layer: Option<u8>,
        mode: QueryMode,
    ) -> Vec<ColliderRef> {
        self.overlap(scene, center, &Ball::new(radius.abs()), layer, mode)
    }

    fn overlap(
        &self,
        scene: &Scene,
        center: Vector,
        shape: &dyn rapier2d::parry::shape::Shape,
        layer: Option<u8>,
        mode: QueryMode,
    ) -> Vec<ColliderRef> {
        let Some(world) = self.worlds.get(&scene.id()) else {
            return Vec::new();
        };
        let predicate = |handle: ColliderHandle, _: &rapier2d::prelude::Collider| {
            accepts(world, scene, handle, layer)
        };
        let filter = QueryFilter::default().predicate(&predicate);
        let position = Isometry2::translation(center.x, center.y);
        let mut found = Vec::new();
        world.query.intersections_with_shape(
            &world.bodies,
            &world.colliders,
            &position,
            shape,
            filter,
            |handle| {
                found.extend(world.owners.get(&handle).copied());
                mode == QueryMode::Multiple
            },
        );
        found
    }

    /// World-space outlines of every collider in the world of `scene`
    pub fn debug_shapes(&self, scene: SceneId) -> Vec<DebugShape> {
        let Some(world) = self.worlds.get(&scene) else {
            return Vec::new();
        };
        world
            .owners
            .iter()
            .filter_map(|(handle, owner)| {
                let collider = world.colliders.get(*handle)?;
                let iso = collider.position();
                let shape = collider.shape();
                let local: Vec<Vector> = if let Some(cuboid) = shape.as_cuboid() {
                    let h = Vector::from(cuboid.half_extents);
                    vec![
                        Vector::new(-h.x, -h.y),
                        Vector::new(h.x, -h.y),
                        Vector::new(h.x, h.y),
                        Vector::new(-h.x, h.y),
                    ]
                } else if let Some(ball) = shape.as_ball() {
                    (0..CIRCLE_SEGMENTS)
                        .map(|i| {
                            #[allow(clippy::cast_precision_loss)]
                            let degrees = 360.0 * i as f32 / CIRCLE_SEGMENTS as f32;
                            Vector::new(ball.radius, 0.0).rotated(degrees)
                        })
                        .collect()
                } else if let Some(polygon) = shape.as_convex_polygon() {
                    polygon.points().iter().map(|p| Vector::new(p.x, p.y)).collect()
                } else if let Some(segment) = shape.as_segment() {
                    vec![
                        Vector::new(segment.a.x, segment.a.y),
                        Vector::new(segment.b.x, segment.b.y),
                    ]
                } else if let Some(polyline) = shape.as_polyline() {
                    polyline.vertices().iter().map(|p| Vector::new(p.x, p.y)).collect()
                } else {
                    return None;
                };
                let points = local
                    .into_iter()
                    .map(|p| {
                        let world_point = iso * p.to_point();
                        Vector::new(world_point.x, world_point.y)
                    })
                    .collect();
                Some(DebugShape {
                    entity: owner.entity,
                    points,
                    sensor: collider.is_sensor(),
                })
            })
            .collect()
    }

    // ----- lifecycle -----

    fn create_world(&mut self, scene: SceneId) {
        info!("physics world created for scene {scene}");
        self.worlds.insert(scene, World::new());
    }

    fn drop_world(&mut self, scene: SceneId) {
        if self.worlds.remove(&scene).is_some() {
            info!("physics world dropped for scene {scene}");
        }
    }

    fn set_paused(&mut self, scene: SceneId, paused: bool) {
        if let Some(world) = self.worlds.get_mut(&scene) {
            world.paused = paused;
        }
    }

    fn queue_create(&mut self, scene: SceneId, entity: EntityId) {
        match self.worlds.get_mut(&scene) {
            Some(world) => {
                world.garbage.shift_remove(&entity);
                world.pending.insert(entity);
            }
            None => warn!("CreateBody for {entity:?} without a physics world"),
        }
    }

    fn queue_destroy(&mut self, scene: SceneId, entity: EntityId, bus: &mut EventBus) {
        let Some(world) = self.worlds.get_mut(&scene) else {
            return;
        };
        world.pending.shift_remove(&entity);
        if world.records.contains_key(&entity) {
            world.garbage.insert(entity);
            bus.dispatch(Event::new(EventData::BodyDestroyed { entity }).only(entity), true);
        }
    }

    fn set_entity_enabled(&mut self, scene: &mut Scene, entity: EntityId, enabled: bool, bus: &mut EventBus) {
        let Some(target) = scene.entity_mut(entity) else {
            return;
        };
        let Some(body) = target.get_component_mut::<RigidBody>() else {
            return;
        };
        body.set_active_flag(enabled);
        if !enabled {
            body.mark_created(false);
        }
        let world = scene.id();
        if enabled {
            self.queue_create(world, entity);
            bus.dispatch(Event::new(EventData::EntityEnabled { entity }).only(entity), true);
        } else {
            if let Some(world) = self.worlds.get_mut(&world) {
                world.pending.shift_remove(&entity);
                world.garbage.insert(entity);
            }
            bus.dispatch(Event::new(EventData::EntityDisabled { entity }).only(entity), true);
        }
    }

    fn on_component_removed(&mut self, scene: &Scene, entity: EntityId, component: ComponentId, name: &str) {
        let Some(world) = self.worlds.get_mut(&scene.id()) else {
            return;
        };
        match name {
            "Collider" => world.detach_collider(entity, component),
            "RigidBody" if world.records.contains_key(&entity) => {
                world.garbage.insert(entity);
                if scene.entity(entity).is_some_and(|e| e.has_component::<Collider>()) {
                    world.pending.insert(entity);
                }
            }
            _ => {}
        }
    }

    // ----- stepping -----

    /// Solver settings for one step of `dt` seconds
    fn integration_parameters(&self, dt: f32) -> IntegrationParameters {
        let mut params = IntegrationParameters::default();
        params.dt = dt;
        params.max_velocity_iterations = self.velocity_iterations;
        params.max_stabilization_iterations = self.position_iterations;
        params
    }

    fn physics_update(&mut self, scene: &mut Scene, bus: &mut EventBus, event: &Event) {
        let gravity = self.gravity;
        let debug_draw = self.debug_draw;
        let scene_id = scene.id();
        let dt = event.data.delta().unwrap_or(FIXED_DELTA).max(FIXED_DELTA) * event.time_scale;
        let params = self.integration_parameters(dt);
        let Some(world) = self.worlds.get_mut(&scene_id) else {
            return;
        };
        if world.paused {
            return;
        }

        for entity in std::mem::take(&mut world.garbage) {
            if world.remove_record(entity) {
                trace!("body of {entity:?} removed");
            }
        }
        let orphans: Vec<EntityId> = world.records.keys().copied().filter(|id| !scene.contains(*id)).collect();
        for entity in orphans {
            debug!("body of {entity:?} outlived its entity");
            world.remove_record(entity);
        }
        for entity in std::mem::take(&mut world.pending) {
            create_body(world, scene, entity, bus);
        }
        let rebuild = apply_commands(world, scene);
        for entity in rebuild {
            world.remove_record(entity);
            create_body(world, scene, entity, bus);
        }
        sync_colliders(world, scene);
        refresh_info(world, scene);

        if dt > 0.0 {
            let gate = ContactGate {
                filter: &self.filter,
                info: &world.info,
            };
            let collector = ChannelEventCollector::new(world.collision_send.clone(), world.force_send.clone());
            world.pipeline.step(
                &gravity.to_na(),
                &params,
                &mut world.islands,
                &mut world.broad_phase,
                &mut world.narrow_phase,
                &mut world.bodies,
                &mut world.colliders,
                &mut world.impulse_joints,
                &mut world.multibody_joints,
                &mut world.ccd_solver,
                Some(&mut world.query),
                &gate,
                &collector,
            );
        }

        for (_, body) in world.bodies.iter_mut() {
            body.reset_forces(false);
            body.reset_torques(false);
        }
        write_back(world, scene);
        dispatch_contacts(world, bus);
        while world.force_recv.try_recv().is_ok() {}

        if debug_draw {
            bus.enqueue_current(EventData::DrawDebug);
        }
    }
}

fn accepts(world: &World, scene: &Scene, handle: ColliderHandle, layer: Option<u8>) -> bool {
    let Some(owner) = world.owners.get(&handle) else {
        return false;
    };
    let Some(entity) = scene.entity(owner.entity) else {
        return false;
    };
    if world.info.get(&handle).is_some_and(|info| info.camera || !info.enabled) {
        return false;
    }
    match layer {
        Some(layer) => entity.layer() == layer,
        None => true,
    }
}

fn colliders_of(entity: &Entity) -> Vec<(ComponentId, Collider)> {
    entity
        .components
        .iter()
        .filter_map(|(cid, slot)| {
            slot.get()
                .and_then(downcast_ref::<Collider>)
                .map(|collider| (*cid, collider.clone()))
        })
        .collect()
}

fn body_builder(body: &RigidBody, position: Vector, degrees: f32, has_colliders: bool) -> RigidBodyBuilder {
    let builder = match body.body_type() {
        BodyType::Static => RigidBodyBuilder::fixed(),
        BodyType::Dynamic => RigidBodyBuilder::dynamic(),
        BodyType::Kinematic => RigidBodyBuilder::kinematic_velocity_based(),
    };
    let mut builder = builder
        .translation(position.to_na())
        .rotation(deg_to_rad(degrees))
        .linvel(body.velocity().to_na())
        .angvel(deg_to_rad(body.angular_velocity()))
        .gravity_scale(body.gravity_scale())
        .linear_damping(body.linear_damping())
        .angular_damping(body.angular_damping())
        .ccd_enabled(body.bullet());
    if body.fixed_rotation() {
        builder = builder.lock_rotations();
    }
    if body.body_type() == BodyType::Dynamic && (body.has_explicit_mass() || !has_colliders) {
        builder = builder.additional_mass(body.mass());
    }
    builder
}

fn collider_builder(collider: &Collider, scale: Vector) -> Option<ColliderBuilder> {
    let builder = match collider.shape().resolve(scale) {
        ResolvedShape::Cuboid(half) => ColliderBuilder::cuboid(half.x.abs(), half.y.abs()),
        ResolvedShape::Ball(radius) => ColliderBuilder::ball(radius.abs()),
        ResolvedShape::ConvexPolygon(points) => {
            let points: Vec<_> = points.iter().map(|p| p.to_point()).collect();
            ColliderBuilder::convex_hull(&points)?
        }
        ResolvedShape::Segment(a, b) => ColliderBuilder::segment(a.to_point(), b.to_point()),
        ResolvedShape::Polyline(points) => {
            ColliderBuilder::polyline(points.iter().map(|p| p.to_point()).collect(), None)
        }
    };
    let collision_types = if collider.is_sensor() {
        ActiveCollisionTypes::all()
    } else {
        ActiveCollisionTypes::default() | ActiveCollisionTypes::KINEMATIC_FIXED
    };
    Some(
        builder
            .sensor(collider.is_sensor())
            .translation(collider.offset().to_na())
            .restitution(collider.bounciness())
            .friction(collider.friction())
            .density(collider.density())
            .active_events(ActiveEvents::COLLISION_EVENTS)
            .active_hooks(ActiveHooks::FILTER_CONTACT_PAIRS | ActiveHooks::FILTER_INTERSECTION_PAIR)
            .active_collision_types(collision_types),
    )
}

fn create_body(world: &mut World, scene: &mut Scene, id: EntityId, bus: &mut EventBus) {
    let Some(entity) = scene.entity(id) else {
        return;
    };
    if !entity.is_active() {
        trace!("{} is disabled, body creation deferred", entity.name());
        return;
    }
    let rigid_body = entity.get_component::<RigidBody>();
    match world.records.get(&id).map(|record| record.ghost) {
        Some(true) if rigid_body.is_some() => {
            debug!("replacing ghost body of {}", entity.name());
            world.remove_record(id);
        }
        Some(_) => return,
        None => {}
    }

    let colliders = colliders_of(entity);
    let position = entity.position();
    let degrees = entity.angle();
    let scale = entity.scale();
    let (builder, ghost, massless) = match rigid_body {
        Some(body) => (
            body_builder(body, position, degrees, !colliders.is_empty()),
            false,
            body.has_explicit_mass(),
        ),
        None => (
            RigidBodyBuilder::fixed()
                .translation(position.to_na())
                .rotation(deg_to_rad(degrees)),
            true,
            false,
        ),
    };

    let handle = world.bodies.insert(builder.build());
    world.records.insert(
        id,
        BodyRecord {
            handle,
            ghost,
            colliders: HashMap::new(),
        },
    );
    for (cid, collider) in &colliders {
        world.attach_collider(id, *cid, collider, scale, massless);
    }
    if let Some(body) = world.bodies.get_mut(handle) {
        body.recompute_mass_properties_from_colliders(&world.colliders);
    }
    // The builder read the mirror; forces and impulses stay queued for apply_commands
    if let Some(body) = scene.entity_mut(id).and_then(Entity::get_component_mut::<RigidBody>) {
        body.mark_created(true);
        body.retain_momentum_commands();
    }
    trace!("body created for {id:?} (ghost: {ghost})");
    bus.dispatch(Event::new(EventData::BodyCreated { entity: id }).only(id), true);
}

/// Apply queued body commands. Returns entities whose body must be rebuilt.
fn apply_commands(world: &mut World, scene: &mut Scene) -> Vec<EntityId> {
    let mut rebuild = Vec::new();
    let ids: Vec<EntityId> = world.records.keys().copied().collect();
    for id in ids {
        let Some(record) = world.records.get(&id) else {
            continue;
        };
        if record.ghost {
            continue;
        }
        let commands = scene
            .entity_mut(id)
            .and_then(Entity::get_component_mut::<RigidBody>)
            .map(RigidBody::take_commands)
            .unwrap_or_default();
        let Some(body) = world.bodies.get_mut(record.handle) else {
            continue;
        };
        for command in commands {
            match command {
                BodyCommand::Teleport { position, angle } => {
                    body.set_position(Isometry2::new(position.to_na(), deg_to_rad(angle)), true);
                }
                BodyCommand::Velocity(velocity) => body.set_linvel(velocity.to_na(), true),
                BodyCommand::AngularVelocity(degrees) => body.set_angvel(deg_to_rad(degrees), true),
                BodyCommand::Type(_) | BodyCommand::Mass(_) => {
                    if !rebuild.contains(&id) {
                        rebuild.push(id);
                    }
                }
                BodyCommand::GravityScale(scale) => body.set_gravity_scale(scale, true),
                BodyCommand::FixedRotation(locked) => body.lock_rotations(locked, true),
                BodyCommand::Damping { linear, angular } => {
                    body.set_linear_damping(linear);
                    body.set_angular_damping(angular);
                }
                BodyCommand::Bullet(enabled) => body.enable_ccd(enabled),
                BodyCommand::Force { force, point, mode } => {
                    let iso = *body.position();
                    let force = iso.rotation * force.to_na();
                    match (point, mode) {
                        (None, ForceMode::Force) => body.add_force(force, true),
                        (None, ForceMode::Impulse) => body.apply_impulse(force, true),
                        (Some(point), ForceMode::Force) => {
                            body.add_force_at_point(force, iso * point.to_point(), true);
                        }
                        (Some(point), ForceMode::Impulse) => {
                            body.apply_impulse_at_point(force, iso * point.to_point(), true);
                        }
                    }
                }
                BodyCommand::Torque { torque, mode } => match mode {
                    ForceMode::Force => body.add_torque(torque, true),
                    ForceMode::Impulse => body.apply_torque_impulse(torque, true),
                },
            }
        }
    }
    rebuild
}

/// Attach new colliders, rebuild changed ones, drop vanished ones
fn sync_colliders(world: &mut World, scene: &Scene) {
    let ids: Vec<EntityId> = world.records.keys().copied().collect();
    for id in ids {
        let Some(entity) = scene.entity(id) else {
            continue;
        };
        let current = colliders_of(entity);
        let scale = entity.scale();
        let massless = entity
            .get_component::<RigidBody>()
            .is_some_and(RigidBody::has_explicit_mass);
        let known: Vec<(ComponentId, u32)> = world
            .records
            .get(&id)
            .map(|record| record.colliders.iter().map(|(cid, (_, rev))| (*cid, *rev)).collect())
            .unwrap_or_default();

        for (cid, _) in &known {
            if !current.iter().any(|(c, _)| c == cid) {
                world.detach_collider(id, *cid);
            }
        }
        for (cid, collider) in &current {
            match known.iter().find(|(c, _)| c == cid) {
                Some((_, revision)) if *revision == collider.revision() => {}
                Some(_) => {
                    world.detach_collider(id, *cid);
                    world.attach_collider(id, *cid, collider, scale, massless);
                }
                None => world.attach_collider(id, *cid, collider, scale, massless),
            }
        }
    }
}

fn refresh_info(world: &mut World, scene: &Scene) {
    world.info.clear();
    for (handle, owner) in &world.owners {
        let Some(entity) = scene.entity(owner.entity) else {
            continue;
        };
        let Some(collider) = entity.component_as::<Collider>(owner.component) else {
            continue;
        };
        let body_active = entity
            .get_component::<RigidBody>()
            .map_or(true, RigidBody::is_active);
        world.info.insert(
            *handle,
            ColliderInfo {
                layer: entity.layer(),
                enabled: entity.is_active() && body_active && collider.is_active(),
                sensor: collider.is_sensor(),
                camera: collider.is_camera(),
            },
        );
    }
}

fn write_back(world: &World, scene: &mut Scene) {
    for (id, record) in &world.records {
        if record.ghost {
            continue;
        }
        let Some(body) = world.bodies.get(record.handle) else {
            continue;
        };
        if body.is_fixed() {
            continue;
        }
        let position = Vector::from(*body.translation());
        let degrees = rad_to_deg(body.rotation().angle());
        let state = BodyState {
            position,
            angle: degrees,
            velocity: Vector::from(*body.linvel()),
            angular_velocity: rad_to_deg(body.angvel()),
            mass: body.mass(),
            inertia: body.mass_properties().local_mprops.principal_inertia(),
        };
        if let Some(rigid_body) = scene.entity_mut(*id).and_then(Entity::get_component_mut::<RigidBody>) {
            rigid_body.sync(state);
        }
        scene.sync_from_physics(*id, position, degrees);
    }
}

fn dispatch_contacts(world: &World, bus: &mut EventBus) {
    while let Ok(event) = world.collision_recv.try_recv() {
        let (h1, h2) = (event.collider1(), event.collider2());
        let (Some(a), Some(b)) = (world.owners.get(&h1), world.owners.get(&h2)) else {
            continue;
        };
        let (Some(info_a), Some(info_b)) = (world.info.get(&h1), world.info.get(&h2)) else {
            continue;
        };
        let started = event.started();
        let overlap = |own: ColliderRef, other: ColliderRef| {
            let collision = Collision { own, other };
            let data = if started {
                EventData::CollisionEnter(collision)
            } else {
                EventData::CollisionExit(collision)
            };
            Event::new(data).only(own.entity)
        };

        if info_a.camera || info_b.camera {
            if info_a.camera && !info_b.camera {
                bus.enqueue_current(overlap(*a, *b));
            } else if info_b.camera && !info_a.camera {
                bus.enqueue_current(overlap(*b, *a));
            }
        } else if info_a.sensor || info_b.sensor {
            if info_a.sensor {
                bus.enqueue_current(overlap(*a, *b));
            }
            if info_b.sensor {
                bus.enqueue_current(overlap(*b, *a));
            }
        } else {
            let contact = |own: ColliderRef, other: ColliderRef| {
                let collision = Collision { own, other };
                let data = if started {
                    EventData::CollisionBegin(collision)
                } else {
                    EventData::CollisionEnd(collision)
                };
                Event::new(data).only(own.entity)
            };
            bus.enqueue_current(contact(*a, *b));
            bus.enqueue_current(contact(*b, *a));
        }
    }
}

impl System for PhysicsCoupler {
    fn name(&self) -> &'static str {
        "PhysicsCoupler"
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        vec![
            EventKind::PhysicsUpdate,
            EventKind::CreateBody,
            EventKind::DestroyBody,
            EventKind::DisableEntity,
            EventKind::EnableEntity,
            EventKind::ComponentRemoved,
        ]
    }

    fn on_event(&mut self, ctx: &mut SystemContext<'_>, event: &Event) -> Result<(), EngineError> {
        match &event.data {
            EventData::StartScene { scene } => self.create_world(*scene),
            EventData::SceneStopped => {
                if let Some(scene) = ctx.scene.as_deref() {
                    self.drop_world(scene.id());
                }
            }
            EventData::ScenePaused => {
                if let Some(scene) = ctx.scene.as_deref() {
                    self.set_paused(scene.id(), true);
                }
            }
            EventData::SceneContinued => {
                if let Some(scene) = ctx.scene.as_deref() {
                    self.set_paused(scene.id(), false);
                }
            }
            EventData::CreateBody { entity } => {
                let scene = ctx.scene_mut()?.id();
                self.queue_create(scene, *entity);
            }
            EventData::DestroyBody { entity } => {
                let scene = ctx.scene_mut()?.id();
                self.queue_destroy(scene, *entity, ctx.bus);
            }
            EventData::DisableEntity { entity } | EventData::EnableEntity { entity } => {
                let enabled = matches!(event.data, EventData::EnableEntity { .. });
                let Some(scene) = ctx.scene.as_deref_mut() else {
                    return Ok(());
                };
                self.set_entity_enabled(scene, *entity, enabled, ctx.bus);
            }
            EventData::ComponentRemoved { entity, component, name } => {
                if let Some(scene) = ctx.scene.as_deref() {
                    self.on_component_removed(scene, *entity, *component, name);
                }
            }
            EventData::PhysicsUpdate { .. } => {
                let Some(scene) = ctx.scene.as_deref_mut() else {
                    return Ok(());
                };
                self.physics_update(scene, ctx.bus, event);
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ecs::Entity;
    use approx::assert_abs_diff_eq;

    fn setup() -> (PhysicsCoupler, Scene, EventBus) {
        let mut coupler = PhysicsCoupler::new(&PhysicsConfig::default());
        let scene = Scene::new("physics", Vector::new(640.0, 640.0), 64.0).expect("valid scene");
        coupler.create_world(scene.id());
        let mut bus = EventBus::new();
        bus.set_scene(Some(scene.id()));
        (coupler, scene, bus)
    }

    fn step(coupler: &mut PhysicsCoupler, scene: &mut Scene, bus: &mut EventBus) {
        let event = Event::new(EventData::PhysicsUpdate { dt: FIXED_DELTA });
        coupler.physics_update(scene, bus, &event);
    }

    fn collisions(bus: &mut EventBus) -> Vec<(EventKind, EntityId, EntityId)> {
        std::iter::from_fn(|| bus.pop())
            .filter_map(|event| match &event.data {
                EventData::CollisionBegin(c)
                | EventData::CollisionEnd(c)
                | EventData::CollisionEnter(c)
                | EventData::CollisionExit(c) => {
                    assert_eq!(event.only_entity, Some(c.own.entity));
                    Some((event.kind(), c.own.entity, c.other.entity))
                }
                _ => None,
            })
            .collect()
    }

    fn ground(scene: &mut Scene, layer: u8) -> EntityId {
        scene
            .add_at(
                Entity::new("ground")
                    .with_scale(Vector::new(10.0, 1.0))
                    .with(Collider::cuboid())
                    .expect("collider"),
                Vector::zero(),
                layer,
            )
            .expect("added")
    }

    fn ball(scene: &mut Scene, y: f32, layer: u8) -> EntityId {
        scene
            .add_at(
                Entity::new("ball")
                    .with(RigidBody::dynamic())
                    .and_then(|e| e.with(Collider::circle()))
                    .expect("components"),
                Vector::new(0.0, y),
                layer,
            )
            .expect("added")
    }

    fn height(scene: &Scene, id: EntityId) -> f32 {
        scene.entity(id).map(|e| e.position().y).unwrap_or_default()
    }

    #[test]
    fn test_ghost_body_for_bare_collider() {
        let (mut coupler, mut scene, mut bus) = setup();
        let id = scene
            .add(Entity::new("wall").with(Collider::cuboid()).expect("collider"))
            .expect("added");
        coupler.queue_create(scene.id(), id);
        step(&mut coupler, &mut scene, &mut bus);
        assert!(coupler.has_body(scene.id(), id));
        assert!(coupler.is_ghost(scene.id(), id));

        scene.add_component(id, RigidBody::dynamic()).expect("body attached");
        coupler.queue_create(scene.id(), id);
        step(&mut coupler, &mut scene, &mut bus);
        assert!(!coupler.is_ghost(scene.id(), id));
    }

    #[test]
    fn test_free_fall() {
        let (mut coupler, mut scene, mut bus) = setup();
        let id = scene
            .add_at(
                Entity::new("ball").with(RigidBody::dynamic()).expect("body"),
                Vector::new(0.0, 10.0),
                0,
            )
            .expect("added");
        coupler.queue_create(scene.id(), id);
        for _ in 0..50 {
            step(&mut coupler, &mut scene, &mut bus);
        }
        let y = scene.entity(id).map(|e| e.position().y).unwrap_or_default();
        assert_abs_diff_eq!(y, 5.0, epsilon = 0.5);
        let velocity = scene
            .entity(id)
            .and_then(Entity::get_component::<RigidBody>)
            .map(RigidBody::velocity)
            .unwrap_or_default();
        assert!(velocity.y < -9.0);
    }

    #[test]
    fn test_ray_cast_respects_layer() {
        let (mut coupler, mut scene, mut bus) = setup();
        scene.add_layer("Ground", 2).expect("layer");
        let ground = scene
            .add_at(
                Entity::new("ground")
                    .with_scale(Vector::new(2.0, 2.0))
                    .with(Collider::cuboid())
                    .expect("collider"),
                Vector::zero(),
                "Ground",
            )
            .expect("added");
        coupler.queue_create(scene.id(), ground);
        step(&mut coupler, &mut scene, &mut bus);

        let hits = coupler.ray_cast(
            &scene,
            Vector::new(0.0, 10.0),
            Vector::down(),
            20.0,
            Some(2),
            RayMode::Closest,
            false,
        );
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].entity, ground);
        assert_abs_diff_eq!(hits[0].point.y, 1.0, epsilon = 1e-3);
        assert_abs_diff_eq!(hits[0].fraction, 0.45, epsilon = 1e-3);

        let other_layer = coupler.ray_cast(
            &scene,
            Vector::new(0.0, 10.0),
            Vector::down(),
            20.0,
            Some(3),
            RayMode::Closest,
            false,
        );
        assert!(other_layer.is_empty());
        let regions = coupler.query_region(&scene, Vector::zero(), Vector::unit(), None, QueryMode::Multiple);
        assert_eq!(regions.len(), 1);
    }

    #[test]
    fn test_destroy_body_is_deferred() {
        let (mut coupler, mut scene, mut bus) = setup();
        let id = scene
            .add(Entity::new("crate").with(RigidBody::dynamic()).expect("body"))
            .expect("added");
        coupler.queue_create(scene.id(), id);
        step(&mut coupler, &mut scene, &mut bus);
        while bus.pop().is_some() {}

        coupler.queue_destroy(scene.id(), id, &mut bus);
        assert_eq!(bus.pop().map(|e| e.kind()), Some(EventKind::BodyDestroyed));
        assert!(coupler.has_body(scene.id(), id));
        step(&mut coupler, &mut scene, &mut bus);
        assert!(!coupler.has_body(scene.id(), id));
    }

    #[test]
    fn test_paused_world_does_not_step() {
        let (mut coupler, mut scene, mut bus) = setup();
        let id = scene
            .add_at(Entity::new("ball").with(RigidBody::dynamic()).expect("body"), Vector::new(0.0, 10.0), 0)
            .expect("added");
        coupler.queue_create(scene.id(), id);
        step(&mut coupler, &mut scene, &mut bus);
        coupler.set_paused(scene.id(), true);
        let before = scene.entity(id).map(Entity::position);
        step(&mut coupler, &mut scene, &mut bus);
        assert_eq!(scene.entity(id).map(Entity::position), before);
    }

    #[test]
    fn test_removed_entity_leaves_no_body() {
        let (mut coupler, mut scene, mut bus) = setup();
        let wall = scene
            .add_at(
                Entity::new("wall")
                    .with_scale(Vector::new(2.0, 2.0))
                    .with(Collider::cuboid())
                    .expect("collider"),
                Vector::zero(),
                0,
            )
            .expect("added");
        coupler.queue_create(scene.id(), wall);
        step(&mut coupler, &mut scene, &mut bus);
        assert!(coupler.has_body(scene.id(), wall));

        scene.remove(wall).expect("removed");
        let hits = coupler.ray_cast(&scene, Vector::new(0.0, 10.0), Vector::down(), 20.0, None, RayMode::Closest, false);
        assert!(hits.is_empty());
        step(&mut coupler, &mut scene, &mut bus);
        assert!(!coupler.has_body(scene.id(), wall));
    }

    #[test]
    fn test_clear_frees_every_body() {
        let (mut coupler, mut scene, mut bus) = setup();
        let floor = ground(&mut scene, 0);
        coupler.queue_create(scene.id(), floor);
        step(&mut coupler, &mut scene, &mut bus);

        scene.clear();
        let id = ball(&mut scene, 3.0, 0);
        coupler.queue_create(scene.id(), id);
        for _ in 0..100 {
            step(&mut coupler, &mut scene, &mut bus);
        }
        assert!(!coupler.has_body(scene.id(), floor));
        assert!(height(&scene, id) < -1.0);
    }

    #[test]
    fn test_solver_iterations_follow_config() {
        let coupler = PhysicsCoupler::new(&PhysicsConfig::default());
        let params = coupler.integration_parameters(FIXED_DELTA);
        assert_eq!(params.max_velocity_iterations, 10);
        assert_eq!(params.max_stabilization_iterations, 10);
        assert_abs_diff_eq!(params.dt, FIXED_DELTA);
    }

    #[test]
    fn test_impulse_before_first_step_is_applied() {
        let (mut coupler, mut scene, mut bus) = setup();
        let id = ball(&mut scene, 10.0, 0);
        if let Some(body) = scene.entity_mut(id).and_then(Entity::get_component_mut::<RigidBody>) {
            body.add_force(Vector::new(5.0, 0.0), ForceMode::Impulse, None);
        }
        coupler.queue_create(scene.id(), id);
        step(&mut coupler, &mut scene, &mut bus);
        let velocity = scene
            .entity(id)
            .and_then(Entity::get_component::<RigidBody>)
            .map(RigidBody::velocity)
            .unwrap_or_default();
        assert!(velocity.x > 1.0);
    }

    #[test]
    fn test_ignored_layers_pass_through() {
        let (mut coupler, mut scene, mut bus) = setup();
        let floor = ground(&mut scene, 2);
        let id = ball(&mut scene, 3.0, 1);
        coupler.ignore_layer_collision(1, 2);
        coupler.queue_create(scene.id(), floor);
        coupler.queue_create(scene.id(), id);
        let mut seen = Vec::new();
        for _ in 0..100 {
            step(&mut coupler, &mut scene, &mut bus);
            seen.extend(collisions(&mut bus));
        }
        assert!(height(&scene, id) < -1.0);
        assert!(seen.is_empty());
    }

    #[test]
    fn test_restored_layers_collide_and_report_both_sides() {
        let (mut coupler, mut scene, mut bus) = setup();
        let floor = ground(&mut scene, 2);
        let id = ball(&mut scene, 3.0, 1);
        coupler.ignore_layer_collision(1, 2);
        coupler.restore_layer_collision(1, 2);
        coupler.queue_create(scene.id(), floor);
        coupler.queue_create(scene.id(), id);
        let mut seen = Vec::new();
        for _ in 0..100 {
            step(&mut coupler, &mut scene, &mut bus);
            seen.extend(collisions(&mut bus));
        }
        assert_abs_diff_eq!(height(&scene, id), 1.0, epsilon = 0.1);
        assert!(seen.contains(&(EventKind::CollisionBegin, id, floor)));
        assert!(seen.contains(&(EventKind::CollisionBegin, floor, id)));
        assert!(!seen.iter().any(|(kind, ..)| *kind == EventKind::CollisionEnter));
    }

    #[test]
    fn test_sensor_reports_enter_and_exit_to_itself() {
        let (mut coupler, mut scene, mut bus) = setup();
        let gate = scene
            .add_at(
                Entity::new("gate")
                    .with_scale(Vector::new(2.0, 2.0))
                    .with(Collider::cuboid().sensor(true))
                    .expect("collider"),
                Vector::zero(),
                0,
            )
            .expect("added");
        let id = ball(&mut scene, 3.0, 0);
        coupler.queue_create(scene.id(), gate);
        coupler.queue_create(scene.id(), id);
        let mut seen = Vec::new();
        for _ in 0..100 {
            step(&mut coupler, &mut scene, &mut bus);
            seen.extend(collisions(&mut bus));
        }
        assert_eq!(
            seen,
            vec![
                (EventKind::CollisionEnter, gate, id),
                (EventKind::CollisionExit, gate, id),
            ]
        );
        assert!(height(&scene, id) < -1.5);
    }
}
