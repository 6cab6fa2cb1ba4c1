//! Rigid body component
//!
//! The component is a mirror of the simulated body. Getters read the mirror,
//! which the coupler refreshes after every step. Setters update the mirror
//! and queue a [`BodyCommand`]; the coupler applies queued commands between
//! steps, so nothing ever waits on the simulation.

use log::{trace, warn};

use crate::ecs::{Component, Context};
use crate::engine::EngineError;
use crate::events::{Event, EventData, EventKind};
use crate::foundation::math::Vector;
use crate::foundation::time::FIXED_DELTA;
use crate::foundation::value::Value;

/// Commands kept between two physics updates; the oldest go first
pub const MAX_PENDING_COMMANDS: usize = 256;

/// Simulation role of a body
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyType {
    /// Never moves
    Static,
    /// Moved by forces and contacts
    Dynamic,
    /// Moved by velocity only, pushes dynamic bodies
    Kinematic,
}

/// How a force is applied
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForceMode {
    /// Continuous, integrated over the step
    Force,
    /// Instant change of momentum
    Impulse,
}

/// Mutation queued for the next safe point
#[derive(Debug, Clone, PartialEq)]
pub enum BodyCommand {
    /// Move instantly (angle in degrees)
    Teleport {
        /// Destination
        position: Vector,
        /// Angle in degrees
        angle: f32,
    },
    /// Linear velocity
    Velocity(Vector),
    /// Angular velocity in degrees per second
    AngularVelocity(f32),
    /// Body type
    Type(BodyType),
    /// Mass override
    Mass(f32),
    /// Gravity multiplier
    GravityScale(f32),
    /// Rotation lock
    FixedRotation(bool),
    /// Linear and angular damping
    Damping {
        /// Linear damping
        linear: f32,
        /// Angular damping
        angular: f32,
    },
    /// Continuous collision detection
    Bullet(bool),
    /// Force in body-local axes, applied at a local point (center when `None`)
    Force {
        /// Local force
        force: Vector,
        /// Local application point
        point: Option<Vector>,
        /// Mode
        mode: ForceMode,
    },
    /// Torque
    Torque {
        /// Torque magnitude
        torque: f32,
        /// Mode
        mode: ForceMode,
    },
}

/// Rigid body mirror
#[derive(Debug, Clone)]
pub struct RigidBody {
    body_type: BodyType,
    position: Vector,
    angle: f32,
    velocity: Vector,
    angular_velocity: f32,
    mass: f32,
    explicit_mass: bool,
    inertia: f32,
    gravity_scale: f32,
    fixed_rotation: bool,
    linear_damping: f32,
    angular_damping: f32,
    bullet: bool,
    active: bool,
    created: bool,
    commands: Vec<BodyCommand>,
}

impl RigidBody {
    /// Body of `body_type` with unit mass
    pub const fn new(body_type: BodyType) -> Self {
        Self {
            body_type,
            position: Vector::zero(),
            angle: 0.0,
            velocity: Vector::zero(),
            angular_velocity: 0.0,
            mass: 1.0,
            explicit_mass: false,
            inertia: 0.0,
            gravity_scale: 1.0,
            fixed_rotation: false,
            linear_damping: 0.0,
            angular_damping: 0.0,
            bullet: false,
            active: true,
            created: false,
            commands: Vec::new(),
        }
    }

    /// Dynamic body
    pub const fn dynamic() -> Self {
        Self::new(BodyType::Dynamic)
    }

    /// Static body
    pub const fn fixed() -> Self {
        Self::new(BodyType::Static)
    }

    /// Kinematic body
    pub const fn kinematic() -> Self {
        Self::new(BodyType::Kinematic)
    }

    /// Set the mass before creation
    #[must_use]
    pub const fn with_mass(mut self, mass: f32) -> Self {
        self.mass = mass;
        self.explicit_mass = true;
        self
    }

    /// Set the gravity multiplier before creation
    #[must_use]
    pub const fn with_gravity_scale(mut self, scale: f32) -> Self {
        self.gravity_scale = scale;
        self
    }

    /// Lock rotation before creation
    #[must_use]
    pub const fn with_fixed_rotation(mut self, fixed: bool) -> Self {
        self.fixed_rotation = fixed;
        self
    }

    /// Set damping before creation
    #[must_use]
    pub const fn with_damping(mut self, linear: f32, angular: f32) -> Self {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self
    }

    /// Enable continuous collision detection before creation
    #[must_use]
    pub const fn with_bullet(mut self, bullet: bool) -> Self {
        self.bullet = bullet;
        self
    }

    /// Set the initial velocity
    #[must_use]
    pub const fn with_velocity(mut self, velocity: Vector) -> Self {
        self.velocity = velocity;
        self
    }

    /// Body type
    pub const fn body_type(&self) -> BodyType {
        self.body_type
    }

    /// Position after the last step
    pub const fn position(&self) -> Vector {
        self.position
    }

    /// Angle in degrees after the last step
    pub const fn angle(&self) -> f32 {
        self.angle
    }

    /// Linear velocity
    pub const fn velocity(&self) -> Vector {
        self.velocity
    }

    /// Angular velocity in degrees per second
    pub const fn angular_velocity(&self) -> f32 {
        self.angular_velocity
    }

    /// Mass
    pub const fn mass(&self) -> f32 {
        self.mass
    }

    /// Whether the mass was set explicitly rather than derived from colliders
    pub const fn has_explicit_mass(&self) -> bool {
        self.explicit_mass
    }

    /// Rotational inertia
    pub const fn inertia(&self) -> f32 {
        self.inertia
    }

    /// Gravity multiplier
    pub const fn gravity_scale(&self) -> f32 {
        self.gravity_scale
    }

    /// Rotation lock
    pub const fn fixed_rotation(&self) -> bool {
        self.fixed_rotation
    }

    /// Linear damping
    pub const fn linear_damping(&self) -> f32 {
        self.linear_damping
    }

    /// Angular damping
    pub const fn angular_damping(&self) -> f32 {
        self.angular_damping
    }

    /// Continuous collision detection
    pub const fn bullet(&self) -> bool {
        self.bullet
    }

    /// Whether the body takes part in the simulation
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Whether the coupler has built the body
    pub const fn is_created(&self) -> bool {
        self.created
    }

    /// Change the body type
    pub fn set_body_type(&mut self, body_type: BodyType) {
        self.body_type = body_type;
        self.queue(BodyCommand::Type(body_type));
    }

    /// Set the linear velocity
    pub fn set_velocity(&mut self, velocity: Vector) {
        self.velocity = velocity;
        self.queue(BodyCommand::Velocity(velocity));
    }

    /// Set the angular velocity in degrees per second
    pub fn set_angular_velocity(&mut self, degrees_per_second: f32) {
        self.angular_velocity = degrees_per_second;
        self.queue(BodyCommand::AngularVelocity(degrees_per_second));
    }

    /// Override the mass
    pub fn set_mass(&mut self, mass: f32) {
        self.mass = mass;
        self.explicit_mass = true;
        self.queue(BodyCommand::Mass(mass));
    }

    /// Set the gravity multiplier
    pub fn set_gravity_scale(&mut self, scale: f32) {
        self.gravity_scale = scale;
        self.queue(BodyCommand::GravityScale(scale));
    }

    /// Lock or unlock rotation
    pub fn set_fixed_rotation(&mut self, fixed: bool) {
        self.fixed_rotation = fixed;
        self.queue(BodyCommand::FixedRotation(fixed));
    }

    /// Set linear and angular damping
    pub fn set_damping(&mut self, linear: f32, angular: f32) {
        self.linear_damping = linear;
        self.angular_damping = angular;
        self.queue(BodyCommand::Damping { linear, angular });
    }

    /// Toggle continuous collision detection
    pub fn set_bullet(&mut self, bullet: bool) {
        self.bullet = bullet;
        self.queue(BodyCommand::Bullet(bullet));
    }

    /// Move instantly; the scene calls this when the entity is moved by hand
    pub fn teleport(&mut self, position: Vector, angle: f32) {
        self.position = position;
        self.angle = angle;
        self.queue(BodyCommand::Teleport { position, angle });
    }

    /// Reach `destination` in one fixed step by setting the velocity
    pub fn move_position(&mut self, destination: Vector) {
        self.set_velocity((destination - self.position) / FIXED_DELTA);
    }

    /// Reach `angle` (degrees) in one fixed step by setting the angular velocity
    pub fn move_rotation(&mut self, angle: f32) {
        self.set_angular_velocity((angle - self.angle) / FIXED_DELTA);
    }

    /// Apply a force expressed in body-local axes, at a local point
    pub fn add_force(&mut self, force: Vector, mode: ForceMode, point: Option<Vector>) {
        self.queue(BodyCommand::Force { force, point, mode });
    }

    /// Apply a torque
    pub fn add_torque(&mut self, torque: f32, mode: ForceMode) {
        self.queue(BodyCommand::Torque { torque, mode });
    }

    fn queue(&mut self, command: BodyCommand) {
        if self.commands.len() >= MAX_PENDING_COMMANDS {
            warn!("rigid body command queue full, dropping {:?}", self.commands[0]);
            self.commands.remove(0);
        }
        self.commands.push(command);
    }

    pub(crate) fn take_commands(&mut self) -> Vec<BodyCommand> {
        std::mem::take(&mut self.commands)
    }

    /// Keep only forces and torques; everything else is already in the mirror
    pub(crate) fn retain_momentum_commands(&mut self) {
        self.commands
            .retain(|command| matches!(command, BodyCommand::Force { .. } | BodyCommand::Torque { .. }));
    }

    pub(crate) fn pending_commands(&self) -> usize {
        self.commands.len()
    }

    pub(crate) fn mark_created(&mut self, created: bool) {
        self.created = created;
    }

    pub(crate) fn set_active_flag(&mut self, active: bool) {
        self.active = active;
    }

    pub(crate) fn sync(&mut self, state: BodyState) {
        self.position = state.position;
        self.angle = state.angle;
        self.velocity = state.velocity;
        self.angular_velocity = state.angular_velocity;
        self.mass = state.mass;
        self.inertia = state.inertia;
    }
}

/// Simulated state copied back into the mirror
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct BodyState {
    pub position: Vector,
    pub angle: f32,
    pub velocity: Vector,
    pub angular_velocity: f32,
    pub mass: f32,
    pub inertia: f32,
}

impl Component for RigidBody {
    fn name(&self) -> &'static str {
        "RigidBody"
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        vec![EventKind::BodyCreated, EventKind::BodyDestroyed]
    }

    fn unique(&self) -> bool {
        true
    }

    fn on_event(&mut self, ctx: &mut Context<'_>, event: &Event) -> Result<(), EngineError> {
        match &event.data {
            EventData::Init => {
                if let Some(owner) = ctx.owner() {
                    self.position = owner.position();
                    self.angle = owner.angle();
                }
                ctx.dispatch(EventData::CreateBody { entity: ctx.entity }, true);
            }
            EventData::BodyCreated { entity } if *entity == ctx.entity => {
                trace!("rigid body of {entity:?} created");
                self.created = true;
            }
            EventData::BodyDestroyed { entity } if *entity == ctx.entity => {
                self.created = false;
            }
            _ => {}
        }
        Ok(())
    }

    fn set_property(&mut self, name: &str, value: &Value) -> bool {
        match (name, value) {
            ("velocity", Value::Vector(v)) => self.set_velocity(*v),
            ("angular_velocity", v) if v.as_f32().is_some() => {
                self.set_angular_velocity(v.as_f32().unwrap_or_default());
            }
            ("gravity_scale", v) if v.as_f32().is_some() => {
                self.set_gravity_scale(v.as_f32().unwrap_or_default());
            }
            ("fixed_rotation", Value::Bool(b)) => self.set_fixed_rotation(*b),
            _ => return false,
        }
        true
    }

    fn property(&self, name: &str) -> Option<Value> {
        Some(match name {
            "velocity" => Value::Vector(self.velocity),
            "angular_velocity" => Value::from(self.angular_velocity),
            "gravity_scale" => Value::from(self.gravity_scale),
            "mass" => Value::from(self.mass),
            "fixed_rotation" => Value::Bool(self.fixed_rotation),
            _ => return None,
        })
    }
}
