//! Collider component
//!
//! Shapes are described in entity-local units. Box, circle and triangle
//! shapes without explicit dimensions are sized from the entity scale when the
//! coupler builds them.

use crate::ecs::{Component, Context};
use crate::engine::EngineError;
use crate::events::{Event, EventData, EventKind};
use crate::foundation::math::Vector;
use crate::foundation::value::Value;

use super::PhysicsError;

/// Unit triangle, scaled by the entity scale when no vertices are given
pub const UNIT_TRIANGLE: [Vector; 3] = [
    Vector::new(-0.5, -0.5),
    Vector::new(0.5, -0.5),
    Vector::new(0.0, 0.5),
];

/// Collider geometry
#[derive(Debug, Clone, PartialEq)]
pub enum ColliderShape {
    /// Axis-aligned box in local space; `None` uses half the scale
    Box {
        /// Half extents
        half: Option<Vector>,
    },
    /// Circle; `None` uses half the largest scale component
    Circle {
        /// Radius
        radius: Option<f32>,
    },
    /// Convex polygon, at least three vertices
    Polygon {
        /// Local vertices
        vertices: Vec<Vector>,
    },
    /// Triangle; `None` uses [`UNIT_TRIANGLE`] scaled
    Triangle {
        /// Local vertices
        vertices: Option<[Vector; 3]>,
    },
    /// Segment
    Edge {
        /// First end
        a: Vector,
        /// Second end
        b: Vector,
    },
    /// Closed chain, at least three points
    Loop {
        /// Local points
        vertices: Vec<Vector>,
    },
    /// Sensor box covering the camera frame
    Camera {
        /// Half extents
        half: Vector,
    },
}

/// Shape with every default filled in
#[derive(Debug, Clone, PartialEq)]
pub enum ResolvedShape {
    /// Box half extents
    Cuboid(Vector),
    /// Circle radius
    Ball(f32),
    /// Convex hull of the points
    ConvexPolygon(Vec<Vector>),
    /// Segment ends
    Segment(Vector, Vector),
    /// Closed polyline
    Polyline(Vec<Vector>),
}

impl ColliderShape {
    /// Fill in defaults for an entity of `scale`
    pub fn resolve(&self, scale: Vector) -> ResolvedShape {
        let size = scale.abs();
        match self {
            Self::Box { half } => ResolvedShape::Cuboid(half.unwrap_or(size / 2.0)),
            Self::Circle { radius } => ResolvedShape::Ball(radius.unwrap_or(size.max_component() / 2.0)),
            Self::Polygon { vertices } => ResolvedShape::ConvexPolygon(vertices.clone()),
            Self::Triangle { vertices } => ResolvedShape::ConvexPolygon(match vertices {
                Some(points) => points.to_vec(),
                None => UNIT_TRIANGLE
                    .iter()
                    .map(|p| Vector::new(p.x * scale.x, p.y * scale.y))
                    .collect(),
            }),
            Self::Edge { a, b } => ResolvedShape::Segment(*a, *b),
            Self::Loop { vertices } => {
                let mut points = vertices.clone();
                if let Some(first) = vertices.first() {
                    points.push(*first);
                }
                ResolvedShape::Polyline(points)
            }
            Self::Camera { half } => ResolvedShape::Cuboid(*half),
        }
    }
}

/// Collision shape attached to an entity body
#[derive(Debug, Clone, PartialEq)]
pub struct Collider {
    shape: ColliderShape,
    sensor: bool,
    offset: Vector,
    bounciness: f32,
    friction: f32,
    density: f32,
    active: bool,
    revision: u32,
}

impl Collider {
    fn with_shape(shape: ColliderShape) -> Self {
        Self {
            shape,
            sensor: false,
            offset: Vector::zero(),
            bounciness: 0.0,
            friction: 0.2,
            density: 1.0,
            active: true,
            revision: 0,
        }
    }

    /// Box sized from the entity scale
    pub fn cuboid() -> Self {
        Self::with_shape(ColliderShape::Box { half: None })
    }

    /// Box with explicit half extents
    pub fn cuboid_half(half: Vector) -> Self {
        Self::with_shape(ColliderShape::Box { half: Some(half) })
    }

    /// Circle sized from the entity scale
    pub fn circle() -> Self {
        Self::with_shape(ColliderShape::Circle { radius: None })
    }

    /// Circle with an explicit radius
    pub fn circle_radius(radius: f32) -> Self {
        Self::with_shape(ColliderShape::Circle { radius: Some(radius) })
    }

    /// Convex polygon
    pub fn polygon(vertices: Vec<Vector>) -> Result<Self, PhysicsError> {
        if vertices.len() < 3 {
            return Err(PhysicsError::TooFewVertices {
                shape: "polygon",
                count: vertices.len(),
            });
        }
        Ok(Self::with_shape(ColliderShape::Polygon { vertices }))
    }

    /// Triangle sized from the entity scale
    pub fn triangle() -> Self {
        Self::with_shape(ColliderShape::Triangle { vertices: None })
    }

    /// Triangle with explicit vertices
    pub fn triangle_points(vertices: [Vector; 3]) -> Self {
        Self::with_shape(ColliderShape::Triangle { vertices: Some(vertices) })
    }

    /// Segment between two local points
    pub fn edge(a: Vector, b: Vector) -> Self {
        Self::with_shape(ColliderShape::Edge { a, b })
    }

    /// Closed chain
    pub fn chain_loop(vertices: Vec<Vector>) -> Result<Self, PhysicsError> {
        if vertices.len() < 3 {
            return Err(PhysicsError::TooFewVertices {
                shape: "loop",
                count: vertices.len(),
            });
        }
        Ok(Self::with_shape(ColliderShape::Loop { vertices }))
    }

    /// Camera frame sensor
    pub fn camera(half: Vector) -> Self {
        let mut collider = Self::with_shape(ColliderShape::Camera { half });
        collider.sensor = true;
        collider
    }

    /// Mark as sensor
    #[must_use]
    pub fn sensor(mut self, sensor: bool) -> Self {
        self.sensor = sensor;
        self
    }

    /// Offset from the body origin
    #[must_use]
    pub fn with_offset(mut self, offset: Vector) -> Self {
        self.offset = offset;
        self
    }

    /// Restitution
    #[must_use]
    pub fn with_bounciness(mut self, bounciness: f32) -> Self {
        self.bounciness = bounciness;
        self
    }

    /// Friction coefficient
    #[must_use]
    pub fn with_friction(mut self, friction: f32) -> Self {
        self.friction = friction;
        self
    }

    /// Density
    #[must_use]
    pub fn with_density(mut self, density: f32) -> Self {
        self.density = density;
        self
    }

    /// Geometry
    pub const fn shape(&self) -> &ColliderShape {
        &self.shape
    }

    /// Whether this collider only reports overlaps
    pub const fn is_sensor(&self) -> bool {
        self.sensor
    }

    /// Whether this is the camera frame sensor
    pub const fn is_camera(&self) -> bool {
        matches!(self.shape, ColliderShape::Camera { .. })
    }

    /// Offset from the body origin
    pub const fn offset(&self) -> Vector {
        self.offset
    }

    /// Restitution
    pub const fn bounciness(&self) -> f32 {
        self.bounciness
    }

    /// Friction coefficient
    pub const fn friction(&self) -> f32 {
        self.friction
    }

    /// Density
    pub const fn density(&self) -> f32 {
        self.density
    }

    /// Takes part in contacts
    pub const fn is_active(&self) -> bool {
        self.active
    }

    /// Enable or disable contacts for this collider
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Toggle sensor mode; the body fixture is rebuilt
    pub fn set_sensor(&mut self, sensor: bool) {
        self.sensor = sensor;
        self.touch();
    }

    /// Replace the geometry; the body fixture is rebuilt
    pub fn set_shape(&mut self, shape: ColliderShape) {
        self.shape = shape;
        self.touch();
    }

    /// Bumped whenever the fixture must be rebuilt
    pub const fn revision(&self) -> u32 {
        self.revision
    }

    pub(crate) fn touch(&mut self) {
        self.revision = self.revision.wrapping_add(1);
    }

    pub(crate) fn set_camera_half(&mut self, half: Vector) {
        if let ColliderShape::Camera { half: current } = &mut self.shape {
            *current = half;
            self.touch();
        }
    }
}

impl Component for Collider {
    fn name(&self) -> &'static str {
        "Collider"
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        vec![EventKind::BodyDestroyed]
    }

    fn on_event(&mut self, ctx: &mut Context<'_>, event: &Event) -> Result<(), EngineError> {
        match &event.data {
            EventData::Init => ctx.dispatch(EventData::CreateBody { entity: ctx.entity }, true),
            EventData::BodyDestroyed { entity } if *entity == ctx.entity => {
                log::trace!("collider of {entity:?} detached from its body");
            }
            _ => {}
        }
        Ok(())
    }

    fn set_property(&mut self, name: &str, value: &Value) -> bool {
        match (name, value) {
            ("sensor", Value::Bool(b)) => self.set_sensor(*b),
            ("active", Value::Bool(b)) => self.set_active(*b),
            _ => return false,
        }
        true
    }

    fn property(&self, name: &str) -> Option<Value> {
        match name {
            "sensor" => Some(Value::Bool(self.sensor)),
            "active" => Some(Value::Bool(self.active)),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_scale() {
        let scale = Vector::new(2.0, 4.0);
        assert_eq!(Collider::cuboid().shape().resolve(scale), ResolvedShape::Cuboid(Vector::new(1.0, 2.0)));
        assert_eq!(Collider::circle().shape().resolve(scale), ResolvedShape::Ball(2.0));
        let ResolvedShape::ConvexPolygon(points) = Collider::triangle().shape().resolve(scale) else {
            panic!("triangle resolves to a polygon");
        };
        assert_eq!(points[2], Vector::new(0.0, 2.0));
    }

    #[test]
    fn test_polygon_needs_three_vertices() {
        assert!(matches!(
            Collider::polygon(vec![Vector::zero(), Vector::unit()]),
            Err(PhysicsError::TooFewVertices { count: 2, .. })
        ));
        assert!(Collider::chain_loop(vec![Vector::zero(), Vector::right(), Vector::up()]).is_ok());
    }

    #[test]
    fn test_loop_closes() {
        let collider = Collider::chain_loop(vec![Vector::zero(), Vector::right(), Vector::up()])
            .expect("three points");
        let ResolvedShape::Polyline(points) = collider.shape().resolve(Vector::unit()) else {
            panic!("loop resolves to a polyline");
        };
        assert_eq!(points.len(), 4);
        assert_eq!(points.first(), points.last());
    }

    #[test]
    fn test_camera_is_sensor_and_resizes() {
        let mut camera = Collider::camera(Vector::new(5.0, 5.0));
        assert!(camera.is_sensor());
        assert!(camera.is_camera());
        let before = camera.revision();
        camera.set_camera_half(Vector::new(2.0, 2.0));
        assert_eq!(camera.revision(), before + 1);
        assert_eq!(camera.shape(), &ColliderShape::Camera { half: Vector::new(2.0, 2.0) });
    }
}
