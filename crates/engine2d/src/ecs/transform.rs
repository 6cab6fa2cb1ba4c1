//! Entity transform
//!
//! Pure data: world-space position, rotation and scale. Every entity owns
//! exactly one; it is not a [`Component`](super::Component) and cannot be
//! attached as one. Parent/child propagation lives on the scene, which can
//! reach the children.

use crate::foundation::math::{utils, Vector};

/// World-space placement of an entity
///
/// Angles are degrees at the API and radians in storage.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Transform {
    position: Vector,
    angle: f32,
    scale: Vector,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vector::zero(),
            angle: 0.0,
            scale: Vector::unit(),
        }
    }
}

impl Transform {
    /// Transform at `position`
    pub fn from_position(position: Vector) -> Self {
        Self {
            position,
            ..Self::default()
        }
    }

    /// World position
    pub const fn position(&self) -> Vector {
        self.position
    }

    /// Rotation in degrees
    pub fn angle(&self) -> f32 {
        utils::rad_to_deg(self.angle)
    }

    /// Rotation in radians
    pub const fn angle_radians(&self) -> f32 {
        self.angle
    }

    /// Scale (may be negative to mirror)
    pub const fn scale(&self) -> Vector {
        self.scale
    }

    /// Absolute extent per axis
    pub fn size(&self) -> Vector {
        self.scale.abs()
    }

    pub(crate) fn set_position(&mut self, position: Vector) {
        self.position = position;
    }

    pub(crate) fn set_angle(&mut self, degrees: f32) {
        self.angle = utils::deg_to_rad(degrees);
    }

    pub(crate) fn set_angle_radians(&mut self, radians: f32) {
        self.angle = radians;
    }

    pub(crate) fn set_scale(&mut self, scale: Vector) {
        self.scale = scale;
    }

    /// Map a local vector to world: scale, rotate, translate
    pub fn apply(&self, local: Vector) -> Vector {
        self.position + local.scaled(self.scale).rotated(self.angle())
    }

    /// Map a local direction to world: rotate only
    pub fn apply_direction(&self, local: Vector) -> Vector {
        local.rotated(self.angle())
    }

    /// Map a world point back to local coordinates
    pub fn inverse_apply(&self, world: Vector) -> Vector {
        let unrotated = (world - self.position).rotated(-self.angle());
        let sx = if self.scale.x.abs() > f32::EPSILON { self.scale.x } else { 1.0 };
        let sy = if self.scale.y.abs() > f32::EPSILON { self.scale.y } else { 1.0 };
        Vector::new(unrotated.x / sx, unrotated.y / sy)
    }
}
