//! Math utilities and types
//!
//! Provides the 2D vector type used across the engine. World units are
//! floats with Y increasing upward; angles are expressed in degrees at the
//! API surface and converted to radians at a single boundary ([`utils`]).

use std::fmt;
use std::ops::{Add, AddAssign, Div, DivAssign, Mul, MulAssign, Neg, Sub, SubAssign};

use approx::{AbsDiffEq, RelativeEq};
use serde::{Deserialize, Serialize};

pub use nalgebra::{Point2 as NaPoint2, Vector2};

/// nalgebra 2D vector, used at the physics boundary
pub type Vec2 = Vector2<f32>;

/// 2D vector value type
///
/// Copy semantics; every operator returns a new value.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Vector {
    /// Horizontal component
    pub x: f32,
    /// Vertical component (up is positive)
    pub y: f32,
}

impl Vector {
    /// Create a new vector
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// `(0, 0)`
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0)
    }

    /// `(1, 1)`
    pub const fn unit() -> Self {
        Self::new(1.0, 1.0)
    }

    /// `(0, 1)`
    pub const fn up() -> Self {
        Self::new(0.0, 1.0)
    }

    /// `(0, -1)`
    pub const fn down() -> Self {
        Self::new(0.0, -1.0)
    }

    /// `(-1, 0)`
    pub const fn left() -> Self {
        Self::new(-1.0, 0.0)
    }

    /// `(1, 0)`
    pub const fn right() -> Self {
        Self::new(1.0, 0.0)
    }

    /// Euclidean length
    pub fn length(self) -> f32 {
        self.length_squared().sqrt()
    }

    /// Squared length, avoids the square root
    pub fn length_squared(self) -> f32 {
        self.x * self.x + self.y * self.y
    }

    /// Unit vector in the same direction, or zero for a zero vector
    pub fn normalized(self) -> Self {
        let len = self.length();
        if len > f32::EPSILON {
            self / len
        } else {
            Self::zero()
        }
    }

    /// Dot product
    pub fn dot(self, other: Self) -> f32 {
        self.x * other.x + self.y * other.y
    }

    /// 2D cross product (z component of the 3D cross product)
    pub fn cross(self, other: Self) -> f32 {
        self.x * other.y - self.y * other.x
    }

    /// Component-wise product
    pub fn scaled(self, other: Self) -> Self {
        Self::new(self.x * other.x, self.y * other.y)
    }

    /// Component-wise absolute value
    pub fn abs(self) -> Self {
        Self::new(self.x.abs(), self.y.abs())
    }

    /// Largest component
    pub fn max_component(self) -> f32 {
        self.x.max(self.y)
    }

    /// Distance between two points
    pub fn distance(self, other: Self) -> f32 {
        (other - self).length()
    }

    /// Rotate counter-clockwise by `degrees`
    pub fn rotated(self, degrees: f32) -> Self {
        let (sin, cos) = utils::deg_to_rad(degrees).sin_cos();
        Self::new(self.x * cos - self.y * sin, self.x * sin + self.y * cos)
    }

    /// Rotate around `pivot` by `degrees`
    pub fn rotated_around(self, pivot: Self, degrees: f32) -> Self {
        pivot + (self - pivot).rotated(degrees)
    }

    /// Angle of this vector relative to the +X axis, in degrees
    pub fn angle(self) -> f32 {
        utils::rad_to_deg(self.y.atan2(self.x))
    }

    /// Signed angle from `self` to `other`, in degrees within `(-180, 180]`
    pub fn angle_to(self, other: Self) -> f32 {
        utils::rad_to_deg(self.cross(other).atan2(self.dot(other)))
    }

    /// Linear interpolation, `t` is not clamped
    pub fn lerp(self, other: Self, t: f32) -> Self {
        self + (other - self) * t
    }

    /// Move towards `target` by at most `max_delta`
    pub fn move_towards(self, target: Self, max_delta: f32) -> Self {
        let delta = target - self;
        let dist = delta.length();
        if dist <= max_delta || dist <= f32::EPSILON {
            target
        } else {
            self + delta / dist * max_delta
        }
    }

    /// Convert to an nalgebra vector
    pub fn to_na(self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }

    /// Convert to an nalgebra point
    pub fn to_point(self) -> NaPoint2<f32> {
        NaPoint2::new(self.x, self.y)
    }
}

impl fmt::Display for Vector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3})", self.x, self.y)
    }
}

impl From<Vec2> for Vector {
    fn from(v: Vec2) -> Self {
        Self::new(v.x, v.y)
    }
}

impl From<Vector> for Vec2 {
    fn from(v: Vector) -> Self {
        v.to_na()
    }
}

impl From<(f32, f32)> for Vector {
    fn from((x, y): (f32, f32)) -> Self {
        Self::new(x, y)
    }
}

impl Add for Vector {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self::new(self.x + rhs.x, self.y + rhs.y)
    }
}

impl Sub for Vector {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self::new(self.x - rhs.x, self.y - rhs.y)
    }
}

impl Mul<f32> for Vector {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        Self::new(self.x * rhs, self.y * rhs)
    }
}

impl Div<f32> for Vector {
    type Output = Self;
    fn div(self, rhs: f32) -> Self {
        Self::new(self.x / rhs, self.y / rhs)
    }
}

impl Neg for Vector {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y)
    }
}

impl AddAssign for Vector {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

impl SubAssign for Vector {
    fn sub_assign(&mut self, rhs: Self) {
        *self = *self - rhs;
    }
}

impl MulAssign<f32> for Vector {
    fn mul_assign(&mut self, rhs: f32) {
        *self = *self * rhs;
    }
}

impl DivAssign<f32> for Vector {
    fn div_assign(&mut self, rhs: f32) {
        *self = *self / rhs;
    }
}

impl AbsDiffEq for Vector {
    type Epsilon = f32;

    fn default_epsilon() -> f32 {
        f32::default_epsilon()
    }

    fn abs_diff_eq(&self, other: &Self, epsilon: f32) -> bool {
        self.x.abs_diff_eq(&other.x, epsilon) && self.y.abs_diff_eq(&other.y, epsilon)
    }
}

impl RelativeEq for Vector {
    fn default_max_relative() -> f32 {
        f32::default_max_relative()
    }

    fn relative_eq(&self, other: &Self, epsilon: f32, max_relative: f32) -> bool {
        self.x.relative_eq(&other.x, epsilon, max_relative)
            && self.y.relative_eq(&other.y, epsilon, max_relative)
    }
}

/// Mathematical constants
pub mod constants {
    /// Pi
    pub const PI: f32 = std::f32::consts::PI;

    /// Degrees to radians conversion factor
    pub const DEG_TO_RAD: f32 = PI / 180.0;

    /// Radians to degrees conversion factor
    pub const RAD_TO_DEG: f32 = 180.0 / PI;
}

/// Math utility functions
pub mod utils {
    use super::constants::{DEG_TO_RAD, RAD_TO_DEG};

    /// Convert degrees to radians
    pub fn deg_to_rad(degrees: f32) -> f32 {
        degrees * DEG_TO_RAD
    }

    /// Convert radians to degrees
    pub fn rad_to_deg(radians: f32) -> f32 {
        radians * RAD_TO_DEG
    }

    /// Clamp a value between min and max
    pub fn clamp(value: f32, min: f32, max: f32) -> f32 {
        value.max(min).min(max)
    }

    /// Linear interpolation between two values
    pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
        a + (b - a) * t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};

    #[test]
    fn test_normalized_has_unit_length() {
        for v in [Vector::new(3.0, 4.0), Vector::new(-0.2, 7.5), Vector::new(1e-3, -1e-3)] {
            assert_relative_eq!(v.normalized().length(), 1.0, epsilon = 1e-5);
        }
        assert_eq!(Vector::zero().normalized(), Vector::zero());
    }

    #[test]
    fn test_rotation_round_trip() {
        let v = Vector::new(2.5, -1.25);
        for angle in [0.0, 30.0, 90.0, 181.0, -45.0] {
            assert_abs_diff_eq!(v.rotated(angle).rotated(-angle), v, epsilon = 1e-4);
        }
        assert_abs_diff_eq!(Vector::right().rotated(90.0), Vector::up(), epsilon = 1e-6);
    }

    #[test]
    fn test_angle_to() {
        assert_relative_eq!(Vector::right().angle_to(Vector::up()), 90.0, epsilon = 1e-4);
        assert_relative_eq!(Vector::up().angle_to(Vector::right()), -90.0, epsilon = 1e-4);
    }

    #[test]
    fn test_move_towards_stops_at_target() {
        let start = Vector::zero();
        let target = Vector::new(10.0, 0.0);
        assert_eq!(start.move_towards(target, 3.0), Vector::new(3.0, 0.0));
        assert_eq!(start.move_towards(target, 30.0), target);
    }

    #[test]
    fn test_lerp() {
        let a = Vector::new(0.0, 1.0);
        let b = Vector::new(0.0, -1.0);
        assert_eq!(a.lerp(b, 0.5), Vector::zero());
        assert_relative_eq!(utils::lerp(2.0, 4.0, 0.25), 2.5);
    }
}
