//! Draw records handed to backends

use crate::foundation::collections::EntityId;
use crate::foundation::color::Color;
use crate::foundation::math::Vector;
use crate::foundation::value::ImageRef;

/// Per-frame parameters
#[derive(Debug, Clone, PartialEq)]
pub struct FrameInfo {
    /// Clear color
    pub background: Color,
    /// World position at the center of the surface
    pub camera: Vector,
    /// Pixels per world unit, zoom included
    pub ratio: f32,
}

/// What a record draws
#[derive(Debug, Clone, PartialEq)]
pub enum DrawKind {
    /// Textured quad
    Sprite(ImageRef),
    /// Filled polygon in local units
    Shape(Vec<Vector>),
}

/// Everything a backend needs to draw one entity
#[derive(Debug, Clone, PartialEq)]
pub struct DrawRecord {
    /// Owner
    pub entity: EntityId,
    /// Sort key, ascending back to front
    pub layer_order: i32,
    /// Sprite or shape
    pub kind: DrawKind,
    /// World position of the center
    pub position: Vector,
    /// Degrees, counter-clockwise
    pub angle: f32,
    /// World size
    pub size: Vector,
    /// Tint
    pub tint: Color,
    /// 0 transparent, 1 opaque
    pub opacity: f32,
}
