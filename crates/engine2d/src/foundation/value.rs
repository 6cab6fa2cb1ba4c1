//! Dynamic property values
//!
//! Animation frames, animator fields and conditions all talk about entity
//! properties by name. [`Value`] is the tagged union those properties travel as.

use std::cmp::Ordering;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::color::Color;
use super::math::Vector;

/// Reference to an image asset, optionally restricted to a sub-rectangle
/// (a cell of a sprite sheet), in pixels: `[x, y, width, height]`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageRef {
    /// Asset name resolved through the virtual filesystem
    pub name: String,
    /// Optional region of the image
    pub region: Option<[u32; 4]>,
}

impl ImageRef {
    /// Whole image
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            region: None,
        }
    }

    /// Slice a sheet of `sheet_size` pixels into a `columns x rows` grid,
    /// row-major from the top-left cell.
    pub fn slice(&self, sheet_size: (u32, u32), columns: u32, rows: u32) -> Vec<Self> {
        if columns == 0 || rows == 0 {
            return Vec::new();
        }
        let (cell_w, cell_h) = (sheet_size.0 / columns, sheet_size.1 / rows);
        (0..rows)
            .flat_map(|row| (0..columns).map(move |col| (col, row)))
            .map(|(col, row)| Self {
                name: self.name.clone(),
                region: Some([col * cell_w, row * cell_h, cell_w, cell_h]),
            })
            .collect()
    }
}

/// A property value
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub enum Value {
    /// Absent value
    #[default]
    None,
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Floating point
    Float(f64),
    /// String
    Str(String),
    /// 2D vector
    Vector(Vector),
    /// Color
    Color(Color),
    /// Image reference
    Image(ImageRef),
}

impl Value {
    /// Human readable variant name, used in error messages
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
            Self::Vector(_) => "vector",
            Self::Color(_) => "color",
            Self::Image(_) => "image",
        }
    }

    /// Numeric view of ints and floats
    #[allow(clippy::cast_precision_loss)]
    pub const fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(i) => Some(*i as f64),
            Self::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// Numeric view as `f32`
    #[allow(clippy::cast_possible_truncation)]
    pub fn as_f32(&self) -> Option<f32> {
        self.as_f64().map(|v| v as f32)
    }

    /// Bool view
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Vector view
    pub const fn as_vector(&self) -> Option<Vector> {
        match self {
            Self::Vector(v) => Some(*v),
            _ => None,
        }
    }

    /// String view
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Whether the value can be interpolated
    pub const fn is_interpolatable(&self) -> bool {
        matches!(self, Self::Int(_) | Self::Float(_) | Self::Vector(_) | Self::Color(_))
    }

    /// Interpolate towards `other`. Values that cannot be interpolated (or
    /// whose types differ) step: `self` before `t = 1`, `other` at it.
    #[allow(clippy::cast_possible_truncation)]
    pub fn lerp(&self, other: &Self, t: f64) -> Self {
        match (self, other) {
            (Self::Float(a), Self::Float(b)) => Self::Float(a + (b - a) * t),
            (Self::Int(_) | Self::Float(_), Self::Int(_) | Self::Float(_)) => {
                let (a, b) = (self.as_f64().unwrap_or_default(), other.as_f64().unwrap_or_default());
                let v = a + (b - a) * t;
                if matches!(self, Self::Int(_)) && matches!(other, Self::Int(_)) {
                    Self::Int(v.round() as i64)
                } else {
                    Self::Float(v)
                }
            }
            (Self::Vector(a), Self::Vector(b)) => Self::Vector(a.lerp(*b, t as f32)),
            (Self::Color(a), Self::Color(b)) => Self::Color(a.lerp(*b, t as f32)),
            _ if t >= 1.0 => other.clone(),
            _ => self.clone(),
        }
    }

    /// Loose equality: ints and floats compare numerically
    pub fn loose_eq(&self, other: &Self) -> bool {
        match (self.as_f64(), other.as_f64()) {
            (Some(a), Some(b)) => (a - b).abs() < f64::EPSILON,
            _ => self == other,
        }
    }

    /// Ordering for numbers, strings and vectors (by length); `None` otherwise
    pub fn partial_cmp_loose(&self, other: &Self) -> Option<Ordering> {
        if let (Some(a), Some(b)) = (self.as_f64(), other.as_f64()) {
            return a.partial_cmp(&b);
        }
        match (self, other) {
            (Self::Str(a), Self::Str(b)) => Some(a.cmp(b)),
            (Self::Vector(a), Self::Vector(b)) => a.length_squared().partial_cmp(&b.length_squared()),
            (Self::Bool(a), Self::Bool(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Bool(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Str(s) => write!(f, "'{s}'"),
            Self::Vector(v) => write!(f, "{v}"),
            Self::Color(c) => write!(f, "{c}"),
            Self::Image(i) => write!(f, "image '{}'", i.name),
        }
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Self::Bool(v)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<f32> for Value {
    fn from(v: f32) -> Self {
        Self::Float(f64::from(v))
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Self::Float(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Self::Str(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Self::Str(v)
    }
}

impl From<Vector> for Value {
    fn from(v: Vector) -> Self {
        Self::Vector(v)
    }
}

impl From<Color> for Value {
    fn from(v: Color) -> Self {
        Self::Color(v)
    }
}

impl From<ImageRef> for Value {
    fn from(v: ImageRef) -> Self {
        Self::Image(v)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_lerp_keeps_int_type() {
        assert_eq!(Value::Int(0).lerp(&Value::Int(10), 0.26), Value::Int(3));
        assert_eq!(Value::Int(0).lerp(&Value::Float(1.0), 0.5), Value::Float(0.5));
    }

    #[test]
    fn test_non_interpolatable_values_step() {
        let a = Value::from("idle");
        let b = Value::from("run");
        assert_eq!(a.lerp(&b, 0.99), a);
        assert_eq!(a.lerp(&b, 1.0), b);
    }

    #[test]
    fn test_loose_comparisons() {
        assert!(Value::Int(2).loose_eq(&Value::Float(2.0)));
        assert_eq!(Value::Float(0.5).partial_cmp_loose(&Value::Int(1)), Some(Ordering::Less));
        assert_eq!(Value::Bool(true).partial_cmp_loose(&Value::Int(1)), None);
    }

    #[test]
    fn test_sprite_sheet_slicing() {
        let sheet = ImageRef::new("hero.png");
        let cells = sheet.slice((64, 32), 4, 2);
        assert_eq!(cells.len(), 8);
        assert_eq!(cells[5].region, Some([16, 16, 16, 16]));
    }
}
