//! RGBA colors with saturating arithmetic

use std::fmt;
use std::ops::{Add, Mul, Sub};

use serde::{Deserialize, Serialize};

/// RGBA color: `u8` channels and an alpha in `0.0..=1.0`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    /// Red channel
    pub r: u8,
    /// Green channel
    pub g: u8,
    /// Blue channel
    pub b: u8,
    /// Opacity
    pub a: f32,
}

impl Color {
    /// Pure red
    pub const RED: Self = Self::rgba(255, 0, 0, 1.0);
    /// Yellow
    pub const YELLOW: Self = Self::rgba(255, 255, 0, 1.0);
    /// Pure green
    pub const GREEN: Self = Self::rgba(0, 255, 0, 1.0);
    /// Dark blue
    pub const BLUE: Self = Self::rgba(0, 0, 125, 1.0);
    /// White
    pub const WHITE: Self = Self::rgba(255, 255, 255, 1.0);
    /// Mid grey
    pub const GREY: Self = Self::rgba(127, 127, 127, 1.0);
    /// Translucent light grey
    pub const LIGHT_GREY: Self = Self::rgba(180, 180, 180, 127.0 / 255.0);
    /// Translucent dark grey
    pub const DARK_GREY: Self = Self::rgba(127, 127, 127, 127.0 / 255.0);
    /// Black
    pub const BLACK: Self = Self::rgba(0, 0, 0, 1.0);
    /// Magenta
    pub const MAGENTA: Self = Self::rgba(255, 71, 182, 1.0);
    /// Purple
    pub const PURPLE: Self = Self::rgba(187, 0, 255, 1.0);

    /// Opaque color from channels
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::rgba(r, g, b, 1.0)
    }

    /// Color from channels and alpha. Alpha is not clamped here, see [`Color::with_alpha`].
    pub const fn rgba(r: u8, g: u8, b: u8, a: f32) -> Self {
        Self { r, g, b, a }
    }

    /// Copy with a different alpha, clamped to `0.0..=1.0`
    pub fn with_alpha(self, a: f32) -> Self {
        Self { a: a.clamp(0.0, 1.0), ..self }
    }

    /// Parse `#rrggbb` or `#rrggbbaa` (the leading `#` is optional)
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.strip_prefix('#').unwrap_or(hex);
        let channel = |i: usize| u8::from_str_radix(digits.get(i..i + 2)?, 16).ok();
        match digits.len() {
            6 => Some(Self::rgb(channel(0)?, channel(2)?, channel(4)?)),
            8 => Some(Self::rgba(
                channel(0)?,
                channel(2)?,
                channel(4)?,
                f32::from(channel(6)?) / 255.0,
            )),
            _ => None,
        }
    }

    /// Channels normalized to `0.0..=1.0`, for backends
    pub fn to_f32_array(self) -> [f32; 4] {
        [
            f32::from(self.r) / 255.0,
            f32::from(self.g) / 255.0,
            f32::from(self.b) / 255.0,
            self.a,
        ]
    }

    /// Interpolate each channel
    pub fn lerp(self, other: Self, t: f32) -> Self {
        let mix = |a: u8, b: u8| {
            let v = f32::from(a) + (f32::from(b) - f32::from(a)) * t;
            v.round().clamp(0.0, 255.0) as u8
        };
        Self {
            r: mix(self.r, other.r),
            g: mix(self.g, other.g),
            b: mix(self.b, other.b),
            a: (self.a + (other.a - self.a) * t).clamp(0.0, 1.0),
        }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "rgba({}, {}, {}, {:.2})", self.r, self.g, self.b, self.a)
    }
}

impl Add for Color {
    type Output = Self;
    fn add(self, rhs: Self) -> Self {
        Self {
            r: self.r.saturating_add(rhs.r),
            g: self.g.saturating_add(rhs.g),
            b: self.b.saturating_add(rhs.b),
            a: (self.a + rhs.a).min(1.0),
        }
    }
}

impl Sub for Color {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self {
        Self {
            r: self.r.saturating_sub(rhs.r),
            g: self.g.saturating_sub(rhs.g),
            b: self.b.saturating_sub(rhs.b),
            a: (self.a - rhs.a).max(0.0),
        }
    }
}

impl Mul<f32> for Color {
    type Output = Self;
    fn mul(self, rhs: f32) -> Self {
        let scale = |c: u8| (f32::from(c) * rhs).round().clamp(0.0, 255.0) as u8;
        Self {
            r: scale(self.r),
            g: scale(self.g),
            b: scale(self.b),
            a: self.a,
        }
    }
}
