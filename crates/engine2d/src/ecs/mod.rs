//! Entity-component model
//!
//! Entities are named game objects owned by a scene. Each carries a
//! [`Transform`] and an insertion-ordered set of [`Component`]s that react
//! to events.

pub mod behaviour;
pub mod component;
pub mod entity;
pub mod transform;

use std::borrow::Cow;
use std::fmt;

pub use behaviour::{Behaviour, Script};
pub use component::{AsAny, Component, Context};
pub use entity::{ComponentSlot, Entity};
pub use transform::Transform;

/// Kind label used by the scene's kind index and spatial hash filters
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Kind(Cow<'static, str>);

impl Kind {
    /// Base kind every entity has
    pub const ENTITY: Self = Self(Cow::Borrowed("Entity"));
    /// The scene camera
    pub const CAMERA: Self = Self(Cow::Borrowed("Camera"));
    /// UI canvases
    pub const CANVAS: Self = Self(Cow::Borrowed("Canvas"));

    /// Static label
    pub const fn new(name: &'static str) -> Self {
        Self(Cow::Borrowed(name))
    }

    /// Label built at runtime
    pub fn owned(name: impl Into<String>) -> Self {
        Self(Cow::Owned(name.into()))
    }

    /// Label text
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Kind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
