//! Layer indices and names

use std::collections::HashMap;

use super::SceneError;

/// Number of layers
pub const MAX_LAYERS: u8 = 20;

/// Topmost layer, reserved for canvases
pub const CANVAS_LAYER: u8 = MAX_LAYERS - 1;

/// A layer given by index or by registered name
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayerRef {
    /// Raw index
    Index(u8),
    /// Name registered with `add_layer`
    Name(String),
}

impl From<u8> for LayerRef {
    fn from(index: u8) -> Self {
        Self::Index(index)
    }
}

impl From<&str> for LayerRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<String> for LayerRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

/// Name → index aliases
#[derive(Debug, Clone, Default)]
pub struct LayerTable {
    names: HashMap<String, u8>,
}

impl LayerTable {
    /// Register `name` for `index`
    pub fn add(&mut self, name: impl Into<String>, index: u8) -> Result<(), SceneError> {
        if index >= MAX_LAYERS {
            return Err(SceneError::LayerOutOfRange(index));
        }
        self.names.insert(name.into(), index);
        Ok(())
    }

    /// Index registered for `name`
    pub fn index(&self, name: &str) -> Result<u8, SceneError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| SceneError::UnknownLayer(name.to_owned()))
    }

    /// Resolve a reference to a checked index
    pub fn resolve(&self, layer: &LayerRef) -> Result<u8, SceneError> {
        match layer {
            LayerRef::Index(index) if *index < MAX_LAYERS => Ok(*index),
            LayerRef::Index(index) => Err(SceneError::LayerOutOfRange(*index)),
            LayerRef::Name(name) => self.index(name),
        }
    }

    /// First name registered for `index`
    pub fn name_of(&self, index: u8) -> Option<&str> {
        self.names
            .iter()
            .find(|(_, i)| **i == index)
            .map(|(name, _)| name.as_str())
    }
}
