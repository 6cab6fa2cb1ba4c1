//! Collision layer filtering
//!
//! Scene layers double as collision layers. Each layer keeps a mask of the
//! layers it collides with; all bits start set and
//! [`LayerFilter::ignore`] clears a pair symmetrically.

use crate::scene::MAX_LAYERS;

/// Bit of `layer` in a collision mask
pub const fn layer_bit(layer: u8) -> u32 {
    1 << layer
}

/// Pairwise layer filter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LayerFilter {
    masks: [u32; MAX_LAYERS as usize],
}

impl Default for LayerFilter {
    fn default() -> Self {
        Self {
            masks: [u32::MAX; MAX_LAYERS as usize],
        }
    }
}

impl LayerFilter {
    /// Filter letting every pair collide
    pub fn new() -> Self {
        Self::default()
    }

    /// Collision mask of `layer`
    pub fn mask(&self, layer: u8) -> u32 {
        self.masks.get(usize::from(layer)).copied().unwrap_or(u32::MAX)
    }

    /// Forbid contacts between `a` and `b` (both directions)
    pub fn ignore(&mut self, a: u8, b: u8) {
        if let Some(mask) = self.masks.get_mut(usize::from(a)) {
            *mask &= !layer_bit(b);
        }
        if let Some(mask) = self.masks.get_mut(usize::from(b)) {
            *mask &= !layer_bit(a);
        }
    }

    /// Allow contacts between `a` and `b` again
    pub fn restore(&mut self, a: u8, b: u8) {
        if let Some(mask) = self.masks.get_mut(usize::from(a)) {
            *mask |= layer_bit(b);
        }
        if let Some(mask) = self.masks.get_mut(usize::from(b)) {
            *mask |= layer_bit(a);
        }
    }

    /// `a`'s bit must be in `b`'s mask and `b`'s bit in `a`'s mask
    pub fn should_collide(&self, a: u8, b: u8) -> bool {
        (layer_bit(a) & self.mask(b)) != 0 && (layer_bit(b) & self.mask(a)) != 0
    }
}
