//! Spatial partitioning data structures
//!
//! Provides the grid index used by scenes (frame culling, region queries) and
//! by UI canvases (element hit testing).

mod hash;

pub use hash::{Aabb, SpatialHash, MAX_CELLS_PER_AXIS};

/// Cell size used by scene hashes, in world units
pub const SCENE_CELL_SIZE: f32 = 2.0;

/// Cell size used by canvas hashes, in world units
pub const CANVAS_CELL_SIZE: f32 = 1.0;
