//! Scenes
//!
//! A scene owns its entities and everything that indexes them: the kind and
//! tag collection, the spatial hash, the layer table and the event receiver
//! map. The engine keeps scenes on a stack; only the top one receives events.
//!
//! ## Architecture
//!
//! ```text
//! Scene
//!   ├─ SlotMap<EntityId, Entity>   (ownership)
//!   ├─ EntityCollection            (kind + tag index)
//!   ├─ SpatialHash                 (culling, region queries)
//!   ├─ Camera + camera entity      (frame, screen mapping)
//!   └─ receivers                   (event kind → components)
//! ```

mod camera;
mod collection;
mod filter;
mod layers;
mod scene_graph;

pub use camera::{Camera, MAX_ZOOM, MIN_ZOOM};
pub use collection::EntityCollection;
pub use filter::EntityFilter;
pub use layers::{LayerRef, LayerTable, CANVAS_LAYER, MAX_LAYERS};
pub use scene_graph::{Receiver, Scene, SetupFn, MAIN_CAMERA};

use thiserror::Error;

/// Scene errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SceneError {
    /// A unique component was attached twice
    #[error("entity '{entity}' already has a {component}")]
    DuplicateComponent {
        /// Entity name
        entity: String,
        /// Component type name
        component: &'static str,
    },

    /// Layer name not registered
    #[error("unknown layer '{0}'")]
    UnknownLayer(String),

    /// Layer index outside `0..MAX_LAYERS`
    #[error("layer {0} is out of range")]
    LayerOutOfRange(u8),

    /// Only canvases may live on the canvas layer
    #[error("entity '{entity}' cannot use the canvas layer")]
    ReservedLayer {
        /// Entity name
        entity: String,
    },

    /// Entity id not in this scene
    #[error("unknown entity")]
    UnknownEntity,

    /// Component id not attached to the entity
    #[error("unknown component")]
    UnknownComponent,

    /// Parenting would create a cycle
    #[error("'{child}' cannot be parented to its descendant '{parent}'")]
    ParentCycle {
        /// Child name
        child: String,
        /// Parent name
        parent: String,
    },

    /// Zoom outside the allowed range
    #[error("zoom {0} is outside [0.1, 10]")]
    InvalidZoom(f32),

    /// The main camera cannot be removed
    #[error("the main camera cannot be removed")]
    CameraRemoval,

    /// A UI element does not fit its canvas
    #[error("element does not fit inside the canvas")]
    ElementOutOfBounds,

    /// Pixels per world unit must be finite and positive
    #[error("pixel ratio {0} must be finite and positive")]
    InvalidPixelRatio(f32),
}
