//! # engine2d
//!
//! An event-driven 2D game engine core.
//!
//! ## Features
//!
//! - **Event Bus**: Immediate and deferred queues with scene-stamped events
//! - **Scenes**: Entity ownership, parenting, layers and a spatial hash for culling
//! - **Physics**: Fixed-step rapier2d simulation with collision events and queries
//! - **Animation**: Sampled animations and condition-driven animator state machines
//! - **Assets**: Background loading on a worker pool with a weak cache
//! - **UI**: Canvases with hover and click handling
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use engine2d::prelude::*;
//!
//! fn main() -> Result<(), EngineError> {
//!     let config = EngineConfig::default().with_title("Demo");
//!     let mut engine = Engine::new(config)?;
//!     let scene = Scene::from_config("main", engine.config())?.with_setup(|scene, _services| {
//!         scene.add(Entity::new("ball").with(RigidBody::dynamic())?.with(Collider::circle())?)?;
//!         Ok(())
//!     });
//!     engine.start_scene(scene);
//!     engine.run();
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions, clippy::similar_names, clippy::too_many_arguments)]
#![forbid(unsafe_code)]

pub mod animation;
pub mod assets;
pub mod config;
pub mod ecs;
pub mod engine;
pub mod events;
pub mod foundation;
pub mod input;
pub mod physics;
pub mod render;
pub mod scene;
pub mod services;
pub mod spatial;
pub mod ui;

pub use engine::{Engine, EngineError};

/// Common imports for engine users
pub mod prelude {
    pub use crate::{
        animation::{Animation, Animator, Easing, Frame, Linear, Step, ANY},
        assets::{AssetHandle, AssetLoader, ImageAsset, TextAsset},
        config::{Config, EngineConfig},
        ecs::{Behaviour, Component, Context, Entity, Kind, Script},
        engine::{Engine, EngineError, System, SystemContext},
        events::{Event, EventBus, EventData, EventKind, SceneRequest},
        foundation::{
            color::Color,
            condition::Condition,
            math::Vector,
            time::{Timer, DEFAULT_FPS, FIXED_DELTA},
            value::Value,
        },
        input::{KeyCode, MouseButton, RawInput},
        physics::{Collider, ForceMode, PhysicsCoupler, QueryMode, RayMode, RigidBody},
        render::SpriteRenderer,
        scene::Scene,
        services::Services,
        ui::{Canvas, UiElement},
    };
}
