//! Fixed-step rigid-body physics
//!
//! Entities get bodies through the [`RigidBody`] and [`Collider`] components;
//! the [`PhysicsCoupler`] mirrors them into a rapier2d world, steps it at
//! [`FIXED_DELTA`](crate::foundation::time::FIXED_DELTA) and turns contacts
//! into collision events. The coupler is also the query service for ray casts
//! and region tests.

pub mod collider;
pub mod coupler;
pub mod layers;
pub mod rigid_body;

pub use collider::{Collider, ColliderShape, ResolvedShape};
pub use coupler::{DebugShape, PhysicsCoupler, QueryMode, RayHit, RayMode};
pub use layers::LayerFilter;
pub use rigid_body::{BodyType, ForceMode, RigidBody, MAX_PENDING_COMMANDS};

use thiserror::Error;

/// Physics errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum PhysicsError {
    /// Polygon or loop built from too few points
    #[error("a {shape} collider needs at least 3 vertices, got {count}")]
    TooFewVertices {
        /// Shape kind
        shape: &'static str,
        /// Points supplied
        count: usize,
    },

    /// The vertices do not form a convex polygon
    #[error("degenerate {0} collider")]
    DegenerateShape(&'static str),

    /// No world exists for the current scene
    #[error("no physics world is running")]
    NoWorld,

    /// Invalid query arguments
    #[error("invalid query: {0}")]
    InvalidQuery(String),
}
