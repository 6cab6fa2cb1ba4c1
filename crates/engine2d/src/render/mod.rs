//! Rendering
//!
//! The engine never talks to a graphics API directly. The
//! [`RendererCoupler`] system collects [`DrawRecord`]s from
//! [`SpriteRenderer`] components inside the camera frame and hands them to a
//! [`RenderBackend`]. [`HeadlessBackend`] records calls instead of drawing.

pub mod backend;
pub mod commands;
pub mod coupler;
pub mod sprite;

pub use backend::{BackendCall, BackendResult, HeadlessBackend, RenderBackend};
pub use commands::{DrawKind, DrawRecord, FrameInfo};
pub use coupler::RendererCoupler;
pub use sprite::SpriteRenderer;

use thiserror::Error;

/// Rendering errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum RenderError {
    /// The backend failed
    #[error("render backend error: {0}")]
    Backend(String),

    /// A sprite names an image the backend cannot find
    #[error("missing image '{0}'")]
    MissingImage(String),
}
