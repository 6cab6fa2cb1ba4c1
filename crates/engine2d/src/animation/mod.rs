//! Keyframe animation
//!
//! An [`Animation`] is a list of frames, each a set of property values held
//! for a duration. Frames are precomputed into samples at
//! [`DEFAULT_FPS`](crate::foundation::time::DEFAULT_FPS) using an [`Easing`];
//! playback writes samples onto the owner entity by property name.
//!
//! The [`Animator`] component is a small state machine over named animations,
//! switched by [`Condition`](crate::foundation::condition::Condition)s on its
//! fields. The [`AnimationSystem`] advances animators on every `Update`.

pub mod animator;
pub mod clip;
pub mod easing;
pub mod system;

pub use animator::{Animator, AnimatorStep, ANY};
pub use clip::{apply_state, Animation, Frame, Sample, State, MIN_FRAME_DURATION};
pub use easing::{Custom, Easing, Linear, QuadInOut, Step};
pub use system::AnimationSystem;

use thiserror::Error;

/// Animation errors
#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnimationError {
    /// An animation needs at least one frame
    #[error("an animation needs at least one frame")]
    NoFrames,

    /// Frame without properties
    #[error("frame {0} sets no properties")]
    EmptyFrame(usize),

    /// Frame shorter than one display frame
    #[error("frame {index} lasts {duration}s, shorter than one display frame")]
    FrameTooShort {
        /// Frame index
        index: usize,
        /// Its duration
        duration: f32,
    },

    /// Easing leaves [0, 1]
    #[error("easing returns {value} at t = {t}, outside [0, 1]")]
    InvalidEasing {
        /// Progress checked
        t: f32,
        /// Offending factor
        value: f32,
    },

    /// Animation name already registered
    #[error("animation '{0}' already exists")]
    DuplicateAnimation(String),

    /// Animation name not registered
    #[error("unknown animation '{0}'")]
    UnknownAnimation(String),

    /// The wildcard name cannot name an animation
    #[error("'{0}' is reserved")]
    ReservedName(String),

    /// Field already registered
    #[error("field '{0}' already exists")]
    DuplicateField(String),

    /// Field not registered
    #[error("unknown field '{0}'")]
    UnknownField(String),

    /// A wildcard transition cannot have a way back
    #[error("a transition from any state has no reverse")]
    WildcardTarget,
}
