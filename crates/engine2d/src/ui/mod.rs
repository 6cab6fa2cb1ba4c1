//! User interface
//!
//! A [`Canvas`] is a component living on the topmost layer that holds
//! [`UiElement`]s in its own spatial hash. The [`UiManager`] system turns
//! cursor events into hover and click zones on the canvases under the
//! cursor, and resets the touched elements on the following event.

mod canvas;
mod element;
mod manager;

pub use canvas::{Canvas, CanvasEvent, DEFAULT_CANVAS_SIZE};
pub use element::{ClickCallback, ElementState, UiElement};
pub use manager::{UiManager, SEARCH_SIZE};
