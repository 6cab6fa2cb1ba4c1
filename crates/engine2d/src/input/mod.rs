//! Input translation
//!
//! Window backends push [`RawInput`] into the engine; the [`InputTranslator`]
//! turns it into keyboard and mouse events in scene space and keeps a polling
//! mirror of held keys and buttons. Polling only answers while a scene runs.

pub mod keys;

use std::collections::HashSet;

use log::trace;

pub use keys::{KeyCode, Modifiers, MouseButton, MouseButtons, ScrollDirection};

use crate::engine::{EngineError, System, SystemContext};
use crate::events::{Event, EventBus, EventData, EventKind};
use crate::foundation::math::Vector;
use crate::scene::Camera;

/// Device input as reported by a window backend.
///
/// Cursor coordinates are window pixels with the origin at the top-left
/// corner, the way most windowing libraries report them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RawInput {
    /// Key went down
    KeyPressed(KeyCode),
    /// Key went up
    KeyReleased(KeyCode),
    /// Cursor moved to `(x, y)`
    CursorMoved {
        /// Horizontal pixel
        x: f32,
        /// Vertical pixel, growing downward
        y: f32,
    },
    /// Mouse button went down
    ButtonPressed(MouseButton),
    /// Mouse button went up
    ButtonReleased(MouseButton),
    /// Wheel offsets; positive `dy` scrolls up
    Scroll {
        /// Horizontal offset
        dx: f32,
        /// Vertical offset
        dy: f32,
    },
    /// Cursor entered the window
    CursorEntered,
    /// Cursor left the window
    CursorLeft,
}

/// Converts raw device input into engine events
#[derive(Debug, Default)]
pub struct InputTranslator {
    enabled: bool,
    keys: HashSet<KeyCode>,
    modifiers: Modifiers,
    buttons: MouseButtons,
    cursor: Vector,
}

impl InputTranslator {
    /// Translator that stays silent until a scene starts
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `key` is held. Always `false` without a running scene.
    pub fn is_key_down(&self, key: KeyCode) -> bool {
        self.enabled && self.keys.contains(&key)
    }

    /// Whether `button` is held. Always `false` without a running scene.
    pub fn is_mouse_down(&self, button: MouseButton) -> bool {
        self.enabled && self.buttons.contains(button.flag())
    }

    /// Held modifier keys
    pub const fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    /// Last cursor position as a screen point, origin bottom-left
    pub const fn cursor(&self) -> Vector {
        self.cursor
    }

    /// Whether input is currently translated
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    fn clear(&mut self) {
        self.keys.clear();
        self.modifiers = Modifiers::empty();
        self.buttons = MouseButtons::empty();
    }

    /// Translate one raw input into engine events on `bus`. `camera` maps
    /// screen points into scene space.
    pub fn translate(&mut self, raw: RawInput, camera: &Camera, bus: &mut EventBus) {
        if !self.enabled {
            trace!("input ignored without a running scene: {raw:?}");
            return;
        }
        let data = match raw {
            RawInput::KeyPressed(key) => {
                self.keys.insert(key);
                self.modifiers |= key.modifier();
                EventData::KeyDown {
                    key,
                    modifiers: self.modifiers,
                }
            }
            RawInput::KeyReleased(key) => {
                self.keys.remove(&key);
                self.modifiers.remove(key.modifier());
                EventData::KeyUp {
                    key,
                    modifiers: self.modifiers,
                }
            }
            RawInput::CursorMoved { x, y } => {
                let screen = Vector::new(x, camera.resolution().y - y);
                let delta = screen - self.cursor;
                self.cursor = screen;
                let position = camera.screen_to_world(screen);
                if self.buttons.is_empty() {
                    EventData::MouseMotion {
                        position,
                        screen,
                        delta,
                    }
                } else {
                    EventData::MouseDrag {
                        buttons: self.buttons,
                        position,
                        screen,
                        delta,
                    }
                }
            }
            RawInput::ButtonPressed(button) => {
                self.buttons |= button.flag();
                EventData::MouseDown {
                    button,
                    position: camera.screen_to_world(self.cursor),
                    screen: self.cursor,
                }
            }
            RawInput::ButtonReleased(button) => {
                self.buttons.remove(button.flag());
                EventData::MouseUp {
                    button,
                    position: camera.screen_to_world(self.cursor),
                    screen: self.cursor,
                }
            }
            RawInput::Scroll { dx, dy } => {
                let direction = if dy.abs() >= dx.abs() {
                    if dy > 0.0 {
                        ScrollDirection::Up
                    } else {
                        ScrollDirection::Down
                    }
                } else if dx > 0.0 {
                    ScrollDirection::Right
                } else {
                    ScrollDirection::Left
                };
                EventData::MouseScroll {
                    direction,
                    position: camera.screen_to_world(self.cursor),
                }
            }
            RawInput::CursorEntered => EventData::MouseEnter { screen: self.cursor },
            RawInput::CursorLeft => EventData::MouseLeave { screen: self.cursor },
        };
        bus.dispatch(Event::new(data), false);
    }
}

impl System for InputTranslator {
    fn name(&self) -> &'static str {
        "InputTranslator"
    }

    fn subscriptions(&self) -> Vec<EventKind> {
        Vec::new()
    }

    fn on_event(&mut self, _ctx: &mut SystemContext<'_>, event: &Event) -> Result<(), EngineError> {
        match event.kind() {
            EventKind::SceneStarted | EventKind::SceneContinued => self.enabled = true,
            EventKind::SceneStopped | EventKind::ScenePaused => {
                self.enabled = false;
                self.clear();
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn started() -> (InputTranslator, Camera, EventBus) {
        let mut input = InputTranslator::new();
        input.enabled = true;
        (input, Camera::new(Vector::new(640.0, 640.0), 64.0), EventBus::new())
    }

    #[test]
    fn test_polling_requires_running_scene() {
        let mut input = InputTranslator::new();
        let camera = Camera::new(Vector::new(640.0, 640.0), 64.0);
        let mut bus = EventBus::new();
        input.translate(RawInput::KeyPressed(KeyCode::A), &camera, &mut bus);
        assert!(!input.is_key_down(KeyCode::A));
        bus.promote();
        assert!(bus.pop().is_none());
    }

    #[test]
    fn test_modifiers_accumulate() {
        let (mut input, camera, mut bus) = started();
        input.translate(RawInput::KeyPressed(KeyCode::Shift), &camera, &mut bus);
        input.translate(RawInput::KeyPressed(KeyCode::A), &camera, &mut bus);
        assert!(input.is_key_down(KeyCode::A));
        bus.promote();
        bus.pop();
        match bus.pop().map(|e| e.data) {
            Some(EventData::KeyDown { key, modifiers }) => {
                assert_eq!(key, KeyCode::A);
                assert_eq!(modifiers, Modifiers::SHIFT);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_cursor_is_flipped_into_scene_space() {
        let (mut input, camera, mut bus) = started();
        input.translate(RawInput::CursorMoved { x: 320.0, y: 0.0 }, &camera, &mut bus);
        bus.promote();
        match bus.pop().map(|e| e.data) {
            Some(EventData::MouseMotion { position, screen, .. }) => {
                assert_eq!(screen, Vector::new(320.0, 640.0));
                assert_eq!(position, Vector::new(0.0, 5.0));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_drag_carries_held_buttons() {
        let (mut input, camera, mut bus) = started();
        input.translate(RawInput::ButtonPressed(MouseButton::Left), &camera, &mut bus);
        assert!(input.is_mouse_down(MouseButton::Left));
        input.translate(RawInput::CursorMoved { x: 10.0, y: 10.0 }, &camera, &mut bus);
        bus.promote();
        let kinds: Vec<EventKind> = std::iter::from_fn(|| bus.pop()).map(|e| e.kind()).collect();
        assert_eq!(kinds, vec![EventKind::MouseDown, EventKind::MouseDrag]);
    }

    #[test]
    fn test_scene_stop_clears_state() {
        let (mut input, camera, mut bus) = started();
        input.translate(RawInput::KeyPressed(KeyCode::Space), &camera, &mut bus);
        input.enabled = false;
        input.clear();
        input.enabled = true;
        assert!(!input.is_key_down(KeyCode::Space));
    }
}
