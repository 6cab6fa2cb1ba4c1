//! UI elements held by a canvas

use std::fmt;

use crate::events::EventBus;
use crate::foundation::color::Color;
use crate::foundation::math::Vector;

/// Interaction state for visual feedback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ElementState {
    /// Resting
    #[default]
    Normal,
    /// Cursor over the element
    Hovered,
    /// Button held over the element
    Pressed,
}

/// Click handler. Handlers may raise events.
pub type ClickCallback = Box<dyn FnMut(&mut EventBus)>;

/// A rectangle on a canvas, positioned relative to the canvas center
pub struct UiElement {
    name: String,
    pub(crate) position: Vector,
    size: Vector,
    state: ElementState,
    visible: bool,
    enabled: bool,
    normal_color: Color,
    hover_color: Color,
    pressed_color: Color,
    on_click: Vec<ClickCallback>,
    clicks: u32,
}

impl UiElement {
    /// Element of `size` world units
    pub fn new(name: impl Into<String>, size: Vector) -> Self {
        Self {
            name: name.into(),
            position: Vector::zero(),
            size,
            state: ElementState::Normal,
            visible: true,
            enabled: true,
            normal_color: Color::GREY,
            hover_color: Color::LIGHT_GREY,
            pressed_color: Color::DARK_GREY,
            on_click: Vec::new(),
            clicks: 0,
        }
    }

    /// Builder adding a click handler
    #[must_use]
    pub fn on_click(mut self, callback: impl FnMut(&mut EventBus) + 'static) -> Self {
        self.on_click.push(Box::new(callback));
        self
    }

    /// Builder for the three state colors
    #[must_use]
    pub const fn with_colors(mut self, normal: Color, hover: Color, pressed: Color) -> Self {
        self.normal_color = normal;
        self.hover_color = hover;
        self.pressed_color = pressed;
        self
    }

    /// Element name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Offset from the canvas center
    pub const fn position(&self) -> Vector {
        self.position
    }

    /// Size in world units
    pub const fn size(&self) -> Vector {
        self.size
    }

    /// Current state
    pub const fn state(&self) -> ElementState {
        self.state
    }

    /// Color for the current state
    pub const fn color(&self) -> Color {
        match self.state {
            ElementState::Normal => self.normal_color,
            ElementState::Hovered => self.hover_color,
            ElementState::Pressed => self.pressed_color,
        }
    }

    /// Completed clicks so far
    pub const fn clicks(&self) -> u32 {
        self.clicks
    }

    /// Whether the element is shown
    pub const fn is_visible(&self) -> bool {
        self.visible
    }

    /// Show or hide
    pub fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
        if !visible {
            self.state = ElementState::Normal;
        }
    }

    /// Whether the element reacts to the cursor
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Enable or disable interaction
    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
        if !enabled {
            self.state = ElementState::Normal;
        }
    }

    pub(crate) const fn is_interactive(&self) -> bool {
        self.visible && self.enabled
    }

    pub(crate) fn set_hover(&mut self) {
        self.state = ElementState::Hovered;
    }

    pub(crate) fn set_pressed(&mut self) {
        self.state = ElementState::Pressed;
    }

    pub(crate) fn set_normal(&mut self) {
        self.state = ElementState::Normal;
    }

    pub(crate) fn click(&mut self, bus: &mut EventBus) {
        self.clicks += 1;
        for callback in &mut self.on_click {
            callback(bus);
        }
    }
}

impl fmt::Debug for UiElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UiElement")
            .field("name", &self.name)
            .field("position", &self.position)
            .field("size", &self.size)
            .field("state", &self.state)
            .field("callbacks", &self.on_click.len())
            .finish()
    }
}
