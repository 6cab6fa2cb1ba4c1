//! Key codes, mouse buttons and modifier sets

use bitflags::bitflags;

/// Key codes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    /// A key
    A,
    /// B key
    B,
    /// C key
    C,
    /// D key
    D,
    /// E key
    E,
    /// F key
    F,
    /// G key
    G,
    /// H key
    H,
    /// I key
    I,
    /// J key
    J,
    /// K key
    K,
    /// L key
    L,
    /// M key
    M,
    /// N key
    N,
    /// O key
    O,
    /// P key
    P,
    /// Q key
    Q,
    /// R key
    R,
    /// S key
    S,
    /// T key
    T,
    /// U key
    U,
    /// V key
    V,
    /// W key
    W,
    /// X key
    X,
    /// Y key
    Y,
    /// Z key
    Z,
    /// Digit row 0..9
    Digit(u8),
    /// Function keys F1..F12
    Function(u8),
    /// Space key
    Space,
    /// Enter key
    Enter,
    /// Escape key
    Escape,
    /// Tab key
    Tab,
    /// Backspace key
    Backspace,
    /// Delete key
    Delete,
    /// Left or right shift
    Shift,
    /// Left or right control
    Control,
    /// Left or right alt
    Alt,
    /// Up arrow
    Up,
    /// Down arrow
    Down,
    /// Left arrow
    Left,
    /// Right arrow
    Right,
}

impl KeyCode {
    /// Modifier bit this key sets while held, if any
    pub const fn modifier(self) -> Modifiers {
        match self {
            Self::Shift => Modifiers::SHIFT,
            Self::Control => Modifiers::CTRL,
            Self::Alt => Modifiers::ALT,
            _ => Modifiers::empty(),
        }
    }
}

/// Mouse buttons
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    /// Left mouse button
    Left,
    /// Right mouse button
    Right,
    /// Middle mouse button
    Middle,
}

impl MouseButton {
    /// Bit of this button in a [`MouseButtons`] set
    pub const fn flag(self) -> MouseButtons {
        match self {
            Self::Left => MouseButtons::LEFT,
            Self::Right => MouseButtons::RIGHT,
            Self::Middle => MouseButtons::MIDDLE,
        }
    }
}

/// Wheel direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ScrollDirection {
    /// Away from the user
    Up,
    /// Towards the user
    Down,
    /// Tilt left
    Left,
    /// Tilt right
    Right,
}

bitflags! {
    /// Held keyboard modifiers
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        /// Shift
        const SHIFT = 0b0001;
        /// Control
        const CTRL = 0b0010;
        /// Alt
        const ALT = 0b0100;
        /// Super / command
        const LOGO = 0b1000;
    }
}

bitflags! {
    /// Held mouse buttons
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MouseButtons: u8 {
        /// Left button
        const LEFT = 0b001;
        /// Right button
        const RIGHT = 0b010;
        /// Middle button
        const MIDDLE = 0b100;
    }
}
