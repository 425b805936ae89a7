//! Input module - host-facing event types and per-frame button state
//!
//! Events arrive from the host in whatever batching its message loop uses;
//! the context accumulates them between frames and hands the result to the
//! UI core at `new_frame`. Only the mouse feed is supported: keyboard
//! routing through this table is explicitly unimplemented (hosts that need
//! it drive the UI core's key map directly).

use bitflags::bitflags;

use crate::core::Float2;

/// Host key enumeration, translated into the UI core's key slots when a
/// context is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum KeyValue {
    Tab,
    Left,
    Right,
    Up,
    Down,
    PageUp,
    PageDown,
    Home,
    End,
    Delete,
    Backspace,
    Enter,
    Escape,
    Space,
    A,
    C,
    V,
    X,
    Y,
    Z,
}

impl KeyValue {
    pub const COUNT: usize = 20;

    pub const ALL: [KeyValue; Self::COUNT] = [
        KeyValue::Tab,
        KeyValue::Left,
        KeyValue::Right,
        KeyValue::Up,
        KeyValue::Down,
        KeyValue::PageUp,
        KeyValue::PageDown,
        KeyValue::Home,
        KeyValue::End,
        KeyValue::Delete,
        KeyValue::Backspace,
        KeyValue::Enter,
        KeyValue::Escape,
        KeyValue::Space,
        KeyValue::A,
        KeyValue::C,
        KeyValue::V,
        KeyValue::X,
        KeyValue::Y,
        KeyValue::Z,
    ];
}

bitflags! {
    /// Modifier state carried alongside key and mouse events.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct KeyModifiers: u32 {
        const CTRL  = 1 << 0;
        const SHIFT = 1 << 1;
        const ALT   = 1 << 2;
        const SUPER = 1 << 3;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    Down,
    Up,
    Char(char),
}

#[derive(Debug, Clone, Copy)]
pub struct KeyboardEvent {
    pub key: KeyValue,
    pub kind: KeyEventKind,
    pub modifiers: KeyModifiers,
}

/// Mouse buttons tracked per frame, in slot order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MouseButton {
    Left = 0,
    Right = 1,
    Middle = 2,
}

pub const MOUSE_BUTTON_COUNT: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MouseEventKind {
    ButtonDown(MouseButton),
    ButtonUp(MouseButton),
    /// Absolute cursor position in `coords`.
    Move,
    /// Wheel delta in `coords` (x = horizontal, y = vertical).
    Scroll,
}

#[derive(Debug, Clone, Copy)]
pub struct MouseEvent {
    pub kind: MouseEventKind,
    pub coords: Float2,
    pub modifiers: KeyModifiers,
}

impl MouseEvent {
    pub fn button_down(button: MouseButton) -> Self {
        Self {
            kind: MouseEventKind::ButtonDown(button),
            coords: Float2::default(),
            modifiers: KeyModifiers::empty(),
        }
    }

    pub fn button_up(button: MouseButton) -> Self {
        Self {
            kind: MouseEventKind::ButtonUp(button),
            coords: Float2::default(),
            modifiers: KeyModifiers::empty(),
        }
    }

    pub fn moved(x: f32, y: f32) -> Self {
        Self {
            kind: MouseEventKind::Move,
            coords: Float2::new(x, y),
            modifiers: KeyModifiers::empty(),
        }
    }

    pub fn scroll(dx: f32, dy: f32) -> Self {
        Self {
            kind: MouseEventKind::Scroll,
            coords: Float2::new(dx, dy),
            modifiers: KeyModifiers::empty(),
        }
    }
}

/// Per-frame state of one mouse button.
///
/// `pressed`/`released` are edge flags written by the event feed and consumed
/// by the UI core at the next `new_frame`; `down` is level state that persists
/// until the opposing edge arrives.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ButtonState {
    pub pressed: bool,
    pub released: bool,
    pub down: bool,
}

impl ButtonState {
    /// Clear the edge flags once the frame has consumed them.
    pub fn clear_edges(&mut self) {
        self.pressed = false;
        self.released = false;
    }
}
