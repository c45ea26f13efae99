//! Input events delivered by the host.
//!
//! The host translates whatever its platform reports into these types. The
//! state machine never sees raw DOM events.

use bitflags::bitflags;

use crate::error::MediaLoadError;
use crate::page::{ElementId, Point, Size};

use super::keys::Key;

bitflags! {
    /// Modifier keys held during an event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const NONE  = 0;
        const SHIFT = 1 << 0;
        const CTRL  = 1 << 1;
        const ALT   = 1 << 2;
        const META  = 1 << 3;
    }
}

bitflags! {
    /// Mouse buttons held during an event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Buttons: u8 {
        const LEFT   = 1 << 0;
        const RIGHT  = 1 << 1;
        const MIDDLE = 1 << 2;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Middle,
    Right,
}

/// What the pointer is over.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HitTarget {
    Page(ElementId),
    /// The popup itself (media box, caption or indicator).
    Popup,
    /// Outside the document, e.g. the pointer left the window.
    Outside,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PointerEvent {
    /// Viewport coordinates.
    pub at: Point,
    pub target: HitTarget,
    pub modifiers: Modifiers,
    pub buttons: Buttons,
}

impl PointerEvent {
    pub fn new(at: Point, target: HitTarget) -> Self {
        PointerEvent { at, target, modifiers: Modifiers::NONE, buttons: Buttons::empty() }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn with_buttons(mut self, buttons: Buttons) -> Self {
        self.buttons = buttons;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub key: Key,
    pub modifiers: Modifiers,
    /// Auto-repeat of a held key.
    pub repeat: bool,
}

impl KeyEvent {
    pub fn new(key: &str) -> Self {
        KeyEvent { key: Key::new(key), modifiers: Modifiers::NONE, repeat: false }
    }

    pub fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    pub fn shift(&self) -> bool {
        self.modifiers.contains(Modifiers::SHIFT)
    }

    pub fn ctrl(&self) -> bool {
        self.modifiers.contains(Modifiers::CTRL)
    }
}

/// Progress of the media the surface is loading.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaEvent {
    /// Dimensions are known; the media can be shown.
    Ready,
    Failed(MediaLoadError),
}

#[derive(Debug, Clone, PartialEq)]
pub enum InputEvent {
    PointerOver(PointerEvent),
    PointerMove(PointerEvent),
    /// The pointer left the document.
    PointerLeave(PointerEvent),
    PointerDown(PointerEvent, MouseButton),
    PointerUp(PointerEvent, MouseButton),
    ContextMenu(PointerEvent),
    Wheel { pointer: PointerEvent, delta_x: f64, delta_y: f64 },
    KeyDown(KeyEvent),
    KeyUp(KeyEvent),
    Resize(Size),
    VisibilityChange { hidden: bool },
    AttributeChanged { element: ElementId, name: String },
    Media(MediaEvent),
}

/// Whether the host should suppress the platform's default handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum EventDisposition {
    #[default]
    Pass,
    Consume,
}

impl EventDisposition {
    pub fn consumed(self) -> bool {
        self == EventDisposition::Consume
    }
}
