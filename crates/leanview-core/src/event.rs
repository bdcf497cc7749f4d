#![forbid(unsafe_code)]

//! Canonical input event types.
//!
//! Hosts translate platform events (DOM `KeyboardEvent.key`, pointer events)
//! into these types before handing them to the runtime.

use bitflags::bitflags;

/// Logical key identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum KeyCode {
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    Enter,
    Tab,
    Escape,
    Backspace,
    /// Printable character. Space is `Char(' ')`.
    Char(char),
}

impl KeyCode {
    /// Map a DOM `KeyboardEvent.key` value.
    #[must_use]
    pub fn from_dom_key(key: &str) -> Option<Self> {
        let code = match key {
            "ArrowLeft" | "Left" => Self::Left,
            "ArrowRight" | "Right" => Self::Right,
            "ArrowUp" | "Up" => Self::Up,
            "ArrowDown" | "Down" => Self::Down,
            "Home" => Self::Home,
            "End" => Self::End,
            "Enter" => Self::Enter,
            "Tab" => Self::Tab,
            "Escape" | "Esc" => Self::Escape,
            "Backspace" => Self::Backspace,
            " " | "Spacebar" | "Space" => Self::Char(' '),
            other => {
                let mut chars = other.chars();
                match (chars.next(), chars.next()) {
                    (Some(ch), None) => Self::Char(ch),
                    _ => return None,
                }
            }
        };
        Some(code)
    }

    /// Enter or Space: the two "activate" keys.
    #[must_use]
    pub const fn is_activation(self) -> bool {
        matches!(self, Self::Enter | Self::Char(' '))
    }
}

bitflags! {
    /// Modifier keys held during an event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct Modifiers: u8 {
        const NONE = 0;
        const SHIFT = 1 << 0;
        const CTRL = 1 << 1;
        const ALT = 1 << 2;
        const META = 1 << 3;
    }
}

/// Press, auto-repeat or release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum KeyEventKind {
    #[default]
    Press,
    Repeat,
    Release,
}

/// A keyboard event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyEvent {
    pub code: KeyCode,
    pub modifiers: Modifiers,
    pub kind: KeyEventKind,
}

impl KeyEvent {
    /// A plain key press with no modifiers.
    #[must_use]
    pub const fn new(code: KeyCode) -> Self {
        Self {
            code,
            modifiers: Modifiers::NONE,
            kind: KeyEventKind::Press,
        }
    }

    #[must_use]
    pub const fn with_modifiers(mut self, modifiers: Modifiers) -> Self {
        self.modifiers = modifiers;
        self
    }

    #[must_use]
    pub const fn with_kind(mut self, kind: KeyEventKind) -> Self {
        self.kind = kind;
        self
    }

    /// Build from a DOM key name, e.g. `"ArrowRight"`.
    #[must_use]
    pub fn from_dom_key(key: &str) -> Option<Self> {
        KeyCode::from_dom_key(key).map(Self::new)
    }

    /// Release events never drive transitions.
    #[must_use]
    pub const fn is_actionable(&self) -> bool {
        !matches!(self.kind, KeyEventKind::Release)
    }
}

/// Pointer button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PointerButton {
    #[default]
    Primary,
    Secondary,
    Auxiliary,
}

/// Pointer phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PointerEventKind {
    Down,
    Up,
    #[default]
    Click,
}

/// A pointer event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct PointerEvent {
    pub kind: PointerEventKind,
    pub button: PointerButton,
}

impl PointerEvent {
    /// Primary-button click.
    #[must_use]
    pub const fn click() -> Self {
        Self {
            kind: PointerEventKind::Click,
            button: PointerButton::Primary,
        }
    }

    /// Only primary clicks activate controls.
    #[must_use]
    pub const fn is_activation(&self) -> bool {
        matches!(self.kind, PointerEventKind::Click) && matches!(self.button, PointerButton::Primary)
    }
}

/// Any input the runtime can route to a unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InputEvent {
    Key(KeyEvent),
    Pointer(PointerEvent),
}

impl InputEvent {
    /// True for Enter/Space presses and primary clicks.
    #[must_use]
    pub fn is_activation(&self) -> bool {
        match self {
            Self::Key(key) => key.is_actionable() && key.code.is_activation(),
            Self::Pointer(pointer) => pointer.is_activation(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dom_key_names_map() {
        assert_eq!(KeyCode::from_dom_key("ArrowLeft"), Some(KeyCode::Left));
        assert_eq!(KeyCode::from_dom_key(" "), Some(KeyCode::Char(' ')));
        assert_eq!(KeyCode::from_dom_key("x"), Some(KeyCode::Char('x')));
        assert_eq!(KeyCode::from_dom_key("F13"), None);
    }

    #[test]
    fn activation_requires_press_and_primary() {
        assert!(InputEvent::Key(KeyEvent::new(KeyCode::Enter)).is_activation());
        let released = KeyEvent::new(KeyCode::Enter).with_kind(KeyEventKind::Release);
        assert!(!InputEvent::Key(released).is_activation());
        let secondary = PointerEvent {
            kind: PointerEventKind::Click,
            button: PointerButton::Secondary,
        };
        assert!(!InputEvent::Pointer(secondary).is_activation());
        assert!(InputEvent::Pointer(PointerEvent::click()).is_activation());
    }
}
