use std::fmt;

/// A key name as used in the `keys` configuration block.
///
/// Letters and digits are upper-cased single characters, special keys use
/// short names (`Esc`, `Tab`, `Enter`, `Space`, `Left`, `PgDn`, ...), and
/// modifiers are lower-case (`ctrl`, `shift`, `alt`, `meta`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Key(String);

impl Key {
    pub const ESC: &'static str = "Esc";
    pub const TAB: &'static str = "Tab";
    pub const ENTER: &'static str = "Enter";
    pub const SPACE: &'static str = "Space";

    /// Normalizes a DOM `KeyboardEvent.key` value (or an already short name).
    pub fn new(name: &str) -> Key {
        let short = match name {
            "Escape" | "Esc" => "Esc",
            "Control" | "ctrl" => "ctrl",
            "Shift" | "shift" => "shift",
            "Alt" | "alt" => "alt",
            "Meta" | "OS" | "meta" => "meta",
            " " | "Spacebar" | "Space" => "Space",
            "ArrowLeft" | "Left" => "Left",
            "ArrowRight" | "Right" => "Right",
            "ArrowUp" | "Up" => "Up",
            "ArrowDown" | "Down" => "Down",
            "PageUp" | "PgUp" => "PgUp",
            "PageDown" | "PgDn" => "PgDn",
            "Backspace" | "BS" => "BS",
            "Delete" | "Del" => "Del",
            "Insert" | "Ins" => "Ins",
            other => return Key(Self::fold(other)),
        };
        Key(short.to_string())
    }

    fn fold(name: &str) -> String {
        let mut chars = name.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => c.to_uppercase().collect(),
            _ => name.to_string(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_modifier(&self) -> bool {
        matches!(self.0.as_str(), "ctrl" | "shift" | "alt" | "meta")
    }

    pub fn is(&self, name: &str) -> bool {
        self.0 == name
    }
}

impl From<&str> for Key {
    fn from(name: &str) -> Self {
        Key::new(name)
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
