use std::borrow::Cow;
use std::fmt;

/// A non-printable byte together with the key combinations that produce it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ControlCode {
    name: &'static str,
    keys: &'static [&'static str],
}

impl ControlCode {
    pub(crate) const UNDEFINED_KEYS: &'static [&'static str] = &["Undefined"];

    /// Build a control code. An empty `keys` list is replaced by `["Undefined"]`.
    pub fn new(name: &'static str, keys: &'static [&'static str]) -> Self {
        let keys = if keys.is_empty() {
            Self::UNDEFINED_KEYS
        } else {
            keys
        };
        Self { name, keys }
    }

    /// Symbolic identifier, e.g. `"ESC"` or `"TAB"`.
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Human-readable key combinations, e.g. `["Ctrl-i", "Tab"]`. Never empty.
    pub fn keys(&self) -> &'static [&'static str] {
        self.keys
    }
}

/// One decoded key press.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum KeyEvent {
    /// A printable Unicode character.
    Char(char),
    /// A named key or combination: a terminal sequence such as `"ArrowUp"`, or `"Alt-x"`.
    Key(Cow<'static, str>),
    /// A control code such as Ctrl-letter, Tab or a bare Escape.
    Control(ControlCode),
}

impl KeyEvent {
    pub fn key(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Key(name.into())
    }

    pub(crate) fn alt(ch: char) -> Self {
        Self::Key(Cow::Owned(format!("Alt-{ch}")))
    }

    pub fn as_char(&self) -> Option<char> {
        match self {
            Self::Char(ch) => Some(*ch),
            _ => None,
        }
    }

    pub fn as_control(&self) -> Option<&ControlCode> {
        match self {
            Self::Control(code) => Some(code),
            _ => None,
        }
    }

    pub fn is_control(&self, name: &str) -> bool {
        matches!(self, Self::Control(code) if code.name() == name)
    }

    /// Whether the event is what a user would type as `key`: the literal
    /// character, the key name, or a control code's name or one of its key
    /// combinations (`"Ctrl-c"`, `"ETX"`).
    pub fn matches(&self, key: &str) -> bool {
        match self {
            Self::Char(ch) => {
                let mut buf = [0u8; 4];
                &*ch.encode_utf8(&mut buf) == key
            }
            Self::Key(name) => name == key,
            Self::Control(code) => code.name() == key || code.keys().iter().any(|k| *k == key),
        }
    }
}

impl From<char> for KeyEvent {
    fn from(ch: char) -> Self {
        Self::Char(ch)
    }
}

impl From<ControlCode> for KeyEvent {
    fn from(code: ControlCode) -> Self {
        Self::Control(code)
    }
}

impl fmt::Display for KeyEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Char(ch) => write!(f, "{ch}"),
            Self::Key(name) => f.write_str(name),
            Self::Control(code) => f.write_str(&code.keys().join(" or ")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_keys_become_undefined() {
        let code = ControlCode::new("SO", &[]);
        assert_eq!(code.keys(), &["Undefined"]);
    }

    #[test]
    fn display_joins_key_combinations() {
        let tab = KeyEvent::Control(ControlCode::new("TAB", &["Ctrl-i", "Tab"]));
        assert_eq!(tab.to_string(), "Ctrl-i or Tab");
        assert_eq!(KeyEvent::Char('é').to_string(), "é");
        assert_eq!(KeyEvent::key("ArrowUp").to_string(), "ArrowUp");
        assert_eq!(KeyEvent::alt('A').to_string(), "Alt-A");
    }

    #[test]
    fn matches_by_char_name_or_combination() {
        assert!(KeyEvent::Char('q').matches("q"));
        assert!(!KeyEvent::Char('q').matches("Q"));
        assert!(KeyEvent::alt('q').matches("Alt-q"));

        let etx = KeyEvent::Control(ControlCode::new("ETX", &["Ctrl-c"]));
        assert!(etx.matches("ETX"));
        assert!(etx.matches("Ctrl-c"));
        assert!(!etx.matches("c"));
        assert!(etx.is_control("ETX"));
    }
}
