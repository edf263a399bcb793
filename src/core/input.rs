//! Key decoding for the input session.
//!
//! Only legacy (xterm/VT) encodings are decoded; the session never enables the kitty
//! keyboard protocol.

/// A decoded key press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Char(char),
    Enter,
    Backspace,
    Delete,
    Left,
    Right,
    Up,
    Down,
    Home,
    End,
    Tab,
    Escape,
    /// Control chord with a lower-case ASCII letter.
    Ctrl(char),
    Unknown,
}

impl Key {
    /// Whether the key edits buffer content, as opposed to submitting or cancelling.
    #[must_use]
    pub fn is_content(self) -> bool {
        match self {
            Key::Char(_) | Key::Enter | Key::Backspace | Key::Delete | Key::Tab => true,
            Key::Ctrl(letter) => !matches!(letter, 'c' | 'd' | 's'),
            Key::Left | Key::Right | Key::Up | Key::Down | Key::Home | Key::End => true,
            Key::Escape | Key::Unknown => false,
        }
    }
}

const LEGACY_UP: [&str; 2] = ["\x1b[A", "\x1bOA"];
const LEGACY_DOWN: [&str; 2] = ["\x1b[B", "\x1bOB"];
const LEGACY_RIGHT: [&str; 2] = ["\x1b[C", "\x1bOC"];
const LEGACY_LEFT: [&str; 2] = ["\x1b[D", "\x1bOD"];
const LEGACY_HOME: [&str; 4] = ["\x1b[H", "\x1bOH", "\x1b[1~", "\x1b[7~"];
const LEGACY_END: [&str; 4] = ["\x1b[F", "\x1bOF", "\x1b[4~", "\x1b[8~"];
const LEGACY_DELETE: [&str; 1] = ["\x1b[3~"];

/// Decodes one unit produced by [`crate::platform::input_buffer::InputBuffer`].
#[must_use]
pub fn parse_key(data: &str) -> Key {
    let mut chars = data.chars();
    let (Some(first), rest) = (chars.next(), chars.as_str()) else {
        return Key::Unknown;
    };

    if rest.is_empty() {
        return match first {
            '\r' | '\n' => Key::Enter,
            '\t' => Key::Tab,
            '\x1b' => Key::Escape,
            '\x7f' | '\x08' => Key::Backspace,
            ch @ '\x01'..='\x1a' => Key::Ctrl((b'a' + (ch as u8 - 1)) as char),
            ch if ch.is_control() => Key::Unknown,
            ch => Key::Char(ch),
        };
    }

    if LEGACY_UP.contains(&data) {
        Key::Up
    } else if LEGACY_DOWN.contains(&data) {
        Key::Down
    } else if LEGACY_RIGHT.contains(&data) {
        Key::Right
    } else if LEGACY_LEFT.contains(&data) {
        Key::Left
    } else if LEGACY_HOME.contains(&data) {
        Key::Home
    } else if LEGACY_END.contains(&data) {
        Key::End
    } else if LEGACY_DELETE.contains(&data) {
        Key::Delete
    } else if data == "\x1b\x7f" {
        Key::Backspace
    } else {
        Key::Unknown
    }
}
