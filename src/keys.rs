//! Key-name mapping
//!
//! Translates macroquad's device key codes into the friendly lowercase
//! names user callbacks filter on: "a", "space", "up", "enter", and so on.
//! Codes with no sensible name (and the codes in [`SKIPPED_KEYS`]) never
//! reach user code.

use macroquad::prelude::KeyCode;

/// Key codes the input sampler ignores entirely.
pub const SKIPPED_KEYS: &[KeyCode] = &[KeyCode::Unknown];

/// The canonical name for a key code, if it has one.
pub fn key_name(code: KeyCode) -> Option<&'static str> {
    let name = match code {
        KeyCode::A => "a",
        KeyCode::B => "b",
        KeyCode::C => "c",
        KeyCode::D => "d",
        KeyCode::E => "e",
        KeyCode::F => "f",
        KeyCode::G => "g",
        KeyCode::H => "h",
        KeyCode::I => "i",
        KeyCode::J => "j",
        KeyCode::K => "k",
        KeyCode::L => "l",
        KeyCode::M => "m",
        KeyCode::N => "n",
        KeyCode::O => "o",
        KeyCode::P => "p",
        KeyCode::Q => "q",
        KeyCode::R => "r",
        KeyCode::S => "s",
        KeyCode::T => "t",
        KeyCode::U => "u",
        KeyCode::V => "v",
        KeyCode::W => "w",
        KeyCode::X => "x",
        KeyCode::Y => "y",
        KeyCode::Z => "z",
        KeyCode::Key0 => "0",
        KeyCode::Key1 => "1",
        KeyCode::Key2 => "2",
        KeyCode::Key3 => "3",
        KeyCode::Key4 => "4",
        KeyCode::Key5 => "5",
        KeyCode::Key6 => "6",
        KeyCode::Key7 => "7",
        KeyCode::Key8 => "8",
        KeyCode::Key9 => "9",
        KeyCode::Space => "space",
        KeyCode::Enter => "enter",
        KeyCode::Escape => "escape",
        KeyCode::Tab => "tab",
        KeyCode::Backspace => "backspace",
        KeyCode::Delete => "delete",
        KeyCode::Up => "up",
        KeyCode::Down => "down",
        KeyCode::Left => "left",
        KeyCode::Right => "right",
        KeyCode::Home => "home",
        KeyCode::End => "end",
        KeyCode::PageUp => "page up",
        KeyCode::PageDown => "page down",
        KeyCode::Insert => "insert",
        KeyCode::CapsLock => "caps lock",
        KeyCode::LeftShift | KeyCode::RightShift => "shift",
        KeyCode::LeftControl | KeyCode::RightControl => "control",
        KeyCode::LeftAlt | KeyCode::RightAlt => "alt",
        KeyCode::LeftSuper | KeyCode::RightSuper => "meta",
        KeyCode::Minus => "-",
        KeyCode::Equal => "=",
        KeyCode::LeftBracket => "[",
        KeyCode::RightBracket => "]",
        KeyCode::Backslash => "\\",
        KeyCode::Semicolon => ";",
        KeyCode::Apostrophe => "'",
        KeyCode::GraveAccent => "`",
        KeyCode::Comma => ",",
        KeyCode::Period => ".",
        KeyCode::Slash => "/",
        KeyCode::F1 => "f1",
        KeyCode::F2 => "f2",
        KeyCode::F3 => "f3",
        KeyCode::F4 => "f4",
        KeyCode::F5 => "f5",
        KeyCode::F6 => "f6",
        KeyCode::F7 => "f7",
        KeyCode::F8 => "f8",
        KeyCode::F9 => "f9",
        KeyCode::F10 => "f10",
        KeyCode::F11 => "f11",
        KeyCode::F12 => "f12",
        KeyCode::Kp0 => "0",
        KeyCode::Kp1 => "1",
        KeyCode::Kp2 => "2",
        KeyCode::Kp3 => "3",
        KeyCode::Kp4 => "4",
        KeyCode::Kp5 => "5",
        KeyCode::Kp6 => "6",
        KeyCode::Kp7 => "7",
        KeyCode::Kp8 => "8",
        KeyCode::Kp9 => "9",
        KeyCode::KpEnter => "enter",
        _ => return None,
    };
    Some(name)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_letter_and_special_names() {
        assert_eq!(key_name(KeyCode::A), Some("a"));
        assert_eq!(key_name(KeyCode::Space), Some("space"));
        assert_eq!(key_name(KeyCode::Up), Some("up"));
    }

    #[test]
    fn test_modifier_pairs_share_a_name() {
        assert_eq!(key_name(KeyCode::LeftShift), key_name(KeyCode::RightShift));
        assert_eq!(
            key_name(KeyCode::LeftControl),
            key_name(KeyCode::RightControl)
        );
    }

    #[test]
    fn test_unknown_has_no_name() {
        assert_eq!(key_name(KeyCode::Unknown), None);
        assert!(SKIPPED_KEYS.contains(&KeyCode::Unknown));
    }
}
