//! Key mapping for terminal input
//!
//! Converts key events to VT sequences for the child's pty input.

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};

/// Key encoder for converting key events to bytes
pub struct KeyEncoder;

impl KeyEncoder {
    /// Map a crossterm KeyEvent to the bytes the child should receive.
    ///
    /// Returns `None` for keys with no VT100 encoding.
    pub fn encode(event: &KeyEvent) -> Option<Vec<u8>> {
        match event.code {
            KeyCode::Char(ch) => Some(Self::encode_char(ch, event.modifiers)),
            KeyCode::Enter => Some(vec![0x0D]),
            KeyCode::Backspace => Some(vec![0x7F]),
            KeyCode::Tab => Some(vec![0x09]),
            KeyCode::Esc => Some(vec![0x1B]),
            KeyCode::Up => Some(b"\x1b[A".to_vec()),
            KeyCode::Down => Some(b"\x1b[B".to_vec()),
            KeyCode::Right => Some(b"\x1b[C".to_vec()),
            KeyCode::Left => Some(b"\x1b[D".to_vec()),
            KeyCode::Home => Some(b"\x1b[H".to_vec()),
            KeyCode::End => Some(b"\x1b[F".to_vec()),
            _ => None,
        }
    }

    /// Map a character with modifiers
    fn encode_char(ch: char, mods: KeyModifiers) -> Vec<u8> {
        // Ctrl + letter = control character
        if mods.contains(KeyModifiers::CONTROL) {
            if ch.is_ascii_lowercase() {
                return vec![(ch as u8) - b'a' + 1];
            } else if ch.is_ascii_uppercase() {
                return vec![(ch as u8) - b'A' + 1];
            }
            match ch {
                '@' | '`' | ' ' => return vec![0x00],
                '[' => return vec![0x1B],
                '\\' => return vec![0x1C],
                ']' => return vec![0x1D],
                '^' => return vec![0x1E],
                '_' | '/' => return vec![0x1F],
                _ => {}
            }
        }
        let mut buf = [0u8; 4];
        ch.encode_utf8(&mut buf).as_bytes().to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode) -> KeyEvent {
        KeyEvent::new(code, KeyModifiers::NONE)
    }

    #[test]
    fn plain_characters() {
        assert_eq!(KeyEncoder::encode(&key(KeyCode::Char('a'))), Some(vec![b'a']));
        assert_eq!(
            KeyEncoder::encode(&key(KeyCode::Char('é'))),
            Some("é".as_bytes().to_vec())
        );
    }

    #[test]
    fn control_letters() {
        let ctrl_c = KeyEvent::new(KeyCode::Char('c'), KeyModifiers::CONTROL);
        assert_eq!(KeyEncoder::encode(&ctrl_c), Some(vec![0x03]));
        let ctrl_d = KeyEvent::new(KeyCode::Char('D'), KeyModifiers::CONTROL);
        assert_eq!(KeyEncoder::encode(&ctrl_d), Some(vec![0x04]));
    }

    #[test]
    fn editing_keys() {
        assert_eq!(KeyEncoder::encode(&key(KeyCode::Enter)), Some(vec![0x0D]));
        assert_eq!(KeyEncoder::encode(&key(KeyCode::Backspace)), Some(vec![0x7F]));
        assert_eq!(KeyEncoder::encode(&key(KeyCode::Tab)), Some(vec![0x09]));
        assert_eq!(KeyEncoder::encode(&key(KeyCode::Esc)), Some(vec![0x1B]));
    }

    #[test]
    fn arrow_keys() {
        assert_eq!(
            KeyEncoder::encode(&key(KeyCode::Up)),
            Some(b"\x1b[A".to_vec())
        );
        assert_eq!(
            KeyEncoder::encode(&key(KeyCode::Left)),
            Some(b"\x1b[D".to_vec())
        );
    }

    #[test]
    fn unmapped_keys() {
        assert_eq!(KeyEncoder::encode(&key(KeyCode::CapsLock)), None);
    }
}
