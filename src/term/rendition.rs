//! Graphic rendition state
//!
//! Accumulates SGR parameters into the attribute value stamped onto cells.

use bitflags::bitflags;

/// Default foreground palette index.
pub const DEFAULT_FG: u8 = 7;
/// Default background palette index.
pub const DEFAULT_BG: u8 = 0;

bitflags! {
    /// Text style attributes
    #[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
    pub struct StyleFlags: u8 {
        const ITALIC    = 0b001;
        const UNDERLINE = 0b010;
        const BLINK     = 0b100;
    }
}

/// A bundle of display attributes for one cell.
///
/// Cells store the value that was current when they were written; the parser
/// keeps mutating its own accumulator without affecting already-written cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Rendition {
    /// Intensity counter; bold increments, faint decrements, 22 resets to 0.
    pub intensity: i8,
    pub styles: StyleFlags,
    /// Foreground palette index (0-7).
    pub fg: u8,
    /// Background palette index (0-7).
    pub bg: u8,
    /// Font index; 0 is the primary font, 1-9 the alternates.
    pub font: u8,
}

impl Default for Rendition {
    fn default() -> Self {
        Self {
            intensity: 0,
            styles: StyleFlags::empty(),
            fg: DEFAULT_FG,
            bg: DEFAULT_BG,
            font: 0,
        }
    }
}

impl Rendition {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn swap_colors(&mut self) {
        std::mem::swap(&mut self.fg, &mut self.bg);
    }

    /// Apply a semicolon-separated SGR parameter list, left to right.
    ///
    /// An empty list is treated as a single `0` (full reset). Codes that do
    /// not parse or are not supported are logged and skipped; processing
    /// continues with the rest of the list.
    pub fn apply_sgr(&mut self, params: &str) {
        if params.is_empty() {
            self.reset();
            return;
        }

        for code in params.split(';') {
            let code: u16 = match code.parse() {
                Ok(n) => n,
                Err(_) => {
                    tracing::debug!(code, "malformed SGR parameter");
                    continue;
                }
            };

            match code {
                0 => self.reset(),
                1 => self.intensity = self.intensity.saturating_add(1),
                2 => self.intensity = self.intensity.saturating_sub(1),
                3 => self.styles |= StyleFlags::ITALIC,
                4 => self.styles |= StyleFlags::UNDERLINE,
                5 | 6 => self.styles |= StyleFlags::BLINK,
                7 => self.swap_colors(),
                10..=19 => self.font = (code - 10) as u8,
                22 => self.intensity = 0,
                23 => self.styles &= !StyleFlags::ITALIC,
                24 => self.styles &= !StyleFlags::UNDERLINE,
                25 => self.styles &= !StyleFlags::BLINK,
                30..=37 => self.fg = (code - 30) as u8,
                39 => self.fg = DEFAULT_FG,
                40..=47 => self.bg = (code - 40) as u8,
                49 => self.bg = DEFAULT_BG,
                _ => {
                    tracing::debug!(code, "unsupported SGR parameter");
                }
            }
        }
    }
}
