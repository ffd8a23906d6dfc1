//! Escape sequence parser
//!
//! Classifies pty output bytes and drives the screen buffer. Input arrives in
//! arbitrary chunks; a sequence cut off at the end of one chunk is stashed and
//! prepended to the next, so any split of a byte stream produces the same
//! final screen state.

use super::rendition::Rendition;
use super::screen::ScreenBuffer;
use super::TermEvents;

const NUL: u8 = 0x00;
const BEL: u8 = 0x07;
const BS: u8 = 0x08;
const HT: u8 = 0x09;
const LF: u8 = 0x0A;
const VT: u8 = 0x0B;
const FF: u8 = 0x0C;
const CR: u8 = 0x0D;
const XON: u8 = 0x11;
const XOFF: u8 = 0x13;
const ESC: u8 = 0x1B;

/// Parser state carried between `process` calls.
pub struct EscapeParser {
    /// Unconsumed tail of the previous chunk (at most one partial sequence).
    pending: Vec<u8>,
    /// Attribute accumulator stamped onto printed cells.
    rendition: Rendition,
    /// Set by XOFF; everything but XON is dropped until XON clears it.
    ignore_input: bool,
}

impl Default for EscapeParser {
    fn default() -> Self {
        Self::new()
    }
}

impl EscapeParser {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            rendition: Rendition::default(),
            ignore_input: false,
        }
    }

    /// The rendition that will be applied to the next printed character.
    pub fn rendition(&self) -> Rendition {
        self.rendition
    }

    /// Fully drain a chunk of pty output into the screen.
    ///
    /// Lines-updated and cursor-moved fire once at the end of every call;
    /// scrolling fires its own notifications as it happens.
    pub fn process(&mut self, input: &[u8], screen: &mut ScreenBuffer, events: &mut dyn TermEvents) {
        let owned;
        let data: &[u8] = if self.pending.is_empty() {
            input
        } else {
            let mut carried = std::mem::take(&mut self.pending);
            carried.extend_from_slice(input);
            owned = carried;
            &owned
        };

        let mut i = 0;
        while i < data.len() {
            let byte = data[i];

            if self.ignore_input && byte != XON {
                i += 1;
                continue;
            }

            match byte {
                NUL | BEL => i += 1,
                BS => {
                    screen.backspace();
                    i += 1;
                }
                HT => {
                    screen.tab();
                    i += 1;
                }
                LF | VT | FF => {
                    screen.newline(events);
                    i += 1;
                }
                CR => {
                    screen.carriage_return();
                    i += 1;
                }
                XON => {
                    self.ignore_input = false;
                    i += 1;
                }
                XOFF => {
                    self.ignore_input = true;
                    i += 1;
                }
                ESC => i = self.handle_escape(data, i, screen, events),
                _ => i = self.put_printable(data, i, screen, events),
            }
        }

        events.lines_updated();
        events.cursor_moved();
    }

    /// Handle the byte after ESC; `esc` indexes the ESC itself.
    /// Returns the index to continue scanning from.
    fn handle_escape(
        &mut self,
        data: &[u8],
        esc: usize,
        screen: &mut ScreenBuffer,
        events: &mut dyn TermEvents,
    ) -> usize {
        let Some(&intro) = data.get(esc + 1) else {
            self.pending = data[esc..].to_vec();
            return data.len();
        };

        match intro {
            b'[' => self.parse_csi(data, esc, screen, events),
            b']' => self.parse_osc(data, esc, events),
            // unknown introducer: drop the ESC and reprocess the next byte
            _ => esc + 1,
        }
    }

    /// Collect a control sequence starting at `ESC [`.
    ///
    /// Bytes 0x20-0x3F accumulate as parameter text; the first byte in
    /// 0x40-0x7D is the final byte. Running out of input stashes the prefix
    /// for the next chunk.
    fn parse_csi(
        &mut self,
        data: &[u8],
        esc: usize,
        screen: &mut ScreenBuffer,
        events: &mut dyn TermEvents,
    ) -> usize {
        let mut params = String::new();
        let mut i = esc + 2;

        while i < data.len() {
            let byte = data[i];
            if (0x20..=0x3F).contains(&byte) {
                params.push(byte as char);
            } else if (0x40..=0x7D).contains(&byte) {
                self.dispatch_csi(byte, &params, screen, events);
                return i + 1;
            } else {
                tracing::warn!(byte, "unexpected byte inside control sequence");
            }
            i += 1;
        }

        self.pending.clear();
        self.pending.extend_from_slice(b"\x1b[");
        self.pending.extend_from_slice(params.as_bytes());
        data.len()
    }

    /// Handle an operating-system-command string starting at `ESC ]`.
    ///
    /// Only the `0;titleBEL` form is meaningful; other forms are consumed
    /// through the bell and dropped.
    fn parse_osc(&mut self, data: &[u8], esc: usize, events: &mut dyn TermEvents) -> usize {
        if data.len() < esc + 4 {
            self.pending = data[esc..].to_vec();
            return data.len();
        }

        if data[esc + 2] == b'0' && data[esc + 3] == b';' {
            let start = esc + 4;
            match data[start..].iter().position(|&b| b == BEL) {
                Some(offset) => {
                    let title = String::from_utf8_lossy(&data[start..start + offset]);
                    events.title_changed(&title);
                    start + offset + 1
                }
                None => {
                    self.pending = data[esc..].to_vec();
                    data.len()
                }
            }
        } else {
            match data[esc + 2..].iter().position(|&b| b == BEL) {
                Some(offset) => esc + 2 + offset + 1,
                None => {
                    self.pending = data[esc..].to_vec();
                    data.len()
                }
            }
        }
    }

    fn dispatch_csi(
        &mut self,
        final_byte: u8,
        params: &str,
        screen: &mut ScreenBuffer,
        events: &mut dyn TermEvents,
    ) {
        match final_byte {
            b'A' => {
                if let Some(n) = count_param(params, final_byte) {
                    screen.cursor_up(n);
                }
            }
            b'B' => {
                if let Some(n) = count_param(params, final_byte) {
                    screen.cursor_down(n);
                }
            }
            b'C' => {
                if let Some(n) = count_param(params, final_byte) {
                    screen.cursor_forward(n);
                }
            }
            b'D' => {
                if let Some(n) = count_param(params, final_byte) {
                    screen.cursor_back(n);
                }
            }
            b'G' => self.cha(params, screen),
            b'H' => self.cup(params, screen),
            b'J' => self.erase_display(params, screen),
            b'K' => self.erase_line(params, screen),
            b'd' => self.vpa(params, screen),
            b'm' => self.rendition.apply_sgr(params),
            _ => {
                let mut raw = params.to_string();
                raw.push(final_byte as char);
                tracing::debug!(sequence = %raw, "unhandled escape sequence");
                events.unhandled_sequence(&raw);
            }
        }
    }

    /// Cursor horizontal absolute: 1-based column, row unchanged.
    fn cha(&self, params: &str, screen: &mut ScreenBuffer) {
        if params.is_empty() {
            tracing::warn!("CHA without parameter");
            return;
        }
        let Ok(col) = params.parse::<i64>() else {
            tracing::warn!(params, "CHA with malformed parameter");
            return;
        };
        let col = col - 1;
        if col >= 0 && (col as usize) < screen.cols() {
            let (row, _) = screen.cursor();
            screen.set_cursor(row, col as usize);
        } else {
            tracing::warn!(col, "CHA column out of bounds");
        }
    }

    /// Cursor position: no parameters means the top-left corner; otherwise
    /// exactly two 1-based values, clamped into bounds.
    fn cup(&self, params: &str, screen: &mut ScreenBuffer) {
        if params.is_empty() {
            screen.set_cursor(0, 0);
            return;
        }

        let values: Vec<&str> = params.split(';').collect();
        if values.len() != 2 {
            tracing::warn!(params, "CUP with invalid parameter count");
            return;
        }
        let (Ok(row), Ok(col)) = (values[0].parse::<i64>(), values[1].parse::<i64>()) else {
            tracing::warn!(params, "CUP with malformed parameters");
            return;
        };

        let row = (row - 1).max(0) as usize;
        let col = (col - 1).max(0) as usize;
        screen.set_cursor(row, col);
    }

    /// Line position absolute: 1-based row, column unchanged.
    fn vpa(&self, params: &str, screen: &mut ScreenBuffer) {
        if params.is_empty() {
            tracing::warn!("VPA without parameter");
            return;
        }
        let Ok(row) = params.parse::<i64>() else {
            tracing::warn!(params, "VPA with malformed parameter");
            return;
        };
        let row = row - 1;
        if row >= 0 && (row as usize) < screen.rows() {
            let (_, col) = screen.cursor();
            screen.set_cursor(row as usize, col);
        } else {
            tracing::warn!(row, "VPA row out of bounds");
        }
    }

    fn erase_display(&self, params: &str, screen: &mut ScreenBuffer) {
        let Some(mode) = erase_param(params) else {
            tracing::warn!(params, "ED with malformed parameter");
            return;
        };
        let (row, col) = screen.cursor();
        let (rows, cols) = screen.size();
        match mode {
            0 => screen.clear_rect(row, col, rows - 1, cols - 1),
            1 => screen.clear_rect(0, 0, row, col),
            2 => screen.clear_rect(0, 0, rows - 1, cols - 1),
            _ => tracing::warn!(mode, "ED with invalid parameter"),
        }
    }

    fn erase_line(&self, params: &str, screen: &mut ScreenBuffer) {
        let Some(mode) = erase_param(params) else {
            tracing::warn!(params, "EL with malformed parameter");
            return;
        };
        let (row, col) = screen.cursor();
        let cols = screen.cols();
        match mode {
            0 => screen.clear_rect(row, col, row, cols - 1),
            1 => screen.clear_rect(row, 0, row, col),
            2 => screen.clear_rect(row, 0, row, cols - 1),
            _ => tracing::warn!(mode, "EL with invalid parameter"),
        }
    }

    /// Write a printable byte or a complete UTF-8 sequence at the cursor.
    fn put_printable(
        &mut self,
        data: &[u8],
        i: usize,
        screen: &mut ScreenBuffer,
        events: &mut dyn TermEvents,
    ) -> usize {
        let byte = data[i];
        if byte < 0x80 {
            screen.write_at_cursor(byte as char, self.rendition, events);
            return i + 1;
        }

        let len = if byte & 0xE0 == 0xC0 {
            2
        } else if byte & 0xF0 == 0xE0 {
            3
        } else if byte & 0xF8 == 0xF0 {
            4
        } else {
            // stray continuation byte
            return i + 1;
        };

        if i + len > data.len() {
            self.pending = data[i..].to_vec();
            return data.len();
        }

        match std::str::from_utf8(&data[i..i + len]) {
            Ok(s) => {
                for ch in s.chars() {
                    screen.write_at_cursor(ch, self.rendition, events);
                }
                i + len
            }
            Err(_) => i + 1,
        }
    }
}

/// Parse an optional repeat count; empty means 1, malformed rejects.
fn count_param(params: &str, final_byte: u8) -> Option<usize> {
    if params.is_empty() {
        return Some(1);
    }
    match params.parse() {
        Ok(n) => Some(n),
        Err(_) => {
            tracing::warn!(params, final_byte, "cursor move with malformed parameter");
            None
        }
    }
}

/// Parse an erase mode; empty means 0, malformed rejects.
fn erase_param(params: &str) -> Option<u16> {
    if params.is_empty() {
        return Some(0);
    }
    params.parse().ok()
}
