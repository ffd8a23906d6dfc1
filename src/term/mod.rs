//! Terminal emulation components.
//!
//! This module contains the screen-side half of the crate:
//!
//! - **rendition**: SGR attribute accumulation
//! - **screen**: cell grid, cursor, dirty-row tracking
//! - **parser**: escape sequence parsing driving the screen
//!
//! # Architecture
//!
//! ```text
//! EscapeParser
//! ├── Rendition (current attribute accumulator)
//! └── ScreenBuffer
//!     ├── cells (grid of char + rendition)
//!     ├── cursor (row, col)
//!     └── dirty flags (one per row)
//! ```
//!
//! Everything here is single-threaded and callback-driven: the parser is fed
//! chunks of pty output and reports changes through [`TermEvents`].

pub mod parser;
pub mod rendition;
pub mod screen;

pub use parser::EscapeParser;
pub use rendition::{Rendition, StyleFlags, DEFAULT_BG, DEFAULT_FG};
pub use screen::{Cell, ScreenBuffer};

/// Notifications fired synchronously while input is being processed.
///
/// All methods default to no-ops so consumers implement only what they need.
pub trait TermEvents {
    /// About to scroll; row indices are about to shift meaning, so flush any
    /// pending dirty-row state now.
    fn pre_scroll(&mut self) {}

    /// Some lines changed and need redrawing.
    fn lines_updated(&mut self) {}

    /// The cursor position may have changed.
    fn cursor_moved(&mut self) {}

    /// A window title sequence was received.
    fn title_changed(&mut self, _title: &str) {}

    /// An escape sequence with no handler was received; the raw parameter
    /// text plus final byte is passed through.
    fn unhandled_sequence(&mut self, _raw: &str) {}
}

/// Event sink that discards everything.
pub struct NullEvents;

impl TermEvents for NullEvents {}
