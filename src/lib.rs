//! VT100-style terminal emulation with pty process management.
//!
//! The crate splits into two halves that meet in the middle:
//!
//! ```text
//! PtySession (child process on a pty)
//!     │  raw output bytes
//!     ▼
//! EscapeParser ──▶ ScreenBuffer (cells, cursor, dirty rows)
//!     │
//!     └─▶ TermEvents (scroll, title, redraw notifications)
//! ```
//!
//! [`pty::PtySession`] spawns and supervises a child process attached to the
//! slave side of a pseudo-terminal. Its output is fed, chunk by chunk, to
//! [`term::EscapeParser`], which interprets control characters and escape
//! sequences and maintains a [`term::ScreenBuffer`] holding what a terminal
//! would display. Either half is usable on its own: the screen side never
//! touches a file descriptor and the pty side never inspects the bytes.
//!
//! # Example
//!
//! ```no_run
//! use ptyterm::config::SessionConfig;
//! use ptyterm::pty::{PtySession, ReadOutcome};
//! use ptyterm::term::{EscapeParser, NullEvents, ScreenBuffer};
//!
//! # fn main() -> ptyterm::pty::Result<()> {
//! let config = SessionConfig::command("sh");
//! let mut session = PtySession::spawn(&config)?;
//! let mut screen = ScreenBuffer::new(config.rows as usize, config.cols as usize);
//! let mut parser = EscapeParser::new();
//!
//! session.write(b"echo hello\n")?;
//! loop {
//!     match session.read(4096)? {
//!         ReadOutcome::Data(bytes) => parser.process(&bytes, &mut screen, &mut NullEvents),
//!         ReadOutcome::WouldBlock => continue,
//!         ReadOutcome::Eof => break,
//!     }
//! }
//! println!("{}", screen.screen_text());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod input;
#[cfg(unix)]
pub mod pty;
pub mod term;

pub use config::SessionConfig;
pub use input::KeyEncoder;
#[cfg(unix)]
pub use pty::{ExitStatus, PtyError, PtySession, ReadOutcome};
pub use term::{EscapeParser, Rendition, ScreenBuffer, TermEvents};
