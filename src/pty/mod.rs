//! Pseudo-terminal process management.
//!
//! Spawns child processes on the slave side of a pty and supervises them:
//! non-blocking reads and writes on the master, liveness polling, graceful
//! and forced termination, and window size control.
//!
//! Unix only.

pub mod session;

pub use session::{which, ExitStatus, PtyError, PtySession, ReadOutcome, Result};
