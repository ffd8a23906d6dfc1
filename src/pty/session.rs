//! Child process supervision on a pseudo-terminal.
//!
//! [`PtySession`] owns the master side of a pty pair and the pid of the child
//! running on the slave side. The master is switched to non-blocking mode at
//! spawn time, so reads report [`ReadOutcome::WouldBlock`] instead of
//! stalling the caller.

use std::ffi::CString;
use std::os::fd::{AsFd, AsRawFd, BorrowedFd, OwnedFd};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use nix::errno::Errno;
use nix::fcntl::{fcntl, FcntlArg, OFlag};
use nix::pty::{forkpty, ForkptyResult, Winsize};
use nix::sys::resource::{getrlimit, Resource};
use nix::sys::signal::{self, kill, SigHandler, Signal};
use nix::sys::wait::{waitpid, WaitPidFlag, WaitStatus};
use nix::unistd::{self, access, chdir, close, execv, execve, AccessFlags, Pid};
use thiserror::Error;

use crate::config::SessionConfig;

/// Pause after each termination signal before re-checking liveness.
const DELAY_AFTER_TERMINATE: Duration = Duration::from_millis(100);
/// Pause after closing the master before confirming the child noticed.
const DELAY_AFTER_CLOSE: Duration = Duration::from_millis(100);

#[derive(Debug, Error)]
pub enum PtyError {
    #[error("command not found: {0}")]
    NotFound(String),
    #[error("argument contains an interior NUL byte")]
    BadArgument,
    #[error("forkpty failed")]
    Fork(#[source] Errno),
    #[error("pty setup failed")]
    Setup(#[source] Errno),
    #[error("read from pty master failed")]
    Read(#[source] Errno),
    #[error("write to pty master failed")]
    Write(#[source] Errno),
    #[error("waitpid failed")]
    Wait(#[source] Errno),
    #[error("child was reaped outside this session")]
    LostChild,
    #[error("child process is not running")]
    NotRunning,
    #[error("session is closed")]
    Closed,
    #[error("could not terminate child process")]
    TerminateFailed,
    #[error("window size ioctl failed")]
    WindowSize(#[source] std::io::Error),
}

pub type Result<T> = std::result::Result<T, PtyError>;

/// How the child process ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExitStatus {
    Exited(i32),
    Signaled(Signal),
}

impl ExitStatus {
    pub fn code(&self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(*code),
            Self::Signaled(_) => None,
        }
    }

    pub fn signal(&self) -> Option<Signal> {
        match self {
            Self::Exited(_) => None,
            Self::Signaled(sig) => Some(*sig),
        }
    }

    pub fn success(&self) -> bool {
        matches!(self, Self::Exited(0))
    }
}

/// Result of one non-blocking read from the master.
#[derive(Debug, PartialEq, Eq)]
pub enum ReadOutcome {
    Data(Vec<u8>),
    WouldBlock,
    Eof,
}

/// Resolve a command name to an executable path.
///
/// A name containing a slash is checked directly; anything else is searched
/// along `PATH`. Matches require execute permission.
pub fn which(command: &str) -> Option<PathBuf> {
    if command.contains('/') {
        let path = PathBuf::from(command);
        return is_executable(&path).then_some(path);
    }
    let search =
        std::env::var("PATH").unwrap_or_else(|_| "/usr/local/bin:/usr/bin:/bin".to_string());
    for dir in search.split(':') {
        if dir.is_empty() {
            continue;
        }
        let candidate = Path::new(dir).join(command);
        if is_executable(&candidate) {
            return Some(candidate);
        }
    }
    None
}

fn is_executable(path: &Path) -> bool {
    access(path, AccessFlags::X_OK).is_ok()
}

/// A child process attached to the slave side of a pty.
pub struct PtySession {
    pid: Pid,
    master: Option<OwnedFd>,
    terminated: bool,
    closed: bool,
    eof_seen: bool,
    exit_status: Option<ExitStatus>,
}

impl PtySession {
    /// Fork a child onto a fresh pty and exec the configured command.
    ///
    /// The command is resolved through [`which`] before forking, so an
    /// unknown command fails cleanly in the parent.
    pub fn spawn(config: &SessionConfig) -> Result<Self> {
        let resolved =
            which(&config.command).ok_or_else(|| PtyError::NotFound(config.command.clone()))?;

        let mut argv = Vec::with_capacity(config.args.len() + 1);
        argv.push(cstring(resolved.as_os_str().as_bytes())?);
        for arg in &config.args {
            argv.push(cstring(arg.as_bytes())?);
        }
        let envp = match &config.env {
            Some(map) => {
                let mut pairs = Vec::with_capacity(map.len());
                for (key, value) in map {
                    pairs.push(cstring(format!("{key}={value}").as_bytes())?);
                }
                Some(pairs)
            }
            None => None,
        };

        let winsize = Winsize {
            ws_row: config.rows,
            ws_col: config.cols,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };

        match unsafe { forkpty(Some(&winsize), None) }.map_err(PtyError::Fork)? {
            ForkptyResult::Parent { child, master } => {
                fcntl(&master, FcntlArg::F_SETFL(OFlag::O_NONBLOCK)).map_err(PtyError::Setup)?;
                tracing::info!(
                    pid = child.as_raw(),
                    command = %resolved.display(),
                    rows = config.rows,
                    cols = config.cols,
                    "spawned child on pty"
                );
                Ok(Self {
                    pid: child,
                    master: Some(master),
                    terminated: false,
                    closed: false,
                    eof_seen: false,
                    exit_status: None,
                })
            }
            ForkptyResult::Child => exec_child(&argv, envp.as_deref(), config.cwd.as_deref()),
        }
    }

    pub fn pid(&self) -> Pid {
        self.pid
    }

    /// Exit status if the child has been reaped.
    pub fn exit_status(&self) -> Option<ExitStatus> {
        self.exit_status
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated
    }

    /// True once a read has reported end of output.
    pub fn eof(&self) -> bool {
        self.eof_seen
    }

    /// Master fd for use with `poll`; `None` after close.
    pub fn master_fd(&self) -> Option<BorrowedFd<'_>> {
        self.master.as_ref().map(|fd| fd.as_fd())
    }

    pub fn is_atty(&self) -> bool {
        self.master
            .as_ref()
            .map_or(false, |fd| unsafe { libc::isatty(fd.as_raw_fd()) == 1 })
    }

    /// Check whether the child is still running, reaping it if it exited.
    ///
    /// Once output has hit end-of-file the child cannot be doing anything
    /// useful, so this switches to a blocking reap to collect the status.
    pub fn is_alive(&mut self) -> Result<bool> {
        if self.terminated {
            return Ok(false);
        }
        if self.eof_seen {
            if let Some(status) = self.poll_status(None)? {
                self.record_exit(status);
                return Ok(false);
            }
            return Err(PtyError::LostChild);
        }
        if let Some(status) = self.poll_status(Some(WaitPidFlag::WNOHANG))? {
            self.record_exit(status);
            return Ok(false);
        }
        // A child that just exited can report "no status" once; only two
        // consecutive empty polls count as alive.
        if let Some(status) = self.poll_status(Some(WaitPidFlag::WNOHANG))? {
            self.record_exit(status);
            return Ok(false);
        }
        Ok(true)
    }

    /// Read up to `max` bytes of child output.
    ///
    /// Hangup shows up as end-of-file: Linux reports it on the master as EIO,
    /// other systems as a zero-length read.
    pub fn read(&mut self, max: usize) -> Result<ReadOutcome> {
        let master = self.master.as_ref().ok_or(PtyError::Closed)?;
        let mut buf = vec![0u8; max];
        match unistd::read(master, &mut buf) {
            Ok(0) => {
                self.eof_seen = true;
                Ok(ReadOutcome::Eof)
            }
            Ok(n) => {
                buf.truncate(n);
                Ok(ReadOutcome::Data(buf))
            }
            Err(Errno::EAGAIN) => Ok(ReadOutcome::WouldBlock),
            Err(Errno::EIO) => {
                self.eof_seen = true;
                Ok(ReadOutcome::Eof)
            }
            Err(err) => Err(PtyError::Read(err)),
        }
    }

    /// Write bytes to the child's input, retrying short writes.
    ///
    /// Liveness is rechecked between attempts so a dead child turns into an
    /// error instead of a spin.
    pub fn write(&mut self, data: &[u8]) -> Result<usize> {
        if self.master.is_none() {
            return Err(PtyError::Closed);
        }
        let mut written = 0;
        while written < data.len() {
            if !self.is_alive()? {
                if written == 0 {
                    return Err(PtyError::NotRunning);
                }
                break;
            }
            let master = self.master.as_ref().ok_or(PtyError::Closed)?;
            match unistd::write(master, &data[written..]) {
                Ok(n) => written += n,
                Err(Errno::EAGAIN) => thread::sleep(Duration::from_millis(1)),
                Err(err) => return Err(PtyError::Write(err)),
            }
        }
        Ok(written)
    }

    /// Block until the child exits and return its status.
    ///
    /// Errors with [`PtyError::NotRunning`] if the child was already reaped.
    pub fn wait(&mut self) -> Result<ExitStatus> {
        if self.terminated {
            return Err(PtyError::NotRunning);
        }
        loop {
            if let Some(status) = self.poll_status(None)? {
                self.record_exit(status);
                return Ok(status);
            }
        }
    }

    /// Try to stop the child with an escalating signal ladder.
    ///
    /// Sends SIGHUP, SIGCONT and SIGINT in turn, pausing after each to let
    /// the child react; `force` adds a final SIGKILL rung. Returns whether
    /// the child is confirmed dead. A failed `kill` is not fatal because the
    /// child may have exited in the meantime.
    pub fn terminate(&mut self, force: bool) -> Result<bool> {
        if !self.is_alive()? {
            return Ok(true);
        }
        for sig in [Signal::SIGHUP, Signal::SIGCONT, Signal::SIGINT] {
            if self.signal_and_wait(sig)? {
                return Ok(true);
            }
        }
        if force && self.signal_and_wait(Signal::SIGKILL)? {
            return Ok(true);
        }
        Ok(false)
    }

    /// Close the master side, then make sure the child is gone.
    ///
    /// Idempotent. Losing the master delivers a hangup to the child; a child
    /// that survives it is force-terminated.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        self.master = None;
        thread::sleep(DELAY_AFTER_CLOSE);
        if self.is_alive()? && !self.terminate(true)? {
            return Err(PtyError::TerminateFailed);
        }
        self.closed = true;
        Ok(())
    }

    /// Current window size of the pty as (rows, cols).
    pub fn window_size(&self) -> Result<(u16, u16)> {
        let master = self.master.as_ref().ok_or(PtyError::Closed)?;
        let mut ws = libc::winsize {
            ws_row: 0,
            ws_col: 0,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        let rc = unsafe { libc::ioctl(master.as_raw_fd(), libc::TIOCGWINSZ, &mut ws) };
        if rc != 0 {
            return Err(PtyError::WindowSize(std::io::Error::last_os_error()));
        }
        Ok((ws.ws_row, ws.ws_col))
    }

    /// Resize the pty; the kernel delivers SIGWINCH to the child's group.
    pub fn set_window_size(&mut self, rows: u16, cols: u16) -> Result<()> {
        let master = self.master.as_ref().ok_or(PtyError::Closed)?;
        let ws = libc::winsize {
            ws_row: rows,
            ws_col: cols,
            ws_xpixel: 0,
            ws_ypixel: 0,
        };
        let rc = unsafe { libc::ioctl(master.as_raw_fd(), libc::TIOCSWINSZ, &ws) };
        if rc != 0 {
            return Err(PtyError::WindowSize(std::io::Error::last_os_error()));
        }
        Ok(())
    }

    fn poll_status(&mut self, options: Option<WaitPidFlag>) -> Result<Option<ExitStatus>> {
        match waitpid(self.pid, options) {
            Ok(WaitStatus::StillAlive) => Ok(None),
            Ok(WaitStatus::Exited(_, code)) => Ok(Some(ExitStatus::Exited(code))),
            Ok(WaitStatus::Signaled(_, sig, _)) => Ok(Some(ExitStatus::Signaled(sig))),
            Ok(_) => Ok(None),
            Err(Errno::ECHILD) => Err(PtyError::LostChild),
            Err(err) => Err(PtyError::Wait(err)),
        }
    }

    fn record_exit(&mut self, status: ExitStatus) {
        if self.exit_status.is_none() {
            self.exit_status = Some(status);
        }
        self.terminated = true;
        tracing::debug!(pid = self.pid.as_raw(), ?status, "child exited");
    }

    fn signal_and_wait(&mut self, sig: Signal) -> Result<bool> {
        if let Err(err) = kill(self.pid, sig) {
            tracing::debug!(pid = self.pid.as_raw(), %sig, %err, "kill failed");
        }
        thread::sleep(DELAY_AFTER_TERMINATE);
        Ok(!self.is_alive()?)
    }
}

impl Drop for PtySession {
    fn drop(&mut self) {
        if !self.closed {
            let _ = self.close();
        }
    }
}

fn cstring(bytes: &[u8]) -> Result<CString> {
    CString::new(bytes).map_err(|_| PtyError::BadArgument)
}

/// Child-side setup between fork and exec. Never returns.
fn exec_child(argv: &[CString], envp: Option<&[CString]>, cwd: Option<&Path>) -> ! {
    close_inherited_fds();
    // forkpty leaves SIGHUP however the parent had it; the child must die on
    // hangup so closing the master actually stops it
    unsafe {
        let _ = signal::signal(Signal::SIGHUP, SigHandler::SigDfl);
    }
    if let Some(dir) = cwd {
        if chdir(dir).is_err() {
            std::process::exit(127);
        }
    }
    let _ = match envp {
        Some(env) => execve(argv[0].as_c_str(), argv, env),
        None => execv(argv[0].as_c_str(), argv),
    };
    std::process::exit(127);
}

/// Close every descriptor above the stdio trio so the child does not hold
/// pipes or sockets the parent had open.
fn close_inherited_fds() {
    let limit = match getrlimit(Resource::RLIMIT_NOFILE) {
        Ok((soft, _)) => soft.min(65_536),
        Err(_) => 1024,
    };
    for fd in 3..limit as i32 {
        let _ = close(fd);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(command: &str, args: &[&str]) -> SessionConfig {
        SessionConfig {
            command: command.to_string(),
            args: args.iter().map(|s| s.to_string()).collect(),
            cwd: None,
            env: None,
            rows: 24,
            cols: 80,
        }
    }

    fn wait_for_death(session: &mut PtySession) -> bool {
        for _ in 0..100 {
            if !session.is_alive().unwrap() {
                return true;
            }
            thread::sleep(Duration::from_millis(10));
        }
        false
    }

    fn read_until<F: Fn(&[u8]) -> bool>(session: &mut PtySession, pred: F) -> Vec<u8> {
        let mut collected = Vec::new();
        for _ in 0..200 {
            match session.read(4096) {
                Ok(ReadOutcome::Data(chunk)) => {
                    collected.extend_from_slice(&chunk);
                    if pred(&collected) {
                        break;
                    }
                }
                Ok(ReadOutcome::WouldBlock) => thread::sleep(Duration::from_millis(10)),
                Ok(ReadOutcome::Eof) => break,
                Err(err) => panic!("read failed: {err}"),
            }
        }
        collected
    }

    #[test]
    fn which_finds_shell() {
        assert!(which("sh").is_some());
        assert!(which("/bin/sh").is_some());
        assert!(which("definitely-not-a-real-command-xyz").is_none());
    }

    #[test]
    fn missing_command_is_rejected() {
        let err = PtySession::spawn(&config("definitely-not-a-real-command-xyz", &[]));
        assert!(matches!(err, Err(PtyError::NotFound(_))));
    }

    #[test]
    fn exit_code_is_reported() {
        let mut session = PtySession::spawn(&config("sh", &["-c", "exit 7"])).unwrap();
        let status = session.wait().unwrap();
        assert_eq!(status, ExitStatus::Exited(7));
        assert_eq!(status.code(), Some(7));
        assert!(!status.success());
    }

    #[test]
    fn wait_twice_is_an_error() {
        let mut session = PtySession::spawn(&config("sh", &["-c", "exit 0"])).unwrap();
        session.wait().unwrap();
        assert!(matches!(session.wait(), Err(PtyError::NotRunning)));
        assert_eq!(session.exit_status(), Some(ExitStatus::Exited(0)));
    }

    #[test]
    fn immediate_exit_is_detected() {
        let mut session = PtySession::spawn(&config("sh", &["-c", "true"])).unwrap();
        assert!(wait_for_death(&mut session));
        assert!(session.is_terminated());
    }

    #[test]
    fn write_and_read_roundtrip() {
        let mut session = PtySession::spawn(&config("cat", &[])).unwrap();
        session.write(b"hello\n").unwrap();
        let output = read_until(&mut session, |b| {
            String::from_utf8_lossy(b).matches("hello").count() >= 2
        });
        // the pty echoes input, then cat repeats it
        assert!(String::from_utf8_lossy(&output).contains("hello"));
        session.close().unwrap();
    }

    #[test]
    fn eof_after_child_exits() {
        let mut session = PtySession::spawn(&config("sh", &["-c", "echo done"])).unwrap();
        let output = read_until(&mut session, |_| false);
        assert!(String::from_utf8_lossy(&output).contains("done"));
        assert!(session.eof());
        assert!(!session.is_alive().unwrap());
    }

    #[test]
    fn terminate_kills_a_sleeping_child() {
        let mut session = PtySession::spawn(&config("sleep", &["30"])).unwrap();
        assert!(session.is_alive().unwrap());
        assert!(session.terminate(false).unwrap());
        assert!(!session.is_alive().unwrap());
    }

    #[test]
    fn stubborn_child_needs_force() {
        let mut session =
            PtySession::spawn(&config("sh", &["-c", "trap '' HUP INT; sleep 30"])).unwrap();
        // give the shell time to install its traps
        thread::sleep(Duration::from_millis(300));
        assert!(!session.terminate(false).unwrap());
        assert!(session.terminate(true).unwrap());
    }

    #[test]
    fn window_size_roundtrip() {
        let mut cfg = config("sleep", &["5"]);
        cfg.rows = 40;
        cfg.cols = 120;
        let mut session = PtySession::spawn(&cfg).unwrap();
        assert_eq!(session.window_size().unwrap(), (40, 120));
        session.set_window_size(24, 80).unwrap();
        assert_eq!(session.window_size().unwrap(), (24, 80));
        session.terminate(true).unwrap();
    }

    #[test]
    fn master_is_a_tty() {
        let mut session = PtySession::spawn(&config("sleep", &["5"])).unwrap();
        assert!(session.is_atty());
        assert!(session.master_fd().is_some());
        session.terminate(true).unwrap();
    }

    #[test]
    fn close_is_idempotent() {
        let mut session = PtySession::spawn(&config("sleep", &["30"])).unwrap();
        session.close().unwrap();
        session.close().unwrap();
        assert!(matches!(session.read(16), Err(PtyError::Closed)));
        assert!(matches!(session.write(b"x"), Err(PtyError::Closed)));
        assert!(session.master_fd().is_none());
    }
}
