//! ptyterm - run a command on a pty and print its final screen
//!
//! Spawns the given command (or the user's shell) on a pseudo-terminal,
//! feeds everything it prints through the VT100 emulation in this crate,
//! and writes the resulting screen contents to stdout when the command
//! exits.
//!
//! # Quick Start
//!
//! ```text
//! ptyterm                        # Run $SHELL until it exits
//! ptyterm ls --color=always      # Capture a command's screen
//! ptyterm -r 10 -c 40 top -n 1   # Custom pty size
//! ```
//!
//! A log is written to `~/.ptyterm/ptyterm.log`; the `PTYTERM_LOG`
//! environment variable adjusts its filter.

use std::env;

use tracing::info;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[cfg(unix)]
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

use ptyterm::config::SessionConfig;
#[cfg(unix)]
use ptyterm::pty::{PtySession, ReadOutcome};
use ptyterm::term::{EscapeParser, ScreenBuffer, TermEvents};

/// Version string from Cargo.toml
const VERSION: &str = env!("CARGO_PKG_VERSION");

fn print_version() {
    eprintln!("ptyterm {}", VERSION);
}

fn print_help() {
    eprintln!("ptyterm {} - run a command on a pty and print its final screen", VERSION);
    eprintln!();
    eprintln!("Usage: ptyterm [OPTIONS] [COMMAND [ARGS...]]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -r, --rows <N>        Pty height in rows (default: 24)");
    eprintln!("  -c, --cols <N>        Pty width in columns (default: 80)");
    eprintln!("  -v, --version         Show version");
    eprintln!("  -h, --help            Show this help");
    eprintln!();
    eprintln!("Without a command, $SHELL (or /bin/sh) is run.");
    eprintln!();
    eprintln!("Configuration: ~/.ptyterm/config.toml");
}

fn parse_args(config: &mut SessionConfig) -> Result<(), String> {
    let args: Vec<String> = env::args().collect();
    let mut i = 1;

    while i < args.len() {
        match args[i].as_str() {
            "-h" | "--help" => {
                print_help();
                std::process::exit(0);
            }
            "-v" | "--version" => {
                print_version();
                std::process::exit(0);
            }
            "-r" | "--rows" => {
                i += 1;
                let value = args.get(i).ok_or("Missing rows argument")?;
                config.rows = value
                    .parse()
                    .map_err(|_| format!("Invalid rows: {}", value))?;
            }
            "-c" | "--cols" => {
                i += 1;
                let value = args.get(i).ok_or("Missing cols argument")?;
                config.cols = value
                    .parse()
                    .map_err(|_| format!("Invalid cols: {}", value))?;
            }
            arg if arg.starts_with('-') => {
                return Err(format!("Unknown argument: {}. Use -h for help.", arg));
            }
            command => {
                // everything after the command belongs to it
                config.command = command.to_string();
                config.args = args[i + 1..].to_vec();
                break;
            }
        }
        i += 1;
    }

    if config.rows == 0 || config.cols == 0 {
        return Err("Pty size must be at least 1x1".to_string());
    }
    Ok(())
}

/// Initialize logging to `~/.ptyterm/ptyterm.log`.
fn init_logging() {
    let log_path = std::env::var_os("HOME")
        .map(std::path::PathBuf::from)
        .map(|h| h.join(".ptyterm").join("ptyterm.log"))
        .unwrap_or_else(|| std::path::PathBuf::from("ptyterm.log"));

    if let Some(parent) = log_path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }

    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)
        .ok();

    if let Some(file) = log_file {
        let filter = EnvFilter::try_from_env("PTYTERM_LOG")
            .unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(filter)
            .with_writer(std::sync::Mutex::new(file))
            .with_ansi(false)
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    }
}

/// Event sink that remembers the last title the child set.
#[derive(Default)]
struct CaptureEvents {
    title: Option<String>,
}

impl TermEvents for CaptureEvents {
    fn title_changed(&mut self, title: &str) {
        self.title = Some(title.to_string());
    }
}

#[cfg(unix)]
fn main() -> anyhow::Result<()> {
    let mut config = SessionConfig::load();
    if let Err(e) = parse_args(&mut config) {
        eprintln!("Error: {}", e);
        eprintln!("Use --help for usage information");
        std::process::exit(1);
    }

    init_logging();
    info!(command = %config.command, "ptyterm starting");

    let mut session = PtySession::spawn(&config)?;
    let mut screen = ScreenBuffer::new(config.rows as usize, config.cols as usize);
    let mut parser = EscapeParser::new();
    let mut events = CaptureEvents::default();

    loop {
        // wait for output without burning cpu; the read below is
        // non-blocking either way
        {
            let Some(fd) = session.master_fd() else { break };
            let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
            let _ = poll(&mut fds, PollTimeout::from(50u8));
        }

        match session.read(4096)? {
            ReadOutcome::Data(bytes) => parser.process(&bytes, &mut screen, &mut events),
            ReadOutcome::Eof => break,
            ReadOutcome::WouldBlock => {
                if !session.is_alive()? {
                    break;
                }
            }
        }
    }

    let status = match session.exit_status() {
        Some(status) => status,
        None => session.wait()?,
    };
    info!(?status, "child finished");
    session.close()?;

    if let Some(title) = &events.title {
        eprintln!("[title: {}]", title);
    }
    println!("{}", screen.screen_text());

    if let Some(code) = status.code() {
        if code != 0 {
            std::process::exit(code);
        }
    }
    Ok(())
}

#[cfg(not(unix))]
fn main() {
    eprintln!("ptyterm requires a Unix pty; this platform is not supported.");
    std::process::exit(1);
}
