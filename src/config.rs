//! Session configuration.
//!
//! This module provides:
//! - TOML configuration file loading from `~/.ptyterm/config.toml`
//! - Defaults for the command, working directory, environment and pty size
//!
//! # Configuration File
//!
//! The configuration file is located at `~/.ptyterm/config.toml`:
//!
//! ```toml
//! # Command to run (optional; defaults to $SHELL, then /bin/sh)
//! command = "bash"
//! args = ["--login"]
//!
//! # Working directory for the child (optional)
//! cwd = "/tmp"
//!
//! # Initial pty size
//! rows = 24
//! cols = 80
//!
//! # Extra environment; replaces the inherited environment when present
//! [env]
//! TERM = "vt100"
//! ```

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Default pty height in rows.
pub const DEFAULT_ROWS: u16 = 24;
/// Default pty width in columns.
pub const DEFAULT_COLS: u16 = 80;

/// Everything needed to spawn a child on a pty.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Command to run; resolved along `PATH` unless it contains a slash.
    pub command: String,
    /// Arguments after the command name.
    pub args: Vec<String>,
    /// Working directory for the child.
    pub cwd: Option<PathBuf>,
    /// When set, the child gets exactly this environment instead of
    /// inheriting the parent's.
    pub env: Option<BTreeMap<String, String>>,
    /// Initial pty height.
    pub rows: u16,
    /// Initial pty width.
    pub cols: u16,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            command: default_shell(),
            args: Vec::new(),
            cwd: None,
            env: None,
            rows: DEFAULT_ROWS,
            cols: DEFAULT_COLS,
        }
    }
}

impl SessionConfig {
    /// Configuration for a specific command with default size.
    pub fn command(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ..Self::default()
        }
    }

    /// Load configuration from the default file, falling back to defaults.
    pub fn load() -> Self {
        if let Some(path) = Self::get_config_path() {
            if path.exists() {
                if let Ok(content) = fs::read_to_string(&path) {
                    match toml::from_str(&content) {
                        Ok(config) => return config,
                        Err(err) => {
                            tracing::warn!(path = %path.display(), %err, "ignoring bad config file")
                        }
                    }
                }
            }
        }
        Self::default()
    }

    /// Load configuration from an explicit file.
    pub fn from_file(path: &std::path::Path) -> Result<Self, String> {
        let content =
            fs::read_to_string(path).map_err(|e| format!("Failed to read config: {}", e))?;
        toml::from_str(&content).map_err(|e| format!("Failed to parse config: {}", e))
    }

    /// Save configuration to the default file.
    pub fn save(&self) -> Result<(), String> {
        if let Some(path) = Self::get_config_path() {
            let content = toml::to_string_pretty(self)
                .map_err(|e| format!("Failed to serialize config: {}", e))?;
            fs::write(&path, content).map_err(|e| format!("Failed to write config: {}", e))?;
            Ok(())
        } else {
            Err("Could not determine config path".to_string())
        }
    }

    /// Get config file path
    fn get_config_path() -> Option<PathBuf> {
        if let Some(home) = home_dir() {
            let dir = home.join(".ptyterm");
            if !dir.exists() {
                let _ = fs::create_dir_all(&dir);
            }
            return Some(dir.join("config.toml"));
        }
        None
    }
}

/// The user's shell, or `/bin/sh` when the environment does not say.
fn default_shell() -> String {
    std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
}

// Get home directory
fn home_dir() -> Option<PathBuf> {
    std::env::var_os("HOME").map(PathBuf::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn defaults() {
        let config = SessionConfig::default();
        assert_eq!(config.rows, 24);
        assert_eq!(config.cols, 80);
        assert!(config.args.is_empty());
        assert!(config.cwd.is_none());
        assert!(config.env.is_none());
        assert!(!config.command.is_empty());
    }

    #[test]
    fn partial_file_fills_in_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "command = \"cat\"\nrows = 10").unwrap();
        let config = SessionConfig::from_file(file.path()).unwrap();
        assert_eq!(config.command, "cat");
        assert_eq!(config.rows, 10);
        assert_eq!(config.cols, 80);
    }

    #[test]
    fn env_table_round_trips() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[env]\nTERM = \"vt100\"\nLANG = \"C\"").unwrap();
        let config = SessionConfig::from_file(file.path()).unwrap();
        let env = config.env.unwrap();
        assert_eq!(env.get("TERM").map(String::as_str), Some("vt100"));
        assert_eq!(env.get("LANG").map(String::as_str), Some("C"));
    }

    #[test]
    fn malformed_file_is_an_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "rows = \"not a number\"").unwrap();
        assert!(SessionConfig::from_file(file.path()).is_err());
    }
}
