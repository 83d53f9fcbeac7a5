//! Daemon settings.
//!
//! Settings are read from `$XDG_CONFIG_HOME/lackeys/config.json`.  Every
//! field is optional, so `{}` (or no file at all) gives the compiled-in
//! defaults.  Key bindings do not live here; they are in the rules file
//! named by `paths.rules` (see [`rules`](crate::rules)).
//!
//! # Example
//!
//! ```json
//! {
//!   "paths": {
//!     "rules": "/home/me/.lackeys",
//!     "socket": "/run/user/1000/lackeys.sock",
//!     "command_feed": "/home/me/.lackeydo"
//!   },
//!   "launcher": { "open_command": ["open", "-a"] }
//! }
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Top-level configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Where the daemon reads and writes its files.
    #[serde(default)]
    pub paths: PathsConfig,

    /// How applications are opened.
    #[serde(default)]
    pub launcher: LauncherConfig,
}

/// File locations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PathsConfig {
    /// The binding rules file.  Created empty if missing.
    pub rules: PathBuf,
    /// Unix socket accepting [`Control`](crate::control::Control) messages.
    pub socket: PathBuf,
    /// File that `order` commands are appended to.
    pub command_feed: PathBuf,
}

impl Default for PathsConfig {
    fn default() -> Self {
        let home = home_dir();
        Self {
            rules: home.join(".lackeys"),
            socket: runtime_dir().join("lackeys.sock"),
            command_feed: home.join(".lackeydo"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LauncherConfig {
    /// Program and leading arguments; the application name is appended.
    pub open_command: Vec<String>,
}

impl Default for LauncherConfig {
    fn default() -> Self {
        Self {
            open_command: vec!["open".into(), "-a".into()],
        }
    }
}

impl Config {
    /// Load configuration from a JSON file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| ConfigError(format!("failed to read {}: {}", path.display(), e)))?;
        let config: Self = serde_json::from_str(&contents)
            .map_err(|e| ConfigError(format!("failed to parse {}: {}", path.display(), e)))?;
        Ok(config)
    }

    /// Like [`load`](Self::load), but a missing file is `Ok(None)` rather
    /// than an error.  A file that exists and fails to parse is still one.
    pub fn load_optional(path: &Path) -> Result<Option<Self>, ConfigError> {
        match std::fs::metadata(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            _ => Self::load(path).map(Some),
        }
    }
}

/// Error from loading or parsing a configuration file.
#[derive(Debug, thiserror::Error)]
#[error("config error: {0}")]
pub struct ConfigError(String);

/// `$HOME`, or `/tmp` when unset.
pub fn home_dir() -> PathBuf {
    PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| "/tmp".into()))
}

/// `$XDG_RUNTIME_DIR`, or `/tmp` when unset.
pub fn runtime_dir() -> PathBuf {
    PathBuf::from(std::env::var("XDG_RUNTIME_DIR").unwrap_or_else(|_| "/tmp".into()))
}

/// `$XDG_CONFIG_HOME/lackeys`, falling back to `$HOME/.config/lackeys`.
pub fn config_dir() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"));
    base.join("lackeys")
}
