//! Daemon Settings
//!
//! Settings stored as JSON in settings.json. Looked up in order: an explicit
//! path, /etc/quadromon/settings.json, then ~/.config/quadromon/settings.json.
//! A missing file means defaults.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::constants::{paths, timing};
use crate::error::{QuadroError, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    /// Explicit hidraw node, e.g. /dev/hidraw3. Discovered by USB id when unset.
    #[serde(default)]
    pub device: Option<PathBuf>,

    /// IPC socket path
    #[serde(default = "default_socket_path")]
    pub socket_path: PathBuf,

    /// Maximum age of the last report before reads report stale
    #[serde(default = "default_freshness_window_ms")]
    pub freshness_window_ms: u64,

    /// tracing filter directive, e.g. "debug" or "qm_core=trace"
    #[serde(default)]
    pub log_level: Option<String>,

    /// Delay between attempts to reopen the device
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
}

fn default_socket_path() -> PathBuf { PathBuf::from(paths::default_socket_path()) }
fn default_freshness_window_ms() -> u64 { timing::DEFAULT_FRESHNESS_WINDOW_MS }
fn default_reconnect_delay_ms() -> u64 { timing::DEFAULT_RECONNECT_DELAY_MS }

impl Default for Settings {
    fn default() -> Self {
        Self {
            device: None,
            socket_path: default_socket_path(),
            freshness_window_ms: default_freshness_window_ms(),
            log_level: None,
            reconnect_delay_ms: default_reconnect_delay_ms(),
        }
    }
}

impl Settings {
    /// Load settings, searching the default locations unless `explicit` is given.
    ///
    /// An explicit path must exist; the default locations may all be absent.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) if !path.exists() => {
                return Err(QuadroError::FileNotFound(path.to_path_buf()))
            }
            Some(path) => Some(path.to_path_buf()),
            None => search_paths().into_iter().find(|p| p.exists()),
        };

        match path {
            Some(path) => Self::load_from(&path),
            None => {
                debug!("No settings file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// Parse and validate one settings file
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| QuadroError::FileRead {
            path: path.to_path_buf(),
            source: e,
        })?;

        let settings: Settings = serde_json::from_str(&content)?;
        settings.validate()?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        check_range(
            "freshness_window_ms",
            self.freshness_window_ms,
            timing::MIN_FRESHNESS_WINDOW_MS,
            timing::MAX_FRESHNESS_WINDOW_MS,
        )?;
        check_range(
            "reconnect_delay_ms",
            self.reconnect_delay_ms,
            timing::MIN_RECONNECT_DELAY_MS,
            timing::MAX_RECONNECT_DELAY_MS,
        )?;

        if self.socket_path.as_os_str().is_empty() {
            return Err(QuadroError::invalid_config("socket_path", "must not be empty"));
        }
        if let Some(device) = &self.device {
            if !device.is_absolute() {
                return Err(QuadroError::invalid_config(
                    "device",
                    format!("{} is not an absolute path", device.display()),
                ));
            }
        }
        Ok(())
    }

    pub fn freshness_window(&self) -> Duration {
        Duration::from_millis(self.freshness_window_ms)
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }
}

fn check_range(field: &str, value: u64, min: u64, max: u64) -> Result<()> {
    if (min..=max).contains(&value) {
        Ok(())
    } else {
        Err(QuadroError::invalid_config(
            field,
            format!("{} is outside {}..={}", value, min, max),
        ))
    }
}

/// Default settings locations, highest priority first
pub fn search_paths() -> Vec<PathBuf> {
    let mut candidates = vec![Path::new(paths::CONFIG_DIR).join(paths::SETTINGS_FILE)];
    if let Some(dir) = paths::user_config_dir() {
        candidates.push(dir.join(paths::SETTINGS_FILE));
    }
    candidates
}
