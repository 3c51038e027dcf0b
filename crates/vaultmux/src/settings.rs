use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use vaultmux_core::DEFAULT_ATTEMPTS;
use vaultmux_platform::AppPaths;

use crate::error::AppError;

/// Set to `1` to force elevation on regardless of the saved setting.
pub const USE_ELEVATION_ENV: &str = "VAULTMUX_USE_ELEVATION";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default)]
    pub use_elevation: bool,

    #[serde(default = "default_unmount_attempts")]
    pub unmount_attempts: u32,

    #[serde(default)]
    pub debug_logging: bool,

    #[serde(default = "default_max_log_size_bytes")]
    pub max_log_size_bytes: u64,

    /// 0 keeps each backend's own timeout.
    #[serde(default)]
    pub command_timeout_secs: u64,
}

fn default_unmount_attempts() -> u32 {
    DEFAULT_ATTEMPTS
}

fn default_max_log_size_bytes() -> u64 {
    5 * 1024 * 1024
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            use_elevation: false,
            unmount_attempts: default_unmount_attempts(),
            debug_logging: false,
            max_log_size_bytes: default_max_log_size_bytes(),
            command_timeout_secs: 0,
        }
    }
}

impl Settings {
    /// Saved settings as on disk. Missing or unreadable files give the
    /// defaults.
    pub fn load() -> Self {
        match AppPaths::new() {
            Ok(paths) => Self::load_from(&paths.settings_file()),
            Err(_) => Self::default(),
        }
    }

    pub fn load_from(path: &Path) -> Self {
        if !path.exists() {
            return Self::default();
        }
        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|error| {
                log::warn!("Ignoring malformed {}: {error}", path.display());
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<(), AppError> {
        let paths = AppPaths::new()?;
        paths
            .ensure_dirs()
            .map_err(|source| AppError::write(&paths.config_dir, source))?;
        self.save_to(&paths.settings_file())
    }

    pub fn save_to(&self, path: &Path) -> Result<(), AppError> {
        let content = serde_json::to_string_pretty(self).map_err(|source| AppError::Json {
            path: path.to_path_buf(),
            source,
        })?;
        std::fs::write(path, content).map_err(|source| AppError::write(path, source))
    }

    /// Elevation for this run: the environment wins over the saved value
    /// and is never written back.
    pub fn elevation_enabled(&self) -> bool {
        self.elevation_with(std::env::var(USE_ELEVATION_ENV).ok().as_deref())
    }

    fn elevation_with(&self, env_value: Option<&str>) -> bool {
        env_value.map_or(self.use_elevation, |value| value.trim() == "1")
    }

    pub fn command_timeout(&self) -> Option<Duration> {
        (self.command_timeout_secs > 0).then(|| Duration::from_secs(self.command_timeout_secs))
    }
}
