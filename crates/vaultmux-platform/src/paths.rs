use std::path::{Path, PathBuf};

use thiserror::Error;

const APP_DIR: &str = "vaultmux";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AppPathsError {
    #[error("Could not determine home directory")]
    HomeDirUnavailable,
    #[error("Could not determine config directory")]
    ConfigDirUnavailable,
    #[error("Could not determine data directory")]
    DataDirUnavailable,
}

/// Where vaultmux keeps settings, favorites and its debug log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppPaths {
    pub config_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl AppPaths {
    /// Per-user directories for the current platform. macOS keeps everything
    /// under `~/Library/Application Support/vaultmux`.
    ///
    /// # Errors
    /// Returns an error when the home, config or data directory is unknown.
    pub fn new() -> Result<Self, AppPathsError> {
        if cfg!(target_os = "macos") {
            let home = dirs::home_dir().ok_or(AppPathsError::HomeDirUnavailable)?;
            return Ok(Self::under(&home.join("Library/Application Support")));
        }

        let config = dirs::config_dir().ok_or(AppPathsError::ConfigDirUnavailable)?;
        let data = dirs::data_dir().ok_or(AppPathsError::DataDirUnavailable)?;
        Ok(Self {
            config_dir: config.join(APP_DIR),
            data_dir: data.join(APP_DIR),
        })
    }

    /// Config and data sharing one `<base>/vaultmux` directory.
    #[must_use]
    pub fn under(base: &Path) -> Self {
        let dir = base.join(APP_DIR);
        Self {
            config_dir: dir.clone(),
            data_dir: dir,
        }
    }

    #[must_use]
    pub fn settings_file(&self) -> PathBuf {
        self.config_dir.join("settings.json")
    }

    #[must_use]
    pub fn favorites_file(&self) -> PathBuf {
        self.config_dir.join("favorites.json")
    }

    #[must_use]
    pub fn log_file(&self) -> PathBuf {
        self.data_dir.join("debug.log")
    }

    /// # Errors
    /// Returns an error if either directory cannot be created.
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        for dir in [&self.config_dir, &self.data_dir] {
            std::fs::create_dir_all(dir)?;
        }
        Ok(())
    }
}
