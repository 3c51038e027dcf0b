use std::path::{Path, PathBuf};

use vaultmux_backend::FavoriteEntry;
use vaultmux_platform::AppPaths;

use crate::error::AppError;

/// The saved volumes in `favorites.json`.
#[derive(Debug, Default)]
pub struct Favorites {
    path: PathBuf,
    entries: Vec<FavoriteEntry>,
}

impl Favorites {
    pub fn load() -> Result<Self, AppError> {
        let paths = AppPaths::new()?;
        Self::load_from(paths.favorites_file())
    }

    /// A missing file is an empty list; a malformed one is an error so that
    /// saving never silently discards entries.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, AppError> {
        let path = path.into();
        if !path.exists() {
            return Ok(Self {
                path,
                entries: Vec::new(),
            });
        }

        let content = std::fs::read_to_string(&path).map_err(|source| AppError::read(&path, source))?;
        let entries = serde_json::from_str(&content).map_err(|source| AppError::Json {
            path: path.clone(),
            source,
        })?;
        Ok(Self { path, entries })
    }

    pub fn save(&self) -> Result<(), AppError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| AppError::write(parent, source))?;
        }
        let content = serde_json::to_string_pretty(&self.entries).map_err(|source| AppError::Json {
            path: self.path.clone(),
            source,
        })?;
        std::fs::write(&self.path, content).map_err(|source| AppError::write(&self.path, source))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn entries(&self) -> &[FavoriteEntry] {
        &self.entries
    }

    /// Look an entry up by its volume path, falling back to its mount point.
    pub fn find(&self, key: &str) -> Option<&FavoriteEntry> {
        self.entries
            .iter()
            .find(|entry| entry.volume_path == key)
            .or_else(|| {
                self.entries
                    .iter()
                    .find(|entry| entry.mount_point_path == Path::new(key))
            })
    }

    /// Insert `entry`, replacing any entry with the same volume path.
    pub fn upsert(&mut self, entry: FavoriteEntry) {
        match self
            .entries
            .iter_mut()
            .find(|existing| existing.volume_path == entry.volume_path)
        {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn remove(&mut self, volume_path: &str) -> bool {
        let before = self.entries.len();
        self.entries.retain(|entry| entry.volume_path != volume_path);
        self.entries.len() != before
    }
}
