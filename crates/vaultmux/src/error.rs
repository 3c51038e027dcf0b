use std::path::PathBuf;

use thiserror::Error;

use vaultmux_backend::BackendError;
use vaultmux_platform::AppPathsError;

/// Failures of the command line front end. Volume outcomes are reported as
/// statuses instead.
#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Paths(#[from] AppPathsError),

    #[error("Failed to read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid JSON in {}: {source}", path.display())]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to read the key from stdin: {0}")]
    Key(#[source] std::io::Error),

    #[error("Missing {0}; pass it explicitly or use --favorite")]
    MissingArgument(&'static str),

    #[error("No favorite matches {0}")]
    UnknownFavorite(String),

    #[error("No supported backend is called {0:?}")]
    UnknownBackend(String),

    #[error("Failed to build the HTTP client: {0}")]
    HttpClient(#[source] reqwest::Error),

    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl AppError {
    pub fn read(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Read {
            path: path.into(),
            source,
        }
    }

    pub fn write(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Write {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use vaultmux_backend::BackendError;
    use vaultmux_platform::AppPathsError;

    use super::AppError;

    #[test]
    fn io_errors_name_the_file() {
        let error = AppError::read(
            "/home/user/.config/vaultmux/favorites.json",
            io::Error::new(io::ErrorKind::PermissionDenied, "permission denied"),
        );

        assert_eq!(
            error.to_string(),
            "Failed to read /home/user/.config/vaultmux/favorites.json: permission denied"
        );
    }

    #[test]
    fn wrapped_errors_keep_their_message() {
        let error = AppError::from(AppPathsError::ConfigDirUnavailable);
        assert_eq!(error.to_string(), "Could not determine config directory");

        let error = AppError::from(BackendError::Timeout { seconds: 10 });
        assert_eq!(error.to_string(), BackendError::Timeout { seconds: 10 }.to_string());
    }

    #[test]
    fn missing_argument_suggests_favorites() {
        let error = AppError::MissingArgument("mount point");

        assert_eq!(
            error.to_string(),
            "Missing mount point; pass it explicitly or use --favorite"
        );
    }
}
