mod elevation;
mod executor;
mod session;
mod unmount;
mod update;
mod version;

pub use elevation::{Elevation, wrap};
pub use executor::{Launch, ProcessExecutor, ProcessOutput, RunningBackend, TokioExecutor};
pub use session::VolumeManager;
pub use unmount::{DEFAULT_ATTEMPTS, RETRY_DELAY, UnmountOutcome, unmount_with_retry};
pub use update::{BackendUpdate, GitHubRelease, check_for_backend_update, is_newer_version};
pub use version::installed_version;
