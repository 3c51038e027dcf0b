//! Host integration for vaultmux: platform family, executable discovery,
//! permission probing and application directories.

mod commands;
mod executables;
mod host;
mod paths;

pub use commands::HideWindow;
pub use executables::{find_elevation_tool, find_executable, requires_elevation};
pub use host::Platform;
pub use paths::{AppPaths, AppPathsError};
