mod classify;
mod error;
mod status;
mod traits;
mod types;

pub use classify::{Marker, classify};
pub use error::{BackendError, NetworkStage};
pub use status::{Status, StatusKind, trim_trailing_newlines};
pub use traits::Engine;
pub use types::{
    BackendCapabilities, CommandArgs, CommandResult, EngineKind, FavoriteEntry, GuiOptions,
    KeyDelivery, UnmountTarget, VersionCheck, VolumeKey, VolumeOptions, sanitize_mount_options,
};
