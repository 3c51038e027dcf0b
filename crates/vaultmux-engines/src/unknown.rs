use std::path::Path;

use vaultmux_backend::{
    BackendCapabilities, CommandArgs, CommandResult, Engine, EngineKind, GuiOptions, StatusKind,
    UnmountTarget,
};

const CAPABILITIES: BackendCapabilities = BackendCapabilities {
    executable_name: "",
    names: &[],
    mount_tags: &[],
    config_file_names: &[],
    config_file_argument: None,
    not_found_code: StatusKind::Unknown,
    sets_cipher_path: false,
    auto_mounts_on_create: false,
    has_gui_create_options: false,
    requires_elevated_privileges: false,
    has_config_file: false,
    requires_mount_path: false,
    supports_mount_paths_on_windows: false,
    takes_long_to_unlock: false,
    backend_timeout_secs: 0,
    incorrect_password_text: "",
    version_check: None,
    release_repository: None,
};

/// Every operation reports `Unknown`.
#[derive(Debug, Clone, Default)]
pub struct UnknownEngine;

impl UnknownEngine {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Engine for UnknownEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Unknown
    }

    fn capabilities(&self) -> &BackendCapabilities {
        &CAPABILITIES
    }

    fn executable(&self) -> Option<&Path> {
        None
    }

    fn build_mount_command(&self, _args: &CommandArgs<'_>) -> Result<CommandResult, StatusKind> {
        Err(StatusKind::Unknown)
    }

    fn build_create_command(&self, _args: &CommandArgs<'_>) -> Result<CommandResult, StatusKind> {
        Err(StatusKind::Unknown)
    }

    fn build_unmount_command(&self, _target: &UnmountTarget) -> Result<CommandResult, StatusKind> {
        Err(StatusKind::Unknown)
    }

    fn classify_error(&self, _output: &str, _exit_code: i32) -> StatusKind {
        StatusKind::Unknown
    }

    fn gui_mount_options(&self) -> GuiOptions {
        GuiOptions::all_disabled()
    }
}
