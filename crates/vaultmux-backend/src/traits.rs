use std::path::{Path, PathBuf};

use crate::status::StatusKind;
use crate::types::{
    BackendCapabilities, CommandArgs, CommandResult, EngineKind, GuiOptions, UnmountTarget,
    VolumeOptions,
};

/// Builders are pure and never run anything.
pub trait Engine: Send + Sync {
    fn kind(&self) -> EngineKind;

    fn capabilities(&self) -> &BackendCapabilities;

    fn executable(&self) -> Option<&Path>;

    fn requires_elevation(&self) -> bool {
        false
    }

    fn build_mount_command(&self, args: &CommandArgs<'_>) -> Result<CommandResult, StatusKind>;

    fn build_create_command(&self, args: &CommandArgs<'_>) -> Result<CommandResult, StatusKind>;

    fn build_unmount_command(&self, target: &UnmountTarget) -> Result<CommandResult, StatusKind>;

    fn classify_error(&self, output: &str, exit_code: i32) -> StatusKind;

    /// `wrapped` is true when the command will run through an elevation tool.
    fn validate(
        &self,
        _options: &VolumeOptions,
        _wrapped: bool,
    ) -> Result<(), StatusKind> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        self.capabilities().name()
    }

    fn config_file_name(&self) -> &'static str {
        self.capabilities().config_file_name()
    }

    fn known(&self) -> bool {
        !self.name().is_empty()
    }

    fn is_installed(&self) -> bool {
        self.executable().is_some()
    }

    fn not_found_code(&self) -> StatusKind {
        self.capabilities().not_found_code
    }

    fn gui_mount_options(&self) -> GuiOptions {
        GuiOptions::all_enabled()
    }

    fn gui_create_options(&self) -> Option<GuiOptions> {
        self.capabilities()
            .has_gui_create_options
            .then(GuiOptions::all_enabled)
    }

    fn resolve_config_file_path(
        &self,
        options: &VolumeOptions,
    ) -> Result<Option<PathBuf>, StatusKind> {
        if !self.capabilities().has_config_file {
            return match options.config_file_path {
                Some(_) => Err(StatusKind::BackendDoesNotSupportCustomConfigPath),
                None => Ok(None),
            };
        }

        Ok(Some(options.config_file_path.clone().unwrap_or_else(|| {
            Path::new(&options.cipher_folder).join(self.config_file_name())
        })))
    }
}
