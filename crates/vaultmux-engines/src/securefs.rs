use std::path::{Path, PathBuf};

use vaultmux_backend::{
    BackendCapabilities, CommandArgs, CommandResult, Engine, EngineKind, Marker, StatusKind,
    UnmountTarget, VersionCheck, classify,
};
use vaultmux_platform::Platform;

use crate::common::{
    FUSERMOUNT, fsname, fuse_unmount_command, path_arg, split_options, stdin_password,
};

pub const DEFAULT_CREATE_OPTIONS: &str = "--format 4";

const CAPABILITIES: BackendCapabilities = BackendCapabilities {
    executable_name: "securefs",
    names: &["securefs"],
    mount_tags: &["fuse.securefs"],
    config_file_names: &[".securefs.json", "securefs.json"],
    config_file_argument: Some("--config"),
    not_found_code: StatusKind::SecurefsNotFound,
    sets_cipher_path: true,
    auto_mounts_on_create: false,
    has_gui_create_options: true,
    requires_elevated_privileges: false,
    has_config_file: true,
    requires_mount_path: true,
    supports_mount_paths_on_windows: true,
    takes_long_to_unlock: false,
    backend_timeout_secs: 0,
    incorrect_password_text: "Invalid password",
    version_check: Some(VersionCheck {
        argument: "--version",
        reads_stdout: true,
        line: 0,
        word: 1,
    }),
    release_repository: Some("netheril96/securefs"),
};

const MARKERS: &[(Marker, StatusKind)] = &[
    (
        Marker::Text(CAPABILITIES.incorrect_password_text),
        StatusKind::SecurefsBadPassword,
    ),
    (Marker::Text("Error decrypting"), StatusKind::SecurefsBadPassword),
    (Marker::Text("cannot load WinFsp"), StatusKind::FailedToLoadWinfsp),
];

#[derive(Debug, Clone)]
pub struct Securefs {
    exe: Option<PathBuf>,
    platform: Platform,
    fusermount: PathBuf,
}

impl Securefs {
    #[must_use]
    pub fn new(exe: Option<PathBuf>, platform: Platform) -> Self {
        Self {
            exe,
            platform,
            fusermount: PathBuf::from(FUSERMOUNT),
        }
    }

    #[must_use]
    pub fn with_fusermount(mut self, fusermount: PathBuf) -> Self {
        self.fusermount = fusermount;
        self
    }
}

impl Engine for Securefs {
    fn kind(&self) -> EngineKind {
        EngineKind::Securefs
    }

    fn capabilities(&self) -> &BackendCapabilities {
        &CAPABILITIES
    }

    fn executable(&self) -> Option<&Path> {
        self.exe.as_deref()
    }

    fn build_mount_command(&self, args: &CommandArgs<'_>) -> Result<CommandResult, StatusKind> {
        let options = args.options;
        let config_file = self.resolve_config_file_path(options)?;

        let mut argv = vec!["mount".to_string()];

        // Runs in the background so the caller's process returns once mounted.
        if self.platform != Platform::Windows {
            argv.push("-b".to_string());
        }

        if let Some(config_file) = &config_file {
            argv.push("--config".to_string());
            argv.push(path_arg(config_file));
        }

        let mut mount_options = Vec::new();
        if self.platform != Platform::Windows {
            mount_options.push(fsname(self.name(), &options.cipher_folder));
        }
        if options.read_only {
            mount_options.push("ro".to_string());
        }
        if !options.mount_options.is_empty() {
            mount_options.push(options.mount_options.clone());
        }
        if !mount_options.is_empty() {
            argv.push("-o".to_string());
            argv.push(mount_options.join(","));
        }

        argv.push(options.cipher_folder.clone());
        argv.push(path_arg(&options.plain_folder));

        Ok(CommandResult::new(args.exe, argv)
            .with_stdin(stdin_password(&options.key, 1))
            .with_config_file(config_file))
    }

    fn build_create_command(&self, args: &CommandArgs<'_>) -> Result<CommandResult, StatusKind> {
        let options = args.options;
        let config_file = self.resolve_config_file_path(options)?;

        let mut argv = vec!["create".to_string()];

        if let Some(config_file) = &config_file {
            argv.push("--config".to_string());
            argv.push(path_arg(config_file));
        }

        let create_options = if options.create_options.trim().is_empty() {
            DEFAULT_CREATE_OPTIONS
        } else {
            options.create_options.as_str()
        };
        argv.extend(split_options(create_options));
        argv.push(options.cipher_folder.clone());

        // Password plus confirmation.
        Ok(CommandResult::new(args.exe, argv)
            .with_stdin(stdin_password(&options.key, 2))
            .with_config_file(config_file))
    }

    fn build_unmount_command(&self, target: &UnmountTarget) -> Result<CommandResult, StatusKind> {
        fuse_unmount_command(self.platform, &self.fusermount, &target.mount_point)
    }

    fn classify_error(&self, output: &str, exit_code: i32) -> StatusKind {
        classify(MARKERS, output, exit_code)
    }
}
