use log::debug;
use std::path::{Path, PathBuf};

use vaultmux_backend::{
    BackendCapabilities, CommandArgs, CommandResult, Engine, EngineKind, GuiOptions, Marker,
    StatusKind, UnmountTarget, VersionCheck, VolumeOptions, classify,
};
use vaultmux_platform::requires_elevation;

use crate::common::{path_arg, split_options, stdin_password};

pub const DEFAULT_CREATE_OPTIONS: &str = "-o key=passphrase,ecryptfs_cipher=aes,ecryptfs_key_bytes=32,ecryptfs_passthrough=n,ecryptfs_enable_filename_crypto=y";

const CAPABILITIES: BackendCapabilities = BackendCapabilities {
    executable_name: "ecryptfs-simple",
    names: &["ecryptfs"],
    mount_tags: &["ecryptfs"],
    config_file_names: &[".ecryptfs.config", "ecryptfs.config"],
    config_file_argument: Some("-a"),
    not_found_code: StatusKind::EcryptfsSimpleNotFound,
    sets_cipher_path: true,
    auto_mounts_on_create: true,
    has_gui_create_options: true,
    requires_elevated_privileges: true,
    has_config_file: true,
    requires_mount_path: true,
    supports_mount_paths_on_windows: false,
    takes_long_to_unlock: false,
    backend_timeout_secs: 0,
    incorrect_password_text: "error: mount failed",
    version_check: Some(VersionCheck {
        argument: "--version",
        reads_stdout: true,
        line: 1,
        word: 0,
    }),
    release_repository: Some("mhogomchungu/ecryptfs-simple"),
};

// Privilege failures are checked before the password marker: a refused
// elevation also ends with "mount failed".
const MARKERS: &[(Marker, StatusKind)] = &[
    (
        Marker::Text("Operation not permitted"),
        StatusKind::FailedToStartPolkit,
    ),
    (
        Marker::Text(CAPABILITIES.incorrect_password_text),
        StatusKind::EcryptfsBadPassword,
    ),
];

#[derive(Debug, Clone)]
pub struct Ecryptfs {
    exe: Option<PathBuf>,
    requires_elevation: bool,
}

impl Ecryptfs {
    #[must_use]
    pub fn new(exe: Option<PathBuf>) -> Self {
        let requires_elevation = exe.as_deref().is_some_and(requires_elevation);
        debug!("ecryptfs-simple requires elevation: {requires_elevation}");
        Self::with_elevation_requirement(exe, requires_elevation)
    }

    #[must_use]
    pub fn with_elevation_requirement(exe: Option<PathBuf>, requires_elevation: bool) -> Self {
        Self {
            exe,
            requires_elevation,
        }
    }

    fn build(&self, args: &CommandArgs<'_>, create: bool) -> Result<CommandResult, StatusKind> {
        let options = args.options;
        let config_file = self.resolve_config_file_path(options)?;

        let mut argv = Vec::new();

        if options.read_only {
            argv.push("--readonly".to_string());
        }

        if create {
            let create_options = if options.create_options.trim().is_empty() {
                DEFAULT_CREATE_OPTIONS
            } else {
                options.create_options.as_str()
            };
            argv.extend(split_options(create_options));
        } else {
            argv.push("-o".to_string());
            argv.push("key=passphrase".to_string());
        }

        if !options.mount_options.is_empty() {
            argv.push("-o".to_string());
            argv.push(options.mount_options.clone());
        }

        if let Some(config_file) = &config_file {
            argv.push("-a".to_string());
            argv.push(path_arg(config_file));
        }

        argv.push(options.cipher_folder.clone());
        argv.push(path_arg(&options.plain_folder));

        Ok(CommandResult::new(args.exe, argv)
            .with_stdin(stdin_password(&options.key, 1))
            .with_config_file(config_file))
    }
}

fn has_space(path: &str) -> bool {
    path.contains(' ')
}

impl Engine for Ecryptfs {
    fn kind(&self) -> EngineKind {
        EngineKind::Ecryptfs
    }

    fn capabilities(&self) -> &BackendCapabilities {
        &CAPABILITIES
    }

    fn executable(&self) -> Option<&Path> {
        self.exe.as_deref()
    }

    fn requires_elevation(&self) -> bool {
        self.requires_elevation
    }

    fn validate(&self, options: &VolumeOptions, wrapped: bool) -> Result<(), StatusKind> {
        if !wrapped {
            return Ok(());
        }

        let config_has_space = options
            .config_file_path
            .as_deref()
            .is_some_and(|path| has_space(&path.to_string_lossy()));

        if has_space(&options.cipher_folder)
            || has_space(&options.plain_folder.to_string_lossy())
            || config_has_space
        {
            return Err(StatusKind::EcryptfsIllegalPath);
        }

        Ok(())
    }

    fn build_mount_command(&self, args: &CommandArgs<'_>) -> Result<CommandResult, StatusKind> {
        self.build(args, false)
    }

    fn build_create_command(&self, args: &CommandArgs<'_>) -> Result<CommandResult, StatusKind> {
        self.build(args, true)
    }

    fn build_unmount_command(&self, target: &UnmountTarget) -> Result<CommandResult, StatusKind> {
        let exe = self.exe.as_deref().ok_or(StatusKind::EcryptfsSimpleNotFound)?;

        Ok(CommandResult::new(
            exe,
            vec!["-k".to_string(), target.cipher_folder.clone()],
        ))
    }

    fn classify_error(&self, output: &str, exit_code: i32) -> StatusKind {
        classify(MARKERS, output, exit_code)
    }

    fn gui_mount_options(&self) -> GuiOptions {
        GuiOptions::all_disabled()
    }
}
