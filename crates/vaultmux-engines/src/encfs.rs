use std::path::{Path, PathBuf};

use vaultmux_backend::{
    BackendCapabilities, CommandArgs, CommandResult, Engine, EngineKind, Marker, StatusKind,
    UnmountTarget, VersionCheck, classify,
};
use vaultmux_platform::Platform;

use crate::common::{
    FUSERMOUNT, fsname, fuse_unmount_command, path_arg, split_options, stdin_password,
};

pub const DEFAULT_CREATE_OPTIONS: &str = "--standard";

/// encfs has no config flag; the config location travels in this variable.
pub const CONFIG_ENV_VAR: &str = "ENCFS6_CONFIG";

const CAPABILITIES: BackendCapabilities = BackendCapabilities {
    executable_name: "encfs",
    names: &["encfs"],
    mount_tags: &["fuse.encfs"],
    config_file_names: &[".encfs6.xml", "encfs6.xml"],
    config_file_argument: None,
    not_found_code: StatusKind::EncfsNotFound,
    sets_cipher_path: true,
    auto_mounts_on_create: true,
    has_gui_create_options: true,
    requires_elevated_privileges: false,
    has_config_file: true,
    requires_mount_path: true,
    supports_mount_paths_on_windows: false,
    takes_long_to_unlock: false,
    backend_timeout_secs: 0,
    incorrect_password_text: "Error decoding volume key, password incorrect",
    version_check: Some(VersionCheck {
        argument: "--version",
        reads_stdout: false,
        line: 0,
        word: 2,
    }),
    release_repository: Some("vgough/encfs"),
};

const MARKERS: &[(Marker, StatusKind)] = &[(
    Marker::Text(CAPABILITIES.incorrect_password_text),
    StatusKind::EncfsBadPassword,
)];

#[derive(Debug, Clone)]
pub struct Encfs {
    exe: Option<PathBuf>,
    platform: Platform,
    fusermount: PathBuf,
}

impl Encfs {
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

    fn build(&self, args: &CommandArgs<'_>, create: bool) -> Result<CommandResult, StatusKind> {
        let options = args.options;
        let config_file = self.resolve_config_file_path(options)?;

        let mut argv = Vec::new();

        if create {
            let create_options = if options.create_options.trim().is_empty() {
                DEFAULT_CREATE_OPTIONS
            } else {
                options.create_options.as_str()
            };
            argv.extend(split_options(create_options));
        }

        // -S: read the password from stdin.
        argv.push("-S".to_string());

        if let Some(minutes) = options.idle_timeout_minutes.filter(|minutes| *minutes > 0) {
            argv.push(format!("--idle={minutes}"));
        }
        if options.reverse_mode {
            argv.push("--reverse".to_string());
        }

        argv.push(options.cipher_folder.clone());
        argv.push(path_arg(&options.plain_folder));

        argv.push("--".to_string());
        argv.push("-o".to_string());
        argv.push(fsname(self.name(), &options.cipher_folder));
        if options.read_only {
            argv.push("-o".to_string());
            argv.push("ro".to_string());
        }
        if !options.mount_options.is_empty() {
            argv.push("-o".to_string());
            argv.push(options.mount_options.clone());
        }

        let mut command = CommandResult::new(args.exe, argv);
        if let Some(config_file) = &config_file {
            command = command.with_env(CONFIG_ENV_VAR, path_arg(config_file));
        }

        Ok(command
            .with_stdin(stdin_password(&options.key, 1))
            .with_config_file(config_file))
    }
}

impl Engine for Encfs {
    fn kind(&self) -> EngineKind {
        EngineKind::Encfs
    }

    fn capabilities(&self) -> &BackendCapabilities {
        &CAPABILITIES
    }

    fn executable(&self) -> Option<&Path> {
        self.exe.as_deref()
    }

    fn build_mount_command(&self, args: &CommandArgs<'_>) -> Result<CommandResult, StatusKind> {
        self.build(args, false)
    }

    fn build_create_command(&self, args: &CommandArgs<'_>) -> Result<CommandResult, StatusKind> {
        self.build(args, true)
    }

    fn build_unmount_command(&self, target: &UnmountTarget) -> Result<CommandResult, StatusKind> {
        fuse_unmount_command(self.platform, &self.fusermount, &target.mount_point)
    }

    fn classify_error(&self, output: &str, exit_code: i32) -> StatusKind {
        classify(MARKERS, output, exit_code)
    }
}
