use std::path::{Path, PathBuf};

use vaultmux_backend::{
    BackendCapabilities, CommandArgs, CommandResult, Engine, EngineKind, Marker, StatusKind,
    UnmountTarget, VersionCheck, classify,
};
use vaultmux_platform::Platform;

use crate::common::{
    FUSERMOUNT, fsname, fuse_unmount_command, path_arg, split_options, stdin_password,
};

pub const DEFAULT_CREATE_OPTIONS: &str = "--cipher aes-256-gcm --blocksize 32768";

const CAPABILITIES: BackendCapabilities = BackendCapabilities {
    executable_name: "cryfs",
    names: &["cryfs"],
    mount_tags: &["fuse.cryfs"],
    config_file_names: &["cryfs.config", ".cryfs.config"],
    config_file_argument: Some("--config"),
    not_found_code: StatusKind::CryfsNotFound,
    sets_cipher_path: true,
    auto_mounts_on_create: true,
    has_gui_create_options: true,
    requires_elevated_privileges: false,
    has_config_file: true,
    requires_mount_path: true,
    supports_mount_paths_on_windows: false,
    takes_long_to_unlock: true,
    backend_timeout_secs: 0,
    incorrect_password_text: "Did you enter the correct password?",
    version_check: Some(VersionCheck {
        argument: "--version",
        reads_stdout: true,
        line: 0,
        word: 2,
    }),
    release_repository: Some("cryfs/cryfs"),
};

const MARKERS: &[(Marker, StatusKind)] = &[
    (Marker::ExitCode(11), StatusKind::CryfsBadPassword),
    (
        Marker::Text(CAPABILITIES.incorrect_password_text),
        StatusKind::CryfsBadPassword,
    ),
    (Marker::ExitCode(14), StatusKind::CryfsMigrateFileSystem),
    (
        Marker::Text("needs to be migrated"),
        StatusKind::CryfsMigrateFileSystem,
    ),
];

#[derive(Debug, Clone)]
pub struct Cryfs {
    exe: Option<PathBuf>,
    platform: Platform,
    fusermount: PathBuf,
}

impl Cryfs {
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

        let mut argv = vec![
            options.cipher_folder.clone(),
            path_arg(&options.plain_folder),
        ];

        if let Some(minutes) = options.idle_timeout_minutes.filter(|minutes| *minutes > 0) {
            argv.push("--unmount-idle".to_string());
            argv.push(minutes.to_string());
        }
        if let Some(config_file) = &config_file {
            argv.push("--config".to_string());
            argv.push(path_arg(config_file));
        }
        if create {
            let create_options = if options.create_options.trim().is_empty() {
                DEFAULT_CREATE_OPTIONS
            } else {
                options.create_options.as_str()
            };
            argv.extend(split_options(create_options));
        }

        // Everything after `--` goes to FUSE.
        argv.push("--".to_string());
        argv.push("-o".to_string());
        argv.push(fsname(self.name(), &options.cipher_folder));
        if options.read_only {
            argv.push("-o".to_string());
            argv.push("ro".to_string());
        }
        for option in options.mount_options.split(',').filter(|option| !option.is_empty()) {
            argv.push("-o".to_string());
            argv.push(option.to_string());
        }

        // A new volume asks for the password twice.
        let repeat = if create { 2 } else { 1 };

        Ok(CommandResult::new(args.exe, argv)
            .with_env("CRYFS_FRONTEND", "noninteractive")
            .with_env("CRYFS_NO_UPDATE_CHECK", "TRUE")
            .with_stdin(stdin_password(&options.key, repeat))
            .with_config_file(config_file))
    }
}

impl Engine for Cryfs {
    fn kind(&self) -> EngineKind {
        EngineKind::Cryfs
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

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use vaultmux_backend::{CommandArgs, Engine, KeyDelivery, StatusKind, VolumeOptions};
    use vaultmux_platform::Platform;

    use super::Cryfs;

    fn engine() -> Cryfs {
        Cryfs::new(Some(PathBuf::from("/usr/bin/cryfs")), Platform::Linux)
    }

    fn options() -> VolumeOptions {
        VolumeOptions::new("/data/cipher", "/data/plain", "pw".into(), "cryfs")
    }

    #[test]
    fn mount_passes_fuse_options_after_separator() {
        let options = options()
            .with_idle_timeout(10)
            .with_read_only(true)
            .with_mount_options("allow_other,uid=1000");
        let exe = PathBuf::from("/usr/bin/cryfs");

        let command = engine()
            .build_mount_command(&CommandArgs::new(&exe, &options))
            .expect("mount command");

        assert_eq!(
            command.args,
            vec![
                "/data/cipher",
                "/data/plain",
                "--unmount-idle",
                "10",
                "--config",
                "/data/cipher/cryfs.config",
                "--",
                "-o",
                "fsname=cryfs@/data/cipher,subtype=cryfs",
                "-o",
                "ro",
                "-o",
                "allow_other",
                "-o",
                "uid=1000",
            ]
        );
    }

    #[test]
    fn runs_non_interactively_with_password_on_stdin() {
        let options = options();
        let exe = PathBuf::from("/usr/bin/cryfs");

        let command = engine()
            .build_mount_command(&CommandArgs::new(&exe, &options))
            .expect("mount command");

        assert!(
            command
                .env
                .contains(&("CRYFS_FRONTEND".to_string(), "noninteractive".to_string()))
        );
        assert!(
            command
                .env
                .contains(&("CRYFS_NO_UPDATE_CHECK".to_string(), "TRUE".to_string()))
        );
        assert_eq!(command.key_delivery, KeyDelivery::Stdin(b"pw\n".to_vec()));
    }

    #[test]
    fn create_inserts_options_before_separator() {
        let options = options();
        let exe = PathBuf::from("/usr/bin/cryfs");

        let command = engine()
            .build_create_command(&CommandArgs::new(&exe, &options))
            .expect("create command");

        let separator = command
            .args
            .iter()
            .position(|arg| arg == "--")
            .expect("fuse separator");
        assert_eq!(
            &command.args[separator - 4..separator],
            ["--cipher", "aes-256-gcm", "--blocksize", "32768"]
        );
        assert_eq!(command.key_delivery, KeyDelivery::Stdin(b"pw\npw\n".to_vec()));
    }

    #[test]
    fn capabilities_flag_slow_unlock_and_auto_mount() {
        let capabilities = engine().capabilities().clone();

        assert!(capabilities.takes_long_to_unlock);
        assert!(capabilities.auto_mounts_on_create);
    }

    #[test]
    fn classifies_by_exit_code_then_text() {
        let engine = engine();

        assert_eq!(engine.classify_error("", 11), StatusKind::CryfsBadPassword);
        assert_eq!(
            engine.classify_error("Error: Did you enter the correct password?", 1),
            StatusKind::CryfsBadPassword
        );
        assert_eq!(engine.classify_error("", 14), StatusKind::CryfsMigrateFileSystem);
        assert_eq!(
            engine.classify_error("This filesystem needs to be migrated.", 1),
            StatusKind::CryfsMigrateFileSystem
        );
        assert_eq!(engine.classify_error("Invalid arguments", 1), StatusKind::BackendFail);
    }
}
