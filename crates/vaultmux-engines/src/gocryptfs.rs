use std::path::{Path, PathBuf};

use vaultmux_backend::{
    BackendCapabilities, CommandArgs, CommandResult, Engine, EngineKind, Marker, StatusKind,
    UnmountTarget, VersionCheck, VolumeOptions, classify,
};
use vaultmux_platform::Platform;

use crate::common::{
    FUSERMOUNT, fsname, fuse_unmount_command, path_arg, split_options, stdin_password,
};

pub const DEFAULT_CREATE_OPTIONS: &str = "-scryptn 16";

const REVERSE_CONFIG_FILE_NAME: &str = ".gocryptfs.reverse.conf";

const CAPABILITIES: BackendCapabilities = BackendCapabilities {
    executable_name: "gocryptfs",
    names: &["gocryptfs", "gocryptfs.reverse", "gocryptfs_reverse"],
    mount_tags: &["fuse.gocryptfs", "fuse.gocryptfs-reverse"],
    config_file_names: &[
        "gocryptfs.conf",
        REVERSE_CONFIG_FILE_NAME,
        "gocryptfs.reverse.conf",
    ],
    config_file_argument: Some("-config"),
    not_found_code: StatusKind::GocryptfsNotFound,
    sets_cipher_path: true,
    auto_mounts_on_create: false,
    has_gui_create_options: true,
    requires_elevated_privileges: false,
    has_config_file: true,
    requires_mount_path: true,
    supports_mount_paths_on_windows: false,
    takes_long_to_unlock: false,
    backend_timeout_secs: 0,
    incorrect_password_text: "Password incorrect.",
    version_check: Some(VersionCheck {
        argument: "--version",
        reads_stdout: true,
        line: 0,
        word: 1,
    }),
    release_repository: Some("rfjakob/gocryptfs"),
};

const MARKERS: &[(Marker, StatusKind)] = &[
    (Marker::ExitCode(12), StatusKind::GocryptfsBadPassword),
    (
        Marker::Text(CAPABILITIES.incorrect_password_text),
        StatusKind::GocryptfsBadPassword,
    ),
];

#[derive(Debug, Clone)]
pub struct Gocryptfs {
    exe: Option<PathBuf>,
    platform: Platform,
    fusermount: PathBuf,
}

impl Gocryptfs {
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

fn is_reverse(options: &VolumeOptions) -> bool {
    options.reverse_mode || options.volume_type.to_ascii_lowercase().contains("reverse")
}

impl Engine for Gocryptfs {
    fn kind(&self) -> EngineKind {
        EngineKind::Gocryptfs
    }

    fn capabilities(&self) -> &BackendCapabilities {
        &CAPABILITIES
    }

    fn executable(&self) -> Option<&Path> {
        self.exe.as_deref()
    }

    fn resolve_config_file_path(
        &self,
        options: &VolumeOptions,
    ) -> Result<Option<PathBuf>, StatusKind> {
        if let Some(path) = &options.config_file_path {
            return Ok(Some(path.clone()));
        }

        let file_name = if is_reverse(options) {
            REVERSE_CONFIG_FILE_NAME
        } else {
            self.config_file_name()
        };

        Ok(Some(Path::new(&options.cipher_folder).join(file_name)))
    }

    fn build_mount_command(&self, args: &CommandArgs<'_>) -> Result<CommandResult, StatusKind> {
        let options = args.options;
        let config_file = self.resolve_config_file_path(options)?;

        let mut argv = vec!["-q".to_string()];

        if is_reverse(options) {
            argv.push("-reverse".to_string());
        }
        if options.read_only {
            argv.push("-ro".to_string());
        }
        if let Some(minutes) = options.idle_timeout_minutes.filter(|minutes| *minutes > 0) {
            argv.push("-idle".to_string());
            argv.push(format!("{minutes}m"));
        }
        if let Some(config_file) = &config_file {
            argv.push("-config".to_string());
            argv.push(path_arg(config_file));
        }

        let mut kernel_options = vec![fsname(self.name(), &options.cipher_folder)];
        if !options.mount_options.is_empty() {
            kernel_options.push(options.mount_options.clone());
        }
        argv.push("-ko".to_string());
        argv.push(kernel_options.join(","));

        argv.push(options.cipher_folder.clone());
        argv.push(path_arg(&options.plain_folder));

        Ok(CommandResult::new(args.exe, argv)
            .with_stdin(stdin_password(&options.key, 1))
            .with_config_file(config_file))
    }

    fn build_create_command(&self, args: &CommandArgs<'_>) -> Result<CommandResult, StatusKind> {
        let options = args.options;
        let config_file = self.resolve_config_file_path(options)?;

        let mut argv = vec!["-init".to_string(), "-q".to_string()];

        if is_reverse(options) {
            argv.push("-reverse".to_string());
        }
        if let Some(config_file) = &config_file {
            argv.push("-config".to_string());
            argv.push(path_arg(config_file));
        }

        let create_options = if options.create_options.trim().is_empty() {
            DEFAULT_CREATE_OPTIONS
        } else {
            options.create_options.as_str()
        };
        argv.extend(split_options(create_options));
        argv.push(options.cipher_folder.clone());

        Ok(CommandResult::new(args.exe, argv)
            .with_stdin(stdin_password(&options.key, 1))
            .with_config_file(config_file))
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

    use super::Gocryptfs;

    fn engine() -> Gocryptfs {
        Gocryptfs::new(Some(PathBuf::from("/usr/bin/gocryptfs")), Platform::Linux)
    }

    fn options(volume_type: &str) -> VolumeOptions {
        VolumeOptions::new("/data/cipher", "/data/plain", "pw".into(), volume_type)
    }

    #[test]
    fn mount_command_carries_idle_and_kernel_options() {
        let options = options("gocryptfs")
            .with_idle_timeout(15)
            .with_read_only(true)
            .with_mount_options("allow_other");
        let exe = PathBuf::from("/usr/bin/gocryptfs");

        let command = engine()
            .build_mount_command(&CommandArgs::new(&exe, &options))
            .expect("mount command");

        assert_eq!(
            command.args,
            vec![
                "-q",
                "-ro",
                "-idle",
                "15m",
                "-config",
                "/data/cipher/gocryptfs.conf",
                "-ko",
                "fsname=gocryptfs@/data/cipher,subtype=gocryptfs,allow_other",
                "/data/cipher",
                "/data/plain",
            ]
        );
        assert_eq!(command.key_delivery, KeyDelivery::Stdin(b"pw\n".to_vec()));
    }

    #[test]
    fn zero_idle_timeout_is_omitted() {
        let options = options("gocryptfs").with_idle_timeout(0);
        let exe = PathBuf::from("/usr/bin/gocryptfs");

        let command = engine()
            .build_mount_command(&CommandArgs::new(&exe, &options))
            .expect("mount command");

        assert!(!command.args.iter().any(|arg| arg == "-idle"));
    }

    #[test]
    fn reverse_type_switches_flag_and_config_name() {
        let options = options("gocryptfs.reverse");
        let exe = PathBuf::from("/usr/bin/gocryptfs");

        let command = engine()
            .build_mount_command(&CommandArgs::new(&exe, &options))
            .expect("mount command");

        assert_eq!(&command.args[..2], ["-q", "-reverse"]);
        assert_eq!(
            command.config_file_path,
            Some(PathBuf::from("/data/cipher/.gocryptfs.reverse.conf"))
        );
    }

    #[test]
    fn reverse_flag_works_with_plain_type() {
        let options = options("gocryptfs").with_reverse_mode(true);
        let exe = PathBuf::from("/usr/bin/gocryptfs");

        let command = engine()
            .build_create_command(&CommandArgs::new(&exe, &options))
            .expect("create command");

        assert_eq!(
            command.args,
            vec![
                "-init",
                "-q",
                "-reverse",
                "-config",
                "/data/cipher/.gocryptfs.reverse.conf",
                "-scryptn",
                "16",
                "/data/cipher",
            ]
        );
    }

    #[test]
    fn explicit_config_path_wins_over_reverse_default() {
        let options = options("gocryptfs_reverse").with_config_file("/etc/vault.conf");

        assert_eq!(
            engine().resolve_config_file_path(&options),
            Ok(Some(PathBuf::from("/etc/vault.conf")))
        );
    }

    #[test]
    fn exit_code_twelve_means_bad_password() {
        let engine = engine();

        assert_eq!(engine.classify_error("", 12), StatusKind::GocryptfsBadPassword);
        assert_eq!(
            engine.classify_error("Password incorrect.\n", 1),
            StatusKind::GocryptfsBadPassword
        );
        assert_eq!(engine.classify_error("fuse: device not found", 1), StatusKind::BackendFail);
    }
}
