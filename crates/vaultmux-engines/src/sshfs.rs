use std::path::{Path, PathBuf};

use vaultmux_backend::{
    BackendCapabilities, CommandArgs, CommandResult, Engine, EngineKind, GuiOptions, Marker,
    StatusKind, UnmountTarget, VersionCheck, classify,
};
use vaultmux_platform::Platform;

use crate::common::{FUSERMOUNT, fsname, fuse_unmount_command, path_arg, stdin_password};

const CAPABILITIES: BackendCapabilities = BackendCapabilities {
    executable_name: "sshfs",
    names: &["sshfs"],
    mount_tags: &["fuse.sshfs"],
    config_file_names: &[],
    config_file_argument: None,
    not_found_code: StatusKind::SshfsNotFound,
    sets_cipher_path: false,
    auto_mounts_on_create: true,
    has_gui_create_options: false,
    requires_elevated_privileges: false,
    has_config_file: false,
    requires_mount_path: true,
    supports_mount_paths_on_windows: true,
    takes_long_to_unlock: false,
    backend_timeout_secs: 0,
    incorrect_password_text: "Permission denied",
    version_check: Some(VersionCheck {
        argument: "--version",
        reads_stdout: true,
        line: 0,
        word: 2,
    }),
    release_repository: Some("libfuse/sshfs"),
};

const MARKERS: &[(Marker, StatusKind)] = &[
    (
        Marker::Text(CAPABILITIES.incorrect_password_text),
        StatusKind::SshfsBadPassword,
    ),
    (
        Marker::Text("read: Connection reset by peer"),
        StatusKind::SshfsBadPassword,
    ),
    (Marker::Text("WinFsp"), StatusKind::FailedToLoadWinfsp),
];

/// Remote directories over SSH. The "cipher folder" is `user@host:/path`.
#[derive(Debug, Clone)]
pub struct Sshfs {
    exe: Option<PathBuf>,
    platform: Platform,
    fusermount: PathBuf,
}

impl Sshfs {
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

impl Engine for Sshfs {
    fn kind(&self) -> EngineKind {
        EngineKind::Sshfs
    }

    fn capabilities(&self) -> &BackendCapabilities {
        &CAPABILITIES
    }

    fn executable(&self) -> Option<&Path> {
        self.exe.as_deref()
    }

    fn build_mount_command(&self, args: &CommandArgs<'_>) -> Result<CommandResult, StatusKind> {
        let options = args.options;
        // Rejects a custom config path.
        self.resolve_config_file_path(options)?;

        let has_password = !options.key.is_empty();

        let mut mount_options = Vec::new();
        if has_password {
            mount_options.push("password_stdin".to_string());
        }
        mount_options.push(fsname(self.name(), &options.cipher_folder));
        if options.read_only {
            mount_options.push("ro".to_string());
        }
        if !options.mount_options.is_empty() {
            mount_options.push(options.mount_options.clone());
        }

        let argv = vec![
            options.cipher_folder.clone(),
            path_arg(&options.plain_folder),
            "-o".to_string(),
            mount_options.join(","),
        ];

        let command = CommandResult::new(args.exe, argv);

        // Without a password sshfs falls back to key-based authentication.
        Ok(if has_password {
            command.with_stdin(stdin_password(&options.key, 1))
        } else {
            command
        })
    }

    fn build_create_command(&self, args: &CommandArgs<'_>) -> Result<CommandResult, StatusKind> {
        self.build_mount_command(args)
    }

    fn build_unmount_command(&self, target: &UnmountTarget) -> Result<CommandResult, StatusKind> {
        fuse_unmount_command(self.platform, &self.fusermount, &target.mount_point)
    }

    fn classify_error(&self, output: &str, exit_code: i32) -> StatusKind {
        classify(MARKERS, output, exit_code)
    }

    fn gui_mount_options(&self) -> GuiOptions {
        GuiOptions {
            enable_config_file: false,
            enable_idle_time: false,
            ..GuiOptions::all_enabled()
        }
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use vaultmux_backend::{CommandArgs, Engine, KeyDelivery, StatusKind, VolumeKey, VolumeOptions};
    use vaultmux_platform::Platform;

    use super::Sshfs;

    fn engine() -> Sshfs {
        Sshfs::new(Some(PathBuf::from("/usr/bin/sshfs")), Platform::Linux)
    }

    #[test]
    fn password_selects_password_stdin() {
        let options = VolumeOptions::new("me@host:/srv", "/mnt/srv", "pw".into(), "sshfs")
            .with_mount_options("reconnect,idmap=user");
        let exe = PathBuf::from("/usr/bin/sshfs");

        let command = engine()
            .build_mount_command(&CommandArgs::new(&exe, &options))
            .expect("mount command");

        assert_eq!(
            command.args,
            vec![
                "me@host:/srv",
                "/mnt/srv",
                "-o",
                "password_stdin,fsname=sshfs@me@host:/srv,subtype=sshfs,reconnect,idmap=user",
            ]
        );
        assert_eq!(command.key_delivery, KeyDelivery::Stdin(b"pw\n".to_vec()));
        assert!(command.config_file_path.is_none());
    }

    #[test]
    fn empty_key_uses_ssh_keys() {
        let options =
            VolumeOptions::new("me@host:/srv", "/mnt/srv", VolumeKey::default(), "sshfs")
                .with_read_only(true);
        let exe = PathBuf::from("/usr/bin/sshfs");

        let command = engine()
            .build_mount_command(&CommandArgs::new(&exe, &options))
            .expect("mount command");

        assert_eq!(command.args[3], "fsname=sshfs@me@host:/srv,subtype=sshfs,ro");
        assert_eq!(command.key_delivery, KeyDelivery::None);
    }

    #[test]
    fn custom_config_path_is_rejected() {
        let options = VolumeOptions::new("me@host:/srv", "/mnt/srv", "pw".into(), "sshfs")
            .with_config_file("/tmp/ssh.conf");
        let exe = PathBuf::from("/usr/bin/sshfs");

        assert_eq!(
            engine().build_mount_command(&CommandArgs::new(&exe, &options)),
            Err(StatusKind::BackendDoesNotSupportCustomConfigPath)
        );
    }

    #[test]
    fn mount_dialog_hides_config_and_idle() {
        let gui = engine().gui_mount_options();

        assert!(!gui.enable_config_file);
        assert!(!gui.enable_idle_time);
        assert!(gui.enable_mount_options);
        assert!(engine().gui_create_options().is_none());
    }

    #[test]
    fn classifies_auth_and_winfsp_failures() {
        let engine = engine();

        assert_eq!(
            engine.classify_error("me@host: Permission denied (publickey).", 1),
            StatusKind::SshfsBadPassword
        );
        assert_eq!(
            engine.classify_error("read: Connection reset by peer", 255),
            StatusKind::SshfsBadPassword
        );
        assert_eq!(
            engine.classify_error("The service WinFsp failed to start", 1),
            StatusKind::FailedToLoadWinfsp
        );
        assert_eq!(engine.classify_error("No route to host", 255), StatusKind::BackendFail);
    }
}
