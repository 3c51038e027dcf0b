use std::path::Path;

use vaultmux_backend::{CommandResult, StatusKind, VolumeKey};
use vaultmux_platform::Platform;

pub(crate) fn fsname(engine: &str, cipher_folder: &str) -> String {
    format!("fsname={engine}@{cipher_folder},subtype={engine}")
}

pub(crate) fn path_arg(path: &Path) -> String {
    path.to_string_lossy().into_owned()
}

/// Key plus newline, `repeat` times.
pub(crate) fn stdin_password(key: &VolumeKey, repeat: usize) -> Vec<u8> {
    let mut payload = Vec::with_capacity((key.as_bytes().len() + 1) * repeat);
    for _ in 0..repeat {
        payload.extend_from_slice(key.as_bytes());
        payload.push(b'\n');
    }
    payload
}

pub(crate) fn split_options(options: &str) -> Vec<String> {
    options.split_whitespace().map(str::to_string).collect()
}

pub(crate) const FUSERMOUNT: &str = "fusermount";

/// FUSE 3 systems only ship `fusermount3`.
pub(crate) const FUSERMOUNT_CANDIDATES: [&str; 2] = ["fusermount3", FUSERMOUNT];

pub(crate) fn fuse_unmount_command(
    platform: Platform,
    fusermount: &Path,
    mount_point: &Path,
) -> Result<CommandResult, StatusKind> {
    match platform {
        Platform::Linux => Ok(CommandResult::new(
            fusermount,
            vec!["-u".to_string(), path_arg(mount_point)],
        )),
        Platform::MacOs => Ok(CommandResult::new("umount", vec![path_arg(mount_point)])),
        // WinFsp mounts go away with the backend process, which the manager
        // tracks and stops instead.
        Platform::Windows => Err(StatusKind::FailedToUnMount),
    }
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn stdin_password_repeats_with_newlines() {
        let key = VolumeKey::from("pw");

        assert_eq!(stdin_password(&key, 1), b"pw\n".to_vec());
        assert_eq!(stdin_password(&key, 2), b"pw\npw\n".to_vec());
    }

    #[test]
    fn split_options_drops_extra_whitespace() {
        assert_eq!(
            split_options("  --cipher aes-256-gcm   --blocksize 32768 "),
            vec!["--cipher", "aes-256-gcm", "--blocksize", "32768"]
        );
        assert!(split_options("").is_empty());
    }

    #[test]
    fn fuse_unmount_depends_on_platform() {
        let mount_point = PathBuf::from("/home/user/plain");
        let fusermount = PathBuf::from("/usr/bin/fusermount3");

        let linux = fuse_unmount_command(Platform::Linux, &fusermount, &mount_point)
            .expect("linux unmount");
        assert_eq!(linux.program, fusermount);
        assert_eq!(linux.args, vec!["-u", "/home/user/plain"]);

        let macos = fuse_unmount_command(Platform::MacOs, &fusermount, &mount_point)
            .expect("macos unmount");
        assert_eq!(macos.program, PathBuf::from("umount"));

        assert_eq!(
            fuse_unmount_command(Platform::Windows, &fusermount, &mount_point),
            Err(StatusKind::FailedToUnMount)
        );
    }

    #[test]
    fn fsname_embeds_engine_and_cipher() {
        assert_eq!(
            fsname("cryfs", "/data/cipher"),
            "fsname=cryfs@/data/cipher,subtype=cryfs"
        );
    }
}
