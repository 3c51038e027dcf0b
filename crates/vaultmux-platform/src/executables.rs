use log::debug;
use std::path::{Path, PathBuf};
use which::which;

const ELEVATION_TOOL: &str = "su";

/// Locate a backend executable on `PATH`, then in the usual install
/// directories.
#[must_use]
pub fn find_executable(name: &str) -> Option<PathBuf> {
    if name.is_empty() {
        return None;
    }

    if let Ok(path) = which(name) {
        debug!("Found {name} on PATH at {}", path.display());
        return Some(path);
    }

    let found = common_executable_dirs()
        .into_iter()
        .map(|dir| dir.join(executable_file_name(name)))
        .find(|candidate| candidate.is_file());

    match &found {
        Some(path) => debug!("Found {name} at {}", path.display()),
        None => debug!("{name} not found"),
    }

    found
}

/// Locate the helper used to run commands with elevated privileges.
#[must_use]
pub fn find_elevation_tool() -> Option<PathBuf> {
    find_executable(ELEVATION_TOOL)
}

/// Whether `path` has to be run through an elevation helper: true unless the
/// file is owned by root and has the setuid bit set.
#[cfg(target_os = "linux")]
#[must_use]
pub fn requires_elevation(path: &Path) -> bool {
    use std::os::unix::fs::MetadataExt;

    const S_ISUID: u32 = 0o4000;

    match std::fs::metadata(path) {
        Ok(metadata) => {
            let root_owner = metadata.uid() == 0;
            let is_suid = metadata.mode() & S_ISUID != 0;
            !(root_owner && is_suid)
        }
        Err(error) => {
            debug!("Could not stat {}: {error}", path.display());
            true
        }
    }
}

#[cfg(not(target_os = "linux"))]
#[must_use]
pub fn requires_elevation(_path: &Path) -> bool {
    false
}

fn executable_file_name(name: &str) -> String {
    if cfg!(windows) {
        format!("{name}.exe")
    } else {
        name.to_string()
    }
}

fn common_executable_dirs() -> Vec<PathBuf> {
    let mut paths = Vec::new();

    #[cfg(unix)]
    {
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".local").join("bin"));
            paths.push(home.join("bin"));
        }

        #[cfg(target_os = "macos")]
        {
            paths.push(PathBuf::from("/opt/homebrew/bin"));
        }

        paths.push(PathBuf::from("/usr/local/bin"));
        paths.push(PathBuf::from("/usr/bin"));
        paths.push(PathBuf::from("/usr/sbin"));
        paths.push(PathBuf::from("/bin"));
        paths.push(PathBuf::from("/sbin"));
    }

    #[cfg(windows)]
    {
        if let Some(local_app_data) = dirs::data_local_dir() {
            paths.push(local_app_data.join("Programs").join("securefs"));
        }
        paths.push(PathBuf::from(r"C:\Program Files\SSHFS-Win\bin"));
        paths.push(PathBuf::from(r"C:\Program Files (x86)\SSHFS-Win\bin"));
        paths.push(PathBuf::from(r"C:\Program Files\Encfs"));
    }

    paths
}
