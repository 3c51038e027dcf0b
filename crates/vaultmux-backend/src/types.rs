use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

use crate::status::StatusKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    Unknown,
    Securefs,
    Gocryptfs,
    Cryfs,
    Encfs,
    Ecryptfs,
    Sshfs,
}

impl EngineKind {
    pub const ALL: [Self; 7] = [
        Self::Unknown,
        Self::Securefs,
        Self::Gocryptfs,
        Self::Cryfs,
        Self::Encfs,
        Self::Ecryptfs,
        Self::Sshfs,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Unknown => "unknown",
            Self::Securefs => "securefs",
            Self::Gocryptfs => "gocryptfs",
            Self::Cryfs => "cryfs",
            Self::Encfs => "encfs",
            Self::Ecryptfs => "ecryptfs",
            Self::Sshfs => "sshfs",
        }
    }

    #[must_use]
    pub const fn display_name(self) -> &'static str {
        match self {
            Self::Unknown => "Unknown",
            Self::Securefs => "Securefs",
            Self::Gocryptfs => "Gocryptfs",
            Self::Cryfs => "Cryfs",
            Self::Encfs => "Encfs",
            Self::Ecryptfs => "Ecryptfs",
            Self::Sshfs => "Sshfs",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VersionCheck {
    pub argument: &'static str,
    pub reads_stdout: bool,
    pub line: usize,
    pub word: usize,
}

impl VersionCheck {
    #[must_use]
    pub fn extract(&self, stdout: &str, stderr: &str) -> Option<String> {
        let text = if self.reads_stdout { stdout } else { stderr };
        let word = text
            .lines()
            .nth(self.line)?
            .split_whitespace()
            .nth(self.word)?;
        let word = word.trim_end_matches([';', ',']);
        let word = word.strip_prefix('v').unwrap_or(word);

        if word.is_empty() {
            None
        } else {
            Some(word.to_string())
        }
    }
}

#[derive(Debug, Clone)]
#[allow(clippy::struct_excessive_bools)]
pub struct BackendCapabilities {
    pub executable_name: &'static str,
    pub names: &'static [&'static str],
    pub mount_tags: &'static [&'static str],
    pub config_file_names: &'static [&'static str],
    pub config_file_argument: Option<&'static str>,
    pub not_found_code: StatusKind,
    pub sets_cipher_path: bool,
    pub auto_mounts_on_create: bool,
    pub has_gui_create_options: bool,
    pub requires_elevated_privileges: bool,
    pub has_config_file: bool,
    pub requires_mount_path: bool,
    pub supports_mount_paths_on_windows: bool,
    pub takes_long_to_unlock: bool,
    pub backend_timeout_secs: u64,
    pub incorrect_password_text: &'static str,
    pub version_check: Option<VersionCheck>,
    pub release_repository: Option<&'static str>,
}

impl BackendCapabilities {
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.names.first().copied().unwrap_or("")
    }

    #[must_use]
    pub fn config_file_name(&self) -> &'static str {
        self.config_file_names.first().copied().unwrap_or("")
    }

    #[must_use]
    pub fn matches_name(&self, tag: &str) -> bool {
        self.names.iter().any(|name| name.eq_ignore_ascii_case(tag))
    }

    #[must_use]
    pub fn matches_mount_tag(&self, tag: &str) -> bool {
        self.mount_tags
            .iter()
            .any(|mount_tag| mount_tag.eq_ignore_ascii_case(tag))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[allow(clippy::struct_excessive_bools)]
pub struct GuiOptions {
    pub enable_checkbox: bool,
    pub enable_config_file: bool,
    pub enable_idle_time: bool,
    pub enable_mount_options: bool,
    pub enable_key_file: bool,
}

impl GuiOptions {
    #[must_use]
    pub const fn all_enabled() -> Self {
        Self {
            enable_checkbox: true,
            enable_config_file: true,
            enable_idle_time: true,
            enable_mount_options: true,
            enable_key_file: true,
        }
    }

    #[must_use]
    pub const fn all_disabled() -> Self {
        Self {
            enable_checkbox: false,
            enable_config_file: false,
            enable_idle_time: false,
            enable_mount_options: false,
            enable_key_file: false,
        }
    }
}

/// Password or key material. Never printed by `Debug`.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct VolumeKey(Vec<u8>);

impl VolumeKey {
    #[must_use]
    pub fn new(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<&str> for VolumeKey {
    fn from(value: &str) -> Self {
        Self(value.as_bytes().to_vec())
    }
}

impl fmt::Debug for VolumeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("VolumeKey(<redacted>)")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FavoriteEntry {
    pub volume_path: String,
    pub mount_point_path: PathBuf,
    #[serde(default)]
    pub volume_type: String,
    #[serde(default)]
    pub idle_timeout_minutes: Option<u32>,
    #[serde(default)]
    pub config_file_path: Option<PathBuf>,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub reverse_mode: bool,
    #[serde(default)]
    pub mount_options: String,
}

impl FavoriteEntry {
    #[must_use]
    pub fn sanitized_mount_options(&self) -> String {
        sanitize_mount_options(&self.mount_options)
    }
}

#[must_use]
pub fn sanitize_mount_options(raw: &str) -> String {
    let raw = raw.trim();
    let raw = raw.strip_prefix("-o").unwrap_or(raw);

    raw.split(',')
        .map(str::trim)
        .filter(|option| !option.is_empty())
        .collect::<Vec<_>>()
        .join(",")
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct VolumeOptions {
    /// Cipher folder, or `user@host:/path` for sshfs.
    pub cipher_folder: String,
    pub plain_folder: PathBuf,
    pub key: VolumeKey,
    pub idle_timeout_minutes: Option<u32>,
    pub config_file_path: Option<PathBuf>,
    pub volume_type: String,
    pub read_only: bool,
    pub reverse_mode: bool,
    pub mount_options: String,
    pub create_options: String,
}

impl VolumeOptions {
    #[must_use]
    pub fn new(
        cipher_folder: impl Into<String>,
        plain_folder: impl Into<PathBuf>,
        key: VolumeKey,
        volume_type: impl Into<String>,
    ) -> Self {
        Self {
            cipher_folder: cipher_folder.into(),
            plain_folder: plain_folder.into(),
            key,
            volume_type: volume_type.into(),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn from_favorite(entry: &FavoriteEntry, key: VolumeKey) -> Self {
        Self {
            cipher_folder: entry.volume_path.clone(),
            plain_folder: entry.mount_point_path.clone(),
            key,
            idle_timeout_minutes: entry.idle_timeout_minutes,
            config_file_path: entry.config_file_path.clone(),
            volume_type: entry.volume_type.clone(),
            read_only: entry.read_only,
            reverse_mode: entry.reverse_mode,
            mount_options: entry.sanitized_mount_options(),
            create_options: String::new(),
        }
    }

    #[must_use]
    pub fn with_idle_timeout(mut self, minutes: u32) -> Self {
        self.idle_timeout_minutes = Some(minutes);
        self
    }

    #[must_use]
    pub fn with_config_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.config_file_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }

    #[must_use]
    pub fn with_reverse_mode(mut self, reverse_mode: bool) -> Self {
        self.reverse_mode = reverse_mode;
        self
    }

    #[must_use]
    pub fn with_mount_options(mut self, options: &str) -> Self {
        self.mount_options = sanitize_mount_options(options);
        self
    }

    #[must_use]
    pub fn with_create_options(mut self, options: impl Into<String>) -> Self {
        self.create_options = options.into();
        self
    }
}

#[derive(Debug, Clone, Copy)]
pub struct CommandArgs<'a> {
    pub exe: &'a Path,
    pub options: &'a VolumeOptions,
}

impl<'a> CommandArgs<'a> {
    #[must_use]
    pub fn new(exe: &'a Path, options: &'a VolumeOptions) -> Self {
        Self { exe, options }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnmountTarget {
    pub cipher_folder: String,
    pub mount_point: PathBuf,
}

impl UnmountTarget {
    #[must_use]
    pub fn new(cipher_folder: impl Into<String>, mount_point: impl Into<PathBuf>) -> Self {
        Self {
            cipher_folder: cipher_folder.into(),
            mount_point: mount_point.into(),
        }
    }
}

#[derive(Clone, Default, PartialEq, Eq)]
pub enum KeyDelivery {
    #[default]
    None,
    Stdin(Vec<u8>),
}

impl fmt::Debug for KeyDelivery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::Stdin(payload) => write!(f, "Stdin(<{} bytes redacted>)", payload.len()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandResult {
    pub program: PathBuf,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
    pub key_delivery: KeyDelivery,
    pub config_file_path: Option<PathBuf>,
}

impl CommandResult {
    #[must_use]
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
            env: Vec::new(),
            key_delivery: KeyDelivery::None,
            config_file_path: None,
        }
    }

    #[must_use]
    pub fn with_env(mut self, key: &str, value: impl Into<String>) -> Self {
        self.env.push((key.to_string(), value.into()));
        self
    }

    #[must_use]
    pub fn with_stdin(mut self, payload: Vec<u8>) -> Self {
        self.key_delivery = KeyDelivery::Stdin(payload);
        self
    }

    #[must_use]
    pub fn with_config_file(mut self, path: Option<PathBuf>) -> Self {
        self.config_file_path = path;
        self
    }

    #[must_use]
    pub fn stdin_payload(&self) -> Option<&[u8]> {
        match &self.key_delivery {
            KeyDelivery::None => None,
            KeyDelivery::Stdin(payload) => Some(payload),
        }
    }

    /// Tokens containing whitespace are wrapped in double quotes.
    #[must_use]
    pub fn render(&self) -> String {
        let program = self.program.to_string_lossy();
        std::iter::once(program.as_ref())
            .chain(self.args.iter().map(String::as_str))
            .map(quote_token)
            .collect::<Vec<_>>()
            .join(" ")
    }
}

fn quote_token(token: &str) -> String {
    if token.is_empty() || token.chars().any(char::is_whitespace) {
        format!("\"{token}\"")
    } else {
        token.to_string()
    }
}
