use std::fmt;

const BACKEND_FAIL_PREAMBLE: &str =
    "Failed To Complete The Task And Below Log was Generated By The Backend.\n";
const BACKEND_FAIL_SEPARATOR: &str = "\n----------------------------------------\n";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    Success,
    VolumeCreatedSuccessfully,
    CryfsBadPassword,
    EncfsBadPassword,
    GocryptfsBadPassword,
    EcryptfsBadPassword,
    SecurefsBadPassword,
    SshfsBadPassword,
    CryfsNotFound,
    EncfsNotFound,
    GocryptfsNotFound,
    EcryptfsSimpleNotFound,
    SecurefsNotFound,
    SshfsNotFound,
    CryfsMigrateFileSystem,
    EcryptfsIllegalPath,
    EcryptfsBadExePermissions,
    FailedToCreateMountPoint,
    FailedToLoadWinfsp,
    FailedToStartPolkit,
    FailedToUnMount,
    BackendDoesNotSupportCustomConfigPath,
    Unknown,
    BackendFail,
}

impl StatusKind {
    #[must_use]
    pub const fn is_success(self) -> bool {
        matches!(self, Self::Success | Self::VolumeCreatedSuccessfully)
    }

    #[must_use]
    pub const fn is_bad_password(self) -> bool {
        matches!(
            self,
            Self::CryfsBadPassword
                | Self::EncfsBadPassword
                | Self::GocryptfsBadPassword
                | Self::EcryptfsBadPassword
                | Self::SecurefsBadPassword
                | Self::SshfsBadPassword
        )
    }

    #[must_use]
    pub const fn is_not_found(self) -> bool {
        matches!(
            self,
            Self::CryfsNotFound
                | Self::EncfsNotFound
                | Self::GocryptfsNotFound
                | Self::EcryptfsSimpleNotFound
                | Self::SecurefsNotFound
                | Self::SshfsNotFound
        )
    }

    #[must_use]
    pub const fn fixed_message(self) -> Option<&'static str> {
        let text = match self {
            Self::Success => "Success",
            Self::VolumeCreatedSuccessfully => "Volume Created Successfully.",
            Self::CryfsBadPassword => "Failed To Unlock A Cryfs Volume.\nWrong Password Entered.",
            Self::SshfsBadPassword => {
                "Failed To Connect To The Remote Computer.\nWrong Password Entered."
            }
            Self::EncfsBadPassword => "Failed To Unlock An Encfs Volume.\nWrong Password Entered.",
            Self::GocryptfsBadPassword => {
                "Failed To Unlock A Gocryptfs Volume.\nWrong Password Entered."
            }
            Self::EcryptfsBadPassword => {
                "Failed To Unlock An Ecryptfs Volume.\nWrong Password Entered."
            }
            Self::SecurefsBadPassword => {
                "Failed To Unlock A Securefs Volume.\nWrong Password Entered."
            }
            Self::EcryptfsIllegalPath => {
                "A Space Character Is Not Allowed In Paths When Using Ecryptfs Backend And Polkit."
            }
            Self::EcryptfsBadExePermissions => {
                "This Backend Requires Root's Privileges And An attempt To Acquire Them Has Failed."
            }
            Self::SshfsNotFound => {
                "Failed To Complete The Request.\nSshfs Executable Could Not Be Found."
            }
            Self::BackendDoesNotSupportCustomConfigPath => {
                "Backend Does Not Support Custom Configuration File Path."
            }
            Self::CryfsNotFound => {
                "Failed To Complete The Request.\nCryfs Executable Could Not Be Found."
            }
            Self::CryfsMigrateFileSystem => {
                "This Volume Of Cryfs Needs To Be Upgraded To Work With The Version Of Cryfs You Are Using.\n\nThe Upgrade is IRREVERSIBLE And The Volume Will No Longer Work With Older Versions of Cryfs.\n\nTo Do The Upgrade, Check The \"Upgrade File System\" Option And Unlock The Volume Again."
            }
            Self::EncfsNotFound => {
                "Failed To Complete The Request.\nEncfs Executable Could Not Be Found."
            }
            Self::EcryptfsSimpleNotFound => {
                "Failed To Complete The Request.\nEcryptfs-simple Executable Could Not Be Found."
            }
            Self::GocryptfsNotFound => {
                "Failed To Complete The Request.\nGocryptfs Executable Could Not Be Found."
            }
            Self::SecurefsNotFound => {
                "Failed To Complete The Request.\nSecurefs Executable Could Not Be Found."
            }
            Self::FailedToCreateMountPoint => "Failed To Create Mount Point.",
            Self::FailedToLoadWinfsp => {
                "Backend Could Not Load WinFsp. Please Make Sure You Have WinFsp Properly Installed"
            }
            Self::FailedToStartPolkit => {
                "Failed To Acquire Root's Privileges.\nThe Privilege Escalation Helper Could Not Be Started."
            }
            Self::FailedToUnMount => "Failed To Unmount The Volume.\nIt May Still Be In Use.",
            Self::Unknown => "Failed To Unlock The Volume.\nNot Supported Volume Encountered.",
            Self::BackendFail => return None,
        };
        Some(text)
    }
}

/// Two statuses compare equal when their kinds match.
#[derive(Debug, Clone)]
pub struct Status {
    kind: StatusKind,
    exit_code: Option<i32>,
    message: String,
}

impl Status {
    #[must_use]
    pub fn new(kind: StatusKind) -> Self {
        Self {
            kind,
            exit_code: None,
            message: String::new(),
        }
    }

    #[must_use]
    pub fn with_output(kind: StatusKind, exit_code: i32, message: &str) -> Self {
        Self {
            kind,
            exit_code: Some(exit_code),
            message: trim_trailing_newlines(message).to_string(),
        }
    }

    #[must_use]
    pub fn with_message(kind: StatusKind, message: &str) -> Self {
        Self {
            kind,
            exit_code: None,
            message: trim_trailing_newlines(message).to_string(),
        }
    }

    #[must_use]
    pub fn kind(&self) -> StatusKind {
        self.kind
    }

    #[must_use]
    pub fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    #[must_use]
    pub fn message(&self) -> &str {
        &self.message
    }

    #[must_use]
    pub fn is_success(&self) -> bool {
        self.kind.is_success()
    }

    /// Calling this on `Success` trips a debug assertion.
    #[must_use]
    pub fn to_user_string(&self) -> String {
        debug_assert!(
            self.kind != StatusKind::Success,
            "a successful status has no user-facing message"
        );

        match self.kind.fixed_message() {
            Some(text) => text.to_string(),
            None => format!("{BACKEND_FAIL_PREAMBLE}{BACKEND_FAIL_SEPARATOR}{}", self.message),
        }
    }
}

impl PartialEq for Status {
    fn eq(&self, other: &Self) -> bool {
        self.kind == other.kind
    }
}

impl Eq for Status {}

impl PartialEq<StatusKind> for Status {
    fn eq(&self, other: &StatusKind) -> bool {
        self.kind == *other
    }
}

impl From<StatusKind> for Status {
    fn from(kind: StatusKind) -> Self {
        Self::new(kind)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_user_string())
    }
}

#[must_use]
pub fn trim_trailing_newlines(message: &str) -> &str {
    message.trim_end_matches('\n')
}
