mod common;
mod cryfs;
mod ecryptfs;
mod encfs;
mod gocryptfs;
mod registry;
mod securefs;
mod sshfs;
mod unknown;

pub use cryfs::Cryfs;
pub use ecryptfs::Ecryptfs;
pub use encfs::Encfs;
pub use gocryptfs::Gocryptfs;
pub use registry::Engines;
pub use securefs::Securefs;
pub use sshfs::Sshfs;
pub use unknown::UnknownEngine;
