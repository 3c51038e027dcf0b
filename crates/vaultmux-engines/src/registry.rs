use std::path::PathBuf;
use std::sync::Arc;

use log::debug;

use vaultmux_backend::{Engine, EngineKind};
use vaultmux_platform::{Platform, find_executable};

use crate::common::{FUSERMOUNT, FUSERMOUNT_CANDIDATES};
use crate::cryfs::Cryfs;
use crate::ecryptfs::Ecryptfs;
use crate::encfs::Encfs;
use crate::gocryptfs::Gocryptfs;
use crate::securefs::Securefs;
use crate::sshfs::Sshfs;
use crate::unknown::UnknownEngine;

pub struct Engines {
    engines: Vec<Arc<dyn Engine>>,
    platform: Platform,
}

impl Engines {
    #[must_use]
    pub fn detect() -> Self {
        Self::with_resolver(Platform::current(), find_executable)
    }

    /// Backends the platform does not support are registered without an executable.
    pub fn with_resolver<F>(platform: Platform, resolve: F) -> Self
    where
        F: Fn(&str) -> Option<PathBuf>,
    {
        let supported = Self::supported(platform);
        let lookup = |kind: EngineKind, executable_name: &str| {
            if !supported.contains(&kind) {
                return None;
            }
            let path = resolve(executable_name);
            debug!("{kind} executable: {path:?}");
            path
        };

        let fusermount = if platform == Platform::Linux {
            FUSERMOUNT_CANDIDATES.iter().find_map(|name| resolve(name))
        } else {
            None
        }
        .unwrap_or_else(|| PathBuf::from(FUSERMOUNT));
        debug!("FUSE unmount helper: {}", fusermount.display());

        let engines: Vec<Arc<dyn Engine>> = vec![
            Arc::new(UnknownEngine::new()),
            Arc::new(
                Securefs::new(lookup(EngineKind::Securefs, "securefs"), platform)
                    .with_fusermount(fusermount.clone()),
            ),
            Arc::new(
                Gocryptfs::new(lookup(EngineKind::Gocryptfs, "gocryptfs"), platform)
                    .with_fusermount(fusermount.clone()),
            ),
            Arc::new(
                Cryfs::new(lookup(EngineKind::Cryfs, "cryfs"), platform)
                    .with_fusermount(fusermount.clone()),
            ),
            Arc::new(
                Encfs::new(lookup(EngineKind::Encfs, "encfs"), platform)
                    .with_fusermount(fusermount.clone()),
            ),
            Arc::new(Ecryptfs::new(lookup(
                EngineKind::Ecryptfs,
                "ecryptfs-simple",
            ))),
            Arc::new(
                Sshfs::new(lookup(EngineKind::Sshfs, "sshfs"), platform).with_fusermount(fusermount),
            ),
        ];

        Self { engines, platform }
    }

    #[must_use]
    pub fn from_engines(platform: Platform, mut engines: Vec<Arc<dyn Engine>>) -> Self {
        engines.insert(0, Arc::new(UnknownEngine::new()));
        Self { engines, platform }
    }

    #[must_use]
    pub fn supported(platform: Platform) -> &'static [EngineKind] {
        match platform {
            Platform::Windows => &[EngineKind::Securefs, EngineKind::Encfs, EngineKind::Sshfs],
            Platform::MacOs => &[
                EngineKind::Cryfs,
                EngineKind::Gocryptfs,
                EngineKind::Securefs,
                EngineKind::Encfs,
            ],
            Platform::Linux => &[
                EngineKind::Securefs,
                EngineKind::Gocryptfs,
                EngineKind::Cryfs,
                EngineKind::Encfs,
                EngineKind::Ecryptfs,
                EngineKind::Sshfs,
            ],
        }
    }

    #[must_use]
    pub fn platform(&self) -> Platform {
        self.platform
    }

    #[must_use]
    pub fn supported_engines(&self) -> &'static [EngineKind] {
        Self::supported(self.platform)
    }

    #[must_use]
    pub fn resolve_by_name(&self, name: &str) -> &Arc<dyn Engine> {
        self.find(|engine| engine.capabilities().matches_name(name))
    }

    #[must_use]
    pub fn resolve_by_mount_tag(&self, tag: &str) -> &Arc<dyn Engine> {
        self.find(|engine| engine.capabilities().matches_mount_tag(tag))
    }

    #[must_use]
    pub fn get(&self, kind: EngineKind) -> &Arc<dyn Engine> {
        self.find(|engine| engine.kind() == kind)
    }

    #[must_use]
    pub fn sentinel(&self) -> &Arc<dyn Engine> {
        &self.engines[0]
    }

    /// Registered backends, sentinel excluded.
    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Engine>> {
        self.engines.iter().skip(1)
    }

    fn find<P>(&self, predicate: P) -> &Arc<dyn Engine>
    where
        P: Fn(&Arc<dyn Engine>) -> bool,
    {
        self.iter()
            .find(|engine| predicate(*engine))
            .unwrap_or_else(|| self.sentinel())
    }
}

impl std::fmt::Debug for Engines {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Engines")
            .field("platform", &self.platform)
            .field(
                "engines",
                &self.iter().map(|engine| engine.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}
