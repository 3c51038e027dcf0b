use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use log::{debug, error, info, warn};
use tokio_util::sync::CancellationToken;

use vaultmux_backend::{
    CommandArgs, CommandResult, Engine, Status, StatusKind, UnmountTarget, VolumeOptions,
};
use vaultmux_engines::Engines;
use vaultmux_platform::Platform;

use crate::elevation::Elevation;
use crate::executor::{Launch, ProcessExecutor, ProcessOutput, RunningBackend};
use crate::unmount::unmount_with_retry;

const MOUNT_SETTLE: Duration = Duration::from_secs(5);
const SLOW_MOUNT_SETTLE: Duration = Duration::from_secs(15);

/// Drives volumes end to end; every path ends in a [`Status`].
pub struct VolumeManager {
    engines: Arc<Engines>,
    executor: Arc<dyn ProcessExecutor>,
    elevation: Elevation,
    command_timeout: Option<Duration>,
    // Windows backends keyed by mount point; dropping one stops it.
    running: Mutex<HashMap<PathBuf, Box<dyn RunningBackend>>>,
}

impl VolumeManager {
    #[must_use]
    pub fn new(
        engines: Arc<Engines>,
        executor: Arc<dyn ProcessExecutor>,
        elevation: Elevation,
    ) -> Self {
        Self {
            engines,
            executor,
            elevation,
            command_timeout: None,
            running: Mutex::new(HashMap::new()),
        }
    }

    #[must_use]
    pub fn with_command_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.command_timeout = timeout;
        self
    }

    #[must_use]
    pub fn engines(&self) -> &Engines {
        &self.engines
    }

    #[must_use]
    pub fn elevation(&self) -> &Elevation {
        &self.elevation
    }

    #[must_use]
    pub fn is_running(&self, mount_point: &Path) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(mount_point)
    }

    pub async fn mount(&self, options: &VolumeOptions) -> Status {
        let (engine, exe) = match self.prepare(options).await {
            Ok(prepared) => prepared,
            Err(status) => return status,
        };

        info!(
            "Mounting {} volume {} at {}",
            engine.name(),
            options.cipher_folder,
            options.plain_folder.display()
        );

        self.mount_prepared(engine.as_ref(), &exe, options).await
    }

    pub async fn create(&self, options: &VolumeOptions) -> Status {
        let (engine, exe) = match self.prepare(options).await {
            Ok(prepared) => prepared,
            Err(status) => return status,
        };

        if engine.capabilities().sets_cipher_path
            && let Err(status) = create_dir(Path::new(&options.cipher_folder)).await
        {
            return status;
        }

        info!(
            "Creating {} volume {}",
            engine.name(),
            options.cipher_folder
        );

        let command = match engine.build_create_command(&CommandArgs::new(&exe, options)) {
            Ok(command) => command,
            Err(kind) => return Status::new(kind),
        };

        let created = self
            .run(engine.as_ref(), command, StatusKind::VolumeCreatedSuccessfully)
            .await;

        if !created.is_success() || engine.capabilities().auto_mounts_on_create {
            return created;
        }

        debug!("{} does not mount on create, mounting now", engine.name());
        let mounted = self.mount_prepared(engine.as_ref(), &exe, options).await;
        if mounted.is_success() {
            created
        } else {
            mounted
        }
    }

    pub async fn unmount(
        &self,
        target: &UnmountTarget,
        volume_type: &str,
        budget: u32,
        cancel: &CancellationToken,
    ) -> Status {
        let engine = self.resolve_for_unmount(volume_type);
        if !engine.known() {
            warn!("No backend matches volume type {volume_type:?}");
            return Status::new(StatusKind::Unknown);
        }

        if self.engines.platform() == Platform::Windows {
            return self.stop_backend(engine.as_ref(), target, budget, cancel).await;
        }

        let command = match engine.build_unmount_command(target) {
            Ok(command) => command,
            Err(kind) => return Status::new(kind),
        };

        info!(
            "Unmounting {} volume at {}",
            engine.name(),
            target.mount_point.display()
        );

        let engine = engine.as_ref();
        let command = &command;
        unmount_with_retry(budget, cancel, move || async move {
            match self.execute(engine, command.clone()).await {
                Ok(output) if output.success() => Ok(()),
                Ok(output) => Err(output.combined()),
                Err(status) => Err(status.message().to_string()),
            }
        })
        .await
        .into_status()
    }

    async fn stop_backend(
        &self,
        engine: &dyn Engine,
        target: &UnmountTarget,
        budget: u32,
        cancel: &CancellationToken,
    ) -> Status {
        let Some(backend) = self.untrack(&target.mount_point) else {
            warn!(
                "No {} process is serving {}",
                engine.name(),
                target.mount_point.display()
            );
            return Status::with_message(
                StatusKind::FailedToUnMount,
                &format!("No running backend owns {}", target.mount_point.display()),
            );
        };

        info!(
            "Stopping {} process for {}",
            engine.name(),
            target.mount_point.display()
        );

        let backend = Arc::new(tokio::sync::Mutex::new(backend));
        let status = unmount_with_retry(budget, cancel, || {
            let backend = backend.clone();
            async move {
                backend
                    .lock()
                    .await
                    .terminate()
                    .await
                    .map_err(|error| error.to_string())
            }
        })
        .await
        .into_status();

        if !status.is_success()
            && let Ok(backend) = Arc::try_unwrap(backend)
        {
            self.track(&target.mount_point, backend.into_inner());
        }
        status
    }

    fn track(&self, mount_point: &Path, backend: Box<dyn RunningBackend>) {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(mount_point.to_path_buf(), backend);
    }

    fn untrack(&self, mount_point: &Path) -> Option<Box<dyn RunningBackend>> {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(mount_point)
    }

    fn resolve_for_unmount(&self, volume_type: &str) -> &Arc<dyn Engine> {
        let engine = self.engines.resolve_by_name(volume_type);
        if engine.known() {
            engine
        } else {
            self.engines.resolve_by_mount_tag(volume_type)
        }
    }

    /// Known backend, installed executable, validation, elevation, mount point.
    async fn prepare(&self, options: &VolumeOptions) -> Result<(&Arc<dyn Engine>, PathBuf), Status> {
        let engine = self.engines.resolve_by_name(&options.volume_type);
        if !engine.known() {
            warn!("No backend matches volume type {:?}", options.volume_type);
            return Err(Status::new(StatusKind::Unknown));
        }

        let Some(exe) = engine.executable() else {
            warn!("{} is not installed", engine.name());
            return Err(Status::new(engine.not_found_code()));
        };

        let wrapped =
            self.elevation.applies_to(engine.as_ref()) && self.elevation.is_available();
        engine.validate(options, wrapped)?;

        if engine.requires_elevation() && !self.elevation.is_available() {
            warn!(
                "{} needs elevated privileges but elevation is unavailable",
                engine.name()
            );
            return Err(Status::new(StatusKind::EcryptfsBadExePermissions));
        }

        if self.needs_mount_point(engine.as_ref()) {
            create_dir(&options.plain_folder).await?;
        }

        Ok((engine, exe.to_path_buf()))
    }

    fn needs_mount_point(&self, engine: &dyn Engine) -> bool {
        let capabilities = engine.capabilities();
        capabilities.requires_mount_path
            && (self.engines.platform() != Platform::Windows
                || capabilities.supports_mount_paths_on_windows)
    }

    async fn mount_prepared(&self, engine: &dyn Engine, exe: &Path, options: &VolumeOptions) -> Status {
        match engine.build_mount_command(&CommandArgs::new(exe, options)) {
            Ok(command) if self.engines.platform() == Platform::Windows => {
                self.launch(engine, command, &options.plain_folder).await
            }
            Ok(command) => self.run(engine, command, StatusKind::Success).await,
            Err(kind) => Status::new(kind),
        }
    }

    /// WinFsp backends serve the volume from the foreground.
    async fn launch(
        &self,
        engine: &dyn Engine,
        command: CommandResult,
        mount_point: &Path,
    ) -> Status {
        if self.is_running(mount_point) {
            warn!("{} is already served by a running backend", mount_point.display());
            return Status::with_message(
                StatusKind::BackendFail,
                &format!("A backend is already running for {}", mount_point.display()),
            );
        }

        let command = self.elevate(engine, command);
        match self.executor.launch(&command, settle_for(engine)).await {
            Ok(Launch::Running(backend)) => {
                debug!(
                    "{} is serving {} as process {:?}",
                    engine.name(),
                    mount_point.display(),
                    backend.id()
                );
                self.track(mount_point, backend);
                Status::new(StatusKind::Success)
            }
            Ok(Launch::Exited(output)) if output.success() => Status::new(StatusKind::Success),
            Ok(Launch::Exited(output)) => classify(engine, &output),
            Err(error) => {
                error!("{} failed to start: {error}", engine.name());
                Status::with_message(StatusKind::BackendFail, &error.to_string())
            }
        }
    }

    async fn run(&self, engine: &dyn Engine, command: CommandResult, success: StatusKind) -> Status {
        match self.execute(engine, command).await {
            Ok(output) if output.success() => Status::new(success),
            Ok(output) => classify(engine, &output),
            Err(status) => status,
        }
    }

    async fn execute(
        &self,
        engine: &dyn Engine,
        command: CommandResult,
    ) -> Result<ProcessOutput, Status> {
        let command = self.elevate(engine, command);

        self.executor
            .run(&command, self.timeout_for(engine))
            .await
            .map_err(|error| {
                error!("{} failed to run: {error}", engine.name());
                Status::with_message(StatusKind::BackendFail, &error.to_string())
            })
    }

    fn elevate(&self, engine: &dyn Engine, command: CommandResult) -> CommandResult {
        if self.elevation.applies_to(engine) {
            debug!("Running {} through {:?}", engine.name(), self.elevation.tool());
            self.elevation.wrap(command)
        } else {
            command
        }
    }

    fn timeout_for(&self, engine: &dyn Engine) -> Option<Duration> {
        self.command_timeout.or_else(|| {
            let seconds = engine.capabilities().backend_timeout_secs;
            (seconds > 0).then(|| Duration::from_secs(seconds))
        })
    }
}

fn settle_for(engine: &dyn Engine) -> Duration {
    let capabilities = engine.capabilities();
    if capabilities.backend_timeout_secs > 0 {
        Duration::from_secs(capabilities.backend_timeout_secs)
    } else if capabilities.takes_long_to_unlock {
        SLOW_MOUNT_SETTLE
    } else {
        MOUNT_SETTLE
    }
}

fn classify(engine: &dyn Engine, output: &ProcessOutput) -> Status {
    let text = output.combined();
    let kind = engine.classify_error(&text, output.exit_code);
    debug!(
        "{} exited with {}, classified as {kind:?}",
        engine.name(),
        output.exit_code
    );
    Status::with_output(kind, output.exit_code, &text)
}

async fn create_dir(path: &Path) -> Result<(), Status> {
    tokio::fs::create_dir_all(path).await.map_err(|error| {
        error!("Failed to create {}: {error}", path.display());
        Status::with_message(StatusKind::FailedToCreateMountPoint, &error.to_string())
    })
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use tempfile::tempdir;
    use tokio_util::sync::CancellationToken;

    use vaultmux_backend::{
        BackendError, CommandResult, Engine, KeyDelivery, StatusKind, UnmountTarget,
        VolumeOptions,
    };
    use vaultmux_engines::{Ecryptfs, Engines};
    use vaultmux_platform::Platform;

    use super::VolumeManager;
    use crate::elevation::Elevation;
    use crate::executor::{Launch, ProcessExecutor, ProcessOutput, RunningBackend};

    /// Replays canned outputs and records every command it was given.
    #[derive(Default)]
    struct ScriptedExecutor {
        outputs: Mutex<Vec<Result<ProcessOutput, BackendError>>>,
        commands: Mutex<Vec<CommandResult>>,
    }

    impl ScriptedExecutor {
        fn new(outputs: Vec<Result<ProcessOutput, BackendError>>) -> Arc<Self> {
            Arc::new(Self {
                outputs: Mutex::new(outputs.into_iter().rev().collect()),
                commands: Mutex::new(Vec::new()),
            })
        }

        fn commands(&self) -> Vec<CommandResult> {
            self.commands.lock().expect("commands lock").clone()
        }
    }

    #[async_trait]
    impl ProcessExecutor for ScriptedExecutor {
        async fn run(
            &self,
            command: &CommandResult,
            _timeout: Option<Duration>,
        ) -> Result<ProcessOutput, BackendError> {
            self.commands
                .lock()
                .expect("commands lock")
                .push(command.clone());
            self.outputs
                .lock()
                .expect("outputs lock")
                .pop()
                .unwrap_or_else(|| Ok(ProcessOutput::default()))
        }
    }

    fn installed() -> Arc<Engines> {
        Arc::new(Engines::with_resolver(Platform::Linux, |name| {
            Some(PathBuf::from("/usr/bin").join(name))
        }))
    }

    fn manager(executor: &Arc<ScriptedExecutor>) -> VolumeManager {
        VolumeManager::new(installed(), executor.clone(), Elevation::disabled())
    }

    #[tokio::test]
    async fn mount_success_creates_mount_point() {
        let temp_dir = tempdir().expect("create temp dir");
        let plain = temp_dir.path().join("plain");
        let executor = ScriptedExecutor::new(vec![Ok(ProcessOutput::new(0, "", ""))]);
        let options = VolumeOptions::new("/data/cipher", &plain, "pw".into(), "gocryptfs");

        let status = manager(&executor).mount(&options).await;

        assert_eq!(status, StatusKind::Success);
        assert!(plain.is_dir());
        let commands = executor.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(commands[0].program, PathBuf::from("/usr/bin/gocryptfs"));
        assert_eq!(commands[0].key_delivery, KeyDelivery::Stdin(b"pw\n".to_vec()));
    }

    #[tokio::test]
    async fn failed_mount_is_classified_from_output() {
        let temp_dir = tempdir().expect("create temp dir");
        let executor = ScriptedExecutor::new(vec![Ok(ProcessOutput::new(
            12,
            "",
            "Password incorrect.\n",
        ))]);
        let options =
            VolumeOptions::new("/data/cipher", temp_dir.path().join("p"), "bad".into(), "gocryptfs");

        let status = manager(&executor).mount(&options).await;

        assert_eq!(status, StatusKind::GocryptfsBadPassword);
        assert_eq!(status.exit_code(), Some(12));
        assert_eq!(status.message(), "Password incorrect.");
    }

    #[tokio::test]
    async fn unclassified_failure_keeps_raw_output() {
        let temp_dir = tempdir().expect("create temp dir");
        let executor = ScriptedExecutor::new(vec![Ok(ProcessOutput::new(
            1,
            "",
            "fuse: device not found\n",
        ))]);
        let options =
            VolumeOptions::new("/data/cipher", temp_dir.path().join("p"), "pw".into(), "cryfs");

        let status = manager(&executor).mount(&options).await;

        assert_eq!(status, StatusKind::BackendFail);
        assert!(status.to_user_string().ends_with("fuse: device not found"));
    }

    #[tokio::test]
    async fn unknown_type_never_runs_anything() {
        let executor = ScriptedExecutor::new(Vec::new());
        let options = VolumeOptions::new("/c", "/p", "pw".into(), "veracrypt");

        let status = manager(&executor).mount(&options).await;

        assert_eq!(status, StatusKind::Unknown);
        assert!(executor.commands().is_empty());
    }

    #[tokio::test]
    async fn missing_executable_reports_backend_not_found() {
        let executor = ScriptedExecutor::new(Vec::new());
        let engines = Arc::new(Engines::with_resolver(Platform::Linux, |_| None));
        let manager = VolumeManager::new(engines, executor.clone(), Elevation::disabled());
        let options = VolumeOptions::new("/c", "/p", "pw".into(), "encfs");

        assert_eq!(manager.mount(&options).await, StatusKind::EncfsNotFound);
        assert!(executor.commands().is_empty());
    }

    #[tokio::test]
    async fn executor_failure_becomes_backend_fail() {
        let temp_dir = tempdir().expect("create temp dir");
        let executor =
            ScriptedExecutor::new(vec![Err(BackendError::Timeout { seconds: 30 })]);
        let options =
            VolumeOptions::new("/data/cipher", temp_dir.path().join("p"), "pw".into(), "encfs");

        let status = manager(&executor).mount(&options).await;

        assert_eq!(status, StatusKind::BackendFail);
        assert_eq!(status.message(), "Backend did not finish within 30s");
    }

    #[tokio::test]
    async fn unwritable_mount_point_is_reported() {
        let temp_dir = tempdir().expect("create temp dir");
        let file = temp_dir.path().join("not-a-dir");
        std::fs::write(&file, "x").expect("write file");
        let executor = ScriptedExecutor::new(Vec::new());
        let options = VolumeOptions::new("/c", file.join("plain"), "pw".into(), "securefs");

        let status = manager(&executor).mount(&options).await;

        assert_eq!(status, StatusKind::FailedToCreateMountPoint);
        assert!(executor.commands().is_empty());
    }

    #[tokio::test]
    async fn create_then_mount_when_backend_does_not_auto_mount() {
        let temp_dir = tempdir().expect("create temp dir");
        let cipher = temp_dir.path().join("cipher");
        let executor = ScriptedExecutor::new(vec![
            Ok(ProcessOutput::new(0, "", "")),
            Ok(ProcessOutput::new(0, "", "")),
        ]);
        let options = VolumeOptions::new(
            cipher.to_string_lossy(),
            temp_dir.path().join("plain"),
            "pw".into(),
            "securefs",
        );

        let status = manager(&executor).create(&options).await;

        assert_eq!(status, StatusKind::VolumeCreatedSuccessfully);
        assert!(cipher.is_dir());
        let commands = executor.commands();
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].args[0], "create");
        assert_eq!(commands[1].args[0], "mount");
    }

    #[tokio::test]
    async fn create_runs_once_for_auto_mounting_backends() {
        let temp_dir = tempdir().expect("create temp dir");
        let executor = ScriptedExecutor::new(vec![Ok(ProcessOutput::new(0, "", ""))]);
        let options = VolumeOptions::new(
            temp_dir.path().join("cipher").to_string_lossy(),
            temp_dir.path().join("plain"),
            "pw".into(),
            "cryfs",
        );

        let status = manager(&executor).create(&options).await;

        assert_eq!(status, StatusKind::VolumeCreatedSuccessfully);
        assert_eq!(executor.commands().len(), 1);
    }

    #[tokio::test]
    async fn failed_follow_up_mount_is_reported() {
        let temp_dir = tempdir().expect("create temp dir");
        let executor = ScriptedExecutor::new(vec![
            Ok(ProcessOutput::new(0, "", "")),
            Ok(ProcessOutput::new(1, "", "Error: Invalid password")),
        ]);
        let options = VolumeOptions::new(
            temp_dir.path().join("cipher").to_string_lossy(),
            temp_dir.path().join("plain"),
            "pw".into(),
            "securefs",
        );

        let status = manager(&executor).create(&options).await;

        assert_eq!(status, StatusKind::SecurefsBadPassword);
    }

    fn with_ecryptfs(
        executor: &Arc<ScriptedExecutor>,
        requires_elevation: bool,
        elevation: Elevation,
    ) -> VolumeManager {
        let ecryptfs: Arc<dyn Engine> = Arc::new(Ecryptfs::with_elevation_requirement(
            Some(PathBuf::from("/usr/bin/ecryptfs-simple")),
            requires_elevation,
        ));
        let engines = Arc::new(Engines::from_engines(Platform::Linux, vec![ecryptfs]));
        VolumeManager::new(engines, executor.clone(), elevation)
    }

    #[tokio::test]
    async fn ecryptfs_without_elevation_reports_bad_permissions() {
        let temp_dir = tempdir().expect("create temp dir");
        let executor = ScriptedExecutor::new(Vec::new());
        let manager = with_ecryptfs(&executor, true, Elevation::disabled());
        let options =
            VolumeOptions::new("/c", temp_dir.path().join("p"), "pw".into(), "ecryptfs");

        assert_eq!(
            manager.mount(&options).await,
            StatusKind::EcryptfsBadExePermissions
        );
        assert!(executor.commands().is_empty());
    }

    #[tokio::test]
    async fn ecryptfs_is_wrapped_in_su_when_elevating() {
        let temp_dir = tempdir().expect("create temp dir");
        let executor = ScriptedExecutor::new(vec![Ok(ProcessOutput::new(0, "", ""))]);
        let elevation = Elevation::new(true, Some(PathBuf::from("/bin/su")));
        let manager = with_ecryptfs(&executor, true, elevation);
        let options =
            VolumeOptions::new("/c", temp_dir.path().join("p"), "pw".into(), "ecryptfs");

        assert_eq!(manager.mount(&options).await, StatusKind::Success);

        let commands = executor.commands();
        assert_eq!(commands[0].program, PathBuf::from("/bin/su"));
        assert_eq!(&commands[0].args[..2], ["-", "-c"]);
        assert!(commands[0].args[2].starts_with("/usr/bin/ecryptfs-simple"));
    }

    #[tokio::test]
    async fn ecryptfs_rejects_spaces_when_elevating() {
        let executor = ScriptedExecutor::new(Vec::new());
        let elevation = Elevation::new(true, Some(PathBuf::from("/bin/su")));
        let manager = with_ecryptfs(&executor, true, elevation);
        let options = VolumeOptions::new("/home/me/My Vault", "/home/me/plain", "pw".into(), "ecryptfs");

        assert_eq!(manager.mount(&options).await, StatusKind::EcryptfsIllegalPath);
    }

    #[tokio::test]
    async fn elevation_never_wraps_fuse_backends() {
        let temp_dir = tempdir().expect("create temp dir");
        let executor = ScriptedExecutor::new(vec![Ok(ProcessOutput::new(0, "", ""))]);
        let elevation = Elevation::new(true, Some(PathBuf::from("/bin/su")));
        let manager = VolumeManager::new(installed(), executor.clone(), elevation);
        let options =
            VolumeOptions::new("/data/cipher", temp_dir.path().join("p"), "pw".into(), "cryfs");

        assert_eq!(manager.mount(&options).await, StatusKind::Success);
        assert_eq!(executor.commands()[0].program, PathBuf::from("/usr/bin/cryfs"));
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_retries_until_the_mount_is_released() {
        let executor = ScriptedExecutor::new(vec![
            Ok(ProcessOutput::new(1, "", "fusermount: Device or resource busy")),
            Ok(ProcessOutput::new(1, "", "fusermount: Device or resource busy")),
            Ok(ProcessOutput::new(0, "", "")),
        ]);
        let target = UnmountTarget::new("/data/cipher", "/data/plain");

        let status = manager(&executor)
            .unmount(&target, "fuse.gocryptfs", 5, &CancellationToken::new())
            .await;

        assert_eq!(status, StatusKind::Success);
        let commands = executor.commands();
        assert_eq!(commands.len(), 3);
        assert!(commands.iter().all(|command| command.args == ["-u", "/data/plain"]));
    }

    #[tokio::test(start_paused = true)]
    async fn unmount_gives_up_after_budget() {
        let executor = ScriptedExecutor::new(vec![
            Ok(ProcessOutput::new(1, "", "busy")),
            Ok(ProcessOutput::new(1, "", "busy")),
        ]);
        let target = UnmountTarget::new("/data/cipher", "/data/plain");

        let status = manager(&executor)
            .unmount(&target, "cryfs", 2, &CancellationToken::new())
            .await;

        assert_eq!(status, StatusKind::FailedToUnMount);
        assert_eq!(status.message(), "busy");
        assert_eq!(executor.commands().len(), 2);
    }

    #[tokio::test]
    async fn unmount_of_unknown_type_is_unknown() {
        let executor = ScriptedExecutor::new(Vec::new());
        let target = UnmountTarget::new("/c", "/p");

        let status = manager(&executor)
            .unmount(&target, "ext4", 3, &CancellationToken::new())
            .await;

        assert_eq!(status, StatusKind::Unknown);
    }

    #[tokio::test]
    async fn ecryptfs_accepts_spaces_when_elevation_has_no_tool() {
        let executor = ScriptedExecutor::new(vec![Ok(ProcessOutput::new(0, "", ""))]);
        let manager = with_ecryptfs(&executor, false, Elevation::new(true, None));
        let temp_dir = tempdir().expect("create temp dir");
        let options = VolumeOptions::new(
            "/home/me/My Vault",
            temp_dir.path().join("plain"),
            "pw".into(),
            "ecryptfs",
        );

        assert_eq!(manager.mount(&options).await, StatusKind::Success);
        let commands = executor.commands();
        assert_eq!(commands.len(), 1);
        assert_eq!(
            commands[0].program,
            PathBuf::from("/usr/bin/ecryptfs-simple")
        );
    }

    struct FakeBackend {
        stops: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl RunningBackend for FakeBackend {
        fn id(&self) -> Option<u32> {
            Some(4242)
        }

        async fn terminate(&mut self) -> Result<(), BackendError> {
            self.stops.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Leaves every launched backend running, like WinFsp tools do.
    #[derive(Default)]
    struct ForegroundExecutor {
        launched: Mutex<Vec<(CommandResult, Duration)>>,
        stops: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ProcessExecutor for ForegroundExecutor {
        async fn run(
            &self,
            _command: &CommandResult,
            _timeout: Option<Duration>,
        ) -> Result<ProcessOutput, BackendError> {
            Ok(ProcessOutput::default())
        }

        async fn launch(
            &self,
            command: &CommandResult,
            settle: Duration,
        ) -> Result<Launch, BackendError> {
            self.launched
                .lock()
                .expect("launched lock")
                .push((command.clone(), settle));
            Ok(Launch::Running(Box::new(FakeBackend {
                stops: self.stops.clone(),
            })))
        }
    }

    fn on_windows(executor: &Arc<ForegroundExecutor>) -> VolumeManager {
        let engines = Arc::new(Engines::with_resolver(Platform::Windows, |name| {
            Some(PathBuf::from("C:/Program Files").join(format!("{name}.exe")))
        }));
        VolumeManager::new(engines, executor.clone(), Elevation::disabled())
    }

    #[tokio::test]
    async fn windows_mount_keeps_the_backend_until_unmount() {
        let temp_dir = tempdir().expect("create temp dir");
        let plain = temp_dir.path().join("plain");
        let executor = Arc::new(ForegroundExecutor::default());
        let manager = on_windows(&executor);
        let options = VolumeOptions::new("C:/vaults/cipher", &plain, "pw".into(), "securefs");

        assert_eq!(manager.mount(&options).await, StatusKind::Success);
        assert!(manager.is_running(&plain));
        {
            let launched = executor.launched.lock().expect("launched lock");
            assert_eq!(launched.len(), 1);
            assert_eq!(launched[0].0.args[0], "mount");
            assert_eq!(launched[0].1, Duration::from_secs(5));
        }

        let target = UnmountTarget::new("C:/vaults/cipher", &plain);
        let status = manager
            .unmount(&target, "securefs", 3, &CancellationToken::new())
            .await;

        assert_eq!(status, StatusKind::Success);
        assert_eq!(executor.stops.load(Ordering::SeqCst), 1);
        assert!(!manager.is_running(&plain));
    }

    #[tokio::test]
    async fn windows_refuses_a_second_backend_on_one_mount_point() {
        let temp_dir = tempdir().expect("create temp dir");
        let plain = temp_dir.path().join("plain");
        let executor = Arc::new(ForegroundExecutor::default());
        let manager = on_windows(&executor);
        let options = VolumeOptions::new("C:/vaults/cipher", &plain, "pw".into(), "sshfs");

        assert_eq!(manager.mount(&options).await, StatusKind::Success);
        assert_eq!(manager.mount(&options).await, StatusKind::BackendFail);
        assert_eq!(executor.launched.lock().expect("launched lock").len(), 1);
    }

    #[tokio::test]
    async fn windows_unmount_without_a_running_backend_fails() {
        let executor = Arc::new(ForegroundExecutor::default());
        let target = UnmountTarget::new("C:/vaults/cipher", "X:");

        let status = on_windows(&executor)
            .unmount(&target, "encfs", 3, &CancellationToken::new())
            .await;

        assert_eq!(status, StatusKind::FailedToUnMount);
        assert!(status.message().contains("No running backend"));
        assert_eq!(executor.stops.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn windows_backend_that_exits_early_is_classified() {
        let executor = ScriptedExecutor::new(vec![Ok(ProcessOutput::new(
            1,
            "",
            "Error: Invalid password",
        ))]);
        let engines = Arc::new(Engines::with_resolver(Platform::Windows, |name| {
            Some(PathBuf::from("C:/Program Files").join(format!("{name}.exe")))
        }));
        let manager = VolumeManager::new(engines, executor.clone(), Elevation::disabled());
        let temp_dir = tempdir().expect("create temp dir");
        let plain = temp_dir.path().join("plain");
        let options = VolumeOptions::new("C:/vaults/cipher", &plain, "bad".into(), "securefs");

        let status = manager.mount(&options).await;

        assert_eq!(status, StatusKind::SecurefsBadPassword);
        assert!(!manager.is_running(&plain));
        assert_eq!(executor.commands().len(), 1);
    }
}
