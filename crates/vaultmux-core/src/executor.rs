use std::io::ErrorKind;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use log::{debug, error, info, trace};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, Command};

use vaultmux_backend::{BackendError, CommandResult};
use vaultmux_platform::HideWindow;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProcessOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl ProcessOutput {
    #[must_use]
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        Self {
            exit_code,
            stdout: stdout.into(),
            stderr: stderr.into(),
        }
    }

    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    #[must_use]
    pub fn combined(&self) -> String {
        let mut text = self.stderr.clone();
        if !text.is_empty() && !text.ends_with('\n') && !self.stdout.is_empty() {
            text.push('\n');
        }
        text.push_str(&self.stdout);
        text
    }
}

/// Implementations must never log the stdin payload.
#[async_trait]
pub trait ProcessExecutor: Send + Sync {
    async fn run(
        &self,
        command: &CommandResult,
        timeout: Option<Duration>,
    ) -> Result<ProcessOutput, BackendError>;

    /// A process still alive after `settle` comes back as `Launch::Running`.
    async fn launch(
        &self,
        command: &CommandResult,
        _settle: Duration,
    ) -> Result<Launch, BackendError> {
        self.run(command, None).await.map(Launch::Exited)
    }
}

#[async_trait]
pub trait RunningBackend: Send {
    fn id(&self) -> Option<u32>;

    async fn terminate(&mut self) -> Result<(), BackendError>;
}

pub enum Launch {
    Exited(ProcessOutput),
    Running(Box<dyn RunningBackend>),
}

impl std::fmt::Debug for Launch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Exited(output) => f.debug_tuple("Exited").field(output).finish(),
            Self::Running(backend) => f.debug_tuple("Running").field(&backend.id()).finish(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioExecutor;

impl TokioExecutor {
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    async fn spawn(command: &CommandResult) -> Result<Child, BackendError> {
        debug!("Running: {}", command.render());
        trace!(
            "Environment overrides: {:?}",
            command.env.iter().map(|(key, _)| key).collect::<Vec<_>>()
        );

        let payload = command.stdin_payload();

        let mut cmd = Command::new(&command.program);
        cmd.args(&command.args)
            .envs(command.env.iter().map(|(key, value)| (key, value)))
            .stdin(if payload.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd.hide_window();

        let mut child = cmd.spawn().map_err(|error| {
            error!(
                "Failed to spawn {}: {error}",
                command.program.display()
            );
            if error.kind() == ErrorKind::NotFound {
                BackendError::NotFound {
                    executable: command.program.display().to_string(),
                }
            } else {
                BackendError::from(error)
            }
        })?;

        if let (Some(payload), Some(mut stdin)) = (payload, child.stdin.take()) {
            match stdin.write_all(payload).await {
                Ok(()) => {}
                // The tool exited before reading its password; its output says why.
                Err(error) if error.kind() == ErrorKind::BrokenPipe => {
                    debug!("Backend closed stdin before reading the key");
                }
                Err(error) => return Err(error.into()),
            }
            drop(stdin);
        }

        Ok(child)
    }

    fn finished(
        command: &CommandResult,
        exit_code: i32,
        stdout: String,
        stderr: String,
    ) -> ProcessOutput {
        debug!(
            "{} exited with {exit_code}",
            command.program.display()
        );
        trace!("stdout: {stdout}");
        trace!("stderr: {stderr}");

        ProcessOutput {
            exit_code,
            stdout,
            stderr,
        }
    }
}

async fn read_to_string<R: AsyncRead + Unpin>(reader: Option<R>) -> String {
    let mut buffer = Vec::new();
    if let Some(mut reader) = reader
        && let Err(error) = reader.read_to_end(&mut buffer).await
    {
        debug!("Stopped reading backend output: {error}");
    }
    String::from_utf8_lossy(&buffer).into_owned()
}

#[async_trait]
impl ProcessExecutor for TokioExecutor {
    async fn run(
        &self,
        command: &CommandResult,
        timeout: Option<Duration>,
    ) -> Result<ProcessOutput, BackendError> {
        let child = Self::spawn(command).await?;

        let wait = child.wait_with_output();
        let output = match timeout {
            Some(limit) => tokio::time::timeout(limit, wait).await.map_err(|_| {
                error!(
                    "{} timed out after {}s",
                    command.program.display(),
                    limit.as_secs()
                );
                BackendError::Timeout {
                    seconds: limit.as_secs(),
                }
            })??,
            None => wait.await?,
        };

        Ok(Self::finished(
            command,
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
        ))
    }

    async fn launch(
        &self,
        command: &CommandResult,
        settle: Duration,
    ) -> Result<Launch, BackendError> {
        let mut child = Self::spawn(command).await?;

        let stdout = tokio::spawn(read_to_string(child.stdout.take()));
        let stderr = tokio::spawn(read_to_string(child.stderr.take()));

        match tokio::time::timeout(settle, child.wait()).await {
            Ok(status) => {
                let exit_code = status?.code().unwrap_or(-1);
                let stdout = stdout.await.unwrap_or_default();
                let stderr = stderr.await.unwrap_or_default();
                Ok(Launch::Exited(Self::finished(command, exit_code, stdout, stderr)))
            }
            Err(_) => {
                info!(
                    "{} still running after {}s, treating the volume as mounted",
                    command.program.display(),
                    settle.as_secs()
                );
                Ok(Launch::Running(Box::new(ChildBackend { child })))
            }
        }
    }
}

struct ChildBackend {
    child: Child,
}

#[async_trait]
impl RunningBackend for ChildBackend {
    fn id(&self) -> Option<u32> {
        self.child.id()
    }

    async fn terminate(&mut self) -> Result<(), BackendError> {
        if let Some(status) = self.child.try_wait()? {
            debug!("Backend already exited with {status}");
            return Ok(());
        }
        debug!("Stopping backend process {:?}", self.child.id());
        self.child.kill().await?;
        Ok(())
    }
}
