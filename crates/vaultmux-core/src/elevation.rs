use std::path::{Path, PathBuf};

use log::debug;

use vaultmux_backend::{CommandResult, Engine};
use vaultmux_platform::find_elevation_tool;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Elevation {
    requested: bool,
    tool: Option<PathBuf>,
}

impl Elevation {
    #[must_use]
    pub fn new(requested: bool, tool: Option<PathBuf>) -> Self {
        Self { requested, tool }
    }

    #[must_use]
    pub fn detect(requested: bool) -> Self {
        let tool = find_elevation_tool();
        debug!("Elevation requested: {requested}, tool: {tool:?}");
        Self::new(requested, tool)
    }

    #[must_use]
    pub fn disabled() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn is_requested(&self) -> bool {
        self.requested
    }

    #[must_use]
    pub fn tool(&self) -> Option<&Path> {
        self.tool.as_deref()
    }

    #[must_use]
    pub fn is_available(&self) -> bool {
        self.requested && self.tool.is_some()
    }

    #[must_use]
    pub fn applies_to(&self, engine: &dyn Engine) -> bool {
        self.requested && engine.capabilities().requires_elevated_privileges
    }

    #[must_use]
    pub fn wrap(&self, command: CommandResult) -> CommandResult {
        wrap(command, self.requested, self.tool.as_deref())
    }
}

/// Double quotes become single quotes so the script survives as one `-c` argument.
#[must_use]
pub fn wrap(command: CommandResult, requested: bool, tool: Option<&Path>) -> CommandResult {
    let Some(tool) = tool.filter(|_| requested) else {
        return command;
    };

    let script = command.render().replace('"', "'");

    CommandResult {
        program: tool.to_path_buf(),
        args: vec!["-".to_string(), "-c".to_string(), script],
        ..command
    }
}
