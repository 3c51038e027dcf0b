use std::time::Duration;

use log::debug;

use vaultmux_backend::{CommandResult, Engine};

use crate::executor::ProcessExecutor;

const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

pub async fn installed_version(
    engine: &dyn Engine,
    executor: &dyn ProcessExecutor,
) -> Option<String> {
    let exe = engine.executable()?;
    let check = engine.capabilities().version_check?;

    let command = CommandResult::new(exe, vec![check.argument.to_string()]);

    match executor.run(&command, Some(VERSION_TIMEOUT)).await {
        Ok(output) => {
            let version = check.extract(&output.stdout, &output.stderr);
            debug!("{} version: {version:?}", engine.name());
            version
        }
        Err(error) => {
            debug!("Failed to query {} version: {error}", engine.name());
            None
        }
    }
}
