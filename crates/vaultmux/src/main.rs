mod commands;
mod error;
mod favorites;
mod logging;
mod settings;

use std::process::ExitCode;

use clap::Parser;

use crate::commands::Command;
use crate::settings::Settings;

/// Mount, create and unmount encrypted volumes with securefs, gocryptfs,
/// cryfs, encfs, ecryptfs-simple and sshfs.
#[derive(Parser, Debug)]
#[command(name = "vaultmux", version)]
struct Cli {
    /// Write debug output to the log file for this run
    #[arg(long, global = true)]
    debug: bool,

    #[command(subcommand)]
    command: Command,
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let settings = Settings::load();

    logging::init_logging(
        cli.debug || settings.debug_logging,
        settings.max_log_size_bytes,
    );
    log::debug!("Running {:?}", cli.command);

    match commands::run(cli.command, settings).await {
        Ok(code) => code,
        Err(error) => {
            log::error!("{error}");
            eprintln!("vaultmux: {error}");
            ExitCode::FAILURE
        }
    }
}
