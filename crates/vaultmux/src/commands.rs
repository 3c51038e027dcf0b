use std::io::{BufRead, IsTerminal, Write as _};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Subcommand};
use log::{debug, info, warn};
use tokio_util::sync::CancellationToken;

use vaultmux_backend::{
    FavoriteEntry, Status, StatusKind, UnmountTarget, VolumeKey, VolumeOptions,
    sanitize_mount_options,
};
use vaultmux_core::{
    Elevation, TokioExecutor, VolumeManager, check_for_backend_update, installed_version,
};
use vaultmux_engines::Engines;

use crate::error::AppError;
use crate::favorites::Favorites;
use crate::settings::Settings;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Subcommand, Debug)]
pub enum Command {
    /// List the backends this platform supports and whether they are installed
    Backends,
    /// Unlock a volume
    Mount(VolumeArgs),
    /// Create a new volume and leave it mounted
    Create {
        #[command(flatten)]
        volume: VolumeArgs,
        /// Backend specific creation flags, defaults to the backend's own
        #[arg(long, allow_hyphen_values = true)]
        create_options: Option<String>,
    },
    /// Unmount a volume, retrying while it is busy
    Unmount {
        /// Mount point of the volume
        mount_point: PathBuf,
        /// Backend name or filesystem type as listed in the mount table
        #[arg(long = "type")]
        volume_type: String,
        /// Cipher folder, needed by ecryptfs
        #[arg(long, default_value = "")]
        cipher: String,
        /// Attempts before giving up, overrides the saved setting
        #[arg(long)]
        attempts: Option<u32>,
    },
    /// Show a backend's installed version and check for a newer release
    Version {
        /// Backend name, e.g. gocryptfs
        backend: String,
        /// Skip the release check
        #[arg(long)]
        offline: bool,
    },
    /// Manage saved volumes
    #[command(subcommand)]
    Favorites(FavoritesCommand),
    /// Show or change saved settings
    Settings(SettingsArgs),
}

#[derive(Args, Debug, Default)]
pub struct VolumeArgs {
    /// Cipher folder, or user@host:/path for sshfs
    pub cipher: Option<String>,
    /// Folder the decrypted view is mounted on
    pub mount_point: Option<PathBuf>,
    /// Backend name, e.g. gocryptfs
    #[arg(long = "type")]
    pub volume_type: Option<String>,
    /// Take unset fields from the favorite with this volume path or mount point
    #[arg(long)]
    pub favorite: Option<String>,
    /// Unmount after this many idle minutes
    #[arg(long)]
    pub idle: Option<u32>,
    /// Custom configuration file
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub read_only: bool,
    /// Reverse mode, gocryptfs and encfs only
    #[arg(long)]
    pub reverse: bool,
    /// Extra FUSE mount options, comma separated
    #[arg(long, allow_hyphen_values = true)]
    pub mount_options: Option<String>,
    /// Read the key from this file instead of stdin
    #[arg(long)]
    pub key_file: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
pub enum FavoritesCommand {
    /// Print saved volumes
    List,
    /// Save a volume, replacing one with the same cipher path
    Add(VolumeArgs),
    /// Forget a saved volume
    Remove {
        /// Cipher folder of the saved volume
        cipher: String,
    },
}

#[derive(Args, Debug)]
pub struct SettingsArgs {
    /// Run backends that need root through su
    #[arg(long)]
    pub use_elevation: Option<bool>,
    #[arg(long)]
    pub unmount_attempts: Option<u32>,
    #[arg(long)]
    pub debug_logging: Option<bool>,
    /// Seconds before a backend is killed, 0 keeps each backend's default
    #[arg(long)]
    pub command_timeout: Option<u64>,
}

pub async fn run(command: Command, settings: Settings) -> Result<ExitCode, AppError> {
    match command {
        Command::Backends => {
            list_backends().await;
            Ok(ExitCode::SUCCESS)
        }
        Command::Mount(args) => {
            let options = volume_options(&args, &favorites_for(&args)?)?;
            let options = VolumeOptions {
                key: read_key(args.key_file.as_deref(), &options.cipher_folder)?,
                ..options
            };
            let manager = manager(&settings);
            let status = manager.mount(&options).await;
            let code = report(&status, "Mounted");
            if manager.is_running(&options.plain_folder) {
                return Ok(serve_until_interrupted(&manager, &options, &settings).await);
            }
            Ok(code)
        }
        Command::Create {
            volume,
            create_options,
        } => {
            let mut options = volume_options(&volume, &favorites_for(&volume)?)?;
            if let Some(create_options) = create_options {
                options = options.with_create_options(create_options);
            }
            let options = VolumeOptions {
                key: read_key(volume.key_file.as_deref(), &options.cipher_folder)?,
                ..options
            };
            let manager = manager(&settings);
            let status = manager.create(&options).await;
            let code = report(&status, "Volume created");
            if manager.is_running(&options.plain_folder) {
                return Ok(serve_until_interrupted(&manager, &options, &settings).await);
            }
            Ok(code)
        }
        Command::Unmount {
            mount_point,
            volume_type,
            cipher,
            attempts,
        } => {
            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if tokio::signal::ctrl_c().await.is_ok() {
                    info!("Interrupted, cancelling unmount");
                    on_interrupt.cancel();
                }
            });

            let target = UnmountTarget::new(cipher, mount_point);
            let budget = attempts.unwrap_or(settings.unmount_attempts);
            let status = manager(&settings)
                .unmount(&target, &volume_type, budget, &cancel)
                .await;
            Ok(report(&status, "Unmounted"))
        }
        Command::Version { backend, offline } => show_version(&backend, offline).await,
        Command::Favorites(command) => {
            manage_favorites(command)?;
            Ok(ExitCode::SUCCESS)
        }
        Command::Settings(args) => {
            update_settings(settings, args)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn manager(settings: &Settings) -> VolumeManager {
    VolumeManager::new(
        Arc::new(Engines::detect()),
        Arc::new(TokioExecutor),
        Elevation::detect(settings.elevation_enabled()),
    )
    .with_command_timeout(settings.command_timeout())
}

/// Windows backends live as long as this process; keep it alive until the
/// user asks to unmount.
async fn serve_until_interrupted(
    manager: &VolumeManager,
    options: &VolumeOptions,
    settings: &Settings,
) -> ExitCode {
    println!(
        "{} stays mounted while vaultmux runs. Press Ctrl-C to unmount.",
        options.plain_folder.display()
    );
    if let Err(error) = tokio::signal::ctrl_c().await {
        warn!("Could not wait for Ctrl-C: {error}");
    }

    let target = UnmountTarget::new(options.cipher_folder.clone(), options.plain_folder.clone());
    let status = manager
        .unmount(
            &target,
            &options.volume_type,
            settings.unmount_attempts,
            &CancellationToken::new(),
        )
        .await;
    report(&status, "Unmounted")
}

/// Print the outcome; only non-success statuses have a user string.
fn report(status: &Status, done: &str) -> ExitCode {
    match status.kind() {
        StatusKind::Success => {
            println!("{done}");
            ExitCode::SUCCESS
        }
        StatusKind::VolumeCreatedSuccessfully => {
            println!("{}", status.to_user_string());
            ExitCode::SUCCESS
        }
        kind => {
            debug!("Operation failed with {kind:?}, exit code {:?}", status.exit_code());
            eprintln!("{}", status.to_user_string());
            ExitCode::FAILURE
        }
    }
}

async fn list_backends() {
    let engines = Engines::detect();
    let executor = TokioExecutor;

    println!("Platform: {:?}", engines.platform());
    for engine in engines.iter() {
        let supported = engines.supported_engines().contains(&engine.kind());
        let state = match engine.executable() {
            Some(exe) => {
                let version = installed_version(engine.as_ref(), &executor)
                    .await
                    .unwrap_or_else(|| "unknown version".to_string());
                format!("{version} at {}", exe.display())
            }
            None if supported => "not installed".to_string(),
            None => "not available on this platform".to_string(),
        };
        let root = if engine.requires_elevation() {
            " (needs root)"
        } else {
            ""
        };
        println!("{:<10} {state}{root}", engine.name());
    }
}

async fn show_version(backend: &str, offline: bool) -> Result<ExitCode, AppError> {
    let engines = Engines::detect();
    let engine = engines.resolve_by_name(backend);
    if !engine.known() {
        return Err(AppError::UnknownBackend(backend.to_string()));
    }

    let Some(version) = installed_version(engine.as_ref(), &TokioExecutor).await else {
        eprintln!("{} is not installed or did not report a version", engine.name());
        return Ok(ExitCode::FAILURE);
    };
    println!("{} {version}", engine.name());

    if offline {
        return Ok(ExitCode::SUCCESS);
    }

    let client = reqwest::Client::builder()
        .timeout(HTTP_TIMEOUT)
        .build()
        .map_err(AppError::HttpClient)?;
    match check_for_backend_update(&client, engine.as_ref(), &version).await? {
        Some(update) => println!(
            "{} {} is available: {}",
            update.backend, update.latest_version, update.release_url
        ),
        None => println!("Up to date"),
    }
    Ok(ExitCode::SUCCESS)
}

fn manage_favorites(command: FavoritesCommand) -> Result<(), AppError> {
    let mut favorites = Favorites::load()?;
    match command {
        FavoritesCommand::List => {
            for entry in favorites.entries() {
                println!(
                    "{} -> {} [{}]",
                    entry.volume_path,
                    entry.mount_point_path.display(),
                    entry.volume_type
                );
            }
        }
        FavoritesCommand::Add(args) => {
            let entry = favorite_from_args(&args)?;
            info!("Saving favorite {}", entry.volume_path);
            favorites.upsert(entry);
            favorites.save()?;
            println!("Saved to {}", favorites.path().display());
        }
        FavoritesCommand::Remove { cipher } => {
            if !favorites.remove(&cipher) {
                return Err(AppError::UnknownFavorite(cipher));
            }
            favorites.save()?;
        }
    }
    Ok(())
}

fn update_settings(mut settings: Settings, args: SettingsArgs) -> Result<(), AppError> {
    let before = settings.clone();
    if let Some(value) = args.use_elevation {
        settings.use_elevation = value;
    }
    if let Some(value) = args.unmount_attempts {
        settings.unmount_attempts = value;
    }
    if let Some(value) = args.debug_logging {
        settings.debug_logging = value;
    }
    if let Some(value) = args.command_timeout {
        settings.command_timeout_secs = value;
    }

    if settings != before {
        settings.save()?;
    }

    let rendered = serde_json::to_string_pretty(&settings).map_err(|source| AppError::Json {
        path: PathBuf::from("settings.json"),
        source,
    })?;
    println!("{rendered}");
    Ok(())
}

/// The favorites file is only read when a favorite was asked for.
fn favorites_for(args: &VolumeArgs) -> Result<Favorites, AppError> {
    if args.favorite.is_some() {
        Favorites::load()
    } else {
        Ok(Favorites::default())
    }
}

/// Assemble volume options from a favorite (when named) overlaid with the
/// flags given on the command line. The key is filled in later.
fn volume_options(args: &VolumeArgs, favorites: &Favorites) -> Result<VolumeOptions, AppError> {
    let mut options = match &args.favorite {
        Some(name) => {
            let entry = favorites
                .find(name)
                .ok_or_else(|| AppError::UnknownFavorite(name.clone()))?;
            VolumeOptions::from_favorite(entry, VolumeKey::default())
        }
        None => VolumeOptions::new(
            args.cipher.clone().ok_or(AppError::MissingArgument("cipher folder"))?,
            args.mount_point
                .clone()
                .ok_or(AppError::MissingArgument("mount point"))?,
            VolumeKey::default(),
            args.volume_type
                .clone()
                .ok_or(AppError::MissingArgument("--type"))?,
        ),
    };

    if let Some(cipher) = &args.cipher {
        options.cipher_folder.clone_from(cipher);
    }
    if let Some(mount_point) = &args.mount_point {
        options.plain_folder.clone_from(mount_point);
    }
    if let Some(volume_type) = &args.volume_type {
        options.volume_type.clone_from(volume_type);
    }
    if let Some(minutes) = args.idle {
        options = options.with_idle_timeout(minutes);
    }
    if let Some(config) = &args.config {
        options = options.with_config_file(config);
    }
    if args.read_only {
        options = options.with_read_only(true);
    }
    if args.reverse {
        options = options.with_reverse_mode(true);
    }
    if let Some(mount_options) = &args.mount_options {
        options = options.with_mount_options(mount_options);
    }
    Ok(options)
}

fn favorite_from_args(args: &VolumeArgs) -> Result<FavoriteEntry, AppError> {
    Ok(FavoriteEntry {
        volume_path: args
            .cipher
            .clone()
            .ok_or(AppError::MissingArgument("cipher folder"))?,
        mount_point_path: args
            .mount_point
            .clone()
            .ok_or(AppError::MissingArgument("mount point"))?,
        volume_type: args.volume_type.clone().unwrap_or_default(),
        idle_timeout_minutes: args.idle,
        config_file_path: args.config.clone(),
        read_only: args.read_only,
        reverse_mode: args.reverse,
        mount_options: args
            .mount_options
            .as_deref()
            .map(sanitize_mount_options)
            .unwrap_or_default(),
    })
}

/// Key bytes from `key_file`, or one line of stdin. Trailing line endings are
/// not part of the key.
fn read_key(key_file: Option<&Path>, cipher: &str) -> Result<VolumeKey, AppError> {
    let raw = match key_file {
        Some(path) => std::fs::read(path).map_err(|source| AppError::read(path, source))?,
        None => {
            let stdin = std::io::stdin();
            if stdin.is_terminal() {
                eprint!("Key for {cipher}: ");
                let _ = std::io::stderr().flush();
            }
            let mut line = String::new();
            stdin.lock().read_line(&mut line).map_err(AppError::Key)?;
            line.into_bytes()
        }
    };
    Ok(VolumeKey::new(strip_line_ending(raw)))
}

fn strip_line_ending(mut raw: Vec<u8>) -> Vec<u8> {
    while matches!(raw.last(), Some(b'\n' | b'\r')) {
        raw.pop();
    }
    raw
}
