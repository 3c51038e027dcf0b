#[cfg(debug_assertions)]
use simplelog::{ColorChoice, TermLogger, TerminalMode};
use simplelog::{CombinedLogger, ConfigBuilder, LevelFilter, WriteLogger};
use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};

use vaultmux_platform::AppPaths;

/// Appends to the log file, reopening it if something deleted it while the
/// process was running.
struct ReopeningLogFile {
    path: PathBuf,
    file: Mutex<Option<File>>,
}

impl ReopeningLogFile {
    fn open(path: PathBuf) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        Ok(Self {
            path,
            file: Mutex::new(Some(file)),
        })
    }

    fn reopen_if_missing(&self) -> io::Result<()> {
        if self.path.exists() {
            return Ok(());
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        *self.file.lock().unwrap_or_else(PoisonError::into_inner) = Some(file);
        Ok(())
    }
}

impl Write for ReopeningLogFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.reopen_if_missing()?;
        match self
            .file
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            Some(file) => file.write(buf),
            None => Err(io::Error::other("log file not available")),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self
            .file
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_mut()
        {
            Some(file) => file.flush(),
            None => Ok(()),
        }
    }
}

/// Drop the older half of the log once it grows past `max_size`, cutting at a
/// line boundary.
fn trim_oversized_log(log_path: &Path, max_size: u64) {
    if let Ok(metadata) = std::fs::metadata(log_path)
        && metadata.len() > max_size
        && let Ok(contents) = std::fs::read(log_path)
    {
        let half = contents.len() / 2;
        let keep_from = contents[half..]
            .iter()
            .position(|&byte| byte == b'\n')
            .map_or(half, |pos| half + pos + 1);
        let _ = std::fs::write(log_path, &contents[keep_from..]);
    }
}

/// Install the global logger. Logging stays silent unless `debug_enabled`.
pub fn init_logging(debug_enabled: bool, max_log_size: u64) {
    let Ok(paths) = AppPaths::new() else {
        return;
    };
    let _ = paths.ensure_dirs();
    let log_path = paths.log_file();

    trim_oversized_log(&log_path, max_log_size);

    let config = ConfigBuilder::new()
        .set_time_format_rfc3339()
        .add_filter_allow_str("vaultmux")
        .build();

    let file_logger = ReopeningLogFile::open(log_path.clone())
        .ok()
        .map(|writer| WriteLogger::new(LevelFilter::Debug, config.clone(), writer));

    #[cfg(debug_assertions)]
    {
        let term_logger = TermLogger::new(
            LevelFilter::Debug,
            config,
            TerminalMode::Stderr,
            ColorChoice::Auto,
        );

        if let Some(file_logger) = file_logger {
            let _ = CombinedLogger::init(vec![term_logger, file_logger]);
        } else {
            let _ = CombinedLogger::init(vec![term_logger]);
        }
    }

    #[cfg(not(debug_assertions))]
    {
        if let Some(file_logger) = file_logger {
            let _ = CombinedLogger::init(vec![file_logger]);
        }
    }

    set_logging_enabled(debug_enabled);

    if debug_enabled {
        log::info!("Debug logging enabled, log file: {}", log_path.display());
    }
}

pub fn set_logging_enabled(enabled: bool) {
    if enabled {
        log::set_max_level(LevelFilter::Debug);
    } else {
        log::set_max_level(LevelFilter::Off);
    }
}
