//! Logging setup.
//!
//! Logs go to `<hud-dir>/logs/hud.log`; the terminal belongs to the view.
//! The file is rotated to `hud.log.1` at startup once it passes
//! [`MAX_LOG_BYTES`]. Level defaults to `warn`, `CLAUDE_HUD_DEBUG=1` raises
//! it to `debug`, and `RUST_LOG` overrides both.

use std::fs;
use std::path::{Path, PathBuf};

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::error::{HudError, Result};

pub const LOG_FILE_NAME: &str = "hud.log";

/// Size at which the log is rotated on startup.
pub const MAX_LOG_BYTES: u64 = 1024 * 1024;

/// Keeps the non-blocking writer alive.
///
/// Dropping the guard (or calling [`LoggingGuard::close`]) flushes pending
/// lines and releases the file.
pub struct LoggingGuard {
    guard: Option<WorkerGuard>,
    path: PathBuf,
}

impl LoggingGuard {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Flushes and releases the log file.
    pub fn close(mut self) {
        drop(self.guard.take());
    }
}

/// Path of the active log file inside `log_dir`.
pub fn log_file_path(log_dir: &Path) -> PathBuf {
    log_dir.join(LOG_FILE_NAME)
}

/// Moves `hud.log` to `hud.log.1` when it is larger than `max_bytes`.
///
/// Returns true if a rotation happened.
pub fn rotate_if_needed(log_dir: &Path, max_bytes: u64) -> Result<bool> {
    let path = log_file_path(log_dir);
    let size = match fs::metadata(&path) {
        Ok(meta) => meta.len(),
        Err(_) => return Ok(false),
    };
    if size <= max_bytes {
        return Ok(false);
    }
    let rotated = log_dir.join(format!("{LOG_FILE_NAME}.1"));
    fs::rename(&path, &rotated).map_err(|e| HudError::io(&path, e))?;
    Ok(true)
}

/// Installs the global subscriber writing to `log_dir`.
pub fn init(log_dir: &Path, debug: bool) -> Result<LoggingGuard> {
    fs::create_dir_all(log_dir).map_err(|e| HudError::io(log_dir, e))?;
    let rotated = rotate_if_needed(log_dir, MAX_LOG_BYTES)?;

    let appender = tracing_appender::rolling::never(log_dir, LOG_FILE_NAME);
    let (non_blocking, guard) = tracing_appender::non_blocking(appender);

    let default_level = if debug { "debug" } else { "warn" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);

    tracing_subscriber::registry()
        .with(filter)
        .with(file_layer)
        .try_init()
        .map_err(|e| HudError::Logging(e.to_string()))?;

    let path = log_file_path(log_dir);
    tracing::info!(path = %path.display(), rotated, level = default_level, "Logging initialized");

    Ok(LoggingGuard {
        guard: Some(guard),
        path,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rotate_skips_small_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(log_file_path(dir.path()), "small").unwrap();
        assert!(!rotate_if_needed(dir.path(), 1024).unwrap());
        assert!(log_file_path(dir.path()).exists());
    }

    #[test]
    fn test_rotate_moves_large_file() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(log_file_path(dir.path()), vec![b'x'; 2048]).unwrap();
        fs::write(dir.path().join("hud.log.1"), "older").unwrap();

        assert!(rotate_if_needed(dir.path(), 1024).unwrap());
        assert!(!log_file_path(dir.path()).exists());
        let rotated = fs::read(dir.path().join("hud.log.1")).unwrap();
        assert_eq!(rotated.len(), 2048);
    }

    #[test]
    fn test_rotate_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(!rotate_if_needed(dir.path(), 1024).unwrap());
    }
}
