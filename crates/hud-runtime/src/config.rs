//! Filesystem locations and environment overrides.

use std::env;
use std::path::{Path, PathBuf};

use hud_protocol::refresh_file_name;

use crate::error::{HudError, Result};

/// Overrides the HUD directory.
pub const HUD_DIR_ENV: &str = "CLAUDE_HUD_DIR";

/// Set to `1` to enable debug logging.
pub const DEBUG_ENV: &str = "CLAUDE_HUD_DEBUG";

/// Where the HUD keeps its files.
///
/// Defaults to `~/.claude/hud`. Every path the runtime touches is derived
/// from here except the host settings file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HudPaths {
    pub hud_dir: PathBuf,
    pub settings_file: PathBuf,
}

impl HudPaths {
    /// Resolves paths from `CLAUDE_HUD_DIR` or the home directory.
    pub fn resolve() -> Result<Self> {
        let home = dirs::home_dir();
        let hud_dir = match env::var_os(HUD_DIR_ENV) {
            Some(dir) if !dir.is_empty() => PathBuf::from(dir),
            _ => home
                .as_ref()
                .map(|h| h.join(".claude").join("hud"))
                .ok_or(HudError::NoHudDir)?,
        };
        let settings_file = home
            .map(|h| h.join(".claude").join("settings.json"))
            .unwrap_or_else(|| hud_dir.join("settings.json"));
        Ok(Self {
            hud_dir,
            settings_file,
        })
    }

    /// Paths rooted at an explicit directory.
    pub fn in_dir(hud_dir: impl Into<PathBuf>) -> Self {
        let hud_dir = hud_dir.into();
        Self {
            settings_file: hud_dir.join("settings.json"),
            hud_dir,
        }
    }

    pub fn hud_dir(&self) -> &Path {
        &self.hud_dir
    }

    pub fn log_dir(&self) -> PathBuf {
        self.hud_dir.join("logs")
    }

    pub fn config_file(&self) -> PathBuf {
        self.hud_dir.join("config.json")
    }

    pub fn refresh_file(&self, terminal_id: &str) -> PathBuf {
        self.hud_dir.join(refresh_file_name(terminal_id))
    }
}

/// Whether `CLAUDE_HUD_DEBUG=1` is set.
pub fn debug_enabled() -> bool {
    env::var(DEBUG_ENV).map(|v| v == "1").unwrap_or(false)
}
