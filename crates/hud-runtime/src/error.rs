//! Runtime error types.
//!
//! Errors here are for setup paths (logging, watchers, startup contract).
//! Once the session loop runs, failures become state instead of errors.
//!
//! **Panic-Free Policy:** No `.unwrap()`, `.expect()`, `panic!()`,
//! `unreachable!()`, or `todo!()`.

use std::io;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum HudError {
    /// The streaming HUD was started without a pipe to read.
    #[error("Missing required --fifo <path> argument")]
    MissingPipePath,

    /// The HUD directory could not be determined (no home directory).
    #[error("Could not determine the HUD directory; set CLAUDE_HUD_DIR")]
    NoHudDir,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to watch {path}: {reason}")]
    Watch { path: PathBuf, reason: String },

    #[error("Failed to install signal handler: {0}")]
    Signal(String),

    #[error("Failed to initialise logging: {0}")]
    Logging(String),

    /// The store actor has shut down.
    #[error("State store is no longer running")]
    StoreClosed,
}

impl HudError {
    pub fn io(path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

pub type Result<T> = std::result::Result<T, HudError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_pipe_message_mentions_flag() {
        assert!(HudError::MissingPipePath.to_string().contains("--fifo"));
    }

    #[test]
    fn test_io_error_includes_path() {
        let err = HudError::io(
            "/tmp/x",
            io::Error::new(io::ErrorKind::NotFound, "gone"),
        );
        let message = err.to_string();
        assert!(message.contains("/tmp/x"));
        assert!(message.contains("gone"));
    }
}
