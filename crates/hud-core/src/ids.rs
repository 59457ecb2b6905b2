//! Type-safe identifiers shared across the HUD.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Declares a string-backed id newtype with `new`, `as_str` and `Display`.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(
    /// The host session being followed, taken verbatim from events or the
    /// handover file.
    SessionId
);

string_id!(
    /// One tool invocation. Hosts send `toolu_...`; missing ids are
    /// synthesized as `<tool>-<ts>`.
    ToolUseId
);

/// Session id used when the process is started without one.
pub const UNKNOWN_SESSION: &str = "unknown";

impl SessionId {
    /// Placeholder for a session that has not announced itself.
    pub fn unknown() -> Self {
        Self::new(UNKNOWN_SESSION)
    }

    /// First 8 characters, for log lines.
    #[must_use]
    pub fn short(&self) -> &str {
        self.0.get(..8).unwrap_or(&self.0)
    }
}

impl ToolUseId {
    pub fn synthesized(tool: &str, ts: i64) -> Self {
        Self(format!("{tool}-{ts}"))
    }
}

/// A session's transcript JSONL file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TranscriptPath(PathBuf);

impl TranscriptPath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }

    pub fn filename(&self) -> Option<&str> {
        self.0.file_name().and_then(|n| n.to_str())
    }
}

impl fmt::Display for TranscriptPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}
