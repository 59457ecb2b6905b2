//! Domain error types and structured diagnostic records.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::VecDeque;
use thiserror::Error;

// ============================================================================
// Error Codes
// ============================================================================

/// A line from the pipe could not be decoded.
pub const EVENT_PARSE_FAILED: &str = "event_parse_failed";

/// An event was produced under a newer protocol revision.
pub const SCHEMA_VERSION_MISMATCH: &str = "schema_version_mismatch";

pub const CONFIG_READ_FAILED: &str = "config_read_failed";

pub const SETTINGS_READ_FAILED: &str = "settings_read_failed";

/// The event pipe could not be opened or broke.
pub const PIPE_UNAVAILABLE: &str = "pipe_unavailable";

/// Maximum number of error records kept in state.
pub const MAX_ERRORS: usize = 10;

/// Errors raised while turning a JSON document into a typed snapshot.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SnapshotError {
    #[error("{document} document is not a JSON object")]
    NotAnObject { document: String },
}

// ============================================================================
// Error Records
// ============================================================================

/// A structured diagnostic shown in the HUD error list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorRecord {
    pub code: String,
    pub message: String,
    /// Epoch milliseconds
    pub ts: i64,
    #[serde(default)]
    pub context: Map<String, Value>,
}

impl ErrorRecord {
    pub fn new(code: impl Into<String>, message: impl Into<String>, ts: i64) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            ts,
            context: Map::new(),
        }
    }

    /// Adds one context entry.
    #[must_use]
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    pub fn is_schema_mismatch(&self) -> bool {
        self.code == SCHEMA_VERSION_MISMATCH
    }
}

/// Error list capped at [`MAX_ERRORS`]; oldest entries are evicted first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ErrorRing(VecDeque<ErrorRecord>);

impl ErrorRing {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: ErrorRecord) {
        self.0.push_back(record);
        while self.0.len() > MAX_ERRORS {
            self.0.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Records in arrival order.
    pub fn iter(&self) -> impl Iterator<Item = &ErrorRecord> {
        self.0.iter()
    }

    pub fn latest(&self) -> Option<&ErrorRecord> {
        self.0.back()
    }

    /// Most recent record with the given code.
    pub fn latest_with_code(&self, code: &str) -> Option<&ErrorRecord> {
        self.0.iter().rev().find(|record| record.code == code)
    }
}
