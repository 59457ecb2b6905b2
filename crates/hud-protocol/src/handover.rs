//! Session handover file.
//!
//! The host writes `refresh-<terminalId>.json` into the HUD directory when it
//! starts a new session or rotates its pipe. The file names the triple the
//! HUD should follow next.

use hud_core::{SessionId, TranscriptPath};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Name of the handover file for a terminal.
pub fn refresh_file_name(terminal_id: &str) -> String {
    format!("refresh-{terminal_id}.json")
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandoverError {
    #[error("Invalid handover JSON: {0}")]
    InvalidJson(String),

    #[error("Handover document is not an object")]
    NotAnObject,

    #[error("Handover document is missing {0}")]
    MissingField(&'static str),
}

/// The live session and pipe the HUD should follow.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTarget {
    pub session_id: SessionId,
    #[serde(rename = "fifoPath")]
    pub pipe_path: PathBuf,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub terminal_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_path: Option<TranscriptPath>,
}

impl SessionTarget {
    pub fn new(session_id: SessionId, pipe_path: impl Into<PathBuf>) -> Self {
        Self {
            session_id,
            pipe_path: pipe_path.into(),
            terminal_id: None,
            transcript_path: None,
        }
    }

    #[must_use]
    pub fn with_transcript(mut self, path: impl Into<PathBuf>) -> Self {
        self.transcript_path = Some(TranscriptPath::new(path));
        self
    }

    #[must_use]
    pub fn with_terminal(mut self, terminal_id: impl Into<String>) -> Self {
        self.terminal_id = Some(terminal_id.into());
        self
    }

    /// Parses a handover document.
    ///
    /// Accepts either `fifoPath` or `pipePath` for the pipe. A non-empty
    /// session id and pipe path are required; the rest is optional.
    pub fn from_json(text: &str) -> Result<Self, HandoverError> {
        let value: Value =
            serde_json::from_str(text).map_err(|e| HandoverError::InvalidJson(e.to_string()))?;
        let obj = value.as_object().ok_or(HandoverError::NotAnObject)?;

        let session_id = non_empty(obj.get("sessionId"))
            .ok_or(HandoverError::MissingField("sessionId"))?;
        let pipe_path = non_empty(obj.get("fifoPath"))
            .or_else(|| non_empty(obj.get("pipePath")))
            .ok_or(HandoverError::MissingField("fifoPath"))?;

        Ok(Self {
            session_id: SessionId::new(session_id),
            pipe_path: PathBuf::from(pipe_path),
            terminal_id: non_empty(obj.get("terminalId")).map(str::to_string),
            transcript_path: non_empty(obj.get("transcriptPath")).map(TranscriptPath::new),
        })
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Whether both describe the same (session, pipe, transcript) triple.
    ///
    /// The terminal id is ignored.
    pub fn same_target(&self, other: &SessionTarget) -> bool {
        self.session_id == other.session_id
            && self.pipe_path == other.pipe_path
            && self.transcript_path == other.transcript_path
    }

    /// Whether `self` only adds a transcript to `active`.
    ///
    /// Same session and pipe, and `active` had no transcript yet. Following
    /// such a target updates the transcript without a handover.
    pub fn adds_transcript_to(&self, active: &SessionTarget) -> bool {
        self.session_id == active.session_id
            && self.pipe_path == active.pipe_path
            && active.transcript_path.is_none()
            && self.transcript_path.is_some()
    }

    pub fn pipe_path(&self) -> &Path {
        &self.pipe_path
    }
}

fn non_empty(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}
