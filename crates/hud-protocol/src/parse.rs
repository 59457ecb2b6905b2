//! Decoding of event pipe lines.
//!
//! Each line must be one JSON object. Decoding is a tagged result rather
//! than an exception: callers get the event, the event plus a
//! [`SchemaWarning`], or a [`ParseFailure`] carrying a bounded preview of
//! the offending line.

use hud_core::error::{EVENT_PARSE_FAILED, SCHEMA_VERSION_MISMATCH};
use hud_core::{ErrorRecord, HudEvent};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::version::SchemaVersion;

/// Characters of the raw line kept in a failure preview.
pub const LINE_PREVIEW_CHARS: usize = 120;

// ============================================================================
// Errors
// ============================================================================

/// Why a line could not be decoded.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventParseError {
    #[error("Invalid JSON: {0}")]
    InvalidJson(String),

    #[error("payload is not an object")]
    NotAnObject,

    /// A required field is absent or has the wrong type.
    ///
    /// Missing and invalid are reported identically.
    #[error("Invalid or missing field: {field}")]
    InvalidField { field: &'static str },
}

/// A failed decode with enough context to report it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseFailure {
    pub error: EventParseError,
    pub line_preview: String,
}

impl ParseFailure {
    fn new(error: EventParseError, line: &str) -> Self {
        Self {
            error,
            line_preview: preview(line),
        }
    }

    /// Converts into an `event_parse_failed` record.
    pub fn to_record(&self, now: i64) -> ErrorRecord {
        ErrorRecord::new(EVENT_PARSE_FAILED, self.error.to_string(), now)
            .with_context("linePreview", self.line_preview.clone())
    }
}

/// Non-fatal notice that an event used a newer schema.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SchemaWarning {
    pub schema_version: u32,
    pub expected: u32,
}

impl SchemaWarning {
    pub fn message(&self) -> String {
        format!(
            "Schema version {} is newer than supported {}",
            self.schema_version, self.expected
        )
    }

    /// Converts into a `schema_version_mismatch` record.
    pub fn to_record(&self, now: i64) -> ErrorRecord {
        ErrorRecord::new(SCHEMA_VERSION_MISMATCH, self.message(), now)
            .with_context("schemaVersion", self.schema_version)
            .with_context("expected", self.expected)
    }
}

/// Successful decode.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedEvent {
    pub event: HudEvent,
    pub warning: Option<SchemaWarning>,
}

// ============================================================================
// Parsing
// ============================================================================

/// Decodes a line, discarding any failure or warning.
pub fn parse_event(line: &str) -> Option<HudEvent> {
    parse_event_result(line).ok().map(|parsed| parsed.event)
}

/// Decodes a line, reporting failures and schema warnings.
pub fn parse_event_result(line: &str) -> Result<ParsedEvent, ParseFailure> {
    let value: Value = serde_json::from_str(line)
        .map_err(|e| ParseFailure::new(EventParseError::InvalidJson(e.to_string()), line))?;
    let obj = value
        .as_object()
        .ok_or_else(|| ParseFailure::new(EventParseError::NotAnObject, line))?;

    decode_object(obj).map_err(|error| ParseFailure::new(error, line))
}

fn decode_object(obj: &Map<String, Value>) -> Result<ParsedEvent, EventParseError> {
    let schema_version = obj
        .get("schemaVersion")
        .and_then(Value::as_u64)
        .and_then(|v| u32::try_from(v).ok())
        .and_then(SchemaVersion::new)
        .ok_or(EventParseError::InvalidField {
            field: "schemaVersion",
        })?;

    let event = obj
        .get("event")
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .ok_or(EventParseError::InvalidField { field: "event" })?;

    let session = obj
        .get("session")
        .and_then(Value::as_str)
        .ok_or(EventParseError::InvalidField { field: "session" })?;

    let ts = obj
        .get("ts")
        .and_then(Value::as_f64)
        .ok_or(EventParseError::InvalidField { field: "ts" })?;

    let tool = match obj.get("tool") {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s.clone()),
        Some(_) => return Err(EventParseError::InvalidField { field: "tool" }),
    };

    let warning = schema_version
        .is_newer_than_supported()
        .then(|| SchemaWarning {
            schema_version: schema_version.get(),
            expected: SchemaVersion::SUPPORTED.get(),
        });

    let event = HudEvent {
        schema_version: schema_version.get(),
        event: event.to_string(),
        tool,
        tool_use_id: optional_string(obj, "toolUseId"),
        input: optional_object(obj, "input")?,
        response: optional_object(obj, "response")?,
        session: session.to_string(),
        ts,
        cwd: optional_string(obj, "cwd"),
        prompt: optional_string(obj, "prompt"),
        permission_mode: optional_string(obj, "permissionMode"),
        transcript_path: optional_string(obj, "transcriptPath"),
    };

    Ok(ParsedEvent { event, warning })
}

/// Object, null or absent. Anything else is an error naming the field.
fn optional_object(
    obj: &Map<String, Value>,
    field: &'static str,
) -> Result<Option<Map<String, Value>>, EventParseError> {
    match obj.get(field) {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Object(map)) => Ok(Some(map.clone())),
        Some(_) => Err(EventParseError::InvalidField { field }),
    }
}

/// Advisory strings of the wrong type are dropped.
fn optional_string(obj: &Map<String, Value>, field: &str) -> Option<String> {
    obj.get(field).and_then(Value::as_str).map(str::to_string)
}

fn preview(line: &str) -> String {
    let mut chars = line.chars();
    let head: String = chars.by_ref().take(LINE_PREVIEW_CHARS).collect();
    if chars.next().is_some() {
        format!("{head}...")
    } else {
        head
    }
}
