//! Decoded lifecycle notification from the host session.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::hook::HookEventType;
use crate::ids::{SessionId, ToolUseId};

/// One decoded line from the event pipe.
///
/// Field names follow the wire format (camelCase). Construct through the
/// codec in `hud-protocol`; the fields are public so tests and collaborators
/// can build events directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HudEvent {
    /// Protocol revision the producer wrote this event under (>= 1)
    pub schema_version: u32,

    /// Event kind tag, e.g. "PreToolUse"
    pub event: String,

    /// Tool name, `None` when absent or explicitly null
    #[serde(default)]
    pub tool: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use_id: Option<String>,

    #[serde(default)]
    pub input: Option<Map<String, Value>>,

    #[serde(default)]
    pub response: Option<Map<String, Value>>,

    pub session: String,

    /// Producer timestamp in epoch milliseconds
    pub ts: f64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permission_mode: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_path: Option<String>,
}

impl HudEvent {
    /// Creates a minimal event with only the required fields set.
    pub fn new(event: impl Into<String>, session: impl Into<String>, ts: f64) -> Self {
        Self {
            schema_version: 1,
            event: event.into(),
            tool: None,
            tool_use_id: None,
            input: None,
            response: None,
            session: session.into(),
            ts,
            cwd: None,
            prompt: None,
            permission_mode: None,
            transcript_path: None,
        }
    }

    /// Known hook kind, if the event tag is recognised.
    pub fn kind(&self) -> Option<HookEventType> {
        HookEventType::from_event_name(&self.event)
    }

    pub fn session_id(&self) -> SessionId {
        SessionId::new(self.session.clone())
    }

    /// Timestamp truncated to whole milliseconds.
    pub fn ts_millis(&self) -> i64 {
        self.ts as i64
    }

    /// Tool name, or "unknown" when the event carried none.
    pub fn tool_name(&self) -> &str {
        self.tool.as_deref().unwrap_or("unknown")
    }

    /// Tool use id from the event, synthesized from tool and timestamp if absent.
    pub fn tool_use_id_or_synthesized(&self) -> ToolUseId {
        match &self.tool_use_id {
            Some(id) if !id.is_empty() => ToolUseId::new(id.clone()),
            _ => ToolUseId::synthesized(self.tool_name(), self.ts_millis()),
        }
    }

    /// String field from `input`, if present and a string.
    pub fn input_str(&self, key: &str) -> Option<&str> {
        self.input.as_ref()?.get(key)?.as_str()
    }

    /// Whether the response payload reports a failure.
    ///
    /// A failure is a non-null, non-false `error` key or `is_error: true`.
    pub fn response_is_error(&self) -> bool {
        let Some(response) = &self.response else {
            return false;
        };
        let error_key = match response.get("error") {
            None | Some(Value::Null) | Some(Value::Bool(false)) => false,
            Some(_) => true,
        };
        error_key || response.get("is_error").and_then(Value::as_bool) == Some(true)
    }

    /// `duration_ms` from the response, when it is a non-negative number.
    pub fn response_duration_ms(&self) -> Option<i64> {
        let value = self.response.as_ref()?.get("duration_ms")?.as_f64()?;
        (value >= 0.0).then_some(value as i64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn with_response(response: Value) -> HudEvent {
        let mut event = HudEvent::new("PostToolUse", "s1", 1000.0);
        event.response = response.as_object().cloned();
        event
    }

    #[test]
    fn test_kind_for_known_and_unknown_tags() {
        assert_eq!(
            HudEvent::new("PreToolUse", "s1", 0.0).kind(),
            Some(HookEventType::PreToolUse)
        );
        assert_eq!(HudEvent::new("Mystery", "s1", 0.0).kind(), None);
    }

    #[test]
    fn test_synthesized_tool_use_id() {
        let mut event = HudEvent::new("PreToolUse", "s1", 1234.9);
        event.tool = Some("Bash".to_string());
        assert_eq!(event.tool_use_id_or_synthesized().as_str(), "Bash-1234");

        event.tool_use_id = Some("toolu_1".to_string());
        assert_eq!(event.tool_use_id_or_synthesized().as_str(), "toolu_1");
    }

    #[test]
    fn test_response_error_detection() {
        assert!(with_response(json!({"error": "boom"})).response_is_error());
        assert!(with_response(json!({"is_error": true})).response_is_error());
        assert!(!with_response(json!({"error": null})).response_is_error());
        assert!(!with_response(json!({"error": false})).response_is_error());
        assert!(!with_response(json!({"duration_ms": 3})).response_is_error());
        assert!(!HudEvent::new("PostToolUse", "s1", 0.0).response_is_error());
    }

    #[test]
    fn test_response_duration() {
        assert_eq!(
            with_response(json!({"duration_ms": 50})).response_duration_ms(),
            Some(50)
        );
        assert_eq!(
            with_response(json!({"duration_ms": "50"})).response_duration_ms(),
            None
        );
        assert_eq!(
            with_response(json!({"duration_ms": -1})).response_duration_ms(),
            None
        );
    }

    #[test]
    fn test_serializes_camel_case() {
        let mut event = HudEvent::new("Stop", "s1", 5.0);
        event.permission_mode = Some("plan".to_string());
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["schemaVersion"], 1);
        assert_eq!(value["permissionMode"], "plan");
        assert!(value.get("cwd").is_none());
    }
}
