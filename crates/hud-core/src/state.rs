//! Aggregate HUD state.
//!
//! `HudState` is a plain value. The runtime store owns the live instance and
//! replaces it wholesale through [`crate::reducer::reduce`].

use serde::Serialize;
use std::collections::HashMap;
use std::fmt;

use crate::agent::AgentRecord;
use crate::config::HudConfig;
use crate::context::ContextUsage;
use crate::cost::CostEstimate;
use crate::error::ErrorRing;
use crate::ids::{SessionId, ToolUseId, TranscriptPath};
use crate::settings::{ContextFiles, SettingsSnapshot};
use crate::todo::TodoItem;
use crate::tool::ToolRecord;

// ============================================================================
// Connection & Phase
// ============================================================================

/// State of the event pipe as seen by the session manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionStatus {
    #[default]
    Connecting,
    Connected,
    Disconnected,
    Error,
}

impl ConnectionStatus {
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
            Self::Error => "error",
        }
    }
}

impl fmt::Display for ConnectionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Coarse session phase shown by the view.
///
/// Always derived from the idle flag and connection status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionPhase {
    Active,
    #[default]
    Idle,
    Error,
}

impl SessionPhase {
    pub fn derive(is_idle: bool, connection: ConnectionStatus) -> Self {
        match connection {
            ConnectionStatus::Error => Self::Error,
            ConnectionStatus::Connected if !is_idle => Self::Active,
            _ => Self::Idle,
        }
    }
}

// ============================================================================
// Session Info
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub session_id: SessionId,
    pub permission_mode: String,
    pub cwd: String,
    pub transcript_path: TranscriptPath,
    pub is_idle: bool,
    pub last_prompt: Option<String>,
}

impl SessionInfo {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            session_id,
            permission_mode: "default".to_string(),
            cwd: String::new(),
            transcript_path: TranscriptPath::default(),
            is_idle: true,
            last_prompt: None,
        }
    }
}

/// Schema mismatch banner currently on screen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaBanner {
    pub schema_version: u32,
    pub expected: u32,
    /// Logical time the banner was shown (epoch ms)
    pub shown_at: i64,
}

impl SchemaBanner {
    pub fn message(&self) -> String {
        format!(
            "Schema mismatch: events are v{} (expected v{}). Update claude-hud.",
            self.schema_version, self.expected
        )
    }
}

// ============================================================================
// HUD State
// ============================================================================

/// Everything the view needs to draw one frame.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HudState {
    /// Tool invocations in start order, bounded by [`crate::reducer::MAX_TOOLS`]
    pub tools: Vec<ToolRecord>,

    /// Running tool id → index into `tools`
    #[serde(skip)]
    pub running_tools: HashMap<ToolUseId, usize>,

    pub todos: Vec<TodoItem>,
    pub agents: Vec<AgentRecord>,
    pub context: ContextUsage,
    pub cost: CostEstimate,
    pub session_info: SessionInfo,
    pub session_phase: SessionPhase,
    pub safe_mode: bool,
    pub safe_mode_reason: Option<String>,
    pub errors: ErrorRing,
    pub parse_error_count: u64,
    pub settings: Option<SettingsSnapshot>,
    pub config: Option<HudConfig>,
    pub context_files: Option<ContextFiles>,
    pub model: Option<String>,
    pub connection_status: ConnectionStatus,
    pub schema_banner: Option<SchemaBanner>,

    /// Logical clock (epoch ms), advanced by ticks
    pub now: i64,
}

impl Default for HudState {
    fn default() -> Self {
        Self::new(SessionId::unknown())
    }
}

impl HudState {
    pub fn new(session_id: SessionId) -> Self {
        Self {
            tools: Vec::new(),
            running_tools: HashMap::new(),
            todos: Vec::new(),
            agents: Vec::new(),
            context: ContextUsage::default(),
            cost: CostEstimate::default(),
            session_info: SessionInfo::new(session_id),
            session_phase: SessionPhase::Idle,
            safe_mode: false,
            safe_mode_reason: None,
            errors: ErrorRing::new(),
            parse_error_count: 0,
            settings: None,
            config: None,
            context_files: None,
            model: None,
            connection_status: ConnectionStatus::Connecting,
            schema_banner: None,
            now: 0,
        }
    }

    /// Fresh state for a session taken over from the handover file.
    pub fn for_session(session_id: SessionId, transcript_path: Option<TranscriptPath>) -> Self {
        let mut state = Self::new(session_id);
        if let Some(path) = transcript_path {
            state.session_info.transcript_path = path;
        }
        state
    }

    /// The agent that owns newly completed tools, if any.
    pub fn current_agent(&self) -> Option<&AgentRecord> {
        self.agents.iter().rev().find(|agent| agent.is_running())
    }

    pub fn running_tool(&self, id: &ToolUseId) -> Option<&ToolRecord> {
        self.running_tools
            .get(id)
            .and_then(|index| self.tools.get(*index))
    }

    pub fn running_tool_count(&self) -> usize {
        self.running_tools.len()
    }

    /// All records for the given tool use id (normally at most one).
    pub fn tools_with_id<'a>(&'a self, id: &'a str) -> impl Iterator<Item = &'a ToolRecord> {
        self.tools.iter().filter(move |tool| tool.id.as_str() == id)
    }

    pub fn is_idle(&self) -> bool {
        self.session_info.is_idle
    }

    pub(crate) fn recompute_phase(&mut self) {
        self.session_phase =
            SessionPhase::derive(self.session_info.is_idle, self.connection_status);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_phase_derivation() {
        use ConnectionStatus::*;
        assert_eq!(SessionPhase::derive(false, Connected), SessionPhase::Active);
        assert_eq!(SessionPhase::derive(true, Connected), SessionPhase::Idle);
        assert_eq!(SessionPhase::derive(false, Disconnected), SessionPhase::Idle);
        assert_eq!(SessionPhase::derive(false, Connecting), SessionPhase::Idle);
        assert_eq!(SessionPhase::derive(false, Error), SessionPhase::Error);
        assert_eq!(SessionPhase::derive(true, Error), SessionPhase::Error);
    }

    #[test]
    fn test_new_state_defaults() {
        let state = HudState::default();
        assert_eq!(state.session_info.session_id.as_str(), "unknown");
        assert!(state.is_idle());
        assert_eq!(state.connection_status, ConnectionStatus::Connecting);
        assert_eq!(state.session_phase, SessionPhase::Idle);
        assert!(state.current_agent().is_none());
    }

    #[test]
    fn test_for_session_sets_transcript() {
        let state = HudState::for_session(
            SessionId::new("s2"),
            Some(TranscriptPath::new("/tmp/s2.jsonl")),
        );
        assert_eq!(state.session_info.session_id.as_str(), "s2");
        assert_eq!(state.session_info.transcript_path.filename(), Some("s2.jsonl"));
    }

    #[test]
    fn test_banner_message() {
        let banner = SchemaBanner {
            schema_version: 2,
            expected: 1,
            shown_at: 0,
        };
        assert!(banner.message().contains("v2 (expected v1)"));
        assert!(banner.message().contains("Update claude-hud"));
    }

    #[test]
    fn test_running_tools_not_serialized() {
        let value = serde_json::to_value(HudState::default()).unwrap();
        assert!(value.get("runningTools").is_none());
        assert_eq!(value["sessionPhase"], "idle");
        assert_eq!(value["connectionStatus"], "connecting");
    }
}
