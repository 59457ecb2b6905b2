//! Hook event kinds emitted by the host session.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Tool name whose input carries the full todo list.
pub const TODO_WRITE_TOOL: &str = "TodoWrite";

/// Tool name that spawns a sub-agent.
pub const TASK_TOOL: &str = "Task";

/// Types of hook events from Claude Code.
///
/// Events with names outside this set still decode; they simply have no
/// `HookEventType` and only touch advisory session fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub enum HookEventType {
    /// Before a tool is executed
    PreToolUse,

    /// After a tool completes execution
    PostToolUse,

    /// After a tool fails
    PostToolUseFailure,

    /// A sub-agent finished
    SubagentStop,

    /// User submitted a prompt
    UserPromptSubmit,

    /// Main agent finished its turn
    Stop,

    /// When a new session starts
    SessionStart,

    /// When a session ends
    SessionEnd,

    /// Before the host compacts its context
    PreCompact,

    /// Notification event (informational)
    Notification,
}

impl HookEventType {
    /// Returns true if this event closes a tool invocation.
    pub fn is_tool_completion(&self) -> bool {
        matches!(self, Self::PostToolUse | Self::PostToolUseFailure)
    }

    /// Parses from a hook event name string.
    pub fn from_event_name(name: &str) -> Option<Self> {
        match name {
            "PreToolUse" => Some(Self::PreToolUse),
            "PostToolUse" => Some(Self::PostToolUse),
            "PostToolUseFailure" => Some(Self::PostToolUseFailure),
            "SubagentStop" => Some(Self::SubagentStop),
            "UserPromptSubmit" => Some(Self::UserPromptSubmit),
            "Stop" => Some(Self::Stop),
            "SessionStart" => Some(Self::SessionStart),
            "SessionEnd" => Some(Self::SessionEnd),
            "PreCompact" => Some(Self::PreCompact),
            "Notification" => Some(Self::Notification),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PreToolUse => "PreToolUse",
            Self::PostToolUse => "PostToolUse",
            Self::PostToolUseFailure => "PostToolUseFailure",
            Self::SubagentStop => "SubagentStop",
            Self::UserPromptSubmit => "UserPromptSubmit",
            Self::Stop => "Stop",
            Self::SessionStart => "SessionStart",
            Self::SessionEnd => "SessionEnd",
            Self::PreCompact => "PreCompact",
            Self::Notification => "Notification",
        }
    }
}

impl fmt::Display for HookEventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
