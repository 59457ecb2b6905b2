//! Sub-agent identification and records.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::ids::ToolUseId;
use crate::tool::ToolRecord;

/// Kind of sub-agent, classified from the Task tool's `subagent_type`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentType {
    #[default]
    GeneralPurpose,
    Explore,
    Plan,
    CodeReviewer,
    FileSearch,
    /// Anything else, kept verbatim
    Custom(String),
}

impl AgentType {
    /// Classifies a `subagent_type` string.
    ///
    /// Matching ignores case and treats `-`, `_` and missing separators
    /// alike, so `Code-Reviewer`, `code_reviewer` and `codereviewer` agree.
    pub fn from_subagent_type(raw: &str) -> Self {
        let key: String = raw
            .chars()
            .filter(|c| *c != '-' && *c != '_')
            .flat_map(char::to_lowercase)
            .collect();
        match key.as_str() {
            "" | "generalpurpose" => Self::GeneralPurpose,
            "explore" | "explorer" => Self::Explore,
            "plan" | "planner" => Self::Plan,
            "codereviewer" | "codereview" => Self::CodeReviewer,
            "filesearch" => Self::FileSearch,
            _ => Self::Custom(raw.to_string()),
        }
    }

    /// Compact tag for the agents panel.
    pub fn tag(&self) -> &str {
        match self {
            Self::GeneralPurpose => "task",
            Self::Explore => "explore",
            Self::Plan => "plan",
            Self::CodeReviewer => "review",
            Self::FileSearch => "search",
            Self::Custom(name) => name,
        }
    }
}

impl fmt::Display for AgentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgentStatus {
    #[default]
    Running,
    Complete,
}

/// A sub-agent spawned through the Task tool.
///
/// The record id is the tool use id of the Task invocation that opened it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentRecord {
    pub id: ToolUseId,
    pub agent_type: AgentType,
    /// Raw subagent type string as sent by the host
    pub subagent_type: String,
    pub description: String,
    pub status: AgentStatus,
    pub start_ts: i64,
    pub end_ts: Option<i64>,
    /// Tools completed while this agent was current, in completion order
    pub tools: Vec<ToolRecord>,
}

impl AgentRecord {
    pub fn started(
        id: ToolUseId,
        subagent_type: impl Into<String>,
        description: impl Into<String>,
        start_ts: i64,
    ) -> Self {
        let subagent_type = subagent_type.into();
        Self {
            id,
            agent_type: AgentType::from_subagent_type(&subagent_type),
            subagent_type,
            description: description.into(),
            status: AgentStatus::Running,
            start_ts,
            end_ts: None,
            tools: Vec::new(),
        }
    }

    pub fn is_running(&self) -> bool {
        matches!(self.status, AgentStatus::Running)
    }

    pub fn complete(&mut self, end_ts: i64) {
        self.status = AgentStatus::Complete;
        self.end_ts = Some(end_ts);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifies_subagent_types() {
        let cases = [
            ("general-purpose", AgentType::GeneralPurpose),
            ("Explore", AgentType::Explore),
            ("planner", AgentType::Plan),
            ("Code_Reviewer", AgentType::CodeReviewer),
            ("file-search", AgentType::FileSearch),
            ("", AgentType::GeneralPurpose),
        ];
        for (raw, expected) in cases {
            assert_eq!(AgentType::from_subagent_type(raw), expected, "{raw}");
        }
        assert_eq!(
            AgentType::from_subagent_type("db-migrator"),
            AgentType::Custom("db-migrator".to_string())
        );
    }

    #[test]
    fn test_tag_keeps_custom_name() {
        assert_eq!(AgentType::CodeReviewer.to_string(), "review");
        assert_eq!(AgentType::Custom("db-migrator".into()).tag(), "db-migrator");
    }

    #[test]
    fn test_agent_record_lifecycle() {
        let mut agent = AgentRecord::started(ToolUseId::new("agent-1"), "Explore", "scan repo", 10);
        assert!(agent.is_running());
        assert_eq!(agent.agent_type, AgentType::Explore);
        assert_eq!(agent.subagent_type, "Explore");

        agent.complete(20);
        assert!(!agent.is_running());
        assert_eq!(agent.end_ts, Some(20));
    }
}
