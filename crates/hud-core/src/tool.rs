//! Tool invocation records.

use serde::{Deserialize, Serialize};

use crate::ids::ToolUseId;

/// Lifecycle status of a tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolStatus {
    #[default]
    Running,
    Complete,
    Error,
}

impl ToolStatus {
    pub fn is_running(&self) -> bool {
        matches!(self, Self::Running)
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Error => "error",
        }
    }
}

/// One tool invocation as seen by the HUD.
///
/// Timestamps are epoch milliseconds. `end_ts`/`duration_ms` are set once the
/// invocation completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolRecord {
    pub id: ToolUseId,
    pub tool: String,
    pub status: ToolStatus,
    pub start_ts: i64,
    pub end_ts: Option<i64>,
    pub duration_ms: Option<i64>,
    /// Sub-agent that was running when the tool started
    pub agent_id: Option<ToolUseId>,
}

impl ToolRecord {
    /// Creates a running record.
    pub fn started(id: ToolUseId, tool: impl Into<String>, start_ts: i64) -> Self {
        Self {
            id,
            tool: tool.into(),
            status: ToolStatus::Running,
            start_ts,
            end_ts: None,
            duration_ms: None,
            agent_id: None,
        }
    }

    /// Marks the record finished.
    ///
    /// Duration falls back to `end_ts - start_ts` when none is reported.
    pub fn finish(&mut self, status: ToolStatus, end_ts: i64, duration_ms: Option<i64>) {
        self.status = status;
        self.end_ts = Some(end_ts);
        self.duration_ms =
            Some(duration_ms.unwrap_or_else(|| end_ts.saturating_sub(self.start_ts).max(0)));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finish_uses_reported_duration() {
        let mut record = ToolRecord::started(ToolUseId::new("t1"), "Read", 1000);
        record.finish(ToolStatus::Complete, 1200, Some(50));
        assert_eq!(record.duration_ms, Some(50));
        assert_eq!(record.end_ts, Some(1200));
        assert!(!record.status.is_running());
    }

    #[test]
    fn test_finish_falls_back_to_elapsed() {
        let mut record = ToolRecord::started(ToolUseId::new("t1"), "Read", 1000);
        record.finish(ToolStatus::Error, 1200, None);
        assert_eq!(record.duration_ms, Some(200));
        assert_eq!(record.status.label(), "error");
    }

    #[test]
    fn test_finish_never_negative() {
        let mut record = ToolRecord::started(ToolUseId::new("t1"), "Read", 5000);
        record.finish(ToolStatus::Complete, 1000, None);
        assert_eq!(record.duration_ms, Some(0));
    }
}
