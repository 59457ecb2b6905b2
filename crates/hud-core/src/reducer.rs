//! Pure state transitions.
//!
//! [`reduce`] maps a state and an action to the next state. It never fails
//! and never mutates the input; the runtime store is its only production
//! caller.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()` or direct indexing
//! - Unknown event kinds and orphaned completions are absorbed into state

use tracing::{debug, trace};

use crate::agent::AgentRecord;
use crate::config::HudConfig;
use crate::context::ContextUsage;
use crate::cost::CostEstimate;
use crate::error::ErrorRecord;
use crate::event::HudEvent;
use crate::hook::{HookEventType, TASK_TOOL, TODO_WRITE_TOOL};
use crate::ids::{SessionId, ToolUseId, TranscriptPath};
use crate::settings::{ContextFiles, SettingsSnapshot};
use crate::state::{ConnectionStatus, HudState, SchemaBanner};
use crate::todo::parse_todos;
use crate::tool::{ToolRecord, ToolStatus};

/// Maximum tool records kept in state; oldest are dropped first.
pub const MAX_TOOLS: usize = 200;

/// Maximum agent records kept in state; oldest are dropped first.
pub const MAX_AGENTS: usize = 50;

/// Maximum completed tools kept per agent.
pub const MAX_AGENT_TOOLS: usize = 50;

// ============================================================================
// Actions
// ============================================================================

/// Every transition the store accepts.
#[derive(Debug, Clone, PartialEq)]
pub enum HudAction {
    /// A decoded event from the pipe, with the logical time it was received
    Event { event: Box<HudEvent>, now: i64 },
    /// Display model name
    Model(String),
    /// Advance the logical clock
    Tick { now: i64 },
    /// Append a structured diagnostic
    Error(ErrorRecord),
    /// Count one undecodable line
    ParseError,
    SafeMode {
        enabled: bool,
        reason: Option<String>,
    },
    Connection(ConnectionStatus),
    Config(Option<HudConfig>),
    ContextFiles(Option<ContextFiles>),
    Settings(Option<SettingsSnapshot>),
    Context(ContextUsage),
    Cost(CostEstimate),
    SchemaBanner(Option<SchemaBanner>),
    /// Transcript learned after the session started
    Transcript(TranscriptPath),
}

impl HudAction {
    pub fn event(event: HudEvent, now: i64) -> Self {
        Self::Event {
            event: Box::new(event),
            now,
        }
    }

    /// Short name for logging.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Event { .. } => "event",
            Self::Model(_) => "model",
            Self::Tick { .. } => "tick",
            Self::Error(_) => "error",
            Self::ParseError => "parse_error",
            Self::SafeMode { .. } => "safe_mode",
            Self::Connection(_) => "connection",
            Self::Config(_) => "config",
            Self::ContextFiles(_) => "context_files",
            Self::Settings(_) => "settings",
            Self::Context(_) => "context",
            Self::Cost(_) => "cost",
            Self::SchemaBanner(_) => "schema_banner",
            Self::Transcript(_) => "transcript",
        }
    }
}

// ============================================================================
// Reducer
// ============================================================================

/// Applies `action` to a copy of `state` and returns the copy.
pub fn reduce(state: &HudState, action: HudAction) -> HudState {
    let mut next = state.clone();
    next.apply(action);
    next
}

impl HudState {
    fn apply(&mut self, action: HudAction) {
        trace!(action = action.name(), "Reducing action");

        match action {
            HudAction::Event { event, now } => self.apply_event(&event, now),
            HudAction::Model(name) => self.model = Some(name),
            HudAction::Tick { now } => self.now = now,
            HudAction::Error(record) => self.errors.push(record),
            HudAction::ParseError => {
                self.parse_error_count = self.parse_error_count.saturating_add(1);
            }
            HudAction::SafeMode { enabled, reason } => {
                self.safe_mode = enabled;
                self.safe_mode_reason = reason;
            }
            HudAction::Connection(status) => {
                self.connection_status = status;
                self.recompute_phase();
            }
            HudAction::Config(config) => self.config = config,
            HudAction::ContextFiles(files) => self.context_files = files,
            HudAction::Settings(settings) => self.settings = settings,
            HudAction::Context(context) => self.context = context,
            HudAction::Cost(cost) => self.cost = cost,
            HudAction::SchemaBanner(banner) => self.schema_banner = banner,
            HudAction::Transcript(path) => self.session_info.transcript_path = path,
        }
    }

    fn apply_event(&mut self, event: &HudEvent, now: i64) {
        self.update_session_info(event);

        match event.kind() {
            Some(HookEventType::PreToolUse) => self.tool_started(event, now),
            Some(kind) if kind.is_tool_completion() => {
                let failed = kind == HookEventType::PostToolUseFailure;
                self.tool_finished(event, failed, now);
            }
            Some(HookEventType::SubagentStop) => self.agent_stopped(now),
            Some(HookEventType::Stop) => self.session_info.is_idle = true,
            Some(HookEventType::UserPromptSubmit) => self.session_info.is_idle = false,
            Some(_) => {}
            None => {
                debug!(event = %event.event, "Unrecognised event kind, advisory fields only");
            }
        }

        self.recompute_phase();
    }

    fn update_session_info(&mut self, event: &HudEvent) {
        let info = &mut self.session_info;
        if info.session_id.as_str() == crate::ids::UNKNOWN_SESSION && !event.session.is_empty() {
            info.session_id = SessionId::new(event.session.clone());
        }
        if let Some(cwd) = &event.cwd {
            info.cwd = cwd.clone();
        }
        if let Some(mode) = &event.permission_mode {
            info.permission_mode = mode.clone();
        }
        if let Some(path) = &event.transcript_path {
            info.transcript_path = TranscriptPath::new(path);
        }
        if let Some(prompt) = &event.prompt {
            info.last_prompt = Some(prompt.clone());
        }
    }

    // ------------------------------------------------------------------------
    // Tools
    // ------------------------------------------------------------------------

    fn tool_started(&mut self, event: &HudEvent, now: i64) {
        let id = event.tool_use_id_or_synthesized();
        let tool = event.tool_name().to_string();
        let parent = self.current_agent().map(|agent| agent.id.clone());

        let existing = self.running_tools.get(&id).copied();
        match existing.and_then(|index| self.tools.get_mut(index)) {
            Some(record) => {
                // Same id seen twice while running: restart in place
                debug!(tool_use_id = %id, "Duplicate PreToolUse, restarting record");
                *record = ToolRecord::started(id.clone(), tool.clone(), now);
                record.agent_id = parent;
            }
            None => {
                let mut record = ToolRecord::started(id.clone(), tool.clone(), now);
                record.agent_id = parent;
                self.running_tools.insert(id.clone(), self.tools.len());
                self.tools.push(record);
                self.trim_tools();
            }
        }

        if tool == TODO_WRITE_TOOL {
            if let Some(todos) = parse_todos(event.input.as_ref()) {
                self.todos = todos;
            }
        }

        if tool == TASK_TOOL && !self.agents.iter().any(|a| a.id == id && a.is_running()) {
            let agent = AgentRecord::started(
                id,
                event.input_str("subagent_type").unwrap_or("unknown"),
                event.input_str("description").unwrap_or_default(),
                now,
            );
            self.agents.push(agent);
            self.trim_agents();
        }

        self.session_info.is_idle = false;
    }

    fn tool_finished(&mut self, event: &HudEvent, failed: bool, now: i64) {
        let id = event.tool_use_id_or_synthesized();
        let status = if failed || event.response_is_error() {
            ToolStatus::Error
        } else {
            ToolStatus::Complete
        };
        let duration = event.response_duration_ms();

        let finished = match self.running_tools.remove(&id) {
            Some(index) => self.tools.get_mut(index).map(|record| {
                record.finish(status, now, duration);
                record.clone()
            }),
            None => None,
        };

        let record = match finished {
            Some(record) => record,
            None => {
                // Completion without a start (lost or reordered event)
                debug!(tool_use_id = %id, "PostToolUse without PreToolUse, synthesizing record");
                let mut record = ToolRecord::started(id, event.tool_name(), now);
                record.agent_id = self.current_agent().map(|agent| agent.id.clone());
                record.finish(status, now, duration);
                self.tools.push(record.clone());
                self.trim_tools();
                record
            }
        };

        if let Some(agent) = self.current_agent_mut() {
            if agent.id != record.id {
                agent.tools.push(record);
                let excess = agent.tools.len().saturating_sub(MAX_AGENT_TOOLS);
                agent.tools.drain(..excess);
            }
        }
    }

    /// Drops the oldest records beyond [`MAX_TOOLS`] and reindexes the running set.
    fn trim_tools(&mut self) {
        let excess = self.tools.len().saturating_sub(MAX_TOOLS);
        if excess == 0 {
            return;
        }
        self.tools.drain(..excess);
        self.running_tools.retain(|_, index| {
            if *index < excess {
                false
            } else {
                *index -= excess;
                true
            }
        });
    }

    // ------------------------------------------------------------------------
    // Agents
    // ------------------------------------------------------------------------

    fn trim_agents(&mut self) {
        let excess = self.agents.len().saturating_sub(MAX_AGENTS);
        self.agents.drain(..excess);
    }

    fn current_agent_mut(&mut self) -> Option<&mut AgentRecord> {
        self.agents.iter_mut().rev().find(|agent| agent.is_running())
    }

    fn agent_stopped(&mut self, now: i64) {
        match self.current_agent_mut() {
            Some(agent) => agent.complete(now),
            None => debug!("SubagentStop with no running agent"),
        }
    }
}

/// Convenience for tests and callers that only have a tool use id string.
pub fn running_tool_ids(state: &HudState) -> Vec<ToolUseId> {
    let mut ids: Vec<_> = state.running_tools.keys().cloned().collect();
    ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
    ids
}
