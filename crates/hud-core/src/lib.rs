//! HUD Core - domain types and the state reducer for the Claude HUD
//!
//! This crate is free of I/O. It defines the decoded event shape, the
//! aggregate [`HudState`], and the pure [`reduce`] function the runtime
//! store drives.
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod agent;
pub mod config;
pub mod context;
pub mod cost;
pub mod error;
pub mod event;
pub mod hook;
pub mod ids;
pub mod reducer;
pub mod settings;
pub mod state;
pub mod todo;
pub mod tool;

// Re-exports for convenience
pub use agent::{AgentRecord, AgentStatus, AgentType};
pub use config::{HudConfig, PanelId, PricingTable};
pub use context::{format_tokens, ContextBreakdown, ContextStatus, ContextUsage, TokenCount};
pub use cost::{CostEstimate, ModelFamily, ModelRates, Money};
pub use error::{ErrorRecord, ErrorRing, SnapshotError, MAX_ERRORS};
pub use event::HudEvent;
pub use hook::HookEventType;
pub use ids::{SessionId, ToolUseId, TranscriptPath};
pub use reducer::{reduce, HudAction, MAX_AGENTS, MAX_AGENT_TOOLS, MAX_TOOLS};
pub use settings::{ContextFiles, SettingsSnapshot};
pub use state::{ConnectionStatus, HudState, SchemaBanner, SessionInfo, SessionPhase};
pub use todo::{TodoItem, TodoStatus};
pub use tool::{ToolRecord, ToolStatus};

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
