//! Integration tests for the session manager.
//!
//! Event streams are replayed from regular files: the pipe reader reads a
//! regular file once to its end, which keeps these tests free of FIFOs.
//!
//! Tests CAN use `.unwrap()` and `.expect()`.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use hud_core::error::PIPE_UNAVAILABLE;
use hud_core::{
    AgentStatus, ConnectionStatus, HudAction, HudEvent, HudState, SessionId, ToolStatus,
};
use hud_protocol::{refresh_file_name, SessionTarget};
use hud_runtime::{
    spawn_store, DegradeConfig, ManagerConfig, RecheckSource, RecheckTrigger, SessionManager,
    StoreHandle,
};
use serde_json::{json, Value};
use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

// ============================================================================
// Constants
// ============================================================================

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);
const TERMINAL: &str = "term-1";

// ============================================================================
// Test Helpers
// ============================================================================

fn event_line(event: &str, session: &str, extra: Value) -> String {
    let mut obj = json!({
        "schemaVersion": 1,
        "event": event,
        "session": session,
        "ts": 1_700_000_000_000.0_f64,
    });
    if let (Some(base), Some(extra)) = (obj.as_object_mut(), extra.as_object()) {
        for (key, value) in extra {
            base.insert(key.clone(), value.clone());
        }
    }
    obj.to_string()
}

/// Writes the stream under a temporary name first so a reader never sees a
/// partial file.
fn write_events(path: &Path, lines: &[String]) {
    let mut text = lines.join("\n");
    text.push('\n');
    let staging = path.with_extension("partial");
    fs::write(&staging, text).expect("write events");
    fs::rename(&staging, path).expect("publish events");
}

fn test_config() -> ManagerConfig {
    ManagerConfig {
        poll_interval: Duration::from_secs(3600),
        banner_tick: Duration::from_millis(10),
        retry_initial_delay: Duration::from_millis(10),
        retry_max_delay: Duration::from_millis(50),
        degrade: DegradeConfig {
            banner_visible: Duration::from_millis(100),
            banner_suppress: Duration::from_millis(200),
            ..DegradeConfig::default()
        },
        listen_for_signal: false,
        watch_refresh_file: false,
        ..ManagerConfig::default()
    }
}

struct TestHud {
    dir: TempDir,
    store: StoreHandle,
    trigger: RecheckTrigger,
    cancel: CancellationToken,
    task: JoinHandle<hud_runtime::Result<()>>,
}

impl TestHud {
    async fn start(session: &str, pipe_name: &str, config: ManagerConfig) -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        Self::start_in(dir, session, pipe_name, config).await
    }

    async fn start_in(dir: TempDir, session: &str, pipe_name: &str, config: ManagerConfig) -> Self {
        let store = spawn_store(HudState::default());
        let refresh_file = dir.path().join(refresh_file_name(TERMINAL));
        let mut manager = SessionManager::new(refresh_file, store.clone(), config);

        let target = SessionTarget::new(SessionId::new(session), dir.path().join(pipe_name));
        assert!(manager.follow(target).await.unwrap());

        let trigger = manager.trigger();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(manager.run(cancel.clone()));

        Self {
            dir,
            store,
            trigger,
            cancel,
            task,
        }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn write_refresh(&self, target: &SessionTarget) {
        fs::write(self.path(&refresh_file_name(TERMINAL)), target.to_json()).expect("write refresh");
    }

    async fn wait_for<F>(&self, what: &str, predicate: F) -> Arc<HudState>
    where
        F: Fn(&HudState) -> bool,
    {
        let mut rx = self.store.subscribe();
        let result = timeout(WAIT_TIMEOUT, async {
            loop {
                let state = rx.borrow_and_update().clone();
                if predicate(&state) {
                    return state;
                }
                rx.changed().await.expect("store alive");
            }
        })
        .await;
        match result {
            Ok(state) => state,
            Err(_) => panic!("timed out waiting for {what}: {:?}", self.store.snapshot()),
        }
    }

    async fn shutdown(self) {
        self.cancel.cancel();
        let result = timeout(WAIT_TIMEOUT, self.task)
            .await
            .expect("manager stops")
            .expect("manager task joins");
        assert!(result.is_ok());
    }
}

// ============================================================================
// Streaming
// ============================================================================

#[tokio::test]
async fn test_agent_scenario_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    write_events(
        &dir.path().join("events.jsonl"),
        &[
            event_line(
                "PreToolUse",
                "s1",
                json!({"tool": "Task", "toolUseId": "agent-1", "input": {"subagent_type": "explore", "description": "look around"}}),
            ),
            event_line("PreToolUse", "s1", json!({"tool": "Read", "toolUseId": "read-1"})),
            "this is not json".to_string(),
            event_line(
                "PostToolUse",
                "s1",
                json!({"tool": "Read", "toolUseId": "read-1", "response": {"duration_ms": 50}}),
            ),
            event_line("SubagentStop", "s1", json!({})),
        ],
    );

    let hud = TestHud::start_in(dir, "s1", "events.jsonl", test_config()).await;

    let state = hud
        .wait_for("agent completion", |s| {
            s.agents.first().is_some_and(|a| a.status == AgentStatus::Complete)
        })
        .await;

    assert_eq!(state.agents.len(), 1);
    let agent = &state.agents[0];
    assert_eq!(agent.description, "look around");
    assert_eq!(agent.tools.len(), 1);
    assert_eq!(agent.tools[0].tool, "Read");
    assert_eq!(agent.tools[0].duration_ms, Some(50));
    assert_eq!(agent.tools[0].status, ToolStatus::Complete);
    assert_eq!(state.parse_error_count, 1);

    hud.wait_for("disconnect at end of file", |s| {
        s.connection_status == ConnectionStatus::Disconnected
    })
    .await;
    hud.shutdown().await;
}

#[tokio::test]
async fn test_missing_pipe_becomes_error_state() {
    let hud = TestHud::start("s1", "no-such-pipe", test_config()).await;

    let state = hud
        .wait_for("pipe error", |s| s.connection_status == ConnectionStatus::Error)
        .await;
    assert!(state.errors.latest_with_code(PIPE_UNAVAILABLE).is_some());

    // the pipe shows up later and is picked up by the retry loop
    write_events(
        &hud.path("no-such-pipe"),
        &[event_line("UserPromptSubmit", "s1", json!({"prompt": "hi"}))],
    );
    let state = hud
        .wait_for("prompt", |s| s.session_info.last_prompt.is_some())
        .await;
    assert_eq!(state.session_info.last_prompt.as_deref(), Some("hi"));
    hud.shutdown().await;
}

#[tokio::test]
async fn test_newer_schema_banner_shows_then_hides() {
    let dir = tempfile::tempdir().unwrap();
    let mut line: Value = serde_json::from_str(&event_line("Stop", "s1", json!({}))).unwrap();
    line["schemaVersion"] = json!(2);
    write_events(&dir.path().join("events.jsonl"), &[line.to_string()]);

    let hud = TestHud::start_in(dir, "s1", "events.jsonl", test_config()).await;

    let state = hud
        .wait_for("banner", |s| s.schema_banner.is_some())
        .await;
    let banner = state.schema_banner.unwrap();
    assert_eq!((banner.schema_version, banner.expected), (2, 1));
    assert!(state.errors.iter().any(|e| e.is_schema_mismatch()));

    hud.wait_for("banner hidden", |s| s.schema_banner.is_none())
        .await;
    hud.shutdown().await;
}

// ============================================================================
// Handover
// ============================================================================

#[tokio::test]
async fn test_handover_replaces_state() {
    let dir = tempfile::tempdir().unwrap();
    write_events(
        &dir.path().join("one.jsonl"),
        &[
            event_line("PreToolUse", "s1", json!({"tool": "Bash", "toolUseId": "b1"})),
            "garbage".to_string(),
        ],
    );
    write_events(
        &dir.path().join("two.jsonl"),
        &[event_line("PreToolUse", "s2", json!({"tool": "Grep", "toolUseId": "g1"}))],
    );

    let hud = TestHud::start_in(dir, "s1", "one.jsonl", test_config()).await;
    hud.wait_for("first session", |s| {
        s.tools.len() == 1 && s.parse_error_count == 1
    })
    .await;

    let next = SessionTarget::new(SessionId::new("s2"), hud.path("two.jsonl"))
        .with_terminal(TERMINAL)
        .with_transcript(hud.path("s2.jsonl"));
    hud.write_refresh(&next);
    assert!(hud.trigger.request(RecheckSource::Manual));

    let state = hud
        .wait_for("second session", |s| {
            s.session_info.session_id.as_str() == "s2" && !s.tools.is_empty()
        })
        .await;
    assert_eq!(state.tools.len(), 1);
    assert_eq!(state.tools[0].tool, "Grep");
    assert_eq!(state.parse_error_count, 0);
    assert_eq!(
        state.session_info.transcript_path.as_path(),
        hud.path("s2.jsonl").as_path()
    );
    hud.shutdown().await;
}

#[tokio::test]
async fn test_recheck_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let refresh_file = dir.path().join(refresh_file_name(TERMINAL));
    let store = spawn_store(HudState::default());
    let mut manager = SessionManager::new(&refresh_file, store.clone(), test_config());

    // no file yet: nothing to do
    assert!(!manager.recheck().await.unwrap());

    let target = SessionTarget::new(SessionId::new("s1"), dir.path().join("p"));
    fs::write(&refresh_file, target.to_json()).unwrap();
    assert!(manager.recheck().await.unwrap());
    assert!(!manager.recheck().await.unwrap());
    assert!(!manager.recheck().await.unwrap());
    assert_eq!(manager.handovers(), 1);

    // the terminal id alone does not make a new target
    fs::write(&refresh_file, target.clone().with_terminal("other").to_json()).unwrap();
    assert!(!manager.recheck().await.unwrap());

    // a half-written file is ignored
    fs::write(&refresh_file, "{\"sessionId\":").unwrap();
    assert!(!manager.recheck().await.unwrap());
    assert_eq!(manager.active().map(|t| t.session_id.as_str()), Some("s1"));
}

#[tokio::test]
async fn test_transcript_for_same_session_keeps_state() {
    let dir = tempfile::tempdir().unwrap();
    let refresh_file = dir.path().join(refresh_file_name(TERMINAL));
    let store = spawn_store(HudState::default());
    let mut manager = SessionManager::new(&refresh_file, store.clone(), test_config());

    let started = SessionTarget::new(SessionId::new("s1"), dir.path().join("p.jsonl"));
    assert!(manager.follow(started.clone()).await.unwrap());

    let mut event = HudEvent::new("PreToolUse", "s1", 1_000.0);
    event.tool = Some("Read".to_string());
    event.tool_use_id = Some("r1".to_string());
    store.dispatch(HudAction::event(event, 1_000)).await.unwrap();
    assert_eq!(store.settled().await.tools.len(), 1);

    let transcript = dir.path().join("s1.jsonl");
    fs::write(&refresh_file, started.clone().with_transcript(&transcript).to_json()).unwrap();
    assert!(!manager.recheck().await.unwrap());
    assert_eq!(manager.handovers(), 1);

    let state = store.settled().await;
    assert_eq!(state.tools.len(), 1);
    assert_eq!(state.session_info.transcript_path.as_path(), transcript.as_path());

    // a different transcript afterwards is a new target
    fs::write(
        &refresh_file,
        started.with_transcript(dir.path().join("s1-b.jsonl")).to_json(),
    )
    .unwrap();
    assert!(manager.recheck().await.unwrap());
    assert_eq!(manager.handovers(), 2);
    assert!(store.settled().await.tools.is_empty());
}

#[cfg(target_os = "linux")]
#[tokio::test]
async fn test_directory_watch_triggers_handover() {
    let config = ManagerConfig {
        watch_refresh_file: true,
        ..test_config()
    };
    let hud = TestHud::start("s1", "one.jsonl", config).await;
    // the first poll has run once the missing pipe is reported
    hud.wait_for("pipe error", |s| s.connection_status == ConnectionStatus::Error)
        .await;

    write_events(
        &hud.path("two.jsonl"),
        &[event_line("Stop", "s2", json!({"cwd": "/work"}))],
    );

    let next = SessionTarget::new(SessionId::new("s2"), hud.path("two.jsonl"));
    hud.write_refresh(&next);

    let state = hud
        .wait_for("watch handover", |s| s.session_info.cwd == "/work")
        .await;
    assert_eq!(state.session_info.session_id.as_str(), "s2");
    hud.shutdown().await;
}
