//! Collaborator lookups: git branch, config counts, transcript metadata and
//! the user's extra label command.
//!
//! These feed the view but sit outside the state machine. Every call is
//! bounded by a timeout and falls back to an empty default, so a slow `git`
//! or a hung label command can never stall the HUD.

use std::collections::HashMap;
use std::io;
use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hud_core::{ContextBreakdown, ContextFiles, HudAction};
use serde::Serialize;
use serde_json::Value;
use tokio::process::Command;
use tokio::time::{interval, timeout, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::store::StoreHandle;

/// Default bound for a single lookup.
pub const DEFAULT_PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Summary of a session transcript file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptInfo {
    /// Non-blank JSONL entries
    pub entries: usize,
    pub session_start: Option<DateTime<Utc>>,
    /// Token usage reported by assistant entries, if any
    pub usage: Option<TranscriptUsage>,
}

/// Token usage accumulated from a transcript's assistant entries.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TranscriptUsage {
    /// Tokens in the window as of the latest assistant entry
    pub context_tokens: u64,
    pub breakdown: ContextBreakdown,
    /// Billable input across the session (fresh input plus cache writes)
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// Model of the latest assistant entry
    pub model: Option<String>,
}

/// External lookups the HUD consumes.
///
/// Implementations must not fail; they report "nothing found" instead.
#[async_trait]
pub trait SessionProbe: Send + Sync {
    async fn git_branch(&self, cwd: &Path) -> Option<String>;

    async fn count_configs(&self, cwd: &Path) -> ContextFiles;

    async fn read_transcript(&self, path: &Path) -> TranscriptInfo;

    /// Runs `command` and returns the `label` from its JSON output.
    async fn run_extra_label(&self, command: &str) -> Option<String>;
}

// ============================================================================
// Bounded wrapper
// ============================================================================

/// Applies a timeout to every lookup of the wrapped probe.
pub struct Bounded<P> {
    inner: P,
    limit: Duration,
}

impl<P: SessionProbe> Bounded<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            limit: DEFAULT_PROBE_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.limit = limit;
        self
    }
}

#[async_trait]
impl<P: SessionProbe> SessionProbe for Bounded<P> {
    async fn git_branch(&self, cwd: &Path) -> Option<String> {
        bounded(self.limit, "git_branch", self.inner.git_branch(cwd)).await
    }

    async fn count_configs(&self, cwd: &Path) -> ContextFiles {
        bounded(self.limit, "count_configs", self.inner.count_configs(cwd)).await
    }

    async fn read_transcript(&self, path: &Path) -> TranscriptInfo {
        bounded(self.limit, "read_transcript", self.inner.read_transcript(path)).await
    }

    async fn run_extra_label(&self, command: &str) -> Option<String> {
        bounded(self.limit, "run_extra_label", self.inner.run_extra_label(command)).await
    }
}

async fn bounded<T, F>(limit: Duration, lookup: &'static str, fut: F) -> T
where
    T: Default,
    F: std::future::Future<Output = T>,
{
    match timeout(limit, fut).await {
        Ok(value) => value,
        Err(_) => {
            debug!(lookup, timeout_ms = limit.as_millis() as u64, "Lookup timed out");
            T::default()
        }
    }
}

// ============================================================================
// Local implementation
// ============================================================================

/// Probe backed by the local filesystem and processes.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalProbe;

#[async_trait]
impl SessionProbe for LocalProbe {
    async fn git_branch(&self, cwd: &Path) -> Option<String> {
        if cwd.as_os_str().is_empty() {
            return None;
        }
        let output = Command::new("git")
            .args(["rev-parse", "--abbrev-ref", "HEAD"])
            .current_dir(cwd)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .ok()?;
        if !output.status.success() {
            return None;
        }
        let branch = String::from_utf8_lossy(&output.stdout).trim().to_string();
        (!branch.is_empty()).then_some(branch)
    }

    async fn count_configs(&self, cwd: &Path) -> ContextFiles {
        if cwd.as_os_str().is_empty() {
            return ContextFiles::default();
        }
        let dot_claude = cwd.join(".claude");

        let mut claude_md_count = 0u32;
        for candidate in [
            cwd.join("CLAUDE.md"),
            cwd.join("CLAUDE.local.md"),
            dot_claude.join("CLAUDE.md"),
        ] {
            if tokio::fs::try_exists(&candidate).await.unwrap_or(false) {
                claude_md_count = claude_md_count.saturating_add(1);
            }
        }

        ContextFiles {
            claude_md_count,
            rules_count: count_markdown(&dot_claude.join("rules")).await.unwrap_or(0),
            mcp_count: count_object_keys(&cwd.join(".mcp.json"), "mcpServers").await,
            hooks_count: count_object_keys(&dot_claude.join("settings.json"), "hooks").await,
        }
    }

    async fn read_transcript(&self, path: &Path) -> TranscriptInfo {
        match tokio::fs::read_to_string(path).await {
            Ok(text) => summarize_transcript(&text),
            Err(e) => {
                debug!(path = %path.display(), error = %e, "Transcript unreadable");
                TranscriptInfo::default()
            }
        }
    }

    async fn run_extra_label(&self, command: &str) -> Option<String> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await
            .ok()?;
        let value: Value = serde_json::from_slice(&output.stdout).ok()?;
        value.get("label")?.as_str().map(str::to_string)
    }
}

async fn count_markdown(dir: &Path) -> io::Result<u32> {
    let mut entries = tokio::fs::read_dir(dir).await?;
    let mut count = 0u32;
    while let Some(entry) = entries.next_entry().await? {
        let is_md = entry.path().extension().is_some_and(|ext| ext == "md");
        if is_md && entry.file_type().await?.is_file() {
            count = count.saturating_add(1);
        }
    }
    Ok(count)
}

async fn count_object_keys(path: &Path, key: &str) -> u32 {
    let Ok(text) = tokio::fs::read_to_string(path).await else {
        return 0;
    };
    serde_json::from_str::<Value>(&text)
        .ok()
        .and_then(|v| v.get(key).and_then(Value::as_object).map(|m| m.len()))
        .and_then(|n| u32::try_from(n).ok())
        .unwrap_or(0)
}

fn summarize_transcript(text: &str) -> TranscriptInfo {
    let mut info = TranscriptInfo::default();
    // streamed content blocks repeat the usage of their message
    let mut by_message: HashMap<String, UsageLine> = HashMap::new();
    let mut anonymous: Vec<UsageLine> = Vec::new();
    let mut latest: Option<UsageLine> = None;

    for line in text.lines().filter(|l| !l.trim().is_empty()) {
        info.entries = info.entries.saturating_add(1);
        let Ok(entry) = serde_json::from_str::<Value>(line) else {
            continue;
        };

        if info.session_start.is_none() {
            info.session_start = entry
                .get("timestamp")
                .and_then(Value::as_str)
                .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
                .map(|ts| ts.with_timezone(&Utc));
        }

        let Some(usage) = UsageLine::from_entry(&entry) else {
            continue;
        };
        match entry.pointer("/message/id").and_then(Value::as_str) {
            Some(id) => {
                by_message.insert(id.to_string(), usage.clone());
            }
            None => anonymous.push(usage.clone()),
        }
        latest = Some(usage);
    }

    info.usage = latest.map(|last| {
        let mut totals = TranscriptUsage {
            context_tokens: last.context_tokens(),
            breakdown: ContextBreakdown {
                messages: last.input,
                other: last.cache_creation.saturating_add(last.cache_read),
                ..ContextBreakdown::default()
            },
            model: last.model,
            ..TranscriptUsage::default()
        };
        for usage in by_message.values().chain(anonymous.iter()) {
            totals.input_tokens = totals
                .input_tokens
                .saturating_add(usage.input)
                .saturating_add(usage.cache_creation);
            totals.output_tokens = totals.output_tokens.saturating_add(usage.output);
        }
        totals
    });
    info
}

#[derive(Debug, Clone)]
struct UsageLine {
    input: u64,
    cache_creation: u64,
    cache_read: u64,
    output: u64,
    model: Option<String>,
}

impl UsageLine {
    fn from_entry(entry: &Value) -> Option<Self> {
        let message = entry.get("message")?;
        let usage = message.get("usage")?.as_object()?;
        let count = |key: &str| usage.get(key).and_then(Value::as_u64).unwrap_or(0);
        Some(Self {
            input: count("input_tokens"),
            cache_creation: count("cache_creation_input_tokens"),
            cache_read: count("cache_read_input_tokens"),
            output: count("output_tokens"),
            model: message.get("model").and_then(Value::as_str).map(str::to_string),
        })
    }

    fn context_tokens(&self) -> u64 {
        self.input
            .saturating_add(self.cache_creation)
            .saturating_add(self.cache_read)
    }
}

// ============================================================================
// Context-file task
// ============================================================================

/// Periodically counts config files for the session's cwd and publishes
/// the counts when they change.
pub fn spawn_context_probe<P>(
    store: StoreHandle,
    probe: P,
    every: Duration,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<()>
where
    P: SessionProbe + 'static,
{
    tokio::spawn(async move {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    let state = store.snapshot();
                    let cwd = state.session_info.cwd.clone();
                    if cwd.is_empty() {
                        continue;
                    }
                    let counts = probe.count_configs(Path::new(&cwd)).await;
                    if state.context_files == Some(counts) {
                        continue;
                    }
                    if store.dispatch(HudAction::ContextFiles(Some(counts))).await.is_err() {
                        break;
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
        info!("Context probe stopped");
    })
}
