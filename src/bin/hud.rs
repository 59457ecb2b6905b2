//! Claude HUD - live status companion for a Claude Code session
//!
//! Follows the session's event pipe, keeps the aggregate state current and,
//! in headless mode, prints every new state as one JSON line.
//!
//! # Usage
//!
//! ```bash
//! # Follow a session (normally launched by the host's hook script)
//! hud --session abc123 --fifo /tmp/claude-hud/abc123.fifo --terminal-id 7
//!
//! # Headless: print each new state as a JSON line
//! hud --fifo /tmp/claude-hud/abc123.fifo --emit-json
//!
//! # Enable debug logging (written to ~/.claude/hud/logs/hud.log)
//! CLAUDE_HUD_DEBUG=1 hud --fifo ...
//! ```
//!
//! # Signal Handling
//!
//! - SIGTERM/SIGINT: Graceful shutdown
//! - SIGUSR1: Re-read the session handover file

use std::path::{Path, PathBuf};
use std::process;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use serde_json::json;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use hud_core::{HudState, SessionId};
use hud_protocol::SessionTarget;
use hud_runtime::probe::spawn_context_probe;
use hud_runtime::{
    debug_enabled, logging, spawn_clock_task, spawn_store, spawn_telemetry_task, Bounded,
    HudError, HudPaths, LocalProbe, ManagerConfig, SessionManager, SessionProbe,
    SnapshotRefresher, StoreHandle, DEFAULT_TELEMETRY_INTERVAL,
};

/// Logical clock cadence.
const CLOCK_TICK: Duration = Duration::from_secs(1);

/// How often config files under the session cwd are recounted.
const CONTEXT_PROBE_INTERVAL: Duration = Duration::from_secs(30);

/// Claude HUD - live session status
#[derive(Parser, Debug)]
#[command(name = "hud", version, about)]
struct Args {
    /// Session id to follow until a handover names another
    #[arg(long, default_value = "unknown")]
    session: String,

    /// Named pipe carrying the session's events (required)
    #[arg(long)]
    fifo: Option<PathBuf>,

    /// Transcript of the session, when the host already knows it
    #[arg(long)]
    transcript_path: Option<PathBuf>,

    /// Terminal id; selects the refresh-<id>.json handover file
    #[arg(long, default_value = "unknown")]
    terminal_id: String,

    /// HUD directory (defaults to $CLAUDE_HUD_DIR or ~/.claude/hud)
    #[arg(long)]
    hud_dir: Option<PathBuf>,

    /// HUD config document (defaults to <hud-dir>/config.json)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Host settings document (defaults to ~/.claude/settings.json)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Print every new state as a JSON line on stdout
    #[arg(long)]
    emit_json: bool,

    /// Command whose JSON `{"label": ...}` output is shown alongside the state
    #[arg(long)]
    extra_cmd: Option<String>,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // the state machine never starts without a pipe
    let Some(fifo) = args.fifo.clone() else {
        eprintln!("Error: {}", HudError::MissingPipePath);
        eprintln!("Usage: hud --session <id> --fifo <path> --terminal-id <id>");
        process::exit(1);
    };

    run_hud(args, fifo)
}

fn resolve_paths(args: &Args) -> Result<HudPaths> {
    let mut paths = match (HudPaths::resolve(), &args.hud_dir) {
        (Ok(paths), _) => paths,
        (Err(_), Some(dir)) => HudPaths::in_dir(dir),
        (Err(e), None) => return Err(e).context("Failed to resolve the HUD directory"),
    };
    if let Some(dir) = &args.hud_dir {
        paths.hud_dir = dir.clone();
    }
    if let Some(settings) = &args.settings {
        paths.settings_file = settings.clone();
    }
    Ok(paths)
}

/// Runs the HUD (async entry point).
#[tokio::main(flavor = "current_thread")]
async fn run_hud(args: Args, fifo: PathBuf) -> Result<()> {
    let paths = resolve_paths(&args)?;

    let logging = match logging::init(&paths.log_dir(), debug_enabled()) {
        Ok(guard) => Some(guard),
        Err(e) => {
            eprintln!("Warning: {e}; continuing without a log file");
            None
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        pid = process::id(),
        session = %args.session,
        terminal_id = %args.terminal_id,
        fifo = %fifo.display(),
        "Claude HUD starting"
    );

    let cancel_token = CancellationToken::new();

    let shutdown_token = cancel_token.clone();
    tokio::spawn(async move {
        if let Err(e) = wait_for_shutdown_signal().await {
            error!(error = %e, "Error waiting for shutdown signal");
        }
        info!("Shutdown signal received");
        shutdown_token.cancel();
    });

    let mut target = SessionTarget::new(SessionId::new(args.session.clone()), &fifo)
        .with_terminal(args.terminal_id.clone());
    if let Some(transcript) = &args.transcript_path {
        target = target.with_transcript(transcript);
    }

    let store = spawn_store(HudState::for_session(target.session_id.clone(), None));
    let clock = spawn_clock_task(store.clone(), CLOCK_TICK, cancel_token.clone());

    let config_path = args.config.clone().unwrap_or_else(|| paths.config_file());
    let refresher = SnapshotRefresher::new(config_path, &paths.settings_file, store.clone());
    let refresher_task = tokio::spawn(refresher.run(cancel_token.clone()));

    let context_probe = spawn_context_probe(
        store.clone(),
        Bounded::new(LocalProbe),
        CONTEXT_PROBE_INTERVAL,
        cancel_token.clone(),
    );

    let telemetry = spawn_telemetry_task(
        store.clone(),
        Bounded::new(LocalProbe),
        DEFAULT_TELEMETRY_INTERVAL,
        cancel_token.clone(),
    );

    let view = args.emit_json.then(|| {
        tokio::spawn(emit_json(
            store.clone(),
            args.extra_cmd.clone(),
            cancel_token.clone(),
        ))
    });

    let mut manager = SessionManager::new(
        paths.refresh_file(&args.terminal_id),
        store,
        ManagerConfig::default(),
    );
    manager
        .follow(target)
        .await
        .context("Failed to start following the event pipe")?;

    let result = manager.run(cancel_token.clone()).await;
    if let Err(e) = &result {
        error!(error = %e, "Session manager failed");
    }

    cancel_token.cancel();
    let _ = clock.await;
    let _ = context_probe.await;
    let _ = telemetry.await;
    match refresher_task.await {
        Ok(Err(e)) => error!(error = %e, "Snapshot refresher failed"),
        Err(e) => error!(error = %e, "Snapshot refresher panicked"),
        Ok(Ok(())) => {}
    }
    if let Some(view) = view {
        let _ = view.await;
    }

    info!("Claude HUD stopped");
    if let Some(guard) = logging {
        guard.close();
    }

    result.context("HUD stopped unexpectedly")
}

/// Headless view: one JSON line per published state.
///
/// Slow stdout only delays this task; it always prints the latest state.
async fn emit_json(store: StoreHandle, extra_cmd: Option<String>, cancel: CancellationToken) {
    let probe = Bounded::new(LocalProbe);
    let extra_label = match &extra_cmd {
        Some(cmd) => probe.run_extra_label(cmd).await,
        None => None,
    };

    let mut rx = store.subscribe();
    let mut seen_cwd: Option<String> = None;
    let mut git_branch = None;
    let mut seen_transcript: Option<PathBuf> = None;
    let mut transcript = None;

    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = cancel.cancelled() => break,
        }

        let state = rx.borrow_and_update().clone();

        let cwd = &state.session_info.cwd;
        if seen_cwd.as_ref() != Some(cwd) {
            git_branch = probe.git_branch(Path::new(cwd)).await;
            seen_cwd = Some(cwd.clone());
        }

        let transcript_path = state.session_info.transcript_path.as_path();
        if seen_transcript.as_deref() != Some(transcript_path) {
            transcript = if transcript_path.as_os_str().is_empty() {
                None
            } else {
                Some(probe.read_transcript(transcript_path).await)
            };
            seen_transcript = Some(transcript_path.to_path_buf());
        }

        let frame = json!({
            "state": &*state,
            "gitBranch": git_branch,
            "contextLabel": state.context.format(),
            "costLabel": state.cost.total_cost.format(),
            "extraLabel": extra_label,
            "transcript": transcript,
        });
        println!("{frame}");
    }
}

/// Waits for a shutdown signal (SIGTERM or SIGINT).
async fn wait_for_shutdown_signal() -> Result<()> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut sigterm = signal(SignalKind::terminate())?;
        let mut sigint = signal(SignalKind::interrupt())?;

        tokio::select! {
            _ = sigterm.recv() => {
                info!("Received SIGTERM");
            }
            _ = sigint.recv() => {
                info!("Received SIGINT");
            }
        }
    }

    #[cfg(not(unix))]
    {
        tokio::signal::ctrl_c().await?;
        info!("Received Ctrl+C");
    }

    Ok(())
}
