//! Connection / session manager.
//!
//! Keeps the store pinned to the one live event pipe. The host names the
//! current `(session, pipe, transcript)` triple in a handover file; the
//! manager re-reads it whenever any trigger fires and hands over to a new
//! pipe only when the triple changed.
//!
//! ```text
//!  SIGUSR1 ─┐
//!  watch   ─┼─▶ recheck channel ─▶ ┌────────────────┐ ─▶ StoreHandle
//!  poll    ─┘                      │ SessionManager │
//!  PipeReader ─▶ line channel ───▶ │  (Ingestor)    │
//!                                  └────────────────┘
//! ```
//!
//! Everything converges on one loop, so a recheck, a line and a banner
//! tick never run concurrently. Rechecks are idempotent.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Pipe and handover failures become state, not errors

use std::io;
use std::path::PathBuf;
use std::time::Duration;

use hud_core::error::PIPE_UNAVAILABLE;
use hud_core::{now_millis, ConnectionStatus, ErrorRecord, HudAction, HudState};
use hud_protocol::SessionTarget;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::degrade::DegradeConfig;
use crate::error::{HudError, Result};
use crate::store::StoreHandle;

mod ingest;
mod pipe;
mod trigger;

pub use ingest::Ingestor;
pub use pipe::{PipeEnvelope, PipeMessage, PipeReader, RetryPolicy, MAX_LINE_BYTES};
pub use trigger::{watch_refresh_file, RecheckSource, RecheckTrigger};

#[cfg(unix)]
pub use trigger::spawn_signal_trigger;

/// Lines buffered between the pipe reader and the manager.
const LINE_BUFFER: usize = 256;

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq)]
pub struct ManagerConfig {
    /// Fallback cadence for re-reading the handover file.
    pub poll_interval: Duration,
    /// How often the schema banner clock advances.
    pub banner_tick: Duration,
    pub retry_initial_delay: Duration,
    pub retry_max_delay: Duration,
    /// Multiplier for exponential backoff (2.0 doubles the delay).
    pub retry_multiplier: f64,
    pub degrade: DegradeConfig,
    /// Listen for SIGUSR1 as a recheck trigger.
    pub listen_for_signal: bool,
    /// Watch the handover file's directory as a recheck trigger.
    pub watch_refresh_file: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_secs(5),
            banner_tick: Duration::from_millis(250),
            retry_initial_delay: Duration::from_millis(250),
            retry_max_delay: Duration::from_secs(5),
            retry_multiplier: 2.0,
            degrade: DegradeConfig::default(),
            listen_for_signal: true,
            watch_refresh_file: true,
        }
    }
}

impl ManagerConfig {
    fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            initial_delay: self.retry_initial_delay,
            max_delay: self.retry_max_delay,
            multiplier: self.retry_multiplier,
        }
    }
}

// ============================================================================
// Manager
// ============================================================================

struct PipeTask {
    cancel: CancellationToken,
    join: JoinHandle<()>,
}

pub struct SessionManager {
    refresh_file: PathBuf,
    store: StoreHandle,
    config: ManagerConfig,
    ingestor: Ingestor,
    active: Option<SessionTarget>,
    generation: u64,
    handovers: u64,
    pipe: Option<PipeTask>,
    pipe_tx: mpsc::Sender<PipeEnvelope>,
    pipe_rx: mpsc::Receiver<PipeEnvelope>,
    recheck_tx: mpsc::Sender<RecheckSource>,
    recheck_rx: mpsc::Receiver<RecheckSource>,
}

impl SessionManager {
    pub fn new(refresh_file: impl Into<PathBuf>, store: StoreHandle, config: ManagerConfig) -> Self {
        let (pipe_tx, pipe_rx) = mpsc::channel(LINE_BUFFER);
        let (recheck_tx, recheck_rx) = mpsc::channel(trigger::RECHECK_BUFFER);

        Self {
            refresh_file: refresh_file.into(),
            store,
            ingestor: Ingestor::new(&config.degrade),
            config,
            active: None,
            generation: 0,
            handovers: 0,
            pipe: None,
            pipe_tx,
            pipe_rx,
            recheck_tx,
            recheck_rx,
        }
    }

    /// A handle other tasks can use to request a recheck.
    pub fn trigger(&self) -> RecheckTrigger {
        RecheckTrigger::new(self.recheck_tx.clone())
    }

    pub fn active(&self) -> Option<&SessionTarget> {
        self.active.as_ref()
    }

    /// Number of handovers performed, including the initial one.
    pub fn handovers(&self) -> u64 {
        self.handovers
    }

    /// Starts following `target`, unless it is already followed.
    ///
    /// Returns true when a handover happened. A target that only adds the
    /// transcript to the active one updates it in place and keeps the state.
    pub async fn follow(&mut self, target: SessionTarget) -> Result<bool> {
        let Some(active) = self.active.as_ref() else {
            self.handover(target).await?;
            return Ok(true);
        };

        if active.same_target(&target) {
            trace!(session_id = %target.session_id, "Target unchanged");
            return Ok(false);
        }

        if target.adds_transcript_to(active) {
            if let Some(path) = target.transcript_path.clone() {
                debug!(session_id = %target.session_id, transcript = %path, "Transcript learned");
                self.dispatch(HudAction::Transcript(path)).await?;
            }
            self.active = Some(target);
            return Ok(false);
        }

        self.handover(target).await?;
        Ok(true)
    }

    /// Re-reads the handover file and hands over if it names a new target.
    ///
    /// A missing or unreadable file means no pending handover.
    pub async fn recheck(&mut self) -> Result<bool> {
        let text = match tokio::fs::read_to_string(&self.refresh_file).await {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(false),
            Err(e) => {
                debug!(path = %self.refresh_file.display(), error = %e, "Handover file unreadable");
                return Ok(false);
            }
        };

        match SessionTarget::from_json(&text) {
            Ok(target) => self.follow(target).await,
            Err(e) => {
                // the host may be mid-write; the next trigger will retry
                debug!(path = %self.refresh_file.display(), error = %e, "Ignoring handover file");
                Ok(false)
            }
        }
    }

    /// Runs until cancelled.
    ///
    /// # Errors
    ///
    /// - `HudError::StoreClosed` if the store shuts down underneath
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        let triggers = cancel.child_token();
        let _watcher = self.start_watcher();
        self.start_signal_trigger(&triggers);

        let mut poll = interval(self.config.poll_interval);
        poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
        let mut banner = interval(self.config.banner_tick);
        banner.set_missed_tick_behavior(MissedTickBehavior::Delay);

        info!(refresh_file = %self.refresh_file.display(), "Session manager running");

        let result = loop {
            let step = tokio::select! {
                _ = cancel.cancelled() => break Ok(()),
                Some(source) = self.recheck_rx.recv() => {
                    debug!(?source, "Recheck requested");
                    self.recheck().await.map(|_| ())
                }
                _ = poll.tick() => self.recheck().await.map(|_| ()),
                Some(envelope) = self.pipe_rx.recv() => self.on_pipe(envelope).await,
                _ = banner.tick() => self.on_banner_tick().await,
            };
            if let Err(e) = step {
                break Err(e);
            }
        };

        triggers.cancel();
        self.stop_pipe().await;
        info!(
            handovers = self.handovers,
            lines = self.ingestor.lines(),
            parse_failures = self.ingestor.failures(),
            "Session manager stopped"
        );
        result
    }

    // ------------------------------------------------------------------------
    // Handover
    // ------------------------------------------------------------------------

    async fn handover(&mut self, target: SessionTarget) -> Result<()> {
        info!(
            from = ?self.active.as_ref().map(|t| t.session_id.short().to_string()),
            to = %target.session_id,
            pipe = %target.pipe_path().display(),
            "Session handover"
        );

        self.stop_pipe().await;
        self.generation = self.generation.wrapping_add(1);
        self.ingestor.reset();

        let mut state =
            HudState::for_session(target.session_id.clone(), target.transcript_path.clone());
        state.now = now_millis();
        self.store
            .replace(state)
            .await
            .map_err(|_| HudError::StoreClosed)?;

        let cancel = CancellationToken::new();
        let reader = PipeReader::new(
            target.pipe_path().to_path_buf(),
            self.generation,
            self.pipe_tx.clone(),
            self.config.retry_policy(),
            cancel.clone(),
        );
        self.pipe = Some(PipeTask {
            cancel,
            join: tokio::spawn(reader.run()),
        });

        self.active = Some(target);
        self.handovers = self.handovers.saturating_add(1);
        Ok(())
    }

    async fn stop_pipe(&mut self) {
        let Some(task) = self.pipe.take() else {
            return;
        };
        task.cancel.cancel();
        if let Err(e) = task.join.await {
            warn!(error = %e, "Pipe reader task ended abnormally");
        }
    }

    // ------------------------------------------------------------------------
    // Ingest
    // ------------------------------------------------------------------------

    async fn on_pipe(&mut self, envelope: PipeEnvelope) -> Result<()> {
        if envelope.generation != self.generation {
            trace!(generation = envelope.generation, "Dropping message from a previous pipe");
            return Ok(());
        }

        let now = now_millis();
        match envelope.message {
            PipeMessage::Status(status) => self.dispatch(HudAction::Connection(status)).await,
            PipeMessage::Unavailable(reason) => {
                let path = self
                    .active
                    .as_ref()
                    .map(|t| t.pipe_path().display().to_string())
                    .unwrap_or_default();
                let record = ErrorRecord::new(
                    PIPE_UNAVAILABLE,
                    format!("Event pipe unavailable: {reason}"),
                    now,
                )
                .with_context("path", path);
                self.dispatch(HudAction::Connection(ConnectionStatus::Error))
                    .await?;
                self.dispatch(HudAction::Error(record)).await
            }
            PipeMessage::Line(line) => {
                for action in self.ingestor.ingest(&line, now) {
                    self.dispatch(action).await?;
                }
                Ok(())
            }
        }
    }

    async fn on_banner_tick(&mut self) -> Result<()> {
        for action in self.ingestor.tick(now_millis()) {
            self.dispatch(action).await?;
        }
        Ok(())
    }

    async fn dispatch(&self, action: HudAction) -> Result<()> {
        self.store
            .dispatch(action)
            .await
            .map_err(|_| HudError::StoreClosed)
    }

    // ------------------------------------------------------------------------
    // Triggers
    // ------------------------------------------------------------------------

    fn start_watcher(&self) -> Option<notify::RecommendedWatcher> {
        if !self.config.watch_refresh_file {
            return None;
        }
        let dir = self.refresh_file.parent()?;
        let name = self.refresh_file.file_name()?;

        match watch_refresh_file(dir, name, self.trigger()) {
            Ok(watcher) => Some(watcher),
            Err(e) => {
                warn!(error = %e, "Handover watch unavailable, relying on polling");
                None
            }
        }
    }

    #[cfg(unix)]
    fn start_signal_trigger(&self, cancel: &CancellationToken) {
        if !self.config.listen_for_signal {
            return;
        }
        if let Err(e) = spawn_signal_trigger(self.trigger(), cancel.clone()) {
            warn!(error = %e, "SIGUSR1 recheck unavailable");
        }
    }

    #[cfg(not(unix))]
    fn start_signal_trigger(&self, _cancel: &CancellationToken) {}
}
