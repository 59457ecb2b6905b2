//! Recheck triggers.
//!
//! Three independent sources ask the session manager to re-read the
//! handover file: a process signal (SIGUSR1), a directory watch and a poll
//! timer. They all funnel into one bounded channel; a full channel means a
//! recheck is already pending, so extra requests are dropped.

use std::ffi::OsString;
use std::path::Path;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::{HudError, Result};

/// Pending recheck requests. One is enough; extras coalesce.
pub(crate) const RECHECK_BUFFER: usize = 16;

/// Why a recheck was requested.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecheckSource {
    Signal,
    Watch,
    Manual,
}

/// Cheap-clone handle that requests a handover recheck.
#[derive(Debug, Clone)]
pub struct RecheckTrigger {
    sender: mpsc::Sender<RecheckSource>,
}

impl RecheckTrigger {
    pub(crate) fn new(sender: mpsc::Sender<RecheckSource>) -> Self {
        Self { sender }
    }

    /// Requests a recheck without waiting. Returns `false` if the manager
    /// is gone.
    pub fn request(&self, source: RecheckSource) -> bool {
        match self.sender.try_send(source) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                debug!(?source, "Recheck already pending");
                true
            }
            Err(mpsc::error::TrySendError::Closed(_)) => false,
        }
    }
}

/// Forwards SIGUSR1 to `trigger` until cancelled.
#[cfg(unix)]
pub fn spawn_signal_trigger(
    trigger: RecheckTrigger,
    cancel: CancellationToken,
) -> Result<JoinHandle<()>> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut usr1 =
        signal(SignalKind::user_defined1()).map_err(|e| HudError::Signal(e.to_string()))?;

    Ok(tokio::spawn(async move {
        loop {
            tokio::select! {
                received = usr1.recv() => {
                    if received.is_none() {
                        break;
                    }
                    info!("Received SIGUSR1, rechecking session");
                    if !trigger.request(RecheckSource::Signal) {
                        break;
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
        debug!("Signal trigger stopped");
    }))
}

/// Watches `dir` and requests a recheck whenever `file_name` changes.
///
/// The returned watcher stops watching when dropped.
pub fn watch_refresh_file(
    dir: &Path,
    file_name: impl Into<OsString>,
    trigger: RecheckTrigger,
) -> Result<RecommendedWatcher> {
    let file_name = file_name.into();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) => {
                let relevant = event
                    .paths
                    .iter()
                    .any(|p| p.file_name() == Some(file_name.as_os_str()));
                if relevant {
                    trigger.request(RecheckSource::Watch);
                }
            }
            Err(e) => warn!(error = %e, "Handover watch error"),
        }
    })
    .map_err(|e| HudError::Watch {
        path: dir.to_path_buf(),
        reason: e.to_string(),
    })?;

    watcher
        .watch(dir, RecursiveMode::NonRecursive)
        .map_err(|e| HudError::Watch {
            path: dir.to_path_buf(),
            reason: e.to_string(),
        })?;

    debug!(dir = %dir.display(), "Watching for handover file changes");
    Ok(watcher)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_coalesces_when_full() {
        let (tx, mut rx) = mpsc::channel(1);
        let trigger = RecheckTrigger::new(tx);

        assert!(trigger.request(RecheckSource::Manual));
        assert!(trigger.request(RecheckSource::Signal));
        assert_eq!(rx.try_recv().ok(), Some(RecheckSource::Manual));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_request_reports_closed() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        assert!(!RecheckTrigger::new(tx).request(RecheckSource::Manual));
    }

    #[tokio::test]
    async fn test_watch_missing_dir_fails() {
        let (tx, _rx) = mpsc::channel(1);
        let dir = tempfile::tempdir().unwrap();
        let missing = dir.path().join("nope");
        let result = watch_refresh_file(&missing, "refresh-t.json", RecheckTrigger::new(tx));
        assert!(matches!(result, Err(HudError::Watch { .. })));
    }
}
