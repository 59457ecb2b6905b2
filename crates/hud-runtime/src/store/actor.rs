//! Store actor - sole owner of the live `HudState`.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - Response send failures are ignored (the caller went away)

use std::sync::Arc;

use hud_core::{reduce, HudState};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use super::commands::StoreCommand;

/// The store actor.
///
/// Receives commands over an mpsc channel, applies them one at a time and
/// publishes every new state on a watch channel. Readers only ever see the
/// latest state; intermediate states may be skipped.
pub struct StoreActor {
    receiver: mpsc::Receiver<StoreCommand>,
    state: Arc<HudState>,
    publisher: watch::Sender<Arc<HudState>>,
    applied: u64,
}

impl StoreActor {
    pub fn new(
        receiver: mpsc::Receiver<StoreCommand>,
        state: Arc<HudState>,
        publisher: watch::Sender<Arc<HudState>>,
    ) -> Self {
        Self {
            receiver,
            state,
            publisher,
            applied: 0,
        }
    }

    /// Runs until every sender is dropped.
    pub async fn run(mut self) {
        info!(session_id = %self.state.session_info.session_id, "Store actor starting");

        while let Some(cmd) = self.receiver.recv().await {
            self.handle_command(cmd);
        }

        info!(actions = self.applied, "Store actor stopped");
    }

    fn handle_command(&mut self, cmd: StoreCommand) {
        match cmd {
            StoreCommand::Dispatch(action) => {
                let next = reduce(&self.state, action);
                self.applied = self.applied.saturating_add(1);
                self.publish(next);
            }
            StoreCommand::Replace { state, respond_to } => {
                debug!(
                    session_id = %state.session_info.session_id,
                    "Replacing store state"
                );
                self.publish(*state);
                let _ = respond_to.send(());
            }
            StoreCommand::Snapshot { respond_to } => {
                let _ = respond_to.send(Arc::clone(&self.state));
            }
        }
    }

    fn publish(&mut self, next: HudState) {
        self.state = Arc::new(next);
        // send_replace succeeds even with no receivers left
        self.publisher.send_replace(Arc::clone(&self.state));
    }
}
