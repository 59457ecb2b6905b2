//! Session state store using the actor pattern.
//!
//! ```text
//! ┌──────────────────┐  StoreCommand  ┌─────────────┐  watch  ┌──────────┐
//! │ Session manager  │───────────────▶│ StoreActor  │────────▶│   View   │
//! │ Clock / refresher│    (mpsc)      │ reduce(...) │ (latest)│ snapshot │
//! └──────────────────┘                └─────────────┘         └──────────┘
//! ```
//!
//! The actor is the single writer. Every action passes through
//! [`hud_core::reduce`] in arrival order; the view pulls whatever state is
//! current when it draws.

use std::sync::Arc;

use hud_core::{now_millis, HudAction, HudState};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

mod actor;
mod commands;
mod handle;

pub use actor::StoreActor;
pub use commands::{StoreCommand, StoreError};
pub use handle::StoreHandle;

/// Channel buffer size
const COMMAND_BUFFER: usize = 256;

/// Spawns the store actor seeded with `initial` and returns its handle.
pub fn spawn_store(initial: HudState) -> StoreHandle {
    let initial = Arc::new(initial);
    let (cmd_tx, cmd_rx) = mpsc::channel(COMMAND_BUFFER);
    let (state_tx, state_rx) = watch::channel(Arc::clone(&initial));

    let actor = StoreActor::new(cmd_rx, initial, state_tx);
    tokio::spawn(actor.run());

    StoreHandle::new(cmd_tx, state_rx)
}

/// Spawns a task that advances the logical clock every `period`.
pub fn spawn_clock_task(
    store: StoreHandle,
    period: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if store.dispatch(HudAction::Tick { now: now_millis() }).await.is_err() {
                        debug!("Clock task stopping: store channel closed");
                        break;
                    }
                }
                _ = cancel.cancelled() => {
                    debug!("Clock task cancelled");
                    break;
                }
            }
        }
    })
}
