//! Store actor commands and errors.

use std::sync::Arc;

use hud_core::{HudAction, HudState};
use thiserror::Error;
use tokio::sync::oneshot;

/// Commands sent to the store actor.
///
/// Commands are applied strictly in the order they are received.
#[derive(Debug)]
pub enum StoreCommand {
    /// Run one action through the reducer.
    Dispatch(HudAction),

    /// Replace the whole state (session handover).
    ///
    /// The state is boxed to reduce enum size variance.
    Replace {
        state: Box<HudState>,
        respond_to: oneshot::Sender<()>,
    },

    /// Fetch the state as of this point in the command stream.
    Snapshot {
        respond_to: oneshot::Sender<Arc<HudState>>,
    },
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The actor has stopped.
    #[error("Store channel closed")]
    ChannelClosed,
}
