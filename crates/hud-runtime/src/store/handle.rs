//! Client interface for the store actor.
//!
//! `StoreHandle` is cheap to clone. Writers dispatch actions through it;
//! the view pulls the latest snapshot whenever it redraws.
//!
//! # Panic-Free Guarantees
//!
//! - Channel errors are mapped to `StoreError::ChannelClosed`

use std::sync::Arc;

use hud_core::{HudAction, HudState};
use tokio::sync::{mpsc, oneshot, watch};

use super::commands::{StoreCommand, StoreError};

#[derive(Clone)]
pub struct StoreHandle {
    sender: mpsc::Sender<StoreCommand>,
    state_rx: watch::Receiver<Arc<HudState>>,
}

impl StoreHandle {
    pub fn new(sender: mpsc::Sender<StoreCommand>, state_rx: watch::Receiver<Arc<HudState>>) -> Self {
        Self { sender, state_rx }
    }

    /// Queues an action behind everything dispatched before it.
    ///
    /// # Errors
    ///
    /// - `StoreError::ChannelClosed` if the actor has shut down
    pub async fn dispatch(&self, action: HudAction) -> Result<(), StoreError> {
        self.sender
            .send(StoreCommand::Dispatch(action))
            .await
            .map_err(|_| StoreError::ChannelClosed)
    }

    /// Replaces the state wholesale and waits until the actor has done so.
    ///
    /// # Errors
    ///
    /// - `StoreError::ChannelClosed` if the actor has shut down
    pub async fn replace(&self, state: HudState) -> Result<(), StoreError> {
        let (tx, rx) = oneshot::channel();

        self.sender
            .send(StoreCommand::Replace {
                state: Box::new(state),
                respond_to: tx,
            })
            .await
            .map_err(|_| StoreError::ChannelClosed)?;

        rx.await.map_err(|_| StoreError::ChannelClosed)
    }

    /// State after every command queued so far has been applied.
    ///
    /// Falls back to the last published snapshot if the actor is gone.
    pub async fn settled(&self) -> Arc<HudState> {
        let (tx, rx) = oneshot::channel();

        if self
            .sender
            .send(StoreCommand::Snapshot { respond_to: tx })
            .await
            .is_err()
        {
            return self.snapshot();
        }

        rx.await.unwrap_or_else(|_| self.snapshot())
    }

    /// Latest published state. Never waits.
    pub fn snapshot(&self) -> Arc<HudState> {
        Arc::clone(&self.state_rx.borrow())
    }

    /// Receiver notified on every published state.
    pub fn subscribe(&self) -> watch::Receiver<Arc<HudState>> {
        self.state_rx.clone()
    }

    /// Returns `true` while the command channel is open.
    pub fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}
