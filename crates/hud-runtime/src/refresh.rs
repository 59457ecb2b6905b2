//! Periodic config/settings refresher.
//!
//! Force-refreshes both cached readers on a fixed cadence and publishes a
//! snapshot only when it differs from what the store holds. Comparing
//! against the store (not a private memo) means a session handover, which
//! wipes the state, is repaired on the next pass.

use std::path::PathBuf;
use std::time::Duration;

use hud_core::error::{CONFIG_READ_FAILED, SETTINGS_READ_FAILED};
use hud_core::settings::UNKNOWN_MODEL;
use hud_core::{now_millis, ErrorRecord, HudAction, HudState};
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::error::{HudError, Result};
use crate::readers::{ConfigReader, ReadStatus, ReaderError, SettingsReader};
use crate::store::StoreHandle;

/// Default refresh cadence.
pub const DEFAULT_REFRESH_INTERVAL: Duration = Duration::from_secs(10);

pub struct SnapshotRefresher {
    config: ConfigReader,
    settings: SettingsReader,
    store: StoreHandle,
    interval: Duration,
    last_config_error: Option<ReaderError>,
    last_settings_error: Option<ReaderError>,
}

impl SnapshotRefresher {
    pub fn new(
        config_path: impl Into<PathBuf>,
        settings_path: impl Into<PathBuf>,
        store: StoreHandle,
    ) -> Self {
        Self {
            config: ConfigReader::new(config_path),
            settings: SettingsReader::new(settings_path),
            store,
            interval: DEFAULT_REFRESH_INTERVAL,
            last_config_error: None,
            last_settings_error: None,
        }
    }

    #[must_use]
    pub fn with_interval(mut self, interval: Duration) -> Self {
        self.interval = interval;
        self
    }

    /// Runs one refresh pass and returns the actions it dispatched.
    pub async fn refresh_once(&mut self) -> Result<Vec<HudAction>> {
        let state = self.store.snapshot();
        let now = now_millis();

        let config = self.config.force_refresh_with_status_async().await;
        let settings = self.settings.force_refresh_with_status_async().await;

        let mut actions = Vec::new();
        config_actions(&state, config, &mut self.last_config_error, now, &mut actions);
        settings_actions(&state, settings, &mut self.last_settings_error, now, &mut actions);

        for action in &actions {
            debug!(action = action.name(), "Publishing snapshot change");
            self.store
                .dispatch(action.clone())
                .await
                .map_err(|_| HudError::StoreClosed)?;
        }
        Ok(actions)
    }

    /// Refreshes immediately, then every interval, until cancelled.
    pub async fn run(mut self, cancel: CancellationToken) -> Result<()> {
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.refresh_once().await?;
                }
                _ = cancel.cancelled() => {
                    info!("Snapshot refresher stopped");
                    return Ok(());
                }
            }
        }
    }
}

fn config_actions(
    state: &HudState,
    status: ReadStatus<hud_core::HudConfig>,
    last_error: &mut Option<ReaderError>,
    now: i64,
    actions: &mut Vec<HudAction>,
) {
    report_error(CONFIG_READ_FAILED, status.error, last_error, now, actions);
    if state.config != status.data {
        actions.push(HudAction::Config(status.data));
    }
}

fn settings_actions(
    state: &HudState,
    status: ReadStatus<hud_core::SettingsSnapshot>,
    last_error: &mut Option<ReaderError>,
    now: i64,
    actions: &mut Vec<HudAction>,
) {
    report_error(SETTINGS_READ_FAILED, status.error, last_error, now, actions);

    if let Some(model) = status
        .data
        .as_ref()
        .map(|s| s.model.as_str())
        .filter(|m| *m != UNKNOWN_MODEL)
    {
        if state.model.as_deref() != Some(model) {
            actions.push(HudAction::Model(model.to_string()));
        }
    }
    if state.settings != status.data {
        actions.push(HudAction::Settings(status.data));
    }
}

/// Records a read failure once; a repeat of the same failure stays quiet.
fn report_error(
    code: &str,
    error: Option<ReaderError>,
    last_error: &mut Option<ReaderError>,
    now: i64,
    actions: &mut Vec<HudAction>,
) {
    match error {
        Some(error) if last_error.as_ref() != Some(&error) => {
            actions.push(HudAction::Error(ErrorRecord::new(code, error.to_string(), now)));
            *last_error = Some(error);
        }
        Some(_) => {}
        None => *last_error = None,
    }
}
