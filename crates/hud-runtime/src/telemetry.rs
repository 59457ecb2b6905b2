//! Context and cost telemetry.
//!
//! The transcript is the only place the host reports token usage. A
//! background task re-summarizes it on a fixed cadence and publishes
//! `context` / `cost` actions when the numbers move.

use std::time::Duration;

use hud_core::{now_millis, CostEstimate, HudAction, HudState, ModelFamily};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::probe::{SessionProbe, TranscriptUsage};
use crate::store::StoreHandle;

/// Default cadence for re-reading the transcript.
pub const DEFAULT_TELEMETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Actions that bring `state` up to date with `usage`.
///
/// Context is observed only when the token count changed, so the burn rate
/// samples real movement. Rates come from the config pricing table when it
/// names the model family.
pub fn telemetry_actions(state: &HudState, usage: &TranscriptUsage, now: i64) -> Vec<HudAction> {
    let mut actions = Vec::new();

    if state.context.last_update == 0 || state.context.tokens.as_u64() != usage.context_tokens {
        let mut context = state.context.clone();
        context.observe(usage.context_tokens, usage.breakdown, now);
        actions.push(HudAction::Context(context));
    }

    let model = usage
        .model
        .as_deref()
        .or(state.model.as_deref())
        .unwrap_or_default();
    let pricing = state.config.as_ref().and_then(|c| c.pricing.as_ref());
    let rates = ModelFamily::from_model_name(model).rates(pricing);
    let cost = CostEstimate::estimate(usage.input_tokens, usage.output_tokens, rates);
    if cost != state.cost {
        actions.push(HudAction::Cost(cost));
    }

    actions
}

/// Periodically summarizes the session transcript and publishes usage.
pub fn spawn_telemetry_task<P>(
    store: StoreHandle,
    probe: P,
    every: Duration,
    cancel: CancellationToken,
) -> JoinHandle<()>
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
                    let path = state.session_info.transcript_path.as_path();
                    if path.as_os_str().is_empty() {
                        continue;
                    }
                    let Some(usage) = probe.read_transcript(path).await.usage else {
                        continue;
                    };

                    let mut closed = false;
                    for action in telemetry_actions(&state, &usage, now_millis()) {
                        match &action {
                            HudAction::Context(context) => {
                                debug!(context = %context, status = ?context.status, "Context usage");
                            }
                            HudAction::Cost(cost) => debug!(cost = %cost.total_cost, "Cost estimate"),
                            _ => {}
                        }
                        if store.dispatch(action).await.is_err() {
                            closed = true;
                            break;
                        }
                    }
                    if closed {
                        break;
                    }
                }
                _ = cancel.cancelled() => break,
            }
        }
        info!("Telemetry task stopped");
    })
}
