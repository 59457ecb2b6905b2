//! Turns raw pipe lines into store actions.
//!
//! The ingestor owns both degradation policies so that every decode outcome
//! and every banner tick is judged by one owner, in order.

use hud_core::error::EVENT_PARSE_FAILED;
use hud_core::HudAction;
use hud_protocol::{parse_event_result, ParsedEvent, SchemaWarning};
use tracing::{debug, warn};

use crate::degrade::{DegradeConfig, SafeModePolicy, SchemaBannerPolicy};

pub struct Ingestor {
    safe_mode: SafeModePolicy,
    banner: SchemaBannerPolicy,
    lines: u64,
    failures: u64,
}

impl Ingestor {
    pub fn new(config: &DegradeConfig) -> Self {
        Self {
            safe_mode: SafeModePolicy::new(config),
            banner: SchemaBannerPolicy::new(config),
            lines: 0,
            failures: 0,
        }
    }

    /// Decodes one line received at `now`.
    ///
    /// A malformed line yields a parse-error count (and possibly safe mode),
    /// never an error: the stream keeps going.
    pub fn ingest(&mut self, line: &str, now: i64) -> Vec<HudAction> {
        self.lines = self.lines.saturating_add(1);
        let mut actions = Vec::with_capacity(2);

        match parse_event_result(line) {
            Ok(ParsedEvent { event, warning }) => {
                if let Some(warning) = warning {
                    debug!(
                        schema_version = warning.schema_version,
                        expected = warning.expected,
                        "Event uses a newer schema"
                    );
                    let shown = self
                        .banner
                        .on_mismatch(warning.schema_version, warning.expected, now);
                    push_banner(&mut actions, shown, now);
                }
                actions.push(HudAction::event(event, now));
            }
            Err(failure) => {
                self.failures = self.failures.saturating_add(1);
                warn!(
                    code = EVENT_PARSE_FAILED,
                    error = %failure.error,
                    line_preview = %failure.line_preview,
                    "Dropping malformed event line"
                );
                actions.push(HudAction::ParseError);
                actions.extend(self.safe_mode.record_failure(now));
            }
        }

        actions
    }

    /// Advances the banner clock.
    pub fn tick(&mut self, now: i64) -> Vec<HudAction> {
        let mut actions = Vec::new();
        let next = self.banner.on_tick(now);
        push_banner(&mut actions, next, now);
        actions
    }

    /// Forgets policy history for a new session.
    pub fn reset(&mut self) {
        self.safe_mode.reset();
        self.banner.reset();
        self.lines = 0;
        self.failures = 0;
    }

    pub fn lines(&self) -> u64 {
        self.lines
    }

    pub fn failures(&self) -> u64 {
        self.failures
    }

    pub fn in_safe_mode(&self) -> bool {
        self.safe_mode.is_triggered()
    }
}

/// Appends a banner action; a newly shown banner is also recorded as an
/// error so it survives in the diagnostics list after it hides.
fn push_banner(actions: &mut Vec<HudAction>, action: Option<HudAction>, now: i64) {
    let Some(action) = action else {
        return;
    };
    if let HudAction::SchemaBanner(Some(banner)) = &action {
        let warning = SchemaWarning {
            schema_version: banner.schema_version,
            expected: banner.expected,
        };
        actions.push(HudAction::Error(warning.to_record(now)));
    }
    actions.push(action);
}
