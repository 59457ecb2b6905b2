//! Degradation policy: safe mode and the schema mismatch banner.
//!
//! Both policies are plain state machines over logical time (epoch ms).
//! They return the [`HudAction`] to dispatch, if any; the session manager
//! feeds them and forwards their actions to the store.

use std::collections::VecDeque;
use std::time::Duration;

use hud_core::{HudAction, SchemaBanner};
use tracing::{info, warn};

// ============================================================================
// Configuration
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DegradeConfig {
    /// Parse failures inside `parse_error_window` that trigger safe mode.
    pub parse_error_threshold: usize,
    pub parse_error_window: Duration,
    /// How long the schema banner stays on screen.
    pub banner_visible: Duration,
    /// Quiet period after the banner hides, for equal or lower versions.
    pub banner_suppress: Duration,
}

impl Default for DegradeConfig {
    fn default() -> Self {
        Self {
            parse_error_threshold: 10,
            parse_error_window: Duration::from_secs(60),
            banner_visible: Duration::from_secs(8),
            banner_suppress: Duration::from_secs(60),
        }
    }
}

fn millis(duration: Duration) -> i64 {
    i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
}

// ============================================================================
// Safe Mode
// ============================================================================

/// Enters safe mode after a sustained rate of parse failures.
///
/// Safe mode is entered once and never cleared automatically.
#[derive(Debug, Clone)]
pub struct SafeModePolicy {
    threshold: usize,
    window_ms: i64,
    failures: VecDeque<i64>,
    triggered: bool,
}

impl SafeModePolicy {
    pub fn new(config: &DegradeConfig) -> Self {
        Self {
            threshold: config.parse_error_threshold.max(1),
            window_ms: millis(config.parse_error_window),
            failures: VecDeque::new(),
            triggered: false,
        }
    }

    /// Records one failure at `now`; returns the safe mode action on the
    /// failure that crosses the threshold.
    pub fn record_failure(&mut self, now: i64) -> Option<HudAction> {
        self.failures.push_back(now);
        let cutoff = now.saturating_sub(self.window_ms);
        while self.failures.front().is_some_and(|ts| *ts <= cutoff) {
            self.failures.pop_front();
        }
        // only the newest `threshold` entries matter
        while self.failures.len() > self.threshold {
            self.failures.pop_front();
        }

        if self.triggered || self.failures.len() < self.threshold {
            return None;
        }

        self.triggered = true;
        let reason = format!(
            "{} malformed events within {}s",
            self.failures.len(),
            self.window_ms / 1000
        );
        warn!(reason = %reason, "Entering safe mode");
        Some(HudAction::SafeMode {
            enabled: true,
            reason: Some(reason),
        })
    }

    pub fn is_triggered(&self) -> bool {
        self.triggered
    }

    /// Forgets all history, e.g. after a session handover.
    pub fn reset(&mut self) {
        self.failures.clear();
        self.triggered = false;
    }
}

// ============================================================================
// Schema Banner
// ============================================================================

/// Timing for the schema mismatch banner.
///
/// Lifecycle: shown immediately on the first mismatch, hidden after the
/// visible window, then a suppress window follows. During suppression an
/// equal or lower version is held and shown once the window ends; a
/// strictly higher version is shown immediately.
#[derive(Debug, Clone)]
pub struct SchemaBannerPolicy {
    visible_ms: i64,
    suppress_ms: i64,
    current: Option<SchemaBanner>,
    last_version: Option<u32>,
    suppress_until: i64,
    pending: Option<(u32, u32)>,
}

impl SchemaBannerPolicy {
    pub fn new(config: &DegradeConfig) -> Self {
        Self {
            visible_ms: millis(config.banner_visible),
            suppress_ms: millis(config.banner_suppress),
            current: None,
            last_version: None,
            suppress_until: 0,
            pending: None,
        }
    }

    pub fn visible(&self) -> Option<&SchemaBanner> {
        self.current.as_ref()
    }

    /// Handles a mismatch warning for `schema_version` at `now`.
    pub fn on_mismatch(&mut self, schema_version: u32, expected: u32, now: i64) -> Option<HudAction> {
        let higher = self.last_version.map_or(true, |last| schema_version > last);

        if self.current.is_some() {
            // already on screen; only a higher version replaces it
            return higher.then(|| self.show(schema_version, expected, now));
        }

        if now < self.suppress_until && !higher {
            let held = self.pending.map_or(schema_version, |(v, _)| v.max(schema_version));
            self.pending = Some((held, expected));
            return None;
        }

        Some(self.show(schema_version, expected, now))
    }

    /// Advances the banner clock; hides or releases a held banner.
    pub fn on_tick(&mut self, now: i64) -> Option<HudAction> {
        if let Some(banner) = self.current {
            if now >= banner.shown_at.saturating_add(self.visible_ms) {
                self.current = None;
                return Some(HudAction::SchemaBanner(None));
            }
            return None;
        }

        if now >= self.suppress_until {
            if let Some((version, expected)) = self.pending.take() {
                return Some(self.show(version, expected, now));
            }
        }
        None
    }

    fn show(&mut self, schema_version: u32, expected: u32, now: i64) -> HudAction {
        let banner = SchemaBanner {
            schema_version,
            expected,
            shown_at: now,
        };
        info!(schema_version, expected, "Showing schema mismatch banner");
        self.current = Some(banner);
        self.last_version = Some(schema_version);
        self.suppress_until = now
            .saturating_add(self.visible_ms)
            .saturating_add(self.suppress_ms);
        self.pending = None;
        HudAction::SchemaBanner(Some(banner))
    }

    pub fn reset(&mut self) {
        self.current = None;
        self.last_version = None;
        self.suppress_until = 0;
        self.pending = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> DegradeConfig {
        DegradeConfig {
            parse_error_threshold: 3,
            parse_error_window: Duration::from_secs(10),
            banner_visible: Duration::from_millis(100),
            banner_suppress: Duration::from_millis(1_000),
        }
    }

    fn shown_version(action: Option<HudAction>) -> Option<u32> {
        match action {
            Some(HudAction::SchemaBanner(Some(banner))) => Some(banner.schema_version),
            _ => None,
        }
    }

    fn is_hide(action: &Option<HudAction>) -> bool {
        matches!(action, Some(HudAction::SchemaBanner(None)))
    }

    #[test]
    fn test_safe_mode_after_threshold_within_window() {
        let mut policy = SafeModePolicy::new(&config());
        assert!(policy.record_failure(0).is_none());
        assert!(policy.record_failure(1_000).is_none());
        let action = policy.record_failure(2_000);
        assert!(matches!(
            action,
            Some(HudAction::SafeMode { enabled: true, reason: Some(_) })
        ));
        assert!(policy.is_triggered());
        // never re-sent
        assert!(policy.record_failure(3_000).is_none());
    }

    #[test]
    fn test_sparse_failures_do_not_trigger() {
        let mut policy = SafeModePolicy::new(&config());
        for i in 0..10 {
            assert!(policy.record_failure(i * 6_000).is_none());
        }
        assert!(!policy.is_triggered());
    }

    #[test]
    fn test_safe_mode_reset() {
        let mut policy = SafeModePolicy::new(&config());
        for i in 0..3 {
            policy.record_failure(i);
        }
        assert!(policy.is_triggered());
        policy.reset();
        assert!(!policy.is_triggered());
        assert!(policy.record_failure(10).is_none());
    }

    #[test]
    fn test_banner_shown_immediately_then_hidden() {
        let mut policy = SchemaBannerPolicy::new(&config());
        assert_eq!(shown_version(policy.on_mismatch(2, 1, 0)), Some(2));
        assert!(policy.on_tick(50).is_none());
        assert!(is_hide(&policy.on_tick(100)));
        assert!(policy.visible().is_none());
    }

    #[test]
    fn test_equal_version_suppressed_then_released() {
        let mut policy = SchemaBannerPolicy::new(&config());
        policy.on_mismatch(2, 1, 0);
        policy.on_tick(100);

        // inside suppress window (ends at 1_100)
        assert!(policy.on_mismatch(2, 1, 500).is_none());
        assert!(policy.on_tick(900).is_none());
        assert!(policy.visible().is_none());

        assert_eq!(shown_version(policy.on_tick(1_100)), Some(2));
    }

    #[test]
    fn test_lower_version_suppressed() {
        let mut policy = SchemaBannerPolicy::new(&config());
        policy.on_mismatch(3, 1, 0);
        policy.on_tick(100);
        assert!(policy.on_mismatch(2, 1, 200).is_none());
        assert!(policy.visible().is_none());
    }

    #[test]
    fn test_higher_version_overrides_suppression() {
        let mut policy = SchemaBannerPolicy::new(&config());
        policy.on_mismatch(2, 1, 0);
        policy.on_tick(100);
        assert_eq!(shown_version(policy.on_mismatch(3, 1, 500)), Some(3));
        // visible window restarts from the new banner
        assert!(policy.on_tick(550).is_none());
        assert!(is_hide(&policy.on_tick(600)));
    }

    #[test]
    fn test_higher_version_while_visible_replaces_banner() {
        let mut policy = SchemaBannerPolicy::new(&config());
        policy.on_mismatch(2, 1, 0);
        assert!(policy.on_mismatch(2, 1, 10).is_none());
        assert_eq!(shown_version(policy.on_mismatch(4, 1, 20)), Some(4));
        assert_eq!(policy.visible().map(|b| b.shown_at), Some(20));
    }

    #[test]
    fn test_after_suppress_window_shows_immediately() {
        let mut policy = SchemaBannerPolicy::new(&config());
        policy.on_mismatch(2, 1, 0);
        policy.on_tick(100);
        assert_eq!(shown_version(policy.on_mismatch(2, 1, 5_000)), Some(2));
    }

    #[test]
    fn test_banner_reset() {
        let mut policy = SchemaBannerPolicy::new(&config());
        policy.on_mismatch(2, 1, 0);
        policy.reset();
        assert!(policy.visible().is_none());
        assert_eq!(shown_version(policy.on_mismatch(2, 1, 1)), Some(2));
    }
}
