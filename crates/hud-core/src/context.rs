//! Context window and token tracking.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;

/// Tokens the host reserves before it auto-compacts.
pub const AUTOCOMPACT_BUFFER: u64 = 45_000;

/// Default context window size.
pub const DEFAULT_MAX_TOKENS: u64 = 200_000;

/// Maximum samples kept in the token history.
pub const MAX_TOKEN_HISTORY: usize = 60;

/// A token count. Formats as `1.3k` / `1.5M`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct TokenCount(u64);

impl TokenCount {
    pub const fn new(count: u64) -> Self {
        Self(count)
    }

    pub const fn zero() -> Self {
        Self(0)
    }

    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// Formats the token count for display.
    ///
    /// One decimal with k/M suffixes, rounded half up:
    /// `999`, `1.3k`, `1000.0k`, `1.5M`.
    pub fn format(&self) -> String {
        if self.0 < 1_000 {
            self.0.to_string()
        } else if self.0 < 1_000_000 {
            format_tenths(self.0, 1_000, "k")
        } else {
            format_tenths(self.0, 1_000_000, "M")
        }
    }
}

fn format_tenths(value: u64, unit: u64, suffix: &str) -> String {
    let tenths = value.saturating_mul(10).saturating_add(unit / 2) / unit;
    format!("{}.{}{suffix}", tenths / 10, tenths % 10)
}

/// Free-function form of [`TokenCount::format`].
pub fn format_tokens(count: u64) -> String {
    TokenCount::new(count).format()
}

impl From<u64> for TokenCount {
    fn from(n: u64) -> Self {
        Self(n)
    }
}

impl fmt::Display for TokenCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

// ============================================================================
// Context Usage
// ============================================================================

/// Health of the context window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContextStatus {
    #[default]
    Healthy,
    /// At or above 80% once the autocompact buffer is counted
    Warning,
    /// At or above 90% once the autocompact buffer is counted
    Critical,
}

impl ContextStatus {
    pub fn from_percent(percent: f64) -> Self {
        if percent >= 90.0 {
            Self::Critical
        } else if percent >= 80.0 {
            Self::Warning
        } else {
            Self::Healthy
        }
    }
}

/// Token usage split by what produced it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextBreakdown {
    pub tool_outputs: u64,
    pub tool_inputs: u64,
    pub messages: u64,
    pub other: u64,
}

impl ContextBreakdown {
    pub fn total(&self) -> u64 {
        self.tool_outputs
            .saturating_add(self.tool_inputs)
            .saturating_add(self.messages)
            .saturating_add(self.other)
    }
}

/// One point in the token history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenSample {
    pub ts: i64,
    pub tokens: u64,
}

/// Context window usage as last reported by the telemetry collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextUsage {
    pub tokens: TokenCount,
    /// Share of the window in use, 0.0 to 100.0
    pub percent: f64,
    pub remaining: TokenCount,
    pub max_tokens: TokenCount,
    /// Tokens per minute across the sampled history
    pub burn_rate: f64,
    pub status: ContextStatus,
    pub should_compact: bool,
    pub breakdown: ContextBreakdown,
    pub session_start: i64,
    pub last_update: i64,
    pub token_history: VecDeque<TokenSample>,
}

impl Default for ContextUsage {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TOKENS)
    }
}

impl ContextUsage {
    pub fn new(max_tokens: u64) -> Self {
        Self {
            tokens: TokenCount::zero(),
            percent: 0.0,
            remaining: TokenCount::new(max_tokens),
            max_tokens: TokenCount::new(max_tokens),
            burn_rate: 0.0,
            status: ContextStatus::Healthy,
            should_compact: false,
            breakdown: ContextBreakdown::default(),
            session_start: 0,
            last_update: 0,
            token_history: VecDeque::new(),
        }
    }

    /// Records a new token reading and recomputes every derived field.
    pub fn observe(&mut self, tokens: u64, breakdown: ContextBreakdown, now: i64) {
        if self.session_start == 0 {
            self.session_start = now;
        }
        let max = self.max_tokens.as_u64();

        self.tokens = TokenCount::new(tokens);
        self.breakdown = breakdown;
        self.last_update = now;
        self.remaining = TokenCount::new(max.saturating_sub(tokens));
        self.percent = percentage(tokens, max);
        self.status =
            ContextStatus::from_percent(percentage(tokens.saturating_add(AUTOCOMPACT_BUFFER), max));
        self.should_compact = self.status == ContextStatus::Critical;

        self.token_history.push_back(TokenSample { ts: now, tokens });
        while self.token_history.len() > MAX_TOKEN_HISTORY {
            self.token_history.pop_front();
        }
        self.burn_rate = self.compute_burn_rate();
    }

    fn compute_burn_rate(&self) -> f64 {
        let (Some(first), Some(last)) = (self.token_history.front(), self.token_history.back())
        else {
            return 0.0;
        };
        let elapsed_ms = last.ts.saturating_sub(first.ts);
        if elapsed_ms <= 0 || last.tokens <= first.tokens {
            return 0.0;
        }
        let minutes = elapsed_ms as f64 / 60_000.0;
        (last.tokens - first.tokens) as f64 / minutes
    }

    /// Formats usage for display (e.g., "45.2% (26.4k/200.0k)").
    pub fn format(&self) -> String {
        format!(
            "{:.1}% ({}/{})",
            self.percent,
            self.tokens.format(),
            self.max_tokens.format()
        )
    }
}

fn percentage(tokens: u64, max: u64) -> f64 {
    if max == 0 {
        return 0.0;
    }
    (tokens as f64 / max as f64 * 100.0).min(100.0)
}

impl fmt::Display for ContextUsage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}
