//! Money and cost estimation value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::Add;

use crate::config::PricingTable;
use crate::context::TokenCount;

/// A USD amount held in whole microdollars so sums do not drift.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Money {
    microdollars: i64,
}

impl Money {
    const PER_DOLLAR: f64 = 1_000_000.0;

    pub fn from_usd(dollars: f64) -> Self {
        Self {
            microdollars: (dollars * Self::PER_DOLLAR).round() as i64,
        }
    }

    pub fn as_usd(&self) -> f64 {
        self.microdollars as f64 / Self::PER_DOLLAR
    }

    /// `$0.0050`, `$1.50`, `$12.3`, `$150`: fewer decimals as the amount grows.
    pub fn format(&self) -> String {
        let dollars = self.as_usd();
        let decimals = match dollars {
            d if d > 0.0 && d < 0.01 => 4,
            d if d < 10.0 => 2,
            d if d < 100.0 => 1,
            _ => 0,
        };
        format!("${dollars:.decimals$}")
    }
}

impl Add for Money {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            microdollars: self.microdollars.saturating_add(other.microdollars),
        }
    }
}

impl Serialize for Money {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        // USD float on the wire
        serializer.serialize_f64(self.as_usd())
    }
}

impl<'de> Deserialize<'de> for Money {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let dollars = f64::deserialize(deserializer)?;
        Ok(Money::from_usd(dollars))
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.format())
    }
}

// ============================================================================
// Rates
// ============================================================================

/// USD per million tokens.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ModelRates {
    pub input: f64,
    pub output: f64,
}

impl ModelRates {
    pub const fn new(input: f64, output: f64) -> Self {
        Self { input, output }
    }
}

/// Model family used to pick a pricing tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ModelFamily {
    Opus,
    Sonnet,
    Haiku,
    Unknown,
}

impl ModelFamily {
    /// Classifies a model id or display name by substring.
    pub fn from_model_name(name: &str) -> Self {
        let lower = name.to_lowercase();
        if lower.contains("opus") {
            Self::Opus
        } else if lower.contains("sonnet") {
            Self::Sonnet
        } else if lower.contains("haiku") {
            Self::Haiku
        } else {
            Self::Unknown
        }
    }

    /// Key used in the config pricing table.
    pub fn pricing_key(&self) -> Option<&'static str> {
        match self {
            Self::Opus => Some("opus"),
            Self::Sonnet => Some("sonnet"),
            Self::Haiku => Some("haiku"),
            Self::Unknown => None,
        }
    }

    /// Built-in rates used when the config has no entry.
    pub fn default_rates(&self) -> ModelRates {
        match self {
            Self::Opus => ModelRates::new(15.00, 75.00),
            Self::Sonnet => ModelRates::new(3.00, 15.00),
            Self::Haiku => ModelRates::new(0.80, 4.00),
            // Conservative default
            Self::Unknown => ModelRates::new(3.00, 15.00),
        }
    }

    /// Rates from `pricing` when it has this family, else the defaults.
    pub fn rates(&self, pricing: Option<&PricingTable>) -> ModelRates {
        self.pricing_key()
            .and_then(|key| pricing.and_then(|table| table.models.get(key)))
            .copied()
            .unwrap_or_else(|| self.default_rates())
    }
}

// ============================================================================
// Cost Estimate
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostEstimate {
    pub input_tokens: TokenCount,
    pub output_tokens: TokenCount,
    pub input_cost: Money,
    pub output_cost: Money,
    pub total_cost: Money,
}

impl CostEstimate {
    pub fn estimate(input_tokens: u64, output_tokens: u64, rates: ModelRates) -> Self {
        let input_cost = Money::from_usd(input_tokens as f64 / 1_000_000.0 * rates.input);
        let output_cost = Money::from_usd(output_tokens as f64 / 1_000_000.0 * rates.output);
        Self {
            input_tokens: TokenCount::new(input_tokens),
            output_tokens: TokenCount::new(output_tokens),
            input_cost,
            output_cost,
            total_cost: input_cost + output_cost,
        }
    }
}
