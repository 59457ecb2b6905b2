//! HUD configuration document (`config.json`).

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::fmt;

use crate::cost::ModelRates;
use crate::error::SnapshotError;

/// Panels the view knows how to draw.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PanelId {
    Status,
    Context,
    Cost,
    Tools,
    Agents,
    Todos,
    Errors,
}

impl PanelId {
    pub const ALL: [PanelId; 7] = [
        Self::Status,
        Self::Context,
        Self::Cost,
        Self::Tools,
        Self::Agents,
        Self::Todos,
        Self::Errors,
    ];

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|panel| panel.as_str() == name)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Status => "status",
            Self::Context => "context",
            Self::Cost => "cost",
            Self::Tools => "tools",
            Self::Agents => "agents",
            Self::Todos => "todos",
            Self::Errors => "errors",
        }
    }
}

impl fmt::Display for PanelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pricing tier names accepted in the pricing table.
pub const PRICING_TIERS: [&str; 3] = ["opus", "sonnet", "haiku"];

/// Per-family rates from the config document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PricingTable {
    pub models: BTreeMap<String, ModelRates>,
    pub last_updated: Option<String>,
}

/// Validated contents of the config document.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HudConfig {
    pub panel_order: Option<Vec<PanelId>>,
    pub hidden_panels: Option<Vec<PanelId>>,
    pub width: Option<u32>,
    pub pricing: Option<PricingTable>,
}

impl HudConfig {
    /// Builds a config from a parsed JSON document.
    ///
    /// Unknown keys are ignored. Invalid entries are dropped individually;
    /// only a non-object root is an error.
    pub fn from_value(value: &Value) -> Result<Self, SnapshotError> {
        let obj = value.as_object().ok_or_else(|| SnapshotError::NotAnObject {
            document: "config".to_string(),
        })?;

        Ok(Self {
            panel_order: obj.get("panelOrder").and_then(parse_panel_list),
            hidden_panels: obj.get("hiddenPanels").and_then(parse_panel_list),
            width: obj.get("width").and_then(parse_positive_u32),
            pricing: obj
                .get("pricing")
                .and_then(Value::as_object)
                .map(parse_pricing),
        })
    }

    /// Panel order to draw, falling back to every panel in default order.
    pub fn effective_panel_order(&self) -> Vec<PanelId> {
        self.panel_order
            .clone()
            .unwrap_or_else(|| PanelId::ALL.to_vec())
    }

    pub fn is_hidden(&self, panel: PanelId) -> bool {
        self.hidden_panels
            .as_ref()
            .is_some_and(|hidden| hidden.contains(&panel))
    }
}

/// Filters against the known panel ids, keeping first occurrences.
fn parse_panel_list(value: &Value) -> Option<Vec<PanelId>> {
    let items = value.as_array()?;
    let mut panels = Vec::with_capacity(items.len());
    for panel in items.iter().filter_map(Value::as_str).filter_map(PanelId::from_name) {
        if !panels.contains(&panel) {
            panels.push(panel);
        }
    }
    Some(panels)
}

fn parse_positive_u32(value: &Value) -> Option<u32> {
    value
        .as_u64()
        .filter(|n| *n > 0)
        .and_then(|n| u32::try_from(n).ok())
}

fn parse_rate(value: Option<&Value>) -> Option<f64> {
    value
        .and_then(Value::as_f64)
        .filter(|rate| rate.is_finite() && *rate > 0.0)
}

fn parse_pricing(obj: &Map<String, Value>) -> PricingTable {
    let models = PRICING_TIERS
        .iter()
        .filter_map(|tier| {
            let entry = obj.get(*tier)?.as_object()?;
            let input = parse_rate(entry.get("input"))?;
            let output = parse_rate(entry.get("output"))?;
            Some((tier.to_string(), ModelRates::new(input, output)))
        })
        .collect();

    PricingTable {
        models,
        last_updated: obj
            .get("lastUpdated")
            .and_then(Value::as_str)
            .map(str::to_string),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_filters_invalid_panels_and_reads_width() {
        let config = HudConfig::from_value(&json!({
            "panelOrder": ["status", "tools", "bogus"],
            "hiddenPanels": ["cost", "nope"],
            "width": 52
        }))
        .unwrap();
        assert_eq!(
            config.panel_order,
            Some(vec![PanelId::Status, PanelId::Tools])
        );
        assert_eq!(config.hidden_panels, Some(vec![PanelId::Cost]));
        assert_eq!(config.width, Some(52));
        assert!(config.is_hidden(PanelId::Cost));
    }

    #[test]
    fn test_deduplicates_panel_ids() {
        let config = HudConfig::from_value(&json!({
            "panelOrder": ["status", "tools", "status", "tools"]
        }))
        .unwrap();
        assert_eq!(
            config.panel_order,
            Some(vec![PanelId::Status, PanelId::Tools])
        );
    }

    #[test]
    fn test_ignores_non_positive_width() {
        for width in [json!(0), json!(-5), json!("wide"), json!(12.5)] {
            let config = HudConfig::from_value(&json!({ "width": width })).unwrap();
            assert_eq!(config.width, None);
        }
    }

    #[test]
    fn test_parses_pricing() {
        let config = HudConfig::from_value(&json!({
            "pricing": {
                "sonnet": {"input": 3, "output": 15},
                "opus": {"input": 15, "output": 75},
                "haiku": {"input": 0.25, "output": 1.25},
                "lastUpdated": "2025-01-01"
            }
        }))
        .unwrap();
        let pricing = config.pricing.unwrap();
        assert_eq!(pricing.models["sonnet"], ModelRates::new(3.0, 15.0));
        assert_eq!(pricing.models["opus"], ModelRates::new(15.0, 75.0));
        assert_eq!(pricing.models["haiku"], ModelRates::new(0.25, 1.25));
        assert_eq!(pricing.last_updated.as_deref(), Some("2025-01-01"));
    }

    #[test]
    fn test_drops_malformed_pricing_tiers_individually() {
        let config = HudConfig::from_value(&json!({
            "pricing": {
                "sonnet": "not an object",
                "opus": {"input": "not a number", "output": 75},
                "haiku": {"input": 1, "output": 5}
            }
        }))
        .unwrap();
        let pricing = config.pricing.unwrap();
        assert!(!pricing.models.contains_key("sonnet"));
        assert!(!pricing.models.contains_key("opus"));
        assert_eq!(pricing.models["haiku"], ModelRates::new(1.0, 5.0));
    }

    #[test]
    fn test_rejects_non_object_root() {
        assert!(matches!(
            HudConfig::from_value(&json!([1, 2])),
            Err(SnapshotError::NotAnObject { .. })
        ));
    }

    #[test]
    fn test_effective_panel_order_defaults() {
        assert_eq!(HudConfig::default().effective_panel_order(), PanelId::ALL.to_vec());
    }
}
