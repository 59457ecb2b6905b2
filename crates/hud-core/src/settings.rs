//! Host settings and context-file snapshots.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::SnapshotError;

/// Model name reported when settings do not name one.
pub const UNKNOWN_MODEL: &str = "unknown";

/// Summary of the host's `settings.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsSnapshot {
    pub model: String,
    pub plugin_count: usize,
    /// Enabled plugin names with any `@version` suffix stripped
    pub plugin_names: Vec<String>,
    pub mcp_count: usize,
    pub mcp_names: Vec<String>,
    pub allowed_permissions: Vec<String>,
}

impl Default for SettingsSnapshot {
    fn default() -> Self {
        Self {
            model: UNKNOWN_MODEL.to_string(),
            plugin_count: 0,
            plugin_names: Vec::new(),
            mcp_count: 0,
            mcp_names: Vec::new(),
            allowed_permissions: Vec::new(),
        }
    }
}

impl SettingsSnapshot {
    pub fn from_value(value: &Value) -> Result<Self, SnapshotError> {
        let obj = value.as_object().ok_or_else(|| SnapshotError::NotAnObject {
            document: "settings".to_string(),
        })?;

        let model = obj
            .get("model")
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or(UNKNOWN_MODEL)
            .to_string();

        let plugin_names: Vec<String> = obj
            .get("enabledPlugins")
            .and_then(Value::as_object)
            .map(|plugins| {
                plugins
                    .iter()
                    .filter(|(_, enabled)| enabled.as_bool() == Some(true))
                    .map(|(name, _)| strip_version(name).to_string())
                    .collect()
            })
            .unwrap_or_default();

        let mcp_names: Vec<String> = obj
            .get("mcpServers")
            .and_then(Value::as_object)
            .map(|servers| servers.keys().cloned().collect())
            .unwrap_or_default();

        let allowed_permissions = obj
            .get("permissions")
            .and_then(|p| p.get("allow"))
            .and_then(Value::as_array)
            .map(|allow| {
                allow
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            model,
            plugin_count: plugin_names.len(),
            plugin_names,
            mcp_count: mcp_names.len(),
            mcp_names,
            allowed_permissions,
        })
    }
}

fn strip_version(name: &str) -> &str {
    match name.rsplit_once('@') {
        Some((base, _)) if !base.is_empty() => base,
        _ => name,
    }
}

/// Counts of instruction and config files visible from the session's cwd.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContextFiles {
    pub claude_md_count: u32,
    pub rules_count: u32,
    pub mcp_count: u32,
    pub hooks_count: u32,
}

impl ContextFiles {
    pub fn total(&self) -> u32 {
        self.claude_md_count
            .saturating_add(self.rules_count)
            .saturating_add(self.mcp_count)
            .saturating_add(self.hooks_count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parses_plugin_and_mcp_settings() {
        let settings = SettingsSnapshot::from_value(&json!({
            "model": "claude-sonnet-4",
            "enabledPlugins": {
                "plugin-a@1.0.0": true,
                "plugin-b": false,
                "plugin-c": true
            },
            "mcpServers": {"server-a": {"command": "x"}},
            "permissions": {"allow": ["shell_command"]}
        }))
        .unwrap();
        assert_eq!(settings.model, "claude-sonnet-4");
        assert_eq!(settings.plugin_count, 2);
        assert_eq!(settings.plugin_names, vec!["plugin-a", "plugin-c"]);
        assert_eq!(settings.mcp_count, 1);
        assert_eq!(settings.mcp_names, vec!["server-a"]);
        assert_eq!(settings.allowed_permissions, vec!["shell_command"]);
    }

    #[test]
    fn test_missing_optional_fields() {
        let settings = SettingsSnapshot::from_value(&json!({})).unwrap();
        assert_eq!(settings, SettingsSnapshot::default());
        assert_eq!(settings.model, "unknown");
    }

    #[test]
    fn test_rejects_non_object_root() {
        assert!(SettingsSnapshot::from_value(&json!("settings")).is_err());
    }

    #[test]
    fn test_scoped_plugin_name_keeps_scope() {
        assert_eq!(strip_version("@scope/plugin"), "@scope/plugin");
        assert_eq!(strip_version("plugin@2"), "plugin");
    }

    #[test]
    fn test_context_files_total() {
        let files = ContextFiles {
            claude_md_count: 2,
            rules_count: 1,
            mcp_count: 3,
            hooks_count: 0,
        };
        assert_eq!(files.total(), 6);
    }
}
