//! Read-only per-turn settings snapshot supplied by the host.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::modes::DEFAULT_MODE_SLUG;

fn default_true() -> bool {
    true
}

fn default_mode_slug() -> String {
    DEFAULT_MODE_SLUG.to_string()
}

fn default_mistake_limit() -> u32 {
    3
}

fn default_command_timeout_secs() -> u64 {
    120
}

fn default_provider_slug() -> String {
    "anthropic".to_string()
}

/// Capabilities of the active model provider relevant to tool gating.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderInfo {
    #[serde(default = "default_provider_slug")]
    pub slug: String,
    /// Whether the transport can carry structured tool calls. Providers
    /// without it are forced onto the tagged-text protocol.
    #[serde(default = "default_true")]
    pub supports_native_tools: bool,
    /// Whether the active model accepts image content.
    #[serde(default)]
    pub supports_images: bool,
}

impl Default for ProviderInfo {
    fn default() -> Self {
        Self {
            slug: default_provider_slug(),
            supports_native_tools: true,
            supports_images: false,
        }
    }
}

/// Snapshot of host settings taken once per turn. The engine never writes
/// back; the host owns persistence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SettingsSnapshot {
    #[serde(default = "default_mode_slug")]
    pub mode_slug: String,
    #[serde(default)]
    pub experiments: HashMap<String, bool>,
    /// Unattended operation: approvals are granted automatically except for
    /// operations flagged as protected.
    #[serde(default)]
    pub yolo_mode: bool,
    #[serde(default = "default_true")]
    pub diff_enabled: bool,
    /// Consecutive validation failures tolerated before the task stalls
    /// and asks the user to intervene.
    #[serde(default = "default_mistake_limit")]
    pub consecutive_mistake_limit: u32,
    #[serde(default)]
    pub provider: ProviderInfo,
    /// Whether the semantic code index is built and queryable.
    #[serde(default)]
    pub index_ready: bool,
    #[serde(default = "default_command_timeout_secs")]
    pub command_timeout_secs: u64,
}

impl Default for SettingsSnapshot {
    fn default() -> Self {
        Self {
            mode_slug: default_mode_slug(),
            experiments: HashMap::new(),
            yolo_mode: false,
            diff_enabled: true,
            consecutive_mistake_limit: default_mistake_limit(),
            provider: ProviderInfo::default(),
            index_ready: false,
            command_timeout_secs: default_command_timeout_secs(),
        }
    }
}

impl SettingsSnapshot {
    pub fn from_toml_str(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    /// Whether an experiment flag is enabled. Unknown flags read as off.
    pub fn experiment(&self, name: &str) -> bool {
        self.experiments.get(name).copied().unwrap_or(false)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn defaults_apply_to_empty_toml() {
        let settings = SettingsSnapshot::from_toml_str("").expect("empty settings");
        assert_eq!(settings.mode_slug, DEFAULT_MODE_SLUG);
        assert_eq!(settings.consecutive_mistake_limit, 3);
        assert!(settings.diff_enabled);
        assert!(!settings.yolo_mode);
        assert!(settings.provider.supports_native_tools);
    }

    #[test]
    fn partial_toml_overrides_only_named_fields() {
        let raw = r#"
            mode_slug = "ask"
            yolo_mode = true

            [experiments]
            fast_apply = true

            [provider]
            slug = "text-only"
            supports_native_tools = false
        "#;
        let settings = SettingsSnapshot::from_toml_str(raw).expect("settings");
        assert_eq!(settings.mode_slug, "ask");
        assert!(settings.yolo_mode);
        assert!(settings.experiment(crate::constants::experiments::FAST_APPLY));
        assert!(!settings.experiment("unknown_flag"));
        assert!(!settings.provider.supports_native_tools);
        assert_eq!(settings.command_timeout_secs, 120);
    }
}
