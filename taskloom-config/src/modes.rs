//! Mode definitions: named bundles of allowed tool groups.
//!
//! A mode decides which tool groups the model may use during a task. The
//! built-in set covers the common workflows; hosts may layer custom modes
//! on top, keyed by slug. Modes are read-only for the lifetime of a task.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::constants::modes as mode_slugs;

/// Closed set of tool groups a mode can grant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolGroup {
    Read,
    Edit,
    Execute,
    Browser,
    Mcp,
}

/// A named bundle of allowed tool groups plus role framing for the prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Mode {
    pub slug: String,
    pub name: String,
    /// Free-text role framing injected into the system prompt by the host.
    /// The engine never inspects it.
    #[serde(default)]
    pub role_definition: String,
    pub groups: Vec<ToolGroup>,
}

impl Mode {
    fn builtin(slug: &str, name: &str, groups: &[ToolGroup]) -> Self {
        Self {
            slug: slug.to_string(),
            name: name.to_string(),
            role_definition: String::new(),
            groups: groups.to_vec(),
        }
    }

    pub fn allows_group(&self, group: ToolGroup) -> bool {
        self.groups.contains(&group)
    }
}

/// Slug the engine falls back to when a requested mode is unknown.
pub const DEFAULT_MODE_SLUG: &str = mode_slugs::CODE;

/// Ordered collection of modes, built-ins first, custom modes merged by slug.
#[derive(Debug, Clone)]
pub struct ModeRegistry {
    modes: IndexMap<String, Mode>,
}

impl ModeRegistry {
    /// Registry containing only the built-in modes.
    pub fn builtin() -> Self {
        use ToolGroup::*;
        let defaults = [
            Mode::builtin(mode_slugs::CODE, "Code", &[Read, Edit, Execute, Browser, Mcp]),
            Mode::builtin(mode_slugs::ARCHITECT, "Architect", &[Read, Browser, Mcp]),
            Mode::builtin(mode_slugs::ASK, "Ask", &[Read, Browser]),
            Mode::builtin(mode_slugs::DEBUG, "Debug", &[Read, Edit, Execute, Browser, Mcp]),
        ];
        let mut modes = IndexMap::new();
        for mode in defaults {
            modes.insert(mode.slug.clone(), mode);
        }
        Self { modes }
    }

    /// Built-ins with host-supplied custom modes merged over them. A custom
    /// mode with a built-in slug replaces the built-in in place; new slugs
    /// append in the order given.
    pub fn with_custom_modes(custom: Vec<Mode>) -> Self {
        let mut registry = Self::builtin();
        for mode in custom {
            registry.modes.insert(mode.slug.clone(), mode);
        }
        registry
    }

    pub fn get(&self, slug: &str) -> Option<&Mode> {
        self.modes.get(slug)
    }

    /// Resolve a slug, falling back to the default mode for unknown slugs.
    pub fn resolve(&self, slug: &str) -> &Mode {
        self.modes.get(slug).unwrap_or_else(|| self.default_mode())
    }

    pub fn default_mode(&self) -> &Mode {
        self.modes
            .get(DEFAULT_MODE_SLUG)
            .or_else(|| self.modes.values().next())
            .expect("registry always holds the built-in modes")
    }

    pub fn iter(&self) -> impl Iterator<Item = &Mode> {
        self.modes.values()
    }
}

impl Default for ModeRegistry {
    fn default() -> Self {
        Self::builtin()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn unknown_slug_falls_back_to_default_mode() {
        let registry = ModeRegistry::builtin();
        assert_eq!(registry.resolve("no-such-mode").slug, DEFAULT_MODE_SLUG);
    }

    #[test]
    fn ask_mode_has_no_edit_or_execute_group() {
        let registry = ModeRegistry::builtin();
        let ask = registry.resolve(mode_slugs::ASK);
        assert!(ask.allows_group(ToolGroup::Read));
        assert!(!ask.allows_group(ToolGroup::Edit));
        assert!(!ask.allows_group(ToolGroup::Execute));
    }

    #[test]
    fn custom_mode_replaces_builtin_by_slug() {
        let custom = Mode {
            slug: mode_slugs::ASK.to_string(),
            name: "Ask+".to_string(),
            role_definition: String::new(),
            groups: vec![ToolGroup::Read, ToolGroup::Mcp],
        };
        let registry = ModeRegistry::with_custom_modes(vec![custom]);
        let ask = registry.resolve(mode_slugs::ASK);
        assert_eq!(ask.name, "Ask+");
        assert!(ask.allows_group(ToolGroup::Mcp));
        // Built-in ordering is preserved on replacement.
        let slugs: Vec<&str> = registry.iter().map(|m| m.slug.as_str()).collect();
        assert_eq!(slugs, vec!["code", "architect", "ask", "debug"]);
    }
}
