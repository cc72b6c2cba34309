//! Static tool catalog: definitions, parameter schemas, group membership,
//! and availability predicates.
//!
//! The catalog is built once per host process and shared read-only across
//! tasks. Lookup is by name; gating combines the active mode's groups, the
//! always-available set, and per-tool availability against a capability
//! snapshot.

use indexmap::IndexSet;

use taskloom_config::constants::{experiments, tools};
use taskloom_config::{Mode, SettingsSnapshot, ToolGroup};

/// Coarse parameter types; fine-grained validation happens per tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer,
    Boolean,
    Enum(&'static [&'static str]),
    /// One or more `start-end` line ranges.
    LineRanges,
    /// Nested JSON object or array, passed through untyped.
    Structured,
}

#[derive(Debug, Clone, Copy)]
pub struct ParamSpec {
    pub name: &'static str,
    pub required: bool,
    pub kind: ParamKind,
}

impl ParamSpec {
    const fn required(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            required: true,
            kind,
        }
    }

    const fn optional(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            required: false,
            kind,
        }
    }
}

/// Snapshot of provider/settings state the availability predicates read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Capabilities {
    pub supports_images: bool,
    pub index_ready: bool,
    pub diff_enabled: bool,
    pub fast_apply: bool,
}

impl Capabilities {
    pub fn from_settings(settings: &SettingsSnapshot) -> Self {
        Self {
            supports_images: settings.provider.supports_images,
            index_ready: settings.index_ready,
            diff_enabled: settings.diff_enabled,
            fast_apply: settings.experiment(experiments::FAST_APPLY),
        }
    }
}

pub type AvailabilityPredicate = fn(&Capabilities) -> bool;

fn always(_: &Capabilities) -> bool {
    true
}

fn needs_index(caps: &Capabilities) -> bool {
    caps.index_ready
}

fn needs_vision(caps: &Capabilities) -> bool {
    caps.supports_images
}

// apply_diff and edit_file are mutually exclusive editing surfaces: the
// fast-apply experiment swaps one for the other, never both.
fn diff_editing(caps: &Capabilities) -> bool {
    caps.diff_enabled && !caps.fast_apply
}

fn fast_apply_editing(caps: &Capabilities) -> bool {
    caps.fast_apply
}

/// Immutable descriptor for one tool.
#[derive(Debug, Clone, Copy)]
pub struct ToolDefinition {
    pub name: &'static str,
    /// `None` marks the tool always available regardless of mode.
    pub group: Option<ToolGroup>,
    pub params: &'static [ParamSpec],
    /// Whether the dispatch discipline routes this tool through the
    /// approval gate. Conversational control tools skip it.
    pub requires_approval: bool,
    pub availability: AvailabilityPredicate,
}

const BUILTIN_TOOLS: &[ToolDefinition] = &[
    ToolDefinition {
        name: tools::READ_FILE,
        group: Some(ToolGroup::Read),
        params: &[
            ParamSpec::required("path", ParamKind::String),
            ParamSpec::optional("line_ranges", ParamKind::LineRanges),
        ],
        requires_approval: true,
        availability: always,
    },
    ToolDefinition {
        name: tools::LIST_FILES,
        group: Some(ToolGroup::Read),
        params: &[
            ParamSpec::required("path", ParamKind::String),
            ParamSpec::optional("recursive", ParamKind::Boolean),
        ],
        requires_approval: true,
        availability: always,
    },
    ToolDefinition {
        name: tools::SEARCH_FILES,
        group: Some(ToolGroup::Read),
        params: &[
            ParamSpec::required("path", ParamKind::String),
            ParamSpec::required("regex", ParamKind::String),
            ParamSpec::optional("file_pattern", ParamKind::String),
        ],
        requires_approval: true,
        availability: always,
    },
    ToolDefinition {
        name: tools::CODEBASE_SEARCH,
        group: Some(ToolGroup::Read),
        params: &[
            ParamSpec::required("query", ParamKind::String),
            ParamSpec::optional("path", ParamKind::String),
        ],
        requires_approval: true,
        availability: needs_index,
    },
    ToolDefinition {
        name: tools::WRITE_TO_FILE,
        group: Some(ToolGroup::Edit),
        params: &[
            ParamSpec::required("path", ParamKind::String),
            ParamSpec::required("content", ParamKind::String),
        ],
        requires_approval: true,
        availability: always,
    },
    ToolDefinition {
        name: tools::APPLY_DIFF,
        group: Some(ToolGroup::Edit),
        params: &[
            ParamSpec::required("path", ParamKind::String),
            ParamSpec::required("diff", ParamKind::String),
        ],
        requires_approval: true,
        availability: diff_editing,
    },
    ToolDefinition {
        name: tools::EDIT_FILE,
        group: Some(ToolGroup::Edit),
        params: &[
            ParamSpec::required("path", ParamKind::String),
            ParamSpec::required("instructions", ParamKind::String),
            ParamSpec::required("code_edit", ParamKind::String),
        ],
        requires_approval: true,
        availability: fast_apply_editing,
    },
    ToolDefinition {
        name: tools::EXECUTE_COMMAND,
        group: Some(ToolGroup::Execute),
        params: &[
            ParamSpec::required("command", ParamKind::String),
            ParamSpec::optional("cwd", ParamKind::String),
            ParamSpec::optional("timeout_secs", ParamKind::Integer),
        ],
        requires_approval: true,
        availability: always,
    },
    ToolDefinition {
        name: tools::KILL_TERMINAL,
        group: Some(ToolGroup::Execute),
        params: &[ParamSpec::required("terminal_id", ParamKind::String)],
        requires_approval: true,
        availability: always,
    },
    ToolDefinition {
        name: tools::BROWSER_ACTION,
        group: Some(ToolGroup::Browser),
        params: &[
            ParamSpec::required(
                "action",
                ParamKind::Enum(&["launch", "click", "type", "scroll", "close"]),
            ),
            ParamSpec::optional("url", ParamKind::String),
            ParamSpec::optional("coordinate", ParamKind::String),
            ParamSpec::optional("text", ParamKind::String),
        ],
        requires_approval: true,
        availability: needs_vision,
    },
    ToolDefinition {
        name: tools::USE_MCP_TOOL,
        group: Some(ToolGroup::Mcp),
        params: &[
            ParamSpec::required("server_name", ParamKind::String),
            ParamSpec::required("tool_name", ParamKind::String),
            ParamSpec::optional("arguments", ParamKind::Structured),
        ],
        requires_approval: true,
        availability: always,
    },
    ToolDefinition {
        name: tools::ASK_FOLLOWUP_QUESTION,
        group: None,
        params: &[
            ParamSpec::required("question", ParamKind::String),
            ParamSpec::optional("suggest", ParamKind::String),
        ],
        requires_approval: false,
        availability: always,
    },
    ToolDefinition {
        name: tools::ATTEMPT_COMPLETION,
        group: None,
        params: &[ParamSpec::required("result", ParamKind::String)],
        requires_approval: false,
        availability: always,
    },
    ToolDefinition {
        name: tools::SWITCH_MODE,
        group: None,
        params: &[
            ParamSpec::required("mode_slug", ParamKind::String),
            ParamSpec::optional("reason", ParamKind::String),
        ],
        requires_approval: false,
        availability: always,
    },
    ToolDefinition {
        name: tools::NEW_TASK,
        group: None,
        params: &[
            ParamSpec::optional("mode", ParamKind::String),
            ParamSpec::required("message", ParamKind::String),
        ],
        requires_approval: true,
        availability: always,
    },
];

/// Registry of tool definitions, constructed once and shared by reference.
pub struct ToolCatalog {
    tools: Vec<ToolDefinition>,
}

impl ToolCatalog {
    pub fn builtin() -> Self {
        Self {
            tools: BUILTIN_TOOLS.to_vec(),
        }
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.iter().find(|tool| tool.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    pub fn tool_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tools.iter().map(|tool| tool.name)
    }

    /// Tools legal for the given mode and capability snapshot: the union of
    /// the mode's groups plus the always-available set, minus tools whose
    /// availability predicate fails.
    pub fn resolve_allowed_tools(
        &self,
        mode: &Mode,
        caps: &Capabilities,
    ) -> IndexSet<&'static str> {
        self.tools
            .iter()
            .filter(|tool| match tool.group {
                None => true,
                Some(group) => mode.allows_group(group),
            })
            .filter(|tool| (tool.availability)(caps))
            .map(|tool| tool.name)
            .collect()
    }
}

impl Default for ToolCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
