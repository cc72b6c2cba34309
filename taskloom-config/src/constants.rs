//! Well-known names used across the engine.

/// Canonical tool names.
pub mod tools {
    pub const READ_FILE: &str = "read_file";
    pub const WRITE_TO_FILE: &str = "write_to_file";
    pub const APPLY_DIFF: &str = "apply_diff";
    pub const EDIT_FILE: &str = "edit_file";
    pub const EXECUTE_COMMAND: &str = "execute_command";
    pub const KILL_TERMINAL: &str = "kill_terminal";
    pub const SEARCH_FILES: &str = "search_files";
    pub const LIST_FILES: &str = "list_files";
    pub const CODEBASE_SEARCH: &str = "codebase_search";
    pub const BROWSER_ACTION: &str = "browser_action";
    pub const USE_MCP_TOOL: &str = "use_mcp_tool";
    pub const ASK_FOLLOWUP_QUESTION: &str = "ask_followup_question";
    pub const ATTEMPT_COMPLETION: &str = "attempt_completion";
    pub const SWITCH_MODE: &str = "switch_mode";
    pub const NEW_TASK: &str = "new_task";
}

/// Built-in mode slugs.
pub mod modes {
    pub const CODE: &str = "code";
    pub const ARCHITECT: &str = "architect";
    pub const ASK: &str = "ask";
    pub const DEBUG: &str = "debug";
}

/// Experiment flags recognized by the engine.
pub mod experiments {
    /// Enables the instruction-driven `edit_file` tool and disables
    /// `apply_diff`; the two editing tools are never offered together.
    pub const FAST_APPLY: &str = "fast_apply";
}

/// Ignore file consulted by the workspace guard, gitignore syntax.
pub const IGNORE_FILE_NAME: &str = ".taskloomignore";
