//! Error taxonomy for tool invocation and execution.
//!
//! Every variant here becomes a transcript-visible result inside the task
//! loop; nothing in this module is allowed to escape to the host as a
//! panic. Host/environment failures travel separately as `anyhow::Error`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ToolError {
    #[error("Missing required parameter '{param}' for tool '{tool}'")]
    MissingParameter { tool: String, param: String },

    /// Malformed line range, conflicting parameters, occurrence-count
    /// mismatch, unknown tool, and similar recoverable misuse.
    #[error("{0}")]
    Validation(String),

    /// Path outside the workspace, ignore-rule match, or a tool that the
    /// active mode does not permit.
    #[error("Access denied: {0}")]
    AccessDenied(String),

    /// Malformed tool-call syntax on a complete (non-streaming) chunk.
    #[error("Failed to parse tool call{}: {message}", .tool.as_deref().map(|t| format!(" for '{t}'")).unwrap_or_default())]
    Parse {
        tool: Option<String>,
        message: String,
    },

    /// I/O or external-service failure caught at the executor boundary.
    #[error("Tool execution failed: {0}")]
    Execution(String),

    /// The task's cancellation token fired while the tool was running.
    #[error("Tool execution was cancelled")]
    Cancelled,
}

impl ToolError {
    pub fn execution(err: impl std::fmt::Display) -> Self {
        Self::Execution(err.to_string())
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    /// Whether this failure counts toward the consecutive-mistake limit.
    /// Execution failures and cancellation do not: the model asked for
    /// something legal that the environment could not deliver.
    pub fn counts_as_mistake(&self) -> bool {
        matches!(
            self,
            Self::MissingParameter { .. }
                | Self::Validation(_)
                | Self::AccessDenied(_)
                | Self::Parse { .. }
        )
    }
}

impl From<std::io::Error> for ToolError {
    fn from(err: std::io::Error) -> Self {
        Self::Execution(err.to_string())
    }
}

impl From<anyhow::Error> for ToolError {
    fn from(err: anyhow::Error) -> Self {
        Self::Execution(format!("{err:#}"))
    }
}

/// Standardized diagnostic for a missing required parameter. The wording is
/// stable so the model can learn the shape across turns.
pub fn missing_param_error(tool: &str, param: &str) -> ToolError {
    ToolError::MissingParameter {
        tool: tool.to_string(),
        param: param.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mistake_classification() {
        assert!(missing_param_error("read_file", "path").counts_as_mistake());
        assert!(ToolError::validation("bad range").counts_as_mistake());
        assert!(ToolError::AccessDenied("outside workspace".into()).counts_as_mistake());
        assert!(!ToolError::execution("disk full").counts_as_mistake());
        assert!(!ToolError::Cancelled.counts_as_mistake());
    }

    #[test]
    fn parse_error_names_the_tool_when_known() {
        let err = ToolError::Parse {
            tool: Some("apply_diff".into()),
            message: "unterminated block".into(),
        };
        assert!(err.to_string().contains("apply_diff"));
    }
}
