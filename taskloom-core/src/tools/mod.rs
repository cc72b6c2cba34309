//! Tool dispatch: the closed set of tools and the uniform execution
//! discipline every one of them follows.
//!
//! Dispatch is a single exhaustive match over [`ToolKind`], so adding a
//! tool without wiring its executor is a compile error. The shared
//! discipline lives in [`dispatch`]: required-parameter validation first,
//! then per-tool resource checks and approval, then the effect, with every
//! failure converted into a structured error rather than an escaped panic.

pub mod apply_diff;
pub mod collaborators;
pub mod command;
mod command_safety;
pub mod context;
pub mod control;
pub mod edit_file;
pub mod list_files;
pub mod read_file;
pub mod search_files;
pub mod write_to_file;

use serde_json::{json, Value};

use taskloom_config::constants::tools as tool_names;

use crate::approval::ApprovalDecision;
use crate::error::{missing_param_error, ToolError};
use crate::protocol::ToolInvocation;
use crate::transcript::{ToolResultContent, TranscriptSink};

pub use collaborators::{
    BrowserCommand, BrowserDriver, BrowserObservation, CodeIndex, ExternalDeps,
    FastApplyProvider, IndexHit, McpRouter, SubagentSpawner, SubtaskRequest,
};
pub use command::TerminalRegistry;
pub use context::{EditCoordinator, StagedEdit, ToolContext, TurnEffects};

/// Closed set of tools the engine can execute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolKind {
    ReadFile,
    ListFiles,
    SearchFiles,
    CodebaseSearch,
    WriteToFile,
    ApplyDiff,
    EditFile,
    ExecuteCommand,
    KillTerminal,
    BrowserAction,
    UseMcpTool,
    AskFollowupQuestion,
    AttemptCompletion,
    SwitchMode,
    NewTask,
}

impl ToolKind {
    pub fn from_name(name: &str) -> Option<Self> {
        let kind = match name {
            tool_names::READ_FILE => Self::ReadFile,
            tool_names::LIST_FILES => Self::ListFiles,
            tool_names::SEARCH_FILES => Self::SearchFiles,
            tool_names::CODEBASE_SEARCH => Self::CodebaseSearch,
            tool_names::WRITE_TO_FILE => Self::WriteToFile,
            tool_names::APPLY_DIFF => Self::ApplyDiff,
            tool_names::EDIT_FILE => Self::EditFile,
            tool_names::EXECUTE_COMMAND => Self::ExecuteCommand,
            tool_names::KILL_TERMINAL => Self::KillTerminal,
            tool_names::BROWSER_ACTION => Self::BrowserAction,
            tool_names::USE_MCP_TOOL => Self::UseMcpTool,
            tool_names::ASK_FOLLOWUP_QUESTION => Self::AskFollowupQuestion,
            tool_names::ATTEMPT_COMPLETION => Self::AttemptCompletion,
            tool_names::SWITCH_MODE => Self::SwitchMode,
            tool_names::NEW_TASK => Self::NewTask,
            _ => return None,
        };
        Some(kind)
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::ReadFile => tool_names::READ_FILE,
            Self::ListFiles => tool_names::LIST_FILES,
            Self::SearchFiles => tool_names::SEARCH_FILES,
            Self::CodebaseSearch => tool_names::CODEBASE_SEARCH,
            Self::WriteToFile => tool_names::WRITE_TO_FILE,
            Self::ApplyDiff => tool_names::APPLY_DIFF,
            Self::EditFile => tool_names::EDIT_FILE,
            Self::ExecuteCommand => tool_names::EXECUTE_COMMAND,
            Self::KillTerminal => tool_names::KILL_TERMINAL,
            Self::BrowserAction => tool_names::BROWSER_ACTION,
            Self::UseMcpTool => tool_names::USE_MCP_TOOL,
            Self::AskFollowupQuestion => tool_names::ASK_FOLLOWUP_QUESTION,
            Self::AttemptCompletion => tool_names::ATTEMPT_COMPLETION,
            Self::SwitchMode => tool_names::SWITCH_MODE,
            Self::NewTask => tool_names::NEW_TASK,
        }
    }
}

/// Terminal state of one tool invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolOutcome {
    Success(ToolResultContent),
    /// The user denied the approval request; no side effect happened.
    Denied { feedback: Option<String> },
    /// `attempt_completion`: the task is done.
    Completed { summary: String },
}

impl ToolOutcome {
    pub(crate) fn denied(decision: ApprovalDecision) -> Self {
        Self::Denied {
            feedback: decision.feedback_text,
        }
    }
}

/// Execute one validated invocation under the shared dispatch discipline.
///
/// The caller (the task loop) has already confirmed the tool is allowed in
/// the active mode. Required-parameter validation happens here so no tool
/// body ever observes a bag missing a required field.
pub async fn dispatch(
    ctx: &mut ToolContext,
    invocation: &ToolInvocation,
) -> Result<ToolOutcome, ToolError> {
    let kind = ToolKind::from_name(&invocation.tool_name).ok_or_else(|| {
        ToolError::validation(format!("Unknown tool '{}'", invocation.tool_name))
    })?;
    let definition = ctx.catalog.get(&invocation.tool_name).ok_or_else(|| {
        ToolError::validation(format!("Tool '{}' is not registered", invocation.tool_name))
    })?;
    for spec in definition.params {
        if spec.required && invocation.param(spec.name).is_none() {
            return Err(missing_param_error(&invocation.tool_name, spec.name));
        }
    }
    ctx.check_cancelled()?;

    tracing::debug!(tool = %invocation.tool_name, "dispatching tool");
    match kind {
        ToolKind::ReadFile => read_file::execute(ctx, invocation).await,
        ToolKind::ListFiles => list_files::execute(ctx, invocation).await,
        ToolKind::SearchFiles => search_files::execute(ctx, invocation).await,
        ToolKind::CodebaseSearch => collaborators::codebase_search(ctx, invocation).await,
        ToolKind::WriteToFile => write_to_file::execute(ctx, invocation).await,
        ToolKind::ApplyDiff => apply_diff::execute(ctx, invocation).await,
        ToolKind::EditFile => edit_file::execute(ctx, invocation).await,
        ToolKind::ExecuteCommand => command::execute_command(ctx, invocation).await,
        ToolKind::KillTerminal => command::kill_terminal(ctx, invocation).await,
        ToolKind::BrowserAction => collaborators::browser_action(ctx, invocation).await,
        ToolKind::UseMcpTool => collaborators::use_mcp_tool(ctx, invocation).await,
        ToolKind::AskFollowupQuestion => control::ask_followup_question(ctx, invocation).await,
        ToolKind::AttemptCompletion => control::attempt_completion(ctx, invocation).await,
        ToolKind::SwitchMode => control::switch_mode(ctx, invocation).await,
        ToolKind::NewTask => control::new_task(ctx, invocation).await,
    }
}

/// Streaming-preview path: called for each growing partial invocation so
/// the host can render what the model is about to ask for.
pub async fn handle_partial(sink: &dyn TranscriptSink, invocation: &ToolInvocation) {
    let Some(kind) = ToolKind::from_name(&invocation.tool_name) else {
        return;
    };
    let preview = partial_preview(kind, invocation);
    sink.show_partial(&invocation.tool_name, &preview).await;
}

fn partial_preview(kind: ToolKind, invocation: &ToolInvocation) -> Value {
    match kind {
        ToolKind::ReadFile | ToolKind::ListFiles | ToolKind::WriteToFile
        | ToolKind::ApplyDiff | ToolKind::EditFile => {
            json!({
                "tool": invocation.tool_name,
                "path": invocation.param_text("path"),
            })
        }
        ToolKind::ExecuteCommand => json!({
            "tool": invocation.tool_name,
            "command": invocation.param_text("command"),
        }),
        ToolKind::SearchFiles | ToolKind::CodebaseSearch => json!({
            "tool": invocation.tool_name,
            "query": invocation
                .param_text("regex")
                .or_else(|| invocation.param_text("query")),
        }),
        ToolKind::AskFollowupQuestion => json!({
            "tool": invocation.tool_name,
            "question": invocation.param_text("question"),
        }),
        _ => json!({ "tool": invocation.tool_name }),
    }
}
