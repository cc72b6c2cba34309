//! Task-execution core for an agentic coding assistant.
//!
//! Given a conversation history and a stream of model turns, the engine
//! decides which tool (if any) the model invoked, whether it is legal in
//! the active mode, asks the user for approval where policy requires it,
//! executes the tool, and reconciles the result back into the transcript.
//! It loops until the model completes the task, the user cancels, or the
//! model makes too many consecutive mistakes.
//!
//! This crate is a library consumed by a host application. The host owns
//! the UI, persistence, and the LLM transport; it reaches the engine
//! through a handful of trait seams:
//!
//! - [`task::TurnProvider`] supplies model turns,
//! - [`approval::ApprovalGate`] answers approval requests,
//! - [`transcript::TranscriptSink`] mirrors results and previews,
//! - [`tools::ExternalDeps`] wires optional collaborators (semantic index,
//!   browser, MCP, fast-apply edits, sub-agents).
//!
//! Construction is explicit: build an [`engine::Engine`] once per process
//! and hand it by `Arc` to each [`task::TaskLoop`].

pub mod approval;
pub mod catalog;
pub mod engine;
pub mod error;
pub mod protocol;
pub mod task;
pub mod tools;
pub mod transcript;
pub mod workspace;

pub use approval::{
    ApprovalDecision, ApprovalGate, ApprovalRequest, ApprovalResponse, AutoApprovalGate,
};
pub use catalog::{Capabilities, ParamKind, ParamSpec, ToolCatalog, ToolDefinition};
pub use engine::Engine;
pub use error::{missing_param_error, ToolError};
pub use protocol::{
    detect_from_history, resolve_protocol, NativeToolCall, ParamValue, ParseOutcome,
    ToolInvocation, ToolProtocol,
};
pub use task::{
    ModelTurn, TaskExit, TaskId, TaskLoop, TaskPhase, TaskState, TurnProvider,
};
pub use tools::{ExternalDeps, ToolKind, ToolOutcome};
pub use transcript::{
    ContentBlock, NullSink, Role, ToolResultContent, TranscriptMessage, TranscriptSink,
};
pub use workspace::WorkspaceGuard;
