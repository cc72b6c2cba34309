//! The per-task turn loop.
//!
//! One [`TaskLoop`] owns one task: its transcript copy, its mutable state,
//! and its cancellation token. Turns are strictly sequential: a turn's
//! transcript reconciliation completes before the next model turn is
//! requested, which is what lets protocol detection and the mistake
//! counter trust the history. Multiple loops (a parent and its
//! sub-agents) run concurrently on the runtime without sharing any
//! mutable state.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use taskloom_config::SettingsSnapshot;

use crate::approval::{ApprovalGate, AutoApprovalGate};
use crate::catalog::Capabilities;
use crate::engine::Engine;
use crate::error::ToolError;
use crate::protocol::{
    detect_from_history, native, resolve_protocol, xml, NativeToolCall, ParseOutcome,
    ToolInvocation, ToolProtocol,
};
use crate::tools::{self, ToolContext, ToolOutcome};
use crate::transcript::{
    ContentBlock, ToolResultContent, TranscriptMessage, TranscriptSink,
};

use super::state::{PhaseCell, TaskId, TaskPhase, TaskState};

const NO_TOOL_USED_MESSAGE: &str = "You responded without invoking a tool. Every reply must \
    either invoke a tool or call attempt_completion when the task is done.";
const ONE_TOOL_PER_MESSAGE: &str = "Only one tool may be invoked per message; this call was \
    not executed.";

/// One model turn, as delivered by the provider layer: either already-lexed
/// structured calls or raw text to be scanned under the tagged protocol.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelTurn {
    Native {
        text: Option<String>,
        calls: Vec<NativeToolCall>,
    },
    Text(String),
}

/// The model-side collaborator: produces the next assistant turn given the
/// transcript so far.
#[async_trait]
pub trait TurnProvider: Send {
    async fn next_turn(&mut self, transcript: &[TranscriptMessage]) -> anyhow::Result<ModelTurn>;
}

/// Why a task stopped looping.
#[derive(Debug, Clone, PartialEq)]
pub enum TaskExit {
    Completed { summary: String },
    Aborted,
    /// Too many consecutive validation failures; the user must intervene.
    MistakeLimitReached,
}

type ResultEntry = (String, Option<String>, ToolResultContent, bool);

pub struct TaskLoop {
    id: TaskId,
    engine: Arc<Engine>,
    settings: SettingsSnapshot,
    approval: Arc<dyn ApprovalGate>,
    sink: Arc<dyn TranscriptSink>,
    cancel: CancellationToken,
    state: TaskState,
    transcript: Vec<TranscriptMessage>,
    phase: PhaseCell,
}

impl TaskLoop {
    pub fn new(
        engine: Arc<Engine>,
        settings: SettingsSnapshot,
        approval: Arc<dyn ApprovalGate>,
        sink: Arc<dyn TranscriptSink>,
    ) -> Self {
        let state = TaskState::new(settings.mode_slug.clone());
        Self {
            id: TaskId::new(),
            engine,
            settings,
            approval,
            sink,
            cancel: CancellationToken::new(),
            state,
            transcript: Vec::new(),
            phase: PhaseCell::new(),
        }
    }

    /// Rebuild a task from a persisted transcript. The protocol lock is
    /// re-derived from the replayed history before any new turn runs, so a
    /// resumed task keeps the wire format its earlier turns used even if
    /// global defaults have changed since.
    pub fn resume(
        engine: Arc<Engine>,
        settings: SettingsSnapshot,
        approval: Arc<dyn ApprovalGate>,
        sink: Arc<dyn TranscriptSink>,
        transcript: Vec<TranscriptMessage>,
    ) -> Self {
        let mut task = Self::new(engine, settings, approval, sink);
        if let Some(protocol) = detect_from_history(&transcript) {
            task.state.lock_protocol(protocol);
        }
        task.transcript = transcript;
        task
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn id(&self) -> TaskId {
        self.id
    }

    pub fn phase(&self) -> TaskPhase {
        self.phase.get()
    }

    pub fn state(&self) -> &TaskState {
        &self.state
    }

    pub fn transcript(&self) -> &[TranscriptMessage] {
        &self.transcript
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Active protocol for the next turn: the lock if present, otherwise
    /// provider defaults.
    pub fn protocol(&self) -> ToolProtocol {
        resolve_protocol(&self.settings.provider, self.state.locked_protocol())
    }

    /// Seed or extend the conversation with user input.
    pub fn push_user_message(&mut self, text: impl Into<String>) {
        self.transcript.push(TranscriptMessage::user_text(text));
    }

    /// Replace the settings snapshot before the next turn. The protocol
    /// lock and mistake counter survive; the current mode and approval
    /// policy follow the new snapshot.
    pub fn update_settings(&mut self, settings: SettingsSnapshot) {
        self.state.set_mode(settings.mode_slug.clone());
        self.settings = settings;
    }

    /// Drive the loop to an exit, pulling turns from the provider.
    pub async fn run(&mut self, provider: &mut dyn TurnProvider) -> anyhow::Result<TaskExit> {
        loop {
            if self.cancel.is_cancelled() {
                return Ok(self.abort());
            }
            self.phase.set(TaskPhase::AwaitingModelTurn);
            let turn = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(self.abort()),
                turn = provider.next_turn(&self.transcript) => turn?,
            };
            if let Some(exit) = self.process_turn(turn).await? {
                return Ok(exit);
            }
        }
    }

    /// Live-preview hook: hosts call this with the accumulated text of the
    /// assistant turn while it streams. Partial invocations are forwarded
    /// to the sink; nothing executes.
    pub async fn observe_stream_delta(&self, text_so_far: &str) {
        if self.protocol() != ToolProtocol::Xml {
            return;
        }
        if let Ok(ParseOutcome::Invocation(invocation)) =
            xml::scan(text_so_far, &self.engine.catalog, true)
        {
            tools::handle_partial(self.sink.as_ref(), &invocation).await;
        }
    }

    /// Process one complete model turn. Returns `Some(exit)` when the task
    /// is over, `None` to continue with the next turn.
    pub async fn process_turn(&mut self, turn: ModelTurn) -> anyhow::Result<Option<TaskExit>> {
        if self.cancel.is_cancelled() {
            return Ok(Some(self.abort()));
        }
        self.phase.set(TaskPhase::ParsingInvocation);
        let protocol = self.protocol();

        let mut blocks: Vec<ContentBlock> = Vec::new();
        let mut extra_results: Vec<ResultEntry> = Vec::new();
        let parsed: Result<ParseOutcome, ToolError> = match turn {
            ModelTurn::Native { text, calls } => {
                if let Some(text) = text.filter(|text| !text.is_empty()) {
                    blocks.push(ContentBlock::Text { text });
                }
                for call in &calls {
                    blocks.push(ContentBlock::ToolUse {
                        id: Some(call.id.clone()),
                        name: call.name.clone(),
                        input: call.arguments.clone(),
                    });
                }
                match calls.split_first() {
                    None => Ok(ParseOutcome::NoToolCall),
                    Some((first, rest)) => {
                        for ignored in rest {
                            extra_results.push((
                                ignored.name.clone(),
                                Some(ignored.id.clone()),
                                ToolResultContent::text(ONE_TOOL_PER_MESSAGE),
                                true,
                            ));
                        }
                        native::validate_call(&self.engine.catalog, first)
                            .map(ParseOutcome::Invocation)
                    }
                }
            }
            ModelTurn::Text(text) => {
                let scan_result = match protocol {
                    // Under the native protocol tool calls only arrive
                    // structurally; a text-only turn used no tool.
                    ToolProtocol::Native => Ok(ParseOutcome::NoToolCall),
                    ToolProtocol::Xml => xml::scan(&text, &self.engine.catalog, false),
                };
                blocks.push(ContentBlock::Text { text });
                if let Ok(ParseOutcome::Invocation(invocation)) = &scan_result {
                    blocks.push(ContentBlock::ToolUse {
                        id: None,
                        name: invocation.tool_name.clone(),
                        input: invocation.input_value(),
                    });
                }
                scan_result
            }
        };
        self.transcript.push(TranscriptMessage::assistant(blocks));

        let invocation = match parsed {
            Err(err) => return self.conclude_failure(None, err, extra_results).await,
            Ok(ParseOutcome::Invocation(invocation)) => invocation,
            Ok(ParseOutcome::NoToolCall) => {
                return self
                    .conclude_failure(
                        None,
                        ToolError::validation(NO_TOOL_USED_MESSAGE),
                        extra_results,
                    )
                    .await;
            }
            Ok(ParseOutcome::NeedMoreInput) => {
                return self
                    .conclude_failure(
                        None,
                        ToolError::Parse {
                            tool: None,
                            message: "turn ended with an incomplete tool call".into(),
                        },
                        extra_results,
                    )
                    .await;
            }
        };

        self.phase.set(TaskPhase::ValidatingInvocation);
        let caps = Capabilities::from_settings(&self.settings);
        let allowed = {
            let mode = self.engine.modes.resolve(self.state.current_mode());
            self.engine.catalog.resolve_allowed_tools(mode, &caps)
        };
        if !allowed.contains(invocation.tool_name.as_str()) {
            let err = ToolError::AccessDenied(format!(
                "Tool '{}' is not allowed in '{}' mode",
                invocation.tool_name,
                self.state.current_mode()
            ));
            return self
                .conclude_failure(Some(&invocation), err, extra_results)
                .await;
        }

        // The invocation is about to execute; this is the moment the
        // task's protocol becomes durable.
        let used_protocol = if invocation.call_id.is_some() {
            ToolProtocol::Native
        } else {
            ToolProtocol::Xml
        };
        self.state.lock_protocol(used_protocol);

        self.phase.set(TaskPhase::Executing);
        let mut ctx = self.tool_context();
        let dispatched = tools::dispatch(&mut ctx, &invocation).await;
        let effects = ctx.effects().clone();
        drop(ctx);

        // Single-writer discipline: the loop, not the tool, mutates state.
        if effects.rejected {
            self.state.note_rejection();
        }
        if effects.edited_file {
            self.state.note_file_edit();
        }
        if let Some(slug) = effects.requested_mode {
            self.state.set_mode(slug);
        }

        let tool_name = invocation.tool_name.clone();
        let call_id = invocation.call_id.clone();
        match dispatched {
            Err(ToolError::Cancelled) => Ok(Some(self.abort())),
            Err(err) => {
                self.conclude_failure(Some(&invocation), err, extra_results)
                    .await
            }
            Ok(ToolOutcome::Denied { feedback }) => {
                let mut text = "The user denied this operation.".to_string();
                if let Some(feedback) = feedback {
                    text.push_str(&format!("\nThe user provided feedback:\n{feedback}"));
                }
                let mut results = vec![(tool_name, call_id, ToolResultContent::text(text), false)];
                results.append(&mut extra_results);
                self.reconcile(results).await;
                Ok(None)
            }
            Ok(ToolOutcome::Success(content)) => {
                self.state.record_success();
                let mut results = vec![(tool_name, call_id, content, false)];
                results.append(&mut extra_results);
                self.reconcile(results).await;
                Ok(None)
            }
            Ok(ToolOutcome::Completed { summary }) => {
                self.state.record_success();
                let mut results = vec![(
                    tool_name,
                    call_id,
                    ToolResultContent::text("Task marked as complete."),
                    false,
                )];
                results.append(&mut extra_results);
                self.reconcile(results).await;
                self.phase.set(TaskPhase::Completed);
                Ok(Some(TaskExit::Completed { summary }))
            }
        }
    }

    fn tool_context(&self) -> ToolContext {
        // The unattended wrapper is rebuilt per turn so a settings change
        // takes effect on the next invocation.
        let approval: Arc<dyn ApprovalGate> = Arc::new(AutoApprovalGate::new(
            self.approval.clone(),
            self.settings.yolo_mode,
        ));
        ToolContext::new(
            self.engine.workspace.clone(),
            self.engine.catalog.clone(),
            self.engine.modes.clone(),
            self.settings.clone(),
            approval,
            self.sink.clone(),
            self.engine.deps.clone(),
            self.engine.terminals.clone(),
            self.engine.edits.clone(),
            self.cancel.clone(),
            self.phase.clone(),
        )
    }

    /// Convert a per-invocation failure into a transcript-visible result,
    /// bump the mistake counter where the taxonomy says so, and stop the
    /// task when the counter crosses the configured limit.
    async fn conclude_failure(
        &mut self,
        invocation: Option<&ToolInvocation>,
        err: ToolError,
        mut extra_results: Vec<ResultEntry>,
    ) -> anyhow::Result<Option<TaskExit>> {
        let counts = err.counts_as_mistake();
        let count = if counts {
            self.state.record_mistake()
        } else {
            self.state.consecutive_mistake_count()
        };
        let tool_name = invocation
            .map(|invocation| invocation.tool_name.clone())
            .or_else(|| match &err {
                ToolError::Parse { tool, .. } => tool.clone(),
                ToolError::MissingParameter { tool, .. } => Some(tool.clone()),
                _ => None,
            })
            .unwrap_or_else(|| "unknown".to_string());
        let call_id = invocation.and_then(|invocation| invocation.call_id.clone());
        tracing::warn!(
            task = %self.id,
            tool = %tool_name,
            mistakes = count,
            error = %err,
            "tool invocation failed"
        );

        let mut results = vec![(
            tool_name,
            call_id,
            ToolResultContent::text(err.to_string()),
            true,
        )];
        results.append(&mut extra_results);
        self.reconcile(results).await;

        if counts && count >= self.settings.consecutive_mistake_limit {
            self.phase.set(TaskPhase::MistakeLimitReached);
            tracing::warn!(task = %self.id, "consecutive mistake limit reached");
            return Ok(Some(TaskExit::MistakeLimitReached));
        }
        Ok(None)
    }

    /// Append the turn's results to the transcript and mirror them to the
    /// host. The next turn only starts after this completes.
    async fn reconcile(&mut self, results: Vec<ResultEntry>) {
        self.phase.set(TaskPhase::ReconcilingTranscript);
        let mut blocks = Vec::with_capacity(results.len());
        for (tool_name, call_id, content, is_error) in results {
            self.sink.push_tool_result(&tool_name, &content).await;
            blocks.push(ContentBlock::ToolResult {
                tool_name,
                call_id,
                content: content.to_text(),
                is_error,
            });
        }
        self.transcript.push(TranscriptMessage::user(blocks));
    }

    fn abort(&mut self) -> TaskExit {
        self.phase.set(TaskPhase::Aborted);
        tracing::debug!(task = %self.id, "task aborted");
        TaskExit::Aborted
    }
}
