//! Per-task mutable state.
//!
//! All fields are written exclusively by the owning task loop. Tool bodies
//! request changes through `ToolContext` effects; the loop applies them
//! between dispatch and reconciliation.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::protocol::ToolProtocol;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TaskId(Uuid);

impl TaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for TaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.hyphenated())
    }
}

/// Observable position of a task in its turn state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskPhase {
    AwaitingModelTurn,
    ParsingInvocation,
    ValidatingInvocation,
    AwaitingApproval,
    Executing,
    ReconcilingTranscript,
    Completed,
    Aborted,
    MistakeLimitReached,
}

/// Shared cell so tool dispatch can surface fine-grained phase changes
/// (awaiting approval, executing) while the loop retains ownership.
#[derive(Clone)]
pub struct PhaseCell(Arc<Mutex<TaskPhase>>);

impl PhaseCell {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(TaskPhase::AwaitingModelTurn)))
    }

    pub fn set(&self, phase: TaskPhase) {
        *self.lock() = phase;
    }

    pub fn get(&self) -> TaskPhase {
        *self.lock()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, TaskPhase> {
        match self.0.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl Default for PhaseCell {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct TaskState {
    consecutive_mistake_count: u32,
    did_reject_tool: bool,
    did_edit_file: bool,
    locked_protocol: Option<ToolProtocol>,
    current_mode: String,
}

impl TaskState {
    pub fn new(mode_slug: impl Into<String>) -> Self {
        Self {
            consecutive_mistake_count: 0,
            did_reject_tool: false,
            did_edit_file: false,
            locked_protocol: None,
            current_mode: mode_slug.into(),
        }
    }

    pub fn consecutive_mistake_count(&self) -> u32 {
        self.consecutive_mistake_count
    }

    pub fn did_reject_tool(&self) -> bool {
        self.did_reject_tool
    }

    pub fn did_edit_file(&self) -> bool {
        self.did_edit_file
    }

    pub fn locked_protocol(&self) -> Option<ToolProtocol> {
        self.locked_protocol
    }

    pub fn current_mode(&self) -> &str {
        &self.current_mode
    }

    /// Increment after a validation failure; returns the new count.
    pub(crate) fn record_mistake(&mut self) -> u32 {
        self.consecutive_mistake_count += 1;
        self.consecutive_mistake_count
    }

    /// A successful tool execution is the only event that resets the
    /// counter.
    pub(crate) fn record_success(&mut self) {
        self.consecutive_mistake_count = 0;
    }

    pub(crate) fn note_rejection(&mut self) {
        self.did_reject_tool = true;
    }

    pub(crate) fn note_file_edit(&mut self) {
        self.did_edit_file = true;
    }

    /// Record the protocol the task's first executed tool call used. Once
    /// set it never changes; a conflicting later value is ignored.
    pub(crate) fn lock_protocol(&mut self, protocol: ToolProtocol) {
        match self.locked_protocol {
            None => self.locked_protocol = Some(protocol),
            Some(existing) if existing != protocol => {
                tracing::warn!(
                    ?existing,
                    attempted = ?protocol,
                    "ignoring attempt to change a locked tool protocol"
                );
            }
            Some(_) => {}
        }
    }

    pub(crate) fn set_mode(&mut self, slug: impl Into<String>) {
        self.current_mode = slug.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mistake_counter_resets_only_on_success() {
        let mut state = TaskState::new("code");
        assert_eq!(state.record_mistake(), 1);
        assert_eq!(state.record_mistake(), 2);
        state.record_success();
        assert_eq!(state.consecutive_mistake_count(), 0);
    }

    #[test]
    fn locked_protocol_never_changes() {
        let mut state = TaskState::new("code");
        state.lock_protocol(ToolProtocol::Xml);
        state.lock_protocol(ToolProtocol::Native);
        assert_eq!(state.locked_protocol(), Some(ToolProtocol::Xml));
    }
}
