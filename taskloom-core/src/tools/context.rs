//! The capability bundle handed to every tool execution.
//!
//! Tool bodies never receive loose callbacks; everything they may touch
//! (approval gate, transcript sink, workspace guard, collaborator
//! providers, cancellation) travels in one [`ToolContext`]. Mutations of
//! task-level state are requested through the context's effect flags and
//! applied by the owning task loop, which stays the single writer.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tokio_util::sync::CancellationToken;

use taskloom_config::{ModeRegistry, SettingsSnapshot};

use crate::approval::{ApprovalDecision, ApprovalGate, ApprovalRequest};
use crate::catalog::ToolCatalog;
use crate::error::ToolError;
use crate::task::state::{PhaseCell, TaskPhase};
use crate::tools::collaborators::ExternalDeps;
use crate::tools::command::TerminalRegistry;
use crate::transcript::TranscriptSink;
use crate::workspace::WorkspaceGuard;

/// Mutations a tool asked for during one invocation. Read and applied by
/// the task loop after dispatch returns.
#[derive(Debug, Default, Clone)]
pub struct TurnEffects {
    /// The user denied the approval request.
    pub rejected: bool,
    /// A file was modified on disk.
    pub edited_file: bool,
    /// `switch_mode` asked for this mode to take effect next turn.
    pub requested_mode: Option<String>,
}

pub struct ToolContext {
    pub(crate) workspace: Arc<WorkspaceGuard>,
    pub(crate) catalog: Arc<ToolCatalog>,
    pub(crate) modes: Arc<ModeRegistry>,
    pub(crate) settings: SettingsSnapshot,
    pub(crate) approval: Arc<dyn ApprovalGate>,
    pub(crate) sink: Arc<dyn TranscriptSink>,
    pub(crate) deps: Arc<ExternalDeps>,
    pub(crate) terminals: Arc<TerminalRegistry>,
    pub(crate) edits: Arc<EditCoordinator>,
    pub(crate) cancel: CancellationToken,
    pub(crate) phase: PhaseCell,
    effects: TurnEffects,
}

impl ToolContext {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        workspace: Arc<WorkspaceGuard>,
        catalog: Arc<ToolCatalog>,
        modes: Arc<ModeRegistry>,
        settings: SettingsSnapshot,
        approval: Arc<dyn ApprovalGate>,
        sink: Arc<dyn TranscriptSink>,
        deps: Arc<ExternalDeps>,
        terminals: Arc<TerminalRegistry>,
        edits: Arc<EditCoordinator>,
        cancel: CancellationToken,
        phase: PhaseCell,
    ) -> Self {
        Self {
            workspace,
            catalog,
            modes,
            settings,
            approval,
            sink,
            deps,
            terminals,
            edits,
            cancel,
            phase,
            effects: TurnEffects::default(),
        }
    }

    pub fn workspace(&self) -> &WorkspaceGuard {
        &self.workspace
    }

    pub fn settings(&self) -> &SettingsSnapshot {
        &self.settings
    }

    pub(crate) fn check_cancelled(&self) -> Result<(), ToolError> {
        if self.cancel.is_cancelled() {
            return Err(ToolError::Cancelled);
        }
        Ok(())
    }

    /// Route an invocation preview through the approval gate, suspending
    /// until the user (or the unattended policy) decides. A denial is
    /// recorded on the turn effects; the caller still gets the decision to
    /// shape its result.
    pub(crate) async fn ask_approval(
        &mut self,
        tool_name: &str,
        preview: Value,
        protected: bool,
    ) -> Result<ApprovalDecision, ToolError> {
        self.check_cancelled()?;
        let mut request = ApprovalRequest::new(tool_name, preview);
        if protected {
            request = request.protected();
        }
        self.phase.set(TaskPhase::AwaitingApproval);
        let decision = tokio::select! {
            _ = self.cancel.cancelled() => return Err(ToolError::Cancelled),
            decision = self.approval.request_approval(request) => {
                decision.map_err(|err| ToolError::execution(format!("approval gate failed: {err:#}")))?
            }
        };
        self.phase.set(TaskPhase::Executing);
        if !decision.approved() {
            self.effects.rejected = true;
        }
        Ok(decision)
    }

    pub(crate) fn mark_file_edited(&mut self) {
        self.effects.edited_file = true;
    }

    pub(crate) fn request_mode(&mut self, slug: impl Into<String>) {
        self.effects.requested_mode = Some(slug.into());
    }

    pub(crate) fn effects(&self) -> &TurnEffects {
        &self.effects
    }
}

/// Serializes edits per canonical path so concurrent tasks cannot
/// interleave writes to the same file.
#[derive(Default)]
pub struct EditCoordinator {
    locks: tokio::sync::Mutex<HashMap<PathBuf, Arc<tokio::sync::Mutex<()>>>>,
}

impl EditCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn lock(&self, path: &Path) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let mut locks = self.locks.lock().await;
            locks
                .entry(path.to_path_buf())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
                .clone()
        };
        lock.lock_owned().await
    }
}

/// Snapshot of a file taken before a speculative edit, restorable when the
/// user rejects the change or the task is cancelled mid-write.
pub struct StagedEdit {
    path: PathBuf,
    original: Option<Vec<u8>>,
}

impl StagedEdit {
    pub async fn capture(path: &Path) -> std::io::Result<Self> {
        let original = match tokio::fs::read(path).await {
            Ok(bytes) => Some(bytes),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => return Err(err),
        };
        Ok(Self {
            path: path.to_path_buf(),
            original,
        })
    }

    /// Restore the captured content, deleting the file if it did not exist
    /// before the edit.
    pub async fn revert(self) -> std::io::Result<()> {
        match self.original {
            Some(bytes) => tokio::fs::write(&self.path, bytes).await,
            None => match tokio::fs::remove_file(&self.path).await {
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
                other => other,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn staged_edit_restores_prior_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("a.txt");
        tokio::fs::write(&path, "before").await.expect("seed");

        let staged = StagedEdit::capture(&path).await.expect("capture");
        tokio::fs::write(&path, "after").await.expect("overwrite");
        staged.revert().await.expect("revert");

        let content = tokio::fs::read_to_string(&path).await.expect("read");
        assert_eq!(content, "before");
    }

    #[tokio::test]
    async fn staged_edit_removes_newly_created_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("new.txt");

        let staged = StagedEdit::capture(&path).await.expect("capture");
        tokio::fs::write(&path, "speculative").await.expect("write");
        staged.revert().await.expect("revert");

        assert!(!path.exists());
    }
}
