//! Sub-agent tasks: bounded child goals running their own loops.
//!
//! A child task shares the engine (catalog, modes, workspace, terminal
//! registry) by reference but owns fresh task state, transcript, and
//! cancellation. There is no ordering guarantee between parent and child;
//! the parent sees the child only through its completion summary.

use std::sync::Arc;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use taskloom_config::SettingsSnapshot;

use crate::approval::ApprovalGate;
use crate::engine::Engine;
use crate::tools::{SubagentSpawner, SubtaskRequest};
use crate::transcript::TranscriptSink;

use super::loop_driver::{TaskExit, TaskLoop, TurnProvider};

/// Run a child task on the runtime. The returned handle resolves with the
/// child's exit; cancelling `cancel` aborts the child at its next
/// suspension point.
pub fn spawn_task(
    engine: Arc<Engine>,
    settings: SettingsSnapshot,
    approval: Arc<dyn ApprovalGate>,
    sink: Arc<dyn TranscriptSink>,
    mut provider: Box<dyn TurnProvider>,
    initial_message: String,
    cancel: CancellationToken,
) -> tokio::task::JoinHandle<anyhow::Result<TaskExit>> {
    tokio::spawn(async move {
        let mut task =
            TaskLoop::new(engine, settings, approval, sink).with_cancellation(cancel);
        task.push_user_message(initial_message);
        task.run(provider.as_mut()).await
    })
}

/// Builds the per-child turn provider; one child per `new_task` call.
pub type ProviderFactory =
    Box<dyn Fn(&SubtaskRequest) -> Box<dyn TurnProvider> + Send + Sync>;

/// [`SubagentSpawner`] implementation that runs children as in-process
/// task loops.
pub struct LoopSpawner {
    engine: Arc<Engine>,
    settings: SettingsSnapshot,
    approval: Arc<dyn ApprovalGate>,
    sink: Arc<dyn TranscriptSink>,
    provider_factory: ProviderFactory,
}

impl LoopSpawner {
    pub fn new(
        engine: Arc<Engine>,
        settings: SettingsSnapshot,
        approval: Arc<dyn ApprovalGate>,
        sink: Arc<dyn TranscriptSink>,
        provider_factory: ProviderFactory,
    ) -> Self {
        Self {
            engine,
            settings,
            approval,
            sink,
            provider_factory,
        }
    }
}

#[async_trait]
impl SubagentSpawner for LoopSpawner {
    async fn run_subtask(&self, request: SubtaskRequest) -> anyhow::Result<String> {
        let mut settings = self.settings.clone();
        if let Some(slug) = &request.mode_slug {
            settings.mode_slug = slug.clone();
        }
        let provider = (self.provider_factory)(&request);
        let handle = spawn_task(
            self.engine.clone(),
            settings,
            self.approval.clone(),
            self.sink.clone(),
            provider,
            request.message.clone(),
            CancellationToken::new(),
        );
        match handle.await? {
            Ok(TaskExit::Completed { summary }) => Ok(summary),
            Ok(TaskExit::Aborted) => anyhow::bail!("sub-task was aborted"),
            Ok(TaskExit::MistakeLimitReached) => {
                anyhow::bail!("sub-task stalled after repeated invalid tool calls")
            }
            Err(err) => Err(err),
        }
    }
}
