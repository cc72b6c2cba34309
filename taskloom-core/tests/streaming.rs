//! Live-preview behavior while a tagged-text tool call streams in.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::Value;

use taskloom_config::{ProviderInfo, SettingsSnapshot};
use taskloom_core::{
    ApprovalDecision, ApprovalGate, ApprovalRequest, Engine, TaskLoop, ToolResultContent,
    TranscriptSink,
};

struct YesGate;

#[async_trait]
impl ApprovalGate for YesGate {
    async fn request_approval(
        &self,
        _request: ApprovalRequest,
    ) -> anyhow::Result<ApprovalDecision> {
        Ok(ApprovalDecision::yes())
    }
}

#[derive(Default)]
struct PreviewSink {
    previews: Mutex<Vec<(String, Value)>>,
}

#[async_trait]
impl TranscriptSink for PreviewSink {
    async fn push_tool_result(&self, _tool_name: &str, _content: &ToolResultContent) {}

    async fn handle_error(&self, _context: &str, _error: &anyhow::Error) {}

    async fn show_partial(&self, tool_name: &str, preview: &Value) {
        self.previews
            .lock()
            .expect("previews lock")
            .push((tool_name.to_string(), preview.clone()));
    }
}

fn xml_settings() -> SettingsSnapshot {
    SettingsSnapshot {
        provider: ProviderInfo {
            supports_native_tools: false,
            ..ProviderInfo::default()
        },
        ..SettingsSnapshot::default()
    }
}

/// Each accumulated chunk that reveals a recognizable tool call produces a
/// preview; chunks that reveal nothing produce none.
#[tokio::test]
async fn growing_text_produces_growing_previews() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = Arc::new(Engine::new(dir.path()).expect("engine"));
    let sink = Arc::new(PreviewSink::default());
    let task = TaskLoop::new(engine, xml_settings(), Arc::new(YesGate), sink.clone());

    // Nothing recognizable yet.
    task.observe_stream_delta("Let me open ").await;
    assert!(sink.previews.lock().expect("lock").is_empty());

    // Tool identified, path still streaming.
    task.observe_stream_delta("Let me open <read_file><path>src/a")
        .await;
    // Path complete, block not yet closed.
    task.observe_stream_delta("Let me open <read_file><path>src/a.ts</path>")
        .await;

    let previews = sink.previews.lock().expect("lock").clone();
    assert_eq!(previews.len(), 2);
    assert_eq!(previews[0].0, "read_file");
    assert_eq!(previews[0].1["path"], "src/a");
    assert_eq!(previews[1].1["path"], "src/a.ts");
}

/// Previews never fire for the native protocol; structured calls arrive
/// whole from the transport.
#[tokio::test]
async fn native_protocol_produces_no_text_previews() {
    let dir = tempfile::tempdir().expect("tempdir");
    let engine = Arc::new(Engine::new(dir.path()).expect("engine"));
    let sink = Arc::new(PreviewSink::default());
    let task = TaskLoop::new(
        engine,
        SettingsSnapshot::default(),
        Arc::new(YesGate),
        sink.clone(),
    );

    task.observe_stream_delta("<read_file><path>src/a.ts</path>")
        .await;
    assert!(sink.previews.lock().expect("lock").is_empty());
}
