//! Command execution through the loop: output capture, timeouts, and the
//! protected-command path that pierces unattended auto-approval.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use pretty_assertions::assert_eq;
use serde_json::json;

use taskloom_config::SettingsSnapshot;
use taskloom_core::{
    ApprovalDecision, ApprovalGate, ApprovalRequest, Engine, ModelTurn, NativeToolCall,
    TaskLoop, ToolResultContent, TranscriptSink,
};

#[derive(Default)]
struct Gate {
    decisions: Mutex<VecDeque<ApprovalDecision>>,
    seen: Mutex<Vec<ApprovalRequest>>,
}

#[async_trait]
impl ApprovalGate for Gate {
    async fn request_approval(
        &self,
        request: ApprovalRequest,
    ) -> anyhow::Result<ApprovalDecision> {
        self.seen.lock().expect("seen lock").push(request);
        let next = self.decisions.lock().expect("decisions lock").pop_front();
        Ok(next.unwrap_or_else(ApprovalDecision::yes))
    }
}

#[derive(Default)]
struct Sink {
    results: Mutex<Vec<(String, String)>>,
}

impl Sink {
    fn last_result(&self) -> String {
        self.results
            .lock()
            .expect("results lock")
            .last()
            .map(|(_, text)| text.clone())
            .unwrap_or_default()
    }
}

#[async_trait]
impl TranscriptSink for Sink {
    async fn push_tool_result(&self, tool_name: &str, content: &ToolResultContent) {
        self.results
            .lock()
            .expect("results lock")
            .push((tool_name.to_string(), content.to_text()));
    }

    async fn handle_error(&self, _context: &str, _error: &anyhow::Error) {}
}

fn command_turn(command: &str, extra: serde_json::Value) -> ModelTurn {
    let mut arguments = json!({"command": command});
    if let (Some(args), Some(extra)) = (arguments.as_object_mut(), extra.as_object()) {
        for (key, value) in extra {
            args.insert(key.clone(), value.clone());
        }
    }
    ModelTurn::Native {
        text: None,
        calls: vec![NativeToolCall {
            id: "cmd1".into(),
            name: "execute_command".into(),
            arguments,
        }],
    }
}

fn task_with(
    dir: &std::path::Path,
    settings: SettingsSnapshot,
    gate: Arc<Gate>,
    sink: Arc<Sink>,
) -> TaskLoop {
    let engine = Arc::new(Engine::new(dir).expect("engine"));
    TaskLoop::new(engine, settings, gate, sink)
}

#[tokio::test]
async fn captures_stdout_and_exit_status() {
    let dir = tempfile::tempdir().expect("tempdir");
    let gate = Arc::new(Gate::default());
    let sink = Arc::new(Sink::default());
    let mut task = task_with(dir.path(), SettingsSnapshot::default(), gate, sink.clone());

    let exit = task
        .process_turn(command_turn("echo hello-from-tool", json!({})))
        .await
        .expect("turn");

    assert_eq!(exit, None);
    assert_eq!(task.state().consecutive_mistake_count(), 0);
    let result = sink.last_result();
    assert!(result.contains("hello-from-tool"), "{result}");
    assert!(result.contains("exit status: 0"), "{result}");
}

#[tokio::test]
async fn long_running_command_times_out() {
    let dir = tempfile::tempdir().expect("tempdir");
    let gate = Arc::new(Gate::default());
    let sink = Arc::new(Sink::default());
    let mut task = task_with(dir.path(), SettingsSnapshot::default(), gate, sink.clone());

    let exit = task
        .process_turn(command_turn("sleep 30", json!({"timeout_secs": 1})))
        .await
        .expect("turn");

    assert_eq!(exit, None);
    assert!(sink.last_result().contains("timed out"));
}

#[tokio::test]
async fn unattended_mode_skips_approval_for_ordinary_commands() {
    let dir = tempfile::tempdir().expect("tempdir");
    let gate = Arc::new(Gate::default());
    let sink = Arc::new(Sink::default());
    let settings = SettingsSnapshot {
        yolo_mode: true,
        ..SettingsSnapshot::default()
    };
    let mut task = task_with(dir.path(), settings, gate.clone(), sink);

    task.process_turn(command_turn("true", json!({})))
        .await
        .expect("turn");

    assert!(gate.seen.lock().expect("seen lock").is_empty());
}

#[tokio::test]
async fn destructive_commands_pierce_unattended_approval() {
    let dir = tempfile::tempdir().expect("tempdir");
    let gate = Arc::new(Gate {
        decisions: Mutex::new(VecDeque::from([ApprovalDecision::no()])),
        seen: Mutex::new(Vec::new()),
    });
    let sink = Arc::new(Sink::default());
    let settings = SettingsSnapshot {
        yolo_mode: true,
        ..SettingsSnapshot::default()
    };
    let mut task = task_with(dir.path(), settings, gate.clone(), sink.clone());

    let exit = task
        .process_turn(command_turn("rm -rf target", json!({})))
        .await
        .expect("turn");

    assert_eq!(exit, None);
    let seen = gate.seen.lock().expect("seen lock");
    assert_eq!(seen.len(), 1, "protected request must reach the user");
    assert!(seen[0].protected);
    assert!(sink.last_result().contains("denied"));
    assert!(task.state().did_reject_tool());
}

#[tokio::test]
async fn killing_an_unknown_terminal_is_a_validation_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let gate = Arc::new(Gate::default());
    let sink = Arc::new(Sink::default());
    let mut task = task_with(dir.path(), SettingsSnapshot::default(), gate, sink.clone());

    let exit = task
        .process_turn(ModelTurn::Native {
            text: None,
            calls: vec![NativeToolCall {
                id: "k1".into(),
                name: "kill_terminal".into(),
                arguments: json!({"terminal_id": "not-a-terminal"}),
            }],
        })
        .await
        .expect("turn");

    assert_eq!(exit, None);
    assert_eq!(task.state().consecutive_mistake_count(), 1);
    assert!(sink.last_result().contains("No running terminal"));
}
