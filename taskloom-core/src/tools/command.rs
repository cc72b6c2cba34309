//! Shell command execution and the terminal registry.
//!
//! Commands run foreground relative to their own task but are registered
//! so any task (or the user, through `kill_terminal`) can terminate them.
//! Destructive commands are flagged protected so unattended mode still
//! routes them through interactive approval.

use std::collections::HashMap;
use std::process::Stdio;
use std::time::Duration;

use serde_json::json;
use tokio::process::Command;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::error::ToolError;
use crate::protocol::ToolInvocation;
use crate::transcript::ToolResultContent;

use super::command_safety::command_is_destructive;
use super::context::ToolContext;
use super::ToolOutcome;

const MAX_OUTPUT_BYTES: usize = 100_000;

#[derive(Debug, Clone)]
struct RunningTerminal {
    command: String,
    kill: CancellationToken,
}

/// Registry of commands currently running across all tasks. Shared by
/// reference; entries are removed when their command completes.
#[derive(Default)]
pub struct TerminalRegistry {
    inner: tokio::sync::Mutex<HashMap<String, RunningTerminal>>,
}

impl TerminalRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    async fn register(&self, command: &str) -> (String, CancellationToken) {
        let id = Uuid::new_v4().to_string();
        let kill = CancellationToken::new();
        self.inner.lock().await.insert(
            id.clone(),
            RunningTerminal {
                command: command.to_string(),
                kill: kill.clone(),
            },
        );
        (id, kill)
    }

    async fn release(&self, id: &str) {
        self.inner.lock().await.remove(id);
    }

    /// Signal termination of a running command. Returns the command line
    /// it was started with, or `None` for an unknown/finished id.
    pub async fn kill(&self, id: &str) -> Option<String> {
        let terminal = self.inner.lock().await.remove(id)?;
        terminal.kill.cancel();
        Some(terminal.command)
    }

    pub async fn running(&self) -> Vec<(String, String)> {
        self.inner
            .lock()
            .await
            .iter()
            .map(|(id, terminal)| (id.clone(), terminal.command.clone()))
            .collect()
    }
}

pub(crate) async fn execute_command(
    ctx: &mut ToolContext,
    invocation: &ToolInvocation,
) -> Result<ToolOutcome, ToolError> {
    let command_line = invocation
        .param_text("command")
        .unwrap_or_default()
        .to_string();
    if command_line.trim().is_empty() {
        return Err(ToolError::validation("Command must not be empty".to_string()));
    }
    let cwd = match invocation.param_text("cwd") {
        Some(rel) => ctx.workspace.resolve_readable(rel)?,
        None => ctx.workspace.root().to_path_buf(),
    };
    let timeout_secs = match invocation.param_text("timeout_secs") {
        Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
            ToolError::validation(format!("Invalid timeout '{raw}'; expected seconds"))
        })?,
        None => ctx.settings.command_timeout_secs,
    };

    let protected = command_is_destructive(&command_line);
    let decision = ctx
        .ask_approval(
            &invocation.tool_name,
            json!({
                "tool": "execute_command",
                "command": command_line.clone(),
                "cwd": cwd.display().to_string(),
                "destructive": protected,
            }),
            protected,
        )
        .await?;
    if !decision.approved() {
        return Ok(ToolOutcome::denied(decision));
    }
    ctx.check_cancelled()?;

    let (terminal_id, kill) = ctx.terminals.register(&command_line).await;
    let result = run_with_limits(
        &command_line,
        &cwd,
        Duration::from_secs(timeout_secs),
        &ctx.cancel,
        &kill,
        &terminal_id,
    )
    .await;
    ctx.terminals.release(&terminal_id).await;
    result
}

async fn run_with_limits(
    command_line: &str,
    cwd: &std::path::Path,
    timeout: Duration,
    cancel: &CancellationToken,
    kill: &CancellationToken,
    terminal_id: &str,
) -> Result<ToolOutcome, ToolError> {
    let child = Command::new("/bin/sh")
        .arg("-c")
        .arg(command_line)
        .current_dir(cwd)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true)
        .spawn()
        .map_err(|err| ToolError::execution(format!("cannot spawn command: {err}")))?;

    // Dropping the wait future drops the child, and kill_on_drop reaps it.
    tokio::select! {
        _ = cancel.cancelled() => Err(ToolError::Cancelled),
        _ = kill.cancelled() => Ok(ToolOutcome::Success(ToolResultContent::text(format!(
            "Command was terminated via kill_terminal (terminal {terminal_id})."
        )))),
        _ = tokio::time::sleep(timeout) => Ok(ToolOutcome::Success(ToolResultContent::text(
            format!("Command timed out after {}s and was killed.", timeout.as_secs()),
        ))),
        output = child.wait_with_output() => {
            let output = output
                .map_err(|err| ToolError::execution(format!("command failed to run: {err}")))?;
            Ok(ToolOutcome::Success(ToolResultContent::text(render_output(
                command_line,
                &output,
            ))))
        }
    }
}

fn render_output(command_line: &str, output: &std::process::Output) -> String {
    let mut out = String::new();
    let status = output
        .status
        .code()
        .map(|code| code.to_string())
        .unwrap_or_else(|| "terminated by signal".to_string());
    out.push_str(&format!("$ {command_line}\nexit status: {status}\n"));
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    if !stdout.trim().is_empty() {
        out.push_str("\nstdout:\n");
        out.push_str(&truncate(&stdout));
    }
    if !stderr.trim().is_empty() {
        out.push_str("\nstderr:\n");
        out.push_str(&truncate(&stderr));
    }
    out
}

fn truncate(text: &str) -> String {
    if text.len() <= MAX_OUTPUT_BYTES {
        return text.to_string();
    }
    let mut cut = MAX_OUTPUT_BYTES;
    while !text.is_char_boundary(cut) {
        cut -= 1;
    }
    format!(
        "{}\n(output truncated, {} bytes total)",
        &text[..cut],
        text.len()
    )
}

pub(crate) async fn kill_terminal(
    ctx: &mut ToolContext,
    invocation: &ToolInvocation,
) -> Result<ToolOutcome, ToolError> {
    let terminal_id = invocation
        .param_text("terminal_id")
        .unwrap_or_default()
        .to_string();

    let decision = ctx
        .ask_approval(
            &invocation.tool_name,
            json!({"tool": "kill_terminal", "terminal_id": terminal_id.clone()}),
            false,
        )
        .await?;
    if !decision.approved() {
        return Ok(ToolOutcome::denied(decision));
    }

    match ctx.terminals.kill(&terminal_id).await {
        Some(command) => Ok(ToolOutcome::Success(ToolResultContent::text(format!(
            "Terminated '{command}' (terminal {terminal_id})."
        )))),
        None => Err(ToolError::validation(format!(
            "No running terminal with id '{terminal_id}'"
        ))),
    }
}
