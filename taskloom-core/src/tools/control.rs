//! Conversational control tools, available in every mode.

use serde_json::json;

use crate::approval::ApprovalResponse;
use crate::error::ToolError;
use crate::protocol::ToolInvocation;
use crate::transcript::ToolResultContent;

use super::collaborators::SubtaskRequest;
use super::context::ToolContext;
use super::ToolOutcome;

/// Relay a clarifying question to the user and return their answer as the
/// tool result. The approval gate doubles as the question channel: its
/// feedback text is the answer.
pub(crate) async fn ask_followup_question(
    ctx: &mut ToolContext,
    invocation: &ToolInvocation,
) -> Result<ToolOutcome, ToolError> {
    let question = invocation
        .param_text("question")
        .unwrap_or_default()
        .to_string();
    let suggestions = invocation.param_many("suggest");

    let decision = ctx
        .ask_approval(
            &invocation.tool_name,
            json!({
                "tool": "ask_followup_question",
                "question": question,
                "suggestions": suggestions,
            }),
            false,
        )
        .await?;

    let answer_text = decision
        .feedback_text
        .as_deref()
        .map(str::trim)
        .filter(|text| !text.is_empty())
        .map(str::to_string);
    let answer = match answer_text {
        Some(text) => text,
        None if decision.response == ApprovalResponse::No => {
            return Ok(ToolOutcome::denied(decision));
        }
        None => "The user did not provide an answer.".to_string(),
    };
    Ok(ToolOutcome::Success(ToolResultContent::text(format!(
        "<answer>\n{answer}\n</answer>"
    ))))
}

/// Signal that the task is finished. Terminal for the task loop.
pub(crate) async fn attempt_completion(
    _ctx: &mut ToolContext,
    invocation: &ToolInvocation,
) -> Result<ToolOutcome, ToolError> {
    let summary = invocation
        .param_text("result")
        .unwrap_or_default()
        .to_string();
    Ok(ToolOutcome::Completed { summary })
}

/// Request a different mode for subsequent turns. Applied by the task
/// loop, which owns the current-mode state.
pub(crate) async fn switch_mode(
    ctx: &mut ToolContext,
    invocation: &ToolInvocation,
) -> Result<ToolOutcome, ToolError> {
    let slug = invocation
        .param_text("mode_slug")
        .unwrap_or_default()
        .to_string();
    let reason = invocation.param_text("reason").unwrap_or_default().to_string();

    let Some(mode) = ctx.modes.get(&slug) else {
        let known: Vec<&str> = ctx.modes.iter().map(|mode| mode.slug.as_str()).collect();
        return Err(ToolError::validation(format!(
            "Unknown mode '{slug}'; available modes: {}",
            known.join(", ")
        )));
    };
    let mode_name = mode.name.clone();

    ctx.request_mode(slug.as_str());
    let mut message = format!("Switched to mode '{mode_name}'.");
    if !reason.is_empty() {
        message.push_str(&format!(" Reason: {reason}"));
    }
    Ok(ToolOutcome::Success(ToolResultContent::text(message)))
}

/// Spawn a bounded sub-agent task and report its completion summary.
pub(crate) async fn new_task(
    ctx: &mut ToolContext,
    invocation: &ToolInvocation,
) -> Result<ToolOutcome, ToolError> {
    let message = invocation
        .param_text("message")
        .unwrap_or_default()
        .to_string();
    let mode_slug = invocation.param_text("mode").map(str::to_string);
    let spawner = ctx
        .deps
        .subagents
        .clone()
        .ok_or_else(|| ToolError::execution("sub-agent runtime is not configured"))?;

    let decision = ctx
        .ask_approval(
            &invocation.tool_name,
            json!({
                "tool": "new_task",
                "mode": mode_slug.clone(),
                "message": message.clone(),
            }),
            false,
        )
        .await?;
    if !decision.approved() {
        return Ok(ToolOutcome::denied(decision));
    }
    ctx.check_cancelled()?;

    let request = SubtaskRequest {
        mode_slug,
        message,
    };
    let summary = tokio::select! {
        _ = ctx.cancel.cancelled() => return Err(ToolError::Cancelled),
        summary = spawner.run_subtask(request) => summary
            .map_err(|err| ToolError::execution(format!("sub-task failed: {err:#}")))?,
    };
    Ok(ToolOutcome::Success(ToolResultContent::text(format!(
        "Subtask completed:\n{summary}"
    ))))
}
