//! Write (create or overwrite) a workspace file.
//!
//! The write is staged: nothing touches disk until approval, and a
//! cancellation racing the write restores the captured snapshot so the
//! file is byte-identical to its pre-call state.

use serde_json::json;

use crate::error::ToolError;
use crate::protocol::ToolInvocation;
use crate::transcript::ToolResultContent;

use super::context::{StagedEdit, ToolContext};
use super::ToolOutcome;

pub(crate) async fn execute(
    ctx: &mut ToolContext,
    invocation: &ToolInvocation,
) -> Result<ToolOutcome, ToolError> {
    let rel_path = invocation.param_text("path").unwrap_or_default().to_string();
    let content = invocation
        .param_text("content")
        .unwrap_or_default()
        .to_string();
    let path = ctx.workspace.resolve_writable(&rel_path)?;

    let _guard = ctx.edits.lock(&path).await;
    let exists = path.exists();

    let decision = ctx
        .ask_approval(
            &invocation.tool_name,
            json!({
                "tool": "write_to_file",
                "path": rel_path.clone(),
                "overwrite": exists,
                "content": content.clone(),
            }),
            false,
        )
        .await?;
    if !decision.approved() {
        return Ok(ToolOutcome::denied(decision));
    }
    ctx.check_cancelled()?;

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent)
            .await
            .map_err(|err| ToolError::execution(format!("cannot create '{rel_path}': {err}")))?;
    }
    let staged = StagedEdit::capture(&path).await?;
    tokio::fs::write(&path, &content)
        .await
        .map_err(|err| ToolError::execution(format!("cannot write '{rel_path}': {err}")))?;

    if ctx.cancel.is_cancelled() {
        staged.revert().await?;
        return Err(ToolError::Cancelled);
    }

    ctx.mark_file_edited();
    let verb = if exists { "updated" } else { "created" };
    Ok(ToolOutcome::Success(ToolResultContent::text(format!(
        "File '{rel_path}' {verb} ({} bytes).",
        content.len()
    ))))
}
