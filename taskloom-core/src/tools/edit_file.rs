//! Instruction-driven file edit backed by the fast-apply provider.
//!
//! The provider receives the original file, the model's natural-language
//! instructions, and an abbreviated edit sketch, and returns the rewritten
//! file. Mutually exclusive with `apply_diff` via catalog availability.

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
    let instructions = invocation
        .param_text("instructions")
        .unwrap_or_default()
        .to_string();
    let code_edit = invocation
        .param_text("code_edit")
        .unwrap_or_default()
        .to_string();
    let path = ctx.workspace.resolve_writable(&rel_path)?;
    let provider = ctx
        .deps
        .fast_apply
        .clone()
        .ok_or_else(|| ToolError::execution("fast-apply provider is not available"))?;

    let _guard = ctx.edits.lock(&path).await;
    let original = tokio::fs::read_to_string(&path)
        .await
        .map_err(|err| ToolError::execution(format!("cannot read '{rel_path}': {err}")))?;

    ctx.check_cancelled()?;
    let rewritten = provider
        .rewrite(&original, &instructions, &code_edit)
        .await
        .map_err(|err| ToolError::execution(format!("fast-apply rewrite failed: {err:#}")))?;

    let decision = ctx
        .ask_approval(
            &invocation.tool_name,
            json!({
                "tool": "edit_file",
                "path": rel_path.clone(),
                "instructions": instructions,
                "content": rewritten.clone(),
            }),
            false,
        )
        .await?;
    if !decision.approved() {
        return Ok(ToolOutcome::denied(decision));
    }
    ctx.check_cancelled()?;

    let staged = StagedEdit::capture(&path).await?;
    tokio::fs::write(&path, &rewritten)
        .await
        .map_err(|err| ToolError::execution(format!("cannot write '{rel_path}': {err}")))?;
    if ctx.cancel.is_cancelled() {
        staged.revert().await?;
        return Err(ToolError::Cancelled);
    }

    ctx.mark_file_edited();
    Ok(ToolOutcome::Success(ToolResultContent::text(format!(
        "Applied instruction edit to '{rel_path}'."
    ))))
}
