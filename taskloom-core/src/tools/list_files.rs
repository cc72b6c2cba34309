//! List workspace directory contents, optionally recursive.

use ignore::WalkBuilder;
use serde_json::json;

use taskloom_config::constants::IGNORE_FILE_NAME;

use crate::error::ToolError;
use crate::protocol::ToolInvocation;
use crate::transcript::ToolResultContent;

use super::context::ToolContext;
use super::ToolOutcome;

const MAX_ENTRIES: usize = 200;

pub(crate) async fn execute(
    ctx: &mut ToolContext,
    invocation: &ToolInvocation,
) -> Result<ToolOutcome, ToolError> {
    let rel_path = invocation.param_text("path").unwrap_or_default().to_string();
    let recursive = invocation
        .param_text("recursive")
        .map(|raw| raw.eq_ignore_ascii_case("true"))
        .unwrap_or(false);
    let dir = ctx.workspace.resolve_readable(&rel_path)?;

    let decision = ctx
        .ask_approval(
            &invocation.tool_name,
            json!({"tool": "list_files", "path": rel_path.clone(), "recursive": recursive}),
            false,
        )
        .await?;
    if !decision.approved() {
        return Ok(ToolOutcome::denied(decision));
    }
    ctx.check_cancelled()?;

    let root = ctx.workspace.root().to_path_buf();
    let listing = tokio::task::spawn_blocking(move || {
        let mut walker = WalkBuilder::new(&dir);
        walker.add_custom_ignore_filename(IGNORE_FILE_NAME);
        if !recursive {
            walker.max_depth(Some(1));
        }
        let mut entries = Vec::new();
        let mut truncated = false;
        for entry in walker.build().flatten() {
            if entry.depth() == 0 {
                continue;
            }
            if entries.len() >= MAX_ENTRIES {
                truncated = true;
                break;
            }
            let path = entry.path();
            let shown = path.strip_prefix(&root).unwrap_or(path);
            let mut line = shown.to_string_lossy().to_string();
            if entry.file_type().is_some_and(|ft| ft.is_dir()) {
                line.push('/');
            }
            entries.push(line);
        }
        entries.sort();
        (entries, truncated)
    })
    .await
    .map_err(|err| ToolError::execution(format!("listing task failed: {err}")))?;

    let (entries, truncated) = listing;
    let mut out = if entries.is_empty() {
        format!("Directory '{rel_path}' is empty.")
    } else {
        entries.join("\n")
    };
    if truncated {
        out.push_str(&format!("\n(truncated at {MAX_ENTRIES} entries)"));
    }
    Ok(ToolOutcome::Success(ToolResultContent::text(out)))
}
