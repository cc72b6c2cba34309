//! Targeted search/replace edits against one workspace file.
//!
//! The diff payload is a sequence of blocks:
//!
//! ```text
//! <<<<<<< SEARCH
//! :start_line:42
//! exact lines to find
//! =======
//! replacement lines
//! >>>>>>> REPLACE
//! ```
//!
//! `:start_line:` is optional; without it the search text must occur
//! exactly once in the file. Occurrence-count mismatches are validation
//! errors so the model can correct itself instead of silently editing the
//! wrong site.

use serde_json::json;

use crate::error::ToolError;
use crate::protocol::ToolInvocation;
use crate::transcript::ToolResultContent;

use super::context::{StagedEdit, ToolContext};
use super::ToolOutcome;

const SEARCH_MARKER: &str = "<<<<<<< SEARCH";
const SEPARATOR: &str = "=======";
const REPLACE_MARKER: &str = ">>>>>>> REPLACE";

#[derive(Debug, PartialEq)]
struct DiffBlock {
    start_line: Option<usize>,
    search: String,
    replace: String,
}

pub(crate) async fn execute(
    ctx: &mut ToolContext,
    invocation: &ToolInvocation,
) -> Result<ToolOutcome, ToolError> {
    let rel_path = invocation.param_text("path").unwrap_or_default().to_string();
    let diff = invocation.param_text("diff").unwrap_or_default().to_string();
    let path = ctx.workspace.resolve_writable(&rel_path)?;

    let blocks = parse_blocks(&diff)?;
    if blocks.is_empty() {
        return Err(ToolError::validation(
            "Diff contains no SEARCH/REPLACE blocks".to_string(),
        ));
    }

    let _guard = ctx.edits.lock(&path).await;
    let original = tokio::fs::read_to_string(&path)
        .await
        .map_err(|err| ToolError::execution(format!("cannot read '{rel_path}': {err}")))?;

    // Validate every block against the current content before touching
    // disk, so a failing block cannot leave a half-applied edit.
    let mut updated = original.clone();
    for block in &blocks {
        updated = apply_block(&updated, block)?;
    }

    let decision = ctx
        .ask_approval(
            &invocation.tool_name,
            json!({
                "tool": "apply_diff",
                "path": rel_path.clone(),
                "blocks": blocks.len(),
                "diff": diff.clone(),
            }),
            false,
        )
        .await?;
    if !decision.approved() {
        return Ok(ToolOutcome::denied(decision));
    }
    ctx.check_cancelled()?;

    let staged = StagedEdit::capture(&path).await?;
    tokio::fs::write(&path, &updated)
        .await
        .map_err(|err| ToolError::execution(format!("cannot write '{rel_path}': {err}")))?;
    if ctx.cancel.is_cancelled() {
        staged.revert().await?;
        return Err(ToolError::Cancelled);
    }

    ctx.mark_file_edited();
    Ok(ToolOutcome::Success(ToolResultContent::text(format!(
        "Applied {} edit{} to '{rel_path}'.",
        blocks.len(),
        if blocks.len() == 1 { "" } else { "s" }
    ))))
}

fn parse_blocks(diff: &str) -> Result<Vec<DiffBlock>, ToolError> {
    let mut blocks = Vec::new();
    let mut lines = diff.lines().peekable();
    while let Some(line) = lines.next() {
        if line.trim() != SEARCH_MARKER {
            if line.trim().is_empty() {
                continue;
            }
            return Err(ToolError::validation(format!(
                "Malformed diff: expected '{SEARCH_MARKER}', found '{line}'"
            )));
        }

        let mut start_line = None;
        if let Some(next) = lines.peek() {
            if let Some(raw) = next.trim().strip_prefix(":start_line:") {
                start_line = Some(raw.trim().parse::<usize>().map_err(|_| {
                    ToolError::validation(format!("Malformed start line '{raw}'"))
                })?);
                lines.next();
            }
        }

        let mut search = Vec::new();
        let mut found_separator = false;
        for line in lines.by_ref() {
            if line.trim() == SEPARATOR {
                found_separator = true;
                break;
            }
            search.push(line);
        }
        if !found_separator {
            return Err(ToolError::validation(format!(
                "Malformed diff: missing '{SEPARATOR}' after search text"
            )));
        }

        let mut replace = Vec::new();
        let mut found_end = false;
        for line in lines.by_ref() {
            if line.trim() == REPLACE_MARKER {
                found_end = true;
                break;
            }
            replace.push(line);
        }
        if !found_end {
            return Err(ToolError::validation(format!(
                "Malformed diff: missing '{REPLACE_MARKER}'"
            )));
        }

        if search.is_empty() {
            return Err(ToolError::validation(
                "Diff block has an empty search text".to_string(),
            ));
        }
        blocks.push(DiffBlock {
            start_line,
            search: search.join("\n"),
            replace: replace.join("\n"),
        });
    }
    Ok(blocks)
}

fn apply_block(content: &str, block: &DiffBlock) -> Result<String, ToolError> {
    let occurrences: Vec<usize> = content
        .match_indices(&block.search)
        .map(|(index, _)| index)
        .collect();

    let target = match (occurrences.as_slice(), block.start_line) {
        ([], _) => {
            return Err(ToolError::validation(format!(
                "Search text not found in file:\n{}",
                block.search
            )));
        }
        ([single], None) => *single,
        (many, None) => {
            return Err(ToolError::validation(format!(
                "Search text matches {} locations; add a :start_line: hint to disambiguate",
                many.len()
            )));
        }
        (many, Some(start_line)) => *many
            .iter()
            .find(|&&index| line_of(content, index) == start_line)
            .ok_or_else(|| {
                ToolError::validation(format!(
                    "Search text does not match at line {start_line} \
                     (found at line{} {})",
                    if many.len() == 1 { "" } else { "s" },
                    many.iter()
                        .map(|&index| line_of(content, index).to_string())
                        .collect::<Vec<_>>()
                        .join(", ")
                ))
            })?,
    };

    let mut updated = String::with_capacity(content.len());
    updated.push_str(&content[..target]);
    updated.push_str(&block.replace);
    updated.push_str(&content[target + block.search.len()..]);
    Ok(updated)
}

/// 1-based line number of a byte offset.
fn line_of(content: &str, index: usize) -> usize {
    content[..index].bytes().filter(|&b| b == b'\n').count() + 1
}
