//! Regex search across workspace files, ignore-rule aware.

use std::path::Path;

use glob::Pattern;
use ignore::WalkBuilder;
use regex::RegexBuilder;
use serde_json::json;

use taskloom_config::constants::IGNORE_FILE_NAME;

use crate::error::ToolError;
use crate::protocol::ToolInvocation;
use crate::transcript::ToolResultContent;

use super::context::ToolContext;
use super::ToolOutcome;

const MAX_RESULTS: usize = 100;
const MAX_LINE_LEN: usize = 300;
const MAX_FILE_BYTES: u64 = 2_000_000;

pub(crate) async fn execute(
    ctx: &mut ToolContext,
    invocation: &ToolInvocation,
) -> Result<ToolOutcome, ToolError> {
    let rel_path = invocation.param_text("path").unwrap_or_default().to_string();
    let pattern_text = invocation.param_text("regex").unwrap_or_default().to_string();
    let file_pattern = invocation.param_text("file_pattern").map(str::to_string);

    let dir = ctx.workspace.resolve_readable(&rel_path)?;
    let regex = RegexBuilder::new(&pattern_text)
        .size_limit(1 << 20)
        .build()
        .map_err(|err| ToolError::validation(format!("Invalid regex '{pattern_text}': {err}")))?;
    let file_glob = match &file_pattern {
        Some(raw) => Some(Pattern::new(raw).map_err(|err| {
            ToolError::validation(format!("Invalid file pattern '{raw}': {err}"))
        })?),
        None => None,
    };

    let decision = ctx
        .ask_approval(
            &invocation.tool_name,
            json!({
                "tool": "search_files",
                "path": rel_path,
                "regex": pattern_text.clone(),
                "file_pattern": file_pattern,
            }),
            false,
        )
        .await?;
    if !decision.approved() {
        return Ok(ToolOutcome::denied(decision));
    }
    ctx.check_cancelled()?;

    let root = ctx.workspace.root().to_path_buf();
    let results = tokio::task::spawn_blocking(move || {
        let mut matches = Vec::new();
        let mut truncated = false;
        let mut walker = WalkBuilder::new(&dir);
        walker.add_custom_ignore_filename(IGNORE_FILE_NAME);
        'files: for entry in walker.build().flatten() {
            let path = entry.path();
            if !entry.file_type().is_some_and(|ft| ft.is_file()) {
                continue;
            }
            if entry.metadata().map(|m| m.len() > MAX_FILE_BYTES).unwrap_or(true) {
                continue;
            }
            if let Some(glob) = &file_glob {
                if !matches_glob(glob, path, &root) {
                    continue;
                }
            }
            let Ok(content) = std::fs::read_to_string(path) else {
                continue; // binary or unreadable
            };
            for (index, line) in content.lines().enumerate() {
                if regex.is_match(line) {
                    if matches.len() >= MAX_RESULTS {
                        truncated = true;
                        break 'files;
                    }
                    let shown = path.strip_prefix(&root).unwrap_or(path);
                    matches.push(format!(
                        "{}:{}: {}",
                        shown.display(),
                        index + 1,
                        clip(line)
                    ));
                }
            }
        }
        (matches, truncated)
    })
    .await
    .map_err(|err| ToolError::execution(format!("search task failed: {err}")))?;

    let (matches, truncated) = results;
    let mut out = if matches.is_empty() {
        format!("No matches for '{pattern_text}'.")
    } else {
        matches.join("\n")
    };
    if truncated {
        out.push_str(&format!("\n(truncated at {MAX_RESULTS} matches)"));
    }
    Ok(ToolOutcome::Success(ToolResultContent::text(out)))
}

fn matches_glob(glob: &Pattern, path: &Path, root: &Path) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    glob.matches_path(relative)
        || path
            .file_name()
            .map(|name| glob.matches(&name.to_string_lossy()))
            .unwrap_or(false)
}

fn clip(line: &str) -> String {
    if line.len() <= MAX_LINE_LEN {
        return line.trim_end().to_string();
    }
    let mut cut = MAX_LINE_LEN;
    while !line.is_char_boundary(cut) {
        cut -= 1;
    }
    format!("{}…", &line[..cut])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clip_respects_char_boundaries() {
        let long = "α".repeat(400);
        let clipped = clip(&long);
        assert!(clipped.ends_with('…'));
        assert!(clipped.len() <= MAX_LINE_LEN + '…'.len_utf8());
    }

    #[test]
    fn glob_matches_relative_paths_and_file_names() {
        let glob = Pattern::new("*.rs").expect("pattern");
        let root = Path::new("/ws");
        assert!(matches_glob(&glob, Path::new("/ws/src/lib.rs"), root));
        assert!(!matches_glob(&glob, Path::new("/ws/src/lib.ts"), root));
    }
}
