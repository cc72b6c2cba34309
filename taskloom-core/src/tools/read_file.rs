//! Read a workspace file, optionally restricted to line ranges.

use serde_json::{json, Value};

use crate::error::ToolError;
use crate::protocol::{ParamValue, ToolInvocation};
use crate::transcript::ToolResultContent;

use super::context::ToolContext;
use super::ToolOutcome;

const MAX_READ_BYTES: usize = 1_000_000;

pub(crate) async fn execute(
    ctx: &mut ToolContext,
    invocation: &ToolInvocation,
) -> Result<ToolOutcome, ToolError> {
    let rel_path = invocation.param_text("path").unwrap_or_default().to_string();
    let path = ctx.workspace.resolve_readable(&rel_path)?;
    let ranges = parse_ranges(invocation)?;

    let decision = ctx
        .ask_approval(
            &invocation.tool_name,
            json!({"tool": "read_file", "path": rel_path.clone(), "line_ranges": ranges.clone()}),
            false,
        )
        .await?;
    if !decision.approved() {
        return Ok(ToolOutcome::denied(decision));
    }
    ctx.check_cancelled()?;

    let metadata = tokio::fs::metadata(&path)
        .await
        .map_err(|err| ToolError::execution(format!("cannot stat '{rel_path}': {err}")))?;
    if metadata.len() as usize > MAX_READ_BYTES && ranges.is_empty() {
        return Err(ToolError::execution(format!(
            "'{rel_path}' is {} bytes, larger than the {MAX_READ_BYTES}-byte read limit; \
             request specific line ranges instead",
            metadata.len()
        )));
    }

    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|err| ToolError::execution(format!("cannot read '{rel_path}': {err}")))?;

    let rendered = if ranges.is_empty() {
        content
    } else {
        render_ranges(&content, &ranges)
    };
    Ok(ToolOutcome::Success(ToolResultContent::text(rendered)))
}

/// Line ranges arrive either normalized from the native validator
/// (`[[start, end], ...]`) or as raw `"12-40"` text from the tagged
/// protocol, possibly repeated.
fn parse_ranges(invocation: &ToolInvocation) -> Result<Vec<(usize, usize)>, ToolError> {
    let mut ranges = Vec::new();
    match invocation.param("line_ranges") {
        None => {}
        Some(ParamValue::Structured(Value::Array(pairs))) => {
            for pair in pairs {
                let start = pair.get(0).and_then(Value::as_u64);
                let end = pair.get(1).and_then(Value::as_u64);
                if let (Some(start), Some(end)) = (start, end) {
                    ranges.push((start as usize, end as usize));
                }
            }
        }
        Some(other) => {
            for raw in text_entries(other) {
                ranges.push(parse_range_text(raw)?);
            }
        }
    }
    Ok(ranges)
}

fn text_entries(value: &ParamValue) -> Vec<&str> {
    match value {
        ParamValue::Text(text) => vec![text.as_str()],
        ParamValue::Many(items) => items.iter().map(String::as_str).collect(),
        ParamValue::Structured(_) => Vec::new(),
    }
}

fn parse_range_text(raw: &str) -> Result<(usize, usize), ToolError> {
    let malformed =
        || ToolError::validation(format!("Malformed line range '{raw}'; expected 'start-end'"));
    let (start, end) = match raw.split_once('-') {
        Some((start, end)) => (
            start.trim().parse::<usize>().map_err(|_| malformed())?,
            end.trim().parse::<usize>().map_err(|_| malformed())?,
        ),
        None => {
            let line = raw.trim().parse::<usize>().map_err(|_| malformed())?;
            (line, line)
        }
    };
    if start == 0 || end < start {
        return Err(malformed());
    }
    Ok((start, end))
}

fn render_ranges(content: &str, ranges: &[(usize, usize)]) -> String {
    let lines: Vec<&str> = content.lines().collect();
    let mut out = String::new();
    for &(start, end) in ranges {
        let end = end.min(lines.len());
        if start > lines.len() {
            continue;
        }
        for (offset, line) in lines[start - 1..end].iter().enumerate() {
            out.push_str(&format!("{} | {}\n", start + offset, line));
        }
        out.push('\n');
    }
    out.trim_end().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn renders_numbered_ranges() {
        let content = "a\nb\nc\nd\ne\n";
        let rendered = render_ranges(content, &[(2, 3)]);
        assert_eq!(rendered, "2 | b\n3 | c");
    }

    #[test]
    fn range_past_eof_is_clamped() {
        let rendered = render_ranges("a\nb\n", &[(1, 10)]);
        assert_eq!(rendered, "1 | a\n2 | b");
    }

    #[test]
    fn rejects_inverted_text_ranges() {
        assert!(parse_range_text("9-3").is_err());
        assert!(parse_range_text("0-3").is_err());
        assert_eq!(parse_range_text("4").expect("single line"), (4, 4));
    }
}
