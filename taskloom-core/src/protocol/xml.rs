//! Streaming scanner for tool calls embedded as tagged text.
//!
//! The model's free-form output may contain at most one tool call per
//! turn, written as `<tool_name><param>value</param>...</tool_name>`.
//! Payloads are frequently verbatim source code, so this is deliberately
//! not an XML parser: nothing is entity-escaped, and a `<` inside a
//! parameter value is content unless it begins that parameter's exact
//! closing tag. The scanner is re-run over the accumulated text as chunks
//! stream in; `partial` decides whether an unterminated block is "not yet
//! an error" or malformed.

use indexmap::IndexMap;

use crate::catalog::ToolCatalog;
use crate::error::ToolError;

use super::{ParseOutcome, ToolInvocation};

/// Parameters whose payloads keep interior whitespace verbatim; only a
/// single wrapping newline (an artifact of tag formatting) is shed.
const VERBATIM_PARAMS: &[&str] = &["content", "diff", "code_edit"];

const MAX_TAG_NAME_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    /// Prose outside any tool block.
    Outside,
    /// After `<` at top level, accumulating a candidate tool name.
    InOpenTag,
    /// Inside a tool block, between parameter tags.
    InTool,
    /// After `<` inside a tool block, accumulating a parameter name or the
    /// tool's closing tag.
    InTagName { closing: bool },
    /// Accumulating a parameter value while matching its closing tag.
    InValue,
}

/// Scan one (possibly growing) chunk of model output for a tool call.
pub fn scan(text: &str, catalog: &ToolCatalog, partial: bool) -> Result<ParseOutcome, ToolError> {
    let mut state = State::Outside;
    let mut tag_buf = String::new();
    let mut tool_name: Option<String> = None;
    let mut params: IndexMap<String, super::ParamValue> = IndexMap::new();
    let mut param_name = String::new();
    let mut value_buf = String::new();
    let mut needle = String::new();
    let mut matched = 0usize;

    let invocation = |tool_name: &str,
                          params: &IndexMap<String, super::ParamValue>,
                          partial: bool| ToolInvocation {
        tool_name: tool_name.to_string(),
        params: params.clone(),
        call_id: None,
        partial,
    };

    for c in text.chars() {
        match state {
            State::Outside => {
                if c == '<' {
                    tag_buf.clear();
                    state = State::InOpenTag;
                }
            }
            State::InOpenTag => {
                if is_tag_name_char(c) && tag_buf.len() < MAX_TAG_NAME_LEN {
                    tag_buf.push(c);
                } else if c == '>' && catalog.contains(&tag_buf) {
                    tool_name = Some(tag_buf.clone());
                    state = State::InTool;
                } else if c == '<' {
                    // "a < b" style prose; retry from this bracket.
                    tag_buf.clear();
                } else {
                    state = State::Outside;
                }
            }
            State::InTool => {
                if c == '<' {
                    tag_buf.clear();
                    state = State::InTagName { closing: false };
                }
            }
            State::InTagName { closing } => {
                if c == '/' && !closing && tag_buf.is_empty() {
                    state = State::InTagName { closing: true };
                } else if is_tag_name_char(c) && tag_buf.len() < MAX_TAG_NAME_LEN {
                    tag_buf.push(c);
                } else if c == '>' {
                    if closing {
                        if Some(tag_buf.as_str()) == tool_name.as_deref() {
                            let name = tool_name.take().unwrap_or_default();
                            return Ok(ParseOutcome::Invocation(invocation(
                                &name, &params, false,
                            )));
                        }
                        // Stray closing tag; tolerate and keep scanning.
                        state = State::InTool;
                    } else {
                        param_name = tag_buf.clone();
                        value_buf.clear();
                        needle = format!("</{param_name}>");
                        matched = 0;
                        state = State::InValue;
                    }
                } else if c == '<' {
                    tag_buf.clear();
                    state = State::InTagName { closing: false };
                } else {
                    state = State::InTool;
                }
            }
            State::InValue => {
                let expected = needle.as_bytes()[matched] as char;
                if c == expected {
                    matched += 1;
                    if matched == needle.len() {
                        record_param(&mut params, &param_name, std::mem::take(&mut value_buf));
                        state = State::InTool;
                    }
                } else {
                    // The partially-matched closing tag turned out to be
                    // literal content. `<` only ever begins the needle, so
                    // restarting the match at this character is exact.
                    value_buf.push_str(&needle[..matched]);
                    if c == '<' {
                        matched = 1;
                    } else {
                        matched = 0;
                        value_buf.push(c);
                    }
                }
            }
        }
    }

    // Input exhausted without a complete tool block.
    match (tool_name, partial) {
        (None, true) => Ok(ParseOutcome::NeedMoreInput),
        (None, false) => Ok(ParseOutcome::NoToolCall),
        (Some(name), true) => {
            // Expose what we have so far for live preview, including the
            // parameter still being streamed.
            if state == State::InValue {
                value_buf.push_str(&needle[..matched]);
                record_param(&mut params, &param_name, value_buf);
            }
            Ok(ParseOutcome::Invocation(invocation(&name, &params, true)))
        }
        (Some(name), false) => Err(ToolError::Parse {
            tool: Some(name),
            message: "unterminated tool call block".into(),
        }),
    }
}

fn is_tag_name_char(c: char) -> bool {
    c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_'
}

fn record_param(
    params: &mut IndexMap<String, super::ParamValue>,
    name: &str,
    raw: String,
) {
    let cleaned = clean_value(name, raw);
    match params.get_mut(name) {
        Some(existing) => existing.push(cleaned),
        None => {
            params.insert(name.to_string(), super::ParamValue::Text(cleaned));
        }
    }
}

/// Most parameter values are identifiers or paths and get fully trimmed;
/// verbatim payloads only shed the newline that follows the opening tag
/// and the one that precedes the closing tag.
fn clean_value(name: &str, raw: String) -> String {
    if VERBATIM_PARAMS.contains(&name) {
        let mut s = raw.as_str();
        s = s.strip_prefix("\r\n").or_else(|| s.strip_prefix('\n')).unwrap_or(s);
        s = s.strip_suffix("\r\n").or_else(|| s.strip_suffix('\n')).unwrap_or(s);
        s.to_string()
    } else {
        raw.trim().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn catalog() -> ToolCatalog {
        ToolCatalog::builtin()
    }

    fn complete(text: &str) -> ToolInvocation {
        match scan(text, &catalog(), false).expect("parse") {
            ParseOutcome::Invocation(invocation) => invocation,
            other => panic!("expected invocation, got {other:?}"),
        }
    }

    #[test]
    fn parses_a_simple_call() {
        let invocation = complete("<read_file><path>src/a.ts</path></read_file>");
        assert_eq!(invocation.tool_name, "read_file");
        assert_eq!(invocation.param_text("path"), Some("src/a.ts"));
        assert!(invocation.call_id.is_none());
        assert!(!invocation.partial);
    }

    #[test]
    fn prose_around_the_call_is_ignored() {
        let invocation = complete(
            "I'll check that file first.\n\n<read_file><path>src/a.ts</path></read_file>\nDone.",
        );
        assert_eq!(invocation.tool_name, "read_file");
    }

    #[test]
    fn unknown_tags_are_plain_text() {
        let outcome = scan("<thinking>hmm</thinking> nothing else", &catalog(), false)
            .expect("no error");
        assert_eq!(outcome, ParseOutcome::NoToolCall);
    }

    #[test]
    fn streaming_chunks_resolve_only_at_the_end() {
        let chunks = ["<read_file><path>src/a", ".ts</path>", "</read_file>"];
        let mut text = String::new();

        text.push_str(chunks[0]);
        match scan(&text, &catalog(), true).expect("chunk 1") {
            ParseOutcome::Invocation(invocation) => {
                assert!(invocation.partial);
                assert_eq!(invocation.param_text("path"), Some("src/a"));
            }
            other => panic!("unexpected: {other:?}"),
        }

        text.push_str(chunks[1]);
        match scan(&text, &catalog(), true).expect("chunk 2") {
            ParseOutcome::Invocation(invocation) => assert!(invocation.partial),
            other => panic!("unexpected: {other:?}"),
        }

        text.push_str(chunks[2]);
        let invocation = complete(&text);
        assert_eq!(invocation.tool_name, "read_file");
        assert_eq!(invocation.param_text("path"), Some("src/a.ts"));
    }

    /// Feeding one character at a time converges to the one-shot parse.
    #[test]
    fn incremental_parse_matches_one_shot() {
        let full = "<write_to_file><path>x.txt</path><content>\nlet a = b < c;\n</content></write_to_file>";
        let one_shot = complete(full);

        let mut text = String::new();
        for (i, c) in full.chars().enumerate() {
            text.push(c);
            let last = i == full.chars().count() - 1;
            let outcome = scan(&text, &catalog(), !last).expect("never errors while streaming");
            if last {
                assert_eq!(outcome, ParseOutcome::Invocation(one_shot.clone()));
            }
        }
    }

    #[test]
    fn repeated_tags_collect_into_an_array() {
        let invocation = complete(
            "<read_file><path>a.rs</path><path>b.rs</path><path>c.rs</path></read_file>",
        );
        assert_eq!(invocation.param_many("path"), vec!["a.rs", "b.rs", "c.rs"]);
    }

    #[test]
    fn angle_brackets_inside_values_are_content() {
        let invocation = complete(
            "<write_to_file><path>t.html</path><content>\n<div class=\"a\">1 < 2</div>\n</content></write_to_file>",
        );
        assert_eq!(
            invocation.param_text("content"),
            Some("<div class=\"a\">1 < 2</div>")
        );
    }

    #[test]
    fn diff_markers_survive_verbatim() {
        let diff = "<<<<<<< SEARCH\nold\n=======\nnew\n>>>>>>> REPLACE";
        let text = format!("<apply_diff><path>a.rs</path><diff>\n{diff}\n</diff></apply_diff>");
        let invocation = complete(&text);
        assert_eq!(invocation.param_text("diff"), Some(diff));
    }

    #[test]
    fn unterminated_block_errors_with_tool_name_when_final() {
        let err = scan("<read_file><path>src/a.ts", &catalog(), false).expect_err("malformed");
        match err {
            ToolError::Parse { tool, .. } => assert_eq!(tool.as_deref(), Some("read_file")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn incomplete_prefix_needs_more_input_while_streaming() {
        assert_eq!(
            scan("Let me think. <rea", &catalog(), true).expect("streaming"),
            ParseOutcome::NeedMoreInput
        );
    }

    #[test]
    fn path_values_are_trimmed_but_content_keeps_interior_whitespace() {
        let invocation = complete(
            "<write_to_file><path>  x.txt  </path><content>\n  indented\n\n</content></write_to_file>",
        );
        assert_eq!(invocation.param_text("path"), Some("x.txt"));
        assert_eq!(invocation.param_text("content"), Some("  indented\n"));
    }

    #[test]
    fn first_complete_call_wins() {
        let invocation = complete(
            "<read_file><path>a.rs</path></read_file><list_files><path>.</path></list_files>",
        );
        assert_eq!(invocation.tool_name, "read_file");
    }
}
