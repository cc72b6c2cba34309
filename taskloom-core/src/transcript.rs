//! Conversation transcript model and the host-facing result sink.
//!
//! The engine keeps its own append-only copy of the transcript so that
//! protocol detection and turn reconciliation work without consulting the
//! host; the host mirrors the same data through [`TranscriptSink`] for
//! persistence and display. The block model deliberately preserves the one
//! bit the protocol detector depends on: whether a tool-use block carried a
//! call id.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    ToolUse {
        /// Present only for calls that arrived over the structured
        /// transport. Persistence must keep presence/absence verbatim.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        name: String,
        input: Value,
    },
    ToolResult {
        tool_name: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        call_id: Option<String>,
        content: String,
        #[serde(default)]
        is_error: bool,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TranscriptMessage {
    pub role: Role,
    pub blocks: Vec<ContentBlock>,
}

impl TranscriptMessage {
    pub fn assistant(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            blocks,
        }
    }

    pub fn user(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::User,
            blocks,
        }
    }

    pub fn user_text(text: impl Into<String>) -> Self {
        Self::user(vec![ContentBlock::Text { text: text.into() }])
    }

    /// Last tool-use block of this message, if any.
    pub fn last_tool_use(&self) -> Option<&ContentBlock> {
        self.blocks
            .iter()
            .rev()
            .find(|block| matches!(block, ContentBlock::ToolUse { .. }))
    }
}

/// Result payload pushed back into the transcript: a plain string or
/// provider-specific structured blocks.
#[derive(Debug, Clone, PartialEq)]
pub enum ToolResultContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl ToolResultContent {
    pub fn text(content: impl Into<String>) -> Self {
        Self::Text(content.into())
    }

    /// Flattened text view used for transcript blocks and logging.
    pub fn to_text(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Blocks(blocks) => blocks
                .iter()
                .filter_map(|block| match block {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect::<Vec<_>>()
                .join("\n"),
        }
    }
}

impl From<String> for ToolResultContent {
    fn from(text: String) -> Self {
        Self::Text(text)
    }
}

impl From<&str> for ToolResultContent {
    fn from(text: &str) -> Self {
        Self::Text(text.to_string())
    }
}

/// Host boundary for transcript effects. Implementations must not block;
/// the loop awaits them at its own suspension points.
#[async_trait]
pub trait TranscriptSink: Send + Sync {
    /// Append a tool result to the host-side transcript/UI.
    async fn push_tool_result(&self, tool_name: &str, content: &ToolResultContent);

    /// Surface an engine-level failure without throwing.
    async fn handle_error(&self, context: &str, error: &anyhow::Error);

    /// Streaming preview of a tool call still being produced by the model.
    /// Hosts that do not render live previews can keep the default no-op.
    async fn show_partial(&self, _tool_name: &str, _preview: &Value) {}
}

/// Sink that drops everything; used in tests and headless runs.
pub struct NullSink;

#[async_trait]
impl TranscriptSink for NullSink {
    async fn push_tool_result(&self, _tool_name: &str, _content: &ToolResultContent) {}

    async fn handle_error(&self, context: &str, error: &anyhow::Error) {
        tracing::warn!(context, %error, "unhandled engine error");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn tool_use_id_survives_serde_round_trip() {
        let message = TranscriptMessage::assistant(vec![
            ContentBlock::Text {
                text: "Reading the file".into(),
            },
            ContentBlock::ToolUse {
                id: None,
                name: "read_file".into(),
                input: json!({"path": "src/a.ts"}),
            },
        ]);
        let raw = serde_json::to_string(&message).expect("serialize");
        // Absence of an id must persist verbatim, not as `"id": null`.
        assert!(!raw.contains("\"id\""));
        let back: TranscriptMessage = serde_json::from_str(&raw).expect("deserialize");
        assert_eq!(back, message);
    }

    #[test]
    fn last_tool_use_picks_the_final_block() {
        let message = TranscriptMessage::assistant(vec![
            ContentBlock::ToolUse {
                id: Some("a".into()),
                name: "read_file".into(),
                input: json!({}),
            },
            ContentBlock::ToolUse {
                id: Some("b".into()),
                name: "list_files".into(),
                input: json!({}),
            },
        ]);
        match message.last_tool_use() {
            Some(ContentBlock::ToolUse { id, .. }) => assert_eq!(id.as_deref(), Some("b")),
            other => panic!("unexpected block: {other:?}"),
        }
    }
}
