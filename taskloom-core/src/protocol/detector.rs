//! Protocol resolution and history-based locking.
//!
//! A task resolves its protocol once and then keeps it for its whole
//! lifetime, including across host restarts: the transcript itself proves
//! which transport was used, because only native calls carry a call id.

use serde::{Deserialize, Serialize};

use taskloom_config::ProviderInfo;

use crate::transcript::{ContentBlock, Role, TranscriptMessage};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolProtocol {
    Native,
    Xml,
}

/// Precedence: an explicit task-level lock wins; then providers whose
/// transport cannot carry structured calls force the tagged-text protocol;
/// otherwise native is the default.
pub fn resolve_protocol(provider: &ProviderInfo, locked: Option<ToolProtocol>) -> ToolProtocol {
    if let Some(locked) = locked {
        return locked;
    }
    if !provider.supports_native_tools {
        return ToolProtocol::Xml;
    }
    ToolProtocol::Native
}

/// Scan a replayed transcript for the protocol its tool calls used.
///
/// Walks backward to the most recent assistant message containing a
/// tool-use block and inspects that message's last such block: a call id is
/// definitive proof of the native transport, its absence definitive proof
/// of the tagged-text transport. Returns `None` only when no tool call has
/// ever occurred.
pub fn detect_from_history(messages: &[TranscriptMessage]) -> Option<ToolProtocol> {
    for message in messages.iter().rev() {
        if message.role != Role::Assistant {
            continue;
        }
        if let Some(ContentBlock::ToolUse { id, .. }) = message.last_tool_use() {
            return Some(if id.is_some() {
                ToolProtocol::Native
            } else {
                ToolProtocol::Xml
            });
        }
    }
    None
}
