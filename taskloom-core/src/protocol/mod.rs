//! Tool-call protocols: detection, locking, and invocation parsing.
//!
//! Two transports exist. The native protocol delivers structured
//! `{id, name, arguments}` objects from the provider layer; the tagged-text
//! protocol embeds calls as XML-ish tags in the model's free-form output
//! and must be lexically extracted, tolerating partial input while the
//! model is still streaming.

pub mod detector;
pub mod native;
pub mod xml;

pub use detector::{detect_from_history, resolve_protocol, ToolProtocol};
pub use native::NativeToolCall;

use indexmap::IndexMap;
use serde_json::{Map, Value};

/// A single parameter value as extracted from either transport.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    Text(String),
    /// Repeated sibling tags of the same name (array-valued parameters).
    Many(Vec<String>),
    Structured(Value),
}

impl ParamValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Text(text) => Value::String(text.clone()),
            Self::Many(items) => Value::Array(
                items.iter().map(|item| Value::String(item.clone())).collect(),
            ),
            Self::Structured(value) => value.clone(),
        }
    }

    fn push(&mut self, item: String) {
        match self {
            Self::Text(existing) => {
                *self = Self::Many(vec![std::mem::take(existing), item]);
            }
            Self::Many(items) => items.push(item),
            Self::Structured(_) => {}
        }
    }
}

/// Transient per-turn value describing one candidate tool call.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolInvocation {
    pub tool_name: String,
    pub params: IndexMap<String, ParamValue>,
    /// Present iff the call arrived over the native transport.
    pub call_id: Option<String>,
    /// True while the model is still streaming this call.
    pub partial: bool,
}

impl ToolInvocation {
    pub fn param(&self, name: &str) -> Option<&ParamValue> {
        self.params.get(name)
    }

    pub fn param_text(&self, name: &str) -> Option<&str> {
        self.params.get(name).and_then(ParamValue::as_text)
    }

    /// All values supplied for a repeatable parameter.
    pub fn param_many(&self, name: &str) -> Vec<&str> {
        match self.params.get(name) {
            Some(ParamValue::Text(text)) => vec![text.as_str()],
            Some(ParamValue::Many(items)) => items.iter().map(String::as_str).collect(),
            _ => Vec::new(),
        }
    }

    /// JSON view of the parameter bag for transcript tool-use blocks and
    /// approval previews.
    pub fn input_value(&self) -> Value {
        let mut map = Map::new();
        for (name, value) in &self.params {
            map.insert(name.clone(), value.to_value());
        }
        Value::Object(map)
    }
}

/// Result of feeding one (possibly growing) chunk of model output to the
/// parser.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    Invocation(ToolInvocation),
    /// Streaming input ended before a tool call could be identified.
    NeedMoreInput,
    /// A complete turn arrived with no tool call in it.
    NoToolCall,
}
