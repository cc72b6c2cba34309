//! Validation and coercion for natively-transported tool calls.
//!
//! The provider layer has already lexed the call into `{id, name,
//! arguments}`; this module checks the argument bag against the tool's
//! parameter schema and coerces string-typed numeric and boolean fields,
//! which smaller models emit routinely.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::catalog::{ParamKind, ParamSpec, ToolCatalog};
use crate::error::{missing_param_error, ToolError};

use super::{ParamValue, ToolInvocation};

/// A structured tool call as delivered by the model-provider transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NativeToolCall {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub arguments: Value,
}

/// Validate a native call against the catalog and produce an invocation.
pub fn validate_call(
    catalog: &ToolCatalog,
    call: &NativeToolCall,
) -> Result<ToolInvocation, ToolError> {
    let definition = catalog.get(&call.name).ok_or_else(|| {
        ToolError::validation(format!("Unknown tool '{}'", call.name))
    })?;

    let args = match &call.arguments {
        Value::Object(map) => map.clone(),
        Value::Null => serde_json::Map::new(),
        other => {
            return Err(ToolError::Parse {
                tool: Some(call.name.clone()),
                message: format!("arguments must be an object, got {other}"),
            });
        }
    };

    let mut params = IndexMap::new();
    for spec in definition.params {
        match args.get(spec.name) {
            None => {
                if spec.required {
                    return Err(missing_param_error(&call.name, spec.name));
                }
            }
            Some(value) => {
                let coerced = coerce(&call.name, spec, value)?;
                params.insert(spec.name.to_string(), coerced);
            }
        }
    }

    // Unrecognized arguments pass through untouched so tool bodies (and
    // transcripts) can still see what the model actually sent.
    for (name, value) in &args {
        if !params.contains_key(name) && definition.params.iter().all(|spec| spec.name != name) {
            tracing::debug!(tool = %call.name, param = %name, "unrecognized tool argument");
            params.insert(name.clone(), json_to_param(value));
        }
    }

    Ok(ToolInvocation {
        tool_name: call.name.clone(),
        params,
        call_id: Some(call.id.clone()),
        partial: false,
    })
}

fn json_to_param(value: &Value) -> ParamValue {
    match value {
        Value::String(text) => ParamValue::Text(text.clone()),
        other => ParamValue::Structured(other.clone()),
    }
}

fn coerce(tool: &str, spec: &ParamSpec, value: &Value) -> Result<ParamValue, ToolError> {
    match spec.kind {
        ParamKind::String => match value {
            Value::String(text) => Ok(ParamValue::Text(text.clone())),
            Value::Number(n) => Ok(ParamValue::Text(n.to_string())),
            Value::Bool(b) => Ok(ParamValue::Text(b.to_string())),
            other => Err(type_error(tool, spec.name, "a string", other)),
        },
        ParamKind::Integer => match value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(ParamValue::Text(n.to_string())),
            Value::String(text) => match text.trim().parse::<i64>() {
                Ok(parsed) => Ok(ParamValue::Text(parsed.to_string())),
                Err(_) => Err(type_error(tool, spec.name, "an integer", value)),
            },
            other => Err(type_error(tool, spec.name, "an integer", other)),
        },
        ParamKind::Boolean => match value {
            Value::Bool(b) => Ok(ParamValue::Text(b.to_string())),
            Value::String(text) => match text.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(ParamValue::Text("true".into())),
                "false" => Ok(ParamValue::Text("false".into())),
                _ => Err(type_error(tool, spec.name, "a boolean", value)),
            },
            other => Err(type_error(tool, spec.name, "a boolean", other)),
        },
        ParamKind::Enum(allowed) => match value {
            Value::String(text) if allowed.contains(&text.as_str()) => {
                Ok(ParamValue::Text(text.clone()))
            }
            other => Err(ToolError::validation(format!(
                "Parameter '{}' of tool '{tool}' must be one of {allowed:?}, got {other}",
                spec.name
            ))),
        },
        ParamKind::LineRanges => parse_line_ranges(tool, spec.name, value),
        ParamKind::Structured => Ok(ParamValue::Structured(value.clone())),
    }
}

fn type_error(tool: &str, param: &str, expected: &str, got: &Value) -> ToolError {
    ToolError::validation(format!(
        "Parameter '{param}' of tool '{tool}' must be {expected}, got {got}"
    ))
}

/// Accepts `"12-40"`, `"12"`, an array of such strings, or an array of
/// `{start, end}` objects. Normalizes to a JSON array of `[start, end]`
/// pairs, 1-based inclusive.
fn parse_line_ranges(tool: &str, param: &str, value: &Value) -> Result<ParamValue, ToolError> {
    let entries: Vec<&Value> = match value {
        Value::Array(items) => items.iter().collect(),
        single => vec![single],
    };
    let mut ranges = Vec::with_capacity(entries.len());
    for entry in entries {
        let (start, end) = match entry {
            Value::String(text) => parse_range_text(text).ok_or_else(|| {
                ToolError::validation(format!(
                    "Parameter '{param}' of tool '{tool}' has a malformed line range '{text}'"
                ))
            })?,
            Value::Object(map) => {
                let start = map.get("start").and_then(Value::as_u64);
                let end = map.get("end").and_then(Value::as_u64);
                match (start, end) {
                    (Some(start), Some(end)) => (start, end),
                    _ => {
                        return Err(ToolError::validation(format!(
                            "Parameter '{param}' of tool '{tool}' has a malformed line range {entry}"
                        )));
                    }
                }
            }
            other => {
                return Err(ToolError::validation(format!(
                    "Parameter '{param}' of tool '{tool}' has a malformed line range {other}"
                )));
            }
        };
        if start == 0 || end < start {
            return Err(ToolError::validation(format!(
                "Parameter '{param}' of tool '{tool}' has an invalid line range {start}-{end}"
            )));
        }
        ranges.push(Value::Array(vec![start.into(), end.into()]));
    }
    Ok(ParamValue::Structured(Value::Array(ranges)))
}

fn parse_range_text(text: &str) -> Option<(u64, u64)> {
    let text = text.trim();
    match text.split_once('-') {
        Some((start, end)) => {
            let start = start.trim().parse().ok()?;
            let end = end.trim().parse().ok()?;
            Some((start, end))
        }
        None => {
            let line = text.parse().ok()?;
            Some((line, line))
        }
    }
}
