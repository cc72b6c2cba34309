//! Collaborator seams for tool bodies the core does not own.
//!
//! Semantic search, browser automation, MCP routing, instruction-driven
//! edits, and sub-agent spawning are host capabilities. Each is an async
//! trait the host wires into [`ExternalDeps`]; the corresponding tool
//! bodies here are thin adapters that validate, gate on approval, and
//! translate results into transcript content. Availability predicates in
//! the catalog keep a tool out of the model's reach when its provider is
//! absent, so a missing provider at execution time is an environment
//! fault, not a model mistake.

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::error::ToolError;
use crate::protocol::{ParamValue, ToolInvocation};
use crate::transcript::ToolResultContent;

use super::context::ToolContext;
use super::ToolOutcome;

/// Queryable semantic index over the workspace.
#[async_trait]
pub trait CodeIndex: Send + Sync {
    async fn search(&self, query: &str, path_filter: Option<&str>)
        -> anyhow::Result<Vec<IndexHit>>;
}

#[derive(Debug, Clone)]
pub struct IndexHit {
    pub path: String,
    pub score: f32,
    pub snippet: String,
}

/// Driver for the host's controlled browser session.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn perform(&self, command: BrowserCommand) -> anyhow::Result<BrowserObservation>;
}

#[derive(Debug, Clone)]
pub struct BrowserCommand {
    pub action: String,
    pub url: Option<String>,
    pub coordinate: Option<String>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct BrowserObservation {
    pub logs: String,
    pub screenshot: Option<Vec<u8>>,
}

/// Router to configured MCP servers.
#[async_trait]
pub trait McpRouter: Send + Sync {
    async fn call_tool(
        &self,
        server: &str,
        tool: &str,
        arguments: Option<Value>,
    ) -> anyhow::Result<Value>;
}

/// Instruction-driven whole-file rewrite service.
#[async_trait]
pub trait FastApplyProvider: Send + Sync {
    async fn rewrite(
        &self,
        original: &str,
        instructions: &str,
        code_edit: &str,
    ) -> anyhow::Result<String>;
}

#[derive(Debug, Clone)]
pub struct SubtaskRequest {
    pub mode_slug: Option<String>,
    pub message: String,
}

/// Spawns a bounded child task and resolves with its completion summary.
#[async_trait]
pub trait SubagentSpawner: Send + Sync {
    async fn run_subtask(&self, request: SubtaskRequest) -> anyhow::Result<String>;
}

/// Host-provided collaborator bundle. All entries optional; the catalog's
/// availability predicates and per-tool checks keep absent providers from
/// being reachable.
#[derive(Default)]
pub struct ExternalDeps {
    pub index: Option<std::sync::Arc<dyn CodeIndex>>,
    pub browser: Option<std::sync::Arc<dyn BrowserDriver>>,
    pub mcp: Option<std::sync::Arc<dyn McpRouter>>,
    pub fast_apply: Option<std::sync::Arc<dyn FastApplyProvider>>,
    pub subagents: Option<std::sync::Arc<dyn SubagentSpawner>>,
}

pub(crate) async fn codebase_search(
    ctx: &mut ToolContext,
    invocation: &ToolInvocation,
) -> Result<ToolOutcome, ToolError> {
    let query = invocation.param_text("query").unwrap_or_default().to_string();
    let path_filter = invocation.param_text("path").map(str::to_string);
    let index = ctx
        .deps
        .index
        .clone()
        .ok_or_else(|| ToolError::execution("semantic index is not available"))?;

    let decision = ctx
        .ask_approval(
            &invocation.tool_name,
            json!({"tool": "codebase_search", "query": query.clone(), "path": path_filter.clone()}),
            false,
        )
        .await?;
    if !decision.approved() {
        return Ok(ToolOutcome::denied(decision));
    }

    let hits = index
        .search(&query, path_filter.as_deref())
        .await
        .map_err(|err| ToolError::execution(format!("index query failed: {err:#}")))?;
    if hits.is_empty() {
        return Ok(ToolOutcome::Success(ToolResultContent::text(format!(
            "No results found for '{query}'."
        ))));
    }
    let mut out = String::new();
    for hit in &hits {
        out.push_str(&format!("{} (score {:.2})\n{}\n\n", hit.path, hit.score, hit.snippet));
    }
    Ok(ToolOutcome::Success(ToolResultContent::text(
        out.trim_end().to_string(),
    )))
}

pub(crate) async fn browser_action(
    ctx: &mut ToolContext,
    invocation: &ToolInvocation,
) -> Result<ToolOutcome, ToolError> {
    let command = BrowserCommand {
        action: invocation.param_text("action").unwrap_or_default().to_string(),
        url: invocation.param_text("url").map(str::to_string),
        coordinate: invocation.param_text("coordinate").map(str::to_string),
        text: invocation.param_text("text").map(str::to_string),
    };
    let driver = ctx
        .deps
        .browser
        .clone()
        .ok_or_else(|| ToolError::execution("browser driver is not available"))?;

    let decision = ctx
        .ask_approval(
            &invocation.tool_name,
            json!({
                "tool": "browser_action",
                "action": command.action.clone(),
                "url": command.url.clone(),
            }),
            false,
        )
        .await?;
    if !decision.approved() {
        return Ok(ToolOutcome::denied(decision));
    }

    let observation = driver
        .perform(command)
        .await
        .map_err(|err| ToolError::execution(format!("browser action failed: {err:#}")))?;
    Ok(ToolOutcome::Success(ToolResultContent::text(
        observation.logs,
    )))
}

pub(crate) async fn use_mcp_tool(
    ctx: &mut ToolContext,
    invocation: &ToolInvocation,
) -> Result<ToolOutcome, ToolError> {
    let server = invocation
        .param_text("server_name")
        .unwrap_or_default()
        .to_string();
    let tool = invocation
        .param_text("tool_name")
        .unwrap_or_default()
        .to_string();
    let arguments = match invocation.param("arguments") {
        Some(ParamValue::Structured(value)) => Some(value.clone()),
        Some(ParamValue::Text(raw)) => Some(
            serde_json::from_str(raw).map_err(|err| {
                ToolError::validation(format!("'arguments' is not valid JSON: {err}"))
            })?,
        ),
        _ => None,
    };
    let router = ctx
        .deps
        .mcp
        .clone()
        .ok_or_else(|| ToolError::execution("no MCP servers are configured"))?;

    let decision = ctx
        .ask_approval(
            &invocation.tool_name,
            json!({
                "tool": "use_mcp_tool",
                "server": server.clone(),
                "mcp_tool": tool.clone(),
                "arguments": arguments.clone(),
            }),
            false,
        )
        .await?;
    if !decision.approved() {
        return Ok(ToolOutcome::denied(decision));
    }

    let result = router
        .call_tool(&server, &tool, arguments)
        .await
        .map_err(|err| ToolError::execution(format!("MCP call failed: {err:#}")))?;
    let rendered = match result {
        Value::String(text) => text,
        other => serde_json::to_string_pretty(&other)
            .map_err(|err| ToolError::execution(err.to_string()))?,
    };
    Ok(ToolOutcome::Success(ToolResultContent::text(rendered)))
}
