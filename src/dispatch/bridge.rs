//! The dispatch bridge: one user message in, one [`ResponseEnvelope`] out.
//!
//! Per request the bridge moves through
//! `ValidatingInput -> FetchingCatalog -> SelectingTool -> Invoking`, and
//! stops at the first terminal state:
//!
//! - degraded (`mcp_disabled`, `mcp_unavailable`): no model call is made
//! - `no_tool_selected`: no invocation is attempted
//! - success, `mcp_connection_failed` or `tool_execution_failed`
//!
//! Each step runs at most once. Remote failures never escape as errors; the
//! only `Err` is [`BridgeError::EmptyInput`].

use std::{sync::Arc, time::Duration};

use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{BridgeError, ErrorKind};
use crate::llm::{LlmDriver, LlmRequest};
use crate::mcp::{CatalogStore, InvocationResult, ToolCatalog, TransportNegotiator};

use super::envelope::{ResponseEnvelope, SelectionDecision};
use super::extract::extract;
use super::heuristic::choose_heuristically;
use super::prompt::selection_messages;

/// Knobs the bridge reads from configuration.
#[derive(Debug, Clone)]
pub struct BridgeSettings {
    /// When false every query short-circuits to `mcp_disabled`.
    pub tools_enabled: bool,
    /// Temperature for the selection call.
    pub temperature: f32,
    /// Upper bound for the selection call.
    pub model_timeout: Duration,
}

impl Default for BridgeSettings {
    fn default() -> Self {
        Self {
            tools_enabled: true,
            temperature: 0.0,
            model_timeout: Duration::from_secs(60),
        }
    }
}

/// Orchestrates catalog lookup, tool selection and invocation.
#[derive(Clone)]
pub struct DispatchBridge {
    negotiator: Arc<TransportNegotiator>,
    catalog: Arc<CatalogStore>,
    llm: Arc<dyn LlmDriver>,
    settings: BridgeSettings,
}

impl std::fmt::Debug for DispatchBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DispatchBridge")
            .field("endpoint", &self.negotiator.endpoint())
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl DispatchBridge {
    pub fn new(
        negotiator: Arc<TransportNegotiator>,
        catalog: Arc<CatalogStore>,
        llm: Arc<dyn LlmDriver>,
        settings: BridgeSettings,
    ) -> Self {
        Self {
            negotiator,
            catalog,
            llm,
            settings,
        }
    }

    pub fn catalog(&self) -> &CatalogStore {
        &self.catalog
    }

    pub fn tools_enabled(&self) -> bool {
        self.settings.tools_enabled
    }

    /// Serve one chat message.
    pub async fn run_query(&self, user_text: &str) -> Result<ResponseEnvelope, BridgeError> {
        let user_text = user_text.trim();
        if user_text.is_empty() {
            return Err(BridgeError::EmptyInput);
        }

        let request_id = Uuid::new_v4().to_string();
        tracing::info!(
            name: "dispatch.query.received",
            request_id = %request_id,
            message_length = user_text.len(),
            "Processing query"
        );

        if !self.settings.tools_enabled {
            tracing::info!(request_id = %request_id, "tool use disabled, skipping dispatch");
            return Ok(ResponseEnvelope::failure(
                request_id,
                ErrorKind::McpDisabled,
                None,
                Some("Tool use is disabled in this deployment.".to_string()),
            ));
        }

        let catalog = self.catalog.get_tools(false).await;
        if catalog.is_empty() {
            tracing::warn!(
                name: "dispatch.degraded",
                request_id = %request_id,
                endpoint = %self.negotiator.endpoint(),
                "No tools available, returning degraded response"
            );
            return Ok(ResponseEnvelope::failure(
                request_id,
                ErrorKind::McpUnavailable,
                None,
                Some(format!(
                    "The tool server at {} is unavailable or exposes no tools. Please try again later.",
                    self.negotiator.endpoint()
                )),
            ));
        }

        let choice = self.select_tool(&request_id, user_text, &catalog).await;

        let Some(tool) = choice.tool.clone().filter(|t| catalog.contains(t)) else {
            let reason = match &choice.tool {
                Some(t) => BridgeError::SelectionInvalid(t.clone()).to_string(),
                None => "no tool was selected".to_string(),
            };
            tracing::info!(
                name: "dispatch.no_tool",
                request_id = %request_id,
                tool = ?choice.tool,
                reason = %reason,
                "No usable tool selected"
            );
            return Ok(ResponseEnvelope::failure(
                request_id,
                ErrorKind::NoToolSelected,
                Some(choice),
                None,
            )
            .with_available_tools(catalog.names()));
        };

        Ok(self.invoke(request_id, tool, choice).await)
    }

    /// Ask the model for a decision; fall back to keywords when its answer
    /// is missing or unusable.
    pub async fn select_tool(
        &self,
        request_id: &str,
        user_text: &str,
        catalog: &ToolCatalog,
    ) -> SelectionDecision {
        let req = LlmRequest {
            messages: selection_messages(catalog, user_text),
            temperature: self.settings.temperature,
            json_output: true,
        };

        let raw = match self.call_model(req).await {
            Ok(raw) => raw,
            Err(e) => {
                tracing::warn!(
                    name: "dispatch.model.failed",
                    request_id = %request_id,
                    error = %e,
                    "Model call failed, using keyword fallback"
                );
                return choose_heuristically(user_text).with_diagnostic(Some(e.to_string()));
            }
        };

        tracing::debug!(request_id = %request_id, raw = %raw, "Model output");

        if let Some(decision) = extract(&raw).as_ref().and_then(SelectionDecision::from_model_object)
        {
            tracing::info!(
                name: "dispatch.tool.selected",
                request_id = %request_id,
                tool = ?decision.tool,
                source = "model",
                "Tool selected"
            );
            return decision;
        }

        let decision = choose_heuristically(user_text);
        tracing::info!(
            name: "dispatch.tool.selected",
            request_id = %request_id,
            tool = ?decision.tool,
            source = "heuristic",
            "Model output unusable, tool selected by keywords"
        );
        decision
    }

    async fn call_model(&self, req: LlmRequest) -> Result<String, BridgeError> {
        match tokio::time::timeout(self.settings.model_timeout, self.llm.complete(req)).await {
            Ok(Ok(text)) => Ok(text),
            Ok(Err(e)) => Err(BridgeError::ModelCall(format!("{e:#}"))),
            Err(_) => Err(BridgeError::ModelCall(format!(
                "timed out after {:?}",
                self.settings.model_timeout
            ))),
        }
    }

    /// Call the selected tool over a fresh session and normalize the result.
    async fn invoke(
        &self,
        request_id: String,
        tool: String,
        choice: SelectionDecision,
    ) -> ResponseEnvelope {
        let arguments: Map<String, Value> = choice.arguments.clone();
        let name = tool.clone();

        tracing::info!(
            name: "dispatch.tool.invoking",
            request_id = %request_id,
            tool = %tool,
            argument_count = arguments.len(),
            "Executing tool call"
        );

        let outcome = self
            .negotiator
            .with_session(|session| async move { session.call_tool(&name, arguments).await })
            .await;

        let res = match outcome {
            Ok(Ok(res)) => res,
            Err(e) => {
                tracing::error!(
                    name: "dispatch.tool.connection_failed",
                    request_id = %request_id,
                    tool = %tool,
                    error = %e,
                    "Could not open MCP session for tool call"
                );
                return ResponseEnvelope::failure(
                    request_id,
                    e.kind().unwrap_or(ErrorKind::McpConnectionFailed),
                    Some(choice),
                    Some(e.to_string()),
                );
            }
            Ok(Err(e)) => {
                let err = BridgeError::Invocation {
                    tool: tool.clone(),
                    message: format!("{e:#}"),
                };
                return invocation_failed(request_id, choice, &err);
            }
        };

        if res.is_error() {
            let texts = res.texts();
            let message = if texts.is_empty() {
                "the tool reported an error".to_string()
            } else {
                texts.join("\n")
            };
            let err = BridgeError::Invocation { tool, message };
            return invocation_failed(request_id, choice, &err);
        }

        let result: InvocationResult = res.into_invocation_result();
        tracing::info!(
            name: "dispatch.tool.succeeded",
            request_id = %request_id,
            tool = %tool,
            structured = matches!(result, InvocationResult::Structured(_)),
            "Tool call succeeded"
        );
        ResponseEnvelope::success(request_id, choice, result)
    }
}

fn invocation_failed(
    request_id: String,
    choice: SelectionDecision,
    err: &BridgeError,
) -> ResponseEnvelope {
    tracing::error!(
        name: "dispatch.tool.failed",
        request_id = %request_id,
        error = %err,
        "Tool call failed"
    );
    ResponseEnvelope::failure(
        request_id,
        err.kind().unwrap_or(ErrorKind::ToolExecutionFailed),
        Some(choice),
        Some(err.to_string()),
    )
}
