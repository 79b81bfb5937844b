//! Per-request decision and response types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ErrorKind;
use crate::mcp::InvocationResult;

/// The tool (if any) and arguments chosen for a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionDecision {
    pub tool: Option<String>,
    #[serde(default)]
    pub arguments: Map<String, Value>,
    /// Why selection degraded, e.g. the model call error.
    #[serde(rename = "error", default, skip_serializing_if = "Option::is_none")]
    pub diagnostic: Option<String>,
}

impl SelectionDecision {
    /// `{tool: null, arguments: {}}`
    pub fn none() -> Self {
        Self {
            tool: None,
            arguments: Map::new(),
            diagnostic: None,
        }
    }

    pub fn for_tool(tool: impl Into<String>, arguments: Map<String, Value>) -> Self {
        Self {
            tool: Some(tool.into()),
            arguments,
            diagnostic: None,
        }
    }

    #[must_use]
    pub fn with_diagnostic(mut self, diagnostic: Option<String>) -> Self {
        self.diagnostic = diagnostic;
        self
    }

    /// Accept a model-produced object only if it has both `tool` and
    /// `arguments` keys. A non-string `tool` reads as null and non-object
    /// `arguments` as empty; catalog membership is checked by the caller.
    pub fn from_model_object(obj: &Map<String, Value>) -> Option<Self> {
        if !obj.contains_key("tool") || !obj.contains_key("arguments") {
            return None;
        }
        let tool = obj
            .get("tool")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string);
        let arguments = obj
            .get("arguments")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        Some(Self {
            tool,
            arguments,
            diagnostic: None,
        })
    }
}

/// Uniform result of one chat request.
///
/// Success has `result` set and `error` null. Failure has `error` set and
/// `result` either null or an explanatory text payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub choice: Option<SelectionDecision>,
    pub result: Option<InvocationResult>,
    pub error: Option<ErrorKind>,
    /// Catalog names, listed when no usable tool was selected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_tools: Option<Vec<String>>,
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
}

impl ResponseEnvelope {
    pub fn success(
        request_id: impl Into<String>,
        choice: SelectionDecision,
        result: InvocationResult,
    ) -> Self {
        Self {
            choice: Some(choice),
            result: Some(result),
            error: None,
            available_tools: None,
            request_id: request_id.into(),
            timestamp: Utc::now(),
        }
    }

    pub fn failure(
        request_id: impl Into<String>,
        kind: ErrorKind,
        choice: Option<SelectionDecision>,
        explanation: Option<String>,
    ) -> Self {
        Self {
            choice,
            result: explanation.map(InvocationResult::Text),
            error: Some(kind),
            available_tools: None,
            request_id: request_id.into(),
            timestamp: Utc::now(),
        }
    }

    #[must_use]
    pub fn with_available_tools(mut self, names: Vec<String>) -> Self {
        self.available_tools = Some(names);
        self
    }

    pub fn is_success(&self) -> bool {
        self.error.is_none() && self.result.is_some()
    }
}
