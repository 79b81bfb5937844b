//! Wire shapes for the MCP `tools/list` and `tools/call` results, and the
//! normalized forms the rest of the crate works with.
//!
//! Both transports decode into these types, so structured-vs-text detection
//! happens exactly once, in [`CallToolResult::into_invocation_result`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Placeholder text used when a tool returns neither structured nor text content.
pub const NO_CONTENT: &str = "No content returned";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct McpTool {
    pub name: String,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default)]
    pub input_schema: Option<Value>,
    #[serde(rename = "outputSchema", default)]
    pub output_schema: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListToolsResult {
    pub tools: Vec<McpTool>,
    #[serde(rename = "nextCursor", default)]
    pub next_cursor: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CallToolResult {
    #[serde(default)]
    pub content: Vec<Value>,
    #[serde(rename = "isError", default)]
    pub is_error: Option<bool>,
    #[serde(rename = "structuredContent", default)]
    pub structured_content: Option<Value>,
}

/// A remotely discovered tool. Identity is `name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// Full JSON schema of the tool input (`{}` when the host sent none).
    pub input_schema: Map<String, Value>,
}

impl ToolDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema: Map::new(),
        }
    }

    /// Attach an input schema, keeping only object schemas.
    #[must_use]
    pub fn with_schema(mut self, schema: Value) -> Self {
        if let Value::Object(obj) = schema {
            self.input_schema = obj;
        }
        self
    }

    /// Parameter name to constraint metadata, from the schema's `properties`.
    pub fn parameters(&self) -> Map<String, Value> {
        self.input_schema
            .get("properties")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default()
    }

    pub fn parameter_names(&self) -> Vec<String> {
        self.input_schema
            .get("properties")
            .and_then(Value::as_object)
            .map(|props| props.keys().cloned().collect())
            .unwrap_or_default()
    }
}

impl From<McpTool> for ToolDescriptor {
    fn from(tool: McpTool) -> Self {
        let description = tool
            .description
            .or(tool.title)
            .unwrap_or_default();
        let descriptor = Self::new(tool.name, description);
        match tool.input_schema {
            Some(schema) => descriptor.with_schema(schema),
            None => descriptor,
        }
    }
}

/// Normalized outcome of a successful tool call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvocationResult {
    Structured(Value),
    Text(String),
}

impl InvocationResult {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t),
            Self::Structured(_) => None,
        }
    }
}

impl CallToolResult {
    /// Whether the tool itself flagged the call as failed.
    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }

    /// Text fragments of the content list, in order.
    pub fn texts(&self) -> Vec<&str> {
        self.content
            .iter()
            .filter_map(|c| c.get("text").and_then(Value::as_str))
            .collect()
    }

    /// Structured content wins when present and non-empty; otherwise the text
    /// fragments joined by newlines, or [`NO_CONTENT`].
    pub fn into_invocation_result(self) -> InvocationResult {
        if let Some(structured) = self.structured_content.as_ref().filter(|v| !is_empty_json(v)) {
            return InvocationResult::Structured(structured.clone());
        }
        let texts = self.texts();
        if texts.is_empty() {
            InvocationResult::text(NO_CONTENT)
        } else {
            InvocationResult::Text(texts.join("\n"))
        }
    }
}

fn is_empty_json(v: &Value) -> bool {
    match v {
        Value::Null => true,
        Value::Object(o) => o.is_empty(),
        Value::Array(a) => a.is_empty(),
        _ => false,
    }
}
