//! Session and transport abstractions shared by both MCP transport bindings.

use async_trait::async_trait;
use serde_json::{Map, Value};
use url::Url;

use crate::mcp::types::{CallToolResult, ToolDescriptor};

/// Transport bindings, in the order the negotiator tries them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TransportKind {
    /// MCP streamable HTTP (single endpoint, POST with optional SSE replies).
    StreamableHttp,
    /// Legacy HTTP+SSE (GET event stream, POST to the announced endpoint).
    Sse,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::StreamableHttp => f.write_str("streamable-http"),
            Self::Sse => f.write_str("sse"),
        }
    }
}

/// An initialized MCP client session.
///
/// A session is owned by exactly one logical operation and closed when that
/// operation ends; see [`TransportNegotiator::with_session`].
///
/// [`TransportNegotiator::with_session`]: crate::mcp::negotiator::TransportNegotiator::with_session
#[async_trait]
pub trait McpSession: Send + Sync {
    /// `tools/list`, following pagination to the end.
    async fn list_tools(&self) -> anyhow::Result<Vec<ToolDescriptor>>;

    /// `tools/call` with an object of arguments.
    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> anyhow::Result<CallToolResult>;

    /// Release the underlying connection. Must be idempotent.
    async fn close(&self);
}

/// Opens sessions over one transport binding.
///
/// `connect` covers both the transport-level handshake and the MCP
/// `initialize` exchange; a returned session is ready for requests.
#[async_trait]
pub trait SessionConnector: Send + Sync + std::fmt::Debug {
    fn kind(&self) -> TransportKind;

    async fn connect(&self, url: &Url) -> anyhow::Result<Box<dyn McpSession>>;
}
