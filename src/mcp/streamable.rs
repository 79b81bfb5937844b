//! Streamable HTTP binding backed by the `rmcp` client.

use std::time::Duration;

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use rmcp::{
    model::CallToolRequestParam,
    service::{Peer, RoleClient, RunningService, ServiceExt},
    transport::StreamableHttpClientTransport,
};
use serde_json::{Map, Value};
use tokio::sync::Mutex;
use url::Url;

use crate::mcp::session::{McpSession, SessionConnector, TransportKind};
use crate::mcp::types::{CallToolResult, McpTool, ToolDescriptor};

/// Connector for the MCP streamable HTTP transport.
#[derive(Debug, Clone)]
pub struct StreamableHttpConnector {
    request_timeout: Duration,
}

impl StreamableHttpConnector {
    pub fn new(request_timeout: Duration) -> Self {
        Self { request_timeout }
    }
}

#[async_trait]
impl SessionConnector for StreamableHttpConnector {
    fn kind(&self) -> TransportKind {
        TransportKind::StreamableHttp
    }

    async fn connect(&self, url: &Url) -> anyhow::Result<Box<dyn McpSession>> {
        let transport = StreamableHttpClientTransport::from_uri(url.to_string());
        // serve() runs the initialize handshake before returning
        let service = ()
            .serve(transport)
            .await
            .with_context(|| format!("streamable HTTP initialize failed at {url}"))?;

        let peer = service.peer().clone();
        Ok(Box::new(StreamableHttpSession {
            peer,
            service: Mutex::new(Some(service)),
            request_timeout: self.request_timeout,
        }))
    }
}

struct StreamableHttpSession {
    peer: Peer<RoleClient>,
    service: Mutex<Option<RunningService<RoleClient, ()>>>,
    request_timeout: Duration,
}

#[async_trait]
impl McpSession for StreamableHttpSession {
    async fn list_tools(&self) -> anyhow::Result<Vec<ToolDescriptor>> {
        let tools = tokio::time::timeout(self.request_timeout, self.peer.list_all_tools())
            .await
            .map_err(|_| anyhow!("tools/list timed out after {:?}", self.request_timeout))?
            .context("tools/list failed")?;

        tools
            .into_iter()
            .map(|t| -> anyhow::Result<ToolDescriptor> {
                // rmcp's Tool serializes to the MCP wire shape
                let wire: McpTool = serde_json::from_value(serde_json::to_value(t)?)?;
                Ok(ToolDescriptor::from(wire))
            })
            .collect()
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> anyhow::Result<CallToolResult> {
        let call = self.peer.call_tool(CallToolRequestParam {
            name: name.to_string().into(),
            arguments: Some(arguments),
        });
        let res = tokio::time::timeout(self.request_timeout, call)
            .await
            .map_err(|_| anyhow!("tools/call '{name}' timed out after {:?}", self.request_timeout))?
            .with_context(|| format!("tools/call failed for {name}"))?;

        Ok(serde_json::from_value(serde_json::to_value(res)?)?)
    }

    async fn close(&self) {
        if let Some(service) = self.service.lock().await.take() {
            if let Err(e) = service.cancel().await {
                tracing::debug!(error = %e, "streamable HTTP session did not shut down cleanly");
            }
        }
    }
}
