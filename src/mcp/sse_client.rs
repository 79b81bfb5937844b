//! Legacy HTTP+SSE MCP client.
//!
//! The server keeps a `text/event-stream` open on the GET endpoint. Its first
//! `endpoint` event names the URL that JSON-RPC requests are POSTed to; the
//! responses come back as `message` events on the stream and are routed to
//! the waiting caller by JSON-RPC id.

use std::{
    collections::HashMap,
    pin::Pin,
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use anyhow::{Context, anyhow};
use async_trait::async_trait;
use futures::{FutureExt, Stream, StreamExt};
use serde_json::{Map, Value, json};
use tokio::sync::{Mutex, oneshot};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::mcp::session::{McpSession, SessionConnector, TransportKind};
use crate::mcp::types::{CallToolResult, ListToolsResult, ToolDescriptor};

const PROTOCOL_VERSION: &str = "2024-11-05";

type Pending = Arc<Mutex<HashMap<u64, oneshot::Sender<Value>>>>;
type EventStream = Pin<Box<dyn Stream<Item = anyhow::Result<SseEvent>> + Send>>;

/// One decoded server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SseEvent {
    pub event: String,
    pub data: String,
}

/// Connector for the legacy SSE transport.
#[derive(Debug, Clone)]
pub struct SseConnector {
    http: reqwest::Client,
    request_timeout: Duration,
}

impl SseConnector {
    pub fn new(http: reqwest::Client, request_timeout: Duration) -> Self {
        Self {
            http,
            request_timeout,
        }
    }
}

#[async_trait]
impl SessionConnector for SseConnector {
    fn kind(&self) -> TransportKind {
        TransportKind::Sse
    }

    async fn connect(&self, url: &Url) -> anyhow::Result<Box<dyn McpSession>> {
        let client = SseMcpClient::connect(self.http.clone(), url, self.request_timeout).await?;
        Ok(Box::new(client))
    }
}

pub struct SseMcpClient {
    http: reqwest::Client,
    post_url: Url,
    pending: Pending,
    next_id: AtomicU64,
    request_timeout: Duration,
    shutdown: CancellationToken,
}

impl std::fmt::Debug for SseMcpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SseMcpClient")
            .field("post_url", &self.post_url.as_str())
            .field("closed", &self.shutdown.is_cancelled())
            .finish()
    }
}

impl SseMcpClient {
    /// Open the event stream, wait for the `endpoint` event, then run the
    /// MCP lifecycle handshake.
    pub async fn connect(
        http: reqwest::Client,
        sse_url: &Url,
        request_timeout: Duration,
    ) -> anyhow::Result<Self> {
        let resp = http
            .get(sse_url.clone())
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .with_context(|| format!("SSE connect failed at {sse_url}"))?
            .error_for_status()
            .with_context(|| format!("SSE endpoint {sse_url} rejected the stream"))?;

        let mut events: EventStream = Box::pin(sse_events(resp.bytes_stream()));

        let post_url = tokio::time::timeout(request_timeout, wait_for_endpoint(&mut events))
            .await
            .map_err(|_| anyhow!("no endpoint event from {sse_url} within {request_timeout:?}"))??;
        let post_url = sse_url
            .join(&post_url)
            .with_context(|| format!("invalid endpoint event from {sse_url}: {post_url}"))?;

        let pending: Pending = Arc::new(Mutex::new(HashMap::new()));
        let shutdown = CancellationToken::new();

        // Reader task: route `message` events to waiters by id.
        let pending_reader = Arc::clone(&pending);
        let stop = shutdown.clone();
        tokio::spawn(async move {
            loop {
                let next = tokio::select! {
                    () = stop.cancelled() => break,
                    next = events.next() => next,
                };
                let event = match next {
                    Some(Ok(ev)) => ev,
                    Some(Err(e)) => {
                        tracing::debug!(error = %e, "SSE stream error");
                        break;
                    }
                    None => break,
                };
                if event.event != "message" {
                    continue;
                }
                let Ok(parsed) = serde_json::from_str::<Value>(&event.data) else {
                    continue;
                };
                // Server-initiated requests and notifications carry no waiter
                if let Some(id) = parsed.get("id").and_then(Value::as_u64) {
                    if let Some(tx) = pending_reader.lock().await.remove(&id) {
                        let _ = tx.send(parsed);
                    }
                }
            }
            // Wake anyone still waiting; their receivers see a closed channel.
            pending_reader.lock().await.clear();
        });

        let client = Self {
            http,
            post_url,
            pending,
            next_id: AtomicU64::new(1),
            request_timeout,
            shutdown,
        };

        if let Err(e) = client.initialize().await {
            client.shutdown.cancel();
            return Err(e);
        }

        Ok(client)
    }

    async fn initialize(&self) -> anyhow::Result<()> {
        let result = self
            .request(
                "initialize",
                json!({
                    "protocolVersion": PROTOCOL_VERSION,
                    "capabilities": {},
                    "clientInfo": {
                        "name": env!("CARGO_PKG_NAME"),
                        "version": env!("CARGO_PKG_VERSION")
                    }
                }),
            )
            .await
            .context("MCP initialize failed")?;

        tracing::debug!(
            server = ?result.get("serverInfo"),
            protocol = ?result.get("protocolVersion"),
            "SSE session initialized"
        );

        self.post(&json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        }))
        .await
    }

    async fn post(&self, msg: &Value) -> anyhow::Result<()> {
        self.http
            .post(self.post_url.clone())
            .json(msg)
            .send()
            .await
            .with_context(|| format!("POST to {} failed", self.post_url))?
            .error_for_status()?;
        Ok(())
    }

    /// Send a JSON-RPC request and wait for its `result`.
    async fn request(&self, method: &str, params: Value) -> anyhow::Result<Value> {
        if self.shutdown.is_cancelled() {
            return Err(anyhow!("SSE session closed"));
        }

        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.pending.lock().await.insert(id, tx);

        let msg = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });
        if let Err(e) = self.post(&msg).await {
            self.pending.lock().await.remove(&id);
            return Err(e);
        }

        let resp = match tokio::time::timeout(self.request_timeout, rx.map(Result::ok)).await {
            Ok(Some(resp)) => resp,
            Ok(None) => return Err(anyhow!("{method}: SSE stream ended before a response")),
            Err(_) => {
                self.pending.lock().await.remove(&id);
                return Err(anyhow!("{method}: timed out after {:?}", self.request_timeout));
            }
        };

        if let Some(err) = resp.get("error") {
            return Err(anyhow!("{method} error: {err}"));
        }
        resp.get("result")
            .cloned()
            .ok_or_else(|| anyhow!("missing result in {method}"))
    }
}

#[async_trait]
impl McpSession for SseMcpClient {
    async fn list_tools(&self) -> anyhow::Result<Vec<ToolDescriptor>> {
        let mut out = Vec::new();
        let mut cursor: Option<String> = None;

        loop {
            let params = match &cursor {
                Some(c) => json!({ "cursor": c }),
                None => json!({}),
            };
            let result = self.request("tools/list", params).await?;
            let page: ListToolsResult = serde_json::from_value(result)?;
            out.extend(page.tools.into_iter().map(ToolDescriptor::from));

            match page.next_cursor {
                Some(nc) if !nc.is_empty() => cursor = Some(nc),
                _ => break,
            }
        }

        Ok(out)
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> anyhow::Result<CallToolResult> {
        let result = self
            .request(
                "tools/call",
                json!({
                    "name": name,
                    "arguments": arguments
                }),
            )
            .await?;
        Ok(serde_json::from_value(result)?)
    }

    async fn close(&self) {
        self.shutdown.cancel();
    }
}

impl Drop for SseMcpClient {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

async fn wait_for_endpoint(events: &mut EventStream) -> anyhow::Result<String> {
    while let Some(ev) = events.next().await {
        let ev = ev?;
        if ev.event == "endpoint" {
            return Ok(ev.data.trim().to_string());
        }
    }
    Err(anyhow!("event stream closed before an endpoint event"))
}

/// Decode a byte stream into server-sent events.
///
/// Frames are separated by a blank line; `data:` lines within one frame are
/// joined with newlines. Events without an explicit name are `message`.
pub fn sse_events<S, B, E>(byte_stream: S) -> impl Stream<Item = anyhow::Result<SseEvent>> + Send
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::error::Error + Send + Sync + 'static,
{
    async_stream::try_stream! {
        let mut buf = Vec::<u8>::new();

        futures::pin_mut!(byte_stream);
        while let Some(chunk) = byte_stream.next().await {
            let chunk = chunk?;
            buf.extend(chunk.as_ref().iter().copied().filter(|b| *b != b'\r'));

            while let Some(pos) = find_double_newline(&buf) {
                let frame = buf.drain(..pos + 2).collect::<Vec<_>>();
                if let Some(event) = parse_frame(&String::from_utf8_lossy(&frame)) {
                    yield event;
                }
            }
        }
    }
}

fn parse_frame(frame: &str) -> Option<SseEvent> {
    let mut event = None;
    let mut data: Vec<&str> = Vec::new();

    for line in frame.lines() {
        if line.starts_with(':') {
            continue;
        }
        let (field, value) = line.split_once(':').unwrap_or((line, ""));
        let value = value.strip_prefix(' ').unwrap_or(value);
        match field {
            "event" => event = Some(value.to_string()),
            "data" => data.push(value),
            _ => {}
        }
    }

    if data.is_empty() {
        return None;
    }
    Some(SseEvent {
        event: event.unwrap_or_else(|| "message".to_string()),
        data: data.join("\n"),
    })
}

/// Find the position of a double newline in the buffer.
fn find_double_newline(buf: &[u8]) -> Option<usize> {
    buf.windows(2).position(|w| w == b"\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunks(parts: &[&'static str]) -> impl Stream<Item = Result<&'static [u8], std::io::Error>> {
        futures::stream::iter(parts.iter().copied().map(|p| Ok(p.as_bytes())).collect::<Vec<_>>())
    }

    #[tokio::test]
    async fn test_endpoint_and_message_events() {
        let stream = sse_events(chunks(&[
            "event: endpoint\r\ndata: /messages/?session_id=abc\r\n\r\n",
            "event: message\ndata: {\"jsonrpc\":\"2.0\",",
            "\"id\":1,\"result\":{}}\n\n",
        ]));
        let events: Vec<_> = stream.collect().await;
        assert_eq!(events.len(), 2);
        let first = events[0].as_ref().unwrap();
        assert_eq!(first.event, "endpoint");
        assert_eq!(first.data, "/messages/?session_id=abc");
        let second = events[1].as_ref().unwrap();
        assert_eq!(second.event, "message");
        assert!(second.data.contains("\"id\":1"));
    }

    #[test]
    fn test_comment_and_unnamed_frames() {
        assert_eq!(parse_frame(": ping\n"), None);
        let ev = parse_frame("data: a\ndata: b\n").unwrap();
        assert_eq!(ev.event, "message");
        assert_eq!(ev.data, "a\nb");
    }

    #[test]
    fn test_endpoint_resolves_against_sse_url() {
        let base = Url::parse("http://tools:8000/sse").unwrap();
        let joined = base.join("/messages/?session_id=1").unwrap();
        assert_eq!(joined.as_str(), "http://tools:8000/messages/?session_id=1");
    }
}
