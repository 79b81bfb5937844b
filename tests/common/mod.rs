//! In-process stand-ins for the tool host and the model host.

#![allow(dead_code)]

use std::sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicUsize, Ordering},
};
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use serde_json::{Map, Value, json};
use url::Url;

use toolbridge::dispatch::{BridgeSettings, DispatchBridge};
use toolbridge::llm::{LlmDriver, LlmRequest};
use toolbridge::mcp::{
    CallToolResult, CatalogStore, McpSession, SessionConnector, ToolDescriptor, TransportKind,
    TransportNegotiator,
};

pub const ENDPOINT: &str = "http://zabbix-mcp:8000/mcp";

/// Shared state of a fake tool host, with counters for every interaction.
#[derive(Debug)]
pub struct FakeHost {
    pub tools: Mutex<Vec<ToolDescriptor>>,
    pub reachable: AtomicBool,
    /// Connect attempts never complete.
    pub hanging: AtomicBool,
    /// `None` makes `call_tool` fail at the transport level.
    pub call_response: Mutex<Option<CallToolResult>>,
    pub attempts: Mutex<Vec<(TransportKind, String)>>,
    pub list_calls: AtomicUsize,
    pub tool_calls: Mutex<Vec<(String, Map<String, Value>)>>,
    pub opened: AtomicUsize,
    pub closed: AtomicUsize,
}

impl FakeHost {
    pub fn new(tools: Vec<ToolDescriptor>) -> Arc<Self> {
        Arc::new(Self {
            tools: Mutex::new(tools),
            reachable: AtomicBool::new(true),
            hanging: AtomicBool::new(false),
            call_response: Mutex::new(Some(text_result("ok"))),
            attempts: Mutex::new(Vec::new()),
            list_calls: AtomicUsize::new(0),
            tool_calls: Mutex::new(Vec::new()),
            opened: AtomicUsize::new(0),
            closed: AtomicUsize::new(0),
        })
    }

    pub fn unreachable() -> Arc<Self> {
        let host = Self::new(Vec::new());
        host.reachable.store(false, Ordering::SeqCst);
        host
    }

    pub fn hanging() -> Arc<Self> {
        let host = Self::new(zabbix_tools());
        host.hanging.store(true, Ordering::SeqCst);
        host
    }

    pub fn respond_with(&self, res: Option<CallToolResult>) {
        *self.call_response.lock().unwrap() = res;
    }

    pub fn attempts(&self) -> Vec<(TransportKind, String)> {
        self.attempts.lock().unwrap().clone()
    }

    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    pub fn tool_calls(&self) -> Vec<(String, Map<String, Value>)> {
        self.tool_calls.lock().unwrap().clone()
    }

    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

pub fn text_result(text: &str) -> CallToolResult {
    serde_json::from_value(json!({"content": [{"type": "text", "text": text}]})).unwrap()
}

pub fn zabbix_tools() -> Vec<ToolDescriptor> {
    vec![
        ToolDescriptor::new("host_get", "Get hosts").with_schema(json!({
            "type": "object",
            "properties": {"hostids": {"type": "array"}, "output": {"type": "array"}}
        })),
        ToolDescriptor::new("problem_get", "Get problems").with_schema(json!({
            "type": "object",
            "properties": {"recent": {"type": "boolean"}, "limit": {"type": "integer"}}
        })),
        ToolDescriptor::new("apiinfo_version", "Get API version"),
    ]
}

/// Connector for one transport kind; `accept` decides whether it can open a session.
#[derive(Debug)]
pub struct FakeConnector {
    pub kind: TransportKind,
    pub host: Arc<FakeHost>,
    pub accept: bool,
}

#[async_trait]
impl SessionConnector for FakeConnector {
    fn kind(&self) -> TransportKind {
        self.kind
    }

    async fn connect(&self, url: &Url) -> anyhow::Result<Box<dyn McpSession>> {
        self.host
            .attempts
            .lock()
            .unwrap()
            .push((self.kind, url.to_string()));
        if self.host.hanging.load(Ordering::SeqCst) {
            return std::future::pending().await;
        }
        if !self.accept || !self.host.reachable.load(Ordering::SeqCst) {
            return Err(anyhow!("connection refused"));
        }
        self.host.opened.fetch_add(1, Ordering::SeqCst);
        Ok(Box::new(FakeSession {
            host: Arc::clone(&self.host),
            closed: AtomicBool::new(false),
        }))
    }
}

struct FakeSession {
    host: Arc<FakeHost>,
    closed: AtomicBool,
}

#[async_trait]
impl McpSession for FakeSession {
    async fn list_tools(&self) -> anyhow::Result<Vec<ToolDescriptor>> {
        self.host.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.host.tools.lock().unwrap().clone())
    }

    async fn call_tool(
        &self,
        name: &str,
        arguments: Map<String, Value>,
    ) -> anyhow::Result<CallToolResult> {
        self.host
            .tool_calls
            .lock()
            .unwrap()
            .push((name.to_string(), arguments));
        self.host
            .call_response
            .lock()
            .unwrap()
            .clone()
            .ok_or_else(|| anyhow!("transport reset during tools/call"))
    }

    async fn close(&self) {
        if !self.closed.swap(true, Ordering::SeqCst) {
            self.host.closed.fetch_add(1, Ordering::SeqCst);
        }
    }
}

/// Streamable HTTP and SSE connectors over the same host.
pub fn connectors(host: &Arc<FakeHost>) -> Vec<Arc<dyn SessionConnector>> {
    vec![
        Arc::new(FakeConnector {
            kind: TransportKind::StreamableHttp,
            host: Arc::clone(host),
            accept: true,
        }),
        Arc::new(FakeConnector {
            kind: TransportKind::Sse,
            host: Arc::clone(host),
            accept: true,
        }),
    ]
}

/// Model stand-in: replies with a fixed string, or fails when `reply` is `None`.
#[derive(Debug)]
pub struct FakeLlm {
    pub reply: Option<String>,
    /// Time to sleep before answering.
    pub delay: Option<Duration>,
    pub calls: AtomicUsize,
    pub last_request: Mutex<Option<LlmRequest>>,
}

impl FakeLlm {
    pub fn replying(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            delay: None,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(Self {
            reply: None,
            delay: None,
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    /// Answers `reply`, but only after `delay`.
    pub fn stalling(reply: &str, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            reply: Some(reply.to_string()),
            delay: Some(delay),
            calls: AtomicUsize::new(0),
            last_request: Mutex::new(None),
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl LlmDriver for FakeLlm {
    async fn complete(&self, req: LlmRequest) -> anyhow::Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(req);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        self.reply
            .clone()
            .ok_or_else(|| anyhow!("connection refused (ollama:11434)"))
    }
}

pub struct Harness {
    pub host: Arc<FakeHost>,
    pub llm: Arc<FakeLlm>,
    pub bridge: Arc<DispatchBridge>,
}

pub fn harness(host: Arc<FakeHost>, llm: Arc<FakeLlm>, settings: BridgeSettings) -> Harness {
    harness_with_timeouts(host, llm, settings, Duration::from_secs(5), Duration::from_secs(20))
}

/// Harness whose negotiator uses the given attempt timeout and connect deadline.
pub fn harness_with_timeouts(
    host: Arc<FakeHost>,
    llm: Arc<FakeLlm>,
    settings: BridgeSettings,
    attempt_timeout: Duration,
    connect_deadline: Duration,
) -> Harness {
    let negotiator = Arc::new(
        TransportNegotiator::with_connectors(ENDPOINT, connectors(&host), attempt_timeout)
            .with_connect_deadline(connect_deadline),
    );
    let catalog = Arc::new(CatalogStore::new(
        Arc::clone(&negotiator),
        Duration::from_secs(300),
    ));
    let driver: Arc<dyn LlmDriver> = llm.clone();
    let bridge = Arc::new(DispatchBridge::new(negotiator, catalog, driver, settings));
    Harness { host, llm, bridge }
}
