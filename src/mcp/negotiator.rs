//! Session establishment with ordered transport fallback.
//!
//! Every candidate endpoint is tried with every connector, in order:
//! streamable HTTP first, SSE second. The configured endpoint is ambiguous
//! about its base path, so the other `/mcp` variant is tried as well: the
//! suffix is stripped when present and appended when absent (four attempts
//! in total).
//!
//! Each attempt is bounded by the attempt timeout and the whole sequence by
//! the connect deadline, so a host that never answers costs at most the
//! deadline.

use std::{future::Future, sync::Arc, time::Duration};

use url::Url;

use crate::error::BridgeError;
use crate::mcp::session::{McpSession, SessionConnector};
use crate::mcp::sse_client::SseConnector;
use crate::mcp::streamable::StreamableHttpConnector;

#[derive(Debug, Clone)]
pub struct TransportNegotiator {
    endpoint: String,
    connectors: Vec<Arc<dyn SessionConnector>>,
    attempt_timeout: Duration,
    connect_deadline: Duration,
}

impl TransportNegotiator {
    /// Negotiator with the default transport order: streamable HTTP, then SSE.
    pub fn new(endpoint: impl Into<String>, timeout: Duration, connect_deadline: Duration) -> Self {
        let http = reqwest::Client::builder()
            .connect_timeout(timeout)
            .build()
            .unwrap_or_default();
        Self::with_connectors(
            endpoint,
            vec![
                Arc::new(StreamableHttpConnector::new(timeout)),
                Arc::new(SseConnector::new(http, timeout)),
            ],
            timeout,
        )
        .with_connect_deadline(connect_deadline)
    }

    /// Negotiator over an explicit, ordered connector list.
    ///
    /// `attempt_timeout` bounds each connect attempt and each operation run
    /// through [`with_session`](Self::with_session). The connect deadline
    /// defaults to four attempt timeouts.
    pub fn with_connectors(
        endpoint: impl Into<String>,
        connectors: Vec<Arc<dyn SessionConnector>>,
        attempt_timeout: Duration,
    ) -> Self {
        Self {
            endpoint: endpoint.into(),
            connectors,
            attempt_timeout,
            connect_deadline: attempt_timeout.saturating_mul(4),
        }
    }

    /// Upper bound for one whole `connect`, across all attempts.
    #[must_use]
    pub fn with_connect_deadline(mut self, deadline: Duration) -> Self {
        self.connect_deadline = deadline;
        self
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// The configured endpoint, then its other `/mcp` variant.
    pub fn candidate_endpoints(endpoint: &str) -> anyhow::Result<Vec<Url>> {
        let original = Url::parse(endpoint)?;
        let path = original.path().trim_end_matches('/');

        let mut variant = original.clone();
        match path.strip_suffix("/mcp") {
            Some(base) => variant.set_path(if base.is_empty() { "/" } else { base }),
            None => variant.set_path(&format!("{path}/mcp")),
        }

        let mut out = vec![original.clone()];
        if variant != original {
            out.push(variant);
        }
        Ok(out)
    }

    /// Open an initialized session, trying every endpoint/transport pair in
    /// order. Fails once all of them have failed or the connect deadline has
    /// passed.
    pub async fn connect(&self) -> Result<Box<dyn McpSession>, BridgeError> {
        let candidates = Self::candidate_endpoints(&self.endpoint).map_err(|e| {
            BridgeError::Connection {
                endpoint: self.endpoint.clone(),
                attempts: 0,
                last_error: format!("invalid endpoint: {e}"),
                failures: Vec::new(),
            }
        })?;

        let mut failures = Vec::new();
        let mut last_error = String::from("no transports configured");

        let attempts = self.try_candidates(&candidates, &mut failures, &mut last_error);
        let outcome = tokio::time::timeout(self.connect_deadline, attempts).await;
        match outcome {
            Ok(Some(session)) => return Ok(session),
            Ok(None) => {}
            Err(_) => {
                last_error = format!("connect deadline of {:?} exceeded", self.connect_deadline);
                failures.push(last_error.clone());
            }
        }

        tracing::warn!(
            name: "mcp.session.failed",
            endpoint = %self.endpoint,
            attempts = failures.len(),
            last_error = %last_error,
            "All MCP transports failed"
        );

        Err(BridgeError::Connection {
            endpoint: self.endpoint.clone(),
            attempts: failures.len(),
            last_error,
            failures,
        })
    }

    async fn try_candidates(
        &self,
        candidates: &[Url],
        failures: &mut Vec<String>,
        last_error: &mut String,
    ) -> Option<Box<dyn McpSession>> {
        for url in candidates {
            for connector in &self.connectors {
                let kind = connector.kind();
                let attempt = tokio::time::timeout(self.attempt_timeout, connector.connect(url));
                let err = match attempt.await {
                    Ok(Ok(session)) => {
                        tracing::debug!(
                            name: "mcp.session.opened",
                            transport = %kind,
                            url = %url,
                            prior_failures = failures.len(),
                            "MCP session opened"
                        );
                        return Some(session);
                    }
                    Ok(Err(e)) => format!("{e:#}"),
                    Err(_) => format!("timed out after {:?}", self.attempt_timeout),
                };
                tracing::debug!(transport = %kind, url = %url, error = %err, "MCP transport attempt failed");
                failures.push(format!("{kind} {url}: {err}"));
                *last_error = err;
            }
        }
        None
    }

    /// Run `op` against a fresh session and close the session afterwards,
    /// whatever `op` returned.
    ///
    /// The outer result reports connection failure; the inner one is `op`'s.
    /// `op` is bounded by the attempt timeout.
    pub async fn with_session<F, Fut, T>(
        &self,
        op: F,
    ) -> Result<anyhow::Result<T>, BridgeError>
    where
        F: FnOnce(Arc<dyn McpSession>) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let session: Arc<dyn McpSession> = Arc::from(self.connect().await?);
        let guard = SessionGuard(Some(Arc::clone(&session)));
        let out = match tokio::time::timeout(self.attempt_timeout, op(session)).await {
            Ok(out) => out,
            Err(_) => Err(anyhow::anyhow!(
                "MCP operation timed out after {:?}",
                self.attempt_timeout
            )),
        };
        guard.close().await;
        Ok(out)
    }
}

/// Closes the session when `close` is awaited, or in the background if the
/// owning future is dropped first.
struct SessionGuard(Option<Arc<dyn McpSession>>);

impl SessionGuard {
    async fn close(mut self) {
        if let Some(session) = self.0.take() {
            session.close().await;
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        if let Some(session) = self.0.take() {
            if let Ok(handle) = tokio::runtime::Handle::try_current() {
                handle.spawn(async move { session.close().await });
            }
        }
    }
}
