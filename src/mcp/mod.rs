//! Model Context Protocol (MCP) client side of the bridge.
//!
//! This module discovers and invokes tools on a single remote MCP host.
//!
//! # Transports
//!
//! Two bindings are supported and tried in a fixed order by the
//! [`TransportNegotiator`]:
//!
//! 1. Streamable HTTP, via the `rmcp` client ([`streamable`])
//! 2. Legacy HTTP+SSE ([`sse_client`])
//!
//! An endpoint such as `http://zabbix-mcp:8000/mcp` is also tried without its
//! `/mcp` suffix, since hosts disagree on where the base path lives.
//!
//! # Sessions
//!
//! Sessions are short-lived: listing tools and calling a tool each open their
//! own session through [`TransportNegotiator::with_session`], which closes it
//! on every exit path.
//!
//! # Catalog
//!
//! [`CatalogStore`] caches the last fetched [`ToolCatalog`] for a freshness
//! window (300 s by default).

pub mod catalog;
pub mod negotiator;
pub mod session;
pub mod sse_client;
pub mod streamable;
pub mod types;

pub use catalog::{CatalogStore, DEFAULT_CACHE_TTL, ToolCatalog};
pub use negotiator::TransportNegotiator;
pub use session::{McpSession, SessionConnector, TransportKind};
pub use types::{CallToolResult, InvocationResult, NO_CONTENT, ToolDescriptor};
