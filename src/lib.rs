//! toolbridge
//!
//! A chat front end that routes natural-language requests to tools exposed by
//! a remote Model Context Protocol (MCP) host, using a language model to pick
//! the tool and its arguments.
//!
//! # Architecture
//!
//! - **Server**: Axum HTTP front end (`/chat`, `/health`, `/tools`, static UI)
//! - **Dispatch**: one request in, one [`dispatch::ResponseEnvelope`] out
//! - **MCP Client**: transport negotiation, scoped sessions, cached tool catalog
//! - **LLM**: Ollama and Chat Completions drivers behind one trait
//!
//! # Modules
//!
//! - [`config`]: layered configuration (defaults, file, env, CLI)
//! - [`dispatch`]: tool selection and invocation
//! - [`error`]: error taxonomy
//! - [`llm`]: LLM driver trait and implementations
//! - [`mcp`]: MCP transports, sessions and catalog cache
//! - [`server`]: HTTP routes and startup
//! - [`telemetry`]: tracing subscriber setup

// Allow pedantic clippy warnings that don't add value for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::missing_fields_in_debug)]
#![allow(clippy::implicit_hasher)]
#![allow(clippy::assigning_clones)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::cargo_common_metadata)]
#![allow(clippy::multiple_crate_versions)]
#![allow(clippy::default_trait_access)]
#![allow(clippy::unused_async)]

pub mod config;
pub mod dispatch;
pub mod error;
pub mod llm;
pub mod mcp;
pub mod server;
pub mod telemetry;

use std::sync::Arc;

use crate::config::AppConfig;
use crate::dispatch::DispatchBridge;
use crate::mcp::{CatalogStore, TransportNegotiator};

/// Application state shared across all handlers.
#[derive(Clone, Debug)]
pub struct AppState {
    /// Request orchestrator, which also owns the tool catalog.
    pub bridge: Arc<DispatchBridge>,
    /// Global configuration.
    pub config: Arc<AppConfig>,
}

impl AppState {
    /// Wire the production components from configuration.
    pub fn from_config(config: Arc<AppConfig>) -> Self {
        let negotiator = Arc::new(TransportNegotiator::new(
            config.mcp.url.clone(),
            config.mcp_timeout(),
            config.mcp_connect_deadline(),
        ));
        let catalog = Arc::new(CatalogStore::new(
            Arc::clone(&negotiator),
            config.cache_ttl(),
        ));
        let llm = llm::driver_for(&config.llm_settings());
        let bridge = DispatchBridge::new(negotiator, catalog, llm, config.bridge_settings());
        Self {
            bridge: Arc::new(bridge),
            config,
        }
    }
}
