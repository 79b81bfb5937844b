//! Time-bounded cache of the remote tool catalog.
//!
//! The cache is a single `Arc<ToolCatalog>` slot. Readers clone the `Arc`;
//! a refresh builds a complete new catalog and swaps the slot, so a reader
//! never sees a half-populated catalog. Concurrent refreshes are allowed and
//! the last one to finish wins.

use std::{
    collections::BTreeMap,
    sync::{Arc, PoisonError, RwLock},
    time::Duration,
};

use chrono::{DateTime, Utc};
use tokio::time::Instant;

use crate::error::BridgeError;
use crate::mcp::negotiator::TransportNegotiator;
use crate::mcp::types::ToolDescriptor;

/// Default freshness window for a fetched catalog.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Immutable snapshot of the remote tool set, keyed by tool name.
#[derive(Debug, Clone)]
pub struct ToolCatalog {
    tools: BTreeMap<String, ToolDescriptor>,
    fetched_at: DateTime<Utc>,
    fetched_instant: Instant,
}

impl ToolCatalog {
    /// Build a catalog; on duplicate names the first descriptor is kept.
    pub fn new(tools: impl IntoIterator<Item = ToolDescriptor>) -> Self {
        let mut map = BTreeMap::new();
        for tool in tools {
            if map.contains_key(&tool.name) {
                tracing::warn!(tool = %tool.name, "duplicate tool name in catalog, keeping first");
                continue;
            }
            map.insert(tool.name.clone(), tool);
        }
        Self {
            tools: map,
            fetched_at: Utc::now(),
            fetched_instant: Instant::now(),
        }
    }

    pub fn empty() -> Self {
        Self::new(Vec::new())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Tool names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ToolDescriptor> {
        self.tools.values()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn age(&self) -> Duration {
        self.fetched_instant.elapsed()
    }
}

/// Holder of the current catalog, refreshed through the transport negotiator.
#[derive(Debug)]
pub struct CatalogStore {
    negotiator: Arc<TransportNegotiator>,
    ttl: Duration,
    current: RwLock<Option<Arc<ToolCatalog>>>,
}

impl CatalogStore {
    pub fn new(negotiator: Arc<TransportNegotiator>, ttl: Duration) -> Self {
        Self {
            negotiator,
            ttl,
            current: RwLock::new(None),
        }
    }

    /// Current catalog without triggering a fetch.
    pub fn snapshot(&self) -> Option<Arc<ToolCatalog>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn is_fresh(&self, catalog: &ToolCatalog) -> bool {
        catalog.age() <= self.ttl
    }

    /// Cached catalog while fresh, otherwise a refreshed one.
    ///
    /// A failed refresh keeps the previous catalog if there is one and yields
    /// an empty catalog (not stored) if there is none.
    pub async fn get_tools(&self, force_refresh: bool) -> Arc<ToolCatalog> {
        let previous = self.snapshot();
        if !force_refresh {
            if let Some(cached) = previous.as_ref().filter(|c| self.is_fresh(c)) {
                return Arc::clone(cached);
            }
        }

        match self.fetch().await {
            Ok(catalog) => {
                let catalog = Arc::new(catalog);
                *self.current.write().unwrap_or_else(PoisonError::into_inner) =
                    Some(Arc::clone(&catalog));
                tracing::info!(
                    name: "mcp.catalog.refreshed",
                    tool_count = catalog.len(),
                    forced = force_refresh,
                    "Loaded {} tools from MCP server",
                    catalog.len()
                );
                catalog
            }
            Err(e) => {
                tracing::warn!(
                    name: "mcp.catalog.fetch_failed",
                    error = %e,
                    kept_previous = previous.is_some(),
                    "Tool catalog refresh failed"
                );
                previous.unwrap_or_else(|| Arc::new(ToolCatalog::empty()))
            }
        }
    }

    async fn fetch(&self) -> Result<ToolCatalog, BridgeError> {
        let tools = self
            .negotiator
            .with_session(|session| async move { session.list_tools().await })
            .await?
            .map_err(|e| BridgeError::CatalogUnavailable(format!("{e:#}")))?;
        Ok(ToolCatalog::new(tools))
    }
}
