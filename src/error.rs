//! Error taxonomy for the dispatch bridge.
//!
//! [`BridgeError`] covers every failure the bridge can observe. Only
//! [`BridgeError::EmptyInput`] ever leaves [`DispatchBridge::run_query`] as an
//! `Err`; the rest are folded into a [`ResponseEnvelope`] as an [`ErrorKind`].
//!
//! [`DispatchBridge::run_query`]: crate::dispatch::DispatchBridge::run_query
//! [`ResponseEnvelope`]: crate::dispatch::ResponseEnvelope

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures observed while serving a query.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The user message was empty or whitespace only.
    #[error("message cannot be empty")]
    EmptyInput,

    /// The tool catalog could not be fetched; an empty catalog is substituted.
    #[error("tool catalog unavailable: {0}")]
    CatalogUnavailable(String),

    /// Every transport attempt against the tool host failed.
    #[error("cannot connect to MCP at {endpoint} after {attempts} attempt(s): {last_error}")]
    Connection {
        /// Endpoint as configured.
        endpoint: String,
        /// Number of transport/endpoint combinations tried.
        attempts: usize,
        /// The last underlying failure.
        last_error: String,
        /// One line per failed attempt, in the order they were made.
        failures: Vec<String>,
    },

    /// The language model call failed or timed out.
    #[error("model call failed: {0}")]
    ModelCall(String),

    /// The selected tool is not present in the live catalog.
    #[error("tool '{0}' is not in the current catalog")]
    SelectionInvalid(String),

    /// The remote tool call failed.
    #[error("tool '{tool}' failed: {message}")]
    Invocation {
        /// Tool that was invoked.
        tool: String,
        /// Message reported by the transport or the tool itself.
        message: String,
    },
}

impl BridgeError {
    /// Envelope error kind this failure maps to, if it surfaces in an envelope.
    #[must_use]
    pub fn kind(&self) -> Option<ErrorKind> {
        match self {
            Self::EmptyInput | Self::ModelCall(_) => None,
            Self::CatalogUnavailable(_) => Some(ErrorKind::McpUnavailable),
            Self::Connection { .. } => Some(ErrorKind::McpConnectionFailed),
            Self::SelectionInvalid(_) => Some(ErrorKind::NoToolSelected),
            Self::Invocation { .. } => Some(ErrorKind::ToolExecutionFailed),
        }
    }
}

/// Terminal error states reported in a response envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Tool use is switched off in configuration.
    McpDisabled,
    /// Tool use is on but the catalog is empty.
    McpUnavailable,
    /// No usable tool came out of selection.
    NoToolSelected,
    /// A session for invocation could not be opened.
    McpConnectionFailed,
    /// The remote tool reported or caused a failure.
    ToolExecutionFailed,
}

impl ErrorKind {
    /// Wire name, identical to the serialized form.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::McpDisabled => "mcp_disabled",
            Self::McpUnavailable => "mcp_unavailable",
            Self::NoToolSelected => "no_tool_selected",
            Self::McpConnectionFailed => "mcp_connection_failed",
            Self::ToolExecutionFailed => "tool_execution_failed",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
