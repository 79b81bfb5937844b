//! Tool dispatch: turning a chat message into at most one tool call.
//!
//! The pieces, in the order a request uses them:
//!
//! - [`prompt`] builds the selection prompt from the catalog
//! - [`extract`] recovers a JSON object from free-form model output
//! - [`heuristic`] picks a tool by keyword when the model cannot
//! - [`bridge`] drives the whole request and produces a [`ResponseEnvelope`]

pub mod bridge;
pub mod envelope;
pub mod extract;
pub mod heuristic;
pub mod prompt;

pub use bridge::{BridgeSettings, DispatchBridge};
pub use envelope::{ResponseEnvelope, SelectionDecision};
pub use extract::extract;
pub use heuristic::choose_heuristically;
