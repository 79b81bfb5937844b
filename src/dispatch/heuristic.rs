//! Keyword fallback for tool selection.
//!
//! Used when the model is unreachable or its output cannot be turned into a
//! decision. Rules are checked in order and the first match wins.

use serde_json::{Map, Value, json};

use super::envelope::SelectionDecision;

pub const VERSION_TOOL: &str = "apiinfo_version";
pub const PROBLEM_TOOL: &str = "problem_get";
pub const HOST_TOOL: &str = "host_get";

/// Pick a tool from keywords in the user text.
pub fn choose_heuristically(user_text: &str) -> SelectionDecision {
    let s = user_text.to_lowercase();

    if s.contains("version") || s.contains("api") {
        return SelectionDecision::for_tool(VERSION_TOOL, Map::new());
    }
    if ["problem", "incident", "alert"].iter().any(|k| s.contains(k)) {
        let mut args = Map::new();
        args.insert("recent".to_string(), Value::Bool(true));
        args.insert("limit".to_string(), json!(5));
        return SelectionDecision::for_tool(PROBLEM_TOOL, args);
    }
    if s.contains("host") {
        return SelectionDecision::for_tool(HOST_TOOL, Map::new());
    }
    SelectionDecision::none()
}
