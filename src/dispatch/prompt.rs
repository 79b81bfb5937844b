//! Selection prompt construction.

use serde_json::json;

use crate::llm::Message;
use crate::mcp::ToolCatalog;

/// Upper bound on the tool listing embedded in the prompt.
const MAX_TOOL_LISTING_CHARS: usize = 25_000;

pub const SYSTEM_PROMPT: &str = "You are a tool-using assistant for Zabbix monitoring.\n\
Return ONLY {\"tool\": \"<name or null>\", \"arguments\": {}} as strict JSON.\n\
Choose exactly one tool from the provided list (or null). No prose.";

/// Question/answer exemplars shown to the model.
pub fn few_shots() -> Vec<(&'static str, serde_json::Value)> {
    vec![
        (
            "List recent critical problems (top 5)",
            json!({"tool": "problem_get", "arguments": {"recent": true, "severity": ["5"], "limit": 5}}),
        ),
        ("List all hosts", json!({"tool": "host_get", "arguments": {}})),
        ("Get API version", json!({"tool": "apiinfo_version", "arguments": {}})),
        (
            "Show host status",
            json!({"tool": "host_get", "arguments": {"output": ["hostid", "name", "status"]}}),
        ),
    ]
}

/// One line per tool: `- name: description (params: a, b)`.
pub fn tool_listing(catalog: &ToolCatalog) -> String {
    let mut out = String::new();
    for tool in catalog.iter() {
        let mut line = format!("- {}: {}", tool.name, tool.description.trim());
        let params = tool.parameter_names();
        if !params.is_empty() {
            line.push_str(&format!(" (params: {})", params.join(", ")));
        }
        if out.len() + line.len() + 1 > MAX_TOOL_LISTING_CHARS {
            tracing::warn!(
                tool_count = catalog.len(),
                "tool listing truncated to fit the prompt"
            );
            break;
        }
        out.push_str(&line);
        out.push('\n');
    }
    out
}

/// Body of the user turn: tools, exemplars, then the question.
pub fn selection_prompt(catalog: &ToolCatalog, user_text: &str) -> String {
    let examples = few_shots()
        .into_iter()
        .map(|(q, a)| format!("Q: {q}\nA: {a}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "Available tools:\n{}\nExamples:\n{examples}\n\nQ: {user_text}\nA:",
        tool_listing(catalog)
    )
}

/// Messages for the selection call.
pub fn selection_messages(catalog: &ToolCatalog, user_text: &str) -> Vec<Message> {
    vec![
        Message::system(SYSTEM_PROMPT),
        Message::user(selection_prompt(catalog, user_text)),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mcp::ToolDescriptor;

    fn catalog() -> ToolCatalog {
        ToolCatalog::new(vec![
            ToolDescriptor::new("host_get", "Get hosts").with_schema(json!({
                "type": "object",
                "properties": {"hostids": {"type": "array"}, "output": {"type": "array"}}
            })),
            ToolDescriptor::new("apiinfo_version", "API version"),
        ])
    }

    #[test]
    fn test_tool_listing_lines() {
        let listing = tool_listing(&catalog());
        let lines: Vec<_> = listing.lines().collect();
        assert_eq!(
            lines,
            vec![
                "- apiinfo_version: API version",
                "- host_get: Get hosts (params: hostids, output)",
            ]
        );
    }

    #[test]
    fn test_prompt_ends_with_user_question() {
        let prompt = selection_prompt(&catalog(), "List all hosts");
        assert!(prompt.starts_with("Available tools:\n- apiinfo_version"));
        assert!(prompt.contains("Q: Get API version\nA: {"));
        assert!(prompt.ends_with("Q: List all hosts\nA:"));
    }

    #[test]
    fn test_messages_start_with_system_instruction() {
        let msgs = selection_messages(&catalog(), "hi");
        assert_eq!(msgs.len(), 2);
        assert_eq!(msgs[0], Message::system(SYSTEM_PROMPT));
        assert!(SYSTEM_PROMPT.contains("strict JSON"));
    }
}
