//! Tool-routing prompt protocol
//!
//! The model either answers in prose or replies with exactly one
//! `<tool_call name="X" args='{...}' />` tag. Parsing is strict either/or:
//! a response matching the tag is a directive, anything else is the answer.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

use crate::tools::ToolDefinition;
use crate::types::ToolCallDirective;

static TOOL_CALL_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"<tool_call\s+name="([^"]+)"(?:\s+args='([^']*)')?\s*/>"#)
        .expect("tool call pattern is valid")
});

/// System prompt listing the tools the model may route to
pub fn build_system_prompt(tools: &[ToolDefinition]) -> String {
    let listing = tools
        .iter()
        .map(|t| format!("- {}: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        "CRITICAL INSTRUCTIONS: YOU ARE A TOOL-ROUTING AI AGENT. FOLLOW THESE RULES WITHOUT DEVIATION.\n\
Your ONLY task is to determine if the user's query can or should be answered using one of the available tools.\n\
If the user's query matches a tool's purpose, you MUST respond with ONLY the XML tag to call the tool. Your entire response must be just the tag.\n\
The format to call a tool is: <tool_call name=\"TOOL_NAME\" args='{{}}' />. Replace TOOL_NAME with the exact name of the tool.\n\
Do NOT answer the user's question directly. Do NOT provide any explanation, summary, or conversational text.\n\
\n\
AVAILABLE TOOLS:\n\
{}\n\
\n\
FEW-SHOT EXAMPLE:\n\
User Query: \"/workspaceAnalysis\"\n\
Your Response (MUST be only this): <tool_call name=\"workspaceAnalysis\" args='{{}}' />\n\
\n\
If the query does NOT match any tool, and ONLY in that case, you can answer it from your general knowledge.",
        listing
    )
}

/// Find a tool-call tag in a model response
///
/// Absent, malformed, or non-object `args` become an empty map.
pub fn parse_tool_call(text: &str) -> Option<ToolCallDirective> {
    let caps = TOOL_CALL_RE.captures(text)?;
    let name = caps.get(1)?.as_str();
    let args = caps
        .get(2)
        .and_then(|m| serde_json::from_str::<Value>(m.as_str()).ok())
        .and_then(|v| match v {
            Value::Object(map) => Some(map),
            _ => None,
        })
        .unwrap_or_default();
    Some(ToolCallDirective::new(name, args))
}

pub fn format_tool_call_trace(directive: &ToolCallDirective) -> String {
    let args = serde_json::to_string_pretty(&Value::Object(directive.args.clone()))
        .unwrap_or_else(|_| "{}".to_string());
    format!("\n```json\nTool call: {}({})\n```\n", directive.tool_name, args)
}

pub fn format_tool_response_trace(rendered: &str) -> String {
    format!("\n```json\nTool response: {}\n```\n", rendered)
}

/// Synthetic user turn carrying a tool result into the second completion
pub fn tool_result_turn(tool_name: &str, rendered: &str) -> String {
    format!("TOOL_RESULT for {}: {}", tool_name, rendered)
}
