//! Recovery of malformed tool calls.
//!
//! The provider sometimes "talks" a tool call instead of using the
//! structured field, emitting XML-style text such as
//! `<function=search_web{"query":"...","purpose":"..."}</function>` —
//! sometimes with escaped angle brackets, a missing `>`, surrounding
//! prose, or the JSON wrapped in an extra parenthesis pair. This module
//! normalizes both native and text-recovered calls into one `ToolCall`
//! shape so the orchestrator never branches on where a call came from
//! until it has to.

use crate::providers::NativeToolCall;
use regex::Regex;
use std::sync::LazyLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCallSource {
    /// From the provider's structured `tool_calls` field.
    Native,
    /// Parsed out of assistant text or an error payload.
    Recovered,
}

#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: serde_json::Value,
    pub source: ToolCallSource,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ParsedXmlCall {
    pub name: String,
    pub arguments: serde_json::Value,
}

// Full tag: <function=NAME{...}></function>, tolerating a missing '>'
// before the end tag and an extra parenthesis pair around the JSON.
static FULL_TAG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<function=([A-Za-z0-9_\-]+)\s*(\(?\{.*?\}\)?)\s*>?\s*</function>")
        .expect("full tag pattern compiles")
});

// Fallback: tag start only, for payloads where the end tag never arrived.
static TAG_START: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<function=([A-Za-z0-9_\-]+)\s*(\(?\{.*?\}\)?)")
        .expect("tag start pattern compiles")
});

fn normalize(content: &str) -> String {
    // Error payloads often carry the escaped form of the angle brackets.
    content
        .trim()
        .replace("\\u003c", "<")
        .replace("\\u003e", ">")
}

fn strip_parens(payload: &str) -> &str {
    let trimmed = payload.trim();
    trimmed
        .strip_prefix('(')
        .and_then(|s| s.strip_suffix(')'))
        .map_or(trimmed, str::trim)
}

fn parse_payload(payload: &str) -> Option<serde_json::Value> {
    let json_part = strip_parens(payload);
    if let Ok(value) = serde_json::from_str(json_part) {
        return Some(value);
    }
    // Last resort: take the outermost {...} span and retry.
    let start = json_part.find('{')?;
    let end = json_part.rfind('}')?;
    if end <= start {
        return None;
    }
    serde_json::from_str(&json_part[start..=end]).ok()
}

/// Best-effort parse of an XML-style tool call. Returns `None` rather than
/// erroring on anything unparseable.
pub fn try_parse_xml_style_tool_call(content: &str) -> Option<ParsedXmlCall> {
    if content.is_empty() {
        return None;
    }
    let normalized = normalize(content);

    let captures = FULL_TAG
        .captures(&normalized)
        .or_else(|| TAG_START.captures(&normalized))?;

    let name = captures.get(1)?.as_str().to_string();
    let arguments = parse_payload(captures.get(2)?.as_str())?;
    Some(ParsedXmlCall { name, arguments })
}

/// Does the text even look like a textual tool call? Used to decide
/// whether a repair retry is worth attempting when parsing failed.
pub fn contains_xml_tool_syntax(content: &str) -> bool {
    normalize(content).contains("<function=")
}

/// Normalize an assistant response into tool calls: the structured field
/// wins when present and non-empty; otherwise attempt text recovery.
pub fn extract_tool_calls(content: Option<&str>, native: &[NativeToolCall]) -> Vec<ToolCall> {
    if !native.is_empty() {
        return native
            .iter()
            .map(|call| ToolCall {
                id: call.id.clone(),
                name: call.name.clone(),
                arguments: serde_json::from_str(&call.arguments)
                    .unwrap_or_else(|_| serde_json::json!({})),
                source: ToolCallSource::Native,
            })
            .collect();
    }

    let Some(text) = content else {
        return Vec::new();
    };
    match try_parse_xml_style_tool_call(text) {
        Some(parsed) => vec![ToolCall {
            id: format!("xmltool_{}", uuid::Uuid::new_v4().simple()),
            name: parsed.name,
            arguments: parsed.arguments,
            source: ToolCallSource::Recovered,
        }],
        None => Vec::new(),
    }
}
