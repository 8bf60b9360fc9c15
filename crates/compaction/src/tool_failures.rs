//! Tool failure digest
//!
//! Failed tool invocations are diagnostic signal the resumed agent needs to avoid
//! repeating mistakes, so they are collected from the history being compacted and
//! rendered as a bounded markdown section appended to summarizer instructions.

use crate::config::{MAX_TOOL_FAILURE_CHARS, MAX_TOOL_FAILURES};
use crate::model::ConversationMessage;
use crate::text::{normalize_whitespace, truncate_chars};
use serde_json::Value;
use std::collections::HashSet;

pub const TOOL_FAILURES_HEADING: &str = "## Tool Failures";

/// Excerpt used when a failed tool produced no text output
pub const EMPTY_FAILURE_EXCERPT: &str = "failed";

const MAX_META_VALUE_CHARS: usize = 80;

#[derive(Debug, Clone, PartialEq)]
pub struct ToolFailureRecord {
    pub tool_call_id: String,
    pub tool_name: String,
    /// Scalar fields from the tool result's `details`, in stored order
    pub meta_fields: Vec<(String, String)>,
    pub excerpt: String,
}

impl ToolFailureRecord {
    fn from_message(message: &ConversationMessage, max_chars: usize) -> Self {
        let excerpt = message
            .first_text()
            .map(normalize_whitespace)
            .filter(|text| !text.is_empty())
            .map(|text| truncate_chars(&text, max_chars))
            .unwrap_or_else(|| EMPTY_FAILURE_EXCERPT.to_string());

        Self {
            tool_call_id: message.tool_call_id.clone().unwrap_or_default(),
            tool_name: message
                .tool_name
                .clone()
                .unwrap_or_else(|| "tool".to_string()),
            meta_fields: extract_meta_fields(message.details.as_ref()),
            excerpt,
        }
    }

    fn render_line(&self) -> String {
        if self.meta_fields.is_empty() {
            return format!("- {}: {}", self.tool_name, self.excerpt);
        }
        let meta = self
            .meta_fields
            .iter()
            .map(|(k, v)| format!("{}={}", k, v))
            .collect::<Vec<_>>()
            .join(" ");
        format!("- {} ({}): {}", self.tool_name, meta, self.excerpt)
    }
}

/// Collect failed tool results in order, keeping the first record per call id.
/// Results without a call id are never merged.
pub fn collect_tool_failures(messages: &[ConversationMessage]) -> Vec<ToolFailureRecord> {
    collect_tool_failures_with(messages, MAX_TOOL_FAILURE_CHARS)
}

pub fn collect_tool_failures_with(
    messages: &[ConversationMessage],
    max_excerpt_chars: usize,
) -> Vec<ToolFailureRecord> {
    let mut seen = HashSet::new();
    messages
        .iter()
        .filter(|m| m.is_tool_error())
        .filter(|m| match m.tool_call_id.as_deref() {
            Some(id) => seen.insert(id.to_string()),
            None => true,
        })
        .map(|m| ToolFailureRecord::from_message(m, max_excerpt_chars))
        .collect()
}

/// Render the digest, or an empty string when there is nothing to report
pub fn format_tool_failures(records: &[ToolFailureRecord]) -> String {
    format_tool_failures_with(records, MAX_TOOL_FAILURES)
}

pub fn format_tool_failures_with(records: &[ToolFailureRecord], max_records: usize) -> String {
    if records.is_empty() {
        return String::new();
    }

    let mut lines = Vec::with_capacity(records.len().min(max_records) + 2);
    lines.push(TOOL_FAILURES_HEADING.to_string());
    lines.extend(records.iter().take(max_records).map(|r| r.render_line()));
    if records.len() > max_records {
        lines.push(format!("- ...and {} more", records.len() - max_records));
    }
    lines.join("\n")
}

/// Scalar entries of a `details` mapping. Anything that is not an object yields no
/// fields; nested values are skipped.
fn extract_meta_fields(details: Option<&Value>) -> Vec<(String, String)> {
    let Some(Value::Object(map)) = details else {
        return Vec::new();
    };
    map.iter()
        .filter_map(|(key, value)| {
            let rendered = match value {
                Value::String(s) => normalize_whitespace(s),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            if rendered.is_empty() {
                return None;
            }
            Some((key.clone(), truncate_chars(&rendered, MAX_META_VALUE_CHARS)))
        })
        .collect()
}
