//! Conversation messages as handed over by the host session manager.
//!
//! The JSON shape mirrors the host's conversation log (camelCase keys, content either
//! a plain string or a list of typed blocks) so hosts can pass history straight through.

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum MessageRole {
    User,
    Assistant,
    ToolResult,
    System,
}

impl MessageRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
            MessageRole::ToolResult => "toolResult",
            MessageRole::System => "system",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ContentBlock {
    Text {
        text: String,
    },
    Thinking {
        thinking: String,
    },
    Image {
        #[serde(rename = "mimeType")]
        mime_type: String,
        data: String,
    },
    ToolCall {
        id: String,
        name: String,
        #[serde(default)]
        arguments: Value,
    },
}

impl ContentBlock {
    pub fn text(text: impl Into<String>) -> Self {
        ContentBlock::Text { text: text.into() }
    }

    pub fn tool_call(id: impl Into<String>, name: impl Into<String>, arguments: Value) -> Self {
        ContentBlock::ToolCall {
            id: id.into(),
            name: name.into(),
            arguments,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Blocks(Vec::new())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ConversationMessage {
    pub role: MessageRole,
    #[serde(default)]
    pub content: MessageContent,
    /// Unix timestamp in milliseconds
    #[serde(default)]
    pub timestamp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub is_error: bool,
    /// Free-form diagnostic fields attached by the tool (exit status, etc.)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ConversationMessage {
    pub fn new(role: MessageRole, content: MessageContent) -> Self {
        Self {
            role,
            content,
            timestamp: now_millis(),
            tool_call_id: None,
            tool_name: None,
            is_error: false,
            details: None,
        }
    }

    pub fn user(text: impl Into<String>) -> Self {
        Self::new(MessageRole::User, MessageContent::Text(text.into()))
    }

    pub fn system(text: impl Into<String>) -> Self {
        Self::new(MessageRole::System, MessageContent::Text(text.into()))
    }

    pub fn assistant(text: impl Into<String>) -> Self {
        Self::new(
            MessageRole::Assistant,
            MessageContent::Blocks(vec![ContentBlock::text(text)]),
        )
    }

    pub fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self::new(MessageRole::Assistant, MessageContent::Blocks(blocks))
    }

    pub fn tool_result(
        tool_call_id: impl Into<String>,
        tool_name: impl Into<String>,
        output: impl Into<String>,
        is_error: bool,
    ) -> Self {
        let output = output.into();
        let blocks = if output.is_empty() {
            Vec::new()
        } else {
            vec![ContentBlock::text(output)]
        };
        Self {
            tool_call_id: Some(tool_call_id.into()),
            tool_name: Some(tool_name.into()),
            is_error,
            ..Self::new(MessageRole::ToolResult, MessageContent::Blocks(blocks))
        }
    }

    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_timestamp(mut self, timestamp: i64) -> Self {
        self.timestamp = timestamp;
        self
    }

    pub fn is_tool_error(&self) -> bool {
        self.role == MessageRole::ToolResult && self.is_error
    }

    /// Iterate over the text blocks of this message, in order
    pub fn text_blocks(&self) -> impl Iterator<Item = &str> {
        let (plain, blocks): (Option<&str>, &[ContentBlock]) = match &self.content {
            MessageContent::Text(text) => (Some(text.as_str()), &[]),
            MessageContent::Blocks(blocks) => (None, blocks.as_slice()),
        };
        plain.into_iter().chain(blocks.iter().filter_map(|b| match b {
            ContentBlock::Text { text } => Some(text.as_str()),
            _ => None,
        }))
    }

    pub fn first_text(&self) -> Option<&str> {
        self.text_blocks().next()
    }

    /// Tool calls issued by this message as `(id, name, arguments)`
    pub fn tool_calls(&self) -> impl Iterator<Item = (&str, &str, &Value)> {
        let blocks: &[ContentBlock] = match &self.content {
            MessageContent::Blocks(blocks) => blocks,
            MessageContent::Text(_) => &[],
        };
        blocks.iter().filter_map(|b| match b {
            ContentBlock::ToolCall {
                id,
                name,
                arguments,
            } => Some((id.as_str(), name.as_str(), arguments)),
            _ => None,
        })
    }

    /// Concatenation of every text-bearing part of the message.
    ///
    /// Images contribute nothing; tool calls contribute their name and serialized
    /// arguments.
    pub fn flattened_text(&self) -> String {
        match &self.content {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Blocks(blocks) => {
                let mut out = String::new();
                for block in blocks {
                    match block {
                        ContentBlock::Text { text } => out.push_str(text),
                        ContentBlock::Thinking { thinking } => out.push_str(thinking),
                        ContentBlock::ToolCall {
                            name, arguments, ..
                        } => {
                            out.push_str(name);
                            if !arguments.is_null() {
                                out.push_str(&arguments.to_string());
                            }
                        }
                        ContentBlock::Image { .. } => {}
                    }
                }
                out
            }
        }
    }
}

fn now_millis() -> i64 {
    (time::OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_deserialize_host_tool_result() {
        let raw = json!({
            "role": "toolResult",
            "toolCallId": "call_1",
            "toolName": "bash",
            "isError": true,
            "content": [{"type": "text", "text": "command not found"}],
            "details": {"exitCode": 127},
            "timestamp": 1700000000000i64
        });

        let msg: ConversationMessage = serde_json::from_value(raw).unwrap();
        assert_eq!(msg.role, MessageRole::ToolResult);
        assert!(msg.is_tool_error());
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));
        assert_eq!(msg.first_text(), Some("command not found"));
        assert_eq!(msg.details, Some(json!({"exitCode": 127})));
    }

    #[test]
    fn test_plain_string_content() {
        let raw = json!({"role": "user", "content": "hello"});
        let msg: ConversationMessage = serde_json::from_value(raw).unwrap();
        assert_eq!(msg.content, MessageContent::Text("hello".to_string()));
        assert_eq!(msg.timestamp, 0);
        assert_eq!(msg.text_blocks().collect::<Vec<_>>(), vec!["hello"]);
    }

    #[test]
    fn test_flattened_text_skips_images() {
        let msg = ConversationMessage::assistant_blocks(vec![
            ContentBlock::Thinking {
                thinking: "hmm".to_string(),
            },
            ContentBlock::Image {
                mime_type: "image/png".to_string(),
                data: "AAAA".repeat(100),
            },
            ContentBlock::text("done"),
            ContentBlock::tool_call("c1", "read", json!({"path": "a.rs"})),
        ]);

        assert_eq!(msg.flattened_text(), r#"hmmdoneread{"path":"a.rs"}"#);
        assert_eq!(msg.first_text(), Some("done"));
        assert_eq!(msg.tool_calls().count(), 1);
    }

    #[test]
    fn test_tool_result_with_empty_output_has_no_blocks() {
        let msg = ConversationMessage::tool_result("c1", "bash", "", true);
        assert_eq!(msg.first_text(), None);
        assert_eq!(msg.role.as_str(), "toolResult");
    }
}
