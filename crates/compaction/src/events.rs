//! Inbound compaction event, handler context and result types

use crate::model::ConversationMessage;
use serde::{Deserialize, Serialize};
use std::any::Any;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Name of the host event the safeguard handles
pub const SESSION_BEFORE_COMPACT: &str = "session_before_compact";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactionSettings {
    #[serde(default)]
    pub reserve_tokens: usize,
}

/// What the host is about to compact
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactionEvent {
    pub messages_to_summarize: Vec<ConversationMessage>,
    /// Earlier part of a split turn; empty unless `is_split_turn`
    #[serde(default)]
    pub turn_prefix_messages: Vec<ConversationMessage>,
    pub first_kept_entry_id: String,
    #[serde(default)]
    pub previous_summary: Option<String>,
    #[serde(default)]
    pub settings: CompactionSettings,
    #[serde(default)]
    pub is_split_turn: bool,
    #[serde(default)]
    pub custom_instructions: Option<String>,
    #[serde(skip)]
    pub signal: CancellationToken,
}

impl CompactionEvent {
    pub fn new(messages: Vec<ConversationMessage>, first_kept_entry_id: impl Into<String>) -> Self {
        Self {
            messages_to_summarize: messages,
            first_kept_entry_id: first_kept_entry_id.into(),
            ..Default::default()
        }
    }

    pub fn split_turn(mut self, prefix: Vec<ConversationMessage>) -> Self {
        self.turn_prefix_messages = prefix;
        self.is_split_turn = true;
        self
    }

    pub fn custom_instructions(mut self, instructions: impl Into<String>) -> Self {
        self.custom_instructions = Some(instructions.into());
        self
    }

    pub fn previous_summary(mut self, summary: impl Into<String>) -> Self {
        self.previous_summary = Some(summary.into());
        self
    }

    pub fn reserve_tokens(mut self, tokens: usize) -> Self {
        self.settings.reserve_tokens = tokens;
        self
    }

    pub fn with_signal(mut self, signal: CancellationToken) -> Self {
        self.signal = signal;
        self
    }
}

/// Active model as known to the host
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelSpec {
    pub provider: String,
    pub model: String,
    #[serde(default)]
    pub context_window: Option<usize>,
}

impl ModelSpec {
    pub fn new(provider: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            model: model.into(),
            context_window: None,
        }
    }

    pub fn context_window(mut self, tokens: usize) -> Self {
        self.context_window = Some(tokens);
        self
    }
}

/// Handle to the host's session manager, used only as a registry key
pub type SessionManagerRef = Arc<dyn Any + Send + Sync>;

/// Host context accompanying a compaction event
#[derive(Clone, Default)]
pub struct ExtensionContext {
    pub model: Option<ModelSpec>,
    /// `None` while the host's session manager is still initializing
    pub session_manager: Option<SessionManagerRef>,
}

impl ExtensionContext {
    pub fn new(session_manager: SessionManagerRef) -> Self {
        Self {
            model: None,
            session_manager: Some(session_manager),
        }
    }

    pub fn with_model(mut self, model: ModelSpec) -> Self {
        self.model = Some(model);
        self
    }

    pub fn model_context_window(&self) -> Option<usize> {
        self.model.as_ref().and_then(|m| m.context_window)
    }
}

impl std::fmt::Debug for ExtensionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExtensionContext")
            .field("model", &self.model)
            .field("has_session_manager", &self.session_manager.is_some())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompactionOutput {
    pub summary: String,
    pub first_kept_entry_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryResult {
    pub compaction: CompactionOutput,
}

impl SummaryResult {
    pub fn new(summary: String, first_kept_entry_id: String) -> Self {
        Self {
            compaction: CompactionOutput {
                summary,
                first_kept_entry_id,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_event_from_host_json() {
        let raw = json!({
            "messagesToSummarize": [{"role": "user", "content": "hi"}],
            "firstKeptEntryId": "entry-7",
            "settings": {"reserveTokens": 16384},
            "isSplitTurn": false
        });

        let event: CompactionEvent = serde_json::from_value(raw).unwrap();
        assert_eq!(event.messages_to_summarize.len(), 1);
        assert!(event.turn_prefix_messages.is_empty());
        assert_eq!(event.first_kept_entry_id, "entry-7");
        assert_eq!(event.settings.reserve_tokens, 16_384);
        assert!(!event.signal.is_cancelled());
    }

    #[test]
    fn test_summary_result_shape() {
        let result = SummaryResult::new("sum".to_string(), "entry-1".to_string());
        assert_eq!(
            serde_json::to_value(&result).unwrap(),
            json!({"compaction": {"summary": "sum", "firstKeptEntryId": "entry-1"}})
        );
    }
}
