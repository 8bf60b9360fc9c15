//! Heuristic token estimation
//!
//! Used only for relative sizing decisions (chunk ratio, oversized detection,
//! history share), never for billing.

use crate::model::ConversationMessage;

/// Approximate characters per token
pub const CHARS_PER_TOKEN: usize = 4;

/// Trait for estimating token counts from text
pub trait TokenEstimator: Send + Sync {
    fn estimate(&self, text: &str) -> usize;

    /// Estimate the flattened textual content of a message
    fn estimate_message(&self, message: &ConversationMessage) -> usize {
        self.estimate(&message.flattened_text())
    }

    fn estimate_messages(&self, messages: &[ConversationMessage]) -> usize {
        messages.iter().map(|m| self.estimate_message(m)).sum()
    }
}

/// Simple token estimator using character count heuristic (~4 chars per token)
#[derive(Debug, Clone, Copy, Default)]
pub struct SimpleTokenEstimator;

impl TokenEstimator for SimpleTokenEstimator {
    fn estimate(&self, text: &str) -> usize {
        text.chars().count().div_ceil(CHARS_PER_TOKEN)
    }
}
