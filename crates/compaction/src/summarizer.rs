//! Seam to the external staged summarizer
//!
//! The safeguard never summarizes content itself. It sizes each call, assembles the
//! instructions and hands the batch to a [`Summarizer`]; chunking and looping inside
//! the summarizer are its own business.

use crate::error::Result;
use crate::events::ModelSpec;
use crate::model::ConversationMessage;
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// Which part of the compaction a summarizer call serves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryStage {
    /// Oldest history dropped to respect the configured history share
    DroppedHistory,
    /// The bulk of the history being compacted
    History,
    /// The early part of a split turn
    TurnPrefix,
}

impl SummaryStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            SummaryStage::DroppedHistory => "dropped_history",
            SummaryStage::History => "history",
            SummaryStage::TurnPrefix => "turn_prefix",
        }
    }
}

impl std::fmt::Display for SummaryStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parameters for one summarizer call
#[derive(Debug, Clone)]
pub struct SummarizeRequest {
    pub stage: SummaryStage,
    pub messages: Vec<ConversationMessage>,
    /// Fraction of the context window this call may target
    pub chunk_ratio: f64,
    /// `floor(context_window_tokens * chunk_ratio)`, at least 1
    pub token_budget: usize,
    pub context_window_tokens: usize,
    /// Tokens the host wants kept free
    pub reserve_tokens: usize,
    pub custom_instructions: Option<String>,
    pub previous_summary: Option<String>,
    pub model: Option<ModelSpec>,
    pub signal: CancellationToken,
}

#[async_trait]
pub trait Summarizer: Send + Sync {
    /// Summarize `request.messages`, returning the summary text.
    ///
    /// Implementations should observe `request.signal`; the safeguard additionally
    /// abandons the call as soon as the signal fires.
    async fn summarize(&self, request: SummarizeRequest) -> Result<String>;
}
