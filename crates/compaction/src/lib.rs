//! Compaction safeguard for querymt agent sessions
//!
//! Sits between the host's `session_before_compact` event and an external staged
//! summarizer. Before any history is handed to the summarizer the safeguard:
//!
//! - sizes each summarizer call from the average message size ([`chunking`])
//! - keeps messages too large to summarize out of the batch ([`chunking::route_oversized`])
//! - digests failed tool invocations into the instructions ([`tool_failures`])
//! - optionally injects a structured summary template ([`instructions`])
//!
//! Session setup registers per-session settings with [`set_runtime_config`]; the
//! handler ([`CompactionSafeguard`]) reads them back when the event fires.

pub mod chunking;
pub mod config;
pub mod error;
pub mod estimator;
pub mod events;
pub mod file_ops;
pub mod host;
pub mod instructions;
pub mod model;
pub mod registry;
pub mod safeguard;
pub mod summarizer;
pub mod tool_failures;

mod text;

#[cfg(test)]
pub mod test_utils;

pub use chunking::{adaptive_chunk_ratio, is_oversized};
pub use config::CompactionRuntimeConfig;
pub use error::{Result, SafeguardError};
pub use estimator::{SimpleTokenEstimator, TokenEstimator};
pub use events::{
    CompactionEvent, CompactionOutput, CompactionSettings, ExtensionContext, ModelSpec,
    SESSION_BEFORE_COMPACT, SummaryResult,
};
pub use host::{BeforeCompactHandler, ExtensionHost};
pub use model::{ContentBlock, ConversationMessage, MessageContent, MessageRole};
pub use registry::{RUNTIME_REGISTRY, RuntimeRegistry, get_runtime_config, set_runtime_config};
pub use safeguard::CompactionSafeguard;
pub use summarizer::{SummarizeRequest, Summarizer, SummaryStage};
pub use tool_failures::{ToolFailureRecord, collect_tool_failures, format_tool_failures};
