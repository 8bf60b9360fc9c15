//! Compaction orchestrator
//!
//! Handles the host's `session_before_compact` event in a single pass:
//!
//! 1. Look up the session's runtime config (defaults when none is registered)
//! 2. Optionally drop history beyond `maxHistoryShare`, summarizing it separately
//! 3. Size the history call (adaptive chunk ratio) and route oversized messages
//! 4. Summarize the history with template / custom instructions / tool failures
//! 5. For split turns, summarize the turn prefix in a second, independent call
//! 6. Append the file operations digest and return the summary
//!
//! Summarizer calls run strictly one after another. Any failure, including
//! cancellation, aborts the whole compaction; nothing is retried or fabricated.

use crate::chunking::{
    ChunkRatioBounds, chunk_token_budget, compute_adaptive_chunk_ratio,
    prune_history_for_context_share, route_oversized,
};
use crate::config::CompactionRuntimeConfig;
use crate::error::{Result, SafeguardError};
use crate::estimator::{SimpleTokenEstimator, TokenEstimator};
use crate::events::{
    CompactionEvent, ExtensionContext, ModelSpec, SESSION_BEFORE_COMPACT, SummaryResult,
};
use crate::file_ops::FileOperations;
use crate::host::{BeforeCompactHandler, ExtensionHost};
use crate::instructions::{history_instructions, turn_prefix_instructions};
use crate::model::ConversationMessage;
use crate::registry::{RUNTIME_REGISTRY, RuntimeRegistry};
use crate::summarizer::{SummarizeRequest, Summarizer, SummaryStage};
use crate::tool_failures::{collect_tool_failures_with, format_tool_failures_with};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Separator between the history summary and the split-turn prefix summary
pub const SPLIT_TURN_SEPARATOR: &str = "\n\n---\n\n**Turn Context (split turn):**\n\n";

/// Per-event values shared by every summarizer call
struct CallContext {
    context_window_tokens: usize,
    bounds: ChunkRatioBounds,
    reserve_tokens: usize,
    model: Option<ModelSpec>,
    signal: CancellationToken,
}

pub struct CompactionSafeguard {
    summarizer: Arc<dyn Summarizer>,
    estimator: Arc<dyn TokenEstimator>,
    registry: Arc<RuntimeRegistry>,
}

impl CompactionSafeguard {
    /// Safeguard backed by the process-wide runtime registry
    pub fn new(summarizer: Arc<dyn Summarizer>) -> Self {
        Self {
            summarizer,
            estimator: Arc::new(SimpleTokenEstimator),
            registry: Arc::clone(&RUNTIME_REGISTRY),
        }
    }

    pub fn with_estimator(mut self, estimator: Arc<dyn TokenEstimator>) -> Self {
        self.estimator = estimator;
        self
    }

    pub fn with_registry(mut self, registry: Arc<RuntimeRegistry>) -> Self {
        self.registry = registry;
        self
    }

    /// Register this safeguard as the host's `session_before_compact` handler
    pub fn install(self: Arc<Self>, host: &mut dyn ExtensionHost) {
        debug!("Installing compaction safeguard on {}", SESSION_BEFORE_COMPACT);
        host.on_session_before_compact(self);
    }

    #[tracing::instrument(
        name = "compaction_safeguard",
        skip_all,
        fields(
            messages = event.messages_to_summarize.len(),
            split_turn = event.is_split_turn
        )
    )]
    pub async fn compact(
        &self,
        event: CompactionEvent,
        ctx: &ExtensionContext,
    ) -> Result<SummaryResult> {
        let runtime = self
            .registry
            .get(ctx.session_manager.as_ref())
            .unwrap_or_else(|| {
                debug!("No compaction runtime config registered for session; using defaults");
                CompactionRuntimeConfig::default()
            });
        runtime.validate()?;

        let CompactionEvent {
            messages_to_summarize,
            turn_prefix_messages,
            first_kept_entry_id,
            previous_summary,
            settings,
            is_split_turn,
            custom_instructions,
            signal,
        } = event;

        let call = CallContext {
            context_window_tokens: runtime.effective_context_window(ctx.model_context_window()),
            bounds: ChunkRatioBounds::from(&runtime),
            reserve_tokens: settings.reserve_tokens,
            model: ctx.model.clone(),
            signal,
        };
        let custom = custom_instructions.as_deref();

        let file_ops =
            FileOperations::collect(messages_to_summarize.iter().chain(&turn_prefix_messages));
        let history_failures = self.tool_failure_digest(&messages_to_summarize, &runtime);

        let mut history = messages_to_summarize;
        let mut previous_summary = previous_summary;
        if let Some(share) = runtime.max_history_share {
            let prune = prune_history_for_context_share(
                &history,
                call.context_window_tokens,
                share,
                self.estimator.as_ref(),
            );
            if prune.dropped_any() {
                info!(
                    "Dropping {} oldest messages beyond {:.0}% history share of {} tokens",
                    prune.dropped.len(),
                    share * 100.0,
                    call.context_window_tokens
                );
                let dropped_summary = self
                    .summarize_stage(
                        SummaryStage::DroppedHistory,
                        prune.dropped,
                        history_instructions(custom, runtime.structured_summary, ""),
                        previous_summary.take(),
                        &call,
                    )
                    .await?;
                previous_summary = Some(dropped_summary);
                history = prune.kept;
            }
        }

        let mut summary = self
            .summarize_stage(
                SummaryStage::History,
                history,
                history_instructions(custom, runtime.structured_summary, &history_failures),
                previous_summary,
                &call,
            )
            .await?;

        if is_split_turn {
            if turn_prefix_messages.is_empty() {
                warn!("Split turn reported without turn prefix messages; skipping prefix summary");
            } else {
                // Each call's digest covers only the messages handed to that call
                let prefix_failures = self.tool_failure_digest(&turn_prefix_messages, &runtime);
                let prefix_summary = self
                    .summarize_stage(
                        SummaryStage::TurnPrefix,
                        turn_prefix_messages,
                        turn_prefix_instructions(
                            custom,
                            runtime.structured_summary,
                            &prefix_failures,
                        ),
                        None,
                        &call,
                    )
                    .await?;
                summary.push_str(SPLIT_TURN_SEPARATOR);
                summary.push_str(&prefix_summary);
            }
        }

        let file_digest = file_ops.format();
        if !file_digest.is_empty() {
            summary.push_str("\n\n");
            summary.push_str(&file_digest);
        }

        info!(
            "Compaction summary ready: {} chars, first kept entry {}",
            summary.len(),
            first_kept_entry_id
        );
        Ok(SummaryResult::new(summary, first_kept_entry_id))
    }

    fn tool_failure_digest(
        &self,
        messages: &[ConversationMessage],
        runtime: &CompactionRuntimeConfig,
    ) -> String {
        let records = collect_tool_failures_with(messages, runtime.max_tool_failure_chars);
        if !records.is_empty() {
            debug!("Collected {} tool failures for summary", records.len());
        }
        format_tool_failures_with(&records, runtime.max_tool_failures)
    }

    async fn summarize_stage(
        &self,
        stage: SummaryStage,
        messages: Vec<ConversationMessage>,
        custom_instructions: Option<String>,
        previous_summary: Option<String>,
        call: &CallContext,
    ) -> Result<String> {
        let chunk_ratio = compute_adaptive_chunk_ratio(
            &messages,
            call.context_window_tokens,
            self.estimator.as_ref(),
            call.bounds,
        );
        let token_budget = chunk_token_budget(call.context_window_tokens, chunk_ratio);

        let routed = route_oversized(&messages, call.context_window_tokens, self.estimator.as_ref());
        if routed.replaced > 0 {
            warn!(
                "{} oversized message(s) in {} batch replaced with excerpts",
                routed.replaced, stage
            );
        }

        debug!(
            "Summarizing {} messages ({}): chunk_ratio={:.3}, token_budget={}, window={}",
            routed.messages.len(),
            stage,
            chunk_ratio,
            token_budget,
            call.context_window_tokens
        );

        if call.signal.is_cancelled() {
            return Err(SafeguardError::Cancelled);
        }

        let request = SummarizeRequest {
            stage,
            messages: routed.messages,
            chunk_ratio,
            token_budget,
            context_window_tokens: call.context_window_tokens,
            reserve_tokens: call.reserve_tokens,
            custom_instructions,
            previous_summary,
            model: call.model.clone(),
            signal: call.signal.clone(),
        };

        tokio::select! {
            biased;
            _ = call.signal.cancelled() => {
                debug!("Summarizer call ({}) cancelled", stage);
                Err(SafeguardError::Cancelled)
            }
            result = self.summarizer.summarize(request) => result,
        }
    }
}

#[async_trait]
impl BeforeCompactHandler for CompactionSafeguard {
    async fn on_before_compact(
        &self,
        event: CompactionEvent,
        ctx: &ExtensionContext,
    ) -> Result<SummaryResult> {
        self.compact(event, ctx).await
    }
}
