//! Sizing decisions for summarization calls
//!
//! - adaptive chunk ratio: how much of the context window one summarizer call may target
//! - oversized detection: messages that alone threaten half the window
//! - history share pruning: dropping the oldest history when it exceeds a configured
//!   share of the window

use crate::config::{BASE_CHUNK_RATIO, CompactionRuntimeConfig, MIN_CHUNK_RATIO};
use crate::estimator::{SimpleTokenEstimator, TokenEstimator};
use crate::model::{ContentBlock, ConversationMessage, MessageContent, MessageRole};
use crate::text::truncate_chars;

/// Average message size (as a fraction of the window) above which the ratio shrinks
pub const THRESHOLD_FRACTION: f64 = 0.10;

/// Headroom for estimator imprecision and summarizer prompt overhead
pub const SAFETY_MARGIN: f64 = 1.2;

/// Share of the window a single message may occupy before it is oversized
pub const OVERSIZED_WINDOW_SHARE: f64 = 0.5;

/// Characters of an oversized message kept in its placeholder
pub const OVERSIZED_EXCERPT_CHARS: usize = 1_000;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkRatioBounds {
    pub base: f64,
    pub min: f64,
}

impl Default for ChunkRatioBounds {
    fn default() -> Self {
        Self {
            base: BASE_CHUNK_RATIO,
            min: MIN_CHUNK_RATIO,
        }
    }
}

impl From<&CompactionRuntimeConfig> for ChunkRatioBounds {
    fn from(config: &CompactionRuntimeConfig) -> Self {
        Self {
            base: config.base_chunk_ratio,
            min: config.min_chunk_ratio.min(config.base_chunk_ratio),
        }
    }
}

/// Adaptive chunk ratio with the default bounds and estimator
pub fn adaptive_chunk_ratio(messages: &[ConversationMessage], context_window_tokens: usize) -> f64 {
    compute_adaptive_chunk_ratio(
        messages,
        context_window_tokens,
        &SimpleTokenEstimator,
        ChunkRatioBounds::default(),
    )
}

/// Fraction of the context window a single summarization call may target.
///
/// Returns `bounds.base` for empty input or when the average message stays within
/// [`THRESHOLD_FRACTION`] of the window. Beyond that the ratio shrinks hyperbolically
/// with the average size and is clamped to `[bounds.min, bounds.base]`.
pub fn compute_adaptive_chunk_ratio(
    messages: &[ConversationMessage],
    context_window_tokens: usize,
    estimator: &dyn TokenEstimator,
    bounds: ChunkRatioBounds,
) -> f64 {
    if messages.is_empty() {
        return bounds.base;
    }
    if context_window_tokens == 0 {
        return bounds.min;
    }

    let total_tokens = estimator.estimate_messages(messages) as f64;
    let avg_tokens = total_tokens / messages.len() as f64;
    let avg_fraction = avg_tokens / context_window_tokens as f64;

    if avg_fraction <= THRESHOLD_FRACTION {
        return bounds.base;
    }

    // f64::max/min ignore NaN operands; clamp would panic on them
    let raw = bounds.base * (THRESHOLD_FRACTION / avg_fraction);
    raw.min(bounds.base).max(bounds.min.min(bounds.base))
}

/// Token budget for one summarizer call (never zero)
pub fn chunk_token_budget(context_window_tokens: usize, chunk_ratio: f64) -> usize {
    ((context_window_tokens as f64 * chunk_ratio).floor() as usize).max(1)
}

pub fn is_oversized(message: &ConversationMessage, context_window_tokens: usize) -> bool {
    is_oversized_with(message, context_window_tokens, &SimpleTokenEstimator)
}

/// A message is oversized when its estimate, padded by [`SAFETY_MARGIN`], exceeds
/// half the context window.
pub fn is_oversized_with(
    message: &ConversationMessage,
    context_window_tokens: usize,
    estimator: &dyn TokenEstimator,
) -> bool {
    let tokens = estimator.estimate_message(message) as f64;
    tokens * SAFETY_MARGIN > context_window_tokens as f64 * OVERSIZED_WINDOW_SHARE
}

/// Batch with oversized messages replaced by placeholders
#[derive(Debug, Clone)]
pub struct OversizedRouting {
    pub messages: Vec<ConversationMessage>,
    pub replaced: usize,
}

/// Replace each oversized message with a placeholder carrying its role, approximate
/// size and an excerpt of its opening text. Tool-result identity fields are kept so
/// call/result pairing survives.
pub fn route_oversized(
    messages: &[ConversationMessage],
    context_window_tokens: usize,
    estimator: &dyn TokenEstimator,
) -> OversizedRouting {
    let mut replaced = 0;
    let messages = messages
        .iter()
        .map(|message| {
            if !is_oversized_with(message, context_window_tokens, estimator) {
                return message.clone();
            }
            replaced += 1;
            oversized_placeholder(message, estimator.estimate_message(message))
        })
        .collect();

    OversizedRouting { messages, replaced }
}

fn oversized_placeholder(message: &ConversationMessage, tokens: usize) -> ConversationMessage {
    let excerpt = truncate_chars(message.flattened_text().trim(), OVERSIZED_EXCERPT_CHARS);
    let note = format!(
        "[Large {} message (~{} tokens) omitted from summarization. Opening excerpt:]\n{}",
        message.role.as_str(),
        tokens,
        excerpt
    );
    ConversationMessage {
        content: MessageContent::Blocks(vec![ContentBlock::text(note)]),
        ..message.clone()
    }
}

/// Result of pruning history down to a share of the context window
#[derive(Debug, Clone, Default)]
pub struct HistoryPrune {
    /// Oldest messages removed from the batch, in original order
    pub dropped: Vec<ConversationMessage>,
    /// Remaining batch, in original order
    pub kept: Vec<ConversationMessage>,
}

impl HistoryPrune {
    pub fn dropped_any(&self) -> bool {
        !self.dropped.is_empty()
    }
}

/// Drop the oldest messages until the batch fits within `max_share` of the window.
///
/// At least the newest message is always kept. Tool results left at the head of the
/// kept batch are dropped with their calls so the batch never opens with an orphaned
/// result.
pub fn prune_history_for_context_share(
    messages: &[ConversationMessage],
    context_window_tokens: usize,
    max_share: f64,
    estimator: &dyn TokenEstimator,
) -> HistoryPrune {
    let budget = (context_window_tokens as f64 * max_share).floor() as usize;
    let sizes: Vec<usize> = messages
        .iter()
        .map(|m| estimator.estimate_message(m))
        .collect();
    let mut total: usize = sizes.iter().sum();

    let mut cut = 0;
    while total > budget && cut + 1 < messages.len() {
        total -= sizes[cut];
        cut += 1;
    }
    if cut > 0 {
        while cut + 1 < messages.len() && messages[cut].role == MessageRole::ToolResult {
            cut += 1;
        }
    }

    HistoryPrune {
        dropped: messages[..cut].to_vec(),
        kept: messages[cut..].to_vec(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn msg_of_tokens(tokens: usize) -> ConversationMessage {
        ConversationMessage::user("x".repeat(tokens * 4))
    }

    #[test]
    fn test_empty_messages_return_base() {
        assert_eq!(adaptive_chunk_ratio(&[], 1_000), BASE_CHUNK_RATIO);
        assert_eq!(adaptive_chunk_ratio(&[], 0), BASE_CHUNK_RATIO);
        assert_eq!(adaptive_chunk_ratio(&[], usize::MAX), BASE_CHUNK_RATIO);
    }

    #[test]
    fn test_small_messages_return_base() {
        let messages = vec![msg_of_tokens(10), msg_of_tokens(20)];
        assert_eq!(adaptive_chunk_ratio(&messages, 10_000), BASE_CHUNK_RATIO);
    }

    #[test]
    fn test_threshold_is_inclusive() {
        // avg = 100 tokens = exactly 10% of 1000
        let messages = vec![msg_of_tokens(100)];
        assert_eq!(adaptive_chunk_ratio(&messages, 1_000), BASE_CHUNK_RATIO);
    }

    #[test]
    fn test_large_messages_scale_down() {
        // avg fraction 0.2 -> 0.4 * 0.5 = 0.2
        let messages = vec![msg_of_tokens(200), msg_of_tokens(200)];
        let ratio = adaptive_chunk_ratio(&messages, 1_000);
        assert!((ratio - 0.2).abs() < 1e-9, "ratio was {}", ratio);
    }

    #[test]
    fn test_huge_messages_clamp_to_min() {
        let messages = vec![msg_of_tokens(5_000)];
        assert_eq!(adaptive_chunk_ratio(&messages, 1_000), MIN_CHUNK_RATIO);
        assert_eq!(adaptive_chunk_ratio(&messages, 0), MIN_CHUNK_RATIO);
    }

    #[test]
    fn test_ratio_stays_in_bounds_and_is_non_increasing() {
        let window = 10_000;
        let mut last = f64::INFINITY;
        for tokens in (0..20_000).step_by(250) {
            let ratio = adaptive_chunk_ratio(&[msg_of_tokens(tokens)], window);
            assert!((MIN_CHUNK_RATIO..=BASE_CHUNK_RATIO).contains(&ratio));
            assert!(ratio <= last, "ratio increased at {} tokens", tokens);
            last = ratio;
        }
    }

    #[test]
    fn test_custom_bounds() {
        let bounds = ChunkRatioBounds {
            base: 0.5,
            min: 0.25,
        };
        let messages = vec![msg_of_tokens(10_000)];
        let ratio =
            compute_adaptive_chunk_ratio(&messages, 1_000, &SimpleTokenEstimator, bounds);
        assert_eq!(ratio, 0.25);
        assert_eq!(
            compute_adaptive_chunk_ratio(&[], 1_000, &SimpleTokenEstimator, bounds),
            0.5
        );
    }

    #[test]
    fn test_nan_bounds_do_not_panic() {
        let messages = vec![msg_of_tokens(5_000)];
        let nan_base = ChunkRatioBounds {
            base: f64::NAN,
            min: 0.1,
        };
        let ratio =
            compute_adaptive_chunk_ratio(&messages, 1_000, &SimpleTokenEstimator, nan_base);
        assert_eq!(ratio, 0.1);

        let nan_min = ChunkRatioBounds {
            base: 0.4,
            min: f64::NAN,
        };
        let ratio = compute_adaptive_chunk_ratio(&messages, 1_000, &SimpleTokenEstimator, nan_min);
        assert!(!ratio.is_nan());
    }

    #[test]
    fn test_bounds_from_config_never_invert() {
        let config = CompactionRuntimeConfig::default().chunk_ratios(0.2, 0.3);
        let bounds = ChunkRatioBounds::from(&config);
        assert!(bounds.min <= bounds.base);
    }

    #[test]
    fn test_chunk_token_budget() {
        assert_eq!(chunk_token_budget(100_000, 0.4), 40_000);
        assert_eq!(chunk_token_budget(10, 0.05), 1);
        assert_eq!(chunk_token_budget(0, 0.4), 1);
    }

    #[test]
    fn test_oversized_boundary() {
        // 1000 window -> limit 500; 416 * 1.2 = 499.2, 417 * 1.2 = 500.4
        assert!(!is_oversized(&msg_of_tokens(416), 1_000));
        assert!(is_oversized(&msg_of_tokens(417), 1_000));
    }

    #[test]
    fn test_oversized_is_monotonic() {
        let window = 2_000;
        let mut seen_oversized = false;
        for tokens in (0..4_000).step_by(50) {
            let oversized = is_oversized(&msg_of_tokens(tokens), window);
            assert!(!seen_oversized || oversized);
            seen_oversized |= oversized;
        }
        assert!(seen_oversized);

        let message = msg_of_tokens(1_000);
        let mut was_oversized = true;
        for window in (500..10_000).step_by(500) {
            let oversized = is_oversized(&message, window);
            assert!(was_oversized || !oversized);
            was_oversized = oversized;
        }
    }

    #[test]
    fn test_route_oversized_replaces_only_large_messages() {
        let big = ConversationMessage::tool_result("c1", "read", "y".repeat(8_000), false);
        let messages = vec![msg_of_tokens(10), big];

        let routed = route_oversized(&messages, 1_000, &SimpleTokenEstimator);
        assert_eq!(routed.replaced, 1);
        assert_eq!(routed.messages[0], messages[0]);

        let placeholder = &routed.messages[1];
        assert_eq!(placeholder.tool_call_id.as_deref(), Some("c1"));
        let text = placeholder.first_text().unwrap();
        assert!(text.starts_with("[Large toolResult message (~2000 tokens)"));
        assert!(!is_oversized(placeholder, 1_000));
    }

    #[test]
    fn test_prune_keeps_everything_within_budget() {
        let messages = vec![msg_of_tokens(10), msg_of_tokens(10)];
        let prune = prune_history_for_context_share(&messages, 1_000, 0.5, &SimpleTokenEstimator);
        assert!(!prune.dropped_any());
        assert_eq!(prune.kept.len(), 2);
    }

    #[test]
    fn test_prune_drops_oldest_first() {
        let messages = vec![
            msg_of_tokens(300),
            msg_of_tokens(300),
            msg_of_tokens(100),
            msg_of_tokens(100),
        ];
        let prune = prune_history_for_context_share(&messages, 1_000, 0.5, &SimpleTokenEstimator);
        assert_eq!(prune.dropped.len(), 1);
        assert_eq!(prune.kept.len(), 3);
        assert_eq!(SimpleTokenEstimator.estimate_messages(&prune.kept), 500);
    }

    #[test]
    fn test_prune_does_not_leave_orphaned_tool_result() {
        let messages = vec![
            msg_of_tokens(400),
            ConversationMessage::tool_result("c1", "bash", "z".repeat(400), false),
            msg_of_tokens(100),
        ];
        let prune = prune_history_for_context_share(&messages, 1_000, 0.3, &SimpleTokenEstimator);
        assert_eq!(prune.dropped.len(), 2);
        assert_eq!(prune.kept[0].role, MessageRole::User);
    }

    #[test]
    fn test_prune_always_keeps_newest_message() {
        let messages = vec![msg_of_tokens(5_000), msg_of_tokens(5_000)];
        let prune = prune_history_for_context_share(&messages, 1_000, 0.1, &SimpleTokenEstimator);
        assert_eq!(prune.dropped.len(), 1);
        assert_eq!(prune.kept.len(), 1);
    }
}
