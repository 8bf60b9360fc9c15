//! Per-session compaction runtime configuration
//!
//! Session setup builds a [`CompactionRuntimeConfig`] (directly, or from a TOML
//! fragment) and stores it in the [`crate::registry`] before any compaction fires.
//!
//! ```toml
//! contextWindowTokens = 128000
//! structuredSummary = true
//! maxHistoryShare = 0.5
//! ```

use crate::error::{Result, SafeguardError};
use serde::{Deserialize, Serialize};

/// Default fraction of the context window one summarization call may target
pub const BASE_CHUNK_RATIO: f64 = 0.4;

/// Floor for the adaptive chunk ratio
pub const MIN_CHUNK_RATIO: f64 = 0.15;

/// Maximum number of tool failures listed in the digest
pub const MAX_TOOL_FAILURES: usize = 8;

/// Maximum characters kept from a failed tool's output
pub const MAX_TOOL_FAILURE_CHARS: usize = 240;

/// Context window used when neither the config nor the model provides one
pub const DEFAULT_CONTEXT_WINDOW_TOKENS: usize = 200_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct CompactionRuntimeConfig {
    /// Context window of the session's model. Falls back to the model info and
    /// then [`DEFAULT_CONTEXT_WINDOW_TOKENS`] when unset.
    #[serde(default)]
    pub context_window_tokens: Option<usize>,
    /// Inject the structured summary template into summarizer instructions
    #[serde(default)]
    pub structured_summary: bool,
    /// Largest share of the context window the summarized history may occupy
    #[serde(default)]
    pub max_history_share: Option<f64>,
    #[serde(default = "default_base_chunk_ratio")]
    pub base_chunk_ratio: f64,
    #[serde(default = "default_min_chunk_ratio")]
    pub min_chunk_ratio: f64,
    #[serde(default = "default_max_tool_failures")]
    pub max_tool_failures: usize,
    #[serde(default = "default_max_tool_failure_chars")]
    pub max_tool_failure_chars: usize,
}

fn default_base_chunk_ratio() -> f64 {
    BASE_CHUNK_RATIO
}

fn default_min_chunk_ratio() -> f64 {
    MIN_CHUNK_RATIO
}

fn default_max_tool_failures() -> usize {
    MAX_TOOL_FAILURES
}

fn default_max_tool_failure_chars() -> usize {
    MAX_TOOL_FAILURE_CHARS
}

impl Default for CompactionRuntimeConfig {
    fn default() -> Self {
        Self {
            context_window_tokens: None,
            structured_summary: false,
            max_history_share: None,
            base_chunk_ratio: BASE_CHUNK_RATIO,
            min_chunk_ratio: MIN_CHUNK_RATIO,
            max_tool_failures: MAX_TOOL_FAILURES,
            max_tool_failure_chars: MAX_TOOL_FAILURE_CHARS,
        }
    }
}

impl CompactionRuntimeConfig {
    pub fn with_context_window(tokens: usize) -> Self {
        Self {
            context_window_tokens: Some(tokens),
            ..Default::default()
        }
    }

    pub fn structured_summary(mut self, enabled: bool) -> Self {
        self.structured_summary = enabled;
        self
    }

    pub fn max_history_share(mut self, share: f64) -> Self {
        self.max_history_share = Some(share);
        self
    }

    pub fn chunk_ratios(mut self, base: f64, min: f64) -> Self {
        self.base_chunk_ratio = base;
        self.min_chunk_ratio = min;
        self
    }

    /// Parse and validate a TOML fragment
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.context_window_tokens == Some(0) {
            return Err(SafeguardError::InvalidConfig(
                "contextWindowTokens must be positive".to_string(),
            ));
        }
        validate_fraction("baseChunkRatio", self.base_chunk_ratio)?;
        validate_fraction("minChunkRatio", self.min_chunk_ratio)?;
        if self.min_chunk_ratio > self.base_chunk_ratio {
            return Err(SafeguardError::InvalidConfig(format!(
                "minChunkRatio ({}) must not exceed baseChunkRatio ({})",
                self.min_chunk_ratio, self.base_chunk_ratio
            )));
        }
        if let Some(share) = self.max_history_share {
            validate_fraction("maxHistoryShare", share)?;
        }
        if self.max_tool_failures == 0 {
            return Err(SafeguardError::InvalidConfig(
                "maxToolFailures must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Resolve the context window: config first, then the model, then the default
    pub fn effective_context_window(&self, model_window: Option<usize>) -> usize {
        self.context_window_tokens
            .or(model_window)
            .filter(|w| *w > 0)
            .unwrap_or(DEFAULT_CONTEXT_WINDOW_TOKENS)
    }
}

fn validate_fraction(name: &str, value: f64) -> Result<()> {
    if !(value > 0.0 && value <= 1.0) {
        return Err(SafeguardError::InvalidConfig(format!(
            "{} must be in (0, 1], got {}",
            name, value
        )));
    }
    Ok(())
}
