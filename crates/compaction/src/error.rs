//! Error types for the compaction safeguard

use thiserror::Error;

/// Errors surfaced by the compaction safeguard.
///
/// Summarizer failures are passed through as returned by the [`crate::Summarizer`]
/// implementation; the safeguard never wraps, retries or replaces them.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum SafeguardError {
    /// The event's cancellation signal fired before or during a summarizer call
    #[error("compaction cancelled")]
    Cancelled,

    /// The external summarizer failed
    #[error("summarizer failed ({stage}): {reason}")]
    Summarizer { stage: String, reason: String },

    /// Runtime configuration failed validation
    #[error("invalid compaction config: {0}")]
    InvalidConfig(String),

    /// Runtime configuration could not be parsed
    #[error("failed to parse compaction config: {0}")]
    ConfigParse(#[from] toml::de::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SafeguardError {
    pub fn summarizer(stage: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Summarizer {
            stage: stage.into(),
            reason: reason.into(),
        }
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, SafeguardError::Cancelled)
    }
}

/// Convenience type alias for Result with SafeguardError
pub type Result<T> = std::result::Result<T, SafeguardError>;
