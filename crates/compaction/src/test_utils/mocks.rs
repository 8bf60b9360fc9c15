//! Mock implementations for testing

use crate::error::{Result, SafeguardError};
use crate::summarizer::{SummarizeRequest, Summarizer};
use async_trait::async_trait;
use mockall::mock;
use parking_lot::Mutex;
use std::collections::VecDeque;
use tokio_util::sync::CancellationToken;

// ============================================================================
// MockSummarizer
// ============================================================================

mock! {
    pub Summarizer {}

    #[async_trait]
    impl Summarizer for Summarizer {
        async fn summarize(&self, request: SummarizeRequest) -> Result<String>;
    }
}

// ============================================================================
// RecordingSummarizer - queues summaries and records every request
// ============================================================================

pub struct RecordingSummarizer {
    responses: Mutex<VecDeque<String>>,
    requests: Mutex<Vec<SummarizeRequest>>,
    cancel_on_call: Option<CancellationToken>,
}

impl RecordingSummarizer {
    pub fn new(responses: Vec<String>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            requests: Mutex::new(Vec::new()),
            cancel_on_call: None,
        }
    }

    /// Fire `token` when called and never complete, like a provider stuck mid-request
    pub fn cancel_on_call(mut self, token: CancellationToken) -> Self {
        self.cancel_on_call = Some(token);
        self
    }

    pub fn requests(&self) -> Vec<SummarizeRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl Summarizer for RecordingSummarizer {
    async fn summarize(&self, request: SummarizeRequest) -> Result<String> {
        self.requests.lock().push(request);

        if let Some(token) = &self.cancel_on_call {
            token.cancel();
            std::future::pending::<()>().await;
        }

        self.responses
            .lock()
            .pop_front()
            .ok_or_else(|| SafeguardError::summarizer("mock", "no more mock responses available"))
    }
}
