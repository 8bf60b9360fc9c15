//! Host extension seam
//!
//! The host session manager owns event dispatch. Extensions register a handler for
//! the `session_before_compact` event; when the host decides to compact it invokes
//! the handler and persists the returned summary itself.

use crate::error::Result;
use crate::events::{CompactionEvent, ExtensionContext, SummaryResult};
use async_trait::async_trait;
use std::sync::Arc;

#[async_trait]
pub trait BeforeCompactHandler: Send + Sync {
    async fn on_before_compact(
        &self,
        event: CompactionEvent,
        ctx: &ExtensionContext,
    ) -> Result<SummaryResult>;
}

/// Registration surface the host exposes to extensions
pub trait ExtensionHost {
    fn on_session_before_compact(&mut self, handler: Arc<dyn BeforeCompactHandler>);
}
