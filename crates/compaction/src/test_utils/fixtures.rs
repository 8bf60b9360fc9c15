//! Host-side fixtures

use crate::events::{ExtensionContext, SessionManagerRef};
use std::sync::Arc;

/// Stand-in for the host's session manager; only its identity matters
#[derive(Debug, Default, PartialEq)]
pub struct FakeSessionManager {
    pub session_id: String,
}

pub fn session_manager() -> Arc<FakeSessionManager> {
    Arc::new(FakeSessionManager {
        session_id: "sess-1".to_string(),
    })
}

pub fn context_for(sm: &Arc<FakeSessionManager>) -> ExtensionContext {
    ExtensionContext::new(Arc::clone(sm) as SessionManagerRef)
}
