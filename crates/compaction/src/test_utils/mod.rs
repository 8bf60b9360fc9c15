//! Test utilities for compaction safeguard tests
//!
//! Shared fakes for the host session manager and the external summarizer.

pub mod fixtures;
pub mod mocks;

pub use fixtures::*;
pub use mocks::*;
