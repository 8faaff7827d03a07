//! Conversion of free-text requests into structured task drafts, plus the todo store
//! the drafts end up in.

pub mod domain;
pub mod fallback;
pub mod logging;
pub mod metrics;
pub mod orchestrator;
pub mod parser;
pub mod prompt;
pub mod provider;
pub mod providers;
pub mod registry;
pub mod retry;
pub mod storage;
