//! Worker components
//!
//! The `Orchestrator` owns the loop; the rest are thin handles over the
//! shared store that it and the discovery crawlers pass around:
//!
//! - `Frontier`: URL queue with atomic claims and crash recovery
//! - `QueryLedger`: executed search queries and their freshness
//! - `JobStore`: job records and progress counters
//! - `ContactBook`: region validation and contact upserts
//! - `UrlProcessor`: the per-URL fetch, extract and store pipeline

mod contacts;
mod frontier;
mod jobs;
mod ledger;
mod orchestrator;
mod processor;
mod shutdown;

pub use contacts::ContactBook;
pub use frontier::{frontier_key, Frontier};
pub use jobs::{JobStore, ORPHAN_REASON};
pub use ledger::QueryLedger;
pub use orchestrator::{Orchestrator, RecoveryReport};
pub use processor::UrlProcessor;
pub use shutdown::Shutdown;
