//! Filter engine orchestration over any [`EventStore`].
//!
//! [`FilterEngine`] runs filters against events, hosts the folder and filter
//! services, and executes searches. Storage is reached only through the
//! [`EventStore`] contract; [`MemoryStore`] implements it in memory.
//!
//! [`EventStore`]: triage_core::store::EventStore

pub mod aggregator;
pub mod context;
pub mod engine;
pub mod filters;
pub mod folders;
pub mod memory;
pub mod search;

pub use aggregator::{ActionOutcome, DeferredActions, FlushSummary};
pub use context::RunContext;
pub use engine::{FilterEngine, RunReport};
pub use memory::{MemoryStore, StoreWrite};
