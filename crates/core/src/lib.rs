//! Triage core domain: events, folders, filter rules, and condition
//! evaluation. No storage access; persistence goes through [`store::EventStore`].

pub mod condition;
pub mod error;
pub mod event;
pub mod filter;
pub mod folder;
pub mod hashing;
pub mod naming;
pub mod search;
pub mod store;
pub mod types;
