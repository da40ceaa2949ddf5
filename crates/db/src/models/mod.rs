//! Row models.
//!
//! Each submodule contains a `FromRow` + `Serialize` struct matching the
//! database row and, where the engine consumes the row, a `TryFrom`
//! conversion into the domain type.

pub mod event;
pub mod filter;
pub mod folder;
pub mod project;
pub mod user;
