//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async query methods
//! that accept `&PgPool` as the first argument. Project-owned tables are
//! always filtered by `project_id`.

pub mod event_repo;
pub mod filter_repo;
pub mod folder_repo;
pub mod project_repo;
pub mod read_state_repo;
pub mod user_repo;

pub use event_repo::EventRepo;
pub use filter_repo::FilterRepo;
pub use folder_repo::FolderRepo;
pub use project_repo::ProjectRepo;
pub use read_state_repo::ReadStateRepo;
pub use user_repo::UserRepo;
