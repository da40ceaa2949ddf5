use crate::types::DbId;

/// Boxed backend error carried by [`CoreError::Storage`].
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Entity not found: {entity} with id {id}")]
    NotFound { entity: &'static str, id: DbId },

    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    /// A folder whose parent chain never reaches the root. Only corrupted
    /// data or a racing writer can produce this.
    #[error("Circular folder reference detected at folder {folder_id}")]
    CircularReference { folder_id: DbId },

    #[error("Unsupported {kind}: {value}")]
    UnsupportedOperator { kind: &'static str, value: String },

    #[error("Invalid pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Storage error: {0}")]
    Storage(#[source] BoxError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Wrap a backend error raised by a storage implementation.
    pub fn storage<E>(err: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        CoreError::Storage(Box::new(err))
    }
}
