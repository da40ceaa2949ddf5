/// All database primary keys are PostgreSQL BIGSERIAL.
pub type DbId = i64;

/// Event timestamps are milliseconds since the Unix epoch (UTC).
pub type EpochMillis = i64;

/// Id of the synthetic root folder. It never exists as a storage row.
pub const ROOT_FOLDER_ID: DbId = 0;
