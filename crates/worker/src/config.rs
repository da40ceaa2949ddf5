use std::str::FromStr;

use triage_core::types::DbId;

/// Output format of the `fmt` tracing layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}', expected 'text' or 'json'")),
        }
    }
}

/// Worker configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub database_url: String,
    /// Pool size (default: `5`).
    pub max_connections: u32,
    /// The project every command operates on.
    pub project_id: DbId,
    pub log_format: LogFormat,
}

impl WorkerConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var                    | Default  |
    /// |----------------------------|----------|
    /// | `DATABASE_URL`             | required |
    /// | `DATABASE_MAX_CONNECTIONS` | `5`      |
    /// | `TRIAGE_PROJECT_ID`        | required |
    /// | `LOG_FORMAT`               | `text`   |
    pub fn from_env() -> Self {
        let database_url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");

        let max_connections: u32 = std::env::var("DATABASE_MAX_CONNECTIONS")
            .unwrap_or_else(|_| "5".into())
            .parse()
            .expect("DATABASE_MAX_CONNECTIONS must be a valid u32");

        let project_id: DbId = std::env::var("TRIAGE_PROJECT_ID")
            .expect("TRIAGE_PROJECT_ID must be set")
            .parse()
            .expect("TRIAGE_PROJECT_ID must be a valid i64");

        let log_format: LogFormat = std::env::var("LOG_FORMAT")
            .unwrap_or_else(|_| "text".into())
            .parse()
            .expect("LOG_FORMAT must be 'text' or 'json'");

        Self {
            database_url,
            max_connections,
            project_id,
            log_format,
        }
    }
}
