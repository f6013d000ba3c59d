pub mod connection;
pub mod migrations;

pub use connection::{get_database_pool, DatabaseManager};
pub use migrations::{run_migrations, MigrationManager, MigrationRecord};

use chrono::{DateTime, Utc};

use crate::error::{AppError, Result};

/// Timestamps are stored as RFC 3339 text.
pub(crate) fn format_timestamp(value: &DateTime<Utc>) -> String {
    value.to_rfc3339()
}

pub(crate) fn parse_timestamp(value: Option<String>) -> Result<Option<DateTime<Utc>>> {
    value
        .map(|raw| {
            DateTime::parse_from_rfc3339(&raw)
                .map(|dt| dt.with_timezone(&Utc))
                .map_err(|e| AppError::Other(anyhow::anyhow!("Invalid timestamp '{}': {}", raw, e)))
        })
        .transpose()
}
