//! SQLite database adapters for chatdo.

pub mod connection;
pub mod conversation_repository;
pub mod migrations;
pub mod task_repository;

pub use connection::{
    create_test_pool, open_pool, verify_connection, ConnectionError, StoreLocation,
};
pub use conversation_repository::SqliteConversationRepository;
pub use migrations::{Migration, MigrationError, Migrator, EMBEDDED_MIGRATIONS};
pub use task_repository::SqliteTaskRepository;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::domain::errors::{DomainError, DomainResult};
use crate::domain::models::DatabaseConfig;

/// Parse a UUID string from a SQLite row field.
pub fn parse_uuid(s: &str) -> DomainResult<Uuid> {
    Uuid::parse_str(s).map_err(|e| DomainError::SerializationError(e.to_string()))
}

/// Parse an RFC3339 datetime string from a SQLite row field.
pub fn parse_datetime(s: &str) -> DomainResult<DateTime<Utc>> {
    chrono::DateTime::parse_from_rfc3339(s)
        .map_err(|e| DomainError::SerializationError(e.to_string()))
        .map(|dt| dt.with_timezone(&Utc))
}

/// Fixed-width RFC3339 (microseconds, `Z`) so that text order is time order.
pub fn format_datetime(dt: DateTime<Utc>) -> String {
    dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    #[error("Connection error: {0}")]
    Connection(#[from] ConnectionError),
    #[error("Migration error: {0}")]
    Migration(#[from] MigrationError),
    #[error("Query error: {0}")]
    Query(#[from] sqlx::Error),
}

/// Open (creating if needed) the database and apply pending migrations.
pub async fn initialize_database(config: &DatabaseConfig) -> Result<SqlitePool, DatabaseError> {
    let pool = open_pool(config).await?;
    Migrator::new(pool.clone()).apply_all().await?;
    Ok(pool)
}

/// Create an in-memory test pool with all migrations applied.
pub async fn create_migrated_test_pool() -> Result<SqlitePool, DatabaseError> {
    let pool = create_test_pool().await?;
    Migrator::new(pool.clone()).apply_all().await?;
    Ok(pool)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_format_datetime_is_fixed_width() {
        let whole = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let formatted = format_datetime(whole);
        assert_eq!(formatted, "2024-01-02T03:04:05.000000Z");
        assert_eq!(parse_datetime(&formatted).unwrap(), whole);
    }

    #[test]
    fn test_parse_uuid_rejects_garbage() {
        assert!(matches!(
            parse_uuid("not-a-uuid"),
            Err(DomainError::SerializationError(_))
        ));
    }
}
