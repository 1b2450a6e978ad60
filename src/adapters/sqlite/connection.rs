//! Opening the SQLite store.
//!
//! Every connection enforces foreign keys so that deleting a conversation
//! takes its messages with it.

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

use crate::domain::models::DatabaseConfig;

const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(3);
const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("Failed to open database: {0}")]
    Open(#[source] sqlx::Error),
    #[error("Failed to create database directory {0}: {1}")]
    Directory(PathBuf, #[source] std::io::Error),
    #[error("Database did not answer: {0}")]
    Unreachable(#[source] sqlx::Error),
}

/// Where the store lives, parsed from the configured path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreLocation {
    Memory,
    File(PathBuf),
}

impl StoreLocation {
    /// Accepts a plain path or a `sqlite:` URL. Query parameters are ignored.
    pub fn parse(path: &str) -> Self {
        let path = path
            .strip_prefix("sqlite://")
            .or_else(|| path.strip_prefix("sqlite:"))
            .unwrap_or(path);
        let path = path.split('?').next().unwrap_or_default();

        if path.is_empty() || path == ":memory:" {
            Self::Memory
        } else {
            Self::File(PathBuf::from(path))
        }
    }

    fn connect_options(&self) -> Result<SqliteConnectOptions, ConnectionError> {
        let options = match self {
            // The URL form gives each pool its own uniquely named database.
            Self::Memory => {
                SqliteConnectOptions::from_str("sqlite::memory:").map_err(ConnectionError::Open)?
            }
            Self::File(path) => SqliteConnectOptions::new()
                .filename(path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
                .synchronous(SqliteSynchronous::Normal),
        };
        Ok(options.foreign_keys(true).busy_timeout(BUSY_TIMEOUT))
    }

    fn ensure_directory(&self) -> Result<(), ConnectionError> {
        let Self::File(path) = self else {
            return Ok(());
        };
        match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() && !parent.exists() => {
                std::fs::create_dir_all(parent)
                    .map_err(|e| ConnectionError::Directory(parent.to_path_buf(), e))
            }
            _ => Ok(()),
        }
    }
}

/// Open a pool for the configured store, creating the file if needed.
///
/// An in-memory store is private to one connection, so its pool is capped at one.
pub async fn open_pool(config: &DatabaseConfig) -> Result<SqlitePool, ConnectionError> {
    let location = StoreLocation::parse(&config.path);
    location.ensure_directory()?;

    let max_connections = match location {
        StoreLocation::Memory => 1,
        StoreLocation::File(_) => config.max_connections.max(1),
    };

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .min_connections(1)
        .acquire_timeout(ACQUIRE_TIMEOUT)
        .connect_with(location.connect_options()?)
        .await
        .map_err(ConnectionError::Open)
}

/// Private in-memory database on a single connection.
pub async fn create_test_pool() -> Result<SqlitePool, ConnectionError> {
    open_pool(&DatabaseConfig {
        path: ":memory:".to_string(),
        max_connections: 1,
    })
    .await
}

pub async fn verify_connection(pool: &SqlitePool) -> Result<(), ConnectionError> {
    sqlx::query("SELECT 1")
        .fetch_one(pool)
        .await
        .map_err(ConnectionError::Unreachable)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_location() {
        assert_eq!(
            StoreLocation::parse(".chatdo/chatdo.db"),
            StoreLocation::File(PathBuf::from(".chatdo/chatdo.db"))
        );
        assert_eq!(
            StoreLocation::parse("sqlite://data/tasks.db?mode=rwc"),
            StoreLocation::File(PathBuf::from("data/tasks.db"))
        );
        assert_eq!(StoreLocation::parse("sqlite::memory:"), StoreLocation::Memory);
    }

    #[tokio::test]
    async fn test_file_pool_creates_parent_directory() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("chatdo.db");
        let config = DatabaseConfig {
            path: path.to_string_lossy().into_owned(),
            max_connections: 2,
        };

        let pool = open_pool(&config).await.unwrap();
        verify_connection(&pool).await.unwrap();
        assert!(path.exists());
    }
}
