//! Embedded schema migrations.

use sqlx::SqlitePool;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MigrationError {
    #[error("Migration {version} failed: {source}")]
    Step {
        version: i64,
        #[source]
        source: sqlx::Error,
    },
    #[error("Failed to read or create schema_migrations: {0}")]
    VersionTable(#[source] sqlx::Error),
}

/// A schema step compiled into the binary.
#[derive(Debug, Clone, Copy)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub sql: &'static str,
}

/// Every schema step, oldest first.
pub const EMBEDDED_MIGRATIONS: &[Migration] = &[Migration {
    version: 1,
    description: "tasks, conversations and messages",
    sql: include_str!("../../../migrations/001_initial_schema.sql"),
}];

/// Applies embedded migrations and tracks them in `schema_migrations`.
pub struct Migrator {
    pool: SqlitePool,
}

impl Migrator {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Bring the schema up to date. Returns how many steps ran.
    pub async fn apply_all(&self) -> Result<usize, MigrationError> {
        self.apply(EMBEDDED_MIGRATIONS).await
    }

    /// Apply every migration newer than the recorded version, each in its own transaction.
    pub async fn apply(&self, migrations: &[Migration]) -> Result<usize, MigrationError> {
        self.ensure_version_table().await?;
        let current = self.current_version().await?;

        let mut applied = 0;
        for migration in migrations.iter().filter(|m| m.version > current) {
            self.apply_one(migration).await?;
            info!(version = migration.version, description = migration.description, "applied migration");
            applied += 1;
        }
        Ok(applied)
    }

    async fn ensure_version_table(&self) -> Result<(), MigrationError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS schema_migrations (
                version INTEGER PRIMARY KEY,
                description TEXT NOT NULL,
                applied_at TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now'))
            )",
        )
        .execute(&self.pool)
        .await
        .map_err(MigrationError::VersionTable)?;
        Ok(())
    }

    /// Highest applied version, 0 for a fresh database.
    pub async fn current_version(&self) -> Result<i64, MigrationError> {
        let (version,): (i64,) =
            sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
                .fetch_one(&self.pool)
                .await
                .map_err(MigrationError::VersionTable)?;
        Ok(version)
    }

    async fn apply_one(&self, migration: &Migration) -> Result<(), MigrationError> {
        let failed = |source| MigrationError::Step {
            version: migration.version,
            source,
        };

        let mut tx = self.pool.begin().await.map_err(failed)?;
        sqlx::raw_sql(migration.sql).execute(&mut *tx).await.map_err(failed)?;
        sqlx::query("INSERT INTO schema_migrations (version, description) VALUES (?, ?)")
            .bind(migration.version)
            .bind(migration.description)
            .execute(&mut *tx)
            .await
            .map_err(failed)?;
        tx.commit().await.map_err(failed)
    }
}
