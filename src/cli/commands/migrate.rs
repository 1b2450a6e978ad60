use anyhow::{Context, Result};
use serde::Serialize;

use crate::adapters::sqlite::Migrator;
use crate::cli::output::{output, CommandOutput};
use crate::cli::runtime::open_database;
use crate::domain::models::Config;

#[derive(Debug, Serialize)]
pub struct MigrateOutput {
    pub database: String,
    pub schema_version: i64,
}

impl CommandOutput for MigrateOutput {
    fn to_human(&self) -> String {
        format!(
            "Database {} is at schema version {}.",
            self.database, self.schema_version
        )
    }
}

pub async fn execute(config: Config, json_mode: bool) -> Result<()> {
    let pool = open_database(&config).await?;
    let schema_version = Migrator::new(pool)
        .current_version()
        .await
        .context("Failed to read schema version")?;

    output(
        &MigrateOutput {
            database: config.database.path.clone(),
            schema_version,
        },
        json_mode,
    );
    Ok(())
}
