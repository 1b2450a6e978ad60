use anyhow::{Context, Result};
use figment::providers::{Env, Format, Serialized, Yaml};
use figment::Figment;
use thiserror::Error;

use crate::domain::models::config::Config;

/// Project config file, created by hand or by deployment.
pub const CONFIG_FILE: &str = "chatdo.yaml";
/// Optional untracked overrides.
pub const LOCAL_CONFIG_FILE: &str = "chatdo.local.yaml";
/// Prefix of environment overrides, e.g. `CHATDO_SERVER__PORT=9000`.
pub const ENV_PREFIX: &str = "CHATDO_";

/// Configuration error types
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Invalid log level: {0}. Must be one of: trace, debug, info, warn, error")]
    InvalidLogLevel(String),

    #[error("Invalid log format: {0}. Must be one of: json, pretty")]
    InvalidLogFormat(String),

    #[error("Invalid log rotation: {0}. Must be one of: daily, hourly, never")]
    InvalidRotation(String),

    #[error("Database path cannot be empty")]
    EmptyDatabasePath,

    #[error("Invalid max_connections: {0}. Must be at least 1")]
    InvalidMaxConnections(u32),

    #[error("Invalid compaction_threshold: {0}. Must be at least 1")]
    InvalidCompactionThreshold(usize),

    #[error("Invalid recent_turns: {0}. Cannot exceed compaction_threshold ({1})")]
    InvalidRecentTurns(usize, usize),

    #[error("Invalid server port: 0")]
    InvalidPort,

    #[error("Configuration validation failed: {0}")]
    ValidationFailed(String),
}

/// Configuration loader with hierarchical merging
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load configuration with hierarchical merging
    ///
    /// Precedence (lowest to highest):
    /// 1. Programmatic defaults
    /// 2. `chatdo.yaml` in the working directory
    /// 3. `chatdo.local.yaml` (optional local overrides)
    /// 4. `CHATDO_*` environment variables, `__` separating nested keys
    pub fn load() -> Result<Config> {
        let files = Figment::new()
            .merge(Yaml::file(CONFIG_FILE))
            .merge(Yaml::file(LOCAL_CONFIG_FILE));
        Self::finish(files).context("Failed to load configuration")
    }

    /// Load configuration from a specific file. Environment overrides still apply.
    pub fn load_from_file(path: impl AsRef<std::path::Path>) -> Result<Config> {
        let path = path.as_ref();
        Self::finish(Figment::new().merge(Yaml::file(path)))
            .with_context(|| format!("Failed to load config from {}", path.display()))
    }

    /// Put `files` between the defaults and the environment, then validate.
    fn finish(files: Figment) -> Result<Config> {
        let config: Config = Figment::from(Serialized::defaults(Config::default()))
            .merge(files)
            .merge(Env::prefixed(ENV_PREFIX).split("__"))
            .extract()?;

        Self::validate(&config)?;
        Ok(config)
    }

    /// Validate configuration after loading
    pub fn validate(config: &Config) -> Result<(), ConfigError> {
        if config.server.port == 0 {
            return Err(ConfigError::InvalidPort);
        }
        if config.server.auth_header.trim().is_empty() {
            return Err(ConfigError::ValidationFailed(
                "server.auth_header cannot be empty".to_string(),
            ));
        }

        if config.database.path.is_empty() {
            return Err(ConfigError::EmptyDatabasePath);
        }
        if config.database.max_connections == 0 {
            return Err(ConfigError::InvalidMaxConnections(
                config.database.max_connections,
            ));
        }

        let valid_log_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_log_levels.contains(&config.logging.level.as_str()) {
            return Err(ConfigError::InvalidLogLevel(config.logging.level.clone()));
        }

        let valid_log_formats = ["json", "pretty"];
        if !valid_log_formats.contains(&config.logging.format.as_str()) {
            return Err(ConfigError::InvalidLogFormat(config.logging.format.clone()));
        }

        let valid_rotations = ["daily", "hourly", "never"];
        if !valid_rotations.contains(&config.logging.rotation.as_str()) {
            return Err(ConfigError::InvalidRotation(config.logging.rotation.clone()));
        }

        let conversation = &config.conversation;
        if conversation.compaction_threshold == 0 {
            return Err(ConfigError::InvalidCompactionThreshold(0));
        }
        if conversation.recent_turns > conversation.compaction_threshold {
            return Err(ConfigError::InvalidRecentTurns(
                conversation.recent_turns,
                conversation.compaction_threshold,
            ));
        }

        if config.reasoning.timeout_secs == 0 {
            return Err(ConfigError::ValidationFailed(
                "reasoning.timeout_secs must be at least 1".to_string(),
            ));
        }

        Ok(())
    }
}
