use serde::{Deserialize, Serialize};

/// Main configuration structure for chatdo
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// HTTP server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Conversation history handling
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Reasoning oracle selection and settings
    #[serde(default)]
    pub reasoning: ReasoningConfig,
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    #[serde(default = "default_enable_cors")]
    pub enable_cors: bool,

    /// Header carrying the user id verified by the upstream auth proxy
    #[serde(default = "default_auth_header")]
    pub auth_header: String,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

const fn default_port() -> u16 {
    8000
}

const fn default_enable_cors() -> bool {
    true
}

fn default_auth_header() -> String {
    "x-authenticated-user".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            enable_cors: default_enable_cors(),
            auth_header: default_auth_header(),
        }
    }
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DatabaseConfig {
    /// Path to `SQLite` database file
    #[serde(default = "default_database_path")]
    pub path: String,

    /// Maximum number of database connections in pool
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_database_path() -> String {
    ".chatdo/chatdo.db".to_string()
}

const fn default_max_connections() -> u32 {
    10
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_database_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Directory for rolling log files; stdout only when unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_dir: Option<String>,

    /// File rotation: daily, hourly, never
    #[serde(default = "default_rotation")]
    pub rotation: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_rotation() -> String {
    "daily".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            log_dir: None,
            rotation: default_rotation(),
        }
    }
}

/// Conversation history handling
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ConversationConfig {
    /// Number of turns above which older history is compacted into a summary
    #[serde(default = "default_compaction_threshold")]
    pub compaction_threshold: usize,

    /// Raw turns kept after the summary once compaction kicks in
    #[serde(default = "default_recent_turns")]
    pub recent_turns: usize,
}

const fn default_compaction_threshold() -> usize {
    20
}

const fn default_recent_turns() -> usize {
    10
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            compaction_threshold: default_compaction_threshold(),
            recent_turns: default_recent_turns(),
        }
    }
}

/// Which reasoning oracle interprets chat messages
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReasoningProvider {
    /// Deterministic rule-based interpretation, no network
    #[default]
    Pattern,
    /// Anthropic Messages API
    Anthropic,
}

/// Reasoning oracle configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ReasoningConfig {
    #[serde(default)]
    pub provider: ReasoningProvider,

    /// API key (can also be set via ANTHROPIC_API_KEY env var)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    #[serde(default = "default_base_url")]
    pub base_url: String,

    #[serde(default = "default_model")]
    pub model: String,

    #[serde(default = "default_api_version")]
    pub api_version: String,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Upper bound on a single oracle call
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Delay before the single retry of a transient tool failure
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
}

fn default_base_url() -> String {
    "https://api.anthropic.com".to_string()
}

fn default_model() -> String {
    "claude-sonnet-4-5-20250929".to_string()
}

fn default_api_version() -> String {
    "2023-06-01".to_string()
}

const fn default_max_tokens() -> u32 {
    1024
}

const fn default_timeout_secs() -> u64 {
    30
}

const fn default_retry_backoff_ms() -> u64 {
    100
}

impl Default for ReasoningConfig {
    fn default() -> Self {
        Self {
            provider: ReasoningProvider::default(),
            api_key: None,
            base_url: default_base_url(),
            model: default_model(),
            api_version: default_api_version(),
            max_tokens: default_max_tokens(),
            timeout_secs: default_timeout_secs(),
            retry_backoff_ms: default_retry_backoff_ms(),
        }
    }
}
