use serde::{Deserialize, Serialize};

/// Main configuration structure for the redlining engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Config {
    /// Generative provider configuration
    #[serde(default)]
    pub providers: ProvidersConfig,

    /// Clause matcher tuning
    #[serde(default)]
    pub matcher: MatcherConfig,

    /// Chat guardrail tuning
    #[serde(default)]
    pub guardrail: GuardrailConfig,

    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Structured package storage configuration
    #[serde(default)]
    pub storage: StorageConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            providers: ProvidersConfig::default(),
            matcher: MatcherConfig::default(),
            guardrail: GuardrailConfig::default(),
            database: DatabaseConfig::default(),
            logging: LoggingConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

/// Which provider backend a [`ProviderConfig`] describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Anthropic,
    Openai,
}

/// A single generative provider endpoint.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProviderConfig {
    pub kind: ProviderKind,

    /// Model identifier sent with every request
    pub model: String,

    /// Environment variable holding the API key
    #[serde(default)]
    pub api_key_env: Option<String>,

    /// Base URL override (testing/proxies)
    #[serde(default)]
    pub base_url: Option<String>,
}

/// Primary/secondary provider pair plus fallback policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ProvidersConfig {
    /// Primary provider, always tried first
    #[serde(default = "default_primary_provider")]
    pub primary: ProviderConfig,

    /// Secondary provider used only for rate-limit/quota fallback
    #[serde(default)]
    pub secondary: Option<ProviderConfig>,

    /// Whether falling back to the secondary provider is allowed
    #[serde(default = "default_allow_fallback")]
    pub allow_fallback: bool,

    /// Timeout for the full-document rewrite call, in seconds
    #[serde(default = "default_rewrite_timeout_secs")]
    pub rewrite_timeout_secs: u64,

    /// Timeout for chat/classification calls, in seconds
    #[serde(default = "default_chat_timeout_secs")]
    pub chat_timeout_secs: u64,
}

fn default_primary_provider() -> ProviderConfig {
    ProviderConfig {
        kind: ProviderKind::Anthropic,
        model: "claude-sonnet-4-5-20250929".to_string(),
        api_key_env: Some("ANTHROPIC_API_KEY".to_string()),
        base_url: None,
    }
}

const fn default_allow_fallback() -> bool {
    true
}

const fn default_rewrite_timeout_secs() -> u64 {
    300
}

const fn default_chat_timeout_secs() -> u64 {
    60
}

impl Default for ProvidersConfig {
    fn default() -> Self {
        Self {
            primary: default_primary_provider(),
            secondary: None,
            allow_fallback: default_allow_fallback(),
            rewrite_timeout_secs: default_rewrite_timeout_secs(),
            chat_timeout_secs: default_chat_timeout_secs(),
        }
    }
}

/// Clause matcher tuning.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct MatcherConfig {
    /// Minimum score for a candidate node to count as a match (0.0-1.0)
    #[serde(default = "default_score_threshold")]
    pub score_threshold: f64,
}

const fn default_score_threshold() -> f64 {
    0.55
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            score_threshold: default_score_threshold(),
        }
    }
}

/// Chat guardrail tuning: requests below these bars are answered with a
/// clarification instead of a provider call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct GuardrailConfig {
    /// Messages shorter than this (with no digit and no known term) are
    /// treated as unanswerable
    #[serde(default = "default_min_message_len")]
    pub min_message_len: usize,

    /// Maximum number of contextual suggestions in a clarification reply
    #[serde(default = "default_max_suggestions")]
    pub max_suggestions: usize,
}

const fn default_min_message_len() -> usize {
    45
}

const fn default_max_suggestions() -> usize {
    5
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            min_message_len: default_min_message_len(),
            max_suggestions: default_max_suggestions(),
        }
    }
}

/// Database configuration.
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
    ".redliner/redliner.db".to_string()
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

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format: json or pretty
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
        }
    }
}

/// Structured package storage configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct StorageConfig {
    /// Directory holding structured package bundles
    #[serde(default = "default_storage_root")]
    pub root: String,
}

fn default_storage_root() -> String {
    ".redliner/packages".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            root: default_storage_root(),
        }
    }
}
