use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

pub const DEFAULT_PORT: u16 = 8089;
pub const DEFAULT_BIND: &str = "127.0.0.1";
pub const DEFAULT_REQUEST_DEADLINE_MS: u64 = 180_000;
pub const DEFAULT_LLM_CALL_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_MAP_CHUNK_SIZE: usize = 100;
pub const DEFAULT_MAP_MAX_PARALLEL: usize = 25;
pub const DEFAULT_MAP_MAX_RETRIES: u32 = 3;
pub const DEFAULT_MEDIUM_SCORE_THRESHOLD: f64 = 0.7;
pub const DEFAULT_MEDIUM_MAX_SELECTED_POSTS: usize = 5;
pub const DEFAULT_MAX_QUOTA_WAIT_MS: u64 = 90_000;
pub const DEFAULT_RESOLVE_DEPTH: u32 = 2;
pub const DEFAULT_RECENT_CUTOFF_DAYS: i64 = 90;
pub const DEFAULT_PROGRESS_BUS_CAPACITY: usize = 100;
pub const DEFAULT_KEEPALIVE_INTERVAL_MS: u64 = 5_000;
pub const DEFAULT_KEEPALIVE_PADDING_BYTES: usize = 2048;
pub const DEFAULT_MCP_TIMEOUT_MS: u64 = 15_000;
pub const DEFAULT_MCP_FORCE_CLEANUP_MS: u64 = 2_000;
pub const DEFAULT_MCP_RESTART_BUDGET: u32 = 10;
pub const DEFAULT_CACHE_TTL_MS: u64 = 5 * 60 * 1000;
pub const DEFAULT_CACHE_CAPACITY: usize = 100;
pub const DEFAULT_ENGLISH_ASCII_THRESHOLD: f64 = 0.70;

/// Top-level config (quorum.toml + QUORUM_* env overrides).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuorumConfig {
    #[serde(default)]
    pub gateway: GatewayConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub pipeline: PipelineConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub reddit: RedditConfig,
    #[serde(default)]
    pub providers: ProvidersConfig,
}

impl Default for QuorumConfig {
    fn default() -> Self {
        Self {
            gateway: GatewayConfig::default(),
            database: DatabaseConfig::default(),
            pipeline: PipelineConfig::default(),
            models: ModelsConfig::default(),
            reddit: RedditConfig::default(),
            providers: ProvidersConfig::default(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GatewayConfig {
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Matched against `X-Admin-Secret`. When unset, unauthenticated access
    /// is allowed.
    pub admin_secret: Option<String>,
    #[serde(default = "default_request_deadline_ms")]
    pub request_deadline_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
            bind: default_bind(),
            admin_secret: None,
            request_deadline_ms: default_request_deadline_ms(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    #[serde(default = "default_db_path")]
    pub path: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
        }
    }
}

/// Tunables for the Expert Pipeline's Map/Score/Resolve phases.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default = "default_map_chunk_size")]
    pub map_chunk_size: usize,
    #[serde(default = "default_map_max_parallel")]
    pub map_max_parallel: usize,
    #[serde(default = "default_map_max_retries")]
    pub map_max_retries: u32,
    #[serde(default = "default_medium_score_threshold")]
    pub medium_score_threshold: f64,
    #[serde(default = "default_medium_max_selected_posts")]
    pub medium_max_selected_posts: usize,
    #[serde(default = "default_resolve_depth")]
    pub resolve_depth: u32,
    #[serde(default = "default_recent_cutoff_days")]
    pub recent_cutoff_days: i64,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            map_chunk_size: default_map_chunk_size(),
            map_max_parallel: default_map_max_parallel(),
            map_max_retries: default_map_max_retries(),
            medium_score_threshold: default_medium_score_threshold(),
            medium_max_selected_posts: default_medium_max_selected_posts(),
            resolve_depth: default_resolve_depth(),
            recent_cutoff_days: default_recent_cutoff_days(),
        }
    }
}

/// Logical model bindings, one per phase — the gateway never hardcodes a
/// model name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelsConfig {
    #[serde(default = "default_model_map")]
    pub map: String,
    #[serde(default = "default_model_analysis")]
    pub analysis: String,
    #[serde(default = "default_model_synthesis")]
    pub synthesis: String,
    #[serde(default = "default_model_drift_analysis")]
    pub drift_analysis: String,
    #[serde(default = "default_model_medium_scoring")]
    pub medium_scoring: String,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            map: default_model_map(),
            analysis: default_model_analysis(),
            synthesis: default_model_synthesis(),
            drift_analysis: default_model_drift_analysis(),
            medium_scoring: default_model_medium_scoring(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedditConfig {
    #[serde(default = "default_reddit_proxy_url")]
    pub proxy_url: String,
    #[serde(default = "default_reddit_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_mcp_timeout_ms")]
    pub mcp_timeout_ms: u64,
    #[serde(default = "default_mcp_force_cleanup_ms")]
    pub mcp_force_cleanup_ms: u64,
    #[serde(default = "default_mcp_restart_budget")]
    pub mcp_restart_budget: u32,
    #[serde(default = "default_cache_ttl_ms")]
    pub cache_ttl_ms: u64,
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,
    /// Path to the MCP server executable the watchdog spawns.
    #[serde(default = "default_mcp_command")]
    pub mcp_command: String,
    #[serde(default)]
    pub mcp_args: Vec<String>,
}

impl Default for RedditConfig {
    fn default() -> Self {
        Self {
            proxy_url: default_reddit_proxy_url(),
            user_agent: default_reddit_user_agent(),
            mcp_timeout_ms: default_mcp_timeout_ms(),
            mcp_force_cleanup_ms: default_mcp_force_cleanup_ms(),
            mcp_restart_budget: default_mcp_restart_budget(),
            cache_ttl_ms: default_cache_ttl_ms(),
            cache_capacity: default_cache_capacity(),
            mcp_command: default_mcp_command(),
            mcp_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ProvidersConfig {
    pub openrouter: Option<KeyPoolConfig>,
    pub gemini: Option<KeyPoolConfig>,
    pub openai_compat: Option<KeyPoolConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyPoolConfig {
    /// One or more API keys rotated on 429 / quota exhaustion.
    pub keys: Vec<String>,
    pub base_url: Option<String>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}
fn default_request_deadline_ms() -> u64 {
    DEFAULT_REQUEST_DEADLINE_MS
}
fn default_db_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.quorum/quorum.db")
}
fn default_map_chunk_size() -> usize {
    DEFAULT_MAP_CHUNK_SIZE
}
fn default_map_max_parallel() -> usize {
    DEFAULT_MAP_MAX_PARALLEL
}
fn default_map_max_retries() -> u32 {
    DEFAULT_MAP_MAX_RETRIES
}
fn default_medium_score_threshold() -> f64 {
    DEFAULT_MEDIUM_SCORE_THRESHOLD
}
fn default_medium_max_selected_posts() -> usize {
    DEFAULT_MEDIUM_MAX_SELECTED_POSTS
}
fn default_resolve_depth() -> u32 {
    DEFAULT_RESOLVE_DEPTH
}
fn default_recent_cutoff_days() -> i64 {
    DEFAULT_RECENT_CUTOFF_DAYS
}
fn default_model_map() -> String {
    "openrouter/anthropic/claude-3.5-sonnet".to_string()
}
fn default_model_analysis() -> String {
    "openrouter/anthropic/claude-3.5-sonnet".to_string()
}
fn default_model_synthesis() -> String {
    "openrouter/anthropic/claude-3.5-sonnet".to_string()
}
fn default_model_drift_analysis() -> String {
    "openrouter/anthropic/claude-3.5-sonnet".to_string()
}
fn default_model_medium_scoring() -> String {
    "gemini/gemini-2.0-flash".to_string()
}
fn default_reddit_proxy_url() -> String {
    "http://127.0.0.1:8090".to_string()
}
fn default_reddit_user_agent() -> String {
    "quorum-reddit/0.1".to_string()
}
fn default_mcp_timeout_ms() -> u64 {
    DEFAULT_MCP_TIMEOUT_MS
}
fn default_mcp_force_cleanup_ms() -> u64 {
    DEFAULT_MCP_FORCE_CLEANUP_MS
}
fn default_mcp_restart_budget() -> u32 {
    DEFAULT_MCP_RESTART_BUDGET
}
fn default_cache_ttl_ms() -> u64 {
    DEFAULT_CACHE_TTL_MS
}
fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}
fn default_mcp_command() -> String {
    "reddit-mcp-server".to_string()
}

impl QuorumConfig {
    /// Load config from a TOML file with `QUORUM_*` env var overrides.
    ///
    /// Falls back to `~/.quorum/quorum.toml` when no explicit path is
    /// given; a missing file is not an error, only missing/invalid values
    /// inside a present file are.
    pub fn load(config_path: Option<&str>) -> crate::error::Result<Self> {
        let path = config_path
            .map(String::from)
            .unwrap_or_else(default_config_path);

        let config: QuorumConfig = Figment::from(figment::providers::Serialized::defaults(
            QuorumConfig::default(),
        ))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("QUORUM_").split("__"))
        .extract()
        .map_err(|e| crate::error::QuorumError::Config(e.to_string()))?;

        Ok(config)
    }
}

fn default_config_path() -> String {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    format!("{home}/.quorum/quorum.toml")
}
