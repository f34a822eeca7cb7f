//! Application configuration.

use serde::Deserialize;
use std::path::Path;
use validator::Validate;

/// Application configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct Config {
    /// Server configuration.
    #[validate(nested)]
    pub server: ServerConfig,
    /// Database configuration.
    pub database: DatabaseConfig,
    /// Trust graph configuration.
    #[validate(nested)]
    pub trust: TrustConfig,
    /// Action throttling.
    #[serde(default)]
    #[validate(nested)]
    pub rate_limit: RateLimitConfig,
    /// Remote metadata probing.
    #[serde(default)]
    pub probe: ProbeConfig,
    /// Log output.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ServerConfig {
    /// Host to bind to.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to bind to.
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public URL of this service.
    #[validate(url)]
    pub url: String,
}

/// Database connection configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// `PostgreSQL` connection URL.
    pub url: String,
    /// Maximum number of connections in the pool.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// Minimum number of connections in the pool.
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Seconds to wait for a new connection or a free pool slot.
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    /// Log every SQL statement at debug level.
    #[serde(default)]
    pub log_statements: bool,
}

/// Trust graph limits and the root of the guarantee tree.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct TrustConfig {
    /// Domain of the operator's own instance (id 0).
    #[validate(length(min = 3))]
    pub root_domain: String,
    /// Admin account name on the root instance.
    pub root_admin: String,
    /// Optional API key for the root admin. Only its hash is stored.
    #[serde(default)]
    pub root_api_key: Option<String>,
    /// How many instances a non-root instance may guarantee.
    #[serde(default = "default_guarantee_cap")]
    #[validate(range(min = 1))]
    pub guarantee_cap: u64,
    /// Outgoing edge cap per kind assigned to newly registered instances.
    #[serde(default = "default_max_list_size")]
    #[validate(range(min = 1))]
    pub default_max_list_size: i32,
    /// Seconds before a guarantor may withdraw from the same target again.
    #[serde(default = "default_day")]
    pub withdraw_cooldown_secs: i64,
    /// Seconds between manual solicitations by the same instance.
    #[serde(default = "default_day")]
    pub solicitation_cooldown_secs: i64,
    /// Endorsement notifications are skipped if the target was endorsed
    /// within this many seconds.
    #[serde(default = "default_hour")]
    pub endorsement_notify_quiet_secs: i64,
    /// Maximum number of self-assigned tags per instance.
    #[serde(default = "default_max_tags")]
    pub max_tags: u64,
    /// Orphans older than this drop out of the whitelist.
    #[serde(default = "default_day")]
    pub orphan_grace_secs: i64,
    /// Consecutive probe failures after which an instance counts as offline.
    #[serde(default = "default_offline_after")]
    pub offline_after: i32,
}

/// Sliding-window throttle over the audit log.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RateLimitConfig {
    /// Actions allowed per window.
    #[serde(default = "default_max_actions")]
    #[validate(range(min = 1))]
    pub max_actions: u64,
    /// Window length in seconds.
    #[serde(default = "default_window_secs")]
    #[validate(range(min = 1))]
    pub window_secs: i64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_actions: default_max_actions(),
            window_secs: default_window_secs(),
        }
    }
}

/// Remote metadata probe configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ProbeConfig {
    /// Request timeout in seconds.
    #[serde(default = "default_probe_timeout")]
    pub timeout_secs: u64,
    /// User agent sent to remote instances.
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for ProbeConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_probe_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LoggingConfig {
    /// `json` for structured output, anything else for human-readable.
    #[serde(default)]
    pub format: Option<String>,
}

impl LoggingConfig {
    /// Whether structured JSON logs were requested.
    #[must_use]
    pub fn is_json(&self) -> bool {
        self.format.as_deref() == Some("json")
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

const fn default_port() -> u16 {
    3000
}

const fn default_max_connections() -> u32 {
    50
}

const fn default_min_connections() -> u32 {
    5
}

const fn default_connect_timeout_secs() -> u64 {
    5
}

const fn default_guarantee_cap() -> u64 {
    20
}

const fn default_max_list_size() -> i32 {
    1000
}

const fn default_day() -> i64 {
    86_400
}

const fn default_hour() -> i64 {
    3_600
}

const fn default_max_tags() -> u64 {
    100
}

const fn default_offline_after() -> i32 {
    5
}

const fn default_max_actions() -> u64 {
    20
}

const fn default_window_secs() -> i64 {
    60
}

const fn default_probe_timeout() -> u64 {
    10
}

fn default_user_agent() -> String {
    concat!("fediseer-rs/", env!("CARGO_PKG_VERSION")).to_string()
}

impl Config {
    /// Load configuration from files and environment variables.
    ///
    /// Configuration is loaded in the following order:
    /// 1. `.env` (if present)
    /// 2. `config/default.toml`
    /// 3. `config/{environment}.toml` (based on `FEDISEER_ENV`)
    /// 4. Environment variables with `FEDISEER_` prefix
    pub fn load() -> Result<Self, crate::AppError> {
        dotenvy::dotenv().ok();
        let env = std::env::var("FEDISEER_ENV").unwrap_or_else(|_| "development".to_string());

        let config = config::Config::builder()
            .add_source(config::File::with_name("config/default").required(false))
            .add_source(config::File::with_name(&format!("config/{env}")).required(false))
            .add_source(
                config::Environment::with_prefix("FEDISEER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, crate::AppError> {
        let config = config::Config::builder()
            .add_source(config::File::from(path.as_ref()))
            .add_source(
                config::Environment::with_prefix("FEDISEER")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }
}
