//! Server configuration loading from file and environment variables.

use serde::Deserialize;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use thiserror::Error;

/// Top-level server configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub registry: RegistrySection,

    #[serde(default)]
    pub verifier: VerifierConfig,

    #[serde(default)]
    pub sessions: SessionsConfig,

    /// Only read when `sessions.store` is `sqlite`.
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Network configuration for the HTTP server.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to.
    #[serde(default = "default_host")]
    pub host: IpAddr,

    /// Port to listen on.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Externally reachable base URL; wallet callbacks default to
    /// `<public_url>/api/signing/callback`.
    #[serde(default = "default_public_url")]
    pub public_url: String,
}

/// Where identifiers are resolved and service tokens come from.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistrySection {
    /// Registry base URL. Required; the server refuses to start without it.
    #[serde(default)]
    pub base_url: String,

    /// Platform name presented when requesting a service token.
    #[serde(default = "default_platform")]
    pub platform: String,

    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default = "default_token_refresh_margin_secs")]
    pub token_refresh_margin_secs: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifierConfig {
    /// Reject signers that publish no key-binding certificates.
    #[serde(default)]
    pub strict: bool,

    /// Let a signature accepted without a bound key still write to vaults.
    /// Ignored when `strict` is set.
    #[serde(default)]
    pub allow_unenforced_writes: bool,
}

impl VerifierConfig {
    /// Whether vault writes may rest on an unenforced verification.
    pub fn unenforced_writes_allowed(&self) -> bool {
        !self.strict && self.allow_unenforced_writes
    }
}

/// Which backend holds signing sessions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStoreKind {
    #[default]
    Memory,
    Sqlite,
}

impl std::str::FromStr for SessionStoreKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(ConfigError::InvalidStore(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SessionsConfig {
    /// Lifetime of a pending session.
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,

    /// Seconds between background sweeps. `0` disables the sweep.
    #[serde(default = "default_sweep_interval_secs")]
    pub sweep_interval_secs: u64,

    /// How long terminal sessions are kept before the sweep deletes them.
    #[serde(default = "default_retention_secs")]
    pub retention_secs: u64,

    #[serde(default)]
    pub store: SessionStoreKind,
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,

    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,

    #[serde(default = "default_pool_max_size")]
    pub pool_max_size: u32,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "w3bind_server=debug,info").
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Whether to output logs in JSON format.
    #[serde(default)]
    pub json: bool,
}

fn default_host() -> IpAddr {
    IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1))
}

fn default_port() -> u16 {
    3000
}

fn default_public_url() -> String {
    "http://localhost:3000".to_string()
}

fn default_platform() -> String {
    "w3bind".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_token_refresh_margin_secs() -> u64 {
    300
}

fn default_ttl_secs() -> u64 {
    900
}

fn default_sweep_interval_secs() -> u64 {
    60
}

fn default_retention_secs() -> u64 {
    3600
}

fn default_db_path() -> String {
    "w3bind.db".to_string()
}

fn default_busy_timeout_ms() -> u64 {
    5_000
}

fn default_pool_max_size() -> u32 {
    8
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_url: default_public_url(),
        }
    }
}

impl Default for RegistrySection {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            platform: default_platform(),
            timeout_secs: default_timeout_secs(),
            token_refresh_margin_secs: default_token_refresh_margin_secs(),
        }
    }
}

impl Default for SessionsConfig {
    fn default() -> Self {
        Self {
            ttl_secs: default_ttl_secs(),
            sweep_interval_secs: default_sweep_interval_secs(),
            retention_secs: default_retention_secs(),
            store: SessionStoreKind::default(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            busy_timeout_ms: default_busy_timeout_ms(),
            pool_max_size: default_pool_max_size(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl RegistrySection {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn token_refresh_margin(&self) -> Duration {
        Duration::from_secs(self.token_refresh_margin_secs)
    }
}

impl SessionsConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn retention(&self) -> Duration {
        Duration::from_secs(self.retention_secs)
    }
}

/// Errors that can occur when loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown session store: {0} (expected memory or sqlite)")]
    InvalidStore(String),
}

/// Loads configuration from a TOML file, falling back to defaults.
///
/// Environment variable overrides:
/// - `W3BIND_HOST` overrides `server.host`
/// - `W3BIND_PORT` overrides `server.port`
/// - `W3BIND_PUBLIC_URL` overrides `server.public_url`
/// - `W3BIND_REGISTRY_URL` overrides `registry.base_url`
/// - `W3BIND_PLATFORM` overrides `registry.platform`
/// - `W3BIND_STRICT_KEYS` overrides `verifier.strict` ("true" or "1")
/// - `W3BIND_ALLOW_UNENFORCED_WRITES` overrides `verifier.allow_unenforced_writes`
/// - `W3BIND_SESSION_STORE` overrides `sessions.store`
/// - `W3BIND_DB_PATH` overrides `database.path`
/// - `W3BIND_LOG_LEVEL` overrides `logging.level`
/// - `W3BIND_LOG_JSON` overrides `logging.json` (set to "true" to enable)
///
/// # Errors
///
/// Returns `ConfigError` if the file exists but cannot be read or parsed,
/// or if `W3BIND_SESSION_STORE` names an unknown backend.
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    load_config_with(path, |key| std::env::var(key).ok())
}

/// [`load_config`] with an explicit variable lookup.
pub fn load_config_with<F>(path: Option<&str>, env: F) -> Result<Config, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(p) => match std::fs::read_to_string(p) {
            Ok(contents) => toml::from_str(&contents)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = p, "config file not found, using defaults");
                Config::default()
            }
            Err(e) => return Err(ConfigError::FileRead(e)),
        },
        None => Config::default(),
    };

    if let Some(host) = env("W3BIND_HOST") {
        if let Ok(parsed) = host.parse() {
            config.server.host = parsed;
        }
    }
    if let Some(port) = env("W3BIND_PORT") {
        if let Ok(parsed) = port.parse() {
            config.server.port = parsed;
        }
    }
    if let Some(url) = env("W3BIND_PUBLIC_URL") {
        config.server.public_url = url;
    }
    if let Some(url) = env("W3BIND_REGISTRY_URL") {
        config.registry.base_url = url;
    }
    if let Some(platform) = env("W3BIND_PLATFORM") {
        config.registry.platform = platform;
    }
    if let Some(strict) = env("W3BIND_STRICT_KEYS") {
        config.verifier.strict = is_truthy(&strict);
    }
    if let Some(allow) = env("W3BIND_ALLOW_UNENFORCED_WRITES") {
        config.verifier.allow_unenforced_writes = is_truthy(&allow);
    }
    if let Some(store) = env("W3BIND_SESSION_STORE") {
        config.sessions.store = store.parse()?;
    }
    if let Some(db_path) = env("W3BIND_DB_PATH") {
        config.database.path = db_path;
    }
    if let Some(level) = env("W3BIND_LOG_LEVEL") {
        config.logging.level = level;
    }
    if let Some(json) = env("W3BIND_LOG_JSON") {
        config.logging.json = is_truthy(&json);
    }

    Ok(config)
}

fn is_truthy(value: &str) -> bool {
    value == "true" || value == "1"
}
