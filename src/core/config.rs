//! Configuration management for the Planfix MCP server.
//!
//! Everything is read once at startup from environment variables (with
//! `.env` support) and handed to the rest of the server through
//! [`crate::core::AppContext`].

use super::transport::TransportConfig;
use crate::domains::custom_fields::FieldSources;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::str::FromStr;
use tracing::{info, warn};

/// Main configuration structure for the MCP server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Server identification and metadata.
    pub server: ServerConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,

    /// Transport configuration.
    pub transport: TransportConfig,

    /// Planfix account and credentials.
    pub planfix: PlanfixConfig,

    /// Request cache backend.
    pub cache: CacheConfig,

    /// Object metadata cache.
    pub objects: ObjectsConfig,

    /// Sources of custom field definitions.
    pub custom_fields: FieldSources,
}

/// Server identification configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// The name of the server as reported to clients.
    pub name: String,

    /// The version of the server.
    pub version: String,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "trace").
    pub level: String,
}

/// Planfix REST API settings.
#[derive(Clone, Serialize, Deserialize)]
pub struct PlanfixConfig {
    /// Account subdomain, `<account>.planfix.com`.
    pub account: Option<String>,

    /// REST API bearer token.
    pub token: Option<String>,

    /// Full REST root, overrides the account-derived URL.
    pub base_url: Option<String>,

    /// Per-request timeout.
    pub timeout_secs: u64,

    /// Template used when creating lead tasks.
    pub lead_template_id: Option<u64>,

    /// Task field that holds the client contact.
    pub client_field_id: Option<u64>,
}

/// Redacts the token.
impl std::fmt::Debug for PlanfixConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PlanfixConfig")
            .field("account", &self.account)
            .field("token", &self.token.as_ref().map(|_| "[REDACTED]"))
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("lead_template_id", &self.lead_template_id)
            .field("client_field_id", &self.client_field_id)
            .finish()
    }
}

impl Default for PlanfixConfig {
    fn default() -> Self {
        Self {
            account: None,
            token: None,
            base_url: None,
            timeout_secs: 30,
            lead_template_id: None,
            client_field_id: None,
        }
    }
}

impl PlanfixConfig {
    /// REST root URL, if enough is configured to build one.
    pub fn rest_url(&self) -> Option<String> {
        if let Some(url) = self.base_url.as_ref().filter(|u| !u.trim().is_empty()) {
            return Some(url.trim().to_string());
        }
        self.account
            .as_ref()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .map(|account| format!("https://{}.planfix.com/rest/", account))
    }

    /// Browser link to a task or contact, e.g. `entity_url("task", 12)`.
    pub fn entity_url(&self, kind: &str, id: u64) -> Option<String> {
        self.account
            .as_ref()
            .map(|a| a.trim())
            .filter(|a| !a.is_empty())
            .map(|account| format!("https://{}.planfix.com/{}/{}", account, kind, id))
    }
}

/// Request cache backend selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheBackend {
    #[default]
    Memory,
    Sqlite,
    None,
}

impl FromStr for CacheBackend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            "none" | "off" | "disabled" => Ok(Self::None),
            other => Err(format!("unknown cache backend: {other}")),
        }
    }
}

/// Request cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    pub backend: CacheBackend,

    /// Database file for the SQLite backend.
    pub sqlite_path: PathBuf,

    /// Lifetime of cached read-mostly lookups (directories, reports).
    pub ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            backend: CacheBackend::default(),
            sqlite_path: PathBuf::from(".cache/planfix-cache.sqlite"),
            ttl_secs: 3600,
        }
    }
}

/// Object metadata cache settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectsConfig {
    pub path: PathBuf,
    pub ttl_secs: u64,
}

impl Default for ObjectsConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from(".cache/planfix-objects.json"),
            ttl_secs: 24 * 60 * 60,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                name: "planfix-mcp-server".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
            transport: TransportConfig::default(),
            planfix: PlanfixConfig::default(),
            cache: CacheConfig::default(),
            objects: ObjectsConfig::default(),
            custom_fields: FieldSources::default(),
        }
    }
}

/// Parse an environment variable, warning and ignoring invalid values.
fn env_parse<T: FromStr>(name: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    let raw = std::env::var(name).ok()?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            warn!("Ignoring invalid {}={:?}: {}", name, raw, e);
            None
        }
    }
}

fn env_string(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Create a new configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        Self::load(None)
    }

    /// Load configuration from environment variables, with an explicit
    /// custom field file path taking precedence over `PLANFIX_CONFIG`.
    pub fn load(config_path: Option<PathBuf>) -> Self {
        dotenvy::dotenv().ok();

        let mut config = Self::default();

        if let Some(name) = env_string("MCP_SERVER_NAME") {
            config.server.name = name;
        }

        if let Some(level) = env_string("PLANFIX_LOG_LEVEL") {
            config.logging.level = level;
        }

        config.transport = TransportConfig::from_env();

        config.planfix.account = env_string("PLANFIX_ACCOUNT");
        config.planfix.token = env_string("PLANFIX_TOKEN");
        config.planfix.base_url = env_string("PLANFIX_BASE_URL");
        if let Some(timeout) = env_parse("PLANFIX_TIMEOUT_SECS") {
            config.planfix.timeout_secs = timeout;
        }
        config.planfix.lead_template_id = env_parse("PLANFIX_LEAD_TEMPLATE_ID");
        config.planfix.client_field_id = env_parse("PLANFIX_FIELD_ID_CLIENT");

        if config.planfix.rest_url().is_none() || config.planfix.token.is_none() {
            warn!(
                "Planfix credentials incomplete. Set PLANFIX_ACCOUNT (or PLANFIX_BASE_URL) \
                 and PLANFIX_TOKEN; tool calls will fail until then."
            );
        }

        if let Some(backend) = env_parse("PLANFIX_CACHE") {
            config.cache.backend = backend;
        }
        if let Some(path) = env_string("PLANFIX_CACHE_PATH") {
            config.cache.sqlite_path = PathBuf::from(path);
        }
        if let Some(ttl) = env_parse("PLANFIX_CACHE_TTL") {
            config.cache.ttl_secs = ttl;
        }

        if let Some(path) = env_string("PLANFIX_OBJECTS_CACHE_PATH") {
            config.objects.path = PathBuf::from(path);
        }
        if let Some(ttl) = env_parse("PLANFIX_OBJECTS_CACHE_TTL") {
            config.objects.ttl_secs = ttl;
        }

        config.custom_fields = FieldSources::from_env(config_path);
        if let Some(file) = &config.custom_fields.file {
            info!("Custom field file: {:?}", file);
        }

        config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    // Env var tests must not run concurrently.
    static ENV_TEST_LOCK: Mutex<()> = Mutex::new(());

    const VARS: &[&str] = &[
        "PLANFIX_ACCOUNT",
        "PLANFIX_TOKEN",
        "PLANFIX_BASE_URL",
        "PLANFIX_TIMEOUT_SECS",
        "PLANFIX_LEAD_TEMPLATE_ID",
        "PLANFIX_CACHE",
        "PLANFIX_CONFIG",
    ];

    fn clear_env() {
        for var in VARS {
            unsafe {
                std::env::remove_var(var);
            }
        }
    }

    #[test]
    fn test_planfix_from_env() {
        let _lock = ENV_TEST_LOCK.lock().unwrap();
        clear_env();
        unsafe {
            std::env::set_var("PLANFIX_ACCOUNT", "acme");
            std::env::set_var("PLANFIX_TOKEN", "secret");
            std::env::set_var("PLANFIX_LEAD_TEMPLATE_ID", "42");
            std::env::set_var("PLANFIX_TIMEOUT_SECS", "not-a-number");
            std::env::set_var("PLANFIX_CACHE", "sqlite");
        }

        let config = Config::from_env();
        assert_eq!(
            config.planfix.rest_url().as_deref(),
            Some("https://acme.planfix.com/rest/")
        );
        assert_eq!(config.planfix.token.as_deref(), Some("secret"));
        assert_eq!(config.planfix.lead_template_id, Some(42));
        assert_eq!(config.planfix.timeout_secs, 30);
        assert_eq!(config.cache.backend, CacheBackend::Sqlite);
        clear_env();
    }

    #[test]
    fn test_cli_path_overrides_env_path() {
        let _lock = ENV_TEST_LOCK.lock().unwrap();
        clear_env();
        unsafe {
            std::env::set_var("PLANFIX_CONFIG", "/etc/planfix.yml");
        }

        let from_env = Config::load(None);
        assert_eq!(
            from_env.custom_fields.file,
            Some(PathBuf::from("/etc/planfix.yml"))
        );

        let from_cli = Config::load(Some(PathBuf::from("local.yml")));
        assert_eq!(from_cli.custom_fields.file, Some(PathBuf::from("local.yml")));
        clear_env();
    }

    #[test]
    fn test_default_field_file() {
        let _lock = ENV_TEST_LOCK.lock().unwrap();
        clear_env();
        let config = Config::from_env();
        assert_eq!(config.custom_fields.file, Some(PathBuf::from("config.yml")));
    }

    #[test]
    fn test_base_url_wins_over_account() {
        let config = PlanfixConfig {
            account: Some("acme".to_string()),
            base_url: Some("http://localhost:9000/rest/".to_string()),
            ..Default::default()
        };
        assert_eq!(config.rest_url().as_deref(), Some("http://localhost:9000/rest/"));
        assert_eq!(PlanfixConfig::default().rest_url(), None);
        assert_eq!(
            config.entity_url("task", 12).as_deref(),
            Some("https://acme.planfix.com/task/12")
        );
    }

    #[test]
    fn test_token_redacted_in_debug() {
        let config = PlanfixConfig {
            token: Some("super_secret_token".to_string()),
            ..Default::default()
        };
        let debug_str = format!("{:?}", config);
        assert!(debug_str.contains("REDACTED"));
        assert!(!debug_str.contains("super_secret_token"));
    }

    #[test]
    fn test_cache_backend_parsing() {
        assert_eq!("SQLite".parse::<CacheBackend>(), Ok(CacheBackend::Sqlite));
        assert_eq!("none".parse::<CacheBackend>(), Ok(CacheBackend::None));
        assert!("redis".parse::<CacheBackend>().is_err());
    }
}
