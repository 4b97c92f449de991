use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use std::path::Path;
use tracing::info;
use validator::Validate;

/// Default values for configuration
const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";
const DEFAULT_GATEWAY_BASE_URL: &str = "https://api.paystack.co";
const DEFAULT_EMAIL_BASE_URL: &str = "https://api.resend.com";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_EMAIL_MAX_ATTEMPTS: i32 = 10;
const DEFAULT_EMAIL_BATCH_LIMIT: u64 = 10;

/// Payment gateway configuration (Paystack-style initialize/verify provider).
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct GatewayConfig {
    /// Secret key used for API calls; absent means the gateway is not
    /// configured and checkout falls back to inline config only.
    #[serde(default)]
    pub secret_key: Option<String>,

    /// Public key exposed to inline checkout clients
    #[serde(default)]
    pub public_key: Option<String>,

    /// Gateway API base URL (overridable for tests)
    #[serde(default = "default_gateway_base_url")]
    pub base_url: String,

    /// Shared secret for inbound webhook signatures; absent means
    /// development mode (webhooks accepted unverified)
    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// Bounded timeout for gateway HTTP calls
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,

    /// URL the gateway redirects back to after hosted checkout
    #[serde(default)]
    pub callback_url: Option<String>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            secret_key: None,
            public_key: None,
            base_url: default_gateway_base_url(),
            webhook_secret: None,
            timeout_secs: default_http_timeout_secs(),
            callback_url: None,
        }
    }
}

/// Transactional email provider + queue policy configuration.
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct EmailConfig {
    /// Provider API key; absent disables real sends (dispatch fails and
    /// items back off until configured)
    #[serde(default)]
    pub api_key: Option<String>,

    /// Provider API base URL (overridable for tests)
    #[serde(default = "default_email_base_url")]
    pub base_url: String,

    /// Sender address for all outbound mail
    #[serde(default = "default_from_email")]
    pub from_email: String,

    /// Store owner address for order notifications
    #[serde(default)]
    pub owner_email: Option<String>,

    /// Shared secret for the delivery-events webhook
    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// Bounded timeout for provider HTTP calls
    #[serde(default = "default_http_timeout_secs")]
    pub timeout_secs: u64,

    /// Queue items with this many failed attempts stop being claimed
    #[validate(range(min = 1))]
    #[serde(default = "default_email_max_attempts")]
    pub max_attempts: i32,

    /// Default batch size for the worker trigger
    #[serde(default = "default_email_batch_limit")]
    pub batch_limit: u64,
}

impl Default for EmailConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_email_base_url(),
            from_email: default_from_email(),
            owner_email: None,
            webhook_secret: None,
            timeout_secs: default_http_timeout_secs(),
            max_attempts: default_email_max_attempts(),
            batch_limit: default_email_batch_limit(),
        }
    }
}

/// Application configuration structure with validation
#[derive(Clone, Debug, Deserialize, Validate)]
#[serde(deny_unknown_fields)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// Application environment
    #[serde(default = "default_environment")]
    pub environment: String,

    /// Logging level
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Log in JSON format (structured logging)
    #[serde(default)]
    pub log_json: bool,

    /// Whether to run database migrations on startup
    #[serde(default)]
    pub auto_migrate: bool,

    /// Shared secret for admin/worker endpoints (x-admin-key header).
    /// Absent means admin surfaces are disabled entirely.
    #[serde(default)]
    pub admin_api_key: Option<String>,

    /// DB pool: max connections
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,

    /// DB pool: min connections
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,

    /// DB timeouts (seconds)
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    #[serde(default)]
    #[validate]
    pub gateway: GatewayConfig,

    #[serde(default)]
    #[validate]
    pub email: EmailConfig,
}

fn default_host() -> String {
    DEFAULT_HOST.to_string()
}
fn default_port() -> u16 {
    DEFAULT_PORT
}
fn default_environment() -> String {
    DEFAULT_ENV.to_string()
}
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}
fn default_gateway_base_url() -> String {
    DEFAULT_GATEWAY_BASE_URL.to_string()
}
fn default_email_base_url() -> String {
    DEFAULT_EMAIL_BASE_URL.to_string()
}
fn default_from_email() -> String {
    "no-reply@example.com".to_string()
}
fn default_http_timeout_secs() -> u64 {
    DEFAULT_HTTP_TIMEOUT_SECS
}
fn default_email_max_attempts() -> i32 {
    DEFAULT_EMAIL_MAX_ATTEMPTS
}
fn default_email_batch_limit() -> u64 {
    DEFAULT_EMAIL_BATCH_LIMIT
}
fn default_db_max_connections() -> u32 {
    10
}
fn default_db_min_connections() -> u32 {
    1
}
fn default_db_connect_timeout_secs() -> u64 {
    30
}
fn default_db_idle_timeout_secs() -> u64 {
    600
}
fn default_db_acquire_timeout_secs() -> u64 {
    8
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.environment.eq_ignore_ascii_case("production")
    }

    pub fn log_level(&self) -> &str {
        &self.log_level
    }
}

/// Loads configuration from `config/default.toml`, an environment-specific
/// overlay, and `APP_*` environment variables (highest precedence).
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let run_env = std::env::var("RUN_ENV").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let mut builder = Config::builder();

    let default_path = format!("{}/default", CONFIG_DIR);
    if Path::new(&format!("{}.toml", default_path)).exists() {
        builder = builder.add_source(File::with_name(&default_path));
    }
    let env_path = format!("{}/{}", CONFIG_DIR, run_env);
    if Path::new(&format!("{}.toml", env_path)).exists() {
        builder = builder.add_source(File::with_name(&env_path));
    }

    let settings = builder
        .add_source(Environment::with_prefix("APP").separator("__"))
        .build()?;

    let cfg: AppConfig = settings.try_deserialize()?;
    cfg.validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {}", e)))?;

    info!(environment = %cfg.environment, "Configuration loaded");
    Ok(cfg)
}

/// Initializes the global tracing subscriber.
pub fn init_tracing(log_level: &str, json: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if json {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_config() -> AppConfig {
        AppConfig {
            database_url: "sqlite::memory:".to_string(),
            host: default_host(),
            port: default_port(),
            environment: default_environment(),
            log_level: default_log_level(),
            log_json: false,
            auto_migrate: true,
            admin_api_key: Some("test-admin-key".to_string()),
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            gateway: GatewayConfig::default(),
            email: EmailConfig::default(),
        }
    }

    #[test]
    fn defaults_validate() {
        let cfg = minimal_config();
        assert!(cfg.validate().is_ok());
        assert!(!cfg.is_production());
        assert_eq!(cfg.email.max_attempts, 10);
    }

    #[test]
    fn zero_max_attempts_rejected() {
        let mut cfg = minimal_config();
        cfg.email.max_attempts = 0;
        assert!(cfg.validate().is_err());
    }
}
