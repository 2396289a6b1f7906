use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

const DEFAULT_LOG_LEVEL: &str = "info";
const DEFAULT_ENV: &str = "development";
const DEFAULT_PORT: u16 = 8080;
const CONFIG_DIR: &str = "config";

/// Credentials for one payment provider. Only the webhook secret is used by
/// this service; the client-side gateway protocol lives elsewhere.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct ProviderCredentials {
    #[serde(default)]
    pub account_id: Option<String>,
    #[serde(default)]
    pub secret_key: Option<String>,
    #[serde(default)]
    pub webhook_secret: Option<String>,
}

/// Payment gateway configuration: two alternative providers, selected per
/// webhook call by path.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct PaymentConfig {
    #[serde(default)]
    pub stripe: ProviderCredentials,
    #[serde(default)]
    pub yookassa: ProviderCredentials,
    /// Webhook timestamp tolerance (seconds)
    #[serde(default = "default_webhook_tolerance_secs")]
    pub webhook_tolerance_secs: u64,
}

/// Application configuration, layered from `config/default.toml`,
/// `config/{environment}.toml` and `APP__*` environment variables.
#[derive(Clone, Debug, Deserialize, Validate)]
pub struct AppConfig {
    /// Database connection URL
    pub database_url: String,

    /// JWT signing secret (minimum 32 characters)
    #[validate(length(min = 32))]
    pub jwt_secret: String,

    /// Access token lifetime in seconds
    #[serde(default = "default_jwt_expiration")]
    pub jwt_expiration: u64,

    /// Refresh token lifetime in seconds
    #[serde(default = "default_refresh_expiration")]
    pub refresh_token_expiration: u64,

    #[serde(default = "default_auth_issuer")]
    pub auth_issuer: String,

    #[serde(default = "default_auth_audience")]
    pub auth_audience: String,

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

    /// Fixed page size for list endpoints
    #[serde(default = "default_page_size")]
    pub page_size: u64,

    /// CORS: comma-separated list of allowed origins
    #[serde(default)]
    pub cors_allowed_origins: Option<String>,

    /// DB pool tuning
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_min_connections")]
    pub db_min_connections: u32,
    #[serde(default = "default_db_connect_timeout_secs")]
    pub db_connect_timeout_secs: u64,
    #[serde(default = "default_db_idle_timeout_secs")]
    pub db_idle_timeout_secs: u64,
    #[serde(default = "default_db_acquire_timeout_secs")]
    pub db_acquire_timeout_secs: u64,

    /// Event channel capacity for async event processing
    #[serde(default = "default_event_channel_capacity")]
    pub event_channel_capacity: usize,

    /// Sender address stamped onto outgoing notification emails
    #[serde(default = "default_email_from")]
    pub email_from: String,

    /// Email verification token lifetime (seconds)
    #[serde(default = "default_account_token_ttl")]
    pub email_verification_ttl_secs: u64,

    /// Password reset token lifetime (seconds)
    #[serde(default = "default_account_token_ttl")]
    pub password_reset_ttl_secs: u64,

    #[serde(default)]
    pub payment: PaymentConfig,
}

fn default_jwt_expiration() -> u64 {
    60 * 60
}
fn default_refresh_expiration() -> u64 {
    24 * 60 * 60
}
fn default_auth_issuer() -> String {
    "bigcorp-auth".to_string()
}
fn default_auth_audience() -> String {
    "bigcorp-api".to_string()
}
fn default_host() -> String {
    "0.0.0.0".to_string()
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
fn default_page_size() -> u64 {
    15
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
fn default_event_channel_capacity() -> usize {
    1024
}
fn default_email_from() -> String {
    "noreply@bigcorp.example".to_string()
}
fn default_account_token_ttl() -> u64 {
    60 * 60
}
fn default_webhook_tolerance_secs() -> u64 {
    300
}

impl AppConfig {
    /// Minimal constructor used by the test harness.
    pub fn new(database_url: String, jwt_secret: String, environment: String) -> Self {
        Self {
            database_url,
            jwt_secret,
            jwt_expiration: default_jwt_expiration(),
            refresh_token_expiration: default_refresh_expiration(),
            auth_issuer: default_auth_issuer(),
            auth_audience: default_auth_audience(),
            host: "127.0.0.1".to_string(),
            port: DEFAULT_PORT,
            environment,
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_json: false,
            auto_migrate: false,
            page_size: default_page_size(),
            cors_allowed_origins: None,
            db_max_connections: default_db_max_connections(),
            db_min_connections: default_db_min_connections(),
            db_connect_timeout_secs: default_db_connect_timeout_secs(),
            db_idle_timeout_secs: default_db_idle_timeout_secs(),
            db_acquire_timeout_secs: default_db_acquire_timeout_secs(),
            event_channel_capacity: default_event_channel_capacity(),
            email_from: default_email_from(),
            email_verification_ttl_secs: default_account_token_ttl(),
            password_reset_ttl_secs: default_account_token_ttl(),
            payment: PaymentConfig::default(),
        }
    }

    pub fn is_development(&self) -> bool {
        self.environment == "development" || self.environment == "test"
    }
}

/// Load configuration from layered sources: defaults file, environment file,
/// then `APP__*` environment variables.
pub fn load_config() -> Result<AppConfig, ConfigError> {
    let environment =
        std::env::var("APP__ENVIRONMENT").unwrap_or_else(|_| DEFAULT_ENV.to_string());

    let mut builder = Config::builder();

    builder = builder.add_source(File::with_name(&format!("{CONFIG_DIR}/default")).required(false));
    builder =
        builder.add_source(File::with_name(&format!("{CONFIG_DIR}/{environment}")).required(false));

    builder = builder.add_source(
        Environment::with_prefix("APP")
            .prefix_separator("__")
            .separator("__"),
    );

    let cfg: AppConfig = builder.build()?.try_deserialize()?;

    cfg.validate()
        .map_err(|e| ConfigError::Message(format!("invalid configuration: {e}")))?;

    info!(environment = %cfg.environment, "configuration loaded");
    Ok(cfg)
}

/// Initialise the tracing subscriber. Output format (text or JSON) follows
/// the `log_json` setting.
pub fn init_tracing(log_level: &str, log_json: bool) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(log_level.to_string()));

    if log_json {
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

    #[test]
    fn test_constructor_produces_valid_config() {
        let cfg = AppConfig::new(
            "sqlite::memory:".into(),
            "test_secret_key_for_testing_purposes_only".into(),
            "test".into(),
        );
        assert!(cfg.validate().is_ok());
        assert_eq!(cfg.page_size, 15);
        assert!(cfg.is_development());
    }

    #[test]
    fn short_jwt_secret_is_rejected() {
        let cfg = AppConfig::new("sqlite::memory:".into(), "short".into(), "test".into());
        assert!(cfg.validate().is_err());
    }
}
