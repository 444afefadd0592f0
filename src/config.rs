use std::env;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

const DEFAULT_UPSTREAM_URL: &str = "https://api.openai.com";
const DEFAULT_MODEL: &str = "gpt-3.5-turbo";
const DEFAULT_UPSTREAM_TIMEOUT_SECS: u64 = 10;

/// Errors encountered while loading configuration from environment variables.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Required environment variable was not provided.
    #[error("Missing environment variable: {0}")]
    MissingVariable(String),
    /// Environment variable contained a value that could not be parsed.
    #[error("Invalid value for environment variable: {0}")]
    InvalidValue(String),
    /// Configuration was installed twice in the global cache.
    #[error("Configuration already initialized")]
    AlreadyInitialized,
}

/// Runtime configuration for the cvlens gateway.
#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the OpenAI-compatible upstream provider.
    pub upstream_url: String,
    /// Bearer credential forwarded to the upstream provider.
    pub upstream_api_key: String,
    /// Model identifier sent with every analysis request.
    pub upstream_model: String,
    /// Hard timeout applied to each upstream call.
    pub upstream_timeout: Duration,
    /// Optional override for the HTTP server port.
    pub server_port: Option<u16>,
}

impl Config {
    /// Load configuration from environment variables, performing validation along the way.
    pub fn from_env() -> Result<Self, ConfigError> {
        let upstream_api_key = load_env("OPENAI_API_KEY")?;
        if upstream_api_key.trim().is_empty() {
            return Err(ConfigError::InvalidValue("OPENAI_API_KEY".into()));
        }

        Ok(Self {
            upstream_url: load_env_optional("CVLENS_UPSTREAM_URL")
                .unwrap_or_else(|| DEFAULT_UPSTREAM_URL.to_string()),
            upstream_api_key,
            upstream_model: load_env_optional("CVLENS_MODEL")
                .unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            upstream_timeout: load_env_optional("CVLENS_UPSTREAM_TIMEOUT_SECS")
                .map(|value| {
                    value
                        .parse::<u64>()
                        .ok()
                        .filter(|secs| *secs > 0)
                        .map(Duration::from_secs)
                        .ok_or_else(|| {
                            ConfigError::InvalidValue("CVLENS_UPSTREAM_TIMEOUT_SECS".into())
                        })
                })
                .transpose()?
                .unwrap_or(Duration::from_secs(DEFAULT_UPSTREAM_TIMEOUT_SECS)),
            server_port: load_env_optional("SERVER_PORT")
                .map(|value| {
                    value
                        .parse()
                        .map_err(|_| ConfigError::InvalidValue("SERVER_PORT".into()))
                })
                .transpose()?,
        })
    }
}

fn load_env(key: &str) -> Result<String, ConfigError> {
    env::var(key).map_err(|_| ConfigError::MissingVariable(key.to_string()))
}

fn load_env_optional(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

/// Global configuration cache populated during process start.
pub static CONFIG: OnceLock<Config> = OnceLock::new();

/// Retrieve the loaded configuration, if [`init_config`] has run.
pub fn get_config() -> Option<&'static Config> {
    CONFIG.get()
}

/// Load configuration from the environment (and `.env`) and install it in the global cache.
pub fn init_config() -> Result<&'static Config, ConfigError> {
    dotenvy::dotenv().ok();
    let config = Config::from_env()?;
    tracing::debug!(
        upstream_url = %config.upstream_url,
        model = %config.upstream_model,
        timeout_secs = config.upstream_timeout.as_secs(),
        server_port = ?config.server_port,
        "Loaded configuration"
    );
    CONFIG
        .set(config)
        .map_err(|_| ConfigError::AlreadyInitialized)?;
    CONFIG.get().ok_or(ConfigError::AlreadyInitialized)
}
