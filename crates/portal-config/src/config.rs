//! Client configuration.

use crate::{CoreError, CoreResult, Paths};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;
use url::Url;

/// Default API origin (can be overridden at compile time via PORTAL_API_URL).
pub const DEFAULT_API_URL: &str = match option_env!("PORTAL_API_URL") {
    Some(url) => url,
    None => "https://portal-api.example.com",
};

/// Every endpoint lives under this prefix of the API origin.
pub const FUNCTIONS_PATH: &str = "/functions/v1";

/// Header carrying the identity-provider token on each request.
pub const DEFAULT_TOKEN_HEADER: &str = "rs-google-token";

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// How often the background watch re-checks token expiry.
pub const DEFAULT_EXPIRY_CHECK_INTERVAL_SECS: u64 = 30;

/// Per-request timeout applied by the HTTP transport.
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 30;

/// Portal client configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// API origin, without the functions prefix.
    #[serde(default = "default_api_url")]
    pub api_url: String,
    /// Name of the header that carries the bearer token.
    #[serde(default = "default_token_header")]
    pub token_header: String,
    /// Expiry watch interval in seconds.
    #[serde(default = "default_expiry_check_interval_secs")]
    pub expiry_check_interval_secs: u64,
    /// Transport timeout in seconds; `None` disables it.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: Option<u64>,
}

fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_token_header() -> String {
    DEFAULT_TOKEN_HEADER.to_string()
}

fn default_expiry_check_interval_secs() -> u64 {
    DEFAULT_EXPIRY_CHECK_INTERVAL_SECS
}

fn default_request_timeout_secs() -> Option<u64> {
    Some(DEFAULT_REQUEST_TIMEOUT_SECS)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            api_url: default_api_url(),
            token_header: default_token_header(),
            expiry_check_interval_secs: default_expiry_check_interval_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

impl Config {
    /// Defaults, then environment overrides.
    pub fn new() -> Self {
        let mut config = Self::default();
        config.apply_env(|name| std::env::var(name).ok());
        config
    }

    /// Load `~/.portal/config.json` if present, then apply environment overrides.
    pub fn load(paths: &Paths) -> CoreResult<Self> {
        let config_path = paths.config_file();

        let mut config = if config_path.exists() {
            Self::load_from_file(&config_path)?
        } else {
            Self::default()
        };

        config.apply_env(|name| std::env::var(name).ok());
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> CoreResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to `~/.portal/config.json`.
    pub fn save(&self, paths: &Paths) -> CoreResult<()> {
        paths.ensure_dirs()?;
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(paths.config_file(), content)?;
        Ok(())
    }

    /// Apply `PORTAL_LOG_LEVEL` and `PORTAL_API_URL` overrides.
    fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("PORTAL_LOG_LEVEL").filter(|v| !v.trim().is_empty()) {
            self.log_level = level.trim().to_string();
        }
        if let Some(url) = lookup("PORTAL_API_URL").filter(|v| !v.trim().is_empty()) {
            self.api_url = url.trim().to_string();
        }
    }

    /// Reject configurations the client cannot run with.
    pub fn validate(&self) -> CoreResult<()> {
        self.api_url()?;
        if self.token_header.trim().is_empty() {
            return Err(CoreError::Config("token_header must not be empty".to_string()));
        }
        if self.expiry_check_interval_secs == 0 {
            return Err(CoreError::Config(
                "expiry_check_interval_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// The API origin as a parsed URL.
    pub fn api_url(&self) -> CoreResult<Url> {
        Url::parse(&self.api_url).map_err(CoreError::from)
    }

    /// Origin plus [`FUNCTIONS_PATH`], without a trailing slash.
    pub fn functions_base_url(&self) -> String {
        format!("{}{}", self.api_url.trim_end_matches('/'), FUNCTIONS_PATH)
    }

    pub fn expiry_check_interval(&self) -> Duration {
        Duration::from_secs(self.expiry_check_interval_secs)
    }

    pub fn request_timeout(&self) -> Option<Duration> {
        self.request_timeout_secs.map(Duration::from_secs)
    }
}
