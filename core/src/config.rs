//! Configuration for the API client and the dashboard driver.
//!
//! Values come from a TOML file or from `REPORTES_*` environment variables.
//! Everything except `base_url` has a default.

use std::path::Path;

use serde::Deserialize;
use url::Url;

pub const DEFAULT_API_PREFIX: &str = "/api";
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_PER_PAGE: usize = 10;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required setting {0}")]
    Missing(&'static str),
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config TOML: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

fn default_api_prefix() -> String {
    DEFAULT_API_PREFIX.to_string()
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

fn default_per_page() -> usize {
    DEFAULT_PER_PAGE
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ClientConfig {
    /// Scheme and authority of the backend, e.g. `http://localhost:8000`.
    pub base_url: String,
    #[serde(default = "default_api_prefix")]
    pub api_prefix: String,
    /// Anti-forgery token sent as `X-CSRFToken` on POST when the caller does
    /// not pass one explicitly.
    #[serde(default)]
    pub csrf_token: Option<String>,
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

impl ClientConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.to_string(),
            api_prefix: default_api_prefix(),
            csrf_token: None,
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }

    pub fn with_csrf_token(mut self, token: &str) -> Self {
        self.csrf_token = Some(token.to_string());
        self
    }

    /// `base_url` joined with `api_prefix`, without a trailing slash.
    pub fn api_root(&self) -> String {
        format!(
            "{}{}",
            self.base_url.trim_end_matches('/'),
            self.api_prefix.trim_end_matches('/')
        )
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.base_url.trim();
        if base.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "base_url",
                reason: "must not be empty".to_string(),
            });
        }
        let parsed = Url::parse(base).map_err(|e| ConfigError::InvalidValue {
            field: "base_url",
            reason: format!("{base:?} is not a valid URL: {e}"),
        })?;
        if !matches!(parsed.scheme(), "http" | "https") {
            return Err(ConfigError::InvalidValue {
                field: "base_url",
                reason: format!("expected an http(s) URL, got scheme {}", parsed.scheme()),
            });
        }
        if parsed.host_str().is_none_or(str::is_empty) {
            return Err(ConfigError::InvalidValue {
                field: "base_url",
                reason: format!("{base:?} has no host"),
            });
        }
        if !self.api_prefix.is_empty() && !self.api_prefix.starts_with('/') {
            return Err(ConfigError::InvalidValue {
                field: "api_prefix",
                reason: "must start with '/'".to_string(),
            });
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::InvalidValue {
                field: "timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }

    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let base_url = lookup("REPORTES_BASE_URL").ok_or(ConfigError::Missing("REPORTES_BASE_URL"))?;
        let mut config = Self::new(&base_url);
        if let Some(prefix) = lookup("REPORTES_API_PREFIX") {
            config.api_prefix = prefix;
        }
        config.csrf_token = lookup("REPORTES_CSRF_TOKEN").filter(|t| !t.is_empty());
        if let Some(raw) = lookup("REPORTES_TIMEOUT_MS") {
            config.timeout_ms = parse_number("timeout_ms", &raw)?;
        }
        Ok(config)
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DashboardConfig {
    pub client: ClientConfig,
    #[serde(default = "default_per_page")]
    pub per_page: usize,
    /// Drop the cached listing of a resource after creating a record in it,
    /// so the reload after a submit goes to the network. Off by default:
    /// cached listings otherwise stay as first fetched for the whole session.
    #[serde(default)]
    pub invalidate_on_submit: bool,
}

impl DashboardConfig {
    pub fn new(client: ClientConfig) -> Self {
        Self {
            client,
            per_page: DEFAULT_PER_PAGE,
            invalidate_on_submit: false,
        }
    }

    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        let config: DashboardConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_toml_str(&contents)
    }

    /// Read `REPORTES_BASE_URL`, `REPORTES_API_PREFIX`, `REPORTES_CSRF_TOKEN`,
    /// `REPORTES_TIMEOUT_MS`, `REPORTES_PER_PAGE` and
    /// `REPORTES_INVALIDATE_ON_SUBMIT`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(&|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::new(ClientConfig::from_lookup(lookup)?);
        if let Some(raw) = lookup("REPORTES_PER_PAGE") {
            config.per_page = parse_number("per_page", &raw)?;
        }
        if let Some(raw) = lookup("REPORTES_INVALIDATE_ON_SUBMIT") {
            config.invalidate_on_submit = matches!(raw.trim(), "1" | "true" | "yes");
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.client.validate()?;
        if self.per_page == 0 {
            return Err(ConfigError::InvalidValue {
                field: "per_page",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

fn parse_number<T: std::str::FromStr>(field: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        field,
        reason: format!("expected a number, got {raw:?}"),
    })
}
