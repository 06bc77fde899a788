use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use common::{env_bool, env_string, env_u64};

use crate::errors::ConfigError;

pub const DEFAULT_DEBOUNCE_MS: u64 = 2000;
const MAX_DEBOUNCE_MS: u64 = 10 * 60 * 1000;

/// Configuration for one or many [`AutoSaver`](crate::AutoSaver) sessions
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutoSaveConfig {
    /// Quiet period after the last edit before a flush (ms)
    pub debounce_ms: u64,
    /// Merge a failed snapshot back under newer edits instead of dropping it
    pub requeue_on_failure: bool,
    pub endpoint: EndpointConfig,
}

impl Default for AutoSaveConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            requeue_on_failure: false,
            endpoint: EndpointConfig::default(),
        }
    }
}

/// Where [`HttpSectionWriter`](crate::HttpSectionWriter) sends its PATCH requests
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointConfig {
    pub base_url: String,
    pub auth_token: Option<String>,
    pub timeout_ms: u64,
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:3000".to_string(),
            auth_token: None,
            timeout_ms: 10_000,
        }
    }
}

impl EndpointConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.base_url.starts_with("http://") || self.base_url.starts_with("https://")) {
            return Err(ConfigError::Invalid {
                field: "endpoint.base_url",
                reason: format!("expected an http(s) URL, got {:?}", self.base_url),
            });
        }
        if self.timeout_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "endpoint.timeout_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        Ok(())
    }
}

impl AutoSaveConfig {
    pub fn with_debounce_ms(mut self, debounce_ms: u64) -> Self {
        self.debounce_ms = debounce_ms;
        self
    }

    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(raw)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_toml_str(&raw)
    }

    /// Defaults overridden by `AUTOSAVE_*` environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env_overrides()
    }

    pub fn with_env_overrides(mut self) -> Result<Self, ConfigError> {
        if let Some(ms) = env_u64("AUTOSAVE_DEBOUNCE_MS")? {
            self.debounce_ms = ms;
        }
        if let Some(requeue) = env_bool("AUTOSAVE_REQUEUE_ON_FAILURE")? {
            self.requeue_on_failure = requeue;
        }
        if let Some(url) = env_string("AUTOSAVE_BASE_URL") {
            self.endpoint.base_url = url;
        }
        if let Some(token) = env_string("AUTOSAVE_AUTH_TOKEN") {
            self.endpoint.auth_token = Some(token);
        }
        if let Some(ms) = env_u64("AUTOSAVE_TIMEOUT_MS")? {
            self.endpoint.timeout_ms = ms;
        }
        self.validate()?;
        Ok(self)
    }

    /// Checks the debounce window only; the endpoint is validated by the HTTP writer.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.debounce_ms == 0 {
            return Err(ConfigError::Invalid {
                field: "debounce_ms",
                reason: "must be greater than zero".to_string(),
            });
        }
        if self.debounce_ms > MAX_DEBOUNCE_MS {
            return Err(ConfigError::Invalid {
                field: "debounce_ms",
                reason: format!("must not exceed {} ms", MAX_DEBOUNCE_MS),
            });
        }
        Ok(())
    }
}
