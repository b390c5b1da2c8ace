//! Client configuration

use reqwest::Url;
use std::time::Duration;

use crate::error::TutorError;
use crate::state::ResponseOrdering;
use crate::Result;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000";

pub const ENV_API_URL: &str = "TUTOR_API_URL";
pub const ENV_REQUEST_TIMEOUT: &str = "TUTOR_REQUEST_TIMEOUT_SECS";
pub const ENV_RESPONSE_ORDERING: &str = "TUTOR_RESPONSE_ORDERING";

/// Settings for `TutorClient`
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Backend origin, without a trailing path
    pub base_url: String,
    pub pool_idle_timeout: Duration,
    pub pool_max_idle_per_host: usize,
    /// `None` leaves requests unbounded
    pub request_timeout: Option<Duration>,
    pub ordering: ResponseOrdering,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            pool_idle_timeout: Duration::from_secs(90),
            pool_max_idle_per_host: 8,
            request_timeout: None,
            ordering: ResponseOrdering::default(),
        }
    }
}

impl ClientConfig {
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_ordering(mut self, ordering: ResponseOrdering) -> Self {
        self.ordering = ordering;
        self
    }

    /// Defaults overridden by `TUTOR_*` environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(url) = lookup(ENV_API_URL).filter(|v| !v.trim().is_empty()) {
            config.base_url = url.trim().to_string();
        }

        if let Some(raw) = lookup(ENV_REQUEST_TIMEOUT).filter(|v| !v.trim().is_empty()) {
            let secs: u64 = raw.trim().parse().map_err(|_| {
                TutorError::ConfigError(format!(
                    "{} must be a whole number of seconds, got '{}'",
                    ENV_REQUEST_TIMEOUT, raw
                ))
            })?;
            config.request_timeout = (secs > 0).then(|| Duration::from_secs(secs));
        }

        if let Some(raw) = lookup(ENV_RESPONSE_ORDERING).filter(|v| !v.trim().is_empty()) {
            config.ordering = raw
                .parse()
                .map_err(|e| TutorError::ConfigError(format!("{}: {}", ENV_RESPONSE_ORDERING, e)))?;
        }

        config.validate()?;
        Ok(config)
    }

    /// The base URL must parse as an absolute http(s) URL with a host
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(self.base_url.trim()).map_err(|e| {
            TutorError::ConfigError(format!("invalid base URL '{}': {}", self.base_url, e))
        })?;

        if !matches!(url.scheme(), "http" | "https") {
            return Err(TutorError::ConfigError(format!(
                "base URL must use http or https, got '{}'",
                self.base_url
            )));
        }
        if url.host_str().map_or(true, str::is_empty) {
            return Err(TutorError::ConfigError(format!(
                "base URL has no host: '{}'",
                self.base_url
            )));
        }
        Ok(())
    }

    /// Absolute URL for an endpoint path such as `/upload`
    pub fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }
}
