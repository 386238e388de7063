// src/config.rs
use std::{path::PathBuf, str::FromStr, time::Duration};

use axum::http::HeaderValue;
use thiserror::Error;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_CHAT_TIMEOUT: Duration = Duration::from_millis(9_000);
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(500);
pub const DEFAULT_RATE_LIMIT_MAX: usize = 100;
pub const DEFAULT_RATE_LIMIT_WINDOW: Duration = Duration::from_secs(15 * 60);
pub const DEFAULT_DOCUMENT_PATH: &str = "Sample.docx";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable is missing")]
    Missing(&'static str),

    #[error("{name} has an invalid value {value:?}: {reason}")]
    Invalid {
        name: &'static str,
        value: String,
        reason: String,
    },
}

/// Origins allowed to call the relay from a browser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AllowedOrigins {
    Any,
    List(Vec<HeaderValue>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitConfig {
    pub max_requests: usize,
    pub window: Duration,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            max_requests: DEFAULT_RATE_LIMIT_MAX,
            window: DEFAULT_RATE_LIMIT_WINDOW,
        }
    }
}

/// Validated process configuration. Built once at startup and shared read-only.
#[derive(Clone)]
pub struct AppConfig {
    pub api_key: String,
    pub assistant_id: String,
    pub base_url: String,
    pub allowed_origins: AllowedOrigins,
    pub port: u16,
    pub chat_timeout: Duration,
    pub poll_interval: Duration,
    pub rate_limit: RateLimitConfig,
    pub document_path: PathBuf,
}

// Keeps the API key out of logs.
impl std::fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppConfig")
            .field("assistant_id", &self.assistant_id)
            .field("base_url", &self.base_url)
            .field("allowed_origins", &self.allowed_origins)
            .field("port", &self.port)
            .field("chat_timeout", &self.chat_timeout)
            .field("poll_interval", &self.poll_interval)
            .field("rate_limit", &self.rate_limit)
            .field("document_path", &self.document_path)
            .finish_non_exhaustive()
    }
}

impl AppConfig {
    /// Reads configuration from the process environment.
    ///
    /// | Variable                 | Default                     |
    /// |--------------------------|-----------------------------|
    /// | `OPENAI_API_KEY`         | required                    |
    /// | `ASSISTANT_ID`           | required                    |
    /// | `ALLOWED_ORIGINS`        | any origin                  |
    /// | `PORT`                   | `8080`                      |
    /// | `OPENAI_BASE_URL`        | `https://api.openai.com/v1` |
    /// | `CHAT_TIMEOUT_MS`        | `9000`                      |
    /// | `RUN_POLL_INTERVAL_MS`   | `500`                       |
    /// | `RATE_LIMIT_MAX`         | `100`                       |
    /// | `RATE_LIMIT_WINDOW_SECS` | `900`                       |
    /// | `DOCUMENT_PATH`          | `Sample.docx`               |
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`AppConfig::from_env`] but with an arbitrary variable source.
    /// Blank values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let api_key = get("OPENAI_API_KEY").ok_or(ConfigError::Missing("OPENAI_API_KEY"))?;
        let assistant_id = get("ASSISTANT_ID").ok_or(ConfigError::Missing("ASSISTANT_ID"))?;

        let allowed_origins = match get("ALLOWED_ORIGINS") {
            Some(raw) => parse_origins(&raw)?,
            None => AllowedOrigins::Any,
        };

        let port = parse_or("PORT", get("PORT"), DEFAULT_PORT)?;
        let base_url = get("OPENAI_BASE_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_string());

        let chat_timeout = get("CHAT_TIMEOUT_MS")
            .map(|v| parse::<u64>("CHAT_TIMEOUT_MS", v).map(Duration::from_millis))
            .transpose()?
            .unwrap_or(DEFAULT_CHAT_TIMEOUT);
        let poll_interval = get("RUN_POLL_INTERVAL_MS")
            .map(|v| parse::<u64>("RUN_POLL_INTERVAL_MS", v).map(Duration::from_millis))
            .transpose()?
            .unwrap_or(DEFAULT_POLL_INTERVAL);

        let max_requests = parse_or("RATE_LIMIT_MAX", get("RATE_LIMIT_MAX"), DEFAULT_RATE_LIMIT_MAX)?;
        if max_requests == 0 {
            return Err(ConfigError::Invalid {
                name: "RATE_LIMIT_MAX",
                value: "0".into(),
                reason: "limit must be positive".into(),
            });
        }
        let window = get("RATE_LIMIT_WINDOW_SECS")
            .map(|v| parse::<u64>("RATE_LIMIT_WINDOW_SECS", v).map(Duration::from_secs))
            .transpose()?
            .unwrap_or(DEFAULT_RATE_LIMIT_WINDOW);
        if window.is_zero() {
            return Err(ConfigError::Invalid {
                name: "RATE_LIMIT_WINDOW_SECS",
                value: "0".into(),
                reason: "window must be positive".into(),
            });
        }

        let document_path = get("DOCUMENT_PATH")
            .unwrap_or_else(|| DEFAULT_DOCUMENT_PATH.to_string())
            .into();

        Ok(Self {
            api_key,
            assistant_id,
            base_url,
            allowed_origins,
            port,
            chat_timeout,
            poll_interval,
            rate_limit: RateLimitConfig {
                max_requests,
                window,
            },
            document_path,
        })
    }
}

fn parse<T>(name: &'static str, value: String) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.parse::<T>().map_err(|e| ConfigError::Invalid {
        name,
        reason: e.to_string(),
        value,
    })
}

fn parse_or<T>(name: &'static str, value: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    value.map(|v| parse(name, v)).transpose().map(|v| v.unwrap_or(default))
}

fn parse_origins(raw: &str) -> Result<AllowedOrigins, ConfigError> {
    let mut origins = Vec::new();
    for origin in raw.split(',').map(str::trim).filter(|o| !o.is_empty()) {
        if origin == "*" {
            return Ok(AllowedOrigins::Any);
        }
        let value = HeaderValue::from_str(origin).map_err(|e| ConfigError::Invalid {
            name: "ALLOWED_ORIGINS",
            value: origin.to_string(),
            reason: e.to_string(),
        })?;
        origins.push(value);
    }

    if origins.is_empty() {
        Ok(AllowedOrigins::Any)
    } else {
        Ok(AllowedOrigins::List(origins))
    }
}
