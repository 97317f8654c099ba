use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Memory,
    Http,
}

impl FromStr for StoreBackend {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(StoreBackend::Memory),
            "http" => Ok(StoreBackend::Http),
            other => Err(format!("unknown store backend `{other}`")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(LogFormat::Compact),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format `{other}`")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub event_buffer_size: usize,
    pub audit_capacity: usize,
    pub store_backend: StoreBackend,
    pub order_store_url: Option<String>,
    pub order_store_token: Option<String>,
    pub identity_url: Option<String>,
    pub upstream_timeout: Duration,
    pub session_idle_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        let config = Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_format: parse_or_default("LOG_FORMAT", LogFormat::Compact)?,
            event_buffer_size: parse_or_default("EVENT_BUFFER_SIZE", 1024)?,
            audit_capacity: parse_or_default("AUDIT_CAPACITY", 1000)?,
            store_backend: parse_or_default("STORE_BACKEND", StoreBackend::Memory)?,
            order_store_url: non_empty("ORDER_STORE_URL"),
            order_store_token: non_empty("ORDER_STORE_TOKEN"),
            identity_url: non_empty("IDENTITY_URL"),
            upstream_timeout: Duration::from_secs(parse_or_default("UPSTREAM_TIMEOUT_SECS", 10)?),
            session_idle_timeout: Duration::from_secs(parse_or_default(
                "SESSION_IDLE_TIMEOUT_SECS",
                8 * 60 * 60,
            )?),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), AppError> {
        if self.store_backend == StoreBackend::Http && self.order_store_url.is_none() {
            return Err(AppError::Config(
                "STORE_BACKEND=http requires ORDER_STORE_URL".to_string(),
            ));
        }
        if self.upstream_timeout.is_zero() {
            return Err(AppError::Config(
                "UPSTREAM_TIMEOUT_SECS must be positive".to_string(),
            ));
        }
        if self.session_idle_timeout.is_zero() {
            return Err(AppError::Config(
                "SESSION_IDLE_TIMEOUT_SECS must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

fn non_empty(key: &str) -> Option<String> {
    env::var(key)
        .ok()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Config(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
