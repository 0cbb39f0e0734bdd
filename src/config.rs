//! Service configuration from the environment.

use std::str::FromStr;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("{0} must be set")]
    Missing(&'static str),
    #[error("{name} has an invalid value '{value}'")]
    Invalid { name: &'static str, value: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub database_max_connections: u32,
    /// Elasticsearch-compatible base URL
    pub search_url: String,
    pub nats_url: String,
    pub mail_stream: String,
    pub jwt_secret: String,
    pub port: u16,
    pub reindex_on_start: bool,
    pub mirror_retries: u32,
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty()).ok_or(ConfigError::Missing(name))
}

fn or_default(name: &'static str, default: &str) -> String {
    std::env::var(name).ok().filter(|v| !v.trim().is_empty()).unwrap_or_else(|| default.to_string())
}

fn parsed<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => value.trim().parse().map_err(|_| ConfigError::Invalid { name, value }),
        _ => Ok(default),
    }
}

impl Config {
    /// Call `dotenvy::dotenv()` first to pick up a local `.env`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            database_url: required("DATABASE_URL")?,
            database_max_connections: parsed("DATABASE_MAX_CONNECTIONS", 10)?,
            search_url: or_default("SEARCH_URL", "http://localhost:9200"),
            nats_url: or_default("NATS_URL", "nats://localhost:4222"),
            mail_stream: or_default("MAIL_STREAM", "MAIL"),
            jwt_secret: required("JWT_SECRET")?,
            port: parsed("PORT", 8083)?,
            reindex_on_start: parsed("REINDEX_ON_START", false)?,
            mirror_retries: parsed("MIRROR_RETRIES", 3)?,
        })
    }
}

/// Settings of the `mail-worker` binary.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    pub nats_url: String,
    pub mail_stream: String,
    pub mail_relay_url: String,
    pub mail_from: String,
}

impl WorkerConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            nats_url: or_default("NATS_URL", "nats://localhost:4222"),
            mail_stream: or_default("MAIL_STREAM", "MAIL"),
            mail_relay_url: required("MAIL_RELAY_URL")?,
            mail_from: or_default("MAIL_FROM", "no-reply@opensase.local"),
        })
    }
}
