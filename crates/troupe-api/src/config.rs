//! Server configuration from the environment.

use std::net::SocketAddr;

use troupe_streaming::StreamConfig;

use crate::error::AppError;

/// Everything the binary reads at startup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// `PostgreSQL` connection string.
    pub database_url: String,
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Connection pool size.
    pub max_connections: u32,
    /// Streaming timeouts.
    pub stream: StreamConfig,
    /// OTLP collector; span export is off when unset.
    pub otlp_endpoint: Option<String>,
}

impl ServerConfig {
    /// Read the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if `DATABASE_URL` is missing or a numeric
    /// variable does not parse.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// See [`ServerConfig::from_env`].
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, AppError> {
        let database_url = lookup("DATABASE_URL").ok_or_else(|| {
            AppError::Config("DATABASE_URL environment variable must be set".into())
        })?;
        let defaults = StreamConfig::default();
        Ok(Self {
            database_url,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse(&lookup, "PORT", 3000)?,
            max_connections: parse(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            stream: StreamConfig::from_secs(
                parse(&lookup, "STREAM_CONNECT_TIMEOUT_SECS", defaults.connect_timeout.as_secs())?,
                parse(&lookup, "STREAM_IDLE_TIMEOUT_SECS", defaults.idle_timeout.as_secs())?,
                parse(&lookup, "STREAM_TOTAL_TIMEOUT_SECS", defaults.total_timeout.as_secs())?,
            ),
            otlp_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT").filter(|v| !v.trim().is_empty()),
        })
    }

    /// The address to bind.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if host and port do not form an address.
    pub fn socket_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }
}

fn parse<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} must be a valid number: {e}"))),
    }
}
