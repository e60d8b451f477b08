//! Runtime configuration read from the environment.
//!
//! A `.env` file in the working directory is loaded first when present;
//! variables already set in the process environment take precedence.

use std::net::SocketAddr;
use std::str::FromStr;

use crate::error::AppError;

/// Signing settings for issued bearer tokens.
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Symmetric HS256 key.
    pub key: String,
    /// `iss` claim.
    pub issuer: String,
    /// `aud` claim.
    pub audience: String,
    /// Token lifetime in minutes.
    pub ttl_minutes: i64,
}

/// Server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// `PostgreSQL` connection string.
    pub database_url: String,
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Maximum connections in the sqlx pool.
    pub database_max_connections: u32,
    /// Token settings.
    pub jwt: JwtConfig,
    /// Fast-forward-and-retry rounds after a conflicting append.
    pub append_retry_limit: u32,
    /// OTLP collector endpoint; tracing export is off when unset.
    pub otlp_endpoint: Option<String>,
}

/// Minimum accepted length of `JWT_KEY`, in bytes.
pub const MIN_JWT_KEY_LEN: usize = 32;

/// Longest accepted token lifetime: one year.
pub const MAX_JWT_TTL_MINUTES: i64 = 365 * 24 * 60;

impl Config {
    /// Reads the configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if a required variable is missing, a value
    /// does not parse, or `JWT_TTL_MINUTES` is outside one minute to one year.
    pub fn from_env() -> Result<Self, AppError> {
        // A missing .env file is the normal case outside development.
        let _ = dotenvy::dotenv();
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Same as [`Config::from_env`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let required = |name: &str| {
            lookup(name)
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| AppError::Config(format!("{name} environment variable must be set")))
        };

        let key = required("JWT_KEY")?;
        if key.len() < MIN_JWT_KEY_LEN {
            return Err(AppError::Config(format!(
                "JWT_KEY must be at least {MIN_JWT_KEY_LEN} bytes"
            )));
        }

        let ttl_minutes = parse_or(&lookup, "JWT_TTL_MINUTES", 60)?;
        if !(1..=MAX_JWT_TTL_MINUTES).contains(&ttl_minutes) {
            return Err(AppError::Config(format!(
                "JWT_TTL_MINUTES must be between 1 and {MAX_JWT_TTL_MINUTES}, got {ttl_minutes}"
            )));
        }

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            host: lookup("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port: parse_or(&lookup, "PORT", 3000)?,
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            jwt: JwtConfig {
                key,
                issuer: lookup("JWT_ISSUER").unwrap_or_else(|| "authstream".to_owned()),
                audience: lookup("JWT_AUDIENCE")
                    .unwrap_or_else(|| "authstream-clients".to_owned()),
                ttl_minutes,
            },
            append_retry_limit: parse_or(&lookup, "APPEND_RETRY_LIMIT", 1)?,
            otlp_endpoint: lookup("OTEL_EXPORTER_OTLP_ENDPOINT").filter(|v| !v.is_empty()),
        })
    }

    /// Returns the socket address to bind.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` for an unparseable host/port pair.
    pub fn bind_addr(&self) -> Result<SocketAddr, AppError> {
        format!("{}:{}", self.host, self.port)
            .parse()
            .map_err(|e| AppError::Config(format!("invalid HOST:PORT combination: {e}")))
    }
}

fn parse_or<F, T>(lookup: &F, name: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{name} is invalid: {e}"))),
    }
}
