use std::env;
use std::time::Duration;

use thiserror::Error;

const DEFAULT_POSTGRES_PORT: &str = "5432";
const DEFAULT_POOL_SIZE: u32 = 10;
const DEFAULT_CONNECTION_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("DATABASE_URL is not set and {0} is missing to build it")]
    MissingDatabase(&'static str),
    #[error("{var} must be a positive number, got '{value}'")]
    InvalidNumber { var: &'static str, value: String },
}

/// Bounds on the shared connection pool. Callers block for up to
/// `connection_timeout` when every connection is checked out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolSettings {
    pub max_size: u32,
    pub connection_timeout: Duration,
}

impl Default for PoolSettings {
    fn default() -> Self {
        Self {
            max_size: DEFAULT_POOL_SIZE,
            connection_timeout: Duration::from_secs(DEFAULT_CONNECTION_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub pool: PoolSettings,
}

impl Config {
    /// Read configuration from the process environment (after `.env` has been
    /// loaded by the caller).
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = match lookup("DATABASE_URL") {
            Some(url) => url,
            None => {
                let require =
                    |key: &'static str| lookup(key).ok_or(ConfigError::MissingDatabase(key));
                let host = require("POSTGRES_HOST")?;
                let user = require("POSTGRES_USER")?;
                let database = require("POSTGRES_DATABASE")?;
                let password = lookup("POSTGRES_PASSWORD").unwrap_or_default();
                let port = lookup("POSTGRES_PORT")
                    .unwrap_or_else(|| DEFAULT_POSTGRES_PORT.to_string());
                format!("postgres://{user}:{password}@{host}:{port}/{database}")
            }
        };

        let max_size = parse_positive(&lookup, "DB_POOL_SIZE", u64::from(DEFAULT_POOL_SIZE))?;
        let timeout_secs = parse_positive(
            &lookup,
            "DB_CONNECTION_TIMEOUT_SECS",
            DEFAULT_CONNECTION_TIMEOUT_SECS,
        )?;

        Ok(Self {
            database_url,
            pool: PoolSettings {
                max_size: u32::try_from(max_size).map_err(|_| ConfigError::InvalidNumber {
                    var: "DB_POOL_SIZE",
                    value: max_size.to_string(),
                })?,
                connection_timeout: Duration::from_secs(timeout_secs),
            },
        })
    }
}

fn parse_positive<F>(lookup: &F, var: &'static str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let Some(raw) = lookup(var) else {
        return Ok(default);
    };
    match raw.trim().parse::<u64>() {
        Ok(value) if value > 0 => Ok(value),
        _ => Err(ConfigError::InvalidNumber { var, value: raw }),
    }
}
