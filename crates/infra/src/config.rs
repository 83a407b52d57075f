//! Process configuration, read from the environment (and `.env` when present).
//!
//! | Key                              | Default        |
//! |----------------------------------|----------------|
//! | `DATABASE_URL`                   | in-memory store |
//! | `LEDGERLY_DB_MAX_CONNECTIONS`    | `10`           |
//! | `LEDGERLY_DB_ACQUIRE_TIMEOUT_MS` | `3000`         |
//! | `LEDGERLY_DEFAULT_CURRENCY`      | `USD`          |
//! | `LEDGERLY_OPERATION_TIMEOUT_MS`  | `5000`         |
//! | `LEDGERLY_FX_RATES`              | empty          |
//! | `LEDGERLY_HTTP_ADDR`             | `0.0.0.0:8080` |
//! | `LEDGERLY_LOG_FORMAT`            | `json`         |
//! | `LEDGERLY_LOG_FILTER`            | `info`         |

use std::fmt::Display;
use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use thiserror::Error;

use ledgerly_core::Currency;
use ledgerly_observability::{LogFormat, LogSettings};

use crate::conversion::StaticRateConverter;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {message}")]
    InvalidValue { key: &'static str, message: String },
}

/// Postgres connection settings.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
}

impl std::fmt::Debug for DatabaseConfig {
    // the URL may carry credentials
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url", &"<redacted>")
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct LedgerConfig {
    /// `None` selects the in-memory backend.
    pub database: Option<DatabaseConfig>,
    pub default_currency: Currency,
    pub operation_timeout: Duration,
    pub fx_rates: StaticRateConverter,
    pub http_addr: SocketAddr,
    pub log: LogSettings,
}

impl LedgerConfig {
    /// Load from the process environment, after applying `.env` if one exists.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary key lookup.
    pub fn from_lookup<L>(lookup: L) -> Result<Self, ConfigError>
    where
        L: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let database = match get("DATABASE_URL") {
            Some(url) => Some(DatabaseConfig {
                url,
                max_connections: parse_or(&get, "LEDGERLY_DB_MAX_CONNECTIONS", 10)?,
                acquire_timeout: Duration::from_millis(parse_or(
                    &get,
                    "LEDGERLY_DB_ACQUIRE_TIMEOUT_MS",
                    3_000,
                )?),
            }),
            None => None,
        };

        let default_currency = match get("LEDGERLY_DEFAULT_CURRENCY") {
            Some(code) => Currency::parse(&code).map_err(|e| invalid("LEDGERLY_DEFAULT_CURRENCY", e))?,
            None => Currency::USD,
        };

        let operation_timeout =
            Duration::from_millis(parse_or(&get, "LEDGERLY_OPERATION_TIMEOUT_MS", 5_000)?);
        if operation_timeout.is_zero() {
            return Err(invalid("LEDGERLY_OPERATION_TIMEOUT_MS", "must be positive"));
        }

        let fx_rates = match get("LEDGERLY_FX_RATES") {
            Some(table) => {
                StaticRateConverter::parse(&table).map_err(|e| invalid("LEDGERLY_FX_RATES", e))?
            }
            None => StaticRateConverter::new(),
        };

        let http_addr = parse_or(
            &get,
            "LEDGERLY_HTTP_ADDR",
            SocketAddr::from(([0, 0, 0, 0], 8080)),
        )?;

        let log = LogSettings {
            format: parse_or(&get, "LEDGERLY_LOG_FORMAT", LogFormat::Json)?,
            filter: get("LEDGERLY_LOG_FILTER").unwrap_or_else(|| "info".to_string()),
        };

        Ok(Self {
            database,
            default_currency,
            operation_timeout,
            fx_rates,
            http_addr,
            log,
        })
    }
}

fn parse_or<G, T>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: Display,
{
    match get(key) {
        Some(raw) => raw.trim().parse().map_err(|e| invalid(key, e)),
        None => Ok(default),
    }
}

fn invalid(key: &'static str, message: impl Display) -> ConfigError {
    ConfigError::InvalidValue {
        key,
        message: message.to_string(),
    }
}
