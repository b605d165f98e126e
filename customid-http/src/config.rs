//! Server configuration read from the environment.

use std::net::SocketAddr;
use std::num::NonZeroU32;

use customid::{EngineConfig, GenerationAttempts, SequenceStrategy, SuggestionAttempts};
use customid_postgres::MaxConnections;
use thiserror::Error;

/// Address the server binds to when `CUSTOMID_BIND_ADDR` is unset.
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

/// Errors raised while reading the server configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable was set but could not be parsed.
    #[error("{variable} has invalid value `{value}`: {reason}")]
    InvalidValue {
        /// Name of the environment variable
        variable: &'static str,
        /// The rejected value
        value: String,
        /// What was wrong with it
        reason: String,
    },
}

/// Everything the server binary needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket the HTTP listener binds to.
    pub bind_addr: SocketAddr,
    /// PostgreSQL connection string; the in-memory store is used when absent.
    pub database_url: Option<String>,
    /// Pool size for the PostgreSQL store.
    pub max_connections: Option<MaxConnections>,
    /// Engine tunables.
    pub engine: EngineConfig,
}

impl ServerConfig {
    /// Reads the configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Reads the configuration through `lookup`, which returns the value of a
    /// variable or `None` when it is unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("CUSTOMID_BIND_ADDR")
            .unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string());
        let bind_addr = bind_addr
            .parse()
            .map_err(|error: std::net::AddrParseError| {
                invalid("CUSTOMID_BIND_ADDR", &bind_addr, error)
            })?;

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let mut engine = EngineConfig::default();
        if let Some(raw) = lookup("CUSTOMID_SEQUENCE_STRATEGY") {
            engine = engine.with_sequence_strategy(parse_strategy(&raw)?);
        }
        if let Some(raw) = lookup("CUSTOMID_GENERATION_ATTEMPTS") {
            let attempts = parse_u32("CUSTOMID_GENERATION_ATTEMPTS", &raw)?;
            let attempts = GenerationAttempts::try_new(attempts)
                .map_err(|error| invalid("CUSTOMID_GENERATION_ATTEMPTS", &raw, error))?;
            engine = engine.with_generation_attempts(attempts);
        }
        if let Some(raw) = lookup("CUSTOMID_SUGGESTION_ATTEMPTS") {
            let attempts = parse_u32("CUSTOMID_SUGGESTION_ATTEMPTS", &raw)?;
            let attempts = SuggestionAttempts::try_new(attempts)
                .map_err(|error| invalid("CUSTOMID_SUGGESTION_ATTEMPTS", &raw, error))?;
            engine = engine.with_suggestion_attempts(attempts);
        }

        let max_connections = lookup("CUSTOMID_MAX_CONNECTIONS")
            .map(|raw| {
                let count = parse_u32("CUSTOMID_MAX_CONNECTIONS", &raw)?;
                NonZeroU32::new(count)
                    .map(MaxConnections::new)
                    .ok_or_else(|| invalid("CUSTOMID_MAX_CONNECTIONS", &raw, "must be at least 1"))
            })
            .transpose()?;

        Ok(Self {
            bind_addr,
            database_url,
            max_connections,
            engine,
        })
    }
}

fn parse_strategy(raw: &str) -> Result<SequenceStrategy, ConfigError> {
    match raw.trim() {
        "counter" => Ok(SequenceStrategy::PersistedCounter),
        "scan" => Ok(SequenceStrategy::ScanExisting),
        _ => Err(invalid(
            "CUSTOMID_SEQUENCE_STRATEGY",
            raw,
            "expected `counter` or `scan`",
        )),
    }
}

fn parse_u32(variable: &'static str, raw: &str) -> Result<u32, ConfigError> {
    raw.trim()
        .parse()
        .map_err(|error: std::num::ParseIntError| invalid(variable, raw, error))
}

fn invalid(variable: &'static str, value: &str, reason: impl ToString) -> ConfigError {
    ConfigError::InvalidValue {
        variable,
        value: value.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        ServerConfig::from_lookup(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_nothing_is_set() {
        let config = config_from(&[]).unwrap();

        assert_eq!(config.bind_addr, DEFAULT_BIND_ADDR.parse().unwrap());
        assert!(config.database_url.is_none());
        assert!(config.max_connections.is_none());
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn every_variable_is_honored() {
        let config = config_from(&[
            ("CUSTOMID_BIND_ADDR", "0.0.0.0:8080"),
            ("DATABASE_URL", "postgres://localhost/customid"),
            ("CUSTOMID_SEQUENCE_STRATEGY", "scan"),
            ("CUSTOMID_GENERATION_ATTEMPTS", "4"),
            ("CUSTOMID_SUGGESTION_ATTEMPTS", "5"),
            ("CUSTOMID_MAX_CONNECTIONS", "20"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr.port(), 8080);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/customid")
        );
        assert_eq!(config.engine.sequence_strategy, SequenceStrategy::ScanExisting);
        assert_eq!(config.engine.generation_attempts.into_inner(), 4);
        assert_eq!(config.engine.suggestion_attempts.into_inner(), 5);
        let max: NonZeroU32 = config.max_connections.unwrap().into();
        assert_eq!(max.get(), 20);
    }

    #[test]
    fn blank_database_url_means_in_memory() {
        let config = config_from(&[("DATABASE_URL", "  ")]).unwrap();
        assert!(config.database_url.is_none());
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let error = config_from(&[("CUSTOMID_SEQUENCE_STRATEGY", "random")]).unwrap_err();
        insta::assert_snapshot!(
            error,
            @"CUSTOMID_SEQUENCE_STRATEGY has invalid value `random`: expected `counter` or `scan`"
        );
    }

    #[test]
    fn out_of_range_attempts_are_rejected() {
        assert!(config_from(&[("CUSTOMID_GENERATION_ATTEMPTS", "0")]).is_err());
        assert!(config_from(&[("CUSTOMID_SUGGESTION_ATTEMPTS", "11")]).is_err());
        assert!(config_from(&[("CUSTOMID_GENERATION_ATTEMPTS", "many")]).is_err());
    }

    #[test]
    fn zero_connections_are_rejected() {
        let error = config_from(&[("CUSTOMID_MAX_CONNECTIONS", "0")]).unwrap_err();
        insta::assert_snapshot!(
            error,
            @"CUSTOMID_MAX_CONNECTIONS has invalid value `0`: must be at least 1"
        );
    }

    #[test]
    fn malformed_bind_address_is_rejected() {
        let error = config_from(&[("CUSTOMID_BIND_ADDR", "localhost")]).unwrap_err();
        assert!(matches!(
            error,
            ConfigError::InvalidValue {
                variable: "CUSTOMID_BIND_ADDR",
                ..
            }
        ));
    }
}
