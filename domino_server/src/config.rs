//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated
//! configuration, with CLI overrides taking priority.

use domino_engine::DominoConfig;
use std::net::SocketAddr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {name}: {value}")]
    Invalid { name: &'static str, value: String },
}

/// Complete server configuration.
#[derive(Clone, Debug)]
pub struct ServerConfig {
    /// Server bind address.
    pub bind: SocketAddr,
    /// Postgres connection string. In-memory ports are used when absent.
    pub database_url: Option<String>,
    /// Engine timing and scoring configuration.
    pub engine: DominoConfig,
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns an error if a set variable fails to parse.
    pub fn from_env(
        bind_override: Option<SocketAddr>,
        database_url_override: Option<String>,
    ) -> Result<Self, ConfigError> {
        let bind = match bind_override {
            Some(bind) => bind,
            None => {
                let raw = std::env::var("SERVER_BIND")
                    .unwrap_or_else(|_| "127.0.0.1:8086".to_string());
                raw.parse().map_err(|_| ConfigError::Invalid {
                    name: "SERVER_BIND",
                    value: raw,
                })?
            }
        };

        let database_url = database_url_override.or_else(|| std::env::var("DATABASE_URL").ok());

        let mut engine = DominoConfig::default();
        if let Some(value) = env_parse::<u32>("TARGET_SCORE")? {
            engine.target_score = value;
        }
        if let Some(value) = env_parse::<u64>("TURN_TIMEOUT_SECS")? {
            engine.turn_timeout_secs = value;
        }
        if let Some(value) = env_parse::<u64>("PASS_TIMEOUT_SECS")? {
            engine.pass_timeout_secs = value;
        }
        if let Some(value) = env_parse::<u64>("START_GAME_DELAY_SECS")? {
            engine.start_game_delay_secs = value;
        }
        if let Some(value) = env_parse::<u64>("NEXT_ROUND_DELAY_SECS")? {
            engine.next_round_delay_secs = value;
        }
        if let Some(value) = env_parse::<u8>("COMMISSION_PERCENT")? {
            engine.commission_percent = value;
        }
        if let Some(value) = env_parse::<i64>("USD_TO_VES_RATE")? {
            engine.usd_to_ves_rate = value;
        }

        Ok(Self {
            bind,
            database_url,
            engine,
        })
    }
}

fn env_parse<T: std::str::FromStr>(name: &'static str) -> Result<Option<T>, ConfigError> {
    match std::env::var(name) {
        Ok(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::Invalid { name, value: raw }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_without_env() {
        let config = ServerConfig::from_env(Some("0.0.0.0:9000".parse().unwrap()), None).unwrap();
        assert_eq!(config.bind.port(), 9000);
        assert_eq!(config.engine.target_score, 100);
    }
}
