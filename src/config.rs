use dotenvy::dotenv;
use std::{env, net::SocketAddr};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing environment variable '{0}'")]
    Missing(&'static str),
    #[error("Invalid value for '{name}': {reason}")]
    Invalid { name: &'static str, reason: String },
}

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database_url: String,
    pub bind_addr: SocketAddr,
    /// HS256 key for bearer tokens.
    pub secret: String,
    pub token_ttl_hours: i64,
    pub max_connections: u32,
    pub seed_database: bool,
    pub seed_password: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenv().ok();

        let config = AppConfig {
            database_url: required("DATABASE_URL")?,
            bind_addr: parsed("BIND_ADDR", "0.0.0.0:3000")?,
            secret: required("SECRET")?,
            token_ttl_hours: parsed("TOKEN_TTL_HOURS", "24")?,
            max_connections: parsed("DATABASE_MAX_CONNECTIONS", "10")?,
            seed_database: parsed("SEED_DATABASE", "false")?,
            seed_password: env::var("SEED_PASSWORD").unwrap_or_else(|_| "Secret15".to_string()),
        };

        if config.secret.len() < 16 {
            return Err(ConfigError::Invalid {
                name: "SECRET",
                reason: "must be at least 16 characters".to_string(),
            });
        }

        tracing::info!(
            bind_addr = %config.bind_addr,
            max_connections = config.max_connections,
            seed_database = config.seed_database,
            "Configuration loaded"
        );

        Ok(config)
    }
}

fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name).map_err(|_| ConfigError::Missing(name))
}

fn parsed<T>(name: &'static str, default: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<T>().map_err(|err| ConfigError::Invalid {
        name,
        reason: err.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parsed_falls_back_to_default() {
        let value: u32 = parsed("CAMPUS_MARKET_TEST_UNSET_VARIABLE", "7").unwrap();
        assert_eq!(value, 7);
    }

    #[test]
    fn parsed_reports_bad_values() {
        let err = parsed::<bool>("CAMPUS_MARKET_TEST_UNSET_VARIABLE", "maybe").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { name: "CAMPUS_MARKET_TEST_UNSET_VARIABLE", .. }));
    }
}
