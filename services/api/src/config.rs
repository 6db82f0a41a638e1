//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::Level;

use listing_assistant_core::RetryPolicy;

const DEFAULT_COMPLETION_API_BASE: &str =
    "https://generativelanguage.googleapis.com/v1beta/openai";

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// `None` selects the in-memory chat-log store.
    pub database_url: Option<String>,
    pub log_level: Level,
    pub gemini_api_key: String,
    pub completion_api_base: String,
    pub completion_model: String,
    /// `None` selects the bundled catalog.
    pub listings_path: Option<PathBuf>,
    pub retry_policy: RetryPolicy,
    pub allowed_origin: String,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key lookup. `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|value| !value.trim().is_empty());

        // --- Load Server and Storage Settings ---
        let bind_address_str = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let database_url = var("DATABASE_URL");

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let listings_path = var("LISTINGS_PATH").map(PathBuf::from);
        let allowed_origin =
            var("ALLOWED_ORIGIN").unwrap_or_else(|| "http://localhost:5173".to_string());

        // --- Load Completion Endpoint Settings ---
        let gemini_api_key =
            var("GEMINI_API_KEY").ok_or_else(|| ConfigError::MissingVar("GEMINI_API_KEY".to_string()))?;
        let completion_api_base =
            var("COMPLETION_API_BASE").unwrap_or_else(|| DEFAULT_COMPLETION_API_BASE.to_string());
        let completion_model =
            var("COMPLETION_MODEL").unwrap_or_else(|| "gemini-2.0-flash".to_string());

        let defaults = RetryPolicy::default();
        let max_retries = parse_or("COMPLETION_MAX_RETRIES", var("COMPLETION_MAX_RETRIES"), defaults.max_retries)?;
        if max_retries == 0 {
            return Err(ConfigError::InvalidValue(
                "COMPLETION_MAX_RETRIES".to_string(),
                "at least one attempt is required".to_string(),
            ));
        }
        let base_delay_ms = parse_or(
            "COMPLETION_BASE_DELAY_MS",
            var("COMPLETION_BASE_DELAY_MS"),
            defaults.base_delay.as_millis() as u64,
        )?;
        let max_delay_ms = parse_or(
            "COMPLETION_MAX_DELAY_MS",
            var("COMPLETION_MAX_DELAY_MS"),
            defaults.max_delay.as_millis() as u64,
        )?;

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            gemini_api_key,
            completion_api_base,
            completion_model,
            listings_path,
            retry_policy: RetryPolicy {
                max_retries,
                base_delay: Duration::from_millis(base_delay_ms),
                max_delay: Duration::from_millis(max_delay_ms),
            },
            allowed_origin,
        })
    }
}

fn parse_or<T>(key: &str, raw: Option<String>, default: T) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match raw {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string())),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_only_the_key_is_set() {
        let config = load(&[("GEMINI_API_KEY", "secret")]).unwrap();

        assert_eq!(config.bind_address, "0.0.0.0:3000".parse::<SocketAddr>().unwrap());
        assert!(config.database_url.is_none());
        assert!(config.listings_path.is_none());
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.completion_api_base, DEFAULT_COMPLETION_API_BASE);
        assert_eq!(config.completion_model, "gemini-2.0-flash");
        assert_eq!(config.retry_policy, RetryPolicy::default());
        assert_eq!(config.allowed_origin, "http://localhost:5173");
    }

    #[test]
    fn missing_api_key_is_reported() {
        let err = load(&[]).unwrap_err();
        assert!(matches!(err, ConfigError::MissingVar(ref var) if var == "GEMINI_API_KEY"));

        let blank = load(&[("GEMINI_API_KEY", "  ")]).unwrap_err();
        assert!(matches!(blank, ConfigError::MissingVar(_)));
    }

    #[test]
    fn overrides_are_parsed() {
        let config = load(&[
            ("GEMINI_API_KEY", "secret"),
            ("BIND_ADDRESS", "127.0.0.1:8080"),
            ("DATABASE_URL", "postgres://localhost/listings"),
            ("RUST_LOG", "debug"),
            ("LISTINGS_PATH", "/srv/listings.json"),
            ("COMPLETION_MAX_RETRIES", "5"),
            ("COMPLETION_BASE_DELAY_MS", "250"),
            ("COMPLETION_MAX_DELAY_MS", "2000"),
        ])
        .unwrap();

        assert_eq!(config.bind_address.port(), 8080);
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/listings"));
        assert_eq!(config.log_level, Level::DEBUG);
        assert_eq!(config.listings_path, Some(PathBuf::from("/srv/listings.json")));
        assert_eq!(config.retry_policy.max_retries, 5);
        assert_eq!(config.retry_policy.base_delay, Duration::from_millis(250));
        assert_eq!(config.retry_policy.max_delay, Duration::from_millis(2000));
    }

    #[test]
    fn invalid_values_are_rejected() {
        for (key, value) in [
            ("BIND_ADDRESS", "not-an-address"),
            ("RUST_LOG", "chatty"),
            ("COMPLETION_MAX_RETRIES", "0"),
            ("COMPLETION_BASE_DELAY_MS", "-5"),
        ] {
            let err = load(&[("GEMINI_API_KEY", "secret"), (key, value)]).unwrap_err();
            assert!(
                matches!(err, ConfigError::InvalidValue(ref var, _) if var == key),
                "{key}"
            );
        }
    }
}
