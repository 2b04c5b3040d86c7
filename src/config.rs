//! Application configuration loaded from environment variables.

use crate::application::pricing::{CircuitBreakerConfig, DEFAULT_FALLBACK_PRICE, RetryPolicy};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// A variable was set to something unusable
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    Invalid { key: &'static str, value: String },
    #[error("{key} {requirement}, got {value}")]
    OutOfRange {
        key: &'static str,
        requirement: &'static str,
        value: String,
    },
}

/// Server configuration
///
/// Reads from environment variables:
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `8081`)
/// - `HOSTNAME`: reported by `/api/debug/instance`. When unset, [`Config::from_env`]
///   reads the kernel hostname (`/proc/sys/kernel/hostname`, then `/etc/hostname`)
///   and only falls back to `"unknown"` if neither is readable.
/// - `DATABASE_URL`: Postgres stock ledger; unset selects the in-memory ledger
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: `5`)
///
/// plus the `PRICING_*` variables read by [`PricingConfig`].
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub hostname: String,
    pub database_url: Option<String>,
    pub database_max_connections: u32,
    pub pricing: PricingConfig,
}

/// Remote pricing dependency and its resilience settings
///
/// - `PRICING_SERVICE_URL` (default: `http://localhost:8082`)
/// - `PRICING_FORCE_FAILURE`: send `fail=true` on every request (default: `false`)
/// - `PRICING_TIMEOUT_MS`: per attempt (default: `2000`)
/// - `PRICING_RETRY_MAX_ATTEMPTS` (default: `3`)
/// - `PRICING_RETRY_BASE_DELAY_MS` (default: `500`)
/// - `PRICING_RETRY_MAX_DELAY_MS` (default: `2000`)
/// - `PRICING_CB_FAILURE_THRESHOLD` (default: `5`)
/// - `PRICING_CB_COOL_DOWN_MS` (default: `10000`)
/// - `PRICING_FALLBACK_PRICE` (default: `0.0`)
#[derive(Debug, Clone, PartialEq)]
pub struct PricingConfig {
    pub base_url: String,
    pub force_failure: bool,
    pub timeout: Duration,
    pub retry_max_attempts: u32,
    pub retry_base_delay: Duration,
    pub retry_max_delay: Duration,
    pub failure_threshold: u32,
    pub cool_down: Duration,
    pub fallback_price: f64,
}

impl Config {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(env_or_system)
    }

    /// Loads configuration from any key lookup, falling back to defaults for
    /// missing keys. Present but unparsable values are errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let vars = Vars(&lookup);

        let config = Self {
            host: vars.string("HOST", defaults.host),
            port: vars.parse("PORT", defaults.port)?,
            hostname: vars.string("HOSTNAME", defaults.hostname),
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            database_max_connections: vars
                .parse("DATABASE_MAX_CONNECTIONS", defaults.database_max_connections)?,
            pricing: PricingConfig::from_vars(&vars)?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        at_least_one("DATABASE_MAX_CONNECTIONS", self.database_max_connections)?;
        self.pricing.validate()
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8081,
            hostname: "unknown".to_string(),
            database_url: None,
            database_max_connections: 5,
            pricing: PricingConfig::default(),
        }
    }
}

impl PricingConfig {
    fn from_vars<F>(vars: &Vars<'_, F>) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Ok(Self {
            base_url: vars.string("PRICING_SERVICE_URL", defaults.base_url),
            force_failure: vars.parse("PRICING_FORCE_FAILURE", defaults.force_failure)?,
            timeout: vars.millis("PRICING_TIMEOUT_MS", defaults.timeout)?,
            retry_max_attempts: vars
                .parse("PRICING_RETRY_MAX_ATTEMPTS", defaults.retry_max_attempts)?,
            retry_base_delay: vars
                .millis("PRICING_RETRY_BASE_DELAY_MS", defaults.retry_base_delay)?,
            retry_max_delay: vars.millis("PRICING_RETRY_MAX_DELAY_MS", defaults.retry_max_delay)?,
            failure_threshold: vars
                .parse("PRICING_CB_FAILURE_THRESHOLD", defaults.failure_threshold)?,
            cool_down: vars.millis("PRICING_CB_COOL_DOWN_MS", defaults.cool_down)?,
            fallback_price: vars.parse("PRICING_FALLBACK_PRICE", defaults.fallback_price)?,
        })
    }

    fn validate(&self) -> Result<(), ConfigError> {
        at_least_one("PRICING_RETRY_MAX_ATTEMPTS", self.retry_max_attempts)?;
        at_least_one("PRICING_CB_FAILURE_THRESHOLD", self.failure_threshold)?;
        if self.timeout.is_zero() {
            return Err(ConfigError::OutOfRange {
                key: "PRICING_TIMEOUT_MS",
                requirement: "must be greater than 0",
                value: "0".to_string(),
            });
        }
        if !self.fallback_price.is_finite() || self.fallback_price < 0.0 {
            return Err(ConfigError::OutOfRange {
                key: "PRICING_FALLBACK_PRICE",
                requirement: "must be a non-negative number",
                value: self.fallback_price.to_string(),
            });
        }
        Ok(())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            max_attempts: self.retry_max_attempts,
            attempt_timeout: self.timeout,
            base_delay: self.retry_base_delay,
            max_delay: self.retry_max_delay,
        }
    }

    pub fn circuit_breaker(&self) -> CircuitBreakerConfig {
        CircuitBreakerConfig {
            failure_threshold: self.failure_threshold,
            cool_down: self.cool_down,
        }
    }
}

impl Default for PricingConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        let breaker = CircuitBreakerConfig::default();

        Self {
            base_url: "http://localhost:8082".to_string(),
            force_failure: false,
            timeout: retry.attempt_timeout,
            retry_max_attempts: retry.max_attempts,
            retry_base_delay: retry.base_delay,
            retry_max_delay: retry.max_delay,
            failure_threshold: breaker.failure_threshold,
            cool_down: breaker.cool_down,
            fallback_price: DEFAULT_FALLBACK_PRICE,
        }
    }
}

/// Chaos pricing service (`pricing-service` binary) configuration
///
/// - `HOST`: bind address (default: `"0.0.0.0"`)
/// - `PORT`: listen port (default: `8082`)
/// - `PRICING_FAILURE_RATE`: probability of a random failure, within `0..=1` (default: `0.30`)
#[derive(Debug, Clone, PartialEq)]
pub struct PricingServiceConfig {
    pub host: String,
    pub port: u16,
    pub failure_rate: f64,
}

impl PricingServiceConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let vars = Vars(&lookup);

        let config = Self {
            host: vars.string("HOST", defaults.host),
            port: vars.parse("PORT", defaults.port)?,
            failure_rate: vars.parse("PRICING_FAILURE_RATE", defaults.failure_rate)?,
        };
        if !(0.0..=1.0).contains(&config.failure_rate) {
            return Err(ConfigError::OutOfRange {
                key: "PRICING_FAILURE_RATE",
                requirement: "must be between 0 and 1",
                value: config.failure_rate.to_string(),
            });
        }
        Ok(config)
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl Default for PricingServiceConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8082,
            failure_rate: 0.30,
        }
    }
}

/// Environment lookup that resolves an unset `HOSTNAME` to the machine's hostname.
///
/// Shells export `HOSTNAME` without passing it to child processes, so outside
/// containers the variable is usually missing.
fn env_or_system(key: &str) -> Option<String> {
    std::env::var(key).ok().or_else(|| match key {
        "HOSTNAME" => system_hostname(),
        _ => None,
    })
}

fn system_hostname() -> Option<String> {
    ["/proc/sys/kernel/hostname", "/etc/hostname"]
        .iter()
        .filter_map(|path| std::fs::read_to_string(path).ok())
        .map(|raw| raw.trim().to_string())
        .find(|name| !name.is_empty())
}

struct Vars<'a, F>(&'a F);

impl<F> Vars<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn string(&self, key: &str, default: String) -> String {
        (self.0)(key).unwrap_or(default)
    }

    fn parse<T: FromStr>(&self, key: &'static str, default: T) -> Result<T, ConfigError> {
        match (self.0)(key) {
            None => Ok(default),
            Some(raw) => match raw.trim().parse() {
                Ok(value) => Ok(value),
                Err(_) => Err(ConfigError::Invalid { key, value: raw }),
            },
        }
    }

    fn millis(&self, key: &'static str, default: Duration) -> Result<Duration, ConfigError> {
        let default_ms = default.as_millis() as u64;
        self.parse(key, default_ms).map(Duration::from_millis)
    }
}

fn at_least_one(key: &'static str, value: u32) -> Result<(), ConfigError> {
    if value == 0 {
        return Err(ConfigError::OutOfRange {
            key,
            requirement: "must be at least 1",
            value: value.to_string(),
        });
    }
    Ok(())
}
