//! Shared configuration helpers for the customer authentication services.
//!
//! Services describe their settings as a plain struct with sensible defaults and
//! implement [`ServiceConfig`] to layer environment overrides on top.

use std::env;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("required environment variable {0} is not set")]
    Missing(&'static str),
    #[error("invalid value for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

/// Configuration that starts from defaults and is refined by the environment.
pub trait ServiceConfig: Default {
    /// Prefix shared by every service specific environment variable.
    const PREFIX: &'static str;

    fn apply_environment_overrides(&mut self, prefix: &str);

    /// Reject configurations the service cannot start with.
    fn validate(&self) -> Result<(), ConfigError> {
        Ok(())
    }
}

/// Build a service configuration from defaults plus environment overrides.
pub fn load<T: ServiceConfig>() -> Result<T, ConfigError> {
    let mut config = T::default();
    config.apply_environment_overrides(T::PREFIX);
    config.validate()?;
    Ok(config)
}

/// Read a non-empty environment variable.
pub fn env_string(var: &str) -> Option<String> {
    env::var(var).ok().filter(|value| !value.trim().is_empty())
}

/// Parse an environment variable, falling back to `default` when it is missing
/// or malformed.
pub fn env_parse<T>(var: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env_string(var) {
        Some(value) => value
            .parse::<T>()
            .inspect_err(|error| {
                tracing::warn!(%var, %value, %error, "invalid override, using default");
            })
            .unwrap_or(default),
        None => default,
    }
}

/// Resolve the port for a service from an environment variable.
///
/// Falls back to the provided default when the variable is missing or cannot be
/// parsed into a `u16`.
pub fn service_port(var: &str, default: u16) -> u16 {
    env_parse(var, default)
}
