//! Gate configuration.
//!
//! A [`GateConfig`] is built once at application start, either
//! programmatically via [`GateConfig::new`] or from environment variables via
//! [`GateConfig::from_env`], and handed to the gate's constructor. There is
//! no global configuration object and no hot reload; the value is read-only
//! for the lifetime of the process.

use std::collections::HashMap;
use std::env;
use std::time::Duration;
use thiserror::Error;

/// Default name of the cookie carrying the session JWT.
pub const DEFAULT_COOKIE_NAME: &str = "hanko";

/// Default JWKS cache time-to-live in seconds (1 hour).
pub const DEFAULT_JWKS_CACHE_TTL_SECONDS: u64 = 3600;

/// Default clock skew tolerance in seconds for `exp` comparison.
pub const DEFAULT_CLOCK_SKEW_SECONDS: u64 = 0;

/// Maximum allowed clock skew tolerance in seconds (10 minutes).
///
/// Caps misconfiguration that would otherwise keep expired tokens alive.
pub const MAX_CLOCK_SKEW_SECONDS: u64 = 600;

/// Default JWKS fetch timeout in seconds (covers the whole request).
pub const DEFAULT_FETCH_TIMEOUT_SECONDS: u64 = 5;

/// Default JWKS connection-open timeout in seconds.
pub const DEFAULT_CONNECT_TIMEOUT_SECONDS: u64 = 2;

/// Discovery suffix appended to the identity service base URL.
pub const JWKS_DISCOVERY_PATH: &str = "/.well-known/jwks.json";

/// Configuration for the request gate and its JWKS cache.
#[derive(Debug, Clone)]
pub struct GateConfig {
    /// Base URL of the identity service (e.g. "https://example.hanko.io").
    pub api_url: String,

    /// Name of the cookie holding the session JWT (default: "hanko").
    pub cookie_name: String,

    /// Request path prefixes that skip token extraction and verification.
    pub exclude_paths: Vec<String>,

    /// How long a fetched key set stays fresh before the next refresh.
    pub jwks_cache_ttl: Duration,

    /// Clock skew tolerance in seconds applied to `exp` comparison.
    pub clock_skew_seconds: u64,

    /// Total timeout for a JWKS fetch.
    pub fetch_timeout: Duration,

    /// Connection-open timeout for a JWKS fetch.
    pub connect_timeout: Duration,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid JWKS cache TTL configuration: {0}")]
    InvalidCacheTtl(String),

    #[error("Invalid clock skew configuration: {0}")]
    InvalidClockSkew(String),

    #[error("Invalid fetch timeout configuration: {0}")]
    InvalidFetchTimeout(String),
}

impl GateConfig {
    /// Create a configuration with defaults for everything but the API URL.
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            cookie_name: DEFAULT_COOKIE_NAME.to_string(),
            exclude_paths: Vec::new(),
            jwks_cache_ttl: Duration::from_secs(DEFAULT_JWKS_CACHE_TTL_SECONDS),
            clock_skew_seconds: DEFAULT_CLOCK_SKEW_SECONDS,
            fetch_timeout: Duration::from_secs(DEFAULT_FETCH_TIMEOUT_SECONDS),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECONDS),
        }
    }

    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if `HANKO_API_URL` is missing or any numeric
    /// variable is out of range. Callers are expected to fail startup on this.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(&env::vars().collect())
    }

    /// Load configuration from a map (for testing).
    pub fn from_vars(vars: &HashMap<String, String>) -> Result<Self, ConfigError> {
        let api_url = vars
            .get("HANKO_API_URL")
            .ok_or_else(|| ConfigError::MissingEnvVar("HANKO_API_URL".to_string()))?
            .clone();

        let cookie_name = vars
            .get("HANKO_COOKIE_NAME")
            .cloned()
            .unwrap_or_else(|| DEFAULT_COOKIE_NAME.to_string());

        let exclude_paths: Vec<String> = vars
            .get("HANKO_EXCLUDE_PATHS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(ToString::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let jwks_cache_ttl_seconds =
            if let Some(value_str) = vars.get("HANKO_JWKS_CACHE_TTL_SECONDS") {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidCacheTtl(format!(
                        "HANKO_JWKS_CACHE_TTL_SECONDS must be a valid positive integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if value == 0 {
                    return Err(ConfigError::InvalidCacheTtl(
                        "HANKO_JWKS_CACHE_TTL_SECONDS must be greater than 0".to_string(),
                    ));
                }

                value
            } else {
                DEFAULT_JWKS_CACHE_TTL_SECONDS
            };

        let clock_skew_seconds = if let Some(value_str) = vars.get("HANKO_CLOCK_SKEW_SECONDS") {
            let value: u64 = value_str.parse().map_err(|e| {
                ConfigError::InvalidClockSkew(format!(
                    "HANKO_CLOCK_SKEW_SECONDS must be a valid non-negative integer, got '{}': {}",
                    value_str, e
                ))
            })?;

            if value > MAX_CLOCK_SKEW_SECONDS {
                return Err(ConfigError::InvalidClockSkew(format!(
                    "HANKO_CLOCK_SKEW_SECONDS must not exceed {} seconds, got {}",
                    MAX_CLOCK_SKEW_SECONDS, value
                )));
            }

            value
        } else {
            DEFAULT_CLOCK_SKEW_SECONDS
        };

        let fetch_timeout_seconds =
            if let Some(value_str) = vars.get("HANKO_FETCH_TIMEOUT_SECONDS") {
                let value: u64 = value_str.parse().map_err(|e| {
                    ConfigError::InvalidFetchTimeout(format!(
                        "HANKO_FETCH_TIMEOUT_SECONDS must be a valid positive integer, got '{}': {}",
                        value_str, e
                    ))
                })?;

                if value == 0 {
                    return Err(ConfigError::InvalidFetchTimeout(
                        "HANKO_FETCH_TIMEOUT_SECONDS must be greater than 0".to_string(),
                    ));
                }

                value
            } else {
                DEFAULT_FETCH_TIMEOUT_SECONDS
            };

        Ok(GateConfig {
            api_url,
            cookie_name,
            exclude_paths,
            jwks_cache_ttl: Duration::from_secs(jwks_cache_ttl_seconds),
            clock_skew_seconds,
            fetch_timeout: Duration::from_secs(fetch_timeout_seconds),
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECONDS),
        })
    }

    /// The JWKS endpoint URL, derived from the API base URL plus the
    /// well-known discovery suffix.
    pub fn jwks_url(&self) -> String {
        format!(
            "{}{}",
            self.api_url.trim_end_matches('/'),
            JWKS_DISCOVERY_PATH
        )
    }
}
