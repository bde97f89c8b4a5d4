//! # Configuration Settings
//!
//! Broker connection settings, the lease policy applied to every credential
//! request, and logging settings.

use serde::{Deserialize, Serialize};
use std::str::FromStr;
use validator::Validate;

use crate::broker::{BrokerError, ConflictOption, Result, SecretString};

const DEFAULT_TIMEOUT_SECS: u64 = 30;
const DEFAULT_DURATION_MINUTES: u32 = 5;
const DEFAULT_LOG_LEVEL: &str = "info";

/// Connection settings for the secrets broker.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
pub struct BrokerConfig {
    /// Base URL of the broker API (e.g. "https://broker.example.com/BeyondTrust/api/public/v3")
    #[validate(url(message = "api_url must be a valid URL"))]
    pub api_url: String,

    /// API registration key (redacted in logs)
    pub api_key: SecretString,

    /// Account the API key runs as
    #[validate(length(min = 1, message = "run_as cannot be empty"))]
    pub run_as: String,

    /// Per-request timeout in seconds
    #[serde(default = "default_timeout_secs")]
    #[validate(range(min = 1, max = 600))]
    pub timeout_secs: u64,

    /// Policy for credential requests
    #[serde(default)]
    #[validate(nested)]
    pub lease: LeasePolicy,
}

/// How credential requests are filed with the broker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Validate)]
pub struct LeasePolicy {
    /// How long the broker keeps the request open if it is never checked in
    #[serde(default = "default_duration_minutes")]
    #[validate(range(min = 1, max = 10080))]
    pub duration_minutes: u32,

    /// Audit reason recorded with every request. Required.
    #[serde(default)]
    #[validate(length(min = 1, message = "lease reason is required"))]
    pub reason: String,

    /// Behaviour when the account already has an active request
    #[serde(default)]
    pub conflict_option: ConflictOption,

    /// Check the request back in when a later step fails
    #[serde(default = "default_true")]
    pub checkin_on_failure: bool,
}

/// Logging settings for the binary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set
    pub level: String,

    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

fn default_timeout_secs() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

fn default_duration_minutes() -> u32 {
    DEFAULT_DURATION_MINUTES
}

fn default_true() -> bool {
    true
}

impl LeasePolicy {
    /// Default policy with the given audit reason.
    pub fn new(reason: impl Into<String>) -> Self {
        Self { reason: reason.into(), ..Self::default() }
    }

    pub fn with_duration_minutes(mut self, minutes: u32) -> Self {
        self.duration_minutes = minutes;
        self
    }

    pub fn with_conflict_option(mut self, option: ConflictOption) -> Self {
        self.conflict_option = option;
        self
    }

    pub fn with_checkin_on_failure(mut self, enabled: bool) -> Self {
        self.checkin_on_failure = enabled;
        self
    }

    fn from_lookup(lookup: &impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            duration_minutes: parse_var(
                lookup,
                "CREDLEASE_DURATION_MINUTES",
                DEFAULT_DURATION_MINUTES,
            )?,
            reason: lookup("CREDLEASE_REASON").unwrap_or_default(),
            conflict_option: parse_var(lookup, "CREDLEASE_CONFLICT_OPTION", ConflictOption::Reuse)?,
            checkin_on_failure: parse_bool(lookup, "CREDLEASE_CHECKIN_ON_FAILURE", true)?,
        })
    }
}

impl Default for LeasePolicy {
    fn default() -> Self {
        Self {
            duration_minutes: DEFAULT_DURATION_MINUTES,
            reason: String::new(),
            conflict_option: ConflictOption::Reuse,
            checkin_on_failure: true,
        }
    }
}

impl BrokerConfig {
    /// Create configuration from environment variables.
    ///
    /// # Environment Variables
    ///
    /// - `CREDLEASE_API_URL`, `CREDLEASE_API_KEY`, `CREDLEASE_RUN_AS`: required
    /// - `CREDLEASE_REASON`: required audit reason for credential requests
    /// - `CREDLEASE_TIMEOUT_SECS` (default 30)
    /// - `CREDLEASE_DURATION_MINUTES` (default 5)
    /// - `CREDLEASE_CONFLICT_OPTION`: `reuse` (default) or `fail`
    /// - `CREDLEASE_CHECKIN_ON_FAILURE` (default true)
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let config = Self {
            api_url: required_var(&lookup, "CREDLEASE_API_URL")?,
            api_key: SecretString::new(required_var(&lookup, "CREDLEASE_API_KEY")?),
            run_as: required_var(&lookup, "CREDLEASE_RUN_AS")?,
            timeout_secs: parse_var(&lookup, "CREDLEASE_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS)?,
            lease: LeasePolicy::from_lookup(&lookup)?,
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the entire configuration
    pub fn validate(&self) -> Result<()> {
        Validate::validate(self).map_err(|e| BrokerError::config(e.to_string()))?;

        if self.api_key.expose_secret().trim().is_empty() {
            return Err(BrokerError::config("api_key cannot be empty"));
        }

        if self.lease.reason.trim().is_empty() {
            return Err(BrokerError::config("lease reason cannot be blank"));
        }

        Ok(())
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: DEFAULT_LOG_LEVEL.to_string(), json: false }
    }
}

impl LoggingConfig {
    /// Reads `CREDLEASE_LOG_LEVEL` and `CREDLEASE_LOG_JSON`.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        Ok(Self {
            level: lookup("CREDLEASE_LOG_LEVEL").unwrap_or_else(|| DEFAULT_LOG_LEVEL.to_string()),
            json: parse_bool(&lookup, "CREDLEASE_LOG_JSON", false)?,
        })
    }
}

fn required_var(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Result<String> {
    lookup(key)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| BrokerError::config(format!("{} environment variable not set", key)))
}

fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| BrokerError::config(format!("Invalid {}: {}", key, e))),
        None => Ok(default),
    }
}

fn parse_bool(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: bool) -> Result<bool> {
    match lookup(key).map(|raw| raw.trim().to_ascii_lowercase()) {
        None => Ok(default),
        Some(raw) => match raw.as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(BrokerError::config(format!("Invalid {}: expected a boolean", key))),
        },
    }
}
