//! # Structured Logging
//!
//! Span macros and subscriber setup on top of the tracing ecosystem.
//!
//! Secret material never reaches a log line: credentials, the API key, and
//! session cookies are [`SecretString`](crate::broker::SecretString)s, which
//! render as `[REDACTED]`.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::broker::{BrokerError, Result};
use crate::config::{BrokerConfig, LoggingConfig};

/// Create a tracing span for one credential lease.
///
/// ```rust,ignore
/// let span = lease_span!("Computer01", "User04");
/// let span = lease_span!("Computer01", "User04", batch = true);
/// ```
#[macro_export]
macro_rules! lease_span {
    ($system_name:expr, $account_name:expr) => {
        tracing::info_span!(
            "credential_lease",
            system_name = %$system_name,
            account_name = %$account_name,
            operation_id = %uuid::Uuid::new_v4()
        )
    };
    ($system_name:expr, $account_name:expr, $($field:tt)*) => {
        tracing::info_span!(
            "credential_lease",
            system_name = %$system_name,
            account_name = %$account_name,
            operation_id = %uuid::Uuid::new_v4(),
            $($field)*
        )
    };
}

/// Install the global subscriber.
///
/// `RUST_LOG` wins over `config.level` when set.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .map_err(|e| BrokerError::config(format!("Invalid log level '{}': {}", config.level, e)))?;

    let registry = tracing_subscriber::registry().with(filter);
    let result = if config.json {
        registry.with(fmt::layer().json().with_writer(std::io::stderr)).try_init()
    } else {
        registry.with(fmt::layer().with_writer(std::io::stderr)).try_init()
    };

    // a subscriber may already be installed (e.g. by a test harness)
    if let Err(e) = result {
        tracing::debug!(error = %e, "Global subscriber already set");
    }

    Ok(())
}

/// Log broker configuration at startup
pub fn log_config_info(config: &BrokerConfig) {
    tracing::info!(
        api_url = %config.api_url,
        run_as = %config.run_as,
        timeout_secs = config.timeout_secs,
        duration_minutes = config.lease.duration_minutes,
        conflict_option = %config.lease.conflict_option,
        checkin_on_failure = config.lease.checkin_on_failure,
        "Broker configuration"
    );
}
