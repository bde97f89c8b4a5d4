//! # Observability Infrastructure
//!
//! Structured logging for broker sessions and credential leases.

pub mod logging;

pub use logging::{init_logging, log_config_info};
