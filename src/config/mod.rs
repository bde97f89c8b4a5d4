//! # Configuration Management
//!
//! Broker connection settings and lease policy, loaded from environment
//! variables or deserialized from a config document.

pub mod settings;

pub use settings::{BrokerConfig, LeasePolicy, LoggingConfig};
