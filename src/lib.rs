//! # credlease
//!
//! Short-lived credentials for broker-managed accounts, without every caller
//! running its own authenticated session.
//!
//! ## Architecture
//!
//! ```text
//! Caller → SessionManager::acquire → CredentialLeaseClient → SessionManager::release
//!                  ↓                             ↓
//!      BrokerTransport::sign_in/out   BrokerTransport (resolve, request, fetch, check-in)
//! ```
//!
//! ## Core Components
//!
//! - **SessionManager**: one lazily created, reference-counted broker session
//!   shared by all concurrent callers
//! - **CredentialLeaseClient**: the resolve → request → fetch → check-in protocol
//!   with compensating cleanup
//! - **HttpTransport**: `reqwest` client for the broker's REST API
//!
//! ## Example Usage
//!
//! ```rust,no_run
//! use credlease::broker::{CredentialLeaseClient, HttpTransport, SessionManager};
//! use credlease::config::BrokerConfig;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> credlease::Result<()> {
//!     let config = BrokerConfig::from_env()?;
//!     let sessions = Arc::new(SessionManager::new(Arc::new(HttpTransport::new(&config)?)));
//!     let client = CredentialLeaseClient::new(sessions, config.lease.clone());
//!
//!     let password = client.checkout("Computer01", "User04").await?;
//!     assert!(!password.is_empty());
//!     Ok(())
//! }
//! ```

pub mod broker;
pub mod cli;
pub mod config;
pub mod observability;

// Re-export commonly used types and traits
pub use broker::{
    BrokerError, BrokerTransport, CredentialLeaseClient, HttpTransport, Result, SecretString,
    SessionManager,
};
pub use config::{BrokerConfig, LeasePolicy, LoggingConfig};
pub use observability::init_logging;

/// Application version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Application name from Cargo.toml
pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
