//! Secrets broker client: shared sessions and credential leases.
//!
//! Callers obtain a managed account's current password without opening their
//! own broker session. Two pieces do the work:
//!
//! - [`SessionManager`]: a lazily created, reference-counted session. Any number
//!   of concurrent callers share one sign-in; the last release signs out.
//! - [`CredentialLeaseClient`]: the lease protocol (resolve account → create
//!   request → fetch credential → check in) run on a shared session, with
//!   compensating cleanup when a step fails.
//!
//! Both talk to the broker through the [`BrokerTransport`] trait;
//! [`HttpTransport`] is the production implementation.
//!
//! # Example
//!
//! ```rust,ignore
//! use credlease::broker::{CredentialLeaseClient, HttpTransport, SessionManager};
//! use credlease::config::BrokerConfig;
//! use std::sync::Arc;
//!
//! let config = BrokerConfig::from_env()?;
//! let transport = Arc::new(HttpTransport::new(&config)?);
//! let sessions = Arc::new(SessionManager::new(transport));
//! let client = CredentialLeaseClient::new(Arc::clone(&sessions), config.lease.clone());
//!
//! let password = client.checkout("Computer01", "User04").await?;
//! ```
//!
//! # Security Considerations
//!
//! - Credentials, the API key, and session cookies are [`SecretString`]s and
//!   never appear in logs, `Debug` output, or error messages
//! - Nothing is retried; broker rejections surface as ordinary errors

pub mod error;
pub mod http;
pub mod lease;
pub mod secret;
pub mod session;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use error::{BrokerError, Result};
pub use http::HttpTransport;
pub use lease::{parse_request_id, unquote_secret, CredentialLeaseClient};
pub use secret::SecretString;
pub use session::SessionManager;
pub use transport::BrokerTransport;
pub use types::{
    AccountPath, ConflictOption, CredentialLease, CredentialRequest, ManagedAccountRef, Session,
    SignedInUser,
};
