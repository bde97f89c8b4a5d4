//! Error types for broker session and credential lease operations.

use thiserror::Error;

/// Result type for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;

/// Errors that can occur while talking to the secrets broker.
///
/// None of the variants ever carry a secret value. `Api` carries the broker's
/// response body, which for the endpoints used here is an error message.
#[derive(Error, Debug)]
pub enum BrokerError {
    /// Caller input was rejected before any network call.
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Sign-in was rejected by the broker.
    #[error("Authentication failed: {message}")]
    Authentication { message: String },

    /// The managed account could not be resolved.
    #[error("Managed account not found: {system_name}/{account_name}: {body}")]
    NotFound { system_name: String, account_name: String, body: String },

    /// The broker answered with a status outside 200/201/204.
    #[error("Broker API error (status {status}): {body}")]
    Api { status: u16, body: String },

    /// A broker response could not be decoded.
    #[error("Failed to decode {what}: {message}")]
    Decode { what: String, message: String },

    /// The request never produced a response (connect, timeout, body read).
    #[error("HTTP request failed: {0}")]
    Http(String),

    /// Configuration error.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// `release` was called without a matching `acquire`.
    #[error("Session released without a matching acquire")]
    NotAcquired,

    /// The physical sign-out failed. The session has already been discarded.
    #[error("Sign-out failed: {0}")]
    SignOutFailed(Box<BrokerError>),

    /// A background broker task panicked or was aborted by runtime shutdown.
    #[error("Broker task failed: {message}")]
    Task { message: String },
}

impl BrokerError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    /// Create an authentication error.
    pub fn authentication(message: impl Into<String>) -> Self {
        Self::Authentication { message: message.into() }
    }

    /// Create a not found error for a managed account, keeping the broker's body.
    pub fn not_found(
        system_name: impl Into<String>,
        account_name: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self::NotFound {
            system_name: system_name.into(),
            account_name: account_name.into(),
            body: body.into(),
        }
    }

    /// Create an API error from a response status and body.
    pub fn api(status: u16, body: impl Into<String>) -> Self {
        Self::Api { status, body: body.into() }
    }

    /// Create a decode error.
    pub fn decode(what: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Decode { what: what.into(), message: message.into() }
    }

    /// Create an HTTP transport error.
    pub fn http(message: impl Into<String>) -> Self {
        Self::Http(message.into())
    }

    /// Create a config error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config { message: message.into() }
    }

    /// Create a task error.
    pub fn task(message: impl Into<String>) -> Self {
        Self::Task { message: message.into() }
    }

    /// Wrap a sign-out failure.
    pub fn sign_out_failed(source: BrokerError) -> Self {
        Self::SignOutFailed(Box::new(source))
    }

    /// HTTP status code carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Api { status, .. } => Some(*status),
            Self::SignOutFailed(inner) => inner.status(),
            _ => None,
        }
    }

    /// Whether a caller-side retry could plausibly succeed.
    ///
    /// Nothing in this crate retries; this is a hint for callers that run their
    /// own retry loop.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

impl From<tokio::task::JoinError> for BrokerError {
    fn from(err: tokio::task::JoinError) -> Self {
        Self::Task { message: err.to_string() }
    }
}

impl From<reqwest::Error> for BrokerError {
    fn from(err: reqwest::Error) -> Self {
        // reqwest includes the URL, never headers, so the API key stays out of this
        Self::Http(err.to_string())
    }
}
