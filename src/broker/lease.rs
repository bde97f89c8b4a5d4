//! Credential lease protocol.
//!
//! A checkout is a strict sequence of broker calls on a shared session:
//!
//! ```text
//! acquire → resolve account → create request → fetch credential → check in → release
//! ```
//!
//! Any failure after the session is acquired releases it best-effort and
//! returns the original error; a failure while releasing is only logged. Once a
//! request exists, a failed fetch also checks the request back in (unless the
//! policy disables it) so the account is not held until the request expires.
//!
//! `checkout` and `checkout_many` run their acquire/release bracket on a
//! spawned task. Dropping the returned future (a `timeout`, a losing `select!`
//! branch) stops the caller waiting but not the protocol, so every acquire is
//! still matched by a release.

use std::sync::Arc;
use tracing::{debug, error, info, warn, Instrument};

use super::error::{BrokerError, Result};
use super::secret::SecretString;
use super::session::SessionManager;
use super::transport::BrokerTransport;
use super::types::{AccountPath, CredentialLease, CredentialRequest, Session};
use crate::config::LeasePolicy;

/// Checks out managed-account credentials through a shared [`SessionManager`].
///
/// The client holds no per-call state, so one instance can serve any number of
/// concurrent checkouts.
///
/// # Example
///
/// ```rust,ignore
/// let transport = Arc::new(HttpTransport::new(&config)?);
/// let sessions = Arc::new(SessionManager::new(transport));
/// let client = CredentialLeaseClient::new(sessions, config.lease.clone());
///
/// let password = client.checkout("Computer01", "User04").await?;
/// ```
#[derive(Clone)]
pub struct CredentialLeaseClient {
    sessions: Arc<SessionManager>,
    transport: Arc<dyn BrokerTransport>,
    policy: LeasePolicy,
}

impl CredentialLeaseClient {
    pub fn new(sessions: Arc<SessionManager>, policy: LeasePolicy) -> Self {
        let transport = sessions.transport();
        Self { sessions, transport, policy }
    }

    pub fn policy(&self) -> &LeasePolicy {
        &self.policy
    }

    pub fn sessions(&self) -> &Arc<SessionManager> {
        &self.sessions
    }

    /// Check out the current credential of `account_name` on `system_name`.
    ///
    /// # Errors
    ///
    /// - [`BrokerError::Validation`] if either name is blank; nothing is sent
    /// - the sign-in error if no session could be established
    /// - the error of the first protocol step that failed
    pub async fn checkout(&self, system_name: &str, account_name: &str) -> Result<SecretString> {
        let account = AccountPath::new(system_name, account_name)?;
        let span = crate::lease_span!(account.system_name(), account.account_name());
        let client = self.clone();

        let task = tokio::spawn(
            async move {
                let session = client.sessions.acquire().await?;
                let outcome = client.lease(&session, &account).await;
                client.finish(outcome).await.map(|lease| lease.secret)
            }
            .instrument(span),
        );
        task.await?
    }

    /// Check out a credential addressed as `system<separator>account`.
    pub async fn checkout_path(&self, path: &str, separator: char) -> Result<SecretString> {
        let account = AccountPath::parse(path, separator)?;
        self.checkout(account.system_name(), account.account_name()).await
    }

    /// Check out several credentials under a single session.
    ///
    /// All names are validated before anything is sent. The first failing
    /// account aborts the batch and its error is returned.
    pub async fn checkout_many(&self, accounts: &[(&str, &str)]) -> Result<Vec<SecretString>> {
        let accounts = accounts
            .iter()
            .map(|(system_name, account_name)| AccountPath::new(system_name, account_name))
            .collect::<Result<Vec<_>>>()?;

        if accounts.is_empty() {
            return Ok(Vec::new());
        }

        let client = self.clone();
        let task =
            tokio::spawn(async move { client.lease_batch(accounts).await }.in_current_span());
        task.await?
    }

    async fn lease_batch(&self, accounts: Vec<AccountPath>) -> Result<Vec<SecretString>> {
        let session = self.sessions.acquire().await?;
        let mut secrets = Vec::with_capacity(accounts.len());

        for account in &accounts {
            let span = crate::lease_span!(account.system_name(), account.account_name());
            match self.lease(&session, account).instrument(span).await {
                Ok(lease) => secrets.push(lease.secret),
                Err(e) => {
                    error!(error = %e, account = %account, "Batch checkout aborted");
                    self.release_quietly().await;
                    return Err(e);
                }
            }
        }

        self.release_quietly().await;
        info!(count = secrets.len(), "Batch checkout completed");
        Ok(secrets)
    }

    /// Run resolve → request → fetch → check-in on an already acquired session.
    ///
    /// Does not acquire or release; callers bracket it with the session manager.
    pub async fn lease(&self, session: &Session, account: &AccountPath) -> Result<CredentialLease> {
        let managed = self
            .transport
            .resolve_account(session, account.system_name(), account.account_name())
            .await?;
        debug!(
            system_id = managed.system_id,
            account_id = managed.account_id,
            "Resolved managed account"
        );

        let request = CredentialRequest::new(managed, &self.policy);
        let body = self.transport.create_request(session, &request).await?;
        let request_id = parse_request_id(&body)?;
        debug!(
            request_id = %request_id,
            duration_minutes = request.duration_minutes,
            conflict_option = %request.conflict_option,
            "Credential request created"
        );

        let secret = match self.fetch_secret(session, &request_id).await {
            Ok(secret) => secret,
            Err(e) => {
                self.abandon_request(session, &request_id).await;
                return Err(e);
            }
        };

        self.transport.checkin(session, &request_id).await?;
        debug!(request_id = %request_id, "Credential request checked in");

        Ok(CredentialLease { request_id, secret })
    }

    async fn fetch_secret(&self, session: &Session, request_id: &str) -> Result<SecretString> {
        let raw = self.transport.fetch_credential(session, request_id).await?;
        unquote_secret(&raw)
    }

    /// Best-effort check-in for a request whose credential never reached the caller.
    async fn abandon_request(&self, session: &Session, request_id: &str) {
        if !self.policy.checkin_on_failure {
            return;
        }

        match self.transport.checkin(session, request_id).await {
            Ok(()) => debug!(request_id = %request_id, "Checked in abandoned request"),
            Err(e) => warn!(
                error = %e,
                request_id = %request_id,
                "Check-in of abandoned request failed; it stays open until it expires"
            ),
        }
    }

    async fn finish(&self, outcome: Result<CredentialLease>) -> Result<CredentialLease> {
        match outcome {
            Ok(lease) => {
                self.release_quietly().await;
                info!(request_id = %lease.request_id, "Credential checked out");
                Ok(lease)
            }
            Err(e) => {
                error!(error = %e, "Credential lease failed");
                self.release_quietly().await;
                Err(e)
            }
        }
    }

    async fn release_quietly(&self) {
        if let Err(e) = self.sessions.release().await {
            warn!(error = %e, "Session release failed");
        }
    }
}

/// Decode the JSON string literal the broker wraps credentials in.
///
/// The decode error never echoes the body, since the body is the credential.
pub fn unquote_secret(raw: &SecretString) -> Result<SecretString> {
    serde_json::from_str::<String>(raw.expose_secret().trim())
        .map(SecretString::new)
        .map_err(|e| {
            BrokerError::decode(
                "credential",
                format!("not a JSON string ({:?} error at column {})", e.classify(), e.column()),
            )
        })
}

/// Extract the request id from the body of `POST Requests`.
///
/// The broker answers with a bare number, a JSON string, or plain text.
pub fn parse_request_id(body: &str) -> Result<String> {
    let trimmed = body.trim();
    let id = match serde_json::from_str::<serde_json::Value>(trimmed) {
        Ok(serde_json::Value::String(id)) => id,
        Ok(serde_json::Value::Number(id)) => id.to_string(),
        Ok(_) => {
            return Err(BrokerError::decode("request id", "expected a string or number"));
        }
        Err(_) => trimmed.to_string(),
    };

    // the id becomes a path segment, so nothing that could change the path is accepted
    if id.is_empty() || !id.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_') {
        return Err(BrokerError::decode("request id", format!("unexpected request id '{}'", id)));
    }

    Ok(id)
}
