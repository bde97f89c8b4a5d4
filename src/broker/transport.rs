//! Seam between the session/lease logic and the broker's HTTP API.

use async_trait::async_trait;

use super::error::Result;
use super::secret::SecretString;
use super::types::{CredentialRequest, ManagedAccountRef, Session};

/// Remote calls consumed from the secrets broker.
///
/// Implementations sign every call with the broker API key and treat
/// 200/201/204 as success. Anything else becomes [`BrokerError::Api`] carrying
/// the status code and the response body.
///
/// Only [`SessionManager`](super::SessionManager) calls `sign_in` and
/// `sign_out`; lease code receives an already established [`Session`].
///
/// [`BrokerError::Api`]: super::BrokerError::Api
#[async_trait]
pub trait BrokerTransport: Send + Sync {
    /// `POST Auth/SignAppin`.
    async fn sign_in(&self) -> Result<Session>;

    /// `POST Auth/Signout`.
    async fn sign_out(&self, session: &Session) -> Result<()>;

    /// `GET ManagedAccounts?systemName=..&accountName=..`.
    ///
    /// # Errors
    ///
    /// - [`BrokerError::NotFound`](super::BrokerError::NotFound) if the broker
    ///   does not know the account
    async fn resolve_account(
        &self,
        session: &Session,
        system_name: &str,
        account_name: &str,
    ) -> Result<ManagedAccountRef>;

    /// `POST Requests`. Returns the raw response body, which carries the request id.
    async fn create_request(&self, session: &Session, request: &CredentialRequest)
        -> Result<String>;

    /// `GET Credentials/<request_id>`. Returns the raw, still JSON-quoted body.
    async fn fetch_credential(&self, session: &Session, request_id: &str) -> Result<SecretString>;

    /// `PUT Requests/<request_id>/checkin`.
    async fn checkin(&self, session: &Session, request_id: &str) -> Result<()>;
}
