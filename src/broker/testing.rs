//! In-memory [`BrokerTransport`] for unit tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use super::error::{BrokerError, Result};
use super::secret::SecretString;
use super::transport::BrokerTransport;
use super::types::{CredentialRequest, ManagedAccountRef, Session, SignedInUser};

/// Scriptable transport that counts every call.
pub(crate) struct FakeTransport {
    sign_in_delay: Option<Duration>,
    resolve_delay: Option<Duration>,
    fail_sign_in: bool,
    fail_sign_out: bool,
    fail_resolve: bool,
    fail_create: bool,
    fail_fetch: bool,
    fail_checkin: bool,
    request_body: String,
    credential_body: String,
    sign_in: AtomicUsize,
    sign_out: AtomicUsize,
    resolve: AtomicUsize,
    create: AtomicUsize,
    fetch: AtomicUsize,
    checkin: AtomicUsize,
    requests: Mutex<Vec<CredentialRequest>>,
    checked_in: Mutex<Vec<String>>,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self {
            sign_in_delay: None,
            resolve_delay: None,
            fail_sign_in: false,
            fail_sign_out: false,
            fail_resolve: false,
            fail_create: false,
            fail_fetch: false,
            fail_checkin: false,
            request_body: "124".to_string(),
            credential_body: "\"fake_credential\"".to_string(),
            sign_in: AtomicUsize::new(0),
            sign_out: AtomicUsize::new(0),
            resolve: AtomicUsize::new(0),
            create: AtomicUsize::new(0),
            fetch: AtomicUsize::new(0),
            checkin: AtomicUsize::new(0),
            requests: Mutex::new(Vec::new()),
            checked_in: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn with_sign_in_delay(mut self, delay: Duration) -> Self {
        self.sign_in_delay = Some(delay);
        self
    }

    pub(crate) fn with_resolve_delay(mut self, delay: Duration) -> Self {
        self.resolve_delay = Some(delay);
        self
    }

    pub(crate) fn with_request_body(mut self, body: &str) -> Self {
        self.request_body = body.to_string();
        self
    }

    pub(crate) fn with_credential_body(mut self, body: &str) -> Self {
        self.credential_body = body.to_string();
        self
    }

    pub(crate) fn failing_sign_in(mut self) -> Self {
        self.fail_sign_in = true;
        self
    }

    pub(crate) fn failing_sign_out(mut self) -> Self {
        self.fail_sign_out = true;
        self
    }

    pub(crate) fn failing_resolve(mut self) -> Self {
        self.fail_resolve = true;
        self
    }

    pub(crate) fn failing_create(mut self) -> Self {
        self.fail_create = true;
        self
    }

    pub(crate) fn failing_fetch(mut self) -> Self {
        self.fail_fetch = true;
        self
    }

    pub(crate) fn failing_checkin(mut self) -> Self {
        self.fail_checkin = true;
        self
    }

    pub(crate) fn sign_in_calls(&self) -> usize {
        self.sign_in.load(Ordering::SeqCst)
    }

    pub(crate) fn sign_out_calls(&self) -> usize {
        self.sign_out.load(Ordering::SeqCst)
    }

    pub(crate) fn resolve_calls(&self) -> usize {
        self.resolve.load(Ordering::SeqCst)
    }

    pub(crate) fn create_calls(&self) -> usize {
        self.create.load(Ordering::SeqCst)
    }

    pub(crate) fn fetch_calls(&self) -> usize {
        self.fetch.load(Ordering::SeqCst)
    }

    pub(crate) fn checkin_calls(&self) -> usize {
        self.checkin.load(Ordering::SeqCst)
    }

    pub(crate) fn network_calls(&self) -> usize {
        self.sign_in_calls()
            + self.sign_out_calls()
            + self.resolve_calls()
            + self.create_calls()
            + self.fetch_calls()
            + self.checkin_calls()
    }

    pub(crate) fn requests(&self) -> Vec<CredentialRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub(crate) fn checked_in(&self) -> Vec<String> {
        self.checked_in.lock().unwrap().clone()
    }
}

#[async_trait]
impl BrokerTransport for FakeTransport {
    async fn sign_in(&self) -> Result<Session> {
        let n = self.sign_in.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(delay) = self.sign_in_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_sign_in {
            return Err(BrokerError::authentication("broker rejected API key (status 401)"));
        }

        let user = SignedInUser {
            user_id: 1,
            email_address: "svc-terraform@example.com".to_string(),
            user_name: "svc-terraform".to_string(),
            name: "Terraform".to_string(),
        };
        Ok(Session::new(user, Some(SecretString::new(format!("ASP.NET_SessionId={}", n)))))
    }

    async fn sign_out(&self, _session: &Session) -> Result<()> {
        self.sign_out.fetch_add(1, Ordering::SeqCst);
        if self.fail_sign_out {
            return Err(BrokerError::api(500, "sign-out exploded"));
        }
        Ok(())
    }

    async fn resolve_account(
        &self,
        _session: &Session,
        system_name: &str,
        account_name: &str,
    ) -> Result<ManagedAccountRef> {
        self.resolve.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.resolve_delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_resolve {
            let body = "Managed Account not found";
            return Err(BrokerError::not_found(system_name, account_name, body));
        }
        Ok(ManagedAccountRef { system_id: 1, account_id: 10 })
    }

    async fn create_request(
        &self,
        _session: &Session,
        request: &CredentialRequest,
    ) -> Result<String> {
        self.create.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().unwrap().push(request.clone());
        if self.fail_create {
            return Err(BrokerError::api(409, "Too many concurrent requests for this account"));
        }
        Ok(self.request_body.clone())
    }

    async fn fetch_credential(
        &self,
        _session: &Session,
        _request_id: &str,
    ) -> Result<SecretString> {
        self.fetch.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch {
            return Err(BrokerError::api(500, "credential fetch failed"));
        }
        Ok(SecretString::new(self.credential_body.clone()))
    }

    async fn checkin(&self, _session: &Session, request_id: &str) -> Result<()> {
        self.checkin.fetch_add(1, Ordering::SeqCst);
        self.checked_in.lock().unwrap().push(request_id.to_string());
        if self.fail_checkin {
            return Err(BrokerError::api(400, "request already checked in"));
        }
        Ok(())
    }
}
