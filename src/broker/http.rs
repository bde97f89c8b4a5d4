//! `reqwest` implementation of [`BrokerTransport`].
//!
//! Every request carries `Authorization: PS-Auth key=<api key>;runas=<account>;`.
//! The broker ties follow-up calls to a session through the cookie it sets on
//! `Auth/SignAppin`; that cookie is stored on the returned [`Session`] and
//! replayed explicitly, so the client itself keeps no cookie jar.

use async_trait::async_trait;
use reqwest::header::{HeaderValue, AUTHORIZATION, COOKIE, SET_COOKIE};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use std::time::Duration;
use tracing::{debug, trace};
use url::Url;

use super::error::{BrokerError, Result};
use super::secret::SecretString;
use super::transport::BrokerTransport;
use super::types::{CredentialRequest, ManagedAccountRef, Session, SignedInUser};
use crate::config::BrokerConfig;

/// Authenticated HTTP client for the broker API.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: Url,
    auth_header: HeaderValue,
}

impl HttpTransport {
    /// Build a transport from broker configuration.
    ///
    /// # Errors
    ///
    /// - [`BrokerError::Config`] if the URL is unusable, the key or run-as account
    ///   cannot be sent as a header, or the HTTP client cannot be built
    pub fn new(config: &BrokerConfig) -> Result<Self> {
        let base_url = parse_base_url(&config.api_url)?;

        let mut auth_header = HeaderValue::from_str(&format!(
            "PS-Auth key={};runas={};",
            config.api_key.expose_secret(),
            config.run_as
        ))
        .map_err(|_| {
            BrokerError::config(
                "API key or run-as account contains characters not allowed in a header",
            )
        })?;
        auth_header.set_sensitive(true);

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BrokerError::config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self { client, base_url, auth_header })
    }

    /// Base URL every API path is joined onto.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn url(&self, path: &str) -> Result<Url> {
        self.base_url
            .join(path)
            .map_err(|e| BrokerError::config(format!("Invalid broker path '{}': {}", path, e)))
    }

    fn request(
        &self,
        method: Method,
        url: Url,
        session: Option<&Session>,
    ) -> Result<RequestBuilder> {
        debug!(method = %method, path = %url.path(), "Sending broker request");

        let mut builder =
            self.client.request(method, url).header(AUTHORIZATION, self.auth_header.clone());

        if let Some(cookie) = session.and_then(Session::cookie) {
            let mut value = HeaderValue::from_str(cookie.expose_secret())
                .map_err(|_| BrokerError::decode("session cookie", "not a valid header value"))?;
            value.set_sensitive(true);
            builder = builder.header(COOKIE, value);
        }

        Ok(builder)
    }

    /// Send a request and turn any status other than 200/201/204 into an error.
    async fn send(&self, builder: RequestBuilder) -> Result<Response> {
        let response = builder.send().await?;
        let status = response.status();
        debug!(status = %status, "Broker response status");

        if is_success(status) {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_else(|_| String::new());
        trace!(status = %status, body = %body, "Broker error response");
        Err(BrokerError::api(status.as_u16(), body))
    }
}

#[async_trait]
impl BrokerTransport for HttpTransport {
    async fn sign_in(&self) -> Result<Session> {
        let url = self.url("Auth/SignAppin")?;
        let response = match self.send(self.request(Method::POST, url, None)?).await {
            Ok(response) => response,
            Err(BrokerError::Api { status, body }) if status == 401 || status == 403 => {
                return Err(BrokerError::authentication(format!(
                    "broker rejected API key (status {}): {}",
                    status, body
                )));
            }
            Err(e) => return Err(e),
        };

        let cookie = session_cookie(&response);
        let body = response.text().await?;
        let user: SignedInUser = serde_json::from_str(&body)
            .map_err(|e| BrokerError::decode("sign-in response", e.to_string()))?;

        Ok(Session::new(user, cookie))
    }

    async fn sign_out(&self, session: &Session) -> Result<()> {
        let url = self.url("Auth/Signout")?;
        self.send(self.request(Method::POST, url, Some(session))?).await?;
        Ok(())
    }

    async fn resolve_account(
        &self,
        session: &Session,
        system_name: &str,
        account_name: &str,
    ) -> Result<ManagedAccountRef> {
        let mut url = self.url("ManagedAccounts")?;
        url.query_pairs_mut()
            .append_pair("systemName", system_name)
            .append_pair("accountName", account_name);

        let response = match self.send(self.request(Method::GET, url, Some(session))?).await {
            Ok(response) => response,
            Err(BrokerError::Api { status: 404, body }) => {
                return Err(BrokerError::not_found(system_name, account_name, body));
            }
            Err(e) => return Err(e),
        };

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| BrokerError::decode("managed account response", e.to_string()))
    }

    async fn create_request(
        &self,
        session: &Session,
        request: &CredentialRequest,
    ) -> Result<String> {
        let url = self.url("Requests")?;
        let builder = self.request(Method::POST, url, Some(session))?.json(request);
        let response = self.send(builder).await?;
        Ok(response.text().await?)
    }

    async fn fetch_credential(&self, session: &Session, request_id: &str) -> Result<SecretString> {
        let url = self.url(&format!("Credentials/{}", request_id))?;
        let response = self.send(self.request(Method::GET, url, Some(session))?).await?;
        Ok(SecretString::new(response.text().await?))
    }

    async fn checkin(&self, session: &Session, request_id: &str) -> Result<()> {
        let url = self.url(&format!("Requests/{}/checkin", request_id))?;
        let builder = self.request(Method::PUT, url, Some(session))?.json(&serde_json::json!({}));
        self.send(builder).await?;
        Ok(())
    }
}

fn is_success(status: StatusCode) -> bool {
    matches!(status, StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT)
}

/// Parse the API base URL, forcing a trailing slash so relative paths join under it.
fn parse_base_url(raw: &str) -> Result<Url> {
    let mut url = Url::parse(raw.trim())
        .map_err(|e| BrokerError::config(format!("Invalid broker API URL '{}': {}", raw, e)))?;

    if url.scheme() != "https" && url.scheme() != "http" {
        return Err(BrokerError::config(format!(
            "Broker API URL must use http or https, got '{}'",
            url.scheme()
        )));
    }

    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }

    Ok(url)
}

/// Collapse the `Set-Cookie` headers of a response into one `Cookie` header value.
fn session_cookie(response: &Response) -> Option<SecretString> {
    let pairs: Vec<&str> = response
        .headers()
        .get_all(SET_COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .filter_map(|value| value.split(';').next())
        .map(str::trim)
        .filter(|pair| !pair.is_empty())
        .collect();

    if pairs.is_empty() {
        None
    } else {
        Some(SecretString::new(pairs.join("; ")))
    }
}
