//! Entities exchanged with the secrets broker.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::{BrokerError, Result};
use super::secret::SecretString;
use crate::config::LeasePolicy;

/// Identity returned by `Auth/SignAppin`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct SignedInUser {
    pub user_id: i64,
    #[serde(default)]
    pub email_address: String,
    pub user_name: String,
    #[serde(default)]
    pub name: String,
}

/// An authenticated broker session.
///
/// Holds the signed-in identity plus the cookie the broker issued at sign-in.
/// Every call made on behalf of the session replays that cookie, so two
/// sessions never share state inside the HTTP client.
#[derive(Debug, Clone)]
pub struct Session {
    user: SignedInUser,
    cookie: Option<SecretString>,
}

impl Session {
    pub fn new(user: SignedInUser, cookie: Option<SecretString>) -> Self {
        Self { user, cookie }
    }

    pub fn user(&self) -> &SignedInUser {
        &self.user
    }

    /// `Cookie` header value to attribute a call to this session.
    pub fn cookie(&self) -> Option<&SecretString> {
        self.cookie.as_ref()
    }
}

/// Broker identifiers for a managed account.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ManagedAccountRef {
    pub system_id: i64,
    pub account_id: i64,
}

/// What the broker does when the account already has an active request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictOption {
    /// Hand back the existing unexpired request.
    #[default]
    Reuse,
    /// Reject the new request.
    Fail,
}

impl fmt::Display for ConflictOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Reuse => f.write_str("reuse"),
            Self::Fail => f.write_str("fail"),
        }
    }
}

impl FromStr for ConflictOption {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "reuse" => Ok(Self::Reuse),
            "fail" => Ok(Self::Fail),
            other => Err(BrokerError::config(format!(
                "Unknown conflict option '{}' (expected 'reuse' or 'fail')",
                other
            ))),
        }
    }
}

/// Body of `POST Requests`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CredentialRequest {
    #[serde(rename = "SystemID")]
    pub system_id: i64,
    #[serde(rename = "AccountID")]
    pub account_id: i64,
    #[serde(rename = "DurationMinutes")]
    pub duration_minutes: u32,
    #[serde(rename = "Reason")]
    pub reason: String,
    #[serde(rename = "ConflictOption")]
    pub conflict_option: ConflictOption,
}

impl CredentialRequest {
    pub fn new(account: ManagedAccountRef, policy: &LeasePolicy) -> Self {
        Self {
            system_id: account.system_id,
            account_id: account.account_id,
            duration_minutes: policy.duration_minutes,
            reason: policy.reason.clone(),
            conflict_option: policy.conflict_option,
        }
    }
}

/// A released credential together with the request that released it.
#[derive(Debug, Clone)]
pub struct CredentialLease {
    pub request_id: String,
    pub secret: SecretString,
}

/// A validated `(system name, account name)` pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountPath {
    system_name: String,
    account_name: String,
}

impl AccountPath {
    /// Trims both names and rejects empty ones.
    pub fn new(system_name: &str, account_name: &str) -> Result<Self> {
        let system_name = system_name.trim();
        let account_name = account_name.trim();

        if system_name.is_empty() {
            return Err(BrokerError::validation("system name cannot be empty"));
        }
        if account_name.is_empty() {
            return Err(BrokerError::validation("account name cannot be empty"));
        }

        Ok(Self { system_name: system_name.to_string(), account_name: account_name.to_string() })
    }

    /// Parses `system<separator>account`, splitting at the first separator.
    ///
    /// Account names may themselves contain the separator (`DOMAIN/user`), so only
    /// the first occurrence splits.
    pub fn parse(path: &str, separator: char) -> Result<Self> {
        let (system_name, account_name) = path.trim().split_once(separator).ok_or_else(|| {
            BrokerError::validation(format!(
                "account path '{}' must look like system{}account",
                path, separator
            ))
        })?;
        Self::new(system_name, account_name)
    }

    pub fn system_name(&self) -> &str {
        &self.system_name
    }

    pub fn account_name(&self) -> &str {
        &self.account_name
    }
}

impl fmt::Display for AccountPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.system_name, self.account_name)
    }
}
