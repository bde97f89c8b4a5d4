//! Common test utilities for all integration tests.
//!
//! Wiremock stand-ins for the broker endpoints plus a client wired to them.

#![allow(dead_code)]

use std::sync::Arc;

use credlease::broker::{CredentialLeaseClient, HttpTransport, SecretString, SessionManager};
use credlease::config::{BrokerConfig, LeasePolicy};
use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const API_PREFIX: &str = "/BeyondTrust/api/public/v3";
pub const API_KEY: &str = "c479a66f323443";
pub const RUN_AS: &str = "svc-terraform";
pub const AUTH_HEADER: &str = "PS-Auth key=c479a66f323443;runas=svc-terraform;";
pub const SESSION_COOKIE: &str = "ASP.NET_SessionId=abc123";
pub const REQUEST_ID: &str = "124";

pub fn api_path(endpoint: &str) -> String {
    format!("{}/{}", API_PREFIX, endpoint)
}

pub fn broker_config(server: &MockServer, lease: LeasePolicy) -> BrokerConfig {
    BrokerConfig {
        api_url: format!("{}{}", server.uri(), API_PREFIX),
        api_key: SecretString::new(API_KEY),
        run_as: RUN_AS.to_string(),
        timeout_secs: 5,
        lease,
    }
}

pub fn lease_client_with_policy(server: &MockServer, lease: LeasePolicy) -> CredentialLeaseClient {
    let config = broker_config(server, lease);
    let transport = Arc::new(HttpTransport::new(&config).expect("transport"));
    let sessions = Arc::new(SessionManager::new(transport));
    CredentialLeaseClient::new(sessions, config.lease.clone())
}

pub fn lease_client(server: &MockServer) -> CredentialLeaseClient {
    lease_client_with_policy(server, LeasePolicy::new("integration test"))
}

pub fn sign_in_response() -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("Set-Cookie", format!("{}; path=/; HttpOnly", SESSION_COOKIE).as_str())
        .set_body_json(json!({
            "UserId": 7,
            "EmailAddress": "svc-terraform@example.com",
            "UserName": RUN_AS,
            "Name": "Terraform"
        }))
}

pub async fn mount_sign_in(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path(api_path("Auth/SignAppin")))
        .and(header("Authorization", AUTH_HEADER))
        .respond_with(sign_in_response())
        .expect(expected)
        .named("sign in")
        .mount(server)
        .await;
}

pub async fn mount_sign_out(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path(api_path("Auth/Signout")))
        .and(header("Cookie", SESSION_COOKIE))
        .respond_with(ResponseTemplate::new(200))
        .expect(expected)
        .named("sign out")
        .mount(server)
        .await;
}

pub async fn mount_resolve(server: &MockServer, system: &str, account: &str, expected: u64) {
    Mock::given(method("GET"))
        .and(path(api_path("ManagedAccounts")))
        .and(query_param("systemName", system))
        .and(query_param("accountName", account))
        .and(header("Cookie", SESSION_COOKIE))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "SystemId": 1,
            "AccountId": 10,
            "SystemName": system,
            "AccountName": account
        })))
        .expect(expected)
        .named("resolve account")
        .mount(server)
        .await;
}

pub async fn mount_create_request(server: &MockServer, expected: u64) {
    Mock::given(method("POST"))
        .and(path(api_path("Requests")))
        .and(header("Cookie", SESSION_COOKIE))
        .respond_with(ResponseTemplate::new(201).set_body_string(REQUEST_ID))
        .expect(expected)
        .named("create request")
        .mount(server)
        .await;
}

pub async fn mount_credential(server: &MockServer, body: &str, expected: u64) {
    Mock::given(method("GET"))
        .and(path(api_path(&format!("Credentials/{}", REQUEST_ID))))
        .and(header("Cookie", SESSION_COOKIE))
        .respond_with(ResponseTemplate::new(200).set_body_string(body))
        .expect(expected)
        .named("fetch credential")
        .mount(server)
        .await;
}

pub async fn mount_checkin(server: &MockServer, expected: u64) {
    Mock::given(method("PUT"))
        .and(path(api_path(&format!("Requests/{}/checkin", REQUEST_ID))))
        .and(header("Cookie", SESSION_COOKIE))
        .respond_with(ResponseTemplate::new(204))
        .expect(expected)
        .named("check in")
        .mount(server)
        .await;
}

/// Mount the full protocol for one account, each endpoint expected `times` times.
pub async fn mount_happy_path(server: &MockServer, system: &str, account: &str, times: u64) {
    mount_resolve(server, system, account, times).await;
    mount_create_request(server, times).await;
    mount_credential(server, "\"fake_credential\"", times).await;
    mount_checkin(server, times).await;
}
