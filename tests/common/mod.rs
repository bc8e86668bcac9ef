//! Shared fixtures for the wiremock-backed integration tests.

#![allow(dead_code)]

use hemmer_provider_azurerm::testing::{ProviderTester, TEST_SUBSCRIPTION_ID, TEST_TENANT_ID};
use hemmer_provider_azurerm::AzureRmProvider;
use serde_json::json;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const RESOURCE_GROUP: &str = "rg1";

/// A mock Resource Manager with a working token endpoint, and a provider
/// configured against it.
pub async fn setup() -> (MockServer, ProviderTester<AzureRmProvider>) {
    let server = MockServer::start().await;
    mount_token(&server).await;
    let tester = ProviderTester::against(&server.uri())
        .await
        .expect("provider configures against the mock");
    (server, tester)
}

pub async fn mount_token(server: &MockServer) {
    Mock::given(method("POST"))
        .and(path(format!("/{}/oauth2/v2.0/token", TEST_TENANT_ID)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "token_type": "Bearer",
            "access_token": "test-token",
            "expires_in": 3600
        })))
        .mount(server)
        .await;
}

pub fn namespace_id(name: &str) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.EventHub/namespaces/{}",
        TEST_SUBSCRIPTION_ID, RESOURCE_GROUP, name
    )
}

pub fn digital_twins_id(name: &str) -> String {
    format!(
        "/subscriptions/{}/resourceGroups/{}/providers/Microsoft.DigitalTwins\
         /digitalTwinsInstances/{}",
        TEST_SUBSCRIPTION_ID, RESOURCE_GROUP, name
    )
}

/// GET `resource_path` answers 404 `times` times before later mocks apply.
pub async fn not_found_times(server: &MockServer, resource_path: &str, times: u64) {
    Mock::given(method("GET"))
        .and(path(resource_path))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error": {"code": "ResourceNotFound", "message": "not found"}
        })))
        .up_to_n_times(times)
        .mount(server)
        .await;
}
