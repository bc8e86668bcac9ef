//! Authorization rules: creation waits until the rule is readable.

mod common;

use common::{namespace_id, not_found_times, setup};
use hemmer_provider_azurerm::testing::assert_error_contains;
use serde_json::{json, Value};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

async fn mount_rule(server: &MockServer, rule_path: &str, rights: Value) {
    Mock::given(method("GET"))
        .and(path(rule_path))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "id": rule_path,
            "properties": {"rights": rights}
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!("{}/listKeys", rule_path)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "primaryKey": "k1",
            "secondaryKey": "k2",
            "primaryConnectionString": "Endpoint=sb://acctest-ns1/;SharedAccessKey=k1",
            "secondaryConnectionString": "Endpoint=sb://acctest-ns1/;SharedAccessKey=k2",
            "aliasPrimaryConnectionString": "Endpoint=sb://alias/;SharedAccessKey=k1"
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_namespace_rule_waits_for_visibility() {
    let (server, tester) = setup().await;
    let rule_path = format!("{}/authorizationRules/send-only", namespace_id("acctest-ns1"));

    // Existence check, then twice more while the new rule propagates.
    not_found_times(&server, &rule_path, 3).await;
    Mock::given(method("PUT"))
        .and(path(rule_path.as_str()))
        .and(body_json(json!({"properties": {"rights": ["Send"]}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "properties": {"rights": ["Send"]}
        })))
        .expect(1)
        .mount(&server)
        .await;
    mount_rule(&server, &rule_path, json!(["Send"])).await;

    let state = tester
        .apply_create(
            "azurerm_eventhub_namespace_authorization_rule",
            json!({
                "name": "send-only",
                "namespace_name": "acctest-ns1",
                "resource_group_name": "rg1",
                "send": true
            }),
        )
        .await
        .unwrap();

    assert_eq!(state["id"], rule_path.as_str());
    assert_eq!(state["send"], true);
    assert_eq!(state["listen"], false);
    assert_eq!(state["manage"], false);
    assert_eq!(state["primary_key"], "k1");
    assert_eq!(
        state["primary_connection_string_alias"],
        "Endpoint=sb://alias/;SharedAccessKey=k1"
    );
    assert!(state["secondary_connection_string_alias"].is_null());
}

#[tokio::test]
async fn test_eventhub_rule_update_changes_rights() {
    let (server, tester) = setup().await;
    let rule_path = format!(
        "{}/eventhubs/hub1/authorizationRules/app",
        namespace_id("acctest-ns1")
    );
    mount_rule(&server, &rule_path, json!(["Listen"])).await;
    Mock::given(method("PUT"))
        .and(path(rule_path.as_str()))
        .and(body_json(json!({"properties": {"rights": ["Listen", "Send", "Manage"]}})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "properties": {"rights": ["Listen", "Send", "Manage"]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let prior = tester
        .import("azurerm_eventhub_authorization_rule", &rule_path)
        .await
        .unwrap();
    assert_eq!(prior["eventhub_name"], "hub1");
    assert_eq!(prior["listen"], true);

    tester
        .apply_update(
            "azurerm_eventhub_authorization_rule",
            prior,
            json!({
                "name": "app",
                "namespace_name": "acctest-ns1",
                "eventhub_name": "hub1",
                "resource_group_name": "rg1",
                "listen": true,
                "send": true,
                "manage": true
            }),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_manage_without_listen_is_rejected() {
    let (_server, tester) = setup().await;
    let err = tester
        .apply_create(
            "azurerm_eventhub_authorization_rule",
            json!({
                "name": "app",
                "namespace_name": "acctest-ns1",
                "eventhub_name": "hub1",
                "resource_group_name": "rg1",
                "manage": true,
                "send": true
            }),
        )
        .await
        .unwrap_err();
    assert_error_contains(&err, "`listen` and `send` must be set to true");
}
