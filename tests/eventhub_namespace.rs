//! Event Hubs namespace lifecycle against a mock Resource Manager.

mod common;

use common::{namespace_id, not_found_times, setup};
use hemmer_provider_azurerm::testing::assert_error_contains;
use hemmer_provider_azurerm::ProviderError;
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TYPE: &str = "azurerm_eventhub_namespace";

fn config() -> Value {
    json!({
        "name": "acctest-ns1",
        "location": "westeurope",
        "resource_group_name": "rg1",
        "sku": "Standard",
        "tags": {"env": "test"}
    })
}

fn namespace_body() -> Value {
    json!({
        "id": namespace_id("acctest-ns1"),
        "name": "acctest-ns1",
        "location": "West Europe",
        "sku": {"name": "Standard", "tier": "Standard", "capacity": 1},
        "tags": {"env": "test"},
        "properties": {
            "provisioningState": "Succeeded",
            "isAutoInflateEnabled": false,
            "disableLocalAuth": false,
            "publicNetworkAccess": "Enabled",
            "minimumTlsVersion": "1.2"
        }
    })
}

async fn mount_namespace(server: &MockServer) {
    let id = namespace_id("acctest-ns1");
    Mock::given(method("GET"))
        .and(path(id.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(namespace_body()))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{}/networkRuleSets/default", id)))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "properties": {
                "defaultAction": "Allow",
                "publicNetworkAccess": "Enabled",
                "trustedServiceAccessEnabled": false,
                "ipRules": [],
                "virtualNetworkRules": []
            }
        })))
        .mount(server)
        .await;
    Mock::given(method("POST"))
        .and(path(format!(
            "{}/authorizationRules/RootManageSharedAccessKey/listKeys",
            id
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "primaryConnectionString": "Endpoint=sb://acctest-ns1/;SharedAccessKey=primary",
            "secondaryConnectionString": "Endpoint=sb://acctest-ns1/;SharedAccessKey=secondary",
            "primaryKey": "primary",
            "secondaryKey": "secondary",
            "keyName": "RootManageSharedAccessKey"
        })))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_namespace_create_read_delete() {
    let (server, tester) = setup().await;
    let id = namespace_id("acctest-ns1");

    not_found_times(&server, &id, 1).await;
    Mock::given(method("PUT"))
        .and(path(id.as_str()))
        .and(body_partial_json(json!({
            "location": "westeurope",
            "sku": {"name": "Standard", "tier": "Standard", "capacity": 1}
        })))
        .respond_with(
            ResponseTemplate::new(201)
                .insert_header(
                    "Azure-AsyncOperation",
                    format!("{}/operations/create-ns", server.uri()).as_str(),
                )
                .set_body_json(json!({"properties": {"provisioningState": "Created"}})),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/operations/create-ns"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "InProgress"})))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/operations/create-ns"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "Succeeded"})))
        .mount(&server)
        .await;
    mount_namespace(&server).await;

    let mut config = config();
    config["location"] = json!("West Europe");
    let state = tester.apply_create(TYPE, config).await.unwrap();
    assert_eq!(state["id"], id.as_str());
    assert_eq!(state["location"], "westeurope");
    assert_eq!(state["sku"], "Standard");
    assert_eq!(state["capacity"], 1);
    assert_eq!(state["maximum_throughput_units"], 0);
    assert_eq!(state["default_primary_key"], "primary");
    assert_eq!(state["network_rulesets"][0]["default_action"], "Allow");
    assert_eq!(state["tags"]["env"], "test");

    let imported = tester.import(TYPE, &id).await.unwrap();
    assert_eq!(imported["name"], "acctest-ns1");
    assert_eq!(imported["resource_group_name"], "rg1");

    server.verify().await;
    server.reset().await;
    common::mount_token(&server).await;
    Mock::given(method("DELETE"))
        .and(path(id.as_str()))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    not_found_times(&server, &id, 1).await;

    tester.apply_delete(TYPE, state).await.unwrap();
}

#[tokio::test]
async fn test_namespace_create_requires_import() {
    let (server, tester) = setup().await;
    mount_namespace(&server).await;
    Mock::given(method("PUT"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let err = tester.apply_create(TYPE, config()).await.unwrap_err();
    assert!(matches!(err.provider_error(), Some(ProviderError::AlreadyExists(_))));
    assert_error_contains(&err, "needs to be imported into the State");
}

#[tokio::test]
async fn test_namespace_gone_is_removed_from_state() {
    let (server, tester) = setup().await;
    let id = namespace_id("acctest-ns1");
    not_found_times(&server, &id, 1).await;

    let state = tester.refresh(TYPE, json!({ "id": id })).await.unwrap();
    assert!(state.is_none());
}

#[tokio::test]
async fn test_namespace_read_without_key_access() {
    let (server, tester) = setup().await;
    let id = namespace_id("acctest-ns1");
    Mock::given(method("POST"))
        .and(path(format!(
            "{}/authorizationRules/RootManageSharedAccessKey/listKeys",
            id
        )))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": {"code": "AuthorizationFailed", "message": "no listKeys permission"}
        })))
        .mount(&server)
        .await;
    mount_namespace(&server).await;

    let state = tester.refresh(TYPE, json!({ "id": id })).await.unwrap().unwrap();
    assert_eq!(state["sku"], "Standard");
    assert!(state["default_primary_key"].is_null());
}

#[tokio::test]
async fn test_namespace_update_sets_network_rules() {
    let (server, tester) = setup().await;
    let id = namespace_id("acctest-ns1");
    mount_namespace(&server).await;
    Mock::given(method("PUT"))
        .and(path(id.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(namespace_body()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PUT"))
        .and(path(format!("{}/networkRuleSets/default", id)))
        .and(body_partial_json(json!({
            "properties": {
                "defaultAction": "Deny",
                "ipRules": [{"ipMask": "10.0.0.0/16", "action": "Allow"}]
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"properties": {}})))
        .expect(1)
        .mount(&server)
        .await;

    let prior = tester.refresh(TYPE, json!({ "id": id })).await.unwrap().unwrap();
    let mut updated = config();
    updated["network_rulesets"] = json!([{
        "default_action": "Deny",
        "public_network_access_enabled": true,
        "ip_rule": [{"ip_mask": "10.0.0.0/16"}]
    }]);
    tester.apply_update(TYPE, prior, updated).await.unwrap();
}

#[tokio::test]
async fn test_namespace_failed_operation_is_reported() {
    let (server, tester) = setup().await;
    let id = namespace_id("acctest-ns1");
    not_found_times(&server, &id, 1).await;
    Mock::given(method("PUT"))
        .and(path(id.as_str()))
        .respond_with(ResponseTemplate::new(201).insert_header(
            "Azure-AsyncOperation",
            format!("{}/operations/create-ns", server.uri()).as_str(),
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/operations/create-ns"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "status": "Failed",
            "error": {"code": "QuotaExceeded", "message": "namespace quota reached"}
        })))
        .mount(&server)
        .await;

    let err = tester.apply_create(TYPE, config()).await.unwrap_err();
    assert_error_contains(&err, "creating Namespace");
    assert_error_contains(&err, "namespace quota reached");
}
