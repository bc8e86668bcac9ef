//! Digital Twins instance and endpoint lifecycles against a mock Resource Manager.

mod common;

use common::{digital_twins_id, not_found_times, setup};
use serde_json::{json, Value};
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn instance_body(state: &str) -> Value {
    json!({
        "id": digital_twins_id("acctest-dt"),
        "name": "acctest-dt",
        "location": "westeurope",
        "tags": {"env": "test"},
        "properties": {
            "hostName": "acctest-dt.api.weu.digitaltwins.azure.net",
            "provisioningState": state
        }
    })
}

async fn mount_instance(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path(digital_twins_id("acctest-dt")))
        .respond_with(ResponseTemplate::new(200).set_body_json(instance_body("Succeeded")))
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_instance_lifecycle() {
    let (server, tester) = setup().await;
    let id = digital_twins_id("acctest-dt");

    not_found_times(&server, &id, 1).await;
    // Provisioning is reported in the body; the instance itself is polled.
    Mock::given(method("PUT"))
        .and(path(id.as_str()))
        .and(body_partial_json(json!({"location": "westeurope", "tags": {"env": "test"}})))
        .respond_with(ResponseTemplate::new(201).set_body_json(instance_body("Provisioning")))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(id.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(instance_body("Updating")))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    mount_instance(&server).await;

    let state = tester
        .apply_create(
            "azurerm_digital_twins_instance",
            json!({
                "name": "acctest-dt",
                "resource_group_name": "rg1",
                "location": "West Europe",
                "tags": {"env": "test"}
            }),
        )
        .await
        .unwrap();
    assert_eq!(state["id"], id.as_str());
    assert_eq!(state["host_name"], "acctest-dt.api.weu.digitaltwins.azure.net");

    Mock::given(method("PATCH"))
        .and(path(id.as_str()))
        .and(body_partial_json(json!({
            "tags": {"env": "prod"},
            "identity": {"type": "None"}
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(instance_body("Succeeded")))
        .expect(1)
        .mount(&server)
        .await;
    tester
        .apply_update(
            "azurerm_digital_twins_instance",
            state.clone(),
            json!({
                "name": "acctest-dt",
                "resource_group_name": "rg1",
                "location": "westeurope",
                "tags": {"env": "prod"}
            }),
        )
        .await
        .unwrap();

    // Deletion is tracked through the Location header.
    Mock::given(method("DELETE"))
        .and(path(id.as_str()))
        .respond_with(
            ResponseTemplate::new(202).insert_header(
                "Location",
                format!("{}/operations/delete-dt", server.uri()).as_str(),
            ),
        )
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/operations/delete-dt"))
        .respond_with(ResponseTemplate::new(202))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/operations/delete-dt"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;
    tester
        .apply_delete("azurerm_digital_twins_instance", state)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_instance_data_source() {
    let (server, tester) = setup().await;
    mount_instance(&server).await;

    let state = tester
        .read_data_source(
            "azurerm_digital_twins_instance",
            json!({"name": "acctest-dt", "resource_group_name": "rg1"}),
        )
        .await
        .unwrap();
    assert_eq!(state["location"], "westeurope");
    assert_eq!(state["tags"]["env"], "test");
}

#[tokio::test]
async fn test_endpoint_keeps_secrets() {
    let (server, tester) = setup().await;
    let instance = digital_twins_id("acctest-dt");
    let endpoint = format!("{}/endpoints/events", instance);

    not_found_times(&server, &endpoint, 1).await;
    Mock::given(method("PUT"))
        .and(path(endpoint.as_str()))
        .and(body_partial_json(json!({
            "properties": {
                "endpointType": "EventHub",
                "authenticationType": "KeyBased",
                "connectionStringPrimaryKey": "Endpoint=sb://hub/;SharedAccessKey=p"
            }
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "properties": {"endpointType": "EventHub", "provisioningState": "Succeeded"}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(endpoint.as_str()))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "properties": {"endpointType": "EventHub", "provisioningState": "Succeeded"}
        })))
        .mount(&server)
        .await;

    let state = tester
        .apply_create(
            "azurerm_digital_twins_endpoint_eventhub",
            json!({
                "name": "events",
                "digital_twins_id": instance,
                "eventhub_primary_connection_string": "Endpoint=sb://hub/;SharedAccessKey=p",
                "eventhub_secondary_connection_string": "Endpoint=sb://hub/;SharedAccessKey=s"
            }),
        )
        .await
        .unwrap();
    assert_eq!(state["id"], endpoint.as_str());
    assert_eq!(state["digital_twins_id"], instance.as_str());
    assert_eq!(
        state["eventhub_secondary_connection_string"],
        "Endpoint=sb://hub/;SharedAccessKey=s"
    );

    let refreshed = tester
        .refresh("azurerm_digital_twins_endpoint_eventhub", state)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(
        refreshed["eventhub_primary_connection_string"],
        "Endpoint=sb://hub/;SharedAccessKey=p"
    );
}
