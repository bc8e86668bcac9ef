//! Data sources: read-only lookups of existing objects by name.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::azure::eventhub::{Eventhub, API_VERSION as EVENTHUB_API_VERSION};
use crate::azure::id::{DigitalTwinsInstanceId, EventHubId, NamespaceId};
use crate::error::{ErrorContext, ProviderError};
use crate::resources::digital_twins_instance::read_instance;
use crate::resources::eventhub_namespace::{computed_attributes, read_namespace};
use crate::resources::{from_body, from_state, to_state, Clients};
use crate::schema::{Attribute, Schema};

/// A read-only data source type.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// The type name, e.g. `azurerm_eventhub`.
    fn type_name(&self) -> &'static str;

    /// The data source schema.
    fn schema(&self) -> Schema;

    /// Look the object up and return its attributes.
    async fn read(&self, clients: &Clients, config: Value) -> Result<Value, ProviderError>;
}

/// All data sources.
pub fn all() -> Vec<Arc<dyn DataSource>> {
    vec![
        Arc::new(EventHubNamespaceDataSource),
        Arc::new(EventHubDataSource),
        Arc::new(DigitalTwinsInstanceDataSource),
    ]
}

fn not_found(kind: &str, id: impl std::fmt::Display) -> ProviderError {
    ProviderError::NotFound(format!("{} {:?} was not found", kind, id.to_string()))
}

#[derive(Debug, Deserialize)]
struct NamespaceLookup {
    name: String,
    resource_group_name: String,
}

/// `data "azurerm_eventhub_namespace"`
pub struct EventHubNamespaceDataSource;

#[async_trait]
impl DataSource for EventHubNamespaceDataSource {
    fn type_name(&self) -> &'static str {
        "azurerm_eventhub_namespace"
    }

    fn schema(&self) -> Schema {
        let mut schema = Schema::v0()
            .with_description("Gets information about an existing Event Hubs namespace.")
            .with_id()
            .with_attribute("name", Attribute::required_string())
            .with_attribute("resource_group_name", Attribute::required_string())
            .with_attribute("location", Attribute::computed_string())
            .with_attribute("sku", Attribute::computed_string())
            .with_attribute("capacity", Attribute::computed_int64())
            .with_attribute("auto_inflate_enabled", Attribute::computed_bool())
            .with_attribute("maximum_throughput_units", Attribute::computed_int64())
            .with_attribute("dedicated_cluster_id", Attribute::computed_string())
            .with_attribute("local_authentication_enabled", Attribute::computed_bool())
            .with_attribute("public_network_access_enabled", Attribute::computed_bool())
            .with_attribute("minimum_tls_version", Attribute::computed_string())
            .with_attribute("tags", Attribute::computed_string_map());
        for (name, attribute) in computed_attributes() {
            schema = schema.with_attribute(name, attribute);
        }
        schema
    }

    async fn read(&self, clients: &Clients, config: Value) -> Result<Value, ProviderError> {
        let lookup: NamespaceLookup = from_state(config)?;
        let id = NamespaceId::new(
            &clients.subscription_id,
            lookup.resource_group_name,
            lookup.name,
        );
        let model = read_namespace(clients, &id)
            .await?
            .ok_or_else(|| not_found("Namespace", &id))?;

        let mut state = to_state(&model)?;
        if let Value::Object(map) = &mut state {
            map.remove("identity");
            map.remove("network_rulesets");
        }
        Ok(state)
    }
}

#[derive(Debug, Deserialize)]
struct EventHubLookup {
    name: String,
    namespace_name: String,
    resource_group_name: String,
}

/// `data "azurerm_eventhub"`
pub struct EventHubDataSource;

#[async_trait]
impl DataSource for EventHubDataSource {
    fn type_name(&self) -> &'static str {
        "azurerm_eventhub"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Gets information about an existing Event Hub.")
            .with_id()
            .with_attribute("name", Attribute::required_string())
            .with_attribute("namespace_name", Attribute::required_string())
            .with_attribute("resource_group_name", Attribute::required_string())
            .with_attribute("partition_count", Attribute::computed_int64())
            .with_attribute("message_retention", Attribute::computed_int64())
            .with_attribute("partition_ids", Attribute::computed_string_set())
            .with_attribute("status", Attribute::computed_string())
    }

    async fn read(&self, clients: &Clients, config: Value) -> Result<Value, ProviderError> {
        let lookup: EventHubLookup = from_state(config)?;
        let id = EventHubId::new(
            &clients.subscription_id,
            &lookup.resource_group_name,
            &lookup.namespace_name,
            &lookup.name,
        );
        let body = clients
            .arm
            .get(&id.to_string(), EVENTHUB_API_VERSION)
            .await
            .with_context(|| format!("retrieving EventHub {:?}", id.to_string()))?
            .ok_or_else(|| not_found("EventHub", &id))?;
        let properties = from_body::<Eventhub>(body)?.properties.unwrap_or_default();

        let mut partition_ids = properties.partition_ids;
        partition_ids.sort();
        Ok(json!({
            "id": id.to_string(),
            "name": lookup.name,
            "namespace_name": lookup.namespace_name,
            "resource_group_name": lookup.resource_group_name,
            "partition_count": properties.partition_count,
            "message_retention": properties.message_retention_in_days,
            "partition_ids": partition_ids,
            "status": properties.status,
        }))
    }
}

/// `data "azurerm_digital_twins_instance"`
pub struct DigitalTwinsInstanceDataSource;

#[async_trait]
impl DataSource for DigitalTwinsInstanceDataSource {
    fn type_name(&self) -> &'static str {
        "azurerm_digital_twins_instance"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Gets information about an existing Digital Twins instance.")
            .with_id()
            .with_attribute("name", Attribute::required_string())
            .with_attribute("resource_group_name", Attribute::required_string())
            .with_attribute("location", Attribute::computed_string())
            .with_attribute("host_name", Attribute::computed_string())
            .with_attribute("tags", Attribute::computed_string_map())
    }

    async fn read(&self, clients: &Clients, config: Value) -> Result<Value, ProviderError> {
        let lookup: NamespaceLookup = from_state(config)?;
        let id = DigitalTwinsInstanceId::new(
            &clients.subscription_id,
            lookup.resource_group_name,
            lookup.name,
        );
        let model = read_instance(clients, &id)
            .await?
            .ok_or_else(|| not_found("Digital Twins Instance", &id))?;

        Ok(json!({
            "id": model.id,
            "name": model.name,
            "resource_group_name": model.resource_group_name,
            "location": model.location,
            "host_name": model.host_name,
            "tags": model.tags,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::azure::client::tests::client_for;
    use crate::locks::NameLocks;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn clients(server: &MockServer) -> Clients {
        Clients {
            arm: client_for(server).await,
            locks: NameLocks::new(),
            subscription_id: "sub".into(),
        }
    }

    #[test]
    fn test_type_names() {
        let names: Vec<&str> = all().iter().map(|d| d.type_name()).collect();
        assert_eq!(
            names,
            vec!["azurerm_eventhub_namespace", "azurerm_eventhub", "azurerm_digital_twins_instance"]
        );
    }

    #[tokio::test]
    async fn test_eventhub_lookup() {
        let server = MockServer::start().await;
        let clients = clients(&server).await;
        Mock::given(method("GET"))
            .and(path(
                "/subscriptions/sub/resourceGroups/rg1/providers/Microsoft.EventHub\
                 /namespaces/acctest-ns1/eventhubs/hub1",
            ))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "properties": {
                    "partitionCount": 2,
                    "messageRetentionInDays": 7,
                    "status": "Active",
                    "partitionIds": ["1", "0"]
                }
            })))
            .mount(&server)
            .await;

        let state = EventHubDataSource
            .read(
                &clients,
                json!({
                    "name": "hub1",
                    "namespace_name": "acctest-ns1",
                    "resource_group_name": "rg1"
                }),
            )
            .await
            .unwrap();
        assert_eq!(state["partition_count"], 2);
        assert_eq!(state["partition_ids"], json!(["0", "1"]));
    }

    #[tokio::test]
    async fn test_missing_instance_is_not_found() {
        let server = MockServer::start().await;
        let clients = clients(&server).await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let err = DigitalTwinsInstanceDataSource
            .read(&clients, json!({"name": "acctest-dt", "resource_group_name": "rg1"}))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
        assert!(err.message().contains(
            "/subscriptions/sub/resourceGroups/rg1/providers/Microsoft.DigitalTwins\
             /digitalTwinsInstances/acctest-dt"
        ));
    }
}
