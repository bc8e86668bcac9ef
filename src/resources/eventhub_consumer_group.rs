//! `azurerm_eventhub_consumer_group`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{
    from_body, from_state, requires_import, state_id, to_state, validate, Clients, Resource,
    NAMESPACE_LOCK,
};
use crate::azure::eventhub::{ConsumerGroup, ConsumerGroupProperties, API_VERSION};
use crate::azure::id::ConsumerGroupId;
use crate::error::{ErrorContext, ProviderError};
use crate::schema::{Attribute, Schema};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConsumerGroupModel {
    #[serde(default)]
    id: Option<String>,
    name: String,
    namespace_name: String,
    eventhub_name: String,
    resource_group_name: String,
    #[serde(default)]
    user_metadata: Option<String>,
}

/// A consumer group of an Event Hub.
pub struct ConsumerGroupResource;

impl ConsumerGroupResource {
    async fn put(
        &self,
        clients: &Clients,
        id: &ConsumerGroupId,
        model: &ConsumerGroupModel,
    ) -> Result<(), ProviderError> {
        let body = ConsumerGroup {
            properties: ConsumerGroupProperties {
                user_metadata: model.user_metadata.clone(),
            },
        };
        let _namespace = clients.locks.lock(NAMESPACE_LOCK, &id.namespace_name).await;
        clients.arm.put_and_wait(&id.to_string(), API_VERSION, &body).await?;
        Ok(())
    }

    async fn refresh(
        &self,
        clients: &Clients,
        id: &ConsumerGroupId,
    ) -> Result<Value, ProviderError> {
        self.read(clients, json!({ "id": id.to_string() }))
            .await?
            .ok_or_else(|| {
                ProviderError::NotFound(format!("Consumer Group {:?} disappeared", id.to_string()))
            })
    }
}

#[async_trait]
impl Resource for ConsumerGroupResource {
    fn type_name(&self) -> &'static str {
        "azurerm_eventhub_consumer_group"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description(
                "Manages an Event Hubs Consumer Group as a nested resource within an Event Hub.",
            )
            .with_id()
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .validated_by(validate::consumer_group_name),
            )
            .with_attribute(
                "namespace_name",
                Attribute::required_string()
                    .with_force_new()
                    .validated_by(validate::eventhub_namespace_name),
            )
            .with_attribute(
                "eventhub_name",
                Attribute::required_string()
                    .with_force_new()
                    .validated_by(validate::eventhub_name),
            )
            .with_attribute("resource_group_name", Attribute::required_string().with_force_new())
            .with_attribute(
                "user_metadata",
                Attribute::optional_string()
                    .length_between(0, 1024)
                    .with_description("User metadata stored with the consumer group."),
            )
    }

    async fn create(&self, clients: &Clients, planned: Value) -> Result<Value, ProviderError> {
        let model: ConsumerGroupModel = from_state(planned)?;
        let id = ConsumerGroupId::new(
            &clients.subscription_id,
            &model.resource_group_name,
            &model.namespace_name,
            &model.eventhub_name,
            &model.name,
        );

        let existing = clients
            .arm
            .get(&id.to_string(), API_VERSION)
            .await
            .with_context(|| {
                format!("checking for presence of existing Consumer Group {:?}", id.to_string())
            })?;
        if existing.is_some() {
            return Err(requires_import(&id));
        }

        self.put(clients, &id, &model)
            .await
            .with_context(|| format!("creating Consumer Group {:?}", id.to_string()))?;
        self.refresh(clients, &id).await
    }

    async fn read(&self, clients: &Clients, state: Value) -> Result<Option<Value>, ProviderError> {
        let id = ConsumerGroupId::parse(state_id(&state)?)?;
        let Some(body) = clients
            .arm
            .get(&id.to_string(), API_VERSION)
            .await
            .with_context(|| format!("retrieving Consumer Group {:?}", id.to_string()))?
        else {
            tracing::info!(id = %id, "Consumer Group was not found - removing from state");
            return Ok(None);
        };
        let group: ConsumerGroup = from_body(body)?;

        to_state(&ConsumerGroupModel {
            id: Some(id.to_string()),
            name: id.consumer_group_name,
            namespace_name: id.namespace_name,
            eventhub_name: id.eventhub_name,
            resource_group_name: id.resource_group_name,
            user_metadata: group.properties.user_metadata.filter(|m| !m.is_empty()),
        })
        .map(Some)
    }

    async fn update(
        &self,
        clients: &Clients,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let id = ConsumerGroupId::parse(state_id(&prior)?)?;
        let model: ConsumerGroupModel = from_state(planned)?;
        self.put(clients, &id, &model)
            .await
            .with_context(|| format!("updating Consumer Group {:?}", id.to_string()))?;
        self.refresh(clients, &id).await
    }

    async fn delete(&self, clients: &Clients, state: Value) -> Result<(), ProviderError> {
        let id = ConsumerGroupId::parse(state_id(&state)?)?;
        let _namespace = clients.locks.lock(NAMESPACE_LOCK, &id.namespace_name).await;
        clients
            .arm
            .delete_and_wait(&id.to_string(), API_VERSION)
            .await
            .with_context(|| format!("deleting Consumer Group {:?}", id.to_string()))
    }

    fn canonical_id(&self, id: &str) -> Result<String, ProviderError> {
        Ok(ConsumerGroupId::parse(id)?.to_string())
    }
}
