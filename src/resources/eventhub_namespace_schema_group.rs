//! `azurerm_eventhub_namespace_schema_group`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use super::{
    from_body, from_state, requires_import, state_id, to_state, validate, Clients, Resource,
    NAMESPACE_LOCK,
};
use crate::azure::eventhub::{SchemaGroup, SchemaGroupProperties, API_VERSION};
use crate::azure::id::{NamespaceId, SchemaGroupId};
use crate::error::{ErrorContext, ProviderError};
use crate::schema::{Attribute, Schema};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SchemaGroupModel {
    #[serde(default)]
    id: Option<String>,
    name: String,
    namespace_id: String,
    schema_compatibility: String,
    schema_type: String,
}

/// A schema registry group in a namespace.
pub struct SchemaGroupResource;

#[async_trait]
impl Resource for SchemaGroupResource {
    fn type_name(&self) -> &'static str {
        "azurerm_eventhub_namespace_schema_group"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Manages a Schema Group for an Event Hubs namespace.")
            .with_id()
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .validated_by(validate::schema_group_name),
            )
            .with_attribute(
                "namespace_id",
                Attribute::required_string()
                    .with_force_new()
                    .validated_by(NamespaceId::validate),
            )
            .with_attribute(
                "schema_compatibility",
                Attribute::required_string()
                    .with_force_new()
                    .one_of(&["None", "Backward", "Forward"]),
            )
            .with_attribute(
                "schema_type",
                Attribute::required_string()
                    .with_force_new()
                    .one_of(&["Unknown", "Avro", "Json"]),
            )
    }

    async fn create(&self, clients: &Clients, planned: Value) -> Result<Value, ProviderError> {
        let model: SchemaGroupModel = from_state(planned)?;
        let namespace = NamespaceId::parse(&model.namespace_id)?;
        let id = SchemaGroupId::new(
            namespace.subscription_id,
            namespace.resource_group_name,
            namespace.namespace_name,
            &model.name,
        );

        let existing = clients
            .arm
            .get(&id.to_string(), API_VERSION)
            .await
            .with_context(|| {
                format!("checking for presence of existing Schema Group {:?}", id.to_string())
            })?;
        if existing.is_some() {
            return Err(requires_import(&id));
        }

        let body = SchemaGroup {
            properties: SchemaGroupProperties {
                schema_compatibility: Some(model.schema_compatibility),
                schema_type: Some(model.schema_type),
            },
        };
        {
            let _namespace = clients.locks.lock(NAMESPACE_LOCK, &id.namespace_name).await;
            clients
                .arm
                .put_and_wait(&id.to_string(), API_VERSION, &body)
                .await
                .with_context(|| format!("creating Schema Group {:?}", id.to_string()))?;
        }

        self.read(clients, json!({ "id": id.to_string() }))
            .await?
            .ok_or_else(|| {
                ProviderError::NotFound(format!("Schema Group {:?} disappeared", id.to_string()))
            })
    }

    async fn read(&self, clients: &Clients, state: Value) -> Result<Option<Value>, ProviderError> {
        let id = SchemaGroupId::parse(state_id(&state)?)?;
        let Some(body) = clients
            .arm
            .get(&id.to_string(), API_VERSION)
            .await
            .with_context(|| format!("retrieving Schema Group {:?}", id.to_string()))?
        else {
            tracing::info!(id = %id, "Schema Group was not found - removing from state");
            return Ok(None);
        };
        let group: SchemaGroup = from_body(body)?;

        to_state(&SchemaGroupModel {
            id: Some(id.to_string()),
            namespace_id: NamespaceId::new(
                &id.subscription_id,
                &id.resource_group_name,
                &id.namespace_name,
            )
            .to_string(),
            name: id.schema_group_name,
            schema_compatibility: group.properties.schema_compatibility.unwrap_or_default(),
            schema_type: group.properties.schema_type.unwrap_or_default(),
        })
        .map(Some)
    }

    /// Every attribute forces replacement; nothing changes in place.
    async fn update(
        &self,
        clients: &Clients,
        prior: Value,
        _planned: Value,
    ) -> Result<Value, ProviderError> {
        self.read(clients, prior)
            .await?
            .ok_or_else(|| ProviderError::NotFound("Schema Group disappeared".to_string()))
    }

    async fn delete(&self, clients: &Clients, state: Value) -> Result<(), ProviderError> {
        let id = SchemaGroupId::parse(state_id(&state)?)?;
        let _namespace = clients.locks.lock(NAMESPACE_LOCK, &id.namespace_name).await;
        clients
            .arm
            .delete_and_wait(&id.to_string(), API_VERSION)
            .await
            .with_context(|| format!("deleting Schema Group {:?}", id.to_string()))
    }

    fn canonical_id(&self, id: &str) -> Result<String, ProviderError> {
        Ok(SchemaGroupId::parse(id)?.to_string())
    }
}
