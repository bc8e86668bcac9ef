//! `azurerm_digital_twins_endpoint_eventhub`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::instrument;

use super::{
    from_body, from_state, requires_import, state_id, to_state, validate, Clients, Resource,
    DIGITAL_TWINS_LOCK,
};
use crate::azure::digitaltwins::{
    Endpoint, EndpointProperties, API_VERSION, ENDPOINT_TYPE_EVENT_HUB,
};
use crate::azure::id::{DigitalTwinsEndpointId, DigitalTwinsInstanceId};
use crate::error::{ErrorContext, ProviderError};
use crate::schema::{Attribute, Schema};

const AUTHENTICATION_KEY_BASED: &str = "KeyBased";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct EndpointModel {
    #[serde(default)]
    id: Option<String>,
    name: String,
    digital_twins_id: String,
    // ARM never returns secrets; these always come from configuration or prior state.
    #[serde(default)]
    eventhub_primary_connection_string: Option<String>,
    #[serde(default)]
    eventhub_secondary_connection_string: Option<String>,
    #[serde(default)]
    dead_letter_storage_secret: Option<String>,
}

impl EndpointModel {
    fn expand(&self) -> Endpoint {
        Endpoint {
            properties: EndpointProperties {
                endpoint_type: ENDPOINT_TYPE_EVENT_HUB.to_string(),
                authentication_type: Some(AUTHENTICATION_KEY_BASED.to_string()),
                connection_string_primary_key: self.eventhub_primary_connection_string.clone(),
                connection_string_secondary_key: self.eventhub_secondary_connection_string.clone(),
                dead_letter_secret: self.dead_letter_storage_secret.clone(),
                provisioning_state: None,
            },
        }
    }
}

/// An Event Hub endpoint of a Digital Twins instance.
pub struct DigitalTwinsEndpointEventHubResource;

impl DigitalTwinsEndpointEventHubResource {
    async fn put(
        &self,
        clients: &Clients,
        id: &DigitalTwinsEndpointId,
        model: &EndpointModel,
    ) -> Result<(), ProviderError> {
        let _instance = clients.locks.lock(DIGITAL_TWINS_LOCK, &id.instance_name).await;
        clients
            .arm
            .put_and_wait(&id.to_string(), API_VERSION, &model.expand())
            .await?;
        Ok(())
    }

    /// Read back, keeping the secrets that were just written.
    async fn refresh(
        &self,
        clients: &Clients,
        model: EndpointModel,
    ) -> Result<Value, ProviderError> {
        let id = model.id.clone().unwrap_or_default();
        self.read(clients, to_state(&model)?)
            .await?
            .ok_or_else(|| {
                ProviderError::NotFound(format!("Digital Twins Endpoint {:?} disappeared", id))
            })
    }
}

#[async_trait]
impl Resource for DigitalTwinsEndpointEventHubResource {
    fn type_name(&self) -> &'static str {
        "azurerm_digital_twins_endpoint_eventhub"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Manages an Event Hub endpoint of a Digital Twins instance.")
            .with_id()
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .validated_by(validate::digital_twins_endpoint_name),
            )
            .with_attribute(
                "digital_twins_id",
                Attribute::required_string()
                    .with_force_new()
                    .validated_by(DigitalTwinsInstanceId::validate),
            )
            .with_attribute(
                "eventhub_primary_connection_string",
                Attribute::required_string().sensitive(),
            )
            .with_attribute(
                "eventhub_secondary_connection_string",
                Attribute::required_string().sensitive(),
            )
            .with_attribute(
                "dead_letter_storage_secret",
                Attribute::optional_string()
                    .sensitive()
                    .with_description("Storage secret URL for dead-lettered events."),
            )
    }

    #[instrument(skip_all)]
    async fn create(&self, clients: &Clients, planned: Value) -> Result<Value, ProviderError> {
        let mut model: EndpointModel = from_state(planned)?;
        let instance = DigitalTwinsInstanceId::parse(&model.digital_twins_id)?;
        let id = DigitalTwinsEndpointId::new(
            instance.subscription_id,
            instance.resource_group_name,
            instance.instance_name,
            &model.name,
        );

        let existing = clients
            .arm
            .get(&id.to_string(), API_VERSION)
            .await
            .with_context(|| {
                format!(
                    "checking for presence of existing Digital Twins Endpoint {:?}",
                    id.to_string()
                )
            })?;
        if existing.is_some() {
            return Err(requires_import(&id));
        }

        self.put(clients, &id, &model)
            .await
            .with_context(|| format!("creating Digital Twins Endpoint {:?}", id.to_string()))?;
        model.id = Some(id.to_string());
        self.refresh(clients, model).await
    }

    async fn read(&self, clients: &Clients, state: Value) -> Result<Option<Value>, ProviderError> {
        let id = DigitalTwinsEndpointId::parse(state_id(&state)?)?;
        // Import passes only `id`, so fall back to a model without secrets.
        let prior: EndpointModel = from_state::<EndpointModel>(state).unwrap_or_default();

        let Some(body) = clients
            .arm
            .get(&id.to_string(), API_VERSION)
            .await
            .with_context(|| format!("retrieving Digital Twins Endpoint {:?}", id.to_string()))?
        else {
            tracing::info!(id = %id, "Digital Twins Endpoint was not found - removing from state");
            return Ok(None);
        };
        let endpoint: Endpoint = from_body(body)?;
        if !endpoint.properties.endpoint_type.eq_ignore_ascii_case(ENDPOINT_TYPE_EVENT_HUB) {
            return Err(ProviderError::InvalidRequest(format!(
                "Digital Twins Endpoint {:?} has endpoint type {:?}, expected {:?}",
                id.to_string(),
                endpoint.properties.endpoint_type,
                ENDPOINT_TYPE_EVENT_HUB
            )));
        }

        to_state(&EndpointModel {
            id: Some(id.to_string()),
            digital_twins_id: id.instance_id().to_string(),
            name: id.endpoint_name,
            eventhub_primary_connection_string: prior.eventhub_primary_connection_string,
            eventhub_secondary_connection_string: prior.eventhub_secondary_connection_string,
            dead_letter_storage_secret: prior.dead_letter_storage_secret,
        })
        .map(Some)
    }

    #[instrument(skip_all)]
    async fn update(
        &self,
        clients: &Clients,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let id = DigitalTwinsEndpointId::parse(state_id(&prior)?)?;
        let mut model: EndpointModel = from_state(planned)?;
        self.put(clients, &id, &model)
            .await
            .with_context(|| format!("updating Digital Twins Endpoint {:?}", id.to_string()))?;
        model.id = Some(id.to_string());
        self.refresh(clients, model).await
    }

    #[instrument(skip_all)]
    async fn delete(&self, clients: &Clients, state: Value) -> Result<(), ProviderError> {
        let id = DigitalTwinsEndpointId::parse(state_id(&state)?)?;
        let _instance = clients.locks.lock(DIGITAL_TWINS_LOCK, &id.instance_name).await;
        clients
            .arm
            .delete_and_wait(&id.to_string(), API_VERSION)
            .await
            .with_context(|| format!("deleting Digital Twins Endpoint {:?}", id.to_string()))
    }

    fn canonical_id(&self, id: &str) -> Result<String, ProviderError> {
        Ok(DigitalTwinsEndpointId::parse(id)?.to_string())
    }
}
