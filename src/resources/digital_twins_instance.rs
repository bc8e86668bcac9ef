//! `azurerm_digital_twins_instance`

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::instrument;

use super::{
    from_body, from_state, normalize_location, requires_import, state_id, to_state, validate,
    Clients, Resource,
};
use crate::azure::digitaltwins::{DigitalTwinsInstance, DigitalTwinsPatch, API_VERSION};
use crate::azure::id::DigitalTwinsInstanceId;
use crate::azure::identity::{self, IdentityModel};
use crate::error::{ErrorContext, ProviderError};
use crate::schema::{Attribute, Diagnostic, Schema};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct DigitalTwinsInstanceModel {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub resource_group_name: String,
    pub location: String,
    #[serde(default)]
    pub identity: Vec<IdentityModel>,
    #[serde(default)]
    pub host_name: Option<String>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
}

/// Fetch an instance. `None` when it is gone.
pub(crate) async fn read_instance(
    clients: &Clients,
    id: &DigitalTwinsInstanceId,
) -> Result<Option<DigitalTwinsInstanceModel>, ProviderError> {
    let Some(body) = clients
        .arm
        .get(&id.to_string(), API_VERSION)
        .await
        .with_context(|| format!("retrieving Digital Twins Instance {:?}", id.to_string()))?
    else {
        return Ok(None);
    };
    let instance: DigitalTwinsInstance = from_body(body)?;

    Ok(Some(DigitalTwinsInstanceModel {
        id: Some(id.to_string()),
        name: id.instance_name.clone(),
        resource_group_name: id.resource_group_name.clone(),
        location: instance.location.as_deref().map(normalize_location).unwrap_or_default(),
        identity: identity::flatten_identity(instance.identity.as_ref()),
        host_name: instance.properties.and_then(|p| p.host_name),
        tags: instance.tags.unwrap_or_default(),
    }))
}

/// An Azure Digital Twins instance.
pub struct DigitalTwinsInstanceResource;

impl DigitalTwinsInstanceResource {
    async fn refresh(
        &self,
        clients: &Clients,
        id: &DigitalTwinsInstanceId,
    ) -> Result<Value, ProviderError> {
        self.read(clients, json!({ "id": id.to_string() }))
            .await?
            .ok_or_else(|| {
                ProviderError::NotFound(format!(
                    "Digital Twins Instance {:?} disappeared",
                    id.to_string()
                ))
            })
    }
}

#[async_trait]
impl Resource for DigitalTwinsInstanceResource {
    fn type_name(&self) -> &'static str {
        "azurerm_digital_twins_instance"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Manages an Azure Digital Twins instance.")
            .with_id()
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .validated_by(validate::digital_twins_instance_name),
            )
            .with_attribute("resource_group_name", Attribute::required_string().with_force_new())
            .with_attribute("location", Attribute::required_string().with_force_new())
            .with_attribute(
                "host_name",
                Attribute::computed_string().with_description("The API endpoint of the instance."),
            )
            .with_attribute("tags", Attribute::tags())
            .with_block("identity", identity::identity_block())
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        config
            .get("identity")
            .and_then(|identity| from_state::<Vec<IdentityModel>>(identity.clone()).ok())
            .map(|identity| identity::validate_identity(&identity))
            .unwrap_or_default()
    }

    #[instrument(skip_all)]
    async fn create(&self, clients: &Clients, planned: Value) -> Result<Value, ProviderError> {
        let model: DigitalTwinsInstanceModel = from_state(planned)?;
        let id = DigitalTwinsInstanceId::new(
            &clients.subscription_id,
            &model.resource_group_name,
            &model.name,
        );

        let existing = clients
            .arm
            .get(&id.to_string(), API_VERSION)
            .await
            .with_context(|| {
                format!(
                    "checking for presence of existing Digital Twins Instance {:?}",
                    id.to_string()
                )
            })?;
        if existing.is_some() {
            return Err(requires_import(&id));
        }

        let body = DigitalTwinsInstance {
            location: Some(normalize_location(&model.location)),
            tags: Some(model.tags),
            identity: identity::expand_identity(&model.identity),
            properties: None,
        };
        clients
            .arm
            .put_and_wait(&id.to_string(), API_VERSION, &body)
            .await
            .with_context(|| format!("creating Digital Twins Instance {:?}", id.to_string()))?;

        self.refresh(clients, &id).await
    }

    async fn read(&self, clients: &Clients, state: Value) -> Result<Option<Value>, ProviderError> {
        let id = DigitalTwinsInstanceId::parse(state_id(&state)?)?;
        match read_instance(clients, &id).await? {
            Some(model) => to_state(&model).map(Some),
            None => {
                tracing::info!(
                    id = %id,
                    "Digital Twins Instance was not found - removing from state"
                );
                Ok(None)
            }
        }
    }

    /// Only tags and identity change in place.
    #[instrument(skip_all)]
    async fn update(
        &self,
        clients: &Clients,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let id = DigitalTwinsInstanceId::parse(state_id(&prior)?)?;
        let model: DigitalTwinsInstanceModel = from_state(planned)?;

        let patch = DigitalTwinsPatch {
            tags: Some(model.tags),
            identity: Some(
                identity::expand_identity(&model.identity).unwrap_or_else(identity::no_identity),
            ),
        };
        clients
            .arm
            .patch_and_wait(&id.to_string(), API_VERSION, &patch)
            .await
            .with_context(|| format!("updating Digital Twins Instance {:?}", id.to_string()))?;

        self.refresh(clients, &id).await
    }

    #[instrument(skip_all)]
    async fn delete(&self, clients: &Clients, state: Value) -> Result<(), ProviderError> {
        let id = DigitalTwinsInstanceId::parse(state_id(&state)?)?;
        clients
            .arm
            .delete_and_wait(&id.to_string(), API_VERSION)
            .await
            .with_context(|| format!("deleting Digital Twins Instance {:?}", id.to_string()))
    }

    fn canonical_id(&self, id: &str) -> Result<String, ProviderError> {
        Ok(DigitalTwinsInstanceId::parse(id)?.to_string())
    }
}
