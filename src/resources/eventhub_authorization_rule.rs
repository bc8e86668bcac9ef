//! `azurerm_eventhub_authorization_rule`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::instrument;

use super::authorization_rule::{self, Rights, RuleKeys};
use super::{
    from_state, state_id, to_state, validate, Clients, Resource, EVENTHUB_LOCK, NAMESPACE_LOCK,
};
use crate::azure::eventhub::API_VERSION;
use crate::azure::id::EventHubAuthorizationRuleId;
use crate::error::{ErrorContext, ProviderError};
use crate::locks::NameLocks;
use crate::schema::{Attribute, Diagnostic, Schema};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct EventHubAuthorizationRuleModel {
    #[serde(default)]
    id: Option<String>,
    name: String,
    namespace_name: String,
    eventhub_name: String,
    resource_group_name: String,
    #[serde(flatten)]
    rights: Rights,
    #[serde(flatten)]
    keys: RuleKeys,
}

/// Shared access policy on a single Event Hub.
pub struct EventHubAuthorizationRuleResource;

/// Writers take the Event Hub lock before the namespace lock.
async fn lock_parents(
    locks: &NameLocks,
    id: &EventHubAuthorizationRuleId,
) -> (tokio::sync::OwnedMutexGuard<()>, tokio::sync::OwnedMutexGuard<()>) {
    let eventhub = locks.lock(EVENTHUB_LOCK, &id.eventhub_name).await;
    let namespace = locks.lock(NAMESPACE_LOCK, &id.namespace_name).await;
    (eventhub, namespace)
}

#[async_trait]
impl Resource for EventHubAuthorizationRuleResource {
    fn type_name(&self) -> &'static str {
        "azurerm_eventhub_authorization_rule"
    }

    fn schema(&self) -> Schema {
        authorization_rule::schema()
            .with_description("Manages an Authorization Rule for an Event Hub.")
            .with_attribute(
                "eventhub_name",
                Attribute::required_string()
                    .with_force_new()
                    .validated_by(validate::eventhub_name),
            )
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        authorization_rule::validate_config(config)
    }

    #[instrument(skip_all)]
    async fn create(&self, clients: &Clients, planned: Value) -> Result<Value, ProviderError> {
        let model: EventHubAuthorizationRuleModel = from_state(planned)?;
        let id = EventHubAuthorizationRuleId::new(
            &clients.subscription_id,
            &model.resource_group_name,
            &model.namespace_name,
            &model.eventhub_name,
            &model.name,
        );

        {
            let _locks = lock_parents(&clients.locks, &id).await;
            authorization_rule::create(
                clients,
                &id.to_string(),
                model.rights,
                self.timeouts().create,
            )
            .await?;
        }

        self.read(clients, json!({ "id": id.to_string() }))
            .await?
            .ok_or_else(|| {
                ProviderError::NotFound(format!(
                    "Authorization Rule {:?} disappeared",
                    id.to_string()
                ))
            })
    }

    async fn read(&self, clients: &Clients, state: Value) -> Result<Option<Value>, ProviderError> {
        let id = EventHubAuthorizationRuleId::parse(state_id(&state)?)?;
        let Some((rights, keys)) = authorization_rule::read(clients, &id.to_string()).await? else {
            tracing::info!(id = %id, "Authorization Rule was not found - removing from state");
            return Ok(None);
        };

        to_state(&EventHubAuthorizationRuleModel {
            id: Some(id.to_string()),
            name: id.authorization_rule_name,
            namespace_name: id.namespace_name,
            eventhub_name: id.eventhub_name,
            resource_group_name: id.resource_group_name,
            rights,
            keys,
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
        let id = EventHubAuthorizationRuleId::parse(state_id(&prior)?)?;
        let model: EventHubAuthorizationRuleModel = from_state(planned)?;

        {
            let _locks = lock_parents(&clients.locks, &id).await;
            authorization_rule::put(clients, &id.to_string(), model.rights)
                .await
                .with_context(|| format!("updating Authorization Rule {:?}", id.to_string()))?;
        }

        self.read(clients, json!({ "id": id.to_string() }))
            .await?
            .ok_or_else(|| {
                ProviderError::NotFound(format!(
                    "Authorization Rule {:?} disappeared",
                    id.to_string()
                ))
            })
    }

    #[instrument(skip_all)]
    async fn delete(&self, clients: &Clients, state: Value) -> Result<(), ProviderError> {
        let id = EventHubAuthorizationRuleId::parse(state_id(&state)?)?;
        let _locks = lock_parents(&clients.locks, &id).await;
        clients
            .arm
            .delete_and_wait(&id.to_string(), API_VERSION)
            .await
            .with_context(|| format!("deleting Authorization Rule {:?}", id.to_string()))
    }

    fn canonical_id(&self, id: &str) -> Result<String, ProviderError> {
        Ok(EventHubAuthorizationRuleId::parse(id)?.to_string())
    }
}
