//! `azurerm_eventhub_namespace_authorization_rule`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::instrument;

use super::authorization_rule::{self, Rights, RuleKeys};
use super::{from_state, state_id, to_state, Clients, Resource, NAMESPACE_LOCK};
use crate::azure::eventhub::API_VERSION;
use crate::azure::id::NamespaceAuthorizationRuleId;
use crate::error::{ErrorContext, ProviderError};
use crate::schema::{Diagnostic, Schema};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct NamespaceAuthorizationRuleModel {
    #[serde(default)]
    id: Option<String>,
    name: String,
    namespace_name: String,
    resource_group_name: String,
    #[serde(flatten)]
    rights: Rights,
    #[serde(flatten)]
    keys: RuleKeys,
}

/// Shared access policy on an Event Hub namespace.
pub struct NamespaceAuthorizationRuleResource;

impl NamespaceAuthorizationRuleResource {
    async fn refresh(
        &self,
        clients: &Clients,
        id: &NamespaceAuthorizationRuleId,
    ) -> Result<Value, ProviderError> {
        self.read(clients, json!({ "id": id.to_string() }))
            .await?
            .ok_or_else(|| {
                ProviderError::NotFound(format!(
                    "Authorization Rule {:?} disappeared",
                    id.to_string()
                ))
            })
    }
}

#[async_trait]
impl Resource for NamespaceAuthorizationRuleResource {
    fn type_name(&self) -> &'static str {
        "azurerm_eventhub_namespace_authorization_rule"
    }

    fn schema(&self) -> Schema {
        authorization_rule::schema()
            .with_description("Manages an Authorization Rule for an Event Hub Namespace.")
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        authorization_rule::validate_config(config)
    }

    #[instrument(skip_all)]
    async fn create(&self, clients: &Clients, planned: Value) -> Result<Value, ProviderError> {
        let model: NamespaceAuthorizationRuleModel = from_state(planned)?;
        let id = NamespaceAuthorizationRuleId::new(
            &clients.subscription_id,
            &model.resource_group_name,
            &model.namespace_name,
            &model.name,
        );

        {
            let _namespace = clients.locks.lock(NAMESPACE_LOCK, &id.namespace_name).await;
            authorization_rule::create(
                clients,
                &id.to_string(),
                model.rights,
                self.timeouts().create,
            )
            .await?;
        }

        self.refresh(clients, &id).await
    }

    async fn read(&self, clients: &Clients, state: Value) -> Result<Option<Value>, ProviderError> {
        let id = NamespaceAuthorizationRuleId::parse(state_id(&state)?)?;
        let Some((rights, keys)) = authorization_rule::read(clients, &id.to_string()).await? else {
            tracing::info!(id = %id, "Authorization Rule was not found - removing from state");
            return Ok(None);
        };

        to_state(&NamespaceAuthorizationRuleModel {
            id: Some(id.to_string()),
            name: id.authorization_rule_name,
            namespace_name: id.namespace_name,
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
        let id = NamespaceAuthorizationRuleId::parse(state_id(&prior)?)?;
        let model: NamespaceAuthorizationRuleModel = from_state(planned)?;

        {
            let _namespace = clients.locks.lock(NAMESPACE_LOCK, &id.namespace_name).await;
            authorization_rule::put(clients, &id.to_string(), model.rights)
                .await
                .with_context(|| format!("updating Authorization Rule {:?}", id.to_string()))?;
        }

        self.refresh(clients, &id).await
    }

    #[instrument(skip_all)]
    async fn delete(&self, clients: &Clients, state: Value) -> Result<(), ProviderError> {
        let id = NamespaceAuthorizationRuleId::parse(state_id(&state)?)?;
        let _namespace = clients.locks.lock(NAMESPACE_LOCK, &id.namespace_name).await;
        clients
            .arm
            .delete_and_wait(&id.to_string(), API_VERSION)
            .await
            .with_context(|| format!("deleting Authorization Rule {:?}", id.to_string()))
    }

    fn canonical_id(&self, id: &str) -> Result<String, ProviderError> {
        Ok(NamespaceAuthorizationRuleId::parse(id)?.to_string())
    }
}
