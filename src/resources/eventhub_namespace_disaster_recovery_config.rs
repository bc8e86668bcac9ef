//! `azurerm_eventhub_namespace_disaster_recovery_config`
//!
//! A Geo-DR alias pairs a primary namespace with a secondary one. ARM
//! refuses most changes while the pairing replicates, so updates and
//! deletes break the pairing first and wait for the primary to settle.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::instrument;

use super::{
    from_body, from_state, requires_import, state_id, to_state, validate, Clients, Resource,
    NAMESPACE_LOCK,
};
use crate::azure::eventhub::{DisasterRecoveryConfig, DisasterRecoveryConfigProperties, API_VERSION};
use crate::azure::id::{DisasterRecoveryConfigId, NamespaceId};
use crate::azure::ArmClient;
use crate::error::{ErrorContext, ProviderError};
use crate::retry::{retry_until, RetryError};
use crate::schema::{Attribute, Schema};

const ROLE_PRIMARY: &str = "Primary";
const ROLE_PRIMARY_NOT_REPLICATING: &str = "PrimaryNotReplicating";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DisasterRecoveryConfigModel {
    #[serde(default)]
    id: Option<String>,
    name: String,
    namespace_name: String,
    resource_group_name: String,
    partner_namespace_id: String,
}

async fn get_config(
    arm: &ArmClient,
    path: &str,
) -> Result<Option<DisasterRecoveryConfigProperties>, ProviderError> {
    arm.get(path, API_VERSION)
        .await?
        .map(|body| from_body::<DisasterRecoveryConfig>(body).map(|config| config.properties))
        .transpose()
}

/// Poll until `done` accepts the alias properties.
async fn wait_for(
    arm: &ArmClient,
    path: &str,
    timeout: Duration,
    waiting_for: &str,
    done: fn(&DisasterRecoveryConfigProperties) -> bool,
) -> Result<(), ProviderError> {
    retry_until(timeout, arm.poll_interval(), || async move {
        match get_config(arm, path).await {
            Ok(Some(properties)) if done(&properties) => Ok(()),
            Ok(Some(properties)) => {
                Err(RetryError::Retryable(ProviderError::FailedPrecondition(format!(
                    "waiting for {}: provisioning state {:?}, role {:?}",
                    waiting_for, properties.provisioning_state, properties.role
                ))))
            },
            Ok(None) => Err(RetryError::NonRetryable(ProviderError::NotFound(format!(
                "Disaster Recovery Config {:?} disappeared",
                path
            )))),
            Err(err) => Err(RetryError::NonRetryable(err)),
        }
    })
    .await
}

fn succeeded(properties: &DisasterRecoveryConfigProperties) -> bool {
    properties
        .provisioning_state
        .as_deref()
        .is_some_and(|state| state.eq_ignore_ascii_case("Succeeded"))
}

fn not_replicating(properties: &DisasterRecoveryConfigProperties) -> bool {
    properties
        .role
        .as_deref()
        .is_some_and(|role| role.eq_ignore_ascii_case(ROLE_PRIMARY_NOT_REPLICATING))
}

/// A Geo-DR alias on an Event Hubs namespace.
pub struct DisasterRecoveryConfigResource;

impl DisasterRecoveryConfigResource {
    async fn pair(
        &self,
        clients: &Clients,
        id: &DisasterRecoveryConfigId,
        partner_namespace_id: &str,
        timeout: Duration,
    ) -> Result<(), ProviderError> {
        let path = id.to_string();
        let body = DisasterRecoveryConfig {
            properties: DisasterRecoveryConfigProperties {
                partner_namespace: Some(partner_namespace_id.to_string()),
                ..Default::default()
            },
        };
        clients.arm.put(&path, API_VERSION, &body).await?;
        wait_for(&clients.arm, &path, timeout, "pairing to complete", succeeded).await
    }

    async fn break_pairing(
        &self,
        clients: &Clients,
        id: &DisasterRecoveryConfigId,
        timeout: Duration,
    ) -> Result<(), ProviderError> {
        let path = id.to_string();
        clients
            .arm
            .post(&format!("{}/breakPairing", path), API_VERSION, None)
            .await
            .context("breaking the pairing")?;
        wait_for(&clients.arm, &path, timeout, "the pairing to break", not_replicating).await
    }

    async fn refresh(
        &self,
        clients: &Clients,
        id: &DisasterRecoveryConfigId,
    ) -> Result<Value, ProviderError> {
        self.read(clients, json!({ "id": id.to_string() }))
            .await?
            .ok_or_else(|| {
                ProviderError::NotFound(format!(
                    "Disaster Recovery Config {:?} disappeared",
                    id.to_string()
                ))
            })
    }
}

#[async_trait]
impl Resource for DisasterRecoveryConfigResource {
    fn type_name(&self) -> &'static str {
        "azurerm_eventhub_namespace_disaster_recovery_config"
    }

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Manages a Disaster Recovery Config for an Event Hubs namespace.")
            .with_id()
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .validated_by(validate::disaster_recovery_alias),
            )
            .with_attribute(
                "namespace_name",
                Attribute::required_string()
                    .with_force_new()
                    .validated_by(validate::eventhub_namespace_name),
            )
            .with_attribute("resource_group_name", Attribute::required_string().with_force_new())
            .with_attribute(
                "partner_namespace_id",
                Attribute::required_string()
                    .validated_by(NamespaceId::validate)
                    .with_description("The ID of the secondary namespace to replicate to."),
            )
    }

    #[instrument(skip_all)]
    async fn create(&self, clients: &Clients, planned: Value) -> Result<Value, ProviderError> {
        let model: DisasterRecoveryConfigModel = from_state(planned)?;
        let id = DisasterRecoveryConfigId::new(
            &clients.subscription_id,
            &model.resource_group_name,
            &model.namespace_name,
            &model.name,
        );

        let existing = clients
            .arm
            .get(&id.to_string(), API_VERSION)
            .await
            .with_context(|| {
                format!(
                    "checking for presence of existing Disaster Recovery Config {:?}",
                    id.to_string()
                )
            })?;
        if existing.is_some() {
            return Err(requires_import(&id));
        }

        {
            let _namespace = clients.locks.lock(NAMESPACE_LOCK, &id.namespace_name).await;
            self.pair(clients, &id, &model.partner_namespace_id, self.timeouts().create)
                .await
                .with_context(|| {
                    format!("creating Disaster Recovery Config {:?}", id.to_string())
                })?;
        }
        self.refresh(clients, &id).await
    }

    async fn read(&self, clients: &Clients, state: Value) -> Result<Option<Value>, ProviderError> {
        let id = DisasterRecoveryConfigId::parse(state_id(&state)?)?;
        let Some(properties) = get_config(&clients.arm, &id.to_string())
            .await
            .with_context(|| format!("retrieving Disaster Recovery Config {:?}", id.to_string()))?
        else {
            tracing::info!(
                id = %id,
                "Disaster Recovery Config was not found - removing from state"
            );
            return Ok(None);
        };

        let partner_namespace_id = properties
            .partner_namespace
            .map(|raw| NamespaceId::parse(&raw).map(|id| id.to_string()).unwrap_or(raw))
            .unwrap_or_default();
        to_state(&DisasterRecoveryConfigModel {
            id: Some(id.to_string()),
            name: id.alias,
            namespace_name: id.namespace_name,
            resource_group_name: id.resource_group_name,
            partner_namespace_id,
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
        let id = DisasterRecoveryConfigId::parse(state_id(&prior)?)?;
        let model: DisasterRecoveryConfigModel = from_state(planned)?;
        let timeout = self.timeouts().update;

        {
            let _namespace = clients.locks.lock(NAMESPACE_LOCK, &id.namespace_name).await;
            self.break_pairing(clients, &id, timeout)
                .await
                .with_context(|| {
                    format!("updating Disaster Recovery Config {:?}", id.to_string())
                })?;
            self.pair(clients, &id, &model.partner_namespace_id, timeout)
                .await
                .with_context(|| {
                    format!("updating Disaster Recovery Config {:?}", id.to_string())
                })?;
        }
        self.refresh(clients, &id).await
    }

    #[instrument(skip_all)]
    async fn delete(&self, clients: &Clients, state: Value) -> Result<(), ProviderError> {
        let id = DisasterRecoveryConfigId::parse(state_id(&state)?)?;
        let path = id.to_string();
        let timeout = self.timeouts().delete;
        let _namespace = clients.locks.lock(NAMESPACE_LOCK, &id.namespace_name).await;

        let Some(properties) = get_config(&clients.arm, &path).await? else {
            return Ok(());
        };
        if properties
            .role
            .as_deref()
            .is_some_and(|role| role.eq_ignore_ascii_case(ROLE_PRIMARY))
        {
            self.break_pairing(clients, &id, timeout)
                .await
                .with_context(|| format!("deleting Disaster Recovery Config {:?}", path))?;
        }

        clients
            .arm
            .delete_and_wait(&path, API_VERSION)
            .await
            .with_context(|| format!("deleting Disaster Recovery Config {:?}", path))?;

        let path = path.as_str();
        let arm = &clients.arm;
        retry_until(timeout, arm.poll_interval(), || async move {
            match arm.get(path, API_VERSION).await {
                Ok(None) => Ok(()),
                Ok(Some(_)) => Err(RetryError::Retryable(ProviderError::FailedPrecondition(format!(
                    "Disaster Recovery Config {:?} still exists",
                    path
                )))),
                Err(err) => Err(RetryError::NonRetryable(err.into())),
            }
        })
        .await
        .with_context(|| format!("waiting for deletion of Disaster Recovery Config {:?}", path))
    }

    fn canonical_id(&self, id: &str) -> Result<String, ProviderError> {
        Ok(DisasterRecoveryConfigId::parse(id)?.to_string())
    }
}
