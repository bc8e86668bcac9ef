//! The Azure provider: routes protocol calls to resources and data sources.

use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{info, instrument};

use crate::azure::ArmClient;
use crate::config::ProviderConfig;
use crate::data_sources::{self, DataSource};
use crate::error::ProviderError;
use crate::locks::NameLocks;
use crate::plan;
use crate::resources::{self, Clients, Resource};
use crate::schema::{Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{DiffVerdict, ImportedResource, PlanResult};
use crate::validation;

/// Looks up `ARM_*` fallbacks for the provider configuration.
type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// The `azurerm` provider.
pub struct AzureRmProvider {
    resources: BTreeMap<&'static str, Arc<dyn Resource>>,
    data_sources: BTreeMap<&'static str, Arc<dyn DataSource>>,
    clients: RwLock<Option<Arc<Clients>>>,
    env: EnvLookup,
}

impl Default for AzureRmProvider {
    fn default() -> Self {
        Self::new()
    }
}

impl AzureRmProvider {
    /// A provider reading fallbacks from the process environment.
    pub fn new() -> Self {
        Self::with_env(|var| std::env::var(var).ok())
    }

    /// A provider with a custom environment lookup.
    pub fn with_env<E>(env: E) -> Self
    where
        E: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        Self {
            resources: resources::all().into_iter().map(|r| (r.type_name(), r)).collect(),
            data_sources: data_sources::all().into_iter().map(|d| (d.type_name(), d)).collect(),
            clients: RwLock::new(None),
            env: Arc::new(env),
        }
    }

    fn resource(&self, type_name: &str) -> Result<&Arc<dyn Resource>, ProviderError> {
        self.resources
            .get(type_name)
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }

    fn data_source(&self, type_name: &str) -> Result<&Arc<dyn DataSource>, ProviderError> {
        self.data_sources
            .get(type_name)
            .ok_or_else(|| ProviderError::UnknownResource(type_name.to_string()))
    }

    async fn clients(&self) -> Result<Arc<Clients>, ProviderError> {
        self.clients
            .read()
            .await
            .clone()
            .ok_or_else(|| {
                ProviderError::FailedPrecondition("provider is not configured".to_string())
            })
    }

    fn resolve(&self, config: &Value) -> Result<ProviderConfig, ProviderError> {
        ProviderConfig::resolve(config, |var| (self.env)(var))
    }
}

/// Bound `operation` by `limit`.
async fn bounded<T>(
    limit: Duration,
    what: impl std::fmt::Display,
    operation: impl Future<Output = Result<T, ProviderError>>,
) -> Result<T, ProviderError> {
    tokio::time::timeout(limit, operation).await.map_err(|_| {
        ProviderError::DeadlineExceeded(format!("{} did not finish within {:?}", what, limit))
    })?
}

#[async_trait::async_trait]
impl ProviderService for AzureRmProvider {
    fn schema(&self) -> ProviderSchema {
        let schema = ProviderSchema::new().with_provider_config(ProviderConfig::schema());
        let schema = self
            .resources
            .iter()
            .fold(schema, |schema, (name, resource)| {
                schema.with_resource(*name, resource.schema())
            });
        self.data_sources
            .iter()
            .fold(schema, |schema, (name, data_source)| {
                schema.with_data_source(*name, data_source.schema())
            })
    }

    async fn validate_provider_config(
        &self,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = validation::validate(&ProviderConfig::schema(), &config);
        if diagnostics.is_empty() {
            if let Err(err) = self.resolve(&config) {
                diagnostics.push(Diagnostic::error(err.message()));
            }
        }
        Ok(diagnostics)
    }

    #[instrument(skip_all)]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let settings = match self.resolve(&config) {
            Ok(settings) => settings,
            Err(err) => return Ok(vec![Diagnostic::error(err.message())]),
        };
        let arm = match ArmClient::new(
            settings.resource_manager_endpoint.clone(),
            settings.credential.clone(),
            settings.operation_poll_interval,
        ) {
            Ok(arm) => arm,
            Err(err) => {
                return Ok(vec![Diagnostic::error("building the Resource Manager client")
                    .with_detail(err.to_string())])
            }
        };

        info!(
            subscription_id = %settings.subscription_id,
            endpoint = %settings.resource_manager_endpoint,
            "Provider configured"
        );
        *self.clients.write().await = Some(Arc::new(Clients {
            arm,
            locks: NameLocks::new(),
            subscription_id: settings.subscription_id,
        }));
        Ok(vec![])
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let mut diagnostics = validation::validate(&resource.schema(), &config);
        diagnostics.extend(resource.validate(&config));
        Ok(diagnostics)
    }

    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let current = resource.schema().version as i64;
        if version == current {
            Ok(state)
        } else {
            Err(ProviderError::FailedPrecondition(format!(
                "{} state has schema version {}, this provider only understands version {}",
                resource_type, version, current
            )))
        }
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let resource = self.resource(resource_type)?;
        let mut result = plan::plan(&resource.schema(), prior_state.as_ref(), proposed_state);

        if let Some(prior) = prior_state.as_ref().filter(|p| !p.is_null()) {
            let updating = !result.planned_state.is_null() && !result.changes.is_empty();
            if updating
                && !result.requires_replace
                && resource.customize_diff(prior, &result.planned_state)? == DiffVerdict::Replace
            {
                result.requires_replace = true;
            }
        }
        Ok(result)
    }

    #[instrument(skip(self, planned_state))]
    async fn create(
        &self,
        resource_type: &str,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let clients = self.clients().await?;
        let what = format!("creating {}", resource_type);
        bounded(resource.timeouts().create, what, resource.create(&clients, planned_state)).await
    }

    #[instrument(skip(self, current_state))]
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let clients = self.clients().await?;
        let what = format!("reading {}", resource_type);
        let state = bounded(
            resource.timeouts().read,
            what,
            resource.read(&clients, current_state),
        )
        .await?;
        Ok(state.unwrap_or(Value::Null))
    }

    #[instrument(skip(self, prior_state, planned_state))]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let resource = self.resource(resource_type)?;
        let clients = self.clients().await?;
        let what = format!("updating {}", resource_type);
        bounded(
            resource.timeouts().update,
            what,
            resource.update(&clients, prior_state, planned_state),
        )
        .await
    }

    #[instrument(skip(self, current_state))]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let resource = self.resource(resource_type)?;
        let clients = self.clients().await?;
        let what = format!("deleting {}", resource_type);
        bounded(resource.timeouts().delete, what, resource.delete(&clients, current_state)).await
    }

    #[instrument(skip(self))]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let resource = self.resource(resource_type)?;
        let clients = self.clients().await?;
        let what = format!("importing {}", resource_type);
        let state = bounded(resource.timeouts().read, what, resource.import(&clients, id)).await?;
        Ok(vec![ImportedResource::new(resource_type, state)])
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        Ok(validation::validate(&data_source.schema(), &config))
    }

    #[instrument(skip(self, config))]
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let data_source = self.data_source(data_source_type)?;
        let clients = self.clients().await?;
        data_source.read(&clients, config).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const NAMESPACE: &str =
        "/subscriptions/sub/resourceGroups/rg1/providers/Microsoft.EventHub/namespaces/ns";

    fn provider() -> AzureRmProvider {
        AzureRmProvider::with_env(|_| None)
    }

    #[test]
    fn test_schema_lists_everything() {
        let schema = provider().schema();
        assert_eq!(schema.resources.len(), 9);
        assert_eq!(schema.data_sources.len(), 3);
        assert!(schema.resources.contains_key("azurerm_eventhub_namespace"));
        assert!(schema.data_sources.contains_key("azurerm_digital_twins_instance"));
    }

    #[tokio::test]
    async fn test_unknown_type() {
        let err = provider()
            .validate_resource_config("azurerm_storage_account", json!({}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::UnknownResource(_)));
    }

    #[tokio::test]
    async fn test_operations_require_configure() {
        let err = provider()
            .read("azurerm_eventhub", json!({"id": "x"}))
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::FailedPrecondition(_)));
    }

    #[tokio::test]
    async fn test_configure_reports_missing_credentials() {
        let diagnostics = provider()
            .configure(json!({"subscription_id": "sub"}))
            .await
            .unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert!(diagnostics[0].summary.contains("use_msi"));
    }

    #[tokio::test]
    async fn test_configure_uses_environment() {
        let provider = AzureRmProvider::with_env(|var| match var {
            "ARM_SUBSCRIPTION_ID" => Some("sub".to_string()),
            "ARM_USE_MSI" => Some("true".to_string()),
            _ => None,
        });
        assert!(provider.configure(json!({})).await.unwrap().is_empty());
        assert_eq!(provider.clients().await.unwrap().subscription_id, "sub");
    }

    #[tokio::test]
    async fn test_upgrade_accepts_only_current_version() {
        let provider = provider();
        let state = json!({"id": "x"});
        assert_eq!(
            provider
                .upgrade_resource_state("azurerm_eventhub", 0, state.clone())
                .await
                .unwrap(),
            state
        );
        assert!(provider
            .upgrade_resource_state("azurerm_eventhub", 1, state)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_plan_applies_customize_diff() {
        let provider = provider();
        let prior = json!({
            "id": format!("{}/eventhubs/hub", NAMESPACE),
            "name": "hub",
            "namespace_id": NAMESPACE,
            "partition_count": 4,
            "message_retention": 1,
            "status": "Active"
        });
        let mut proposed = prior.clone();
        proposed["partition_count"] = json!(2);

        let result = provider
            .plan("azurerm_eventhub", Some(prior.clone()), proposed.clone(), proposed)
            .await
            .unwrap();
        assert!(result.requires_replace);

        let mut grown = prior.clone();
        grown["partition_count"] = json!(8);
        let result = provider
            .plan("azurerm_eventhub", Some(prior), grown.clone(), grown)
            .await
            .unwrap();
        assert!(!result.requires_replace);
        assert_eq!(result.changes.len(), 1);
    }

    #[tokio::test]
    async fn test_validate_resource_config_runs_resource_checks() {
        let diagnostics = provider()
            .validate_resource_config(
                "azurerm_eventhub_namespace_authorization_rule",
                json!({
                    "name": "rule",
                    "namespace_name": "acctest-ns1",
                    "resource_group_name": "rg1",
                    "manage": true
                }),
            )
            .await
            .unwrap();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("manage"));
    }
}
