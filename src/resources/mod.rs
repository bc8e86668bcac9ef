//! Managed resources.
//!
//! Each resource owns its schema, its configuration checks and the mapping
//! between state and the ARM payload. Everything a resource needs to talk to
//! Azure arrives through [`Clients`].

use std::fmt::Display;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{json, Value};

use crate::azure::ArmClient;
use crate::error::ProviderError;
use crate::locks::NameLocks;
use crate::schema::{Diagnostic, Schema};
use crate::types::{DiffVerdict, Timeouts};

pub mod digital_twins_endpoint_eventhub;
pub mod digital_twins_instance;
pub mod eventhub;
pub mod eventhub_authorization_rule;
pub mod eventhub_consumer_group;
pub mod eventhub_namespace;
pub mod eventhub_namespace_authorization_rule;
pub mod eventhub_namespace_disaster_recovery_config;
pub mod eventhub_namespace_schema_group;
pub mod validate;

pub(crate) mod authorization_rule;

/// Lock kind for operations inside a namespace.
pub const NAMESPACE_LOCK: &str = "azurerm_eventhub_namespace";
/// Lock kind for operations inside an Event Hub.
pub const EVENTHUB_LOCK: &str = "azurerm_eventhub";
/// Lock kind for operations inside a Digital Twins instance.
pub const DIGITAL_TWINS_LOCK: &str = "azurerm_digital_twins_instance";

/// Shared, configured handles every resource operation receives.
#[derive(Clone)]
pub struct Clients {
    /// Authenticated Resource Manager client.
    pub arm: ArmClient,
    /// Locks on shared parents.
    pub locks: NameLocks,
    /// Subscription new resources are created in.
    pub subscription_id: String,
}

/// A managed resource type.
#[async_trait]
pub trait Resource: Send + Sync {
    /// The type name, e.g. `azurerm_eventhub_namespace`.
    fn type_name(&self) -> &'static str;

    /// The resource schema.
    fn schema(&self) -> Schema;

    /// Upper bounds for each operation.
    fn timeouts(&self) -> Timeouts {
        Timeouts::default()
    }

    /// Checks beyond what the schema expresses.
    fn validate(&self, _config: &Value) -> Vec<Diagnostic> {
        vec![]
    }

    /// Decide whether a planned update can be applied in place.
    fn customize_diff(
        &self,
        _prior: &Value,
        _planned: &Value,
    ) -> Result<DiffVerdict, ProviderError> {
        Ok(DiffVerdict::InPlace)
    }

    /// Create the remote object and return the refreshed state.
    async fn create(&self, clients: &Clients, planned: Value) -> Result<Value, ProviderError>;

    /// Refresh state. `None` when the remote object no longer exists.
    ///
    /// Only `id` is guaranteed to be set in `state`; everything else is
    /// recovered from the ID and the remote object.
    async fn read(&self, clients: &Clients, state: Value) -> Result<Option<Value>, ProviderError>;

    /// Apply a planned in-place change and return the refreshed state.
    async fn update(
        &self,
        clients: &Clients,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete the remote object.
    async fn delete(&self, clients: &Clients, state: Value) -> Result<(), ProviderError>;

    /// Parse an import ID into its canonical form.
    fn canonical_id(&self, id: &str) -> Result<String, ProviderError>;

    /// Read an existing remote object by ID.
    async fn import(&self, clients: &Clients, id: &str) -> Result<Value, ProviderError> {
        let id = self.canonical_id(id)?;
        self.read(clients, json!({ "id": id }))
            .await?
            .ok_or_else(|| {
                ProviderError::NotFound(format!("{} {:?} does not exist", self.type_name(), id))
            })
    }
}

/// All managed resources.
pub fn all() -> Vec<Arc<dyn Resource>> {
    vec![
        Arc::new(digital_twins_instance::DigitalTwinsInstanceResource),
        Arc::new(digital_twins_endpoint_eventhub::DigitalTwinsEndpointEventHubResource),
        Arc::new(eventhub_namespace::EventHubNamespaceResource),
        Arc::new(eventhub::EventHubResource),
        Arc::new(eventhub_consumer_group::ConsumerGroupResource),
        Arc::new(eventhub_namespace_authorization_rule::NamespaceAuthorizationRuleResource),
        Arc::new(eventhub_authorization_rule::EventHubAuthorizationRuleResource),
        Arc::new(eventhub_namespace_disaster_recovery_config::DisasterRecoveryConfigResource),
        Arc::new(eventhub_namespace_schema_group::SchemaGroupResource),
    ]
}

/// Decode a state or config value into a resource model.
///
/// Unset attributes arrive as `null`; they are dropped first so that
/// `#[serde(default)]` applies to them.
pub(crate) fn from_state<T: DeserializeOwned>(state: Value) -> Result<T, ProviderError> {
    Ok(serde_json::from_value(strip_nulls(state))?)
}

fn strip_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(strip_nulls).collect()),
        other => other,
    }
}

/// Encode a resource model as state.
pub(crate) fn to_state<T: Serialize>(model: &T) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(model)?)
}

/// Decode an ARM response body.
pub(crate) fn from_body<T: DeserializeOwned>(body: Value) -> Result<T, ProviderError> {
    serde_json::from_value(body)
        .map_err(|e| ProviderError::Internal(format!("decoding ARM response: {}", e)))
}

/// The `id` attribute of a state value.
pub(crate) fn state_id(state: &Value) -> Result<&str, ProviderError> {
    state
        .get("id")
        .and_then(Value::as_str)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| ProviderError::Internal("state has no `id`".to_string()))
}

/// The error returned when create finds the object already present.
pub(crate) fn requires_import(id: impl Display) -> ProviderError {
    ProviderError::AlreadyExists(format!(
        "A resource with the ID \"{}\" already exists - to be managed via Hemmer this resource \
         needs to be imported into the State.",
        id
    ))
}

/// Azure reports locations as `westeurope` whatever the user wrote.
pub(crate) fn normalize_location(location: &str) -> String {
    location
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_lowercase()
}

pub(crate) fn default_true() -> bool {
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_type_names_are_unique() {
        let resources = all();
        let names: HashSet<&str> = resources.iter().map(|r| r.type_name()).collect();
        assert_eq!(names.len(), resources.len());
        assert_eq!(resources.len(), 9);
    }

    #[test]
    fn test_every_schema_exposes_id() {
        for resource in all() {
            let schema = resource.schema();
            let id = schema
                .block
                .attributes
                .get("id")
                .unwrap_or_else(|| panic!("{} has no id", resource.type_name()));
            assert!(id.flags.computed);
        }
    }

    #[test]
    fn test_normalize_location() {
        assert_eq!(normalize_location("West Europe"), "westeurope");
        assert_eq!(normalize_location("eastus2"), "eastus2");
    }

    #[test]
    fn test_requires_import_message() {
        let err = requires_import("/subscriptions/sub/resourceGroups/rg");
        assert_eq!(
            err.message(),
            "A resource with the ID \"/subscriptions/sub/resourceGroups/rg\" already exists - to \
             be managed via Hemmer this resource needs to be imported into the State."
        );
    }

    #[test]
    fn test_from_state_treats_null_as_unset() {
        #[derive(serde::Deserialize)]
        struct Model {
            #[serde(default)]
            tags: std::collections::BTreeMap<String, String>,
            #[serde(default)]
            blocks: Vec<Value>,
        }
        let model: Model = from_state(json!({"tags": null, "blocks": [{"a": null}]})).unwrap();
        assert!(model.tags.is_empty());
        assert_eq!(model.blocks, vec![json!({})]);
    }

    #[test]
    fn test_state_id() {
        assert_eq!(state_id(&json!({"id": "x"})).unwrap(), "x");
        assert!(state_id(&json!({"id": ""})).is_err());
        assert!(state_id(&json!({})).is_err());
    }
}
