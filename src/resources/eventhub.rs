//! `azurerm_eventhub`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::instrument;

use super::{
    from_body, from_state, requires_import, state_id, to_state, validate, Clients, Resource,
    NAMESPACE_LOCK,
};
use crate::azure::eventhub::{
    CaptureDescription, CaptureDestination, CaptureDestinationProperties, Eventhub,
    EventhubProperties, API_VERSION,
};
use crate::azure::id::{EventHubId, NamespaceId, StorageAccountId};
use crate::error::{ErrorContext, ProviderError};
use crate::schema::{Attribute, Block, NestedBlock, Schema};
use crate::types::DiffVerdict;

/// The only capture destination Azure supports.
const BLOB_DESTINATION: &str = "EventHubArchive.AzureBlockBlob";

const ARCHIVE_NAME_PLACEHOLDERS: &[&str] = &[
    "{Namespace}",
    "{EventHub}",
    "{PartitionId}",
    "{Year}",
    "{Month}",
    "{Day}",
    "{Hour}",
    "{Minute}",
    "{Second}",
];

fn default_interval() -> i64 {
    300
}

fn default_size_limit() -> i64 {
    314_572_800
}

fn default_status() -> String {
    "Active".to_string()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct EventHubModel {
    #[serde(default)]
    id: Option<String>,
    name: String,
    namespace_id: String,
    partition_count: i64,
    message_retention: i64,
    #[serde(default = "default_status")]
    status: String,
    #[serde(default)]
    capture_description: Vec<CaptureDescriptionModel>,
    #[serde(default)]
    partition_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct CaptureDescriptionModel {
    #[serde(default)]
    enabled: bool,
    encoding: String,
    #[serde(default = "default_interval")]
    interval_in_seconds: i64,
    #[serde(default = "default_size_limit")]
    size_limit_in_bytes: i64,
    #[serde(default)]
    skip_empty_archives: bool,
    #[serde(default)]
    destination: Vec<DestinationModel>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct DestinationModel {
    name: String,
    archive_name_format: String,
    blob_container_name: String,
    storage_account_id: String,
}

/// `archive_name_format` must reference every capture placeholder.
pub fn archive_name_format(value: &str) -> Result<(), String> {
    let missing: Vec<&str> = ARCHIVE_NAME_PLACEHOLDERS
        .iter()
        .copied()
        .filter(|placeholder| !value.contains(placeholder))
        .collect();
    if missing.is_empty() {
        Ok(())
    } else {
        Err(format!(
            "archive_name_format must contain {}, missing {}",
            ARCHIVE_NAME_PLACEHOLDERS.join(", "),
            missing.join(", ")
        ))
    }
}

fn expand(model: &EventHubModel) -> Eventhub {
    let capture_description = model.capture_description.first().map(|capture| CaptureDescription {
        enabled: capture.enabled,
        encoding: Some(capture.encoding.clone()),
        interval_in_seconds: Some(capture.interval_in_seconds),
        size_limit_in_bytes: Some(capture.size_limit_in_bytes),
        skip_empty_archives: Some(capture.skip_empty_archives),
        destination: capture.destination.first().map(|destination| CaptureDestination {
            name: destination.name.clone(),
            properties: Some(CaptureDestinationProperties {
                storage_account_resource_id: Some(destination.storage_account_id.clone()),
                blob_container: Some(destination.blob_container_name.clone()),
                archive_name_format: Some(destination.archive_name_format.clone()),
            }),
        }),
    });

    Eventhub {
        properties: Some(EventhubProperties {
            partition_count: Some(model.partition_count),
            message_retention_in_days: Some(model.message_retention),
            status: Some(model.status.clone()),
            capture_description,
            partition_ids: vec![],
        }),
    }
}

fn flatten_capture(capture: Option<CaptureDescription>) -> Vec<CaptureDescriptionModel> {
    let Some(capture) = capture else {
        return vec![];
    };
    let destination = capture
        .destination
        .map(|destination| {
            let properties = destination.properties.unwrap_or_default();
            DestinationModel {
                name: destination.name,
                archive_name_format: properties.archive_name_format.unwrap_or_default(),
                blob_container_name: properties.blob_container.unwrap_or_default(),
                storage_account_id: properties
                    .storage_account_resource_id
                    .map(|id| {
                        StorageAccountId::parse(&id)
                            .map(|parsed| parsed.to_string())
                            .unwrap_or(id)
                    })
                    .unwrap_or_default(),
            }
        })
        .into_iter()
        .collect();

    vec![CaptureDescriptionModel {
        enabled: capture.enabled,
        encoding: capture.encoding.unwrap_or_default(),
        interval_in_seconds: capture.interval_in_seconds.unwrap_or_else(default_interval),
        size_limit_in_bytes: capture.size_limit_in_bytes.unwrap_or_else(default_size_limit),
        skip_empty_archives: capture.skip_empty_archives.unwrap_or_default(),
        destination,
    }]
}

/// The namespace may live in another subscription than the provider's.
fn id_for(model: &EventHubModel) -> Result<EventHubId, ProviderError> {
    let namespace = NamespaceId::parse(&model.namespace_id)?;
    Ok(EventHubId::new(
        namespace.subscription_id,
        namespace.resource_group_name,
        namespace.namespace_name,
        &model.name,
    ))
}

/// An Event Hub inside a namespace.
pub struct EventHubResource;

impl EventHubResource {
    async fn put(
        &self,
        clients: &Clients,
        id: &EventHubId,
        model: &EventHubModel,
    ) -> Result<(), ProviderError> {
        let _namespace = clients.locks.lock(NAMESPACE_LOCK, &id.namespace_name).await;
        clients.arm.put_and_wait(&id.to_string(), API_VERSION, &expand(model)).await?;
        Ok(())
    }

    async fn refresh(&self, clients: &Clients, id: &EventHubId) -> Result<Value, ProviderError> {
        self.read(clients, json!({ "id": id.to_string() }))
            .await?
            .ok_or_else(|| {
                ProviderError::NotFound(format!("EventHub {:?} disappeared", id.to_string()))
            })
    }
}

#[async_trait]
impl Resource for EventHubResource {
    fn type_name(&self) -> &'static str {
        "azurerm_eventhub"
    }

    fn schema(&self) -> Schema {
        let destination = Block::new()
            .with_attribute(
                "name",
                Attribute::required_string().one_of(&[BLOB_DESTINATION]),
            )
            .with_attribute(
                "archive_name_format",
                Attribute::required_string().validated_by(archive_name_format),
            )
            .with_attribute("blob_container_name", Attribute::required_string())
            .with_attribute(
                "storage_account_id",
                Attribute::required_string().validated_by(StorageAccountId::validate),
            );

        let capture = Block::new()
            .with_attribute("enabled", Attribute::optional_bool_default(false))
            .with_attribute(
                "encoding",
                Attribute::required_string().one_of_ignoring_case(&["Avro", "AvroDeflate"]),
            )
            .with_attribute(
                "interval_in_seconds",
                Attribute::optional_int64()
                    .with_default(json!(default_interval()))
                    .int_between(60, 900),
            )
            .with_attribute(
                "size_limit_in_bytes",
                Attribute::optional_int64()
                    .with_default(json!(default_size_limit()))
                    .int_between(10_485_760, 524_288_000),
            )
            .with_attribute("skip_empty_archives", Attribute::optional_bool_default(false))
            .with_block(
                "destination",
                NestedBlock::list(destination).with_min_items(1).with_max_items(1),
            );

        Schema::v0()
            .with_description(
                "Manages an Event Hub as a nested resource within an Event Hubs namespace.",
            )
            .with_id()
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .validated_by(validate::eventhub_name),
            )
            .with_attribute(
                "namespace_id",
                Attribute::required_string()
                    .with_force_new()
                    .validated_by(NamespaceId::validate),
            )
            .with_attribute(
                "partition_count",
                Attribute::required_int64().int_between(1, 1024),
            )
            .with_attribute(
                "message_retention",
                Attribute::required_int64().int_between(1, 90),
            )
            .with_attribute(
                "status",
                Attribute::optional_string()
                    .with_default(json!(default_status()))
                    .one_of(&["Active", "Disabled", "SendDisabled"]),
            )
            .with_attribute("partition_ids", Attribute::computed_string_set())
            .with_block("capture_description", NestedBlock::list(capture).with_max_items(1))
    }

    /// Partitions can be added in place but never removed.
    fn customize_diff(&self, prior: &Value, planned: &Value) -> Result<DiffVerdict, ProviderError> {
        let count = |state: &Value| state.get("partition_count").and_then(Value::as_i64);
        match (count(prior), count(planned)) {
            (Some(before), Some(after)) if after < before => Ok(DiffVerdict::Replace),
            _ => Ok(DiffVerdict::InPlace),
        }
    }

    #[instrument(skip_all)]
    async fn create(&self, clients: &Clients, planned: Value) -> Result<Value, ProviderError> {
        let model: EventHubModel = from_state(planned)?;
        let id = id_for(&model)?;

        let existing = clients
            .arm
            .get(&id.to_string(), API_VERSION)
            .await
            .with_context(|| {
                format!("checking for presence of existing EventHub {:?}", id.to_string())
            })?;
        if existing.is_some() {
            return Err(requires_import(&id));
        }

        self.put(clients, &id, &model)
            .await
            .with_context(|| format!("creating EventHub {:?}", id.to_string()))?;
        self.refresh(clients, &id).await
    }

    async fn read(&self, clients: &Clients, state: Value) -> Result<Option<Value>, ProviderError> {
        let id = EventHubId::parse(state_id(&state)?)?;
        let Some(body) = clients
            .arm
            .get(&id.to_string(), API_VERSION)
            .await
            .with_context(|| format!("retrieving EventHub {:?}", id.to_string()))?
        else {
            tracing::info!(id = %id, "EventHub was not found - removing from state");
            return Ok(None);
        };
        let hub: Eventhub = from_body(body)?;
        let properties = hub.properties.unwrap_or_default();

        let mut partition_ids = properties.partition_ids;
        partition_ids.sort();
        to_state(&EventHubModel {
            id: Some(id.to_string()),
            namespace_id: id.namespace_id().to_string(),
            name: id.eventhub_name,
            partition_count: properties.partition_count.unwrap_or_default(),
            message_retention: properties.message_retention_in_days.unwrap_or_default(),
            status: properties.status.unwrap_or_else(default_status),
            capture_description: flatten_capture(properties.capture_description),
            partition_ids,
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
        let id = EventHubId::parse(state_id(&prior)?)?;
        let model: EventHubModel = from_state(planned)?;
        self.put(clients, &id, &model)
            .await
            .with_context(|| format!("updating EventHub {:?}", id.to_string()))?;
        self.refresh(clients, &id).await
    }

    #[instrument(skip_all)]
    async fn delete(&self, clients: &Clients, state: Value) -> Result<(), ProviderError> {
        let id = EventHubId::parse(state_id(&state)?)?;
        let _namespace = clients.locks.lock(NAMESPACE_LOCK, &id.namespace_name).await;
        clients
            .arm
            .delete_and_wait(&id.to_string(), API_VERSION)
            .await
            .with_context(|| format!("deleting EventHub {:?}", id.to_string()))
    }

    fn canonical_id(&self, id: &str) -> Result<String, ProviderError> {
        Ok(EventHubId::parse(id)?.to_string())
    }
}
