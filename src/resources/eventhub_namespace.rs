//! `azurerm_eventhub_namespace`

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::instrument;

use super::{
    default_true, from_body, from_state, normalize_location, requires_import, state_id, to_state,
    validate, Clients, Resource,
};
use crate::azure::eventhub::{
    AccessKeys, IpRule, Namespace, NamespaceProperties, NetworkRuleSet, NetworkRuleSetProperties,
    Sku, SubResource, VirtualNetworkRule, API_VERSION,
};
use crate::azure::id::{ClusterId, NamespaceId, SubnetId};
use crate::azure::identity::{self, IdentityModel};
use crate::error::{ErrorContext, ProviderError};
use crate::retry::{retry_until, RetryError};
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema};
use crate::types::DiffVerdict;
use crate::validation;

const ROOT_RULE: &str = "RootManageSharedAccessKey";
const PREMIUM: &str = "Premium";
const STANDARD: &str = "Standard";
const PREMIUM_CAPACITIES: &[i64] = &[1, 2, 4, 8, 16];

fn default_capacity() -> i64 {
    1
}

fn default_ip_action() -> String {
    "Allow".to_string()
}

fn access(enabled: bool) -> String {
    if enabled { "Enabled" } else { "Disabled" }.to_string()
}

fn is_enabled(value: Option<&str>) -> bool {
    value.map_or(true, |v| v.eq_ignore_ascii_case("Enabled"))
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct NamespaceModel {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    pub location: String,
    pub resource_group_name: String,
    pub sku: String,
    #[serde(default = "default_capacity")]
    pub capacity: i64,
    #[serde(default)]
    pub auto_inflate_enabled: bool,
    #[serde(default)]
    pub maximum_throughput_units: Option<i64>,
    #[serde(default)]
    pub dedicated_cluster_id: Option<String>,
    #[serde(default)]
    pub identity: Vec<IdentityModel>,
    #[serde(default = "default_true")]
    pub local_authentication_enabled: bool,
    #[serde(default = "default_true")]
    pub public_network_access_enabled: bool,
    #[serde(default)]
    pub minimum_tls_version: Option<String>,
    #[serde(default)]
    pub network_rulesets: Vec<NetworkRulesetModel>,
    #[serde(default)]
    pub tags: BTreeMap<String, String>,
    #[serde(flatten)]
    pub keys: DefaultKeys,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub(crate) struct NetworkRulesetModel {
    default_action: String,
    #[serde(default = "default_true")]
    public_network_access_enabled: bool,
    #[serde(default)]
    trusted_service_access_enabled: Option<bool>,
    #[serde(default)]
    virtual_network_rule: Vec<VirtualNetworkRuleModel>,
    #[serde(default)]
    ip_rule: Vec<IpRuleModel>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct VirtualNetworkRuleModel {
    subnet_id: String,
    #[serde(default)]
    ignore_missing_virtual_network_service_endpoint: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct IpRuleModel {
    ip_mask: String,
    #[serde(default = "default_ip_action")]
    action: String,
}

/// Keys of the `RootManageSharedAccessKey` rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct DefaultKeys {
    #[serde(default)]
    pub default_primary_connection_string: Option<String>,
    #[serde(default)]
    pub default_secondary_connection_string: Option<String>,
    #[serde(default)]
    pub default_primary_connection_string_alias: Option<String>,
    #[serde(default)]
    pub default_secondary_connection_string_alias: Option<String>,
    #[serde(default)]
    pub default_primary_key: Option<String>,
    #[serde(default)]
    pub default_secondary_key: Option<String>,
}

impl From<AccessKeys> for DefaultKeys {
    fn from(keys: AccessKeys) -> Self {
        Self {
            default_primary_connection_string: keys.primary_connection_string,
            default_secondary_connection_string: keys.secondary_connection_string,
            default_primary_connection_string_alias: keys.alias_primary_connection_string,
            default_secondary_connection_string_alias: keys.alias_secondary_connection_string,
            default_primary_key: keys.primary_key,
            default_secondary_key: keys.secondary_key,
        }
    }
}

/// The computed attributes shared with the `azurerm_eventhub_namespace` data source.
pub(crate) fn computed_attributes() -> Vec<(&'static str, Attribute)> {
    vec![
        ("default_primary_connection_string", Attribute::computed_secret()),
        ("default_secondary_connection_string", Attribute::computed_secret()),
        ("default_primary_connection_string_alias", Attribute::computed_secret()),
        ("default_secondary_connection_string_alias", Attribute::computed_secret()),
        ("default_primary_key", Attribute::computed_secret()),
        ("default_secondary_key", Attribute::computed_secret()),
    ]
}

fn network_rulesets_block() -> NestedBlock {
    let virtual_network_rule = Block::new()
        .with_attribute(
            "subnet_id",
            Attribute::required_string().validated_by(SubnetId::validate),
        )
        .with_attribute(
            "ignore_missing_virtual_network_service_endpoint",
            Attribute::optional_bool_default(false),
        );
    let ip_rule = Block::new()
        .with_attribute(
            "ip_mask",
            Attribute::required_string().validated_by(validation::ip_or_cidr),
        )
        .with_attribute(
            "action",
            Attribute::optional_string()
                .with_default(json!(default_ip_action()))
                .one_of(&["Allow"]),
        );

    NestedBlock::list(
        Block::new()
            .with_attribute(
                "default_action",
                Attribute::required_string().one_of(&["Allow", "Deny"]),
            )
            .with_attribute(
                "public_network_access_enabled",
                Attribute::optional_bool_default(true),
            )
            .with_attribute("trusted_service_access_enabled", Attribute::optional_bool())
            .with_block("virtual_network_rule", NestedBlock::list(virtual_network_rule))
            .with_block("ip_rule", NestedBlock::list(ip_rule)),
    )
    .with_max_items(1)
    .computed()
}

/// Cross-attribute checks the schema cannot express.
///
/// Reads the raw configuration so that unknown values are simply skipped.
fn validate_config(config: &Value) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    let sku = config.get("sku").and_then(Value::as_str);
    let capacity = config.get("capacity").and_then(Value::as_i64);
    let auto_inflate = config
        .get("auto_inflate_enabled")
        .and_then(Value::as_bool)
        .unwrap_or(false);
    let max_units = config.get("maximum_throughput_units").and_then(Value::as_i64);

    if sku.is_some_and(|s| s.eq_ignore_ascii_case(PREMIUM)) {
        if let Some(capacity) = capacity {
            if !PREMIUM_CAPACITIES.contains(&capacity) {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "eventhub namespace capacity must be one of 1, 2, 4, 8 or 16 \
                         for the Premium SKU, got {}",
                        capacity
                    ))
                    .with_attribute("capacity"),
                );
            }
        }
    }

    if auto_inflate {
        if sku.is_some_and(|s| !s.eq_ignore_ascii_case(STANDARD)) {
            diagnostics.push(
                Diagnostic::error(
                    "`auto_inflate_enabled` can only be set to true when `sku` is Standard",
                )
                .with_attribute("auto_inflate_enabled"),
            );
        }
        if let Some(max_units) = max_units {
            if max_units < capacity.unwrap_or_else(default_capacity) {
                diagnostics.push(
                    Diagnostic::error(
                        "`maximum_throughput_units` must be greater than or equal to `capacity` \
                         when auto inflate is enabled",
                    )
                    .with_attribute("maximum_throughput_units"),
                );
            }
        }
    } else if max_units.is_some_and(|units| units > 0) {
        diagnostics.push(
            Diagnostic::error(
                "`maximum_throughput_units` can only be set when `auto_inflate_enabled` is true",
            )
            .with_attribute("maximum_throughput_units"),
        );
    }

    let namespace_access = config
        .get("public_network_access_enabled")
        .and_then(Value::as_bool);
    let ruleset_access = config
        .get("network_rulesets")
        .and_then(|rulesets| rulesets.get(0))
        .and_then(|ruleset| ruleset.get("public_network_access_enabled"))
        .and_then(Value::as_bool);
    if let (Some(namespace), Some(ruleset)) = (namespace_access, ruleset_access) {
        if namespace != ruleset {
            diagnostics.push(
                Diagnostic::error(
                    "the value of public network access of namespace should be the same as of \
                     the network rulesets",
                )
                .with_attribute("network_rulesets.0.public_network_access_enabled"),
            );
        }
    }

    if let Some(identity) = config.get("identity") {
        if let Ok(identity) = from_state::<Vec<IdentityModel>>(identity.clone()) {
            diagnostics.extend(identity::validate_identity(&identity));
        }
    }

    diagnostics
}

fn expand(model: &NamespaceModel) -> Namespace {
    Namespace {
        location: Some(normalize_location(&model.location)),
        sku: Some(Sku {
            name: model.sku.clone(),
            tier: Some(model.sku.clone()),
            capacity: Some(model.capacity),
        }),
        identity: identity::expand_identity(&model.identity),
        tags: Some(model.tags.clone()),
        properties: Some(NamespaceProperties {
            is_auto_inflate_enabled: Some(model.auto_inflate_enabled),
            maximum_throughput_units: model
                .auto_inflate_enabled
                .then_some(model.maximum_throughput_units)
                .flatten(),
            cluster_arm_id: model.dedicated_cluster_id.clone(),
            disable_local_auth: Some(!model.local_authentication_enabled),
            public_network_access: Some(access(model.public_network_access_enabled)),
            minimum_tls_version: model.minimum_tls_version.clone(),
            provisioning_state: None,
        }),
    }
}

fn expand_network_rulesets(ruleset: &NetworkRulesetModel) -> NetworkRuleSet {
    NetworkRuleSet {
        properties: Some(NetworkRuleSetProperties {
            default_action: Some(ruleset.default_action.clone()),
            public_network_access: Some(access(ruleset.public_network_access_enabled)),
            trusted_service_access_enabled: ruleset.trusted_service_access_enabled,
            virtual_network_rules: ruleset
                .virtual_network_rule
                .iter()
                .map(|rule| VirtualNetworkRule {
                    subnet: Some(SubResource {
                        id: rule.subnet_id.clone(),
                    }),
                    ignore_missing_vnet_service_endpoint: Some(
                        rule.ignore_missing_virtual_network_service_endpoint,
                    ),
                })
                .collect(),
            ip_rules: ruleset
                .ip_rule
                .iter()
                .map(|rule| IpRule {
                    ip_mask: rule.ip_mask.clone(),
                    action: Some(rule.action.clone()),
                })
                .collect(),
        }),
    }
}

fn flatten_network_rulesets(ruleset: Option<NetworkRuleSet>) -> Vec<NetworkRulesetModel> {
    let Some(properties) = ruleset.and_then(|r| r.properties) else {
        return vec![];
    };
    vec![NetworkRulesetModel {
        default_action: properties.default_action.unwrap_or_default(),
        public_network_access_enabled: is_enabled(properties.public_network_access.as_deref()),
        trusted_service_access_enabled: properties.trusted_service_access_enabled,
        virtual_network_rule: properties
            .virtual_network_rules
            .into_iter()
            .filter_map(|rule| {
                let subnet = rule.subnet?;
                Some(VirtualNetworkRuleModel {
                    // ARM lower-cases parts of subnet IDs.
                    subnet_id: SubnetId::parse(&subnet.id)
                        .map(|id| id.to_string())
                        .unwrap_or(subnet.id),
                    ignore_missing_virtual_network_service_endpoint: rule
                        .ignore_missing_vnet_service_endpoint
                        .unwrap_or_default(),
                })
            })
            .collect(),
        ip_rule: properties
            .ip_rules
            .into_iter()
            .map(|rule| IpRuleModel {
                ip_mask: rule.ip_mask,
                action: rule.action.unwrap_or_else(default_ip_action),
            })
            .collect(),
    }]
}

/// Read a namespace and everything attached to it. `None` when it is gone.
pub(crate) async fn read_namespace(
    clients: &Clients,
    id: &NamespaceId,
) -> Result<Option<NamespaceModel>, ProviderError> {
    let path = id.to_string();
    let Some(body) = clients
        .arm
        .get(&path, API_VERSION)
        .await
        .with_context(|| format!("retrieving Namespace {:?}", path))?
    else {
        return Ok(None);
    };
    let namespace: Namespace = from_body(body)?;
    let properties = namespace.properties.unwrap_or_default();
    let sku = namespace.sku.unwrap_or_default();

    let ruleset = clients
        .arm
        .get(&format!("{}/networkRuleSets/default", path), API_VERSION)
        .await
        .with_context(|| format!("retrieving Network Rule Set for Namespace {:?}", path))?
        .map(from_body::<NetworkRuleSet>)
        .transpose()?;

    let local_authentication_enabled = !properties.disable_local_auth.unwrap_or(false);
    let keys = if local_authentication_enabled {
        match clients
            .arm
            .post(
                &format!("{}/authorizationRules/{}/listKeys", path, ROOT_RULE),
                API_VERSION,
                None,
            )
            .await
        {
            Ok(Some(body)) => from_body::<AccessKeys>(body)?.into(),
            Ok(None) => DefaultKeys::default(),
            Err(err) if matches!(err.status(), Some(403) | Some(404)) => {
                tracing::warn!(id = %path, status = ?err.status(), "Unable to list default keys");
                DefaultKeys::default()
            }
            Err(err) => {
                return Err(ProviderError::from(err)
                    .context(format!("listing default keys for Namespace {:?}", path)))
            }
        }
    } else {
        DefaultKeys::default()
    };

    let auto_inflate_enabled = properties.is_auto_inflate_enabled.unwrap_or(false);
    Ok(Some(NamespaceModel {
        id: Some(path.clone()),
        name: id.namespace_name.clone(),
        location: namespace.location.as_deref().map(normalize_location).unwrap_or_default(),
        resource_group_name: id.resource_group_name.clone(),
        sku: sku.name,
        capacity: sku.capacity.unwrap_or_else(default_capacity),
        auto_inflate_enabled,
        maximum_throughput_units: if auto_inflate_enabled {
            properties.maximum_throughput_units
        } else {
            Some(0)
        },
        dedicated_cluster_id: properties
            .cluster_arm_id
            .filter(|id| !id.is_empty())
            .map(|raw| ClusterId::parse(&raw).map(|id| id.to_string()).unwrap_or(raw)),
        identity: identity::flatten_identity(namespace.identity.as_ref()),
        local_authentication_enabled,
        public_network_access_enabled: is_enabled(properties.public_network_access.as_deref()),
        minimum_tls_version: properties.minimum_tls_version,
        network_rulesets: flatten_network_rulesets(ruleset),
        tags: namespace.tags.unwrap_or_default(),
        keys,
    }))
}

/// An Event Hubs namespace.
pub struct EventHubNamespaceResource;

impl EventHubNamespaceResource {
    async fn put(
        &self,
        clients: &Clients,
        id: &NamespaceId,
        model: &NamespaceModel,
    ) -> Result<(), ProviderError> {
        let path = id.to_string();
        clients.arm.put_and_wait(&path, API_VERSION, &expand(model)).await?;

        if let Some(ruleset) = model.network_rulesets.first() {
            clients
                .arm
                .put_and_wait(
                    &format!("{}/networkRuleSets/default", path),
                    API_VERSION,
                    &expand_network_rulesets(ruleset),
                )
                .await
                .context("setting network rule set")?;
        }
        Ok(())
    }

    async fn refresh(&self, clients: &Clients, id: &NamespaceId) -> Result<Value, ProviderError> {
        self.read(clients, json!({ "id": id.to_string() }))
            .await?
            .ok_or_else(|| {
                ProviderError::NotFound(format!("Namespace {:?} disappeared", id.to_string()))
            })
    }
}

#[async_trait]
impl Resource for EventHubNamespaceResource {
    fn type_name(&self) -> &'static str {
        "azurerm_eventhub_namespace"
    }

    fn schema(&self) -> Schema {
        let mut schema = Schema::v0()
            .with_description("Manages an Event Hubs namespace.")
            .with_id()
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .validated_by(validate::eventhub_namespace_name),
            )
            .with_attribute("location", Attribute::required_string().with_force_new())
            .with_attribute("resource_group_name", Attribute::required_string().with_force_new())
            .with_attribute(
                "sku",
                Attribute::required_string().one_of_ignoring_case(&["Basic", STANDARD, PREMIUM]),
            )
            .with_attribute(
                "capacity",
                Attribute::optional_int64()
                    .with_default(json!(default_capacity()))
                    .int_between(0, 40),
            )
            .with_attribute("auto_inflate_enabled", Attribute::optional_bool_default(false))
            .with_attribute(
                "maximum_throughput_units",
                Attribute::optional_computed_int64().int_between(0, 40),
            )
            .with_attribute(
                "dedicated_cluster_id",
                Attribute::optional_string()
                    .with_force_new()
                    .validated_by(ClusterId::validate),
            )
            .with_attribute("local_authentication_enabled", Attribute::optional_bool_default(true))
            .with_attribute("public_network_access_enabled", Attribute::optional_bool_default(true))
            .with_attribute(
                "minimum_tls_version",
                Attribute::optional_computed_string().one_of(&["1.0", "1.1", "1.2"]),
            )
            .with_attribute("tags", Attribute::tags())
            .with_block("identity", identity::identity_block())
            .with_block("network_rulesets", network_rulesets_block());
        for (name, attribute) in computed_attributes() {
            schema = schema.with_attribute(name, attribute);
        }
        schema
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        validate_config(config)
    }

    /// Moving between Premium and the other tiers needs a new namespace.
    fn customize_diff(&self, prior: &Value, planned: &Value) -> Result<DiffVerdict, ProviderError> {
        let premium = |state: &Value| {
            state
                .get("sku")
                .and_then(Value::as_str)
                .map(|sku| sku.eq_ignore_ascii_case(PREMIUM))
        };
        match (premium(prior), premium(planned)) {
            (Some(before), Some(after)) if before != after => Ok(DiffVerdict::Replace),
            _ => Ok(DiffVerdict::InPlace),
        }
    }

    #[instrument(skip_all)]
    async fn create(&self, clients: &Clients, planned: Value) -> Result<Value, ProviderError> {
        let model: NamespaceModel = from_state(planned)?;
        let id = NamespaceId::new(
            &clients.subscription_id,
            &model.resource_group_name,
            &model.name,
        );

        let existing = clients
            .arm
            .get(&id.to_string(), API_VERSION)
            .await
            .with_context(|| {
                format!("checking for presence of existing Namespace {:?}", id.to_string())
            })?;
        if existing.is_some() {
            return Err(requires_import(&id));
        }

        self.put(clients, &id, &model)
            .await
            .with_context(|| format!("creating Namespace {:?}", id.to_string()))?;
        self.refresh(clients, &id).await
    }

    async fn read(&self, clients: &Clients, state: Value) -> Result<Option<Value>, ProviderError> {
        let id = NamespaceId::parse(state_id(&state)?)?;
        match read_namespace(clients, &id).await? {
            Some(model) => to_state(&model).map(Some),
            None => {
                tracing::info!(id = %id, "Namespace was not found - removing from state");
                Ok(None)
            }
        }
    }

    #[instrument(skip_all)]
    async fn update(
        &self,
        clients: &Clients,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let id = NamespaceId::parse(state_id(&prior)?)?;
        let model: NamespaceModel = from_state(planned)?;
        self.put(clients, &id, &model)
            .await
            .with_context(|| format!("updating Namespace {:?}", id.to_string()))?;
        self.refresh(clients, &id).await
    }

    #[instrument(skip_all)]
    async fn delete(&self, clients: &Clients, state: Value) -> Result<(), ProviderError> {
        let id = NamespaceId::parse(state_id(&state)?)?;
        let path = id.to_string();
        clients
            .arm
            .delete_and_wait(&path, API_VERSION)
            .await
            .with_context(|| format!("deleting Namespace {:?}", path))?;

        // The delete operation can report success before the namespace is gone.
        let path = path.as_str();
        let arm = &clients.arm;
        retry_until(self.timeouts().delete, clients.arm.poll_interval(), || async move {
            match arm.get(path, API_VERSION).await {
                Ok(None) => Ok(()),
                Ok(Some(_)) => Err(RetryError::Retryable(ProviderError::FailedPrecondition(format!(
                    "Namespace {:?} still exists",
                    path
                )))),
                Err(err) => Err(RetryError::NonRetryable(err.into())),
            }
        })
        .await
        .with_context(|| format!("waiting for deletion of Namespace {:?}", path))
    }

    fn canonical_id(&self, id: &str) -> Result<String, ProviderError> {
        Ok(NamespaceId::parse(id)?.to_string())
    }
}
