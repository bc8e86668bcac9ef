//! `Microsoft.EventHub` request and response bodies.
//!
//! Every field is optional: ARM omits what it does not know and we omit what
//! the user did not configure.

#![allow(missing_docs)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::identity::ManagedServiceIdentity;

/// API version for every `Microsoft.EventHub` call.
pub const API_VERSION: &str = "2024-01-01";

/// A namespace (`Microsoft.EventHub/namespaces`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Namespace {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sku: Option<Sku>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<ManagedServiceIdentity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<NamespaceProperties>,
}

/// Namespace pricing tier.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Sku {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tier: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capacity: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NamespaceProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_auto_inflate_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub maximum_throughput_units: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cluster_arm_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_local_auth: Option<bool>,
    /// `Enabled` or `Disabled`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_network_access: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub minimum_tls_version: Option<String>,
    #[serde(skip_serializing)]
    pub provisioning_state: Option<String>,
}

/// `namespaces/{ns}/networkRuleSets/default`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkRuleSet {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<NetworkRuleSetProperties>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct NetworkRuleSetProperties {
    /// `Allow` or `Deny`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub default_action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_network_access: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trusted_service_access_enabled: Option<bool>,
    pub virtual_network_rules: Vec<VirtualNetworkRule>,
    pub ip_rules: Vec<IpRule>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct VirtualNetworkRule {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subnet: Option<SubResource>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ignore_missing_vnet_service_endpoint: Option<bool>,
}

/// A reference to another ARM object by ID.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SubResource {
    pub id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IpRule {
    pub ip_mask: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

/// Response of `listKeys` on an authorization rule.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AccessKeys {
    pub primary_connection_string: Option<String>,
    pub secondary_connection_string: Option<String>,
    pub alias_primary_connection_string: Option<String>,
    pub alias_secondary_connection_string: Option<String>,
    pub primary_key: Option<String>,
    pub secondary_key: Option<String>,
}

/// An Event Hub (`namespaces/{ns}/eventhubs/{eh}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Eventhub {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<EventhubProperties>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventhubProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partition_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_retention_in_days: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capture_description: Option<CaptureDescription>,
    #[serde(skip_serializing)]
    pub partition_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureDescription {
    pub enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub encoding: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval_in_seconds: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_limit_in_bytes: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub skip_empty_archives: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<CaptureDestination>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureDestination {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<CaptureDestinationProperties>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CaptureDestinationProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub storage_account_resource_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blob_container: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub archive_name_format: Option<String>,
}

/// A consumer group (`eventhubs/{eh}/consumerGroups/{cg}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConsumerGroup {
    pub properties: ConsumerGroupProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ConsumerGroupProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_metadata: Option<String>,
}

/// A shared access authorization rule on a namespace or an Event Hub.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthorizationRule {
    pub properties: AuthorizationRuleProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AuthorizationRuleProperties {
    /// `Listen`, `Send`, `Manage`.
    pub rights: Vec<String>,
}

/// A Geo-DR pairing (`namespaces/{ns}/disasterRecoveryConfigs/{alias}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DisasterRecoveryConfig {
    pub properties: DisasterRecoveryConfigProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DisasterRecoveryConfigProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub partner_namespace: Option<String>,
    #[serde(skip_serializing)]
    pub provisioning_state: Option<String>,
    /// `Primary`, `PrimaryNotReplicating` or `Secondary`.
    #[serde(skip_serializing)]
    pub role: Option<String>,
}

/// A schema registry group (`namespaces/{ns}/schemagroups/{group}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchemaGroup {
    pub properties: SchemaGroupProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct SchemaGroupProperties {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_compatibility: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_namespace_request_omits_unset_fields() {
        let namespace = Namespace {
            location: Some("westeurope".into()),
            sku: Some(Sku {
                name: "Standard".into(),
                tier: Some("Standard".into()),
                capacity: Some(2),
            }),
            properties: Some(NamespaceProperties {
                is_auto_inflate_enabled: Some(false),
                provisioning_state: Some("Succeeded".into()),
                ..Default::default()
            }),
            ..Default::default()
        };
        assert_eq!(
            serde_json::to_value(&namespace).unwrap(),
            json!({
                "location": "westeurope",
                "sku": {"name": "Standard", "tier": "Standard", "capacity": 2},
                "properties": {"isAutoInflateEnabled": false}
            })
        );
    }

    #[test]
    fn test_eventhub_response_reads_partition_ids() {
        let hub: Eventhub = serde_json::from_value(json!({
            "id": "ignored",
            "properties": {
                "partitionCount": 2,
                "messageRetentionInDays": 7,
                "status": "Active",
                "partitionIds": ["0", "1"],
                "captureDescription": {
                    "enabled": true,
                    "encoding": "Avro",
                    "destination": {
                        "name": "EventHubArchive.AzureBlockBlob",
                        "properties": {"blobContainer": "capture"}
                    }
                }
            }
        }))
        .unwrap();
        let properties = hub.properties.unwrap();
        assert_eq!(properties.partition_ids, vec!["0", "1"]);
        let capture = properties.capture_description.unwrap();
        assert_eq!(
            capture.destination.unwrap().properties.unwrap().blob_container.as_deref(),
            Some("capture")
        );
    }

    #[test]
    fn test_network_rule_set_round_trips_rules() {
        let rules = NetworkRuleSet {
            properties: Some(NetworkRuleSetProperties {
                default_action: Some("Deny".into()),
                ip_rules: vec![IpRule {
                    ip_mask: "10.0.0.0/16".into(),
                    action: Some("Allow".into()),
                }],
                ..Default::default()
            }),
        };
        let encoded = serde_json::to_value(&rules).unwrap();
        assert_eq!(encoded["properties"]["ipRules"][0]["ipMask"], "10.0.0.0/16");
        assert_eq!(encoded["properties"]["virtualNetworkRules"], json!([]));
    }
}
