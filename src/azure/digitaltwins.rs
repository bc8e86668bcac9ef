//! `Microsoft.DigitalTwins` request and response bodies.

#![allow(missing_docs)]

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::identity::ManagedServiceIdentity;

/// API version for every `Microsoft.DigitalTwins` call.
pub const API_VERSION: &str = "2023-01-31";

/// Endpoint type handled by `azurerm_digital_twins_endpoint_eventhub`.
pub const ENDPOINT_TYPE_EVENT_HUB: &str = "EventHub";

/// A Digital Twins instance.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DigitalTwinsInstance {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<ManagedServiceIdentity>,
    #[serde(skip_serializing)]
    pub properties: Option<DigitalTwinsProperties>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DigitalTwinsProperties {
    pub host_name: Option<String>,
    pub provisioning_state: Option<String>,
}

/// PATCH body for an instance; only tags and identity can change in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DigitalTwinsPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tags: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub identity: Option<ManagedServiceIdentity>,
}

/// An endpoint on an instance (`digitalTwinsInstances/{name}/endpoints/{endpoint}`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Endpoint {
    pub properties: EndpointProperties,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EndpointProperties {
    pub endpoint_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authentication_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_string_primary_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub connection_string_secondary_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dead_letter_secret: Option<String>,
    #[serde(skip_serializing)]
    pub provisioning_state: Option<String>,
}
