//! Managed identity: the ARM payload, the `identity` block and the mapping
//! between the two. Shared by every resource that accepts an identity.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::id::UserAssignedIdentityId;
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock};

/// `identity.type` values accepted in configuration.
pub const IDENTITY_TYPES: &[&str] = &[
    "SystemAssigned",
    "UserAssigned",
    "SystemAssigned, UserAssigned",
];

/// The `identity` object on ARM resources.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedServiceIdentity {
    /// `None`, `SystemAssigned`, `UserAssigned` or `SystemAssigned, UserAssigned`.
    #[serde(rename = "type")]
    pub kind: String,
    /// Principal of the system assigned identity.
    #[serde(default, skip_serializing)]
    pub principal_id: Option<String>,
    /// Tenant of the system assigned identity.
    #[serde(default, skip_serializing)]
    pub tenant_id: Option<String>,
    /// User assigned identities keyed by resource ID.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_assigned_identities: Option<BTreeMap<String, UserAssignedIdentity>>,
}

/// Details ARM returns for a user assigned identity. Sent as `{}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserAssignedIdentity {
    /// Principal ID of the identity.
    #[serde(default, skip_serializing)]
    pub principal_id: Option<String>,
    /// Client ID of the identity.
    #[serde(default, skip_serializing)]
    pub client_id: Option<String>,
}

/// One `identity` block in state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IdentityModel {
    /// The identity type.
    #[serde(rename = "type", default)]
    pub kind: String,
    /// User assigned identity IDs.
    #[serde(default)]
    pub identity_ids: Vec<String>,
    /// Computed principal of the system assigned identity.
    #[serde(default)]
    pub principal_id: Option<String>,
    /// Computed tenant of the system assigned identity.
    #[serde(default)]
    pub tenant_id: Option<String>,
}

impl IdentityModel {
    fn includes_user_assigned(&self) -> bool {
        self.kind.contains("UserAssigned")
    }
}

/// The `identity` block schema.
pub fn identity_block() -> NestedBlock {
    NestedBlock::list(
        Block::new()
            .with_attribute(
                "type",
                Attribute::required_string()
                    .one_of(IDENTITY_TYPES)
                    .with_description("The type of Managed Service Identity."),
            )
            .with_attribute(
                "identity_ids",
                Attribute::optional_string_set()
                    .validated_by(UserAssignedIdentityId::validate)
                    .with_description("User Assigned Managed Identity IDs."),
            )
            .with_attribute("principal_id", Attribute::computed_string())
            .with_attribute("tenant_id", Attribute::computed_string()),
    )
    .with_max_items(1)
}

/// `identity_ids` must be set exactly when a user assigned identity is requested.
pub fn validate_identity(identity: &[IdentityModel]) -> Vec<Diagnostic> {
    let Some(identity) = identity.first() else {
        return vec![];
    };
    match (identity.includes_user_assigned(), identity.identity_ids.is_empty()) {
        (true, true) => vec![Diagnostic::error(
            "`identity_ids` must be specified when `type` includes `UserAssigned`",
        )
        .with_attribute("identity.0.identity_ids")],
        (false, false) => vec![Diagnostic::error(
            "`identity_ids` can only be specified when `type` includes `UserAssigned`",
        )
        .with_attribute("identity.0.identity_ids")],
        _ => vec![],
    }
}

/// Build the ARM payload. No block means no identity.
pub fn expand_identity(identity: &[IdentityModel]) -> Option<ManagedServiceIdentity> {
    let identity = identity.first()?;
    let user_assigned = identity.includes_user_assigned().then(|| {
        identity
            .identity_ids
            .iter()
            .map(|id| (id.clone(), UserAssignedIdentity::default()))
            .collect()
    });
    Some(ManagedServiceIdentity {
        kind: identity.kind.clone(),
        principal_id: None,
        tenant_id: None,
        user_assigned_identities: user_assigned,
    })
}

/// Explicitly remove any identity (`{"type": "None"}`), used by PATCH.
pub fn no_identity() -> ManagedServiceIdentity {
    ManagedServiceIdentity {
        kind: "None".to_string(),
        ..Default::default()
    }
}

/// Map the ARM payload back into state.
pub fn flatten_identity(identity: Option<&ManagedServiceIdentity>) -> Vec<IdentityModel> {
    let Some(identity) = identity else {
        return vec![];
    };
    let kind = canonical_type(&identity.kind);
    if kind == "None" || kind.is_empty() {
        return vec![];
    }

    let mut identity_ids: Vec<String> = identity
        .user_assigned_identities
        .iter()
        .flat_map(|ids| ids.keys())
        .map(|raw| {
            UserAssignedIdentityId::parse(raw)
                .map(|id| id.to_string())
                .unwrap_or_else(|_| raw.clone())
        })
        .collect();
    identity_ids.sort();

    vec![IdentityModel {
        kind,
        identity_ids,
        principal_id: identity.principal_id.clone(),
        tenant_id: identity.tenant_id.clone(),
    }]
}

/// ARM is inconsistent about casing and separators here.
fn canonical_type(kind: &str) -> String {
    let normalized: String = kind
        .chars()
        .filter(|c| !c.is_whitespace())
        .collect::<String>()
        .to_ascii_lowercase();
    match normalized.as_str() {
        "systemassigned" => "SystemAssigned".to_string(),
        "userassigned" => "UserAssigned".to_string(),
        "systemassigned,userassigned" => "SystemAssigned, UserAssigned".to_string(),
        "none" | "" => "None".to_string(),
        _ => kind.to_string(),
    }
}
