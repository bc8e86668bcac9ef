//! Typed Azure Resource Manager IDs.
//!
//! Each ID type is parsed against a fixed template. Static segments
//! (`resourceGroups`, `providers`, `Microsoft.EventHub`, ...) match ignoring
//! case, since ARM hands them back in whatever casing the service prefers;
//! `Display` always renders the canonical casing.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Why an ID failed to parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdError {
    /// The input was empty.
    #[error("ID was empty")]
    Empty,

    /// The input has a different number of segments than the template.
    #[error("expected an ID in the format {template:?}, got {found} segments")]
    WrongSegmentCount {
        /// The template that was expected.
        template: &'static str,
        /// Number of segments in the input.
        found: usize,
    },

    /// A static segment did not match.
    #[error("expected segment {position} to be {expected:?}, got {found:?}")]
    UnexpectedSegment {
        /// Zero-based segment index.
        position: usize,
        /// The segment from the template.
        expected: &'static str,
        /// What the input had instead.
        found: String,
    },

    /// A user-supplied segment was empty.
    #[error("the segment {name:?} must not be empty")]
    EmptyValue {
        /// The placeholder name from the template.
        name: &'static str,
    },
}

impl From<IdError> for crate::error::ProviderError {
    fn from(err: IdError) -> Self {
        Self::Validation(format!("parsing ID: {}", err))
    }
}

fn segments(input: &str) -> Vec<&str> {
    input.trim_matches('/').split('/').collect()
}

/// Match `input` against `template`, returning the placeholder values in order.
fn parse_template(template: &'static str, input: &str) -> Result<Vec<String>, IdError> {
    if input.trim().is_empty() {
        return Err(IdError::Empty);
    }

    let expected = segments(template);
    let found = segments(input);
    if expected.len() != found.len() {
        return Err(IdError::WrongSegmentCount {
            template,
            found: found.len(),
        });
    }

    let mut values = Vec::new();
    for (position, (want, got)) in expected.into_iter().zip(found).enumerate() {
        match want.strip_prefix('{').and_then(|w| w.strip_suffix('}')) {
            Some(name) => {
                if got.is_empty() {
                    return Err(IdError::EmptyValue { name });
                }
                values.push(got.to_string());
            },
            None => {
                if !want.eq_ignore_ascii_case(got) {
                    return Err(IdError::UnexpectedSegment {
                        position,
                        expected: want,
                        found: got.to_string(),
                    });
                }
            },
        }
    }
    Ok(values)
}

fn render(template: &str, values: &[&str], f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut values = values.iter();
    for segment in segments(template) {
        f.write_str("/")?;
        if segment.starts_with('{') {
            f.write_str(values.next().copied().unwrap_or_default())?;
        } else {
            f.write_str(segment)?;
        }
    }
    Ok(())
}

macro_rules! arm_id {
    ($(#[$meta:meta])* $name:ident { $($field:ident),+ $(,)? } = $template:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash)]
        pub struct $name {
            $(
                #[allow(missing_docs)]
                pub $field: String,
            )+
        }

        impl $name {
            /// Build an ID from its segment values.
            #[allow(clippy::too_many_arguments)]
            pub fn new($($field: impl Into<String>),+) -> Self {
                Self { $($field: $field.into()),+ }
            }

            /// Parse an ID, matching static segments ignoring case.
            pub fn parse(input: &str) -> Result<Self, IdError> {
                let mut values = parse_template($template, input)?.into_iter();
                Ok(Self { $($field: values.next().unwrap_or_default()),+ })
            }

            /// Schema check accepting only IDs of this type.
            pub fn validate(input: &str) -> Result<(), String> {
                Self::parse(input).map(|_| ()).map_err(|e| e.to_string())
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                render($template, &[$(self.$field.as_str()),+], f)
            }
        }

        impl FromStr for $name {
            type Err = IdError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }
    };
}

arm_id!(
    /// `/subscriptions/{sub}/resourceGroups/{rg}`
    ResourceGroupId { subscription_id, resource_group_name }
        = "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}"
);

arm_id!(
    /// An Event Hub namespace.
    NamespaceId { subscription_id, resource_group_name, namespace_name }
        = "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}/providers\
              /Microsoft.EventHub/namespaces/{namespaceName}"
);

arm_id!(
    /// An Event Hub inside a namespace.
    EventHubId { subscription_id, resource_group_name, namespace_name, eventhub_name }
        = "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}/providers\
              /Microsoft.EventHub/namespaces/{namespaceName}/eventhubs/{eventhubName}"
);

arm_id!(
    /// A consumer group of an Event Hub.
    ConsumerGroupId {
        subscription_id,
        resource_group_name,
        namespace_name,
        eventhub_name,
        consumer_group_name,
    }
        = "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}/providers\
              /Microsoft.EventHub/namespaces/{namespaceName}/eventhubs/{eventhubName}\
              /consumerGroups/{consumerGroupName}"
);

arm_id!(
    /// A namespace-level shared access authorization rule.
    NamespaceAuthorizationRuleId {
        subscription_id,
        resource_group_name,
        namespace_name,
        authorization_rule_name,
    }
        = "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}/providers\
              /Microsoft.EventHub/namespaces/{namespaceName}/authorizationRules\
              /{authorizationRuleName}"
);

arm_id!(
    /// An Event Hub-level shared access authorization rule.
    EventHubAuthorizationRuleId {
        subscription_id,
        resource_group_name,
        namespace_name,
        eventhub_name,
        authorization_rule_name,
    }
        = "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}/providers\
              /Microsoft.EventHub/namespaces/{namespaceName}/eventhubs/{eventhubName}\
              /authorizationRules/{authorizationRuleName}"
);

arm_id!(
    /// A geo disaster recovery alias of a namespace.
    DisasterRecoveryConfigId { subscription_id, resource_group_name, namespace_name, alias }
        = "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}/providers\
              /Microsoft.EventHub/namespaces/{namespaceName}/disasterRecoveryConfigs/{alias}"
);

arm_id!(
    /// A schema registry group of a namespace.
    SchemaGroupId { subscription_id, resource_group_name, namespace_name, schema_group_name }
        = "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}/providers\
              /Microsoft.EventHub/namespaces/{namespaceName}/schemagroups/{schemaGroupName}"
);

arm_id!(
    /// A dedicated Event Hub cluster.
    ClusterId { subscription_id, resource_group_name, cluster_name }
        = "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}/providers\
              /Microsoft.EventHub/clusters/{clusterName}"
);

arm_id!(
    /// A virtual network subnet.
    SubnetId { subscription_id, resource_group_name, virtual_network_name, subnet_name }
        = "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}/providers\
              /Microsoft.Network/virtualNetworks/{virtualNetworkName}/subnets/{subnetName}"
);

arm_id!(
    /// A storage account.
    StorageAccountId { subscription_id, resource_group_name, storage_account_name }
        = "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}/providers\
              /Microsoft.Storage/storageAccounts/{storageAccountName}"
);

arm_id!(
    /// A Digital Twins instance.
    DigitalTwinsInstanceId { subscription_id, resource_group_name, instance_name }
        = "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}/providers\
              /Microsoft.DigitalTwins/digitalTwinsInstances/{instanceName}"
);

arm_id!(
    /// An endpoint of a Digital Twins instance.
    DigitalTwinsEndpointId { subscription_id, resource_group_name, instance_name, endpoint_name }
        = "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}/providers\
              /Microsoft.DigitalTwins/digitalTwinsInstances/{instanceName}/endpoints\
              /{endpointName}"
);

arm_id!(
    /// A user assigned managed identity.
    UserAssignedIdentityId { subscription_id, resource_group_name, identity_name }
        = "/subscriptions/{subscriptionId}/resourceGroups/{resourceGroupName}/providers\
              /Microsoft.ManagedIdentity/userAssignedIdentities/{identityName}"
);

impl EventHubId {
    /// The namespace this Event Hub belongs to.
    pub fn namespace_id(&self) -> NamespaceId {
        NamespaceId::new(
            &self.subscription_id,
            &self.resource_group_name,
            &self.namespace_name,
        )
    }
}

impl NamespaceAuthorizationRuleId {
    /// The namespace this rule belongs to.
    pub fn namespace_id(&self) -> NamespaceId {
        NamespaceId::new(
            &self.subscription_id,
            &self.resource_group_name,
            &self.namespace_name,
        )
    }
}

impl DigitalTwinsEndpointId {
    /// The instance this endpoint belongs to.
    pub fn instance_id(&self) -> DigitalTwinsInstanceId {
        DigitalTwinsInstanceId::new(
            &self.subscription_id,
            &self.resource_group_name,
            &self.instance_name,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const NAMESPACE: &str = "/subscriptions/00000000-0000-0000-0000-000000000000\
                             /resourceGroups/rg1/providers/Microsoft.EventHub/namespaces/ns1";

    #[test]
    fn test_parse_and_display_round_trip() {
        let id = NamespaceId::parse(NAMESPACE).unwrap();
        assert_eq!(id.subscription_id, "00000000-0000-0000-0000-000000000000");
        assert_eq!(id.resource_group_name, "rg1");
        assert_eq!(id.namespace_name, "ns1");
        assert_eq!(id.to_string(), NAMESPACE);
    }

    #[test]
    fn test_static_segments_ignore_case() {
        let id = EventHubId::parse(
            "/subscriptions/sub/resourcegroups/rg1/providers/microsoft.eventhub\
             /Namespaces/ns1/EventHubs/hub1",
        )
        .unwrap();
        assert_eq!(
            id.to_string(),
            "/subscriptions/sub/resourceGroups/rg1/providers/Microsoft.EventHub\
             /namespaces/ns1/eventhubs/hub1"
        );
        assert_eq!(id.namespace_id().namespace_name, "ns1");
    }

    #[test]
    fn test_values_keep_their_case() {
        let id = ResourceGroupId::parse("/subscriptions/sub/resourceGroups/MyGroup").unwrap();
        assert_eq!(id.resource_group_name, "MyGroup");
    }

    #[test]
    fn test_trailing_slash_is_accepted() {
        assert!(ResourceGroupId::parse("/subscriptions/sub/resourceGroups/rg/").is_ok());
    }

    #[test]
    fn test_empty_input() {
        assert_eq!(NamespaceId::parse(""), Err(IdError::Empty));
        assert_eq!(NamespaceId::parse("   "), Err(IdError::Empty));
    }

    #[test]
    fn test_wrong_segment_count() {
        let err = NamespaceId::parse("/subscriptions/sub/resourceGroups/rg1").unwrap_err();
        assert!(matches!(err, IdError::WrongSegmentCount { found: 4, .. }));
    }

    #[test]
    fn test_wrong_resource_type() {
        let err = NamespaceId::parse(
            "/subscriptions/sub/resourceGroups/rg1/providers/Microsoft.ServiceBus/namespaces/ns1",
        )
        .unwrap_err();
        assert_eq!(
            err,
            IdError::UnexpectedSegment {
                position: 5,
                expected: "Microsoft.EventHub",
                found: "Microsoft.ServiceBus".to_string(),
            }
        );
    }

    #[test]
    fn test_empty_value() {
        let err = ResourceGroupId::parse("/subscriptions//resourceGroups/rg").unwrap_err();
        assert_eq!(err, IdError::EmptyValue { name: "subscriptionId" });
    }

    #[test]
    fn test_validate_as_schema_check() {
        assert!(SubnetId::validate(
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.Network\
             /virtualNetworks/vnet/subnets/default"
        )
        .is_ok());
        assert!(SubnetId::validate(NAMESPACE).is_err());
    }

    #[test]
    fn test_nested_id_parents() {
        let endpoint = DigitalTwinsEndpointId::new("sub", "rg", "twins", "hub");
        assert_eq!(
            endpoint.to_string(),
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.DigitalTwins\
             /digitalTwinsInstances/twins/endpoints/hub"
        );
        assert_eq!(endpoint.instance_id().instance_name, "twins");

        let rule = NamespaceAuthorizationRuleId::new("sub", "rg", "ns", "rule");
        assert_eq!(
            rule.namespace_id().to_string(),
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.EventHub/namespaces/ns"
        );
    }

    #[test]
    fn test_from_str() {
        let id: ClusterId =
            "/subscriptions/sub/resourceGroups/rg/providers/Microsoft.EventHub/clusters/c1"
                .parse()
                .unwrap();
        assert_eq!(id.cluster_name, "c1");
    }
}
