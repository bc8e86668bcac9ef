//! Provider configuration.
//!
//! Values come from the provider block first and fall back to the usual
//! `ARM_*` environment variables.

use std::time::Duration;

use serde::Deserialize;
use serde_json::Value;
use url::Url;

use crate::azure::auth::DEFAULT_MSI_ENDPOINT;
use crate::azure::Credential;
use crate::error::ProviderError;
use crate::schema::{Attribute, Schema};

/// Default delay between long running operation polls.
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 10;

/// An Azure cloud and its well known endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CloudEnvironment {
    /// Azure public cloud.
    #[default]
    Public,
    /// Azure US Government.
    UsGovernment,
    /// Azure China (21Vianet).
    China,
}

impl CloudEnvironment {
    /// Accepted names for `environment` / `ARM_ENVIRONMENT`.
    pub const NAMES: &'static [&'static str] = &["public", "usgovernment", "china"];

    /// Parse an environment name, ignoring case.
    pub fn parse(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "public" => Some(Self::Public),
            "usgovernment" => Some(Self::UsGovernment),
            "china" => Some(Self::China),
            _ => None,
        }
    }

    /// Resource Manager endpoint.
    pub fn resource_manager(&self) -> &'static str {
        match self {
            Self::Public => "https://management.azure.com/",
            Self::UsGovernment => "https://management.usgovcloudapi.net/",
            Self::China => "https://management.chinacloudapi.cn/",
        }
    }

    /// Microsoft Entra ID authority.
    pub fn authority_host(&self) -> &'static str {
        match self {
            Self::Public => "https://login.microsoftonline.com/",
            Self::UsGovernment => "https://login.microsoftonline.us/",
            Self::China => "https://login.chinacloudapi.cn/",
        }
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawConfig {
    subscription_id: Option<String>,
    tenant_id: Option<String>,
    client_id: Option<String>,
    client_secret: Option<String>,
    use_msi: Option<bool>,
    msi_endpoint: Option<String>,
    environment: Option<String>,
    resource_manager_endpoint: Option<String>,
    authority_host: Option<String>,
    operation_poll_interval: Option<u64>,
}

/// Fully resolved provider settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderConfig {
    /// Subscription every resource lives in.
    pub subscription_id: String,
    /// Cloud the endpoints default to.
    pub environment: CloudEnvironment,
    /// Resource Manager endpoint, always ending in `/`.
    pub resource_manager_endpoint: Url,
    /// How to obtain tokens.
    pub credential: Credential,
    /// Delay between long running operation polls without `Retry-After`.
    pub operation_poll_interval: Duration,
}

impl ProviderConfig {
    /// The provider block schema.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_description("Azure Resource Manager provider for Digital Twins and Event Hubs.")
            .with_attribute(
                "subscription_id",
                Attribute::optional_string()
                    .with_description("Subscription ID. Falls back to `ARM_SUBSCRIPTION_ID`."),
            )
            .with_attribute(
                "tenant_id",
                Attribute::optional_string()
                    .with_description("Tenant ID. Falls back to `ARM_TENANT_ID`."),
            )
            .with_attribute(
                "client_id",
                Attribute::optional_string()
                    .with_description("Client ID. Falls back to `ARM_CLIENT_ID`."),
            )
            .with_attribute(
                "client_secret",
                Attribute::optional_string()
                    .sensitive()
                    .with_description("Client secret. Falls back to `ARM_CLIENT_SECRET`."),
            )
            .with_attribute(
                "use_msi",
                Attribute::optional_bool()
                    .with_description(
                        "Authenticate with a managed identity. Falls back to `ARM_USE_MSI`.",
                    ),
            )
            .with_attribute(
                "msi_endpoint",
                Attribute::optional_string()
                    .with_description(
                        "Managed identity token endpoint. Falls back to `ARM_MSI_ENDPOINT`.",
                    ),
            )
            .with_attribute(
                "environment",
                Attribute::optional_string()
                    .one_of_ignoring_case(CloudEnvironment::NAMES)
                    .with_description(
                        "Cloud environment. Falls back to `ARM_ENVIRONMENT`, then `public`.",
                    ),
            )
            .with_attribute(
                "resource_manager_endpoint",
                Attribute::optional_string()
                    .with_description(
                        "Overrides the Resource Manager endpoint of the environment.",
                    ),
            )
            .with_attribute(
                "authority_host",
                Attribute::optional_string()
                    .with_description("Overrides the Entra ID authority of the environment."),
            )
            .with_attribute(
                "operation_poll_interval",
                Attribute::optional_int64()
                    .int_between(0, 3600)
                    .with_description("Seconds between long running operation polls."),
            )
    }

    /// Resolve settings from the provider block, then `env`.
    pub fn resolve<E>(config: &Value, env: E) -> Result<Self, ProviderError>
    where
        E: Fn(&str) -> Option<String>,
    {
        let raw: RawConfig = match config {
            Value::Null => RawConfig::default(),
            other => serde_json::from_value(other.clone())
                .map_err(|e| ProviderError::Configuration(e.to_string()))?,
        };

        let lookup = |value: Option<String>, var: &str| {
            value
                .or_else(|| env(var))
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let subscription_id = lookup(raw.subscription_id, "ARM_SUBSCRIPTION_ID").ok_or_else(|| {
            ProviderError::Configuration(
                "`subscription_id` must be set (or `ARM_SUBSCRIPTION_ID`)".to_string(),
            )
        })?;

        let environment = match lookup(raw.environment, "ARM_ENVIRONMENT") {
            Some(name) => CloudEnvironment::parse(&name).ok_or_else(|| {
                ProviderError::Configuration(format!(
                    "unknown environment {:?}, expected one of {:?}",
                    name,
                    CloudEnvironment::NAMES
                ))
            })?,
            None => CloudEnvironment::default(),
        };

        let resource_manager_endpoint = endpoint(
            raw.resource_manager_endpoint.as_deref(),
            environment.resource_manager(),
            "resource_manager_endpoint",
        )?;

        let use_msi = raw.use_msi.unwrap_or_else(|| {
            env("ARM_USE_MSI")
                .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "true" | "1"))
                .unwrap_or(false)
        });
        let tenant_id = lookup(raw.tenant_id, "ARM_TENANT_ID");
        let client_id = lookup(raw.client_id, "ARM_CLIENT_ID");
        let client_secret = lookup(raw.client_secret, "ARM_CLIENT_SECRET");

        let credential = match (tenant_id, client_id, client_secret) {
            (Some(tenant_id), Some(client_id), Some(client_secret)) => Credential::ClientSecret {
                authority_host: endpoint(
                    raw.authority_host.as_deref(),
                    environment.authority_host(),
                    "authority_host",
                )?,
                tenant_id,
                client_id,
                client_secret,
            },
            (_, client_id, None) if use_msi => {
                let msi_endpoint = lookup(raw.msi_endpoint, "ARM_MSI_ENDPOINT");
                Credential::ManagedIdentity {
                    endpoint: Url::parse(msi_endpoint.as_deref().unwrap_or(DEFAULT_MSI_ENDPOINT))
                        .map_err(|e| {
                            ProviderError::Configuration(format!("invalid `msi_endpoint`: {}", e))
                        })?,
                    client_id,
                }
            },
            _ => {
                return Err(ProviderError::Configuration(
                    "`tenant_id`, `client_id` and `client_secret` must all be set to authenticate \
                     with a client secret, otherwise set `use_msi` to true"
                        .to_string(),
                ))
            },
        };

        Ok(Self {
            subscription_id,
            environment,
            resource_manager_endpoint,
            credential,
            operation_poll_interval: Duration::from_secs(
                raw.operation_poll_interval
                    .unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
            ),
        })
    }
}

/// Parse an endpoint override (or the environment default) and make sure
/// relative joins keep its path.
fn endpoint(value: Option<&str>, default: &str, name: &str) -> Result<Url, ProviderError> {
    let raw = value.map(str::trim).filter(|v| !v.is_empty()).unwrap_or(default);
    let normalized = if raw.ends_with('/') {
        raw.to_string()
    } else {
        format!("{}/", raw)
    };
    Url::parse(&normalized)
        .map_err(|e| ProviderError::Configuration(format!("invalid `{}`: {}", name, e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_client_secret_from_config() {
        let config = ProviderConfig::resolve(
            &json!({
                "subscription_id": "sub",
                "tenant_id": "tenant",
                "client_id": "client",
                "client_secret": "secret"
            }),
            env(&[]),
        )
        .unwrap();

        assert_eq!(config.subscription_id, "sub");
        assert_eq!(config.environment, CloudEnvironment::Public);
        assert_eq!(config.resource_manager_endpoint.as_str(), "https://management.azure.com/");
        assert_eq!(config.operation_poll_interval, Duration::from_secs(10));
        match config.credential {
            Credential::ClientSecret { authority_host, tenant_id, .. } => {
                assert_eq!(authority_host.as_str(), "https://login.microsoftonline.com/");
                assert_eq!(tenant_id, "tenant");
            },
            other => panic!("unexpected credential: {other:?}"),
        }
    }

    #[test]
    fn test_environment_fallbacks() {
        let config = ProviderConfig::resolve(
            &json!({"subscription_id": "from-config"}),
            env(&[
                ("ARM_SUBSCRIPTION_ID", "from-env"),
                ("ARM_TENANT_ID", "tenant"),
                ("ARM_CLIENT_ID", "client"),
                ("ARM_CLIENT_SECRET", "secret"),
                ("ARM_ENVIRONMENT", "USGovernment"),
            ]),
        )
        .unwrap();

        assert_eq!(config.subscription_id, "from-config");
        assert_eq!(config.environment, CloudEnvironment::UsGovernment);
        assert_eq!(
            config.resource_manager_endpoint.as_str(),
            "https://management.usgovcloudapi.net/"
        );
    }

    #[test]
    fn test_managed_identity() {
        let config = ProviderConfig::resolve(
            &json!({"subscription_id": "sub", "client_id": "uami"}),
            env(&[("ARM_USE_MSI", "true")]),
        )
        .unwrap();

        assert_eq!(
            config.credential,
            Credential::ManagedIdentity {
                endpoint: Url::parse(DEFAULT_MSI_ENDPOINT).unwrap(),
                client_id: Some("uami".into()),
            }
        );
    }

    #[test]
    fn test_endpoint_override_gets_trailing_slash() {
        let config = ProviderConfig::resolve(
            &json!({
                "subscription_id": "sub",
                "use_msi": true,
                "resource_manager_endpoint": "http://127.0.0.1:8080/arm",
                "operation_poll_interval": 0
            }),
            env(&[]),
        )
        .unwrap();

        assert_eq!(config.resource_manager_endpoint.as_str(), "http://127.0.0.1:8080/arm/");
        assert_eq!(config.operation_poll_interval, Duration::ZERO);
    }

    #[test]
    fn test_missing_subscription() {
        let err = ProviderConfig::resolve(&json!({"use_msi": true}), env(&[])).unwrap_err();
        assert!(err.to_string().contains("subscription_id"));
    }

    #[test]
    fn test_incomplete_client_secret() {
        let err = ProviderConfig::resolve(
            &json!({"subscription_id": "sub", "tenant_id": "t", "client_secret": "s"}),
            env(&[]),
        )
        .unwrap_err();
        assert!(matches!(err, ProviderError::Configuration(_)));
        assert!(err.to_string().contains("use_msi"));
    }

    #[test]
    fn test_unknown_environment() {
        let err = ProviderConfig::resolve(
            &json!({"subscription_id": "sub", "use_msi": true, "environment": "mars"}),
            env(&[]),
        )
        .unwrap_err();
        assert!(err.to_string().contains("mars"));
    }
}
