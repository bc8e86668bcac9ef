//! Behaviour shared by namespace and Event Hub authorization rules.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::{from_body, requires_import, validate, Clients};
use crate::azure::eventhub::{
    AccessKeys, AuthorizationRule, AuthorizationRuleProperties, API_VERSION,
};
use crate::error::{ErrorContext, ProviderError};
use crate::retry::{retry_until, RetryError};
use crate::schema::{Attribute, Diagnostic, Schema};

/// The rights toggles of a rule as they appear in state.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Rights {
    #[serde(default)]
    pub listen: bool,
    #[serde(default)]
    pub send: bool,
    #[serde(default)]
    pub manage: bool,
}

impl Rights {
    /// `listen -> Listen`, `send -> Send`, `manage -> Manage`.
    pub fn expand(&self) -> Vec<String> {
        [
            (self.listen, "Listen"),
            (self.send, "Send"),
            (self.manage, "Manage"),
        ]
        .into_iter()
        .filter(|(granted, _)| *granted)
        .map(|(_, right)| right.to_string())
        .collect()
    }

    /// The reverse of [`Rights::expand`]; unknown rights are ignored.
    pub fn flatten(rights: &[String]) -> Self {
        let has = |name: &str| rights.iter().any(|r| r.eq_ignore_ascii_case(name));
        Self {
            listen: has("Listen"),
            send: has("Send"),
            manage: has("Manage"),
        }
    }

    /// Check the combination of rights ARM accepts.
    pub fn validate(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        if self.manage && !(self.listen && self.send) {
            diagnostics.push(
                Diagnostic::error(
                    "`listen` and `send` must be set to true when `manage` is set to true",
                )
                .with_attribute("manage"),
            );
        }
        if !(self.listen || self.send || self.manage) {
            diagnostics.push(Diagnostic::error(
                "at least one of `listen`, `send` or `manage` must be set to true",
            ));
        }
        diagnostics
    }
}

/// Computed keys and connection strings of a rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct RuleKeys {
    #[serde(default)]
    pub primary_key: Option<String>,
    #[serde(default)]
    pub secondary_key: Option<String>,
    #[serde(default)]
    pub primary_connection_string: Option<String>,
    #[serde(default)]
    pub secondary_connection_string: Option<String>,
    #[serde(default)]
    pub primary_connection_string_alias: Option<String>,
    #[serde(default)]
    pub secondary_connection_string_alias: Option<String>,
}

impl From<AccessKeys> for RuleKeys {
    fn from(keys: AccessKeys) -> Self {
        Self {
            primary_key: keys.primary_key,
            secondary_key: keys.secondary_key,
            primary_connection_string: keys.primary_connection_string,
            secondary_connection_string: keys.secondary_connection_string,
            primary_connection_string_alias: keys.alias_primary_connection_string,
            secondary_connection_string_alias: keys.alias_secondary_connection_string,
        }
    }
}

/// Attributes common to both rule types.
pub(crate) fn schema() -> Schema {
    let right = |description: &str| {
        Attribute::optional_bool_default(false).with_description(description)
    };
    Schema::v0()
        .with_id()
        .with_attribute(
            "name",
            Attribute::required_string()
                .with_force_new()
                .validated_by(validate::authorization_rule_name)
                .with_description("The name of the authorization rule."),
        )
        .with_attribute(
            "namespace_name",
            Attribute::required_string()
                .with_force_new()
                .validated_by(validate::eventhub_namespace_name),
        )
        .with_attribute("resource_group_name", Attribute::required_string().with_force_new())
        .with_attribute("listen", right("Grants listen access."))
        .with_attribute("send", right("Grants send access."))
        .with_attribute("manage", right("Grants manage access. Requires `listen` and `send`."))
        .with_attribute("primary_key", Attribute::computed_secret())
        .with_attribute("secondary_key", Attribute::computed_secret())
        .with_attribute("primary_connection_string", Attribute::computed_secret())
        .with_attribute("secondary_connection_string", Attribute::computed_secret())
        .with_attribute("primary_connection_string_alias", Attribute::computed_secret())
        .with_attribute("secondary_connection_string_alias", Attribute::computed_secret())
}

/// Rights checks on raw configuration.
pub(crate) fn validate_config(config: &Value) -> Vec<Diagnostic> {
    let flag = |name: &str| config.get(name).and_then(Value::as_bool).unwrap_or(false);
    Rights {
        listen: flag("listen"),
        send: flag("send"),
        manage: flag("manage"),
    }
    .validate()
}

/// Create the rule at `path` and wait until ARM serves it.
///
/// Rules are eventually consistent: a GET straight after a successful PUT
/// can still answer 404 for a while.
pub(crate) async fn create(
    clients: &Clients,
    path: &str,
    rights: Rights,
    timeout: Duration,
) -> Result<(), ProviderError> {
    let existing = clients
        .arm
        .get(path, API_VERSION)
        .await
        .with_context(|| {
            format!("checking for presence of existing Authorization Rule {:?}", path)
        })?;
    if existing.is_some() {
        return Err(requires_import(path));
    }

    put(clients, path, rights).await.context(format!("creating Authorization Rule {:?}", path))?;

    retry_until(timeout, clients.arm.poll_interval(), || async move {
        match clients.arm.get(path, API_VERSION).await {
            Ok(Some(_)) => Ok(()),
            Ok(None) => Err(RetryError::Retryable(ProviderError::NotFound(format!(
                "Authorization Rule {:?} is not visible yet",
                path
            )))),
            Err(err) => Err(RetryError::NonRetryable(err.into())),
        }
    })
    .await
    .context(format!("waiting for Authorization Rule {:?} to become available", path))
}

/// PUT the rule with the given rights.
pub(crate) async fn put(
    clients: &Clients,
    path: &str,
    rights: Rights,
) -> Result<(), ProviderError> {
    let body = AuthorizationRule {
        properties: AuthorizationRuleProperties {
            rights: rights.expand(),
        },
    };
    clients.arm.put_and_wait(path, API_VERSION, &body).await?;
    Ok(())
}

/// GET the rule and its keys. `None` when the rule is gone.
pub(crate) async fn read(
    clients: &Clients,
    path: &str,
) -> Result<Option<(Rights, RuleKeys)>, ProviderError> {
    let Some(body) = clients
        .arm
        .get(path, API_VERSION)
        .await
        .with_context(|| format!("retrieving Authorization Rule {:?}", path))?
    else {
        return Ok(None);
    };
    let rule: AuthorizationRule = from_body(body)?;

    let keys = clients
        .arm
        .post(&format!("{}/listKeys", path), API_VERSION, None)
        .await
        .with_context(|| format!("listing keys for Authorization Rule {:?}", path))?
        .map(from_body::<AccessKeys>)
        .transpose()?
        .map(RuleKeys::from)
        .unwrap_or_default();

    Ok(Some((Rights::flatten(&rule.properties.rights), keys)))
}
