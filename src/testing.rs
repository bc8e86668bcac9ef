//! Driving the provider without gRPC.
//!
//! [`ProviderTester`] calls a [`ProviderService`] directly and runs the same
//! sequence Hemmer does (validate, plan, apply, refresh). Integration tests
//! point [`ProviderTester::against`] at a mock Resource Manager.
//!
//! ```ignore
//! let tester = ProviderTester::against(&server.uri()).await?;
//! let state = tester
//!     .apply_create("azurerm_eventhub_namespace", json!({ "name": "acctest-ns1", ... }))
//!     .await?;
//! assert_eq!(state["sku"], "Standard");
//! ```

use std::fmt;

use serde_json::{json, Value};

use crate::error::ProviderError;
use crate::provider::AzureRmProvider;
use crate::schema::{has_errors, Diagnostic, DiagnosticSeverity};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// Subscription used by [`ProviderTester::against`].
pub const TEST_SUBSCRIPTION_ID: &str = "00000000-0000-0000-0000-000000000000";
/// Tenant used by [`ProviderTester::against`]; tokens are requested from
/// `{endpoint}/{TEST_TENANT_ID}/oauth2/v2.0/token`.
pub const TEST_TENANT_ID: &str = "tenant";

/// A provider plus the plumbing to run whole operations against it.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl ProviderTester<AzureRmProvider> {
    /// A configured provider whose Resource Manager and token endpoints both
    /// live at `endpoint`. Polls without delay.
    pub async fn against(endpoint: &str) -> Result<Self, TestError> {
        let tester = Self::new(AzureRmProvider::with_env(|_| None));
        tester
            .configure(json!({
                "subscription_id": TEST_SUBSCRIPTION_ID,
                "tenant_id": TEST_TENANT_ID,
                "client_id": "client",
                "client_secret": "secret",
                "resource_manager_endpoint": endpoint,
                "authority_host": endpoint,
                "operation_poll_interval": 0
            }))
            .await?;
        Ok(tester)
    }
}

impl<P: ProviderService> ProviderTester<P> {
    /// Wrap `provider`.
    pub fn new(provider: P) -> Self {
        Self { provider }
    }

    /// The wrapped provider.
    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Configure the provider; error diagnostics become [`TestError::Diagnostics`].
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        check(self.provider.configure(config).await?)
    }

    /// Validate a resource configuration.
    pub async fn validate(&self, resource_type: &str, config: Value) -> Result<(), TestError> {
        check(self.provider.validate_resource_config(resource_type, config).await?)
    }

    /// Plan a change. `prior` is `None` for a create, `proposed` is `null`
    /// for a destroy.
    pub async fn plan(
        &self,
        resource_type: &str,
        prior: Option<Value>,
        proposed: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, prior, proposed.clone(), proposed)
            .await
    }

    /// Refresh; `None` when the remote object is gone.
    pub async fn refresh(
        &self,
        resource_type: &str,
        state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let state = self.provider.read(resource_type, state).await?;
        Ok((!state.is_null()).then_some(state))
    }

    /// Import by ID and return the single imported state.
    pub async fn import(&self, resource_type: &str, id: &str) -> Result<Value, TestError> {
        let mut imported: Vec<ImportedResource> =
            self.provider.import_resource(resource_type, id).await?;
        match imported.pop() {
            Some(resource) if imported.is_empty() => Ok(resource.state),
            _ => Err(TestError::Unexpected(format!(
                "expected exactly one imported {}",
                resource_type
            ))),
        }
    }

    /// Validate, plan and create.
    pub async fn apply_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Value, TestError> {
        self.validate(resource_type, config.clone()).await?;
        let plan = self.plan(resource_type, None, config).await?;
        Ok(self.provider.create(resource_type, plan.planned_state).await?)
    }

    /// Validate, plan and update in place. Fails if the plan demands a
    /// replacement.
    pub async fn apply_update(
        &self,
        resource_type: &str,
        prior: Value,
        config: Value,
    ) -> Result<Value, TestError> {
        self.validate(resource_type, config.clone()).await?;
        let plan = self.plan(resource_type, Some(prior.clone()), config).await?;
        if plan.requires_replace {
            return Err(TestError::Unexpected(format!(
                "{} update requires replacement",
                resource_type
            )));
        }
        Ok(self.provider.update(resource_type, prior, plan.planned_state).await?)
    }

    /// Plan a destroy and delete.
    pub async fn apply_delete(&self, resource_type: &str, state: Value) -> Result<(), TestError> {
        let plan = self.plan(resource_type, Some(state.clone()), Value::Null).await?;
        if !plan.planned_state.is_null() {
            return Err(TestError::Unexpected("destroy plan kept a state".to_string()));
        }
        Ok(self.provider.delete(resource_type, state).await?)
    }

    /// Read a data source.
    pub async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, TestError> {
        check(
            self.provider
                .validate_data_source_config(data_source_type, config.clone())
                .await?,
        )?;
        Ok(self.provider.read_data_source(data_source_type, config).await?)
    }
}

/// Why a tester call failed.
#[derive(Debug)]
pub enum TestError {
    /// Validation or configure returned error diagnostics.
    Diagnostics(Vec<Diagnostic>),
    /// The provider returned an error.
    Provider(ProviderError),
    /// The provider answered, but not in the way the call expects.
    Unexpected(String),
}

impl TestError {
    /// The provider error, if that is what this is.
    pub fn provider_error(&self) -> Option<&ProviderError> {
        match self {
            Self::Provider(err) => Some(err),
            _ => None,
        }
    }
}

impl fmt::Display for TestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Diagnostics(diagnostics) => {
                write!(f, "{} error diagnostic(s):", diagnostics.len())?;
                for diagnostic in diagnostics {
                    write!(f, " [{}]", diagnostic.summary)?;
                    if let Some(attribute) = &diagnostic.attribute {
                        write!(f, " at {}", attribute)?;
                    }
                }
                Ok(())
            }
            Self::Provider(err) => write!(f, "provider error: {}", err),
            Self::Unexpected(msg) => f.write_str(msg),
        }
    }
}

impl std::error::Error for TestError {}

impl From<ProviderError> for TestError {
    fn from(err: ProviderError) -> Self {
        Self::Provider(err)
    }
}

fn check(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    if !has_errors(&diagnostics) {
        return Ok(());
    }
    Err(TestError::Diagnostics(
        diagnostics
            .into_iter()
            .filter(|d| d.severity == DiagnosticSeverity::Error)
            .collect(),
    ))
}

/// Assert that a plan replaces the resource.
///
/// # Panics
///
/// Panics if the plan updates in place or has no changes.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(!plan.changes.is_empty(), "expected changes, got none");
    assert!(plan.requires_replace, "expected a replacement, got an in-place update");
}

/// Assert that a plan changes `path`.
///
/// # Panics
///
/// Panics if no change has that path.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "expected a change to {:?}, changed: {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that some error diagnostic mentions `substring`.
///
/// # Panics
///
/// Panics if none does.
pub fn assert_error_contains(err: &TestError, substring: &str) {
    let found = match err {
        TestError::Diagnostics(diagnostics) => {
            diagnostics.iter().any(|d| d.summary.contains(substring))
        },
        TestError::Provider(err) => err.message().contains(substring),
        TestError::Unexpected(msg) => msg.contains(substring),
    };
    assert!(found, "expected an error mentioning {:?}, got: {}", substring, err);
}
