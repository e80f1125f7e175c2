//! Drive a [`ProviderService`] in tests without a gRPC server.
//!
//! # Example
//!
//! ```ignore
//! use nomad_provider::testing::ProviderTester;
//! use serde_json::json;
//! use wiremock::MockServer;
//!
//! #[tokio::test]
//! async fn test_namespace_lifecycle() {
//!     let server = MockServer::start().await;
//!     // mount the Nomad endpoints the resource calls ...
//!     let tester = ProviderTester::nomad(&server.uri()).await.unwrap();
//!     let state = tester
//!         .lifecycle_create("nomad_namespace", json!({"name": "apps"}))
//!         .await
//!         .unwrap();
//!     assert_eq!(state.unwrap()["id"], "apps");
//! }
//! ```

use serde_json::{json, Value};

use crate::error::ProviderError;
use crate::provider::NomadProvider;
use crate::schema::{Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};

/// Wraps a provider with shorthands for the host's call sequences.
pub struct ProviderTester<P: ProviderService> {
    provider: P,
}

impl ProviderTester<NomadProvider> {
    /// A configured Nomad provider pointed at `address`, with fast retries.
    ///
    /// The process environment is ignored so `NOMAD_*` variables on the
    /// test machine do not leak in.
    pub async fn nomad(address: &str) -> Result<Self, TestError> {
        let tester = Self::new(NomadProvider::new().with_env(|_| None));
        tester
            .configure(json!({
                "address": address,
                "retry_interval": "10ms",
                "retry_attempts": 3,
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

    /// The provider's schema.
    pub fn schema(&self) -> ProviderSchema {
        self.provider.schema()
    }

    /// Configure the provider; error diagnostics become [`TestError::Diagnostics`].
    pub async fn configure(&self, config: Value) -> Result<(), TestError> {
        let diagnostics = self.provider.configure(config).await?;
        check_diagnostics(diagnostics)
    }

    /// Validate a resource configuration.
    pub async fn validate_resource_config(&self, resource_type: &str, config: Value) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_resource_config(resource_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Plan a resource with no prior state.
    pub async fn plan_create(&self, resource_type: &str, proposed: Value) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, None, proposed.clone(), proposed)
            .await
    }

    /// Plan a change to an existing resource.
    pub async fn plan_update(
        &self,
        resource_type: &str,
        prior: Value,
        proposed: Value,
    ) -> Result<PlanResult, ProviderError> {
        self.provider
            .plan(resource_type, Some(prior), proposed.clone(), proposed)
            .await
    }

    /// Create a resource from a planned state.
    pub async fn create(&self, resource_type: &str, planned: Value) -> Result<Value, ProviderError> {
        self.provider.create(resource_type, planned).await
    }

    /// Refresh a resource; `None` when it is gone.
    pub async fn read(&self, resource_type: &str, state: Value) -> Result<Option<Value>, ProviderError> {
        self.provider.read(resource_type, state).await
    }

    /// Update a resource in place.
    pub async fn update(&self, resource_type: &str, prior: Value, planned: Value) -> Result<Value, ProviderError> {
        self.provider.update(resource_type, prior, planned).await
    }

    /// Delete a resource.
    pub async fn delete(&self, resource_type: &str, state: Value) -> Result<(), ProviderError> {
        self.provider.delete(resource_type, state).await
    }

    /// Import a resource by id.
    pub async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        self.provider.import_resource(resource_type, id).await
    }

    /// Validate a data source configuration.
    pub async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<(), TestError> {
        let diagnostics = self
            .provider
            .validate_data_source_config(data_source_type, config)
            .await?;
        check_diagnostics(diagnostics)
    }

    /// Read a data source.
    pub async fn read_data_source(&self, data_source_type: &str, config: Value) -> Result<Value, ProviderError> {
        self.provider.read_data_source(data_source_type, config).await
    }

    /// Plan, create, then read back the result.
    pub async fn lifecycle_create(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let plan = self.plan_create(resource_type, config).await?;
        let created = self.create(resource_type, plan.planned_state).await?;
        self.read(resource_type, created).await
    }

    /// Plan an update against `prior`, apply it, then read back the result.
    pub async fn lifecycle_update(
        &self,
        resource_type: &str,
        prior: Value,
        proposed: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let plan = self.plan_update(resource_type, prior.clone(), proposed).await?;
        let updated = self.update(resource_type, prior, plan.planned_state).await?;
        self.read(resource_type, updated).await
    }
}

/// A test call that failed with diagnostics or an error.
#[derive(Debug, thiserror::Error)]
pub enum TestError {
    /// Error diagnostics.
    #[error("{}", format_diagnostics(.0))]
    Diagnostics(Vec<Diagnostic>),
    /// A provider error.
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),
}

fn format_diagnostics(diagnostics: &[Diagnostic]) -> String {
    let mut out = format!("{} error diagnostic(s):", diagnostics.len());
    for d in diagnostics {
        out.push_str(&format!("\n  {}", d.summary));
        if let Some(detail) = &d.detail {
            out.push_str(&format!(": {}", detail));
        }
        if let Some(attribute) = &d.attribute {
            out.push_str(&format!(" (at {})", attribute));
        }
    }
    out
}

fn check_diagnostics(diagnostics: Vec<Diagnostic>) -> Result<(), TestError> {
    let errors: Vec<_> = diagnostics
        .into_iter()
        .filter(|d| d.severity == DiagnosticSeverity::Error)
        .collect();
    if errors.is_empty() {
        Ok(())
    } else {
        Err(TestError::Diagnostics(errors))
    }
}

/// Assert that a plan reports no changes.
///
/// # Panics
///
/// Panics if the plan has any change.
pub fn assert_plan_no_changes(plan: &PlanResult) {
    assert!(
        plan.changes.is_empty(),
        "expected no changes, got {:?}",
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan changes `path`.
///
/// # Panics
///
/// Panics if no change has that path.
pub fn assert_plan_changes_attribute(plan: &PlanResult, path: &str) {
    assert!(
        plan.changes.iter().any(|c| c.path == path),
        "expected a change to {:?}, got {:?}",
        path,
        plan.changes.iter().map(|c| &c.path).collect::<Vec<_>>()
    );
}

/// Assert that a plan replaces the resource.
///
/// # Panics
///
/// Panics if the plan updates in place.
pub fn assert_plan_replaces(plan: &PlanResult) {
    assert!(plan.requires_replace, "expected the plan to require replacement");
}

/// Assert that some error diagnostic's summary or detail contains `needle`.
///
/// # Panics
///
/// Panics if none does.
pub fn assert_error_contains(diagnostics: &[Diagnostic], needle: &str) {
    let found = diagnostics.iter().any(|d| {
        d.is_error()
            && (d.summary.contains(needle) || d.detail.as_deref().is_some_and(|s| s.contains(needle)))
    });
    assert!(
        found,
        "expected an error containing {:?}, got {:?}",
        needle,
        diagnostics.iter().map(|d| &d.summary).collect::<Vec<_>>()
    );
}
