//! The Nomad provider: configuration plus dispatch into the registry.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;
use tracing::{debug, info, instrument};

use crate::api::NomadClient;
use crate::config::ProviderConfig;
use crate::error::ProviderError;
use crate::plan::plan_resource;
use crate::registry::Registry;
use crate::resource::ProviderContext;
use crate::schema::{has_errors, Diagnostic, ProviderSchema};
use crate::server::ProviderService;
use crate::types::{ImportedResource, PlanResult};
use crate::validation::validate;

type EnvLookup = Arc<dyn Fn(&str) -> Option<String> + Send + Sync>;

/// Provider for HashiCorp Nomad.
///
/// Resource calls fail with [`ProviderError::NotConfigured`] until
/// `configure` has built the API client.
pub struct NomadProvider {
    registry: Registry,
    env: EnvLookup,
    context: RwLock<Option<Arc<ProviderContext>>>,
}

impl NomadProvider {
    /// A provider serving every Nomad resource and data source.
    pub fn new() -> Self {
        Self::with_registry(Registry::nomad())
    }

    /// A provider over a custom registry.
    pub fn with_registry(registry: Registry) -> Self {
        Self {
            registry,
            env: Arc::new(|name| std::env::var(name).ok()),
            context: RwLock::new(None),
        }
    }

    /// Replace the environment lookup used by `configure`.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String> + Send + Sync + 'static,
    {
        self.env = Arc::new(lookup);
        self
    }

    /// The registry this provider dispatches to.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    async fn context(&self) -> Result<Arc<ProviderContext>, ProviderError> {
        self.context
            .read()
            .await
            .clone()
            .ok_or(ProviderError::NotConfigured)
    }
}

impl Default for NomadProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ProviderService for NomadProvider {
    fn schema(&self) -> ProviderSchema {
        self.registry
            .schema()
            .with_provider_config(ProviderConfig::schema())
    }

    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let mut diagnostics = validate(&ProviderConfig::schema(), &config);
        if !has_errors(&diagnostics) {
            diagnostics.extend(ProviderConfig::from_value(config)?.validate());
        }
        Ok(diagnostics)
    }

    #[instrument(skip(self, config))]
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let diagnostics = self.validate_provider_config(config.clone()).await?;
        if has_errors(&diagnostics) {
            return Ok(diagnostics);
        }

        let env = Arc::clone(&self.env);
        let config = ProviderConfig::from_value(config)?.merge_env(|name| env(name));
        let retry = config.retry_policy()?;
        let client = NomadClient::new(config.client_config()?)
            .map_err(|e| ProviderError::Configuration(e.to_string()))?;

        info!(address = client.address(), "Configured Nomad client");
        *self.context.write().await = Some(Arc::new(ProviderContext::new(client, retry)));
        Ok(diagnostics)
    }

    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let handler = self.registry.resource(resource_type)?;
        let mut diagnostics = validate(&handler.schema(), &config);
        if !has_errors(&diagnostics) {
            diagnostics.extend(handler.validate(&config));
        }
        Ok(diagnostics)
    }

    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        _config: Value,
    ) -> Result<PlanResult, ProviderError> {
        let handler = self.registry.resource(resource_type)?;
        let mut plan = plan_resource(&handler.schema(), prior_state.as_ref(), proposed_state);
        if !plan.is_destroy() {
            handler.customize_plan(prior_state.as_ref(), &mut plan);
        }
        Ok(plan)
    }

    #[instrument(skip(self, planned_state))]
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError> {
        let handler = self.registry.resource(resource_type)?;
        let ctx = self.context().await?;
        handler.create(&ctx, planned_state).await
    }

    #[instrument(skip(self, current_state))]
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        let handler = self.registry.resource(resource_type)?;
        let ctx = self.context().await?;
        if !handler.exists(&ctx, &current_state).await? {
            debug!(resource_type, "Resource no longer exists");
            return Ok(None);
        }
        handler.read(&ctx, current_state).await
    }

    #[instrument(skip(self, prior_state, planned_state))]
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError> {
        let handler = self.registry.resource(resource_type)?;
        let ctx = self.context().await?;
        handler.update(&ctx, prior_state, planned_state).await
    }

    #[instrument(skip(self, current_state))]
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError> {
        let handler = self.registry.resource(resource_type)?;
        let ctx = self.context().await?;
        handler.delete(&ctx, current_state).await
    }

    #[instrument(skip(self))]
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let handler = self.registry.resource(resource_type)?;
        let initial = handler.import_state(id)?;
        let ctx = self.context().await?;
        match handler.read(&ctx, initial).await? {
            Some(state) => Ok(vec![ImportedResource::new(resource_type, state)]),
            None => Err(ProviderError::NotFound(format!(
                "cannot import non-existent {} {:?}",
                resource_type, id
            ))),
        }
    }

    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let handler = self.registry.data_source(data_source_type)?;
        let mut diagnostics = validate(&handler.schema(), &config);
        if !has_errors(&diagnostics) {
            diagnostics.extend(handler.validate(&config));
        }
        Ok(diagnostics)
    }

    #[instrument(skip(self, config))]
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let handler = self.registry.data_source(data_source_type)?;
        let ctx = self.context().await?;
        handler.read(&ctx, config).await
    }
}
