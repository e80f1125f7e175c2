//! The adapter traits that bind a schema to Nomad lifecycle calls.
//!
//! Each Nomad object is implemented once as a [`Resource`] or
//! [`DataSource`] over a typed state struct. The provider never sees those
//! types: the blanket impls of [`ResourceHandler`] and [`DataSourceHandler`]
//! decode the host's JSON into the state struct at the boundary and encode
//! the result back, so the registry can hold every adapter behind one
//! trait object.

use std::time::Duration;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::NomadClient;
use crate::error::ProviderError;
use crate::helper::{parse_duration, RetryPolicy};
use crate::schema::{Attribute, Block, Diagnostic, NestedBlock, Schema, ValueValidator};
use crate::types::PlanResult;

/// What a configured provider hands to every lifecycle call.
#[derive(Debug, Clone)]
pub struct ProviderContext {
    /// The Nomad API client.
    pub client: NomadClient,
    /// Retry policy for operations that wait on Nomad.
    pub retry: RetryPolicy,
}

impl ProviderContext {
    /// Create a context.
    pub fn new(client: NomadClient, retry: RetryPolicy) -> Self {
        Self { client, retry }
    }
}

/// A managed Nomad object.
#[async_trait]
pub trait Resource: Send + Sync + 'static {
    /// Typed state, decoded from the host's JSON with nulls removed.
    type State: Serialize + DeserializeOwned + Default + Send + Sync;

    /// The resource schema.
    fn schema(&self) -> Schema;

    /// Checks that span several attributes.
    fn validate(&self, config: &Self::State) -> Vec<Diagnostic> {
        let _ = config;
        Vec::new()
    }

    /// Adjust the generic plan.
    fn customize_plan(&self, prior: Option<&Value>, plan: &mut PlanResult) {
        let _ = (prior, plan);
    }

    /// Create the object and return its state.
    async fn create(
        &self,
        ctx: &ProviderContext,
        planned: Self::State,
    ) -> Result<Self::State, ProviderError>;

    /// Refresh the state; `None` when the object no longer exists.
    async fn read(
        &self,
        ctx: &ProviderContext,
        state: Self::State,
    ) -> Result<Option<Self::State>, ProviderError>;

    /// Update the object in place.
    async fn update(
        &self,
        ctx: &ProviderContext,
        prior: Self::State,
        planned: Self::State,
    ) -> Result<Self::State, ProviderError>;

    /// Delete the object.
    async fn delete(&self, ctx: &ProviderContext, state: Self::State) -> Result<(), ProviderError>;

    /// Cheap existence check run before every read.
    async fn exists(&self, ctx: &ProviderContext, state: &Self::State) -> Result<bool, ProviderError> {
        let _ = (ctx, state);
        Ok(true)
    }

    /// The initial state for importing the object with the given id.
    fn import_state(&self, id: &str) -> Result<Self::State, ProviderError> {
        let _ = id;
        Err(ProviderError::Unimplemented("import is not supported".into()))
    }
}

/// A read-only view over Nomad.
#[async_trait]
pub trait DataSource: Send + Sync + 'static {
    /// Typed configuration and result.
    type State: Serialize + DeserializeOwned + Default + Send + Sync;

    /// The data source schema.
    fn schema(&self) -> Schema;

    /// Checks that span several attributes.
    fn validate(&self, config: &Self::State) -> Vec<Diagnostic> {
        let _ = config;
        Vec::new()
    }

    /// Query Nomad and fill in the computed attributes.
    async fn read(
        &self,
        ctx: &ProviderContext,
        config: Self::State,
    ) -> Result<Self::State, ProviderError>;
}

/// A [`Resource`] with its state type erased.
#[async_trait]
pub trait ResourceHandler: Send + Sync {
    /// The resource schema.
    fn schema(&self) -> Schema;
    /// Adapter-specific configuration checks.
    fn validate(&self, config: &Value) -> Vec<Diagnostic>;
    /// Adjust the generic plan.
    fn customize_plan(&self, prior: Option<&Value>, plan: &mut PlanResult);
    /// See [`Resource::create`].
    async fn create(&self, ctx: &ProviderContext, planned: Value) -> Result<Value, ProviderError>;
    /// See [`Resource::read`].
    async fn read(&self, ctx: &ProviderContext, state: Value)
        -> Result<Option<Value>, ProviderError>;
    /// See [`Resource::update`].
    async fn update(
        &self,
        ctx: &ProviderContext,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError>;
    /// See [`Resource::delete`].
    async fn delete(&self, ctx: &ProviderContext, state: Value) -> Result<(), ProviderError>;
    /// See [`Resource::exists`].
    async fn exists(&self, ctx: &ProviderContext, state: &Value) -> Result<bool, ProviderError>;
    /// See [`Resource::import_state`].
    fn import_state(&self, id: &str) -> Result<Value, ProviderError>;
}

#[async_trait]
impl<R: Resource> ResourceHandler for R {
    fn schema(&self) -> Schema {
        Resource::schema(self)
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        match decode::<R::State>(config.clone()) {
            Ok(state) => Resource::validate(self, &state),
            Err(e) => vec![Diagnostic::error("Invalid configuration").with_detail(e.to_string())],
        }
    }

    fn customize_plan(&self, prior: Option<&Value>, plan: &mut PlanResult) {
        Resource::customize_plan(self, prior, plan)
    }

    async fn create(&self, ctx: &ProviderContext, planned: Value) -> Result<Value, ProviderError> {
        let state = Resource::create(self, ctx, decode(planned)?).await?;
        encode(&state)
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        state: Value,
    ) -> Result<Option<Value>, ProviderError> {
        match Resource::read(self, ctx, decode(state)?).await? {
            Some(state) => encode(&state).map(Some),
            None => Ok(None),
        }
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        prior: Value,
        planned: Value,
    ) -> Result<Value, ProviderError> {
        let state = Resource::update(self, ctx, decode(prior)?, decode(planned)?).await?;
        encode(&state)
    }

    async fn delete(&self, ctx: &ProviderContext, state: Value) -> Result<(), ProviderError> {
        Resource::delete(self, ctx, decode(state)?).await
    }

    async fn exists(&self, ctx: &ProviderContext, state: &Value) -> Result<bool, ProviderError> {
        let state: R::State = decode(state.clone())?;
        Resource::exists(self, ctx, &state).await
    }

    fn import_state(&self, id: &str) -> Result<Value, ProviderError> {
        encode(&Resource::import_state(self, id)?)
    }
}

/// A [`DataSource`] with its state type erased.
#[async_trait]
pub trait DataSourceHandler: Send + Sync {
    /// The data source schema.
    fn schema(&self) -> Schema;
    /// Adapter-specific configuration checks.
    fn validate(&self, config: &Value) -> Vec<Diagnostic>;
    /// See [`DataSource::read`].
    async fn read(&self, ctx: &ProviderContext, config: Value) -> Result<Value, ProviderError>;
}

#[async_trait]
impl<D: DataSource> DataSourceHandler for D {
    fn schema(&self) -> Schema {
        DataSource::schema(self)
    }

    fn validate(&self, config: &Value) -> Vec<Diagnostic> {
        match decode::<D::State>(config.clone()) {
            Ok(state) => DataSource::validate(self, &state),
            Err(e) => vec![Diagnostic::error("Invalid configuration").with_detail(e.to_string())],
        }
    }

    async fn read(&self, ctx: &ProviderContext, config: Value) -> Result<Value, ProviderError> {
        let state = DataSource::read(self, ctx, decode(config)?).await?;
        encode(&state)
    }
}

/// Remove `null` object members at every depth.
///
/// The host sends unset attributes as `null`; dropping them lets
/// `#[serde(default)]` fill in the zero value.
pub fn prune_nulls(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, prune_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(prune_nulls).collect()),
        other => other,
    }
}

/// Decode a host value into a typed state.
pub fn decode<S: DeserializeOwned + Default>(value: Value) -> Result<S, ProviderError> {
    match prune_nulls(value) {
        Value::Null => Ok(S::default()),
        value => Ok(serde_json::from_value(value)?),
    }
}

/// Encode a typed state for the host.
pub fn encode<S: Serialize>(state: &S) -> Result<Value, ProviderError> {
    Ok(serde_json::to_value(state)?)
}

/// Serde default for flags that default to `true`.
pub(crate) fn default_true() -> bool {
    true
}

/// Operation timeouts configured in a `timeouts` block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    /// Create timeout as a Go duration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create: Option<String>,
    /// Read timeout as a Go duration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read: Option<String>,
    /// Update timeout as a Go duration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<String>,
    /// Delete timeout as a Go duration.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delete: Option<String>,
}

impl Timeouts {
    /// The `timeouts` block with the given operations.
    pub fn block(operations: &[&str]) -> NestedBlock {
        let block = operations.iter().fold(Block::new(), |block, op| {
            block.with_attribute(
                *op,
                Attribute::optional_string().with_validator(ValueValidator::Duration),
            )
        });
        NestedBlock::single(block)
    }

    fn resolve(value: Option<&str>, default: Duration) -> Result<Duration, ProviderError> {
        match value.filter(|v| !v.is_empty()) {
            None => Ok(default),
            Some(v) => parse_duration(v)
                .map(|nanos| Duration::from_nanos(nanos.max(0) as u64))
                .map_err(|e| ProviderError::Validation(format!("invalid timeout {:?}: {}", v, e))),
        }
    }

    /// The create timeout, or `default` when unset.
    pub fn create_or(timeouts: &Option<Self>, default: Duration) -> Result<Duration, ProviderError> {
        Self::resolve(timeouts.as_ref().and_then(|t| t.create.as_deref()), default)
    }

    /// The read timeout, or `default` when unset.
    pub fn read_or(timeouts: &Option<Self>, default: Duration) -> Result<Duration, ProviderError> {
        Self::resolve(timeouts.as_ref().and_then(|t| t.read.as_deref()), default)
    }

    /// The update timeout, or `default` when unset.
    pub fn update_or(timeouts: &Option<Self>, default: Duration) -> Result<Duration, ProviderError> {
        Self::resolve(timeouts.as_ref().and_then(|t| t.update.as_deref()), default)
    }

    /// The delete timeout, or `default` when unset.
    pub fn delete_or(timeouts: &Option<Self>, default: Duration) -> Result<Duration, ProviderError> {
        Self::resolve(timeouts.as_ref().and_then(|t| t.delete.as_deref()), default)
    }
}

/// A context for adapter tests, pointed at a mock Nomad agent.
#[cfg(test)]
pub(crate) fn test_context(address: &str) -> ProviderContext {
    let client = NomadClient::new(crate::api::ClientConfig::new(address)).unwrap();
    ProviderContext::new(client, RetryPolicy::new(Duration::from_millis(10), 3))
}
