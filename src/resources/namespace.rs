//! `nomad_namespace`

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::{
    ApiError, Namespace, NamespaceCapabilities, NamespaceNodePoolConfiguration, DEFAULT_NAMESPACE,
};
use crate::error::{ApiResultExt, OptionalExt, ProviderError};
use crate::helper::retry::{retry, RetryError};
use crate::resource::{ProviderContext, Resource};
use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema};

/// Message Nomad returns while jobs in the namespace are still running.
pub(crate) const NON_TERMINAL_JOBS: &str = "has non-terminal jobs";

/// Manages a namespace.
#[derive(Debug, Default, Clone, Copy)]
pub struct NamespaceResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespaceState {
    pub id: String,
    pub name: String,
    pub description: String,
    pub quota: String,
    pub meta: HashMap<String, String>,
    pub capabilities: Option<CapabilitiesState>,
    pub node_pool_config: Option<NodePoolConfigState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CapabilitiesState {
    pub enabled_task_drivers: Vec<String>,
    pub disabled_task_drivers: Vec<String>,
    pub enabled_network_modes: Vec<String>,
    pub disabled_network_modes: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodePoolConfigState {
    pub default: String,
    pub allowed: Vec<String>,
    pub denied: Vec<String>,
}

pub(crate) fn expand(state: &NamespaceState) -> Namespace {
    Namespace {
        name: state.name.clone(),
        description: state.description.clone(),
        quota: state.quota.clone(),
        meta: state.meta.clone(),
        capabilities: state.capabilities.as_ref().map(|c| NamespaceCapabilities {
            enabled_task_drivers: c.enabled_task_drivers.clone(),
            disabled_task_drivers: c.disabled_task_drivers.clone(),
            enabled_network_modes: c.enabled_network_modes.clone(),
            disabled_network_modes: c.disabled_network_modes.clone(),
        }),
        node_pool_configuration: state.node_pool_config.as_ref().map(|c| {
            NamespaceNodePoolConfiguration {
                default: c.default.clone(),
                allowed: c.allowed.clone(),
                denied: c.denied.clone(),
            }
        }),
        ..Default::default()
    }
}

pub(crate) fn flatten(namespace: Namespace) -> NamespaceState {
    NamespaceState {
        id: namespace.name.clone(),
        name: namespace.name,
        description: namespace.description,
        quota: namespace.quota,
        meta: namespace.meta,
        capabilities: namespace.capabilities.map(|c| CapabilitiesState {
            enabled_task_drivers: c.enabled_task_drivers,
            disabled_task_drivers: c.disabled_task_drivers,
            enabled_network_modes: c.enabled_network_modes,
            disabled_network_modes: c.disabled_network_modes,
        }),
        node_pool_config: namespace.node_pool_configuration.map(|c| NodePoolConfigState {
            default: c.default,
            allowed: c.allowed,
            denied: c.denied,
        }),
    }
}

/// Whether a delete failed only because jobs are still winding down.
pub(crate) fn is_non_terminal_jobs(err: &ApiError) -> bool {
    err.message_contains(NON_TERMINAL_JOBS)
}

impl NamespaceResource {
    async fn register(
        &self,
        ctx: &ProviderContext,
        state: NamespaceState,
    ) -> Result<NamespaceState, ProviderError> {
        let namespace = expand(&state);
        ctx.client
            .namespaces()
            .register(&namespace)
            .await
            .with_context(|| format!("error registering namespace {:?}", namespace.name))?;
        info!(name = %namespace.name, "Registered namespace");

        let state = NamespaceState {
            id: namespace.name.clone(),
            ..state
        };
        self.read(ctx, state)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("namespace {:?}", namespace.name)))
    }
}

#[async_trait]
impl Resource for NamespaceResource {
    type State = NamespaceState;

    fn schema(&self) -> Schema {
        let list = || Attribute::string_list(AttributeFlags::optional());
        let set = || Attribute::string_set(AttributeFlags::optional());
        Schema::v0()
            .with_description("Manages a namespace.")
            .with_id()
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Unique name for this namespace."),
            )
            .with_attribute("description", Attribute::optional_string())
            .with_attribute(
                "quota",
                Attribute::optional_string().with_description("Quota to attach to the namespace."),
            )
            .with_attribute("meta", Attribute::string_map(AttributeFlags::optional()))
            .with_block(
                "capabilities",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("enabled_task_drivers", list())
                        .with_attribute("disabled_task_drivers", list())
                        .with_attribute("enabled_network_modes", list())
                        .with_attribute("disabled_network_modes", list()),
                ),
            )
            .with_block(
                "node_pool_config",
                NestedBlock::single(
                    Block::new()
                        .with_attribute("default", Attribute::optional_computed_string())
                        .with_attribute("allowed", set())
                        .with_attribute("denied", set()),
                ),
            )
    }

    async fn create(
        &self,
        ctx: &ProviderContext,
        planned: NamespaceState,
    ) -> Result<NamespaceState, ProviderError> {
        self.register(ctx, planned).await
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        state: NamespaceState,
    ) -> Result<Option<NamespaceState>, ProviderError> {
        let namespace = ctx
            .client
            .namespaces()
            .info(&state.id)
            .await
            .with_context(|| format!("error reading namespace {:?}", state.id))
            .optional()?;
        Ok(namespace.map(flatten))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        _prior: NamespaceState,
        planned: NamespaceState,
    ) -> Result<NamespaceState, ProviderError> {
        self.register(ctx, planned).await
    }

    async fn delete(&self, ctx: &ProviderContext, state: NamespaceState) -> Result<(), ProviderError> {
        let name = state.id.as_str();
        if name == DEFAULT_NAMESPACE {
            // The default namespace cannot be deleted, only reset.
            warn!("Resetting the default namespace instead of deleting it");
            return ctx
                .client
                .namespaces()
                .register(&Namespace {
                    name: DEFAULT_NAMESPACE.to_string(),
                    description: "Default shared namespace".to_string(),
                    ..Default::default()
                })
                .await
                .context("error resetting the default namespace");
        }

        let client = &ctx.client;
        retry("delete namespace", ctx.retry.backoff(), move || async move {
            client.namespaces().delete(name).await.map_err(|e| {
                let transient = is_non_terminal_jobs(&e);
                let err = ProviderError::api(format!("error deleting namespace {:?}", name), e);
                if transient {
                    RetryError::transient(err)
                } else {
                    RetryError::permanent(err)
                }
            })
        })
        .await?;
        info!(name, "Deleted namespace");
        Ok(())
    }

    fn import_state(&self, id: &str) -> Result<NamespaceState, ProviderError> {
        Ok(NamespaceState {
            id: id.to_string(),
            name: id.to_string(),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::test_context;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_expand_flatten() {
        let state = NamespaceState {
            id: "ops".into(),
            name: "ops".into(),
            description: "operations".into(),
            quota: "small".into(),
            meta: HashMap::from([("team".to_string(), "sre".to_string())]),
            capabilities: Some(CapabilitiesState {
                enabled_task_drivers: vec!["docker".into()],
                ..Default::default()
            }),
            node_pool_config: Some(NodePoolConfigState {
                default: "prod".into(),
                allowed: vec!["prod".into(), "dev".into()],
                denied: vec![],
            }),
        };
        assert_eq!(flatten(expand(&state)), state);
    }

    #[tokio::test]
    async fn test_delete_retries_non_terminal_jobs() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/namespace/ops"))
            .respond_with(
                ResponseTemplate::new(500)
                    .set_body_string("namespace \"ops\" has non-terminal jobs in regions: [global]"),
            )
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("DELETE"))
            .and(path("/v1/namespace/ops"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let state = NamespaceResource.import_state("ops").unwrap();
        NamespaceResource.delete(&ctx, state).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_gives_up_after_attempts() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/namespace/ops"))
            .respond_with(ResponseTemplate::new(500).set_body_string("namespace has non-terminal jobs"))
            .expect(3)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let state = NamespaceResource.import_state("ops").unwrap();
        assert!(NamespaceResource.delete(&ctx, state).await.is_err());
    }

    #[tokio::test]
    async fn test_delete_default_namespace_resets_it() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/namespace/default"))
            .and(body_partial_json(json!({"Name": "default", "Description": "Default shared namespace"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let state = NamespaceResource.import_state("default").unwrap();
        NamespaceResource.delete(&ctx, state).await.unwrap();
    }
}
