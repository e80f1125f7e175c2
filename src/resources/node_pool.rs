//! `nomad_node_pool`

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::namespace::is_non_terminal_jobs;
use crate::api::{NodePool, NodePoolSchedulerConfiguration};
use crate::error::{ApiResultExt, OptionalExt, ProviderError};
use crate::helper::retry::{retry, RetryError};
use crate::resource::{ProviderContext, Resource};
use crate::schema::{Attribute, AttributeFlags, Block, Diagnostic, NestedBlock, Schema};

const BUILT_IN_POOLS: [&str; 2] = ["all", "default"];

/// Manages a node pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct NodePoolResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodePoolState {
    pub id: String,
    pub name: String,
    pub description: String,
    pub meta: HashMap<String, String>,
    pub scheduler_config: Option<PoolSchedulerState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolSchedulerState {
    pub scheduler_algorithm: String,
    /// `"enabled"`, `"disabled"` or empty to inherit the cluster setting.
    pub memory_oversubscription: String,
}

pub(crate) fn expand(state: &NodePoolState) -> NodePool {
    NodePool {
        name: state.name.clone(),
        description: state.description.clone(),
        meta: state.meta.clone(),
        scheduler_configuration: state.scheduler_config.as_ref().map(|c| {
            NodePoolSchedulerConfiguration {
                scheduler_algorithm: c.scheduler_algorithm.clone(),
                memory_oversubscription_enabled: match c.memory_oversubscription.as_str() {
                    "enabled" => Some(true),
                    "disabled" => Some(false),
                    _ => None,
                },
            }
        }),
        ..Default::default()
    }
}

pub(crate) fn flatten(pool: NodePool) -> NodePoolState {
    NodePoolState {
        id: pool.name.clone(),
        name: pool.name,
        description: pool.description,
        meta: pool.meta,
        scheduler_config: pool.scheduler_configuration.map(|c| PoolSchedulerState {
            scheduler_algorithm: c.scheduler_algorithm,
            memory_oversubscription: match c.memory_oversubscription_enabled {
                Some(true) => "enabled".to_string(),
                Some(false) => "disabled".to_string(),
                None => String::new(),
            },
        }),
    }
}

impl NodePoolResource {
    async fn register(
        &self,
        ctx: &ProviderContext,
        state: NodePoolState,
    ) -> Result<NodePoolState, ProviderError> {
        let pool = expand(&state);
        ctx.client
            .node_pools()
            .register(&pool)
            .await
            .with_context(|| format!("error registering node pool {:?}", pool.name))?;
        info!(name = %pool.name, "Registered node pool");

        let state = NodePoolState {
            id: pool.name.clone(),
            ..state
        };
        self.read(ctx, state)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("node pool {:?}", pool.name)))
    }
}

#[async_trait]
impl Resource for NodePoolResource {
    type State = NodePoolState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Manages a node pool.")
            .with_id()
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Unique name for this node pool."),
            )
            .with_attribute("description", Attribute::optional_string())
            .with_attribute("meta", Attribute::string_map(AttributeFlags::optional()))
            .with_block(
                "scheduler_config",
                NestedBlock::single(
                    Block::new()
                        .with_attribute(
                            "scheduler_algorithm",
                            Attribute::optional_string().one_of(["binpack", "spread"]),
                        )
                        .with_attribute(
                            "memory_oversubscription",
                            Attribute::optional_string().one_of(["enabled", "disabled"]),
                        ),
                ),
            )
    }

    fn validate(&self, config: &NodePoolState) -> Vec<Diagnostic> {
        if BUILT_IN_POOLS.contains(&config.name.as_str()) {
            vec![Diagnostic::error(format!(
                "node pool {:?} is built-in and cannot be managed",
                config.name
            ))
            .with_attribute("name")]
        } else {
            Vec::new()
        }
    }

    async fn create(
        &self,
        ctx: &ProviderContext,
        planned: NodePoolState,
    ) -> Result<NodePoolState, ProviderError> {
        self.register(ctx, planned).await
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        state: NodePoolState,
    ) -> Result<Option<NodePoolState>, ProviderError> {
        let pool = ctx
            .client
            .node_pools()
            .info(&state.id)
            .await
            .with_context(|| format!("error reading node pool {:?}", state.id))
            .optional()?;
        Ok(pool.map(flatten))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        _prior: NodePoolState,
        planned: NodePoolState,
    ) -> Result<NodePoolState, ProviderError> {
        self.register(ctx, planned).await
    }

    async fn delete(&self, ctx: &ProviderContext, state: NodePoolState) -> Result<(), ProviderError> {
        let client = &ctx.client;
        let name = state.id.as_str();
        retry("delete node pool", ctx.retry.backoff(), move || async move {
            client.node_pools().delete(name).await.map_err(|e| {
                let transient = is_non_terminal_jobs(&e);
                let err = ProviderError::api(format!("error deleting node pool {:?}", name), e);
                if transient {
                    RetryError::transient(err)
                } else {
                    RetryError::permanent(err)
                }
            })
        })
        .await?;
        info!(name, "Deleted node pool");
        Ok(())
    }

    fn import_state(&self, id: &str) -> Result<NodePoolState, ProviderError> {
        Ok(NodePoolState {
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
    use rstest::rstest;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[rstest]
    #[case("enabled", Some(true))]
    #[case("disabled", Some(false))]
    #[case("", None)]
    fn test_memory_oversubscription(#[case] setting: &str, #[case] expected: Option<bool>) {
        let state = NodePoolState {
            id: "prod".into(),
            name: "prod".into(),
            scheduler_config: Some(PoolSchedulerState {
                scheduler_algorithm: "spread".into(),
                memory_oversubscription: setting.into(),
            }),
            ..Default::default()
        };
        let pool = expand(&state);
        assert_eq!(
            pool.scheduler_configuration
                .as_ref()
                .unwrap()
                .memory_oversubscription_enabled,
            expected
        );
        assert_eq!(flatten(pool), state);
    }

    #[test]
    fn test_built_in_pools_rejected() {
        let state = NodePoolState {
            name: "default".into(),
            ..Default::default()
        };
        assert_eq!(NodePoolResource.validate(&state).len(), 1);
    }

    #[tokio::test]
    async fn test_delete_other_errors_are_permanent() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/node/pool/prod"))
            .respond_with(ResponseTemplate::new(403).set_body_string("Permission denied"))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let state = NodePoolResource.import_state("prod").unwrap();
        let err = NodePoolResource.delete(&ctx, state).await.unwrap_err();
        assert!(matches!(err, ProviderError::Api { .. }));
    }
}
