//! `nomad_node_pool` and `nomad_node_pools`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{computed_objects, string_map_type};
use crate::api::QueryOptions;
use crate::error::{ApiResultExt, ProviderError};
use crate::resource::{DataSource, ProviderContext};
use crate::resources::node_pool::{self, NodePoolState};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

fn scheduler_config_type() -> AttributeType {
    AttributeType::object([
        ("scheduler_algorithm", AttributeType::String),
        ("memory_oversubscription", AttributeType::String),
    ])
}

/// Reads one node pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct NodePoolDataSource;

#[async_trait]
impl DataSource for NodePoolDataSource {
    type State = NodePoolState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Reads a node pool.")
            .with_id()
            .with_attribute("name", Attribute::required_string())
            .with_attribute("description", Attribute::computed_string())
            .with_attribute("meta", Attribute::string_map(AttributeFlags::computed()))
            .with_attribute(
                "scheduler_config",
                Attribute::new(scheduler_config_type(), AttributeFlags::computed()),
            )
    }

    async fn read(&self, ctx: &ProviderContext, config: NodePoolState) -> Result<NodePoolState, ProviderError> {
        let pool = ctx
            .client
            .node_pools()
            .info(&config.name)
            .await
            .with_context(|| format!("error reading node pool {:?}", config.name))?;
        Ok(node_pool::flatten(pool))
    }
}

/// Lists node pools.
#[derive(Debug, Default, Clone, Copy)]
pub struct NodePoolsDataSource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NodePoolsState {
    pub id: String,
    pub prefix: String,
    pub filter: String,
    pub node_pools: Vec<NodePoolState>,
}

#[async_trait]
impl DataSource for NodePoolsDataSource {
    type State = NodePoolsState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Lists node pools.")
            .with_id()
            .with_attribute("prefix", Attribute::optional_string())
            .with_attribute("filter", Attribute::optional_string())
            .with_attribute(
                "node_pools",
                computed_objects([
                    ("id", AttributeType::String),
                    ("name", AttributeType::String),
                    ("description", AttributeType::String),
                    ("meta", string_map_type()),
                    ("scheduler_config", scheduler_config_type()),
                ]),
            )
    }

    async fn read(&self, ctx: &ProviderContext, config: NodePoolsState) -> Result<NodePoolsState, ProviderError> {
        let opts = QueryOptions::new()
            .with_prefix(&config.prefix)
            .with_filter(&config.filter);
        let pools = ctx
            .client
            .node_pools()
            .list(&opts)
            .await
            .context("error listing node pools")?;
        Ok(NodePoolsState {
            id: ctx.client.address().to_string(),
            node_pools: pools.into_iter().map(node_pool::flatten).collect(),
            ..config
        })
    }
}
