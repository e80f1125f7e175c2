//! `nomad_datacenters`

use std::collections::BTreeSet;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::api::{NodeListStub, QueryOptions, NODE_STATUS_DOWN};
use crate::error::{ApiResultExt, ProviderError};
use crate::resource::{DataSource, ProviderContext};
use crate::schema::{Attribute, AttributeFlags, Schema};

/// Datacenters that have at least one client node.
#[derive(Debug, Default, Clone, Copy)]
pub struct DatacentersDataSource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatacentersState {
    pub id: String,
    pub prefix: String,
    pub ignore_down_nodes: bool,
    pub datacenters: Vec<String>,
}

/// The sorted, distinct datacenters of `nodes` that start with `prefix`.
///
/// With `ignore_down` set, nodes reported down do not count.
pub fn filter_datacenters(nodes: &[NodeListStub], prefix: &str, ignore_down: bool) -> Vec<String> {
    nodes
        .iter()
        .filter(|node| !(ignore_down && node.status == NODE_STATUS_DOWN))
        .filter(|node| node.datacenter.starts_with(prefix))
        .map(|node| node.datacenter.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

#[async_trait]
impl DataSource for DatacentersDataSource {
    type State = DatacentersState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Lists the datacenters of the cluster's client nodes.")
            .with_id()
            .with_attribute("prefix", Attribute::optional_string())
            .with_attribute(
                "ignore_down_nodes",
                Attribute::optional_bool()
                    .with_default(false)
                    .with_description("Skip datacenters whose only nodes are down."),
            )
            .with_attribute(
                "datacenters",
                Attribute::string_list(AttributeFlags::computed()),
            )
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        config: DatacentersState,
    ) -> Result<DatacentersState, ProviderError> {
        let nodes = ctx
            .client
            .nodes()
            .list(&QueryOptions::new())
            .await
            .context("error listing nodes")?;
        Ok(DatacentersState {
            id: ctx.client.address().to_string(),
            datacenters: filter_datacenters(&nodes, &config.prefix, config.ignore_down_nodes),
            ..config
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn node(datacenter: &str, status: &str) -> NodeListStub {
        NodeListStub {
            datacenter: datacenter.to_string(),
            status: status.to_string(),
            ..Default::default()
        }
    }

    fn nodes() -> Vec<NodeListStub> {
        vec![node("dc1", "ready"), node("dc1", "ready"), node("dc2", "down")]
    }

    #[rstest]
    #[case("", false, &["dc1", "dc2"])]
    #[case("", true, &["dc1"])]
    #[case("dc2", false, &["dc2"])]
    #[case("not-there", false, &[])]
    fn test_filter_datacenters(#[case] prefix: &str, #[case] ignore_down: bool, #[case] expected: &[&str]) {
        assert_eq!(filter_datacenters(&nodes(), prefix, ignore_down), expected);
    }

    #[test]
    fn test_no_nodes_is_empty_list() {
        let state = DatacentersState {
            datacenters: filter_datacenters(&[], "", false),
            ..Default::default()
        };
        assert_eq!(serde_json::to_value(&state).unwrap()["datacenters"], serde_json::json!([]));
    }
}
