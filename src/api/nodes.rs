//! Client node endpoints.

use serde::Deserialize;

use super::{ApiError, NomadClient, QueryOptions};

/// Node status reported for nodes that stopped heartbeating.
pub const NODE_STATUS_DOWN: &str = "down";

/// A client node as returned by the list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NodeListStub {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub datacenter: String,
    pub node_class: String,
    pub node_pool: String,
    pub status: String,
    pub drain: bool,
    pub scheduling_eligibility: String,
}

/// `/v1/nodes` endpoints.
pub struct Nodes<'a> {
    client: &'a NomadClient,
}

impl NomadClient {
    /// Client node endpoints.
    pub fn nodes(&self) -> Nodes<'_> {
        Nodes { client: self }
    }
}

impl Nodes<'_> {
    pub async fn list(&self, opts: &QueryOptions) -> Result<Vec<NodeListStub>, ApiError> {
        self.client
            .get::<Option<Vec<_>>>("/v1/nodes", opts)
            .await
            .map(Option::unwrap_or_default)
    }
}
