//! Node pool endpoints.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::serde_helpers::null_default;
use super::{ApiError, Method, NomadClient, QueryOptions};

/// Scheduler settings that override the cluster defaults for one pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NodePoolSchedulerConfiguration {
    #[serde(skip_serializing_if = "String::is_empty")]
    pub scheduler_algorithm: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_oversubscription_enabled: Option<bool>,
}

/// A node pool.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NodePool {
    pub name: String,
    pub description: String,
    #[serde(deserialize_with = "null_default")]
    pub meta: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scheduler_configuration: Option<NodePoolSchedulerConfiguration>,
    pub create_index: u64,
    pub modify_index: u64,
}

/// `/v1/node/pool` endpoints.
pub struct NodePools<'a> {
    client: &'a NomadClient,
}

impl NomadClient {
    /// Node pool endpoints.
    pub fn node_pools(&self) -> NodePools<'_> {
        NodePools { client: self }
    }
}

impl NodePools<'_> {
    pub async fn list(&self, opts: &QueryOptions) -> Result<Vec<NodePool>, ApiError> {
        self.client
            .get::<Option<Vec<_>>>("/v1/node/pools", opts)
            .await
            .map(Option::unwrap_or_default)
    }

    pub async fn info(&self, name: &str) -> Result<NodePool, ApiError> {
        self.client
            .get(&format!("/v1/node/pool/{}", name), &QueryOptions::new())
            .await
    }

    pub async fn register(&self, pool: &NodePool) -> Result<(), ApiError> {
        self.client
            .write(Method::PUT, "/v1/node/pools", Some(pool), &QueryOptions::new())
            .await
    }

    pub async fn delete(&self, name: &str) -> Result<(), ApiError> {
        self.client
            .write::<()>(
                Method::DELETE,
                &format!("/v1/node/pool/{}", name),
                None,
                &QueryOptions::new(),
            )
            .await
    }
}
