//! CSI plugin endpoints.

use std::collections::HashMap;

use serde::Deserialize;

use super::serde_helpers::null_default;
use super::{ApiError, NomadClient, QueryMeta, QueryOptions};

/// The only plugin type Nomad lists.
pub const PLUGIN_TYPE_CSI: &str = "csi";

/// A CSI plugin as returned by the list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CsiPluginListStub {
    #[serde(rename = "ID")]
    pub id: String,
    pub provider: String,
    pub controller_required: bool,
    pub controllers_healthy: i64,
    pub controllers_expected: i64,
    pub nodes_healthy: i64,
    pub nodes_expected: i64,
    pub create_index: u64,
    pub modify_index: u64,
}

/// Health of one plugin instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CsiInfo {
    #[serde(rename = "PluginID")]
    pub plugin_id: String,
    #[serde(rename = "AllocID")]
    pub alloc_id: String,
    pub healthy: bool,
    pub health_description: String,
}

/// A CSI plugin.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CsiPlugin {
    #[serde(rename = "ID")]
    pub id: String,
    pub provider: String,
    pub version: String,
    pub controller_required: bool,
    #[serde(deserialize_with = "null_default")]
    pub controllers: HashMap<String, CsiInfo>,
    #[serde(deserialize_with = "null_default")]
    pub nodes: HashMap<String, CsiInfo>,
    pub controllers_healthy: i64,
    pub controllers_expected: i64,
    pub nodes_healthy: i64,
    pub nodes_expected: i64,
    pub create_index: u64,
    pub modify_index: u64,
}

impl CsiPlugin {
    /// Whether every expected controller and node instance is healthy.
    pub fn is_healthy(&self) -> bool {
        self.controllers_healthy == self.controllers_expected
            && self.nodes_healthy == self.nodes_expected
    }
}

/// `/v1/plugin` endpoints.
pub struct CsiPlugins<'a> {
    client: &'a NomadClient,
}

impl NomadClient {
    /// CSI plugin endpoints.
    pub fn csi_plugins(&self) -> CsiPlugins<'_> {
        CsiPlugins { client: self }
    }
}

impl CsiPlugins<'_> {
    pub async fn list(&self, opts: &QueryOptions) -> Result<Vec<CsiPluginListStub>, ApiError> {
        let opts = opts.clone().with_param("type", PLUGIN_TYPE_CSI);
        self.client
            .get::<Option<Vec<_>>>("/v1/plugins", &opts)
            .await
            .map(Option::unwrap_or_default)
    }

    /// Fetch a plugin; pass wait options to block until it changes.
    pub async fn info(
        &self,
        id: &str,
        opts: &QueryOptions,
    ) -> Result<(CsiPlugin, QueryMeta), ApiError> {
        self.client
            .query(&format!("/v1/plugin/csi/{}", id), opts)
            .await
    }
}
