//! Namespace endpoints.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::serde_helpers::null_default;
use super::{ApiError, Method, NomadClient, QueryOptions};

/// Task driver and network mode restrictions of a namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NamespaceCapabilities {
    #[serde(deserialize_with = "null_default")]
    pub enabled_task_drivers: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub disabled_task_drivers: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub enabled_network_modes: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub disabled_network_modes: Vec<String>,
}

/// Node pools a namespace may schedule into.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NamespaceNodePoolConfiguration {
    pub default: String,
    #[serde(deserialize_with = "null_default")]
    pub allowed: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub denied: Vec<String>,
}

/// A Nomad namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Namespace {
    pub name: String,
    pub description: String,
    pub quota: String,
    #[serde(deserialize_with = "null_default")]
    pub meta: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub capabilities: Option<NamespaceCapabilities>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_pool_configuration: Option<NamespaceNodePoolConfiguration>,
    pub create_index: u64,
    pub modify_index: u64,
}

/// `/v1/namespace` endpoints.
pub struct Namespaces<'a> {
    client: &'a NomadClient,
}

impl NomadClient {
    /// Namespace endpoints.
    pub fn namespaces(&self) -> Namespaces<'_> {
        Namespaces { client: self }
    }
}

impl Namespaces<'_> {
    pub async fn list(&self, opts: &QueryOptions) -> Result<Vec<Namespace>, ApiError> {
        self.client
            .get::<Option<Vec<_>>>("/v1/namespaces", opts)
            .await
            .map(Option::unwrap_or_default)
    }

    pub async fn info(&self, name: &str) -> Result<Namespace, ApiError> {
        self.client
            .get(&format!("/v1/namespace/{}", name), &QueryOptions::new())
            .await
    }

    pub async fn register(&self, namespace: &Namespace) -> Result<(), ApiError> {
        self.client
            .write(
                Method::POST,
                &format!("/v1/namespace/{}", namespace.name),
                Some(namespace),
                &QueryOptions::new(),
            )
            .await
    }

    pub async fn delete(&self, name: &str) -> Result<(), ApiError> {
        self.client
            .write::<()>(
                Method::DELETE,
                &format!("/v1/namespace/{}", name),
                None,
                &QueryOptions::new(),
            )
            .await
    }
}
