//! Variable endpoints.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::serde_helpers::null_default;
use super::{ApiError, Method, NomadClient, QueryOptions};

/// A variable: a set of secret items stored at a path in a namespace.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Variable {
    pub namespace: String,
    pub path: String,
    #[serde(deserialize_with = "null_default")]
    pub items: HashMap<String, String>,
    pub create_index: u64,
    pub modify_index: u64,
    pub create_time: i64,
    pub modify_time: i64,
}

/// `/v1/var` endpoints.
pub struct Variables<'a> {
    client: &'a NomadClient,
}

impl NomadClient {
    /// Variable endpoints.
    pub fn variables(&self) -> Variables<'_> {
        Variables { client: self }
    }
}

impl Variables<'_> {
    pub async fn read(&self, path: &str, namespace: &str) -> Result<Variable, ApiError> {
        self.client
            .get(
                &format!("/v1/var/{}", path.trim_start_matches('/')),
                &QueryOptions::namespace(namespace),
            )
            .await
    }

    pub async fn create(&self, variable: &Variable) -> Result<Variable, ApiError> {
        self.client
            .put(
                &format!("/v1/var/{}", variable.path.trim_start_matches('/')),
                variable,
                &QueryOptions::namespace(&variable.namespace),
            )
            .await
    }

    pub async fn delete(&self, path: &str, namespace: &str) -> Result<(), ApiError> {
        self.client
            .write::<()>(
                Method::DELETE,
                &format!("/v1/var/{}", path.trim_start_matches('/')),
                None,
                &QueryOptions::namespace(namespace),
            )
            .await
    }
}
