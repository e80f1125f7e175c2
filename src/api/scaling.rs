//! Scaling policy endpoints.

use std::collections::HashMap;

use serde::Deserialize;

use super::serde_helpers::null_default;
use super::{ApiError, NomadClient, QueryOptions};

/// A scaling policy as returned by the list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ScalingPolicyListStub {
    #[serde(rename = "ID")]
    pub id: String,
    pub enabled: bool,
    #[serde(rename = "Type")]
    pub policy_type: String,
    #[serde(deserialize_with = "null_default")]
    pub target: HashMap<String, String>,
    pub create_index: u64,
    pub modify_index: u64,
}

/// A scaling policy.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ScalingPolicy {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "Type")]
    pub policy_type: String,
    #[serde(deserialize_with = "null_default")]
    pub target: HashMap<String, String>,
    #[serde(deserialize_with = "null_default")]
    pub policy: serde_json::Map<String, serde_json::Value>,
    pub enabled: Option<bool>,
    pub min: Option<i64>,
    pub max: Option<i64>,
    pub create_index: u64,
    pub modify_index: u64,
}

/// `/v1/scaling` endpoints.
pub struct ScalingPolicies<'a> {
    client: &'a NomadClient,
}

impl NomadClient {
    /// Scaling policy endpoints.
    pub fn scaling_policies(&self) -> ScalingPolicies<'_> {
        ScalingPolicies { client: self }
    }
}

impl ScalingPolicies<'_> {
    pub async fn list(&self, opts: &QueryOptions) -> Result<Vec<ScalingPolicyListStub>, ApiError> {
        self.client
            .get::<Option<Vec<_>>>("/v1/scaling/policies", opts)
            .await
            .map(Option::unwrap_or_default)
    }

    pub async fn info(&self, id: &str) -> Result<ScalingPolicy, ApiError> {
        self.client
            .get(&format!("/v1/scaling/policy/{}", id), &QueryOptions::new())
            .await
    }
}
