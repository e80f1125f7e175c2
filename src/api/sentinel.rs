//! Sentinel policy endpoints (Nomad Enterprise).

use serde::{Deserialize, Serialize};

use super::{ApiError, Method, NomadClient, QueryOptions};

/// A Sentinel policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SentinelPolicy {
    pub name: String,
    pub description: String,
    pub scope: String,
    pub enforcement_level: String,
    pub policy: String,
    pub create_index: u64,
    pub modify_index: u64,
}

/// `/v1/sentinel/policy` endpoints.
pub struct SentinelPolicies<'a> {
    client: &'a NomadClient,
}

impl NomadClient {
    /// Sentinel policy endpoints.
    pub fn sentinel_policies(&self) -> SentinelPolicies<'_> {
        SentinelPolicies { client: self }
    }
}

impl SentinelPolicies<'_> {
    pub async fn info(&self, name: &str) -> Result<SentinelPolicy, ApiError> {
        self.client
            .get(&format!("/v1/sentinel/policy/{}", name), &QueryOptions::new())
            .await
    }

    pub async fn upsert(&self, policy: &SentinelPolicy) -> Result<(), ApiError> {
        self.client
            .write(
                Method::POST,
                &format!("/v1/sentinel/policy/{}", policy.name),
                Some(policy),
                &QueryOptions::new(),
            )
            .await
    }

    pub async fn delete(&self, name: &str) -> Result<(), ApiError> {
        self.client
            .write::<()>(
                Method::DELETE,
                &format!("/v1/sentinel/policy/{}", name),
                None,
                &QueryOptions::new(),
            )
            .await
    }
}
