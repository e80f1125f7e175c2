//! Quota specification endpoints (Nomad Enterprise).

use serde::{Deserialize, Serialize};

use super::serde_helpers::null_default;
use super::{ApiError, Method, NomadClient, QueryOptions};

/// Resource limits of a quota, a subset of a task's resources.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct QuotaResources {
    #[serde(rename = "CPU", skip_serializing_if = "Option::is_none")]
    pub cpu: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cores: Option<i64>,
    #[serde(rename = "MemoryMB", skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<i64>,
    #[serde(rename = "MemoryMaxMB", skip_serializing_if = "Option::is_none")]
    pub memory_max_mb: Option<i64>,
}

/// The limit a quota applies in one region.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct QuotaLimit {
    pub region: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region_limit: Option<QuotaResources>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variables_limit: Option<i64>,
}

/// A quota specification.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct QuotaSpec {
    pub name: String,
    pub description: String,
    #[serde(deserialize_with = "null_default")]
    pub limits: Vec<QuotaLimit>,
    pub create_index: u64,
    pub modify_index: u64,
}

/// `/v1/quota` endpoints.
pub struct Quotas<'a> {
    client: &'a NomadClient,
}

impl NomadClient {
    /// Quota specification endpoints.
    pub fn quotas(&self) -> Quotas<'_> {
        Quotas { client: self }
    }
}

impl Quotas<'_> {
    pub async fn info(&self, name: &str) -> Result<QuotaSpec, ApiError> {
        self.client
            .get(&format!("/v1/quota/{}", name), &QueryOptions::new())
            .await
    }

    pub async fn register(&self, spec: &QuotaSpec) -> Result<(), ApiError> {
        self.client
            .write(Method::POST, "/v1/quota", Some(spec), &QueryOptions::new())
            .await
    }

    pub async fn delete(&self, name: &str) -> Result<(), ApiError> {
        self.client
            .write::<()>(
                Method::DELETE,
                &format!("/v1/quota/{}", name),
                None,
                &QueryOptions::new(),
            )
            .await
    }
}
