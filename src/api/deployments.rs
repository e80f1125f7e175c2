//! Deployment endpoints.

use serde::Deserialize;

use super::{ApiError, NomadClient, QueryOptions};

/// Deployment statuses after which a deployment makes no further progress.
pub const TERMINAL_DEPLOYMENT_STATUSES: [&str; 4] = ["successful", "failed", "cancelled", "paused"];

/// A deployment of a job version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Deployment {
    #[serde(rename = "ID")]
    pub id: String,
    pub namespace: String,
    #[serde(rename = "JobID")]
    pub job_id: String,
    pub job_version: u64,
    pub job_modify_index: u64,
    pub job_create_index: u64,
    pub status: String,
    pub status_description: String,
    pub create_index: u64,
    pub modify_index: u64,
}

impl Deployment {
    /// Whether the deployment has stopped progressing.
    pub fn is_terminal(&self) -> bool {
        TERMINAL_DEPLOYMENT_STATUSES.contains(&self.status.as_str())
    }
}

/// `/v1/deployment` endpoints.
pub struct Deployments<'a> {
    client: &'a NomadClient,
}

impl NomadClient {
    /// Deployment endpoints.
    pub fn deployments(&self) -> Deployments<'_> {
        Deployments { client: self }
    }
}

impl Deployments<'_> {
    pub async fn list(&self, opts: &QueryOptions) -> Result<Vec<Deployment>, ApiError> {
        self.client
            .get::<Option<Vec<_>>>("/v1/deployments", opts)
            .await
            .map(Option::unwrap_or_default)
    }

    pub async fn info(&self, id: &str, opts: &QueryOptions) -> Result<Deployment, ApiError> {
        self.client
            .get(&format!("/v1/deployment/{}", id), opts)
            .await
    }
}
