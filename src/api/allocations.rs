//! Allocation endpoints.

use serde::Deserialize;

use super::{ApiError, NomadClient, QueryOptions};

/// An allocation as returned by the list endpoints.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AllocationListStub {
    #[serde(rename = "ID")]
    pub id: String,
    #[serde(rename = "EvalID")]
    pub eval_id: String,
    pub name: String,
    pub namespace: String,
    #[serde(rename = "NodeID")]
    pub node_id: String,
    pub node_name: String,
    #[serde(rename = "JobID")]
    pub job_id: String,
    pub job_type: String,
    pub job_version: u64,
    pub task_group: String,
    pub desired_status: String,
    pub client_status: String,
    #[serde(rename = "FollowupEvalID")]
    pub followup_eval_id: String,
    pub next_allocation: String,
    pub preempted_by_allocation: String,
    pub create_index: u64,
    pub modify_index: u64,
    pub create_time: i64,
    pub modify_time: i64,
}

/// `/v1/allocations` endpoints.
pub struct Allocations<'a> {
    client: &'a NomadClient,
}

impl NomadClient {
    /// Allocation endpoints.
    pub fn allocations(&self) -> Allocations<'_> {
        Allocations { client: self }
    }
}

impl Allocations<'_> {
    pub async fn list(&self, opts: &QueryOptions) -> Result<Vec<AllocationListStub>, ApiError> {
        self.client
            .get::<Option<Vec<_>>>("/v1/allocations", opts)
            .await
            .map(Option::unwrap_or_default)
    }
}
