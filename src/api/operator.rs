//! Operator endpoints: scheduler configuration.

use serde::{Deserialize, Serialize};

use super::{ApiError, NomadClient, QueryOptions};

/// Which schedulers may preempt lower-priority allocations.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PreemptionConfig {
    pub system_scheduler_enabled: bool,
    pub sys_batch_scheduler_enabled: bool,
    pub batch_scheduler_enabled: bool,
    pub service_scheduler_enabled: bool,
}

/// Cluster-wide scheduler configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SchedulerConfiguration {
    pub scheduler_algorithm: String,
    pub memory_oversubscription_enabled: bool,
    pub reject_job_registration: bool,
    pub pause_eval_broker: bool,
    pub preemption_config: PreemptionConfig,
    pub create_index: u64,
    pub modify_index: u64,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct SchedulerConfigurationResponse {
    scheduler_config: Option<SchedulerConfiguration>,
}

/// Result of a scheduler configuration write.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SchedulerSetConfigurationResponse {
    pub updated: bool,
    pub index: u64,
}

/// `/v1/operator` endpoints.
pub struct Operator<'a> {
    client: &'a NomadClient,
}

impl NomadClient {
    /// Operator endpoints.
    pub fn operator(&self) -> Operator<'_> {
        Operator { client: self }
    }
}

impl Operator<'_> {
    pub async fn scheduler_configuration(&self) -> Result<SchedulerConfiguration, ApiError> {
        let response: SchedulerConfigurationResponse = self
            .client
            .get("/v1/operator/scheduler/configuration", &QueryOptions::new())
            .await?;
        response
            .scheduler_config
            .ok_or_else(|| ApiError::NotFound("/v1/operator/scheduler/configuration".into()))
    }

    pub async fn set_scheduler_configuration(
        &self,
        config: &SchedulerConfiguration,
    ) -> Result<SchedulerSetConfigurationResponse, ApiError> {
        self.client
            .put("/v1/operator/scheduler/configuration", config, &QueryOptions::new())
            .await
    }
}
