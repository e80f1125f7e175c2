//! `nomad_scheduler_config`
//!
//! The scheduler configuration is a cluster singleton: create and update
//! both overwrite it, and delete only forgets it.

use std::collections::BTreeMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::api::{PreemptionConfig, SchedulerConfiguration};
use crate::error::{ApiResultExt, OptionalExt, ProviderError};
use crate::resource::{ProviderContext, Resource};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

/// Fixed id of the singleton.
pub const SCHEDULER_CONFIG_ID: &str = "nomad-scheduler-configuration";

const PREEMPTION_KEYS: [&str; 4] = [
    "system_scheduler_enabled",
    "sysbatch_scheduler_enabled",
    "batch_scheduler_enabled",
    "service_scheduler_enabled",
];

/// Manages the cluster scheduler configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct SchedulerConfigResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfigState {
    pub id: String,
    pub scheduler_algorithm: String,
    pub memory_oversubscription_enabled: bool,
    pub preemption_config: BTreeMap<String, bool>,
}

pub(crate) fn expand(state: &SchedulerConfigState) -> Result<SchedulerConfiguration, ProviderError> {
    if let Some(key) = state
        .preemption_config
        .keys()
        .find(|key| !PREEMPTION_KEYS.contains(&key.as_str()))
    {
        return Err(ProviderError::Validation(format!(
            "unknown preemption_config key {:?}; expected one of {}",
            key,
            PREEMPTION_KEYS.join(", ")
        )));
    }
    let enabled = |key: &str| state.preemption_config.get(key).copied().unwrap_or(false);
    Ok(SchedulerConfiguration {
        scheduler_algorithm: state.scheduler_algorithm.clone(),
        memory_oversubscription_enabled: state.memory_oversubscription_enabled,
        preemption_config: PreemptionConfig {
            system_scheduler_enabled: enabled("system_scheduler_enabled"),
            sys_batch_scheduler_enabled: enabled("sysbatch_scheduler_enabled"),
            batch_scheduler_enabled: enabled("batch_scheduler_enabled"),
            service_scheduler_enabled: enabled("service_scheduler_enabled"),
        },
        ..Default::default()
    })
}

pub(crate) fn flatten(config: SchedulerConfiguration) -> SchedulerConfigState {
    let preemption = config.preemption_config;
    SchedulerConfigState {
        id: SCHEDULER_CONFIG_ID.to_string(),
        scheduler_algorithm: config.scheduler_algorithm,
        memory_oversubscription_enabled: config.memory_oversubscription_enabled,
        preemption_config: BTreeMap::from([
            ("system_scheduler_enabled".to_string(), preemption.system_scheduler_enabled),
            ("sysbatch_scheduler_enabled".to_string(), preemption.sys_batch_scheduler_enabled),
            ("batch_scheduler_enabled".to_string(), preemption.batch_scheduler_enabled),
            ("service_scheduler_enabled".to_string(), preemption.service_scheduler_enabled),
        ]),
    }
}

impl SchedulerConfigResource {
    async fn apply(
        &self,
        ctx: &ProviderContext,
        state: SchedulerConfigState,
    ) -> Result<SchedulerConfigState, ProviderError> {
        let config = expand(&state)?;
        let response = ctx
            .client
            .operator()
            .set_scheduler_configuration(&config)
            .await
            .context("error updating scheduler configuration")?;
        if !response.updated {
            warn!("Nomad reported the scheduler configuration as not updated");
        }
        info!(index = response.index, "Updated scheduler configuration");

        self.read(ctx, state)
            .await?
            .ok_or_else(|| ProviderError::NotFound("scheduler configuration".into()))
    }
}

#[async_trait]
impl Resource for SchedulerConfigResource {
    type State = SchedulerConfigState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Manages the cluster scheduler configuration.")
            .with_id()
            .with_attribute(
                "scheduler_algorithm",
                Attribute::optional_string()
                    .with_default("binpack")
                    .one_of(["binpack", "spread"]),
            )
            .with_attribute(
                "memory_oversubscription_enabled",
                Attribute::optional_bool().with_default(false),
            )
            .with_attribute(
                "preemption_config",
                Attribute::new(
                    AttributeType::map(AttributeType::Bool),
                    AttributeFlags::optional_computed(),
                )
                .with_description("Which schedulers may preempt allocations."),
            )
    }

    async fn create(
        &self,
        ctx: &ProviderContext,
        planned: SchedulerConfigState,
    ) -> Result<SchedulerConfigState, ProviderError> {
        self.apply(ctx, planned).await
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        _state: SchedulerConfigState,
    ) -> Result<Option<SchedulerConfigState>, ProviderError> {
        let config = ctx
            .client
            .operator()
            .scheduler_configuration()
            .await
            .context("error reading scheduler configuration")
            .optional()?;
        Ok(config.map(flatten))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        _prior: SchedulerConfigState,
        planned: SchedulerConfigState,
    ) -> Result<SchedulerConfigState, ProviderError> {
        self.apply(ctx, planned).await
    }

    async fn delete(&self, _ctx: &ProviderContext, _state: SchedulerConfigState) -> Result<(), ProviderError> {
        info!("Scheduler configuration removed from state; cluster settings are unchanged");
        Ok(())
    }

    fn import_state(&self, _id: &str) -> Result<SchedulerConfigState, ProviderError> {
        Ok(SchedulerConfigState {
            id: SCHEDULER_CONFIG_ID.to_string(),
            ..Default::default()
        })
    }
}
