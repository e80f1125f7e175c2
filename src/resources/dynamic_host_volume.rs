//! `nomad_dynamic_host_volume`: a host volume created by a plugin on a
//! client node.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::volume::{
    capability_block, capacity_attribute, constraint_block, expand_capabilities,
    expand_constraints, flatten_capabilities, flatten_capacity, flatten_constraints,
    parse_capacity, CapabilityState, ConstraintState, HOST_ACCESS_MODES,
};
use crate::api::{HostVolume, QueryOptions, DEFAULT_NAMESPACE, HOST_VOLUME_STATE_READY};
use crate::error::{ApiResultExt, OptionalExt, ProviderError};
use crate::helper::humanize_bytes;
use crate::resource::{ProviderContext, Resource, Timeouts};
use crate::schema::{Attribute, AttributeFlags, Schema};

const DEFAULT_CREATE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Creates a dynamic host volume through a host volume plugin.
#[derive(Debug, Default, Clone, Copy)]
pub struct DynamicHostVolumeResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicHostVolumeState {
    pub id: String,
    pub name: String,
    pub namespace: String,
    pub plugin_id: String,
    pub node_pool: String,
    pub node_id: String,
    pub capacity_min: String,
    pub capacity_max: String,
    pub capacity_min_bytes: i64,
    pub capacity_max_bytes: i64,
    pub capacity: String,
    pub capacity_bytes: i64,
    pub capability: Vec<CapabilityState>,
    pub constraint: Vec<ConstraintState>,
    pub parameters: HashMap<String, String>,
    pub host_path: String,
    pub state: String,
    pub timeouts: Option<Timeouts>,
}

pub(crate) fn expand(state: &DynamicHostVolumeState) -> Result<HostVolume, ProviderError> {
    Ok(HostVolume {
        namespace: state.namespace.clone(),
        id: state.id.clone(),
        name: state.name.clone(),
        plugin_id: state.plugin_id.clone(),
        node_pool: state.node_pool.clone(),
        node_id: state.node_id.clone(),
        constraints: expand_constraints(&state.constraint),
        requested_capacity_min_bytes: parse_capacity("capacity_min", &state.capacity_min)?,
        requested_capacity_max_bytes: parse_capacity("capacity_max", &state.capacity_max)?,
        requested_capabilities: expand_capabilities(&state.capability),
        parameters: state.parameters.clone(),
        ..Default::default()
    })
}

pub(crate) fn flatten(volume: HostVolume, prior: &DynamicHostVolumeState) -> DynamicHostVolumeState {
    DynamicHostVolumeState {
        id: volume.id,
        name: volume.name,
        namespace: volume.namespace,
        plugin_id: volume.plugin_id,
        node_pool: volume.node_pool,
        node_id: volume.node_id,
        capacity_min: flatten_capacity(volume.requested_capacity_min_bytes, &prior.capacity_min),
        capacity_max: flatten_capacity(volume.requested_capacity_max_bytes, &prior.capacity_max),
        capacity_min_bytes: volume.requested_capacity_min_bytes,
        capacity_max_bytes: volume.requested_capacity_max_bytes,
        capacity: humanize_bytes(volume.capacity_bytes.max(0) as u64),
        capacity_bytes: volume.capacity_bytes,
        capability: flatten_capabilities(&volume.requested_capabilities),
        constraint: flatten_constraints(&volume.constraints),
        parameters: volume.parameters,
        host_path: volume.host_path,
        state: volume.state,
        timeouts: prior.timeouts.clone(),
    }
}

/// Block on the volume until Nomad reports it ready or `timeout` passes.
pub(crate) async fn wait_for_ready(
    ctx: &ProviderContext,
    id: &str,
    namespace: &str,
    mut index: u64,
    timeout: Duration,
) -> Result<HostVolume, ProviderError> {
    let deadline = ctx.retry.until(timeout);
    loop {
        let Some(wait) = deadline.blocking_wait() else {
            return Err(ProviderError::DeadlineExceeded(format!(
                "timed out waiting for dynamic host volume {:?} to become ready",
                id
            )));
        };
        let opts = QueryOptions::namespace(namespace).with_wait(index, wait);
        let (volume, meta) = ctx
            .client
            .host_volumes()
            .info(id, &opts)
            .await
            .with_context(|| format!("error reading dynamic host volume {:?}", id))?;
        if volume.state == HOST_VOLUME_STATE_READY {
            return Ok(volume);
        }
        debug!(id, state = %volume.state, "Waiting for dynamic host volume");
        if deadline.expired() {
            return Err(ProviderError::DeadlineExceeded(format!(
                "dynamic host volume {:?} is {:?}, not ready",
                id, volume.state
            )));
        }
        // A stale index would return at once; pace the loop instead.
        if meta.last_index <= index {
            tokio::time::sleep(ctx.retry.interval.min(deadline.remaining())).await;
        }
        index = meta.last_index.max(index);
    }
}

#[async_trait]
impl Resource for DynamicHostVolumeResource {
    type State = DynamicHostVolumeState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Creates a dynamic host volume on a client node.")
            .with_id()
            .with_attribute("name", Attribute::required_string().with_force_new())
            .with_attribute(
                "namespace",
                Attribute::optional_string()
                    .with_default(DEFAULT_NAMESPACE)
                    .with_force_new(),
            )
            .with_attribute(
                "plugin_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Host volume plugin that creates the volume."),
            )
            .with_attribute("node_pool", Attribute::optional_computed_string().with_force_new())
            .with_attribute("node_id", Attribute::optional_computed_string().with_force_new())
            .with_attribute("capacity_min", capacity_attribute())
            .with_attribute("capacity_max", capacity_attribute())
            .with_attribute("capacity_min_bytes", Attribute::computed_int64())
            .with_attribute("capacity_max_bytes", Attribute::computed_int64())
            .with_attribute("capacity", Attribute::computed_string())
            .with_attribute("capacity_bytes", Attribute::computed_int64())
            .with_block("capability", capability_block(&HOST_ACCESS_MODES))
            .with_block("constraint", constraint_block())
            .with_attribute("parameters", Attribute::string_map(AttributeFlags::optional()))
            .with_attribute("host_path", Attribute::computed_string())
            .with_attribute("state", Attribute::computed_string())
            .with_block("timeouts", Timeouts::block(&["create"]))
    }

    async fn create(
        &self,
        ctx: &ProviderContext,
        planned: DynamicHostVolumeState,
    ) -> Result<DynamicHostVolumeState, ProviderError> {
        let timeout = Timeouts::create_or(&planned.timeouts, DEFAULT_CREATE_TIMEOUT)?;
        let response = ctx
            .client
            .host_volumes()
            .create(&expand(&planned)?, false)
            .await
            .with_context(|| format!("error creating dynamic host volume {:?}", planned.name))?;
        if !response.warnings.is_empty() {
            warn!(warnings = %response.warnings, "Dynamic host volume created with warnings");
        }
        let created = response.volume;
        info!(id = %created.id, node_id = %created.node_id, "Created dynamic host volume");

        let volume = if created.state == HOST_VOLUME_STATE_READY {
            created
        } else {
            wait_for_ready(ctx, &created.id, &created.namespace, created.modify_index, timeout)
                .await?
        };
        Ok(flatten(volume, &planned))
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        state: DynamicHostVolumeState,
    ) -> Result<Option<DynamicHostVolumeState>, ProviderError> {
        let volume = ctx
            .client
            .host_volumes()
            .info(&state.id, &QueryOptions::namespace(&state.namespace))
            .await
            .with_context(|| format!("error reading dynamic host volume {:?}", state.id))
            .optional()?;
        Ok(volume.map(|(v, _)| flatten(v, &state)))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        prior: DynamicHostVolumeState,
        planned: DynamicHostVolumeState,
    ) -> Result<DynamicHostVolumeState, ProviderError> {
        let mut volume = expand(&planned)?;
        volume.id = prior.id.clone();
        let response = ctx
            .client
            .host_volumes()
            .create(&volume, false)
            .await
            .with_context(|| format!("error updating dynamic host volume {:?}", prior.id))?;
        info!(id = %response.volume.id, "Updated dynamic host volume");
        Ok(flatten(response.volume, &planned))
    }

    async fn delete(
        &self,
        ctx: &ProviderContext,
        state: DynamicHostVolumeState,
    ) -> Result<(), ProviderError> {
        ctx.client
            .host_volumes()
            .delete(&state.id, &state.namespace)
            .await
            .with_context(|| format!("error deleting dynamic host volume {:?}", state.id))?;
        info!(id = %state.id, "Deleted dynamic host volume");
        Ok(())
    }

    fn import_state(&self, id: &str) -> Result<DynamicHostVolumeState, ProviderError> {
        let (volume_id, namespace) = id.split_once('@').unwrap_or((id, DEFAULT_NAMESPACE));
        Ok(DynamicHostVolumeState {
            id: volume_id.to_string(),
            namespace: namespace.to_string(),
            ..Default::default()
        })
    }
}
