//! `nomad_dynamic_host_volume_registration`: registers a directory that
//! already exists on a client node as a host volume.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::volume::{
    capability_block, capacity_attribute, constraint_block, expand_capabilities,
    expand_constraints, flatten_capabilities, flatten_capacity, flatten_constraints,
    parse_capacity, CapabilityState, ConstraintState, HOST_ACCESS_MODES,
};
use crate::api::{HostVolume, QueryOptions, DEFAULT_NAMESPACE};
use crate::error::{ApiResultExt, OptionalExt, ProviderError};
use crate::resource::{ProviderContext, Resource};
use crate::schema::{Attribute, AttributeFlags, Schema};

/// Registers an existing host directory as a dynamic host volume.
#[derive(Debug, Default, Clone, Copy)]
pub struct DynamicHostVolumeRegistrationResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostVolumeRegistrationState {
    pub id: String,
    pub name: String,
    pub namespace: String,
    pub node_id: String,
    pub node_pool: String,
    pub host_path: String,
    pub capacity: String,
    pub capacity_bytes: i64,
    pub capability: Vec<CapabilityState>,
    pub constraint: Vec<ConstraintState>,
    pub parameters: HashMap<String, String>,
    pub state: String,
}

pub(crate) fn expand(state: &HostVolumeRegistrationState) -> Result<HostVolume, ProviderError> {
    Ok(HostVolume {
        namespace: state.namespace.clone(),
        id: state.id.clone(),
        name: state.name.clone(),
        node_id: state.node_id.clone(),
        host_path: state.host_path.clone(),
        capacity_bytes: parse_capacity("capacity", &state.capacity)?,
        constraints: expand_constraints(&state.constraint),
        requested_capabilities: expand_capabilities(&state.capability),
        parameters: state.parameters.clone(),
        ..Default::default()
    })
}

pub(crate) fn flatten(
    volume: HostVolume,
    prior: &HostVolumeRegistrationState,
) -> HostVolumeRegistrationState {
    HostVolumeRegistrationState {
        id: volume.id,
        name: volume.name,
        namespace: volume.namespace,
        node_id: volume.node_id,
        node_pool: volume.node_pool,
        host_path: volume.host_path,
        capacity: flatten_capacity(volume.capacity_bytes, &prior.capacity),
        capacity_bytes: volume.capacity_bytes,
        capability: flatten_capabilities(&volume.requested_capabilities),
        constraint: flatten_constraints(&volume.constraints),
        parameters: volume.parameters,
        state: volume.state,
    }
}

impl DynamicHostVolumeRegistrationResource {
    async fn register(
        &self,
        ctx: &ProviderContext,
        state: HostVolumeRegistrationState,
    ) -> Result<HostVolumeRegistrationState, ProviderError> {
        let response = ctx
            .client
            .host_volumes()
            .register(&expand(&state)?, false)
            .await
            .with_context(|| format!("error registering host volume {:?}", state.name))?;
        if !response.warnings.is_empty() {
            warn!(warnings = %response.warnings, "Host volume registered with warnings");
        }
        info!(id = %response.volume.id, node_id = %response.volume.node_id, "Registered host volume");
        Ok(flatten(response.volume, &state))
    }
}

#[async_trait]
impl Resource for DynamicHostVolumeRegistrationResource {
    type State = HostVolumeRegistrationState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Registers an existing host directory as a dynamic host volume.")
            .with_id()
            .with_attribute("name", Attribute::required_string().with_force_new())
            .with_attribute(
                "namespace",
                Attribute::optional_string()
                    .with_default(DEFAULT_NAMESPACE)
                    .with_force_new(),
            )
            .with_attribute(
                "node_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Client node that holds the directory."),
            )
            .with_attribute("node_pool", Attribute::computed_string())
            .with_attribute(
                "host_path",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Absolute path of the directory on the node."),
            )
            .with_attribute("capacity", capacity_attribute())
            .with_attribute("capacity_bytes", Attribute::computed_int64())
            .with_block("capability", capability_block(&HOST_ACCESS_MODES))
            .with_block("constraint", constraint_block())
            .with_attribute("parameters", Attribute::string_map(AttributeFlags::optional()))
            .with_attribute("state", Attribute::computed_string())
    }

    async fn create(
        &self,
        ctx: &ProviderContext,
        planned: HostVolumeRegistrationState,
    ) -> Result<HostVolumeRegistrationState, ProviderError> {
        self.register(ctx, planned).await
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        state: HostVolumeRegistrationState,
    ) -> Result<Option<HostVolumeRegistrationState>, ProviderError> {
        let volume = ctx
            .client
            .host_volumes()
            .info(&state.id, &QueryOptions::namespace(&state.namespace))
            .await
            .with_context(|| format!("error reading host volume {:?}", state.id))
            .optional()?;
        Ok(volume.map(|(v, _)| flatten(v, &state)))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        prior: HostVolumeRegistrationState,
        planned: HostVolumeRegistrationState,
    ) -> Result<HostVolumeRegistrationState, ProviderError> {
        self.register(
            ctx,
            HostVolumeRegistrationState {
                id: prior.id,
                ..planned
            },
        )
        .await
    }

    async fn delete(
        &self,
        ctx: &ProviderContext,
        state: HostVolumeRegistrationState,
    ) -> Result<(), ProviderError> {
        ctx.client
            .host_volumes()
            .delete(&state.id, &state.namespace)
            .await
            .with_context(|| format!("error deregistering host volume {:?}", state.id))?;
        info!(id = %state.id, "Deregistered host volume");
        Ok(())
    }

    fn import_state(&self, id: &str) -> Result<HostVolumeRegistrationState, ProviderError> {
        let (volume_id, namespace) = id.split_once('@').unwrap_or((id, DEFAULT_NAMESPACE));
        Ok(HostVolumeRegistrationState {
            id: volume_id.to_string(),
            namespace: namespace.to_string(),
            ..Default::default()
        })
    }
}
