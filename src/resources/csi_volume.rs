//! `nomad_csi_volume`: a volume provisioned through a CSI controller plugin.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::volume::{
    capability_block, capacity_attribute, expand_capabilities, expand_mount_options,
    expand_topology_request, flatten_capabilities, flatten_capacity, flatten_mount_options,
    flatten_topology_request, mount_options_block, parse_capacity, topology_request_block,
    CapabilityState, CsiVolumeStatus, MountOptionsState, TopologyRequestState, CSI_ACCESS_MODES,
};
use crate::api::{CsiVolume, DEFAULT_NAMESPACE, VOLUME_TYPE_CSI};
use crate::error::{ApiResultExt, OptionalExt, ProviderError};
use crate::helper::retry::{retry, RetryError};
use crate::resource::{ProviderContext, Resource, Timeouts};
use crate::schema::{Attribute, AttributeFlags, Diagnostic, Schema};

const NO_PLUGIN: &str = "no CSI plugin named";
const VOLUME_IN_USE: &str = "volume in use";
const DEFAULT_CREATE_TIMEOUT: Duration = Duration::from_secs(10 * 60);
const DEFAULT_DELETE_TIMEOUT: Duration = Duration::from_secs(10 * 60);

/// Creates and deletes a CSI volume with its storage provider.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsiVolumeResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsiVolumeState {
    pub id: String,
    #[serde(rename = "type")]
    pub volume_type: String,
    pub namespace: String,
    pub volume_id: String,
    pub name: String,
    pub plugin_id: String,
    pub snapshot_id: String,
    pub clone_id: String,
    pub capacity_min: String,
    pub capacity_max: String,
    pub capacity_min_bytes: i64,
    pub capacity_max_bytes: i64,
    pub capacity: i64,
    pub external_id: String,
    pub capability: Vec<CapabilityState>,
    pub mount_options: Option<MountOptionsState>,
    pub secrets: HashMap<String, String>,
    pub parameters: HashMap<String, String>,
    pub context: HashMap<String, String>,
    pub topology_request: Option<TopologyRequestState>,
    #[serde(flatten)]
    pub status: CsiVolumeStatus,
    pub timeouts: Option<Timeouts>,
}

pub(crate) fn expand(state: &CsiVolumeState) -> Result<CsiVolume, ProviderError> {
    Ok(CsiVolume {
        id: state.volume_id.clone(),
        name: state.name.clone(),
        namespace: state.namespace.clone(),
        plugin_id: state.plugin_id.clone(),
        snapshot_id: state.snapshot_id.clone(),
        clone_id: state.clone_id.clone(),
        requested_capacity_min: parse_capacity("capacity_min", &state.capacity_min)?,
        requested_capacity_max: parse_capacity("capacity_max", &state.capacity_max)?,
        requested_capabilities: expand_capabilities(&state.capability),
        mount_options: expand_mount_options(state.mount_options.as_ref()),
        secrets: state.secrets.clone(),
        parameters: state.parameters.clone(),
        requested_topologies: expand_topology_request(state.topology_request.as_ref()),
        ..Default::default()
    })
}

/// Fields Nomad does not echo back (secrets, mount flags, the
/// configured capacity spelling, timeouts) come from `prior`.
pub(crate) fn flatten(volume: CsiVolume, prior: &CsiVolumeState) -> CsiVolumeState {
    CsiVolumeState {
        id: volume.id.clone(),
        volume_type: VOLUME_TYPE_CSI.to_string(),
        namespace: volume.namespace.clone(),
        volume_id: volume.id.clone(),
        name: volume.name.clone(),
        plugin_id: volume.plugin_id.clone(),
        snapshot_id: volume.snapshot_id.clone(),
        clone_id: volume.clone_id.clone(),
        capacity_min: flatten_capacity(volume.requested_capacity_min, &prior.capacity_min),
        capacity_max: flatten_capacity(volume.requested_capacity_max, &prior.capacity_max),
        capacity_min_bytes: volume.requested_capacity_min,
        capacity_max_bytes: volume.requested_capacity_max,
        capacity: volume.capacity,
        external_id: volume.external_id.clone(),
        capability: flatten_capabilities(&volume.requested_capabilities),
        mount_options: flatten_mount_options(
            volume.mount_options.as_ref(),
            prior.mount_options.as_ref(),
        ),
        secrets: prior.secrets.clone(),
        parameters: volume.parameters.clone(),
        context: volume.context.clone(),
        topology_request: flatten_topology_request(volume.requested_topologies.as_ref()),
        status: CsiVolumeStatus::from_volume(&volume),
        timeouts: prior.timeouts.clone(),
    }
}

impl CsiVolumeResource {
    async fn read_volume(
        &self,
        ctx: &ProviderContext,
        id: &str,
        namespace: &str,
    ) -> Result<Option<CsiVolume>, ProviderError> {
        ctx.client
            .csi_volumes()
            .info(id, namespace)
            .await
            .with_context(|| format!("error reading CSI volume {:?}", id))
            .optional()
    }
}

#[async_trait]
impl Resource for CsiVolumeResource {
    type State = CsiVolumeState;

    fn schema(&self) -> Schema {
        let schema = Schema::v0()
            .with_description("Creates a CSI volume through its controller plugin.")
            .with_id()
            .with_attribute(
                "type",
                Attribute::optional_string()
                    .with_default(VOLUME_TYPE_CSI)
                    .one_of([VOLUME_TYPE_CSI]),
            )
            .with_attribute(
                "namespace",
                Attribute::optional_string()
                    .with_default(DEFAULT_NAMESPACE)
                    .with_force_new(),
            )
            .with_attribute(
                "volume_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Unique id of the volume."),
            )
            .with_attribute("name", Attribute::required_string().with_force_new())
            .with_attribute("plugin_id", Attribute::required_string().with_force_new())
            .with_attribute("snapshot_id", Attribute::optional_string().with_force_new())
            .with_attribute("clone_id", Attribute::optional_string().with_force_new())
            .with_attribute("capacity_min", capacity_attribute())
            .with_attribute("capacity_max", capacity_attribute())
            .with_attribute("capacity_min_bytes", Attribute::computed_int64())
            .with_attribute("capacity_max_bytes", Attribute::computed_int64())
            .with_attribute("capacity", Attribute::computed_int64())
            .with_attribute("external_id", Attribute::computed_string())
            .with_block("capability", capability_block(&CSI_ACCESS_MODES))
            .with_block("mount_options", mount_options_block())
            .with_attribute(
                "secrets",
                Attribute::string_map(AttributeFlags::optional().sensitive()),
            )
            .with_attribute("parameters", Attribute::string_map(AttributeFlags::optional()))
            .with_attribute("context", Attribute::string_map(AttributeFlags::computed()))
            .with_block("topology_request", topology_request_block())
            .with_block("timeouts", Timeouts::block(&["create", "delete"]));

        CsiVolumeStatus::attributes()
            .into_iter()
            .fold(schema, |schema, (name, attr)| schema.with_attribute(name, attr))
    }

    fn validate(&self, config: &CsiVolumeState) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        if !config.snapshot_id.is_empty() && !config.clone_id.is_empty() {
            diagnostics.push(
                Diagnostic::error("only one of snapshot_id and clone_id may be set")
                    .with_attribute("clone_id"),
            );
        }
        if let (Ok(min), Ok(max)) = (
            parse_capacity("capacity_min", &config.capacity_min),
            parse_capacity("capacity_max", &config.capacity_max),
        ) {
            if min > 0 && max > 0 && min > max {
                diagnostics.push(
                    Diagnostic::error("capacity_min must not exceed capacity_max")
                        .with_attribute("capacity_min"),
                );
            }
        }
        diagnostics
    }

    async fn create(
        &self,
        ctx: &ProviderContext,
        planned: CsiVolumeState,
    ) -> Result<CsiVolumeState, ProviderError> {
        let volume = expand(&planned)?;
        let timeout = Timeouts::create_or(&planned.timeouts, DEFAULT_CREATE_TIMEOUT)?;

        // The controller plugin may still be registering with the servers.
        let client = &ctx.client;
        let request = &volume;
        let created = retry("create CSI volume", ctx.retry.until(timeout), move || async move {
            client.csi_volumes().create(request).await.map_err(|e| {
                let transient = e.message_contains(NO_PLUGIN);
                let err = ProviderError::api(format!("error creating CSI volume {:?}", request.id), e);
                if transient {
                    RetryError::transient(err)
                } else {
                    RetryError::permanent(err)
                }
            })
        })
        .await?;
        info!(id = %volume.id, count = created.len(), "Created CSI volume");

        let volume = self
            .read_volume(ctx, &volume.id, &volume.namespace)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("CSI volume {:?}", volume.id)))?;
        Ok(flatten(volume, &planned))
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        state: CsiVolumeState,
    ) -> Result<Option<CsiVolumeState>, ProviderError> {
        let volume = self.read_volume(ctx, &state.id, &state.namespace).await?;
        Ok(volume.map(|v| flatten(v, &state)))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        prior: CsiVolumeState,
        planned: CsiVolumeState,
    ) -> Result<CsiVolumeState, ProviderError> {
        // Updatable fields are re-registered over the existing volume.
        let mut volume = expand(&planned)?;
        volume.external_id = prior.external_id.clone();
        volume.context = prior.context.clone();
        ctx.client
            .csi_volumes()
            .register(&volume)
            .await
            .with_context(|| format!("error updating CSI volume {:?}", volume.id))?;
        info!(id = %volume.id, "Updated CSI volume");

        let volume = self
            .read_volume(ctx, &volume.id, &volume.namespace)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("CSI volume {:?}", volume.id)))?;
        Ok(flatten(volume, &planned))
    }

    async fn delete(&self, ctx: &ProviderContext, state: CsiVolumeState) -> Result<(), ProviderError> {
        let timeout = Timeouts::delete_or(&state.timeouts, DEFAULT_DELETE_TIMEOUT)?;
        let client = &ctx.client;
        let target = &state;
        retry("delete CSI volume", ctx.retry.until(timeout), move || async move {
            match client
                .csi_volumes()
                .delete(&target.id, &target.namespace, &target.secrets)
                .await
            {
                Ok(()) => Ok(()),
                Err(e) if e.message_contains(VOLUME_IN_USE) => {
                    warn!(id = %target.id, "CSI volume still in use");
                    Err(RetryError::transient(ProviderError::api(
                        format!("error deleting CSI volume {:?}", target.id),
                        e,
                    )))
                },
                Err(e) => {
                    let err = ProviderError::api(format!("error deleting CSI volume {:?}", target.id), e);
                    if err.is_not_found() {
                        Ok(())
                    } else {
                        Err(RetryError::permanent(err))
                    }
                },
            }
        })
        .await?;
        info!(id = %state.id, "Deleted CSI volume");
        Ok(())
    }

    fn import_state(&self, id: &str) -> Result<CsiVolumeState, ProviderError> {
        let (volume_id, namespace) = match id.split_once('@') {
            Some((volume_id, namespace)) => (volume_id, namespace),
            None => (id, DEFAULT_NAMESPACE),
        };
        Ok(CsiVolumeState {
            id: volume_id.to_string(),
            volume_id: volume_id.to_string(),
            namespace: namespace.to_string(),
            volume_type: VOLUME_TYPE_CSI.to_string(),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::test_context;
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn planned() -> CsiVolumeState {
        CsiVolumeState {
            volume_type: "csi".into(),
            namespace: "default".into(),
            volume_id: "mysql".into(),
            name: "mysql".into(),
            plugin_id: "aws-ebs0".into(),
            capacity_min: "10GiB".into(),
            capacity_max: "20GiB".into(),
            capability: vec![CapabilityState {
                access_mode: "single-node-writer".into(),
                attachment_mode: "file-system".into(),
            }],
            mount_options: Some(MountOptionsState {
                fs_type: "ext4".into(),
                mount_flags: vec!["noatime".into()],
            }),
            secrets: HashMap::from([("token".to_string(), "s3cr3t".to_string())]),
            timeouts: Some(Timeouts {
                create: Some("1s".into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    fn volume_json() -> serde_json::Value {
        json!({
            "ID": "mysql",
            "Name": "mysql",
            "Namespace": "default",
            "ExternalID": "vol-0123",
            "PluginID": "aws-ebs0",
            "Provider": "ebs.csi.aws.com",
            "ProviderVersion": "1.2.0",
            "RequestedCapacityMin": 10737418240_i64,
            "RequestedCapacityMax": 21474836480_i64,
            "Capacity": 10737418240_i64,
            "RequestedCapabilities": [{"AccessMode": "single-node-writer", "AttachmentMode": "file-system"}],
            "MountOptions": {"FSType": "ext4", "MountFlags": ["[REDACTED]"]},
            "Secrets": {"token": "[REDACTED]"},
            "Schedulable": true,
            "ControllerRequired": true,
            "ControllersHealthy": 1,
            "ControllersExpected": 1,
            "NodesHealthy": 2,
            "NodesExpected": 2
        })
    }

    #[test]
    fn test_expand_parses_capacity() {
        let volume = expand(&planned()).unwrap();
        assert_eq!(volume.requested_capacity_min, 10_737_418_240);
        assert_eq!(volume.requested_capacity_max, 21_474_836_480);
        assert_eq!(volume.id, "mysql");
    }

    #[test]
    fn test_validate_capacity_order() {
        let state = CsiVolumeState {
            capacity_min: "20GiB".into(),
            capacity_max: "10GiB".into(),
            ..planned()
        };
        assert_eq!(CsiVolumeResource.validate(&state).len(), 1);
    }

    #[tokio::test]
    async fn test_create_retries_until_plugin_registers() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v1/volume/csi/mysql/create"))
            .respond_with(
                ResponseTemplate::new(500).set_body_string("no CSI plugin named: aws-ebs0 could be found"),
            )
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path("/v1/volume/csi/mysql/create"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Volumes": [volume_json()]})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/volume/csi/mysql"))
            .respond_with(ResponseTemplate::new(200).set_body_json(volume_json()))
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let state = CsiVolumeResource.create(&ctx, planned()).await.unwrap();
        assert_eq!(state.id, "mysql");
        assert_eq!(state.capacity_min, "10GiB");
        assert_eq!(state.capacity_max_bytes, 21_474_836_480);
        assert_eq!(state.external_id, "vol-0123");
        assert_eq!(state.secrets["token"], "s3cr3t");
        assert_eq!(state.mount_options.unwrap().mount_flags, vec!["noatime"]);
        assert_eq!(state.status.plugin_provider, "ebs.csi.aws.com");
    }

    #[tokio::test]
    async fn test_delete_sends_secrets() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/volume/csi/mysql/delete"))
            .and(header("X-Nomad-CSI-Secrets", "token=s3cr3t"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let state = CsiVolumeState {
            id: "mysql".into(),
            ..planned()
        };
        CsiVolumeResource.delete(&ctx, state).await.unwrap();
    }

    #[test]
    fn test_state_serializes_status_at_top_level() {
        let state = flatten(serde_json::from_value(volume_json()).unwrap(), &planned());
        let value = serde_json::to_value(&state).unwrap();
        assert_eq!(value["nodes_healthy"], 2);
        assert_eq!(value["plugin_provider"], "ebs.csi.aws.com");
    }
}
