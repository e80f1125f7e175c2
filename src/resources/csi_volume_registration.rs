//! `nomad_csi_volume_registration`: registers a volume that already exists
//! in the storage provider.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use super::volume::{
    capability_block, expand_capabilities, expand_mount_options, expand_topology_request,
    flatten_capabilities, flatten_mount_options, flatten_topology_request, mount_options_block,
    topology_request_block, CapabilityState, CsiVolumeStatus, MountOptionsState,
    TopologyRequestState, CSI_ACCESS_MODES,
};
use crate::api::{CsiVolume, DEFAULT_NAMESPACE, VOLUME_TYPE_CSI};
use crate::error::{ApiResultExt, OptionalExt, ProviderError};
use crate::resource::{default_true, ProviderContext, Resource};
use crate::schema::{Attribute, AttributeFlags, Schema};

/// Registers an external volume with Nomad.
#[derive(Debug, Default, Clone, Copy)]
pub struct CsiVolumeRegistrationResource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsiVolumeRegistrationState {
    pub id: String,
    #[serde(rename = "type")]
    pub volume_type: String,
    pub namespace: String,
    pub volume_id: String,
    pub name: String,
    pub plugin_id: String,
    pub external_id: String,
    pub capability: Vec<CapabilityState>,
    pub mount_options: Option<MountOptionsState>,
    pub secrets: HashMap<String, String>,
    pub parameters: HashMap<String, String>,
    pub context: HashMap<String, String>,
    pub topology_request: Option<TopologyRequestState>,
    pub deregister_on_destroy: bool,
    #[serde(flatten)]
    pub status: CsiVolumeStatus,
}

impl Default for CsiVolumeRegistrationState {
    fn default() -> Self {
        Self {
            id: String::new(),
            volume_type: VOLUME_TYPE_CSI.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            volume_id: String::new(),
            name: String::new(),
            plugin_id: String::new(),
            external_id: String::new(),
            capability: Vec::new(),
            mount_options: None,
            secrets: HashMap::new(),
            parameters: HashMap::new(),
            context: HashMap::new(),
            topology_request: None,
            deregister_on_destroy: default_true(),
            status: CsiVolumeStatus::default(),
        }
    }
}

pub(crate) fn expand(state: &CsiVolumeRegistrationState) -> CsiVolume {
    CsiVolume {
        id: state.volume_id.clone(),
        name: state.name.clone(),
        namespace: state.namespace.clone(),
        external_id: state.external_id.clone(),
        plugin_id: state.plugin_id.clone(),
        requested_capabilities: expand_capabilities(&state.capability),
        mount_options: expand_mount_options(state.mount_options.as_ref()),
        secrets: state.secrets.clone(),
        parameters: state.parameters.clone(),
        context: state.context.clone(),
        requested_topologies: expand_topology_request(state.topology_request.as_ref()),
        ..Default::default()
    }
}

pub(crate) fn flatten(
    volume: CsiVolume,
    prior: &CsiVolumeRegistrationState,
) -> CsiVolumeRegistrationState {
    CsiVolumeRegistrationState {
        id: volume.id.clone(),
        volume_type: VOLUME_TYPE_CSI.to_string(),
        namespace: volume.namespace.clone(),
        volume_id: volume.id.clone(),
        name: volume.name.clone(),
        plugin_id: volume.plugin_id.clone(),
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
        deregister_on_destroy: prior.deregister_on_destroy,
        status: CsiVolumeStatus::from_volume(&volume),
    }
}

impl CsiVolumeRegistrationResource {
    async fn register(
        &self,
        ctx: &ProviderContext,
        state: CsiVolumeRegistrationState,
    ) -> Result<CsiVolumeRegistrationState, ProviderError> {
        let volume = expand(&state);
        ctx.client
            .csi_volumes()
            .register(&volume)
            .await
            .with_context(|| format!("error registering CSI volume {:?}", volume.id))?;
        info!(id = %volume.id, namespace = %volume.namespace, "Registered CSI volume");

        let registered = CsiVolumeRegistrationState {
            id: volume.id.clone(),
            ..state
        };
        self.read(ctx, registered)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("CSI volume {:?}", volume.id)))
    }
}

#[async_trait]
impl Resource for CsiVolumeRegistrationResource {
    type State = CsiVolumeRegistrationState;

    fn schema(&self) -> Schema {
        let schema = Schema::v0()
            .with_description("Registers an existing CSI volume with Nomad.")
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
            .with_attribute("volume_id", Attribute::required_string().with_force_new())
            .with_attribute("name", Attribute::required_string())
            .with_attribute("plugin_id", Attribute::required_string().with_force_new())
            .with_attribute(
                "external_id",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Id of the volume in the storage provider."),
            )
            .with_block("capability", capability_block(&CSI_ACCESS_MODES))
            .with_block("mount_options", mount_options_block())
            .with_attribute(
                "secrets",
                Attribute::string_map(AttributeFlags::optional().sensitive()),
            )
            .with_attribute("parameters", Attribute::string_map(AttributeFlags::optional()))
            .with_attribute("context", Attribute::string_map(AttributeFlags::optional()))
            .with_block("topology_request", topology_request_block())
            .with_attribute(
                "deregister_on_destroy",
                Attribute::optional_bool()
                    .with_default(true)
                    .with_description("Deregister the volume when the resource is destroyed."),
            );

        CsiVolumeStatus::attributes()
            .into_iter()
            .fold(schema, |schema, (name, attr)| schema.with_attribute(name, attr))
    }

    async fn create(
        &self,
        ctx: &ProviderContext,
        planned: CsiVolumeRegistrationState,
    ) -> Result<CsiVolumeRegistrationState, ProviderError> {
        self.register(ctx, planned).await
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        state: CsiVolumeRegistrationState,
    ) -> Result<Option<CsiVolumeRegistrationState>, ProviderError> {
        let volume = ctx
            .client
            .csi_volumes()
            .info(&state.id, &state.namespace)
            .await
            .with_context(|| format!("error reading CSI volume {:?}", state.id))
            .optional()?;
        Ok(volume.map(|v| flatten(v, &state)))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        _prior: CsiVolumeRegistrationState,
        planned: CsiVolumeRegistrationState,
    ) -> Result<CsiVolumeRegistrationState, ProviderError> {
        self.register(ctx, planned).await
    }

    async fn delete(
        &self,
        ctx: &ProviderContext,
        state: CsiVolumeRegistrationState,
    ) -> Result<(), ProviderError> {
        if !state.deregister_on_destroy {
            info!(id = %state.id, "Leaving CSI volume registered");
            return Ok(());
        }
        ctx.client
            .csi_volumes()
            .deregister(&state.id, &state.namespace, false)
            .await
            .with_context(|| format!("error deregistering CSI volume {:?}", state.id))?;
        info!(id = %state.id, "Deregistered CSI volume");
        Ok(())
    }

    fn import_state(&self, id: &str) -> Result<CsiVolumeRegistrationState, ProviderError> {
        let (volume_id, namespace) = id.split_once('@').unwrap_or((id, DEFAULT_NAMESPACE));
        Ok(CsiVolumeRegistrationState {
            id: volume_id.to_string(),
            volume_id: volume_id.to_string(),
            namespace: namespace.to_string(),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::{decode, test_context};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn test_deregister_on_destroy_defaults_true() {
        let state: CsiVolumeRegistrationState =
            decode(json!({"volume_id": "mysql", "deregister_on_destroy": null})).unwrap();
        assert!(state.deregister_on_destroy);
    }

    #[tokio::test]
    async fn test_delete_skips_when_disabled() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let state = CsiVolumeRegistrationState {
            id: "mysql".into(),
            deregister_on_destroy: false,
            ..Default::default()
        };
        CsiVolumeRegistrationResource.delete(&ctx, state).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_deregisters() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/volume/csi/mysql"))
            .and(query_param("force", "false"))
            .and(query_param("namespace", "prod"))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let state = CsiVolumeRegistrationResource.import_state("mysql@prod").unwrap();
        CsiVolumeRegistrationResource.delete(&ctx, state).await.unwrap();
    }

    #[test]
    fn test_expand_flatten() {
        let state = CsiVolumeRegistrationState {
            id: "mysql".into(),
            volume_id: "mysql".into(),
            name: "mysql".into(),
            plugin_id: "aws-ebs0".into(),
            external_id: "vol-0123".into(),
            capability: vec![CapabilityState {
                access_mode: "single-node-writer".into(),
                attachment_mode: "file-system".into(),
            }],
            context: HashMap::from([("endpoint".to_string(), "http://storage".to_string())]),
            ..Default::default()
        };
        assert_eq!(flatten(expand(&state), &state), state);
    }
}
