//! CSI and dynamic host volume endpoints.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::serde_helpers::null_default;
use super::{
    ApiError, Constraint, Method, NomadClient, QueryMeta, QueryOptions, CSI_SECRETS_HEADER,
};

pub const VOLUME_TYPE_CSI: &str = "csi";
pub const VOLUME_TYPE_HOST: &str = "host";

/// Host volume state once the node has created the volume.
pub const HOST_VOLUME_STATE_READY: &str = "ready";

/// An access and attachment mode pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct VolumeCapability {
    pub access_mode: String,
    pub attachment_mode: String,
}

/// Mount options of a file-system volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CsiMountOptions {
    #[serde(rename = "FSType")]
    pub fs_type: String,
    #[serde(deserialize_with = "null_default")]
    pub mount_flags: Vec<String>,
}

/// One topology segment set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CsiTopology {
    #[serde(deserialize_with = "null_default")]
    pub segments: HashMap<String, String>,
}

/// Topologies the volume must or should be accessible from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CsiTopologyRequest {
    #[serde(deserialize_with = "null_default")]
    pub required: Vec<CsiTopology>,
    #[serde(deserialize_with = "null_default")]
    pub preferred: Vec<CsiTopology>,
}

/// A CSI volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct CsiVolume {
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    pub namespace: String,
    #[serde(rename = "ExternalID")]
    pub external_id: String,
    #[serde(rename = "PluginID")]
    pub plugin_id: String,
    pub provider: String,
    pub provider_version: String,
    pub requested_capacity_min: i64,
    pub requested_capacity_max: i64,
    pub capacity: i64,
    #[serde(rename = "SnapshotID")]
    pub snapshot_id: String,
    #[serde(rename = "CloneID")]
    pub clone_id: String,
    #[serde(deserialize_with = "null_default")]
    pub requested_capabilities: Vec<VolumeCapability>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mount_options: Option<CsiMountOptions>,
    #[serde(deserialize_with = "null_default")]
    pub secrets: HashMap<String, String>,
    #[serde(deserialize_with = "null_default")]
    pub parameters: HashMap<String, String>,
    #[serde(deserialize_with = "null_default")]
    pub context: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_topologies: Option<CsiTopologyRequest>,
    #[serde(deserialize_with = "null_default")]
    pub topologies: Vec<CsiTopology>,
    pub schedulable: bool,
    pub controller_required: bool,
    pub controllers_healthy: i64,
    pub controllers_expected: i64,
    pub nodes_healthy: i64,
    pub nodes_expected: i64,
    pub create_index: u64,
    pub modify_index: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct CsiVolumeRequest<'a> {
    volumes: [&'a CsiVolume; 1],
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
struct CsiVolumeCreateResponse {
    #[serde(deserialize_with = "null_default")]
    volumes: Vec<CsiVolume>,
}

/// A dynamic host volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HostVolume {
    pub namespace: String,
    #[serde(rename = "ID")]
    pub id: String,
    pub name: String,
    #[serde(rename = "PluginID")]
    pub plugin_id: String,
    pub node_pool: String,
    #[serde(rename = "NodeID")]
    pub node_id: String,
    #[serde(deserialize_with = "null_default")]
    pub constraints: Vec<Constraint>,
    pub requested_capacity_min_bytes: i64,
    pub requested_capacity_max_bytes: i64,
    pub capacity_bytes: i64,
    #[serde(deserialize_with = "null_default")]
    pub requested_capabilities: Vec<VolumeCapability>,
    #[serde(deserialize_with = "null_default")]
    pub parameters: HashMap<String, String>,
    pub host_path: String,
    pub state: String,
    pub create_index: u64,
    pub modify_index: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct HostVolumeRequest<'a> {
    volume: &'a HostVolume,
    policy_override: bool,
}

/// Result of creating or registering a host volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct HostVolumeResponse {
    pub volume: HostVolume,
    pub warnings: String,
}

/// `/v1/volume/csi` endpoints.
pub struct CsiVolumes<'a> {
    client: &'a NomadClient,
}

/// `/v1/volume/host` endpoints.
pub struct HostVolumes<'a> {
    client: &'a NomadClient,
}

impl NomadClient {
    /// CSI volume endpoints.
    pub fn csi_volumes(&self) -> CsiVolumes<'_> {
        CsiVolumes { client: self }
    }

    /// Dynamic host volume endpoints.
    pub fn host_volumes(&self) -> HostVolumes<'_> {
        HostVolumes { client: self }
    }

    /// List volumes of the given type as raw JSON stubs.
    pub async fn volumes(
        &self,
        volume_type: &str,
        opts: &QueryOptions,
    ) -> Result<Vec<Value>, ApiError> {
        let opts = opts.clone().with_param("type", volume_type);
        self.get::<Option<Vec<_>>>("/v1/volumes", &opts)
            .await
            .map(Option::unwrap_or_default)
    }
}

/// Encode secrets as `key=value` pairs for [`CSI_SECRETS_HEADER`].
fn secrets_header(secrets: &HashMap<String, String>) -> String {
    let mut pairs: Vec<String> = secrets.iter().map(|(k, v)| format!("{}={}", k, v)).collect();
    pairs.sort();
    pairs.join(",")
}

impl CsiVolumes<'_> {
    /// Provision a volume through its plugin's controller.
    pub async fn create(&self, volume: &CsiVolume) -> Result<Vec<CsiVolume>, ApiError> {
        let request = CsiVolumeRequest { volumes: [volume] };
        let response: CsiVolumeCreateResponse = self
            .client
            .put(
                &format!("/v1/volume/csi/{}/create", volume.id),
                &request,
                &QueryOptions::namespace(&volume.namespace),
            )
            .await?;
        Ok(response.volumes)
    }

    /// Delete a provisioned volume from its storage provider.
    pub async fn delete(
        &self,
        id: &str,
        namespace: &str,
        secrets: &HashMap<String, String>,
    ) -> Result<(), ApiError> {
        let mut opts = QueryOptions::namespace(namespace);
        if !secrets.is_empty() {
            opts = opts.with_header(CSI_SECRETS_HEADER, secrets_header(secrets));
        }
        self.client
            .write::<()>(
                Method::DELETE,
                &format!("/v1/volume/csi/{}/delete", id),
                None,
                &opts,
            )
            .await
    }

    /// Register an existing external volume.
    pub async fn register(&self, volume: &CsiVolume) -> Result<(), ApiError> {
        let request = CsiVolumeRequest { volumes: [volume] };
        self.client
            .write(
                Method::PUT,
                &format!("/v1/volume/csi/{}", volume.id),
                Some(&request),
                &QueryOptions::namespace(&volume.namespace),
            )
            .await
    }

    pub async fn deregister(&self, id: &str, namespace: &str, force: bool) -> Result<(), ApiError> {
        let opts = QueryOptions::namespace(namespace).with_param("force", force.to_string());
        self.client
            .write::<()>(Method::DELETE, &format!("/v1/volume/csi/{}", id), None, &opts)
            .await
    }

    pub async fn info(&self, id: &str, namespace: &str) -> Result<CsiVolume, ApiError> {
        self.client
            .get(
                &format!("/v1/volume/csi/{}", id),
                &QueryOptions::namespace(namespace),
            )
            .await
    }
}

impl HostVolumes<'_> {
    pub async fn create(
        &self,
        volume: &HostVolume,
        policy_override: bool,
    ) -> Result<HostVolumeResponse, ApiError> {
        self.submit("/v1/volume/host/create", volume, policy_override)
            .await
    }

    pub async fn register(
        &self,
        volume: &HostVolume,
        policy_override: bool,
    ) -> Result<HostVolumeResponse, ApiError> {
        self.submit("/v1/volume/host/register", volume, policy_override)
            .await
    }

    async fn submit(
        &self,
        path: &str,
        volume: &HostVolume,
        policy_override: bool,
    ) -> Result<HostVolumeResponse, ApiError> {
        let request = HostVolumeRequest {
            volume,
            policy_override,
        };
        self.client
            .put(path, &request, &QueryOptions::namespace(&volume.namespace))
            .await
    }

    /// Fetch a host volume; pass wait options to block until it changes.
    pub async fn info(
        &self,
        id: &str,
        opts: &QueryOptions,
    ) -> Result<(HostVolume, QueryMeta), ApiError> {
        self.client
            .query(&format!("/v1/volume/host/{}", id), opts)
            .await
    }

    pub async fn delete(&self, id: &str, namespace: &str) -> Result<(), ApiError> {
        self.client
            .write::<()>(
                Method::DELETE,
                &format!("/v1/volume/host/{}/delete", id),
                None,
                &QueryOptions::namespace(namespace),
            )
            .await
    }
}
