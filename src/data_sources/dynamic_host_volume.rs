//! `nomad_dynamic_host_volume`

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::computed_objects;
use crate::api::{QueryOptions, DEFAULT_NAMESPACE};
use crate::error::{ApiResultExt, ProviderError};
use crate::resource::{DataSource, ProviderContext};
use crate::resources::dynamic_host_volume::{self, DynamicHostVolumeState};
use crate::resources::volume::{CapabilityState, ConstraintState};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

/// Reads a dynamic host volume by id.
#[derive(Debug, Default, Clone, Copy)]
pub struct DynamicHostVolumeDataSource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DynamicHostVolumeDataState {
    pub id: String,
    pub namespace: String,
    pub name: String,
    pub plugin_id: String,
    pub node_pool: String,
    pub node_id: String,
    pub capacity: String,
    pub capacity_bytes: i64,
    pub capacity_min_bytes: i64,
    pub capacity_max_bytes: i64,
    pub capability: Vec<CapabilityState>,
    pub constraint: Vec<ConstraintState>,
    pub parameters: HashMap<String, String>,
    pub host_path: String,
    pub state: String,
}

impl From<DynamicHostVolumeState> for DynamicHostVolumeDataState {
    fn from(volume: DynamicHostVolumeState) -> Self {
        Self {
            id: volume.id,
            namespace: volume.namespace,
            name: volume.name,
            plugin_id: volume.plugin_id,
            node_pool: volume.node_pool,
            node_id: volume.node_id,
            capacity: volume.capacity,
            capacity_bytes: volume.capacity_bytes,
            capacity_min_bytes: volume.capacity_min_bytes,
            capacity_max_bytes: volume.capacity_max_bytes,
            capability: volume.capability,
            constraint: volume.constraint,
            parameters: volume.parameters,
            host_path: volume.host_path,
            state: volume.state,
        }
    }
}

#[async_trait]
impl DataSource for DynamicHostVolumeDataSource {
    type State = DynamicHostVolumeDataState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Reads a dynamic host volume.")
            .with_attribute("id", Attribute::required_string())
            .with_attribute(
                "namespace",
                Attribute::optional_string().with_default(DEFAULT_NAMESPACE),
            )
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("plugin_id", Attribute::computed_string())
            .with_attribute("node_pool", Attribute::computed_string())
            .with_attribute("node_id", Attribute::computed_string())
            .with_attribute("capacity", Attribute::computed_string())
            .with_attribute("capacity_bytes", Attribute::computed_int64())
            .with_attribute("capacity_min_bytes", Attribute::computed_int64())
            .with_attribute("capacity_max_bytes", Attribute::computed_int64())
            .with_attribute(
                "capability",
                computed_objects([
                    ("access_mode", AttributeType::String),
                    ("attachment_mode", AttributeType::String),
                ]),
            )
            .with_attribute(
                "constraint",
                computed_objects([
                    ("attribute", AttributeType::String),
                    ("operator", AttributeType::String),
                    ("value", AttributeType::String),
                ]),
            )
            .with_attribute("parameters", Attribute::string_map(AttributeFlags::computed()))
            .with_attribute("host_path", Attribute::computed_string())
            .with_attribute("state", Attribute::computed_string())
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        config: DynamicHostVolumeDataState,
    ) -> Result<DynamicHostVolumeDataState, ProviderError> {
        let (volume, _) = ctx
            .client
            .host_volumes()
            .info(&config.id, &QueryOptions::namespace(&config.namespace))
            .await
            .with_context(|| format!("error reading dynamic host volume {:?}", config.id))?;
        Ok(dynamic_host_volume::flatten(volume, &DynamicHostVolumeState::default()).into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::test_context;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_reads_volume_in_namespace() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/volume/host/v1"))
            .and(query_param("namespace", "apps"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ID": "v1",
                "Namespace": "apps",
                "Name": "data",
                "PluginID": "mkdir",
                "NodeID": "n1",
                "CapacityBytes": 1073741824,
                "RequestedCapabilities": [
                    {"AccessMode": "single-node-writer", "AttachmentMode": "file-system"}
                ],
                "HostPath": "/opt/data",
                "State": "ready"
            })))
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let config = DynamicHostVolumeDataState {
            id: "v1".into(),
            namespace: "apps".into(),
            ..Default::default()
        };
        let state = DynamicHostVolumeDataSource.read(&ctx, config).await.unwrap();
        assert_eq!(state.name, "data");
        assert_eq!(state.capacity, "1.0 GiB");
        assert_eq!(state.capability.len(), 1);
        assert_eq!(state.state, "ready");
    }
}
