//! `nomad_volumes`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::{QueryOptions, DEFAULT_NAMESPACE, VOLUME_TYPE_CSI, VOLUME_TYPE_HOST};
use crate::error::{ApiResultExt, ProviderError};
use crate::resource::{DataSource, ProviderContext};
use crate::schema::{Attribute, Schema};

/// Lists CSI or dynamic host volumes as Nomad returns them.
#[derive(Debug, Default, Clone, Copy)]
pub struct VolumesDataSource;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumesState {
    pub id: String,
    #[serde(rename = "type")]
    pub volume_type: String,
    pub namespace: String,
    pub node_id: String,
    pub plugin_id: String,
    pub volumes: Value,
}

impl Default for VolumesState {
    fn default() -> Self {
        Self {
            id: String::new(),
            volume_type: VOLUME_TYPE_CSI.to_string(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            node_id: String::new(),
            plugin_id: String::new(),
            volumes: Value::Array(Vec::new()),
        }
    }
}

#[async_trait]
impl DataSource for VolumesDataSource {
    type State = VolumesState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Lists volumes.")
            .with_id()
            .with_attribute(
                "type",
                Attribute::optional_string()
                    .with_default(VOLUME_TYPE_CSI)
                    .one_of([VOLUME_TYPE_CSI, VOLUME_TYPE_HOST]),
            )
            .with_attribute(
                "namespace",
                Attribute::optional_string().with_default(DEFAULT_NAMESPACE),
            )
            .with_attribute("node_id", Attribute::optional_string())
            .with_attribute("plugin_id", Attribute::optional_string())
            .with_attribute(
                "volumes",
                Attribute::computed_dynamic().with_description("Volume stubs as returned by Nomad."),
            )
    }

    async fn read(&self, ctx: &ProviderContext, config: VolumesState) -> Result<VolumesState, ProviderError> {
        let mut opts = QueryOptions::namespace(&config.namespace);
        if !config.node_id.is_empty() {
            opts = opts.with_param("node_id", &config.node_id);
        }
        if !config.plugin_id.is_empty() {
            opts = opts.with_param("plugin_id", &config.plugin_id);
        }
        let volumes = ctx
            .client
            .volumes(&config.volume_type, &opts)
            .await
            .with_context(|| format!("error listing {} volumes", config.volume_type))?;
        Ok(VolumesState {
            id: ctx.client.address().to_string(),
            volumes: Value::Array(volumes),
            ..config
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
    fn test_defaults_to_csi_in_default_namespace() {
        let state: VolumesState = decode(json!({"type": null, "volumes": null})).unwrap();
        assert_eq!(state.volume_type, "csi");
        assert_eq!(state.namespace, "default");
    }

    #[tokio::test]
    async fn test_lists_host_volumes_on_node() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/volumes"))
            .and(query_param("type", "host"))
            .and(query_param("node_id", "n1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"ID": "v1", "Name": "data", "NodeID": "n1", "State": "ready"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let config = VolumesState {
            volume_type: "host".into(),
            node_id: "n1".into(),
            ..Default::default()
        };
        let state = VolumesDataSource.read(&ctx, config).await.unwrap();
        assert_eq!(state.volumes[0]["Name"], "data");
    }
}
