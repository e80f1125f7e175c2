//! `nomad_plugin` and `nomad_plugins`: CSI plugins.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::computed_objects;
use crate::api::{CsiInfo, CsiPlugin, QueryOptions, PLUGIN_TYPE_CSI};
use crate::error::{ApiResultExt, ProviderError};
use crate::helper::retry::{retry, RetryError, UntilDeadline};
use crate::resource::{DataSource, ProviderContext, Timeouts};
use crate::schema::{Attribute, AttributeType, Schema};

const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Reads a CSI plugin, optionally waiting for it to register and become healthy.
#[derive(Debug, Default, Clone, Copy)]
pub struct PluginDataSource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginState {
    pub id: String,
    pub plugin_id: String,
    pub wait_for_registration: bool,
    pub wait_for_healthy: bool,
    pub plugin_provider: String,
    pub plugin_provider_version: String,
    pub controller_required: bool,
    pub controllers_expected: i64,
    pub controllers_healthy: i64,
    pub nodes_expected: i64,
    pub nodes_healthy: i64,
    pub nodes: Vec<PluginNodeState>,
    pub timeouts: Option<Timeouts>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginNodeState {
    pub name: String,
    pub healthy: bool,
    pub healthy_description: String,
}

fn flatten(plugin: CsiPlugin, config: PluginState) -> PluginState {
    let mut nodes: Vec<_> = plugin
        .nodes
        .into_iter()
        .map(|(name, info): (String, CsiInfo)| PluginNodeState {
            name,
            healthy: info.healthy,
            healthy_description: info.health_description,
        })
        .collect();
    nodes.sort_by(|a, b| a.name.cmp(&b.name));
    PluginState {
        id: plugin.id.clone(),
        plugin_id: plugin.id,
        plugin_provider: plugin.provider,
        plugin_provider_version: plugin.version,
        controller_required: plugin.controller_required,
        controllers_expected: plugin.controllers_expected,
        controllers_healthy: plugin.controllers_healthy,
        nodes_expected: plugin.nodes_expected,
        nodes_healthy: plugin.nodes_healthy,
        nodes,
        ..config
    }
}

/// Fetch the plugin, retrying 404s until `deadline` when asked to.
async fn fetch(
    ctx: &ProviderContext,
    id: &str,
    wait_for_registration: bool,
    deadline: &UntilDeadline,
) -> Result<(CsiPlugin, u64), ProviderError> {
    let client = &ctx.client;
    let opts = QueryOptions::new();
    let opts = &opts;
    let get = move || async move {
        client
            .csi_plugins()
            .info(id, opts)
            .await
            .map(|(plugin, meta)| (plugin, meta.last_index))
            .with_context(|| format!("error reading CSI plugin {:?}", id))
    };
    if !wait_for_registration {
        return get().await;
    }
    retry("wait for CSI plugin registration", deadline.clone(), move || async move {
        get().await.map_err(|err| {
            if err.is_not_found() {
                debug!(plugin_id = id, "CSI plugin not registered yet");
                RetryError::transient(err)
            } else {
                RetryError::permanent(err)
            }
        })
    })
    .await
}

/// Block on the plugin until every expected instance is healthy.
async fn wait_for_healthy(
    ctx: &ProviderContext,
    mut plugin: CsiPlugin,
    mut index: u64,
    deadline: &UntilDeadline,
) -> Result<CsiPlugin, ProviderError> {
    while !plugin.is_healthy() {
        debug!(
            plugin_id = %plugin.id,
            controllers_healthy = plugin.controllers_healthy,
            controllers_expected = plugin.controllers_expected,
            nodes_healthy = plugin.nodes_healthy,
            nodes_expected = plugin.nodes_expected,
            "Waiting for CSI plugin to become healthy"
        );
        let Some(wait) = deadline.blocking_wait() else {
            return Err(ProviderError::DeadlineExceeded(format!(
                "CSI plugin {:?} has {}/{} healthy controllers and {}/{} healthy nodes",
                plugin.id,
                plugin.controllers_healthy,
                plugin.controllers_expected,
                plugin.nodes_healthy,
                plugin.nodes_expected
            )));
        };
        let opts = QueryOptions::new().with_wait(index, wait);
        let (next, meta) = ctx
            .client
            .csi_plugins()
            .info(&plugin.id, &opts)
            .await
            .with_context(|| format!("error reading CSI plugin {:?}", plugin.id))?;
        // A stale index would return at once; pace the loop instead.
        if meta.last_index <= index {
            tokio::time::sleep(ctx.retry.interval.min(deadline.remaining())).await;
        }
        index = meta.last_index.max(index);
        plugin = next;
    }
    Ok(plugin)
}

#[async_trait]
impl DataSource for PluginDataSource {
    type State = PluginState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Reads a CSI plugin.")
            .with_id()
            .with_attribute("plugin_id", Attribute::required_string())
            .with_attribute(
                "wait_for_registration",
                Attribute::optional_bool()
                    .with_default(false)
                    .with_description("Retry until the plugin is registered."),
            )
            .with_attribute(
                "wait_for_healthy",
                Attribute::optional_bool()
                    .with_default(false)
                    .with_description("Wait until every expected controller and node is healthy."),
            )
            .with_attribute("plugin_provider", Attribute::computed_string())
            .with_attribute("plugin_provider_version", Attribute::computed_string())
            .with_attribute("controller_required", Attribute::computed_bool())
            .with_attribute("controllers_expected", Attribute::computed_int64())
            .with_attribute("controllers_healthy", Attribute::computed_int64())
            .with_attribute("nodes_expected", Attribute::computed_int64())
            .with_attribute("nodes_healthy", Attribute::computed_int64())
            .with_attribute(
                "nodes",
                computed_objects([
                    ("name", AttributeType::String),
                    ("healthy", AttributeType::Bool),
                    ("healthy_description", AttributeType::String),
                ]),
            )
            .with_block("timeouts", Timeouts::block(&["read"]))
    }

    async fn read(&self, ctx: &ProviderContext, config: PluginState) -> Result<PluginState, ProviderError> {
        let timeout = Timeouts::read_or(&config.timeouts, DEFAULT_READ_TIMEOUT)?;
        let deadline = ctx.retry.until(timeout);

        let (mut plugin, index) =
            fetch(ctx, &config.plugin_id, config.wait_for_registration, &deadline).await?;
        if config.wait_for_healthy {
            plugin = wait_for_healthy(ctx, plugin, index, &deadline).await?;
        }
        Ok(flatten(plugin, config))
    }
}

/// Lists CSI plugins.
#[derive(Debug, Default, Clone, Copy)]
pub struct PluginsDataSource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginsState {
    pub id: String,
    #[serde(rename = "type")]
    pub plugin_type: String,
    pub plugins: Vec<PluginSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PluginSummary {
    pub id: String,
    pub provider: String,
    pub controller_required: bool,
    pub controllers_healthy: i64,
    pub controllers_expected: i64,
    pub nodes_healthy: i64,
    pub nodes_expected: i64,
}

#[async_trait]
impl DataSource for PluginsDataSource {
    type State = PluginsState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Lists CSI plugins.")
            .with_id()
            .with_attribute(
                "type",
                Attribute::optional_string()
                    .with_default(PLUGIN_TYPE_CSI)
                    .one_of([PLUGIN_TYPE_CSI]),
            )
            .with_attribute(
                "plugins",
                computed_objects([
                    ("id", AttributeType::String),
                    ("provider", AttributeType::String),
                    ("controller_required", AttributeType::Bool),
                    ("controllers_healthy", AttributeType::Int64),
                    ("controllers_expected", AttributeType::Int64),
                    ("nodes_healthy", AttributeType::Int64),
                    ("nodes_expected", AttributeType::Int64),
                ]),
            )
    }

    async fn read(&self, ctx: &ProviderContext, config: PluginsState) -> Result<PluginsState, ProviderError> {
        let plugins = ctx
            .client
            .csi_plugins()
            .list(&QueryOptions::new())
            .await
            .context("error listing CSI plugins")?;
        Ok(PluginsState {
            id: ctx.client.address().to_string(),
            plugin_type: PLUGIN_TYPE_CSI.to_string(),
            plugins: plugins
                .into_iter()
                .map(|p| PluginSummary {
                    id: p.id,
                    provider: p.provider,
                    controller_required: p.controller_required,
                    controllers_healthy: p.controllers_healthy,
                    controllers_expected: p.controllers_expected,
                    nodes_healthy: p.nodes_healthy,
                    nodes_expected: p.nodes_expected,
                })
                .collect(),
            ..config
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::test_context;
    use serde_json::{json, Value};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn plugin(controllers_healthy: i64, nodes_healthy: i64) -> Value {
        json!({
            "ID": "ebs",
            "Provider": "ebs.csi.aws.com",
            "Version": "1.2.0",
            "ControllerRequired": true,
            "ControllersHealthy": controllers_healthy,
            "ControllersExpected": 1,
            "NodesHealthy": nodes_healthy,
            "NodesExpected": 2,
            "Nodes": {
                "node-b": {"Healthy": true, "HealthDescription": "ok"},
                "node-a": {"Healthy": nodes_healthy == 2, "HealthDescription": ""}
            }
        })
    }

    fn config(wait_for_registration: bool, wait_for_healthy: bool) -> PluginState {
        PluginState {
            plugin_id: "ebs".into(),
            wait_for_registration,
            wait_for_healthy,
            timeouts: Some(Timeouts {
                read: Some("2s".into()),
                ..Default::default()
            }),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_reads_plugin() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/plugin/csi/ebs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(plugin(1, 2)))
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let state = PluginDataSource.read(&ctx, config(false, false)).await.unwrap();
        assert_eq!(state.plugin_provider, "ebs.csi.aws.com");
        assert_eq!(state.plugin_provider_version, "1.2.0");
        assert_eq!(state.nodes[0].name, "node-a");
        assert_eq!(state.nodes_healthy, 2);
    }

    #[tokio::test]
    async fn test_missing_plugin_fails_without_wait() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/plugin/csi/ebs"))
            .respond_with(ResponseTemplate::new(404).set_body_string("plugin not found"))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let err = PluginDataSource.read(&ctx, config(false, false)).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_waits_for_registration() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/plugin/csi/ebs"))
            .respond_with(ResponseTemplate::new(404).set_body_string("plugin not found"))
            .up_to_n_times(2)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/plugin/csi/ebs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(plugin(1, 2)))
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let state = PluginDataSource.read(&ctx, config(true, false)).await.unwrap();
        assert_eq!(state.id, "ebs");
    }

    #[tokio::test]
    async fn test_waits_for_healthy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/plugin/csi/ebs"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Nomad-Index", "5")
                    .set_body_json(plugin(1, 1)),
            )
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/plugin/csi/ebs"))
            .and(query_param("index", "5"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Nomad-Index", "6")
                    .set_body_json(plugin(1, 2)),
            )
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let state = PluginDataSource.read(&ctx, config(false, true)).await.unwrap();
        assert_eq!(state.nodes_healthy, 2);
        assert!(state.nodes.iter().all(|n| n.healthy));
    }

    #[tokio::test]
    async fn test_unhealthy_plugin_times_out() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/plugin/csi/ebs"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Nomad-Index", "5")
                    .set_body_json(plugin(0, 0)),
            )
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let mut config = config(false, true);
        config.timeouts = Some(Timeouts {
            read: Some("100ms".into()),
            ..Default::default()
        });
        let err = PluginDataSource.read(&ctx, config).await.unwrap_err();
        assert!(matches!(err, ProviderError::DeadlineExceeded(_)));
    }

    #[tokio::test]
    async fn test_no_blocking_query_after_deadline() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/plugin/csi/ebs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(plugin(1, 2)))
            .expect(0)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let unhealthy: CsiPlugin = serde_json::from_value(plugin(0, 0)).unwrap();
        let deadline = UntilDeadline::new(Duration::from_millis(10), Duration::ZERO);
        let err = wait_for_healthy(&ctx, unhealthy, 5, &deadline).await.unwrap_err();
        assert!(matches!(err, ProviderError::DeadlineExceeded(_)));
    }

    #[tokio::test]
    async fn test_lists_plugins() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/plugins"))
            .and(query_param("type", "csi"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"ID": "ebs", "Provider": "ebs.csi.aws.com", "ControllersExpected": 1}
            ])))
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let state = PluginsDataSource.read(&ctx, PluginsState::default()).await.unwrap();
        assert_eq!(state.plugin_type, "csi");
        assert_eq!(state.plugins[0].controllers_expected, 1);
    }
}
