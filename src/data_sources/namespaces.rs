//! `nomad_namespace` and `nomad_namespaces`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::string_list_type;
use crate::api::QueryOptions;
use crate::error::{ApiResultExt, ProviderError};
use crate::resource::{DataSource, ProviderContext};
use crate::resources::namespace::{self, NamespaceState};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

/// Reads one namespace.
#[derive(Debug, Default, Clone, Copy)]
pub struct NamespaceDataSource;

#[async_trait]
impl DataSource for NamespaceDataSource {
    type State = NamespaceState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Reads a namespace.")
            .with_id()
            .with_attribute("name", Attribute::required_string())
            .with_attribute("description", Attribute::computed_string())
            .with_attribute("quota", Attribute::computed_string())
            .with_attribute("meta", Attribute::string_map(AttributeFlags::computed()))
            .with_attribute(
                "capabilities",
                Attribute::new(
                    AttributeType::object([
                        ("enabled_task_drivers", string_list_type()),
                        ("disabled_task_drivers", string_list_type()),
                        ("enabled_network_modes", string_list_type()),
                        ("disabled_network_modes", string_list_type()),
                    ]),
                    AttributeFlags::computed(),
                ),
            )
            .with_attribute(
                "node_pool_config",
                Attribute::new(
                    AttributeType::object([
                        ("default", AttributeType::String),
                        ("allowed", string_list_type()),
                        ("denied", string_list_type()),
                    ]),
                    AttributeFlags::computed(),
                ),
            )
    }

    async fn read(&self, ctx: &ProviderContext, config: NamespaceState) -> Result<NamespaceState, ProviderError> {
        let found = ctx
            .client
            .namespaces()
            .info(&config.name)
            .await
            .with_context(|| format!("error reading namespace {:?}", config.name))?;
        Ok(namespace::flatten(found))
    }
}

/// Names of every namespace.
#[derive(Debug, Default, Clone, Copy)]
pub struct NamespacesDataSource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NamespacesState {
    pub id: String,
    pub namespaces: Vec<String>,
}

#[async_trait]
impl DataSource for NamespacesDataSource {
    type State = NamespacesState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Lists namespace names.")
            .with_id()
            .with_attribute("namespaces", Attribute::string_list(AttributeFlags::computed()))
    }

    async fn read(&self, ctx: &ProviderContext, _config: NamespacesState) -> Result<NamespacesState, ProviderError> {
        let namespaces = ctx
            .client
            .namespaces()
            .list(&QueryOptions::new())
            .await
            .context("error listing namespaces")?;
        let mut names: Vec<_> = namespaces.into_iter().map(|ns| ns.name).collect();
        names.sort();
        Ok(NamespacesState {
            id: ctx.client.address().to_string(),
            namespaces: names,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::test_context;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_namespace_names_are_sorted() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/namespaces"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"Name": "default"},
                {"Name": "apps"}
            ])))
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let state = NamespacesDataSource
            .read(&ctx, NamespacesState::default())
            .await
            .unwrap();
        assert_eq!(state.namespaces, vec!["apps", "default"]);
    }

    #[tokio::test]
    async fn test_reads_namespace_capabilities() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/namespace/apps"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Name": "apps",
                "Description": "applications",
                "Capabilities": {"EnabledTaskDrivers": ["docker"]}
            })))
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let config = NamespaceState {
            name: "apps".into(),
            ..Default::default()
        };
        let state = NamespaceDataSource.read(&ctx, config).await.unwrap();
        assert_eq!(state.id, "apps");
        let capabilities = state.capabilities.unwrap();
        assert_eq!(capabilities.enabled_task_drivers, vec!["docker"]);
    }
}
