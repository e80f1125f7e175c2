//! `nomad_variable`

use async_trait::async_trait;

use crate::api::DEFAULT_NAMESPACE;
use crate::error::{ApiResultExt, ProviderError};
use crate::resource::{DataSource, ProviderContext};
use crate::resources::variable::{self, VariableState};
use crate::schema::{Attribute, AttributeFlags, Schema};

/// Reads the items of a variable.
#[derive(Debug, Default, Clone, Copy)]
pub struct VariableDataSource;

#[async_trait]
impl DataSource for VariableDataSource {
    type State = VariableState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Reads a variable.")
            .with_id()
            .with_attribute("path", Attribute::required_string())
            .with_attribute(
                "namespace",
                Attribute::optional_string().with_default(DEFAULT_NAMESPACE),
            )
            .with_attribute(
                "items",
                Attribute::string_map(AttributeFlags::computed().sensitive()),
            )
    }

    async fn read(&self, ctx: &ProviderContext, config: VariableState) -> Result<VariableState, ProviderError> {
        let namespace = variable::namespace_or_default(&config.namespace);
        let found = ctx
            .client
            .variables()
            .read(&config.path, namespace)
            .await
            .with_context(|| format!("error reading variable {:?}", config.path))?;
        Ok(variable::flatten(found))
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
    async fn test_reads_items_in_default_namespace() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/var/app/config"))
            .and(query_param("namespace", "default"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Namespace": "default",
                "Path": "app/config",
                "Items": {"db_password": "hunter2"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let config = VariableState {
            path: "app/config".into(),
            ..Default::default()
        };
        let state = VariableDataSource.read(&ctx, config).await.unwrap();
        assert_eq!(state.id, "app/config@default");
        assert_eq!(state.items["db_password"], "hunter2");
    }
}
