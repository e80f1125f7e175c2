//! `nomad_variable`

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::{Variable, DEFAULT_NAMESPACE};
use crate::error::{ApiResultExt, OptionalExt, ProviderError};
use crate::resource::{ProviderContext, Resource};
use crate::schema::{Attribute, AttributeFlags, Schema};

/// Manages a variable.
#[derive(Debug, Default, Clone, Copy)]
pub struct VariableResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VariableState {
    pub id: String,
    pub path: String,
    pub namespace: String,
    pub items: HashMap<String, String>,
}

/// `path@namespace`
pub fn variable_id(path: &str, namespace: &str) -> String {
    format!("{}@{}", path, namespace)
}

/// Split an id into path and namespace; a bare path is in the default namespace.
pub fn parse_variable_id(id: &str) -> (String, String) {
    match id.rsplit_once('@') {
        Some((path, namespace)) if !namespace.is_empty() => (path.to_string(), namespace.to_string()),
        _ => (id.trim_end_matches('@').to_string(), DEFAULT_NAMESPACE.to_string()),
    }
}

pub(crate) fn namespace_or_default(namespace: &str) -> &str {
    if namespace.is_empty() {
        DEFAULT_NAMESPACE
    } else {
        namespace
    }
}

pub(crate) fn flatten(variable: Variable) -> VariableState {
    VariableState {
        id: variable_id(&variable.path, &variable.namespace),
        path: variable.path,
        namespace: variable.namespace,
        items: variable.items,
    }
}

impl VariableResource {
    async fn put(
        &self,
        ctx: &ProviderContext,
        state: VariableState,
    ) -> Result<VariableState, ProviderError> {
        let variable = Variable {
            namespace: namespace_or_default(&state.namespace).to_string(),
            path: state.path.clone(),
            items: state.items.clone(),
            ..Default::default()
        };
        let written = ctx
            .client
            .variables()
            .create(&variable)
            .await
            .with_context(|| format!("error writing variable {:?}", variable.path))?;
        info!(path = %written.path, namespace = %written.namespace, "Wrote variable");
        Ok(flatten(written))
    }
}

#[async_trait]
impl Resource for VariableResource {
    type State = VariableState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Manages a variable.")
            .with_id()
            .with_attribute(
                "path",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Unique path of the variable."),
            )
            .with_attribute(
                "namespace",
                Attribute::optional_string()
                    .with_default(DEFAULT_NAMESPACE)
                    .with_force_new(),
            )
            .with_attribute(
                "items",
                Attribute::string_map(AttributeFlags::required().sensitive())
                    .with_description("Key-value pairs stored in the variable."),
            )
    }

    async fn create(
        &self,
        ctx: &ProviderContext,
        planned: VariableState,
    ) -> Result<VariableState, ProviderError> {
        self.put(ctx, planned).await
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        state: VariableState,
    ) -> Result<Option<VariableState>, ProviderError> {
        let (path, namespace) = parse_variable_id(&state.id);
        let variable = ctx
            .client
            .variables()
            .read(&path, &namespace)
            .await
            .with_context(|| format!("error reading variable {:?}", state.id))
            .optional()?;
        Ok(variable.map(flatten))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        _prior: VariableState,
        planned: VariableState,
    ) -> Result<VariableState, ProviderError> {
        self.put(ctx, planned).await
    }

    async fn delete(&self, ctx: &ProviderContext, state: VariableState) -> Result<(), ProviderError> {
        let (path, namespace) = parse_variable_id(&state.id);
        ctx.client
            .variables()
            .delete(&path, &namespace)
            .await
            .with_context(|| format!("error deleting variable {:?}", state.id))?;
        info!(path = %path, namespace = %namespace, "Deleted variable");
        Ok(())
    }

    fn import_state(&self, id: &str) -> Result<VariableState, ProviderError> {
        let (path, namespace) = parse_variable_id(id);
        Ok(VariableState {
            id: variable_id(&path, &namespace),
            path,
            namespace,
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::test_context;
    use rstest::rstest;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[rstest]
    #[case("nomad/jobs/example@prod", "nomad/jobs/example", "prod")]
    #[case("nomad/jobs/example", "nomad/jobs/example", "default")]
    #[case("a@b@ops", "a@b", "ops")]
    fn test_parse_variable_id(#[case] id: &str, #[case] path: &str, #[case] namespace: &str) {
        assert_eq!(parse_variable_id(id), (path.to_string(), namespace.to_string()));
    }

    #[tokio::test]
    async fn test_create_defaults_namespace() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/v1/var/app/config"))
            .and(query_param("namespace", "default"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Namespace": "default",
                "Path": "app/config",
                "Items": {"password": "hunter2"},
                "CreateIndex": 5,
                "ModifyIndex": 5
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let state = VariableResource
            .create(
                &ctx,
                VariableState {
                    path: "app/config".into(),
                    items: HashMap::from([("password".to_string(), "hunter2".to_string())]),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(state.id, "app/config@default");
        assert_eq!(state.items["password"], "hunter2");
    }
}
