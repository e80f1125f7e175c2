//! `nomad_sentinel_policy`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::SentinelPolicy;
use crate::error::{ApiResultExt, OptionalExt, ProviderError};
use crate::resource::{ProviderContext, Resource};
use crate::schema::{Attribute, Schema};

/// Manages a Sentinel policy.
#[derive(Debug, Default, Clone, Copy)]
pub struct SentinelPolicyResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SentinelPolicyState {
    pub id: String,
    pub name: String,
    pub description: String,
    pub policy: String,
    pub scope: String,
    pub enforcement_level: String,
}

fn expand(state: &SentinelPolicyState) -> SentinelPolicy {
    SentinelPolicy {
        name: state.name.clone(),
        description: state.description.clone(),
        scope: state.scope.clone(),
        enforcement_level: state.enforcement_level.clone(),
        policy: state.policy.clone(),
        ..Default::default()
    }
}

fn flatten(policy: SentinelPolicy) -> SentinelPolicyState {
    SentinelPolicyState {
        id: policy.name.clone(),
        name: policy.name,
        description: policy.description,
        policy: policy.policy,
        scope: policy.scope,
        enforcement_level: policy.enforcement_level,
    }
}

impl SentinelPolicyResource {
    async fn upsert(
        &self,
        ctx: &ProviderContext,
        state: SentinelPolicyState,
    ) -> Result<SentinelPolicyState, ProviderError> {
        let policy = expand(&state);
        ctx.client
            .sentinel_policies()
            .upsert(&policy)
            .await
            .with_context(|| format!("error upserting Sentinel policy {:?}", policy.name))?;
        info!(name = %policy.name, "Upserted Sentinel policy");

        let state = SentinelPolicyState {
            id: policy.name.clone(),
            ..state
        };
        self.read(ctx, state)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("Sentinel policy {:?}", policy.name)))
    }
}

#[async_trait]
impl Resource for SentinelPolicyResource {
    type State = SentinelPolicyState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Manages a Sentinel policy (Nomad Enterprise).")
            .with_id()
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Unique name for this policy."),
            )
            .with_attribute("description", Attribute::optional_string())
            .with_attribute(
                "policy",
                Attribute::required_string().with_description("The Sentinel policy source."),
            )
            .with_attribute(
                "scope",
                Attribute::required_string().one_of(["submit-job", "submit-host-volume"]),
            )
            .with_attribute(
                "enforcement_level",
                Attribute::required_string().one_of(["advisory", "soft-mandatory", "hard-mandatory"]),
            )
    }

    async fn create(
        &self,
        ctx: &ProviderContext,
        planned: SentinelPolicyState,
    ) -> Result<SentinelPolicyState, ProviderError> {
        self.upsert(ctx, planned).await
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        state: SentinelPolicyState,
    ) -> Result<Option<SentinelPolicyState>, ProviderError> {
        let policy = ctx
            .client
            .sentinel_policies()
            .info(&state.id)
            .await
            .with_context(|| format!("error reading Sentinel policy {:?}", state.id))
            .optional()?;
        Ok(policy.map(flatten))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        _prior: SentinelPolicyState,
        planned: SentinelPolicyState,
    ) -> Result<SentinelPolicyState, ProviderError> {
        self.upsert(ctx, planned).await
    }

    async fn delete(
        &self,
        ctx: &ProviderContext,
        state: SentinelPolicyState,
    ) -> Result<(), ProviderError> {
        ctx.client
            .sentinel_policies()
            .delete(&state.id)
            .await
            .with_context(|| format!("error deleting Sentinel policy {:?}", state.id))?;
        info!(name = %state.id, "Deleted Sentinel policy");
        Ok(())
    }

    fn import_state(&self, id: &str) -> Result<SentinelPolicyState, ProviderError> {
        Ok(SentinelPolicyState {
            id: id.to_string(),
            name: id.to_string(),
            ..Default::default()
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
    async fn test_read_flattens_policy() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/sentinel/policy/no-docker"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Name": "no-docker",
                "Description": "forbid docker",
                "Scope": "submit-job",
                "EnforcementLevel": "soft-mandatory",
                "Policy": "main = rule { true }"
            })))
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let state = SentinelPolicyResource
            .read(&ctx, SentinelPolicyResource.import_state("no-docker").unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(state.enforcement_level, "soft-mandatory");
        assert_eq!(state.policy, "main = rule { true }");
        assert_eq!(state, flatten(expand(&state)));
    }
}
