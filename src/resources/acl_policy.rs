//! `nomad_acl_policy`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::api::{AclPolicy, JobAcl, DEFAULT_NAMESPACE};
use crate::error::{ApiResultExt, OptionalExt, ProviderError};
use crate::resource::{ProviderContext, Resource};
use crate::schema::{Attribute, Block, NestedBlock, Schema};

/// Manages an ACL policy.
#[derive(Debug, Default, Clone, Copy)]
pub struct AclPolicyResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AclPolicyState {
    pub id: String,
    pub name: String,
    pub description: String,
    pub rules_hcl: String,
    pub job_acl: Option<JobAclState>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobAclState {
    pub namespace: String,
    pub job_id: String,
    pub group: String,
    pub task: String,
}

impl Default for JobAclState {
    fn default() -> Self {
        Self {
            namespace: DEFAULT_NAMESPACE.to_string(),
            job_id: String::new(),
            group: String::new(),
            task: String::new(),
        }
    }
}

fn expand(state: &AclPolicyState) -> AclPolicy {
    AclPolicy {
        name: state.name.clone(),
        description: state.description.clone(),
        rules: state.rules_hcl.clone(),
        job_acl: state.job_acl.as_ref().map(|acl| JobAcl {
            namespace: acl.namespace.clone(),
            job_id: acl.job_id.clone(),
            group: acl.group.clone(),
            task: acl.task.clone(),
        }),
        ..Default::default()
    }
}

pub(crate) fn flatten(policy: AclPolicy) -> AclPolicyState {
    AclPolicyState {
        id: policy.name.clone(),
        name: policy.name,
        description: policy.description,
        rules_hcl: policy.rules,
        job_acl: policy.job_acl.map(|acl| JobAclState {
            namespace: acl.namespace,
            job_id: acl.job_id,
            group: acl.group,
            task: acl.task,
        }),
    }
}

impl AclPolicyResource {
    async fn upsert(
        &self,
        ctx: &ProviderContext,
        state: AclPolicyState,
    ) -> Result<AclPolicyState, ProviderError> {
        let policy = expand(&state);
        ctx.client
            .acl_policies()
            .upsert(&policy)
            .await
            .with_context(|| format!("error upserting ACL policy {:?}", policy.name))?;
        info!(name = %policy.name, "Upserted ACL policy");

        let state = AclPolicyState {
            id: policy.name.clone(),
            ..state
        };
        self.read(ctx, state)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("ACL policy {:?}", policy.name)))
    }
}

#[async_trait]
impl Resource for AclPolicyResource {
    type State = AclPolicyState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Manages an ACL policy.")
            .with_id()
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_description("Unique name for this policy.")
                    .with_force_new(),
            )
            .with_attribute(
                "description",
                Attribute::optional_string().with_description("Description for this policy."),
            )
            .with_attribute(
                "rules_hcl",
                Attribute::required_string()
                    .with_description("HCL or JSON representation of the rules to enforce."),
            )
            .with_block(
                "job_acl",
                NestedBlock::single(
                    Block::new()
                        .with_description("Workload identity the policy is attached to.")
                        .with_attribute(
                            "namespace",
                            Attribute::optional_string().with_default(DEFAULT_NAMESPACE),
                        )
                        .with_attribute("job_id", Attribute::required_string())
                        .with_attribute("group", Attribute::optional_string())
                        .with_attribute("task", Attribute::optional_string()),
                ),
            )
    }

    async fn create(
        &self,
        ctx: &ProviderContext,
        planned: AclPolicyState,
    ) -> Result<AclPolicyState, ProviderError> {
        self.upsert(ctx, planned).await
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        state: AclPolicyState,
    ) -> Result<Option<AclPolicyState>, ProviderError> {
        debug!(name = %state.id, "Reading ACL policy");
        let policy = ctx
            .client
            .acl_policies()
            .info(&state.id)
            .await
            .with_context(|| format!("error reading ACL policy {:?}", state.id))
            .optional()?;
        Ok(policy.map(flatten))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        _prior: AclPolicyState,
        planned: AclPolicyState,
    ) -> Result<AclPolicyState, ProviderError> {
        self.upsert(ctx, planned).await
    }

    async fn delete(&self, ctx: &ProviderContext, state: AclPolicyState) -> Result<(), ProviderError> {
        ctx.client
            .acl_policies()
            .delete(&state.id)
            .await
            .with_context(|| format!("error deleting ACL policy {:?}", state.id))?;
        info!(name = %state.id, "Deleted ACL policy");
        Ok(())
    }

    async fn exists(&self, ctx: &ProviderContext, state: &AclPolicyState) -> Result<bool, ProviderError> {
        let policy = ctx
            .client
            .acl_policies()
            .info(&state.id)
            .await
            .with_context(|| format!("error checking ACL policy {:?}", state.id))
            .optional()?;
        Ok(policy.is_some())
    }

    fn import_state(&self, id: &str) -> Result<AclPolicyState, ProviderError> {
        Ok(AclPolicyState {
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
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn policy_json() -> serde_json::Value {
        serde_json::json!({
            "Name": "tf-acc-test",
            "Description": "Terraform ACL Policy tests",
            "Rules": "namespace \"default\" { policy = \"read\" }",
            "JobACL": {"Namespace": "default", "JobID": "example", "Group": "", "Task": ""},
            "CreateIndex": 10,
            "ModifyIndex": 12
        })
    }

    #[test]
    fn test_expand_flatten() {
        let state = AclPolicyState {
            id: "tf-acc-test".into(),
            name: "tf-acc-test".into(),
            description: "Terraform ACL Policy tests".into(),
            rules_hcl: "namespace \"default\" { policy = \"read\" }".into(),
            job_acl: Some(JobAclState {
                job_id: "example".into(),
                ..Default::default()
            }),
        };
        assert_eq!(flatten(expand(&state)), state);
    }

    #[tokio::test]
    async fn test_create_upserts_then_reads() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/acl/policy/tf-acc-test"))
            .and(body_partial_json(serde_json::json!({"Name": "tf-acc-test"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/acl/policy/tf-acc-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(policy_json()))
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let state = AclPolicyResource
            .create(
                &ctx,
                AclPolicyState {
                    name: "tf-acc-test".into(),
                    rules_hcl: "namespace \"default\" { policy = \"read\" }".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(state.id, "tf-acc-test");
        assert_eq!(state.description, "Terraform ACL Policy tests");
        assert_eq!(state.job_acl.unwrap().job_id, "example");
    }

    #[tokio::test]
    async fn test_read_missing_policy_is_gone() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/acl/policy/missing"))
            .respond_with(ResponseTemplate::new(404).set_body_string("ACL policy not found"))
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let state = AclPolicyResource.import_state("missing").unwrap();
        assert!(!AclPolicyResource.exists(&ctx, &state).await.unwrap());
        assert!(AclPolicyResource.read(&ctx, state).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_read_server_error_propagates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/acl/policy/broken"))
            .respond_with(ResponseTemplate::new(500).set_body_string("rpc error"))
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let state = AclPolicyResource.import_state("broken").unwrap();
        let err = AclPolicyResource.read(&ctx, state).await.unwrap_err();
        assert!(matches!(err, ProviderError::Api { .. }));
    }
}
