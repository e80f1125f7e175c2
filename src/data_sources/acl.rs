//! ACL policy, role and token data sources.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{computed_objects, string_list_type};
use crate::api::QueryOptions;
use crate::error::{ApiResultExt, ProviderError};
use crate::resource::{DataSource, ProviderContext};
use crate::resources::acl_role::{self, AclRoleState};
use crate::resources::acl_token::{self, AclTokenState};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

/// `nomad_acl_policy`: one ACL policy by name.
#[derive(Debug, Default, Clone, Copy)]
pub struct AclPolicyDataSource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AclPolicyDataState {
    pub id: String,
    pub name: String,
    pub description: String,
    pub rules: String,
}

#[async_trait]
impl DataSource for AclPolicyDataSource {
    type State = AclPolicyDataState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Reads an ACL policy.")
            .with_id()
            .with_attribute("name", Attribute::required_string())
            .with_attribute("description", Attribute::computed_string())
            .with_attribute(
                "rules",
                Attribute::computed_string().with_description("The policy rules in HCL."),
            )
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        config: AclPolicyDataState,
    ) -> Result<AclPolicyDataState, ProviderError> {
        let policy = ctx
            .client
            .acl_policies()
            .info(&config.name)
            .await
            .with_context(|| format!("error reading ACL policy {:?}", config.name))?;
        Ok(AclPolicyDataState {
            id: policy.name.clone(),
            name: policy.name,
            description: policy.description,
            rules: policy.rules,
        })
    }
}

/// `nomad_acl_policies`: ACL policies, optionally filtered by name prefix.
#[derive(Debug, Default, Clone, Copy)]
pub struct AclPoliciesDataSource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AclPoliciesState {
    pub id: String,
    pub prefix: String,
    pub policies: Vec<PolicySummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicySummary {
    pub name: String,
    pub description: String,
}

#[async_trait]
impl DataSource for AclPoliciesDataSource {
    type State = AclPoliciesState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Lists ACL policies.")
            .with_id()
            .with_attribute("prefix", Attribute::optional_string())
            .with_attribute(
                "policies",
                computed_objects([
                    ("name", AttributeType::String),
                    ("description", AttributeType::String),
                ]),
            )
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        config: AclPoliciesState,
    ) -> Result<AclPoliciesState, ProviderError> {
        let stubs = ctx
            .client
            .acl_policies()
            .list(&QueryOptions::new().with_prefix(&config.prefix))
            .await
            .context("error listing ACL policies")?;
        debug!(prefix = %config.prefix, count = stubs.len(), "Listed ACL policies");
        Ok(AclPoliciesState {
            id: ctx.client.address().to_string(),
            policies: stubs
                .into_iter()
                .map(|p| PolicySummary {
                    name: p.name,
                    description: p.description,
                })
                .collect(),
            ..config
        })
    }
}

/// `nomad_acl_role`: one ACL role by id.
#[derive(Debug, Default, Clone, Copy)]
pub struct AclRoleDataSource;

#[async_trait]
impl DataSource for AclRoleDataSource {
    type State = AclRoleState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Reads an ACL role.")
            .with_attribute("id", Attribute::required_string())
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("description", Attribute::computed_string())
            .with_attribute("policy", computed_objects([("name", AttributeType::String)]))
    }

    async fn read(&self, ctx: &ProviderContext, config: AclRoleState) -> Result<AclRoleState, ProviderError> {
        let role = ctx
            .client
            .acl_roles()
            .info(&config.id)
            .await
            .with_context(|| format!("error reading ACL role {:?}", config.id))?;
        Ok(acl_role::flatten(role))
    }
}

/// `nomad_acl_roles`
#[derive(Debug, Default, Clone, Copy)]
pub struct AclRolesDataSource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AclRolesState {
    pub id: String,
    pub prefix: String,
    pub acl_roles: Vec<RoleSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RoleSummary {
    pub id: String,
    pub name: String,
    pub description: String,
    pub policies: Vec<String>,
}

#[async_trait]
impl DataSource for AclRolesDataSource {
    type State = AclRolesState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Lists ACL roles.")
            .with_id()
            .with_attribute("prefix", Attribute::optional_string())
            .with_attribute(
                "acl_roles",
                computed_objects([
                    ("id", AttributeType::String),
                    ("name", AttributeType::String),
                    ("description", AttributeType::String),
                    ("policies", string_list_type()),
                ]),
            )
    }

    async fn read(&self, ctx: &ProviderContext, config: AclRolesState) -> Result<AclRolesState, ProviderError> {
        let roles = ctx
            .client
            .acl_roles()
            .list(&QueryOptions::new().with_prefix(&config.prefix))
            .await
            .context("error listing ACL roles")?;
        Ok(AclRolesState {
            id: ctx.client.address().to_string(),
            acl_roles: roles
                .into_iter()
                .map(|role| {
                    let mut policies: Vec<_> = role.policies.into_iter().map(|p| p.name).collect();
                    policies.sort();
                    RoleSummary {
                        id: role.id,
                        name: role.name,
                        description: role.description,
                        policies,
                    }
                })
                .collect(),
            ..config
        })
    }
}

/// `nomad_acl_token`: one ACL token by accessor id.
#[derive(Debug, Default, Clone, Copy)]
pub struct AclTokenDataSource;

#[async_trait]
impl DataSource for AclTokenDataSource {
    type State = AclTokenState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Reads an ACL token.")
            .with_id()
            .with_attribute("accessor_id", Attribute::required_string())
            .with_attribute("secret_id", Attribute::computed_string().sensitive())
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("type", Attribute::computed_string())
            .with_attribute("policies", Attribute::string_list(AttributeFlags::computed()))
            .with_attribute(
                "role",
                computed_objects([("id", AttributeType::String), ("name", AttributeType::String)]),
            )
            .with_attribute("global", Attribute::computed_bool())
            .with_attribute("create_time", Attribute::computed_string())
            .with_attribute("expiration_ttl", Attribute::computed_string())
            .with_attribute("expiration_time", Attribute::computed_string())
    }

    async fn read(&self, ctx: &ProviderContext, config: AclTokenState) -> Result<AclTokenState, ProviderError> {
        let token = ctx
            .client
            .acl_tokens()
            .info(&config.accessor_id)
            .await
            .with_context(|| format!("error reading ACL token {:?}", config.accessor_id))?;
        Ok(acl_token::flatten(token, &AclTokenState::default()))
    }
}

/// `nomad_acl_tokens`
#[derive(Debug, Default, Clone, Copy)]
pub struct AclTokensDataSource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AclTokensState {
    pub id: String,
    pub prefix: String,
    pub acl_tokens: Vec<TokenSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenSummary {
    pub accessor_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub policies: Vec<String>,
    pub roles: Vec<String>,
    pub global: bool,
    pub create_time: String,
    pub expiration_time: String,
}

#[async_trait]
impl DataSource for AclTokensDataSource {
    type State = AclTokensState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Lists ACL tokens.")
            .with_id()
            .with_attribute("prefix", Attribute::optional_string())
            .with_attribute(
                "acl_tokens",
                computed_objects([
                    ("accessor_id", AttributeType::String),
                    ("name", AttributeType::String),
                    ("type", AttributeType::String),
                    ("policies", string_list_type()),
                    ("roles", string_list_type()),
                    ("global", AttributeType::Bool),
                    ("create_time", AttributeType::String),
                    ("expiration_time", AttributeType::String),
                ]),
            )
    }

    async fn read(&self, ctx: &ProviderContext, config: AclTokensState) -> Result<AclTokensState, ProviderError> {
        let tokens = ctx
            .client
            .acl_tokens()
            .list(&QueryOptions::new().with_prefix(&config.prefix))
            .await
            .context("error listing ACL tokens")?;
        Ok(AclTokensState {
            id: ctx.client.address().to_string(),
            acl_tokens: tokens
                .into_iter()
                .map(|token| TokenSummary {
                    accessor_id: token.accessor_id,
                    name: token.name,
                    token_type: token.token_type,
                    policies: token.policies,
                    roles: token.roles.into_iter().map(|r| r.id).collect(),
                    global: token.global,
                    create_time: token.create_time.unwrap_or_default(),
                    expiration_time: token.expiration_time.unwrap_or_default(),
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
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_policies_by_prefix() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/acl/policies"))
            .and(query_param("prefix", "tf-acc-test"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"Name": "tf-acc-test-1", "Description": "first"},
                {"Name": "tf-acc-test-2", "Description": "second"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let config = AclPoliciesState {
            prefix: "tf-acc-test".into(),
            ..Default::default()
        };
        let state = AclPoliciesDataSource.read(&ctx, config).await.unwrap();
        assert_eq!(state.prefix, "tf-acc-test");
        assert_eq!(state.policies.len(), 2);
        assert_eq!(state.policies[1].name, "tf-acc-test-2");
    }

    #[tokio::test]
    async fn test_missing_policy_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/acl/policy/nope"))
            .respond_with(ResponseTemplate::new(404).set_body_string("ACL policy not found"))
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let config = AclPolicyDataState {
            name: "nope".into(),
            ..Default::default()
        };
        let err = AclPolicyDataSource.read(&ctx, config).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_token_list_keeps_role_ids() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/acl/tokens"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "AccessorID": "a1",
                "Name": "ci",
                "Type": "client",
                "Policies": null,
                "Roles": [{"ID": "r1", "Name": "ops"}],
                "Global": false,
                "CreateTime": "2024-01-01T00:00:00Z"
            }])))
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let state = AclTokensDataSource.read(&ctx, AclTokensState::default()).await.unwrap();
        let token = &state.acl_tokens[0];
        assert_eq!(token.roles, vec!["r1"]);
        assert!(token.policies.is_empty());
        assert_eq!(token.expiration_time, "");
    }
}
