//! `nomad_acl_token`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::{AclToken, AclTokenRoleLink};
use crate::error::{ApiResultExt, OptionalExt, ProviderError};
use crate::helper::{flatten_duration, parse_opt_duration};
use crate::resource::{ProviderContext, Resource};
use crate::schema::{
    Attribute, AttributeFlags, Block, Diagnostic, NestedBlock, Schema, ValueValidator,
};

const TOKEN_TYPES: [&str; 2] = ["client", "management"];

/// Manages an ACL token.
#[derive(Debug, Default, Clone, Copy)]
pub struct AclTokenResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AclTokenState {
    pub id: String,
    pub accessor_id: String,
    pub secret_id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub token_type: String,
    pub policies: Vec<String>,
    pub role: Vec<TokenRoleState>,
    pub global: bool,
    pub create_time: String,
    pub expiration_ttl: String,
    pub expiration_time: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenRoleState {
    pub id: String,
    pub name: String,
}

pub(crate) fn expand(state: &AclTokenState) -> Result<AclToken, ProviderError> {
    Ok(AclToken {
        accessor_id: state.accessor_id.clone(),
        name: state.name.clone(),
        token_type: state.token_type.clone(),
        policies: state.policies.clone(),
        roles: state
            .role
            .iter()
            .map(|role| AclTokenRoleLink {
                id: role.id.clone(),
                name: String::new(),
            })
            .collect(),
        global: state.global,
        expiration_ttl: parse_opt_duration("expiration_ttl", &state.expiration_ttl)?
            .unwrap_or_default(),
        ..Default::default()
    })
}

pub(crate) fn flatten(token: AclToken, prior: &AclTokenState) -> AclTokenState {
    let mut policies = token.policies;
    policies.sort();
    AclTokenState {
        id: token.accessor_id.clone(),
        accessor_id: token.accessor_id,
        secret_id: token.secret_id,
        name: token.name,
        token_type: token.token_type,
        policies,
        role: token
            .roles
            .into_iter()
            .map(|role| TokenRoleState {
                id: role.id,
                name: role.name,
            })
            .collect(),
        global: token.global,
        create_time: token.create_time.unwrap_or_default(),
        expiration_ttl: flatten_duration(
            Some(token.expiration_ttl).filter(|ttl| *ttl > 0),
            &prior.expiration_ttl,
        ),
        expiration_time: token.expiration_time.unwrap_or_default(),
    }
}

#[async_trait]
impl Resource for AclTokenResource {
    type State = AclTokenState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Manages an ACL token.")
            .with_id()
            .with_attribute(
                "accessor_id",
                Attribute::computed_string().with_description("Public identifier of the token."),
            )
            .with_attribute(
                "secret_id",
                Attribute::computed_string()
                    .sensitive()
                    .with_description("Secret used to authenticate with the token."),
            )
            .with_attribute(
                "name",
                Attribute::optional_string().with_description("Human-readable name of the token."),
            )
            .with_attribute(
                "type",
                Attribute::required_string()
                    .one_of(TOKEN_TYPES)
                    .with_description("Either client or management."),
            )
            .with_attribute(
                "policies",
                Attribute::string_set(AttributeFlags::optional())
                    .with_description("Policies applied to a client token."),
            )
            .with_block(
                "role",
                NestedBlock::set(
                    Block::new()
                        .with_attribute("id", Attribute::required_string())
                        .with_attribute("name", Attribute::computed_string()),
                ),
            )
            .with_attribute(
                "global",
                Attribute::optional_bool()
                    .with_default(false)
                    .with_force_new()
                    .with_description("Whether the token is replicated to all regions."),
            )
            .with_attribute("create_time", Attribute::computed_string())
            .with_attribute(
                "expiration_ttl",
                Attribute::optional_string()
                    .with_validator(ValueValidator::Duration)
                    .with_force_new()
                    .with_description("Time to live of the token, e.g. \"1h\"."),
            )
            .with_attribute("expiration_time", Attribute::computed_string())
    }

    fn validate(&self, config: &AclTokenState) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        if config.token_type == "management" && !config.policies.is_empty() {
            diagnostics.push(
                Diagnostic::error("Management tokens cannot have policies")
                    .with_attribute("policies"),
            );
        }
        diagnostics
    }

    async fn create(
        &self,
        ctx: &ProviderContext,
        planned: AclTokenState,
    ) -> Result<AclTokenState, ProviderError> {
        let token = expand(&planned)?;
        let created = ctx
            .client
            .acl_tokens()
            .create(&token)
            .await
            .context("error creating ACL token")?;
        info!(accessor_id = %created.accessor_id, "Created ACL token");
        Ok(flatten(created, &planned))
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        state: AclTokenState,
    ) -> Result<Option<AclTokenState>, ProviderError> {
        let token = ctx
            .client
            .acl_tokens()
            .info(&state.id)
            .await
            .with_context(|| format!("error reading ACL token {:?}", state.id))
            .optional()?;
        Ok(token.map(|token| flatten(token, &state)))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        prior: AclTokenState,
        planned: AclTokenState,
    ) -> Result<AclTokenState, ProviderError> {
        let mut token = expand(&planned)?;
        token.accessor_id = prior.id.clone();
        let updated = ctx
            .client
            .acl_tokens()
            .update(&token)
            .await
            .with_context(|| format!("error updating ACL token {:?}", prior.id))?;
        info!(accessor_id = %updated.accessor_id, "Updated ACL token");
        Ok(flatten(updated, &planned))
    }

    async fn delete(&self, ctx: &ProviderContext, state: AclTokenState) -> Result<(), ProviderError> {
        ctx.client
            .acl_tokens()
            .delete(&state.id)
            .await
            .with_context(|| format!("error deleting ACL token {:?}", state.id))?;
        info!(accessor_id = %state.id, "Deleted ACL token");
        Ok(())
    }

    async fn exists(&self, ctx: &ProviderContext, state: &AclTokenState) -> Result<bool, ProviderError> {
        let token = ctx
            .client
            .acl_tokens()
            .info(&state.id)
            .await
            .with_context(|| format!("error checking ACL token {:?}", state.id))
            .optional()?;
        Ok(token.is_some())
    }

    fn import_state(&self, id: &str) -> Result<AclTokenState, ProviderError> {
        Ok(AclTokenState {
            id: id.to_string(),
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
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn token_json() -> serde_json::Value {
        json!({
            "AccessorID": "a1b2",
            "SecretID": "s3cr3t",
            "Name": "ci",
            "Type": "client",
            "Policies": ["prod", "dev"],
            "Roles": [{"ID": "r1", "Name": "ops"}],
            "Global": false,
            "CreateTime": "2024-01-01T00:00:00Z",
            "ExpirationTTL": 3600000000000_i64,
            "ExpirationTime": "2024-01-01T01:00:00Z",
            "CreateIndex": 7,
            "ModifyIndex": 7
        })
    }

    #[test]
    fn test_flatten_sorts_policies_and_formats_ttl() {
        let token: AclToken = serde_json::from_value(token_json()).unwrap();
        let state = flatten(token, &AclTokenState::default());
        assert_eq!(state.id, "a1b2");
        assert_eq!(state.policies, vec!["dev", "prod"]);
        assert_eq!(state.expiration_ttl, "1h0m0s");
        assert_eq!(state.role[0].name, "ops");
    }

    #[rstest]
    #[case("1h")]
    #[case("90m")]
    #[case("1h30m")]
    #[case("24h0m0s")]
    #[case("")]
    fn test_expand_flatten_keeps_ttl_spelling(#[case] ttl: &str) {
        let state = AclTokenState {
            id: "a1b2".into(),
            accessor_id: "a1b2".into(),
            name: "ci".into(),
            token_type: "client".into(),
            policies: vec!["dev".into(), "prod".into()],
            role: vec![TokenRoleState {
                id: "r1".into(),
                name: String::new(),
            }],
            expiration_ttl: ttl.into(),
            ..Default::default()
        };
        let wire = serde_json::to_value(expand(&state).unwrap()).unwrap();
        let token: AclToken = serde_json::from_value(wire).unwrap();
        assert_eq!(flatten(token, &state), state);
    }

    #[test]
    fn test_read_keeps_ttl_spelling() {
        let prior = AclTokenState {
            expiration_ttl: "30m".into(),
            ..Default::default()
        };
        let token: AclToken = serde_json::from_value(token_json()).unwrap();
        assert_eq!(flatten(token.clone(), &prior).expiration_ttl, "1h0m0s");

        let prior = AclTokenState {
            expiration_ttl: "1h".into(),
            ..Default::default()
        };
        assert_eq!(flatten(token, &prior).expiration_ttl, "1h");
    }

    #[test]
    fn test_expand_rejects_bad_ttl() {
        let state = AclTokenState {
            token_type: "client".into(),
            expiration_ttl: "forever".into(),
            ..Default::default()
        };
        assert!(matches!(expand(&state), Err(ProviderError::Validation(_))));
    }

    #[test]
    fn test_management_token_with_policies_rejected() {
        let state = AclTokenState {
            token_type: "management".into(),
            policies: vec!["dev".into()],
            ..Default::default()
        };
        assert_eq!(AclTokenResource.validate(&state).len(), 1);
    }

    #[tokio::test]
    async fn test_create_returns_secret() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/acl/token"))
            .and(body_partial_json(json!({"Type": "client", "ExpirationTTL": "1h0m0s"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(token_json()))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let state = AclTokenResource
            .create(
                &ctx,
                AclTokenState {
                    name: "ci".into(),
                    token_type: "client".into(),
                    policies: vec!["dev".into(), "prod".into()],
                    expiration_ttl: "1h".into(),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(state.secret_id, "s3cr3t");
        assert_eq!(state.accessor_id, "a1b2");
    }
}
