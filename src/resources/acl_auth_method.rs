//! `nomad_acl_auth_method`

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::{AclAuthMethod, AclAuthMethodConfig};
use crate::error::{ApiResultExt, OptionalExt, ProviderError};
use crate::helper::{flatten_duration, parse_opt_duration};
use crate::resource::{ProviderContext, Resource};
use crate::schema::{Attribute, AttributeFlags, Block, NestedBlock, Schema, ValueValidator};

/// Manages an SSO auth method.
#[derive(Debug, Default, Clone, Copy)]
pub struct AclAuthMethodResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AclAuthMethodState {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub method_type: String,
    pub token_locality: String,
    pub max_token_ttl: String,
    pub token_name_format: String,
    pub default: bool,
    pub config: Option<AuthMethodConfigState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthMethodConfigState {
    pub jwt_validation_pub_keys: Vec<String>,
    pub jwks_url: String,
    pub jwks_ca_cert: String,
    pub oidc_discovery_url: String,
    pub oidc_client_id: String,
    pub oidc_client_secret: String,
    pub oidc_scopes: Vec<String>,
    pub oidc_disable_userinfo: bool,
    pub oidc_enable_pkce: bool,
    pub bound_audiences: Vec<String>,
    pub bound_issuer: Vec<String>,
    pub allowed_redirect_uris: Vec<String>,
    pub discovery_ca_pem: Vec<String>,
    pub signing_algs: Vec<String>,
    pub expiration_leeway: String,
    pub not_before_leeway: String,
    pub clock_skew_leeway: String,
    pub claim_mappings: HashMap<String, String>,
    pub list_claim_mappings: HashMap<String, String>,
    pub verbose_logging: bool,
}

fn expand_config(config: &AuthMethodConfigState) -> Result<AclAuthMethodConfig, ProviderError> {
    Ok(AclAuthMethodConfig {
        jwt_validation_pub_keys: config.jwt_validation_pub_keys.clone(),
        jwks_url: config.jwks_url.clone(),
        jwks_ca_cert: config.jwks_ca_cert.clone(),
        oidc_discovery_url: config.oidc_discovery_url.clone(),
        oidc_client_id: config.oidc_client_id.clone(),
        oidc_client_secret: config.oidc_client_secret.clone(),
        oidc_client_assertion: None,
        oidc_enable_pkce: config.oidc_enable_pkce,
        oidc_disable_user_info: config.oidc_disable_userinfo,
        oidc_scopes: config.oidc_scopes.clone(),
        bound_audiences: config.bound_audiences.clone(),
        bound_issuer: config.bound_issuer.clone(),
        allowed_redirect_uris: config.allowed_redirect_uris.clone(),
        discovery_ca_pem: config.discovery_ca_pem.clone(),
        signing_algs: config.signing_algs.clone(),
        expiration_leeway: parse_opt_duration("expiration_leeway", &config.expiration_leeway)?
            .unwrap_or_default(),
        not_before_leeway: parse_opt_duration("not_before_leeway", &config.not_before_leeway)?
            .unwrap_or_default(),
        clock_skew_leeway: parse_opt_duration("clock_skew_leeway", &config.clock_skew_leeway)?
            .unwrap_or_default(),
        claim_mappings: config.claim_mappings.clone(),
        list_claim_mappings: config.list_claim_mappings.clone(),
        verbose_oidc_logging: config.verbose_logging,
    })
}

pub(crate) fn expand(state: &AclAuthMethodState) -> Result<AclAuthMethod, ProviderError> {
    Ok(AclAuthMethod {
        name: state.name.clone(),
        method_type: state.method_type.clone(),
        token_locality: state.token_locality.clone(),
        token_name_format: state.token_name_format.clone(),
        max_token_ttl: parse_opt_duration("max_token_ttl", &state.max_token_ttl)?
            .unwrap_or_default(),
        default: state.default,
        config: state.config.as_ref().map(expand_config).transpose()?,
        ..Default::default()
    })
}

fn leeway(nanos: i64, prior: &str) -> String {
    flatten_duration(Some(nanos).filter(|n| *n != 0), prior)
}

/// The client secret is redacted on read, so the one in `prior` is kept.
/// Durations keep the spelling `prior` used.
pub(crate) fn flatten(method: AclAuthMethod, prior: &AclAuthMethodState) -> AclAuthMethodState {
    let prior_config = prior.config.clone().unwrap_or_default();
    AclAuthMethodState {
        id: method.name.clone(),
        name: method.name,
        method_type: method.method_type,
        token_locality: method.token_locality,
        max_token_ttl: flatten_duration(Some(method.max_token_ttl), &prior.max_token_ttl),
        token_name_format: method.token_name_format,
        default: method.default,
        config: method.config.map(|c| AuthMethodConfigState {
            jwt_validation_pub_keys: c.jwt_validation_pub_keys,
            jwks_url: c.jwks_url,
            jwks_ca_cert: c.jwks_ca_cert,
            oidc_discovery_url: c.oidc_discovery_url,
            oidc_client_id: c.oidc_client_id,
            oidc_client_secret: prior_config.oidc_client_secret.clone(),
            oidc_scopes: c.oidc_scopes,
            oidc_disable_userinfo: c.oidc_disable_user_info,
            oidc_enable_pkce: c.oidc_enable_pkce,
            bound_audiences: c.bound_audiences,
            bound_issuer: c.bound_issuer,
            allowed_redirect_uris: c.allowed_redirect_uris,
            discovery_ca_pem: c.discovery_ca_pem,
            signing_algs: c.signing_algs,
            expiration_leeway: leeway(c.expiration_leeway, &prior_config.expiration_leeway),
            not_before_leeway: leeway(c.not_before_leeway, &prior_config.not_before_leeway),
            clock_skew_leeway: leeway(c.clock_skew_leeway, &prior_config.clock_skew_leeway),
            claim_mappings: c.claim_mappings,
            list_claim_mappings: c.list_claim_mappings,
            verbose_logging: c.verbose_oidc_logging,
        }),
    }
}

fn config_block() -> Block {
    let list = || Attribute::string_list(AttributeFlags::optional());
    let duration = || Attribute::optional_string().with_validator(ValueValidator::Duration);
    Block::new()
        .with_description("Configuration specific to the auth method provider.")
        .with_attribute("jwt_validation_pub_keys", list())
        .with_attribute("jwks_url", Attribute::optional_string())
        .with_attribute("jwks_ca_cert", Attribute::optional_string())
        .with_attribute("oidc_discovery_url", Attribute::optional_string())
        .with_attribute("oidc_client_id", Attribute::optional_string())
        .with_attribute("oidc_client_secret", Attribute::optional_string().sensitive())
        .with_attribute("oidc_scopes", list())
        .with_attribute("oidc_disable_userinfo", Attribute::optional_bool())
        .with_attribute("oidc_enable_pkce", Attribute::optional_bool())
        .with_attribute("bound_audiences", list())
        .with_attribute("bound_issuer", list())
        .with_attribute("allowed_redirect_uris", list())
        .with_attribute("discovery_ca_pem", list())
        .with_attribute("signing_algs", list())
        .with_attribute("expiration_leeway", duration())
        .with_attribute("not_before_leeway", duration())
        .with_attribute("clock_skew_leeway", duration())
        .with_attribute("claim_mappings", Attribute::string_map(AttributeFlags::optional()))
        .with_attribute(
            "list_claim_mappings",
            Attribute::string_map(AttributeFlags::optional()),
        )
        .with_attribute("verbose_logging", Attribute::optional_bool())
}

#[async_trait]
impl Resource for AclAuthMethodResource {
    type State = AclAuthMethodState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Manages an ACL auth method.")
            .with_id()
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Unique name of the auth method."),
            )
            .with_attribute("type", Attribute::required_string().one_of(["OIDC", "JWT"]))
            .with_attribute(
                "token_locality",
                Attribute::required_string().one_of(["local", "global"]),
            )
            .with_attribute(
                "max_token_ttl",
                Attribute::required_string().with_validator(ValueValidator::Duration),
            )
            .with_attribute("token_name_format", Attribute::optional_computed_string())
            .with_attribute("default", Attribute::optional_bool().with_default(false))
            .with_block("config", NestedBlock::single(config_block()).required())
    }

    async fn create(
        &self,
        ctx: &ProviderContext,
        planned: AclAuthMethodState,
    ) -> Result<AclAuthMethodState, ProviderError> {
        let created = ctx
            .client
            .acl_auth_methods()
            .create(&expand(&planned)?)
            .await
            .with_context(|| format!("error creating ACL auth method {:?}", planned.name))?;
        info!(name = %created.name, "Created ACL auth method");
        Ok(flatten(created, &planned))
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        state: AclAuthMethodState,
    ) -> Result<Option<AclAuthMethodState>, ProviderError> {
        let method = ctx
            .client
            .acl_auth_methods()
            .info(&state.id)
            .await
            .with_context(|| format!("error reading ACL auth method {:?}", state.id))
            .optional()?;
        Ok(method.map(|m| flatten(m, &state)))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        _prior: AclAuthMethodState,
        planned: AclAuthMethodState,
    ) -> Result<AclAuthMethodState, ProviderError> {
        let updated = ctx
            .client
            .acl_auth_methods()
            .update(&expand(&planned)?)
            .await
            .with_context(|| format!("error updating ACL auth method {:?}", planned.name))?;
        info!(name = %updated.name, "Updated ACL auth method");
        Ok(flatten(updated, &planned))
    }

    async fn delete(
        &self,
        ctx: &ProviderContext,
        state: AclAuthMethodState,
    ) -> Result<(), ProviderError> {
        ctx.client
            .acl_auth_methods()
            .delete(&state.id)
            .await
            .with_context(|| format!("error deleting ACL auth method {:?}", state.id))?;
        info!(name = %state.id, "Deleted ACL auth method");
        Ok(())
    }

    fn import_state(&self, id: &str) -> Result<AclAuthMethodState, ProviderError> {
        Ok(AclAuthMethodState {
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
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn state() -> AclAuthMethodState {
        AclAuthMethodState {
            id: "okta".into(),
            name: "okta".into(),
            method_type: "OIDC".into(),
            token_locality: "global".into(),
            max_token_ttl: "10m0s".into(),
            token_name_format: "${auth_method_type}-${auth_method_name}".into(),
            default: true,
            config: Some(AuthMethodConfigState {
                oidc_discovery_url: "https://okta.example".into(),
                oidc_client_id: "client".into(),
                oidc_client_secret: "hunter2".into(),
                bound_audiences: vec!["aud".into()],
                allowed_redirect_uris: vec!["http://localhost:4649/oidc/callback".into()],
                expiration_leeway: "1m0s".into(),
                claim_mappings: HashMap::from([("http://nomad.internal/name".into(), "name".into())]),
                ..Default::default()
            }),
        }
    }

    #[test]
    fn test_expand_flatten() {
        let state = state();
        let method = expand(&state).unwrap();
        assert_eq!(method.max_token_ttl, 600_000_000_000);
        assert_eq!(flatten(method, &state), state);
    }

    #[test]
    fn test_flatten_keeps_configured_duration_spelling() {
        let mut configured = state();
        configured.max_token_ttl = "10m".into();
        if let Some(config) = configured.config.as_mut() {
            config.expiration_leeway = "60s".into();
            config.clock_skew_leeway = "1m30s".into();
        }

        let method: AclAuthMethod =
            serde_json::from_value(serde_json::to_value(expand(&configured).unwrap()).unwrap())
                .unwrap();
        assert_eq!(flatten(method.clone(), &configured), configured);

        let imported = flatten(method, &AclAuthMethodState::default());
        assert_eq!(imported.max_token_ttl, "10m0s");
        assert_eq!(imported.config.unwrap().clock_skew_leeway, "1m30s");
    }

    #[tokio::test]
    async fn test_create_sends_go_durations() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/acl/auth-method"))
            .and(body_partial_json(json!({"Name": "okta", "MaxTokenTTL": "10m0s"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "Name": "okta",
                "Type": "OIDC",
                "TokenLocality": "global",
                "MaxTokenTTL": "10m0s",
                "Default": true,
                "Config": {"OIDCDiscoveryURL": "https://okta.example", "OIDCClientSecret": "redacted"}
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let created = AclAuthMethodResource.create(&ctx, state()).await.unwrap();
        assert_eq!(created.id, "okta");
        assert_eq!(created.config.unwrap().oidc_client_secret, "hunter2");
    }
}
