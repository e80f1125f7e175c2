//! ACL endpoints: policies, tokens, roles, auth methods and binding rules.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::serde_helpers::{go_duration, null_default};
use super::{ApiError, Method, NomadClient, QueryOptions};

/// Scopes an ACL policy to a job's workload identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JobAcl {
    pub namespace: String,
    #[serde(rename = "JobID")]
    pub job_id: String,
    pub group: String,
    pub task: String,
}

/// An ACL policy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AclPolicy {
    pub name: String,
    pub description: String,
    pub rules: String,
    #[serde(rename = "JobACL", skip_serializing_if = "Option::is_none")]
    pub job_acl: Option<JobAcl>,
    pub create_index: u64,
    pub modify_index: u64,
}

/// An ACL policy as returned by the list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AclPolicyListStub {
    pub name: String,
    pub description: String,
    pub create_index: u64,
    pub modify_index: u64,
}

/// A role reference carried by a token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AclTokenRoleLink {
    #[serde(rename = "ID", skip_serializing_if = "String::is_empty")]
    pub id: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub name: String,
}

/// An ACL token.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AclToken {
    #[serde(rename = "AccessorID", skip_serializing_if = "String::is_empty")]
    pub accessor_id: String,
    #[serde(rename = "SecretID", skip_serializing_if = "String::is_empty")]
    pub secret_id: String,
    pub name: String,
    #[serde(rename = "Type")]
    pub token_type: String,
    #[serde(deserialize_with = "null_default")]
    pub policies: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub roles: Vec<AclTokenRoleLink>,
    pub global: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_time: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiration_time: Option<String>,
    #[serde(rename = "ExpirationTTL", with = "go_duration")]
    pub expiration_ttl: i64,
    pub create_index: u64,
    pub modify_index: u64,
}

/// An ACL token as returned by the list endpoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AclTokenListStub {
    #[serde(rename = "AccessorID")]
    pub accessor_id: String,
    pub name: String,
    #[serde(rename = "Type")]
    pub token_type: String,
    #[serde(deserialize_with = "null_default")]
    pub policies: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub roles: Vec<AclTokenRoleLink>,
    pub global: bool,
    pub create_time: Option<String>,
    pub expiration_time: Option<String>,
    pub create_index: u64,
    pub modify_index: u64,
}

/// A policy reference carried by a role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AclRolePolicyLink {
    pub name: String,
}

/// An ACL role.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AclRole {
    #[serde(rename = "ID", skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(deserialize_with = "null_default")]
    pub policies: Vec<AclRolePolicyLink>,
    pub create_index: u64,
    pub modify_index: u64,
}

/// SSO provider configuration of an auth method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AclAuthMethodConfig {
    #[serde(rename = "JWTValidationPubKeys", deserialize_with = "null_default")]
    pub jwt_validation_pub_keys: Vec<String>,
    #[serde(rename = "JWKSURL")]
    pub jwks_url: String,
    #[serde(rename = "JWKSCACert")]
    pub jwks_ca_cert: String,
    #[serde(rename = "OIDCDiscoveryURL")]
    pub oidc_discovery_url: String,
    #[serde(rename = "OIDCClientID")]
    pub oidc_client_id: String,
    #[serde(rename = "OIDCClientSecret")]
    pub oidc_client_secret: String,
    #[serde(rename = "OIDCClientAssertion", skip_serializing_if = "Option::is_none")]
    pub oidc_client_assertion: Option<serde_json::Value>,
    #[serde(rename = "OIDCEnablePKCE")]
    pub oidc_enable_pkce: bool,
    #[serde(rename = "OIDCDisableUserInfo")]
    pub oidc_disable_user_info: bool,
    #[serde(rename = "OIDCScopes", deserialize_with = "null_default")]
    pub oidc_scopes: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub bound_audiences: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub bound_issuer: Vec<String>,
    #[serde(rename = "AllowedRedirectURIs", deserialize_with = "null_default")]
    pub allowed_redirect_uris: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub discovery_ca_pem: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub signing_algs: Vec<String>,
    #[serde(with = "go_duration")]
    pub expiration_leeway: i64,
    #[serde(with = "go_duration")]
    pub not_before_leeway: i64,
    #[serde(with = "go_duration")]
    pub clock_skew_leeway: i64,
    #[serde(deserialize_with = "null_default")]
    pub claim_mappings: HashMap<String, String>,
    #[serde(deserialize_with = "null_default")]
    pub list_claim_mappings: HashMap<String, String>,
    #[serde(rename = "VerboseOIDCLogging")]
    pub verbose_oidc_logging: bool,
}

/// An ACL auth method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AclAuthMethod {
    pub name: String,
    #[serde(rename = "Type")]
    pub method_type: String,
    pub token_locality: String,
    pub token_name_format: String,
    #[serde(rename = "MaxTokenTTL", with = "go_duration")]
    pub max_token_ttl: i64,
    pub default: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub config: Option<AclAuthMethodConfig>,
    pub create_index: u64,
    pub modify_index: u64,
}

/// An ACL binding rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct AclBindingRule {
    #[serde(rename = "ID", skip_serializing_if = "String::is_empty")]
    pub id: String,
    pub description: String,
    pub auth_method: String,
    pub selector: String,
    pub bind_type: String,
    pub bind_name: String,
    pub create_index: u64,
    pub modify_index: u64,
}

/// `/v1/acl/policy` endpoints.
pub struct AclPolicies<'a> {
    client: &'a NomadClient,
}

/// `/v1/acl/token` endpoints.
pub struct AclTokens<'a> {
    client: &'a NomadClient,
}

/// `/v1/acl/role` endpoints.
pub struct AclRoles<'a> {
    client: &'a NomadClient,
}

/// `/v1/acl/auth-method` endpoints.
pub struct AclAuthMethods<'a> {
    client: &'a NomadClient,
}

/// `/v1/acl/binding-rule` endpoints.
pub struct AclBindingRules<'a> {
    client: &'a NomadClient,
}

impl NomadClient {
    /// ACL policy endpoints.
    pub fn acl_policies(&self) -> AclPolicies<'_> {
        AclPolicies { client: self }
    }

    /// ACL token endpoints.
    pub fn acl_tokens(&self) -> AclTokens<'_> {
        AclTokens { client: self }
    }

    /// ACL role endpoints.
    pub fn acl_roles(&self) -> AclRoles<'_> {
        AclRoles { client: self }
    }

    /// ACL auth method endpoints.
    pub fn acl_auth_methods(&self) -> AclAuthMethods<'_> {
        AclAuthMethods { client: self }
    }

    /// ACL binding rule endpoints.
    pub fn acl_binding_rules(&self) -> AclBindingRules<'_> {
        AclBindingRules { client: self }
    }
}

impl AclPolicies<'_> {
    pub async fn list(&self, opts: &QueryOptions) -> Result<Vec<AclPolicyListStub>, ApiError> {
        self.client
            .get::<Option<Vec<_>>>("/v1/acl/policies", opts)
            .await
            .map(Option::unwrap_or_default)
    }

    pub async fn info(&self, name: &str) -> Result<AclPolicy, ApiError> {
        self.client
            .get(&format!("/v1/acl/policy/{}", name), &QueryOptions::new())
            .await
    }

    pub async fn upsert(&self, policy: &AclPolicy) -> Result<(), ApiError> {
        self.client
            .write(
                Method::POST,
                &format!("/v1/acl/policy/{}", policy.name),
                Some(policy),
                &QueryOptions::new(),
            )
            .await
    }

    pub async fn delete(&self, name: &str) -> Result<(), ApiError> {
        self.client
            .write::<()>(Method::DELETE, &format!("/v1/acl/policy/{}", name), None, &QueryOptions::new())
            .await
    }
}

impl AclTokens<'_> {
    pub async fn list(&self, opts: &QueryOptions) -> Result<Vec<AclTokenListStub>, ApiError> {
        self.client
            .get::<Option<Vec<_>>>("/v1/acl/tokens", opts)
            .await
            .map(Option::unwrap_or_default)
    }

    pub async fn info(&self, accessor_id: &str) -> Result<AclToken, ApiError> {
        self.client
            .get(&format!("/v1/acl/token/{}", accessor_id), &QueryOptions::new())
            .await
    }

    /// The token the client authenticates with.
    pub async fn current(&self) -> Result<AclToken, ApiError> {
        self.client.get("/v1/acl/token/self", &QueryOptions::new()).await
    }

    pub async fn create(&self, token: &AclToken) -> Result<AclToken, ApiError> {
        self.client.post("/v1/acl/token", token, &QueryOptions::new()).await
    }

    pub async fn update(&self, token: &AclToken) -> Result<AclToken, ApiError> {
        self.client
            .post(
                &format!("/v1/acl/token/{}", token.accessor_id),
                token,
                &QueryOptions::new(),
            )
            .await
    }

    pub async fn delete(&self, accessor_id: &str) -> Result<(), ApiError> {
        self.client
            .write::<()>(Method::DELETE, &format!("/v1/acl/token/{}", accessor_id), None, &QueryOptions::new())
            .await
    }
}

impl AclRoles<'_> {
    pub async fn list(&self, opts: &QueryOptions) -> Result<Vec<AclRole>, ApiError> {
        self.client
            .get::<Option<Vec<_>>>("/v1/acl/roles", opts)
            .await
            .map(Option::unwrap_or_default)
    }

    pub async fn info(&self, id: &str) -> Result<AclRole, ApiError> {
        self.client
            .get(&format!("/v1/acl/role/{}", id), &QueryOptions::new())
            .await
    }

    pub async fn create(&self, role: &AclRole) -> Result<AclRole, ApiError> {
        self.client.post("/v1/acl/role", role, &QueryOptions::new()).await
    }

    pub async fn update(&self, role: &AclRole) -> Result<AclRole, ApiError> {
        self.client
            .post(&format!("/v1/acl/role/{}", role.id), role, &QueryOptions::new())
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .write::<()>(Method::DELETE, &format!("/v1/acl/role/{}", id), None, &QueryOptions::new())
            .await
    }
}

impl AclAuthMethods<'_> {
    pub async fn info(&self, name: &str) -> Result<AclAuthMethod, ApiError> {
        self.client
            .get(&format!("/v1/acl/auth-method/{}", name), &QueryOptions::new())
            .await
    }

    pub async fn create(&self, method: &AclAuthMethod) -> Result<AclAuthMethod, ApiError> {
        self.client
            .post("/v1/acl/auth-method", method, &QueryOptions::new())
            .await
    }

    pub async fn update(&self, method: &AclAuthMethod) -> Result<AclAuthMethod, ApiError> {
        self.client
            .post(
                &format!("/v1/acl/auth-method/{}", method.name),
                method,
                &QueryOptions::new(),
            )
            .await
    }

    pub async fn delete(&self, name: &str) -> Result<(), ApiError> {
        self.client
            .write::<()>(Method::DELETE, &format!("/v1/acl/auth-method/{}", name), None, &QueryOptions::new())
            .await
    }
}

impl AclBindingRules<'_> {
    pub async fn info(&self, id: &str) -> Result<AclBindingRule, ApiError> {
        self.client
            .get(&format!("/v1/acl/binding-rule/{}", id), &QueryOptions::new())
            .await
    }

    pub async fn create(&self, rule: &AclBindingRule) -> Result<AclBindingRule, ApiError> {
        self.client
            .post("/v1/acl/binding-rule", rule, &QueryOptions::new())
            .await
    }

    pub async fn update(&self, rule: &AclBindingRule) -> Result<AclBindingRule, ApiError> {
        self.client
            .post(
                &format!("/v1/acl/binding-rule/{}", rule.id),
                rule,
                &QueryOptions::new(),
            )
            .await
    }

    pub async fn delete(&self, id: &str) -> Result<(), ApiError> {
        self.client
            .write::<()>(Method::DELETE, &format!("/v1/acl/binding-rule/{}", id), None, &QueryOptions::new())
            .await
    }
}
