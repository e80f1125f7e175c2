//! `nomad_acl_binding_rule`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::AclBindingRule;
use crate::error::{ApiResultExt, OptionalExt, ProviderError};
use crate::resource::{ProviderContext, Resource};
use crate::schema::{Attribute, Diagnostic, Schema};

const BIND_TYPE_MANAGEMENT: &str = "management";

/// Manages an ACL binding rule.
#[derive(Debug, Default, Clone, Copy)]
pub struct AclBindingRuleResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AclBindingRuleState {
    pub id: String,
    pub description: String,
    pub auth_method: String,
    pub selector: String,
    pub bind_type: String,
    pub bind_name: String,
}

/// A `management` rule must not name anything; `role` and `policy` rules must.
pub fn check_bind_name(bind_type: &str, bind_name: &str) -> Option<Diagnostic> {
    match (bind_type == BIND_TYPE_MANAGEMENT, bind_name.is_empty()) {
        (true, false) => Some(
            Diagnostic::error("bind_name must not be defined if bind_type is 'management'")
                .with_attribute("bind_name"),
        ),
        (false, true) => Some(
            Diagnostic::error(format!("bind_name must be defined if bind_type is '{}'", bind_type))
                .with_attribute("bind_name"),
        ),
        _ => None,
    }
}

fn expand(state: &AclBindingRuleState) -> AclBindingRule {
    AclBindingRule {
        id: state.id.clone(),
        description: state.description.clone(),
        auth_method: state.auth_method.clone(),
        selector: state.selector.clone(),
        bind_type: state.bind_type.clone(),
        bind_name: state.bind_name.clone(),
        ..Default::default()
    }
}

fn flatten(rule: AclBindingRule) -> AclBindingRuleState {
    AclBindingRuleState {
        id: rule.id,
        description: rule.description,
        auth_method: rule.auth_method,
        selector: rule.selector,
        bind_type: rule.bind_type,
        bind_name: rule.bind_name,
    }
}

#[async_trait]
impl Resource for AclBindingRuleResource {
    type State = AclBindingRuleState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Manages an ACL binding rule.")
            .with_id()
            .with_attribute("description", Attribute::optional_string())
            .with_attribute(
                "auth_method",
                Attribute::required_string()
                    .with_description("Name of the auth method the rule applies to."),
            )
            .with_attribute(
                "selector",
                Attribute::optional_string()
                    .with_description("Expression matched against the identity's claims."),
            )
            .with_attribute(
                "bind_type",
                Attribute::required_string().one_of(["role", "policy", BIND_TYPE_MANAGEMENT]),
            )
            .with_attribute(
                "bind_name",
                Attribute::optional_string()
                    .with_description("Target of the binding; empty for management."),
            )
    }

    fn validate(&self, config: &AclBindingRuleState) -> Vec<Diagnostic> {
        check_bind_name(&config.bind_type, &config.bind_name)
            .into_iter()
            .collect()
    }

    async fn create(
        &self,
        ctx: &ProviderContext,
        planned: AclBindingRuleState,
    ) -> Result<AclBindingRuleState, ProviderError> {
        let created = ctx
            .client
            .acl_binding_rules()
            .create(&expand(&planned))
            .await
            .context("error creating ACL binding rule")?;
        info!(id = %created.id, auth_method = %created.auth_method, "Created ACL binding rule");
        Ok(flatten(created))
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        state: AclBindingRuleState,
    ) -> Result<Option<AclBindingRuleState>, ProviderError> {
        let rule = ctx
            .client
            .acl_binding_rules()
            .info(&state.id)
            .await
            .with_context(|| format!("error reading ACL binding rule {:?}", state.id))
            .optional()?;
        Ok(rule.map(flatten))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        prior: AclBindingRuleState,
        planned: AclBindingRuleState,
    ) -> Result<AclBindingRuleState, ProviderError> {
        let rule = AclBindingRule {
            id: prior.id.clone(),
            ..expand(&planned)
        };
        let updated = ctx
            .client
            .acl_binding_rules()
            .update(&rule)
            .await
            .with_context(|| format!("error updating ACL binding rule {:?}", prior.id))?;
        info!(id = %updated.id, "Updated ACL binding rule");
        Ok(flatten(updated))
    }

    async fn delete(
        &self,
        ctx: &ProviderContext,
        state: AclBindingRuleState,
    ) -> Result<(), ProviderError> {
        ctx.client
            .acl_binding_rules()
            .delete(&state.id)
            .await
            .with_context(|| format!("error deleting ACL binding rule {:?}", state.id))?;
        info!(id = %state.id, "Deleted ACL binding rule");
        Ok(())
    }

    fn import_state(&self, id: &str) -> Result<AclBindingRuleState, ProviderError> {
        Ok(AclBindingRuleState {
            id: id.to_string(),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("management", "", true)]
    #[case("management", "ops", false)]
    #[case("role", "ops", true)]
    #[case("role", "", false)]
    #[case("policy", "read", true)]
    #[case("policy", "", false)]
    fn test_bind_name_rules(#[case] bind_type: &str, #[case] bind_name: &str, #[case] ok: bool) {
        let state = AclBindingRuleState {
            auth_method: "okta".into(),
            bind_type: bind_type.into(),
            bind_name: bind_name.into(),
            ..Default::default()
        };
        assert_eq!(AclBindingRuleResource.validate(&state).is_empty(), ok);
    }

    #[test]
    fn test_management_error_names_attribute() {
        let diagnostic = check_bind_name("management", "ops").unwrap();
        assert!(diagnostic.is_error());
        assert_eq!(diagnostic.attribute.as_deref(), Some("bind_name"));
    }
}
