//! `nomad_acl_role`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::{AclRole, AclRolePolicyLink};
use crate::error::{ApiResultExt, OptionalExt, ProviderError};
use crate::resource::{ProviderContext, Resource};
use crate::schema::{Attribute, Block, NestedBlock, Schema};

/// Manages an ACL role.
#[derive(Debug, Default, Clone, Copy)]
pub struct AclRoleResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AclRoleState {
    pub id: String,
    pub name: String,
    pub description: String,
    pub policy: Vec<RolePolicyState>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(default)]
pub struct RolePolicyState {
    pub name: String,
}

pub(crate) fn expand(state: &AclRoleState) -> AclRole {
    AclRole {
        id: state.id.clone(),
        name: state.name.clone(),
        description: state.description.clone(),
        policies: state
            .policy
            .iter()
            .map(|p| AclRolePolicyLink {
                name: p.name.clone(),
            })
            .collect(),
        ..Default::default()
    }
}

pub(crate) fn flatten(role: AclRole) -> AclRoleState {
    let mut policy: Vec<_> = role
        .policies
        .into_iter()
        .map(|p| RolePolicyState { name: p.name })
        .collect();
    policy.sort();
    AclRoleState {
        id: role.id,
        name: role.name,
        description: role.description,
        policy,
    }
}

#[async_trait]
impl Resource for AclRoleResource {
    type State = AclRoleState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Manages an ACL role.")
            .with_id()
            .with_attribute(
                "name",
                Attribute::required_string().with_description("Unique name of the role."),
            )
            .with_attribute("description", Attribute::optional_string())
            .with_block(
                "policy",
                NestedBlock::set(
                    Block::new()
                        .with_description("An ACL policy linked to the role.")
                        .with_attribute("name", Attribute::required_string()),
                )
                .with_min_items(1),
            )
    }

    async fn create(
        &self,
        ctx: &ProviderContext,
        planned: AclRoleState,
    ) -> Result<AclRoleState, ProviderError> {
        let created = ctx
            .client
            .acl_roles()
            .create(&expand(&planned))
            .await
            .with_context(|| format!("error creating ACL role {:?}", planned.name))?;
        info!(id = %created.id, name = %created.name, "Created ACL role");
        Ok(flatten(created))
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        state: AclRoleState,
    ) -> Result<Option<AclRoleState>, ProviderError> {
        let role = ctx
            .client
            .acl_roles()
            .info(&state.id)
            .await
            .with_context(|| format!("error reading ACL role {:?}", state.id))
            .optional()?;
        Ok(role.map(flatten))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        prior: AclRoleState,
        planned: AclRoleState,
    ) -> Result<AclRoleState, ProviderError> {
        let role = AclRole {
            id: prior.id.clone(),
            ..expand(&planned)
        };
        let updated = ctx
            .client
            .acl_roles()
            .update(&role)
            .await
            .with_context(|| format!("error updating ACL role {:?}", prior.id))?;
        info!(id = %updated.id, "Updated ACL role");
        Ok(flatten(updated))
    }

    async fn delete(&self, ctx: &ProviderContext, state: AclRoleState) -> Result<(), ProviderError> {
        ctx.client
            .acl_roles()
            .delete(&state.id)
            .await
            .with_context(|| format!("error deleting ACL role {:?}", state.id))?;
        info!(id = %state.id, "Deleted ACL role");
        Ok(())
    }

    fn import_state(&self, id: &str) -> Result<AclRoleState, ProviderError> {
        Ok(AclRoleState {
            id: id.to_string(),
            ..Default::default()
        })
    }
}
