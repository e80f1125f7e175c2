//! Managed Nomad objects.
//!
//! Each module implements [`crate::resource::Resource`] for one resource
//! type over a typed state struct, with `expand`/`flatten` converting
//! between that state and the API structs in [`crate::api`].

mod acl_auth_method;
mod acl_binding_rule;
pub(crate) mod acl_policy;
pub(crate) mod acl_role;
pub(crate) mod acl_token;
mod csi_volume;
mod csi_volume_registration;
pub(crate) mod dynamic_host_volume;
mod dynamic_host_volume_registration;
pub mod job;
pub(crate) mod namespace;
pub(crate) mod node_pool;
mod quota_specification;
pub(crate) mod scheduler_config;
mod sentinel_policy;
pub(crate) mod variable;
pub(crate) mod volume;

pub use acl_auth_method::AclAuthMethodResource;
pub use acl_binding_rule::AclBindingRuleResource;
pub use acl_policy::AclPolicyResource;
pub use acl_role::AclRoleResource;
pub use acl_token::AclTokenResource;
pub use csi_volume::CsiVolumeResource;
pub use csi_volume_registration::CsiVolumeRegistrationResource;
pub use dynamic_host_volume::DynamicHostVolumeResource;
pub use dynamic_host_volume_registration::DynamicHostVolumeRegistrationResource;
pub use job::JobResource;
pub use namespace::NamespaceResource;
pub use node_pool::NodePoolResource;
pub use quota_specification::QuotaSpecificationResource;
pub use scheduler_config::SchedulerConfigResource;
pub use sentinel_policy::SentinelPolicyResource;
pub use variable::VariableResource;
