//! Read-only views over Nomad.
//!
//! Each module implements [`crate::resource::DataSource`]. Single-object
//! data sources reuse the flatteners of the matching resource; list data
//! sources expose computed lists of objects.

mod acl;
mod allocations;
mod datacenters;
mod deployments;
mod dynamic_host_volume;
mod job;
mod jwks;
mod namespaces;
mod node_pools;
mod plugins;
mod regions;
mod scaling;
mod scheduler_config;
mod variable;
mod volumes;

pub use acl::{
    AclPoliciesDataSource, AclPolicyDataSource, AclRoleDataSource, AclRolesDataSource,
    AclTokenDataSource, AclTokensDataSource,
};
pub use allocations::AllocationsDataSource;
pub use datacenters::{filter_datacenters, DatacentersDataSource};
pub use deployments::DeploymentsDataSource;
pub use dynamic_host_volume::DynamicHostVolumeDataSource;
pub use job::{JobDataSource, JobParserDataSource};
pub use jwks::{rsa_public_key_pem, JwksDataSource};
pub use namespaces::{NamespaceDataSource, NamespacesDataSource};
pub use node_pools::{NodePoolDataSource, NodePoolsDataSource};
pub use plugins::{PluginDataSource, PluginsDataSource};
pub use regions::RegionsDataSource;
pub use scaling::{ScalingPoliciesDataSource, ScalingPolicyDataSource};
pub use scheduler_config::SchedulerConfigDataSource;
pub use variable::VariableDataSource;
pub use volumes::VolumesDataSource;

use crate::schema::{Attribute, AttributeFlags, AttributeType};

/// A computed list of objects with the given attribute types.
fn computed_objects<const N: usize>(fields: [(&str, AttributeType); N]) -> Attribute {
    Attribute::new(
        AttributeType::list(AttributeType::object(fields)),
        AttributeFlags::computed(),
    )
}

/// `list(string)`
fn string_list_type() -> AttributeType {
    AttributeType::list(AttributeType::String)
}

/// `map(string)`
fn string_map_type() -> AttributeType {
    AttributeType::map(AttributeType::String)
}
