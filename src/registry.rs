//! The static table from type name to adapter.

use std::collections::BTreeMap;

use crate::data_sources;
use crate::error::ProviderError;
use crate::resource::{DataSourceHandler, ResourceHandler};
use crate::resources;
use crate::schema::ProviderSchema;

/// Resource and data source adapters by type name.
///
/// Built once when the provider is constructed and never mutated.
#[derive(Default)]
pub struct Registry {
    resources: BTreeMap<&'static str, Box<dyn ResourceHandler>>,
    data_sources: BTreeMap<&'static str, Box<dyn DataSourceHandler>>,
}

impl Registry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Every Nomad resource and data source.
    pub fn nomad() -> Self {
        Self::new()
            .with_resource("nomad_acl_auth_method", resources::AclAuthMethodResource)
            .with_resource("nomad_acl_binding_rule", resources::AclBindingRuleResource)
            .with_resource("nomad_acl_policy", resources::AclPolicyResource)
            .with_resource("nomad_acl_role", resources::AclRoleResource)
            .with_resource("nomad_acl_token", resources::AclTokenResource)
            .with_resource("nomad_csi_volume", resources::CsiVolumeResource)
            .with_resource(
                "nomad_csi_volume_registration",
                resources::CsiVolumeRegistrationResource,
            )
            .with_resource("nomad_dynamic_host_volume", resources::DynamicHostVolumeResource)
            .with_resource(
                "nomad_dynamic_host_volume_registration",
                resources::DynamicHostVolumeRegistrationResource,
            )
            .with_resource("nomad_job", resources::JobResource)
            .with_resource("nomad_namespace", resources::NamespaceResource)
            .with_resource("nomad_node_pool", resources::NodePoolResource)
            .with_resource("nomad_quota_specification", resources::QuotaSpecificationResource)
            .with_resource("nomad_scheduler_config", resources::SchedulerConfigResource)
            .with_resource("nomad_sentinel_policy", resources::SentinelPolicyResource)
            .with_resource("nomad_variable", resources::VariableResource)
            .with_data_source("nomad_acl_policy", data_sources::AclPolicyDataSource)
            .with_data_source("nomad_acl_policies", data_sources::AclPoliciesDataSource)
            .with_data_source("nomad_acl_role", data_sources::AclRoleDataSource)
            .with_data_source("nomad_acl_roles", data_sources::AclRolesDataSource)
            .with_data_source("nomad_acl_token", data_sources::AclTokenDataSource)
            .with_data_source("nomad_acl_tokens", data_sources::AclTokensDataSource)
            .with_data_source("nomad_allocations", data_sources::AllocationsDataSource)
            .with_data_source("nomad_datacenters", data_sources::DatacentersDataSource)
            .with_data_source("nomad_deployments", data_sources::DeploymentsDataSource)
            .with_data_source(
                "nomad_dynamic_host_volume",
                data_sources::DynamicHostVolumeDataSource,
            )
            .with_data_source("nomad_job", data_sources::JobDataSource)
            .with_data_source("nomad_job_parser", data_sources::JobParserDataSource)
            .with_data_source("nomad_jwks", data_sources::JwksDataSource)
            .with_data_source("nomad_namespace", data_sources::NamespaceDataSource)
            .with_data_source("nomad_namespaces", data_sources::NamespacesDataSource)
            .with_data_source("nomad_node_pool", data_sources::NodePoolDataSource)
            .with_data_source("nomad_node_pools", data_sources::NodePoolsDataSource)
            .with_data_source("nomad_plugin", data_sources::PluginDataSource)
            .with_data_source("nomad_plugins", data_sources::PluginsDataSource)
            .with_data_source("nomad_regions", data_sources::RegionsDataSource)
            .with_data_source(
                "nomad_scaling_policies",
                data_sources::ScalingPoliciesDataSource,
            )
            .with_data_source("nomad_scaling_policy", data_sources::ScalingPolicyDataSource)
            .with_data_source(
                "nomad_scheduler_config",
                data_sources::SchedulerConfigDataSource,
            )
            .with_data_source("nomad_variable", data_sources::VariableDataSource)
            .with_data_source("nomad_volumes", data_sources::VolumesDataSource)
    }

    /// Register a resource adapter.
    pub fn with_resource<R: ResourceHandler + 'static>(mut self, name: &'static str, resource: R) -> Self {
        self.resources.insert(name, Box::new(resource));
        self
    }

    /// Register a data source adapter.
    pub fn with_data_source<D: DataSourceHandler + 'static>(
        mut self,
        name: &'static str,
        data_source: D,
    ) -> Self {
        self.data_sources.insert(name, Box::new(data_source));
        self
    }

    /// Look up a resource adapter.
    pub fn resource(&self, name: &str) -> Result<&dyn ResourceHandler, ProviderError> {
        self.resources
            .get(name)
            .map(|handler| &**handler)
            .ok_or_else(|| ProviderError::UnknownResource(name.to_string()))
    }

    /// Look up a data source adapter.
    pub fn data_source(&self, name: &str) -> Result<&dyn DataSourceHandler, ProviderError> {
        self.data_sources
            .get(name)
            .map(|handler| &**handler)
            .ok_or_else(|| ProviderError::UnknownDataSource(name.to_string()))
    }

    /// Resource type names, sorted.
    pub fn resource_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.resources.keys().copied()
    }

    /// Data source type names, sorted.
    pub fn data_source_types(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.data_sources.keys().copied()
    }

    /// Resource and data source schemas.
    pub fn schema(&self) -> ProviderSchema {
        let schema = self
            .resources
            .iter()
            .fold(ProviderSchema::new(), |schema, (name, r)| {
                schema.with_resource(*name, r.schema())
            });
        self.data_sources
            .iter()
            .fold(schema, |schema, (name, d)| schema.with_data_source(*name, d.schema()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nomad_registry_contents() {
        let registry = Registry::nomad();
        assert_eq!(registry.resource_types().count(), 16);
        assert_eq!(registry.data_source_types().count(), 25);
        assert!(registry.resource("nomad_job").is_ok());
        assert!(registry.data_source("nomad_datacenters").is_ok());
    }

    #[test]
    fn test_unknown_types() {
        let registry = Registry::nomad();
        assert!(matches!(
            registry.resource("nomad_widget"),
            Err(ProviderError::UnknownResource(_))
        ));
        assert!(matches!(
            registry.data_source("nomad_widget"),
            Err(ProviderError::UnknownDataSource(_))
        ));
    }

    #[test]
    fn test_every_resource_has_an_id() {
        let schema = Registry::nomad().schema();
        for (name, resource) in &schema.resources {
            let id = resource.block.attributes.get("id");
            assert!(id.is_some_and(|a| a.flags.computed), "{} has no computed id", name);
        }
    }
}
