//! `nomad_quota_specification`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::{QuotaLimit, QuotaResources, QuotaSpec};
use crate::error::{ApiResultExt, OptionalExt, ProviderError};
use crate::resource::{ProviderContext, Resource};
use crate::schema::{Attribute, Block, NestedBlock, Schema};

/// Manages a quota specification.
#[derive(Debug, Default, Clone, Copy)]
pub struct QuotaSpecificationResource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaSpecificationState {
    pub id: String,
    pub name: String,
    pub description: String,
    pub limits: Vec<QuotaLimitState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct QuotaLimitState {
    pub region: String,
    pub region_limit: Option<RegionLimitState>,
    pub variables_limit: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionLimitState {
    pub cpu: Option<i64>,
    pub cores: Option<i64>,
    pub memory_mb: Option<i64>,
    pub memory_max_mb: Option<i64>,
}

pub(crate) fn expand(state: &QuotaSpecificationState) -> QuotaSpec {
    QuotaSpec {
        name: state.name.clone(),
        description: state.description.clone(),
        limits: state
            .limits
            .iter()
            .map(|limit| QuotaLimit {
                region: limit.region.clone(),
                region_limit: limit.region_limit.as_ref().map(|r| QuotaResources {
                    cpu: r.cpu,
                    cores: r.cores,
                    memory_mb: r.memory_mb,
                    memory_max_mb: r.memory_max_mb,
                }),
                variables_limit: limit.variables_limit,
            })
            .collect(),
        ..Default::default()
    }
}

pub(crate) fn flatten(spec: QuotaSpec) -> QuotaSpecificationState {
    let mut limits: Vec<_> = spec
        .limits
        .into_iter()
        .map(|limit| QuotaLimitState {
            region: limit.region,
            region_limit: limit.region_limit.map(|r| RegionLimitState {
                cpu: r.cpu,
                cores: r.cores,
                memory_mb: r.memory_mb,
                memory_max_mb: r.memory_max_mb,
            }),
            variables_limit: limit.variables_limit,
        })
        .collect();
    limits.sort_by(|a, b| a.region.cmp(&b.region));
    QuotaSpecificationState {
        id: spec.name.clone(),
        name: spec.name,
        description: spec.description,
        limits,
    }
}

impl QuotaSpecificationResource {
    async fn register(
        &self,
        ctx: &ProviderContext,
        state: QuotaSpecificationState,
    ) -> Result<QuotaSpecificationState, ProviderError> {
        let spec = expand(&state);
        ctx.client
            .quotas()
            .register(&spec)
            .await
            .with_context(|| format!("error registering quota specification {:?}", spec.name))?;
        info!(name = %spec.name, "Registered quota specification");

        let state = QuotaSpecificationState {
            id: spec.name.clone(),
            ..state
        };
        self.read(ctx, state).await?.ok_or_else(|| {
            ProviderError::NotFound(format!("quota specification {:?}", spec.name))
        })
    }
}

#[async_trait]
impl Resource for QuotaSpecificationResource {
    type State = QuotaSpecificationState;

    fn schema(&self) -> Schema {
        let region_limit = Block::new()
            .with_attribute("cpu", Attribute::optional_int64())
            .with_attribute("cores", Attribute::optional_int64())
            .with_attribute("memory_mb", Attribute::optional_int64())
            .with_attribute("memory_max_mb", Attribute::optional_int64());

        Schema::v0()
            .with_description("Manages a quota specification (Nomad Enterprise).")
            .with_id()
            .with_attribute(
                "name",
                Attribute::required_string()
                    .with_force_new()
                    .with_description("Unique name for this quota specification."),
            )
            .with_attribute("description", Attribute::optional_string())
            .with_block(
                "limits",
                NestedBlock::set(
                    Block::new()
                        .with_attribute(
                            "region",
                            Attribute::required_string()
                                .with_description("Region the limit applies to."),
                        )
                        .with_attribute("variables_limit", Attribute::optional_int64())
                        .with_block("region_limit", NestedBlock::single(region_limit).required()),
                )
                .with_min_items(1),
            )
    }

    async fn create(
        &self,
        ctx: &ProviderContext,
        planned: QuotaSpecificationState,
    ) -> Result<QuotaSpecificationState, ProviderError> {
        self.register(ctx, planned).await
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        state: QuotaSpecificationState,
    ) -> Result<Option<QuotaSpecificationState>, ProviderError> {
        let spec = ctx
            .client
            .quotas()
            .info(&state.id)
            .await
            .with_context(|| format!("error reading quota specification {:?}", state.id))
            .optional()?;
        Ok(spec.map(flatten))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        _prior: QuotaSpecificationState,
        planned: QuotaSpecificationState,
    ) -> Result<QuotaSpecificationState, ProviderError> {
        self.register(ctx, planned).await
    }

    async fn delete(
        &self,
        ctx: &ProviderContext,
        state: QuotaSpecificationState,
    ) -> Result<(), ProviderError> {
        ctx.client
            .quotas()
            .delete(&state.id)
            .await
            .with_context(|| format!("error deleting quota specification {:?}", state.id))?;
        info!(name = %state.id, "Deleted quota specification");
        Ok(())
    }

    fn import_state(&self, id: &str) -> Result<QuotaSpecificationState, ProviderError> {
        Ok(QuotaSpecificationState {
            id: id.to_string(),
            name: id.to_string(),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_expand_flatten() {
        let state = QuotaSpecificationState {
            id: "small".into(),
            name: "small".into(),
            description: "limit everything".into(),
            limits: vec![
                QuotaLimitState {
                    region: "eu".into(),
                    region_limit: Some(RegionLimitState {
                        cpu: Some(2500),
                        memory_mb: Some(1000),
                        ..Default::default()
                    }),
                    variables_limit: None,
                },
                QuotaLimitState {
                    region: "global".into(),
                    region_limit: Some(RegionLimitState {
                        cores: Some(4),
                        memory_max_mb: Some(2000),
                        ..Default::default()
                    }),
                    variables_limit: Some(100),
                },
            ],
        };
        assert_eq!(flatten(expand(&state)), state);
    }

    #[test]
    fn test_unset_limits_are_omitted() {
        let spec = expand(&QuotaSpecificationState {
            name: "small".into(),
            limits: vec![QuotaLimitState {
                region: "global".into(),
                region_limit: Some(RegionLimitState {
                    cpu: Some(100),
                    ..Default::default()
                }),
                variables_limit: None,
            }],
            ..Default::default()
        });
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["Limits"][0]["RegionLimit"], serde_json::json!({"CPU": 100}));
        assert!(json["Limits"][0].get("VariablesLimit").is_none());
    }
}
