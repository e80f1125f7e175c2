//! `nomad_deployments`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::computed_objects;
use crate::api::QueryOptions;
use crate::error::{ApiResultExt, ProviderError};
use crate::resource::{DataSource, ProviderContext};
use crate::schema::{AttributeType, Schema};

/// Lists deployments in the provider's default namespace.
#[derive(Debug, Default, Clone, Copy)]
pub struct DeploymentsDataSource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentsState {
    pub id: String,
    pub deployments: Vec<DeploymentState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeploymentState {
    pub id: String,
    pub job_id: String,
    pub job_version: i64,
    pub status: String,
    pub status_description: String,
}

#[async_trait]
impl DataSource for DeploymentsDataSource {
    type State = DeploymentsState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Lists deployments.")
            .with_id()
            .with_attribute(
                "deployments",
                computed_objects([
                    ("id", AttributeType::String),
                    ("job_id", AttributeType::String),
                    ("job_version", AttributeType::Int64),
                    ("status", AttributeType::String),
                    ("status_description", AttributeType::String),
                ]),
            )
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        _config: DeploymentsState,
    ) -> Result<DeploymentsState, ProviderError> {
        let deployments = ctx
            .client
            .deployments()
            .list(&QueryOptions::new())
            .await
            .context("error listing deployments")?;
        Ok(DeploymentsState {
            id: ctx.client.address().to_string(),
            deployments: deployments
                .into_iter()
                .map(|d| DeploymentState {
                    id: d.id,
                    job_id: d.job_id,
                    job_version: d.job_version as i64,
                    status: d.status,
                    status_description: d.status_description,
                })
                .collect(),
        })
    }
}
