//! `nomad_scaling_policies` and `nomad_scaling_policy`

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::{computed_objects, string_map_type};
use crate::api::QueryOptions;
use crate::error::{ApiResultExt, ProviderError};
use crate::resource::{DataSource, ProviderContext};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

/// Lists scaling policies, optionally for one job or of one type.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScalingPoliciesDataSource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingPoliciesState {
    pub id: String,
    pub job_id: String,
    #[serde(rename = "type")]
    pub policy_type: String,
    pub policies: Vec<ScalingPolicySummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingPolicySummary {
    pub id: String,
    pub enabled: bool,
    #[serde(rename = "type")]
    pub policy_type: String,
    pub target: HashMap<String, String>,
}

#[async_trait]
impl DataSource for ScalingPoliciesDataSource {
    type State = ScalingPoliciesState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Lists scaling policies.")
            .with_id()
            .with_attribute("job_id", Attribute::optional_string())
            .with_attribute("type", Attribute::optional_string())
            .with_attribute(
                "policies",
                computed_objects([
                    ("id", AttributeType::String),
                    ("enabled", AttributeType::Bool),
                    ("type", AttributeType::String),
                    ("target", string_map_type()),
                ]),
            )
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        config: ScalingPoliciesState,
    ) -> Result<ScalingPoliciesState, ProviderError> {
        let mut opts = QueryOptions::new();
        if !config.job_id.is_empty() {
            opts = opts.with_param("job", &config.job_id);
        }
        if !config.policy_type.is_empty() {
            opts = opts.with_param("type", &config.policy_type);
        }
        let policies = ctx
            .client
            .scaling_policies()
            .list(&opts)
            .await
            .context("error listing scaling policies")?;
        Ok(ScalingPoliciesState {
            id: ctx.client.address().to_string(),
            policies: policies
                .into_iter()
                .map(|p| ScalingPolicySummary {
                    id: p.id,
                    enabled: p.enabled,
                    policy_type: p.policy_type,
                    target: p.target,
                })
                .collect(),
            ..config
        })
    }
}

/// Reads one scaling policy.
#[derive(Debug, Default, Clone, Copy)]
pub struct ScalingPolicyDataSource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScalingPolicyState {
    pub id: String,
    pub enabled: bool,
    #[serde(rename = "type")]
    pub policy_type: String,
    pub min: i64,
    pub max: i64,
    /// The policy document as JSON.
    pub policy: String,
    pub target: HashMap<String, String>,
}

#[async_trait]
impl DataSource for ScalingPolicyDataSource {
    type State = ScalingPolicyState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Reads a scaling policy.")
            .with_attribute("id", Attribute::required_string())
            .with_attribute("enabled", Attribute::computed_bool())
            .with_attribute("type", Attribute::computed_string())
            .with_attribute("min", Attribute::computed_int64())
            .with_attribute("max", Attribute::computed_int64())
            .with_attribute(
                "policy",
                Attribute::computed_string().with_description("The autoscaler policy as JSON."),
            )
            .with_attribute("target", Attribute::string_map(AttributeFlags::computed()))
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        config: ScalingPolicyState,
    ) -> Result<ScalingPolicyState, ProviderError> {
        let policy = ctx
            .client
            .scaling_policies()
            .info(&config.id)
            .await
            .with_context(|| format!("error reading scaling policy {:?}", config.id))?;
        Ok(ScalingPolicyState {
            id: policy.id,
            enabled: policy.enabled.unwrap_or_default(),
            policy_type: policy.policy_type,
            min: policy.min.unwrap_or_default(),
            max: policy.max.unwrap_or_default(),
            policy: serde_json::to_string(&policy.policy)?,
            target: policy.target,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::test_context;
    use serde_json::{json, Value};
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_filters_by_job() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/scaling/policies"))
            .and(query_param("job", "web"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "ID": "p1",
                "Enabled": true,
                "Type": "horizontal",
                "Target": {"Job": "web", "Group": "app", "Namespace": "default"}
            }])))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let config = ScalingPoliciesState {
            job_id: "web".into(),
            ..Default::default()
        };
        let state = ScalingPoliciesDataSource.read(&ctx, config).await.unwrap();
        assert_eq!(state.policies[0].target["Group"], "app");
    }

    #[tokio::test]
    async fn test_policy_document_is_json() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/scaling/policy/p1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ID": "p1",
                "Type": "horizontal",
                "Enabled": true,
                "Min": 1,
                "Max": 5,
                "Policy": {"cooldown": "1m"},
                "Target": {"Job": "web"}
            })))
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let config = ScalingPolicyState {
            id: "p1".into(),
            ..Default::default()
        };
        let state = ScalingPolicyDataSource.read(&ctx, config).await.unwrap();
        assert_eq!((state.min, state.max), (1, 5));
        let policy: Value = serde_json::from_str(&state.policy).unwrap();
        assert_eq!(policy["cooldown"], "1m");
    }
}
