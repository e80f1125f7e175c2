//! `nomad_allocations`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::computed_objects;
use crate::api::{AllocationListStub, QueryOptions};
use crate::error::{ApiResultExt, ProviderError};
use crate::resource::{DataSource, ProviderContext};
use crate::schema::{Attribute, AttributeType, Schema};

/// Lists allocations, optionally narrowed by prefix, filter and namespace.
#[derive(Debug, Default, Clone, Copy)]
pub struct AllocationsDataSource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationsState {
    pub id: String,
    pub prefix: String,
    pub filter: String,
    pub namespace: String,
    pub allocations: Vec<AllocationState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AllocationState {
    pub id: String,
    pub eval_id: String,
    pub name: String,
    pub namespace: String,
    pub node_id: String,
    pub node_name: String,
    pub job_id: String,
    pub job_type: String,
    pub job_version: i64,
    pub task_group: String,
    pub desired_status: String,
    pub client_status: String,
    pub followup_eval_id: String,
    pub next_allocation: String,
    pub preempted_by_allocation: String,
    pub create_index: i64,
    pub modify_index: i64,
    pub create_time: i64,
    pub modify_time: i64,
}

impl From<AllocationListStub> for AllocationState {
    fn from(stub: AllocationListStub) -> Self {
        Self {
            id: stub.id,
            eval_id: stub.eval_id,
            name: stub.name,
            namespace: stub.namespace,
            node_id: stub.node_id,
            node_name: stub.node_name,
            job_id: stub.job_id,
            job_type: stub.job_type,
            job_version: stub.job_version as i64,
            task_group: stub.task_group,
            desired_status: stub.desired_status,
            client_status: stub.client_status,
            followup_eval_id: stub.followup_eval_id,
            next_allocation: stub.next_allocation,
            preempted_by_allocation: stub.preempted_by_allocation,
            create_index: stub.create_index as i64,
            modify_index: stub.modify_index as i64,
            create_time: stub.create_time,
            modify_time: stub.modify_time,
        }
    }
}

#[async_trait]
impl DataSource for AllocationsDataSource {
    type State = AllocationsState;

    fn schema(&self) -> Schema {
        let s = || AttributeType::String;
        let n = || AttributeType::Int64;
        Schema::v0()
            .with_description("Lists allocations.")
            .with_id()
            .with_attribute("prefix", Attribute::optional_string())
            .with_attribute(
                "filter",
                Attribute::optional_string().with_description("A Nomad filter expression."),
            )
            .with_attribute(
                "namespace",
                Attribute::optional_string().with_description("Namespace to list; `*` lists all."),
            )
            .with_attribute(
                "allocations",
                computed_objects([
                    ("id", s()),
                    ("eval_id", s()),
                    ("name", s()),
                    ("namespace", s()),
                    ("node_id", s()),
                    ("node_name", s()),
                    ("job_id", s()),
                    ("job_type", s()),
                    ("job_version", n()),
                    ("task_group", s()),
                    ("desired_status", s()),
                    ("client_status", s()),
                    ("followup_eval_id", s()),
                    ("next_allocation", s()),
                    ("preempted_by_allocation", s()),
                    ("create_index", n()),
                    ("modify_index", n()),
                    ("create_time", n()),
                    ("modify_time", n()),
                ]),
            )
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        config: AllocationsState,
    ) -> Result<AllocationsState, ProviderError> {
        let opts = QueryOptions::namespace(&config.namespace)
            .with_prefix(&config.prefix)
            .with_filter(&config.filter);
        let allocations = ctx
            .client
            .allocations()
            .list(&opts)
            .await
            .context("error listing allocations")?;
        Ok(AllocationsState {
            id: ctx.client.address().to_string(),
            allocations: allocations.into_iter().map(AllocationState::from).collect(),
            ..config
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::test_context;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_passes_filter_and_namespace() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/allocations"))
            .and(query_param("namespace", "*"))
            .and(query_param("filter", "ClientStatus == \"running\""))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
                "ID": "a1",
                "JobID": "web",
                "JobVersion": 3,
                "ClientStatus": "running",
                "CreateIndex": 10
            }])))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let config = AllocationsState {
            namespace: "*".into(),
            filter: "ClientStatus == \"running\"".into(),
            ..Default::default()
        };
        let state = AllocationsDataSource.read(&ctx, config).await.unwrap();
        assert_eq!(state.allocations.len(), 1);
        assert_eq!(state.allocations[0].job_version, 3);
        assert_eq!(state.allocations[0].create_index, 10);
    }

    #[tokio::test]
    async fn test_null_list_is_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/allocations"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(null)))
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let state = AllocationsDataSource
            .read(&ctx, AllocationsState::default())
            .await
            .unwrap();
        assert!(state.allocations.is_empty());
    }
}
