//! `nomad_job` and `nomad_job_parser`

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{computed_objects, string_map_type};
use crate::api::{Job, TaskGroup, DEFAULT_NAMESPACE};
use crate::error::{ApiResultExt, ProviderError};
use crate::resource::{DataSource, ProviderContext};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

/// Reads a registered job.
#[derive(Debug, Default, Clone, Copy)]
pub struct JobDataSource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobDataState {
    pub id: String,
    pub job_id: String,
    pub namespace: String,
    pub name: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub region: String,
    pub node_pool: String,
    pub datacenters: Vec<String>,
    pub priority: i64,
    pub all_at_once: bool,
    pub stop: bool,
    pub status: String,
    pub status_description: String,
    pub version: i64,
    pub create_index: i64,
    pub modify_index: i64,
    pub job_modify_index: i64,
    pub periodic: bool,
    pub parameterized: bool,
    pub meta: HashMap<String, String>,
    pub task_groups: Vec<TaskGroupSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskGroupSummary {
    pub name: String,
    pub count: i64,
    pub meta: HashMap<String, String>,
    pub task: Vec<TaskSummary>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskSummary {
    pub name: String,
    pub driver: String,
    pub meta: HashMap<String, String>,
}

fn summarize_group(group: TaskGroup) -> TaskGroupSummary {
    TaskGroupSummary {
        name: group.name,
        count: group.count.unwrap_or_default(),
        meta: group.meta,
        task: group
            .tasks
            .into_iter()
            .map(|task| TaskSummary {
                name: task.name,
                driver: task.driver,
                meta: task.meta,
            })
            .collect(),
    }
}

fn flatten(job: Job, config: JobDataState) -> JobDataState {
    let job_type = job.job_type().to_string();
    let to_i64 = |index: Option<u64>| index.unwrap_or_default() as i64;
    JobDataState {
        id: job.id.clone().unwrap_or_default(),
        job_id: job.id.unwrap_or(config.job_id),
        namespace: job.namespace.unwrap_or(config.namespace),
        name: job.name.unwrap_or_default(),
        job_type,
        region: job.region.unwrap_or_default(),
        node_pool: job.node_pool.unwrap_or_default(),
        datacenters: job.datacenters,
        priority: job.priority.unwrap_or_default(),
        all_at_once: job.all_at_once.unwrap_or_default(),
        stop: job.stop.unwrap_or_default(),
        status: job.status.unwrap_or_default(),
        status_description: job.status_description.unwrap_or_default(),
        version: to_i64(job.version),
        create_index: to_i64(job.create_index),
        modify_index: to_i64(job.modify_index),
        job_modify_index: to_i64(job.job_modify_index),
        periodic: job.periodic.is_some(),
        parameterized: job.parameterized_job.is_some(),
        meta: job.meta,
        task_groups: job.task_groups.into_iter().map(summarize_group).collect(),
    }
}

#[async_trait]
impl DataSource for JobDataSource {
    type State = JobDataState;

    fn schema(&self) -> Schema {
        let task = AttributeType::object([
            ("name", AttributeType::String),
            ("driver", AttributeType::String),
            ("meta", string_map_type()),
        ]);
        Schema::v0()
            .with_description("Reads a registered job.")
            .with_id()
            .with_attribute("job_id", Attribute::required_string())
            .with_attribute(
                "namespace",
                Attribute::optional_string().with_default(DEFAULT_NAMESPACE),
            )
            .with_attribute("name", Attribute::computed_string())
            .with_attribute("type", Attribute::computed_string())
            .with_attribute("region", Attribute::computed_string())
            .with_attribute("node_pool", Attribute::computed_string())
            .with_attribute("datacenters", Attribute::string_list(AttributeFlags::computed()))
            .with_attribute("priority", Attribute::computed_int64())
            .with_attribute("all_at_once", Attribute::computed_bool())
            .with_attribute("stop", Attribute::computed_bool())
            .with_attribute("status", Attribute::computed_string())
            .with_attribute("status_description", Attribute::computed_string())
            .with_attribute("version", Attribute::computed_int64())
            .with_attribute("create_index", Attribute::computed_int64())
            .with_attribute("modify_index", Attribute::computed_int64())
            .with_attribute("job_modify_index", Attribute::computed_int64())
            .with_attribute("periodic", Attribute::computed_bool())
            .with_attribute("parameterized", Attribute::computed_bool())
            .with_attribute("meta", Attribute::string_map(AttributeFlags::computed()))
            .with_attribute(
                "task_groups",
                computed_objects([
                    ("name", AttributeType::String),
                    ("count", AttributeType::Int64),
                    ("meta", string_map_type()),
                    ("task", AttributeType::list(task)),
                ]),
            )
    }

    async fn read(&self, ctx: &ProviderContext, config: JobDataState) -> Result<JobDataState, ProviderError> {
        let namespace = if config.namespace.is_empty() {
            DEFAULT_NAMESPACE
        } else {
            config.namespace.as_str()
        };
        let job = ctx
            .client
            .jobs()
            .info(&config.job_id, namespace)
            .await
            .with_context(|| format!("error reading job {:?}", config.job_id))?;
        debug!(job_id = %config.job_id, namespace, "Read job");
        Ok(flatten(job, config))
    }
}

/// Parses an HCL jobspec into its JSON form with Nomad's parser.
#[derive(Debug, Default, Clone, Copy)]
pub struct JobParserDataSource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobParserState {
    pub id: String,
    pub hcl: String,
    pub variables: String,
    pub canonicalize: bool,
    pub json: String,
}

#[async_trait]
impl DataSource for JobParserDataSource {
    type State = JobParserState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Parses an HCL jobspec into JSON.")
            .with_id()
            .with_attribute("hcl", Attribute::required_string())
            .with_attribute(
                "variables",
                Attribute::optional_string().with_description("HCL2 variable values, as a file body."),
            )
            .with_attribute(
                "canonicalize",
                Attribute::optional_bool()
                    .with_default(false)
                    .with_description("Fill in Nomad's defaults before returning the job."),
            )
            .with_attribute("json", Attribute::computed_string())
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        config: JobParserState,
    ) -> Result<JobParserState, ProviderError> {
        let job = ctx
            .client
            .jobs()
            .parse_hcl(&config.hcl, &config.variables, config.canonicalize)
            .await
            .context("error parsing job")?;
        Ok(JobParserState {
            id: job.id.clone().unwrap_or_default(),
            json: serde_json::to_string(&job)?,
            ..config
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::test_context;
    use serde_json::{json, Value};
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_reads_job_summary() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/job/web"))
            .and(query_param("namespace", "default"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ID": "web",
                "Name": "web",
                "Namespace": "default",
                "Type": "service",
                "Datacenters": ["dc1"],
                "Priority": 50,
                "Status": "running",
                "Version": 4,
                "TaskGroups": [{
                    "Name": "app",
                    "Count": 2,
                    "Tasks": [{"Name": "server", "Driver": "docker"}]
                }]
            })))
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let config = JobDataState {
            job_id: "web".into(),
            ..Default::default()
        };
        let state = JobDataSource.read(&ctx, config).await.unwrap();
        assert_eq!(state.id, "web");
        assert_eq!(state.job_type, "service");
        assert_eq!(state.version, 4);
        assert!(!state.periodic);
        assert_eq!(state.task_groups[0].count, 2);
        assert_eq!(state.task_groups[0].task[0].driver, "docker");
    }

    #[tokio::test]
    async fn test_parser_returns_json() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/jobs/parse"))
            .and(body_partial_json(json!({"Canonicalize": true})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ID": "example",
                "Name": "example",
                "Type": "service",
                "Datacenters": ["dc1"]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let config = JobParserState {
            hcl: "job \"example\" {}".into(),
            canonicalize: true,
            ..Default::default()
        };
        let state = JobParserDataSource.read(&ctx, config).await.unwrap();
        assert_eq!(state.id, "example");
        let parsed: Value = serde_json::from_str(&state.json).unwrap();
        assert_eq!(parsed["Datacenters"], json!(["dc1"]));
    }
}
