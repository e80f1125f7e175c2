//! Job endpoints and the job specification structs.
//!
//! Optional scalar fields are `Option` so that an unset value is omitted
//! from the request and Nomad's canonicalisation fills in its default.
//! Durations are integer nanoseconds, as Nomad encodes `time.Duration`.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::serde_helpers::null_default;
use super::{ApiError, Method, NomadClient, QueryMeta, QueryOptions};

pub const JOB_TYPE_SERVICE: &str = "service";
pub const JOB_TYPE_BATCH: &str = "batch";
pub const JOB_TYPE_SYSTEM: &str = "system";
pub const JOB_TYPE_SYSBATCH: &str = "sysbatch";

/// A placement constraint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Constraint {
    #[serde(rename = "LTarget")]
    pub l_target: String,
    #[serde(rename = "RTarget")]
    pub r_target: String,
    #[serde(rename = "Operand")]
    pub operand: String,
}

/// A placement preference.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Affinity {
    #[serde(rename = "LTarget")]
    pub l_target: String,
    #[serde(rename = "RTarget")]
    pub r_target: String,
    #[serde(rename = "Operand")]
    pub operand: String,
    #[serde(rename = "Weight", skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
}

/// A target share of allocations for one attribute value.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SpreadTarget {
    pub value: String,
    pub percent: u64,
}

/// Spread allocations over the values of an attribute.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Spread {
    pub attribute: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weight: Option<i64>,
    #[serde(rename = "SpreadTarget", deserialize_with = "null_default")]
    pub spread_targets: Vec<SpreadTarget>,
}

/// How tasks are restarted in place.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct RestartPolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_templates: Option<bool>,
}

/// How failed allocations are rescheduled elsewhere.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ReschedulePolicy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub attempts: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub interval: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delay_function: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_delay: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub unlimited: Option<bool>,
}

/// Rolling update strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct UpdateStrategy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stagger: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_parallel: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_healthy_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthy_deadline: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress_deadline: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub canary: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_revert: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_promote: Option<bool>,
}

/// Node drain migration strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct MigrateStrategy {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_parallel: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub health_check: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_healthy_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub healthy_deadline: Option<i64>,
}

/// Scratch disk shared by a group's tasks.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct EphemeralDisk {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sticky: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migrate: Option<bool>,
    #[serde(rename = "SizeMB", skip_serializing_if = "Option::is_none")]
    pub size_mb: Option<i64>,
}

/// Task log rotation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct LogConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_files: Option<i64>,
    #[serde(rename = "MaxFileSizeMB", skip_serializing_if = "Option::is_none")]
    pub max_file_size_mb: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disabled: Option<bool>,
}

/// Task resource requirements.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Resources {
    #[serde(rename = "CPU", skip_serializing_if = "Option::is_none")]
    pub cpu: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cores: Option<i64>,
    #[serde(rename = "MemoryMB", skip_serializing_if = "Option::is_none")]
    pub memory_mb: Option<i64>,
    #[serde(rename = "MemoryMaxMB", skip_serializing_if = "Option::is_none")]
    pub memory_max_mb: Option<i64>,
}

/// A static or dynamic port.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Port {
    pub label: String,
    pub value: i64,
    pub to: i64,
    pub host_network: String,
}

/// A group network.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct NetworkResource {
    pub mode: String,
    #[serde(deserialize_with = "null_default")]
    pub reserved_ports: Vec<Port>,
    #[serde(deserialize_with = "null_default")]
    pub dynamic_ports: Vec<Port>,
}

/// A health check of a service.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ServiceCheck {
    pub name: String,
    #[serde(rename = "Type")]
    pub check_type: String,
    pub path: String,
    pub protocol: String,
    pub port_label: String,
    pub interval: i64,
    pub timeout: i64,
}

/// A service registration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Service {
    pub name: String,
    pub port_label: String,
    pub provider: String,
    #[serde(deserialize_with = "null_default")]
    pub tags: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub checks: Vec<ServiceCheck>,
}

/// A volume requested by a group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct VolumeRequest {
    pub name: String,
    #[serde(rename = "Type")]
    pub volume_type: String,
    pub source: String,
    pub read_only: bool,
    pub access_mode: String,
    pub attachment_mode: String,
    pub per_alloc: bool,
}

/// Where a task mounts a group volume.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct VolumeMount {
    pub volume: String,
    pub destination: String,
    pub read_only: bool,
}

/// A file fetched into the task directory before start.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TaskArtifact {
    pub getter_source: String,
    #[serde(deserialize_with = "null_default")]
    pub getter_options: HashMap<String, String>,
    pub getter_mode: String,
    pub relative_dest: String,
}

/// A rendered template.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Template {
    pub source_path: String,
    pub dest_path: String,
    pub embedded_tmpl: String,
    pub change_mode: String,
    pub change_signal: String,
    pub envvar: bool,
    pub perms: String,
    pub left_delim: String,
    pub right_delim: String,
    pub splay: i64,
}

/// When a task runs relative to the main tasks of its group.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TaskLifecycle {
    pub hook: String,
    pub sidecar: bool,
}

/// A task.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Task {
    pub name: String,
    pub driver: String,
    pub user: String,
    pub leader: bool,
    #[serde(deserialize_with = "null_default")]
    pub config: serde_json::Map<String, serde_json::Value>,
    #[serde(deserialize_with = "null_default")]
    pub env: HashMap<String, String>,
    #[serde(deserialize_with = "null_default")]
    pub meta: HashMap<String, String>,
    #[serde(deserialize_with = "null_default")]
    pub constraints: Vec<Constraint>,
    #[serde(deserialize_with = "null_default")]
    pub affinities: Vec<Affinity>,
    #[serde(deserialize_with = "null_default")]
    pub services: Vec<Service>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resources: Option<Resources>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<RestartPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kill_timeout: Option<i64>,
    pub kill_signal: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_config: Option<LogConfig>,
    #[serde(deserialize_with = "null_default")]
    pub artifacts: Vec<TaskArtifact>,
    #[serde(deserialize_with = "null_default")]
    pub templates: Vec<Template>,
    #[serde(deserialize_with = "null_default")]
    pub volume_mounts: Vec<VolumeMount>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lifecycle: Option<TaskLifecycle>,
}

/// A task group.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct TaskGroup {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub count: Option<i64>,
    #[serde(deserialize_with = "null_default")]
    pub meta: HashMap<String, String>,
    #[serde(deserialize_with = "null_default")]
    pub constraints: Vec<Constraint>,
    #[serde(deserialize_with = "null_default")]
    pub affinities: Vec<Affinity>,
    #[serde(deserialize_with = "null_default")]
    pub spreads: Vec<Spread>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart_policy: Option<RestartPolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reschedule_policy: Option<ReschedulePolicy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<UpdateStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub migrate: Option<MigrateStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ephemeral_disk: Option<EphemeralDisk>,
    #[serde(deserialize_with = "null_default")]
    pub networks: Vec<NetworkResource>,
    #[serde(deserialize_with = "null_default")]
    pub services: Vec<Service>,
    #[serde(deserialize_with = "null_default")]
    pub volumes: HashMap<String, VolumeRequest>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shutdown_delay: Option<i64>,
    #[serde(deserialize_with = "null_default")]
    pub tasks: Vec<Task>,
}

/// Cron-style scheduling of a batch job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct PeriodicConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    pub spec: String,
    pub spec_type: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prohibit_overlap: Option<bool>,
    pub time_zone: String,
}

/// Dispatch settings of a parameterized job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct ParameterizedJobConfig {
    pub payload: String,
    #[serde(deserialize_with = "null_default")]
    pub meta_required: Vec<String>,
    #[serde(deserialize_with = "null_default")]
    pub meta_optional: Vec<String>,
}

/// A job specification.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Job {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub region: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    #[serde(rename = "ID", skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "Type", skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub priority: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub all_at_once: Option<bool>,
    #[serde(deserialize_with = "null_default")]
    pub datacenters: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_pool: Option<String>,
    #[serde(deserialize_with = "null_default")]
    pub constraints: Vec<Constraint>,
    #[serde(deserialize_with = "null_default")]
    pub affinities: Vec<Affinity>,
    #[serde(deserialize_with = "null_default")]
    pub spreads: Vec<Spread>,
    #[serde(deserialize_with = "null_default")]
    pub task_groups: Vec<TaskGroup>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub update: Option<UpdateStrategy>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub periodic: Option<PeriodicConfig>,
    #[serde(rename = "ParameterizedJob", skip_serializing_if = "Option::is_none")]
    pub parameterized_job: Option<ParameterizedJobConfig>,
    #[serde(deserialize_with = "null_default")]
    pub meta: HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status_description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub version: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub create_index: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub modify_index: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_modify_index: Option<u64>,
}

impl Job {
    /// The job type, defaulting to `service` as Nomad does.
    pub fn job_type(&self) -> &str {
        self.job_type.as_deref().unwrap_or(JOB_TYPE_SERVICE)
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct JobRegisterRequest<'a> {
    job: &'a Job,
    enforce_index: bool,
    job_modify_index: u64,
    policy_override: bool,
}

/// Result of registering or deregistering a job.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct JobRegisterResponse {
    #[serde(rename = "EvalID")]
    pub eval_id: String,
    pub eval_create_index: u64,
    pub job_modify_index: u64,
    pub warnings: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "PascalCase")]
struct JobsParseRequest<'a> {
    #[serde(rename = "JobHCL")]
    job_hcl: &'a str,
    canonicalize: bool,
    #[serde(skip_serializing_if = "str::is_empty")]
    variables: &'a str,
}

/// An evaluation, as far as deployment tracking needs it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct Evaluation {
    #[serde(rename = "ID")]
    pub id: String,
    pub status: String,
    pub status_description: String,
    #[serde(rename = "DeploymentID")]
    pub deployment_id: String,
    pub modify_index: u64,
}

impl Evaluation {
    /// Whether the scheduler has finished with this evaluation.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status.as_str(), "complete" | "failed" | "canceled")
    }
}

/// `/v1/job` endpoints.
pub struct Jobs<'a> {
    client: &'a NomadClient,
}

impl NomadClient {
    /// Job endpoints.
    pub fn jobs(&self) -> Jobs<'_> {
        Jobs { client: self }
    }
}

impl Jobs<'_> {
    pub async fn register(
        &self,
        job: &Job,
        policy_override: bool,
    ) -> Result<JobRegisterResponse, ApiError> {
        let request = JobRegisterRequest {
            job,
            enforce_index: false,
            job_modify_index: 0,
            policy_override,
        };
        let opts = QueryOptions::namespace(job.namespace.as_deref().unwrap_or_default());
        self.client.post("/v1/jobs", &request, &opts).await
    }

    pub async fn info(&self, id: &str, namespace: &str) -> Result<Job, ApiError> {
        self.client
            .get(&format!("/v1/job/{}", id), &QueryOptions::namespace(namespace))
            .await
    }

    pub async fn deregister(
        &self,
        id: &str,
        namespace: &str,
        purge: bool,
    ) -> Result<JobRegisterResponse, ApiError> {
        let opts = QueryOptions::namespace(namespace).with_param("purge", purge.to_string());
        self.client.delete(&format!("/v1/job/{}", id), &opts).await
    }

    /// Parse an HCL jobspec into a job, optionally canonicalized.
    pub async fn parse_hcl(
        &self,
        hcl: &str,
        variables: &str,
        canonicalize: bool,
    ) -> Result<Job, ApiError> {
        let request = JobsParseRequest {
            job_hcl: hcl,
            canonicalize,
            variables,
        };
        self.client
            .post("/v1/jobs/parse", &request, &QueryOptions::new())
            .await
    }

    /// The most recent deployment of a job, if any.
    pub async fn latest_deployment(
        &self,
        id: &str,
        namespace: &str,
    ) -> Result<Option<super::Deployment>, ApiError> {
        self.client
            .get(
                &format!("/v1/job/{}/deployment", id),
                &QueryOptions::namespace(namespace),
            )
            .await
    }

    pub async fn allocations(
        &self,
        id: &str,
        namespace: &str,
    ) -> Result<Vec<super::AllocationListStub>, ApiError> {
        self.client
            .get::<Option<Vec<_>>>(
                &format!("/v1/job/{}/allocations", id),
                &QueryOptions::namespace(namespace),
            )
            .await
            .map(Option::unwrap_or_default)
    }

    pub async fn evaluation(
        &self,
        id: &str,
        opts: &QueryOptions,
    ) -> Result<(Evaluation, QueryMeta), ApiError> {
        self.client.query(&format!("/v1/evaluation/{}", id), opts).await
    }

    /// Stop a job without deregistering it.
    pub async fn stop(&self, job: &Job) -> Result<(), ApiError> {
        let mut stopped = job.clone();
        stopped.stop = Some(true);
        let request = JobRegisterRequest {
            job: &stopped,
            enforce_index: false,
            job_modify_index: 0,
            policy_override: false,
        };
        self.client
            .write(
                Method::POST,
                "/v1/jobs",
                Some(&request),
                &QueryOptions::namespace(job.namespace.as_deref().unwrap_or_default()),
            )
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_fields_are_omitted() {
        let job = Job {
            id: Some("web".into()),
            name: Some("web".into()),
            task_groups: vec![TaskGroup {
                name: "web".into(),
                ..Default::default()
            }],
            ..Default::default()
        };
        let encoded = serde_json::to_value(&job).unwrap();
        assert_eq!(encoded["ID"], "web");
        assert!(encoded.get("Priority").is_none());
        assert!(encoded["TaskGroups"][0].get("RestartPolicy").is_none());
    }

    #[test]
    fn test_canonical_job_decodes() {
        let job: Job = serde_json::from_str(
            r#"{
                "ID": "batch-job",
                "Type": "batch",
                "Datacenters": null,
                "TaskGroups": [{
                    "Name": "g",
                    "Count": 1,
                    "RestartPolicy": {"Attempts": 3, "Delay": 15000000000, "Interval": 86400000000000, "Mode": "fail"},
                    "EphemeralDisk": {"Sticky": false, "Migrate": false, "SizeMB": 300},
                    "Tasks": [{"Name": "t", "Driver": "docker", "Config": {"image": "busybox"}, "Resources": {"CPU": 100, "MemoryMB": 300}}]
                }]
            }"#,
        )
        .unwrap();
        assert_eq!(job.job_type(), "batch");
        assert!(job.datacenters.is_empty());
        let group = &job.task_groups[0];
        assert_eq!(group.restart_policy.as_ref().unwrap().attempts, Some(3));
        assert_eq!(group.tasks[0].config["image"], "busybox");
    }

    #[test]
    fn test_job_type_defaults_to_service() {
        assert_eq!(Job::default().job_type(), JOB_TYPE_SERVICE);
    }
}
