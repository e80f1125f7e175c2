//! Typed state of `nomad_job`, one struct per nested block.
//!
//! Numeric and boolean fields of the policy blocks are `Option` so that an
//! unset value is left for Nomad to fill in. Durations are Go duration
//! strings, empty when unset.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::api::{DEFAULT_NAMESPACE, JOB_TYPE_SERVICE};
use crate::resource::Timeouts;
use crate::resources::volume::ConstraintState;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JobState {
    pub id: String,
    pub name: String,
    pub namespace: String,
    pub region: String,
    #[serde(rename = "type")]
    pub job_type: String,
    pub priority: i64,
    pub all_at_once: bool,
    pub datacenters: Vec<String>,
    pub node_pool: String,
    pub meta: HashMap<String, String>,
    pub constraint: Vec<ConstraintState>,
    pub affinity: Vec<AffinityState>,
    pub spread: Vec<SpreadState>,
    pub update: Option<UpdateState>,
    pub periodic: Option<PeriodicState>,
    pub parameterized: Option<ParameterizedState>,
    pub group: Vec<GroupState>,

    pub detach: bool,
    pub deregister_on_destroy: bool,
    pub purge_on_destroy: bool,
    pub policy_override: bool,

    pub status: String,
    pub version: i64,
    pub modify_index: i64,
    pub job_modify_index: i64,
    pub deployment_id: String,
    pub deployment_status: String,
    pub timeouts: Option<Timeouts>,
}

impl Default for JobState {
    fn default() -> Self {
        Self {
            id: String::new(),
            name: String::new(),
            namespace: DEFAULT_NAMESPACE.to_string(),
            region: String::new(),
            job_type: JOB_TYPE_SERVICE.to_string(),
            priority: 0,
            all_at_once: false,
            datacenters: Vec::new(),
            node_pool: String::new(),
            meta: HashMap::new(),
            constraint: Vec::new(),
            affinity: Vec::new(),
            spread: Vec::new(),
            update: None,
            periodic: None,
            parameterized: None,
            group: Vec::new(),
            detach: true,
            deregister_on_destroy: true,
            purge_on_destroy: false,
            policy_override: false,
            status: String::new(),
            version: 0,
            modify_index: 0,
            job_modify_index: 0,
            deployment_id: String::new(),
            deployment_status: String::new(),
            timeouts: None,
        }
    }
}

impl JobState {
    /// The configured group with the given name.
    pub fn group_named(&self, name: &str) -> Option<&GroupState> {
        self.group.iter().find(|g| g.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AffinityState {
    pub attribute: String,
    pub operator: String,
    pub value: String,
    pub weight: Option<i64>,
}

impl Default for AffinityState {
    fn default() -> Self {
        Self {
            attribute: String::new(),
            operator: "=".to_string(),
            value: String::new(),
            weight: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpreadState {
    pub attribute: String,
    pub weight: Option<i64>,
    pub target: Vec<SpreadTargetState>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpreadTargetState {
    pub value: String,
    pub percent: i64,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct UpdateState {
    pub max_parallel: Option<i64>,
    pub health_check: String,
    pub min_healthy_time: String,
    pub healthy_deadline: String,
    pub progress_deadline: String,
    pub auto_revert: Option<bool>,
    pub auto_promote: Option<bool>,
    pub canary: Option<i64>,
    pub stagger: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MigrateState {
    pub max_parallel: Option<i64>,
    pub health_check: String,
    pub min_healthy_time: String,
    pub healthy_deadline: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestartState {
    pub attempts: Option<i64>,
    pub delay: String,
    pub interval: String,
    pub mode: String,
    pub render_templates: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RescheduleState {
    pub attempts: Option<i64>,
    pub interval: String,
    pub delay: String,
    pub delay_function: String,
    pub max_delay: String,
    pub unlimited: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EphemeralDiskState {
    pub sticky: Option<bool>,
    pub migrate: Option<bool>,
    pub size_mb: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogsState {
    pub max_files: Option<i64>,
    pub max_file_size_mb: Option<i64>,
    pub disabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResourcesState {
    pub cpu: Option<i64>,
    pub cores: Option<i64>,
    pub memory: Option<i64>,
    pub memory_max: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortState {
    pub label: String,
    #[serde(rename = "static")]
    pub static_port: i64,
    pub to: i64,
    pub host_network: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkState {
    pub mode: String,
    pub port: Vec<PortState>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckState {
    pub name: String,
    #[serde(rename = "type")]
    pub check_type: String,
    pub path: String,
    pub protocol: String,
    pub port: String,
    pub interval: String,
    pub timeout: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceState {
    pub name: String,
    pub port: String,
    pub provider: String,
    pub tags: Vec<String>,
    pub check: Vec<CheckState>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeState {
    pub name: String,
    #[serde(rename = "type")]
    pub volume_type: String,
    pub source: String,
    pub read_only: bool,
    pub access_mode: String,
    pub attachment_mode: String,
    pub per_alloc: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct VolumeMountState {
    pub volume: String,
    pub destination: String,
    pub read_only: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactState {
    pub source: String,
    pub destination: String,
    pub mode: String,
    pub options: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemplateState {
    pub data: String,
    pub source: String,
    pub destination: String,
    pub change_mode: String,
    pub change_signal: String,
    pub env: bool,
    pub perms: String,
    pub left_delimiter: String,
    pub right_delimiter: String,
    pub splay: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleState {
    pub hook: String,
    pub sidecar: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TaskState {
    pub name: String,
    pub driver: String,
    pub user: String,
    pub leader: bool,
    pub config: Map<String, Value>,
    pub env: HashMap<String, String>,
    pub meta: HashMap<String, String>,
    pub constraint: Vec<ConstraintState>,
    pub affinity: Vec<AffinityState>,
    pub service: Vec<ServiceState>,
    pub resources: Option<ResourcesState>,
    pub restart: Option<RestartState>,
    pub kill_timeout: String,
    pub kill_signal: String,
    pub logs: Option<LogsState>,
    pub artifact: Vec<ArtifactState>,
    pub template: Vec<TemplateState>,
    pub volume_mount: Vec<VolumeMountState>,
    pub lifecycle: Option<LifecycleState>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupState {
    pub name: String,
    pub count: Option<i64>,
    pub meta: HashMap<String, String>,
    pub constraint: Vec<ConstraintState>,
    pub affinity: Vec<AffinityState>,
    pub spread: Vec<SpreadState>,
    pub restart: Option<RestartState>,
    pub reschedule: Option<RescheduleState>,
    pub update: Option<UpdateState>,
    pub migrate: Option<MigrateState>,
    pub ephemeral_disk: Option<EphemeralDiskState>,
    pub network: Vec<NetworkState>,
    pub service: Vec<ServiceState>,
    pub volume: Vec<VolumeState>,
    pub shutdown_delay: String,
    pub task: Vec<TaskState>,
}

impl GroupState {
    /// The configured task with the given name.
    pub fn task_named(&self, name: &str) -> Option<&TaskState> {
        self.task.iter().find(|t| t.name == name)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PeriodicState {
    pub cron: String,
    pub prohibit_overlap: Option<bool>,
    pub time_zone: String,
    pub enabled: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParameterizedState {
    pub payload: String,
    pub meta_required: Vec<String>,
    pub meta_optional: Vec<String>,
}
