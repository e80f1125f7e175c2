//! Drift suppression for server-filled job defaults.
//!
//! Nomad canonicalises a registered job, filling every policy block the
//! user left out with a default that depends on the job type. Reading the
//! job back would then show blocks that are not in the configuration. A
//! block the configuration does not set is dropped from state when it is
//! exactly the default Nomad would have filled in.

use serde_json::{Map, Value};

use crate::api::{JOB_TYPE_BATCH, JOB_TYPE_SERVICE, JOB_TYPE_SYSBATCH, JOB_TYPE_SYSTEM};
use crate::resource::prune_nulls;

use super::state::*;

/// Drop `block` when it equals `default`.
pub fn normalize_block<T: PartialEq>(block: Option<T>, default: Option<&T>) -> Option<T> {
    match (block, default) {
        (Some(block), Some(default)) if block == *default => None,
        (block, _) => block,
    }
}

fn restart_default(job_type: &str) -> Option<RestartState> {
    let (attempts, interval) = match job_type {
        JOB_TYPE_BATCH | JOB_TYPE_SYSBATCH => (3, "24h0m0s"),
        JOB_TYPE_SERVICE | JOB_TYPE_SYSTEM => (2, "30m0s"),
        _ => return None,
    };
    Some(RestartState {
        attempts: Some(attempts),
        delay: "15s".into(),
        interval: interval.into(),
        mode: "fail".into(),
        render_templates: None,
    })
}

fn reschedule_default(job_type: &str) -> Option<RescheduleState> {
    match job_type {
        JOB_TYPE_BATCH => Some(RescheduleState {
            attempts: Some(1),
            interval: "24h0m0s".into(),
            delay: "5s".into(),
            delay_function: "constant".into(),
            max_delay: "0s".into(),
            unlimited: Some(false),
        }),
        JOB_TYPE_SERVICE => Some(RescheduleState {
            attempts: Some(0),
            interval: "0s".into(),
            delay: "30s".into(),
            delay_function: "exponential".into(),
            max_delay: "1h0m0s".into(),
            unlimited: Some(true),
        }),
        _ => None,
    }
}

fn update_default(job_type: &str) -> Option<UpdateState> {
    (job_type == JOB_TYPE_SERVICE).then(|| UpdateState {
        max_parallel: Some(1),
        health_check: "checks".into(),
        min_healthy_time: "10s".into(),
        healthy_deadline: "5m0s".into(),
        progress_deadline: "10m0s".into(),
        auto_revert: Some(false),
        auto_promote: Some(false),
        canary: Some(0),
        stagger: "30s".into(),
    })
}

fn migrate_default(job_type: &str) -> Option<MigrateState> {
    (job_type == JOB_TYPE_SERVICE).then(|| MigrateState {
        max_parallel: Some(1),
        health_check: "checks".into(),
        min_healthy_time: "10s".into(),
        healthy_deadline: "5m0s".into(),
    })
}

fn ephemeral_disk_default() -> EphemeralDiskState {
    EphemeralDiskState {
        sticky: Some(false),
        migrate: Some(false),
        size_mb: Some(300),
    }
}

fn logs_default() -> LogsState {
    LogsState {
        max_files: Some(10),
        max_file_size_mb: Some(10),
        disabled: Some(false),
    }
}

fn resources_default() -> ResourcesState {
    ResourcesState {
        cpu: Some(100),
        memory: Some(300),
        ..Default::default()
    }
}

/// Drop the blocks of `state` that `config` leaves unset and Nomad filled
/// in with its defaults.
pub fn normalize_job(state: &mut JobState, config: &JobState) {
    let job_type = state.job_type.clone();
    let restart = restart_default(&job_type);
    let reschedule = reschedule_default(&job_type);
    let update = update_default(&job_type);
    let migrate = migrate_default(&job_type);

    if config.update.is_none() {
        state.update = normalize_block(state.update.take(), update.as_ref());
    }
    // Groups inherit the job-level update block.
    let job_update = state.update.clone().or(update);

    for group in &mut state.group {
        let configured = config.group_named(&group.name).cloned().unwrap_or_default();

        if configured.restart.is_none() {
            group.restart = normalize_block(group.restart.take(), restart.as_ref());
        }
        if configured.reschedule.is_none() {
            group.reschedule = normalize_block(group.reschedule.take(), reschedule.as_ref());
        }
        if configured.update.is_none() {
            group.update = normalize_block(group.update.take(), job_update.as_ref());
        }
        if configured.migrate.is_none() {
            group.migrate = normalize_block(group.migrate.take(), migrate.as_ref());
        }
        if configured.ephemeral_disk.is_none() {
            group.ephemeral_disk =
                normalize_block(group.ephemeral_disk.take(), Some(&ephemeral_disk_default()));
        }

        // Tasks inherit the group restart policy, defaulted or not.
        let group_restart = group.restart.clone().or_else(|| restart.clone());
        for task in &mut group.task {
            let configured = configured.task_named(&task.name).cloned().unwrap_or_default();
            if configured.restart.is_none() {
                task.restart = normalize_block(task.restart.take(), group_restart.as_ref());
            }
            if configured.logs.is_none() {
                task.logs = normalize_block(task.logs.take(), Some(&logs_default()));
            }
            if configured.resources.is_none() {
                task.resources = normalize_block(task.resources.take(), Some(&resources_default()));
            }
        }
    }
}

/// Group attributes Nomad fills in when they are unset.
const GROUP_SERVER_VALUES: [&str; 2] = ["count", "shutdown_delay"];

/// Group blocks whose unset attributes Nomad fills in.
const GROUP_SERVER_BLOCKS: [&str; 5] = ["restart", "reschedule", "update", "migrate", "ephemeral_disk"];

/// Task attributes Nomad fills in when they are unset.
const TASK_SERVER_VALUES: [&str; 2] = ["kill_timeout", "kill_signal"];

/// Task blocks whose unset attributes Nomad fills in.
const TASK_SERVER_BLOCKS: [&str; 3] = ["resources", "restart", "logs"];

fn named<'a>(items: Option<&'a Value>, name: &str) -> Option<&'a Map<String, Value>> {
    items?
        .as_array()?
        .iter()
        .filter_map(Value::as_object)
        .find(|item| item.get("name").and_then(Value::as_str) == Some(name))
}

/// Copy server-filled values from `prior` into `planned` where the plan
/// leaves them unset.
///
/// A block in `blocks` is only merged, attribute by attribute, when the plan
/// still sets it. A block the plan drops stays dropped: any block left in
/// state after normalisation was configured, so removing it is a change.
fn carry(
    values: &[&str],
    blocks: &[&str],
    prior: &Map<String, Value>,
    planned: &mut Map<String, Value>,
) {
    for key in values {
        let Some(before) = prior.get(*key).filter(|v| !v.is_null()) else {
            continue;
        };
        if planned.get(*key).map_or(true, Value::is_null) {
            planned.insert(key.to_string(), before.clone());
        }
    }
    for key in blocks {
        let (Some(Value::Object(before)), Some(Value::Object(after))) =
            (prior.get(*key), planned.get_mut(*key))
        else {
            continue;
        };
        for (name, value) in before {
            if after.get(name).map_or(true, Value::is_null) {
                after.insert(name.clone(), value.clone());
            }
        }
    }
}

/// Carry values Nomad filled into groups and tasks over to the plan.
///
/// The generic planner cannot match list items, so without this every
/// group would show the server defaults as removed on each plan.
pub fn carry_server_values(prior: &Value, planned: &mut Value) {
    let Some(groups) = planned.get_mut("group").and_then(Value::as_array_mut) else {
        return;
    };
    for group in groups.iter_mut().filter_map(Value::as_object_mut) {
        let Some(name) = group.get("name").and_then(Value::as_str).map(str::to_string) else {
            continue;
        };
        let Some(prior_group) = named(prior.get("group"), &name) else {
            continue;
        };
        carry(&GROUP_SERVER_VALUES, &GROUP_SERVER_BLOCKS, prior_group, group);

        let Some(tasks) = group.get_mut("task").and_then(Value::as_array_mut) else {
            continue;
        };
        for task in tasks.iter_mut().filter_map(Value::as_object_mut) {
            let Some(task_name) = task.get("name").and_then(Value::as_str).map(str::to_string)
            else {
                continue;
            };
            if let Some(prior_task) = named(prior_group.get("task"), &task_name) {
                carry(&TASK_SERVER_VALUES, &TASK_SERVER_BLOCKS, prior_task, task);
            }
        }
    }
}

/// Whether two `group` values describe the same groups.
pub fn groups_equal(before: Option<&Value>, after: Option<&Value>) -> bool {
    let normalize = |v: Option<&Value>| prune_nulls(v.cloned().unwrap_or(Value::Null));
    normalize(before) == normalize(after)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[test]
    fn test_normalize_block_drops_default() {
        let default = restart_default("batch");
        assert_eq!(normalize_block(default.clone(), default.as_ref()), None);
    }

    #[test]
    fn test_normalize_block_keeps_custom() {
        let custom = RestartState {
            attempts: Some(10),
            ..restart_default("batch").unwrap()
        };
        assert_eq!(
            normalize_block(Some(custom.clone()), restart_default("batch").as_ref()),
            Some(custom)
        );
    }

    #[test]
    fn test_normalize_block_without_default_keeps_block() {
        let disk = EphemeralDiskState::default();
        assert_eq!(normalize_block(Some(disk.clone()), None), Some(disk));
    }

    #[rstest]
    #[case("batch", 3, "24h0m0s")]
    #[case("sysbatch", 3, "24h0m0s")]
    #[case("service", 2, "30m0s")]
    #[case("system", 2, "30m0s")]
    fn test_restart_defaults_by_type(
        #[case] job_type: &str,
        #[case] attempts: i64,
        #[case] interval: &str,
    ) {
        let restart = restart_default(job_type).unwrap();
        assert_eq!(restart.attempts, Some(attempts));
        assert_eq!(restart.interval, interval);
        assert_eq!(restart.delay, "15s");
        assert_eq!(restart.mode, "fail");
    }

    #[test]
    fn test_system_jobs_have_no_reschedule_default() {
        assert!(reschedule_default("system").is_none());
        assert!(update_default("batch").is_none());
    }

    fn server_job(job_type: &str) -> JobState {
        JobState {
            name: "example".into(),
            job_type: job_type.into(),
            update: update_default(job_type),
            group: vec![GroupState {
                name: "g".into(),
                count: Some(1),
                restart: restart_default(job_type),
                reschedule: reschedule_default(job_type),
                update: update_default(job_type),
                migrate: migrate_default(job_type),
                ephemeral_disk: Some(ephemeral_disk_default()),
                task: vec![TaskState {
                    name: "t".into(),
                    driver: "docker".into(),
                    restart: restart_default(job_type),
                    logs: Some(logs_default()),
                    resources: Some(resources_default()),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    #[test]
    fn test_normalize_job_removes_unconfigured_defaults() {
        let config = JobState {
            name: "example".into(),
            group: vec![GroupState {
                name: "g".into(),
                task: vec![TaskState {
                    name: "t".into(),
                    driver: "docker".into(),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        };

        let mut state = server_job("service");
        normalize_job(&mut state, &config);

        assert!(state.update.is_none());
        let group = &state.group[0];
        assert!(group.restart.is_none());
        assert!(group.reschedule.is_none());
        assert!(group.update.is_none());
        assert!(group.migrate.is_none());
        assert!(group.ephemeral_disk.is_none());
        assert_eq!(group.count, Some(1));
        let task = &group.task[0];
        assert!(task.restart.is_none());
        assert!(task.logs.is_none());
        assert!(task.resources.is_none());
    }

    #[test]
    fn test_normalize_job_keeps_configured_blocks() {
        let mut state = server_job("batch");
        let config = state.clone();
        normalize_job(&mut state, &config);
        assert_eq!(state, config);
    }

    #[test]
    fn test_normalize_job_keeps_non_default_values() {
        let mut state = server_job("batch");
        state.group[0].task[0].resources = Some(ResourcesState {
            cpu: Some(500),
            memory: Some(256),
            ..Default::default()
        });
        normalize_job(&mut state, &JobState::default());
        assert_eq!(state.group[0].task[0].resources.as_ref().unwrap().cpu, Some(500));
        assert!(state.group[0].restart.is_none());
    }

    #[test]
    fn test_task_restart_inherits_custom_group_restart() {
        let mut state = server_job("service");
        let custom = RestartState {
            attempts: Some(7),
            ..restart_default("service").unwrap()
        };
        state.group[0].restart = Some(custom.clone());
        state.group[0].task[0].restart = Some(custom.clone());

        let config = JobState {
            group: vec![GroupState {
                name: "g".into(),
                restart: Some(custom.clone()),
                ..Default::default()
            }],
            ..Default::default()
        };
        normalize_job(&mut state, &config);
        assert_eq!(state.group[0].restart, Some(custom));
        assert!(state.group[0].task[0].restart.is_none());
    }

    #[test]
    fn test_carry_server_values() {
        let prior = json!({
            "group": [{
                "name": "g",
                "count": 3,
                "restart": {"attempts": 5, "delay": "15s", "interval": "30m0s", "mode": "fail"},
                "task": [{"name": "t", "kill_timeout": "5s", "resources": {"cpu": 500}}]
            }]
        });
        let mut planned = json!({
            "group": [{
                "name": "g",
                "count": null,
                "restart": {"attempts": 5, "delay": null},
                "task": [{"name": "t", "kill_timeout": null, "resources": {"memory": 256}}]
            }, {
                "name": "new",
                "task": []
            }]
        });

        carry_server_values(&prior, &mut planned);

        let group = &planned["group"][0];
        assert_eq!(group["count"], 3);
        assert_eq!(group["restart"]["delay"], "15s");
        assert_eq!(group["restart"]["mode"], "fail");
        assert_eq!(group["task"][0]["kill_timeout"], "5s");
        assert_eq!(group["task"][0]["resources"]["cpu"], 500);
        assert_eq!(group["task"][0]["resources"]["memory"], 256);
        assert!(planned["group"][1].get("count").is_none());
    }

    #[test]
    fn test_removed_custom_block_plans_as_removed() {
        let prior = json!({
            "group": [{
                "name": "g",
                "count": 1,
                "restart": {"attempts": 5, "delay": "15s", "interval": "30m0s", "mode": "fail"},
                "task": [{"name": "t", "kill_timeout": "5s", "logs": {"max_files": 3}}]
            }]
        });
        let mut planned = json!({
            "group": [{
                "name": "g",
                "count": null,
                "restart": null,
                "task": [{"name": "t", "kill_timeout": null}]
            }]
        });

        carry_server_values(&prior, &mut planned);

        let group = &planned["group"][0];
        assert_eq!(group["count"], 1);
        assert!(group["restart"].is_null());
        assert_eq!(group["task"][0]["kill_timeout"], "5s");
        assert!(group["task"][0].get("logs").is_none());
        assert!(!groups_equal(prior.get("group"), planned.get("group")));
    }

    #[test]
    fn test_groups_equal_ignores_nulls() {
        assert!(groups_equal(
            Some(&json!([{"name": "g", "count": 1, "meta": null}])),
            Some(&json!([{"name": "g", "count": 1}]))
        ));
        assert!(!groups_equal(
            Some(&json!([{"name": "g", "count": 1}])),
            Some(&json!([{"name": "g", "count": 2}]))
        ));
    }
}
