//! Typed job state to the API job.

use crate::api::{
    Affinity, EphemeralDisk, Job, LogConfig, MigrateStrategy, NetworkResource,
    ParameterizedJobConfig, PeriodicConfig, Port, ReschedulePolicy, Resources, RestartPolicy,
    Service, ServiceCheck, Spread, SpreadTarget, Task, TaskArtifact, TaskGroup, TaskLifecycle,
    Template, UpdateStrategy, VolumeMount, VolumeRequest,
};
use crate::error::ProviderError;
use crate::helper::{opt_string, parse_opt_duration};
use crate::resources::volume::expand_constraints;

use super::state::*;

/// Parse a duration that Nomad requires, empty meaning zero.
fn required_duration(attribute: &str, value: &str) -> Result<i64, ProviderError> {
    Ok(parse_opt_duration(attribute, value)?.unwrap_or_default())
}

fn expand_affinities(affinities: &[AffinityState]) -> Vec<Affinity> {
    affinities
        .iter()
        .map(|a| Affinity {
            l_target: a.attribute.clone(),
            r_target: a.value.clone(),
            operand: a.operator.clone(),
            weight: a.weight,
        })
        .collect()
}

fn expand_spreads(spreads: &[SpreadState]) -> Vec<Spread> {
    spreads
        .iter()
        .map(|s| Spread {
            attribute: s.attribute.clone(),
            weight: s.weight,
            spread_targets: s
                .target
                .iter()
                .map(|t| SpreadTarget {
                    value: t.value.clone(),
                    percent: t.percent.max(0) as u64,
                })
                .collect(),
        })
        .collect()
}

pub(crate) fn expand_update(update: &UpdateState) -> Result<UpdateStrategy, ProviderError> {
    Ok(UpdateStrategy {
        stagger: parse_opt_duration("update.stagger", &update.stagger)?,
        max_parallel: update.max_parallel,
        health_check: opt_string(&update.health_check),
        min_healthy_time: parse_opt_duration("update.min_healthy_time", &update.min_healthy_time)?,
        healthy_deadline: parse_opt_duration("update.healthy_deadline", &update.healthy_deadline)?,
        progress_deadline: parse_opt_duration(
            "update.progress_deadline",
            &update.progress_deadline,
        )?,
        canary: update.canary,
        auto_revert: update.auto_revert,
        auto_promote: update.auto_promote,
    })
}

fn expand_migrate(migrate: &MigrateState) -> Result<MigrateStrategy, ProviderError> {
    Ok(MigrateStrategy {
        max_parallel: migrate.max_parallel,
        health_check: opt_string(&migrate.health_check),
        min_healthy_time: parse_opt_duration("migrate.min_healthy_time", &migrate.min_healthy_time)?,
        healthy_deadline: parse_opt_duration("migrate.healthy_deadline", &migrate.healthy_deadline)?,
    })
}

fn expand_restart(restart: &RestartState) -> Result<RestartPolicy, ProviderError> {
    Ok(RestartPolicy {
        interval: parse_opt_duration("restart.interval", &restart.interval)?,
        attempts: restart.attempts,
        delay: parse_opt_duration("restart.delay", &restart.delay)?,
        mode: opt_string(&restart.mode),
        render_templates: restart.render_templates,
    })
}

fn expand_reschedule(reschedule: &RescheduleState) -> Result<ReschedulePolicy, ProviderError> {
    Ok(ReschedulePolicy {
        attempts: reschedule.attempts,
        interval: parse_opt_duration("reschedule.interval", &reschedule.interval)?,
        delay: parse_opt_duration("reschedule.delay", &reschedule.delay)?,
        delay_function: opt_string(&reschedule.delay_function),
        max_delay: parse_opt_duration("reschedule.max_delay", &reschedule.max_delay)?,
        unlimited: reschedule.unlimited,
    })
}

fn expand_ephemeral_disk(disk: &EphemeralDiskState) -> EphemeralDisk {
    EphemeralDisk {
        sticky: disk.sticky,
        migrate: disk.migrate,
        size_mb: disk.size_mb,
    }
}

fn expand_network(network: &NetworkState) -> NetworkResource {
    let port = |p: &PortState| Port {
        label: p.label.clone(),
        value: p.static_port,
        to: p.to,
        host_network: p.host_network.clone(),
    };
    NetworkResource {
        mode: network.mode.clone(),
        reserved_ports: network.port.iter().filter(|p| p.static_port > 0).map(port).collect(),
        dynamic_ports: network.port.iter().filter(|p| p.static_port <= 0).map(port).collect(),
    }
}

fn expand_services(services: &[ServiceState]) -> Result<Vec<Service>, ProviderError> {
    services
        .iter()
        .map(|s| {
            let checks = s
                .check
                .iter()
                .map(|c| {
                    Ok(ServiceCheck {
                        name: c.name.clone(),
                        check_type: c.check_type.clone(),
                        path: c.path.clone(),
                        protocol: c.protocol.clone(),
                        port_label: c.port.clone(),
                        interval: required_duration("check.interval", &c.interval)?,
                        timeout: required_duration("check.timeout", &c.timeout)?,
                    })
                })
                .collect::<Result<_, ProviderError>>()?;
            Ok(Service {
                name: s.name.clone(),
                port_label: s.port.clone(),
                provider: s.provider.clone(),
                tags: s.tags.clone(),
                checks,
            })
        })
        .collect()
}

fn expand_task(task: &TaskState) -> Result<Task, ProviderError> {
    let templates = task
        .template
        .iter()
        .map(|t| {
            Ok(Template {
                source_path: t.source.clone(),
                dest_path: t.destination.clone(),
                embedded_tmpl: t.data.clone(),
                change_mode: t.change_mode.clone(),
                change_signal: t.change_signal.clone(),
                envvar: t.env,
                perms: t.perms.clone(),
                left_delim: t.left_delimiter.clone(),
                right_delim: t.right_delimiter.clone(),
                splay: required_duration("template.splay", &t.splay)?,
            })
        })
        .collect::<Result<_, ProviderError>>()?;

    Ok(Task {
        name: task.name.clone(),
        driver: task.driver.clone(),
        user: task.user.clone(),
        leader: task.leader,
        config: task.config.clone(),
        env: task.env.clone(),
        meta: task.meta.clone(),
        constraints: expand_constraints(&task.constraint),
        affinities: expand_affinities(&task.affinity),
        services: expand_services(&task.service)?,
        resources: task.resources.as_ref().map(|r| Resources {
            cpu: r.cpu,
            cores: r.cores,
            memory_mb: r.memory,
            memory_max_mb: r.memory_max,
        }),
        restart_policy: task.restart.as_ref().map(expand_restart).transpose()?,
        kill_timeout: parse_opt_duration("kill_timeout", &task.kill_timeout)?,
        kill_signal: task.kill_signal.clone(),
        log_config: task.logs.as_ref().map(|l| LogConfig {
            max_files: l.max_files,
            max_file_size_mb: l.max_file_size_mb,
            disabled: l.disabled,
        }),
        artifacts: task
            .artifact
            .iter()
            .map(|a| TaskArtifact {
                getter_source: a.source.clone(),
                getter_options: a.options.clone(),
                getter_mode: a.mode.clone(),
                relative_dest: a.destination.clone(),
            })
            .collect(),
        templates,
        volume_mounts: task
            .volume_mount
            .iter()
            .map(|m| VolumeMount {
                volume: m.volume.clone(),
                destination: m.destination.clone(),
                read_only: m.read_only,
            })
            .collect(),
        lifecycle: task.lifecycle.as_ref().map(|l| TaskLifecycle {
            hook: l.hook.clone(),
            sidecar: l.sidecar,
        }),
    })
}

fn expand_group(group: &GroupState) -> Result<TaskGroup, ProviderError> {
    Ok(TaskGroup {
        name: group.name.clone(),
        count: group.count,
        meta: group.meta.clone(),
        constraints: expand_constraints(&group.constraint),
        affinities: expand_affinities(&group.affinity),
        spreads: expand_spreads(&group.spread),
        restart_policy: group.restart.as_ref().map(expand_restart).transpose()?,
        reschedule_policy: group.reschedule.as_ref().map(expand_reschedule).transpose()?,
        update: group.update.as_ref().map(expand_update).transpose()?,
        migrate: group.migrate.as_ref().map(expand_migrate).transpose()?,
        ephemeral_disk: group.ephemeral_disk.as_ref().map(expand_ephemeral_disk),
        networks: group.network.iter().map(expand_network).collect(),
        services: expand_services(&group.service)?,
        volumes: group
            .volume
            .iter()
            .map(|v| {
                let request = VolumeRequest {
                    name: v.name.clone(),
                    volume_type: v.volume_type.clone(),
                    source: v.source.clone(),
                    read_only: v.read_only,
                    access_mode: v.access_mode.clone(),
                    attachment_mode: v.attachment_mode.clone(),
                    per_alloc: v.per_alloc,
                };
                (v.name.clone(), request)
            })
            .collect(),
        shutdown_delay: parse_opt_duration("shutdown_delay", &group.shutdown_delay)?,
        tasks: group.task.iter().map(expand_task).collect::<Result<_, _>>()?,
    })
}

/// Build the job to register from its configuration.
pub fn expand_job(state: &JobState) -> Result<Job, ProviderError> {
    let periodic = state.periodic.as_ref().map(|p| PeriodicConfig {
        enabled: p.enabled,
        spec: p.cron.clone(),
        spec_type: "cron".to_string(),
        prohibit_overlap: p.prohibit_overlap,
        time_zone: p.time_zone.clone(),
    });
    let parameterized_job = state.parameterized.as_ref().map(|p| ParameterizedJobConfig {
        payload: p.payload.clone(),
        meta_required: p.meta_required.clone(),
        meta_optional: p.meta_optional.clone(),
    });

    Ok(Job {
        region: opt_string(&state.region),
        namespace: opt_string(&state.namespace),
        id: Some(state.name.clone()),
        name: Some(state.name.clone()),
        job_type: opt_string(&state.job_type),
        priority: Some(state.priority).filter(|p| *p > 0),
        all_at_once: Some(state.all_at_once).filter(|all| *all),
        datacenters: state.datacenters.clone(),
        node_pool: opt_string(&state.node_pool),
        constraints: expand_constraints(&state.constraint),
        affinities: expand_affinities(&state.affinity),
        spreads: expand_spreads(&state.spread),
        task_groups: state.group.iter().map(expand_group).collect::<Result<_, _>>()?,
        update: state.update.as_ref().map(expand_update).transpose()?,
        periodic,
        parameterized_job,
        meta: state.meta.clone(),
        ..Default::default()
    })
}
