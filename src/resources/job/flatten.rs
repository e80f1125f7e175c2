//! API job to typed job state.
//!
//! Each converter takes the matching prior block so durations keep the
//! spelling they were configured with. Groups and tasks are matched to
//! their prior counterpart by name.

use crate::api::{
    Affinity, Job, MigrateStrategy, NetworkResource, ReschedulePolicy, RestartPolicy, Service,
    Spread, Task, TaskGroup, UpdateStrategy, DEFAULT_NAMESPACE,
};
use crate::helper::{flatten_duration, format_duration};
use crate::resources::volume::flatten_constraints;

use super::state::*;

fn flatten_affinities(affinities: &[Affinity]) -> Vec<AffinityState> {
    affinities
        .iter()
        .map(|a| AffinityState {
            attribute: a.l_target.clone(),
            operator: a.operand.clone(),
            value: a.r_target.clone(),
            weight: a.weight,
        })
        .collect()
}

fn flatten_spreads(spreads: &[Spread]) -> Vec<SpreadState> {
    spreads
        .iter()
        .map(|s| SpreadState {
            attribute: s.attribute.clone(),
            weight: s.weight,
            target: s
                .spread_targets
                .iter()
                .map(|t| SpreadTargetState {
                    value: t.value.clone(),
                    percent: t.percent as i64,
                })
                .collect(),
        })
        .collect()
}

pub(crate) fn flatten_update(update: &UpdateStrategy, prior: Option<&UpdateState>) -> UpdateState {
    let prior = prior.cloned().unwrap_or_default();
    UpdateState {
        max_parallel: update.max_parallel,
        health_check: update.health_check.clone().unwrap_or_default(),
        min_healthy_time: flatten_duration(update.min_healthy_time, &prior.min_healthy_time),
        healthy_deadline: flatten_duration(update.healthy_deadline, &prior.healthy_deadline),
        progress_deadline: flatten_duration(update.progress_deadline, &prior.progress_deadline),
        auto_revert: update.auto_revert,
        auto_promote: update.auto_promote,
        canary: update.canary,
        stagger: flatten_duration(update.stagger, &prior.stagger),
    }
}

fn flatten_migrate(migrate: &MigrateStrategy, prior: Option<&MigrateState>) -> MigrateState {
    let prior = prior.cloned().unwrap_or_default();
    MigrateState {
        max_parallel: migrate.max_parallel,
        health_check: migrate.health_check.clone().unwrap_or_default(),
        min_healthy_time: flatten_duration(migrate.min_healthy_time, &prior.min_healthy_time),
        healthy_deadline: flatten_duration(migrate.healthy_deadline, &prior.healthy_deadline),
    }
}

fn flatten_restart(restart: &RestartPolicy, prior: Option<&RestartState>) -> RestartState {
    let prior = prior.cloned().unwrap_or_default();
    RestartState {
        attempts: restart.attempts,
        delay: flatten_duration(restart.delay, &prior.delay),
        interval: flatten_duration(restart.interval, &prior.interval),
        mode: restart.mode.clone().unwrap_or_default(),
        // Nomad reports the default `false` explicitly; keep it only when configured.
        render_templates: restart
            .render_templates
            .filter(|render| *render || prior.render_templates == Some(false)),
    }
}

fn flatten_reschedule(
    reschedule: &ReschedulePolicy,
    prior: Option<&RescheduleState>,
) -> RescheduleState {
    let prior = prior.cloned().unwrap_or_default();
    RescheduleState {
        attempts: reschedule.attempts,
        interval: flatten_duration(reschedule.interval, &prior.interval),
        delay: flatten_duration(reschedule.delay, &prior.delay),
        delay_function: reschedule.delay_function.clone().unwrap_or_default(),
        max_delay: flatten_duration(reschedule.max_delay, &prior.max_delay),
        unlimited: reschedule.unlimited,
    }
}

fn flatten_network(network: &NetworkResource) -> NetworkState {
    let port = |p: &crate::api::Port| PortState {
        label: p.label.clone(),
        static_port: p.value,
        to: p.to,
        host_network: p.host_network.clone(),
    };
    NetworkState {
        mode: network.mode.clone(),
        port: network
            .reserved_ports
            .iter()
            .chain(&network.dynamic_ports)
            .map(port)
            .collect(),
    }
}

fn flatten_services(services: &[Service], prior: &[ServiceState]) -> Vec<ServiceState> {
    services
        .iter()
        .map(|s| {
            let prior_checks = prior
                .iter()
                .find(|p| p.name == s.name)
                .map(|p| p.check.as_slice())
                .unwrap_or_default();
            ServiceState {
                name: s.name.clone(),
                port: s.port_label.clone(),
                provider: s.provider.clone(),
                tags: s.tags.clone(),
                check: s
                    .checks
                    .iter()
                    .map(|c| {
                        let prior = prior_checks.iter().find(|p| p.name == c.name);
                        let spelled = |nanos: i64, pick: fn(&CheckState) -> &str| match prior {
                            Some(p) => flatten_duration(Some(nanos), pick(p)),
                            None => format_duration(nanos),
                        };
                        CheckState {
                            name: c.name.clone(),
                            check_type: c.check_type.clone(),
                            path: c.path.clone(),
                            protocol: c.protocol.clone(),
                            port: c.port_label.clone(),
                            interval: spelled(c.interval, |p| p.interval.as_str()),
                            timeout: spelled(c.timeout, |p| p.timeout.as_str()),
                        }
                    })
                    .collect(),
            }
        })
        .collect()
}

fn flatten_task(task: &Task, prior: Option<&TaskState>) -> TaskState {
    let prior = prior.cloned().unwrap_or_default();
    TaskState {
        name: task.name.clone(),
        driver: task.driver.clone(),
        user: task.user.clone(),
        leader: task.leader,
        config: task.config.clone(),
        env: task.env.clone(),
        meta: task.meta.clone(),
        constraint: flatten_constraints(&task.constraints),
        affinity: flatten_affinities(&task.affinities),
        service: flatten_services(&task.services, &prior.service),
        resources: task.resources.as_ref().map(|r| ResourcesState {
            cpu: r.cpu,
            cores: r.cores.filter(|c| *c > 0),
            memory: r.memory_mb,
            memory_max: r.memory_max_mb.filter(|m| *m > 0),
        }),
        restart: task
            .restart_policy
            .as_ref()
            .map(|r| flatten_restart(r, prior.restart.as_ref())),
        kill_timeout: flatten_duration(task.kill_timeout, &prior.kill_timeout),
        kill_signal: task.kill_signal.clone(),
        logs: task.log_config.as_ref().map(|l| LogsState {
            max_files: l.max_files,
            max_file_size_mb: l.max_file_size_mb,
            disabled: l.disabled,
        }),
        artifact: task
            .artifacts
            .iter()
            .map(|a| ArtifactState {
                source: a.getter_source.clone(),
                destination: a.relative_dest.clone(),
                mode: a.getter_mode.clone(),
                options: a.getter_options.clone(),
            })
            .collect(),
        template: task
            .templates
            .iter()
            .map(|t| {
                let prior_splay = prior
                    .template
                    .iter()
                    .find(|p| p.destination == t.dest_path)
                    .map(|p| p.splay.as_str())
                    .unwrap_or_default();
                TemplateState {
                    data: t.embedded_tmpl.clone(),
                    source: t.source_path.clone(),
                    destination: t.dest_path.clone(),
                    change_mode: t.change_mode.clone(),
                    change_signal: t.change_signal.clone(),
                    env: t.envvar,
                    perms: t.perms.clone(),
                    left_delimiter: t.left_delim.clone(),
                    right_delimiter: t.right_delim.clone(),
                    splay: flatten_duration(Some(t.splay), prior_splay),
                }
            })
            .collect(),
        volume_mount: task
            .volume_mounts
            .iter()
            .map(|m| VolumeMountState {
                volume: m.volume.clone(),
                destination: m.destination.clone(),
                read_only: m.read_only,
            })
            .collect(),
        lifecycle: task.lifecycle.as_ref().map(|l| LifecycleState {
            hook: l.hook.clone(),
            sidecar: l.sidecar,
        }),
    }
}

fn flatten_group(group: &TaskGroup, prior: Option<&GroupState>) -> GroupState {
    let prior = prior.cloned().unwrap_or_default();
    let mut volume: Vec<VolumeState> = group
        .volumes
        .values()
        .map(|v| VolumeState {
            name: v.name.clone(),
            volume_type: v.volume_type.clone(),
            source: v.source.clone(),
            read_only: v.read_only,
            access_mode: v.access_mode.clone(),
            attachment_mode: v.attachment_mode.clone(),
            per_alloc: v.per_alloc,
        })
        .collect();
    volume.sort_by(|a, b| a.name.cmp(&b.name));

    GroupState {
        name: group.name.clone(),
        count: group.count,
        meta: group.meta.clone(),
        constraint: flatten_constraints(&group.constraints),
        affinity: flatten_affinities(&group.affinities),
        spread: flatten_spreads(&group.spreads),
        restart: group
            .restart_policy
            .as_ref()
            .map(|r| flatten_restart(r, prior.restart.as_ref())),
        reschedule: group
            .reschedule_policy
            .as_ref()
            .map(|r| flatten_reschedule(r, prior.reschedule.as_ref())),
        update: group
            .update
            .as_ref()
            .map(|u| flatten_update(u, prior.update.as_ref())),
        migrate: group
            .migrate
            .as_ref()
            .map(|m| flatten_migrate(m, prior.migrate.as_ref())),
        ephemeral_disk: group.ephemeral_disk.as_ref().map(|d| EphemeralDiskState {
            sticky: d.sticky,
            migrate: d.migrate,
            size_mb: d.size_mb,
        }),
        network: group.networks.iter().map(flatten_network).collect(),
        service: flatten_services(&group.services, &prior.service),
        volume,
        shutdown_delay: flatten_duration(group.shutdown_delay, &prior.shutdown_delay),
        task: group
            .tasks
            .iter()
            .map(|t| flatten_task(t, prior.task_named(&t.name)))
            .collect(),
    }
}

/// Convert a job read from Nomad, keeping provider-only settings from
/// `prior`.
pub fn flatten_job(job: Job, prior: &JobState) -> JobState {
    let id = job.id.clone().unwrap_or_default();
    JobState {
        name: job.name.clone().unwrap_or_else(|| id.clone()),
        id,
        namespace: job
            .namespace
            .clone()
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string()),
        region: job.region.clone().unwrap_or_default(),
        job_type: job.job_type().to_string(),
        priority: job.priority.unwrap_or_default(),
        all_at_once: job.all_at_once.unwrap_or_default(),
        datacenters: job.datacenters.clone(),
        node_pool: job.node_pool.clone().unwrap_or_default(),
        meta: job.meta.clone(),
        constraint: flatten_constraints(&job.constraints),
        affinity: flatten_affinities(&job.affinities),
        spread: flatten_spreads(&job.spreads),
        update: job
            .update
            .as_ref()
            .map(|u| flatten_update(u, prior.update.as_ref())),
        periodic: job.periodic.as_ref().map(|p| PeriodicState {
            cron: p.spec.clone(),
            prohibit_overlap: p.prohibit_overlap,
            time_zone: p.time_zone.clone(),
            enabled: p.enabled,
        }),
        parameterized: job.parameterized_job.as_ref().map(|p| ParameterizedState {
            payload: p.payload.clone(),
            meta_required: p.meta_required.clone(),
            meta_optional: p.meta_optional.clone(),
        }),
        group: job
            .task_groups
            .iter()
            .map(|g| flatten_group(g, prior.group_named(&g.name)))
            .collect(),
        detach: prior.detach,
        deregister_on_destroy: prior.deregister_on_destroy,
        purge_on_destroy: prior.purge_on_destroy,
        policy_override: prior.policy_override,
        status: job.status.clone().unwrap_or_default(),
        version: job.version.unwrap_or_default() as i64,
        modify_index: job.modify_index.unwrap_or_default() as i64,
        job_modify_index: job.job_modify_index.unwrap_or_default() as i64,
        deployment_id: prior.deployment_id.clone(),
        deployment_status: prior.deployment_status.clone(),
        timeouts: prior.timeouts.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::job::expand::expand_job;
    use rstest::rstest;
    use std::collections::HashMap;

    fn service_job() -> JobState {
        JobState {
            id: "web".into(),
            name: "web".into(),
            datacenters: vec!["dc1".into()],
            update: Some(UpdateState {
                max_parallel: Some(1),
                min_healthy_time: "10s".into(),
                healthy_deadline: "5m".into(),
                auto_revert: Some(true),
                ..Default::default()
            }),
            group: vec![GroupState {
                name: "frontend".into(),
                count: Some(2),
                restart: Some(RestartState {
                    attempts: Some(2),
                    delay: "15s".into(),
                    interval: "30m".into(),
                    mode: "fail".into(),
                    render_templates: Some(false),
                }),
                network: vec![NetworkState {
                    mode: "bridge".into(),
                    port: vec![
                        PortState {
                            label: "http".into(),
                            static_port: 8080,
                            ..Default::default()
                        },
                        PortState {
                            label: "metrics".into(),
                            to: 9100,
                            ..Default::default()
                        },
                    ],
                }],
                service: vec![ServiceState {
                    name: "web".into(),
                    port: "http".into(),
                    provider: "nomad".into(),
                    tags: vec!["edge".into()],
                    check: vec![CheckState {
                        name: "alive".into(),
                        check_type: "http".into(),
                        path: "/health".into(),
                        interval: "10s".into(),
                        timeout: "2s".into(),
                        ..Default::default()
                    }],
                }],
                shutdown_delay: "5s".into(),
                task: vec![TaskState {
                    name: "nginx".into(),
                    driver: "docker".into(),
                    config: serde_json::json!({"image": "nginx:1.25", "ports": ["http"]})
                        .as_object()
                        .cloned()
                        .unwrap(),
                    resources: Some(ResourcesState {
                        cpu: Some(500),
                        memory: Some(256),
                        ..Default::default()
                    }),
                    kill_timeout: "90s".into(),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn periodic_batch_job() -> JobState {
        JobState {
            id: "report".into(),
            name: "report".into(),
            job_type: "batch".into(),
            datacenters: vec!["dc1".into(), "dc2".into()],
            periodic: Some(PeriodicState {
                cron: "*/15 * * * *".into(),
                prohibit_overlap: Some(true),
                time_zone: "UTC".into(),
                enabled: None,
            }),
            group: vec![GroupState {
                name: "run".into(),
                count: Some(1),
                reschedule: Some(RescheduleState {
                    attempts: Some(1),
                    interval: "24h".into(),
                    unlimited: Some(false),
                    ..Default::default()
                }),
                task: vec![TaskState {
                    name: "report".into(),
                    driver: "exec".into(),
                    env: HashMap::from([("MODE".to_string(), "full".to_string())]),
                    restart: Some(RestartState {
                        attempts: Some(0),
                        mode: "fail".into(),
                        render_templates: Some(true),
                        ..Default::default()
                    }),
                    template: vec![TemplateState {
                        data: "{{ env \"MODE\" }}".into(),
                        destination: "local/mode.txt".into(),
                        change_mode: "noop".into(),
                        splay: "5s".into(),
                        ..Default::default()
                    }],
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn group_update_job() -> JobState {
        let mut job = service_job();
        job.update = None;
        job.group[0].update = Some(UpdateState {
            max_parallel: Some(2),
            canary: Some(1),
            min_healthy_time: "10s".into(),
            healthy_deadline: "1m30s".into(),
            progress_deadline: "10m".into(),
            auto_promote: Some(true),
            ..Default::default()
        });
        job.group[0].restart = None;
        job
    }

    #[rstest]
    #[case::service_with_explicit_false(service_job())]
    #[case::periodic_batch(periodic_batch_job())]
    #[case::group_update(group_update_job())]
    fn test_expand_flatten_round_trip(#[case] state: JobState) {
        let job = expand_job(&state).unwrap();
        let wire = serde_json::to_value(&job).unwrap();
        let job: Job = serde_json::from_value(wire).unwrap();

        assert_eq!(flatten_job(job, &state), state);
    }

    #[test]
    fn test_flatten_keeps_configured_false_render_templates() {
        let restart = RestartPolicy {
            render_templates: Some(false),
            ..Default::default()
        };
        let configured = RestartState {
            render_templates: Some(false),
            ..Default::default()
        };

        assert_eq!(
            flatten_restart(&restart, Some(&configured)).render_templates,
            Some(false)
        );
        assert_eq!(flatten_restart(&restart, None).render_templates, None);
    }

    #[test]
    fn test_flatten_keeps_configured_spelling() {
        let prior = JobState {
            name: "web".into(),
            group: vec![GroupState {
                name: "frontend".into(),
                restart: Some(RestartState {
                    attempts: Some(5),
                    delay: "30s".into(),
                    interval: "1h".into(),
                    mode: "delay".into(),
                    render_templates: None,
                }),
                task: vec![TaskState {
                    name: "nginx".into(),
                    driver: "docker".into(),
                    kill_timeout: "90s".into(),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        };

        let job = expand_job(&prior).unwrap();
        let state = flatten_job(job, &prior);
        let group = &state.group[0];
        assert_eq!(group.restart, prior.group[0].restart);
        assert_eq!(group.task[0].kill_timeout, "90s");
        assert_eq!(state.namespace, "default");
        assert!(state.detach);
    }

    #[test]
    fn test_flatten_server_durations_use_go_format() {
        let job: Job = serde_json::from_value(serde_json::json!({
            "ID": "batch-job",
            "Name": "batch-job",
            "Type": "batch",
            "Namespace": "default",
            "TaskGroups": [{
                "Name": "g",
                "RestartPolicy": {
                    "Attempts": 3,
                    "Delay": 15_000_000_000_i64,
                    "Interval": 86_400_000_000_000_i64,
                    "Mode": "fail",
                    "RenderTemplates": false
                },
                "Tasks": [{"Name": "t", "Driver": "exec", "KillTimeout": 5_000_000_000_i64}]
            }],
            "Status": "pending",
            "Version": 2,
            "JobModifyIndex": 42
        }))
        .unwrap();

        let state = flatten_job(job, &JobState::default());
        assert_eq!(state.id, "batch-job");
        assert_eq!(state.job_type, "batch");
        assert_eq!(state.version, 2);
        assert_eq!(state.job_modify_index, 42);
        assert_eq!(
            state.group[0].restart,
            Some(RestartState {
                attempts: Some(3),
                delay: "15s".into(),
                interval: "24h0m0s".into(),
                mode: "fail".into(),
                render_templates: None,
            })
        );
        assert_eq!(state.group[0].task[0].kill_timeout, "5s");
    }
}
