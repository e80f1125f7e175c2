//! `nomad_job`: a job described with a structured schema.
//!
//! The configuration is converted into an API job ([`expand`]), registered,
//! and read back ([`flatten`]). Blocks Nomad fills in with its job-type
//! defaults are removed again ([`normalize`]) so an unchanged configuration
//! plans no changes. With `detach = false` the apply waits for the
//! registration's evaluation and, when it starts one, the deployment.

mod expand;
mod flatten;
mod normalize;
mod schema;
mod state;

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::api::{
    Deployment, Job, QueryOptions, DEFAULT_NAMESPACE, JOB_TYPE_BATCH, JOB_TYPE_SERVICE,
    JOB_TYPE_SYSBATCH,
};
use crate::error::{ApiResultExt, OptionalExt, ProviderError};
use crate::helper::retry::{retry, RetryError};
use crate::resource::{ProviderContext, Resource, Timeouts};
use crate::schema::{Diagnostic, Schema};
use crate::types::PlanResult;

pub use expand::expand_job;
pub use flatten::flatten_job;
pub use normalize::{normalize_block, normalize_job};
pub use state::*;

use normalize::{carry_server_values, groups_equal};
use schema::{job_schema, COMPUTED_ATTRIBUTES, PROVIDER_ATTRIBUTES};

const DEFAULT_DEPLOYMENT_TIMEOUT: Duration = Duration::from_secs(5 * 60);
const DEPLOYMENT_SUCCESSFUL: &str = "successful";
const EVALUATION_COMPLETE: &str = "complete";

/// Registers a Nomad job.
#[derive(Debug, Default, Clone, Copy)]
pub struct JobResource;

/// The job id and namespace of an import id of the form `id@namespace`.
fn parse_job_id(id: &str) -> (&str, &str) {
    match id.rsplit_once('@') {
        Some((job, namespace)) if !job.is_empty() && !namespace.is_empty() => (job, namespace),
        _ => (id, DEFAULT_NAMESPACE),
    }
}

/// Block on an evaluation until the scheduler is done with it.
async fn wait_for_evaluation(
    ctx: &ProviderContext,
    eval_id: &str,
    namespace: &str,
    timeout: Duration,
) -> Result<String, ProviderError> {
    let deadline = ctx.retry.until(timeout);
    let mut index = 0;
    loop {
        let Some(wait) = deadline.blocking_wait() else {
            return Err(ProviderError::DeadlineExceeded(format!(
                "timed out waiting for evaluation {:?}",
                eval_id
            )));
        };
        let opts = QueryOptions::namespace(namespace).with_wait(index, wait);
        let (eval, meta) = ctx
            .client
            .jobs()
            .evaluation(eval_id, &opts)
            .await
            .with_context(|| format!("error reading evaluation {:?}", eval_id))?;
        if eval.is_terminal() {
            if eval.status != EVALUATION_COMPLETE {
                return Err(ProviderError::Unavailable(format!(
                    "evaluation {:?} {}: {}",
                    eval_id, eval.status, eval.status_description
                )));
            }
            debug!(eval_id, deployment_id = %eval.deployment_id, "Evaluation complete");
            return Ok(eval.deployment_id);
        }
        if deadline.expired() {
            return Err(ProviderError::DeadlineExceeded(format!(
                "evaluation {:?} is still {:?}",
                eval_id, eval.status
            )));
        }
        if meta.last_index <= index {
            tokio::time::sleep(ctx.retry.interval.min(deadline.remaining())).await;
        }
        index = meta.last_index.max(index);
    }
}

/// Poll a deployment until it stops progressing; anything but success is an
/// error.
async fn wait_for_deployment(
    ctx: &ProviderContext,
    deployment_id: &str,
    namespace: &str,
    timeout: Duration,
) -> Result<Deployment, ProviderError> {
    let client = &ctx.client;
    let opts = &QueryOptions::namespace(namespace);
    retry("wait for deployment", ctx.retry.until(timeout), move || async move {
        let deployment = client
            .deployments()
            .info(deployment_id, opts)
            .await
            .with_context(|| format!("error reading deployment {:?}", deployment_id))
            .map_err(RetryError::permanent)?;
        if !deployment.is_terminal() {
            debug!(deployment_id, status = %deployment.status, "Waiting for deployment");
            return Err(RetryError::transient(ProviderError::DeadlineExceeded(format!(
                "deployment {:?} is still {:?}",
                deployment_id, deployment.status
            ))));
        }
        if deployment.status != DEPLOYMENT_SUCCESSFUL {
            return Err(RetryError::permanent(ProviderError::Unavailable(format!(
                "deployment {:?} {}: {}",
                deployment_id, deployment.status, deployment.status_description
            ))));
        }
        Ok(deployment)
    })
    .await
}

impl JobResource {
    async fn register(
        &self,
        ctx: &ProviderContext,
        planned: JobState,
        timeout: Duration,
    ) -> Result<JobState, ProviderError> {
        let job = expand_job(&planned)?;
        let response = ctx
            .client
            .jobs()
            .register(&job, planned.policy_override)
            .await
            .with_context(|| format!("error registering job {:?}", planned.name))?;
        if !response.warnings.is_empty() {
            warn!(job = %planned.name, warnings = %response.warnings, "Job registered with warnings");
        }
        info!(
            job = %planned.name,
            namespace = %planned.namespace,
            eval_id = %response.eval_id,
            job_modify_index = response.job_modify_index,
            "Registered job"
        );

        let mut registered = JobState {
            id: planned.name.clone(),
            deployment_id: String::new(),
            deployment_status: String::new(),
            ..planned
        };

        // Periodic and parameterized jobs are registered without an evaluation.
        if !registered.detach && !response.eval_id.is_empty() {
            let deployment_id =
                wait_for_evaluation(ctx, &response.eval_id, &registered.namespace, timeout).await?;
            if !deployment_id.is_empty() {
                let deployment =
                    wait_for_deployment(ctx, &deployment_id, &registered.namespace, timeout)
                        .await?;
                info!(job = %registered.id, deployment_id = %deployment.id, "Deployment successful");
                registered.deployment_status = deployment.status;
                registered.deployment_id = deployment.id;
            }
        }

        let id = registered.id.clone();
        self.read(ctx, registered)
            .await?
            .ok_or_else(|| ProviderError::NotFound(format!("job {:?}", id)))
    }

    async fn fetch(ctx: &ProviderContext, state: &JobState) -> Result<Option<Job>, ProviderError> {
        let job = ctx
            .client
            .jobs()
            .info(&state.id, &state.namespace)
            .await
            .with_context(|| format!("error reading job {:?}", state.id))
            .optional()?;
        // A stopped job is as good as gone: applying registers it again.
        Ok(job.filter(|j| j.stop != Some(true)))
    }
}

#[async_trait]
impl Resource for JobResource {
    type State = JobState;

    fn schema(&self) -> Schema {
        job_schema()
    }

    fn validate(&self, config: &JobState) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();
        let batch_like = matches!(config.job_type.as_str(), JOB_TYPE_BATCH | JOB_TYPE_SYSBATCH);
        if config.periodic.is_some() && !batch_like {
            diagnostics.push(
                Diagnostic::error("Only batch and sysbatch jobs can be periodic")
                    .with_attribute("periodic"),
            );
        }
        if config.parameterized.is_some() && !batch_like {
            diagnostics.push(
                Diagnostic::error("Only batch and sysbatch jobs can be parameterized")
                    .with_attribute("parameterized"),
            );
        }

        let mut groups = HashSet::new();
        for group in &config.group {
            if !groups.insert(group.name.as_str()) {
                diagnostics.push(
                    Diagnostic::error(format!("Duplicate group {:?}", group.name))
                        .with_attribute("group"),
                );
            }
            let reschedulable = matches!(config.job_type.as_str(), JOB_TYPE_SERVICE | JOB_TYPE_BATCH);
            if group.reschedule.is_some() && !reschedulable {
                diagnostics.push(
                    Diagnostic::error(format!(
                        "Group {:?}: {} jobs cannot set a reschedule policy",
                        group.name, config.job_type
                    ))
                    .with_attribute("group"),
                );
            }
            let mut tasks = HashSet::new();
            for task in &group.task {
                if !tasks.insert(task.name.as_str()) {
                    diagnostics.push(
                        Diagnostic::error(format!(
                            "Duplicate task {:?} in group {:?}",
                            task.name, group.name
                        ))
                        .with_attribute("group"),
                    );
                }
            }
        }
        diagnostics
    }

    fn customize_plan(&self, prior: Option<&Value>, plan: &mut PlanResult) {
        let Some(prior) = prior.filter(|p| !p.is_null()) else {
            return;
        };
        if plan.is_destroy() {
            return;
        }

        carry_server_values(prior, &mut plan.planned_state);
        let planned_groups = plan.planned_state.get("group").cloned();
        if groups_equal(prior.get("group"), planned_groups.as_ref()) {
            plan.changes.retain(|c| c.path != "group");
        } else if let Some(change) = plan.changes.iter_mut().find(|c| c.path == "group") {
            change.after = planned_groups;
        }

        let job_changes = plan
            .changes
            .iter()
            .any(|c| !PROVIDER_ATTRIBUTES.contains(&c.path.as_str()));
        if !job_changes {
            return;
        }
        if let Value::Object(planned) = &mut plan.planned_state {
            for name in COMPUTED_ATTRIBUTES {
                planned.insert(name.to_string(), Value::Null);
            }
        }
    }

    async fn create(&self, ctx: &ProviderContext, planned: JobState) -> Result<JobState, ProviderError> {
        let timeout = Timeouts::create_or(&planned.timeouts, DEFAULT_DEPLOYMENT_TIMEOUT)?;
        self.register(ctx, planned, timeout).await
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        state: JobState,
    ) -> Result<Option<JobState>, ProviderError> {
        let Some(job) = Self::fetch(ctx, &state).await? else {
            info!(job = %state.id, "Job not found or stopped");
            return Ok(None);
        };
        let mut refreshed = flatten_job(job, &state);
        normalize_job(&mut refreshed, &state);
        Ok(Some(refreshed))
    }

    async fn update(
        &self,
        ctx: &ProviderContext,
        prior: JobState,
        planned: JobState,
    ) -> Result<JobState, ProviderError> {
        let planned = JobState {
            id: prior.id.clone(),
            ..planned
        };
        if expand_job(&prior)? == expand_job(&planned)? {
            debug!(job = %planned.id, "Only provider settings changed; not re-registering");
            let id = planned.id.clone();
            let kept = JobState {
                deployment_id: prior.deployment_id,
                deployment_status: prior.deployment_status,
                ..planned
            };
            return self
                .read(ctx, kept)
                .await?
                .ok_or_else(|| ProviderError::NotFound(format!("job {:?}", id)));
        }
        let timeout = Timeouts::update_or(&planned.timeouts, DEFAULT_DEPLOYMENT_TIMEOUT)?;
        self.register(ctx, planned, timeout).await
    }

    async fn delete(&self, ctx: &ProviderContext, state: JobState) -> Result<(), ProviderError> {
        if !state.deregister_on_destroy {
            info!(job = %state.id, "Leaving job registered");
            return Ok(());
        }
        let response = ctx
            .client
            .jobs()
            .deregister(&state.id, &state.namespace, state.purge_on_destroy)
            .await
            .with_context(|| format!("error deregistering job {:?}", state.id))
            .optional()?;
        let Some(response) = response else {
            info!(job = %state.id, "Job already gone");
            return Ok(());
        };
        info!(job = %state.id, purge = state.purge_on_destroy, eval_id = %response.eval_id, "Deregistered job");

        if !state.detach && !response.eval_id.is_empty() {
            let timeout = Timeouts::delete_or(&state.timeouts, DEFAULT_DEPLOYMENT_TIMEOUT)?;
            wait_for_evaluation(ctx, &response.eval_id, &state.namespace, timeout).await?;
        }
        Ok(())
    }

    async fn exists(&self, ctx: &ProviderContext, state: &JobState) -> Result<bool, ProviderError> {
        Ok(Self::fetch(ctx, state).await?.is_some())
    }

    fn import_state(&self, id: &str) -> Result<JobState, ProviderError> {
        let (job, namespace) = parse_job_id(id);
        Ok(JobState {
            id: job.to_string(),
            name: job.to_string(),
            namespace: namespace.to_string(),
            ..Default::default()
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::test_context;
    use crate::types::AttributeChange;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config() -> JobState {
        JobState {
            name: "web".into(),
            datacenters: vec!["dc1".into()],
            group: vec![GroupState {
                name: "frontend".into(),
                task: vec![TaskState {
                    name: "nginx".into(),
                    driver: "docker".into(),
                    config: json!({"image": "nginx:1.25"}).as_object().cloned().unwrap(),
                    ..Default::default()
                }],
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    /// The job as Nomad returns it after canonicalisation.
    fn canonical_job() -> Value {
        let ns = |s: i64| s * 1_000_000_000;
        json!({
            "ID": "web",
            "Name": "web",
            "Namespace": "default",
            "Region": "global",
            "Type": "service",
            "Priority": 50,
            "Datacenters": ["dc1"],
            "NodePool": "default",
            "Update": {
                "Stagger": ns(30), "MaxParallel": 1, "HealthCheck": "checks",
                "MinHealthyTime": ns(10), "HealthyDeadline": ns(300),
                "ProgressDeadline": ns(600), "AutoRevert": false,
                "AutoPromote": false, "Canary": 0
            },
            "TaskGroups": [{
                "Name": "frontend",
                "Count": 1,
                "RestartPolicy": {"Attempts": 2, "Delay": ns(15), "Interval": ns(1800), "Mode": "fail", "RenderTemplates": false},
                "ReschedulePolicy": {
                    "Attempts": 0, "Interval": 0, "Delay": ns(30),
                    "DelayFunction": "exponential", "MaxDelay": ns(3600), "Unlimited": true
                },
                "Update": {
                    "Stagger": ns(30), "MaxParallel": 1, "HealthCheck": "checks",
                    "MinHealthyTime": ns(10), "HealthyDeadline": ns(300),
                    "ProgressDeadline": ns(600), "AutoRevert": false,
                    "AutoPromote": false, "Canary": 0
                },
                "Migrate": {"MaxParallel": 1, "HealthCheck": "checks", "MinHealthyTime": ns(10), "HealthyDeadline": ns(300)},
                "EphemeralDisk": {"Sticky": false, "Migrate": false, "SizeMB": 300},
                "Tasks": [{
                    "Name": "nginx",
                    "Driver": "docker",
                    "Config": {"image": "nginx:1.25"},
                    "Resources": {"CPU": 100, "Cores": 0, "MemoryMB": 300, "MemoryMaxMB": 0},
                    "RestartPolicy": {"Attempts": 2, "Delay": ns(15), "Interval": ns(1800), "Mode": "fail"},
                    "KillTimeout": ns(5),
                    "LogConfig": {"MaxFiles": 10, "MaxFileSizeMB": 10, "Disabled": false}
                }]
            }],
            "Status": "running",
            "Version": 0,
            "ModifyIndex": 12,
            "JobModifyIndex": 12
        })
    }

    #[tokio::test]
    async fn test_create_detached_normalizes_defaults() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/jobs"))
            .and(body_partial_json(json!({
                "Job": {"ID": "web", "Namespace": "default", "Datacenters": ["dc1"]},
                "PolicyOverride": false
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "EvalID": "eval-1", "JobModifyIndex": 12, "Warnings": ""
            })))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/job/web"))
            .respond_with(ResponseTemplate::new(200).set_body_json(canonical_job()))
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let state = JobResource.create(&ctx, config()).await.unwrap();

        assert_eq!(state.id, "web");
        assert_eq!(state.status, "running");
        assert_eq!(state.priority, 50);
        assert_eq!(state.region, "global");
        assert!(state.update.is_none());
        let group = &state.group[0];
        assert_eq!(group.count, Some(1));
        assert!(group.restart.is_none());
        assert!(group.reschedule.is_none());
        assert!(group.update.is_none());
        assert!(group.migrate.is_none());
        assert!(group.ephemeral_disk.is_none());
        let task = &group.task[0];
        assert!(task.resources.is_none());
        assert!(task.logs.is_none());
        assert!(task.restart.is_none());
        assert_eq!(task.kill_timeout, "5s");
    }

    #[tokio::test]
    async fn test_create_waits_for_deployment() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/v1/jobs"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "EvalID": "eval-1", "JobModifyIndex": 12
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/evaluation/eval-1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-Nomad-Index", "20")
                    .set_body_json(json!({
                        "ID": "eval-1", "Status": "complete", "DeploymentID": "dep-1"
                    })),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/deployment/dep-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ID": "dep-1", "JobID": "web", "Status": "successful"
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/v1/job/web"))
            .respond_with(ResponseTemplate::new(200).set_body_json(canonical_job()))
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let state = JobResource
            .create(
                &ctx,
                JobState {
                    detach: false,
                    ..config()
                },
            )
            .await
            .unwrap();
        assert_eq!(state.deployment_id, "dep-1");
        assert_eq!(state.deployment_status, "successful");
    }

    #[tokio::test]
    async fn test_failed_deployment_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/deployment/dep-1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "ID": "dep-1", "Status": "failed", "StatusDescription": "Failed due to progress deadline"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let err = wait_for_deployment(&ctx, "dep-1", "default", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("progress deadline"));
    }

    #[tokio::test]
    async fn test_read_stopped_job_is_gone() {
        let server = MockServer::start().await;
        let mut job = canonical_job();
        job["Stop"] = json!(true);
        job["Status"] = json!("dead");
        Mock::given(method("GET"))
            .and(path("/v1/job/web"))
            .respond_with(ResponseTemplate::new(200).set_body_json(job))
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let state = JobState {
            id: "web".into(),
            ..config()
        };
        assert!(JobResource.read(&ctx, state.clone()).await.unwrap().is_none());
        assert!(!JobResource.exists(&ctx, &state).await.unwrap());
    }

    #[tokio::test]
    async fn test_delete_purges() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .and(path("/v1/job/web"))
            .and(query_param("purge", "true"))
            .and(query_param("namespace", "apps"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"EvalID": "eval-2"})))
            .expect(1)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let state = JobState {
            purge_on_destroy: true,
            ..JobResource.import_state("web@apps").unwrap()
        };
        JobResource.delete(&ctx, state).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_skipped_without_deregister() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let state = JobState {
            id: "web".into(),
            deregister_on_destroy: false,
            ..config()
        };
        JobResource.delete(&ctx, state).await.unwrap();
    }

    #[test]
    fn test_import_id() {
        assert_eq!(parse_job_id("web@apps"), ("web", "apps"));
        assert_eq!(parse_job_id("web"), ("web", "default"));
        assert_eq!(parse_job_id("web@"), ("web@", "default"));
    }

    #[test]
    fn test_validate() {
        let mut config = config();
        config.periodic = Some(PeriodicState {
            cron: "@daily".into(),
            ..Default::default()
        });
        config.group.push(config.group[0].clone());

        let diagnostics = JobResource.validate(&config);
        assert_eq!(diagnostics.len(), 2);
        assert_eq!(diagnostics[0].attribute.as_deref(), Some("periodic"));
        assert!(diagnostics[1].summary.contains("Duplicate group"));
    }

    #[test]
    fn test_customize_plan_carries_server_values_and_clears_computed() {
        let prior = json!({
            "id": "web", "name": "web", "status": "running", "version": 3,
            "detach": true,
            "group": [{"name": "g", "count": 1, "task": [{"name": "t", "driver": "docker", "kill_timeout": "5s"}]}]
        });

        let unchanged = json!({
            "id": "web", "name": "web", "status": "running", "version": 3,
            "detach": true,
            "group": [{"name": "g", "count": null, "task": [{"name": "t", "driver": "docker", "kill_timeout": null}]}]
        });
        let mut plan = PlanResult::with_changes(
            unchanged.clone(),
            vec![AttributeChange::modified("group", prior["group"].clone(), unchanged["group"].clone())],
            false,
        );
        JobResource.customize_plan(Some(&prior), &mut plan);
        assert!(plan.changes.is_empty());
        assert_eq!(plan.planned_state["status"], "running");

        let changed = json!({
            "id": "web", "name": "web", "status": "running", "version": 3,
            "detach": true,
            "group": [{"name": "g", "count": 2, "task": [{"name": "t", "driver": "docker"}]}]
        });
        let mut plan = PlanResult::with_changes(
            changed.clone(),
            vec![AttributeChange::modified("group", prior["group"].clone(), changed["group"].clone())],
            false,
        );
        JobResource.customize_plan(Some(&prior), &mut plan);
        assert_eq!(plan.changes.len(), 1);
        assert!(plan.planned_state["status"].is_null());
        assert!(plan.planned_state["version"].is_null());
    }

    #[test]
    fn test_customize_plan_keeps_removed_restart_block() {
        let prior = json!({
            "id": "web", "status": "running",
            "group": [{
                "name": "g", "count": 1,
                "restart": {"attempts": 5, "delay": "15s", "interval": "30m0s", "mode": "fail"},
                "task": [{"name": "t", "driver": "docker"}]
            }]
        });
        let planned = json!({
            "id": "web", "status": "running",
            "group": [{"name": "g", "count": null, "restart": null, "task": [{"name": "t", "driver": "docker"}]}]
        });
        let mut plan = PlanResult::with_changes(
            planned.clone(),
            vec![AttributeChange::modified("group", prior["group"].clone(), planned["group"].clone())],
            false,
        );

        JobResource.customize_plan(Some(&prior), &mut plan);

        assert_eq!(plan.changes.len(), 1);
        let after = plan.changes[0].after.as_ref().unwrap();
        assert!(after[0]["restart"].is_null());
        assert_eq!(after[0]["count"], 1);
    }

    #[test]
    fn test_customize_plan_ignores_provider_settings() {
        let prior = json!({"id": "web", "status": "running", "detach": true, "group": []});
        let planned = json!({"id": "web", "status": "running", "detach": false, "group": []});
        let mut plan = PlanResult::with_changes(
            planned,
            vec![AttributeChange::modified("detach", json!(true), json!(false))],
            false,
        );
        JobResource.customize_plan(Some(&prior), &mut plan);
        assert_eq!(plan.planned_state["status"], "running");
    }
}
