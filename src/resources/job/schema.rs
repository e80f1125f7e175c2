//! Schema of `nomad_job`.

use crate::api::{
    DEFAULT_NAMESPACE, JOB_TYPE_BATCH, JOB_TYPE_SERVICE, JOB_TYPE_SYSBATCH, JOB_TYPE_SYSTEM,
};
use crate::resource::Timeouts;
use crate::resources::volume::constraint_block;
use crate::schema::{
    Attribute, AttributeFlags, AttributeType, Block, NestedBlock, Schema, ValueValidator,
};

pub(crate) const JOB_TYPES: [&str; 4] = [
    JOB_TYPE_SERVICE,
    JOB_TYPE_BATCH,
    JOB_TYPE_SYSTEM,
    JOB_TYPE_SYSBATCH,
];

/// Attributes Nomad sets on every registration.
pub(crate) const COMPUTED_ATTRIBUTES: [&str; 6] = [
    "status",
    "version",
    "modify_index",
    "job_modify_index",
    "deployment_id",
    "deployment_status",
];

/// Attributes that only steer the provider and never reach Nomad.
pub(crate) const PROVIDER_ATTRIBUTES: [&str; 5] = [
    "detach",
    "deregister_on_destroy",
    "purge_on_destroy",
    "policy_override",
    "timeouts",
];

fn duration() -> Attribute {
    Attribute::optional_computed_string().with_validator(ValueValidator::Duration)
}

fn affinity_block() -> NestedBlock {
    NestedBlock::list(
        Block::new()
            .with_attribute("attribute", Attribute::required_string())
            .with_attribute("operator", Attribute::optional_string().with_default("="))
            .with_attribute("value", Attribute::optional_string())
            .with_attribute("weight", Attribute::optional_int64()),
    )
}

fn spread_block() -> NestedBlock {
    NestedBlock::list(
        Block::new()
            .with_attribute("attribute", Attribute::required_string())
            .with_attribute("weight", Attribute::optional_int64())
            .with_block(
                "target",
                NestedBlock::list(
                    Block::new()
                        .with_attribute("value", Attribute::required_string())
                        .with_attribute("percent", Attribute::optional_int64()),
                ),
            ),
    )
}

fn update_block() -> NestedBlock {
    NestedBlock::single(
        Block::new()
            .with_attribute("max_parallel", Attribute::optional_computed_int64())
            .with_attribute(
                "health_check",
                Attribute::optional_computed_string().one_of(["checks", "task_states", "manual"]),
            )
            .with_attribute("min_healthy_time", duration())
            .with_attribute("healthy_deadline", duration())
            .with_attribute("progress_deadline", duration())
            .with_attribute("auto_revert", Attribute::optional_computed_bool())
            .with_attribute("auto_promote", Attribute::optional_computed_bool())
            .with_attribute("canary", Attribute::optional_computed_int64())
            .with_attribute("stagger", duration()),
    )
}

fn migrate_block() -> NestedBlock {
    NestedBlock::single(
        Block::new()
            .with_attribute("max_parallel", Attribute::optional_computed_int64())
            .with_attribute(
                "health_check",
                Attribute::optional_computed_string().one_of(["checks", "task_states"]),
            )
            .with_attribute("min_healthy_time", duration())
            .with_attribute("healthy_deadline", duration()),
    )
}

fn restart_block() -> NestedBlock {
    NestedBlock::single(
        Block::new()
            .with_attribute("attempts", Attribute::optional_computed_int64())
            .with_attribute("delay", duration())
            .with_attribute("interval", duration())
            .with_attribute(
                "mode",
                Attribute::optional_computed_string().one_of(["delay", "fail"]),
            )
            .with_attribute("render_templates", Attribute::optional_bool()),
    )
}

fn reschedule_block() -> NestedBlock {
    NestedBlock::single(
        Block::new()
            .with_attribute("attempts", Attribute::optional_computed_int64())
            .with_attribute("interval", duration())
            .with_attribute("delay", duration())
            .with_attribute(
                "delay_function",
                Attribute::optional_computed_string()
                    .one_of(["constant", "exponential", "fibonacci"]),
            )
            .with_attribute("max_delay", duration())
            .with_attribute("unlimited", Attribute::optional_computed_bool()),
    )
}

fn ephemeral_disk_block() -> NestedBlock {
    NestedBlock::single(
        Block::new()
            .with_attribute("sticky", Attribute::optional_computed_bool())
            .with_attribute("migrate", Attribute::optional_computed_bool())
            .with_attribute("size_mb", Attribute::optional_computed_int64()),
    )
}

fn network_block() -> NestedBlock {
    let port = Block::new()
        .with_attribute("label", Attribute::required_string())
        .with_attribute("static", Attribute::optional_int64())
        .with_attribute("to", Attribute::optional_int64())
        .with_attribute("host_network", Attribute::optional_string());
    NestedBlock::list(
        Block::new()
            .with_attribute(
                "mode",
                Attribute::optional_string().one_of(["none", "bridge", "host"]),
            )
            .with_block("port", NestedBlock::list(port)),
    )
}

fn service_block() -> NestedBlock {
    let check = Block::new()
        .with_attribute("name", Attribute::optional_string())
        .with_attribute(
            "type",
            Attribute::required_string().one_of(["http", "tcp", "grpc", "script"]),
        )
        .with_attribute("path", Attribute::optional_string())
        .with_attribute("protocol", Attribute::optional_string())
        .with_attribute("port", Attribute::optional_string())
        .with_attribute("interval", Attribute::required_string().with_validator(ValueValidator::Duration))
        .with_attribute("timeout", Attribute::required_string().with_validator(ValueValidator::Duration));
    NestedBlock::list(
        Block::new()
            .with_attribute("name", Attribute::optional_computed_string())
            .with_attribute("port", Attribute::optional_string())
            .with_attribute(
                "provider",
                Attribute::optional_string()
                    .with_default("consul")
                    .one_of(["consul", "nomad"]),
            )
            .with_attribute("tags", Attribute::string_list(AttributeFlags::optional()))
            .with_block("check", NestedBlock::list(check)),
    )
}

fn volume_block() -> NestedBlock {
    NestedBlock::list(
        Block::new()
            .with_attribute("name", Attribute::required_string())
            .with_attribute(
                "type",
                Attribute::optional_string().with_default("host").one_of(["host", "csi"]),
            )
            .with_attribute("source", Attribute::required_string())
            .with_attribute("read_only", Attribute::optional_bool())
            .with_attribute("access_mode", Attribute::optional_string())
            .with_attribute("attachment_mode", Attribute::optional_string())
            .with_attribute("per_alloc", Attribute::optional_bool()),
    )
}

fn task_block() -> NestedBlock {
    let resources = Block::new()
        .with_attribute("cpu", Attribute::optional_computed_int64())
        .with_attribute("cores", Attribute::optional_int64())
        .with_attribute("memory", Attribute::optional_computed_int64())
        .with_attribute("memory_max", Attribute::optional_int64());
    let logs = Block::new()
        .with_attribute("max_files", Attribute::optional_computed_int64())
        .with_attribute("max_file_size_mb", Attribute::optional_computed_int64())
        .with_attribute("disabled", Attribute::optional_computed_bool());
    let artifact = Block::new()
        .with_attribute("source", Attribute::required_string())
        .with_attribute("destination", Attribute::optional_computed_string())
        .with_attribute(
            "mode",
            Attribute::optional_computed_string().one_of(["any", "file", "dir"]),
        )
        .with_attribute("options", Attribute::string_map(AttributeFlags::optional()));
    let template = Block::new()
        .with_attribute("data", Attribute::optional_string())
        .with_attribute("source", Attribute::optional_string())
        .with_attribute("destination", Attribute::required_string())
        .with_attribute(
            "change_mode",
            Attribute::optional_string()
                .with_default("restart")
                .one_of(["noop", "restart", "signal", "script"]),
        )
        .with_attribute("change_signal", Attribute::optional_string())
        .with_attribute("env", Attribute::optional_bool())
        .with_attribute("perms", Attribute::optional_string().with_default("0644"))
        .with_attribute("left_delimiter", Attribute::optional_string().with_default("{{"))
        .with_attribute("right_delimiter", Attribute::optional_string().with_default("}}"))
        .with_attribute("splay", Attribute::optional_string().with_default("5s"));
    let volume_mount = Block::new()
        .with_attribute("volume", Attribute::required_string())
        .with_attribute("destination", Attribute::required_string())
        .with_attribute("read_only", Attribute::optional_bool());
    let lifecycle = Block::new()
        .with_attribute(
            "hook",
            Attribute::required_string().one_of(["prestart", "poststart", "poststop"]),
        )
        .with_attribute("sidecar", Attribute::optional_bool());

    NestedBlock::list(
        Block::new()
            .with_attribute("name", Attribute::required_string())
            .with_attribute("driver", Attribute::required_string())
            .with_attribute("user", Attribute::optional_string())
            .with_attribute("leader", Attribute::optional_bool())
            .with_attribute(
                "config",
                Attribute::new(AttributeType::Dynamic, AttributeFlags::optional())
                    .with_description("Driver configuration."),
            )
            .with_attribute("env", Attribute::string_map(AttributeFlags::optional()))
            .with_attribute("meta", Attribute::string_map(AttributeFlags::optional()))
            .with_block("constraint", constraint_block())
            .with_block("affinity", affinity_block())
            .with_block("service", service_block())
            .with_block("resources", NestedBlock::single(resources))
            .with_block("restart", restart_block())
            .with_attribute("kill_timeout", duration())
            .with_attribute("kill_signal", Attribute::optional_computed_string())
            .with_block("logs", NestedBlock::single(logs))
            .with_block("artifact", NestedBlock::list(artifact))
            .with_block("template", NestedBlock::list(template))
            .with_block("volume_mount", NestedBlock::list(volume_mount))
            .with_block("lifecycle", NestedBlock::single(lifecycle)),
    )
    .with_min_items(1)
}

fn group_block() -> NestedBlock {
    NestedBlock::list(
        Block::new()
            .with_attribute("name", Attribute::required_string())
            .with_attribute(
                "count",
                Attribute::optional_computed_int64().with_validator(ValueValidator::AtLeast(0)),
            )
            .with_attribute("meta", Attribute::string_map(AttributeFlags::optional()))
            .with_block("constraint", constraint_block())
            .with_block("affinity", affinity_block())
            .with_block("spread", spread_block())
            .with_block("restart", restart_block())
            .with_block("reschedule", reschedule_block())
            .with_block("update", update_block())
            .with_block("migrate", migrate_block())
            .with_block("ephemeral_disk", ephemeral_disk_block())
            .with_block("network", network_block())
            .with_block("service", service_block())
            .with_block("volume", volume_block())
            .with_attribute("shutdown_delay", duration())
            .with_block("task", task_block()),
    )
    .with_min_items(1)
}

pub(crate) fn job_schema() -> Schema {
    Schema::v0()
        .with_description("Registers a job with Nomad and keeps its specification in sync.")
        .with_id()
        .with_attribute(
            "name",
            Attribute::required_string()
                .with_force_new()
                .with_description("Job ID and name."),
        )
        .with_attribute(
            "namespace",
            Attribute::optional_string()
                .with_default(DEFAULT_NAMESPACE)
                .with_force_new(),
        )
        .with_attribute("region", Attribute::optional_computed_string())
        .with_attribute(
            "type",
            Attribute::optional_string()
                .with_default(JOB_TYPE_SERVICE)
                .with_force_new()
                .one_of(JOB_TYPES),
        )
        .with_attribute(
            "priority",
            Attribute::optional_computed_int64().with_validator(ValueValidator::AtLeast(1)),
        )
        .with_attribute("all_at_once", Attribute::optional_bool())
        .with_attribute(
            "datacenters",
            Attribute::string_list(AttributeFlags::optional_computed()),
        )
        .with_attribute("node_pool", Attribute::optional_computed_string())
        .with_attribute("meta", Attribute::string_map(AttributeFlags::optional()))
        .with_block("constraint", constraint_block())
        .with_block("affinity", affinity_block())
        .with_block("spread", spread_block())
        .with_block("update", update_block())
        .with_block(
            "periodic",
            NestedBlock::single(
                Block::new()
                    .with_attribute("cron", Attribute::required_string())
                    .with_attribute("prohibit_overlap", Attribute::optional_computed_bool())
                    .with_attribute("time_zone", Attribute::optional_computed_string())
                    .with_attribute("enabled", Attribute::optional_computed_bool()),
            ),
        )
        .with_block(
            "parameterized",
            NestedBlock::single(
                Block::new()
                    .with_attribute(
                        "payload",
                        Attribute::optional_string()
                            .with_default("optional")
                            .one_of(["optional", "required", "forbidden"]),
                    )
                    .with_attribute("meta_required", Attribute::string_list(AttributeFlags::optional()))
                    .with_attribute("meta_optional", Attribute::string_list(AttributeFlags::optional())),
            ),
        )
        .with_block("group", group_block())
        .with_attribute(
            "detach",
            Attribute::optional_bool()
                .with_default(true)
                .with_description("Return after registration instead of waiting for the deployment."),
        )
        .with_attribute(
            "deregister_on_destroy",
            Attribute::optional_bool().with_default(true),
        )
        .with_attribute(
            "purge_on_destroy",
            Attribute::optional_bool()
                .with_default(false)
                .with_description("Purge the job from Nomad's state when deregistering it."),
        )
        .with_attribute("policy_override", Attribute::optional_bool().with_default(false))
        .with_attribute("status", Attribute::computed_string())
        .with_attribute("version", Attribute::computed_int64())
        .with_attribute("modify_index", Attribute::computed_int64())
        .with_attribute("job_modify_index", Attribute::computed_int64())
        .with_attribute("deployment_id", Attribute::computed_string())
        .with_attribute("deployment_status", Attribute::computed_string())
        .with_block("timeouts", Timeouts::block(&["create", "update", "delete"]))
}
