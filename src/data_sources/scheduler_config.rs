//! `nomad_scheduler_config`

use async_trait::async_trait;

use crate::error::{ApiResultExt, ProviderError};
use crate::resource::{DataSource, ProviderContext};
use crate::resources::scheduler_config::{self, SchedulerConfigState};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

/// Reads the cluster scheduler configuration.
#[derive(Debug, Default, Clone, Copy)]
pub struct SchedulerConfigDataSource;

#[async_trait]
impl DataSource for SchedulerConfigDataSource {
    type State = SchedulerConfigState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Reads the scheduler configuration.")
            .with_id()
            .with_attribute("scheduler_algorithm", Attribute::computed_string())
            .with_attribute("memory_oversubscription_enabled", Attribute::computed_bool())
            .with_attribute(
                "preemption_config",
                Attribute::new(
                    AttributeType::map(AttributeType::Bool),
                    AttributeFlags::computed(),
                ),
            )
    }

    async fn read(
        &self,
        ctx: &ProviderContext,
        _config: SchedulerConfigState,
    ) -> Result<SchedulerConfigState, ProviderError> {
        let config = ctx
            .client
            .operator()
            .scheduler_configuration()
            .await
            .context("error reading scheduler configuration")?;
        Ok(scheduler_config::flatten(config))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::test_context;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn test_reads_configuration() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/operator/scheduler/configuration"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "SchedulerConfig": {
                    "SchedulerAlgorithm": "spread",
                    "MemoryOversubscriptionEnabled": true,
                    "PreemptionConfig": {"SystemSchedulerEnabled": true}
                }
            })))
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let state = SchedulerConfigDataSource
            .read(&ctx, SchedulerConfigState::default())
            .await
            .unwrap();
        assert_eq!(state.scheduler_algorithm, "spread");
        assert!(state.memory_oversubscription_enabled);
        assert_eq!(state.preemption_config["system_scheduler_enabled"], true);
        assert_eq!(state.preemption_config["batch_scheduler_enabled"], false);
    }
}
