//! `nomad_regions`

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{ApiResultExt, ProviderError};
use crate::resource::{DataSource, ProviderContext};
use crate::schema::{Attribute, AttributeFlags, Schema};

/// Names of the regions the cluster federates with.
#[derive(Debug, Default, Clone, Copy)]
pub struct RegionsDataSource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RegionsState {
    pub id: String,
    pub regions: Vec<String>,
}

#[async_trait]
impl DataSource for RegionsDataSource {
    type State = RegionsState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Lists the cluster's regions.")
            .with_id()
            .with_attribute("regions", Attribute::string_list(AttributeFlags::computed()))
    }

    async fn read(&self, ctx: &ProviderContext, _config: RegionsState) -> Result<RegionsState, ProviderError> {
        let mut regions = ctx.client.regions().await.context("error listing regions")?;
        regions.sort();
        Ok(RegionsState {
            id: ctx.client.address().to_string(),
            regions,
        })
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
    async fn test_lists_regions() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/regions"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!(["us", "eu"])))
            .mount(&server)
            .await;

        let ctx = test_context(&server.uri());
        let state = RegionsDataSource.read(&ctx, RegionsState::default()).await.unwrap();
        assert_eq!(state.regions, vec!["eu", "us"]);
    }
}
