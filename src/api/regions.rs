//! Region listing.

use super::{ApiError, NomadClient, QueryOptions};

impl NomadClient {
    /// Names of all regions known to the cluster.
    pub async fn regions(&self) -> Result<Vec<String>, ApiError> {
        self.get::<Option<Vec<String>>>("/v1/regions", &QueryOptions::new())
            .await
            .map(Option::unwrap_or_default)
    }
}
