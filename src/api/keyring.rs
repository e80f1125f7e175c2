//! Workload identity signing keys.

use serde::{Deserialize, Serialize};

use super::serde_helpers::null_default;
use super::{ApiError, NomadClient, QueryOptions};

/// One JSON Web Key.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct JsonWebKey {
    pub kty: String,
    pub kid: String,
    #[serde(rename = "use")]
    pub key_use: String,
    pub alg: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub n: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub e: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub crv: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub x: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub y: String,
}

/// A JSON Web Key Set.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct JsonWebKeySet {
    #[serde(deserialize_with = "null_default")]
    pub keys: Vec<JsonWebKey>,
}

impl NomadClient {
    /// The public keys Nomad signs workload identities with.
    pub async fn jwks(&self) -> Result<JsonWebKeySet, ApiError> {
        self.get("/.well-known/jwks.json", &QueryOptions::new()).await
    }
}
