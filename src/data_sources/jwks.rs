//! `nomad_jwks`: the keys Nomad signs workload identities with.
//!
//! Besides the raw JSON Web Keys, RSA keys are rendered as PKIX
//! `PUBLIC KEY` PEM blocks for consumers that cannot read JWKs.

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use rsa::pkcs8::{EncodePublicKey, LineEnding};
use rsa::{BigUint, RsaPublicKey};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::computed_objects;
use crate::api::JsonWebKey;
use crate::error::{ApiResultExt, ProviderError};
use crate::resource::{DataSource, ProviderContext};
use crate::schema::{Attribute, AttributeFlags, AttributeType, Schema};

const KEY_TYPE_RSA: &str = "RSA";

/// Reads the cluster's JSON Web Key Set.
#[derive(Debug, Default, Clone, Copy)]
pub struct JwksDataSource;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct JwksState {
    pub id: String,
    pub keys: Vec<KeyState>,
    pub pem_keys: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct KeyState {
    pub key_use: String,
    pub key_type: String,
    pub key_id: String,
    pub algorithm: String,
    pub modulus: String,
    pub exponent: String,
}

fn decode_component(key: &JsonWebKey, name: &str, value: &str) -> Result<BigUint, ProviderError> {
    // Some issuers pad their base64url values.
    let bytes = URL_SAFE_NO_PAD
        .decode(value.trim_end_matches('='))
        .map_err(|e| ProviderError::Validation(format!("key {:?}: invalid {}: {}", key.kid, name, e)))?;
    Ok(BigUint::from_bytes_be(&bytes))
}

/// Render an RSA JSON Web Key as a PKIX `PUBLIC KEY` PEM block.
pub fn rsa_public_key_pem(key: &JsonWebKey) -> Result<String, ProviderError> {
    let n = decode_component(key, "modulus", &key.n)?;
    let e = decode_component(key, "exponent", &key.e)?;
    let public = RsaPublicKey::new(n, e)
        .map_err(|e| ProviderError::Validation(format!("key {:?}: {}", key.kid, e)))?;
    public
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| ProviderError::Validation(format!("key {:?}: {}", key.kid, e)))
}

#[async_trait]
impl DataSource for JwksDataSource {
    type State = JwksState;

    fn schema(&self) -> Schema {
        Schema::v0()
            .with_description("Reads the JSON Web Key Set used to sign workload identities.")
            .with_id()
            .with_attribute(
                "keys",
                computed_objects([
                    ("key_use", AttributeType::String),
                    ("key_type", AttributeType::String),
                    ("key_id", AttributeType::String),
                    ("algorithm", AttributeType::String),
                    ("modulus", AttributeType::String),
                    ("exponent", AttributeType::String),
                ]),
            )
            .with_attribute(
                "pem_keys",
                Attribute::string_list(AttributeFlags::computed())
                    .with_description("RSA keys as PEM-encoded public keys."),
            )
    }

    async fn read(&self, ctx: &ProviderContext, _config: JwksState) -> Result<JwksState, ProviderError> {
        let set = ctx.client.jwks().await.context("error reading JWKS")?;

        let mut pem_keys = Vec::new();
        for key in &set.keys {
            if key.kty == KEY_TYPE_RSA {
                pem_keys.push(rsa_public_key_pem(key)?);
            } else {
                debug!(kid = %key.kid, kty = %key.kty, "Skipping non-RSA key for PEM output");
            }
        }

        Ok(JwksState {
            id: ctx.client.address().to_string(),
            keys: set
                .keys
                .into_iter()
                .map(|key| KeyState {
                    key_use: key.key_use,
                    key_type: key.kty,
                    key_id: key.kid,
                    algorithm: key.alg,
                    modulus: key.n,
                    exponent: key.e,
                })
                .collect(),
            pem_keys,
        })
    }
}
