//! Provider block configuration.
//!
//! The provider block is decoded into [`ProviderConfig`], unset attributes
//! are filled in from the usual `NOMAD_*` environment variables, and the
//! result is turned into an [`api::ClientConfig`](crate::api::ClientConfig)
//! plus the [`RetryPolicy`] used by polling adapters.

use std::collections::HashMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::api::{ClientConfig, TlsConfig};
use crate::error::ProviderError;
use crate::helper::retry::{DEFAULT_RETRY_ATTEMPTS, DEFAULT_RETRY_INTERVAL};
use crate::helper::{parse_duration, RetryPolicy};
use crate::resource::decode;
use crate::schema::{
    Attribute, AttributeFlags, AttributeType, Block, Diagnostic, NestedBlock, Schema,
    ValueValidator,
};

/// Address used when neither the block nor `NOMAD_ADDR` sets one.
pub const DEFAULT_ADDRESS: &str = "http://127.0.0.1:4646";

/// Agent address.
pub const ENV_ADDRESS: &str = "NOMAD_ADDR";
/// Target region.
pub const ENV_REGION: &str = "NOMAD_REGION";
/// Path to the CA bundle.
pub const ENV_CA_CERT: &str = "NOMAD_CACERT";
/// Path to the client certificate.
pub const ENV_CLIENT_CERT: &str = "NOMAD_CLIENT_CERT";
/// Path to the client key.
pub const ENV_CLIENT_KEY: &str = "NOMAD_CLIENT_KEY";
/// ACL token.
pub const ENV_TOKEN: &str = "NOMAD_TOKEN";
/// Basic auth as `user:password`.
pub const ENV_HTTP_AUTH: &str = "NOMAD_HTTP_AUTH";
/// Disable TLS verification.
pub const ENV_SKIP_VERIFY: &str = "NOMAD_SKIP_VERIFY";

/// An extra header sent with every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeaderConfig {
    /// Header name.
    pub name: String,
    /// Header value.
    pub value: String,
}

/// The decoded provider block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    /// URL of the Nomad agent.
    pub address: Option<String>,
    /// Region of the target cluster.
    pub region: Option<String>,
    /// HTTP basic auth as `user:password`.
    pub http_auth: Option<String>,
    /// Path to a PEM CA bundle.
    pub ca_file: Option<String>,
    /// PEM CA bundle.
    pub ca_pem: Option<String>,
    /// Path to a PEM client certificate.
    pub cert_file: Option<String>,
    /// PEM client certificate.
    pub cert_pem: Option<String>,
    /// Path to a PEM client key.
    pub key_file: Option<String>,
    /// PEM client key.
    pub key_pem: Option<String>,
    /// Skip TLS verification.
    pub skip_verify: Option<bool>,
    /// ACL token secret ID.
    pub secret_id: Option<String>,
    /// Extra headers.
    pub headers: Vec<HeaderConfig>,
    /// Environment variables that must not be consulted.
    pub ignore_env_vars: HashMap<String, bool>,
    /// Pause between retries as a Go duration.
    pub retry_interval: Option<String>,
    /// Attempts for retried operations.
    pub retry_attempts: Option<i64>,
}

fn sensitive_string(description: &str) -> Attribute {
    Attribute::new(
        AttributeType::String,
        AttributeFlags::optional().sensitive(),
    )
    .with_description(description)
}

impl ProviderConfig {
    /// The provider block schema.
    pub fn schema() -> Schema {
        Schema::v0()
            .with_description("Connection settings for a Nomad cluster")
            .with_attribute(
                "address",
                Attribute::optional_string()
                    .with_description("URL of the root of the target Nomad agent."),
            )
            .with_attribute(
                "region",
                Attribute::optional_string().with_description("Region of the target Nomad agent."),
            )
            .with_attribute(
                "http_auth",
                sensitive_string("HTTP basic auth configuration, as user:password."),
            )
            .with_attribute(
                "ca_file",
                Attribute::optional_string()
                    .with_description("A path to a PEM-encoded certificate authority."),
            )
            .with_attribute(
                "ca_pem",
                Attribute::optional_string()
                    .with_description("PEM-encoded certificate authority."),
            )
            .with_attribute(
                "cert_file",
                Attribute::optional_string()
                    .with_description("A path to a PEM-encoded client certificate."),
            )
            .with_attribute(
                "cert_pem",
                Attribute::optional_string().with_description("PEM-encoded client certificate."),
            )
            .with_attribute(
                "key_file",
                Attribute::optional_string()
                    .with_description("A path to a PEM-encoded private key."),
            )
            .with_attribute("key_pem", sensitive_string("PEM-encoded private key."))
            .with_attribute(
                "skip_verify",
                Attribute::optional_bool().with_description("Skip TLS verification on client side."),
            )
            .with_attribute("secret_id", sensitive_string("ACL token secret for API requests."))
            .with_attribute(
                "ignore_env_vars",
                Attribute::new(
                    AttributeType::map(AttributeType::Bool),
                    AttributeFlags::optional(),
                )
                .with_description("Environment variables the provider must not read."),
            )
            .with_attribute(
                "retry_interval",
                Attribute::optional_string()
                    .with_validator(ValueValidator::Duration)
                    .with_description("Pause between retries of operations that wait on Nomad."),
            )
            .with_attribute(
                "retry_attempts",
                Attribute::optional_int64()
                    .with_validator(ValueValidator::AtLeast(1))
                    .with_description("Attempts for operations that wait on Nomad."),
            )
            .with_block(
                "headers",
                NestedBlock::list(
                    Block::new()
                        .with_attribute("name", Attribute::required_string())
                        .with_attribute("value", Attribute::required_string()),
                ),
            )
    }

    /// Decode the provider block.
    pub fn from_value(value: Value) -> Result<Self, ProviderError> {
        decode(value).map_err(|e| ProviderError::Configuration(e.to_string()))
    }

    /// Fill unset attributes from the environment through `lookup`.
    ///
    /// Variables mapped to `true` in `ignore_env_vars` are skipped, and
    /// empty values count as unset.
    pub fn merge_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let ignored = std::mem::take(&mut self.ignore_env_vars);
        let env = |name: &str| {
            if ignored.get(name).copied().unwrap_or(false) {
                None
            } else {
                lookup(name).filter(|v| !v.is_empty())
            }
        };

        fill(&mut self.address, env(ENV_ADDRESS));
        fill(&mut self.region, env(ENV_REGION));
        fill(&mut self.ca_file, env(ENV_CA_CERT));
        fill(&mut self.cert_file, env(ENV_CLIENT_CERT));
        fill(&mut self.key_file, env(ENV_CLIENT_KEY));
        fill(&mut self.secret_id, env(ENV_TOKEN));
        fill(&mut self.http_auth, env(ENV_HTTP_AUTH));
        if self.skip_verify.is_none() {
            self.skip_verify = env(ENV_SKIP_VERIFY).map(|v| parse_bool(&v));
        }

        self.ignore_env_vars = ignored;
        self
    }

    /// Checks that need more than one attribute.
    pub fn validate(&self) -> Vec<Diagnostic> {
        let mut diagnostics = Vec::new();

        let has_cert = set(&self.cert_file) || set(&self.cert_pem);
        let has_key = set(&self.key_file) || set(&self.key_pem);
        if has_cert != has_key {
            diagnostics.push(
                Diagnostic::error("Incomplete client certificate")
                    .with_detail("a client certificate and key must be configured together"),
            );
        }
        if set(&self.cert_file) && set(&self.cert_pem) {
            diagnostics.push(
                Diagnostic::error("Conflicting client certificate")
                    .with_detail("only one of cert_file and cert_pem may be set")
                    .with_attribute("cert_pem"),
            );
        }
        if set(&self.key_file) && set(&self.key_pem) {
            diagnostics.push(
                Diagnostic::error("Conflicting client key")
                    .with_detail("only one of key_file and key_pem may be set")
                    .with_attribute("key_pem"),
            );
        }
        if let Some(auth) = self.http_auth.as_deref().filter(|a| !a.is_empty()) {
            if auth.starts_with(':') {
                diagnostics.push(
                    Diagnostic::error("Invalid http_auth")
                        .with_detail("http_auth must start with a user name")
                        .with_attribute("http_auth"),
                );
            }
        }
        if let Err(e) = self.retry_policy() {
            diagnostics.push(Diagnostic::error(e.to_string()));
        }

        diagnostics
    }

    /// The retry policy for polling adapters.
    pub fn retry_policy(&self) -> Result<RetryPolicy, ProviderError> {
        let interval = match self.retry_interval.as_deref().filter(|v| !v.is_empty()) {
            None => DEFAULT_RETRY_INTERVAL,
            Some(v) => {
                let nanos = parse_duration(v).map_err(|e| {
                    ProviderError::Configuration(format!("invalid retry_interval: {}", e))
                })?;
                Duration::from_nanos(nanos.max(0) as u64)
            },
        };
        let attempts = match self.retry_attempts {
            None => DEFAULT_RETRY_ATTEMPTS,
            Some(n) if n >= 1 => u32::try_from(n).unwrap_or(u32::MAX),
            Some(n) => {
                return Err(ProviderError::Configuration(format!(
                    "retry_attempts must be at least 1, got {}",
                    n
                )))
            },
        };
        Ok(RetryPolicy::new(interval, attempts))
    }

    /// Build the API client configuration, reading PEM files from disk.
    pub fn client_config(&self) -> Result<ClientConfig, ProviderError> {
        let mut config = ClientConfig::new(
            self.address
                .clone()
                .filter(|a| !a.is_empty())
                .unwrap_or_else(|| DEFAULT_ADDRESS.to_string()),
        );
        config.region = self.region.clone().filter(|r| !r.is_empty());
        config.token = self.secret_id.clone().filter(|t| !t.is_empty());
        config.http_auth = self
            .http_auth
            .as_deref()
            .filter(|a| !a.is_empty())
            .map(|auth| match auth.split_once(':') {
                Some((user, password)) => (user.to_string(), Some(password.to_string())),
                None => (auth.to_string(), None),
            });
        config.headers = self
            .headers
            .iter()
            .map(|h| (h.name.clone(), h.value.clone()))
            .collect();
        config.tls = TlsConfig {
            ca_pem: pem(&self.ca_pem, &self.ca_file, "ca_file")?,
            cert_pem: pem(&self.cert_pem, &self.cert_file, "cert_file")?,
            key_pem: pem(&self.key_pem, &self.key_file, "key_file")?,
            insecure: self.skip_verify.unwrap_or(false),
        };
        Ok(config)
    }
}

fn set(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|v| !v.is_empty())
}

fn fill(target: &mut Option<String>, fallback: Option<String>) {
    if !set(target) {
        if let Some(value) = fallback {
            *target = Some(value);
        }
    }
}

fn parse_bool(value: &str) -> bool {
    matches!(
        value.trim().to_ascii_lowercase().as_str(),
        "1" | "t" | "true"
    )
}

/// Inline PEM wins over the file; neither yields `None`.
fn pem(
    inline: &Option<String>,
    file: &Option<String>,
    attribute: &str,
) -> Result<Option<String>, ProviderError> {
    if set(inline) {
        return Ok(inline.clone());
    }
    match file.as_deref().filter(|f| !f.is_empty()) {
        None => Ok(None),
        Some(path) => std::fs::read_to_string(path).map(Some).map_err(|e| {
            ProviderError::Configuration(format!("failed to read {} {:?}: {}", attribute, path, e))
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn env(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name| vars.get(name).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = ProviderConfig::from_value(Value::Null)
            .unwrap()
            .merge_env(env(&[]));
        let client = config.client_config().unwrap();
        assert_eq!(client.address, DEFAULT_ADDRESS);
        assert!(client.token.is_none());
        assert_eq!(config.retry_policy().unwrap(), RetryPolicy::default());
    }

    #[test]
    fn test_block_wins_over_environment() {
        let config = ProviderConfig::from_value(json!({
            "address": "https://nomad.example:4646",
            "region": null
        }))
        .unwrap()
        .merge_env(env(&[
            (ENV_ADDRESS, "http://other:4646"),
            (ENV_REGION, "eu-west"),
            (ENV_TOKEN, "s3cr3t"),
        ]));
        assert_eq!(config.address.as_deref(), Some("https://nomad.example:4646"));
        assert_eq!(config.region.as_deref(), Some("eu-west"));
        assert_eq!(config.secret_id.as_deref(), Some("s3cr3t"));
    }

    #[test]
    fn test_ignored_env_vars_are_not_read() {
        let config = ProviderConfig::from_value(json!({
            "ignore_env_vars": {"NOMAD_TOKEN": true, "NOMAD_REGION": false}
        }))
        .unwrap()
        .merge_env(env(&[(ENV_TOKEN, "s3cr3t"), (ENV_REGION, "eu-west")]));
        assert!(config.secret_id.is_none());
        assert_eq!(config.region.as_deref(), Some("eu-west"));
        assert!(config.ignore_env_vars.contains_key("NOMAD_TOKEN"));
    }

    #[test]
    fn test_skip_verify_from_environment() {
        let config = ProviderConfig::default().merge_env(env(&[(ENV_SKIP_VERIFY, "1")]));
        assert_eq!(config.skip_verify, Some(true));
        assert!(config.client_config().unwrap().tls.insecure);
    }

    #[test]
    fn test_http_auth_split() {
        let config = ProviderConfig {
            http_auth: Some("admin:hunter2".into()),
            ..Default::default()
        };
        assert_eq!(
            config.client_config().unwrap().http_auth,
            Some(("admin".to_string(), Some("hunter2".to_string())))
        );

        let config = ProviderConfig {
            http_auth: Some("admin".into()),
            ..Default::default()
        };
        assert_eq!(
            config.client_config().unwrap().http_auth,
            Some(("admin".to_string(), None))
        );
    }

    #[test]
    fn test_headers() {
        let config = ProviderConfig::from_value(json!({
            "headers": [{"name": "X-Team", "value": "ops"}]
        }))
        .unwrap();
        assert_eq!(
            config.client_config().unwrap().headers,
            vec![("X-Team".to_string(), "ops".to_string())]
        );
    }

    #[test]
    fn test_retry_policy() {
        let config = ProviderConfig {
            retry_interval: Some("250ms".into()),
            retry_attempts: Some(3),
            ..Default::default()
        };
        assert_eq!(
            config.retry_policy().unwrap(),
            RetryPolicy::new(Duration::from_millis(250), 3)
        );

        let config = ProviderConfig {
            retry_attempts: Some(0),
            ..Default::default()
        };
        assert!(config.retry_policy().is_err());
        assert!(!config.validate().is_empty());
    }

    #[test]
    fn test_missing_ca_file() {
        let config = ProviderConfig {
            ca_file: Some("/nonexistent/ca.pem".into()),
            ..Default::default()
        };
        let err = config.client_config().unwrap_err();
        assert!(err.to_string().contains("ca_file"));
    }

    #[test]
    fn test_cert_without_key() {
        let config = ProviderConfig {
            cert_pem: Some("-----BEGIN CERTIFICATE-----".into()),
            ..Default::default()
        };
        let diagnostics = config.validate();
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].summary, "Incomplete client certificate");
    }

    #[test]
    fn test_schema_marks_secrets_sensitive() {
        let schema = ProviderConfig::schema();
        for name in ["secret_id", "http_auth", "key_pem"] {
            assert!(schema.block.attributes[name].flags.sensitive, "{}", name);
        }
    }
}
