//! Typed client for the Nomad HTTP API.
//!
//! The client is intentionally thin: one method per endpoint, JSON bodies
//! mapped onto `serde` structs that mirror Nomad's `api` package. Endpoint
//! groups are reached through borrowed handles (`client.namespaces()`,
//! `client.acl_policies()`, ...).
//!
//! A 404 response is reported as [`ApiError::NotFound`] rather than as a
//! status error, so callers never need to inspect error text to tell absence
//! from failure.

// Field names mirror Nomad's API structs and are documented there.
#![allow(missing_docs)]

mod acl;
mod allocations;
mod deployments;
mod jobs;
mod keyring;
mod namespaces;
mod node_pools;
mod nodes;
mod operator;
mod plugins;
mod quotas;
mod regions;
mod scaling;
mod sentinel;
mod variables;
mod volumes;

pub use acl::*;
pub use allocations::*;
pub use deployments::*;
pub use jobs::*;
pub use keyring::*;
pub use namespaces::*;
pub use node_pools::*;
pub use nodes::*;
pub use operator::*;
pub use plugins::*;
pub use quotas::*;
pub use scaling::*;
pub use sentinel::*;
pub use variables::*;
pub use volumes::*;

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Certificate, Client, Identity, StatusCode};
pub use reqwest::Method;
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;
use tracing::{debug, warn};
use url::Url;

/// Header carrying the ACL token.
pub const TOKEN_HEADER: &str = "X-Nomad-Token";

/// Response header carrying the Raft index of the returned data.
pub const INDEX_HEADER: &str = "X-Nomad-Index";

/// Header carrying CSI secrets for volume create/delete.
pub const CSI_SECRETS_HEADER: &str = "X-Nomad-CSI-Secrets";

/// The namespace Nomad uses when none is given.
pub const DEFAULT_NAMESPACE: &str = "default";

/// Maximum length of a response body included in logs.
const MAX_LOG_BODY_LENGTH: usize = 200;

/// Errors returned by [`NomadClient`].
#[derive(Debug, Error)]
pub enum ApiError {
    /// The server answered 404 for the given path.
    #[error("not found: {0}")]
    NotFound(String),

    /// The server answered with a non-success status.
    #[error("Unexpected response code: {status} ({message})")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body, as Nomad returns a plain-text reason.
        message: String,
    },

    /// The request could not be sent or the response not read.
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The response body did not match the expected shape.
    #[error("failed to decode response: {0}")]
    Decode(#[from] serde_json::Error),

    /// The client configuration is unusable.
    #[error("invalid client configuration: {0}")]
    InvalidConfig(String),
}

impl ApiError {
    /// Whether the server rejected the request with the given status.
    pub fn has_status(&self, code: u16) -> bool {
        matches!(self, Self::Status { status, .. } if *status == code)
    }

    /// Whether the server's message contains `needle`.
    pub fn message_contains(&self, needle: &str) -> bool {
        matches!(self, Self::Status { message, .. } if message.contains(needle))
    }
}

/// TLS material for talking to Nomad over HTTPS.
#[derive(Debug, Clone, Default)]
pub struct TlsConfig {
    /// PEM-encoded CA bundle.
    pub ca_pem: Option<String>,
    /// PEM-encoded client certificate.
    pub cert_pem: Option<String>,
    /// PEM-encoded client key.
    pub key_pem: Option<String>,
    /// Disable certificate verification.
    pub insecure: bool,
}

/// Everything needed to construct a [`NomadClient`].
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the Nomad agent, e.g. `http://127.0.0.1:4646`.
    pub address: String,
    /// Region sent with every request when set.
    pub region: Option<String>,
    /// ACL token.
    pub token: Option<String>,
    /// HTTP basic auth as `(user, password)`.
    pub http_auth: Option<(String, Option<String>)>,
    /// Extra headers sent with every request.
    pub headers: Vec<(String, String)>,
    /// TLS settings.
    pub tls: TlsConfig,
    /// Per-request timeout; blocking queries add their wait time on top.
    pub timeout: Option<Duration>,
}

impl ClientConfig {
    /// Configuration for an agent at `address` with no auth.
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            region: None,
            token: None,
            http_auth: None,
            headers: Vec::new(),
            tls: TlsConfig::default(),
            timeout: None,
        }
    }
}

/// Per-request options, the union of Nomad's query and write options.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    /// Target namespace.
    pub namespace: Option<String>,
    /// Target region, overriding the client default.
    pub region: Option<String>,
    /// List prefix filter.
    pub prefix: Option<String>,
    /// go-bexpr filter expression.
    pub filter: Option<String>,
    /// Blocking query: return once the index exceeds this value.
    pub wait_index: Option<u64>,
    /// Blocking query: maximum wait.
    pub wait_time: Option<Duration>,
    /// Additional query parameters.
    pub params: Vec<(String, String)>,
    /// Additional headers.
    pub headers: Vec<(String, String)>,
}

impl QueryOptions {
    /// Empty options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Options scoped to `namespace`; an empty string means "unset".
    pub fn namespace(namespace: &str) -> Self {
        Self::default().with_namespace(namespace)
    }

    /// Set the namespace unless it is empty.
    pub fn with_namespace(mut self, namespace: &str) -> Self {
        if !namespace.is_empty() {
            self.namespace = Some(namespace.to_string());
        }
        self
    }

    /// Set the prefix unless it is empty.
    pub fn with_prefix(mut self, prefix: &str) -> Self {
        if !prefix.is_empty() {
            self.prefix = Some(prefix.to_string());
        }
        self
    }

    /// Set the filter unless it is empty.
    pub fn with_filter(mut self, filter: &str) -> Self {
        if !filter.is_empty() {
            self.filter = Some(filter.to_string());
        }
        self
    }

    /// Turn the request into a blocking query.
    pub fn with_wait(mut self, index: u64, wait: Duration) -> Self {
        self.wait_index = Some(index);
        self.wait_time = Some(wait);
        self
    }

    /// Add a query parameter.
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.push((key.into(), value.into()));
        self
    }

    /// Add a header.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Metadata returned alongside query results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueryMeta {
    /// Value of the `X-Nomad-Index` header, 0 when absent.
    pub last_index: u64,
}

/// Nomad HTTP API client.
#[derive(Debug, Clone)]
pub struct NomadClient {
    http: Client,
    base: Url,
    region: Option<String>,
    basic_auth: Option<(String, Option<String>)>,
}

impl NomadClient {
    /// Build a client from its configuration.
    pub fn new(config: ClientConfig) -> Result<Self, ApiError> {
        let base = Url::parse(&config.address).map_err(|e| {
            ApiError::InvalidConfig(format!("invalid address {:?}: {}", config.address, e))
        })?;

        let mut headers = HeaderMap::new();
        if let Some(token) = config.token.as_deref().filter(|t| !t.is_empty()) {
            let mut value = HeaderValue::from_str(token)
                .map_err(|_| ApiError::InvalidConfig("ACL token is not a valid header".into()))?;
            value.set_sensitive(true);
            headers.insert(TOKEN_HEADER, value);
        }
        for (name, value) in &config.headers {
            let name = HeaderName::from_bytes(name.as_bytes())
                .map_err(|_| ApiError::InvalidConfig(format!("invalid header name {:?}", name)))?;
            let value = HeaderValue::from_str(value).map_err(|_| {
                ApiError::InvalidConfig(format!("invalid value for header {:?}", name))
            })?;
            headers.append(name, value);
        }

        let mut builder = Client::builder()
            .user_agent(concat!("nomad-provider/", env!("CARGO_PKG_VERSION")))
            .default_headers(headers)
            .danger_accept_invalid_certs(config.tls.insecure);

        if let Some(ca_pem) = &config.tls.ca_pem {
            for cert in Certificate::from_pem_bundle(ca_pem.as_bytes())? {
                builder = builder.add_root_certificate(cert);
            }
        }
        match (&config.tls.cert_pem, &config.tls.key_pem) {
            (Some(cert), Some(key)) => {
                let pem = format!("{}\n{}", cert, key);
                builder = builder.identity(Identity::from_pem(pem.as_bytes())?);
            },
            (None, None) => {},
            _ => {
                return Err(ApiError::InvalidConfig(
                    "client certificate and key must be provided together".into(),
                ))
            },
        }
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            http: builder.build()?,
            base,
            region: config.region.filter(|r| !r.is_empty()),
            basic_auth: config.http_auth,
        })
    }

    /// Base address of the agent.
    pub fn address(&self) -> &str {
        self.base.as_str()
    }

    fn url(&self, path: &str) -> Url {
        let mut url = self.base.clone();
        let prefix = self.base.path().trim_end_matches('/');
        url.set_path(&format!("{}{}", prefix, path));
        url
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        opts: &QueryOptions,
    ) -> Result<(String, QueryMeta), ApiError> {
        let url = self.url(path);
        debug!(method = %method, url = %url, "Nomad API request");

        let mut request = self.http.request(method, url);

        let mut query: Vec<(&str, String)> = Vec::new();
        if let Some(region) = opts.region.as_ref().or(self.region.as_ref()) {
            query.push(("region", region.clone()));
        }
        if let Some(namespace) = &opts.namespace {
            query.push(("namespace", namespace.clone()));
        }
        if let Some(prefix) = &opts.prefix {
            query.push(("prefix", prefix.clone()));
        }
        if let Some(filter) = &opts.filter {
            query.push(("filter", filter.clone()));
        }
        if let Some(index) = opts.wait_index {
            query.push(("index", index.to_string()));
        }
        if let Some(wait) = opts.wait_time {
            query.push(("wait", format!("{}ms", wait.as_millis())));
        }
        for (key, value) in &opts.params {
            query.push((key.as_str(), value.clone()));
        }
        if !query.is_empty() {
            request = request.query(&query);
        }
        for (name, value) in &opts.headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if let Some((user, password)) = &self.basic_auth {
            request = request.basic_auth(user, password.as_ref());
        }
        if let Some(wait) = opts.wait_time {
            // Leave headroom past the server-side wait.
            request = request.timeout(wait + wait / 16 + Duration::from_secs(5));
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await?;
        let status = response.status();
        let last_index = response
            .headers()
            .get(INDEX_HEADER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok())
            .unwrap_or_default();
        let text = response.text().await?;

        if status == StatusCode::NOT_FOUND {
            return Err(ApiError::NotFound(path.to_string()));
        }
        if !status.is_success() {
            warn!(status = status.as_u16(), body = %truncate_for_log(&text), "Nomad API error");
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: text.trim().to_string(),
            });
        }

        Ok((text, QueryMeta { last_index }))
    }

    /// GET `path`, returning the decoded body and query metadata.
    pub async fn query<T: DeserializeOwned>(
        &self,
        path: &str,
        opts: &QueryOptions,
    ) -> Result<(T, QueryMeta), ApiError> {
        let (text, meta) = self.send::<()>(Method::GET, path, None, opts).await?;
        Ok((decode(&text)?, meta))
    }

    /// GET `path`.
    pub async fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        opts: &QueryOptions,
    ) -> Result<T, ApiError> {
        self.query(path, opts).await.map(|(value, _)| value)
    }

    /// PUT `body` to `path`.
    pub async fn put<B, T>(&self, path: &str, body: &B, opts: &QueryOptions) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let (text, _) = self.send(Method::PUT, path, Some(body), opts).await?;
        decode(&text)
    }

    /// POST `body` to `path`.
    pub async fn post<B, T>(&self, path: &str, body: &B, opts: &QueryOptions) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let (text, _) = self.send(Method::POST, path, Some(body), opts).await?;
        decode(&text)
    }

    /// Send a write whose response body is not needed.
    pub async fn write<B: Serialize + ?Sized>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
        opts: &QueryOptions,
    ) -> Result<(), ApiError> {
        self.send(method, path, body, opts).await.map(drop)
    }

    /// DELETE `path`.
    pub async fn delete<T: DeserializeOwned>(
        &self,
        path: &str,
        opts: &QueryOptions,
    ) -> Result<T, ApiError> {
        let (text, _) = self.send::<()>(Method::DELETE, path, None, opts).await?;
        decode(&text)
    }
}

/// Decode a response body; an empty body decodes as JSON `null`.
fn decode<T: DeserializeOwned>(text: &str) -> Result<T, ApiError> {
    let text = if text.trim().is_empty() { "null" } else { text };
    Ok(serde_json::from_str(text)?)
}

fn truncate_for_log(body: &str) -> String {
    if body.len() > MAX_LOG_BODY_LENGTH {
        let mut end = MAX_LOG_BODY_LENGTH;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}... [truncated, {} bytes total]", &body[..end], body.len())
    } else {
        body.to_string()
    }
}

/// Serde helpers for Nomad's JSON conventions.
pub(crate) mod serde_helpers {
    use serde::{Deserialize, Deserializer};

    /// Treat JSON `null` as the type's default (Go encodes nil slices and
    /// maps as `null`).
    pub fn null_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
    where
        D: Deserializer<'de>,
        T: Default + Deserialize<'de>,
    {
        Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
    }

    /// Durations the ACL endpoints encode as Go duration strings on write
    /// and accept as either strings or integer nanoseconds on read.
    pub mod go_duration {
        use serde::de::Error;
        use serde::{Deserialize, Deserializer, Serializer};

        use crate::helper::{format_duration, parse_duration};

        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Nanos(i64),
            Text(String),
        }

        pub fn serialize<S: Serializer>(nanos: &i64, serializer: S) -> Result<S::Ok, S::Error> {
            if *nanos == 0 {
                serializer.serialize_str("")
            } else {
                serializer.serialize_str(&format_duration(*nanos))
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
            match Option::<Raw>::deserialize(deserializer)? {
                None => Ok(0),
                Some(Raw::Nanos(n)) => Ok(n),
                Some(Raw::Text(s)) if s.is_empty() => Ok(0),
                Some(Raw::Text(s)) => parse_duration(&s).map_err(D::Error::custom),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_keeps_base_path() {
        let client = NomadClient::new(ClientConfig::new("http://nomad.example:4646/proxy/")).unwrap();
        assert_eq!(
            client.url("/v1/jobs").as_str(),
            "http://nomad.example:4646/proxy/v1/jobs"
        );

        let client = NomadClient::new(ClientConfig::new("http://127.0.0.1:4646")).unwrap();
        assert_eq!(
            client.url("/v1/var/a/b c").as_str(),
            "http://127.0.0.1:4646/v1/var/a/b%20c"
        );
    }

    #[test]
    fn test_invalid_address() {
        let err = NomadClient::new(ClientConfig::new("not a url")).unwrap_err();
        assert!(matches!(err, ApiError::InvalidConfig(_)));
    }

    #[test]
    fn test_cert_without_key_rejected() {
        let mut config = ClientConfig::new("https://127.0.0.1:4646");
        config.tls.cert_pem = Some("-----BEGIN CERTIFICATE-----".into());
        let err = NomadClient::new(config).unwrap_err();
        assert!(matches!(err, ApiError::InvalidConfig(_)));
    }

    #[test]
    fn test_decode_empty_body() {
        let value: () = decode("").unwrap();
        assert_eq!(value, ());
        let value: Option<u64> = decode("  ").unwrap();
        assert_eq!(value, None);
    }

    #[test]
    fn test_error_helpers() {
        let err = ApiError::Status {
            status: 400,
            message: "namespace \"ops\" has non-terminal jobs".into(),
        };
        assert!(err.has_status(400));
        assert!(err.message_contains("non-terminal jobs"));
        assert!(!ApiError::NotFound("/v1/x".into()).has_status(404));
    }

    #[test]
    fn test_go_duration_accepts_both_encodings() {
        #[derive(serde::Deserialize, serde::Serialize)]
        struct Wrapper {
            #[serde(with = "serde_helpers::go_duration", default)]
            ttl: i64,
        }

        let w: Wrapper = serde_json::from_str(r#"{"ttl": "1h0m0s"}"#).unwrap();
        assert_eq!(w.ttl, 3_600_000_000_000);
        let w: Wrapper = serde_json::from_str(r#"{"ttl": 3600000000000}"#).unwrap();
        assert_eq!(w.ttl, 3_600_000_000_000);
        let w: Wrapper = serde_json::from_str(r#"{"ttl": null}"#).unwrap();
        assert_eq!(w.ttl, 0);
        assert_eq!(
            serde_json::to_string(&Wrapper { ttl: 90_000_000_000 }).unwrap(),
            r#"{"ttl":"1m30s"}"#
        );
    }

    #[test]
    fn test_truncate_for_log() {
        let long = "x".repeat(500);
        let out = truncate_for_log(&long);
        assert!(out.contains("[truncated, 500 bytes total]"));
        assert_eq!(truncate_for_log("short"), "short");
    }
}
