//! The gRPC plugin server.
//!
//! [`ProviderService`] is the Rust-typed face of the plugin protocol;
//! [`serve`] binds a local port, prints the handshake line and serves the
//! `provider.v1.Provider` service until the process is signalled.
//!
//! # Signal Handling
//!
//! On SIGTERM or SIGINT the server stops accepting connections, gives
//! in-flight requests up to [`ServeOptions::shutdown_timeout`] to finish,
//! calls the provider's `stop()` and returns.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tonic::transport::Server;
use tracing::{debug, error, info, instrument, warn};

use crate::error::ProviderError;
use crate::generated as pb;
use crate::schema::{has_errors, BlockNestingMode, Diagnostic, DiagnosticSeverity, ProviderSchema};
use crate::types::{
    from_payload, to_payload, ImportedResource, PlanResult, ProviderMetadata, HANDSHAKE_PREFIX,
    PROTOCOL_VERSION,
};

/// The provider side of the plugin protocol.
///
/// Payloads are plain JSON values; the server takes care of the protobuf
/// encoding and of turning errors into diagnostics.
#[async_trait::async_trait]
pub trait ProviderService: Send + Sync + 'static {
    /// The provider, resource and data source schemas.
    fn schema(&self) -> ProviderSchema;

    /// Type names served by this provider.
    fn metadata(&self) -> ProviderMetadata {
        let schema = self.schema();
        let mut resources: Vec<String> = schema.resources.keys().cloned().collect();
        let mut data_sources: Vec<String> = schema.data_sources.keys().cloned().collect();
        resources.sort();
        data_sources.sort();
        ProviderMetadata {
            resources,
            data_sources,
            capabilities: Default::default(),
        }
    }

    /// Validate the provider block.
    async fn validate_provider_config(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = config;
        Ok(vec![])
    }

    /// Apply the provider block.
    async fn configure(&self, config: Value) -> Result<Vec<Diagnostic>, ProviderError>;

    /// Release resources before exit.
    async fn stop(&self) -> Result<(), ProviderError> {
        Ok(())
    }

    /// Validate a resource configuration.
    async fn validate_resource_config(
        &self,
        resource_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (resource_type, config);
        Ok(vec![])
    }

    /// Upgrade state written by an older schema version.
    async fn upgrade_resource_state(
        &self,
        resource_type: &str,
        version: i64,
        state: Value,
    ) -> Result<Value, ProviderError> {
        let _ = (resource_type, version);
        Ok(state)
    }

    /// Plan a change.
    async fn plan(
        &self,
        resource_type: &str,
        prior_state: Option<Value>,
        proposed_state: Value,
        config: Value,
    ) -> Result<PlanResult, ProviderError>;

    /// Create a resource.
    async fn create(&self, resource_type: &str, planned_state: Value) -> Result<Value, ProviderError>;

    /// Refresh a resource; `None` means it no longer exists.
    async fn read(
        &self,
        resource_type: &str,
        current_state: Value,
    ) -> Result<Option<Value>, ProviderError>;

    /// Update a resource in place.
    async fn update(
        &self,
        resource_type: &str,
        prior_state: Value,
        planned_state: Value,
    ) -> Result<Value, ProviderError>;

    /// Delete a resource.
    async fn delete(&self, resource_type: &str, current_state: Value) -> Result<(), ProviderError>;

    /// Import an existing object.
    async fn import_resource(
        &self,
        resource_type: &str,
        id: &str,
    ) -> Result<Vec<ImportedResource>, ProviderError> {
        let _ = id;
        Err(ProviderError::Unimplemented(format!(
            "import is not supported for {}",
            resource_type
        )))
    }

    /// Validate a data source configuration.
    async fn validate_data_source_config(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Vec<Diagnostic>, ProviderError> {
        let _ = (data_source_type, config);
        Ok(vec![])
    }

    /// Read a data source.
    async fn read_data_source(
        &self,
        data_source_type: &str,
        config: Value,
    ) -> Result<Value, ProviderError> {
        let _ = config;
        Err(ProviderError::UnknownDataSource(data_source_type.to_string()))
    }
}

/// Adapts a [`ProviderService`] to the generated gRPC trait.
struct ProviderGrpcService<P: ProviderService> {
    provider: Arc<P>,
}

fn diagnostics_to_proto(diagnostics: Vec<Diagnostic>) -> Vec<pb::Diagnostic> {
    diagnostics
        .into_iter()
        .map(|d| pb::Diagnostic {
            severity: match d.severity {
                DiagnosticSeverity::Error => pb::diagnostic::Severity::Error as i32,
                DiagnosticSeverity::Warning => pb::diagnostic::Severity::Warning as i32,
            },
            summary: d.summary,
            detail: d.detail.unwrap_or_default(),
            attribute: d.attribute.unwrap_or_default(),
        })
        .collect()
}

fn error_to_diagnostics(err: ProviderError) -> Vec<pb::Diagnostic> {
    diagnostics_to_proto(vec![Diagnostic::error(err.to_string())])
}

/// Log and encode the outcome of a validate/configure call.
fn diagnostics_response(
    operation: &str,
    type_name: &str,
    result: Result<Vec<Diagnostic>, ProviderError>,
) -> Vec<pb::Diagnostic> {
    match result {
        Ok(diagnostics) => {
            if has_errors(&diagnostics) {
                warn!(operation, type_name, diagnostics = diagnostics.len(), "Completed with errors");
            } else {
                debug!(operation, type_name, "Completed");
            }
            diagnostics_to_proto(diagnostics)
        },
        Err(e) => {
            error!(operation, type_name, error = %e, "Failed");
            error_to_diagnostics(e)
        },
    }
}

fn schema_to_proto(schema: &crate::schema::Schema) -> pb::Schema {
    pb::Schema {
        version: schema.version as i64,
        block: Some(block_to_proto(&schema.block)),
    }
}

fn block_to_proto(block: &crate::schema::Block) -> pb::Block {
    pb::Block {
        attributes: block
            .attributes
            .iter()
            .map(|(name, attr)| pb::Attribute {
                name: name.clone(),
                r#type: serde_json::to_vec(&attr.attr_type).unwrap_or_default(),
                required: attr.flags.required,
                optional: attr.flags.optional,
                computed: attr.flags.computed,
                sensitive: attr.flags.sensitive,
                description: attr.description.clone().unwrap_or_default(),
                force_new: attr.force_new,
                default_value: to_payload(attr.default.as_ref()),
            })
            .collect(),
        block_types: block
            .blocks
            .iter()
            .map(|(name, nested)| pb::NestedBlock {
                type_name: name.clone(),
                block: Some(block_to_proto(&nested.block)),
                nesting_mode: match nested.nesting_mode {
                    BlockNestingMode::Single => pb::nested_block::NestingMode::Single as i32,
                    BlockNestingMode::List => pb::nested_block::NestingMode::List as i32,
                    BlockNestingMode::Set => pb::nested_block::NestingMode::Set as i32,
                    BlockNestingMode::Map => pb::nested_block::NestingMode::Map as i32,
                },
                min_items: nested.min_items as i32,
                max_items: nested.max_items as i32,
            })
            .collect(),
        description: block.description.clone().unwrap_or_default(),
    }
}

/// Decode a request payload; absent or invalid JSON is `null`.
fn payload(bytes: &[u8]) -> Value {
    from_payload(bytes).unwrap_or(Value::Null)
}

#[tonic::async_trait]
impl<P: ProviderService> pb::provider_server::Provider for ProviderGrpcService<P> {
    #[instrument(skip(self, _request), name = "grpc.get_metadata")]
    async fn get_metadata(
        &self,
        _request: tonic::Request<pb::GetMetadataRequest>,
    ) -> Result<tonic::Response<pb::GetMetadataResponse>, tonic::Status> {
        let metadata = self.provider.metadata();
        debug!(
            resources = metadata.resources.len(),
            data_sources = metadata.data_sources.len(),
            "GetMetadata completed"
        );
        Ok(tonic::Response::new(pb::GetMetadataResponse {
            server_capabilities: Some(pb::ServerCapabilities {
                plan_destroy: metadata.capabilities.plan_destroy,
            }),
            resources: metadata.resources,
            data_sources: metadata.data_sources,
            diagnostics: vec![],
        }))
    }

    #[instrument(skip(self, _request), name = "grpc.get_schema")]
    async fn get_schema(
        &self,
        _request: tonic::Request<pb::GetSchemaRequest>,
    ) -> Result<tonic::Response<pb::GetSchemaResponse>, tonic::Status> {
        let schema = self.provider.schema();
        debug!(
            resources = schema.resources.len(),
            data_sources = schema.data_sources.len(),
            "GetSchema completed"
        );
        Ok(tonic::Response::new(pb::GetSchemaResponse {
            provider: Some(schema_to_proto(&schema.provider)),
            resources: schema
                .resources
                .iter()
                .map(|(k, v)| (k.clone(), schema_to_proto(v)))
                .collect(),
            data_sources: schema
                .data_sources
                .iter()
                .map(|(k, v)| (k.clone(), schema_to_proto(v)))
                .collect(),
            diagnostics: vec![],
        }))
    }

    #[instrument(skip(self, request), name = "grpc.validate_provider_config")]
    async fn validate_provider_config(
        &self,
        request: tonic::Request<pb::ValidateProviderConfigRequest>,
    ) -> Result<tonic::Response<pb::ValidateProviderConfigResponse>, tonic::Status> {
        let req = request.into_inner();
        let result = self
            .provider
            .validate_provider_config(payload(&req.config))
            .await;
        Ok(tonic::Response::new(pb::ValidateProviderConfigResponse {
            diagnostics: diagnostics_response("ValidateProviderConfig", "provider", result),
        }))
    }

    #[instrument(skip(self, request), name = "grpc.configure")]
    async fn configure(
        &self,
        request: tonic::Request<pb::ConfigureRequest>,
    ) -> Result<tonic::Response<pb::ConfigureResponse>, tonic::Status> {
        let req = request.into_inner();
        let result = self.provider.configure(payload(&req.config)).await;
        Ok(tonic::Response::new(pb::ConfigureResponse {
            diagnostics: diagnostics_response("Configure", "provider", result),
        }))
    }

    #[instrument(skip(self, _request), name = "grpc.stop")]
    async fn stop(
        &self,
        _request: tonic::Request<pb::StopRequest>,
    ) -> Result<tonic::Response<pb::StopResponse>, tonic::Status> {
        info!("Stop called");
        let error = match self.provider.stop().await {
            Ok(()) => String::new(),
            Err(e) => {
                error!(error = %e, "Stop failed");
                e.to_string()
            },
        };
        Ok(tonic::Response::new(pb::StopResponse { error }))
    }

    #[instrument(skip(self, request), fields(resource_type), name = "grpc.validate_resource_config")]
    async fn validate_resource_config(
        &self,
        request: tonic::Request<pb::ValidateResourceConfigRequest>,
    ) -> Result<tonic::Response<pb::ValidateResourceConfigResponse>, tonic::Status> {
        let req = request.into_inner();
        tracing::Span::current().record("resource_type", req.resource_type.as_str());
        let result = self
            .provider
            .validate_resource_config(&req.resource_type, payload(&req.config))
            .await;
        Ok(tonic::Response::new(pb::ValidateResourceConfigResponse {
            diagnostics: diagnostics_response("ValidateResourceConfig", &req.resource_type, result),
        }))
    }

    #[instrument(skip(self, request), name = "grpc.upgrade_resource_state")]
    async fn upgrade_resource_state(
        &self,
        request: tonic::Request<pb::UpgradeResourceStateRequest>,
    ) -> Result<tonic::Response<pb::UpgradeResourceStateResponse>, tonic::Status> {
        let req = request.into_inner();
        match self
            .provider
            .upgrade_resource_state(&req.resource_type, req.version, payload(&req.raw_state))
            .await
        {
            Ok(upgraded) => Ok(tonic::Response::new(pb::UpgradeResourceStateResponse {
                upgraded_state: to_payload(Some(&upgraded)),
                diagnostics: vec![],
            })),
            Err(e) => {
                error!(resource_type = %req.resource_type, version = req.version, error = %e, "UpgradeResourceState failed");
                Ok(tonic::Response::new(pb::UpgradeResourceStateResponse {
                    upgraded_state: vec![],
                    diagnostics: error_to_diagnostics(e),
                }))
            },
        }
    }

    #[instrument(skip(self, request), name = "grpc.plan")]
    async fn plan(
        &self,
        request: tonic::Request<pb::PlanRequest>,
    ) -> Result<tonic::Response<pb::PlanResponse>, tonic::Status> {
        let req = request.into_inner();
        let prior_state = from_payload(&req.prior_state).filter(|v| !v.is_null());
        debug!(resource_type = %req.resource_type, is_create = prior_state.is_none(), "Plan called");

        match self
            .provider
            .plan(
                &req.resource_type,
                prior_state,
                payload(&req.proposed_state),
                payload(&req.config),
            )
            .await
        {
            Ok(result) => {
                info!(
                    resource_type = %req.resource_type,
                    changes = result.changes.len(),
                    requires_replace = result.requires_replace,
                    "Plan completed"
                );
                Ok(tonic::Response::new(pb::PlanResponse {
                    planned_state: to_payload(Some(&result.planned_state)),
                    changes: result.changes.into_iter().map(Into::into).collect(),
                    requires_replace: result.requires_replace,
                    diagnostics: vec![],
                }))
            },
            Err(e) => {
                error!(resource_type = %req.resource_type, error = %e, "Plan failed");
                Ok(tonic::Response::new(pb::PlanResponse {
                    planned_state: vec![],
                    changes: vec![],
                    requires_replace: false,
                    diagnostics: error_to_diagnostics(e),
                }))
            },
        }
    }

    #[instrument(skip(self, request), name = "grpc.create")]
    async fn create(
        &self,
        request: tonic::Request<pb::CreateRequest>,
    ) -> Result<tonic::Response<pb::CreateResponse>, tonic::Status> {
        let req = request.into_inner();
        info!(resource_type = %req.resource_type, "Create called");

        match self
            .provider
            .create(&req.resource_type, payload(&req.planned_state))
            .await
        {
            Ok(state) => Ok(tonic::Response::new(pb::CreateResponse {
                state: to_payload(Some(&state)),
                diagnostics: vec![],
            })),
            Err(e) => {
                error!(resource_type = %req.resource_type, error = %e, "Create failed");
                Ok(tonic::Response::new(pb::CreateResponse {
                    state: vec![],
                    diagnostics: error_to_diagnostics(e),
                }))
            },
        }
    }

    #[instrument(skip(self, request), name = "grpc.read")]
    async fn read(
        &self,
        request: tonic::Request<pb::ReadRequest>,
    ) -> Result<tonic::Response<pb::ReadResponse>, tonic::Status> {
        let req = request.into_inner();
        debug!(resource_type = %req.resource_type, "Read called");

        match self
            .provider
            .read(&req.resource_type, payload(&req.current_state))
            .await
        {
            Ok(Some(state)) => Ok(tonic::Response::new(pb::ReadResponse {
                state: to_payload(Some(&state)),
                diagnostics: vec![],
            })),
            Ok(None) => {
                info!(resource_type = %req.resource_type, "Resource is gone, removing from state");
                Ok(tonic::Response::new(pb::ReadResponse {
                    state: to_payload(Some(&Value::Null)),
                    diagnostics: vec![],
                }))
            },
            Err(e) => {
                error!(resource_type = %req.resource_type, error = %e, "Read failed");
                Ok(tonic::Response::new(pb::ReadResponse {
                    state: vec![],
                    diagnostics: error_to_diagnostics(e),
                }))
            },
        }
    }

    #[instrument(skip(self, request), name = "grpc.update")]
    async fn update(
        &self,
        request: tonic::Request<pb::UpdateRequest>,
    ) -> Result<tonic::Response<pb::UpdateResponse>, tonic::Status> {
        let req = request.into_inner();
        info!(resource_type = %req.resource_type, "Update called");

        match self
            .provider
            .update(
                &req.resource_type,
                payload(&req.prior_state),
                payload(&req.planned_state),
            )
            .await
        {
            Ok(state) => Ok(tonic::Response::new(pb::UpdateResponse {
                state: to_payload(Some(&state)),
                diagnostics: vec![],
            })),
            Err(e) => {
                error!(resource_type = %req.resource_type, error = %e, "Update failed");
                Ok(tonic::Response::new(pb::UpdateResponse {
                    state: vec![],
                    diagnostics: error_to_diagnostics(e),
                }))
            },
        }
    }

    #[instrument(skip(self, request), name = "grpc.delete")]
    async fn delete(
        &self,
        request: tonic::Request<pb::DeleteRequest>,
    ) -> Result<tonic::Response<pb::DeleteResponse>, tonic::Status> {
        let req = request.into_inner();
        info!(resource_type = %req.resource_type, "Delete called");

        let diagnostics = match self
            .provider
            .delete(&req.resource_type, payload(&req.current_state))
            .await
        {
            Ok(()) => vec![],
            Err(e) => {
                error!(resource_type = %req.resource_type, error = %e, "Delete failed");
                error_to_diagnostics(e)
            },
        };
        Ok(tonic::Response::new(pb::DeleteResponse { diagnostics }))
    }

    #[instrument(skip(self, request), name = "grpc.import_resource_state")]
    async fn import_resource_state(
        &self,
        request: tonic::Request<pb::ImportResourceStateRequest>,
    ) -> Result<tonic::Response<pb::ImportResourceStateResponse>, tonic::Status> {
        let req = request.into_inner();
        info!(resource_type = %req.resource_type, id = %req.id, "ImportResourceState called");

        match self
            .provider
            .import_resource(&req.resource_type, &req.id)
            .await
        {
            Ok(imported) => Ok(tonic::Response::new(pb::ImportResourceStateResponse {
                imported: imported
                    .into_iter()
                    .map(|r| pb::ImportedResource {
                        resource_type: r.resource_type,
                        state: to_payload(Some(&r.state)),
                    })
                    .collect(),
                diagnostics: vec![],
            })),
            Err(e) => {
                error!(resource_type = %req.resource_type, id = %req.id, error = %e, "ImportResourceState failed");
                Ok(tonic::Response::new(pb::ImportResourceStateResponse {
                    imported: vec![],
                    diagnostics: error_to_diagnostics(e),
                }))
            },
        }
    }

    #[instrument(skip(self, request), name = "grpc.validate_data_source_config")]
    async fn validate_data_source_config(
        &self,
        request: tonic::Request<pb::ValidateDataSourceConfigRequest>,
    ) -> Result<tonic::Response<pb::ValidateDataSourceConfigResponse>, tonic::Status> {
        let req = request.into_inner();
        let result = self
            .provider
            .validate_data_source_config(&req.data_source_type, payload(&req.config))
            .await;
        Ok(tonic::Response::new(pb::ValidateDataSourceConfigResponse {
            diagnostics: diagnostics_response(
                "ValidateDataSourceConfig",
                &req.data_source_type,
                result,
            ),
        }))
    }

    #[instrument(skip(self, request), name = "grpc.read_data_source")]
    async fn read_data_source(
        &self,
        request: tonic::Request<pb::ReadDataSourceRequest>,
    ) -> Result<tonic::Response<pb::ReadDataSourceResponse>, tonic::Status> {
        let req = request.into_inner();
        debug!(data_source_type = %req.data_source_type, "ReadDataSource called");

        match self
            .provider
            .read_data_source(&req.data_source_type, payload(&req.config))
            .await
        {
            Ok(state) => Ok(tonic::Response::new(pb::ReadDataSourceResponse {
                state: to_payload(Some(&state)),
                diagnostics: vec![],
            })),
            Err(e) => {
                error!(data_source_type = %req.data_source_type, error = %e, "ReadDataSource failed");
                Ok(tonic::Response::new(pb::ReadDataSourceResponse {
                    state: vec![],
                    diagnostics: error_to_diagnostics(e),
                }))
            },
        }
    }
}

/// Options for the plugin server.
#[derive(Debug, Clone)]
pub struct ServeOptions {
    /// How long in-flight requests may run after a shutdown signal.
    /// Default: 30 seconds.
    pub shutdown_timeout: Duration,
}

impl Default for ServeOptions {
    fn default() -> Self {
        Self {
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl ServeOptions {
    /// Default options.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the shutdown timeout.
    pub fn with_shutdown_timeout(mut self, timeout: Duration) -> Self {
        self.shutdown_timeout = timeout;
        self
    }
}

/// Resolve once SIGTERM or SIGINT (CTRL+C on Windows) arrives.
///
/// If the handlers cannot be installed the future never resolves and the
/// host is expected to kill the process.
async fn wait_for_shutdown_signal() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let (mut sigterm, mut sigint) =
            match (signal(SignalKind::terminate()), signal(SignalKind::interrupt())) {
                (Ok(term), Ok(int)) => (term, int),
                (Err(e), _) | (_, Err(e)) => {
                    error!(error = %e, "Failed to install signal handlers");
                    return std::future::pending::<()>().await;
                },
            };

        tokio::select! {
            _ = sigterm.recv() => info!("Received SIGTERM, shutting down"),
            _ = sigint.recv() => info!("Received SIGINT, shutting down"),
        }
    }

    #[cfg(windows)]
    {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install CTRL+C handler");
            return std::future::pending::<()>().await;
        }
        info!("Received CTRL+C, shutting down");
    }

    #[cfg(not(any(unix, windows)))]
    {
        std::future::pending::<()>().await;
    }
}

/// Serve a provider on an ephemeral localhost port.
///
/// Prints `NOMAD_PROVIDER|<version>|<address>` to stdout once the port is
/// bound and runs until a shutdown signal.
pub async fn serve<P: ProviderService>(provider: P) -> Result<(), Box<dyn std::error::Error>> {
    serve_with_options(provider, ServeOptions::default()).await
}

/// [`serve`] with custom options.
pub async fn serve_with_options<P: ProviderService>(
    provider: P,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    serve_on_listener(provider, listener, options).await
}

/// Serve a provider on a fixed address.
pub async fn serve_on<P: ProviderService>(
    provider: P,
    addr: SocketAddr,
) -> Result<(), Box<dyn std::error::Error>> {
    let listener = TcpListener::bind(addr).await?;
    serve_on_listener(provider, listener, ServeOptions::default()).await
}

async fn serve_on_listener<P: ProviderService>(
    provider: P,
    listener: TcpListener,
    options: ServeOptions,
) -> Result<(), Box<dyn std::error::Error>> {
    let addr = listener.local_addr()?;
    println!("{}|{}|{}", HANDSHAKE_PREFIX, PROTOCOL_VERSION, addr);
    info!(address = %addr, "Provider server starting");

    let provider = Arc::new(provider);
    let service = pb::provider_server::ProviderServer::new(ProviderGrpcService {
        provider: Arc::clone(&provider),
    });

    let (signalled_tx, signalled_rx) = oneshot::channel::<()>();
    let server = Server::builder()
        .add_service(service)
        .serve_with_incoming_shutdown(
            tokio_stream::wrappers::TcpListenerStream::new(listener),
            async move {
                wait_for_shutdown_signal().await;
                let _ = signalled_tx.send(());
            },
        );

    // The timeout only starts once draining begins.
    let drain_deadline = async move {
        match signalled_rx.await {
            Ok(()) => tokio::time::sleep(options.shutdown_timeout).await,
            Err(_) => std::future::pending::<()>().await,
        }
    };

    tokio::select! {
        result = server => match result {
            Ok(()) => info!("Server shutdown complete"),
            Err(e) => {
                error!(error = %e, "Server error");
                return Err(e.into());
            },
        },
        _ = drain_deadline => {
            warn!(timeout = ?options.shutdown_timeout, "Shutdown timeout exceeded, forcing shutdown");
        },
    }

    if let Err(e) = provider.stop().await {
        warn!(error = %e, "Provider stop() returned error");
    }
    info!("Provider shutdown complete");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Attribute, Block, NestedBlock};

    #[test]
    fn test_block_to_proto() {
        let block = Block::new()
            .with_attribute("name", Attribute::required_string().with_force_new())
            .with_attribute("global", Attribute::optional_bool().with_default(false))
            .with_block(
                "job_acl",
                NestedBlock::single(Block::new().with_attribute("namespace", Attribute::optional_string())),
            );
        let proto = block_to_proto(&block);

        let name = proto.attributes.iter().find(|a| a.name == "name").unwrap();
        assert!(name.required);
        assert!(name.force_new);
        assert!(name.default_value.is_empty());

        let global = proto.attributes.iter().find(|a| a.name == "global").unwrap();
        assert_eq!(global.default_value, b"false".to_vec());

        assert_eq!(proto.block_types.len(), 1);
        assert_eq!(
            proto.block_types[0].nesting_mode,
            pb::nested_block::NestingMode::Single as i32
        );
        assert_eq!(proto.block_types[0].max_items, 1);
    }

    #[test]
    fn test_error_to_diagnostics() {
        let diagnostics = error_to_diagnostics(ProviderError::NotConfigured);
        assert_eq!(diagnostics.len(), 1);
        assert_eq!(diagnostics[0].severity, pb::diagnostic::Severity::Error as i32);
        assert_eq!(diagnostics[0].summary, "Provider is not configured");
    }

    #[test]
    fn test_diagnostics_response_keeps_warnings() {
        let proto = diagnostics_response(
            "Configure",
            "provider",
            Ok(vec![Diagnostic::warning("token is about to expire").with_attribute("secret_id")]),
        );
        assert_eq!(proto[0].severity, pb::diagnostic::Severity::Warning as i32);
        assert_eq!(proto[0].attribute, "secret_id");
    }

    #[test]
    fn test_payload_defaults_to_null() {
        assert_eq!(payload(b""), Value::Null);
        assert_eq!(payload(br#"{"id": "x"}"#)["id"], "x");
    }
}
