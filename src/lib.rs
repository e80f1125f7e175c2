//! Nomad Provider
//!
//! An infrastructure-as-code provider plugin that manages HashiCorp Nomad
//! objects (jobs, ACLs, namespaces, node pools, volumes, quotas, scheduler
//! configuration, variables) and exposes read-only data sources over them.
//!
//! # Overview
//!
//! The crate is layered leaf-first:
//!
//! - **[`api`]**: a typed async client for the Nomad HTTP API
//! - **[`helper`]**: pure converters (Go durations, humanized byte sizes)
//!   and the retry policy used by polling loops
//! - **[`resources`] / [`data_sources`]**: one adapter per Nomad object,
//!   pairing a [`schema::Schema`] with its lifecycle callbacks
//! - **[`registry`]**: the static table from type name to adapter
//! - **[`provider`]**: the [`NomadProvider`] that dispatches host requests
//! - **[`server`]**: the gRPC plugin server and stdout handshake
//!
//! # Quick Start
//!
//! ```ignore
//! use nomad_provider::{init_logging, serve, NomadProvider};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!     serve(NomadProvider::new()).await
//! }
//! ```
//!
//! # Handshake Protocol
//!
//! When started via [`serve`], the plugin prints a single line to stdout:
//!
//! ```text
//! NOMAD_PROVIDER|1|127.0.0.1:50051
//! ```
//!
//! Format: `NOMAD_PROVIDER|<protocol_version>|<address>`. Everything else,
//! including logs, goes to stderr.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod api;
pub mod config;
pub mod data_sources;
pub mod error;
pub mod helper;
pub mod logging;
pub mod plan;
pub mod provider;
pub mod registry;
pub mod resource;
pub mod resources;
pub mod schema;
pub mod server;
pub mod testing;
pub mod types;
pub mod validation;

#[allow(missing_docs)]
#[allow(clippy::all)]
pub mod generated {
    tonic::include_proto!("provider.v1");
}

pub use error::ProviderError;
pub use logging::{init_logging, try_init_logging};
pub use provider::NomadProvider;
pub use schema::ProviderSchema;
pub use server::{serve, serve_on, serve_with_options, ProviderService, ServeOptions};
pub use types::{
    AttributeChange, ImportedResource, PlanResult, ProviderMetadata, ServerCapabilities,
    HANDSHAKE_PREFIX, PROTOCOL_VERSION,
};
pub use validation::{is_valid, validate, validate_result};
