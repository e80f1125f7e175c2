use nomad_provider::{init_logging, serve, NomadProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Nomad provider");
    serve(NomadProvider::new()).await
}
