//! Shared fixtures for the integration tests.

#![allow(dead_code)]

use nomad_provider::testing::ProviderTester;
use nomad_provider::NomadProvider;
use wiremock::MockServer;

/// A mock Nomad agent and a provider configured against it.
pub async fn nomad() -> (MockServer, ProviderTester<NomadProvider>) {
    let server = MockServer::start().await;
    let tester = ProviderTester::nomad(&server.uri())
        .await
        .expect("provider configures against the mock agent");
    (server, tester)
}

/// A 404 the way Nomad reports a missing object.
pub fn not_found(what: &str) -> wiremock::ResponseTemplate {
    wiremock::ResponseTemplate::new(404).set_body_string(format!("{} not found", what))
}
