mod common;

use nomad_provider::error::ProviderError;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

fn job_body(stop: bool) -> serde_json::Value {
    json!({
        "ID": "example",
        "Name": "example",
        "Namespace": "apps",
        "Type": "service",
        "Datacenters": ["dc1"],
        "Stop": stop,
        "Version": 3,
        "TaskGroups": [{
            "Name": "web",
            "Count": 1,
            "Tasks": [{"Name": "server", "Driver": "docker", "Config": {"image": "nginx"}}]
        }]
    })
}

#[tokio::test]
async fn test_stopped_job_reads_as_gone() {
    let (server, tester) = common::nomad().await;
    Mock::given(method("GET"))
        .and(path("/v1/job/example"))
        .and(query_param("namespace", "apps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_body(true)))
        .mount(&server)
        .await;

    let state = tester
        .read("nomad_job", json!({"id": "example", "name": "example", "namespace": "apps"}))
        .await
        .unwrap();
    assert!(state.is_none());
}

#[tokio::test]
async fn test_import_by_id_and_namespace() {
    let (server, tester) = common::nomad().await;
    Mock::given(method("GET"))
        .and(path("/v1/job/example"))
        .and(query_param("namespace", "apps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_body(false)))
        .expect(1)
        .mount(&server)
        .await;

    let imported = tester.import_resource("nomad_job", "example@apps").await.unwrap();
    assert_eq!(imported.len(), 1);
    assert_eq!(imported[0].resource_type, "nomad_job");
    assert_eq!(imported[0].state["id"], "example");
    assert_eq!(imported[0].state["namespace"], "apps");
}

#[tokio::test]
async fn test_import_of_missing_job_fails() {
    let (server, tester) = common::nomad().await;
    Mock::given(method("GET"))
        .and(path("/v1/job/missing"))
        .respond_with(common::not_found("job"))
        .mount(&server)
        .await;

    let err = tester.import_resource("nomad_job", "missing").await.unwrap_err();
    assert!(matches!(err, ProviderError::NotFound(_)));
}

#[tokio::test]
async fn test_job_data_source_summarises_groups() {
    let (server, tester) = common::nomad().await;
    Mock::given(method("GET"))
        .and(path("/v1/job/example"))
        .and(query_param("namespace", "apps"))
        .respond_with(ResponseTemplate::new(200).set_body_json(job_body(false)))
        .mount(&server)
        .await;

    let state = tester
        .read_data_source("nomad_job", json!({"job_id": "example", "namespace": "apps"}))
        .await
        .unwrap();
    assert_eq!(state["version"], 3);
    assert_eq!(state["task_groups"][0]["name"], "web");
    assert_eq!(state["task_groups"][0]["task"][0]["driver"], "docker");
}
