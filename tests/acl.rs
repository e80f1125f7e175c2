mod common;

use nomad_provider::testing::{
    assert_error_contains, assert_plan_changes_attribute, assert_plan_no_changes,
    assert_plan_replaces, TestError,
};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, ResponseTemplate};

#[tokio::test]
async fn test_policy_lifecycle() {
    let (server, tester) = common::nomad().await;
    Mock::given(method("POST"))
        .and(path("/v1/acl/policy/tf-acc-test"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/v1/acl/policy/tf-acc-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "Name": "tf-acc-test",
            "Description": "Terraform ACL Policy tf-acc-test",
            "Rules": "namespace \"default\" { policy = \"read\" }"
        })))
        .mount(&server)
        .await;

    let state = tester
        .lifecycle_create(
            "nomad_acl_policy",
            json!({
                "name": "tf-acc-test",
                "description": "Terraform ACL Policy tf-acc-test",
                "rules_hcl": "namespace \"default\" { policy = \"read\" }"
            }),
        )
        .await
        .unwrap()
        .expect("policy exists after create");
    assert_eq!(state["id"], "tf-acc-test");
    assert_eq!(state["description"], "Terraform ACL Policy tf-acc-test");
}

#[tokio::test]
async fn test_deleted_policy_reads_as_gone() {
    let (server, tester) = common::nomad().await;
    Mock::given(method("GET"))
        .and(path("/v1/acl/policy/tf-acc-test"))
        .respond_with(common::not_found("ACL policy"))
        .mount(&server)
        .await;

    let state = tester
        .read("nomad_acl_policy", json!({"id": "tf-acc-test", "name": "tf-acc-test"}))
        .await
        .unwrap();
    assert!(state.is_none());
}

#[tokio::test]
async fn test_policies_data_source_filters_by_prefix() {
    let (server, tester) = common::nomad().await;
    Mock::given(method("GET"))
        .and(path("/v1/acl/policies"))
        .and(query_param("prefix", "tf-acc-test"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            {"Name": "tf-acc-test-1", "Description": "first"},
            {"Name": "tf-acc-test-2", "Description": "second"}
        ])))
        .expect(1)
        .mount(&server)
        .await;

    let state = tester
        .read_data_source("nomad_acl_policies", json!({"prefix": "tf-acc-test"}))
        .await
        .unwrap();
    let policies = state["policies"].as_array().unwrap();
    assert_eq!(policies.len(), 2);
    assert_eq!(policies[1]["name"], "tf-acc-test-2");
}

#[tokio::test]
async fn test_management_binding_rule_rejects_bind_name() {
    let (_server, tester) = common::nomad().await;
    let err = tester
        .validate_resource_config(
            "nomad_acl_binding_rule",
            json!({
                "auth_method": "oidc",
                "bind_type": "management",
                "bind_name": "ops"
            }),
        )
        .await
        .unwrap_err();
    match err {
        TestError::Diagnostics(diagnostics) => {
            assert_error_contains(&diagnostics, "must not be defined")
        }
        other => panic!("expected diagnostics, got {other}"),
    }
}

#[tokio::test]
async fn test_role_binding_rule_requires_bind_name() {
    let (_server, tester) = common::nomad().await;
    let err = tester
        .validate_resource_config(
            "nomad_acl_binding_rule",
            json!({"auth_method": "oidc", "bind_type": "role"}),
        )
        .await
        .unwrap_err();
    match err {
        TestError::Diagnostics(diagnostics) => assert_error_contains(&diagnostics, "must be defined"),
        other => panic!("expected diagnostics, got {other}"),
    }
}

#[tokio::test]
async fn test_policy_binding_rule_is_valid() {
    let (_server, tester) = common::nomad().await;
    tester
        .validate_resource_config(
            "nomad_acl_binding_rule",
            json!({"auth_method": "oidc", "bind_type": "policy", "bind_name": "readers"}),
        )
        .await
        .unwrap();
}

#[tokio::test]
async fn test_policy_plans() {
    let (_server, tester) = common::nomad().await;
    let prior = json!({
        "id": "tf-acc-test",
        "name": "tf-acc-test",
        "description": "",
        "rules_hcl": "namespace \"default\" { policy = \"read\" }"
    });

    let plan = tester
        .plan_update("nomad_acl_policy", prior.clone(), prior.clone())
        .await
        .unwrap();
    assert_plan_no_changes(&plan);

    let mut described = prior.clone();
    described["description"] = json!("readers");
    let plan = tester
        .plan_update("nomad_acl_policy", prior.clone(), described)
        .await
        .unwrap();
    assert_plan_changes_attribute(&plan, "description");
    assert!(!plan.requires_replace);

    let mut renamed = prior.clone();
    renamed["name"] = json!("tf-acc-test-renamed");
    let plan = tester
        .plan_update("nomad_acl_policy", prior, renamed)
        .await
        .unwrap();
    assert_plan_replaces(&plan);
}

#[tokio::test]
async fn test_unchanged_token_config_plans_no_changes() {
    let (server, tester) = common::nomad().await;
    Mock::given(method("POST"))
        .and(path("/v1/acl/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "AccessorID": "a1b2",
            "SecretID": "s3cr3t",
            "Type": "client",
            "Policies": ["dev"],
            "Global": false,
            "CreateTime": "2024-01-01T00:00:00Z",
            "ExpirationTTL": 3_600_000_000_000_i64,
            "ExpirationTime": "2024-01-01T01:00:00Z"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = json!({"type": "client", "policies": ["dev"], "expiration_ttl": "1h"});
    let plan = tester.plan_create("nomad_acl_token", config.clone()).await.unwrap();
    let state = tester
        .create("nomad_acl_token", plan.planned_state)
        .await
        .unwrap();
    assert_eq!(state["expiration_ttl"], "1h");

    let plan = tester
        .plan_update("nomad_acl_token", state, config)
        .await
        .unwrap();
    assert_plan_no_changes(&plan);
    assert!(!plan.requires_replace);
}
